#![forbid(unsafe_code)]

//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
/// Project: trustedge — Privacy and trust at the edge.
///
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use sbw_decode::{
    CollectingSink, Config, CryptoUnsealer, DiagnosticsSink, Driver, PrintSink, RecordAggregator, Severity,
};

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(name = "sbw-decode", version, about)]
struct Args {
    /// Capture file to decode
    #[arg(short, long)]
    input: PathBuf,

    /// JSON configuration file (crypto key, limits, compression override)
    #[arg(short, long)]
    config: PathBuf,

    /// Print one line per anomaly (unknown/malformed TLV records, skipped blocks)
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Suppress the run summary; only non-zero exit status reports failure
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config).with_context(|| {
        format!("loading configuration from {}", args.config.display())
    })?;

    for key in &config.unknown_keys {
        eprintln!("⚠ unrecognized configuration key: {key}");
    }

    let unsealer = CryptoUnsealer::new(*config.key).context("constructing crypto unsealer")?;
    let mut driver = Driver::new(unsealer, config.compression_override, config.limits);

    let file = File::open(&args.input).with_context(|| format!("opening {}", args.input.display()))?;
    let reader = BufReader::new(file);

    let mut aggregator = RecordAggregator::new();
    let mut collecting = CollectingSink::default();
    let mut print_sink = PrintSink;

    let result = driver.run(reader, &mut aggregator, &mut collecting, &|| false);

    for event in collecting.events.drain(..) {
        if args.verbose || event.severity == Severity::Error {
            print_sink.emit(event);
        }
    }

    result.context("decoding capture file")?;

    if !args.quiet {
        print_summary(&aggregator);
    }

    Ok(())
}

fn print_summary(aggregator: &RecordAggregator) {
    let summary = aggregator.summary();

    eprintln!("✔ Decode complete.");
    eprintln!(
        "  Blocks: {} seen, {} ok, {} skipped",
        summary.blocks_seen, summary.blocks_ok, summary.blocks_skipped
    );
    eprintln!(
        "  Records: {} imu, {} temperature, {} health, {} session",
        summary.imu_count, summary.temperature_count, summary.health_count, summary.session_count
    );
    if summary.anomaly_count > 0 {
        eprintln!("  Anomalies: {}", summary.anomaly_count);
    }
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        eprintln!("  Timestamp range: {first} .. {last}");
    }
}

