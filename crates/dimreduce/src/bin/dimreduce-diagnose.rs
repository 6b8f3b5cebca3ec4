//! Print native library and GPU availability.

use anyhow::Result;
use clap::Parser;
use dimreduce::diagnostics::{report, report_all};

#[derive(Parser)]
#[command(name = "dimreduce-diagnose")]
#[command(about = "Print diagnostic information about dimreduce native/GPU availability", long_about = None)]
#[command(version)]
struct Cli {
    /// Print machine-readable JSON output
    #[arg(long)]
    json: bool,

    /// Include the CPU library and the probe reason
    #[arg(long)]
    all: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = if cli.all {
        let info = report_all();
        if cli.json {
            info.to_json()
        } else {
            info.to_string()
        }
    } else {
        let info = report();
        if cli.json {
            info.to_json()
        } else {
            info.to_string()
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}
