//! ampify - rewrite arbitrary HTML into AMP-valid markup.

use anyhow::Result;
use clap::Parser;

use ampify::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::run(&cli)
}
