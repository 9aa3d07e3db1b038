//! Command-line interface module.
//!
//! | Command    | Module     | Purpose                                  |
//! |------------|------------|------------------------------------------|
//! | `sanitize` | `sanitize` | Rewrite files, directories or stdin      |
//! | `rules`    | `rules`    | Show the specs a tag can resolve to      |

mod args;
pub mod rules;
pub mod sanitize;

pub use args::{Cli, Commands, SanitizeArgs};

use anyhow::Result;
use clap::ColorChoice;

use crate::config::AmpifyConfig;

/// Apply global flags, load `ampify.toml`, dispatch the subcommand.
pub fn run(cli: &Cli) -> Result<()> {
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    crate::logger::set_verbose(cli.verbose);

    let mut config = AmpifyConfig::load(&cli.config)?;

    match &cli.command {
        Commands::Sanitize { args } => {
            config.apply_sanitize_args(args);
            sanitize::run_sanitize(args, &config)
        }
        Commands::Rules { tag, format } => rules::show_rules(tag, *format, &config),
    }
}
