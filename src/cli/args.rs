//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::spec::Format;

/// Rewrite HTML into AMP-valid markup
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "ampify.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print debug traces
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sanitize HTML files or directories
    #[command(visible_alias = "s")]
    Sanitize {
        #[command(flatten)]
        args: SanitizeArgs,
    },

    /// Show the rules that apply to a tag
    #[command(visible_alias = "r")]
    Rules {
        /// Tag name, e.g. `amp-img`
        tag: String,

        /// Rule dialect (AMP, AMP4EMAIL)
        #[arg(short, long, value_parser = parse_format)]
        format: Option<Format>,
    },
}

/// `sanitize` arguments. Unset flags keep the config file value.
#[derive(clap::Args, Debug, Clone)]
pub struct SanitizeArgs {
    /// HTML files or directories. Use `-` to read a document from stdin.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Write results under this directory instead of stdout
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Keep `<img>` instead of converting to `amp-img`
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub native_img: Option<bool>,

    /// Keep each replaced element inside a `<noscript>` fallback
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub fallback: Option<bool>,

    /// Leave `<picture>` wrappers in place
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub allow_picture: Option<bool>,

    /// Responsive layout for wide/full aligned figures
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub align_wide: Option<bool>,

    /// Honor `data-ampdevmode` on individual elements
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub dev_mode: Option<bool>,

    /// Pre-render layout classes on generated components
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub server_side_layout: Option<bool>,

    /// Fallback width for images that cannot be sized
    #[arg(long, value_name = "PX")]
    pub content_max_width: Option<u32>,

    /// Directory image URLs resolve against
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub dimensions_root: Option<PathBuf>,

    /// Public site URL, for absolute image URLs
    #[arg(long)]
    pub site_url: Option<String>,

    /// Rule dialect (AMP, AMP4EMAIL)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<Format>,

    /// Pass ids to run, in order (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub passes: Option<Vec<String>>,

    /// Alternate rule file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub rules: Option<PathBuf>,

    /// Print each document's manifest and diagnostics as JSON
    #[arg(short, long)]
    pub manifest: bool,
}

fn parse_format(value: &str) -> Result<Format, String> {
    Format::parse(value).ok_or_else(|| format!("unknown format `{value}`, expected AMP or AMP4EMAIL"))
}
