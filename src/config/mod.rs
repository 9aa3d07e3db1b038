//! Configuration management for `ampify.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── dimensions # [dimensions]
//! │   ├── pipeline   # [pipeline], [pipeline.args.*]
//! │   └── rules      # [rules]
//! ├── types/         # ConfigError, diagnostics, field paths
//! └── mod.rs         # AmpifyConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section              | Purpose                                      |
//! |----------------------|----------------------------------------------|
//! | `[sanitizer]`        | Options shared by every pass                 |
//! | `[dimensions]`       | Image size sources (files, static map)       |
//! | `[pipeline]`         | Pass order and rule dialect                  |
//! | `[pipeline.args.ID]` | Per-pass overrides merged over `[sanitizer]` |
//! | `[rules]`            | Alternate rule file                          |
//!
//! A missing config file is not an error: every section has defaults, and
//! command-line flags are applied on top either way.

pub mod section;
pub mod types;
mod util;

pub use section::{DimensionsConfig, PipelineConfig, RulesConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use util::find_config_file;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::SanitizeArgs;
use crate::log;
use crate::pipeline::pass::PassDeps;
use crate::pipeline::{PassRegistry, SanitizeOptions, Sanitizer};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `ampify.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmpifyConfig {
    /// Absolute path to the config file, empty when none was found.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative config paths resolve against.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub sanitizer: SanitizeOptions,

    #[serde(default)]
    pub dimensions: DimensionsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub rules: RulesConfig,
}

impl AmpifyConfig {
    /// Locate and load `config_name`, searching upward from the cwd.
    ///
    /// Falls back to defaults rooted at the cwd when no file exists.
    pub fn load(config_name: &Path) -> Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;

        let mut config = match find_config_file(config_name, &cwd) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = path;
                config
            }
            None => {
                crate::debug!("config"; "{} not found, using defaults", config_name.display());
                Self::default()
            }
        };

        let root = config
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(cwd, Path::to_path_buf);
        config.finalize(&root);
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Resolve relative paths against `root`.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.dimensions.normalize(root);
        self.rules.normalize(root);
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // command-line overrides
    // ========================================================================

    /// Apply `sanitize` flags on top of file values.
    ///
    /// Paths given on the command line are relative to the cwd, not the
    /// config directory.
    pub fn apply_sanitize_args(&mut self, args: &SanitizeArgs) {
        let options = &mut self.sanitizer;
        Self::update_option(&mut options.native_img_used, args.native_img.as_ref());
        Self::update_option(&mut options.add_noscript_fallback, args.fallback.as_ref());
        Self::update_option(&mut options.allow_picture, args.allow_picture.as_ref());
        Self::update_option(&mut options.align_wide_support, args.align_wide.as_ref());
        Self::update_option(&mut options.dev_mode, args.dev_mode.as_ref());
        Self::update_option(&mut options.server_side_layout, args.server_side_layout.as_ref());
        if args.content_max_width.is_some() {
            options.content_max_width = args.content_max_width;
        }

        if let Some(root) = &args.dimensions_root {
            self.dimensions.root = Some(root.clone());
        }
        if let Some(site_url) = &args.site_url {
            self.dimensions.site_url = Some(site_url.clone());
        }
        if let Some(format) = args.format {
            self.pipeline.format = format;
        }
        if let Some(passes) = &args.passes {
            self.pipeline.passes = passes.clone();
        }
        if let Some(rules) = &args.rules {
            self.rules.path = Some(rules.clone());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate every section, collecting all errors at once.
    pub fn validate(&self, registry: &PassRegistry) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        if self.sanitizer.content_max_width == Some(0) {
            diag.error(
                FieldPath::new("sanitizer.content_max_width"),
                "must be greater than 0",
            );
        }
        self.dimensions.validate(&mut diag);
        self.pipeline.validate(registry, &self.sanitizer, &mut diag);
        self.rules.validate(&mut diag);

        diag.print_warnings();

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    // ========================================================================
    // assembly
    // ========================================================================

    /// Rules and dimension sources for a run.
    pub fn deps(&self) -> Result<PassDeps> {
        let rules = self.rules.load(self.pipeline.format)?;
        let dimensions = self.dimensions.build()?;
        Ok(PassDeps::new(rules).with_dimensions(dimensions))
    }

    /// A sanitizer reflecting the whole configuration.
    pub fn sanitizer(&self, registry: PassRegistry) -> Result<Sanitizer> {
        let args = self
            .pipeline
            .pass_args()
            .map_err(|id| ConfigError::Validation(format!("`pipeline.args.{id}` must be a table")))?;

        let mut sanitizer = Sanitizer::new(self.sanitizer.clone())
            .with_deps(self.deps()?)
            .with_registry(registry)
            .with_passes(self.pipeline.passes.clone());
        for (id, table) in args {
            sanitizer = sanitizer.with_pass_args(id, table);
        }
        Ok(sanitizer)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AmpifyConfig {
    let (parsed, ignored) = AmpifyConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
