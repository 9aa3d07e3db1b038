//! `[dimensions]` section configuration.
//!
//! Where image sizes come from when markup omits `width`/`height`.
//!
//! # Example
//!
//! ```toml
//! [dimensions]
//! root = "public"                       # Directory URLs are resolved against
//! site_url = "https://example.com/"     # Absolute URLs under this prefix are local
//! timeout_ms = 3000                     # Deadline for one lookup batch
//! static = "sizes.json"                 # Precomputed {"url": {"width", "height"}}
//! ```
//!
//! With both `static` and `root` set, the static map is consulted first.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::dimensions::{
    ChainedExtractor, DimensionExtractor, FileDimensionExtractor, NullExtractor, StaticDimensions,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionsConfig {
    /// Local directory mirroring the site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Public site URL, for absolute image URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,

    /// Lookup deadline in milliseconds.
    pub timeout_ms: u64,

    /// JSON map of precomputed sizes.
    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_map: Option<PathBuf>,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            root: None,
            site_url: None,
            timeout_ms: 3000,
            static_map: None,
        }
    }
}

impl DimensionsConfig {
    pub const ROOT: FieldPath = FieldPath::new("dimensions.root");
    pub const SITE_URL: FieldPath = FieldPath::new("dimensions.site_url");
    pub const TIMEOUT_MS: FieldPath = FieldPath::new("dimensions.timeout_ms");
    pub const STATIC: FieldPath = FieldPath::new("dimensions.static");

    /// Resolve relative paths against the config directory.
    pub fn normalize(&mut self, base: &Path) {
        if let Some(root) = self.root.take() {
            self.root = Some(base.join(root));
        }
        if let Some(map) = self.static_map.take() {
            self.static_map = Some(base.join(map));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Some(root) = &self.root
            && !root.is_dir()
        {
            diag.error(
                Self::ROOT,
                format!("directory not found: {}", root.display()),
            );
        }

        if let Some(map) = &self.static_map
            && !map.is_file()
        {
            diag.error(Self::STATIC, format!("file not found: {}", map.display()));
        }

        if let Some(site_url) = &self.site_url {
            match Url::parse(site_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => diag.error_with_hint(
                    Self::SITE_URL,
                    format!("`{site_url}` is not an absolute http(s) URL"),
                    "use the public origin, e.g. \"https://example.com/\"",
                ),
            }
            if self.root.is_none() {
                diag.warn(Self::SITE_URL, "has no effect without `dimensions.root`");
            }
        }

        if self.timeout_ms == 0 {
            diag.error(Self::TIMEOUT_MS, "must be greater than 0");
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Assemble the configured extractors, static map first.
    pub fn build(&self) -> Result<Arc<dyn DimensionExtractor>> {
        let mut chain = ChainedExtractor::new();

        if let Some(path) = &self.static_map {
            let table = StaticDimensions::from_path(path)
                .with_context(|| format!("loading {}", Self::STATIC.as_str()))?;
            crate::debug!("dimensions"; "{} precomputed sizes", table.len());
            chain = chain.with(Arc::new(table));
        }

        if let Some(root) = &self.root {
            let mut files = FileDimensionExtractor::new(root).with_timeout(self.timeout());
            if let Some(site_url) = &self.site_url {
                let url = Url::parse(site_url)
                    .with_context(|| format!("parsing {}", Self::SITE_URL.as_str()))?;
                files = files.with_site_url(url);
            }
            chain = chain.with(Arc::new(files));
        }

        Ok(if chain.is_empty() {
            Arc::new(NullExtractor)
        } else {
            Arc::new(chain)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::config::test_parse_config;
    use crate::dimensions::Dimensions;

    #[test]
    fn test_dimensions_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.dimensions, DimensionsConfig::default());
        assert_eq!(config.dimensions.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_static_key_renamed() {
        let config = test_parse_config("[dimensions]\nstatic = \"sizes.json\"\ntimeout_ms = 500");
        assert_eq!(config.dimensions.static_map, Some(PathBuf::from("sizes.json")));
        assert_eq!(config.dimensions.timeout_ms, 500);
    }

    #[test]
    fn test_validate_reports_every_field() {
        let config = DimensionsConfig {
            root: Some(PathBuf::from("/definitely/not/here")),
            site_url: Some("example.com".into()),
            timeout_ms: 0,
            static_map: Some(PathBuf::from("/definitely/not/here.json")),
        };
        let mut diag = ConfigDiagnostics::new();
        config.validate(&mut diag);
        let fields: Vec<_> = diag.errors().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            [
                DimensionsConfig::ROOT,
                DimensionsConfig::STATIC,
                DimensionsConfig::SITE_URL,
                DimensionsConfig::TIMEOUT_MS
            ]
        );
    }

    #[test]
    fn test_site_url_without_root_warns() {
        let config = DimensionsConfig {
            site_url: Some("https://example.com/".into()),
            ..Default::default()
        };
        let mut diag = ConfigDiagnostics::new();
        config.validate(&mut diag);
        assert!(diag.is_empty());
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn test_build_static_map() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("sizes.json");
        std::fs::write(&map, r#"{"https://cdn.test/a.png": {"width": 40, "height": 20}}"#)
            .unwrap();

        let config = DimensionsConfig {
            static_map: Some(map),
            ..Default::default()
        };
        let extractor = config.build().unwrap();
        let urls = BTreeSet::from(["https://cdn.test/a.png".to_string()]);
        let found = extractor.extract(&urls);
        assert_eq!(
            found.get("https://cdn.test/a.png"),
            Some(&Some(Dimensions::new(40, 20)))
        );
    }

    #[test]
    fn test_build_missing_map_fails() {
        let config = DimensionsConfig {
            static_map: Some(PathBuf::from("/definitely/not/here.json")),
            ..Default::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_normalize_joins_base() {
        let mut config = DimensionsConfig {
            root: Some(PathBuf::from("public")),
            ..Default::default()
        };
        config.normalize(Path::new("/site"));
        assert_eq!(config.root, Some(PathBuf::from("/site/public")));
    }
}
