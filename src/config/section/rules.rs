//! `[rules]` section configuration.
//!
//! ```toml
//! [rules]
//! path = "rules/custom.json"   # Defaults to the rules bundled with ampify
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::spec::{Format, SpecRepository};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Alternate rule file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RulesConfig {
    pub const PATH: FieldPath = FieldPath::new("rules.path");

    pub fn normalize(&mut self, base: &Path) {
        if let Some(path) = self.path.take() {
            self.path = Some(base.join(path));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Some(path) = &self.path
            && !path.is_file()
        {
            diag.error(Self::PATH, format!("file not found: {}", path.display()));
        }
    }

    /// Load the configured rule file, or share the bundled repository.
    pub fn load(&self, format: Format) -> Result<Arc<SpecRepository>> {
        match &self.path {
            Some(path) => {
                let repo = SpecRepository::from_path(path, format)
                    .with_context(|| format!("loading rules from {}", path.display()))?;
                crate::debug!("rules"; "{} tag specs from {}", repo.len(), path.display());
                Ok(Arc::new(repo))
            }
            None => Ok(SpecRepository::bundled(format)),
        }
    }
}
