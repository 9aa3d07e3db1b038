//! Precomputed dimensions.

use std::collections::BTreeSet;
use std::path::Path;

use rustc_hash::FxHashMap;

use super::{DimensionError, DimensionExtractor, DimensionMap, Dimensions};
use crate::utils::url::normalize_for_lookup;

/// Fixed URL → size table.
///
/// Loaded from JSON shaped as `{"https://x/a.png": {"width": 1, "height": 2}}`.
#[derive(Debug, Default, Clone)]
pub struct StaticDimensions {
    sizes: FxHashMap<String, Dimensions>,
}

impl StaticDimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl AsRef<str>, dims: Dimensions) {
        self.sizes.insert(normalize_for_lookup(url.as_ref()), dims);
    }

    pub fn from_json(json: &str, origin: &Path) -> Result<Self, DimensionError> {
        let raw: FxHashMap<String, Dimensions> = serde_json::from_str(json)
            .map_err(|e| DimensionError::Json(origin.to_path_buf(), e))?;
        Ok(raw.into_iter().collect())
    }

    pub fn from_path(path: &Path) -> Result<Self, DimensionError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DimensionError::Io(path.to_path_buf(), e))?;
        Self::from_json(&content, path)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, Dimensions)> for StaticDimensions {
    fn from_iter<I: IntoIterator<Item = (S, Dimensions)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (url, dims) in iter {
            table.insert(url, dims);
        }
        table
    }
}

impl DimensionExtractor for StaticDimensions {
    fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap {
        urls.iter()
            .map(|url| {
                let dims = self.sizes.get(&normalize_for_lookup(url)).copied();
                (url.clone(), dims)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_normalizes_protocol_relative() {
        let table = StaticDimensions::from_iter([("//cdn.x.com/a.png", Dimensions::new(10, 20))]);
        let urls: BTreeSet<String> = ["https://cdn.x.com/a.png".to_string()].into();
        assert_eq!(
            table.extract(&urls)["https://cdn.x.com/a.png"],
            Some(Dimensions::new(10, 20))
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sizes.json");
        std::fs::write(&path, r#"{"/a.png": {"width": 600, "height": 400}}"#).unwrap();

        let table = StaticDimensions::from_path(&path).unwrap();
        assert_eq!(table.len(), 1);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            StaticDimensions::from_path(&path),
            Err(DimensionError::Json(..))
        ));
        assert!(matches!(
            StaticDimensions::from_path(&dir.path().join("nope.json")),
            Err(DimensionError::Io(..))
        ));
    }
}
