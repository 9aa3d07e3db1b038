//! Batched image dimension lookup.
//!
//! The image pass collects every URL it cannot size from markup and asks a
//! [`DimensionExtractor`] once per document. Implementations may probe in
//! parallel but always return one entry per requested URL; `None` marks a
//! failed lookup and never fails the batch.
//!
//! | Extractor                 | Source                                  |
//! |---------------------------|-----------------------------------------|
//! | [`FileDimensionExtractor`]| image headers of files under a web root |
//! | [`StaticDimensions`]      | in-memory map or JSON file              |
//! | [`ChainedExtractor`]      | first answer from an ordered list       |
//! | [`NullExtractor`]         | always unknown                          |

mod file;
mod fixed;

pub use file::FileDimensionExtractor;
pub use fixed::StaticDimensions;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intrinsic pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// URL → size, with an entry for every requested URL.
pub type DimensionMap = FxHashMap<String, Option<Dimensions>>;

pub trait DimensionExtractor: Send + Sync {
    fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap;
}

#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid dimension map `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),
}

/// Extractor used when nothing is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExtractor;

impl DimensionExtractor for NullExtractor {
    fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap {
        urls.iter().map(|url| (url.clone(), None)).collect()
    }
}

/// Ask each extractor in turn for the URLs still unresolved.
#[derive(Default, Clone)]
pub struct ChainedExtractor {
    extractors: Vec<Arc<dyn DimensionExtractor>>,
}

impl ChainedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: Arc<dyn DimensionExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl DimensionExtractor for ChainedExtractor {
    fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap {
        let mut out: DimensionMap = urls.iter().map(|url| (url.clone(), None)).collect();
        let mut pending = urls.clone();

        for extractor in &self.extractors {
            if pending.is_empty() {
                break;
            }
            for (url, dims) in extractor.extract(&pending) {
                if let Some(dims) = dims
                    && pending.remove(&url)
                {
                    out.insert(url, Some(dims));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_null_extractor_answers_every_url() {
        let map = NullExtractor.extract(&urls(&["a.png", "b.png"]));
        assert_eq!(map.len(), 2);
        assert!(map.values().all(Option::is_none));
    }

    #[test]
    fn test_chain_falls_through() {
        let first = StaticDimensions::from_iter([("a.png", Dimensions::new(1, 2))]);
        let second = StaticDimensions::from_iter([
            ("a.png", Dimensions::new(9, 9)),
            ("b.png", Dimensions::new(3, 4)),
        ]);
        let chain = ChainedExtractor::new()
            .with(Arc::new(first))
            .with(Arc::new(second));

        let map = chain.extract(&urls(&["a.png", "b.png", "c.png"]));
        assert_eq!(map["a.png"], Some(Dimensions::new(1, 2)));
        assert_eq!(map["b.png"], Some(Dimensions::new(3, 4)));
        assert_eq!(map["c.png"], None);
    }
}
