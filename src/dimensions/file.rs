//! Dimensions read from image files under a local web root.
//!
//! URL forms map onto the root as follows:
//!
//! ```text
//! https://example.com/wp/a.png  (site_url = https://example.com/wp)  → <root>/a.png
//! /uploads/a.png                                                     → <root>/uploads/a.png
//! uploads/a.png                                                      → <root>/uploads/a.png
//! https://cdn.other.com/a.png                                        → unresolved
//! ```
//!
//! Probes run on the rayon pool. The caller waits on a channel until every
//! URL has answered or the deadline passes; stragglers are reported unknown.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam::channel;
use rayon::prelude::*;
use url::Url;

use super::{DimensionExtractor, DimensionMap, Dimensions};
use crate::utils::url::path_of;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct FileDimensionExtractor {
    root: PathBuf,
    site_url: Option<Url>,
    timeout: Duration,
}

impl FileDimensionExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            site_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Absolute URLs under this prefix are treated as local files.
    pub fn with_site_url(mut self, site_url: Url) -> Self {
        self.site_url = Some(site_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Map a markup URL to a file below the root.
    pub fn locate(&self, url: &str) -> Option<PathBuf> {
        let url = url.trim();
        let is_absolute = url.starts_with("//") || url.contains("://");

        let relative = if is_absolute {
            let site = self.site_url.as_ref()?;
            let parsed = Url::parse(&crate::utils::url::normalize_for_lookup(url)).ok()?;
            if parsed.host_str() != site.host_str() {
                return None;
            }
            let path = path_of(url)?;
            let prefix = site.path().trim_end_matches('/');
            let rest = path.strip_prefix(prefix)?;
            if !(rest.is_empty() || rest.starts_with('/')) {
                return None;
            }
            rest.to_string()
        } else {
            path_of(url)?
        };

        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn probe(path: &Path) -> Option<Dimensions> {
    match image::image_dimensions(path) {
        Ok((width, height)) => Some(Dimensions { width, height }),
        Err(e) => {
            crate::debug!("dimensions"; "cannot read `{}`: {}", path.display(), e);
            None
        }
    }
}

impl DimensionExtractor for FileDimensionExtractor {
    fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap {
        let mut out: DimensionMap = urls.iter().map(|url| (url.clone(), None)).collect();

        let jobs: Vec<(String, PathBuf)> = urls
            .iter()
            .filter_map(|url| Some((url.clone(), self.locate(url)?)))
            .collect();
        if jobs.is_empty() {
            return out;
        }

        let deadline = Instant::now() + self.timeout;
        let mut remaining = jobs.len();
        let (tx, rx) = channel::unbounded();

        // Detached so a slow probe cannot hold the caller past the deadline.
        std::thread::spawn(move || {
            jobs.into_par_iter().for_each_with(tx, |tx, (url, path)| {
                let _ = tx.send((url, probe(&path)));
            });
        });

        while remaining > 0 {
            match rx.recv_deadline(deadline) {
                Ok((url, dims)) => {
                    out.insert(url, dims);
                    remaining -= 1;
                }
                Err(_) => {
                    crate::debug!("dimensions"; "{} lookups unanswered before deadline", remaining);
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        image::RgbImage::new(width, height).save(&path).unwrap();
    }

    #[test]
    fn test_locate_forms() {
        let extractor = FileDimensionExtractor::new("/srv/www")
            .with_site_url(Url::parse("https://example.com/blog/").unwrap());

        assert_eq!(
            extractor.locate("/uploads/a.png"),
            Some(PathBuf::from("/srv/www/uploads/a.png"))
        );
        assert_eq!(
            extractor.locate("uploads/a.png?ver=2"),
            Some(PathBuf::from("/srv/www/uploads/a.png"))
        );
        assert_eq!(
            extractor.locate("https://example.com/blog/uploads/a.png"),
            Some(PathBuf::from("/srv/www/uploads/a.png"))
        );
        assert_eq!(extractor.locate("https://cdn.other.com/a.png"), None);
        assert_eq!(extractor.locate("https://example.com/other/a.png"), None);
        assert_eq!(extractor.locate("https://example.com/blogger/a.png"), None);
        assert_eq!(
            extractor.locate("/uploads/../../etc/passwd"),
            Some(PathBuf::from("/srv/www/etc/passwd"))
        );
        assert_eq!(extractor.locate("/a/..%2f..%2fetc/passwd"), None);
    }

    #[test]
    fn test_absolute_without_site_url_is_unresolved() {
        let extractor = FileDimensionExtractor::new("/srv/www");
        assert_eq!(extractor.locate("https://example.com/a.png"), None);
    }

    #[test]
    fn test_extract_reads_headers() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "uploads/a.png", 30, 20);

        let extractor = FileDimensionExtractor::new(dir.path());
        let urls: BTreeSet<String> = ["/uploads/a.png", "/uploads/missing.png", "https://x.com/b.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = extractor.extract(&urls);

        assert_eq!(map.len(), 3);
        assert_eq!(map["/uploads/a.png"], Some(Dimensions::new(30, 20)));
        assert_eq!(map["/uploads/missing.png"], None);
        assert_eq!(map["https://x.com/b.png"], None);
    }

    #[test]
    fn test_zero_timeout_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 5, 5);

        let extractor = FileDimensionExtractor::new(dir.path()).with_timeout(Duration::ZERO);
        let urls: BTreeSet<String> = ["/a.png".to_string()].into();
        let map = extractor.extract(&urls);

        // Either answered instantly or timed out; never missing.
        assert!(map.contains_key("/a.png"));
    }
}
