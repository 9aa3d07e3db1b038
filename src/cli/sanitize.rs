//! `ampify sanitize`: run the pipeline over files and directories.
//!
//! ```text
//! PATH... ──> collect *.html / *.htm (jwalk) ──> par_iter sanitize ──┬──> -o DIR/<relative path>
//!                                                                    └──> stdout, in input order
//! ```
//!
//! Each document gets its own run, so files are processed in parallel on
//! the rayon pool. With `--manifest`, a JSON report goes to stdout when
//! markup is written to a directory, otherwise to stderr.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use jwalk::WalkDir;
use rayon::prelude::*;
use serde::Serialize;

use super::SanitizeArgs;
use crate::config::AmpifyConfig;
use crate::logger::ProgressLine;
use crate::pipeline::{Diagnostic, Manifest, PassRegistry, Sanitizer};
use crate::{debug, log};

/// One input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlFile {
    pub path: PathBuf,
    /// Location under the output directory.
    pub relative: PathBuf,
}

/// Per-document entry of the `--manifest` report.
#[derive(Debug, Serialize)]
struct Report<'a> {
    path: String,
    manifest: &'a Manifest,
    diagnostics: &'a [Diagnostic],
}

struct Sanitized {
    file: HtmlFile,
    html: String,
    manifest: Manifest,
    diagnostics: Vec<Diagnostic>,
}

pub fn run_sanitize(args: &SanitizeArgs, config: &AmpifyConfig) -> Result<()> {
    let registry = PassRegistry::with_builtin();
    config.validate(&registry)?;
    let sanitizer = config.sanitizer(registry)?;
    debug!("sanitize"; "passes: {}", sanitizer.passes().join(", "));

    if is_stdin(&args.paths) {
        return sanitize_stdin(&sanitizer, args);
    }

    let files = collect_html_files(&args.paths)?;
    if files.is_empty() {
        bail!("no .html or .htm files found");
    }

    let progress = (args.output.is_some() && files.len() > 1)
        .then(|| ProgressLine::new(&[("html", files.len())]));

    let results: Vec<_> = files
        .par_iter()
        .map(|file| {
            let result = sanitize_file(&sanitizer, file, args.output.as_deref());
            if let Some(p) = &progress {
                p.inc("html");
            }
            result
        })
        .collect();

    if let Some(p) = progress {
        p.finish();
    }

    let mut done = Vec::with_capacity(results.len());
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(item) => done.push(item),
            Err(e) => {
                failed += 1;
                log!("error"; "{:#}", e);
            }
        }
    }

    if args.output.is_none() {
        let mut out = io::stdout().lock();
        for item in &done {
            out.write_all(item.html.as_bytes())?;
            if !item.html.ends_with('\n') {
                out.write_all(b"\n")?;
            }
        }
        out.flush()?;
    }

    if args.manifest {
        print_report(&done, args.output.is_some())?;
    }

    let diagnostics: usize = done.iter().map(|d| d.diagnostics.len()).sum();
    log!(
        "done";
        "{} {} sanitized, {} {}",
        done.len(),
        plural(done.len(), "file"),
        diagnostics,
        plural(diagnostics, "diagnostic")
    );

    if failed > 0 {
        bail!("{} {} failed", failed, plural(failed, "file"));
    }
    Ok(())
}

fn sanitize_file(sanitizer: &Sanitizer, file: &HtmlFile, output: Option<&Path>) -> Result<Sanitized> {
    let source = fs::read_to_string(&file.path)
        .with_context(|| format!("reading {}", file.path.display()))?;
    let (html, result) = sanitizer
        .sanitize_html(&source)
        .with_context(|| format!("sanitizing {}", file.path.display()))?;

    for diagnostic in &result.diagnostics {
        debug!("sanitize"; "{}: {}", file.path.display(), diagnostic);
    }

    if let Some(dir) = output {
        let target = dir.join(&file.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&target, &html).with_context(|| format!("writing {}", target.display()))?;
    }

    Ok(Sanitized {
        file: file.clone(),
        html,
        manifest: result.manifest,
        diagnostics: result.diagnostics,
    })
}

fn sanitize_stdin(sanitizer: &Sanitizer, args: &SanitizeArgs) -> Result<()> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .context("reading stdin")?;
    let (html, result) = sanitizer.sanitize_html(&source)?;

    let file = HtmlFile {
        path: PathBuf::from("-"),
        relative: PathBuf::from("stdin.html"),
    };
    match &args.output {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let target = dir.join(&file.relative);
            fs::write(&target, &html).with_context(|| format!("writing {}", target.display()))?;
        }
        None => io::stdout().lock().write_all(html.as_bytes())?,
    }

    if args.manifest {
        let item = Sanitized {
            file,
            html,
            manifest: result.manifest,
            diagnostics: result.diagnostics,
        };
        print_report(std::slice::from_ref(&item), args.output.is_some())?;
    }
    Ok(())
}

fn print_report(items: &[Sanitized], to_stdout: bool) -> Result<()> {
    let reports: Vec<_> = items
        .iter()
        .map(|item| Report {
            path: item.file.path.display().to_string(),
            manifest: &item.manifest,
            diagnostics: &item.diagnostics,
        })
        .collect();
    let json = serde_json::to_string_pretty(&reports)?;
    if to_stdout {
        println!("{json}");
    } else {
        eprintln!("{json}");
    }
    Ok(())
}

// ============================================================================
// input collection
// ============================================================================

fn is_stdin(paths: &[PathBuf]) -> bool {
    paths.len() == 1 && paths[0].as_os_str() == "-"
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Expand paths into HTML files, sorted for stable output.
///
/// Files named directly are kept whatever their extension and land at the
/// top of the output directory; directory contents keep their relative path.
pub fn collect_html_files(paths: &[PathBuf]) -> Result<Vec<HtmlFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            let name = path
                .file_name()
                .with_context(|| format!("not a file: {}", path.display()))?;
            files.push(HtmlFile {
                path: path.clone(),
                relative: PathBuf::from(name),
            });
        } else if path.is_dir() {
            let mut found: Vec<_> = WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path())
                .filter(|p| is_html(p))
                .collect();
            found.sort();
            files.extend(found.into_iter().map(|file| {
                let relative = file.strip_prefix(path).unwrap_or(&file).to_path_buf();
                HtmlFile {
                    path: file,
                    relative,
                }
            }));
        } else {
            bail!("path not found: {}", path.display());
        }
    }
    Ok(files)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

// ============================================================================
// tests
// ============================================================================
