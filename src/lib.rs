//! ampify - rewrite arbitrary HTML into AMP-valid markup.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────────────────────┐
//! │ dom::parse│──>│ SanitizerPipeline                            │
//! └───────────┘   │  embed -> img -> tag_and_attribute           │
//!                 │     │       │           │                    │
//!                 │     │   Dimension   SpecRepository           │
//!                 │     │   Extractor   + LayoutResolver         │
//!                 └──────────────────────────────────────────────┘
//!                        │
//!                        v
//!            mutated Document + Manifest + Diagnostics
//! ```
//!
//! - [`spec`]: immutable rule database (tags, attributes, layouts)
//! - [`dom`]: arena-backed document tree with mutation primitives
//! - [`layout`]: pure layout inference
//! - [`dimensions`]: batched image size lookup
//! - [`embed`]: handlers turning third-party embeds into components
//! - [`pipeline`]: pass orchestration and the built-in passes
//! - [`config`]: `ampify.toml` loading and validation
//! - [`cli`]: the `ampify` command

pub mod cli;
pub mod config;
pub mod dimensions;
pub mod dom;
pub mod embed;
pub mod layout;
pub mod logger;
pub mod pipeline;
pub mod spec;
pub mod utils;

pub use dom::Document;
pub use pipeline::{
    Diagnostic, DiagnosticCode, Manifest, SanitizeOptions, SanitizeOutput, Sanitizer, Stylesheet,
};
pub use spec::SpecRepository;
