//! Configuration section definitions.
//!
//! Each module corresponds to a section in `ampify.toml`:
//!
//! | Module       | TOML Section      | Purpose                            |
//! |--------------|-------------------|------------------------------------|
//! | `dimensions` | `[dimensions]`    | Image size sources                 |
//! | `pipeline`   | `[pipeline]`      | Pass order, dialect, per-pass args |
//! | `rules`      | `[rules]`         | Alternate rule file                |
//!
//! `[sanitizer]` deserializes straight into
//! [`SanitizeOptions`](crate::pipeline::SanitizeOptions).

mod dimensions;
mod pipeline;
mod rules;

pub use dimensions::DimensionsConfig;
pub use pipeline::PipelineConfig;
pub use rules::RulesConfig;
