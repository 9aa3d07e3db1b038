//! Rule database errors.
//!
//! All of these indicate a corrupt or inconsistent rule file, never bad
//! input markup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("rule file parsing error")]
    Json(#[from] serde_json::Error),

    #[error("unknown attribute list `{0}`")]
    UnknownAttrList(String),

    #[error("tag spec `{spec}` references missing attribute list `{list}`")]
    DanglingAttrList { spec: String, list: String },

    #[error("tag spec `{spec}` references missing descendant list `{list}`")]
    UnknownDescendantList { spec: String, list: String },

    #[error("invalid pattern on attribute `{attr}`")]
    Pattern {
        attr: String,
        #[source]
        source: regex::Error,
    },

    #[error("tag specs `{first}` and `{second}` share tag and dispatch key")]
    AmbiguousDispatch { first: String, second: String },
}
