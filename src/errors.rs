//! Error taxonomy for the extraction engine.
//!
//! Only the *hard* failures from the design's error taxonomy become an
//! `Error` variant here: unreadable input, malformed context input, and
//! tree-sitter grammar/parse setup failures. Everything else (parse-error
//! subtrees, budget exhaustion, a single candidate's HTML parse failing) is
//! absorbed into partial results and never crosses this boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source is empty")]
    EmptySource,

    #[error("tree-sitter language error")]
    TreeSitterLanguage,

    #[error("tree-sitter parse error")]
    TreeSitterParse,

    #[error("malformed context input: {0}")]
    MalformedContext(String),

    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
