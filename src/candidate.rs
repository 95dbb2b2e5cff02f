//! The `Candidate` type shared by the evaluator (C3), the HTML extractor
//! (C5), and the driver (C7).

/// Where a candidate string came from, for diagnostics and for C5/C6 to make
/// source-aware decisions (e.g. HTML-embedded candidates skip re-parsing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Literal,
    Template,
    Concatenation,
    MethodCall,
    Member,
    HtmlEmbedded,
}

/// A string value produced by the evaluator, prior to route-param
/// normalization (C4) and filtering (C6).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    /// True if `text` still contains an unresolved template placeholder
    /// token (either the configured placeholder or a `{name}` form).
    pub templated: bool,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn new(text: impl Into<String>, templated: bool, source: CandidateSource) -> Self {
        Self {
            text: text.into(),
            templated,
            source,
        }
    }
}
