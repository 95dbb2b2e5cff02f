//! Static URL/endpoint extraction from JavaScript source.
//!
//! Parses source with `tree-sitter-javascript`, builds a scope-aware symbol
//! table (C2), then abstractly evaluates every string-producing expression
//! (C3) so that values assembled at runtime — via variables, template
//! interpolations, concatenation, array joins, and a closed catalogue of
//! string methods — are recovered as complete URLs when statically
//! derivable. See `SPEC_FULL.md` for the full component design; this is the
//! core engine only, not a command-line tool (argument parsing, file
//! discovery, and the sibling `strings`/`tree`/`inspect`/`query` modes are a
//! calling application's concern, not this crate's).

pub mod candidate;
pub mod config;
pub mod context;
pub mod driver;
pub mod errors;
pub mod evaluator;
pub mod filter;
pub mod html;
pub mod lexical;
pub mod route;
pub mod symbols;
pub mod telemetry;

pub use config::ExtractConfig;
pub use context::Context;
pub use driver::{extract, extract_with_context, ExtractionResult, ExtractionSummary};
pub use errors::{Error, Result};
