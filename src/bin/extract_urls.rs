//! Minimal demo binary for the URL extraction engine.
//!
//! Argument parsing, multi-file discovery, and the sibling
//! `strings`/`tree`/`inspect`/`query` modes belong to a calling application,
//! not this crate (see `SPEC_FULL.md` §1). This binary exists only to
//! exercise the library end to end: read a JS file from the single
//! positional argument, print deduplicated candidates one per line.

use std::env;
use std::fs;
use std::process::ExitCode;

use js_url_extract::{extract, ExtractConfig};

fn main() -> ExitCode {
    js_url_extract::telemetry::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: extract-urls <file.js>");
        return ExitCode::FAILURE;
    };

    let code = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: cannot read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = ExtractConfig::load_from_env_or_default().unwrap_or_default();
    match extract(&code, &config) {
        Ok(result) => {
            for candidate in &result.candidates {
                println!("{candidate}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
