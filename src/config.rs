//! Configuration for the extraction engine (AS1).
//!
//! Grouped sub-structs mirror the teacher's `GraphConfig`: a top-level
//! container, `Default` impls for every group, a `validate()` that rejects
//! nonsensical limits, and an env-var loader.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// How a symbol's value set is updated when a name is re-declared or
/// re-assigned (distilled-spec §3, "Symbol").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    Merge,
    Override,
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::Merge
    }
}

/// How context (C8) bindings interact with file-derived symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextPolicy {
    Merge,
    Override,
    Only,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        ContextPolicy::Merge
    }
}

/// HTML backend selector for C5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HtmlParserKind {
    #[default]
    Html5Ever,
}

/// Top-level configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub output: OutputConfig,
    pub limits: Limits,
    pub aliasing: Aliasing,
    pub symbols: SymbolsConfig,
    pub html: HtmlConfig,
    pub filtering: Filtering,
    pub context: ContextConfig,
}

impl ExtractConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable. Mirrors
    /// `GraphConfig::load_from_env_or_default`'s tolerant style.
    pub fn load_from_env_or_default() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = env::var("EXTRACT_PLACEHOLDER").ok() {
            cfg.output.placeholder = v;
        }
        if let Some(v) = env_bool("EXTRACT_INCLUDE_TEMPLATES") {
            cfg.output.include_templates = v;
        }
        if let Some(v) = env_bool("EXTRACT_VERBOSE") {
            cfg.output.verbose = v;
        }
        if let Some(v) = env_usize("EXTRACT_MAX_NODES") {
            cfg.limits.max_nodes = v;
        }
        if let Some(v) = env_usize("EXTRACT_MAX_FILE_SIZE") {
            cfg.limits.max_file_size = v;
        }
        if let Some(v) = env_usize("EXTRACT_MAX_RECURSION_DEPTH") {
            cfg.limits.max_recursion_depth = v;
        }
        if let Some(v) = env_usize("EXTRACT_MAX_FANOUT") {
            cfg.limits.max_fanout = v;
        }
        if let Some(v) = env_bool("EXTRACT_SKIP_ALIASES") {
            cfg.aliasing.skip_aliases = v;
        }
        if let Some(v) = env_bool("EXTRACT_SKIP_SYMBOLS") {
            cfg.symbols.skip_symbols = v;
        }
        if let Some(v) = env_list("EXTRACT_EXTENSIONS") {
            cfg.filtering.extensions.extend(v);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject nonsensical limits before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_nodes == 0 {
            return Err(Error::InvalidConfig("max_nodes must be greater than 0"));
        }
        if self.limits.max_fanout == 0 {
            return Err(Error::InvalidConfig("max_fanout must be greater than 0"));
        }
        if self.limits.max_recursion_depth == 0 {
            return Err(Error::InvalidConfig(
                "max_recursion_depth must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.symbols.merge_policy
    }
}

/// Output-shaping knobs (distilled-spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub placeholder: String,
    pub include_templates: bool,
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            placeholder: "FUZZ".to_string(),
            include_templates: false,
            verbose: false,
        }
    }
}

/// Resource bounds for C3/C7 (§5 concurrency & resource model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_nodes: usize,
    pub max_file_size: usize,
    pub max_recursion_depth: usize,
    pub max_fanout: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nodes: 200_000,
            max_file_size: 4 * 1024 * 1024,
            max_recursion_depth: 64,
            max_fanout: 64,
        }
    }
}

/// Alias-rendering preference for template placeholders (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aliasing {
    pub skip_aliases: bool,
}

/// Forces C3 into degraded mode by bypassing C2 entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolsConfig {
    pub skip_symbols: bool,
    pub merge_policy: MergePolicy,
}

/// C5 backend selection and future knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HtmlConfig {
    pub parser: HtmlParserKind,
}

/// C6 augmentation knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filtering {
    pub extensions: Vec<String>,
    /// When set, string candidates found inside tree-sitter `ERROR` subtrees
    /// are still considered for emission (distilled-spec §7).
    pub include_error_nodes: bool,
}

/// C8 context injection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    pub policy: ContextPolicy,
    pub bindings: HashMap<String, String>,
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    Some(
        raw.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ExtractConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_nodes_rejected() {
        let mut cfg = ExtractConfig::default();
        cfg.limits.max_nodes = 0;
        assert!(cfg.validate().is_err());
    }
}
