//! Context injector (C8).
//!
//! Ingests externally supplied variable bindings and merges them with the
//! symbol table under a policy (distilled-spec §4.8). Dotted keys like
//! `window.location.host` install overrides into the special
//! `window.location` resolver the evaluator (C3) consults directly, rather
//! than the symbol table, since that resolver is not itself symbol-backed.

use std::collections::HashMap;
use std::path::Path;

use crate::config::ContextPolicy;
use crate::errors::{Error, Result};
use crate::symbols::SymbolTable;

/// The subset of `window.location` properties a context binding may pin,
/// mirroring the evaluator's well-known-defaults table (distilled-spec
/// §4.3).
#[derive(Debug, Clone, Default)]
pub struct LocationOverrides {
    pub origin: Option<String>,
    pub host: Option<String>,
    pub hostname: Option<String>,
    pub protocol: Option<String>,
    pub pathname: Option<String>,
    pub href: Option<String>,
    pub search: Option<String>,
    pub hash: Option<String>,
    pub port: Option<String>,
}

impl LocationOverrides {
    fn set(&mut self, property: &str, value: String) {
        match property {
            "origin" => self.origin = Some(value),
            "host" => self.host = Some(value),
            "hostname" => self.hostname = Some(value),
            "protocol" => self.protocol = Some(value),
            "pathname" => self.pathname = Some(value),
            "href" => self.href = Some(value),
            "search" => self.search = Some(value),
            "hash" => self.hash = Some(value),
            "port" => self.port = Some(value),
            _ => {}
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        match property {
            "origin" => self.origin.as_deref(),
            "host" => self.host.as_deref(),
            "hostname" => self.hostname.as_deref(),
            "protocol" => self.protocol.as_deref(),
            "pathname" => self.pathname.as_deref(),
            "href" => self.href.as_deref(),
            "search" => self.search.as_deref(),
            "hash" => self.hash.as_deref(),
            "port" => self.port.as_deref(),
            _ => None,
        }
    }
}

/// A parsed set of context bindings, ready to apply to a `SymbolTable`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub bindings: HashMap<String, String>,
    pub location: LocationOverrides,
}

impl Context {
    /// Parse from a JSON object (`{"name": "value", ...}`).
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(text)
            .map_err(|e| Error::MalformedContext(format!("invalid JSON context: {e}")))?;
        Ok(Self::from_map(raw))
    }

    /// Parse from a JSON file on disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse from a `KEY=VALUE` pair list, e.g. as repeated `--context`
    /// command-line flags would supply (the flag parsing itself is the
    /// calling mode's concern; this only parses the pair syntax).
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut raw = HashMap::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::MalformedContext(format!("expected KEY=VALUE, got {pair:?}"))
            })?;
            raw.insert(key.to_string(), value.to_string());
        }
        Ok(Self::from_map(raw))
    }

    fn from_map(raw: HashMap<String, String>) -> Self {
        let mut ctx = Self::default();
        for (key, value) in raw {
            if let Some(rest) = key.strip_prefix("window.location.") {
                ctx.location.set(rest, value);
            } else if let Some(rest) = key.strip_prefix("location.") {
                ctx.location.set(rest, value);
            } else {
                ctx.bindings.insert(key, value);
            }
        }
        ctx
    }

    /// Apply this context to `table` per `policy`. Under `Only`, the caller
    /// is expected to have skipped C2 entirely (the symbol table passed in
    /// should be empty); this function just installs the bindings either way.
    pub fn apply<'a>(&self, table: &mut SymbolTable<'a>, policy: ContextPolicy) {
        for (name, value) in &self.bindings {
            match policy {
                ContextPolicy::Override | ContextPolicy::Only => {
                    table.pin_override(name, vec![value.clone()]);
                }
                ContextPolicy::Merge => {
                    table.pin_merge(name, vec![value.clone()]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_dotted_keys() {
        let ctx = Context::from_pairs(["t=/api", "window.location.host=example.com"]).unwrap();
        assert_eq!(ctx.bindings.get("t"), Some(&"/api".to_string()));
        assert_eq!(ctx.location.get("host"), Some("example.com"));
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!(Context::from_pairs(["no-equals-sign"]).is_err());
    }

    #[test]
    fn override_policy_pins_symbol() {
        let ctx = Context::from_pairs(["t=/api"]).unwrap();
        let mut table = SymbolTable::new(crate::config::MergePolicy::Merge);
        ctx.apply(&mut table, ContextPolicy::Override);
        let sym = table.lookup(table.program_scope, "t").unwrap();
        assert!(sym.pinned);
    }
}
