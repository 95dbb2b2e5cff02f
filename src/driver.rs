//! Extraction driver (C7).
//!
//! Orchestrates the second tree pass: for every expression position that can
//! produce a string, invokes the abstract evaluator (C3), then the
//! route-param normalizer (C4), the HTML-embedded extractor (C5), and the
//! candidate filter (C6); survivors land in an order-preserving dedup set
//! (distilled-spec §4.7).

use tree_sitter::{Node, Parser};

use tracing::{debug, info};

use crate::candidate::{Candidate, CandidateSource};
use crate::config::{ContextPolicy, ExtractConfig};
use crate::context::Context;
use crate::errors::{Error, Result};
use crate::evaluator::Evaluator;
use crate::filter;
use crate::html;
use crate::route;
use crate::symbols::{ScopeId, SymbolTable, SymbolTableBuilder};

/// Known sinks that consume a URL-shaped string but whose call itself does
/// not produce one: `fetch(url)`, `window.open(url)`, `location.assign(url)`/
/// `location.replace(url)`, and `el.setAttribute("href"|"src"|..., url)`
/// (distilled-spec §4.7).
const LOCATION_SINK_METHODS: &[&str] = &["assign", "replace"];
const SINK_ATTRIBUTE_NAMES: &[&str] = &[
    "href", "src", "action", "formaction", "poster", "background", "data",
];

/// Run statistics returned alongside the candidate list (SPEC_FULL §4.11,
/// AS3), grounded in the teacher's `PipelineSummary`.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub nodes_visited: usize,
    pub candidates_emitted: usize,
    pub candidates_rejected: usize,
    pub budget_exhausted: bool,
}

/// The result of running the extraction driver over one Source Unit.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub candidates: Vec<String>,
    pub summary: ExtractionSummary,
}

/// Extract URL/endpoint candidates from a single JavaScript source string.
pub fn extract(code: &str, config: &ExtractConfig) -> Result<ExtractionResult> {
    extract_with_context(code, config, None)
}

/// Extract, seeding/overriding the symbol table with externally supplied
/// context bindings (C8) before the driver walks the tree.
pub fn extract_with_context(
    code: &str,
    config: &ExtractConfig,
    context: Option<&Context>,
) -> Result<ExtractionResult> {
    if code.is_empty() {
        return Err(Error::EmptySource);
    }

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|_| Error::TreeSitterLanguage)?;
    let tree = parser.parse(code, None).ok_or(Error::TreeSitterParse)?;

    let context_only = context.is_some() && config.context.policy == ContextPolicy::Only;
    let skip_symbol_build =
        config.symbols.skip_symbols || code.len() > config.limits.max_file_size || context_only;
    let degraded = skip_symbol_build;

    debug!(bytes = code.len(), degraded, "extract: symbol table build");
    let policy = config.merge_policy();
    let mut table = if skip_symbol_build {
        SymbolTable::new(policy)
    } else {
        SymbolTableBuilder::new(code, policy).build(&tree)
    };

    if let Some(ctx) = context {
        ctx.apply(&mut table, config.context.policy);
    }

    let location_overrides = context.map(|c| &c.location);

    let mut driver = Driver {
        code,
        config,
        table: &table,
        location_overrides,
        nodes_visited: 0,
        budget_exhausted: false,
        candidates: Vec::new(),
        seen: std::collections::HashSet::new(),
        rejected: 0,
        degraded,
    };
    driver.walk(tree.root_node(), table.program_scope);

    let summary = ExtractionSummary {
        nodes_visited: driver.nodes_visited,
        candidates_emitted: driver.candidates.len(),
        candidates_rejected: driver.rejected,
        budget_exhausted: driver.budget_exhausted,
    };
    if summary.budget_exhausted {
        tracing::warn!(nodes = summary.nodes_visited, "extract: max-nodes budget exhausted, partial results");
    }
    info!(
        nodes_visited = summary.nodes_visited,
        emitted = summary.candidates_emitted,
        rejected = summary.candidates_rejected,
        "extract: finished"
    );

    Ok(ExtractionResult {
        candidates: driver.candidates,
        summary,
    })
}

struct Driver<'a> {
    code: &'a str,
    config: &'a ExtractConfig,
    table: &'a SymbolTable<'a>,
    location_overrides: Option<&'a crate::context::LocationOverrides>,
    nodes_visited: usize,
    budget_exhausted: bool,
    candidates: Vec<String>,
    seen: std::collections::HashSet<String>,
    rejected: usize,
    degraded: bool,
}

impl<'a> Driver<'a> {
    fn child_scope(&self, node: Node<'a>, scope: ScopeId) -> ScopeId {
        self.table
            .scope_at
            .get(&node.id())
            .copied()
            .unwrap_or(scope)
    }

    fn walk(&mut self, node: Node<'a>, scope: ScopeId) {
        self.walk_inner(node, scope, false)
    }

    /// `in_error` is true once the walk has descended into a tree-sitter
    /// `ERROR` node; its subtree is still walked (distilled-spec §7: "error
    /// nodes are walked as if their children were siblings"), but candidates
    /// found under it are only retained when `include_error_nodes` opts in.
    fn walk_inner(&mut self, node: Node<'a>, scope: ScopeId, in_error: bool) {
        if self.budget_exhausted {
            return;
        }
        self.nodes_visited += 1;
        if self.nodes_visited > self.config.limits.max_nodes {
            self.budget_exhausted = true;
            return;
        }

        let child_scope = self.child_scope(node, scope);
        let in_error = in_error || node.kind() == "ERROR";

        match node.kind() {
            "string" | "template_string" | "ternary_expression" => {
                self.evaluate_and_record(node, scope, in_error);
                // Evaluation already recursed through this subtree; don't
                // re-walk it looking for nested roots.
                return;
            }
            "binary_expression" => {
                self.evaluate_and_record(node, scope, in_error);
                // C3 only resolves `+`; anything else (`||`, `&&`, ...)
                // degrades to a placeholder there, so fall through to the
                // generic walk below to still discover string-literal
                // operands of e.g. `cond || "/fallback/path"`.
                if crate::evaluator::is_concat_binary(self.code, node) {
                    return;
                }
            }
            "call_expression" => {
                self.evaluate_and_record(node, scope, in_error);
                if let Some(arg) = sink_argument(self.code, node) {
                    self.evaluate_and_record(arg, scope, in_error);
                }
                return;
            }
            "assignment_expression" => {
                if let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    if is_sink_assignment_target(self.code, left) {
                        self.evaluate_and_record(right, scope, in_error);
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_inner(child, child_scope, in_error);
            if self.budget_exhausted {
                return;
            }
        }
    }

    fn evaluate_and_record(&mut self, node: Node<'a>, scope: ScopeId, in_error: bool) {
        if in_error && !self.config.filtering.include_error_nodes {
            return;
        }
        let mut evaluator = Evaluator::new(self.code, self.table, self.config, self.degraded);
        if let Some(overrides) = self.location_overrides {
            evaluator = evaluator.with_location_overrides(overrides);
        }
        let values = evaluator.evaluate_expression(node, scope);
        let source = source_kind(node.kind());
        for value in values {
            let templated = is_templated(&value, &self.config.output.placeholder);
            self.record(Candidate::new(value, templated, source));
        }
    }

    fn record(&mut self, candidate: Candidate) {
        let normalized = route::normalize(&candidate.text);

        if html::looks_like_html(&normalized) {
            let urls = html::extract_urls(&normalized, self.config.html.parser);
            for url in urls {
                let url_normalized = route::normalize(&url);
                self.accept_or_reject(&url_normalized, CandidateSource::HtmlEmbedded);
            }
            // The HTML container string itself is never emitted.
            return;
        }

        self.accept_or_reject(&normalized, candidate.source);
    }

    fn accept_or_reject(&mut self, text: &str, _source: CandidateSource) {
        if text.is_empty() {
            return;
        }
        if !filter::accept(text, &self.config.output.placeholder, &self.config.filtering) {
            self.rejected += 1;
            return;
        }
        if self.seen.insert(text.to_string()) {
            self.candidates.push(text.to_string());
        }
    }
}

/// True if `text` still carries an unresolved template marker: the
/// configured placeholder token, or a `{name}` substitution left by the
/// evaluator's `--include-templates` rendering.
fn is_templated(text: &str, placeholder: &str) -> bool {
    (!placeholder.is_empty() && text.contains(placeholder)) || text.contains('{') && text.contains('}')
}

fn source_kind(node_kind: &str) -> CandidateSource {
    match node_kind {
        "string" => CandidateSource::Literal,
        "template_string" => CandidateSource::Template,
        "binary_expression" => CandidateSource::Concatenation,
        "call_expression" => CandidateSource::MethodCall,
        _ => CandidateSource::Member,
    }
}

/// If `node` (a `call_expression`) is a known URL-consuming sink whose
/// return value is not itself interesting, return the argument node holding
/// the URL value.
fn sink_argument<'a>(code: &'a str, node: Node<'a>) -> Option<Node<'a>> {
    let func = node.child_by_field_name("function")?;
    let args = node.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let arg_list: Vec<Node> = args.named_children(&mut cursor).collect();

    match func.kind() {
        "identifier" => {
            let name = &code[func.byte_range()];
            if name == "fetch" {
                return arg_list.first().copied();
            }
            None
        }
        "member_expression" => {
            let object = func.child_by_field_name("object")?;
            let property = func.child_by_field_name("property")?;
            let method = &code[property.byte_range()];

            if method == "setAttribute" {
                let attr_name = arg_list.first().and_then(|n| {
                    if n.kind() == "string" {
                        Some(crate::lexical::decode_quoted(&code[n.byte_range()]))
                    } else {
                        None
                    }
                });
                if attr_name
                    .map(|a| SINK_ATTRIBUTE_NAMES.contains(&a.as_str()))
                    .unwrap_or(false)
                {
                    return arg_list.get(1).copied();
                }
                return None;
            }

            if method == "open" && object.kind() == "identifier" && &code[object.byte_range()] == "window" {
                return arg_list.first().copied();
            }

            if LOCATION_SINK_METHODS.contains(&method) && is_location_root(code, object) {
                return arg_list.first().copied();
            }

            None
        }
        _ => None,
    }
}

fn is_location_root(code: &str, node: Node) -> bool {
    match node.kind() {
        "identifier" => &code[node.byte_range()] == "location",
        "member_expression" => {
            let (Some(obj), Some(prop)) = (
                node.child_by_field_name("object"),
                node.child_by_field_name("property"),
            ) else {
                return false;
            };
            obj.kind() == "identifier"
                && &code[obj.byte_range()] == "window"
                && &code[prop.byte_range()] == "location"
        }
        _ => false,
    }
}

/// True if `left` (an assignment's LHS) names a known URL-consuming sink:
/// `window.location`/`location` itself, or a `.href`/`.src`/`.action`
/// property.
fn is_sink_assignment_target(code: &str, left: Node) -> bool {
    if is_location_root(code, left) {
        return true;
    }
    if left.kind() != "member_expression" {
        return false;
    }
    let Some(property) = left.child_by_field_name("property") else {
        return false;
    };
    SINK_ATTRIBUTE_NAMES.contains(&&code[property.byte_range()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_binary_concatenation() {
        let config = ExtractConfig::default();
        let result = extract(r#"const base="/api"; const url=base+"/users";"#, &config).unwrap();
        assert_eq!(result.candidates, vec!["/api/users".to_string()]);
    }

    #[test]
    fn non_concat_binary_still_yields_nested_string_operand() {
        let config = ExtractConfig::default();
        let result = extract(r#"const u = cond || "/fallback/path";"#, &config).unwrap();
        assert!(result.candidates.contains(&"/fallback/path".to_string()));
    }

    #[test]
    fn s2_template_with_include_templates() {
        let mut config = ExtractConfig::default();
        config.output.include_templates = true;
        let result = extract(r#"const id="123"; const u=`/users/${id}/profile`;"#, &config).unwrap();
        assert!(result.candidates.contains(&"/users/123/profile".to_string()));
        assert!(result.candidates.contains(&"/users/{id}/profile".to_string()));
        assert!(result.candidates.contains(&"/users/FUZZ/profile".to_string()));
    }

    #[test]
    fn s3_window_location_origin_default() {
        let config = ExtractConfig::default();
        let result = extract(r#"const u = window.location.origin + "/api/users";"#, &config).unwrap();
        assert_eq!(result.candidates, vec!["https://FUZZ/api/users".to_string()]);
    }

    #[test]
    fn s4_array_join() {
        let config = ExtractConfig::default();
        let result = extract(r#"const p=["/api","/v2","/users"]; const u=p.join("");"#, &config).unwrap();
        assert_eq!(result.candidates, vec!["/api/v2/users".to_string()]);
    }

    #[test]
    fn s5_replace_chain() {
        let config = ExtractConfig::default();
        let result = extract(
            r#"const t="/api/{env}/{r}"; const u=t.replace("{env}","prod").replace("{r}","users");"#,
            &config,
        )
        .unwrap();
        assert_eq!(result.candidates, vec!["/api/prod/users".to_string()]);
    }

    #[test]
    fn s6_junk_filtering() {
        let config = ExtractConfig::default();
        let result = extract(
            r#""application/json"; "https://"; "user.profile.name"; "http://www.w3.org/2000/svg"; "/api/v2/users";"#,
            &config,
        )
        .unwrap();
        assert_eq!(result.candidates, vec!["/api/v2/users".to_string()]);
    }

    #[test]
    fn s7_context_override() {
        let mut config = ExtractConfig::default();
        config.output.include_templates = true;
        config.context.policy = ContextPolicy::Override;
        let context = Context::from_pairs(["t=/api"]).unwrap();
        let result = extract_with_context(
            r#"const t="/v2"; const u=`${t}/users`;"#,
            &config,
            Some(&context),
        )
        .unwrap();
        assert_eq!(result.candidates, vec!["/api/users".to_string()]);
    }

    #[test]
    fn fetch_sink_resolves_argument() {
        let config = ExtractConfig::default();
        let result = extract(r#"const base = "/api/users"; fetch(base);"#, &config).unwrap();
        assert!(result.candidates.contains(&"/api/users".to_string()));
    }

    #[test]
    fn fetch_sink_resolves_identifier_bound_via_concatenation() {
        let config = ExtractConfig::default();
        let result = extract(
            r#"const root = "/api"; const url = root + "/users"; fetch(url);"#,
            &config,
        )
        .unwrap();
        assert!(result.candidates.contains(&"/api/users".to_string()));
    }

    #[test]
    fn set_attribute_href_sink() {
        let config = ExtractConfig::default();
        let result = extract(
            r#"const u = "/users/42"; anchor.setAttribute("href", u);"#,
            &config,
        )
        .unwrap();
        assert!(result.candidates.contains(&"/users/42".to_string()));
    }

    #[test]
    fn html_embedded_urls_are_expanded_not_the_container() {
        let config = ExtractConfig::default();
        let result = extract(
            r#"const frag = "<a href=\"/dashboard\">Go</a>";"#,
            &config,
        )
        .unwrap();
        assert!(result.candidates.contains(&"/dashboard".to_string()));
        assert!(!result.candidates.iter().any(|c| c.contains("<a")));
    }

    #[test]
    fn max_nodes_budget_terminates() {
        let mut config = ExtractConfig::default();
        config.limits.max_nodes = 3;
        let code = r#"const a="/a"; const b="/b"; const c="/c"; const d="/d";"#;
        let result = extract(code, &config).unwrap();
        assert!(result.summary.budget_exhausted);
    }

    #[test]
    fn empty_source_is_an_error() {
        let config = ExtractConfig::default();
        assert!(extract("", &config).is_err());
    }

    #[test]
    fn string_inside_error_subtree_dropped_by_default() {
        let config = ExtractConfig::default();
        // Malformed enough that tree-sitter recovers with an ERROR node
        // wrapping the literal rather than a clean expression_statement.
        let code = r#"const x = ) "/broken/path" ( ;"#;
        let result = extract(code, &config).unwrap();
        assert!(!result.candidates.contains(&"/broken/path".to_string()));
    }

    #[test]
    fn string_inside_error_subtree_kept_when_opted_in() {
        let mut config = ExtractConfig::default();
        config.filtering.include_error_nodes = true;
        let code = r#"const x = ) "/broken/path" ( ;"#;
        let result = extract(code, &config).unwrap();
        assert!(result.candidates.contains(&"/broken/path".to_string()));
    }
}
