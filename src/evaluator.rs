//! Abstract evaluator (C3).
//!
//! Reduces an expression node to a set of candidate strings, using the
//! symbol table (C2) for identifier/member lookups. Bounded by a recursion
//! depth and a fan-out cap; a visited-symbol set guards against cycles
//! through aliased identifiers (`a = b; b = a`).

use std::collections::HashSet;

use tree_sitter::Node;

use crate::config::ExtractConfig;
use crate::context::LocationOverrides;
use crate::lexical;
use crate::symbols::{self, ScopeId, ShapeValue, StringSet, SymbolTable, SymbolValue};

/// Method names C3 knows how to evaluate; everything else degrades to the
/// placeholder (distilled-spec §9, "closed catalogue").
const KNOWN_METHODS: &[&str] = &["concat", "join", "replace"];

pub struct Evaluator<'a> {
    code: &'a str,
    table: &'a SymbolTable<'a>,
    config: &'a ExtractConfig,
    /// Degraded mode: C2 was skipped (oversized file or `skip-symbols`).
    /// Identifiers/members besides `window.location` resolve to placeholder.
    degraded: bool,
    visited: HashSet<(usize, &'a str)>,
    depth: usize,
    fanout_exceeded: bool,
    /// Context-injector (C8) overrides for `window.location.*`/`location.*`,
    /// consulted before the well-known-defaults table.
    location_overrides: Option<&'a LocationOverrides>,
}

/// Outcome of evaluating a single template substitution expression: its
/// resolved value set, plus whether it is eligible for the `{name}`/
/// placeholder augmentation under `--include-templates`.
struct SubstitutionEval {
    resolved: StringSet,
    templatable: bool,
    template_name: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(code: &'a str, table: &'a SymbolTable<'a>, config: &'a ExtractConfig, degraded: bool) -> Self {
        Self {
            code,
            table,
            config,
            degraded,
            visited: HashSet::new(),
            depth: 0,
            fanout_exceeded: false,
            location_overrides: None,
        }
    }

    pub fn with_location_overrides(mut self, overrides: &'a LocationOverrides) -> Self {
        self.location_overrides = Some(overrides);
        self
    }

    pub fn fanout_exceeded(&self) -> bool {
        self.fanout_exceeded
    }

    fn text(&self, node: Node) -> &'a str {
        &self.code[node.byte_range()]
    }

    fn placeholder(&self) -> StringSet {
        symbols::singleton(self.config.output.placeholder.clone())
    }

    fn cap(&mut self, set: StringSet) -> StringSet {
        if set.len() > self.config.limits.max_fanout {
            self.fanout_exceeded = true;
            self.placeholder()
        } else {
            set
        }
    }

    /// Evaluate a top-level expression node (an extraction-driver entry
    /// point). Resets recursion depth and the visited-symbol cycle guard,
    /// which are scoped to a single candidate's evaluation, not the whole
    /// evaluator's lifetime.
    pub fn evaluate_expression(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        self.depth = 0;
        self.visited.clear();
        self.evaluate(node, scope)
    }

    /// Evaluate `node` to a finite set of string values (distilled-spec
    /// §4.3's dispatch table). Never panics on unexpected shapes: anything
    /// this function doesn't recognize degrades to the placeholder.
    fn evaluate(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        self.depth += 1;
        if self.depth > self.config.limits.max_recursion_depth {
            self.depth -= 1;
            self.fanout_exceeded = true;
            return self.placeholder();
        }
        let result = self.evaluate_inner(node, scope);
        self.depth -= 1;
        result
    }

    fn evaluate_inner(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        match node.kind() {
            "string" => symbols::singleton(lexical::decode_quoted(self.text(node))),
            "template_string" => self.eval_template_string(node, scope),
            "number" | "true" | "false" => symbols::singleton(self.text(node).to_string()),
            "identifier" => self.eval_identifier(node, scope),
            "parenthesized_expression" => node
                .named_child(0)
                .map(|n| self.evaluate(n, scope))
                .unwrap_or_else(|| self.placeholder()),
            "binary_expression" => self.eval_binary(node, scope),
            "member_expression" | "subscript_expression" => self
                .eval_member_like(node, scope)
                .map(|v| self.cap(v))
                .unwrap_or_else(|| self.placeholder()),
            "call_expression" => self.eval_call(node, scope),
            "ternary_expression" => self.eval_ternary(node, scope),
            "assignment_expression" => node
                .child_by_field_name("right")
                .map(|n| self.evaluate(n, scope))
                .unwrap_or_else(|| self.placeholder()),
            "unary_expression" | "update_expression" => node
                .child_by_field_name("argument")
                .map(|n| self.evaluate(n, scope))
                .unwrap_or_else(|| self.placeholder()),
            "sequence_expression" => node
                .child_by_field_name("right")
                .or_else(|| node.named_child(node.named_child_count().saturating_sub(1)))
                .map(|n| self.evaluate(n, scope))
                .unwrap_or_else(|| self.placeholder()),
            _ => self.placeholder(),
        }
    }

    fn eval_identifier(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        if self.degraded {
            return self.placeholder();
        }
        let name = self.text(node);
        let key = (scope.0, name);
        if self.visited.contains(&key) {
            // Cyclic alias (`a = b; b = a`): break the cycle rather than
            // recursing forever.
            return self.placeholder();
        }
        self.visited.insert(key);

        let result = match self.table.lookup(scope, name) {
            Some(sym) => match &sym.value {
                SymbolValue::Strings(set) => self.cap(set.clone()),
                SymbolValue::Unresolved => {
                    if let Some(alias) = sym.alias_of.clone() {
                        if let Some(alias_sym) = self.table.lookup(scope, &alias) {
                            if let SymbolValue::Strings(set) = &alias_sym.value {
                                let set = set.clone();
                                self.visited.remove(&key);
                                return self.cap(set);
                            }
                        }
                    }
                    // Deferred evaluation (distilled-spec §4.2): the symbol
                    // was declared from an initializer C2 couldn't capture
                    // directly (e.g. a concatenation or call expression);
                    // evaluate that initializer now, on demand, instead of
                    // giving up. The visited-symbol guard above still
                    // protects against cycles through aliased identifiers.
                    if let Some(init) = sym.init {
                        let sym_scope = sym.scope_id;
                        let set = self.evaluate(init, sym_scope);
                        self.visited.remove(&key);
                        return self.cap(set);
                    }
                    self.placeholder()
                }
                SymbolValue::Shape(_) => self.placeholder(),
            },
            None => self.placeholder(),
        };
        self.visited.remove(&key);
        result
    }

    fn eval_binary(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        let op = binary_operator(self.code, node);
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return self.placeholder();
        };
        if op != "+" {
            return self.placeholder();
        }
        let l = self.evaluate(left, scope);
        let r = self.evaluate(right, scope);
        self.cap(symbols::cartesian(&l, &r, |a, b| format!("{a}{b}")))
    }

    /// `window.location`/bare `location` resolve to well-known defaults
    /// (distilled-spec §4.3); any other member/subscript chain walks the
    /// object's `ObjectShape`.
    fn eval_member_like(&mut self, node: Node<'a>, scope: ScopeId) -> Option<StringSet> {
        if let Some(v) = self.location_default(node) {
            return Some(v);
        }
        let object = node.child_by_field_name("object")?;
        let key = self.property_key(node, scope)?;

        if self.degraded {
            return Some(self.placeholder());
        }

        if object.kind() == "identifier" {
            let name = self.text(object);
            if let Some(sym) = self.table.lookup(scope, name) {
                if let SymbolValue::Shape(shape) = &sym.value {
                    return Some(self.resolve_shape_key(shape, &key));
                }
                if let SymbolValue::Strings(_) = &sym.value {
                    // Indexing a plain string value set (e.g. array literal
                    // represented as a joined string) is not modeled further.
                    return Some(self.placeholder());
                }
            }
            return Some(self.placeholder());
        }

        // Nested member chain: evaluate the object recursively as a shape is
        // not directly expressible without re-walking; fall back to
        // placeholder, consistent with the bounded-recursion design.
        let _ = self.evaluate(object, scope);
        Some(self.placeholder())
    }

    fn resolve_shape_key(&mut self, shape: &symbols::ObjectShape, key: &str) -> StringSet {
        match shape.get(key).or_else(|| shape.get(symbols::UNRESOLVED_KEY)) {
            Some(ShapeValue::Str(set)) => self.cap(set.clone()),
            Some(ShapeValue::Nested(_)) => self.placeholder(),
            Some(ShapeValue::Unresolved) | None => self.placeholder(),
        }
    }

    fn property_key(&mut self, node: Node<'a>, scope: ScopeId) -> Option<String> {
        match node.kind() {
            "member_expression" => {
                let prop = node.child_by_field_name("property")?;
                Some(self.text(prop).to_string())
            }
            "subscript_expression" => {
                let index = node.child_by_field_name("index")?;
                if index.kind() == "string" {
                    Some(lexical::decode_quoted(self.text(index)))
                } else {
                    let resolved = self.evaluate(index, scope);
                    resolved.into_iter().next()
                }
            }
            _ => None,
        }
    }

    /// Returns well-known defaults for `window.location.*` / bare
    /// `location.*` chains, per distilled-spec §4.3.
    fn location_default(&self, node: Node<'a>) -> Option<StringSet> {
        if node.kind() != "member_expression" {
            return None;
        }
        let object = node.child_by_field_name("object")?;
        let property = node.child_by_field_name("property")?;
        let prop_name = self.text(property);

        let is_location_root = match object.kind() {
            "identifier" => self.text(object) == "location",
            "member_expression" => {
                let inner_obj = object.child_by_field_name("object")?;
                let inner_prop = object.child_by_field_name("property")?;
                inner_obj.kind() == "identifier"
                    && self.text(inner_obj) == "window"
                    && self.text(inner_prop) == "location"
            }
            _ => false,
        };
        if !is_location_root {
            return None;
        }

        if let Some(overrides) = self.location_overrides {
            if let Some(v) = overrides.get(prop_name) {
                return Some(symbols::singleton(v.to_string()));
            }
        }

        let placeholder = &self.config.output.placeholder;
        let value = match prop_name {
            "origin" => format!("https://{placeholder}"),
            "host" | "hostname" => placeholder.clone(),
            "protocol" => "https:".to_string(),
            "pathname" => format!("/{placeholder}"),
            "href" => format!("https://{placeholder}/"),
            "search" | "hash" => String::new(),
            "port" => String::new(),
            _ => return None,
        };
        Some(symbols::singleton(value))
    }

    fn eval_ternary(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        let mut out = StringSet::new();
        if let Some(c) = node.child_by_field_name("consequence") {
            for v in self.evaluate(c, scope) {
                symbols::push_unique(&mut out, v);
            }
        }
        if let Some(a) = node.child_by_field_name("alternative") {
            for v in self.evaluate(a, scope) {
                symbols::push_unique(&mut out, v);
            }
        }
        self.cap(out)
    }

    fn eval_call(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        let Some(func) = node.child_by_field_name("function") else {
            return self.placeholder();
        };
        if func.kind() != "member_expression" {
            return self.placeholder();
        }
        let Some(receiver) = func.child_by_field_name("object") else {
            return self.placeholder();
        };
        let Some(method_node) = func.child_by_field_name("property") else {
            return self.placeholder();
        };
        let method = self.text(method_node);
        if !KNOWN_METHODS.contains(&method) {
            return self.placeholder();
        }

        let args: Vec<Node> = node
            .child_by_field_name("arguments")
            .map(|a| {
                let mut cursor = a.walk();
                a.named_children(&mut cursor).collect()
            })
            .unwrap_or_default();

        match method {
            "concat" => {
                let mut set = self.evaluate(receiver, scope);
                for arg in args {
                    let arg_set = self.evaluate(arg, scope);
                    set = self.cap(symbols::cartesian(&set, &arg_set, |a, b| format!("{a}{b}")));
                }
                set
            }
            "join" => self.eval_join(receiver, &args, scope),
            "replace" => self.eval_replace(receiver, &args, scope),
            _ => unreachable!(),
        }
    }

    fn eval_join(&mut self, receiver: Node<'a>, args: &[Node<'a>], scope: ScopeId) -> StringSet {
        let elements = self.array_elements(receiver, scope);
        let Some(elements) = elements else {
            return self.placeholder();
        };
        let separators = args
            .first()
            .map(|n| self.evaluate(*n, scope))
            .unwrap_or_else(|| symbols::singleton(",".to_string()));

        let mut out = StringSet::new();
        for sep in &separators {
            let mut pieces: Vec<StringSet> = Vec::with_capacity(elements.len());
            for el in &elements {
                pieces.push(match el {
                    Some(set) => set.clone(),
                    None => self.placeholder(),
                });
            }
            let joined = cartesian_join(&pieces, sep);
            for v in joined {
                symbols::push_unique(&mut out, v);
            }
        }
        self.cap(out)
    }

    /// Resolve `receiver` to its element sets if it is an array literal or a
    /// symbol bound to one; `None` if it isn't array-shaped at all (so the
    /// caller can degrade to placeholder), `Some(elements)` with per-element
    /// `None` for elements that don't resolve (substituted with placeholder
    /// in the join).
    fn array_elements(&mut self, node: Node<'a>, scope: ScopeId) -> Option<Vec<Option<StringSet>>> {
        match node.kind() {
            "array" => {
                let mut cursor = node.walk();
                let mut out = Vec::new();
                for child in node.named_children(&mut cursor) {
                    out.push(Some(self.evaluate(child, scope)));
                }
                Some(out)
            }
            "identifier" => {
                if self.degraded {
                    return None;
                }
                let name = self.text(node);
                let sym = self.table.lookup(scope, name)?;
                // Mirror eval_identifier's lazy-init resolution: a symbol
                // bound to an array literal the builder couldn't capture
                // directly still has that literal's node recorded as its
                // initializer.
                match sym.init {
                    Some(init) if init.kind() == "array" => {
                        self.array_elements(init, sym.scope_id)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn eval_replace(&mut self, receiver: Node<'a>, args: &[Node<'a>], scope: ScopeId) -> StringSet {
        let base = self.evaluate(receiver, scope);
        let (Some(pattern_node), Some(replacement_node)) = (args.first(), args.get(1)) else {
            return base;
        };

        let replacement = self.evaluate(*replacement_node, scope);

        if pattern_node.kind() == "string" {
            let pattern = lexical::decode_quoted(self.text(*pattern_node));
            let mut out = StringSet::new();
            for b in &base {
                for r in &replacement {
                    let replaced = b.replacen(&pattern, r, 1);
                    symbols::push_unique(&mut out, replaced);
                }
            }
            return self.cap(out);
        }

        if pattern_node.kind() == "regex" {
            // Open Question resolved (distilled-spec §9): replacement text
            // is always treated literally, never back-reference expanded.
            let (pattern_text, global) = regex_pattern_and_flags(self.code, *pattern_node);
            let mut out = StringSet::new();
            for b in &base {
                for r in &replacement {
                    let replaced = apply_regex_like_replace(b, &pattern_text, r, global);
                    symbols::push_unique(&mut out, replaced);
                }
            }
            return self.cap(out);
        }

        // Unresolved pattern: receiver is returned unchanged.
        base
    }

    fn eval_template_string(&mut self, node: Node<'a>, scope: ScopeId) -> StringSet {
        let mut chunks: Vec<TemplatePiece> = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "template_substitution" => {
                    let Some(expr) = child.named_child(0) else {
                        continue;
                    };
                    chunks.push(TemplatePiece::Sub(self.eval_substitution(expr, scope)));
                }
                "string_fragment" | "template_character" => {
                    chunks.push(TemplatePiece::Raw(lexical::decode_fragment(self.text(child))));
                }
                _ => {}
            }
        }

        let resolved = render_template(&chunks, TemplateRendering::Resolved);
        let mut out = resolved.clone();
        let has_templatable = chunks
            .iter()
            .any(|c| matches!(c, TemplatePiece::Sub(s) if s.templatable));
        if self.config.output.include_templates && has_templatable {
            for v in render_template(&chunks, TemplateRendering::Named) {
                symbols::push_unique(&mut out, v);
            }
            for v in render_template(&chunks, TemplateRendering::Placeholder(&self.config.output.placeholder)) {
                symbols::push_unique(&mut out, v);
            }
        }
        self.cap(out)
    }

    fn eval_substitution(&mut self, expr: Node<'a>, scope: ScopeId) -> SubstitutionEval {
        let resolved = self.evaluate(expr, scope);
        let (templatable, template_name) = self.template_identity(expr, scope);
        SubstitutionEval {
            resolved,
            templatable,
            template_name,
        }
    }

    /// Determine whether a substitution expression is eligible for the
    /// `{name}`/placeholder augmentation, and the name to render it with
    /// (preferring an alias's name over the local binding's own name unless
    /// `--skip-aliases`, per §4.2).
    fn template_identity(&self, expr: Node<'a>, scope: ScopeId) -> (bool, String) {
        match expr.kind() {
            "identifier" => {
                let name = self.text(expr).to_string();
                match self.table.lookup(scope, &name) {
                    Some(sym) if sym.pinned => (false, name),
                    Some(sym) => {
                        let rendered = if !self.config.aliasing.skip_aliases {
                            sym.alias_of.clone().unwrap_or(name)
                        } else {
                            name
                        };
                        (true, rendered)
                    }
                    None => (true, name),
                }
            }
            "member_expression" => {
                let name = expr
                    .child_by_field_name("property")
                    .map(|p| self.text(p).to_string())
                    .unwrap_or_else(|| "value".to_string());
                (true, name)
            }
            _ => (true, "value".to_string()),
        }
    }
}

enum TemplatePiece {
    Raw(String),
    Sub(SubstitutionEval),
}

enum TemplateRendering<'p> {
    Resolved,
    Named,
    Placeholder(&'p str),
}

fn render_template(chunks: &[TemplatePiece], mode: TemplateRendering) -> StringSet {
    let mut acc: StringSet = vec![String::new()];
    for piece in chunks {
        let piece_set: StringSet = match piece {
            TemplatePiece::Raw(s) => vec![s.clone()],
            TemplatePiece::Sub(sub) => match &mode {
                TemplateRendering::Resolved => sub.resolved.clone(),
                TemplateRendering::Named => {
                    if sub.templatable {
                        vec![format!("{{{}}}", sub.template_name)]
                    } else {
                        sub.resolved.clone()
                    }
                }
                TemplateRendering::Placeholder(token) => {
                    if sub.templatable {
                        vec![(*token).to_string()]
                    } else {
                        sub.resolved.clone()
                    }
                }
            },
        };
        let mut next = Vec::with_capacity(acc.len().saturating_mul(piece_set.len().max(1)));
        for prefix in &acc {
            if piece_set.is_empty() {
                next.push(prefix.clone());
                continue;
            }
            for suffix in &piece_set {
                next.push(format!("{prefix}{suffix}"));
            }
        }
        acc = next;
    }
    acc
}

fn cartesian_join(pieces: &[StringSet], sep: &str) -> StringSet {
    let mut acc: StringSet = vec![String::new()];
    for (i, piece) in pieces.iter().enumerate() {
        let mut next = Vec::new();
        for prefix in &acc {
            for v in piece {
                let joined = if i == 0 {
                    v.clone()
                } else {
                    format!("{prefix}{sep}{v}")
                };
                next.push(joined);
            }
        }
        acc = next;
    }
    acc
}

/// Whether a `binary_expression` node is the `+` operator C3 actually
/// resolves. The driver (C7) uses this to decide whether it can skip
/// re-walking the subtree's children: anything else degrades to a
/// placeholder here, so string-literal operands of e.g. `||` or `&&` still
/// need to be discovered by the generic walk.
pub(crate) fn is_concat_binary(code: &str, node: Node) -> bool {
    binary_operator(code, node) == "+"
}

fn binary_operator<'a>(code: &'a str, node: Node<'a>) -> &'a str {
    if let Some(op_node) = node.child_by_field_name("operator") {
        return &code[op_node.byte_range()];
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !child.is_named() {
            let t = &code[child.byte_range()];
            if matches!(t, "+" | "-" | "*" | "/" | "==" | "===" | "&&" | "||") {
                return t;
            }
        }
    }
    ""
}

fn regex_pattern_and_flags<'a>(code: &'a str, node: Node<'a>) -> (String, bool) {
    let raw = &code[node.byte_range()];
    let global = raw.rsplit('/').next().map(|f| f.contains('g')).unwrap_or(false);
    let pattern = raw
        .strip_prefix('/')
        .and_then(|s| s.rsplit_once('/'))
        .map(|(p, _)| p.to_string())
        .unwrap_or_else(|| raw.to_string());
    (pattern, global)
}

/// A deliberately simple regex-literal-to-literal-text replace: this crate
/// does not pull in a full regex engine for source-string replacement (the
/// `regex` dependency is used for C6 classification, not for modeling
/// runtime `String.prototype.replace`). Only an exact literal match of the
/// de-slashed pattern text is replaced; this covers the overwhelming
/// majority of route-template regexes seen in practice (`/:id/`, literal
/// braces, etc.) without pretending to be a JS regex engine.
fn apply_regex_like_replace(input: &str, pattern: &str, replacement: &str, global: bool) -> String {
    if pattern.is_empty() {
        return input.to_string();
    }
    if global {
        input.replace(pattern, replacement)
    } else {
        input.replacen(pattern, replacement, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergePolicy;
    use crate::symbols::SymbolTableBuilder;
    use tree_sitter::Parser;

    fn parse(code: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .unwrap();
        parser.parse(code, None).unwrap()
    }

    fn eval_program(code: &str, config: &ExtractConfig) -> StringSet {
        let tree = parse(code);
        let table = SymbolTableBuilder::new(code, MergePolicy::Merge).build(&tree);
        let root = tree.root_node();
        // Find the last expression statement's expression and evaluate it.
        let mut cursor = root.walk();
        let mut last_expr = None;
        for stmt in root.children(&mut cursor) {
            if stmt.kind() == "expression_statement" {
                last_expr = stmt.named_child(0);
            } else if stmt.kind() == "lexical_declaration" {
                if let Some(decl) = stmt.named_child(stmt.named_child_count().saturating_sub(1)) {
                    last_expr = decl.child_by_field_name("value");
                }
            }
        }
        let mut evaluator = Evaluator::new(code, &table, config, false);
        evaluator.evaluate_expression(last_expr.unwrap(), table.program_scope)
    }

    #[test]
    fn binary_concatenation() {
        let config = ExtractConfig::default();
        let out = eval_program(r#"const base="/api"; const url=base+"/users";"#, &config);
        assert_eq!(out, vec!["/api/users".to_string()]);
    }

    #[test]
    fn location_origin_default() {
        let config = ExtractConfig::default();
        let out = eval_program(r#"const u = window.location.origin + "/api/users";"#, &config);
        assert_eq!(out, vec!["https://FUZZ/api/users".to_string()]);
    }

    #[test]
    fn identifier_bound_to_concatenation_resolves_lazily() {
        // `url`'s initializer is a binary expression, which C2 cannot
        // capture directly; C3 must resolve it on demand when `url` is
        // looked up as a bare identifier elsewhere.
        let config = ExtractConfig::default();
        let out = eval_program(
            r#"const base="/api"; const url=base+"/users"; const again=url;"#,
            &config,
        );
        assert_eq!(out, vec!["/api/users".to_string()]);
    }
}
