//! Symbol table builder (C2).
//!
//! A single AST pass records variable bindings, object-literal shapes, and
//! property mutations under lexical scopes. The scope tree is arena-indexed
//! (`ScopeId`), not built from owned parent/child references, per the design
//! note against cyclic owned references.

use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use crate::config::MergePolicy;
use crate::lexical;

/// Sentinel key under which a computed property that does not resolve to a
/// literal string is recorded in an [`ObjectShape`].
pub const UNRESOLVED_KEY: &str = "\0unresolved\0";

/// An arena index into a [`ScopeArena`]. Stable for the life of a
/// [`SymbolTable`]; never reused or mutated once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// An ordered, deduplicated set of string values a symbol/expression may take.
pub type StringSet = Vec<String>;

pub fn singleton(s: impl Into<String>) -> StringSet {
    vec![s.into()]
}

/// Push `value` onto `set` unless it is already present.
pub fn push_unique(set: &mut StringSet, value: String) {
    if !set.contains(&value) {
        set.push(value);
    }
}

/// Cartesian-combine two sets with `f`, deduplicating the result. Callers are
/// responsible for applying the fan-out cap to the result.
pub fn cartesian(a: &StringSet, b: &StringSet, mut f: impl FnMut(&str, &str) -> String) -> StringSet {
    let mut out = Vec::with_capacity(a.len().saturating_mul(b.len()));
    for x in a {
        for y in b {
            push_unique(&mut out, f(x, y));
        }
    }
    out
}

/// A statically tracked object literal's shape: property name -> value.
#[derive(Debug, Clone, Default)]
pub struct ObjectShape {
    pub props: HashMap<String, ShapeValue>,
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: String, value: ShapeValue) {
        self.props.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&ShapeValue> {
        self.props.get(key)
    }
}

/// A single property's value inside an [`ObjectShape`]: a tagged variant, not
/// subclassing, per the design note.
#[derive(Debug, Clone)]
pub enum ShapeValue {
    Str(StringSet),
    Nested(ObjectShape),
    Unresolved,
}

/// A symbol's value is one of three kinds, mutually exclusive.
#[derive(Debug, Clone)]
pub enum SymbolValue {
    Strings(StringSet),
    Shape(ObjectShape),
    Unresolved,
}

impl SymbolValue {
    pub fn as_strings(&self) -> Option<&StringSet> {
        match self {
            SymbolValue::Strings(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&ObjectShape> {
        match self {
            SymbolValue::Shape(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    pub name: String,
    pub scope_id: ScopeId,
    pub value: SymbolValue,
    /// For the alias policy (§4.2): when this symbol was declared as a bare
    /// alias of another identifier (`x = y`), the aliased name.
    pub alias_of: Option<String>,
    /// Set by the context injector (C8) under `override`/`only` policy: a
    /// pinned symbol's value was supplied deliberately by the caller, so the
    /// template-literal augmentation in C3 (emitting `{name}`/placeholder
    /// forms alongside the resolved value) is skipped for it — the operator
    /// already resolved the ambiguity by supplying context.
    pub pinned: bool,
    /// The initializer/RHS expression node, kept so a symbol whose value
    /// couldn't be captured directly at declaration time (distilled-spec
    /// §4.2: "evaluation may be deferred until C3 asks") — e.g. `const url =
    /// base + "/users"` — can still be resolved lazily when C3 looks the
    /// name up, rather than only when it is evaluated at its declaration
    /// site.
    pub init: Option<Node<'a>>,
}

#[derive(Debug, Default)]
struct ScopeNode<'a> {
    parent: Option<ScopeId>,
    bindings: HashMap<String, Symbol<'a>>,
}

/// Arena of lexical scopes, parent-pointer style.
#[derive(Debug, Default)]
pub struct ScopeArena<'a> {
    scopes: Vec<ScopeNode<'a>>,
}

impl<'a> ScopeArena<'a> {
    pub fn new_root() -> (Self, ScopeId) {
        let mut arena = ScopeArena { scopes: Vec::new() };
        let root = arena.push(None);
        (arena, root)
    }

    pub fn new_child(&mut self, parent: ScopeId) -> ScopeId {
        self.push(Some(parent))
    }

    fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(ScopeNode {
            parent,
            bindings: HashMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    fn node(&self, id: ScopeId) -> &ScopeNode<'a> {
        &self.scopes[id.0]
    }

    fn node_mut(&mut self, id: ScopeId) -> &mut ScopeNode<'a> {
        &mut self.scopes[id.0]
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.node(id).parent
    }
}

/// The symbol table built by C2: a scope arena plus per-scope bindings.
pub struct SymbolTable<'a> {
    pub arena: ScopeArena<'a>,
    pub program_scope: ScopeId,
    pub policy: MergePolicy,
    /// Maps a scope-creating tree-sitter node's id to the child `ScopeId`
    /// created for it during the C2 pass. The extraction driver's (C7)
    /// second pass over the same tree uses this to recover the exact scope
    /// a given node was bound under, instead of re-deriving scope ids from
    /// a second independent walk.
    pub scope_at: HashMap<usize, ScopeId>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(policy: MergePolicy) -> Self {
        let (arena, program_scope) = ScopeArena::new_root();
        Self {
            arena,
            program_scope,
            policy,
            scope_at: HashMap::new(),
        }
    }

    /// Declare a new binding (`let`/`const`/`var`/function param/name) in
    /// `scope`. Re-declaration in the same scope merges or overrides the
    /// previous value according to `policy`, matching plain assignment rules.
    pub fn declare(&mut self, scope: ScopeId, name: &str, value: SymbolValue, alias_of: Option<String>) {
        self.upsert(scope, name, value, alias_of, None);
    }

    /// Like [`declare`](Self::declare), additionally recording the
    /// initializer node so an `Unresolved` value can be evaluated lazily by
    /// C3 on lookup instead of only at its declaration site.
    pub fn declare_with_init(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: SymbolValue,
        alias_of: Option<String>,
        init: Option<Node<'a>>,
    ) {
        self.upsert(scope, name, value, alias_of, init);
    }

    /// Assign to an existing binding, or, if none is visible, declare one in
    /// `scope` (JavaScript's implicit-global semantics for undeclared
    /// assignment are out of scope; we simply bind locally).
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: SymbolValue) {
        self.assign_with_init(scope, name, value, None, None)
    }

    pub fn assign_with_init(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: SymbolValue,
        alias_of: Option<String>,
        init: Option<Node<'a>>,
    ) {
        if let Some(owner) = self.find_owning_scope(scope, name) {
            self.upsert(owner, name, value, alias_of, init);
        } else {
            self.upsert(scope, name, value, alias_of, init);
        }
    }

    fn upsert(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: SymbolValue,
        alias_of: Option<String>,
        init: Option<Node<'a>>,
    ) {
        let node = self.arena.node_mut(scope);
        match node.bindings.get_mut(name) {
            Some(existing) => {
                existing.alias_of = alias_of.or_else(|| existing.alias_of.clone());
                if init.is_some() {
                    existing.init = init;
                }
                match (&mut existing.value, value) {
                    (SymbolValue::Strings(old), SymbolValue::Strings(new)) => {
                        match self.policy {
                            MergePolicy::Merge => {
                                for v in new {
                                    push_unique(old, v);
                                }
                            }
                            MergePolicy::Override => {
                                *old = new;
                            }
                        }
                    }
                    (slot, new) => *slot = new,
                }
            }
            None => {
                node.bindings.insert(
                    name.to_string(),
                    Symbol {
                        name: name.to_string(),
                        scope_id: scope,
                        value,
                        alias_of,
                        pinned: false,
                        init,
                    },
                );
            }
        }
    }

    /// Mutate an object symbol's shape, creating the symbol if absent.
    pub fn set_property(&mut self, scope: ScopeId, object_name: &str, key: String, value: ShapeValue) {
        let owner = self
            .find_owning_scope(scope, object_name)
            .unwrap_or(scope);
        let node = self.arena.node_mut(owner);
        let symbol = node
            .bindings
            .entry(object_name.to_string())
            .or_insert_with(|| Symbol {
                name: object_name.to_string(),
                scope_id: owner,
                value: SymbolValue::Shape(ObjectShape::new()),
                alias_of: None,
                pinned: false,
                init: None,
            });
        match &mut symbol.value {
            SymbolValue::Shape(shape) => shape.set(key, value),
            other => {
                let mut shape = ObjectShape::new();
                shape.set(key, value);
                *other = SymbolValue::Shape(shape);
            }
        }
    }

    fn find_owning_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if self.arena.node(id).bindings.contains_key(name) {
                return Some(id);
            }
            cur = self.arena.parent(id);
        }
        None
    }

    /// Look up `name` starting at `scope`, walking the parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol<'a>> {
        let owner = self.find_owning_scope(scope, name)?;
        self.arena.node(owner).bindings.get(name)
    }

    /// Replace `name`'s value set entirely in the program scope and mark it
    /// pinned. Used by the context injector (C8) under `override`/`only`.
    pub fn pin_override(&mut self, name: &str, value: StringSet) {
        let scope = self.program_scope;
        self.arena.node_mut(scope).bindings.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                scope_id: scope,
                value: SymbolValue::Strings(value),
                alias_of: None,
                pinned: true,
                init: None,
            },
        );
    }

    /// Add `value` alongside any existing file-derived value set for `name`,
    /// without marking it pinned (file-derived values still apply; used by
    /// the context injector under `merge`).
    pub fn pin_merge(&mut self, name: &str, value: StringSet) {
        let scope = self.program_scope;
        self.upsert(scope, name, SymbolValue::Strings(value), None, None);
    }
}

/// Node kinds that introduce a new lexical scope (distilled-spec §3,
/// "Scope"): function bodies, arrow functions, blocks, and `catch` clauses.
/// Shared with the extraction driver (C7) so its second pass recovers the
/// same scope boundaries C2 did.
pub fn creates_scope(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function"
            | "function_declaration"
            | "function_expression"
            | "function"
            | "method_definition"
            | "statement_block"
            | "catch_clause"
    )
}

/// Walks the tree once, populating a [`SymbolTable`]. See distilled-spec
/// §4.2 for the exact binding rules.
pub struct SymbolTableBuilder<'a> {
    code: &'a str,
    table: SymbolTable<'a>,
}

impl<'a> SymbolTableBuilder<'a> {
    pub fn new(code: &'a str, policy: MergePolicy) -> Self {
        Self {
            code,
            table: SymbolTable::new(policy),
        }
    }

    pub fn build(mut self, tree: &'a Tree) -> SymbolTable<'a> {
        let root_scope = self.table.program_scope;
        self.walk(tree.root_node(), root_scope);
        self.table
    }

    fn text(&self, node: Node) -> &'a str {
        &self.code[node.byte_range()]
    }

    fn walk(&mut self, node: Node<'a>, scope: ScopeId) {
        let mut child_scope = scope;
        if creates_scope(node.kind()) {
            child_scope = self.table.arena.new_child(scope);
            self.table.scope_at.insert(node.id(), child_scope);
        }

        match node.kind() {
            "variable_declarator" => self.handle_declarator(node, scope),
            "assignment_expression" => self.handle_assignment(node, scope),
            "object" => {
                // Object literal shapes are built lazily by the evaluator
                // when the declarator/assignment handler above asks for
                // them; nothing to do on a bare visit.
            }
            "function_declaration" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = self.text(name_node).to_string();
                    self.table
                        .declare(scope, &name, SymbolValue::Unresolved, None);
                }
            }
            "formal_parameters" => {
                let mut cursor = node.walk();
                for param in node.named_children(&mut cursor) {
                    if param.kind() == "identifier" {
                        let name = self.text(param).to_string();
                        self.table
                            .declare(child_scope, &name, SymbolValue::Unresolved, None);
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, child_scope);
        }
    }

    fn handle_declarator(&mut self, node: Node<'a>, scope: ScopeId) {
        let (Some(name_node), Some(value_node)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("value"),
        ) else {
            if let Some(name_node) = node.child_by_field_name("name") {
                if name_node.kind() == "identifier" {
                    let name = self.text(name_node).to_string();
                    self.table
                        .declare(scope, &name, SymbolValue::Unresolved, None);
                }
            }
            return;
        };
        if name_node.kind() != "identifier" {
            return;
        }
        let name = self.text(name_node).to_string();
        let (value, alias_of) = self.literal_seed(value_node, scope);
        let init = matches!(value, SymbolValue::Unresolved).then_some(value_node);
        self.table
            .declare_with_init(scope, &name, value, alias_of, init);
    }

    fn handle_assignment(&mut self, node: Node<'a>, scope: ScopeId) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };

        match left.kind() {
            "identifier" => {
                let name = self.text(left).to_string();
                let (value, alias_of) = self.literal_seed(right, scope);
                let init = matches!(value, SymbolValue::Unresolved).then_some(right);
                self.table
                    .assign_with_init(scope, &name, value, alias_of, init);
            }
            "member_expression" => {
                if let (Some(obj), Some(prop)) = (
                    left.child_by_field_name("object"),
                    left.child_by_field_name("property"),
                ) {
                    if obj.kind() == "identifier" {
                        let obj_name = self.text(obj).to_string();
                        let key = self.text(prop).to_string();
                        let shape_value = self.shape_seed(right, scope);
                        self.table.set_property(scope, &obj_name, key, shape_value);
                    }
                }
            }
            _ => {}
        }
    }

    /// Build a best-effort seed value for a declarator/assignment RHS without
    /// recursively re-implementing the evaluator: literals are captured
    /// directly, object literals become a shape, everything else is left
    /// `Unresolved` and deferred to C3, which re-evaluates the RHS node on
    /// demand via the original AST (the symbol only needs to exist so
    /// identifier lookups succeed; C3 walks expressions itself).
    fn literal_seed(&mut self, node: Node<'a>, scope: ScopeId) -> (SymbolValue, Option<String>) {
        match node.kind() {
            "string" => (
                SymbolValue::Strings(singleton(lexical::decode_quoted(self.text(node)))),
                None,
            ),
            "identifier" => (SymbolValue::Unresolved, Some(self.text(node).to_string())),
            "object" => (SymbolValue::Shape(self.build_shape(node, scope)), None),
            _ => (SymbolValue::Unresolved, None),
        }
    }

    fn shape_seed(&mut self, node: Node<'a>, scope: ScopeId) -> ShapeValue {
        match node.kind() {
            "string" => ShapeValue::Str(singleton(lexical::decode_quoted(self.text(node)))),
            "object" => ShapeValue::Nested(self.build_shape(node, scope)),
            _ => ShapeValue::Unresolved,
        }
    }

    /// Recursively construct an [`ObjectShape`] from an `object` literal
    /// node. Computed keys that reduce to a literal string are used
    /// statically; anything else lands under [`UNRESOLVED_KEY`].
    fn build_shape(&mut self, node: Node<'a>, scope: ScopeId) -> ObjectShape {
        let mut shape = ObjectShape::new();
        let mut cursor = node.walk();
        for pair in node.named_children(&mut cursor) {
            if pair.kind() != "pair" {
                continue;
            }
            let (Some(key_node), Some(value_node)) = (
                pair.child_by_field_name("key"),
                pair.child_by_field_name("value"),
            ) else {
                continue;
            };
            let key = match key_node.kind() {
                "property_identifier" | "string" | "number" => {
                    if key_node.kind() == "string" {
                        lexical::decode_quoted(self.text(key_node))
                    } else {
                        self.text(key_node).to_string()
                    }
                }
                "computed_property_name" => {
                    let mut inner = key_node.walk();
                    match key_node
                        .named_children(&mut inner)
                        .next()
                        .filter(|n| n.kind() == "string")
                    {
                        Some(lit) => lexical::decode_quoted(self.text(lit)),
                        None => UNRESOLVED_KEY.to_string(),
                    }
                }
                _ => UNRESOLVED_KEY.to_string(),
            };
            let value = self.shape_seed(value_node, scope);
            shape.set(key, value);
        }
        shape
    }
}
