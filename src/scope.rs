//! Import and module-scope collection, plus static literal resolution.
//!
//! The module scope is the *only* mechanism for resolving identifiers used as
//! defaults or `choices=` arguments. Anything that isn't a literal or a
//! module-level literal constant is an error at the use site, never a guess.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::ast::{children_of, node_text, unwrap_expression_statement};
use crate::types::{DefaultValue, ImportContext};

/// Module-level scope: names bound to statically-resolved literal values.
pub type ModuleScope = HashMap<String, DefaultValue>;

// ---------------------------------------------------------------------------
// Import collection
// ---------------------------------------------------------------------------

/// Builtin scalar names every file gets for free, keyed as `builtins`.
const BUILTIN_NAMES: &[&str] = &["str", "int", "float", "bool", "list", "dict", "set"];

/// Walk top-level `from X import ...` statements into an `ImportContext`.
pub fn collect_imports(root: Node, src: &[u8]) -> ImportContext {
    let mut ctx = ImportContext::default();

    for child in children_of(&root) {
        if child.kind() == "import_from_statement" {
            collect_import_from(&child, src, &mut ctx);
        }
    }

    // Seed builtins so the resolver treats them uniformly with imported names.
    for builtin in BUILTIN_NAMES {
        ctx.names
            .entry((*builtin).to_string())
            .or_insert_with(|| ("builtins".to_string(), (*builtin).to_string()));
    }
    ctx.names
        .entry("None".to_string())
        .or_insert_with(|| ("builtins".to_string(), "None".to_string()));

    ctx
}

fn collect_import_from(node: &Node, src: &[u8], ctx: &mut ImportContext) {
    let module_node = match node.child_by_field_name("module_name") {
        Some(n) => n,
        None => return,
    };
    let module = node_text(&module_node, src).to_string();

    for child in children_of(node) {
        match child.kind() {
            // `from X import name` without parens — skip the module name itself
            "dotted_name" if child.start_byte() != module_node.start_byte() => {
                let name = node_text(&child, src).to_string();
                ctx.names.insert(name.clone(), (module.clone(), name));
            }
            "aliased_import" => {
                register_aliased_import(&child, src, &module, ctx);
            }
            "import_list" => {
                for item in children_of(&child) {
                    match item.kind() {
                        "dotted_name" => {
                            let name = node_text(&item, src).to_string();
                            ctx.names.insert(name.clone(), (module.clone(), name));
                        }
                        "aliased_import" => {
                            register_aliased_import(&item, src, &module, ctx);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn register_aliased_import(node: &Node, src: &[u8], module: &str, ctx: &mut ImportContext) {
    let orig = node
        .child_by_field_name("name")
        .map(|n| node_text(&n, src).to_string())
        .unwrap_or_default();
    let alias = node
        .child_by_field_name("alias")
        .map(|n| node_text(&n, src).to_string())
        .unwrap_or_else(|| orig.clone());
    ctx.names.insert(alias, (module.to_string(), orig));
}

// ---------------------------------------------------------------------------
// Module-scope collection
// ---------------------------------------------------------------------------

/// Collect top-level `NAME = <literal>` assignments. The left side must be a
/// bare identifier; the right side must parse as a literal (including literal
/// collections). Everything else is ignored here and fails at the use site.
pub fn collect_module_scope(root: Node, src: &[u8]) -> ModuleScope {
    let mut scope = ModuleScope::new();

    for child in children_of(&root) {
        let assign = match unwrap_expression_statement(&child) {
            Some(n) if n.kind() == "assignment" => n,
            _ => continue,
        };

        let left = match assign.child_by_field_name("left") {
            Some(n) if n.kind() == "identifier" => node_text(&n, src).to_string(),
            _ => continue,
        };

        if let Some(right) = assign.child_by_field_name("right")
            && let Some(val) = parse_literal(&right, src)
        {
            scope.insert(left, val);
        }
    }
    scope
}

// ---------------------------------------------------------------------------
// Literal parsing
// ---------------------------------------------------------------------------

/// Parse a literal expression node into a `DefaultValue`. Returns `None` for
/// anything that isn't statically a literal.
pub fn parse_literal(node: &Node, src: &[u8]) -> Option<DefaultValue> {
    match node.kind() {
        "none" => Some(DefaultValue::None),
        "true" => Some(DefaultValue::Bool(true)),
        "false" => Some(DefaultValue::Bool(false)),
        "integer" => node_text(node, src).parse::<i64>().ok().map(DefaultValue::Integer),
        "float" => node_text(node, src).parse::<f64>().ok().map(DefaultValue::Float),
        "string" | "concatenated_string" => {
            parse_string_literal(node, src).map(DefaultValue::String)
        }
        "list" => parse_sequence_items(node, src).map(DefaultValue::List),
        "set" => parse_sequence_items(node, src).map(DefaultValue::Set),
        // Tuples are lists for JSON purposes.
        "tuple" => parse_sequence_items(node, src).map(DefaultValue::List),
        "dictionary" => {
            let mut pairs = Vec::new();
            for child in children_of(node) {
                if child.kind() == "pair" {
                    let key = child
                        .child_by_field_name("key")
                        .and_then(|k| parse_literal(&k, src));
                    let value = child
                        .child_by_field_name("value")
                        .and_then(|v| parse_literal(&v, src));
                    match (key, value) {
                        (Some(k), Some(v)) => pairs.push((k, v)),
                        _ => return None,
                    }
                }
            }
            Some(DefaultValue::Dict(pairs))
        }
        // Negative numbers: `-1`, `-3.14`
        "unary_operator" => {
            let text = node_text(node, src).trim().to_string();
            if let Ok(n) = text.parse::<i64>() {
                Some(DefaultValue::Integer(n))
            } else if let Ok(f) = text.parse::<f64>() {
                Some(DefaultValue::Float(f))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_sequence_items(node: &Node, src: &[u8]) -> Option<Vec<DefaultValue>> {
    let mut items = Vec::new();
    for child in children_of(node) {
        if child.is_named() {
            match parse_literal(&child, src) {
                Some(val) => items.push(val),
                // A non-literal element (comprehension, call) poisons the whole thing.
                None => return None,
            }
        }
    }
    Some(items)
}

/// Parse a literal list node specifically. Used for `choices=[...]`.
pub fn parse_list_literal(node: &Node, src: &[u8]) -> Option<Vec<DefaultValue>> {
    if node.kind() != "list" {
        return None;
    }
    parse_sequence_items(node, src)
}

pub fn parse_string_literal(node: &Node, src: &[u8]) -> Option<String> {
    if !matches!(node.kind(), "string" | "concatenated_string") {
        return None;
    }
    let text = node_text(node, src);
    // Raw strings keep their backslashes verbatim.
    if let Some(rest) = text.strip_prefix('r').or_else(|| text.strip_prefix('R')) {
        return strip_quotes(rest).map(str::to_string);
    }
    strip_quotes(text).map(decode_escapes)
}

fn strip_quotes(text: &str) -> Option<&str> {
    // "...", '...', """...""", '''...'''
    if (text.starts_with("\"\"\"") && text.ends_with("\"\"\"") && text.len() >= 6)
        || (text.starts_with("'''") && text.ends_with("'''") && text.len() >= 6)
    {
        Some(&text[3..text.len() - 3])
    } else if (text.starts_with('"') || text.starts_with('\'')) && text.len() >= 2 {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Decode the common backslash escapes. Unrecognized sequences pass through
/// verbatim, backslash included.
fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn parse_number_literal(node: &Node, src: &[u8]) -> Option<f64> {
    node_text(node, src).trim().parse::<f64>().ok()
}

pub fn parse_bool_literal(node: &Node, src: &[u8]) -> Option<bool> {
    match node.kind() {
        "true" => Some(true),
        "false" => Some(false),
        _ => match node_text(node, src) {
            "True" => Some(true),
            "False" => Some(false),
            _ => None,
        },
    }
}

// ---------------------------------------------------------------------------
// Static expression resolution against the module scope
// ---------------------------------------------------------------------------

/// Resolve a default-value expression: a literal, or an identifier bound to a
/// module-level literal constant. `None` means "not statically resolvable" —
/// the caller decides whether that is a hard error.
pub fn resolve_default_expr(node: &Node, src: &[u8], scope: &ModuleScope) -> Option<DefaultValue> {
    if let Some(val) = parse_literal(node, src) {
        return Some(val);
    }
    if node.kind() == "identifier" {
        return scope.get(node_text(node, src)).cloned();
    }
    None
}

/// Statically resolve a `choices=` expression. Supported shapes, in priority
/// order:
///   - literal list:    `choices=["a", "b"]`
///   - scope lookup:    `choices=MY_LIST`
///   - dict keys call:  `choices=list(D.keys())`
///   - dict values call:`choices=list(D.values())`
///   - concatenation:   `choices=<resolvable> + <resolvable>` (recursive)
pub fn resolve_choices_expr(
    node: &Node,
    src: &[u8],
    scope: &ModuleScope,
) -> Option<Vec<DefaultValue>> {
    match node.kind() {
        "list" => parse_list_literal(node, src),

        "identifier" => match scope.get(node_text(node, src))? {
            DefaultValue::List(items) => Some(items.clone()),
            // A dict or string constant isn't a valid choices list.
            _ => None,
        },

        "call" => resolve_choices_call(node, src, scope),

        "binary_operator" => {
            // Only `+` concatenation; the operator is an anonymous child.
            children_of(node).iter().find(|c| c.kind() == "+")?;
            let left = node.child_by_field_name("left")?;
            let right = node.child_by_field_name("right")?;
            let mut result = resolve_choices_expr(&left, src, scope)?;
            result.extend(resolve_choices_expr(&right, src, scope)?);
            Some(result)
        }

        _ => None,
    }
}

/// Resolve `list(X.keys())` or `list(X.values())` against the module scope.
fn resolve_choices_call(node: &Node, src: &[u8], scope: &ModuleScope) -> Option<Vec<DefaultValue>> {
    let func = node.child_by_field_name("function")?;
    if node_text(&func, src) != "list" {
        return None;
    }

    let args = node.child_by_field_name("arguments")?;
    let arg = children_of(&args).into_iter().find(|c| c.is_named())?;

    // The argument must be `X.keys()` / `X.values()` on a scope dict.
    if arg.kind() != "call" {
        return None;
    }
    let inner_func = arg.child_by_field_name("function")?;
    if inner_func.kind() != "attribute" {
        return None;
    }
    let obj = inner_func.child_by_field_name("object")?;
    let attr = inner_func.child_by_field_name("attribute")?;
    if obj.kind() != "identifier" {
        return None;
    }

    match (scope.get(node_text(&obj, src))?, node_text(&attr, src)) {
        (DefaultValue::Dict(pairs), "keys") => Some(pairs.iter().map(|(k, _)| k.clone()).collect()),
        (DefaultValue::Dict(pairs), "values") => {
            Some(pairs.iter().map(|(_, v)| v.clone()).collect())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_python;

    fn with_root<T>(source: &str, f: impl FnOnce(Node, &[u8]) -> T) -> T {
        let tree = parse_python(source).unwrap();
        f(tree.root_node(), source.as_bytes())
    }

    #[test]
    fn imports_with_aliases_and_lists() {
        let src = "from cog import BasePredictor, Input, Path as CogPath\nfrom typing import Optional\n";
        with_root(src, |root, bytes| {
            let ctx = collect_imports(root, bytes);
            assert_eq!(
                ctx.names.get("Input"),
                Some(&("cog".to_string(), "Input".to_string()))
            );
            assert_eq!(
                ctx.names.get("CogPath"),
                Some(&("cog".to_string(), "Path".to_string()))
            );
            assert_eq!(
                ctx.names.get("Optional"),
                Some(&("typing".to_string(), "Optional".to_string()))
            );
            // builtins seeded
            assert_eq!(
                ctx.names.get("str"),
                Some(&("builtins".to_string(), "str".to_string()))
            );
            assert!(ctx.names.contains_key("None"));
        });
    }

    #[test]
    fn module_scope_collects_literals_only() {
        let src = r#"
A = ["x", "y"]
B = {"k": 1}
C = compute()
D = -4
"#;
        with_root(src, |root, bytes| {
            let scope = collect_module_scope(root, bytes);
            assert_eq!(
                scope.get("A"),
                Some(&DefaultValue::List(vec![
                    DefaultValue::String("x".into()),
                    DefaultValue::String("y".into()),
                ]))
            );
            assert!(matches!(scope.get("B"), Some(DefaultValue::Dict(_))));
            assert!(scope.get("C").is_none());
            assert_eq!(scope.get("D"), Some(&DefaultValue::Integer(-4)));
        });
    }

    #[test]
    fn choices_list_of_dict_keys() {
        let src = r#"
RATIOS = {"1:1": (1, 1), "16:9": (16, 9)}
x = list(RATIOS.keys())
"#;
        with_root(src, |root, bytes| {
            let scope = collect_module_scope(root, bytes);
            // Find the `list(RATIOS.keys())` call node: second assignment's RHS.
            let assign = root.named_child(1).unwrap().named_child(0).unwrap();
            let rhs = assign.child_by_field_name("right").unwrap();
            let choices = resolve_choices_expr(&rhs, bytes, &scope).unwrap();
            assert_eq!(
                choices,
                vec![
                    DefaultValue::String("1:1".into()),
                    DefaultValue::String("16:9".into())
                ]
            );
        });
    }

    #[test]
    fn choices_comprehension_unresolvable() {
        let src = "x = [f\"{i}\" for i in range(3)]\n";
        with_root(src, |root, bytes| {
            let scope = ModuleScope::new();
            let assign = root.named_child(0).unwrap().named_child(0).unwrap();
            let rhs = assign.child_by_field_name("right").unwrap();
            assert!(resolve_choices_expr(&rhs, bytes, &scope).is_none());
        });
    }

    #[test]
    fn escape_sequences_decoded() {
        let src = r#"
a = "line1\nline2"
b = "tab\there"
c = "back\\slash"
d = r"raw\nstays"
e = "unknown\qkept"
"#;
        with_root(src, |root, bytes| {
            let scope = collect_module_scope(root, bytes);
            assert_eq!(
                scope.get("a"),
                Some(&DefaultValue::String("line1\nline2".into()))
            );
            assert_eq!(
                scope.get("b"),
                Some(&DefaultValue::String("tab\there".into()))
            );
            assert_eq!(
                scope.get("c"),
                Some(&DefaultValue::String("back\\slash".into()))
            );
            assert_eq!(
                scope.get("d"),
                Some(&DefaultValue::String("raw\\nstays".into()))
            );
            assert_eq!(
                scope.get("e"),
                Some(&DefaultValue::String("unknown\\qkept".into()))
            );
        });
    }

    #[test]
    fn triple_quoted_strings() {
        let src = "x = \"\"\"multi\nline\"\"\"\n";
        with_root(src, |root, bytes| {
            let scope = collect_module_scope(root, bytes);
            assert_eq!(
                scope.get("x"),
                Some(&DefaultValue::String("multi\nline".into()))
            );
        });
    }
}
