//! Recursive-descent translation of type-expression CST nodes into
//! `TypeAnnotation`, plus a string mini-grammar for forward-reference
//! annotations (`"List[MyModel]"`).
//!
//! Both entry points enforce a nesting ceiling: the grammar allows unbounded
//! recursion, and the contract is a typed error, never a stack overflow.

use tree_sitter::Node;

use crate::ast::{children_of, node_text};
use crate::error::{Result, SchemaError};
use crate::types::TypeAnnotation;

/// Nesting ceiling for annotations (shared with the schema-type resolver).
pub const MAX_TYPE_DEPTH: usize = 32;

/// Parse a type annotation CST node into a `TypeAnnotation`.
pub fn parse_type_annotation(node: &Node, src: &[u8]) -> Result<TypeAnnotation> {
    parse_annotation_node(node, src, 0)
}

fn parse_annotation_node(node: &Node, src: &[u8], depth: usize) -> Result<TypeAnnotation> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SchemaError::NestingTooDeep {
            limit: MAX_TYPE_DEPTH,
        });
    }

    // The `type` field in tree-sitter-python wraps the actual expression.
    let node = if node.kind() == "type" {
        node.named_child(0).unwrap_or(*node)
    } else {
        *node
    };

    match node.kind() {
        "identifier" => Ok(TypeAnnotation::Simple(node_text(&node, src).to_string())),

        "none" => Ok(TypeAnnotation::Simple("None".into())),

        // `module.Type` — opaque; resolution decides what to make of it.
        "attribute" | "member_type" => Ok(TypeAnnotation::Simple(node_text(&node, src).to_string())),

        // Generic type: `Optional[str]`, `dict[str, int]`, etc. In annotation
        // position the grammar emits `generic_type` with an unnamed-field
        // `type_parameter` child holding the arguments.
        "generic_type" => {
            let named: Vec<Node> = children_of(&node)
                .into_iter()
                .filter(|c| c.is_named())
                .collect();
            let value = named
                .first()
                .ok_or_else(|| SchemaError::ParseError("generic_type has no name".into()))?;
            let outer = node_text(value, src).to_string();

            let mut args = Vec::new();
            if let Some(params) = named.iter().find(|c| c.kind() == "type_parameter") {
                for child in children_of(params) {
                    if child.is_named() {
                        args.push(parse_annotation_node(&child, src, depth + 1)?);
                    }
                }
            }

            if args.is_empty() {
                // Bare subscript like `list[]` — treat as unparameterized.
                return Ok(TypeAnnotation::Simple(outer));
            }
            Ok(TypeAnnotation::Generic(outer, args))
        }

        // Union type: `str | None`. The grammar nests left-associatively;
        // flatten (A | B) | C into [A, B, C].
        "union_type" => {
            let mut members = Vec::new();
            for child in children_of(&node) {
                if !child.is_named() {
                    continue;
                }
                match parse_annotation_node(&child, src, depth + 1)? {
                    TypeAnnotation::Union(inner) => members.extend(inner),
                    other => members.push(other),
                }
            }
            if members.is_empty() {
                return Err(SchemaError::ParseError("union_type has no members".into()));
            }
            Ok(TypeAnnotation::Union(members))
        }

        "string" | "concatenated_string" => {
            // Forward reference (`from __future__ import annotations`):
            // the string content IS the type expression.
            let text = node_text(&node, src);
            let inner = text
                .trim_start_matches(['"', '\''])
                .trim_end_matches(['"', '\'']);
            parse_type_from_string(inner, depth + 1)
        }

        other => {
            // Fallback: try the string mini-grammar on the raw text.
            let text = node_text(&node, src);
            parse_type_from_string(text, depth + 1).map_err(|e| match e {
                SchemaError::NestingTooDeep { .. } => e,
                _ => SchemaError::UnsupportedType(format!("{other}: {text}")),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// String mini-grammar
// ---------------------------------------------------------------------------

/// Parse a type expression from its textual form. Supports unions (`X | Y`),
/// generics (`X[Y, Z]`, comma-splitting respecting bracket nesting), dotted
/// names, and simple identifiers. Depth overflow is `NestingTooDeep`, not a
/// parse failure.
pub fn parse_type_from_string(s: &str, depth: usize) -> Result<TypeAnnotation> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SchemaError::NestingTooDeep {
            limit: MAX_TYPE_DEPTH,
        });
    }
    let s = s.trim();
    if s.is_empty() {
        return Err(unparseable(s));
    }

    // Union first — `|` binds loosest. Only split at bracket depth zero.
    let union_parts = split_top_level(s, '|').ok_or_else(|| unparseable(s))?;
    if union_parts.len() > 1 {
        let mut members = Vec::new();
        for part in union_parts {
            match parse_type_from_string(part, depth + 1)? {
                TypeAnnotation::Union(inner) => members.extend(inner),
                other => members.push(other),
            }
        }
        return Ok(TypeAnnotation::Union(members));
    }

    // Generic: `X[Y, Z]`
    if let Some(bracket_pos) = s.find('[') {
        if !s.ends_with(']') {
            return Err(unparseable(s));
        }
        let outer = s[..bracket_pos].trim();
        if !is_identifier_like(outer) {
            return Err(unparseable(s));
        }
        let inner = &s[bracket_pos + 1..s.len() - 1];
        if inner.trim().is_empty() {
            return Ok(TypeAnnotation::Simple(outer.to_string()));
        }
        let mut args = Vec::new();
        for part in split_top_level(inner, ',').ok_or_else(|| unparseable(s))? {
            args.push(parse_type_from_string(part, depth + 1)?);
        }
        return Ok(TypeAnnotation::Generic(outer.to_string(), args));
    }

    if is_identifier_like(s) {
        return Ok(TypeAnnotation::Simple(s.to_string()));
    }
    Err(unparseable(s))
}

fn unparseable(s: &str) -> SchemaError {
    SchemaError::UnsupportedType(format!("cannot parse type expression: {s}"))
}

/// Split on `sep` at bracket depth zero. Returns `None` on unbalanced brackets.
fn split_top_level(s: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

/// Identifier or dotted identifier: `str`, `MyModel`, `cog.Path`.
fn is_identifier_like(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}
