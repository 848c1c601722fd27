//! Thin helpers over the tree-sitter CST. No semantic logic lives here.
//!
//! Contract: these never panic — a missing field or an out-of-range child is
//! an absent value, and unreadable text slices degrade to "".

use tree_sitter::{Node, Parser, Tree};

use crate::error::{Result, SchemaError};

/// Parse Python source into a tree-sitter tree.
pub fn parse_python(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SchemaError::ParseError(format!("failed to set language: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| SchemaError::ParseError("tree-sitter parse returned None".into()))
}

/// Exact source slice for a node.
pub fn node_text<'a>(node: &Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// All children of a node, collected (avoids threading cursors everywhere).
pub fn children_of<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// First child of the given kind, if any.
pub fn child_of_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// Unwrap `decorated_definition` nodes to the inner class/function definition.
/// A plain definition passes through; anything else is `None`.
pub fn unwrap_decorated<'a>(node: &Node<'a>, inner_kind: &str) -> Option<Node<'a>> {
    match node.kind() {
        k if k == inner_kind => Some(*node),
        "decorated_definition" => child_of_kind(node, inner_kind),
        _ => None,
    }
}

/// The sole named child of an `expression_statement`, or the node itself.
/// Top-level statements wrap their expression; this normalizes both shapes.
pub fn unwrap_expression_statement<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    if node.kind() == "expression_statement" {
        if node.named_child_count() == 1 {
            node.named_child(0)
        } else {
            None
        }
    } else {
        Some(*node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_slice() {
        let src = "x = 1\n";
        let tree = parse_python(src).unwrap();
        let root = tree.root_node();
        assert_eq!(root.kind(), "module");
        let stmt = root.named_child(0).unwrap();
        assert_eq!(node_text(&stmt, src.as_bytes()), "x = 1");
    }

    #[test]
    fn unwrap_decorated_class() {
        let src = "@dataclass\nclass Foo:\n    pass\n";
        let tree = parse_python(src).unwrap();
        let root = tree.root_node();
        let top = root.named_child(0).unwrap();
        assert_eq!(top.kind(), "decorated_definition");
        let class = unwrap_decorated(&top, "class_definition").unwrap();
        assert_eq!(class.kind(), "class_definition");
    }

    #[test]
    fn missing_child_is_none() {
        let src = "x = 1\n";
        let tree = parse_python(src).unwrap();
        let root = tree.root_node();
        assert!(child_of_kind(&root, "class_definition").is_none());
        assert!(root.child_by_field_name("nonexistent").is_none());
    }
}
