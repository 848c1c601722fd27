//! The `Input()` metadata registry.
//!
//! Some projects keep reusable `Input()` definitions on a shared class:
//!
//! ```python
//! @dataclass(frozen=True)
//! class Inputs:
//!     prompt = Input(description="Prompt for generated image")
//!
//!     @staticmethod
//!     def steps_with_default(default: int) -> Input:
//!         return Input(description="Steps", ge=1, le=50, default=default)
//!
//! class Predictor(BasePredictor):
//!     def predict(self, prompt: str = Inputs.prompt,
//!                 steps: int = Inputs.steps_with_default(20)): ...
//! ```
//!
//! The registry keys each definition by `ClassName.member` and resolves
//! use-site references, with call-site arguments overriding the stored fields
//! under normal keyword-binding rules.

use indexmap::IndexMap;
use tree_sitter::Node;

use crate::ast::{children_of, node_text, unwrap_decorated, unwrap_expression_statement};
use crate::error::{Result, SchemaError};
use crate::scope::{
    ModuleScope, parse_bool_literal, parse_list_literal, parse_number_literal,
    parse_string_literal, resolve_choices_expr, resolve_default_expr,
};
use crate::types::{DefaultValue, ImportContext};

/// Statically-resolved keyword arguments of one `Input()` call.
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    pub default: Option<DefaultValue>,
    pub description: Option<String>,
    pub ge: Option<f64>,
    pub le: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub regex: Option<String>,
    pub choices: Option<Vec<DefaultValue>>,
    pub deprecated: Option<bool>,
}

/// A (static) method whose sole return statement is an `Input()` call.
#[derive(Debug)]
struct InputMethod {
    /// Ordered parameter names, excluding `self`/`cls` — positional call-site
    /// arguments bind against this list.
    param_names: Vec<String>,
    base: InputSpec,
}

/// Registry of `Input()` definitions found as class attributes and methods.
#[derive(Debug, Default)]
pub struct InputRegistry {
    attributes: IndexMap<String, InputSpec>,
    methods: IndexMap<String, InputMethod>,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Scan every top-level class for `Input()` attributes and methods.
pub fn collect_input_registry(
    root: Node,
    src: &[u8],
    imports: &ImportContext,
    scope: &ModuleScope,
) -> InputRegistry {
    let mut registry = InputRegistry::default();

    for child in children_of(&root) {
        let class_node = match unwrap_decorated(&child, "class_definition") {
            Some(c) => c,
            None => continue,
        };
        let class_name = match class_node.child_by_field_name("name") {
            Some(n) => node_text(&n, src).to_string(),
            None => continue,
        };
        let body = match class_node.child_by_field_name("body") {
            Some(b) => b,
            None => continue,
        };

        for stmt in children_of(&body) {
            let inner = match unwrap_expression_statement(&stmt) {
                Some(n) => n,
                None => continue,
            };

            // `attr = Input(...)`
            if inner.kind() == "assignment" {
                collect_attribute(&class_name, &inner, src, imports, scope, &mut registry);
            }

            // (decorated) method returning `Input(...)`
            if let Some(func) = unwrap_decorated(&inner, "function_definition") {
                collect_method(&class_name, &func, src, imports, scope, &mut registry);
            }
        }
    }

    registry
}

fn collect_attribute(
    class_name: &str,
    assignment: &Node,
    src: &[u8],
    imports: &ImportContext,
    scope: &ModuleScope,
    registry: &mut InputRegistry,
) {
    let left = match assignment.child_by_field_name("left") {
        Some(n) if n.kind() == "identifier" => node_text(&n, src).to_string(),
        _ => return,
    };
    let right = match assignment.child_by_field_name("right") {
        Some(n) => n,
        None => return,
    };
    if !is_input_call(&right, src, imports) {
        return;
    }

    let key = format!("{class_name}.{left}");
    if let Ok(spec) = parse_input_call(&right, src, &key, scope, &[]) {
        registry.attributes.insert(key, spec);
    }
}

fn collect_method(
    class_name: &str,
    func: &Node,
    src: &[u8],
    imports: &ImportContext,
    scope: &ModuleScope,
    registry: &mut InputRegistry,
) {
    let method_name = match func.child_by_field_name("name") {
        Some(n) => node_text(&n, src).to_string(),
        None => return,
    };
    let params = match func.child_by_field_name("parameters") {
        Some(p) => p,
        None => return,
    };
    let param_names = parameter_names(&params, src);

    let body = match func.child_by_field_name("body") {
        Some(b) => b,
        None => return,
    };
    let Some(input_call) = find_return_input_call(&body, src, imports) else {
        return;
    };

    let key = format!("{class_name}.{method_name}");
    // The method's own parameters act as placeholders inside its Input() call;
    // their values arrive at the call site.
    if let Ok(base) = parse_input_call(&input_call, src, &key, scope, &param_names) {
        registry.methods.insert(key, InputMethod { param_names, base });
    }
}

/// Ordered parameter names, excluding `self`/`cls`.
fn parameter_names(params: &Node, src: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for param in children_of(params) {
        let name = match param.kind() {
            "identifier" => Some(node_text(&param, src)),
            "typed_parameter" => children_of(&param)
                .into_iter()
                .find(|c| c.kind() == "identifier")
                .map(|n| node_text(&n, src)),
            "typed_default_parameter" | "default_parameter" => param
                .child_by_field_name("name")
                .map(|n| node_text(&n, src)),
            _ => None,
        };
        if let Some(name) = name
            && name != "self"
            && name != "cls"
        {
            names.push(name.to_string());
        }
    }
    names
}

/// Find a `return Input(...)` statement in a function body.
fn find_return_input_call<'a>(
    body: &Node<'a>,
    src: &[u8],
    imports: &ImportContext,
) -> Option<Node<'a>> {
    for child in children_of(body) {
        if child.kind() == "return_statement"
            && let Some(expr) = child.named_child(0)
            && is_input_call(&expr, src, imports)
        {
            return Some(expr);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Use-site resolution
// ---------------------------------------------------------------------------

impl InputRegistry {
    /// Resolve a default-value expression that references the registry:
    /// `Inputs.prompt` (attribute) or `Inputs.steps_with_default(20)` (call).
    /// Call-site positional/keyword arguments override the stored default,
    /// description, ge, and le; keyword wins on conflict. `Ok(None)` means the
    /// expression is not a registry reference; a recognized reference whose
    /// argument cannot be statically resolved is a hard error, never a guess.
    pub fn resolve_reference(
        &self,
        node: &Node,
        src: &[u8],
        scope: &ModuleScope,
        param: &str,
    ) -> Result<Option<InputSpec>> {
        match node.kind() {
            "attribute" => Ok(self.attributes.get(node_text(node, src)).cloned()),

            "call" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return Ok(None);
                };
                if func.kind() != "attribute" {
                    return Ok(None);
                }
                let Some(method) = self.methods.get(node_text(&func, src)) else {
                    return Ok(None);
                };
                let mut resolved = method.base.clone();

                // Bind call-site args: positionals in stored parameter order,
                // then keywords by name (overriding positionals).
                let Some(args) = node.child_by_field_name("arguments") else {
                    return Ok(Some(resolved));
                };
                let mut bound: IndexMap<String, Node> = IndexMap::new();
                let mut positional_idx = 0;
                for arg in children_of(&args) {
                    match arg.kind() {
                        "keyword_argument" => {
                            if let (Some(name_node), Some(val_node)) = (
                                arg.child_by_field_name("name"),
                                arg.child_by_field_name("value"),
                            ) {
                                bound.insert(node_text(&name_node, src).to_string(), val_node);
                            }
                        }
                        _ if arg.is_named() => {
                            if positional_idx < method.param_names.len() {
                                bound.insert(method.param_names[positional_idx].clone(), arg);
                                positional_idx += 1;
                            }
                        }
                        _ => {}
                    }
                }

                // The stored Input() typically uses the parameter as a
                // placeholder (`default=default`), which parses as no value;
                // the call site supplies the real one.
                for (arg_name, value_node) in &bound {
                    match arg_name.as_str() {
                        "default" => {
                            let val = resolve_default_expr(value_node, src, scope).ok_or_else(
                                || SchemaError::DefaultNotResolvable {
                                    param: param.into(),
                                    expr: node_text(value_node, src).into(),
                                },
                            )?;
                            resolved.default = Some(val);
                        }
                        "description" => {
                            let val = parse_string_literal(value_node, src).ok_or_else(|| {
                                SchemaError::InvalidConstraint {
                                    param: param.into(),
                                    reason: format!(
                                        "description must be a string literal, got `{}`",
                                        node_text(value_node, src)
                                    ),
                                }
                            })?;
                            resolved.description = Some(val);
                        }
                        "ge" => {
                            resolved.ge = Some(require_number(value_node, src, param, "ge")?);
                        }
                        "le" => {
                            resolved.le = Some(require_number(value_node, src, param, "le")?);
                        }
                        _ => {}
                    }
                }

                Ok(Some(resolved))
            }
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Input() call parsing
// ---------------------------------------------------------------------------

/// Is this node a call to the framework's `Input` constructor (directly named
/// or imported under an alias)?
pub fn is_input_call(node: &Node, src: &[u8], imports: &ImportContext) -> bool {
    if node.kind() != "call" {
        return false;
    }
    let func = match node.child_by_field_name("function") {
        Some(f) => f,
        None => return false,
    };
    let name = node_text(&func, src);
    name == "Input" || imports.is_input(name)
}

/// Parse the keyword arguments of an `Input()` call into an `InputSpec`.
/// `param_name` is for error reporting only. `placeholders` names identifiers
/// that are allowed to stand in for a call-site value (registry methods).
pub fn parse_input_call(
    node: &Node,
    src: &[u8],
    param_name: &str,
    scope: &ModuleScope,
    placeholders: &[String],
) -> Result<InputSpec> {
    let mut spec = InputSpec::default();

    let args = match node.child_by_field_name("arguments") {
        Some(a) => a,
        None => return Ok(spec),
    };

    for child in children_of(&args) {
        if child.kind() != "keyword_argument" {
            continue;
        }
        let (key_node, val_node) = match (
            child.child_by_field_name("name"),
            child.child_by_field_name("value"),
        ) {
            (Some(k), Some(v)) => (k, v),
            _ => continue,
        };

        match node_text(&key_node, src) {
            "default" => {
                if let Some(val) = resolve_default_expr(&val_node, src, scope) {
                    spec.default = Some(val);
                } else if val_node.kind() == "identifier"
                    && placeholders.iter().any(|p| p == node_text(&val_node, src))
                {
                    // Placeholder for a call-site value; the real default
                    // arrives when the reference is resolved.
                    spec.default = Some(DefaultValue::None);
                } else {
                    return Err(SchemaError::DefaultNotResolvable {
                        param: param_name.into(),
                        expr: node_text(&val_node, src).into(),
                    });
                }
            }
            "default_factory" => {
                return Err(SchemaError::DefaultFactoryNotSupported {
                    param: param_name.into(),
                });
            }
            "description" => {
                spec.description = parse_string_literal(&val_node, src);
            }
            "ge" => {
                spec.ge = Some(require_number(&val_node, src, param_name, "ge")?);
            }
            "le" => {
                spec.le = Some(require_number(&val_node, src, param_name, "le")?);
            }
            "min_length" => {
                spec.min_length =
                    Some(require_number(&val_node, src, param_name, "min_length")? as u64);
            }
            "max_length" => {
                spec.max_length =
                    Some(require_number(&val_node, src, param_name, "max_length")? as u64);
            }
            "regex" => {
                spec.regex = parse_string_literal(&val_node, src);
            }
            "choices" => {
                spec.choices = match parse_list_literal(&val_node, src) {
                    Some(items) => Some(items),
                    None => match resolve_choices_expr(&val_node, src, scope) {
                        Some(items) => Some(items),
                        None => {
                            return Err(SchemaError::ChoicesNotResolvable {
                                param: param_name.into(),
                            });
                        }
                    },
                };
            }
            "deprecated" => {
                spec.deprecated = parse_bool_literal(&val_node, src);
            }
            // Unknown keyword — ignore (forward-compatible)
            _ => {}
        }
    }

    Ok(spec)
}

fn require_number(node: &Node, src: &[u8], param: &str, key: &str) -> Result<f64> {
    parse_number_literal(node, src).ok_or_else(|| SchemaError::InvalidConstraint {
        param: param.into(),
        reason: format!("{key} must be a numeric literal, got `{}`", node_text(node, src)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_python;
    use crate::scope::{collect_imports, collect_module_scope};

    fn build_registry(source: &str) -> (InputRegistry, Vec<u8>) {
        let tree = parse_python(source).unwrap();
        let root = tree.root_node();
        let src = source.as_bytes();
        let imports = collect_imports(root, src);
        let scope = collect_module_scope(root, src);
        (
            collect_input_registry(root, src, &imports, &scope),
            src.to_vec(),
        )
    }

    #[test]
    fn collects_attribute_inputs() {
        let source = r#"
from dataclasses import dataclass
from cog import Input

@dataclass(frozen=True)
class Inputs:
    prompt = Input(description="The prompt", default="hi")
"#;
        let (registry, _) = build_registry(source);
        let spec = &registry.attributes["Inputs.prompt"];
        assert_eq!(spec.description.as_deref(), Some("The prompt"));
        assert_eq!(spec.default, Some(DefaultValue::String("hi".into())));
    }

    #[test]
    fn collects_method_with_param_names() {
        let source = r#"
from cog import Input

class Inputs:
    @staticmethod
    def steps(default: int, le: float = 50) -> Input:
        return Input(description="Steps", ge=1, default=default)
"#;
        let (registry, _) = build_registry(source);
        let method = &registry.methods["Inputs.steps"];
        assert_eq!(method.param_names, vec!["default", "le"]);
        assert_eq!(method.base.ge, Some(1.0));
        // `default=default` is a placeholder, stored as None
        assert_eq!(method.base.default, Some(DefaultValue::None));
    }

    #[test]
    fn non_numeric_constraint_is_invalid() {
        let source = r#"
from cog import Input

class Inputs:
    bad = Input(ge="low")
"#;
        let (registry, _) = build_registry(source);
        // Attribute collection drops entries whose Input() fails to parse.
        assert!(registry.attributes.get("Inputs.bad").is_none());
    }
}
