//! Pipeline orchestration: one parse, one `PredictorInfo`.
//!
//! Collects imports, module-scope constants, model classes (local and, when a
//! loader is supplied, cross-file), and the Input() registry in one pass over
//! the tree, then locates the target callable and extracts its signature.

use tree_sitter::Node;

use crate::annotation::parse_type_annotation;
use crate::ast::{children_of, node_text, parse_python, unwrap_decorated};
use crate::error::{Result, SchemaError};
use crate::models::{SourceLoader, collect_model_classes, resolve_imported_models};
use crate::registry::{InputRegistry, InputSpec, collect_input_registry, is_input_call, parse_input_call};
use crate::resolve::resolve_output_type;
use crate::scope::{ModuleScope, collect_imports, collect_module_scope, resolve_default_expr};
use crate::types::{
    FieldType, ImportContext, InputField, Mode, PredictorInfo, resolve_field_type,
};

use indexmap::IndexMap;

/// Parse a Python source file and extract predictor information.
///
/// `predict_ref` is the bare class or function name. Without a loader,
/// imported output types cannot be resolved and surface as `ExternalType`.
pub fn parse_predictor(source: &str, predict_ref: &str, mode: Mode) -> Result<PredictorInfo> {
    parse_predictor_with_loader(source, predict_ref, mode, None)
}

/// As `parse_predictor`, with an optional source loader for resolving model
/// classes imported from sibling files.
pub fn parse_predictor_with_loader(
    source: &str,
    predict_ref: &str,
    mode: Mode,
    loader: Option<&dyn SourceLoader>,
) -> Result<PredictorInfo> {
    let tree = parse_python(source)?;
    let root = tree.root_node();
    let src = source.as_bytes();

    let imports = collect_imports(root, src);
    let module_scope = collect_module_scope(root, src);

    let mut models = collect_model_classes(root, src, &imports);
    if let Some(loader) = loader {
        resolve_imported_models(&imports, loader, &mut models);
    }

    let registry = collect_input_registry(root, src, &imports, &module_scope);

    let method_name = match mode {
        Mode::Predict => "predict",
        Mode::Train => "train",
    };

    let func_node = find_target_function(root, src, predict_ref, method_name)?;

    let params_node = func_node
        .child_by_field_name("parameters")
        .ok_or_else(|| SchemaError::ParseError("function has no parameters node".into()))?;
    let is_method = first_param_is_self(&params_node, src);

    let inputs = extract_inputs(
        &params_node,
        src,
        method_name,
        is_method,
        &imports,
        &registry,
        &module_scope,
    )?;

    let return_ann = func_node
        .child_by_field_name("return_type")
        .ok_or_else(|| SchemaError::MissingReturnType {
            method: method_name.into(),
        })?;
    let annotation = parse_type_annotation(&return_ann, src)?;
    let output = resolve_output_type(&annotation, &imports, &models)?;

    tracing::debug!(
        predict_ref,
        inputs = inputs.len(),
        "extracted predictor signature"
    );

    Ok(PredictorInfo {
        inputs,
        output,
        mode,
    })
}

// ---------------------------------------------------------------------------
// Target function lookup
// ---------------------------------------------------------------------------

/// Find the predict/train callable:
/// 1. a class named `predict_ref` → its `predict`/`train` method,
/// 2. a standalone function named `predict_ref` or `method_name`.
fn find_target_function<'a>(
    root: Node<'a>,
    src: &[u8],
    predict_ref: &str,
    method_name: &str,
) -> Result<Node<'a>> {
    for child in children_of(&root) {
        if let Some(class_node) = unwrap_decorated(&child, "class_definition")
            && let Some(name_node) = class_node.child_by_field_name("name")
            && node_text(&name_node, src) == predict_ref
        {
            return find_method_in_class(class_node, src, predict_ref, method_name);
        }
    }

    for child in children_of(&root) {
        if let Some(func) = unwrap_decorated(&child, "function_definition")
            && let Some(name_node) = func.child_by_field_name("name")
        {
            let name = node_text(&name_node, src);
            if name == predict_ref || name == method_name {
                return Ok(func);
            }
        }
    }

    Err(SchemaError::PredictorNotFound(predict_ref.to_string()))
}

fn find_method_in_class<'a>(
    class_node: Node<'a>,
    src: &[u8],
    class_name: &str,
    method_name: &str,
) -> Result<Node<'a>> {
    let body = class_node
        .child_by_field_name("body")
        .ok_or_else(|| SchemaError::ParseError("class has no body".into()))?;

    for child in children_of(&body) {
        if let Some(func) = unwrap_decorated(&child, "function_definition")
            && let Some(name_node) = func.child_by_field_name("name")
            && node_text(&name_node, src) == method_name
        {
            return Ok(func);
        }
    }

    Err(SchemaError::MethodNotFound(format!(
        "{class_name} (no {method_name} method)"
    )))
}

// ---------------------------------------------------------------------------
// Parameter extraction
// ---------------------------------------------------------------------------

fn first_param_is_self(params_node: &Node, src: &[u8]) -> bool {
    children_of(params_node)
        .iter()
        .find(|c| c.kind() == "identifier")
        .is_some_and(|c| node_text(c, src) == "self")
}

fn extract_inputs(
    params_node: &Node,
    src: &[u8],
    method_name: &str,
    skip_self: bool,
    imports: &ImportContext,
    registry: &InputRegistry,
    scope: &ModuleScope,
) -> Result<IndexMap<String, InputField>> {
    let mut inputs = IndexMap::new();
    let mut order: usize = 0;
    let mut seen_self = false;

    for child in children_of(params_node) {
        match child.kind() {
            "identifier" => {
                let name = node_text(&child, src);
                if skip_self && !seen_self && name == "self" {
                    seen_self = true;
                    continue;
                }
                // An untyped parameter can't be described in the schema.
                return Err(SchemaError::MissingTypeAnnotation {
                    method: method_name.into(),
                    param: name.into(),
                });
            }

            "typed_parameter" => {
                let input = parse_typed_parameter(&child, src, order, method_name, imports)?;
                inputs.insert(input.name.clone(), input);
                order += 1;
            }

            "typed_default_parameter" => {
                let input = parse_typed_default_parameter(
                    &child,
                    src,
                    order,
                    method_name,
                    imports,
                    registry,
                    scope,
                )?;
                inputs.insert(input.name.clone(), input);
                order += 1;
            }

            "default_parameter" => {
                let param = child
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, src))
                    .unwrap_or("<unknown>");
                return Err(SchemaError::MissingTypeAnnotation {
                    method: method_name.into(),
                    param: param.into(),
                });
            }

            _ => {}
        }
    }

    Ok(inputs)
}

fn bare_input_field(name: String, order: usize, field_type: FieldType) -> InputField {
    InputField {
        name,
        order,
        field_type,
        default: None,
        description: None,
        ge: None,
        le: None,
        min_length: None,
        max_length: None,
        regex: None,
        choices: None,
        deprecated: None,
    }
}

fn input_field_from_spec(
    name: String,
    order: usize,
    field_type: FieldType,
    spec: InputSpec,
) -> InputField {
    InputField {
        name,
        order,
        field_type,
        default: spec.default,
        description: spec.description,
        ge: spec.ge,
        le: spec.le,
        min_length: spec.min_length,
        max_length: spec.max_length,
        regex: spec.regex,
        choices: spec.choices,
        deprecated: spec.deprecated,
    }
}

fn parse_typed_parameter(
    node: &Node,
    src: &[u8],
    order: usize,
    method_name: &str,
    imports: &ImportContext,
) -> Result<InputField> {
    // typed_parameter: the identifier is an unnamed first child
    let name = children_of(node)
        .into_iter()
        .find(|c| c.kind() == "identifier")
        .map(|n| node_text(&n, src).to_string())
        .ok_or_else(|| SchemaError::ParseError("typed_parameter has no identifier".into()))?;

    let type_node =
        node.child_by_field_name("type")
            .ok_or_else(|| SchemaError::MissingTypeAnnotation {
                method: method_name.into(),
                param: name.clone(),
            })?;

    let annotation = parse_type_annotation(&type_node, src)?;
    let field_type = resolve_field_type(&annotation, imports)?;
    Ok(bare_input_field(name, order, field_type))
}

fn parse_typed_default_parameter(
    node: &Node,
    src: &[u8],
    order: usize,
    method_name: &str,
    imports: &ImportContext,
    registry: &InputRegistry,
    scope: &ModuleScope,
) -> Result<InputField> {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(&n, src).to_string())
        .ok_or_else(|| SchemaError::ParseError("typed_default_parameter has no name".into()))?;

    let type_node =
        node.child_by_field_name("type")
            .ok_or_else(|| SchemaError::MissingTypeAnnotation {
                method: method_name.into(),
                param: name.clone(),
            })?;

    let annotation = parse_type_annotation(&type_node, src)?;
    let field_type = resolve_field_type(&annotation, imports)?;

    let value_node = match node.child_by_field_name("value") {
        Some(v) => v,
        None => return Ok(bare_input_field(name, order, field_type)),
    };

    // 1. Direct Input() call: `param: type = Input(...)`
    if is_input_call(&value_node, src, imports) {
        let spec = parse_input_call(&value_node, src, &name, scope, &[])?;
        return Ok(input_field_from_spec(name, order, field_type, spec));
    }

    // 2. Registry reference: `param: type = Inputs.prompt` or
    //    `param: type = Inputs.steps_with_default(20)`
    if let Some(spec) = registry.resolve_reference(&value_node, src, scope, &name)? {
        return Ok(input_field_from_spec(name, order, field_type, spec));
    }

    // 3. Plain default — must be a literal or a module-level literal constant.
    match resolve_default_expr(&value_node, src, scope) {
        Some(default) => {
            let mut field = bare_input_field(name, order, field_type);
            field.default = Some(default);
            Ok(field)
        }
        None => Err(SchemaError::DefaultNotResolvable {
            param: name,
            expr: node_text(&value_node, src).to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefaultValue, PrimitiveType, Repetition, SchemaKind};

    fn parse(source: &str, predict_ref: &str) -> PredictorInfo {
        parse_predictor(source, predict_ref, Mode::Predict).unwrap()
    }

    #[test]
    fn simple_string_predictor() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s: str) -> str:
        return "hello " + s
"#;
        let info = parse(source, "Predictor");
        assert_eq!(info.inputs.len(), 1);
        let s = &info.inputs["s"];
        assert_eq!(s.field_type.primitive, PrimitiveType::String);
        assert_eq!(s.field_type.repetition, Repetition::Required);
        assert!(s.default.is_none());
        assert!(s.is_required());
        assert_eq!(
            info.output.kind,
            SchemaKind::Primitive(PrimitiveType::String)
        );
    }

    #[test]
    fn input_call_with_constraints() {
        let source = r#"
from cog import BasePredictor, Input, Path

class Predictor(BasePredictor):
    def predict(
        self,
        image: Path = Input(description="Grayscale input image"),
        scale: float = Input(description="Factor to scale image by", ge=0, le=10, default=1.5),
        token: str = Input(description="API token", min_length=8, max_length=64),
    ) -> Path:
        pass
"#;
        let info = parse(source, "Predictor");
        assert_eq!(info.inputs.len(), 3);

        let image = &info.inputs["image"];
        assert_eq!(image.field_type.primitive, PrimitiveType::Path);
        assert!(image.default.is_none());
        assert!(image.is_required());

        let scale = &info.inputs["scale"];
        assert_eq!(scale.default, Some(DefaultValue::Float(1.5)));
        assert_eq!(scale.ge, Some(0.0));
        assert_eq!(scale.le, Some(10.0));
        assert!(!scale.is_required());

        let token = &info.inputs["token"];
        assert_eq!(token.min_length, Some(8));
        assert_eq!(token.max_length, Some(64));
    }

    #[test]
    fn optional_input_union() {
        let source = r#"
from cog import BasePredictor, Input, Path

class Predictor(BasePredictor):
    def predict(
        self,
        mask: Path | None = Input(description="Optional mask", default=None),
    ) -> Path:
        pass
"#;
        let info = parse(source, "Predictor");
        let mask = &info.inputs["mask"];
        assert_eq!(mask.field_type.repetition, Repetition::Optional);
        assert_eq!(mask.field_type.primitive, PrimitiveType::Path);
        assert_eq!(mask.default, Some(DefaultValue::None));
        assert!(!mask.is_required());
    }

    #[test]
    fn typing_union_input_is_optional() {
        let source = r#"
from typing import Union
from cog import BasePredictor, Input, Path

class Predictor(BasePredictor):
    def predict(
        self,
        mask: Union[Path, None] = Input(description="Optional mask", default=None),
    ) -> Path:
        pass
"#;
        let info = parse(source, "Predictor");
        let mask = &info.inputs["mask"];
        assert_eq!(mask.field_type.repetition, Repetition::Optional);
        assert_eq!(mask.field_type.primitive, PrimitiveType::Path);
        assert!(!mask.is_required());
    }

    #[test]
    fn secret_input() {
        let source = r#"
from cog import BasePredictor, Input, Secret

class Predictor(BasePredictor):
    def predict(self, api_key: Secret = Input(description="Token")) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        assert_eq!(
            info.inputs["api_key"].field_type.primitive,
            PrimitiveType::Secret
        );
    }

    #[test]
    fn list_input_is_repeated_and_required() {
        let source = r#"
from cog import BasePredictor, Input

class Predictor(BasePredictor):
    def predict(self, paths: list[str] = Input(description="Paths")) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let paths = &info.inputs["paths"];
        assert_eq!(paths.field_type.repetition, Repetition::Repeated);
        assert_eq!(paths.field_type.primitive, PrimitiveType::String);
        assert!(paths.is_required());
    }

    #[test]
    fn input_order_is_declaration_order() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, b: str, a: int, c: float) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let orders: Vec<(String, usize)> = info
            .inputs
            .iter()
            .map(|(n, f)| (n.clone(), f.order))
            .collect();
        assert_eq!(
            orders,
            vec![("b".into(), 0), ("a".into(), 1), ("c".into(), 2)]
        );
    }

    #[test]
    fn standalone_function_predictor() {
        let source = r#"
from cog import Input

def predict(text: str = Input(default="world")) -> str:
    return f"hello {text}"
"#;
        let info = parse(source, "predict");
        assert_eq!(
            info.inputs["text"].default,
            Some(DefaultValue::String("world".into()))
        );
    }

    #[test]
    fn train_mode_finds_train() {
        let source = r#"
from cog import Input, Path

def train(n: int) -> Path:
    pass
"#;
        let info = parse_predictor(source, "train", Mode::Train).unwrap();
        assert_eq!(info.mode, Mode::Train);
        assert_eq!(info.inputs.len(), 1);
    }

    #[test]
    fn iterator_and_concat_outputs() {
        let source = r#"
from typing import Iterator
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, count: int) -> Iterator[str]:
        for i in range(count):
            yield f"chunk {i}"
"#;
        let info = parse(source, "Predictor");
        assert!(matches!(info.output.kind, SchemaKind::Iterator(_)));

        let source = r#"
from cog import BasePredictor, ConcatenateIterator

class Predictor(BasePredictor):
    def predict(self, p: str) -> ConcatenateIterator[str]:
        yield p
"#;
        let info = parse(source, "Predictor");
        assert!(matches!(info.output.kind, SchemaKind::ConcatIterator(_)));
    }

    #[test]
    fn concat_iterator_of_int_rejected() {
        let source = r#"
from cog import BasePredictor, ConcatenateIterator

class Predictor(BasePredictor):
    def predict(self, p: str) -> ConcatenateIterator[int]:
        yield 1
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::ConcatIteratorNotStr(_)));
    }

    #[test]
    fn local_model_output() {
        let source = r#"
from cog import BasePredictor, BaseModel

class Output(BaseModel):
    text: str
    count: int = 0

class Predictor(BasePredictor):
    def predict(self, s: str) -> Output:
        pass
"#;
        let info = parse(source, "Predictor");
        let SchemaKind::Object(ref fields) = info.output.kind else {
            panic!("expected Object output")
        };
        assert!(fields["text"].required);
        assert!(!fields["count"].required);
    }

    #[test]
    fn nested_output_generics() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s: str) -> dict[str, dict[str, dict[str, int]]]:
        pass
"#;
        let info = parse(source, "Predictor");
        let SchemaKind::Dict(v1) = info.output.kind else {
            panic!("expected Dict")
        };
        let SchemaKind::Dict(v2) = v1.kind else {
            panic!("expected Dict")
        };
        assert!(matches!(v2.kind, SchemaKind::Dict(_)));
    }

    #[test]
    fn missing_return_type_errors() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s: str):
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::MissingReturnType { .. }));
    }

    #[test]
    fn untyped_parameter_errors() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s) -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(
            matches!(err, SchemaError::MissingTypeAnnotation { ref param, .. } if param == "s")
        );
    }

    #[test]
    fn untyped_default_parameter_errors() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s="x") -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::MissingTypeAnnotation { .. }));
    }

    #[test]
    fn predictor_not_found() {
        let err = parse_predictor("x = 1\n", "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::PredictorNotFound(_)));
    }

    #[test]
    fn method_not_found_on_class() {
        let source = r#"
class Predictor:
    def setup(self):
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::MethodNotFound(_)));
    }

    #[test]
    fn default_factory_rejected() {
        let source = r#"
from cog import BasePredictor, Input

class Predictor(BasePredictor):
    def predict(self, items: list[str] = Input(default_factory=list)) -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::DefaultFactoryNotSupported { .. }));
    }

    #[test]
    fn optional_output_rejected() {
        let source = r#"
from typing import Optional
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, s: str) -> Optional[str]:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::OptionalOutput));
    }

    // -----------------------------------------------------------------------
    // choices= resolution
    // -----------------------------------------------------------------------

    #[test]
    fn choices_literal_list() {
        let source = r#"
from cog import BasePredictor, Input

class Predictor(BasePredictor):
    def predict(self, color: str = Input(choices=["red", "green", "blue"])) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let choices = info.inputs["color"].choices.as_ref().unwrap();
        assert_eq!(
            choices,
            &vec![
                DefaultValue::String("red".into()),
                DefaultValue::String("green".into()),
                DefaultValue::String("blue".into()),
            ]
        );
    }

    #[test]
    fn choices_module_constant_matches_literal() {
        let source = r#"
from cog import BasePredictor, Input

MY_CHOICES = ["x", "y", "z"]

class Predictor(BasePredictor):
    def predict(self, v: str = Input(choices=MY_CHOICES)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let choices = info.inputs["v"].choices.as_ref().unwrap();
        assert_eq!(
            choices,
            &vec![
                DefaultValue::String("x".into()),
                DefaultValue::String("y".into()),
                DefaultValue::String("z".into()),
            ]
        );
    }

    #[test]
    fn choices_dict_keys_and_values() {
        let source = r#"
from cog import BasePredictor, Input

ASPECT_RATIOS = {"1:1": (1024, 1024), "16:9": (1344, 768)}
LABELS = {"fast": "Fast Mode", "slow": "Slow Mode"}

class Predictor(BasePredictor):
    def predict(
        self,
        ar: str = Input(choices=list(ASPECT_RATIOS.keys()), default="1:1"),
        mode: str = Input(choices=list(LABELS.values())),
    ) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let ar = info.inputs["ar"].choices.as_ref().unwrap();
        assert_eq!(ar[0], DefaultValue::String("1:1".into()));
        assert_eq!(ar[1], DefaultValue::String("16:9".into()));
        let mode = info.inputs["mode"].choices.as_ref().unwrap();
        assert_eq!(mode[0], DefaultValue::String("Fast Mode".into()));
    }

    #[test]
    fn choices_concatenation() {
        let source = r#"
from cog import BasePredictor, Input

SIZES = {"small": 256, "large": 1024}
EXTRA = ["custom"]

class Predictor(BasePredictor):
    def predict(self, s: str = Input(choices=list(SIZES.keys()) + EXTRA)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let choices = info.inputs["s"].choices.as_ref().unwrap();
        assert_eq!(
            choices,
            &vec![
                DefaultValue::String("small".into()),
                DefaultValue::String("large".into()),
                DefaultValue::String("custom".into()),
            ]
        );
    }

    #[test]
    fn choices_unresolvable_names_the_param() {
        for bad in [
            "Input(choices=NOT_DEFINED)",
            "Input(choices=get_choices())",
            "Input(choices=[f\"{i}x\" for i in range(5)])",
        ] {
            let source = format!(
                r#"
from cog import BasePredictor, Input

class Predictor(BasePredictor):
    def predict(self, my_param: str = {bad}) -> str:
        pass
"#
            );
            let err = parse_predictor(&source, "Predictor", Mode::Predict).unwrap_err();
            assert!(
                matches!(err, SchemaError::ChoicesNotResolvable { ref param } if param == "my_param"),
                "for {bad}: got {err}"
            );
        }
    }

    // -----------------------------------------------------------------------
    // default= resolution
    // -----------------------------------------------------------------------

    #[test]
    fn default_module_constant_in_input_call() {
        let source = r#"
from cog import BasePredictor, Input

DEFAULT_STEPS = 50

class Predictor(BasePredictor):
    def predict(self, steps: int = Input(default=DEFAULT_STEPS)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        assert_eq!(
            info.inputs["steps"].default,
            Some(DefaultValue::Integer(50))
        );
    }

    #[test]
    fn plain_default_module_constant() {
        let source = r#"
from cog import BasePredictor

MY_DEFAULT = "hello"

class Predictor(BasePredictor):
    def predict(self, text: str = MY_DEFAULT) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        assert_eq!(
            info.inputs["text"].default,
            Some(DefaultValue::String("hello".into()))
        );
    }

    #[test]
    fn unresolvable_default_errors_with_expr() {
        let source = r#"
from cog import BasePredictor

class Predictor(BasePredictor):
    def predict(self, text: str = UNDEFINED_VAR) -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        match err {
            SchemaError::DefaultNotResolvable { param, expr } => {
                assert_eq!(param, "text");
                assert_eq!(expr, "UNDEFINED_VAR");
            }
            other => panic!("expected DefaultNotResolvable, got {other}"),
        }
    }

    #[test]
    fn unresolvable_default_inside_input_errors() {
        let source = r#"
from cog import BasePredictor, Input

class Predictor(BasePredictor):
    def predict(self, text: str = Input(default=compute())) -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        assert!(matches!(err, SchemaError::DefaultNotResolvable { .. }));
    }

    // -----------------------------------------------------------------------
    // Input registry
    // -----------------------------------------------------------------------

    #[test]
    fn registry_attribute_reference() {
        let source = r#"
from dataclasses import dataclass
from cog import BasePredictor, Input

RATIOS = {"1:1": (1024, 1024), "16:9": (1344, 768)}

@dataclass(frozen=True)
class Inputs:
    ar = Input(description="Aspect ratio", choices=list(RATIOS.keys()), default="1:1")

class Predictor(BasePredictor):
    def predict(self, ar: str = Inputs.ar) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let ar = &info.inputs["ar"];
        assert_eq!(ar.description.as_deref(), Some("Aspect ratio"));
        assert_eq!(ar.default, Some(DefaultValue::String("1:1".into())));
        assert_eq!(ar.choices.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn registry_method_call_overrides() {
        let source = r#"
from cog import BasePredictor, Input

class Inputs:
    @staticmethod
    def steps(default: int) -> Input:
        return Input(description="Steps", ge=1, le=50, default=default)

class Predictor(BasePredictor):
    def predict(self, steps: int = Inputs.steps(20)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let steps = &info.inputs["steps"];
        assert_eq!(steps.default, Some(DefaultValue::Integer(20)));
        assert_eq!(steps.description.as_deref(), Some("Steps"));
        assert_eq!(steps.ge, Some(1.0));
        assert_eq!(steps.le, Some(50.0));
    }

    #[test]
    fn registry_call_binds_module_constant() {
        let source = r#"
from cog import BasePredictor, Input

DEFAULT_STEPS = 20

class Inputs:
    @staticmethod
    def steps(default: int) -> Input:
        return Input(description="Steps", ge=1, le=50, default=default)

class Predictor(BasePredictor):
    def predict(self, steps: int = Inputs.steps(DEFAULT_STEPS)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        assert_eq!(
            info.inputs["steps"].default,
            Some(DefaultValue::Integer(20))
        );
    }

    #[test]
    fn registry_call_unresolvable_argument_errors() {
        let source = r#"
from cog import BasePredictor, Input

class Inputs:
    @staticmethod
    def steps(default: int) -> Input:
        return Input(description="Steps", default=default)

class Predictor(BasePredictor):
    def predict(self, steps: int = Inputs.steps(compute())) -> str:
        pass
"#;
        let err = parse_predictor(source, "Predictor", Mode::Predict).unwrap_err();
        match err {
            SchemaError::DefaultNotResolvable { param, expr } => {
                assert_eq!(param, "steps");
                assert_eq!(expr, "compute()");
            }
            other => panic!("expected DefaultNotResolvable, got {other}"),
        }
    }

    #[test]
    fn registry_keyword_override_wins() {
        let source = r#"
from cog import BasePredictor, Input

class Inputs:
    @staticmethod
    def scale(default: float, ge: float = 0) -> Input:
        return Input(description="Scale", default=default)

class Predictor(BasePredictor):
    def predict(self, scale: float = Inputs.scale(1.0, ge=0.5)) -> str:
        pass
"#;
        let info = parse(source, "Predictor");
        let scale = &info.inputs["scale"];
        assert_eq!(scale.default, Some(DefaultValue::Float(1.0)));
        assert_eq!(scale.ge, Some(0.5));
    }
}
