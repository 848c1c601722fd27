//! Core data model: the tagged unions the whole pipeline is built from.
//!
//! `TypeAnnotation` is the purely syntactic form a declared type takes in the
//! source; `SchemaType` is the resolved, semantic form it takes in the wire
//! document. Keeping both closed sum types means the resolver and the builder
//! fail to compile when a variant is added but not handled.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::error::{Result, SchemaError};

/// Map of BaseModel class names to their ordered annotated fields.
pub type ModelClassMap = IndexMap<String, Vec<ModelField>>;

/// One annotated field of a BaseModel subclass, pre-resolution.
#[derive(Debug, Clone)]
pub struct ModelField {
    pub name: String,
    pub annotation: TypeAnnotation,
    pub default: Option<DefaultValue>,
}

// ---------------------------------------------------------------------------
// Primitive types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Float,
    Integer,
    String,
    /// `cog.Path` — serialised as `{"type":"string","format":"uri"}`
    Path,
    /// `cog.File` (deprecated) — same wire format as Path
    File,
    /// `cog.Secret` — write-only, masked
    Secret,
    /// `typing.Any` or unresolved — opaque object
    Any,
}

impl PrimitiveType {
    /// JSON Schema fragment for this primitive.
    pub fn json_type(self) -> Value {
        match self {
            Self::Bool => json!({"type": "boolean"}),
            Self::Float => json!({"type": "number"}),
            Self::Integer => json!({"type": "integer"}),
            Self::String => json!({"type": "string"}),
            Self::Path => json!({"type": "string", "format": "uri"}),
            Self::File => json!({"type": "string", "format": "uri"}),
            Self::Secret => json!({
                "type": "string",
                "format": "password",
                "writeOnly": true,
                "x-cog-secret": true
            }),
            Self::Any => json!({"type": "object"}),
        }
    }

    /// Resolve a simple type name (already import-resolved) to a primitive.
    /// Returns `None` if the name isn't a known primitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "float" => Some(Self::Float),
            "int" => Some(Self::Integer),
            "str" => Some(Self::String),
            "Path" => Some(Self::Path),
            "File" => Some(Self::File),
            "Secret" => Some(Self::Secret),
            "Any" => Some(Self::Any),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Repetition / cardinality (input position only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    /// Bare type — `str`
    Required,
    /// `Optional[str]` or `str | None`
    Optional,
    /// `list[str]` or `List[str]`
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub primitive: PrimitiveType,
    pub repetition: Repetition,
}

impl FieldType {
    pub fn json_type(&self) -> Value {
        match self.repetition {
            Repetition::Repeated => {
                json!({
                    "type": "array",
                    "items": self.primitive.json_type()
                })
            }
            _ => self.primitive.json_type(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed default value (from CST literals)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(std::string::String),
    List(Vec<DefaultValue>),
    Dict(Vec<(DefaultValue, DefaultValue)>),
    Set(Vec<DefaultValue>),
}

impl DefaultValue {
    /// Convert to a `serde_json::Value` for embedding in the schema.
    pub fn to_json(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(n) => json!(n),
            Self::Float(f) => json!(f),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            Self::Dict(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    // JSON keys must be strings — coerce
                    let key = match k {
                        Self::String(s) => s.clone(),
                        other => other.to_json().to_string(),
                    };
                    map.insert(key, v.to_json());
                }
                Value::Object(map)
            }
            Self::Set(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Input field (one parameter of predict/train)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InputField {
    pub name: std::string::String,
    /// Positional order in the function signature (0-based, excludes `self`).
    pub order: usize,
    pub field_type: FieldType,
    pub default: Option<DefaultValue>,
    pub description: Option<std::string::String>,
    pub ge: Option<f64>,
    pub le: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub regex: Option<std::string::String>,
    pub choices: Option<Vec<DefaultValue>>,
    pub deprecated: Option<bool>,
}

impl InputField {
    /// Is this field required in the schema?
    pub fn is_required(&self) -> bool {
        self.default.is_none()
            && matches!(
                self.field_type.repetition,
                Repetition::Required | Repetition::Repeated
            )
    }
}

// ---------------------------------------------------------------------------
// Resolved schema type (output position, recursive)
// ---------------------------------------------------------------------------

/// The resolved, semantic type of an output. `nullable` is orthogonal to the
/// kind: a nullable field renders its kind's schema plus `"nullable": true`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaType {
    pub kind: SchemaKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Primitive(PrimitiveType),
    /// `typing.Any`, bare `dict`, or a dict whose value type degraded.
    Any,
    Array(Box<SchemaType>),
    /// `dict[str, V]` — only the value type survives; keys are strings on the wire.
    Dict(Box<SchemaType>),
    Object(IndexMap<String, SchemaField>),
    Iterator(Box<SchemaType>),
    /// Element is always the string primitive; enforced at resolution.
    ConcatIterator(Box<SchemaType>),
}

/// One resolved field of an `Object` output.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub ty: SchemaType,
    pub default: Option<DefaultValue>,
    pub required: bool,
}

impl SchemaType {
    pub fn primitive(p: PrimitiveType) -> Self {
        Self {
            kind: SchemaKind::Primitive(p),
            nullable: false,
        }
    }

    pub fn any() -> Self {
        Self {
            kind: SchemaKind::Any,
            nullable: false,
        }
    }

    /// Render as a JSON Schema fragment (no title).
    pub fn json_type(&self) -> Value {
        let mut v = match &self.kind {
            SchemaKind::Primitive(p) => p.json_type(),
            SchemaKind::Any => json!({"type": "object"}),
            SchemaKind::Array(items) => json!({
                "type": "array",
                "items": items.json_type()
            }),
            SchemaKind::Dict(value) => json!({
                "type": "object",
                "additionalProperties": value.json_type()
            }),
            SchemaKind::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for (name, field) in fields {
                    let mut prop = field.ty.json_type();
                    if let Value::Object(ref mut m) = prop {
                        m.insert("title".into(), json!(title_case_words(name)));
                    }
                    if field.required {
                        required.push(json!(name));
                    }
                    properties.insert(name.clone(), prop);
                }
                let mut schema = json!({
                    "type": "object",
                    "properties": properties,
                });
                if !required.is_empty()
                    && let Some(obj) = schema.as_object_mut()
                {
                    obj.insert("required".into(), Value::Array(required));
                }
                schema
            }
            SchemaKind::Iterator(elem) => json!({
                "type": "array",
                "items": elem.json_type(),
                "x-cog-array-type": "iterator"
            }),
            SchemaKind::ConcatIterator(elem) => json!({
                "type": "array",
                "items": elem.json_type(),
                "x-cog-array-type": "iterator",
                "x-cog-array-display": "concatenate"
            }),
        };
        if self.nullable
            && let Value::Object(ref mut m) = v
        {
            m.insert("nullable".into(), json!(true));
        }
        v
    }
}

// ---------------------------------------------------------------------------
// Predictor info (the top-level extraction result)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Predict,
    Train,
}

#[derive(Debug, Clone)]
pub struct PredictorInfo {
    pub inputs: IndexMap<std::string::String, InputField>,
    pub output: SchemaType,
    pub mode: Mode,
}

// ---------------------------------------------------------------------------
// Type annotation AST (intermediate, before resolution)
// ---------------------------------------------------------------------------

/// Parsed type annotation from the Python CST — not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnnotation {
    /// Simple name: `str`, `int`, `Path`, `MyModel`, etc.
    Simple(std::string::String),
    /// Generic: `Optional[str]`, `List[int]`, `dict[str, int]`, etc.
    Generic(std::string::String, Vec<TypeAnnotation>),
    /// Union: `str | None`, `int | str`, etc. — always flattened.
    Union(Vec<TypeAnnotation>),
}

impl TypeAnnotation {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::Simple(n) if n == "None")
    }
}

/// Import context — tracks what names are imported from which modules.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    /// Map from local name → (module, original_name).
    /// e.g. `Path` → `("cog", "Path")`, `Optional` → `("typing", "Optional")`
    pub names: IndexMap<std::string::String, (std::string::String, std::string::String)>,
}

impl ImportContext {
    pub fn is_base_model(&self, name: &str) -> bool {
        self.names
            .get(name)
            .is_some_and(|(module, orig)| module == "cog" && orig == "BaseModel")
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.names
            .get(name)
            .is_some_and(|(module, orig)| module == "cog" && orig == "Input")
    }

    /// The module a local name was imported from, if any (builtins excluded).
    pub fn source_module(&self, name: &str) -> Option<&str> {
        self.names
            .get(name)
            .map(|(module, _)| module.as_str())
            .filter(|m| *m != "builtins")
    }
}

// ---------------------------------------------------------------------------
// Input-position resolution (flat: primitive + repetition)
// ---------------------------------------------------------------------------

/// Resolve a `TypeAnnotation` in input position. Inputs are deliberately flat:
/// a scalar, an optional scalar, or a list of scalars.
pub fn resolve_field_type(ann: &TypeAnnotation, ctx: &ImportContext) -> Result<FieldType> {
    match ann {
        TypeAnnotation::Simple(name) => {
            let prim = resolve_primitive(name, ctx)?;
            Ok(FieldType {
                primitive: prim,
                repetition: Repetition::Required,
            })
        }
        TypeAnnotation::Generic(outer, args) => {
            let outer_name = outer.as_str();

            // Optional[X] → X with Optional repetition
            if outer_name == "Optional" {
                if args.len() != 1 {
                    return Err(SchemaError::UnsupportedType(format!(
                        "Optional expects exactly 1 type argument, got {}",
                        args.len()
                    )));
                }
                let inner = resolve_field_type(&args[0], ctx)?;
                Ok(FieldType {
                    primitive: inner.primitive,
                    repetition: Repetition::Optional,
                })
            }
            // List[X] or list[X] → X with Repeated repetition
            else if outer_name == "List" || outer_name == "list" {
                if args.len() != 1 {
                    return Err(SchemaError::UnsupportedType(format!(
                        "List expects exactly 1 type argument, got {}",
                        args.len()
                    )));
                }
                let inner = resolve_field_type(&args[0], ctx)?;
                if inner.repetition != Repetition::Required {
                    return Err(SchemaError::UnsupportedType(
                        "nested generics like List[Optional[X]] are not supported".into(),
                    ));
                }
                Ok(FieldType {
                    primitive: inner.primitive,
                    repetition: Repetition::Repeated,
                })
            }
            // Union[X, None] — same rules as the `X | None` operator form
            else if outer_name == "Union" {
                resolve_union_input(args, ctx)
            }
            // Anything else generic — not supported as input
            else {
                Err(SchemaError::UnsupportedType(format!(
                    "{outer_name}[...] is not a supported input type"
                )))
            }
        }
        TypeAnnotation::Union(members) => resolve_union_input(members, ctx),
    }
}

/// Only `X | None` / `Union[X, None]` is accepted in input position: the
/// non-null member with Optional repetition.
fn resolve_union_input(members: &[TypeAnnotation], ctx: &ImportContext) -> Result<FieldType> {
    if members.len() == 2 && members.iter().any(TypeAnnotation::is_none) {
        let non_none = members
            .iter()
            .find(|m| !m.is_none())
            .ok_or_else(|| SchemaError::UnsupportedType("union with only None types".into()))?;
        let inner = resolve_field_type(non_none, ctx)?;
        return Ok(FieldType {
            primitive: inner.primitive,
            repetition: Repetition::Optional,
        });
    }
    Err(SchemaError::UnsupportedType(
        "union types other than X | None are not supported as inputs".into(),
    ))
}

fn resolve_primitive(name: &str, ctx: &ImportContext) -> Result<PrimitiveType> {
    PrimitiveType::from_name(name).ok_or_else(|| match ctx.source_module(name) {
        Some(module) => SchemaError::ExternalType {
            symbol: name.to_string(),
            module: module.to_string(),
        },
        None => SchemaError::UnknownType {
            symbol: name.to_string(),
        },
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Title case with underscore splitting: `segmented_image` → `Segmented Image`
pub fn title_case_words(s: &str) -> String {
    s.split('_')
        .map(title_case_single)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title case a single word/identifier: `color` → `Color`
pub fn title_case_single(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().to_string() + chars.as_str(),
    }
}
