//! The recursive schema-type resolver: `TypeAnnotation` → `SchemaType`.
//!
//! Output-position rules differ from input-position ones on purpose: outputs
//! may nest arbitrarily (lists of dicts of models), but may never be Optional
//! or a union. One asymmetry is deliberate and load-bearing: an unresolvable
//! dict *value* type degrades to an opaque object, while an unresolvable list
//! element propagates its error.

use crate::annotation::MAX_TYPE_DEPTH;
use crate::error::{Result, SchemaError};
use crate::types::{
    ImportContext, ModelClassMap, PrimitiveType, SchemaField, SchemaKind, SchemaType,
    TypeAnnotation,
};

/// Resolve an output type annotation against the known model classes.
pub fn resolve_output_type(
    ann: &TypeAnnotation,
    imports: &ImportContext,
    models: &ModelClassMap,
) -> Result<SchemaType> {
    let mut stack = Vec::new();
    resolve(ann, imports, models, &mut stack, 0)
}

fn resolve(
    ann: &TypeAnnotation,
    imports: &ImportContext,
    models: &ModelClassMap,
    stack: &mut Vec<String>,
    depth: usize,
) -> Result<SchemaType> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SchemaError::NestingTooDeep {
            limit: MAX_TYPE_DEPTH,
        });
    }

    match ann {
        TypeAnnotation::Simple(name) => {
            resolve_simple(name, imports, models, stack, depth)
        }

        TypeAnnotation::Generic(outer, args) => match outer.as_str() {
            "dict" | "Dict" => {
                // Dict value types are best-effort: wrong arity or an
                // unresolvable value degrades to an opaque object. Lists
                // propagate instead — preserved asymmetry, do not "fix".
                if args.len() != 2 {
                    return Ok(SchemaType::any());
                }
                match resolve(&args[1], imports, models, stack, depth + 1) {
                    Ok(value) => Ok(SchemaType {
                        kind: SchemaKind::Dict(Box::new(value)),
                        nullable: false,
                    }),
                    Err(_) => Ok(SchemaType::any()),
                }
            }

            "list" | "List" => {
                if args.len() != 1 {
                    return Err(SchemaError::UnsupportedType(format!(
                        "{outer} expects exactly 1 type argument, got {}",
                        args.len()
                    )));
                }
                let items = resolve(&args[0], imports, models, stack, depth + 1)?;
                Ok(SchemaType {
                    kind: SchemaKind::Array(Box::new(items)),
                    nullable: false,
                })
            }

            "Iterator" | "AsyncIterator" => {
                if args.len() != 1 {
                    return Err(SchemaError::UnsupportedType(format!(
                        "{outer} expects exactly 1 type argument, got {}",
                        args.len()
                    )));
                }
                let elem = resolve(&args[0], imports, models, stack, depth + 1)?;
                Ok(SchemaType {
                    kind: SchemaKind::Iterator(Box::new(elem)),
                    nullable: false,
                })
            }

            "ConcatenateIterator" | "AsyncConcatenateIterator" => {
                if args.len() != 1 {
                    return Err(SchemaError::UnsupportedType(format!(
                        "{outer} expects exactly 1 type argument, got {}",
                        args.len()
                    )));
                }
                let elem = resolve(&args[0], imports, models, stack, depth + 1)?;
                if elem.kind != SchemaKind::Primitive(PrimitiveType::String) {
                    return Err(SchemaError::ConcatIteratorNotStr(annotation_name(&args[0])));
                }
                Ok(SchemaType {
                    kind: SchemaKind::ConcatIterator(Box::new(elem)),
                    nullable: false,
                })
            }

            // Optional/nullable is disallowed specifically in output position.
            "Optional" => Err(SchemaError::OptionalOutput),

            "Union" => resolve_union(args),

            other => Err(SchemaError::UnsupportedType(format!(
                "{other}[...] is not a supported output type"
            ))),
        },

        TypeAnnotation::Union(members) => resolve_union(members),
    }
}

/// Outputs reject every union; the None-containing case gets its own error.
fn resolve_union(members: &[TypeAnnotation]) -> Result<SchemaType> {
    if members.iter().any(TypeAnnotation::is_none) {
        Err(SchemaError::OptionalOutput)
    } else {
        Err(SchemaError::UnionOutput)
    }
}

fn resolve_simple(
    name: &str,
    imports: &ImportContext,
    models: &ModelClassMap,
    stack: &mut Vec<String>,
    depth: usize,
) -> Result<SchemaType> {
    // A known model class resolves to an Object, fields recursively.
    if let Some(fields) = models.get(name) {
        // Defensive cycle guard: a record re-entered through its own field
        // chain degrades to opaque rather than recursing forever.
        if stack.iter().any(|n| n == name) {
            return Ok(SchemaType::any());
        }
        stack.push(name.to_string());

        let mut object_fields = indexmap::IndexMap::new();
        for field in fields {
            let resolved = resolve_model_field(&field.annotation, imports, models, stack, depth)?;
            let required = field.default.is_none() && !resolved.nullable;
            object_fields.insert(
                field.name.clone(),
                SchemaField {
                    ty: resolved,
                    default: field.default.clone(),
                    required,
                },
            );
        }

        stack.pop();
        return Ok(SchemaType {
            kind: SchemaKind::Object(object_fields),
            nullable: false,
        });
    }

    // Unparameterized builtins and Any are opaque.
    match name {
        "Any" | "dict" | "Dict" => return Ok(SchemaType::any()),
        "list" | "List" => {
            return Ok(SchemaType {
                kind: SchemaKind::Array(Box::new(SchemaType::any())),
                nullable: false,
            });
        }
        _ => {}
    }

    if let Some(prim) = PrimitiveType::from_name(name) {
        return Ok(SchemaType::primitive(prim));
    }

    // Unknown symbol: distinguish "imported from elsewhere" from "not found
    // anywhere" — both messages are part of the contract.
    match imports.source_module(name) {
        Some(module) => Err(SchemaError::ExternalType {
            symbol: name.to_string(),
            module: module.to_string(),
        }),
        None => Err(SchemaError::UnknownType {
            symbol: name.to_string(),
        }),
    }
}

/// Resolve one model field. Unlike the output root, fields may be nullable:
/// `Optional[X]` and `X | None` resolve to `X` with the nullable flag set.
fn resolve_model_field(
    ann: &TypeAnnotation,
    imports: &ImportContext,
    models: &ModelClassMap,
    stack: &mut Vec<String>,
    depth: usize,
) -> Result<SchemaType> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SchemaError::NestingTooDeep {
            limit: MAX_TYPE_DEPTH,
        });
    }

    match ann {
        TypeAnnotation::Generic(outer, args) if outer == "Optional" && args.len() == 1 => {
            let mut inner = resolve(&args[0], imports, models, stack, depth + 1)?;
            inner.nullable = true;
            Ok(inner)
        }
        TypeAnnotation::Union(members)
            if members.len() == 2 && members.iter().any(TypeAnnotation::is_none) =>
        {
            let non_none = members
                .iter()
                .find(|m| !m.is_none())
                .ok_or_else(|| SchemaError::UnsupportedType("union with only None types".into()))?;
            let mut inner = resolve(non_none, imports, models, stack, depth + 1)?;
            inner.nullable = true;
            Ok(inner)
        }
        other => resolve(other, imports, models, stack, depth + 1),
    }
}

/// Human-readable form of an annotation, for error messages.
fn annotation_name(ann: &TypeAnnotation) -> String {
    match ann {
        TypeAnnotation::Simple(name) => name.clone(),
        TypeAnnotation::Generic(outer, args) => {
            let inner: Vec<String> = args.iter().map(annotation_name).collect();
            format!("{outer}[{}]", inner.join(", "))
        }
        TypeAnnotation::Union(members) => members
            .iter()
            .map(annotation_name)
            .collect::<Vec<_>>()
            .join(" | "),
    }
}
