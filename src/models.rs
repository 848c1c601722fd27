//! BaseModel subclass collection, local and cross-file.
//!
//! Cross-file resolution is driven by the import table: an imported name whose
//! module isn't a known external library is probed as a sibling source file
//! (dotted module → relative path). Filesystem access goes through the
//! `SourceLoader` seam so the resolution logic stays a pure function over
//! provided bytes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::annotation::{parse_type_annotation, parse_type_from_string};
use crate::ast::{children_of, node_text, parse_python, unwrap_decorated, unwrap_expression_statement};
use crate::scope::parse_literal;
use crate::types::{ImportContext, ModelClassMap, ModelField};

/// Modules that never resolve to local source files. Probing these against the
/// filesystem would be wasted work at best and false positives at worst.
const EXTERNAL_MODULES: &[&str] = &[
    "cog",
    "coglet",
    "typing",
    "typing_extensions",
    "pydantic",
    "numpy",
    "np",
    "torch",
    "tensorflow",
    "jax",
    "PIL",
    "fastapi",
    "builtins",
    "__future__",
    "os",
    "sys",
    "io",
    "re",
    "json",
    "math",
    "pathlib",
    "dataclasses",
    "enum",
    "abc",
    "collections",
    "functools",
    "itertools",
];

/// Transitive-import recursion ceiling. A predictor importing models through
/// more files than this is malformed input, not a real project.
const MAX_IMPORT_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Source loading seam
// ---------------------------------------------------------------------------

/// Injected capability for reading sibling source files.
pub trait SourceLoader {
    /// Load the source at `rel_path`, or `None` if it doesn't exist.
    fn load(&self, rel_path: &Path) -> Option<String>;
}

/// Loads files beneath a root directory, decoding lossily — malformed bytes
/// flow through the normal typed-error paths instead of aborting.
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLoader for DirLoader {
    fn load(&self, rel_path: &Path) -> Option<String> {
        let bytes = std::fs::read(self.root.join(rel_path)).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Local collection
// ---------------------------------------------------------------------------

/// Collect all BaseModel subclasses defined at the top level of a file.
pub fn collect_model_classes(root: Node, src: &[u8], imports: &ImportContext) -> ModelClassMap {
    let mut models = ModelClassMap::new();

    for child in children_of(&root) {
        let class_node = match unwrap_decorated(&child, "class_definition") {
            Some(c) => c,
            None => continue,
        };
        let name_node = match class_node.child_by_field_name("name") {
            Some(n) => n,
            None => continue,
        };
        if !inherits_from_base_model(&class_node, src, imports) {
            continue;
        }
        let class_name = node_text(&name_node, src).to_string();
        let fields = collect_class_fields(&class_node, src);
        models.insert(class_name, fields);
    }

    models
}

fn inherits_from_base_model(class_node: &Node, src: &[u8], imports: &ImportContext) -> bool {
    let supers = match class_node.child_by_field_name("superclasses") {
        Some(s) => s,
        None => return false,
    };
    children_of(&supers).iter().any(|c| {
        c.kind() == "identifier" && {
            let name = node_text(c, src);
            imports.is_base_model(name) || name == "BaseModel"
        }
    })
}

/// Annotated fields of a class body, in declaration order.
/// Handles `name: type` and `name: type = default`.
fn collect_class_fields(class_node: &Node, src: &[u8]) -> Vec<ModelField> {
    let mut fields = Vec::new();

    let body = match class_node.child_by_field_name("body") {
        Some(b) => b,
        None => return fields,
    };

    for child in children_of(&body) {
        let node = match unwrap_expression_statement(&child) {
            Some(n) => n,
            None => continue,
        };

        match node.kind() {
            // `name: type [= value]` — tree-sitter-python uses "assignment"
            // for annotated assignments, with the right side optional.
            "assignment" => {
                let left = match node.child_by_field_name("left") {
                    Some(n) if n.kind() == "identifier" => n,
                    _ => continue,
                };
                let type_node = match node.child_by_field_name("type") {
                    Some(t) => t,
                    // Plain `name = value` assignments aren't schema fields.
                    None => continue,
                };
                let annotation = match parse_type_annotation(&type_node, src) {
                    Ok(a) => a,
                    Err(_) => continue,
                };
                let default = node
                    .child_by_field_name("right")
                    .and_then(|r| parse_literal(&r, src));
                fields.push(ModelField {
                    name: node_text(&left, src).to_string(),
                    annotation,
                    default,
                });
            }
            // Bare `name: type` on grammar versions that emit a `type` node:
            // fall back to splitting the raw text.
            "type" => {
                let text = node_text(&node, src);
                if let Some((name, type_str)) = text.split_once(':')
                    && let Ok(annotation) = parse_type_from_string(type_str, 0)
                {
                    let name = name.trim();
                    if !name.is_empty() {
                        fields.push(ModelField {
                            name: name.to_string(),
                            annotation,
                            default: None,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fields
}

// ---------------------------------------------------------------------------
// Cross-file resolution
// ---------------------------------------------------------------------------

/// Resolve still-unknown imported names against sibling source files, adding
/// any BaseModel subclasses found to `models` under the *local* name (so
/// `from models import Foo as Bar` registers `Bar`).
///
/// Missing files are genuinely-external modules, not errors — an unresolved
/// symbol only becomes an error if the signature actually references it.
pub fn resolve_imported_models(
    imports: &ImportContext,
    loader: &dyn SourceLoader,
    models: &mut ModelClassMap,
) {
    let mut cache: HashMap<PathBuf, ModelClassMap> = HashMap::new();
    let mut in_progress: HashSet<PathBuf> = HashSet::new();

    for (local, (module, orig)) in &imports.names {
        if models.contains_key(local.as_str()) || is_external_module(module) {
            continue;
        }
        let Some(rel) = module_to_rel_path(module) else {
            continue;
        };
        let file_models = load_module_models(&rel, loader, &mut cache, &mut in_progress, 0);
        if let Some(fields) = file_models.get(orig.as_str()) {
            tracing::debug!(module, name = %orig, local = %local, "resolved model class from sibling file");
            models.insert(local.clone(), fields.clone());
            // The resolved model's fields reference other records by name, so
            // everything discovered alongside it must be resolvable too.
            for (name, fields) in &file_models {
                models
                    .entry(name.clone())
                    .or_insert_with(|| fields.clone());
            }
        }
    }
}

fn is_external_module(module: &str) -> bool {
    let top = module.trim_start_matches('.');
    let top = top.split('.').next().unwrap_or(top);
    EXTERNAL_MODULES.contains(&top)
}

/// `".models.outputs"` → `models/outputs.py`. Pure relative-path conversion;
/// an empty module (e.g. `from . import x`) yields `None`.
fn module_to_rel_path(module: &str) -> Option<PathBuf> {
    let stripped = module.trim_start_matches('.');
    if stripped.is_empty() {
        return None;
    }
    let mut path: PathBuf = stripped.split('.').collect();
    path.set_extension("py");
    Some(path)
}

/// Parse one module file and return its model classes, following its own
/// imports transitively. Each path is parsed at most once per invocation.
fn load_module_models(
    rel: &Path,
    loader: &dyn SourceLoader,
    cache: &mut HashMap<PathBuf, ModelClassMap>,
    in_progress: &mut HashSet<PathBuf>,
    depth: usize,
) -> ModelClassMap {
    if let Some(cached) = cache.get(rel) {
        return cached.clone();
    }
    // Cycle or runaway import chain: return nothing rather than recursing.
    if depth > MAX_IMPORT_DEPTH || !in_progress.insert(rel.to_path_buf()) {
        return ModelClassMap::new();
    }

    let mut models = ModelClassMap::new();
    if let Some(source) = loader.load(rel) {
        if let Ok(tree) = parse_python(&source) {
            let root = tree.root_node();
            let src = source.as_bytes();
            let imports = crate::scope::collect_imports(root, src);
            models = collect_model_classes(root, src, &imports);

            // Follow this file's own imports so transitively-defined models
            // referenced by its fields resolve too.
            for (local, (module, orig)) in &imports.names {
                if models.contains_key(local.as_str()) || is_external_module(module) {
                    continue;
                }
                let Some(nested_rel) = module_to_rel_path(module) else {
                    continue;
                };
                let nested = load_module_models(&nested_rel, loader, cache, in_progress, depth + 1);
                if let Some(fields) = nested.get(orig.as_str()) {
                    models.insert(local.clone(), fields.clone());
                }
            }
        }
    } else {
        tracing::debug!(path = %rel.display(), "module not found locally, treating as external");
    }

    in_progress.remove(rel);
    cache.insert(rel.to_path_buf(), models.clone());
    models
}
