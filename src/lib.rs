//! Static OpenAPI schema generation for Cog predictors.
//!
//! Extracts the predictor signature from Python source without executing it:
//! the source is parsed into a concrete syntax tree, the predict/train
//! signature is walked, and the result is rendered as the same OpenAPI 3.0.2
//! document the Python runtime would serve.

pub mod annotation;
pub mod ast;
pub mod error;
pub mod models;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod scope;
pub mod types;

use std::path::Path;

use crate::error::{Result, SchemaError};
use crate::models::{DirLoader, SourceLoader};
use crate::parser::{parse_predictor, parse_predictor_with_loader};
use crate::schema::{fix_nullable_anyof, generate_openapi_schema, remove_title_next_to_ref};
use crate::types::Mode;

/// Generate the OpenAPI JSON schema for a predictor from a single source file.
///
/// `source` is the full Python source, `predict_ref` the bare class or
/// function name (e.g. `"Predictor"`). Types imported from sibling files
/// cannot be resolved through this entry point; use
/// [`generate_schema_from_dir`] for that.
pub fn generate_schema(source: &str, predict_ref: &str, mode: Mode) -> Result<serde_json::Value> {
    let info = parse_predictor(source, predict_ref, mode)?;
    finish(info)
}

/// As [`generate_schema`], with a loader for resolving model classes imported
/// from sibling modules.
pub fn generate_schema_with_loader(
    source: &str,
    predict_ref: &str,
    mode: Mode,
    loader: &dyn SourceLoader,
) -> Result<serde_json::Value> {
    let info = parse_predictor_with_loader(source, predict_ref, mode, Some(loader))?;
    finish(info)
}

/// Generate the schema from a `file.py:Name` reference resolved against a
/// source directory. Sibling files in the directory are available for
/// cross-file model resolution.
pub fn generate_schema_from_dir(
    predict_ref: &str,
    src_dir: &Path,
    mode: Mode,
) -> Result<serde_json::Value> {
    let (file_part, ref_name) = predict_ref
        .rsplit_once(':')
        .ok_or_else(|| SchemaError::InvalidPredictRef(predict_ref.to_string()))?;

    let file_path = src_dir.join(file_part);
    let bytes = std::fs::read(&file_path)
        .map_err(|_| SchemaError::FileNotFound(file_path.display().to_string()))?;
    let source = String::from_utf8_lossy(&bytes);

    let loader = DirLoader::new(src_dir);
    generate_schema_with_loader(&source, ref_name, mode, &loader)
}

fn finish(info: types::PredictorInfo) -> Result<serde_json::Value> {
    let mut schema = generate_openapi_schema(&info);
    remove_title_next_to_ref(&mut schema);
    fix_nullable_anyof(&mut schema);
    tracing::debug!("schema document generated and post-processed");
    Ok(schema)
}
