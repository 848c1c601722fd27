// Cross-file model resolution: output types imported from sibling modules.
use cog_schema::error::SchemaError;
use cog_schema::types::Mode;
use cog_schema::{generate_schema, generate_schema_from_dir};
use serde_json::json;
use tempfile::TempDir;

fn write_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("failed to write test file");
    }
    temp_dir
}

const PREDICT_PY: &str = r#"
from cog import BasePredictor
from models import AnalysisResult

class Predictor(BasePredictor):
    def predict(self, text: str) -> AnalysisResult:
        pass
"#;

const MODELS_PY: &str = r#"
from cog import BaseModel

class AnalysisResult(BaseModel):
    label: str
    confidence: float
    notes: str | None = None
"#;

#[test]
fn sibling_file_model_resolves_with_src_dir() {
    let dir = write_project(&[("predict.py", PREDICT_PY), ("models.py", MODELS_PY)]);

    let schema =
        generate_schema_from_dir("predict.py:Predictor", dir.path(), Mode::Predict).unwrap();

    let output = &schema["components"]["schemas"]["Output"];
    assert_eq!(output["type"], "object");
    assert_eq!(output["required"], json!(["label", "confidence"]));
    assert_eq!(output["properties"]["confidence"]["type"], "number");
    assert_eq!(output["properties"]["notes"]["nullable"], json!(true));
}

#[test]
fn sibling_file_model_fails_without_loader() {
    let err = generate_schema(PREDICT_PY, "Predictor", Mode::Predict).unwrap_err();
    assert!(
        matches!(
            err,
            SchemaError::ExternalType { ref symbol, ref module }
                if symbol == "AnalysisResult" && module == "models"
        ),
        "got {err}"
    );
}

#[test]
fn dotted_module_path_resolves() {
    let dir = write_project(&[
        (
            "predict.py",
            r#"
from cog import BasePredictor
from lib.outputs import Segmentation

class Predictor(BasePredictor):
    def predict(self, text: str) -> Segmentation:
        pass
"#,
        ),
        (
            "lib/outputs.py",
            r#"
from cog import BaseModel

class Segmentation(BaseModel):
    mask_url: str
"#,
        ),
    ]);

    let schema =
        generate_schema_from_dir("predict.py:Predictor", dir.path(), Mode::Predict).unwrap();
    assert_eq!(
        schema["components"]["schemas"]["Output"]["properties"]["mask_url"]["type"],
        "string"
    );
}

#[test]
fn transitive_model_reference_resolves() {
    let dir = write_project(&[
        (
            "predict.py",
            r#"
from cog import BasePredictor
from results import Report

class Predictor(BasePredictor):
    def predict(self, text: str) -> Report:
        pass
"#,
        ),
        (
            "results.py",
            r#"
from cog import BaseModel

class Detail(BaseModel):
    score: float

class Report(BaseModel):
    summary: str
    detail: Detail
"#,
        ),
    ]);

    let schema =
        generate_schema_from_dir("predict.py:Predictor", dir.path(), Mode::Predict).unwrap();
    let output = &schema["components"]["schemas"]["Output"];
    assert_eq!(
        output["properties"]["detail"]["properties"]["score"]["type"],
        "number"
    );
}

#[test]
fn external_package_is_never_probed() {
    // `numpy` is on the deny list; even if a file by that name existed in the
    // source tree it must not shadow the real package.
    let dir = write_project(&[
        (
            "predict.py",
            r#"
from cog import BasePredictor
from numpy import ndarray

class Predictor(BasePredictor):
    def predict(self, text: str) -> ndarray:
        pass
"#,
        ),
        ("numpy.py", "from cog import BaseModel\n\nclass ndarray(BaseModel):\n    x: int\n"),
    ]);

    let err =
        generate_schema_from_dir("predict.py:Predictor", dir.path(), Mode::Predict).unwrap_err();
    assert!(matches!(err, SchemaError::ExternalType { .. }), "got {err}");
}

#[test]
fn missing_predict_file_is_reported() {
    let dir = write_project(&[("models.py", MODELS_PY)]);
    let err =
        generate_schema_from_dir("predict.py:Predictor", dir.path(), Mode::Predict).unwrap_err();
    assert!(matches!(err, SchemaError::FileNotFound(_)));
}

#[test]
fn predict_ref_without_colon_is_rejected() {
    let dir = write_project(&[("predict.py", PREDICT_PY)]);
    let err = generate_schema_from_dir("predict.py", dir.path(), Mode::Predict).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidPredictRef(_)));
}
