//! OpenAPI 3.0.2 document generation from `PredictorInfo`.
//!
//! The document shape matches what the Python runtime serves from its HTTP
//! server, so downstream consumers can treat the two as interchangeable.
//! Component names are mode-dependent: `Input`/`Output` for predictions,
//! `TrainingInput`/`TrainingOutput` for trainings.

use serde_json::{Map, Value, json};

use crate::types::{
    Mode, PredictorInfo, Repetition, title_case_single, title_case_words,
};

struct ModeNames {
    input: &'static str,
    output: &'static str,
    request: &'static str,
    response: &'static str,
    endpoint: &'static str,
    cancel_endpoint: &'static str,
    cancel_param: &'static str,
    summary: &'static str,
    description: &'static str,
    op_id: &'static str,
    cancel_op_id: &'static str,
}

impl ModeNames {
    fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Predict => Self {
                input: "Input",
                output: "Output",
                request: "PredictionRequest",
                response: "PredictionResponse",
                endpoint: "/predictions",
                cancel_endpoint: "/predictions/{prediction_id}/cancel",
                cancel_param: "prediction_id",
                summary: "Predict",
                description: "Run a single prediction on the model",
                op_id: "predict_predictions_post",
                cancel_op_id: "cancel_predictions__prediction_id__cancel_post",
            },
            Mode::Train => Self {
                input: "TrainingInput",
                output: "TrainingOutput",
                request: "TrainingRequest",
                response: "TrainingResponse",
                endpoint: "/trainings",
                cancel_endpoint: "/trainings/{training_id}/cancel",
                cancel_param: "training_id",
                summary: "Train",
                description: "Run a single training on the model",
                op_id: "train_trainings_post",
                cancel_op_id: "cancel_trainings__training_id__cancel_post",
            },
        }
    }
}

/// Generate the complete OpenAPI 3.0.2 document for a predictor signature.
pub fn generate_openapi_schema(info: &PredictorInfo) -> Value {
    let names = ModeNames::for_mode(info.mode);

    let (input_schema, enum_schemas) = build_input_schema(info, names.input);

    let mut output_schema = info.output.json_type();
    if let Value::Object(ref mut m) = output_schema {
        // Top-level Output carries its component name as title.
        let without_title = m.clone();
        m.clear();
        m.insert("title".into(), json!(names.output));
        m.extend(without_title);
    }

    let mut components: Map<String, Value> = Map::new();
    components.insert(names.input.into(), input_schema);
    components.insert(names.output.into(), output_schema);
    for (name, schema) in enum_schemas {
        components.insert(name, schema);
    }

    let input_ref = format!("#/components/schemas/{}", names.input);
    let output_ref = format!("#/components/schemas/{}", names.output);

    components.insert(
        names.request.into(),
        json!({
            "title": names.request,
            "type": "object",
            "properties": {
                "id": {"title": "Id", "type": "string"},
                "input": {"$ref": input_ref}
            }
        }),
    );

    components.insert(
        names.response.into(),
        json!({
            "title": names.response,
            "type": "object",
            "properties": {
                "input": {"$ref": input_ref},
                "output": {"$ref": output_ref},
                "id": {"title": "Id", "type": "string"},
                "version": {"title": "Version", "type": "string"},
                "created_at": {"title": "Created At", "type": "string", "format": "date-time"},
                "started_at": {"title": "Started At", "type": "string", "format": "date-time"},
                "completed_at": {"title": "Completed At", "type": "string", "format": "date-time"},
                "status": {"$ref": "#/components/schemas/Status"},
                "error": {"title": "Error", "type": "string"},
                "logs": {"title": "Logs", "type": "string"},
                "metrics": {"title": "Metrics", "type": "object"}
            }
        }),
    );

    components.insert(
        "Status".into(),
        json!({
            "title": "Status",
            "description": "An enumeration.",
            "enum": ["starting", "processing", "succeeded", "canceled", "failed"],
            "type": "string"
        }),
    );

    components.insert(
        "HTTPValidationError".into(),
        json!({
            "title": "HTTPValidationError",
            "type": "object",
            "properties": {
                "detail": {
                    "title": "Detail",
                    "type": "array",
                    "items": {"$ref": "#/components/schemas/ValidationError"}
                }
            }
        }),
    );

    components.insert(
        "ValidationError".into(),
        json!({
            "title": "ValidationError",
            "required": ["loc", "msg", "type"],
            "type": "object",
            "properties": {
                "loc": {
                    "title": "Location",
                    "type": "array",
                    "items": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
                },
                "msg": {"title": "Message", "type": "string"},
                "type": {"title": "Error Type", "type": "string"}
            }
        }),
    );

    let request_ref = format!("#/components/schemas/{}", names.request);
    let response_ref = format!("#/components/schemas/{}", names.response);

    json!({
        "openapi": "3.0.2",
        "info": {"title": "Cog", "version": "0.1.0"},
        "paths": {
            "/": {
                "get": {
                    "summary": "Root",
                    "operationId": "root__get",
                    "responses": {
                        "200": {
                            "description": "Successful Response",
                            "content": {"application/json": {"schema": {}}}
                        }
                    }
                }
            },
            "/health-check": {
                "get": {
                    "summary": "Healthcheck",
                    "operationId": "healthcheck_health_check_get",
                    "responses": {
                        "200": {
                            "description": "Successful Response",
                            "content": {"application/json": {"schema": {}}}
                        }
                    }
                }
            },
            (names.endpoint): {
                "post": {
                    "summary": names.summary,
                    "description": names.description,
                    "operationId": names.op_id,
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": request_ref}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Successful Response",
                            "content": {"application/json": {"schema": {"$ref": response_ref}}}
                        },
                        "422": {
                            "description": "Validation Error",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/HTTPValidationError"}}}
                        }
                    }
                }
            },
            (names.cancel_endpoint): {
                "post": {
                    "summary": "Cancel",
                    "operationId": names.cancel_op_id,
                    "parameters": [{
                        "required": true,
                        "schema": {"title": title_case_words(names.cancel_param), "type": "string"},
                        "name": names.cancel_param,
                        "in": "path"
                    }],
                    "responses": {
                        "200": {
                            "description": "Successful Response",
                            "content": {"application/json": {"schema": {}}}
                        },
                        "422": {
                            "description": "Validation Error",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/HTTPValidationError"}}}
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": components
        }
    })
}

// ---------------------------------------------------------------------------
// Input schema
// ---------------------------------------------------------------------------

/// Build the input component schema plus one enum component per choices field.
fn build_input_schema(info: &PredictorInfo, title: &str) -> (Value, Vec<(String, Value)>) {
    let mut properties: Map<String, Value> = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let mut enum_schemas: Vec<(String, Value)> = Vec::new();

    for (name, field) in &info.inputs {
        let mut prop: Map<String, Value> = Map::new();

        prop.insert("x-order".into(), json!(field.order));

        if let Some(ref choices) = field.choices {
            // Enum fields reference a named component via allOf, matching how
            // pydantic renders an Enum-typed field.
            let enum_name = title_case_single(name);
            let enum_type = field.field_type.primitive.json_type();
            let type_str = enum_type
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("string");

            let choice_values: Vec<Value> = choices.iter().map(|c| c.to_json()).collect();

            enum_schemas.push((
                enum_name.clone(),
                json!({
                    "title": &enum_name,
                    "description": "An enumeration.",
                    "enum": choice_values,
                    "type": type_str
                }),
            ));

            prop.insert(
                "allOf".into(),
                json!([{"$ref": format!("#/components/schemas/{enum_name}")}]),
            );
        } else {
            prop.insert("title".into(), json!(title_case_words(name)));
            if let Value::Object(m) = field.field_type.json_type() {
                prop.extend(m);
            }
        }

        if field.is_required() {
            required.push(json!(name));
        }

        if let Some(ref default) = field.default {
            prop.insert("default".into(), default.to_json());
        }

        if field.field_type.repetition == Repetition::Optional {
            prop.insert("nullable".into(), json!(true));
        }

        if let Some(ref desc) = field.description {
            prop.insert("description".into(), json!(desc));
        }

        if let Some(ge) = field.ge {
            prop.insert("minimum".into(), json!(ge));
        }
        if let Some(le) = field.le {
            prop.insert("maximum".into(), json!(le));
        }
        if let Some(min_len) = field.min_length {
            prop.insert("minLength".into(), json!(min_len));
        }
        if let Some(max_len) = field.max_length {
            prop.insert("maxLength".into(), json!(max_len));
        }
        if let Some(ref regex) = field.regex {
            prop.insert("pattern".into(), json!(regex));
        }
        if field.deprecated == Some(true) {
            prop.insert("deprecated".into(), json!(true));
        }

        properties.insert(name.clone(), Value::Object(prop));
    }

    let mut input_schema = json!({
        "title": title,
        "type": "object",
        "properties": properties,
    });

    if !required.is_empty()
        && let Some(obj) = input_schema.as_object_mut()
    {
        obj.insert("required".into(), Value::Array(required));
    }

    (input_schema, enum_schemas)
}

// ---------------------------------------------------------------------------
// Post-processing fixups (both idempotent)
// ---------------------------------------------------------------------------

/// Remove `title` from any object that also carries `$ref` — OpenAPI 3.0
/// forbids sibling keywords next to `$ref`.
pub fn remove_title_next_to_ref(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if map.contains_key("$ref") {
                map.remove("title");
            }
            for (_, v) in map.iter_mut() {
                remove_title_next_to_ref(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                remove_title_next_to_ref(v);
            }
        }
        _ => {}
    }
}

/// Rewrite `{"anyOf": [{"type": T}, {"type": "null"}]}` into
/// `{"type": T, "nullable": true}` — OpenAPI 3.0 has no null type.
/// Sibling keys other than `anyOf` are preserved.
pub fn fix_nullable_anyof(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                fix_nullable_anyof(v);
            }

            if let Some(Value::Array(variants)) = map.get("anyOf")
                && variants.len() == 2
                && variants
                    .iter()
                    .any(|v| v.get("type").and_then(Value::as_str) == Some("null"))
                && let Some(non_null) = variants
                    .iter()
                    .find(|v| v.get("type").and_then(Value::as_str) != Some("null"))
                && let Value::Object(inner) = non_null.clone()
            {
                map.remove("anyOf");
                map.extend(inner);
                map.insert("nullable".into(), json!(true));
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                fix_nullable_anyof(v);
            }
        }
        _ => {}
    }
}
