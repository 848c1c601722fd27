use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse Python source: {0}")]
    ParseError(String),

    #[error("predictor not found: {0}")]
    PredictorNotFound(String),

    #[error("predict/train method not found on {0}")]
    MethodNotFound(String),

    #[error("missing return type annotation on {method}")]
    MissingReturnType { method: String },

    #[error("missing type annotation for parameter '{param}' on {method}")]
    MissingTypeAnnotation { method: String, param: String },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error(
        "default_factory is not supported in Input() — use a literal default value instead (parameter '{param}')"
    )]
    DefaultFactoryNotSupported { param: String },

    #[error("invalid constraint on parameter '{param}': {reason}")]
    InvalidConstraint { param: String, reason: String },

    #[error(
        "invalid predict reference '{0}' — expected format: file.py:ClassName or file.py:function_name"
    )]
    InvalidPredictRef(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported output type: Optional (or a union with None) is not allowed as a return type")]
    OptionalOutput,

    #[error("unsupported output type: union types are not allowed as a return type")]
    UnionOutput,

    #[error("ConcatenateIterator element type must be str, got {0}")]
    ConcatIteratorNotStr(String),

    #[error(
        "choices for parameter '{param}' cannot be statically resolved — use a literal list, \
         a module-level list constant, list(CONST.keys()/values()) over a module-level dict, \
         or a '+' concatenation of those"
    )]
    ChoicesNotResolvable { param: String },

    #[error(
        "default value for parameter '{param}' cannot be statically resolved: `{expr}`. \
         Defaults must be literals (string, int, float, bool, None, list) or module-level constants"
    )]
    DefaultNotResolvable { param: String, expr: String },

    #[error(
        "type '{symbol}' is imported from '{module}' and cannot be resolved statically — \
         define it locally as a BaseModel subclass, or avoid '{symbol}' in the signature"
    )]
    ExternalType { symbol: String, module: String },

    #[error(
        "unknown type '{symbol}' — expected a builtin (str, int, float, bool), a cog type \
         (Path, File, Secret), or a BaseModel subclass defined in the predictor's source"
    )]
    UnknownType { symbol: String },

    #[error("type annotation is nested too deeply (limit: {limit} levels)")]
    NestingTooDeep { limit: usize },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
