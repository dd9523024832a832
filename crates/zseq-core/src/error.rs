//! 核心错误定义

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    #[error("Entity id {0} is out of range")]
    InvalidEntityId(u64),

    #[error("Primitive not found: {0}")]
    PrimitiveNotFound(u64),

    #[error("Unknown diagram element type: {0}")]
    UnknownElementType(String),

    #[error("Unknown element part: {0}")]
    UnknownPart(String),

    #[error("{element} is missing its '{part}' part")]
    MissingPart { element: String, part: String },

    #[error("{element} has an invalid '{part}' part")]
    InvalidPart { element: String, part: String },

    #[error("Activation box at y={y} falls inside the closing margin of the lifeline (limit {limit})")]
    InvalidPlacement { y: f64, limit: f64 },

    #[error("Unknown property '{key}'")]
    UnknownProperty { key: String },

    #[error("Invalid value '{value}' for property '{key}'")]
    InvalidPropertyValue { key: String, value: String },

    #[error("Malformed primitive at index {index}: {source}")]
    MalformedPrimitive {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
