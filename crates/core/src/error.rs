#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown property '{property}' on widget '{widget}'")]
    UnknownProperty { widget: String, property: String },

    #[error("Property '{property}' on widget '{widget}' is read-only")]
    ReadOnlyProperty { widget: String, property: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
