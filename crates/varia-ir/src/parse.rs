use crate::types::{Model, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
}

/// Parse and validate a JSON model document.
pub fn parse_model(json: &str) -> Result<Model, ParseError> {
    let model: Model = serde_json::from_str(json)?;
    model.validate()?;
    Ok(model)
}
