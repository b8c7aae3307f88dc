use serde::Deserialize;
use serde_json::Value;
use shared_types::ConfigurationPatch;

use super::error::ApiError;

pub const DATA_REQUIRED_MESSAGE: &str = "Configuration data is required";
pub const SAVED_MESSAGE: &str = "Configuration saved successfully";

/// Query string of `GET /config/json`
#[derive(Debug, Deserialize)]
pub struct ResolvedParams {
    pub country: Option<String>,
}

/// Turns a raw write body into a patch.
///
/// Empty bodies, `null` and `{}` carry no data and are rejected.
pub fn parse_patch(body: &[u8]) -> Result<ConfigurationPatch, ApiError> {
    let required = || ApiError::Validation(DATA_REQUIRED_MESSAGE.to_string());

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(required());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))?;

    match value {
        Value::Null => Err(required()),
        Value::Object(ref fields) if fields.is_empty() => Err(required()),
        Value::Object(_) => serde_json::from_value(value)
            .map_err(|e| ApiError::Validation(format!("Invalid configuration data: {e}"))),
        _ => Err(ApiError::Validation(
            "Configuration data must be a JSON object".to_string(),
        )),
    }
}

/// Accepts `3` as well as `v3`, the form history keys are stored under
pub fn parse_version(raw: &str) -> Result<u64, ApiError> {
    raw.strip_prefix('v')
        .unwrap_or(raw)
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid version '{raw}'")))
}
