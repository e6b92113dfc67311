//! Reading a terminal task payload

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys the generated image URL may appear under, in priority order
const IMAGE_URL_KEYS: [&str; 3] = ["image_url", "imageUrl", "media_url"];

const DEFAULT_FAILURE_REASON: &str = "Generation failed";

/// Outcome of a completed generation task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated asset, taken only from the backend payload
    pub image_url: Option<String>,
    pub analysis: String,
    pub recommendation: String,
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
struct CompletedPayload {
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl GenerationResult {
    /// Extract a result from a `completed` task's payload
    ///
    /// The payload must be an object. `analysis`, `recommendation` and `tags`
    /// may be absent but must have the right type when present.
    pub fn from_payload(payload: &Value) -> Result<Self, String> {
        let object = payload
            .as_object()
            .ok_or_else(|| format!("Completed task carried no result object (got {})", kind_of(payload)))?;

        let parsed: CompletedPayload =
            serde_json::from_value(payload.clone()).map_err(|e| format!("Unreadable task result: {}", e))?;

        let image_url = IMAGE_URL_KEYS
            .iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_str))
            .find(|url| !url.trim().is_empty())
            .map(str::to_string);

        Ok(Self {
            image_url,
            analysis: parsed.analysis.unwrap_or_default(),
            recommendation: parsed.recommendation.unwrap_or_default(),
            tags: parsed.tags.unwrap_or_default(),
        })
    }
}

/// Reason carried by a `failed` task's payload
pub fn failure_reason(payload: &Value) -> String {
    let reason = match payload {
        Value::String(reason) => Some(reason.as_str()),
        Value::Object(object) => ["error", "detail", "message"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str)),
        _ => None,
    };

    reason
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_FAILURE_REASON)
        .to_string()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
