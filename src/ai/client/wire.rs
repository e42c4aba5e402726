//! Backend wire format
//!
//! Request/response JSON for the `generateContent` endpoint. Conversation
//! contents and tool declarations are built by callers and passed through
//! untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// Request
// =============================================================================

/// A generation request as callers build it
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    /// Conversation turns, passed through as-is
    pub contents: Value,
    /// Tool declarations, passed through as-is
    pub tools: Option<Value>,
}

impl GenerateRequest {
    pub fn new(contents: Value) -> Self {
        Self {
            system_instruction: None,
            contents,
            tools: None,
        }
    }

    /// Single user turn with plain text
    pub fn from_prompt(prompt: &str) -> Self {
        Self::new(json!([{ "role": "user", "parts": [{ "text": prompt }] }]))
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Value) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Serialized wire body
    pub fn to_wire(&self, thinking_budget: Option<u32>) -> Value {
        let wire = WireRequest {
            system_instruction: self.system_instruction.as_deref().map(|text| WireContent {
                parts: vec![WirePart { text }],
            }),
            contents: &self.contents,
            tools: self.tools.as_ref(),
            generation_config: thinking_budget.map(|budget| GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: budget,
                },
            }),
        };
        // Serialization of these borrowed JSON values cannot fail
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    contents: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

// =============================================================================
// Response
// =============================================================================

/// Successful response body
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub candidates: Value,
    #[serde(default)]
    pub usage_metadata: Option<Value>,
}

impl GenerateResponse {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Concatenated text of the first candidate, skipping thought parts
    pub fn text(&self) -> Option<String> {
        let parts = self
            .candidates
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        (!text.is_empty()).then_some(text)
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage_metadata
            .as_ref()?
            .get("totalTokenCount")?
            .as_u64()
    }
}

// =============================================================================
// Error Body
// =============================================================================

/// Backend error, normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Parse a non-2xx body. `code` may be a string or number; a body without a
/// parseable `error` object becomes `HTTP_ERROR`.
pub fn parse_error_body(http_status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => ApiError {
            code: match error.code {
                Some(Value::String(s)) => s,
                Some(Value::Number(n)) => n.to_string(),
                _ => "UNKNOWN_ERROR".to_string(),
            },
            message: error.message.unwrap_or_else(|| "Unknown error".to_string()),
            status: error.status,
        },
        Err(_) => ApiError {
            code: "HTTP_ERROR".to_string(),
            message: format!("HTTP {}: {}", http_status, body),
            status: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_request_shape() {
        let request = GenerateRequest::from_prompt("build a todo app")
            .with_system_instruction("You are an app planner")
            .with_tools(json!([{ "functionDeclarations": [] }]));
        let wire = request.to_wire(Some(10_000));

        assert_eq!(
            wire["systemInstruction"]["parts"][0]["text"],
            "You are an app planner"
        );
        assert_eq!(wire["contents"][0]["parts"][0]["text"], "build a todo app");
        assert!(wire["tools"].is_array());
        assert_eq!(
            wire["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            10_000
        );
    }

    #[test]
    fn test_wire_request_omits_absent_fields() {
        let wire = GenerateRequest::from_prompt("hi").to_wire(None);
        let obj = wire.as_object().unwrap();
        assert!(!obj.contains_key("systemInstruction"));
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("generationConfig"));
    }

    #[test]
    fn test_response_text_skips_thoughts() {
        let response = GenerateResponse::parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"thinking...","thought":true},
                {"text":"Hello"},
                {"text":", world"}
            ]}}],"usageMetadata":{"totalTokenCount":42}}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello, world"));
        assert_eq!(response.total_tokens(), Some(42));
    }

    #[test]
    fn test_response_without_candidates_is_error() {
        assert!(GenerateResponse::parse(r#"{"usageMetadata":{}}"#).is_err());
    }

    #[test]
    fn test_error_body_code_normalization() {
        let numeric = parse_error_body(
            403,
            r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#,
        );
        assert_eq!(numeric.code, "403");
        assert_eq!(numeric.status.as_deref(), Some("PERMISSION_DENIED"));

        let text = parse_error_body(400, r#"{"error":{"code":"INVALID_API_KEY","message":"bad"}}"#);
        assert_eq!(text.code, "INVALID_API_KEY");
        assert_eq!(text.message, "bad");
    }

    #[test]
    fn test_error_body_fallback() {
        let err = parse_error_body(502, "<html>bad gateway</html>");
        assert_eq!(err.code, "HTTP_ERROR");
        assert_eq!(err.message, "HTTP 502: <html>bad gateway</html>");
    }
}
