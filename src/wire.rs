use serde::Deserialize;
use serde_json::Value;

/// Error body returned by a remote API on a non-2xx status.
///
/// Accepts flat `code`/`message`, `errorCode`/`errorMessage` and a nested
/// `error` that is either a string or an object with the same fields.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, alias = "errorCode", alias = "error_code")]
    pub code: Option<Value>,
    #[serde(
        default,
        alias = "errorMessage",
        alias = "error_message",
        alias = "error_description"
    )]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Text(String),
    Detail {
        #[serde(default, alias = "errorCode")]
        code: Option<Value>,
        #[serde(default, alias = "errorMessage")]
        message: Option<String>,
    },
}

impl ErrorPayload {
    pub fn code(&self) -> Option<String> {
        let nested = match &self.error {
            Some(ErrorField::Detail { code, .. }) => code.as_ref(),
            _ => None,
        };
        self.code.as_ref().or(nested).and_then(code_text)
    }

    pub fn message(&self) -> Option<String> {
        let nested = match &self.error {
            Some(ErrorField::Text(text)) => Some(text),
            Some(ErrorField::Detail { message, .. }) => message.as_ref(),
            None => None,
        };
        self.message.as_ref().or(nested).cloned()
    }
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorPayload;

    fn parse(body: &str) -> ErrorPayload {
        serde_json::from_str(body).expect("payload must parse")
    }

    #[test]
    fn flat_payload() {
        let payload = parse(r#"{"code": "ORDER_EXISTS", "message": "duplicate"}"#);
        assert_eq!(payload.code().as_deref(), Some("ORDER_EXISTS"));
        assert_eq!(payload.message().as_deref(), Some("duplicate"));
    }

    #[test]
    fn camel_case_payload_with_numeric_code() {
        let payload = parse(r#"{"errorCode": 4001, "errorMessage": "insufficient funds"}"#);
        assert_eq!(payload.code().as_deref(), Some("4001"));
        assert_eq!(payload.message().as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn nested_payloads() {
        let text = parse(r#"{"error": "unauthorized"}"#);
        assert_eq!(text.code(), None);
        assert_eq!(text.message().as_deref(), Some("unauthorized"));

        let detail = parse(r#"{"error": {"code": "E1", "message": "bad"}}"#);
        assert_eq!(detail.code().as_deref(), Some("E1"));
        assert_eq!(detail.message().as_deref(), Some("bad"));
    }
}
