// Payload codecs for show/pop decoding

use crate::errors::BoardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload decoding format. `Plain` passes the bytes through as a string
/// value; `Json` parses them into a structured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Plain,
    Json,
}

impl FromStr for Format {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Format::Plain),
            "json" => Ok(Format::Json),
            other => Err(BoardError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Plain => write!(f, "plain"),
            Format::Json => write!(f, "json"),
        }
    }
}

/// Decode a raw payload with the given format. A parse failure is a caller
/// data error (`Malformed`), not a store error.
pub fn decode(format: Format, raw: &str) -> Result<serde_json::Value, BoardError> {
    match format {
        Format::Plain => Ok(serde_json::Value::String(raw.to_string())),
        Format::Json => Ok(serde_json::from_str(raw)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_is_identity() {
        let value = decode(Format::Plain, "hello").unwrap();
        assert_eq!(value, json!("hello"));
    }

    #[test]
    fn test_json_parses_structure() {
        let value = decode(Format::Json, r#"{"to":"a@b"}"#).unwrap();
        assert_eq!(value, json!({"to": "a@b"}));
    }

    #[test]
    fn test_json_parse_failure_is_malformed() {
        let result = decode(Format::Json, "{not json");
        assert!(matches!(result, Err(BoardError::Malformed(_))));
    }

    #[test]
    fn test_unknown_format_name() {
        let result = "yaml".parse::<Format>();
        assert!(matches!(result, Err(BoardError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_known_format_names() {
        assert_eq!("plain".parse::<Format>().unwrap(), Format::Plain);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
    }
}
