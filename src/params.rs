//! Template parameter envelopes.
//!
//! Template parameters are declared as plain `name -> string` maps but travel
//! to the fulfillment API as self-describing envelopes carrying a type tag and
//! a payload. This module converts between the two shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Type tag of a string-valued parameter.
pub const STRING_VALUE_TYPE_URL: &str = "type.googleapis.com/google.protobuf.StringValue";

/// A tagged parameter value as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag identifying the payload.
    #[serde(rename = "@type")]
    pub type_url: String,
    /// Payload.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Parameter types the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A UTF-8 string.
    String,
}

impl ParameterKind {
    /// Returns the type tag for this kind.
    #[must_use]
    pub const fn type_url(self) -> &'static str {
        match self {
            Self::String => STRING_VALUE_TYPE_URL,
        }
    }

    /// Looks up a kind by its type tag.
    #[must_use]
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        match type_url {
            STRING_VALUE_TYPE_URL => Some(Self::String),
            _ => None,
        }
    }
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    /// A string value.
    String(String),
}

impl ParameterValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        match self {
            Self::String(_) => ParameterKind::String,
        }
    }

    /// Wraps the value into an envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented.
    pub fn wrap(&self, name: &str) -> Result<Envelope, ParameterError> {
        let value = match self {
            Self::String(s) => serde_json::to_value(s),
        }
        .map_err(|e| ParameterError::Encoding {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        Ok(Envelope {
            type_url: self.kind().type_url().to_string(),
            value,
        })
    }

    /// Unwraps an envelope into a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is unknown or the payload does not match it.
    pub fn unwrap_envelope(name: &str, envelope: &Envelope) -> Result<Self, ParameterError> {
        let kind = ParameterKind::from_type_url(&envelope.type_url).ok_or_else(|| {
            ParameterError::Decoding {
                name: name.to_string(),
                message: format!("unsupported type tag '{}'", envelope.type_url),
            }
        })?;

        match kind {
            ParameterKind::String => envelope
                .value
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| ParameterError::Decoding {
                    name: name.to_string(),
                    message: format!("expected a string payload, found {}", envelope.value),
                }),
        }
    }

    /// Returns the value as a declared string.
    #[must_use]
    pub fn into_declared(self) -> String {
        match self {
            Self::String(s) => s,
        }
    }
}

/// Encodes declared parameters into wire envelopes.
///
/// A missing map encodes to an empty map.
///
/// # Errors
///
/// Returns an error naming the first parameter that could not be wrapped.
pub fn encode(
    parameters: Option<&BTreeMap<String, String>>,
) -> Result<BTreeMap<String, Envelope>, ParameterError> {
    let Some(parameters) = parameters else {
        return Ok(BTreeMap::new());
    };

    parameters
        .iter()
        .map(|(name, value)| {
            let envelope = ParameterValue::String(value.clone()).wrap(name)?;
            Ok((name.clone(), envelope))
        })
        .collect()
}

/// Decodes wire envelopes back into declared parameters.
///
/// # Errors
///
/// Returns an error naming the first parameter with an unknown tag or an
/// unexpected payload.
pub fn decode(
    envelopes: Option<&BTreeMap<String, Envelope>>,
) -> Result<BTreeMap<String, String>, ParameterError> {
    let Some(envelopes) = envelopes else {
        return Ok(BTreeMap::new());
    };

    envelopes
        .iter()
        .map(|(name, envelope)| {
            let value = ParameterValue::unwrap_envelope(name, envelope)?;
            Ok((name.clone(), value.into_declared()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_encode_missing_and_empty() {
        assert!(encode(None).unwrap().is_empty());
        assert!(encode(Some(&BTreeMap::new())).unwrap().is_empty());
    }

    #[test]
    fn test_encode_wraps_strings() {
        let encoded = encode(Some(&declared(&[("region", "eu-1")]))).unwrap();
        let envelope = &encoded["region"];
        assert_eq!(envelope.type_url, STRING_VALUE_TYPE_URL);
        assert_eq!(envelope.value, serde_json::json!("eu-1"));
    }

    #[test]
    fn test_round_trip() {
        let params = declared(&[("a", ""), ("b", "with spaces"), ("c", "ünïcode")]);
        let encoded = encode(Some(&params)).unwrap();
        assert_eq!(decode(Some(&encoded)).unwrap(), params);
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = ParameterValue::String("x".to_string()).wrap("p").unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "@type": "type.googleapis.com/google.protobuf.StringValue",
                "value": "x"
            })
        );
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut envelopes = BTreeMap::new();
        envelopes.insert(
            "count".to_string(),
            Envelope {
                type_url: "type.googleapis.com/google.protobuf.Int32Value".to_string(),
                value: serde_json::json!(3),
            },
        );

        let err = decode(Some(&envelopes)).unwrap_err();
        assert!(matches!(err, ParameterError::Decoding { ref name, .. } if name == "count"));
    }

    #[test]
    fn test_decode_wrong_payload() {
        let mut envelopes = BTreeMap::new();
        envelopes.insert(
            "flag".to_string(),
            Envelope {
                type_url: STRING_VALUE_TYPE_URL.to_string(),
                value: serde_json::json!(true),
            },
        );

        assert!(matches!(
            decode(Some(&envelopes)),
            Err(ParameterError::Decoding { .. })
        ));
    }
}
