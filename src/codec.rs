//! Wire payload for price estimates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One price estimate, keyed by brand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Estimate {
    #[serde(rename = "brand")]
    pub group_key: String,
    #[serde(rename = "price")]
    pub value: f64,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed estimate payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parses a UTF-8 JSON payload. Unknown fields are ignored.
pub fn decode(raw: &[u8]) -> Result<Estimate, DecodeError> {
    Ok(serde_json::from_slice(raw)?)
}

pub fn encode(estimate: &Estimate) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let estimate = decode(br#"{"brand":"acme","price":10.5}"#).unwrap();

        assert_eq!(estimate.group_key, "acme");
        assert_eq!(estimate.value, 10.5);
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let estimate = decode(br#"{"brand":"acme","price":3,"currency":"USD"}"#).unwrap();

        assert_eq!(estimate.group_key, "acme");
        assert_eq!(estimate.value, 3.0);
    }

    #[test]
    fn test_decode_rejects_type_mismatch() {
        assert!(matches!(
            decode(br#"{"brand":123}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(decode(br#"{"brand":"acme","price":"cheap"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(decode(br#"{"brand":"acme"}"#).is_err());
        assert!(decode(br#"{"price":1.0}"#).is_err());
        assert!(decode(b"not json").is_err());
    }

    #[test]
    fn test_decode_rejects_out_of_range_price() {
        assert!(matches!(
            decode(br#"{"brand":"acme","price":1e999}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_preserves_wire_names() {
        let estimate = Estimate {
            group_key: "acme".to_string(),
            value: 12.0,
        };

        let raw = encode(&estimate).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();

        assert_eq!(json["brand"], "acme");
        assert_eq!(json["price"], 12.0);
        assert_eq!(decode(&raw).unwrap(), estimate);
    }
}
