//! Roll-result decoding
//! The accessory delivers each roll as one complete UTF-8 label ("one"
//! through "six"). Decoding is total: anything outside the label set is an
//! error, never a fallback value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded dice face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiceValue {
    #[default]
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
}

impl DiceValue {
    /// The wire label for this face.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Two => "two",
            Self::Three => "three",
            Self::Four => "four",
            Self::Five => "five",
            Self::Six => "six",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "one" => Some(Self::One),
            "two" => Some(Self::Two),
            "three" => Some(Self::Three),
            "four" => Some(Self::Four),
            "five" => Some(Self::Five),
            "six" => Some(Self::Six),
            _ => None,
        }
    }
}

/// Why a roll payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("roll payload is not valid UTF-8: {0}")]
    Malformed(#[from] std::str::Utf8Error),
    #[error("roll label {0:?} is outside the known face set")]
    OutOfDomain(String),
}

/// Decodes one notification payload into a dice face.
pub fn decode_roll(bytes: &[u8]) -> Result<DiceValue, DecodeError> {
    let label = std::str::from_utf8(bytes)?;
    DiceValue::from_label(label).ok_or_else(|| DecodeError::OutOfDomain(label.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_known_label() {
        for value in [
            DiceValue::One,
            DiceValue::Two,
            DiceValue::Three,
            DiceValue::Four,
            DiceValue::Five,
            DiceValue::Six,
        ] {
            let decoded = decode_roll(value.as_label().as_bytes()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = decode_roll(&[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn rejects_labels_outside_the_face_set() {
        for label in ["seven", "ONE", "", "1", "one "] {
            let err = decode_roll(label.as_bytes()).unwrap_err();
            assert!(matches!(err, DecodeError::OutOfDomain(_)), "label {label:?}");
        }
    }

    #[test]
    fn decoding_is_total_over_arbitrary_bytes() {
        // Every input returns Ok or Err, never panics.
        for len in 0..8usize {
            let bytes = vec![0x80u8; len];
            let _ = decode_roll(&bytes);
        }
        let _ = decode_roll(b"three\x00");
    }
}
