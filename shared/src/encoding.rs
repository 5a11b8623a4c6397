//! Text encoding for binary payloads embedded in replay programs
//!
//! Standard 64-symbol alphabet with `=`/`==` padding. [`decode`] validates
//! the same conditions as the decode routine carried by the replay program,
//! so a capture that decodes here also loads there.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use thiserror::Error;

/// The 64-symbol alphabet, in value order
pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Decoder that ignores stray low bits in the final symbol, as the replay
/// program's decoder does
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Errors raised while decoding embedded binary text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("encoded length {0} is not a multiple of 4")]
    InvalidLength(usize),

    #[error("padding at position {0} is not at the end of the input")]
    InvalidPadding(usize),

    #[error("invalid character at position {index}")]
    InvalidCharacter { index: usize },
}

/// Encode bytes as padded text
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded text back into exactly the bytes it was encoded from
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = text.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }

    let padding = bytes.iter().rev().take(2).take_while(|&&b| b == b'=').count();
    let body = bytes.len() - padding;

    for (index, &b) in bytes[..body].iter().enumerate() {
        if b == b'=' {
            return Err(DecodeError::InvalidPadding(index));
        }
        if !ALPHABET.as_bytes().contains(&b) {
            return Err(DecodeError::InvalidCharacter { index });
        }
    }

    LENIENT
        .decode(bytes)
        .map_err(|_| DecodeError::InvalidCharacter {
            index: body.saturating_sub(1),
        })
}
