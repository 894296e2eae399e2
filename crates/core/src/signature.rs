//! HMAC-SHA256 webhook signatures.
//!
//! Each provider signs deliveries with HMAC-SHA256 but encodes the digest
//! differently (base64 or hex). Verification is length-checked first and
//! then compared in constant time by [`Mac::verify_slice`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Text encoding of a signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    Base64,
    Hex,
}

impl SignatureEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    fn decode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Base64 => STANDARD.decode(text).ok(),
            Self::Hex => hex::decode(text).ok(),
        }
    }

    /// Length of an encoded SHA-256 digest.
    fn digest_len(self) -> usize {
        match self {
            Self::Base64 => 44,
            Self::Hex => 64,
        }
    }
}

fn mac_over(secret: &[u8], message: &[u8]) -> HmacSha256 {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    mac
}

/// Compute the encoded HMAC-SHA256 of `message` under `secret`.
pub fn sign_hmac_sha256(secret: &[u8], message: &[u8], encoding: SignatureEncoding) -> String {
    encoding.encode(&mac_over(secret, message).finalize().into_bytes())
}

/// Check a provided signature against `message`.
///
/// Empty secrets, empty or wrongly sized signatures, and undecodable text
/// are rejected before any digest comparison happens.
pub fn verify_hmac_sha256(
    secret: &[u8],
    message: &[u8],
    provided: &str,
    encoding: SignatureEncoding,
) -> bool {
    let provided = provided.trim();
    if secret.is_empty() || provided.len() != encoding.digest_len() {
        return false;
    }
    let Some(provided_bytes) = encoding.decode(provided) else {
        return false;
    };
    mac_over(secret, message).verify_slice(&provided_bytes).is_ok()
}
