//! Payload decryption seam.
//!
//! The cipher itself lives outside this crate: callers plug any
//! implementation of [`CryptoModule`] into the client builder. The decoder
//! calls [`decrypt_payload`] for message and file payloads; encrypted payloads
//! travel as base64 strings, so anything that is not a string is handed to
//! listeners unchanged.

use crate::error::{PulseLinkError, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value as JsonValue;

/// Envelope key under which mobile-push publishes carry their encrypted body.
const PN_OTHER: &str = "pn_other";

/// Symmetric cipher used to protect message payloads end-to-end.
pub trait CryptoModule: Send + Sync {
    /// Encrypt raw bytes.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt raw bytes produced by [`CryptoModule::encrypt`].
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Decrypt a payload received from the service.
///
/// - strings are base64-decoded, decrypted, and parsed back into JSON
///   (falling back to a plain string when the plaintext is not JSON)
/// - objects with a string `pn_other` field get that field decrypted in place
/// - anything else is returned as-is
pub fn decrypt_payload(crypto: &dyn CryptoModule, payload: &JsonValue) -> Result<JsonValue> {
    match payload {
        JsonValue::String(encoded) => decrypt_string(crypto, encoded),
        JsonValue::Object(map) => match map.get(PN_OTHER) {
            Some(JsonValue::String(encoded)) => {
                let mut decrypted = map.clone();
                decrypted.insert(PN_OTHER.to_string(), decrypt_string(crypto, encoded)?);
                Ok(JsonValue::Object(decrypted))
            },
            _ => Ok(payload.clone()),
        },
        _ => Ok(payload.clone()),
    }
}

/// Encrypt a JSON payload into the base64 string form the service relays.
pub fn encrypt_payload(crypto: &dyn CryptoModule, payload: &JsonValue) -> Result<JsonValue> {
    let plaintext = serde_json::to_vec(payload)?;
    let ciphertext = crypto.encrypt(&plaintext)?;
    Ok(JsonValue::String(general_purpose::STANDARD.encode(ciphertext)))
}

fn decrypt_string(crypto: &dyn CryptoModule, encoded: &str) -> Result<JsonValue> {
    let ciphertext = general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| PulseLinkError::CryptoError(format!("Payload is not base64: {}", e)))?;
    let plaintext = crypto.decrypt(&ciphertext)?;
    let text = String::from_utf8(plaintext)
        .map_err(|e| PulseLinkError::CryptoError(format!("Plaintext is not UTF-8: {}", e)))?;
    Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
}
