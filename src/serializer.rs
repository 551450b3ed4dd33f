//! Session ⇄ string serialization.
//!
//! Plaintext layout: `urlencode(key)=urlencode(value);` per pair, where the
//! value is rendered by an [`ObjectSerializer`]. The encrypted form wraps that
//! as `base64(hmac(ciphertext)) + ciphertext`.
//!
//! Tampered or undecryptable payloads deserialize to an empty session. No
//! error reaches the caller.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::config::Config;
use crate::crypto::{CryptoConfig, base64_len, hmac_matches};
use crate::error::SessionError;
use crate::session::Session;

const RECORD_SEPARATOR: char = ';';
const PAIR_SEPARATOR: char = '=';

/// Renders individual session values.
pub trait ObjectSerializer: Send + Sync {
    fn serialize(&self, value: &serde_json::Value) -> Result<String, SessionError>;
    fn deserialize(&self, raw: &str) -> Result<serde_json::Value, SessionError>;
}

/// JSON text for each value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectSerializer;

impl ObjectSerializer for JsonObjectSerializer {
    fn serialize(&self, value: &serde_json::Value) -> Result<String, SessionError> {
        serde_json::to_string(value).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn deserialize(&self, raw: &str) -> Result<serde_json::Value, SessionError> {
        serde_json::from_str(raw).map_err(|e| SessionError::Serialization(e.to_string()))
    }
}

/// Turns a whole session into the opaque `Data` attribute and back.
pub trait SessionSerializer: Send + Sync {
    fn serialize(&self, session: &Session) -> Result<String, SessionError>;
    fn deserialize(&self, data: &str) -> Session;
}

/// `k=v;` pairs with no encryption envelope.
pub struct PlainSessionSerializer {
    objects: Arc<dyn ObjectSerializer>,
}

impl PlainSessionSerializer {
    pub fn new(objects: Arc<dyn ObjectSerializer>) -> Self {
        Self { objects }
    }
}

impl Default for PlainSessionSerializer {
    fn default() -> Self {
        Self::new(Arc::new(JsonObjectSerializer))
    }
}

impl SessionSerializer for PlainSessionSerializer {
    fn serialize(&self, session: &Session) -> Result<String, SessionError> {
        encode_pairs(session, self.objects.as_ref())
    }

    fn deserialize(&self, data: &str) -> Session {
        decode_pairs(data, self.objects.as_ref())
    }
}

/// Encrypt-then-HMAC over the plain layout.
pub struct EncryptedSessionSerializer {
    crypto: CryptoConfig,
    objects: Arc<dyn ObjectSerializer>,
}

impl EncryptedSessionSerializer {
    pub fn new(crypto: CryptoConfig, objects: Arc<dyn ObjectSerializer>) -> Self {
        Self { crypto, objects }
    }

    fn encrypt(&self, clear_text: &str) -> Result<String, SessionError> {
        let encrypted = self.crypto.encryption.encrypt(clear_text)?;
        let hmac = self.crypto.hmac.generate_hmac(encrypted.as_bytes());
        Ok(format!("{}{}", STANDARD.encode(hmac), encrypted))
    }

    fn decrypt(&self, cipher_text: &str) -> Option<String> {
        let hmac_length = self.crypto.hmac.hmac_length();
        let prefix_length = base64_len(hmac_length);

        if cipher_text.len() < prefix_length || !cipher_text.is_char_boundary(prefix_length) {
            tracing::warn!("Session payload has no HMAC prefix, discarding");
            return None;
        }

        let (hmac_part, encrypted) = cipher_text.split_at(prefix_length);
        let Ok(received) = STANDARD.decode(hmac_part) else {
            tracing::warn!("Session HMAC prefix is not valid base64, discarding");
            return None;
        };
        let expected = self.crypto.hmac.generate_hmac(encrypted.as_bytes());

        if !hmac_matches(&expected, &received, hmac_length) {
            tracing::warn!("Session HMAC mismatch, discarding payload");
            return None;
        }

        let clear_text = self.crypto.encryption.decrypt(encrypted);
        if clear_text.is_none() {
            tracing::warn!("Session payload failed to decrypt, discarding");
        }
        clear_text
    }
}

impl SessionSerializer for EncryptedSessionSerializer {
    fn serialize(&self, session: &Session) -> Result<String, SessionError> {
        let clear_text = encode_pairs(session, self.objects.as_ref())?;
        self.encrypt(&clear_text)
    }

    fn deserialize(&self, data: &str) -> Session {
        if data.is_empty() {
            return Session::new();
        }
        match self.decrypt(data) {
            Some(clear_text) => decode_pairs(&clear_text, self.objects.as_ref()),
            None => Session::new(),
        }
    }
}

/// Pick the serializer the configuration asks for.
pub fn from_config(config: &Config) -> Arc<dyn SessionSerializer> {
    let objects: Arc<dyn ObjectSerializer> = Arc::new(JsonObjectSerializer);
    if config.encrypt_sessions {
        Arc::new(EncryptedSessionSerializer::new(
            CryptoConfig::from_secret(&config.session_secret),
            objects,
        ))
    } else {
        Arc::new(PlainSessionSerializer::new(objects))
    }
}

fn encode_pairs(session: &Session, objects: &dyn ObjectSerializer) -> Result<String, SessionError> {
    let mut out = String::new();
    for (key, value) in session.iter() {
        let rendered = objects.serialize(value)?;
        out.push_str(&urlencoding::encode(key));
        out.push(PAIR_SEPARATOR);
        out.push_str(&urlencoding::encode(&rendered));
        out.push(RECORD_SEPARATOR);
    }
    Ok(out)
}

fn decode_pairs(clear_text: &str, objects: &dyn ObjectSerializer) -> Session {
    let mut data = HashMap::new();

    for token in clear_text.split(RECORD_SEPARATOR).filter(|t| !t.is_empty()) {
        let Some((raw_key, raw_value)) = token.split_once(PAIR_SEPARATOR) else {
            tracing::debug!("Skipping session token without '='");
            continue;
        };
        let (Ok(key), Ok(value)) = (urlencoding::decode(raw_key), urlencoding::decode(raw_value))
        else {
            tracing::debug!("Skipping session token with bad percent-encoding");
            continue;
        };
        match objects.deserialize(&value) {
            Ok(value) => {
                data.insert(key.into_owned(), value);
            }
            Err(e) => tracing::debug!("Skipping session value for {}: {}", key, e),
        }
    }

    Session::from_map(data)
}
