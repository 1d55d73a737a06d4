//! Password-based payload encryption
//!
//! Envelope format:
//!
//! ```text
//! string:<base64(salt[16] || nonce[12] || AES-256-GCM(text))>
//! buffer:<base64(salt[16] || nonce[12] || AES-256-GCM(base64(bytes)))>
//! ```
//!
//! The discriminator tells the decrypting side whether to hand back text or
//! to base64-decode the decrypted payload into raw bytes. Content that is
//! valid UTF-8 always travels as `string:` to avoid the base64 overhead.
//! The key is derived per envelope with Argon2id over a random salt.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Discriminator for text envelopes
pub const STRING_PREFIX: &str = "string:";
/// Discriminator for binary envelopes
pub const BUFFER_PREFIX: &str = "buffer:";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

/// Errors produced while sealing or opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Authentication failed: wrong password or tampered ciphertext
    #[error("wrong password or corrupted ciphertext")]
    Authentication,

    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("key derivation failed: {message}")]
    KeyDerivation { message: String },

    #[error("encryption failed: {message}")]
    Encryption { message: String },
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for CipherParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl CipherParams {
    /// Minimal cost. Only suitable for tests and benchmarks.
    pub fn low_cost() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Decrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plaintext {
    Text(String),
    Binary(Vec<u8>),
}

impl Plaintext {
    /// Classify bytes: valid UTF-8 becomes text, anything else stays binary.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// Encrypts and decrypts vault payloads with one password.
#[derive(Clone)]
pub struct Cipher {
    password: Zeroizing<String>,
    params: CipherParams,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("password", &"<redacted>")
            .field("params", &self.params)
            .finish()
    }
}

impl Cipher {
    pub fn new(password: impl Into<String>) -> Self {
        Self::with_params(password, CipherParams::default())
    }

    pub fn with_params(password: impl Into<String>, params: CipherParams) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            params,
        }
    }

    pub fn params(&self) -> CipherParams {
        self.params
    }

    /// Seal arbitrary bytes into an envelope.
    pub fn encrypt(&self, content: &[u8]) -> Result<String, CipherError> {
        match std::str::from_utf8(content) {
            Ok(text) => self.seal(STRING_PREFIX, text.as_bytes()),
            Err(_) => {
                let encoded = STANDARD.encode(content);
                self.seal(BUFFER_PREFIX, encoded.as_bytes())
            }
        }
    }

    /// Seal text into a `string:` envelope.
    pub fn encrypt_text(&self, text: &str) -> Result<String, CipherError> {
        self.seal(STRING_PREFIX, text.as_bytes())
    }

    /// Open an envelope.
    pub fn decrypt(&self, envelope: &str) -> Result<Plaintext, CipherError> {
        let (binary, body) = if let Some(body) = envelope.strip_prefix(STRING_PREFIX) {
            (false, body)
        } else if let Some(body) = envelope.strip_prefix(BUFFER_PREFIX) {
            (true, body)
        } else {
            return Err(CipherError::MalformedEnvelope {
                reason: "missing string:/buffer: discriminator".into(),
            });
        };

        let sealed = STANDARD
            .decode(body.trim())
            .map_err(|e| CipherError::MalformedEnvelope {
                reason: format!("ciphertext is not base64: {e}"),
            })?;
        if sealed.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(CipherError::MalformedEnvelope {
                reason: format!("ciphertext too short ({} bytes)", sealed.len()),
            });
        }

        let (salt, rest) = sealed.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let key = self.derive_key(salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| {
            CipherError::KeyDerivation {
                message: e.to_string(),
            }
        })?;
        let opened = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| CipherError::Authentication)?,
        );

        let text = std::str::from_utf8(&opened).map_err(|_| CipherError::MalformedEnvelope {
            reason: "decrypted payload is not UTF-8".into(),
        })?;

        if binary {
            let bytes = STANDARD
                .decode(text)
                .map_err(|e| CipherError::MalformedEnvelope {
                    reason: format!("binary payload is not base64: {e}"),
                })?;
            Ok(Plaintext::Binary(bytes))
        } else {
            Ok(Plaintext::Text(text.to_string()))
        }
    }

    fn seal(&self, prefix: &str, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| {
            CipherError::KeyDerivation {
                message: e.to_string(),
            }
        })?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CipherError::Encryption {
                message: e.to_string(),
            })?;

        let mut sealed = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{prefix}{}", STANDARD.encode(sealed)))
    }

    fn derive_key(&self, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, CipherError> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CipherError::KeyDerivation {
            message: e.to_string(),
        })?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.password.as_bytes(), salt, key.as_mut_slice())
            .map_err(|e| CipherError::KeyDerivation {
                message: e.to_string(),
            })?;
        Ok(key)
    }
}

/// Seal `content` with `password` using default cost parameters.
pub fn encrypt(content: &[u8], password: &str) -> Result<String, CipherError> {
    Cipher::new(password).encrypt(content)
}

/// Open an envelope sealed with `password` using default cost parameters.
pub fn decrypt(envelope: &str, password: &str) -> Result<Plaintext, CipherError> {
    Cipher::new(password).decrypt(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cipher(password: &str) -> Cipher {
        Cipher::with_params(password, CipherParams::low_cost())
    }

    #[test]
    fn text_roundtrip_uses_string_envelope() {
        let c = cipher("hunter2");
        let envelope = c.encrypt(b"# Title\n\nbody").unwrap();

        assert!(envelope.starts_with(STRING_PREFIX));
        assert_eq!(
            c.decrypt(&envelope).unwrap(),
            Plaintext::Text("# Title\n\nbody".into())
        );
    }

    #[test]
    fn binary_roundtrip_uses_buffer_envelope() {
        let c = cipher("hunter2");
        let png_header = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0xFF, 0x00];
        let envelope = c.encrypt(&png_header).unwrap();

        assert!(envelope.starts_with(BUFFER_PREFIX));
        assert_eq!(c.decrypt(&envelope).unwrap(), Plaintext::Binary(png_header));
    }

    #[test]
    fn empty_content_roundtrips() {
        let c = cipher("pw");
        let envelope = c.encrypt(b"").unwrap();
        assert_eq!(c.decrypt(&envelope).unwrap(), Plaintext::Text(String::new()));
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let c = cipher("pw");
        assert_ne!(c.encrypt(b"same").unwrap(), c.encrypt(b"same").unwrap());
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let envelope = cipher("right").encrypt(b"secret").unwrap();
        assert_eq!(
            cipher("wrong").decrypt(&envelope).unwrap_err(),
            CipherError::Authentication
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher("pw");
        let envelope = c.encrypt(b"secret note").unwrap();
        let body = envelope.strip_prefix(STRING_PREFIX).unwrap();
        let mut sealed = STANDARD.decode(body).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let tampered = format!("{STRING_PREFIX}{}", STANDARD.encode(sealed));

        assert_eq!(c.decrypt(&tampered).unwrap_err(), CipherError::Authentication);
    }

    #[test]
    fn missing_discriminator_is_malformed() {
        let err = cipher("pw").decrypt("U2FsdGVkX1+abc").unwrap_err();
        assert!(matches!(err, CipherError::MalformedEnvelope { .. }));
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        let err = cipher("pw").decrypt("string:AAAA").unwrap_err();
        assert!(matches!(err, CipherError::MalformedEnvelope { .. }));
    }

    #[test]
    fn plaintext_classification() {
        assert!(!Plaintext::from_bytes(b"text".to_vec()).is_binary());
        assert!(Plaintext::from_bytes(vec![0xC3, 0x28]).is_binary());
        assert_eq!(Plaintext::from_bytes(vec![0xC3, 0x28]).into_bytes(), vec![0xC3, 0x28]);
    }
}
