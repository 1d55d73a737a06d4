//! Signing credential and its connection state
//!
//! The provider is constructed explicitly and handed to whoever needs to
//! sign. Connecting or disconnecting returns the new [`ConnectionState`]
//! and broadcasts it on a `watch` channel for interested subscribers.

use std::fmt;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Minimum secret length accepted from a key file.
const MIN_SECRET_LEN: usize = 32;

/// A loaded signing credential.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    #[zeroize(skip)]
    address: String,
    secret: Vec<u8>,
}

impl Credential {
    /// Wrap raw secret material. The address is derived from it.
    pub fn from_secret(secret: Vec<u8>) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::InvalidCredential {
                message: format!(
                    "secret is {} bytes, need at least {MIN_SECRET_LEN}",
                    secret.len()
                ),
            });
        }
        let address = URL_SAFE_NO_PAD.encode(Sha256::digest(&secret));
        Ok(Self { address, secret })
    }

    /// Generate a fresh random credential.
    pub fn generate() -> Self {
        let mut secret = vec![0u8; MIN_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        let address = URL_SAFE_NO_PAD.encode(Sha256::digest(&secret));
        Self { address, secret }
    }

    /// Load a key file holding base64url-encoded secret material.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let encoded = std::fs::read_to_string(path)?;
        let secret = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidCredential {
                message: format!("{}: {e}", path.display()),
            })?;
        Self::from_secret(secret)
    }

    /// Encode the secret for writing to a key file.
    pub fn export_key(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.secret)
    }

    /// Public address identifying the signer.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Keyed digest over `message`, standing in for a ledger signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(message);
        hasher.finalize().to_vec()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Whether a signing credential is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected { address: String },
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Holds the active credential and publishes connection changes.
pub struct CredentialProvider {
    credential: RwLock<Option<Credential>>,
    state: watch::Sender<ConnectionState>,
}

impl CredentialProvider {
    /// A provider with no credential loaded.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            credential: RwLock::new(None),
            state,
        }
    }

    /// A provider that starts connected.
    pub fn with_credential(credential: Credential) -> Self {
        let provider = Self::new();
        provider.connect(credential);
        provider
    }

    /// Load a credential, replacing any previous one.
    pub fn connect(&self, credential: Credential) -> ConnectionState {
        let state = ConnectionState::Connected {
            address: credential.address().to_string(),
        };
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self.state.send_replace(state.clone());
        tracing::info!(?state, "credential connected");
        state
    }

    /// Drop the loaded credential.
    pub fn disconnect(&self) -> ConnectionState {
        self.credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!("credential disconnected");
        ConnectionState::Disconnected
    }

    pub fn is_connected(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The active credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The active credential, or [`Error::NoCredential`].
    pub fn require(&self) -> Result<Credential> {
        self.credential().ok_or(Error::NoCredential)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent connection change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Default for CredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            Credential::from_secret(vec![1; 8]),
            Err(Error::InvalidCredential { .. })
        ));
    }

    #[test]
    fn address_is_stable_for_secret() {
        let a = Credential::from_secret(vec![7; 32]).unwrap();
        let b = Credential::from_secret(vec![7; 32]).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"msg"), b.sign(b"msg"));
    }

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential::generate();
        let debug = format!("{credential:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&credential.export_key()));
    }

    #[test]
    fn key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.key");
        let credential = Credential::generate();
        std::fs::write(&path, credential.export_key()).unwrap();

        let loaded = Credential::from_key_file(&path).unwrap();
        assert_eq!(loaded.address(), credential.address());
    }

    #[test]
    fn connect_and_disconnect_transitions() {
        let provider = CredentialProvider::new();
        assert!(!provider.is_connected());
        assert!(matches!(provider.require(), Err(Error::NoCredential)));

        let credential = Credential::generate();
        let address = credential.address().to_string();
        let state = provider.connect(credential);
        assert_eq!(state, ConnectionState::Connected { address });
        assert!(provider.is_connected());

        assert_eq!(provider.disconnect(), ConnectionState::Disconnected);
        assert!(provider.credential().is_none());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let provider = CredentialProvider::new();
        let mut rx = provider.subscribe();

        provider.connect(Credential::generate());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_connected());

        provider.disconnect();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }
}
