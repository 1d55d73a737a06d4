//! Remote metadata map
//!
//! The remote copy of the metadata map is itself a ledger record of type
//! `vault-config`, tagged with the vault name. Each publish appends a new
//! snapshot; readers take the newest one they can open.
//!
//! Vault names are not unique across publishers. A snapshot from another
//! signer that does not open under our password, or a plaintext one while
//! this vault encrypts, belongs to someone else and is passed over. Our own
//! signer's snapshots must open.

use weave_ledger::record::{APP_NAME, tag};
use weave_ledger::{RecordHeader, RecordType, Tag, Tags};

use crate::chain::VersionChainClient;
use crate::cipher::{Cipher, CipherError};
use crate::metadata::MetadataMap;
use crate::upload::UploadClient;
use crate::{Error, Result};

/// Name used for the remote map in errors and logs
const LABEL: &str = "vault-config";

/// Reads and publishes the vault's remote metadata map.
#[derive(Clone)]
pub struct RemoteMetadataStore {
    chain: VersionChainClient,
    uploader: UploadClient,
    cipher: Option<Cipher>,
}

impl RemoteMetadataStore {
    pub fn new(chain: VersionChainClient, uploader: UploadClient, cipher: Option<Cipher>) -> Self {
        Self {
            chain,
            uploader,
            cipher,
        }
    }

    fn filters(&self) -> [Tag; 3] {
        [
            Tag::new(tag::APP_NAME, APP_NAME),
            Tag::new(tag::RECORD_TYPE, RecordType::VaultConfig.as_str()),
            Tag::new(tag::VAULT_NAME, self.uploader.vault_name()),
        ]
    }

    /// Load the newest published map this vault can open. `None` if nothing
    /// readable was ever published.
    ///
    /// # Errors
    ///
    /// [`Error::Decryption`] when a snapshot signed by the connected
    /// credential does not open under the configured password.
    pub async fn fetch(&self) -> Result<Option<MetadataMap>> {
        let snapshots = self.chain.tagged(&self.filters()).await?;
        let signer = self.uploader.signer();
        let mut skipped = 0usize;

        for header in snapshots {
            let ours = signer.as_deref() == Some(header.owner.as_str());
            match self.open(&header, ours).await {
                Ok(Some(map)) => {
                    tracing::debug!(id = %header.id, entries = map.len(), ours, "remote map loaded");
                    return Ok(Some(map));
                }
                Ok(None) => skipped += 1,
                Err(e @ Error::Decryption { .. }) if !ours => {
                    tracing::debug!(
                        id = %header.id,
                        owner = %header.owner,
                        error = %e,
                        "skipping snapshot this vault cannot open"
                    );
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            tracing::warn!(
                vault = self.uploader.vault_name(),
                skipped,
                "no remote map under this vault name opens with the configured password"
            );
        } else {
            tracing::debug!(vault = self.uploader.vault_name(), "no remote map published yet");
        }
        Ok(None)
    }

    /// Download and decode one snapshot. `Ok(None)` for a plaintext snapshot
    /// from another signer while this vault encrypts.
    async fn open(&self, header: &RecordHeader, ours: bool) -> Result<Option<MetadataMap>> {
        let encrypted = header.tags.get(tag::ENCRYPTED) != Some("false");
        if !encrypted && self.cipher.is_some() && !ours {
            tracing::debug!(id = %header.id, owner = %header.owner, "skipping foreign plaintext snapshot");
            return Ok(None);
        }

        let payload = self.chain.fetch_payload(&header.id).await?;
        let json = if encrypted {
            let cipher = self.cipher.as_ref().ok_or_else(|| Error::Decryption {
                path: LABEL.to_string(),
                source: CipherError::MalformedEnvelope {
                    reason: "remote map is encrypted but no password is configured".into(),
                },
            })?;
            let envelope = String::from_utf8_lossy(&payload);
            cipher
                .decrypt(&envelope)
                .map_err(|source| Error::Decryption {
                    path: LABEL.to_string(),
                    source,
                })?
                .into_bytes()
        } else {
            payload
        };

        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Append a new snapshot of `map`. Returns the record identifier.
    pub async fn publish(&self, map: &MetadataMap) -> Result<String> {
        let json = serde_json::to_string(map)?;
        let (payload, encrypted) = match &self.cipher {
            Some(cipher) => {
                let envelope = cipher.encrypt_text(&json).map_err(|source| Error::Encryption {
                    path: LABEL.to_string(),
                    source,
                })?;
                (envelope.into_bytes(), true)
            }
            None => (json.into_bytes(), false),
        };

        let tags = Tags::new()
            .with(tag::APP_NAME, APP_NAME)
            .with(tag::RECORD_TYPE, RecordType::VaultConfig.as_str())
            .with(tag::VAULT_NAME, self.uploader.vault_name())
            .with(tag::TIMESTAMP, chrono::Utc::now().timestamp_millis().to_string())
            .with(tag::ENCRYPTED, encrypted.to_string());

        let id = self.uploader.submit_tagged(LABEL, payload, tags).await?;
        tracing::info!(id = %id, entries = map.len(), "remote map published");
        Ok(id)
    }
}
