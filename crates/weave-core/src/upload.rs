//! Version upload
//!
//! Turns an already-encrypted payload plus its lineage into a signed ledger
//! record. Nothing here touches metadata: callers update their maps only
//! once a concrete identifier comes back.

use std::sync::Arc;

use weave_ledger::{CredentialProvider, LedgerSubmit, Tags, VersionTags};

use crate::{Error, Result};

/// Submits file versions and vault records under the connected credential.
#[derive(Clone)]
pub struct UploadClient {
    ledger: Arc<dyn LedgerSubmit>,
    credentials: Arc<CredentialProvider>,
    vault_name: String,
}

impl UploadClient {
    pub fn new(
        ledger: Arc<dyn LedgerSubmit>,
        credentials: Arc<CredentialProvider>,
        vault_name: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            credentials,
            vault_name: vault_name.into(),
        }
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    /// Address of the connected credential, if any.
    pub fn signer(&self) -> Option<String> {
        self.credentials
            .credential()
            .map(|credential| credential.address().to_string())
    }

    /// Upload one file version and return the identifier the ledger assigned.
    ///
    /// # Errors
    ///
    /// - [`Error::NoWallet`] when no credential is connected; nothing is sent
    /// - [`Error::Upload`] on transport failure or any status other than 200
    pub async fn upload(&self, version: &VersionTags, payload: Vec<u8>) -> Result<String> {
        let tags = version.to_tags(&self.vault_name);
        let id = self.submit_tagged(&version.path, payload, tags).await?;
        tracing::info!(
            path = %version.path,
            id = %id,
            version = version.version_number,
            previous = ?version.previous_version_id,
            "version uploaded"
        );
        Ok(id)
    }

    /// Sign and submit an arbitrary tagged record. `label` names the record
    /// in errors.
    pub async fn submit_tagged(&self, label: &str, payload: Vec<u8>, tags: Tags) -> Result<String> {
        let credential = self.credentials.require().map_err(|_| Error::NoWallet)?;
        let bytes = payload.len();

        let receipt = self
            .ledger
            .submit(payload, tags, &credential)
            .await
            .map_err(|e| Error::Upload {
                path: label.to_string(),
                message: e.to_string(),
            })?;

        if !receipt.is_success() {
            tracing::warn!(label, status = receipt.status, "ledger rejected submission");
            return Err(Error::Upload {
                path: label.to_string(),
                message: format!("ledger responded with status {}", receipt.status),
            });
        }

        tracing::debug!(label, id = %receipt.id, bytes, "record submitted");
        Ok(receipt.id)
    }
}
