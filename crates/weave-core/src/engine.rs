//! SyncEngine implementation
//!
//! The SyncEngine coordinates state between the vault on disk and the
//! ledger. It owns both metadata maps and drives the per-file flows:
//!
//! - **check / status**: evaluate local files against the remote map
//! - **export**: encrypt and upload changed files, then publish the map once
//! - **import**: fetch, decrypt and write remote versions
//! - **history**: walk a file's version chain

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use weave_fs::{Vault, VaultPath, content_hash};
use weave_ledger::{
    ConnectionState, Credential, CredentialProvider, Ledger, LedgerQuery, LedgerSubmit,
    VersionTags,
};

use crate::chain::{ChainEntry, PreviousVersion, VersionChainClient};
use crate::cipher::{Cipher, CipherError, Plaintext};
use crate::config::SyncConfig;
use crate::evaluate::{SyncStatus, SyncVerdict, evaluate};
use crate::locks::PathLocks;
use crate::metadata::{FileSyncMetadata, MetadataMap, MetadataStore, SyncState};
use crate::remote::RemoteMetadataStore;
use crate::report::{FileOutcome, StatusReport, SyncReport};
use crate::upload::UploadClient;
use crate::{Error, Result};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Dot-prefixed paths hold sync state and are never synced.
fn ensure_visible(path: &VaultPath) -> Result<()> {
    if path.is_hidden() {
        return Err(Error::Fs(weave_fs::Error::InvalidPath {
            path: path.to_string(),
            reason: "hidden paths are not synced".to_string(),
        }));
    }
    Ok(())
}

/// Builder for [`SyncEngine`]
pub struct SyncEngineBuilder {
    vault: Arc<dyn Vault>,
    query: Arc<dyn LedgerQuery>,
    submit: Arc<dyn LedgerSubmit>,
    config: SyncConfig,
    password: Option<String>,
    credentials: Option<Arc<CredentialProvider>>,
    store: Option<MetadataStore>,
    cancel: CancellationToken,
}

impl SyncEngineBuilder {
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn credentials(mut self, credentials: Arc<CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Metadata store to use; defaults to an in-memory one.
    pub fn store(mut self, store: MetadataStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::PasswordRequired`] when encryption is enabled and no
    /// password was given.
    pub fn build(self) -> Result<SyncEngine> {
        if self.config.encrypt && self.password.is_none() {
            return Err(Error::PasswordRequired);
        }

        let cipher = self
            .password
            .map(|password| Cipher::with_params(password, self.config.cipher));
        let credentials = self.credentials.unwrap_or_default();

        let chain = VersionChainClient::new(self.query)
            .with_retry(
                self.config.retry.fetch_policy(),
                self.config.retry.link_policy(),
            )
            .with_cancellation(self.cancel.clone());
        let uploader = UploadClient::new(
            self.submit,
            credentials.clone(),
            self.config.vault_name.clone(),
        );
        let remote = RemoteMetadataStore::new(chain.clone(), uploader.clone(), cipher.clone());

        Ok(SyncEngine {
            vault: self.vault,
            config: self.config,
            cipher,
            credentials,
            chain,
            uploader,
            remote,
            store: Mutex::new(self.store.unwrap_or_else(MetadataStore::in_memory)),
            locks: PathLocks::new(),
            cancel: self.cancel,
        })
    }
}

/// Engine for synchronizing a vault with the ledger
pub struct SyncEngine {
    vault: Arc<dyn Vault>,
    config: SyncConfig,
    cipher: Option<Cipher>,
    credentials: Arc<CredentialProvider>,
    chain: VersionChainClient,
    uploader: UploadClient,
    remote: RemoteMetadataStore,
    store: Mutex<MetadataStore>,
    locks: PathLocks,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn builder<L: Ledger + 'static>(vault: Arc<dyn Vault>, ledger: Arc<L>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            vault,
            query: ledger.clone(),
            submit: ledger,
            config: SyncConfig::default(),
            password: None,
            credentials: None,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    /// Token that aborts in-flight retries and remaining batch items.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Copy of both metadata maps.
    pub async fn state(&self) -> SyncState {
        self.store.lock().await.state.clone()
    }

    pub async fn local_metadata(&self, path: &VaultPath) -> Option<FileSyncMetadata> {
        self.store.lock().await.state.local.get(path).cloned()
    }

    pub async fn remote_metadata(&self, path: &VaultPath) -> Option<FileSyncMetadata> {
        self.store.lock().await.state.remote.get(path).cloned()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Read `path` and evaluate it. Returns the content alongside the verdict.
    async fn inspect(&self, path: &VaultPath) -> Result<(Vec<u8>, SyncVerdict)> {
        let content = self.read_local(path)?;
        let hash = content_hash(&content);
        let modified = self.vault.modified_ms(path)?;

        let store = self.store.lock().await;
        let verdict = evaluate(
            path,
            store.state.local.get(path),
            store.state.remote.get(path),
            &hash,
            modified,
        );
        Ok((content, verdict))
    }

    fn read_local(&self, path: &VaultPath) -> Result<Vec<u8>> {
        self.vault.read_bytes(path).map_err(|e| {
            if e.is_not_found() {
                Error::FileNotFound {
                    path: path.to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    /// Evaluate the sync state of one local file.
    pub async fn check(&self, path: &VaultPath) -> Result<SyncVerdict> {
        Ok(self.inspect(path).await?.1)
    }

    /// Evaluate every local file and list paths that only exist remotely.
    pub async fn status(&self) -> Result<StatusReport> {
        let files = self.vault.list_files()?;
        let mut report = StatusReport::default();
        for path in &files {
            report.files.push(self.check(path).await?);
        }

        let store = self.store.lock().await;
        report.remote_only = store
            .state
            .remote
            .iter()
            .filter(|(path, meta)| meta.is_uploaded() && !self.vault.exists(path))
            .map(|(path, _)| path.clone())
            .collect();
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Export a single file and publish the remote map.
    ///
    /// Returns the specific error on failure rather than a batch report.
    pub async fn export(&self, path: &VaultPath) -> Result<FileOutcome> {
        let remote_before = self.store.lock().await.state.remote.clone();
        let outcome = self.export_one(path).await?;
        if matches!(outcome, FileOutcome::Exported { .. }) {
            self.publish_batch(&remote_before, std::slice::from_ref(path)).await?;
        }
        Ok(outcome)
    }

    /// Export every file in the vault.
    pub async fn export_all(&self) -> Result<SyncReport> {
        self.refresh_remote().await?;
        let paths = self.vault.list_files()?;
        self.export_paths(&paths).await
    }

    /// Export `paths` one after another, collecting per-file failures, then
    /// publish the remote map once.
    pub async fn export_paths(&self, paths: &[VaultPath]) -> Result<SyncReport> {
        let remote_before = self.store.lock().await.state.remote.clone();
        let mut report = SyncReport::new();
        let mut exported = Vec::new();

        for path in paths {
            if self.cancel.is_cancelled() {
                report.push(path.clone(), FileOutcome::Failed(Error::Cancelled));
                continue;
            }
            let outcome = match self.export_one(path).await {
                Ok(outcome) => outcome,
                Err(e) => FileOutcome::Failed(e),
            };
            if matches!(outcome, FileOutcome::Exported { .. }) {
                exported.push(path.clone());
            }
            report.push(path.clone(), outcome);
        }

        if !exported.is_empty() {
            match self.publish_batch(&remote_before, &exported).await {
                Ok(id) => report.published = Some(id),
                Err(e) => report.publish_error = Some(e),
            }
        }

        tracing::info!(summary = %report.summary(), uploaded = exported.len(), "export finished");
        Ok(report)
    }

    async fn export_one(&self, path: &VaultPath) -> Result<FileOutcome> {
        ensure_visible(path)?;
        let _guard = self.locks.lock(path).await;

        let (content, verdict) = self.inspect(path).await?;
        if verdict.status == SyncStatus::Synced {
            tracing::debug!(path = %path, "already synced");
            return Ok(FileOutcome::Skipped {
                reason: "synced".to_string(),
            });
        }
        if !self.credentials.is_connected() {
            return Err(Error::NoWallet);
        }

        let payload = if self.config.encrypt {
            let cipher = self.cipher.as_ref().ok_or(Error::PasswordRequired)?;
            cipher
                .encrypt(&content)
                .map_err(|source| Error::Encryption {
                    path: path.to_string(),
                    source,
                })?
                .into_bytes()
        } else {
            content
        };

        // Continue this device's chain, or the remote one if we never exported
        let (previous_version_id, version_number) = {
            let store = self.store.lock().await;
            let base = store
                .state
                .local
                .get(path)
                .filter(|meta| meta.is_uploaded())
                .or_else(|| store.state.remote.get(path).filter(|meta| meta.is_uploaded()));
            match base {
                Some(meta) => (meta.identifier.clone(), meta.version_number + 1),
                None => (None, 1),
            }
        };

        let version = VersionTags {
            path: path.to_string(),
            content_hash: verdict.content_hash,
            previous_version_id,
            version_number,
            timestamp: now_ms(),
            encrypted: self.config.encrypt,
        };
        let id = self.uploader.upload(&version, payload).await?;

        let meta = FileSyncMetadata {
            identifier: Some(id.clone()),
            timestamp: version.timestamp,
            content_hash: version.content_hash,
            encrypted: version.encrypted,
            path: path.clone(),
            previous_version_id: version.previous_version_id,
            version_number,
        };
        let mut store = self.store.lock().await;
        store.state.local.insert(meta.clone());
        store.state.remote.insert(meta);
        store.persist()?;

        Ok(FileOutcome::Exported { id, version_number })
    }

    /// Publish the staged remote map. On failure the staged entries for
    /// `paths` are rolled back so the files evaluate as unsynced again.
    async fn publish_batch(&self, remote_before: &MetadataMap, paths: &[VaultPath]) -> Result<String> {
        let snapshot = self.store.lock().await.state.remote.clone();
        match self.remote.publish(&snapshot).await {
            Ok(id) => {
                self.store.lock().await.persist()?;
                Ok(id)
            }
            Err(e) => {
                let mut store = self.store.lock().await;
                for path in paths {
                    match remote_before.get(path) {
                        Some(previous) => {
                            store.state.remote.insert(previous.clone());
                        }
                        None => {
                            store.state.remote.remove(path);
                        }
                    }
                }
                store.persist()?;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Import a single file from its remote version.
    pub async fn import(&self, path: &VaultPath) -> Result<FileOutcome> {
        self.import_one(path).await
    }

    /// Refresh the remote map and import every path it lists.
    pub async fn import_all(&self) -> Result<SyncReport> {
        self.refresh_remote().await?;
        let paths: Vec<VaultPath> = self.store.lock().await.state.remote.paths().cloned().collect();
        Ok(self.import_paths(&paths).await)
    }

    /// Import `paths` one after another, collecting per-file failures.
    pub async fn import_paths(&self, paths: &[VaultPath]) -> SyncReport {
        let mut report = SyncReport::new();
        for path in paths {
            if self.cancel.is_cancelled() {
                report.push(path.clone(), FileOutcome::Failed(Error::Cancelled));
                continue;
            }
            let outcome = match self.import_one(path).await {
                Ok(outcome) => outcome,
                Err(e) => FileOutcome::Failed(e),
            };
            report.push(path.clone(), outcome);
        }
        tracing::info!(summary = %report.summary(), written = report.changed(), "import finished");
        report
    }

    async fn import_one(&self, path: &VaultPath) -> Result<FileOutcome> {
        ensure_visible(path)?;
        let _guard = self.locks.lock(path).await;

        let remote = self
            .store
            .lock()
            .await
            .state
            .remote
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound {
                path: path.to_string(),
            })?;
        let Some(id) = remote.identifier.clone().filter(|id| !id.is_empty()) else {
            return Ok(FileOutcome::Skipped {
                reason: "no remote version".to_string(),
            });
        };

        if self.vault.exists(path) {
            let local_hash = content_hash(&self.read_local(path)?);
            if local_hash == remote.content_hash {
                let mut store = self.store.lock().await;
                store.state.local.insert(remote);
                store.persist()?;
                return Ok(FileOutcome::Skipped {
                    reason: "already up to date".to_string(),
                });
            }
        }

        let payload = self.chain.fetch_payload(&id).await?;
        let content = if remote.encrypted {
            self.open_payload(path, payload)?.into_bytes()
        } else {
            payload
        };

        let actual = content_hash(&content);
        if actual != remote.content_hash {
            return Err(Error::HashMismatch {
                path: path.to_string(),
                expected: remote.content_hash,
                actual,
            });
        }

        self.vault.write_bytes(path, &content)?;
        let version_number = remote.version_number;
        let mut store = self.store.lock().await;
        store.state.local.insert(remote);
        store.persist()?;
        tracing::info!(path = %path, id = %id, version = version_number, "version imported");

        Ok(FileOutcome::Imported { id, version_number })
    }

    fn open_payload(&self, path: &VaultPath, payload: Vec<u8>) -> Result<Plaintext> {
        let decryption = |source| Error::Decryption {
            path: path.to_string(),
            source,
        };
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            decryption(CipherError::MalformedEnvelope {
                reason: "payload is encrypted but no password is configured".into(),
            })
        })?;
        let envelope = String::from_utf8(payload).map_err(|_| {
            decryption(CipherError::MalformedEnvelope {
                reason: "envelope is not UTF-8".into(),
            })
        })?;
        cipher.decrypt(&envelope).map_err(decryption)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// The chain head for `path`: the remote entry, else the local one.
    async fn chain_snapshot(&self, path: &VaultPath) -> MetadataMap {
        let store = self.store.lock().await;
        let head = store
            .state
            .remote
            .get(path)
            .filter(|meta| meta.is_uploaded())
            .or_else(|| store.state.local.get(path).filter(|meta| meta.is_uploaded()));
        let mut snapshot = MetadataMap::new();
        if let Some(meta) = head {
            snapshot.insert(meta.clone());
        }
        snapshot
    }

    /// Raw payload of the version `n` links behind the current one.
    pub async fn fetch_previous_version(
        &self,
        path: &VaultPath,
        n: u32,
    ) -> Result<Option<PreviousVersion>> {
        let snapshot = self.chain_snapshot(path).await;
        self.chain.fetch_previous_version(path, n, &snapshot).await
    }

    /// Decrypted content of the version `n` links behind the current one.
    pub async fn previous_version_plaintext(
        &self,
        path: &VaultPath,
        n: u32,
    ) -> Result<Option<Plaintext>> {
        let Some(version) = self.fetch_previous_version(path, n).await? else {
            return Ok(None);
        };
        if version.encrypted {
            self.open_payload(path, version.payload).map(Some)
        } else {
            Ok(Some(Plaintext::from_bytes(version.payload)))
        }
    }

    /// Current version of `path` and up to `depth` predecessors.
    pub async fn history(&self, path: &VaultPath, depth: u32) -> Result<Vec<ChainEntry>> {
        let snapshot = self.chain_snapshot(path).await;
        self.chain.history(path, depth, &snapshot).await
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Connect a credential, load the remote map and merge it into local
    /// metadata. Per path the later timestamp wins.
    pub async fn connect(&self, credential: Credential) -> Result<ConnectionState> {
        let state = self.credentials.connect(credential);
        if let Some(remote) = self.remote.fetch().await? {
            let mut store = self.store.lock().await;
            let changed = store.state.local.merge_newer(&remote);
            store.state.remote = remote;
            store.persist()?;
            tracing::info!(merged = changed.len(), "remote map merged on connect");
        }
        Ok(state)
    }

    pub fn disconnect(&self) -> ConnectionState {
        self.credentials.disconnect()
    }

    /// Replace the remote map with the newest published one. Returns false
    /// when nothing has been published yet.
    pub async fn refresh_remote(&self) -> Result<bool> {
        let Some(remote) = self.remote.fetch().await? else {
            return Ok(false);
        };
        let mut store = self.store.lock().await;
        store.state.remote = remote;
        store.persist()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Vault events
    // ------------------------------------------------------------------

    /// Record a local modification without uploading it.
    pub async fn record_local_change(&self, path: &VaultPath) -> Result<SyncVerdict> {
        let _guard = self.locks.lock(path).await;
        let (_, verdict) = self.inspect(path).await?;
        let modified = self.vault.modified_ms(path)?;

        let mut store = self.store.lock().await;
        let entry = match store.state.local.get(path) {
            Some(existing) => FileSyncMetadata {
                content_hash: verdict.content_hash.clone(),
                timestamp: modified,
                ..existing.clone()
            },
            None => FileSyncMetadata::pending(
                path.clone(),
                verdict.content_hash.clone(),
                modified,
                self.config.encrypt,
            ),
        };
        store.state.local.insert(entry);
        store.persist()?;
        Ok(verdict)
    }

    /// Move the metadata of a renamed file. The file itself must already
    /// have been moved.
    pub async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if to.is_hidden() {
            tracing::debug!(from = %from, to = %to, "moved out of the synced tree");
            return self.delete(from).await;
        }
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let _first = self.locks.lock(first).await;
        let _second = self.locks.lock(second).await;

        let remote_moved = {
            let mut store = self.store.lock().await;
            store.state.local.rename(from, to);
            let moved = store.state.remote.rename(from, to);
            store.persist()?;
            moved
        };
        tracing::debug!(from = %from, to = %to, "metadata renamed");

        if remote_moved {
            self.republish().await?;
        }
        Ok(())
    }

    /// Forget a deleted file.
    pub async fn delete(&self, path: &VaultPath) -> Result<()> {
        let _guard = self.locks.lock(path).await;
        let remote_removed = {
            let mut store = self.store.lock().await;
            let had_remote = store.state.remote.contains(path);
            store.forget(path);
            store.persist()?;
            had_remote
        };
        tracing::debug!(path = %path, "metadata removed");

        if remote_removed {
            self.republish().await?;
        }
        Ok(())
    }

    async fn republish(&self) -> Result<()> {
        if !self.credentials.is_connected() {
            tracing::debug!("not connected; remote map will be published on next export");
            return Ok(());
        }
        let snapshot = self.store.lock().await.state.remote.clone();
        self.remote.publish(&snapshot).await?;
        Ok(())
    }
}
