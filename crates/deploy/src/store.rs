//! Persisted deployment records.
//!
//! One JSON file per contract under `<deployments dir>/<chain id>/`, so a
//! second run against the same network reuses what the first one created.
//! A creation transaction that was sent but not yet confirmed is kept next to
//! it as `<contract>.pending.json` until a later run resolves it.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, TxHash};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{NetworkId, abi::ConstructorArg};

const LOCK_FILE: &str = ".lock";

/// SHA-256 over the creation bytecode followed by the encoded constructor
/// arguments.
///
/// Any change to either means the stored contract is not the one being
/// requested.
pub fn fingerprint(bytecode: &[u8], encoded_args: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytecode);
    hasher.update(encoded_args);
    hex::encode(hasher.finalize())
}

/// What was deployed, where, and from which inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    pub transaction_hash: TxHash,
    pub args: Vec<ConstructorArg>,
    pub abi: Value,
    pub fingerprint: String,
    pub deployed_at: DateTime<Utc>,
    /// Salekit version that created this record.
    pub salekit_version: String,
}

impl DeploymentRecord {
    pub fn new(
        contract_name: impl Into<String>,
        address: Address,
        transaction_hash: TxHash,
        args: Vec<ConstructorArg>,
        abi: Value,
        fingerprint: String,
    ) -> Self {
        Self {
            contract_name: contract_name.into(),
            address,
            transaction_hash,
            args,
            abi,
            fingerprint,
            deployed_at: Utc::now(),
            salekit_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_json(self, path, "deployment record")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        read_json(path, "deployment record")
    }
}

/// A creation transaction that was accepted by the node but whose receipt was
/// never seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCreation {
    pub contract_name: String,
    pub transaction_hash: TxHash,
    pub fingerprint: String,
    pub args: Vec<ConstructorArg>,
    pub sent_at: DateTime<Utc>,
}

impl PendingCreation {
    pub fn new(
        contract_name: impl Into<String>,
        transaction_hash: TxHash,
        fingerprint: String,
        args: Vec<ConstructorArg>,
    ) -> Self {
        Self {
            contract_name: contract_name.into(),
            transaction_hash,
            fingerprint,
            args,
            sent_at: Utc::now(),
        }
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).with_context(|| format!("Failed to serialize {}", what))?;

    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {} to {}", what, path.display()))?;

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} {}", what, path.display()))
}

/// The deployment records of one network.
///
/// Holds an exclusive lock on the network directory for as long as it is
/// alive, so two runs never write the same records.
#[derive(Debug)]
pub struct DeploymentStore {
    dir: PathBuf,
    _lock: File,
}

impl DeploymentStore {
    pub fn open(root: &Path, network: NetworkId) -> Result<Self> {
        let dir = root.join(network.to_string());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create deployments directory {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = File::create(&lock_path)
            .with_context(|| format!("Failed to create lock file {}", lock_path.display()))?;
        lock.try_lock_exclusive().with_context(|| {
            format!(
                "Deployments in {} are locked by another run",
                dir.display()
            )
        })?;

        tracing::debug!(path = %dir.display(), "Opened deployment store");

        Ok(Self { dir, _lock: lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, contract_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", contract_name))
    }

    /// The stored record for `contract_name`, if one was saved.
    pub fn load(&self, contract_name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.path_for(contract_name);
        if !path.exists() {
            return Ok(None);
        }

        DeploymentRecord::load_from_file(&path).map(Some)
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        let path = self.path_for(&record.contract_name);
        record.save_to_file(&path)?;
        tracing::debug!(contract = %record.contract_name, path = %path.display(), "Saved deployment record");
        Ok(())
    }

    fn pending_path_for(&self, contract_name: &str) -> PathBuf {
        self.dir.join(format!("{}.pending.json", contract_name))
    }

    /// The unconfirmed creation of `contract_name`, if a previous run left one.
    pub fn load_pending(&self, contract_name: &str) -> Result<Option<PendingCreation>> {
        let path = self.pending_path_for(contract_name);
        if !path.exists() {
            return Ok(None);
        }

        read_json(&path, "pending creation").map(Some)
    }

    pub fn save_pending(&self, pending: &PendingCreation) -> Result<()> {
        let path = self.pending_path_for(&pending.contract_name);
        write_json(pending, &path, "pending creation")?;
        tracing::debug!(
            contract = %pending.contract_name,
            tx_hash = %pending.transaction_hash,
            path = %path.display(),
            "Saved pending creation"
        );
        Ok(())
    }

    /// Forget the unconfirmed creation of `contract_name`. A no-op if there is none.
    pub fn clear_pending(&self, contract_name: &str) -> Result<()> {
        let path = self.pending_path_for(contract_name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempdir::TempDir;

    use super::*;

    fn record(fingerprint: &str) -> DeploymentRecord {
        DeploymentRecord::new(
            "PrivateSale",
            Address::with_last_byte(7),
            TxHash::repeat_byte(3),
            vec![ConstructorArg::Address(Address::with_last_byte(1))],
            json!([]),
            fingerprint.to_string(),
        )
    }

    #[test]
    fn test_fingerprint_determinism() {
        let a = fingerprint(&[0x60, 0x80], &[1, 2, 3]);
        let b = fingerprint(&[0x60, 0x80], &[1, 2, 3]);

        assert_eq!(a, b, "Fingerprint should be deterministic");
        assert_eq!(a.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_fingerprint_changes_with_args() {
        assert_ne!(
            fingerprint(&[0x60, 0x80], &[1]),
            fingerprint(&[0x60, 0x80], &[2]),
            "Fingerprint should change when constructor args change"
        );
    }

    #[test]
    fn test_store_save_and_load() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        let store = DeploymentStore::open(temp_dir.path(), NetworkId(97)).unwrap();

        assert!(store.load("PrivateSale").unwrap().is_none());

        let original = record("abcd");
        store.save(&original).unwrap();

        let loaded = store
            .load("PrivateSale")
            .unwrap()
            .expect("record should exist");
        assert_eq!(original, loaded, "Loaded record should match original");
        assert!(temp_dir.path().join("97/PrivateSale.json").exists());
    }

    #[test]
    fn test_store_load_corrupted_record() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        let store = DeploymentStore::open(temp_dir.path(), NetworkId(56)).unwrap();

        std::fs::write(store.dir().join("Presale.json"), "{ invalid json }").unwrap();

        assert!(
            store.load("Presale").is_err(),
            "Loading corrupted record should return error"
        );
    }

    #[test]
    fn test_pending_creation_lifecycle() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        let store = DeploymentStore::open(temp_dir.path(), NetworkId(97)).unwrap();

        assert!(store.load_pending("Presale").unwrap().is_none());

        let pending = PendingCreation::new(
            "Presale",
            TxHash::repeat_byte(4),
            "abcd".to_string(),
            vec![ConstructorArg::from(1000u64)],
        );
        store.save_pending(&pending).unwrap();

        assert_eq!(store.load_pending("Presale").unwrap(), Some(pending));
        assert!(temp_dir.path().join("97/Presale.pending.json").exists());
        // The confirmed record slot is untouched
        assert!(store.load("Presale").unwrap().is_none());

        store.clear_pending("Presale").unwrap();
        assert!(store.load_pending("Presale").unwrap().is_none());
        store.clear_pending("Presale").unwrap();
    }

    #[test]
    fn test_store_is_locked_while_open() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        let first = DeploymentStore::open(temp_dir.path(), NetworkId(97)).unwrap();

        assert!(DeploymentStore::open(temp_dir.path(), NetworkId(97)).is_err());
        // Other networks are independent
        assert!(DeploymentStore::open(temp_dir.path(), NetworkId(56)).is_ok());

        drop(first);
        assert!(DeploymentStore::open(temp_dir.path(), NetworkId(97)).is_ok());
    }
}
