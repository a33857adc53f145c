//! Compiled contract artifacts.
//!
//! Reads the JSON artifacts Hardhat writes under
//! `artifacts/contracts/<Source>.sol/<Contract>.json`.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hardhat's build metadata, never a contract artifact.
const BUILD_INFO_DIR: &str = "build-info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub source_name: Option<String>,
    pub abi: Value,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;

        let artifact: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        Ok(artifact)
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn creation_code(&self, encoded_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + encoded_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(encoded_args);
        Bytes::from(code)
    }
}

/// Locates artifacts by contract name under a Hardhat artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the artifact for `name`.
    ///
    /// Fails if no artifact exists, if more than one source file defines a
    /// contract with that name, or if the file's `contractName` does not match.
    pub fn load(&self, name: &str) -> Result<ContractArtifact> {
        let file_name = format!("{}.json", name);
        let mut matches = Vec::new();
        find_files(&self.root, &file_name, &mut matches)
            .with_context(|| format!("Failed to scan artifacts in {}", self.root.display()))?;

        let path = match matches.as_slice() {
            [] => anyhow::bail!(
                "No artifact for {} under {} (did the contracts compile?)",
                name,
                self.root.display()
            ),
            [path] => path,
            _ => anyhow::bail!(
                "Ambiguous artifact for {}: {}",
                name,
                matches
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        let artifact = ContractArtifact::load_from_file(path)?;
        if artifact.contract_name != name {
            anyhow::bail!(
                "Artifact {} is for {}, expected {}",
                path.display(),
                artifact.contract_name,
                name
            );
        }

        tracing::debug!(contract = %name, path = %path.display(), "Loaded artifact");
        Ok(artifact)
    }
}

fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type()?.is_dir() {
            if entry.file_name() != BUILD_INFO_DIR {
                find_files(&path, file_name, found)?;
            }
        } else if entry.file_name() == file_name {
            found.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    fn write_artifact(root: &Path, source: &str, name: &str, bytecode: &str) {
        let dir = root.join("contracts").join(source);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{}.json", name)),
            serde_json::json!({
                "_format": "hh-sol-artifact-1",
                "contractName": name,
                "sourceName": format!("contracts/{}", source),
                "abi": [],
                "bytecode": bytecode,
                "deployedBytecode": "0x",
                "linkReferences": {},
                "deployedLinkReferences": {}
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.join(format!("{}.dbg.json", name)), "{}").unwrap();
    }

    #[test]
    fn test_load_by_name() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        write_artifact(temp_dir.path(), "Presale.sol", "Presale", "0x6080");

        let store = ArtifactStore::new(temp_dir.path());
        let artifact = store.load("Presale").unwrap();

        assert_eq!(artifact.contract_name, "Presale");
        assert_eq!(artifact.bytecode, Bytes::from(vec![0x60, 0x80]));
        assert_eq!(
            artifact.creation_code(&[0xaa]),
            Bytes::from(vec![0x60, 0x80, 0xaa])
        );
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        write_artifact(temp_dir.path(), "Presale.sol", "Presale", "0x6080");

        let err = ArtifactStore::new(temp_dir.path())
            .load("PrivateSale")
            .unwrap_err();
        assert!(err.to_string().contains("No artifact for PrivateSale"));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        write_artifact(temp_dir.path(), "IPresale.sol", "IPresale", "0x");

        assert!(ArtifactStore::new(temp_dir.path()).load("IPresale").is_err());
    }

    #[test]
    fn test_duplicate_names_are_ambiguous() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        write_artifact(temp_dir.path(), "Presale.sol", "Presale", "0x6080");
        write_artifact(temp_dir.path(), "old/Presale.sol", "Presale", "0x6080");

        let err = ArtifactStore::new(temp_dir.path())
            .load("Presale")
            .unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }
}
