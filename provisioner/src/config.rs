//! The configuration document and the store that loads and saves it.
//!
//! The document carries the node endpoint, where to find the keystore, and the
//! identifiers of every resource provisioned so far. Identifiers are kept as the
//! raw strings found in the file: a malformed value is not a load error, it is
//! simply a resource that fails validation and gets recreated.
//
// NOTE: unknown keys are kept in `extra` and written back untouched, so the file
// can carry sections owned by other tools.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigErrorCode, ErrorKind};
use crate::poll::PollPolicy;
use crate::Result;

/// Name of the contract slot stored in the top level `erc20_address` key.
pub const ERC20_SLOT: &str = "erc20";

/// Default keystore directory, relative to the config file.
pub const DEFAULT_KEYSTORE_DIR: &str = "keystore";

/// Default number of attempts for connection-level RPC retries.
pub const DEFAULT_RPC_RETRIES: usize = 10;

/// Default delay between connection-level RPC retries.
pub const DEFAULT_RPC_RETRY_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Rpc endpoint to point our client to.
    #[serde(default)]
    pub node_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erc20_address: Option<String>,

    /// Addresses of contract slots other than [`ERC20_SLOT`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore: Option<KeystoreConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<RpcConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollConfig>,

    /// Keys this crate does not know about.
    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Keystore directory. Relative paths are resolved against the config file.
    #[serde(default = "default_keystore_path")]
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_keystore_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEYSTORE_DIR)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_retries")]
    pub retries: usize,

    #[serde(default = "default_rpc_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RPC_RETRIES,
            retry_interval_ms: DEFAULT_RPC_RETRY_INTERVAL_MS,
            extra: toml::Table::new(),
        }
    }
}

fn default_rpc_retries() -> usize {
    DEFAULT_RPC_RETRIES
}

fn default_rpc_retry_interval_ms() -> u64 {
    DEFAULT_RPC_RETRY_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for PollConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            interval_ms: policy.interval.as_millis() as u64,
            timeout_ms: policy.timeout.as_millis() as u64,
            max_attempts: policy.max_attempts,
            extra: toml::Table::new(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    PollConfig::default().interval_ms
}

fn default_poll_timeout_ms() -> u64 {
    PollConfig::default().timeout_ms
}

impl ConfigDocument {
    /// A document pointing at `node_url` with no resources provisioned yet.
    pub fn new(node_url: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
            ..Default::default()
        }
    }

    /// Check the invariants required before any provisioning step can run.
    pub fn validate(&self) -> Result<()> {
        if self.node_url.trim().is_empty() {
            return Err(ConfigErrorCode::MissingNodeUrl.into());
        }
        if self.poll.as_ref().is_some_and(|poll| poll.interval_ms == 0) {
            return Err(ConfigErrorCode::InvalidPollInterval.into());
        }
        Ok(())
    }

    /// Stored address of the contract slot `name`, if any.
    pub fn contract_address(&self, name: &str) -> Option<&str> {
        if name == ERC20_SLOT {
            self.erc20_address.as_deref()
        } else {
            self.contracts.get(name).map(String::as_str)
        }
    }

    pub fn set_contract_address(&mut self, name: &str, address: impl Into<String>) {
        if name == ERC20_SLOT {
            self.erc20_address = Some(address.into());
        } else {
            self.contracts.insert(name.to_string(), address.into());
        }
    }

    /// Set both halves of the reference pair at once. There is no way to set
    /// only one of them.
    pub fn set_reference_pair(
        &mut self,
        block_hash: impl Into<String>,
        transaction_hash: impl Into<String>,
    ) {
        self.block_hash = Some(block_hash.into());
        self.transaction_hash = Some(transaction_hash.into());
    }

    /// Keystore directory, resolved against `config_dir` when relative.
    pub fn keystore_dir(&self, config_dir: &Path) -> PathBuf {
        let path = self
            .keystore
            .as_ref()
            .map(|keystore| keystore.path.clone())
            .unwrap_or_else(default_keystore_path);

        if path.is_absolute() {
            path
        } else {
            config_dir.join(path)
        }
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.keystore.as_ref()?.passphrase.as_deref()
    }

    pub fn rpc_settings(&self) -> RpcConfig {
        self.rpc.clone().unwrap_or_default()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let poll = self.poll.clone().unwrap_or_default();
        PollPolicy {
            interval: Duration::from_millis(poll.interval_ms),
            timeout: Duration::from_millis(poll.timeout_ms),
            max_attempts: poll.max_attempts,
        }
    }
}

/// Loads and saves a [`ConfigDocument`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the config file. Relative paths in the document
    /// are resolved against it.
    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn load(&self) -> Result<ConfigDocument> {
        let content = std::fs::read_to_string(&self.path).map_err(|err| {
            let code = match err.kind() {
                std::io::ErrorKind::NotFound => ConfigErrorCode::NotFound,
                _ => ConfigErrorCode::Read,
            };
            code.full(self.path.display().to_string(), err)
        })?;

        let document = toml::from_str(&content).map_err(|err| {
            ConfigErrorCode::Parse.full(self.path.display().to_string(), err)
        })?;

        debug!(target: "provisioner", path = %self.path.display(), "loaded config");
        Ok(document)
    }

    /// Serialize `document` and replace the file with it. The content is first
    /// written to a temporary file next to the target and then renamed over it,
    /// so the file on disk is always either the old or the new document.
    pub fn save(&self, document: &ConfigDocument) -> Result<()> {
        let content = toml::to_string(document).map_err(|err| {
            ConfigErrorCode::Serialize.full(self.path.display().to_string(), err)
        })?;

        let write_err = |err: std::io::Error| {
            ConfigErrorCode::Write.full(self.path.display().to_string(), err)
        };
        let mut file = tempfile::NamedTempFile::new_in(self.dir()).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&self.path)
            .map_err(|err| write_err(err.error))?;

        debug!(target: "provisioner", path = %self.path.display(), "saved config");
        Ok(())
    }
}

/// Parse a document from TOML text without touching the filesystem.
pub fn from_toml_str(content: &str) -> Result<ConfigDocument> {
    toml::from_str(content).map_err(|err| ConfigErrorCode::Parse.full("inline document", err))
}

/// Render a document as TOML text.
pub fn to_toml_string(document: &ConfigDocument) -> Result<String> {
    toml::to_string(document).map_err(|err| ErrorKind::DataConversion.custom(err))
}
