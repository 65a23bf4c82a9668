//! Accounts backed by a keystore directory on disk.
//!
//! Each account is one JSON key file (the usual encrypted keystore v3 layout)
//! of which only the `address` field is read here. Signing happens on the node:
//! unlocking an account asks the node, which holds the same key files, to
//! decrypt it with the passphrase.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::AccountManager;
use crate::error::ErrorKind;
use crate::rpc::JsonRpcClient;
use crate::types::Address;
use crate::Result;

#[derive(Debug, Deserialize)]
struct KeyFile {
    address: String,
}

/// Account manager over a keystore directory. Accounts are ordered by the
/// name of their key file, so the default account is stable across runs.
#[derive(Debug, Clone)]
pub struct Keystore {
    dir: PathBuf,
    accounts: Vec<Address>,
    node: Arc<JsonRpcClient>,
}

impl Keystore {
    /// Read every key file in `dir`. Files that are not key files are skipped.
    pub fn open(dir: impl AsRef<Path>, node: Arc<JsonRpcClient>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let accounts = read_accounts(&dir)?;
        debug!(
            target: "provisioner",
            dir = %dir.display(),
            accounts = accounts.len(),
            "opened keystore"
        );

        Ok(Self {
            dir,
            accounts,
            node,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn read_accounts(dir: &Path) -> Result<Vec<Address>> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        ErrorKind::AccountUnavailable.full(format!("cannot read keystore {}", dir.display()), err)
    })?;

    let mut files = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();

    let mut accounts = Vec::with_capacity(files.len());
    for path in files {
        match read_key_file(&path) {
            Ok(address) => accounts.push(address),
            Err(err) => {
                warn!(target: "provisioner", path = %path.display(), "skipping key file: {err}")
            }
        }
    }
    Ok(accounts)
}

fn read_key_file(path: &Path) -> Result<Address> {
    let content = std::fs::read(path).map_err(|err| ErrorKind::Io.custom(err))?;
    let key: KeyFile =
        serde_json::from_slice(&content).map_err(|err| ErrorKind::DataConversion.custom(err))?;

    if key.address.starts_with("0x") {
        key.address.parse()
    } else {
        format!("0x{}", key.address).parse()
    }
}

#[async_trait]
impl AccountManager for Keystore {
    fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn unlock(&self, account: &Address, passphrase: &str) -> Result<()> {
        if !self.accounts.contains(account) {
            return Err(ErrorKind::AccountUnavailable.message(format!(
                "{account} is not in keystore {}",
                self.dir.display()
            )));
        }
        self.node.unlock_account(account, passphrase).await
    }
}
