//! Loading compiled contracts from disk and deploying them.

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::client::{wait_packed, ChainClient};
use crate::error::{ErrorKind, RpcErrorCode};
use crate::poll::PollPolicy;
use crate::types::{Address, Nonce, UnsignedTransaction, H256};
use crate::Result;

/// A compiled contract: its ABI and creation bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractArtifact {
    pub abi: Value,
    pub bytecode: Vec<u8>,
}

impl ContractArtifact {
    pub fn new(abi: Value, bytecode: Vec<u8>) -> Self {
        Self { abi, bytecode }
    }

    /// Read an artifact from an ABI JSON file and a file holding the bytecode
    /// as hex, with or without a `0x` prefix. Surrounding whitespace is ignored.
    pub fn load(abi_path: impl AsRef<Path>, bytecode_path: impl AsRef<Path>) -> Result<Self> {
        let abi_path = abi_path.as_ref();
        let bytecode_path = bytecode_path.as_ref();

        let abi = std::fs::read(abi_path).map_err(|err| {
            ErrorKind::Io.full(format!("failed to read abi {}", abi_path.display()), err)
        })?;
        let abi = serde_json::from_slice(&abi).map_err(|err| {
            ErrorKind::DataConversion.full(format!("malformed abi {}", abi_path.display()), err)
        })?;

        let bytecode = std::fs::read_to_string(bytecode_path).map_err(|err| {
            ErrorKind::Io.full(
                format!("failed to read bytecode {}", bytecode_path.display()),
                err,
            )
        })?;
        let bytecode = bytecode.trim();
        let bytecode = hex::decode(bytecode.strip_prefix("0x").unwrap_or(bytecode)).map_err(
            |err| {
                ErrorKind::DataConversion.full(
                    format!("malformed bytecode {}", bytecode_path.display()),
                    err,
                )
            },
        )?;

        Ok(Self { abi, bytecode })
    }
}

/// A contract that has been deployed and packed.
#[derive(Clone, Debug, PartialEq)]
pub struct DeployedContract {
    pub address: Address,
    pub abi: Value,
    pub transaction_hash: H256,
}

/// Deploy `artifact` from `from` using `nonce`, then wait until the deployment
/// is packed. `constructor_args` must already be ABI encoded and is appended
/// to the bytecode.
pub async fn deploy_contract(
    client: &dyn ChainClient,
    from: &Address,
    artifact: &ContractArtifact,
    constructor_args: &[u8],
    nonce: Nonce,
    policy: &PollPolicy,
) -> Result<DeployedContract> {
    deploy(
        client,
        from,
        artifact,
        constructor_args,
        nonce,
        policy,
        "deployment",
    )
    .await
}

pub(crate) async fn deploy(
    client: &dyn ChainClient,
    from: &Address,
    artifact: &ContractArtifact,
    constructor_args: &[u8],
    nonce: Nonce,
    policy: &PollPolicy,
    label: &str,
) -> Result<DeployedContract> {
    let mut init_code = Vec::with_capacity(artifact.bytecode.len() + constructor_args.len());
    init_code.extend_from_slice(&artifact.bytecode);
    init_code.extend_from_slice(constructor_args);

    let hash = client
        .send_transaction(UnsignedTransaction::deploy(*from, init_code).nonce(nonce))
        .await?;
    let receipt = wait_packed(client, &hash, policy, label).await?;

    if !receipt.is_success() {
        return Err(RpcErrorCode::Remote.message(format!("deployment {hash} reverted")));
    }
    let address = receipt.contract_address.ok_or_else(|| {
        RpcErrorCode::InvalidResponse
            .message(format!("receipt of {hash} carries no contract address"))
    })?;

    info!(target: "provisioner", %address, tx = %hash, nonce, "contract deployed");
    Ok(DeployedContract {
        address,
        abi: artifact.abi.clone(),
        transaction_hash: hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_artifact() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let abi = dir.path().join("erc20.abi");
        let bytecode = dir.path().join("erc20.bytecode");
        std::fs::write(&abi, r#"[{"type":"constructor","inputs":[]}]"#)?;
        std::fs::write(&bytecode, "0x6080604052\n")?;

        let artifact = ContractArtifact::load(&abi, &bytecode)?;
        assert_eq!(artifact.bytecode, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.abi[0]["type"], "constructor");
        Ok(())
    }

    #[test]
    fn test_load_missing_or_malformed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let abi = dir.path().join("erc20.abi");
        let bytecode = dir.path().join("erc20.bytecode");

        let err = ContractArtifact::load(&abi, &bytecode).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Io);

        std::fs::write(&abi, "[]")?;
        std::fs::write(&bytecode, "not hex")?;
        let err = ContractArtifact::load(&abi, &bytecode).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::DataConversion);
        Ok(())
    }
}
