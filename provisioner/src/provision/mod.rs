//! Idempotent ensure-or-create of the resources a config document refers to.
//!
//! Every resource is validated against the chain first. Anything that fails
//! validation for whatever reason, be it a missing or malformed identifier,
//! a failed lookup or a mismatch, is recreated. Only the default account has
//! no fallback: if it cannot be resolved and unlocked the run stops with
//! [`ErrorKind::AccountUnavailable`].
//!
//! The document is saved right after each resource is recreated, so a run
//! that fails halfway leaves the finished resources recorded and a rerun picks
//! up where it stopped.
//!
//! [`ErrorKind::AccountUnavailable`]: crate::error::ErrorKind::AccountUnavailable

mod context;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ERC20_SLOT;
use crate::deploy::ContractArtifact;
use crate::error::ResourceId;
use crate::result::{ProvisionReport, Result};

pub use self::context::{ProvisioningContext, REFERENCE_AMOUNT, REFERENCE_RECIPIENT};

/// Directory, relative to the config file, holding the bundled contract artifacts.
pub const CONTRACT_DIR: &str = "contract";

#[derive(Clone, Debug)]
enum ArtifactSource {
    Files { abi: PathBuf, bytecode: PathBuf },
    Loaded(ContractArtifact),
}

/// A contract slot to keep deployed, and how to deploy it when needed.
#[derive(Clone, Debug)]
pub struct ContractSpec {
    name: String,
    source: ArtifactSource,
    constructor_args: Vec<u8>,
}

impl ContractSpec {
    /// Contract `name` deployed from an artifact already in memory.
    pub fn new(name: impl Into<String>, artifact: ContractArtifact) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Loaded(artifact),
            constructor_args: Vec::new(),
        }
    }

    /// Contract `name` deployed from artifact files. The files are only read
    /// when a deployment is actually needed.
    pub fn from_files(
        name: impl Into<String>,
        abi: impl Into<PathBuf>,
        bytecode: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Files {
                abi: abi.into(),
                bytecode: bytecode.into(),
            },
            constructor_args: Vec::new(),
        }
    }

    /// The ERC-20 token slot, deployed from `contract/erc20.{abi,bytecode}`
    /// next to the config file.
    pub fn erc20(config_dir: impl AsRef<Path>) -> Self {
        let dir = config_dir.as_ref().join(CONTRACT_DIR);
        Self::from_files(
            ERC20_SLOT,
            dir.join(format!("{ERC20_SLOT}.abi")),
            dir.join(format!("{ERC20_SLOT}.bytecode")),
        )
    }

    /// ABI encoded constructor arguments appended to the bytecode.
    pub fn with_constructor_args(mut self, args: Vec<u8>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructor_args(&self) -> &[u8] {
        &self.constructor_args
    }

    pub fn resource(&self) -> ResourceId {
        ResourceId::Contract(self.name.clone())
    }

    pub(crate) fn artifact(&self) -> Result<ContractArtifact> {
        match &self.source {
            ArtifactSource::Files { abi, bytecode } => ContractArtifact::load(abi, bytecode),
            ArtifactSource::Loaded(artifact) => Ok(artifact.clone()),
        }
    }
}

/// The set of resources a run ensures, in dependency order: the account
/// first, then the reference pair, then each contract in the order added.
#[derive(Clone, Debug, Default)]
pub struct Provisioner {
    reference_pair: bool,
    contracts: Vec<ContractSpec>,
}

impl Provisioner {
    /// Ensure only the default account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything a client demo needs: account, reference pair and the ERC-20
    /// contract deployed from the artifacts under `config_dir`.
    pub fn for_client(config_dir: impl AsRef<Path>) -> Self {
        Self::new()
            .reference_pair()
            .contract(ContractSpec::erc20(config_dir))
    }

    /// Everything a contract demo needs: the unlocked account.
    pub fn for_contract() -> Self {
        Self::new()
    }

    /// Also ensure the reference transaction/block pair.
    pub fn reference_pair(mut self) -> Self {
        self.reference_pair = true;
        self
    }

    /// Also ensure the contract described by `spec`.
    pub fn contract(mut self, spec: ContractSpec) -> Self {
        self.contracts.push(spec);
        self
    }

    pub fn contracts(&self) -> &[ContractSpec] {
        &self.contracts
    }

    /// Ensure every declared resource and save the document. Stops at the
    /// first resource that cannot be provisioned.
    pub async fn run(&self, ctx: &mut ProvisioningContext) -> Result<ProvisionReport> {
        ctx.config().validate()?;
        let mut report = ProvisionReport::default();

        let outcome = ctx.ensure_account().await?;
        report.push(ResourceId::Account, outcome);

        if self.reference_pair {
            let outcome = ctx.ensure_reference_pair().await?;
            report.push(ResourceId::ReferencePair, outcome);
        }

        for spec in &self.contracts {
            let outcome = ctx.ensure_contract(spec).await?;
            report.push(spec.resource(), outcome);
        }

        ctx.save()?;
        info!(
            target: "provisioner",
            path = %ctx.store().path().display(),
            created = report.created().count(),
            "provisioning finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_preset() {
        let provisioner = Provisioner::for_client("/srv/app");
        assert!(provisioner.reference_pair);
        assert_eq!(provisioner.contracts().len(), 1);

        let erc20 = &provisioner.contracts()[0];
        assert_eq!(erc20.name(), ERC20_SLOT);
        assert_eq!(erc20.resource(), ResourceId::Contract("erc20".into()));
        match &erc20.source {
            ArtifactSource::Files { abi, bytecode } => {
                assert_eq!(abi, &PathBuf::from("/srv/app/contract/erc20.abi"));
                assert_eq!(bytecode, &PathBuf::from("/srv/app/contract/erc20.bytecode"));
            }
            ArtifactSource::Loaded(_) => panic!("erc20 is deployed from files"),
        }
    }

    #[test]
    fn test_contract_preset() {
        let provisioner = Provisioner::for_contract();
        assert!(!provisioner.reference_pair);
        assert!(provisioner.contracts().is_empty());
    }
}
