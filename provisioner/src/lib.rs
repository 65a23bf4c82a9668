//! Bootstraps a chain client from a TOML config file and makes sure a set of
//! named on-chain resources exists: an unlocked default account, a reference
//! transaction/block pair, and deployed contracts. Identifiers of everything
//! provisioned are written back into the config, so running it again against
//! the same chain sends no transactions.
//!
//! ```no_run
//! # async fn run() -> provisioner::Result<()> {
//! let (ctx, report) = provisioner::prepare_for_client("./config.toml").await?;
//! println!("{report}");
//! println!("erc20 lives at {:?}", ctx.config().erc20_address);
//! # Ok(())
//! # }
//! ```

mod init;

pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod keystore;
pub mod nonce;
pub mod poll;
pub mod provision;
pub mod result;
pub mod rpc;
pub mod sandbox;
pub mod serde;
pub mod types;

pub use crate::client::{wait_for_receipt, AccountManager, ChainClient};
pub use crate::config::{ConfigDocument, ConfigStore};
pub use crate::deploy::{deploy_contract, ContractArtifact, DeployedContract};
pub use crate::error::{Error, ErrorKind, ResourceId};
pub use crate::init::{connect, prepare_for_client, prepare_for_contract, PASSPHRASE_ENV_VAR};
pub use crate::nonce::NonceSequencer;
pub use crate::poll::PollPolicy;
pub use crate::provision::{ContractSpec, Provisioner, ProvisioningContext};
pub use crate::result::{Outcome, ProvisionReport, Result};
pub use crate::types::{Address, H256};
