use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::ConfigStore;
use crate::keystore::Keystore;
use crate::provision::{Provisioner, ProvisioningContext};
use crate::result::{ProvisionReport, Result};
use crate::rpc::JsonRpcClient;

/// Environment variable holding the keystore passphrase when the config file
/// does not carry one.
pub const PASSPHRASE_ENV_VAR: &str = "PROVISIONER_PASSPHRASE";

/// Load the config at `config_path`, connect to the node it names and open the
/// keystore next to it. Nothing is sent to the chain yet.
pub fn connect(config_path: impl AsRef<Path>) -> Result<ProvisioningContext> {
    let store = ConfigStore::new(config_path.as_ref());
    let document = store.load()?;

    let client = Arc::new(JsonRpcClient::from_config(&document)?);
    let keystore = Keystore::open(document.keystore_dir(&store.dir()), Arc::clone(&client))?;
    info!(target: "provisioner", node_url = %client.url(), "connected to node");

    let passphrase = match document.passphrase() {
        Some(_) => None,
        None => std::env::var(PASSPHRASE_ENV_VAR).ok(),
    };
    let ctx = ProvisioningContext::from_document(store, document, client, Arc::new(keystore));

    Ok(match passphrase {
        Some(passphrase) => ctx.passphrase(passphrase),
        None => ctx,
    })
}

/// Provision everything the client demos rely on: the unlocked default
/// account, a reference transaction/block pair and the ERC-20 contract.
pub async fn prepare_for_client(
    config_path: impl AsRef<Path>,
) -> Result<(ProvisioningContext, ProvisionReport)> {
    let mut ctx = connect(config_path)?;
    let report = Provisioner::for_client(ctx.store().dir())
        .run(&mut ctx)
        .await?;
    Ok((ctx, report))
}

/// Provision what the contract demos rely on: the unlocked default account.
pub async fn prepare_for_contract(
    config_path: impl AsRef<Path>,
) -> Result<(ProvisioningContext, ProvisionReport)> {
    let mut ctx = connect(config_path)?;
    let report = Provisioner::for_contract().run(&mut ctx).await?;
    Ok((ctx, report))
}
