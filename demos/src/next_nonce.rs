//! Keep sending transactions from the default account after provisioning,
//! drawing nonces from the run's sequencer.

use std::sync::Arc;

use provisioner::provision::REFERENCE_RECIPIENT;
use provisioner::sandbox::Sandbox;
use provisioner::{
    wait_for_receipt, ChainClient, ConfigDocument, ConfigStore, Provisioner, ProvisioningContext,
};

const PASSPHRASE: &str = "hello";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.toml"));
    store.save(&ConfigDocument::new("http://localhost:8545"))?;

    let sandbox = Arc::new(Sandbox::new().with_account(PASSPHRASE));
    let mut ctx =
        ProvisioningContext::new(store, sandbox.clone(), sandbox.clone())?.passphrase(PASSPHRASE);
    Provisioner::for_contract().run(&mut ctx).await?;

    let from = ctx.default_account()?;
    for value in 1..=3 {
        let nonce = ctx.next_nonce()?;
        let tx = ctx
            .client()
            .create_unsigned_transaction(&from, &REFERENCE_RECIPIENT, value, nonce)
            .await?;
        let hash = ctx.client().send_transaction(tx).await?;
        let receipt = wait_for_receipt(ctx.client(), &hash, ctx.poll()).await?;
        println!(
            "nonce {nonce}: {hash} packed in block #{}",
            receipt.block_number
        );
    }

    println!("next nonce on chain: {}", sandbox.get_next_nonce(&from).await?);
    Ok(())
}
