//! Run the client preset twice against an in-memory chain: the first run
//! creates everything, the second one finds it all in place.

use std::env;
use std::sync::Arc;

use serde_json::json;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use provisioner::config::{to_toml_string, ERC20_SLOT};
use provisioner::sandbox::Sandbox;
use provisioner::{
    ConfigDocument, ConfigStore, ContractArtifact, ContractSpec, Provisioner, ProvisioningContext,
};

const PASSPHRASE: &str = "hello";

/// The sandbox keeps creation code as the deployed code.
const BYTECODE: [u8; 5] = [0x60, 0x80, 0x60, 0x40, 0x52];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = if env::var(EnvFilter::DEFAULT_ENV).is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::default().add_directive(LevelFilter::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.toml"));
    store.save(&ConfigDocument::new("http://localhost:8545"))?;

    let sandbox = Arc::new(Sandbox::new().with_account(PASSPHRASE));
    let provisioner = Provisioner::new().reference_pair().contract(ContractSpec::new(
        ERC20_SLOT,
        ContractArtifact::new(json!([]), BYTECODE.to_vec()),
    ));

    for run in 1..=2 {
        let mut ctx = ProvisioningContext::new(store.clone(), sandbox.clone(), sandbox.clone())?
            .passphrase(PASSPHRASE);
        let report = provisioner.run(&mut ctx).await?;

        println!("run #{run}:\n{report}");
        info!(
            target: "sandbox_prepare",
            run,
            noop = report.is_noop(),
            "transactions sent so far: {}",
            sandbox.sent_transactions().len()
        );
    }

    println!("{}", to_toml_string(&store.load()?)?);
    Ok(())
}
