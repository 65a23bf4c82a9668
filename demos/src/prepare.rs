//! Provision the resources the client or contract demos need against the node
//! named in a config file.
//!
//! ```text
//! cargo run --example prepare -- ./config.toml client
//! cargo run --example prepare -- ./config.toml contract
//! ```

use std::env;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = if env::var(EnvFilter::DEFAULT_ENV).is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::default().add_directive(LevelFilter::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let config = args.next().unwrap_or_else(|| "./config.toml".to_string());
    let mode = args.next().unwrap_or_else(|| "client".to_string());

    let (ctx, report) = match mode.as_str() {
        "client" => provisioner::prepare_for_client(&config).await?,
        "contract" => provisioner::prepare_for_contract(&config).await?,
        other => anyhow::bail!("unknown mode `{other}`, expected `client` or `contract`"),
    };

    println!("{report}");
    println!("default account: {}", ctx.default_account()?);
    if let Some(tx) = &ctx.config().transaction_hash {
        println!("reference tx: {tx}");
    }
    if let Some(erc20) = &ctx.config().erc20_address {
        println!("erc20: {erc20}");
    }
    Ok(())
}
