use std::path::Path;

use provisioner::error::{ConfigErrorCode, ErrorKind};
use provisioner::types::Address;
use provisioner::AccountManager;

const KEY_FILE: &str = r#"{
    "address": "1bd9e9be525ab967e633bcdaeac8bd5723ed4d6b",
    "crypto": {},
    "id": "bd3a4d62-2e5b-4c8b-9df7-8a2b6c4c1f44",
    "version": 3
}"#;

fn write_config(dir: &Path, body: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("config.toml");
    std::fs::write(&path, body)?;
    std::fs::create_dir_all(dir.join("keystore"))?;
    std::fs::write(dir.join("keystore").join("UTC--2021-01-01--1bd9"), KEY_FILE)?;
    Ok(path)
}

#[test_log::test]
fn test_connect_opens_keystore_next_to_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
        node_url = "http://127.0.0.1:1"

        [keystore]
        passphrase = "hello"
        "#,
    )?;

    let ctx = provisioner::connect(&path)?;
    assert_eq!(
        ctx.account_manager().get_default_account()?,
        "0x1bd9e9be525ab967e633bcdaeac8bd5723ed4d6b".parse::<Address>()?
    );
    assert_eq!(ctx.config().node_url, "http://127.0.0.1:1");
    assert_eq!(ctx.store().path(), path.as_path());
    Ok(())
}

#[test_log::test]
fn test_connect_requires_node_url() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), "erc20_address = \"\"\n")?;

    let err = provisioner::connect(&path).unwrap_err();
    assert_eq!(
        *err.kind(),
        ErrorKind::Config(ConfigErrorCode::MissingNodeUrl)
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unreachable_node_leaves_account_unavailable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
        node_url = "http://127.0.0.1:1"

        [keystore]
        passphrase = "hello"

        [rpc]
        retries = 2
        retry_interval_ms = 10
        "#,
    )?;
    let before = std::fs::read_to_string(&path)?;

    let err = provisioner::prepare_for_contract(&path).await.unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::AccountUnavailable);
    assert_eq!(std::fs::read_to_string(&path)?, before);
    Ok(())
}
