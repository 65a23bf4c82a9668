use std::path::PathBuf;

use provisioner::config::{
    from_toml_str, ConfigDocument, ConfigStore, KeystoreConfig, PollConfig, RpcConfig, ERC20_SLOT,
};
use provisioner::error::{ConfigErrorCode, ErrorKind};

fn sample_document() -> anyhow::Result<ConfigDocument> {
    let mut document = from_toml_str(
        r#"
        node_url = "http://localhost:12537"
        chain_id = 1029

        [explorer]
        url = "https://example.invalid"
        "#,
    )?;
    document.set_reference_pair(
        format!("0x{}", "ab".repeat(32)),
        format!("0x{}", "cd".repeat(32)),
    );
    document.set_contract_address(ERC20_SLOT, "0x8b8689c7f3014a4d86e4d1d0daaf74a47f5e0f27");
    document.set_contract_address("sponsor", "0x0888000000000000000000000000000000000001");
    document.keystore = Some(KeystoreConfig {
        path: PathBuf::from("keys"),
        passphrase: Some("hello".into()),
        ..Default::default()
    });
    document.rpc = Some(RpcConfig {
        retries: 3,
        retry_interval_ms: 250,
        ..Default::default()
    });
    document.poll = Some(PollConfig {
        interval_ms: 500,
        timeout_ms: 30_000,
        max_attempts: Some(40),
        ..Default::default()
    });
    Ok(document)
}

#[test]
fn test_store_roundtrip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.toml"));
    let document = sample_document()?;

    store.save(&document)?;
    let loaded = store.load()?;
    assert_eq!(loaded, document);

    // Saving what was loaded changes nothing on disk.
    let content = std::fs::read_to_string(store.path())?;
    store.save(&loaded)?;
    assert_eq!(std::fs::read_to_string(store.path())?, content);
    Ok(())
}

#[test]
fn test_unknown_section_keys_survive_save() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        node_url = "http://localhost:8545"

        [keystore]
        path = "k"
        kind = "v3"

        [rpc]
        retries = 3
        timeout_ms = 5

        [poll]
        interval_ms = 100
        jitter = true
        "#,
    )?;
    let store = ConfigStore::new(&path);

    let document = store.load()?;
    store.save(&document)?;
    let saved = store.load()?;
    assert_eq!(saved, document);

    let keystore = saved.keystore.as_ref().map(|keystore| &keystore.extra);
    assert_eq!(
        keystore.and_then(|extra| extra.get("kind")),
        Some(&toml::Value::String("v3".into()))
    );
    let rpc = saved.rpc_settings();
    assert_eq!(rpc.retries, 3);
    assert_eq!(rpc.extra.get("timeout_ms"), Some(&toml::Value::Integer(5)));
    let poll = saved.poll.as_ref().map(|poll| &poll.extra);
    assert_eq!(
        poll.and_then(|extra| extra.get("jitter")),
        Some(&toml::Value::Boolean(true))
    );
    Ok(())
}

#[test]
fn test_save_replaces_whole_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.toml"));
    store.save(&sample_document()?)?;

    let minimal = ConfigDocument::new("http://localhost:8545");
    store.save(&minimal)?;
    assert_eq!(store.load()?, minimal);

    // Only the config file itself is left behind, no temporary files.
    let entries = std::fs::read_dir(dir.path())?.count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn test_load_errors() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let store = ConfigStore::new(dir.path().join("missing.toml"));
    let err = store.load().unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::Config(ConfigErrorCode::NotFound));

    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "node_url = \"http://localhost:8545\"\n[keystore\n")?;
    let err = ConfigStore::new(&path).load().unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::Config(ConfigErrorCode::Parse));

    let path = dir.path().join("typed.toml");
    std::fs::write(&path, "node_url = 8545\n")?;
    let err = ConfigStore::new(&path).load().unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::Config(ConfigErrorCode::Parse));
    Ok(())
}

#[test]
fn test_save_into_missing_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("nope").join("config.toml"));
    let err = store
        .save(&ConfigDocument::new("http://localhost:8545"))
        .unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::Config(ConfigErrorCode::Write));
    Ok(())
}

#[test]
fn test_malformed_identifiers_still_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        node_url = "http://localhost:8545"
        block_hash = "0x1234"
        transaction_hash = ""
        erc20_address = "not an address"
        "#,
    )?;

    let document = ConfigStore::new(&path).load()?;
    assert_eq!(document.block_hash.as_deref(), Some("0x1234"));
    assert_eq!(document.contract_address(ERC20_SLOT), Some("not an address"));
    Ok(())
}

#[test]
fn test_store_dir() {
    assert_eq!(ConfigStore::new("config.toml").dir(), PathBuf::from("."));
    assert_eq!(
        ConfigStore::new("/etc/app/config.toml").dir(),
        PathBuf::from("/etc/app")
    );
}
