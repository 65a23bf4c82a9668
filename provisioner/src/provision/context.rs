use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{wait_packed, AccountManager, ChainClient};
use crate::config::{ConfigDocument, ConfigStore};
use crate::deploy;
use crate::error::{ErrorKind, ResourceId, RpcErrorCode};
use crate::nonce::NonceSequencer;
use crate::poll::PollPolicy;
use crate::result::Outcome;
use crate::types::{Address, Balance, Nonce, H256};
use crate::Result;

use super::ContractSpec;

/// Recipient of the transfer that produces the reference transaction.
pub const REFERENCE_RECIPIENT: Address = Address([
    0x10, 0xf4, 0xbc, 0xf1, 0x13, 0xe0, 0xb8, 0x96, 0xd9, 0xb3, 0x42, 0x94, 0xfd, 0x3d, 0xa8, 0x6b,
    0x4a, 0xdf, 0x03, 0x02,
]);

/// Amount moved by the reference transfer.
pub const REFERENCE_AMOUNT: Balance = 1;

/// Everything a provisioning run works with: the config document and where it
/// is stored, the chain, the accounts, and the nonces of the default account.
///
/// A context belongs to exactly one run. Running several contexts against the
/// same config file or keystore at once is not supported: their nonces and
/// their writes to the file would race.
pub struct ProvisioningContext {
    store: ConfigStore,
    document: ConfigDocument,
    client: Arc<dyn ChainClient>,
    accounts: Arc<dyn AccountManager>,
    passphrase: Option<String>,
    poll: PollPolicy,
    nonces: NonceSequencer,
    account: Option<Address>,
}

impl std::fmt::Debug for ProvisioningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningContext")
            .field("store", &self.store)
            .field("document", &self.document)
            .field("poll", &self.poll)
            .field("nonces", &self.nonces)
            .field("account", &self.account)
            .finish()
    }
}

impl ProvisioningContext {
    /// Load the document from `store` and start a run over it. The passphrase
    /// and the poll policy are taken from the document and can be overridden.
    pub fn new(
        store: ConfigStore,
        client: Arc<dyn ChainClient>,
        accounts: Arc<dyn AccountManager>,
    ) -> Result<Self> {
        let document = store.load()?;
        Ok(Self::from_document(store, document, client, accounts))
    }

    /// Start a run over a document that was already loaded from `store`.
    pub fn from_document(
        store: ConfigStore,
        document: ConfigDocument,
        client: Arc<dyn ChainClient>,
        accounts: Arc<dyn AccountManager>,
    ) -> Self {
        let passphrase = document.passphrase().map(str::to_string);
        let poll = document.poll_policy();

        Self {
            store,
            document,
            client,
            accounts,
            passphrase,
            poll,
            nonces: NonceSequencer::new(),
            account: None,
        }
    }

    /// Passphrase used to unlock the default account.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Policy used to wait for transactions to be packed.
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    pub fn config(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn client(&self) -> &dyn ChainClient {
        &*self.client
    }

    pub fn account_manager(&self) -> &dyn AccountManager {
        &*self.accounts
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    pub fn poll(&self) -> &PollPolicy {
        &self.poll
    }

    /// The unlocked default account. Only available once
    /// [`ProvisioningContext::ensure_account`] has succeeded.
    pub fn default_account(&self) -> Result<Address> {
        self.account.ok_or_else(|| {
            ErrorKind::AccountUnavailable.message("default account has not been unlocked yet")
        })
    }

    /// Issue the next nonce of the default account.
    pub fn next_nonce(&mut self) -> Result<Nonce> {
        self.default_account()?;
        self.nonces.next()
    }

    /// Write the document back to the store.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.document)
    }

    /// Resolve the default account, unlock it and seed the nonce sequencer
    /// from the chain. Nothing is ever created for this resource.
    pub async fn ensure_account(&mut self) -> Result<Outcome> {
        if self.account.is_some() {
            return Ok(Outcome::Existing);
        }
        self.document.validate()?;

        let account = self
            .accounts
            .get_default_account()
            .map_err(into_account_unavailable)?;
        let passphrase = self.passphrase.as_deref().ok_or_else(|| {
            ErrorKind::AccountUnavailable.message(format!("no passphrase to unlock {account}"))
        })?;
        self.accounts
            .unlock(&account, passphrase)
            .await
            .map_err(into_account_unavailable)?;

        let nonce = self
            .client
            .get_next_nonce(&account)
            .await
            .map_err(|err| err.provisioning(ResourceId::Account))?;
        self.nonces
            .seed(nonce)
            .map_err(|err| err.provisioning(ResourceId::Account))?;
        self.account = Some(account);

        log_outcome(&ResourceId::Account, Outcome::Existing);
        debug!(target: "provisioner", %account, nonce, "default account unlocked");
        Ok(Outcome::Existing)
    }

    /// Make sure the stored reference transaction and block exist and agree
    /// with each other. Otherwise send a new transfer and store both hashes
    /// of it together.
    pub async fn ensure_reference_pair(&mut self) -> Result<Outcome> {
        let resource = ResourceId::ReferencePair;
        let account = self.default_account()?;

        match self.check_reference_pair().await {
            Ok(true) => {
                log_outcome(&resource, Outcome::Existing);
                return Ok(Outcome::Existing);
            }
            Ok(false) => {
                debug!(target: "provisioner", "{resource} missing or inconsistent, recreating")
            }
            Err(err) => debug!(target: "provisioner", "{resource} failed validation, recreating: {err}"),
        }

        let (block_hash, tx_hash) = self
            .send_reference_transfer(&account)
            .await
            .map_err(|err| err.provisioning(resource.clone()))?;

        self.document
            .set_reference_pair(block_hash.to_string(), tx_hash.to_string());
        self.save()?;
        log_outcome(&resource, Outcome::Created);
        Ok(Outcome::Created)
    }

    async fn check_reference_pair(&self) -> Result<bool> {
        let (Some(block_hash), Some(tx_hash)) =
            (&self.document.block_hash, &self.document.transaction_hash)
        else {
            return Ok(false);
        };
        let block_hash: H256 = block_hash.parse()?;
        let tx_hash: H256 = tx_hash.parse()?;

        let block = self.client.get_block_by_hash(&block_hash).await?;
        let tx = self.client.get_transaction_by_hash(&tx_hash).await?;

        Ok(match (block, tx) {
            (Some(_), Some(tx)) => tx.block_hash == Some(block_hash),
            _ => false,
        })
    }

    async fn send_reference_transfer(&mut self, account: &Address) -> Result<(H256, H256)> {
        let nonce = self.nonces.next()?;
        let tx = self
            .client
            .create_unsigned_transaction(account, &REFERENCE_RECIPIENT, REFERENCE_AMOUNT, nonce)
            .await?;
        let hash = self.client.send_transaction(tx).await?;
        wait_packed(
            &*self.client,
            &hash,
            &self.poll,
            &format!("{} transaction", ResourceId::ReferencePair),
        )
        .await?;

        let packed = self
            .client
            .get_transaction_by_hash(&hash)
            .await?
            .ok_or_else(|| {
                RpcErrorCode::InvalidResponse.message(format!("packed transaction {hash} not found"))
            })?;
        let block_hash = packed.block_hash.ok_or_else(|| {
            RpcErrorCode::InvalidResponse
                .message(format!("packed transaction {hash} has no block hash"))
        })?;

        Ok((block_hash, hash))
    }

    /// Make sure the contract slot of `spec` holds the address of deployed
    /// code. Otherwise deploy the contract and store its new address.
    pub async fn ensure_contract(&mut self, spec: &ContractSpec) -> Result<Outcome> {
        let resource = spec.resource();
        let account = self.default_account()?;

        match self.check_contract(spec.name()).await {
            Ok(true) => {
                log_outcome(&resource, Outcome::Existing);
                return Ok(Outcome::Existing);
            }
            Ok(false) => debug!(target: "provisioner", "{resource} missing or has no code, deploying"),
            Err(err) => debug!(target: "provisioner", "{resource} failed validation, deploying: {err}"),
        }

        let artifact = spec
            .artifact()
            .map_err(|err| err.provisioning(resource.clone()))?;
        let nonce = self
            .nonces
            .next()
            .map_err(|err| err.provisioning(resource.clone()))?;
        let deployed = deploy::deploy(
            &*self.client,
            &account,
            &artifact,
            spec.constructor_args(),
            nonce,
            &self.poll,
            &format!("{resource} deployment"),
        )
        .await
        .map_err(|err| err.provisioning(resource.clone()))?;

        self.document
            .set_contract_address(spec.name(), deployed.address.to_string());
        self.save()?;
        log_outcome(&resource, Outcome::Created);
        Ok(Outcome::Created)
    }

    async fn check_contract(&self, name: &str) -> Result<bool> {
        let Some(address) = self.document.contract_address(name) else {
            return Ok(false);
        };
        let address: Address = address.parse()?;
        let code = self.client.get_code(&address).await?;
        Ok(!code.is_empty())
    }
}

fn into_account_unavailable(err: crate::Error) -> crate::Error {
    match err.kind() {
        ErrorKind::AccountUnavailable => err,
        _ => ErrorKind::AccountUnavailable.custom(err),
    }
}

fn log_outcome(resource: &ResourceId, outcome: Outcome) {
    info!(target: "provisioner", %resource, %outcome, "resource ensured");
}
