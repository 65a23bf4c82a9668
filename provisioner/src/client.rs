//! The chain facing seams of the provisioner. Everything that talks to a node
//! goes through [`ChainClient`], and everything that owns keys goes through
//! [`AccountManager`]. The crate ships [`JsonRpcClient`] and [`Keystore`] for
//! real nodes and [`Sandbox`] as an in-memory stand-in for both.
//!
//! [`JsonRpcClient`]: crate::rpc::JsonRpcClient
//! [`Keystore`]: crate::keystore::Keystore
//! [`Sandbox`]: crate::sandbox::Sandbox

use async_trait::async_trait;
use tracing::debug;

use crate::error::ErrorKind;
use crate::poll::PollPolicy;
use crate::types::{Address, Balance, Block, Nonce, Receipt, Transaction, UnsignedTransaction, H256};
use crate::Result;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch a block by hash. `Ok(None)` means the node does not know it.
    async fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>>;

    /// Fetch a transaction by hash. `Ok(None)` means the node does not know it.
    async fn get_transaction_by_hash(&self, hash: &H256) -> Result<Option<Transaction>>;

    /// The nonce the next transaction sent by `account` has to carry, counting
    /// transactions still pending in the pool.
    async fn get_next_nonce(&self, account: &Address) -> Result<Nonce>;

    /// Build a transfer of `amount` from `from` to `to` with the given nonce.
    async fn create_unsigned_transaction(
        &self,
        from: &Address,
        to: &Address,
        amount: Balance,
        nonce: Nonce,
    ) -> Result<UnsignedTransaction> {
        Ok(UnsignedTransaction::transfer(*from, *to, amount).nonce(nonce))
    }

    /// Submit a transaction for the node to sign with the unlocked `from`
    /// account and broadcast. Returns the transaction hash.
    async fn send_transaction(&self, tx: UnsignedTransaction) -> Result<H256>;

    /// Receipt of a transaction, or `Ok(None)` while it is not packed yet.
    async fn get_transaction_receipt(&self, hash: &H256) -> Result<Option<Receipt>>;

    /// Code deployed at `address`. Empty for plain accounts and unknown addresses.
    async fn get_code(&self, address: &Address) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait AccountManager: Send + Sync {
    /// All accounts known to this manager, in a stable order.
    fn accounts(&self) -> Result<Vec<Address>>;

    /// The account used to sign unless told otherwise: the first account.
    fn get_default_account(&self) -> Result<Address> {
        self.accounts()?.into_iter().next().ok_or_else(|| {
            ErrorKind::AccountUnavailable.message("account manager holds no accounts")
        })
    }

    /// Unlock `account` so transactions from it can be signed.
    async fn unlock(&self, account: &Address, passphrase: &str) -> Result<()>;
}

/// Wait until the transaction `hash` is packed and return its receipt. Gives up
/// with [`ErrorKind::TransactionNotPacked`] once `policy` runs out.
pub async fn wait_for_receipt(
    client: &dyn ChainClient,
    hash: &H256,
    policy: &PollPolicy,
) -> Result<Receipt> {
    wait_packed(client, hash, policy, "transaction").await
}

/// Same as [`wait_for_receipt`], with `label` naming what the transaction was
/// for in the error message.
pub(crate) async fn wait_packed(
    client: &dyn ChainClient,
    hash: &H256,
    policy: &PollPolicy,
    label: &str,
) -> Result<Receipt> {
    let receipt = policy
        .poll(&format!("{label} {hash}"), || {
            client.get_transaction_receipt(hash)
        })
        .await?;

    debug!(
        target: "provisioner",
        tx = %hash,
        block = %receipt.block_hash,
        "{label} packed"
    );
    Ok(receipt)
}
