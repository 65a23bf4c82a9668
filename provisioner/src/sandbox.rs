//! An in-memory chain implementing both [`ChainClient`] and [`AccountManager`].
//!
//! The sandbox keeps blocks, transactions, receipts and deployed code in
//! memory, checks nonces the way a node does, and can be told to delay packing
//! or to fail specific calls. Identifiers are derived with SHA-256 from the
//! transaction contents, so a run against a fresh sandbox is deterministic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::client::{AccountManager, ChainClient};
use crate::error::{ErrorKind, RpcErrorCode};
use crate::types::{
    Address, Block, BlockHeight, Nonce, Receipt, Transaction, UnsignedTransaction, H256,
};
use crate::Result;

/// When transactions sent to the sandbox get packed into a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Packing {
    /// In a new block as soon as they are sent.
    #[default]
    Immediate,
    /// After the receipt has been asked for this many times without success.
    AfterPolls(u32),
    /// Never, until [`Sandbox::pack_pending`] is called.
    Never,
}

/// Calls the sandbox should fail on purpose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    /// `get_block_by_hash`, `get_transaction_by_hash` and `get_code` fail.
    pub lookups: bool,
    /// `get_next_nonce` fails.
    pub nonce_lookups: bool,
    /// `send_transaction` fails.
    pub sends: bool,
    /// Deployments are packed but revert, leaving no contract behind.
    pub reverts: bool,
}

#[derive(Debug)]
struct SandboxAccount {
    address: Address,
    passphrase: String,
    unlocked: bool,
}

#[derive(Debug)]
struct PendingTx {
    hash: H256,
    polls_left: Option<u32>,
}

#[derive(Debug)]
struct State {
    accounts: Vec<SandboxAccount>,
    nonces: HashMap<Address, Nonce>,
    head: Block,
    blocks: HashMap<H256, Block>,
    transactions: HashMap<H256, Transaction>,
    payloads: HashMap<H256, UnsignedTransaction>,
    receipts: HashMap<H256, Receipt>,
    code: HashMap<Address, Vec<u8>>,
    pending: Vec<PendingTx>,
    sent: Vec<H256>,
    packing: Packing,
    faults: Faults,
}

/// In-memory chain. Share it behind an `Arc` as both the chain client and the
/// account manager of a provisioning run.
#[derive(Debug)]
pub struct Sandbox {
    state: Mutex<State>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// A chain holding only its genesis block and no accounts.
    pub fn new() -> Self {
        let genesis = Block::new(block_hash(0), 0, 0);
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash, genesis.clone());

        Self {
            state: Mutex::new(State {
                accounts: Vec::new(),
                nonces: HashMap::new(),
                head: genesis,
                blocks,
                transactions: HashMap::new(),
                payloads: HashMap::new(),
                receipts: HashMap::new(),
                code: HashMap::new(),
                pending: Vec::new(),
                sent: Vec::new(),
                packing: Packing::default(),
                faults: Faults::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a locked account protected by `passphrase`. Accounts are listed
    /// in creation order, so the first one created is the default account.
    pub fn create_account(&self, passphrase: &str) -> Address {
        let mut state = self.state();
        let index = state.accounts.len() as u64;
        let address = derive_address(b"account", &index.to_be_bytes());
        state.accounts.push(SandboxAccount {
            address,
            passphrase: passphrase.to_string(),
            unlocked: false,
        });
        address
    }

    /// Builder form of [`Sandbox::create_account`].
    pub fn with_account(self, passphrase: &str) -> Self {
        self.create_account(passphrase);
        self
    }

    /// Advance the nonce of `account` as if it had sent `count` transactions
    /// outside of the sandbox's log.
    pub fn bump_nonce(&self, account: &Address, count: Nonce) {
        *self.state().nonces.entry(*account).or_default() += count;
    }

    pub fn set_packing(&self, packing: Packing) {
        self.state().packing = packing;
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state().faults = faults;
    }

    pub fn faults(&self) -> Faults {
        self.state().faults
    }

    /// Pack every pending transaction into a new block.
    pub fn pack_pending(&self) {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        if !pending.is_empty() {
            let hashes = pending.into_iter().map(|tx| tx.hash).collect::<Vec<_>>();
            state.pack(&hashes);
        }
    }

    /// Remove the code at `address`, as if the contract self-destructed.
    pub fn clear_code(&self, address: &Address) {
        self.state().code.remove(address);
    }

    /// Forget a block, as if it had been reorganized away.
    pub fn forget_block(&self, hash: &H256) {
        self.state().blocks.remove(hash);
    }

    /// Forget a transaction, as if the node had pruned it.
    pub fn forget_transaction(&self, hash: &H256) {
        let mut state = self.state();
        state.transactions.remove(hash);
        state.receipts.remove(hash);
    }

    /// Hashes of every transaction accepted so far, in submission order.
    pub fn sent_transactions(&self) -> Vec<H256> {
        self.state().sent.clone()
    }

    /// The transaction submitted under `hash`, as it was sent.
    pub fn sent_transaction(&self, hash: &H256) -> Option<UnsignedTransaction> {
        self.state().payloads.get(hash).cloned()
    }

    pub fn code(&self, address: &Address) -> Option<Vec<u8>> {
        self.state().code.get(address).cloned()
    }

    pub fn height(&self) -> BlockHeight {
        self.state().head.number
    }

    pub fn is_unlocked(&self, account: &Address) -> bool {
        self.state()
            .accounts
            .iter()
            .any(|acc| acc.address == *account && acc.unlocked)
    }
}

impl State {
    fn check_lookup(&self, what: &str) -> Result<()> {
        if self.faults.lookups {
            return Err(RpcErrorCode::QueryFailure.message(format!("{what}: injected failure")));
        }
        Ok(())
    }

    fn next_nonce(&self, account: &Address) -> Nonce {
        self.nonces.get(account).copied().unwrap_or_default()
    }

    fn pack(&mut self, hashes: &[H256]) {
        let number = self.head.number + 1;
        let block = Block::new(block_hash(number), number, number);

        for hash in hashes {
            let Some(tx) = self.transactions.get_mut(hash) else {
                continue;
            };
            tx.block_hash = Some(block.hash);
            tx.block_number = Some(number);

            let mut contract_address = None;
            let mut status = 1;
            if let Some(payload) = self.payloads.get(hash) {
                if payload.is_deployment() {
                    if self.faults.reverts {
                        status = 0;
                    } else {
                        let address = contract_address_of(&payload.from, tx.nonce);
                        self.code.insert(address, payload.data.clone());
                        contract_address = Some(address);
                    }
                }
            }

            self.receipts.insert(
                *hash,
                Receipt {
                    transaction_hash: *hash,
                    block_hash: block.hash,
                    block_number: number,
                    contract_address,
                    status: Some(status),
                },
            );
        }

        trace!(target: "provisioner", height = number, txs = hashes.len(), "sandbox packed block");
        self.blocks.insert(block.hash, block.clone());
        self.head = block;
    }
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn block_hash(number: BlockHeight) -> H256 {
    H256(sha256(&[b"block", &number.to_be_bytes()]))
}

fn derive_address(domain: &[u8], seed: &[u8]) -> Address {
    let digest = sha256(&[domain, seed]);
    let mut address = [0u8; Address::LEN];
    address.copy_from_slice(&digest[32 - Address::LEN..]);
    Address(address)
}

fn contract_address_of(from: &Address, nonce: Nonce) -> Address {
    derive_address(from.as_bytes(), &nonce.to_be_bytes())
}

fn transaction_hash(tx: &UnsignedTransaction, nonce: Nonce) -> H256 {
    let to = tx.to.map(|to| to.0).unwrap_or_default();
    H256(sha256(&[
        b"tx",
        tx.from.as_bytes(),
        &nonce.to_be_bytes(),
        &to,
        &tx.value.to_be_bytes(),
        &tx.data,
    ]))
}

#[async_trait]
impl ChainClient for Sandbox {
    async fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>> {
        let state = self.state();
        state.check_lookup("eth_getBlockByHash")?;
        Ok(state.blocks.get(hash).cloned())
    }

    async fn get_transaction_by_hash(&self, hash: &H256) -> Result<Option<Transaction>> {
        let state = self.state();
        state.check_lookup("eth_getTransactionByHash")?;
        Ok(state.transactions.get(hash).cloned())
    }

    async fn get_next_nonce(&self, account: &Address) -> Result<Nonce> {
        let state = self.state();
        if state.faults.nonce_lookups {
            return Err(RpcErrorCode::QueryFailure
                .message("eth_getTransactionCount: injected failure"));
        }
        Ok(state.next_nonce(account))
    }

    async fn send_transaction(&self, tx: UnsignedTransaction) -> Result<H256> {
        let mut state = self.state();
        if state.faults.sends {
            return Err(RpcErrorCode::BroadcastTxFailure.message("injected failure"));
        }

        let unlocked = state
            .accounts
            .iter()
            .any(|acc| acc.address == tx.from && acc.unlocked);
        if !unlocked {
            return Err(RpcErrorCode::BroadcastTxFailure
                .message(format!("account {} is locked or unknown", tx.from)));
        }

        let expected = state.next_nonce(&tx.from);
        let nonce = tx.nonce.unwrap_or(expected);
        if nonce < expected {
            return Err(RpcErrorCode::BroadcastTxFailure
                .message(format!("nonce too low: {nonce} < {expected}")));
        }
        if nonce > expected {
            return Err(RpcErrorCode::BroadcastTxFailure
                .message(format!("nonce too high: {nonce} > {expected}")));
        }

        let hash = transaction_hash(&tx, nonce);
        state.nonces.insert(tx.from, nonce + 1);
        state.transactions.insert(
            hash,
            Transaction {
                hash,
                from: tx.from,
                to: tx.to,
                nonce,
                value: tx.value,
                block_hash: None,
                block_number: None,
            },
        );
        state.payloads.insert(hash, tx);
        state.sent.push(hash);
        debug!(target: "provisioner", tx = %hash, nonce, "sandbox accepted transaction");

        let packing = state.packing;
        match packing {
            Packing::Immediate => state.pack(&[hash]),
            Packing::AfterPolls(polls) => state.pending.push(PendingTx {
                hash,
                polls_left: Some(polls),
            }),
            Packing::Never => state.pending.push(PendingTx {
                hash,
                polls_left: None,
            }),
        }
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: &H256) -> Result<Option<Receipt>> {
        let mut state = self.state();

        let ready = match state.pending.iter_mut().find(|tx| tx.hash == *hash) {
            Some(PendingTx {
                polls_left: Some(0),
                ..
            }) => true,
            Some(PendingTx {
                polls_left: Some(left),
                ..
            }) => {
                *left -= 1;
                false
            }
            _ => false,
        };
        if ready {
            state.pending.retain(|tx| tx.hash != *hash);
            state.pack(&[*hash]);
        }

        Ok(state.receipts.get(hash).cloned())
    }

    async fn get_code(&self, address: &Address) -> Result<Vec<u8>> {
        let state = self.state();
        state.check_lookup("eth_getCode")?;
        Ok(state.code.get(address).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl AccountManager for Sandbox {
    fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.state().accounts.iter().map(|acc| acc.address).collect())
    }

    async fn unlock(&self, account: &Address, passphrase: &str) -> Result<()> {
        let mut state = self.state();
        let acc = state
            .accounts
            .iter_mut()
            .find(|acc| acc.address == *account)
            .ok_or_else(|| {
                ErrorKind::AccountUnavailable.message(format!("unknown account {account}"))
            })?;

        if acc.passphrase != passphrase {
            return Err(ErrorKind::AccountUnavailable
                .message(format!("wrong passphrase for {account}")));
        }
        acc.unlocked = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn unlocked() -> Result<(Sandbox, Address)> {
        let sandbox = Sandbox::new();
        let account = sandbox.create_account("hello");
        sandbox.unlock(&account, "hello").await?;
        Ok((sandbox, account))
    }

    #[tokio::test]
    async fn test_transfer_is_packed() -> Result<()> {
        let (sandbox, account) = unlocked().await?;
        let tx = sandbox
            .create_unsigned_transaction(&account, &Address::default(), 1, 0)
            .await?;
        let hash = sandbox.send_transaction(tx).await?;

        let receipt = sandbox.get_transaction_receipt(&hash).await?.unwrap();
        let fetched = sandbox.get_transaction_by_hash(&hash).await?.unwrap();
        assert_eq!(fetched.block_hash, Some(receipt.block_hash));
        assert!(sandbox.get_block_by_hash(&receipt.block_hash).await?.is_some());
        assert_eq!(sandbox.get_next_nonce(&account).await?, 1);
        assert_eq!(sandbox.height(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_nonce_must_match() -> Result<()> {
        let (sandbox, account) = unlocked().await?;
        sandbox.bump_nonce(&account, 3);

        let tx = UnsignedTransaction::transfer(account, Address::default(), 1).nonce(2);
        let err = sandbox.send_transaction(tx).await.unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::BroadcastTxFailure));
        assert!(err.to_string().contains("nonce too low"));

        let tx = UnsignedTransaction::transfer(account, Address::default(), 1).nonce(3);
        sandbox.send_transaction(tx).await?;
        assert_eq!(sandbox.sent_transactions().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_locked_account_cannot_send() {
        let sandbox = Sandbox::new();
        let account = sandbox.create_account("hello");
        let tx = UnsignedTransaction::transfer(account, Address::default(), 1).nonce(0);
        let err = sandbox.send_transaction(tx).await.unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::BroadcastTxFailure));

        let err = sandbox.unlock(&account, "wrong").await.unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::AccountUnavailable);
        assert!(!sandbox.is_unlocked(&account));
    }

    #[tokio::test]
    async fn test_deployment_and_delayed_packing() -> Result<()> {
        let (sandbox, account) = unlocked().await?;
        sandbox.set_packing(Packing::AfterPolls(2));

        let hash = sandbox
            .send_transaction(UnsignedTransaction::deploy(account, vec![0x60, 0x80]).nonce(0))
            .await?;

        assert!(sandbox.get_transaction_receipt(&hash).await?.is_none());
        assert!(sandbox.get_transaction_receipt(&hash).await?.is_none());
        let receipt = sandbox.get_transaction_receipt(&hash).await?.unwrap();

        let address = receipt.contract_address.unwrap();
        assert_eq!(address, contract_address_of(&account, 0));
        assert_eq!(sandbox.get_code(&address).await?, vec![0x60, 0x80]);

        sandbox.clear_code(&address);
        assert!(sandbox.get_code(&address).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_faults() -> Result<()> {
        let (sandbox, account) = unlocked().await?;
        sandbox.set_faults(Faults {
            lookups: true,
            nonce_lookups: true,
            ..Faults::default()
        });

        let err = sandbox.get_code(&account).await.unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::QueryFailure));
        assert!(sandbox.get_next_nonce(&account).await.is_err());
        Ok(())
    }

    #[test]
    fn test_accounts_in_creation_order() -> Result<()> {
        let sandbox = Sandbox::new().with_account("a").with_account("b");
        let accounts = sandbox.accounts()?;
        assert_eq!(accounts.len(), 2);
        assert_eq!(sandbox.get_default_account()?, accounts[0]);
        assert_ne!(accounts[0], accounts[1]);
        Ok(())
    }
}
