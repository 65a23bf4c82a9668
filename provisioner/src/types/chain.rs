use serde::{Deserialize, Serialize};

use super::{Address, Balance, BlockHeight, Nonce, H256};

/// Struct containing information on a block coming from the network. This is a
/// non-exhaustive list of items that could be present in a block header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Block {
    /// The hash of the block itself.
    pub hash: H256,
    /// Current height of this block.
    #[serde(with = "crate::serde::quantity")]
    pub number: BlockHeight,
    /// The block timestamp in seconds.
    #[serde(with = "crate::serde::quantity")]
    pub timestamp: u64,
}

impl Block {
    pub fn new(hash: H256, number: BlockHeight, timestamp: u64) -> Self {
        Self {
            hash,
            number,
            timestamp,
        }
    }
}

/// A transaction as reported by the node. `block_hash` stays `None` until the
/// transaction has been packed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Transaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(with = "crate::serde::quantity")]
    pub nonce: Nonce,
    #[serde(with = "crate::serde::quantity")]
    pub value: Balance,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default, with = "crate::serde::quantity::option")]
    pub block_number: Option<BlockHeight>,
}

impl Transaction {
    /// Whether this transaction has been included in a block.
    pub fn is_packed(&self) -> bool {
        self.block_hash.is_some()
    }
}

/// Receipt of a packed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_hash: H256,
    #[serde(with = "crate::serde::quantity")]
    pub block_number: BlockHeight,
    /// Address of the contract created by this transaction, if any.
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `1` for success, `0` for a reverted execution.
    #[serde(default, with = "crate::serde::quantity::option")]
    pub status: Option<u64>,
}

impl Receipt {
    /// Checks whether the transaction executed successfully. Nodes that predate
    /// the status field only report packed transactions, so a missing status
    /// counts as success.
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |status| status == 1)
    }
}

/// A transaction that is yet to be signed by the node. A missing `to` marks a
/// contract deployment, in which case `data` holds the init code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(with = "crate::serde::quantity")]
    pub value: Balance,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde::quantity::option"
    )]
    pub nonce: Option<Nonce>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "crate::serde::bytes"
    )]
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Transfer `value` from `from` into `to`.
    pub fn transfer(from: Address, to: Address, value: Balance) -> Self {
        Self {
            from,
            to: Some(to),
            value,
            nonce: None,
            data: Vec::new(),
        }
    }

    /// Deploy `init_code` (contract bytecode followed by encoded constructor
    /// arguments) from `from`.
    pub fn deploy(from: Address, init_code: Vec<u8>) -> Self {
        Self {
            from,
            to: None,
            value: 0,
            nonce: None,
            data: init_code,
        }
    }

    /// Specify the nonce the transaction is sent with.
    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn is_deployment(&self) -> bool {
        self.to.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_from_rpc_json() {
        let json = serde_json::json!({
            "hash": format!("0x{}", "11".repeat(32)),
            "from": "0x10f4bcf113e0b896d9b34294fd3da86b4adf0302",
            "to": null,
            "nonce": "0x2",
            "value": "0x0",
            "blockHash": null,
            "blockNumber": null,
            "input": "0x6080",
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.nonce, 2);
        assert!(tx.to.is_none());
        assert!(!tx.is_packed());
    }

    #[test]
    fn test_unsigned_transaction_json() {
        let from: Address = "0x10f4bcf113e0b896d9b34294fd3da86b4adf0302".parse().unwrap();
        let tx = UnsignedTransaction::deploy(from, vec![0x60, 0x80]).nonce(7);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": "0x10f4bcf113e0b896d9b34294fd3da86b4adf0302",
                "value": "0x0",
                "nonce": "0x7",
                "data": "0x6080",
            })
        );
    }

    #[test]
    fn test_receipt_status() {
        let json = serde_json::json!({
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "blockHash": format!("0x{}", "33".repeat(32)),
            "blockNumber": "0x10",
            "contractAddress": null,
            "status": "0x0",
        });
        let receipt: Receipt = serde_json::from_value(json).unwrap();
        assert_eq!(receipt.block_number, 16);
        assert!(!receipt.is_success());
    }
}
