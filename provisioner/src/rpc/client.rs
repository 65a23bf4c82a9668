use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{debug, trace};
use url::Url;

use crate::client::ChainClient;
use crate::config::{ConfigDocument, DEFAULT_RPC_RETRIES, DEFAULT_RPC_RETRY_INTERVAL_MS};
use crate::error::{Error, ErrorKind, RpcErrorCode};
use crate::types::{Address, Block, Nonce, Receipt, Transaction, UnsignedTransaction, H256};
use crate::Result;

const JSONRPC_VERSION: &str = "2.0";

/// How long `personal_unlockAccount` keeps an account unlocked, in seconds.
/// Zero asks the node to keep it unlocked until it restarts.
const UNLOCK_DURATION_SECS: u64 = 0;

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct Quantity(#[serde(with = "crate::serde::quantity")] u64);

#[derive(Deserialize)]
struct Bytes(#[serde(with = "crate::serde::bytes")] Vec<u8>);

/// A [`ChainClient`] talking Ethereum-style JSON-RPC over HTTP.
///
/// Requests that fail to reach the node are retried a fixed number of times
/// with a fixed delay in between (10 attempts, one second apart unless
/// configured otherwise). Anything the node actually answered, including
/// errors, is returned as-is.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: Url,
    http: reqwest::Client,
    retries: usize,
    retry_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn connect(node_url: &str) -> Result<Self> {
        let url = Url::parse(node_url).map_err(|err| {
            ErrorKind::DataConversion.full(format!("invalid node url `{node_url}`"), err)
        })?;

        Ok(Self {
            url,
            http: reqwest::Client::new(),
            retries: DEFAULT_RPC_RETRIES,
            retry_interval: Duration::from_millis(DEFAULT_RPC_RETRY_INTERVAL_MS),
            next_id: AtomicU64::new(1),
        })
    }

    /// Connect to the node named by `config`, using its `[rpc]` settings.
    pub fn from_config(config: &ConfigDocument) -> Result<Self> {
        config.validate()?;
        let rpc = config.rpc_settings();
        Ok(Self::connect(&config.node_url)?
            .retry(rpc.retries, Duration::from_millis(rpc.retry_interval_ms)))
    }

    /// Try each request up to `attempts` times when the node cannot be reached.
    pub fn retry(mut self, attempts: usize, interval: Duration) -> Self {
        self.retries = attempts.max(1);
        self.retry_interval = interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Perform a raw JSON-RPC call and deserialize its result.
    pub async fn call<T>(&self, method: &str, params: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let strategy = FixedInterval::new(self.retry_interval).take(self.retries - 1);
        let result = RetryIf::spawn(
            strategy,
            || self.send(method, &params),
            is_connection_failure,
        )
        .await?;

        serde_json::from_value(result).map_err(|err| {
            RpcErrorCode::InvalidResponse.full(format!("unexpected `{method}` result"), err)
        })
    }

    async fn send(&self, method: &str, params: &Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(target: "provisioner", id, method, "sending rpc request");

        let response = self
            .http
            .post(self.url.clone())
            .json(&request_body(id, method, params))
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    RpcErrorCode::ConnectionFailure.custom(err)
                } else {
                    RpcErrorCode::QueryFailure.custom(err)
                }
            })?
            .error_for_status()
            .map_err(|err| RpcErrorCode::QueryFailure.custom(err))?;

        let response = response
            .json::<Response>()
            .await
            .map_err(|err| RpcErrorCode::InvalidResponse.custom(err))?;

        into_result(method, response)
    }

    /// Unlock `account` on the node with `passphrase`.
    pub async fn unlock_account(&self, account: &Address, passphrase: &str) -> Result<()> {
        let unlocked: bool = self
            .call(
                "personal_unlockAccount",
                json!([account, passphrase, UNLOCK_DURATION_SECS]),
            )
            .await
            .map_err(|err| ErrorKind::AccountUnavailable.full(format!("unlock {account}"), err))?;

        if !unlocked {
            return Err(ErrorKind::AccountUnavailable
                .message(format!("node refused to unlock {account}")));
        }
        debug!(target: "provisioner", %account, "account unlocked");
        Ok(())
    }
}

fn request_body<'a>(id: u64, method: &'a str, params: &'a Value) -> Request<'a> {
    Request {
        jsonrpc: JSONRPC_VERSION,
        id,
        method,
        params,
    }
}

fn into_result(method: &str, response: Response) -> Result<Value> {
    if let Some(err) = response.error {
        return Err(RpcErrorCode::Remote.message(format!(
            "`{method}` failed with code {}: {}",
            err.code, err.message
        )));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

fn is_connection_failure(err: &Error) -> bool {
    *err.kind() == ErrorKind::Rpc(RpcErrorCode::ConnectionFailure)
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>> {
        self.call("eth_getBlockByHash", json!([hash, false])).await
    }

    async fn get_transaction_by_hash(&self, hash: &H256) -> Result<Option<Transaction>> {
        self.call("eth_getTransactionByHash", json!([hash])).await
    }

    async fn get_next_nonce(&self, account: &Address) -> Result<Nonce> {
        let Quantity(nonce) = self
            .call("eth_getTransactionCount", json!([account, "pending"]))
            .await?;
        Ok(nonce)
    }

    async fn send_transaction(&self, tx: UnsignedTransaction) -> Result<H256> {
        self.call("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::Rpc(RpcErrorCode::Remote) => RpcErrorCode::BroadcastTxFailure.custom(err),
                _ => err,
            })
    }

    async fn get_transaction_receipt(&self, hash: &H256) -> Result<Option<Receipt>> {
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }

    async fn get_code(&self, address: &Address) -> Result<Vec<u8>> {
        let Bytes(code) = self.call("eth_getCode", json!([address, "latest"])).await?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encoding() {
        let account: Address = "0x10f4bcf113e0b896d9b34294fd3da86b4adf0302".parse().unwrap();
        let params = json!([account, "pending"]);
        let body = serde_json::to_value(request_body(7, "eth_getTransactionCount", &params))
            .unwrap();

        assert_eq!(
            body,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "eth_getTransactionCount",
                "params": ["0x10f4bcf113e0b896d9b34294fd3da86b4adf0302", "pending"],
            })
        );
    }

    #[test]
    fn test_response_decoding() {
        let response: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(into_result("eth_getBlockByHash", response).unwrap(), Value::Null);

        let response: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .unwrap();
        let err = into_result("eth_sendTransaction", response).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::Remote));
        assert!(err.to_string().contains("nonce too low"));
    }

    #[test]
    fn test_invalid_url() {
        let err = JsonRpcClient::connect("not a url").unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::DataConversion);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_connection_failure() {
        let client = JsonRpcClient::connect("http://127.0.0.1:1")
            .unwrap()
            .retry(2, Duration::from_millis(10));

        let err = client
            .get_code(&Address::default())
            .await
            .unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::ConnectionFailure));
    }
}
