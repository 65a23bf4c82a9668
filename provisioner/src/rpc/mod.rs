//! JSON-RPC adapter implementing [`ChainClient`] against a real node.
//!
//! [`ChainClient`]: crate::client::ChainClient

mod client;

pub use self::client::JsonRpcClient;
