//! All errors that can occur while provisioning, including but not limited to
//! the following: config IO, RPC, account, nonce and data conversion errors.
//!
//! Every fallible operation in this crate returns [`Error`]. Callers match on
//! [`Error::kind`] to tell the failure categories apart.

mod impls;

use std::borrow::Cow;
use std::fmt;

/// A list specifying general categories of provisioning error.
#[derive(Clone, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An error occurred while loading, validating or saving the config document.
    #[error("{0}")]
    Config(#[from] ConfigErrorCode),
    /// An error occurred while performing an RPC request.
    #[error("{0}")]
    Rpc(#[from] RpcErrorCode),
    /// No default account could be resolved or unlocked. Never recoverable.
    #[error("default account unavailable")]
    AccountUnavailable,
    /// Creating the named resource failed. The chain error is the source.
    #[error("failed to provision {0}")]
    Provisioning(ResourceId),
    /// A transaction was not packed into a block before the poll deadline.
    #[error("transaction not packed before deadline")]
    TransactionNotPacked,
    /// The nonce sequencer was misused (not seeded, seeded twice or overflowed).
    #[error("Nonce")]
    Nonce,
    /// An error from performing IO.
    #[error("IO")]
    Io,
    /// An error from converting data.
    #[error("DataConversion")]
    DataConversion,
    /// An error that cannot be categorized into the other error kinds.
    #[error("Other")]
    Other,
}

/// Name of a resource the provisioner guarantees exists.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ResourceId {
    /// The unlocked default signing account.
    Account,
    /// The reference transaction and the block it was packed in.
    ReferencePair,
    /// A deployed contract, keyed by its slot name.
    Contract(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::ReferencePair => write!(f, "reference tx/block pair"),
            Self::Contract(name) => write!(f, "contract `{name}`"),
        }
    }
}

#[derive(Debug)]
enum ErrorRepr {
    Simple(ErrorKind),
    Message {
        kind: ErrorKind,
        message: Cow<'static, str>,
    },
    Custom {
        kind: ErrorKind,
        error: Box<dyn std::error::Error + Send + Sync>,
    },
    Full {
        kind: ErrorKind,
        message: Cow<'static, str>,
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ErrorRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(kind) => write!(f, "{kind}"),
            Self::Message { kind, message } => write!(f, "{kind}: {message}"),
            Self::Custom { kind, error } => write!(f, "{kind}: {error}"),
            Self::Full {
                kind,
                message,
                error,
            } => write!(f, "{kind}: {message}: {error}"),
        }
    }
}

/// Error type that the provisioner will make use of for all the errors
/// returned from this library
#[derive(Debug)]
pub struct Error {
    repr: ErrorRepr,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigErrorCode {
    #[error("config file not found")]
    NotFound,
    #[error("config file could not be read")]
    Read,
    #[error("config file is malformed")]
    Parse,
    #[error("config document could not be serialized")]
    Serialize,
    #[error("config file could not be written")]
    Write,
    #[error("config is missing `node_url`")]
    MissingNodeUrl,
    #[error("config `poll.interval_ms` must be greater than zero")]
    InvalidPollInterval,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RpcErrorCode {
    #[error("failed to connect to rpc service")]
    ConnectionFailure,
    #[error("unable to fulfill the query request")]
    QueryFailure,
    #[error("unable to broadcast the transaction to the network")]
    BroadcastTxFailure,
    #[error("rpc service returned malformed data")]
    InvalidResponse,
    #[error("rpc service reported an execution error")]
    Remote,
}
