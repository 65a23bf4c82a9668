//! Types used in the provisioner crate. Identifiers are fixed width byte arrays
//! rendered as `0x`-prefixed lowercase hex, which is also their wire format.

mod chain;

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, ErrorKind};

pub use self::chain::{Block, Receipt, Transaction, UnsignedTransaction};

/// Nonce is a unit used to determine the order of transactions sent by an account.
pub type Nonce = u64;

/// Balance is type for storing amounts of tokens in the chain's smallest unit.
pub type Balance = u128;

/// Height of a specific block
pub type BlockHeight = u64;

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N], Error> {
    let expected = 2 + N * 2;
    let digits = value.strip_prefix("0x").ok_or_else(|| {
        ErrorKind::DataConversion.message(format!("{name} `{value}` is missing the 0x prefix"))
    })?;
    if value.len() != expected {
        return Err(ErrorKind::DataConversion.message(format!(
            "incorrect {name} length (expected {expected}, but {} was given)",
            value.len()
        )));
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|e| ErrorKind::DataConversion.custom(e))?;
    Ok(out)
}

macro_rules! fixed_hex {
    ($(#[$meta:meta])* $name:ident, $len:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Number of bytes in this identifier.
            pub const LEN: usize = $len;

            /// Length of the `0x`-prefixed hex rendering.
            pub const HEX_LEN: usize = 2 + $len * 2;

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>($label, value).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer)?
                    .parse()
                    .map_err(de::Error::custom)
            }
        }
    };
}

fixed_hex!(
    /// Account or contract address on chain.
    Address,
    20,
    "address"
);

fixed_hex!(
    /// 32 byte hash identifying a block or a transaction.
    H256,
    32,
    "hash"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let text = "0x10f4bcf113e0b896d9b34294fd3da86b4adf0302";
        let addr: Address = text.parse().unwrap();
        assert_eq!(addr.to_string(), text);
        assert_eq!(text.len(), Address::HEX_LEN);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = "0x10f4bcf113e0b896d9b34294fd3da86b4adf03"
            .parse::<Address>()
            .unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::DataConversion);
        assert!(err.to_string().contains("expected 42"));
    }

    #[test]
    fn test_rejects_missing_prefix_and_bad_digits() {
        assert!("10f4bcf113e0b896d9b34294fd3da86b4adf030211"
            .parse::<Address>()
            .is_err());
        assert!("0xzzf4bcf113e0b896d9b34294fd3da86b4adf0302"
            .parse::<Address>()
            .is_err());
        assert!("".parse::<H256>().is_err());
    }

    #[test]
    fn test_hash_serde_as_string() {
        let hash = H256([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: H256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
