//! Utility module used for (de)serializing data in the hex encodings used by
//! JSON-RPC nodes.

/// Hex quantities such as `"0x1a"`. Used with serde like so:
/// ```no_run
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Tx {
///     #[serde(with = "provisioner::serde::quantity")]
///     nonce: u64,
/// }
/// ```
pub mod quantity {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Copy + Into<u128>,
        S: Serializer,
    {
        let value: u128 = (*value).into();
        serializer.collect_str(&format_args!("{value:#x}"))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<u128>,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let digits = text
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom(format!("quantity `{text}` is missing 0x")))?;
        let value = u128::from_str_radix(digits, 16).map_err(de::Error::custom)?;
        T::try_from(value).map_err(|_| de::Error::custom(format!("quantity `{text}` overflows")))
    }

    /// Same as the parent module, for optional quantities which nodes render as `null`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
        where
            T: Copy + Into<u128>,
            S: Serializer,
        {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
        where
            T: TryFrom<u128>,
            D: Deserializer<'de>,
        {
            #[derive(Deserialize)]
            struct Wrapped<T: TryFrom<u128>>(#[serde(with = "super")] T);

            Ok(Option::<Wrapped<T>>::deserialize(deserializer)?.map(|Wrapped(value)| value))
        }
    }
}

/// Byte strings such as contract code or call data, rendered as `"0x..."`.
pub mod bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&format_args!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::quantity")]
        nonce: u64,
        #[serde(with = "super::quantity::option")]
        height: Option<u64>,
        #[serde(with = "super::bytes")]
        input: Vec<u8>,
    }

    #[test]
    fn test_hex_encodings() {
        let sample = Sample {
            nonce: 26,
            height: None,
            input: vec![0x60, 0x80],
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "nonce": "0x1a", "height": null, "input": "0x6080" })
        );

        let parsed: Sample =
            serde_json::from_str(r#"{"nonce":"0x0","height":"0xff","input":"0x"}"#).unwrap();
        assert_eq!(parsed.nonce, 0);
        assert_eq!(parsed.height, Some(255));
        assert!(parsed.input.is_empty());
    }

    #[test]
    fn test_quantity_overflow_is_rejected() {
        let err = serde_json::from_str::<Sample>(
            r#"{"nonce":"0x1ffffffffffffffff","height":null,"input":"0x"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
