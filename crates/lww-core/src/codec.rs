//! Marshalling between values and their stored representation
//!
//! Durable backends keep members as strings. A [`Codec`] is shared by the
//! additions and removals of one element set so both agree on identity.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Converts values to and from the strings a store keeps as members
pub trait Codec<V>: Send + Sync {
    fn marshal(&self, value: &V) -> Result<String>;

    fn unmarshal(&self, raw: &str) -> Result<V>;
}

/// Identity codec for string values (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn marshal(&self, value: &String) -> Result<String> {
        Ok(value.clone())
    }

    fn unmarshal(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }
}

/// JSON codec for any serde type
///
/// Two values are the same member only if they serialize to the same JSON
/// text, so types with unordered maps make poor members.
pub struct JsonCodec<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub fn new() -> Self {
        Self { _value: PhantomData }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<V: Serialize + DeserializeOwned> Codec<V> for JsonCodec<V> {
    fn marshal(&self, value: &V) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Marshal(e.to_string()))
    }

    fn unmarshal(&self, raw: &str) -> Result<V> {
        serde_json::from_str(raw).map_err(|e| Error::Marshal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct City {
        name: String,
        country: String,
    }

    #[test]
    fn test_string_codec_is_identity() {
        let codec = StringCodec;
        let raw = codec.marshal(&"Montreal".to_string()).unwrap();
        assert_eq!(raw, "Montreal");
        assert_eq!(codec.unmarshal(&raw).unwrap(), "Montreal");
    }

    #[test]
    fn test_json_codec_struct() {
        let codec = JsonCodec::<City>::new();
        let city = City {
            name: "Paris".into(),
            country: "FR".into(),
        };

        let raw = codec.marshal(&city).unwrap();
        assert_eq!(raw, r#"{"name":"Paris","country":"FR"}"#);
        assert_eq!(codec.unmarshal(&raw).unwrap(), city);
    }

    #[test]
    fn test_json_codec_rejects_wrong_type() {
        let codec = JsonCodec::<u64>::new();
        let err = codec.unmarshal("\"not a number\"").unwrap_err();
        assert!(matches!(err, Error::Marshal(_)));
    }
}
