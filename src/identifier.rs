//! Channel subscription identifiers.
//!
//! An [`Identifier`] names one subscription: a channel class name plus an
//! ordered list of string parameters. On the wire it travels as a JSON
//! string holding a flat object, `channel` first, parameters after it in
//! their given order:
//!
//! ```text
//! Identifier("ChatChannel", [("room", "general")])
//!     ⇄ "{\"channel\":\"ChatChannel\",\"room\":\"general\"}"
//! ```
//!
//! Equality and hashing are structural and order-sensitive. Two identifiers
//! with the same parameters in a different order are different registry
//! keys; use [`Identifier::canonical`] when that is not what you want.

// Rust guideline compliant 2026-02

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::CableError;

/// Key that carries the channel name inside an identifier object.
const CHANNEL_KEY: &str = "channel";

/// Canonical name for one channel subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    channel: String,
    params: Vec<(String, String)>,
}

impl Identifier {
    /// Build an identifier from a channel name and ordered parameters.
    ///
    /// Nothing is validated: empty names and duplicate keys are kept as-is.
    pub fn new<I, K, V>(channel: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            channel: channel.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Identifier for a channel that takes no parameters.
    pub fn named(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            params: Vec::new(),
        }
    }

    /// Channel class name (e.g. `"ChatChannel"`).
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Parameters in construction order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value stored under `key`, if any.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Copy with parameters stable-sorted by key.
    ///
    /// Never applied implicitly. Callers that build the same subscription
    /// from differently ordered parameter lists can canonicalize both sides
    /// to make them collide as registry keys.
    #[must_use]
    pub fn canonical(&self) -> Self {
        let mut params = self.params.clone();
        params.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self {
            channel: self.channel.clone(),
            params,
        }
    }

    /// Parse an identifier json-string as received in an `identifier` field.
    ///
    /// The first `channel` key becomes the channel name; every other pair,
    /// including any later `channel` duplicate, becomes a parameter.
    pub fn parse(raw: &str) -> Result<Self, CableError> {
        serde_json::from_str(raw)
            .map_err(|err| CableError::General(format!("invalid identifier {raw:?}: {err}")))
    }

    /// Encode as the json-string placed in an `identifier` field.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl FromStr for Identifier {
    type Err = CableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len() + 1))?;
        map.serialize_entry(CHANNEL_KEY, &self.channel)?;
        for (key, value) in &self.params {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Pairs(mut pairs) = Pairs::<String>::deserialize(deserializer)?;
        let position = pairs
            .iter()
            .position(|(key, _)| key == CHANNEL_KEY)
            .ok_or_else(|| <D::Error as de::Error>::missing_field(CHANNEL_KEY))?;
        let (_, channel) = pairs.remove(position);
        Ok(Self {
            channel,
            params: pairs,
        })
    }
}

/// A JSON object read as an ordered list of entries.
///
/// Unlike `serde_json::Map`, keeps source order and duplicate keys.
#[derive(Debug)]
pub(crate) struct Pairs<V>(pub(crate) Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Pairs<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
            type Value = Pairs<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a flat JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Pairs(entries))
            }
        }

        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }
}
