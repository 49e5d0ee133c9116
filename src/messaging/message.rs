//! # Transport Messages
//!
//! The unit the transport moves: a case-insensitive string header map and an
//! opaque byte body. The transport never looks inside the body.

use crate::constants::headers as header_names;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Header map with case-insensitive keys
///
/// Keys are stored lowercased, the same canonical form HTTP header maps use,
/// so `Msg-Id` and `msg-id` address the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, returning the previous value for the same key
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON object text, the form stored in the `headers` column
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for BTreeMap<String, String> {
    fn from(headers: Headers) -> Self {
        headers.entries
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// A message as handed to and returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    headers: Headers,
    body: Vec<u8>,
}

impl TransportMessage {
    pub fn new(headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Message carrying a freshly generated message-id header
    pub fn with_generated_id(mut headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        if !headers.contains_key(header_names::MESSAGE_ID) {
            headers.insert(header_names::MESSAGE_ID, Uuid::new_v4().to_string());
        }
        Self::new(headers, body)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn message_id(&self) -> Option<&str> {
        self.headers.get(header_names::MESSAGE_ID)
    }

    pub fn into_parts(self) -> (Headers, Vec<u8>) {
        (self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_keys_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains_key("Content-type"));

        let previous = headers.insert("CONTENT-TYPE", "text/plain");
        assert_eq!(previous.as_deref(), Some("application/json"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_header_json_normalises_keys() {
        let headers = Headers::from_json(r#"{"Msg-Id":"42","Other":"x"}"#).unwrap();
        assert_eq!(headers.get("msg-id"), Some("42"));
        assert_eq!(headers.to_json().unwrap(), r#"{"msg-id":"42","other":"x"}"#);
    }

    #[test]
    fn test_header_json_rejects_non_string_values() {
        assert!(Headers::from_json(r#"{"msg-id": 42}"#).is_err());
        assert!(Headers::from_json("[]").is_err());
    }

    #[test]
    fn test_generated_message_id() {
        let message = TransportMessage::with_generated_id(Headers::new(), b"hello".to_vec());
        let id = message.message_id().expect("message id header");
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(message.body(), b"hello");

        let mut headers = Headers::new();
        headers.insert("MSG-ID", "fixed");
        let message = TransportMessage::with_generated_id(headers, Vec::new());
        assert_eq!(message.message_id(), Some("fixed"));
    }

    proptest! {
        #[test]
        fn prop_lookup_ignores_ascii_case(key in "[A-Za-z][A-Za-z0-9-]{0,20}", value in ".*") {
            let mut headers = Headers::new();
            headers.insert(&key, value.clone());
            prop_assert_eq!(headers.get(&key.to_ascii_uppercase()), Some(value.as_str()));
            prop_assert_eq!(headers.get(&key.to_ascii_lowercase()), Some(value.as_str()));
        }

        #[test]
        fn prop_json_preserves_entries(entries in proptest::collection::btree_map("[a-z-]{1,12}", ".*", 0..8)) {
            let headers: Headers = entries.clone().into();
            let decoded = Headers::from_json(&headers.to_json().unwrap()).unwrap();
            prop_assert_eq!(decoded.len(), entries.len());
            for (key, value) in &entries {
                prop_assert_eq!(decoded.get(key), Some(value.as_str()));
            }
        }
    }
}
