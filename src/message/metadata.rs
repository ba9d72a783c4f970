use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Well-known envelope keys.
pub mod keys {
    pub const MESSAGE_ID: &str = "messageId";
    pub const TYPE: &str = "type";
    pub const CORRELATION_ID: &str = "correlationId";
    pub const CAUSATION_ID: &str = "causationId";
    pub const DATA: &str = "data";
}

/// Envelope headers of a message: message id, type, correlation and
/// causation ids, plus arbitrary string pairs.
///
/// Headers keep their insertion order. Lookups ignore the case of the key,
/// so headers read from envelopes written by other producers (`MessageId`,
/// `messageid`) resolve the same way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    headers: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_headers<K, V>(headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut metadata = Self::new();
        for (key, value) in headers {
            metadata.insert(key, value);
        }
        metadata
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a header, replacing an existing header whose key differs only in
    /// case. A replaced header keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.position(&key) {
            Some(index) => self.headers[index] = (key, value),
            None => self.headers.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.position(key)?;
        Some(self.headers.remove(index).1)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.non_empty(keys::MESSAGE_ID)
    }

    pub fn set_message_id(&mut self, id: impl Into<String>) {
        self.insert(keys::MESSAGE_ID, id);
    }

    pub fn message_type(&self) -> Option<&str> {
        self.non_empty(keys::TYPE)
    }

    pub fn set_message_type(&mut self, message_type: impl Into<String>) {
        self.insert(keys::TYPE, message_type);
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.non_empty(keys::CORRELATION_ID)
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.insert(keys::CORRELATION_ID, id);
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.non_empty(keys::CAUSATION_ID)
    }

    pub fn set_causation_id(&mut self, id: impl Into<String>) {
        self.insert(keys::CAUSATION_ID, id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.headers.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let headers = Map::<String, Value>::deserialize(deserializer)?;
        Ok(headers
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_headers(iter)
    }
}
