use std::collections::BTreeMap;

use super::keys;

/// Resolved broker client configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.get(keys::GROUP_ID)
    }

    pub fn bootstrap_servers(&self) -> Option<&str> {
        self.get(keys::BOOTSTRAP_SERVERS)
    }

    /// `true` unless `enable.auto.commit` is set to something other than true.
    pub fn enable_auto_commit(&self) -> bool {
        self.get(keys::ENABLE_AUTO_COMMIT)
            .and_then(|value| value.trim().to_ascii_lowercase().parse::<bool>().ok())
            .unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
