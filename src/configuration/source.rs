use std::any::type_name;
use std::collections::HashMap;

/// Where configuration values are looked up.
pub trait ConfigurationSource: Send + Sync {
    fn get_by_key(&self, key: &str) -> Option<String>;

    /// Name shown in configuration reports.
    fn name(&self) -> &str {
        short_name(type_name::<Self>())
    }
}

fn short_name(full: &str) -> &str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Finds nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullConfigurationSource;

impl ConfigurationSource for NullConfigurationSource {
    fn get_by_key(&self, _key: &str) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapConfigurationSource {
    values: HashMap<String, String>,
}

impl MapConfigurationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigurationSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigurationSource for MapConfigurationSource {
    fn get_by_key(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Reads process environment variables. Pair with an environment style
/// naming convention.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvironmentConfigurationSource;

impl ConfigurationSource for EnvironmentConfigurationSource {
    fn get_by_key(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Values from layered `config` crate sources (files, environment, ...).
impl ConfigurationSource for config::Config {
    fn get_by_key(&self, key: &str) -> Option<String> {
        self.get_string(key).ok()
    }

    fn name(&self) -> &str {
        "Config"
    }
}
