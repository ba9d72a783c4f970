use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{
    Configuration, ConfigurationKeys, ConfigurationReporter, ConfigurationSource,
    NamingConventions, NullConfigurationSource,
};
use crate::error::Error;

/// Resolves a [`Configuration`] from manual values and a configuration
/// source.
///
/// Manual values win. Every other known key is looked up through each naming
/// convention in turn and the first hit is used.
///
/// ```ignore
/// let configuration = ConfigurationBuilder::for_consumer()
///     .with_configuration_source(Arc::new(EnvironmentConfigurationSource))
///     .with_naming_conventions(NamingConventions::new().with(NamingConvention::environment_style_with_prefix("app")))
///     .with_configurations([("group.id", "orders")])
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ConfigurationBuilder {
    keys: ConfigurationKeys,
    naming_conventions: NamingConventions,
    source: Arc<dyn ConfigurationSource>,
    configurations: Vec<(String, String)>,
}

impl ConfigurationBuilder {
    pub fn new(keys: ConfigurationKeys) -> Self {
        Self {
            keys,
            naming_conventions: NamingConventions::defaults(),
            source: Arc::new(NullConfigurationSource),
            configurations: Vec::new(),
        }
    }

    pub fn for_consumer() -> Self {
        Self::new(ConfigurationKeys::consumer())
    }

    pub fn for_producer() -> Self {
        Self::new(ConfigurationKeys::producer())
    }

    /// Replaces the conventions. An empty list keeps the default one.
    pub fn with_naming_conventions(mut self, naming_conventions: NamingConventions) -> Self {
        if !naming_conventions.is_empty() {
            self.naming_conventions = naming_conventions;
        }
        self
    }

    pub fn with_configuration_source(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.source = source;
        self
    }

    /// Manual values. A later value for the same key replaces an earlier one.
    pub fn with_configurations<I, K, V>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in configurations {
            let key = key.into();
            let value = value.into();
            match self.configurations.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => self.configurations.push((key, value)),
            }
        }
        self
    }

    pub fn build(&self) -> Result<Configuration, Error> {
        self.build_with_reporter(&mut ConfigurationReporter::new())
    }

    /// Build, recording every lookup in `reporter`.
    pub fn build_with_reporter(
        &self,
        reporter: &mut ConfigurationReporter,
    ) -> Result<Configuration, Error> {
        let values = self.fill(reporter);
        debug!(report = %reporter.report(), "Configuration resolved");

        for key in self.keys.required_keys() {
            if values.get(key).map_or(true, |value| value.is_empty()) {
                return Err(Error::InvalidConfiguration(format!(
                    "Invalid configuration:\n{}",
                    reporter.report()
                )));
            }
        }

        Ok(Configuration::new(values))
    }

    fn fill(&self, reporter: &mut ConfigurationReporter) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();

        for (key, value) in &self.configurations {
            values.insert(key.clone(), value.clone());
            reporter.add_manual(key, value);
        }

        for key in self.keys.iter() {
            if values.contains_key(&key.name) {
                continue;
            }
            if let Some(value) = self.lookup(&key.name, reporter) {
                values.insert(key.name.clone(), value);
            }
        }

        values
    }

    fn lookup(&self, key: &str, reporter: &mut ConfigurationReporter) -> Option<String> {
        let source_name = self.source.name();

        for convention in self.naming_conventions.iter() {
            let attempted = convention.key_for(key);
            if let Some(value) = self.source.get_by_key(&attempted) {
                reporter.add_value(key, source_name, &value, &attempted);
                return Some(value);
            }
        }

        reporter.add_missing(key, source_name, &self.naming_conventions.attempted_keys(key));
        None
    }
}

impl std::fmt::Debug for ConfigurationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationBuilder")
            .field("keys", &self.keys)
            .field("naming_conventions", &self.naming_conventions)
            .field("source", &self.source.name())
            .field("configurations", &self.configurations)
            .finish()
    }
}
