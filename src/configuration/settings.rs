use std::sync::Arc;

use super::{
    Configuration, ConfigurationBuilder, ConfigurationKeys, ConfigurationSource,
    NamingConvention, NamingConventions, NullConfigurationSource,
};
use crate::error::Error;

/// Broker client settings shared by the consumer and producer options.
#[derive(Clone)]
pub(crate) struct ClientSettings {
    keys: ConfigurationKeys,
    source: Arc<dyn ConfigurationSource>,
    naming_conventions: NamingConventions,
    configurations: Vec<(String, String)>,
}

impl ClientSettings {
    pub(crate) fn new(keys: ConfigurationKeys) -> Self {
        Self {
            keys,
            source: Arc::new(NullConfigurationSource),
            naming_conventions: NamingConventions::new(),
            configurations: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.configurations.push((key.into(), value.into()));
    }

    pub(crate) fn source(&mut self, source: Arc<dyn ConfigurationSource>) {
        self.source = source;
    }

    pub(crate) fn naming_convention(&mut self, convention: NamingConvention) {
        self.naming_conventions.add(convention);
    }

    pub(crate) fn environment_style(&mut self, prefix: Option<&str>, additional_prefixes: &[&str]) {
        self.naming_conventions
            .add_environment_style(prefix, additional_prefixes.iter().copied());
    }

    pub(crate) fn build(&self) -> Result<Configuration, Error> {
        ConfigurationBuilder::new(self.keys.clone())
            .with_configuration_source(self.source.clone())
            .with_naming_conventions(self.naming_conventions.clone())
            .with_configurations(self.configurations.iter().cloned())
            .build()
    }
}
