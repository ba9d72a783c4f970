pub const GROUP_ID: &str = "group.id";
pub const ENABLE_AUTO_COMMIT: &str = "enable.auto.commit";
pub const ALLOW_AUTO_CREATE_TOPICS: &str = "allow.auto.create.topics";
pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const BROKER_VERSION_FALLBACK: &str = "broker.version.fallback";
pub const API_VERSION_FALLBACK_MS: &str = "api.version.fallback.ms";
pub const SSL_CA_LOCATION: &str = "ssl.ca.location";
pub const SASL_USERNAME: &str = "sasl.username";
pub const SASL_PASSWORD: &str = "sasl.password";
pub const SASL_MECHANISMS: &str = "sasl.mechanisms";
pub const SECURITY_PROTOCOL: &str = "security.protocol";

/// A configuration key looked up from the configuration source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationKey {
    pub name: String,
    pub required: bool,
}

/// The ordered set of keys a builder looks up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigurationKeys {
    keys: Vec<ConfigurationKey>,
}

impl ConfigurationKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of a broker consumer. `bootstrap.servers` and `group.id` are required.
    pub fn consumer() -> Self {
        Self::new()
            .required(BOOTSTRAP_SERVERS)
            .required(GROUP_ID)
            .optional(ENABLE_AUTO_COMMIT)
            .optional(ALLOW_AUTO_CREATE_TOPICS)
            .optional(BROKER_VERSION_FALLBACK)
            .optional(API_VERSION_FALLBACK_MS)
            .optional(SSL_CA_LOCATION)
            .optional(SASL_USERNAME)
            .optional(SASL_PASSWORD)
            .optional(SASL_MECHANISMS)
            .optional(SECURITY_PROTOCOL)
    }

    /// Keys of a broker producer. Only `bootstrap.servers` is required.
    pub fn producer() -> Self {
        Self::new()
            .required(BOOTSTRAP_SERVERS)
            .optional(BROKER_VERSION_FALLBACK)
            .optional(API_VERSION_FALLBACK_MS)
            .optional(SSL_CA_LOCATION)
            .optional(SASL_USERNAME)
            .optional(SASL_PASSWORD)
            .optional(SASL_MECHANISMS)
            .optional(SECURITY_PROTOCOL)
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.with(name, true)
    }

    pub fn optional(self, name: impl Into<String>) -> Self {
        self.with(name, false)
    }

    fn with(mut self, name: impl Into<String>, required: bool) -> Self {
        self.keys.push(ConfigurationKey {
            name: name.into(),
            required,
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigurationKey> {
        self.keys.iter()
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .filter(|key| key.required)
            .map(|key| key.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.iter().any(|key| key.name == name)
    }
}
