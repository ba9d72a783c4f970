use std::fmt;
use std::sync::Arc;

/// Maps a configuration key to the name it is stored under in a source.
#[derive(Clone)]
pub enum NamingConvention {
    /// The key as-is.
    Default,
    /// `group.id` becomes `GROUP_ID`, or `APP_GROUP_ID` with prefix `app`.
    ///
    /// Keys are uppercased and each run of space, tab, `.` and `-` becomes a
    /// single `_`.
    Environment { prefix: Option<String> },
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl NamingConvention {
    pub fn environment_style() -> Self {
        NamingConvention::Environment { prefix: None }
    }

    pub fn environment_style_with_prefix(prefix: impl Into<String>) -> Self {
        NamingConvention::Environment {
            prefix: Some(prefix.into()),
        }
    }

    pub fn custom<F>(convert: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        NamingConvention::Custom(Arc::new(convert))
    }

    pub fn key_for(&self, key: &str) -> String {
        match self {
            NamingConvention::Default => key.to_string(),
            NamingConvention::Environment { prefix } => {
                let key = environment_key(key);
                match prefix.as_deref().filter(|p| !p.is_empty()) {
                    Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
                    None => key,
                }
            }
            NamingConvention::Custom(convert) => convert(key),
        }
    }
}

fn environment_key(key: &str) -> String {
    let mut converted = String::with_capacity(key.len());
    let mut in_separator = false;

    for c in key.chars() {
        if matches!(c, ' ' | '\t' | '.' | '-') {
            if !in_separator {
                converted.push('_');
                in_separator = true;
            }
        } else {
            converted.extend(c.to_uppercase());
            in_separator = false;
        }
    }

    converted
}

impl fmt::Debug for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingConvention::Default => f.write_str("Default"),
            NamingConvention::Environment { prefix } => f
                .debug_struct("Environment")
                .field("prefix", prefix)
                .finish(),
            NamingConvention::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Naming conventions tried in order when looking up a key.
#[derive(Clone, Debug, Default)]
pub struct NamingConventions {
    conventions: Vec<NamingConvention>,
}

impl NamingConventions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just [`NamingConvention::Default`].
    pub fn defaults() -> Self {
        Self::new().with(NamingConvention::Default)
    }

    pub fn with(mut self, convention: NamingConvention) -> Self {
        self.add(convention);
        self
    }

    pub fn add(&mut self, convention: NamingConvention) {
        self.conventions.push(convention);
    }

    /// Add environment style conventions for `prefix` and each additional
    /// prefix, in that order.
    pub fn add_environment_style<I, S>(&mut self, prefix: Option<&str>, additional_prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(NamingConvention::Environment {
            prefix: prefix.map(str::to_string),
        });
        for prefix in additional_prefixes {
            self.add(NamingConvention::environment_style_with_prefix(prefix));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamingConvention> {
        self.conventions.iter()
    }

    /// Every name `key` is looked up under.
    pub fn attempted_keys(&self, key: &str) -> Vec<String> {
        self.conventions.iter().map(|c| c.key_for(key)).collect()
    }
}

impl FromIterator<NamingConvention> for NamingConventions {
    fn from_iter<I: IntoIterator<Item = NamingConvention>>(iter: I) -> Self {
        Self {
            conventions: iter.into_iter().collect(),
        }
    }
}
