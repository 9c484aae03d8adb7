use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

// Regex to validate environment variables keys:
// uppercase letters, digits, and the '_' (underscore) from the characters defined in
// Portable Character Set and do not begin with a digit
// https://pubs.opengroup.org/onlinepubs/000095399/basedefs/xbd_chap08.html
const ENV_VAR_KEY_REGEX: &str = r"^[a-zA-Z_][a-zA-Z0-9_]*$";

// Values injected into a remote environment are restricted to a conservative
// charset so they survive shell quoting and base64 round-tripping intact.
const ENV_VAR_VALUE_REGEX: &str = r"^[A-Za-z0-9._/@:+=, -]*$";

fn env_var_key_regex() -> &'static Regex {
    static RE_ONCE: OnceLock<Regex> = OnceLock::new();
    RE_ONCE.get_or_init(|| Regex::new(ENV_VAR_KEY_REGEX).unwrap())
}

fn env_var_value_regex() -> &'static Regex {
    static RE_ONCE: OnceLock<Regex> = OnceLock::new();
    RE_ONCE.get_or_init(|| Regex::new(ENV_VAR_VALUE_REGEX).unwrap())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvVarError {
    #[error("invalid environment variable key `{0}`")]
    InvalidKeyFormat(String),
    #[error("value for `{0}` contains characters outside the allowed set")]
    InvalidValueFormat(String),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EnvVarKey(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVarValue(String);

#[derive(Debug, Clone, Default)]
pub struct EnvVars(HashMap<EnvVarKey, EnvVarValue>);

impl EnvVarKey {
    pub fn new(key: impl Into<String>) -> Result<Self, EnvVarError> {
        let key = key.into();
        if !env_var_key_regex().is_match(&key) {
            return Err(EnvVarError::InvalidKeyFormat(key));
        }
        Ok(EnvVarKey(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EnvVarValue {
    pub fn new(value: impl Into<String>) -> Result<Self, EnvVarError> {
        let value = value.into();
        if !env_var_value_regex().is_match(&value) {
            return Err(EnvVarError::InvalidValueFormat(value));
        }
        Ok(EnvVarValue(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EnvVars {
    pub fn with_var(mut self, key: EnvVarKey, val: EnvVarValue) -> Self {
        self.0.insert(key, val);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EnvVarKey, &EnvVarValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the set as a `KEY="VALUE"` file, one literal-quoted
    /// assignment per line, in a deterministic (sorted) key order.
    pub fn to_env_file(&self) -> String {
        let mut keys: Vec<&EnvVarKey> = self.0.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| format!("{}=\"{}\"\n", k.as_str(), self.0[k].as_str()))
            .collect()
    }
}

impl TryFrom<String> for EnvVarKey {
    type Error = EnvVarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EnvVarKey::new(value)
    }
}
