//! Dotted-path configuration lookups.
//!
//! Paths address nested TOML tables, so `session.store.table` reads
//!
//! ```toml
//! [session.store]
//! table = "sessions"
//! ```

use toml::{Table, Value};

use crate::{ConfigError, Result};

/// A source of typed configuration values addressed by dotted path.
///
/// Lookups return `Ok(None)` when the path is unset and an error when it is
/// set to a value of the wrong type.
pub trait ConfigSource: Send + Sync {
    /// Look up a string value.
    fn get_str(&self, path: &str) -> Result<Option<String>>;

    /// Look up a non-negative integer value.
    fn get_u64(&self, path: &str) -> Result<Option<u64>>;

    /// Look up a string value that must be present.
    fn require_str(&self, path: &str) -> Result<String> {
        self.get_str(path)?.ok_or_else(|| ConfigError::MissingField {
            field: path.to_string(),
        })
    }

    /// Look up a string value, falling back to `default` when unset.
    fn str_or(&self, path: &str, default: &str) -> Result<String> {
        Ok(self.get_str(path)?.unwrap_or_else(|| default.to_string()))
    }

    /// Look up an integer value, falling back to `default` when unset.
    fn u64_or(&self, path: &str, default: u64) -> Result<u64> {
        Ok(self.get_u64(path)?.unwrap_or(default))
    }
}

/// Configuration tree parsed from one or more TOML documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TomlConfig {
    root: Table,
}

impl TomlConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let root: Table = toml::from_str(toml_str)?;
        Ok(Self { root })
    }

    /// Merge another layer into this one. Leaves in `other` win; nested
    /// tables are merged key by key.
    pub fn merge(&mut self, other: TomlConfig) {
        merge_tables(&mut self.root, other.root);
    }

    /// Set a value at a dotted path, creating intermediate tables.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return;
        };

        let mut table = &mut self.root;
        for segment in segments {
            let entry = table
                .entry(segment.to_string())
                .or_insert(Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            let Value::Table(next) = entry else {
                return;
            };
            table = next;
        }
        table.insert(leaf.to_string(), value.into());
    }

    /// Check whether nothing has been configured.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Render the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(&self.root)?)
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }
}

impl ConfigSource for TomlConfig {
    fn get_str(&self, path: &str) -> Result<Option<String>> {
        match self.lookup(path) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::InvalidValue {
                field: path.to_string(),
                expected: "a string".to_string(),
            }),
        }
    }

    fn get_u64(&self, path: &str) -> Result<Option<u64>> {
        match self.lookup(path) {
            None => Ok(None),
            Some(Value::Integer(n)) => {
                u64::try_from(*n)
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidValue {
                        field: path.to_string(),
                        expected: "a non-negative integer".to_string(),
                    })
            }
            Some(_) => Err(ConfigError::InvalidValue {
                field: path.to_string(),
                expected: "an integer".to_string(),
            }),
        }
    }
}

fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(incoming) => {
                if let Some(Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[session]
expiration = 900

[session.store]
region = "eu-west-1"
table = "sessions"
"#;

    #[test]
    fn test_dotted_lookup() {
        let config = TomlConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.get_str("session.store.region").unwrap().as_deref(),
            Some("eu-west-1")
        );
        assert_eq!(config.get_u64("session.expiration").unwrap(), Some(900));
        assert_eq!(config.get_str("session.store.missing").unwrap(), None);
        assert_eq!(config.get_str("nope.at.all").unwrap(), None);
    }

    #[test]
    fn test_defaults_apply_only_when_unset() {
        let config = TomlConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.u64_or("session.expiration", 600).unwrap(), 900);
        assert_eq!(config.u64_or("session.idle", 600).unwrap(), 600);
        assert_eq!(
            config.str_or("session.store.table", "other").unwrap(),
            "sessions"
        );
    }

    #[test]
    fn test_require_missing_field() {
        let config = TomlConfig::new();
        let err = config.require_str("session.store.table").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "session.store.table"));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let config = TomlConfig::from_toml(SAMPLE).unwrap();
        assert!(matches!(
            config.get_u64("session.store.table"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.get_str("session.expiration"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_negative_integer_rejected() {
        let config = TomlConfig::from_toml("[session]\nexpiration = -5\n").unwrap();
        assert!(matches!(
            config.get_u64("session.expiration"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_merge_overrides_leaves_and_keeps_siblings() {
        let mut base = TomlConfig::from_toml(SAMPLE).unwrap();
        let overlay = TomlConfig::from_toml("[session.store]\ntable = \"override\"\n").unwrap();
        base.merge(overlay);

        assert_eq!(
            base.get_str("session.store.table").unwrap().as_deref(),
            Some("override")
        );
        assert_eq!(
            base.get_str("session.store.region").unwrap().as_deref(),
            Some("eu-west-1")
        );
        assert_eq!(base.get_u64("session.expiration").unwrap(), Some(900));
    }

    #[test]
    fn test_set_creates_tables() {
        let mut config = TomlConfig::new();
        config.set("session.store.table", "t1");
        config.set("session.expiration", 30_i64);

        assert_eq!(
            config.get_str("session.store.table").unwrap().as_deref(),
            Some("t1")
        );
        assert_eq!(config.get_u64("session.expiration").unwrap(), Some(30));

        let reparsed = TomlConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            TomlConfig::from_toml("[session\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
