//! Environment-variable overlay for another configuration source.
//!
//! The deployment convention is `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`,
//! `DB_PASSWORD`, `DB_MIN_CONN` and `DB_MAX_CONN`; when set they win over the
//! matching `[postgres]` keys of the wrapped config. `DB_BACKEND` selects
//! `[database] backend`.

use std::collections::HashMap;

use crate::ports::config_port::ConfigPort;

/// Environment variable -> (section, key).
pub const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("DB_HOST", "postgres", "host"),
    ("DB_PORT", "postgres", "port"),
    ("DB_NAME", "postgres", "dbname"),
    ("DB_USER", "postgres", "user"),
    ("DB_PASSWORD", "postgres", "password"),
    ("DB_MIN_CONN", "postgres", "min_conn"),
    ("DB_MAX_CONN", "postgres", "max_conn"),
    ("DB_BACKEND", "database", "backend"),
];

pub struct EnvConfigAdapter<C> {
    inner: C,
    overrides: HashMap<(String, String), String>,
}

impl<C: ConfigPort> EnvConfigAdapter<C> {
    pub fn from_env(inner: C) -> Self {
        Self::from_lookup(inner, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(inner: C, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = ENV_OVERRIDES
            .iter()
            .filter_map(|&(var, section, key)| {
                lookup(var)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| ((section.to_string(), key.to_string()), v))
            })
            .collect();
        Self { inner, overrides }
    }

    fn lookup(&self, section: &str, key: &str) -> Option<&str> {
        self.overrides
            .get(&(section.to_string(), key.to_string()))
            .map(String::as_str)
    }
}

impl<C: ConfigPort> ConfigPort for EnvConfigAdapter<C> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.lookup(section, key)
            .map(str::to_string)
            .or_else(|| self.inner.get_string(section, key))
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match self.lookup(section, key).and_then(|v| v.trim().parse().ok()) {
            Some(v) => v,
            None => self.inner.get_int(section, key, default),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        match self.lookup(section, key).and_then(|v| v.trim().parse().ok()) {
            Some(v) => v,
            None => self.inner.get_double(section, key, default),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.inner.get_bool(section, key, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn base() -> FileConfigAdapter {
        FileConfigAdapter::from_string(
            "[postgres]\nhost = db.internal\nport = 5432\nmax_conn = 20\n",
        )
        .unwrap()
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_wins_over_file() {
        let cfg = EnvConfigAdapter::from_lookup(
            base(),
            env(&[("DB_HOST", "10.0.0.5"), ("DB_MAX_CONN", "50")]),
        );
        assert_eq!(cfg.get_string("postgres", "host"), Some("10.0.0.5".into()));
        assert_eq!(cfg.get_int("postgres", "max_conn", 1), 50);
    }

    #[test]
    fn falls_back_to_file_then_default() {
        let cfg = EnvConfigAdapter::from_lookup(base(), env(&[]));
        assert_eq!(cfg.get_string("postgres", "host"), Some("db.internal".into()));
        assert_eq!(cfg.get_int("postgres", "port", 1), 5432);
        assert_eq!(cfg.get_int("postgres", "min_conn", 1), 1);
    }

    #[test]
    fn unparsable_numeric_override_is_ignored() {
        let cfg = EnvConfigAdapter::from_lookup(base(), env(&[("DB_PORT", "fifty")]));
        assert_eq!(cfg.get_int("postgres", "port", 1), 5432);
    }

    #[test]
    fn blank_override_is_ignored() {
        let cfg = EnvConfigAdapter::from_lookup(base(), env(&[("DB_HOST", "  ")]));
        assert_eq!(cfg.get_string("postgres", "host"), Some("db.internal".into()));
    }

    #[test]
    fn backend_can_come_from_env() {
        let cfg = EnvConfigAdapter::from_lookup(base(), env(&[("DB_BACKEND", "postgres")]));
        assert_eq!(cfg.get_string("database", "backend"), Some("postgres".into()));
    }
}
