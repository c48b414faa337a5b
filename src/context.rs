//! Deployment context: the key/value settings a synthesis runs with.
//!
//! Values come from the `context` table of the app file (`cdk.json`) and are
//! then overridden by `-c key=value` pairs from the command line. Override
//! values are kept as the literal text after `=`, so `-c project_name=1.10`
//! stays `1.10`; the typed getters convert `-c max_azs=2` or
//! `-c use_existing_vpc=true` when the value is read.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Key of the context table inside the app file.
pub const CONTEXT_TABLE: &str = "context";

/// Deployment context values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: IndexMap<String, Value>,
    source: Option<PathBuf>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the `context` table of an app file. A missing file yields an
    /// empty context so every value can come from overrides.
    pub fn load_app_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "app file not found; using command line context only");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        let app: Value = serde_json::from_str(&content)
            .map_err(|e| Error::context_load(path, e.to_string()))?;

        let values = match app.get(CONTEXT_TABLE) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(table)) => table
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Some(_) => {
                return Err(Error::context_load(
                    path,
                    format!("'{}' must be an object", CONTEXT_TABLE),
                ))
            }
        };

        debug!(path = %path.display(), keys = values.len(), "loaded app context");
        Ok(Self {
            values,
            source: Some(path.to_path_buf()),
        })
    }

    /// App file the context was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Apply `key=value` overrides in order. `@path` loads a YAML or JSON
    /// mapping of overrides from a file.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> Result<()> {
        for item in overrides {
            let item = item.as_ref();
            if let Some(file) = item.strip_prefix('@') {
                let content = std::fs::read_to_string(file)
                    .map_err(|e| Error::context_load(file, e.to_string()))?;
                let table: IndexMap<String, Value> = serde_yaml::from_str(&content)?;
                for (key, value) in table {
                    debug!(key = %key, source = %file, "context override");
                    self.values.insert(key, value);
                }
            } else {
                let (key, raw) = item.split_once('=').ok_or_else(|| {
                    Error::invalid_context(item, "overrides must be written as key=value")
                })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(Error::invalid_context(item, "empty context key"));
                }
                debug!(key = %key, "context override");
                self.values
                    .insert(key.to_string(), Value::String(raw.to_string()));
            }
        }
        Ok(())
    }

    /// Raw value. Nulls count as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Context keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// String value. Numbers and bools are rendered; empty strings are absent.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(_) => Err(Error::invalid_context(key, "expected a string")),
        }
    }

    /// String value that must be present.
    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)?
            .ok_or_else(|| Error::MissingContext(key.to_string()))
    }

    /// Bool value, accepting `true`/`false` strings in any case.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" | "" => Ok(Some(false)),
                other => Err(Error::invalid_context(
                    key,
                    format!("'{}' is not a boolean", other),
                )),
            },
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(Error::invalid_context(key, format!("'{}' is not a boolean", n))),
            },
            Some(_) => Err(Error::invalid_context(key, "expected a boolean")),
        }
    }

    /// Value parsed with [`FromStr`] from its string form.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_str(key)? {
            None => Ok(None),
            Some(s) => s
                .parse::<T>()
                .map(Some)
                .map_err(|e| Error::invalid_context(key, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_load_app_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"app": "syncstack", "context": {{"project_prefix": "acme", "max_azs": 2}}}}"#
        )
        .unwrap();

        let ctx = Context::load_app_file(file.path()).unwrap();
        assert_eq!(ctx.require_str("project_prefix").unwrap(), "acme");
        assert_eq!(ctx.get_parsed::<usize>("max_azs").unwrap(), Some(2));
        assert_eq!(ctx.source(), Some(file.path()));
    }

    #[test]
    fn test_missing_app_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::load_app_file(dir.path().join("cdk.json")).unwrap();
        assert_eq!(ctx.keys().count(), 0);
    }

    #[test]
    fn test_malformed_app_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            Context::load_app_file(file.path()).unwrap_err(),
            Error::ContextLoad { .. }
        ));
    }

    #[test]
    fn test_overrides_are_typed() {
        let mut ctx = Context::new();
        ctx.set("use_existing_vpc", false);
        ctx.apply_overrides(&["use_existing_vpc=true", "max_azs=3", "vpc_cidr=10.1.0.0/16"])
            .unwrap();

        assert_eq!(ctx.get_bool("use_existing_vpc").unwrap(), Some(true));
        assert_eq!(ctx.get_parsed::<usize>("max_azs").unwrap(), Some(3));
        assert_eq!(ctx.require_str("vpc_cidr").unwrap(), "10.1.0.0/16");
    }

    #[test]
    fn test_overrides_keep_literal_text() {
        let mut ctx = Context::new();
        ctx.apply_overrides(&[
            "project_name=1.10",
            "ec2_bastion_key_pair_name=007",
            "ec2_private_key_pair_name=0x1F",
            "flag=1",
        ])
        .unwrap();

        assert_eq!(ctx.require_str("project_name").unwrap(), "1.10");
        assert_eq!(ctx.require_str("ec2_bastion_key_pair_name").unwrap(), "007");
        assert_eq!(ctx.require_str("ec2_private_key_pair_name").unwrap(), "0x1F");
        assert_eq!(ctx.get_bool("flag").unwrap(), Some(true));
    }

    #[test]
    fn test_override_without_equals_fails() {
        let mut ctx = Context::new();
        assert!(ctx.apply_overrides(&["bucket_name"]).is_err());
    }

    #[test]
    fn test_string_bools() {
        let mut ctx = Context::new();
        ctx.set("a", "True");
        ctx.set("b", "false");
        ctx.set("c", "maybe");
        assert_eq!(ctx.get_bool("a").unwrap(), Some(true));
        assert_eq!(ctx.get_bool("b").unwrap(), Some(false));
        assert!(ctx.get_bool("c").is_err());
        assert_eq!(ctx.get_bool("d").unwrap(), None);
    }

    #[test]
    fn test_empty_string_is_missing() {
        let mut ctx = Context::new();
        ctx.set("bucket_name", "");
        assert!(matches!(
            ctx.require_str("bucket_name").unwrap_err(),
            Error::MissingContext(_)
        ));
    }
}
