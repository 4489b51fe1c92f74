use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// String parameters of a load-balancing algorithm.
///
/// Values stay textual until the algorithm reads them, so one profile format
/// serves every registered bundler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(BTreeMap<String, String>);

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, CoreError> {
        self.parse(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64, CoreError> {
        self.parse(key, default)
    }

    /// Rejects NaN and infinities.
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, CoreError> {
        let v: f64 = self.parse(key, default)?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(self.invalid(key))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, CoreError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| self.invalid(key)),
        }
    }

    pub(crate) fn invalid(&self, key: &str) -> CoreError {
        CoreError::InvalidProfile {
            key: key.to_string(),
            value: self.0.get(key).cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_fall_back_to_defaults() {
        let p = Profile::new().with("size", 5).with("gain", "0.5");
        assert_eq!(p.get_usize("size", 1).unwrap(), 5);
        assert_eq!(p.get_usize("missing", 7).unwrap(), 7);
        assert_eq!(p.get_f64("gain", 1.0).unwrap(), 0.5);
    }

    #[test]
    fn malformed_values_are_reported() {
        let p = Profile::new().with("size", "lots").with("gain", "NaN");
        match p.get_usize("size", 1) {
            Err(CoreError::InvalidProfile { key, value }) => {
                assert_eq!(key, "size");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(p.get_f64("gain", 1.0).is_err());
    }
}
