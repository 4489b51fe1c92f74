use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

use super::{AdaptiveBundler, Bundler, FixedSizeBundler, Profile, ProportionalBundler};

/// Builds a bundler from a profile.
pub type BundlerProvider = fn(&Profile) -> Result<Box<dyn Bundler>, CoreError>;

/// Algorithm name to provider lookup.
#[derive(Clone)]
pub struct BundlerRegistry {
    providers: BTreeMap<String, BundlerProvider>,
}

impl fmt::Debug for BundlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundlerRegistry")
            .field("algorithms", &self.names())
            .finish()
    }
}

impl Default for BundlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn manual(profile: &Profile) -> Result<Box<dyn Bundler>, CoreError> {
    Ok(Box::new(FixedSizeBundler::from_profile(profile)?))
}

fn adaptive(profile: &Profile) -> Result<Box<dyn Bundler>, CoreError> {
    Ok(Box::new(AdaptiveBundler::from_profile(profile)?))
}

fn proportional(profile: &Profile) -> Result<Box<dyn Bundler>, CoreError> {
    Ok(Box::new(ProportionalBundler::from_profile(profile)?))
}

impl BundlerRegistry {
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// `manual`, `adaptive` (alias `autotuned`) and `proportional`.
    pub fn with_defaults() -> Self {
        let mut r = Self::empty();
        r.register(FixedSizeBundler::ALGORITHM, manual);
        r.register(AdaptiveBundler::ALGORITHM, adaptive);
        r.register("autotuned", adaptive);
        r.register(ProportionalBundler::ALGORITHM, proportional);
        r
    }

    /// Adds or replaces the provider for `name`.
    pub fn register(&mut self, name: impl Into<String>, provider: BundlerProvider) -> &mut Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn build(&self, name: &str, profile: &Profile) -> Result<Box<dyn Bundler>, CoreError> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| CoreError::UnknownAlgorithm(name.to_string()))?;
        provider(profile)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_builtin_algorithms() {
        let r = BundlerRegistry::with_defaults();
        assert_eq!(
            r.names(),
            vec!["adaptive", "autotuned", "manual", "proportional"]
        );
        let b = r.build("autotuned", &Profile::new()).unwrap();
        assert_eq!(b.algorithm(), "adaptive");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let r = BundlerRegistry::with_defaults();
        assert!(matches!(
            r.build("nope", &Profile::new()),
            Err(CoreError::UnknownAlgorithm(n)) if n == "nope"
        ));
    }

    #[test]
    fn custom_provider_can_be_registered() {
        fn five(_: &Profile) -> Result<Box<dyn Bundler>, CoreError> {
            Ok(Box::new(FixedSizeBundler::new(5)))
        }
        let mut r = BundlerRegistry::empty();
        r.register("five", five);
        assert!(r.contains("five"));
        assert!(!r.contains("manual"));
        assert_eq!(r.build("five", &Profile::new()).unwrap().algorithm(), "manual");
    }
}
