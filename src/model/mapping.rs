use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Key that names the morph used for phonemes missing from the table.
pub const FALLBACK_KEY: &str = "_fallback";
/// Morph used when the table has no [FALLBACK_KEY] either.
pub const DEFAULT_MORPH: &str = "a";

static DEFAULT_MAPPING: Lazy<HashMap<String, String>> = Lazy::new(|| {
    ["a", "i", "u", "e", "o"]
        .into_iter()
        .map(|v| (v.to_string(), v.to_string()))
        .collect()
});

/// Phoneme to morph name table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhonemeMapping(HashMap<String, String>);

impl Default for PhonemeMapping {
    fn default() -> Self {
        Self(DEFAULT_MAPPING.clone())
    }
}

impl std::ops::Deref for PhonemeMapping {
    type Target = HashMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PhonemeMapping {
    /// An empty table. Everything resolves to [DEFAULT_MORPH].
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// The default vowel table with `overrides` layered on top.
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut r = Self::default();
        r.merge(overrides);
        r
    }

    pub fn merge<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.0
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn insert(&mut self, phoneme: impl Into<String>, morph: impl Into<String>) {
        self.0.insert(phoneme.into(), morph.into());
    }

    /// Resolve a phoneme to its morph name. Never fails.
    pub fn resolve<'a>(&'a self, phoneme: &str) -> &'a str {
        if let Some(v) = self.0.get(phoneme) {
            return v.as_str();
        }

        log::debug!("No morph mapped for phoneme {phoneme}, using fallback");

        self.0
            .get(FALLBACK_KEY)
            .map(|v| v.as_str())
            .unwrap_or(DEFAULT_MORPH)
    }
}
