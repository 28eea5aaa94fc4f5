//! Option values as original/normalized pairs.
//!
//! Every option value is kept twice: the string exactly as the caller typed
//! it (for report wording) and a normalized form (what the rules inspect and
//! what ends up in the cluster configuration). An empty normalized value is
//! the convention for "remove this option".

use std::collections::BTreeMap;

/// Whitespace-trimmed copy of the raw input. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePair {
    original: String,
    normalized: String,
}

impl ValuePair {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let normalized = normalize(&original);
        Self {
            original,
            normalized,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when the normalized value is empty, i.e. the caller asked for the
    /// option to be removed.
    pub fn is_removal(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl<S: Into<String>> From<S> for ValuePair {
    fn from(raw: S) -> Self {
        Self::new(raw)
    }
}

/// Options under validation, keyed by name. `BTreeMap` keeps iteration in
/// name order, which keeps batched report payloads deterministic.
pub type OptionMap = BTreeMap<String, ValuePair>;

/// Build an [`OptionMap`] from raw name/value pairs.
pub fn options_from<I, K, V>(pairs: I) -> OptionMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), ValuePair::new(value.into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_trims_and_keeps_the_original() {
        let pair = ValuePair::new("  on \n");
        assert_eq!(pair.original(), "  on \n");
        assert_eq!(pair.normalized(), "on");
    }

    #[test]
    fn blank_value_means_removal() {
        assert!(ValuePair::new("   ").is_removal());
        assert!(ValuePair::new("").is_removal());
        assert!(!ValuePair::new("0").is_removal());
    }

    #[test]
    fn option_map_iterates_in_name_order() {
        let options = options_from([("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        let names: Vec<&str> = options.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
