//! Targets — addressable cluster nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default port the node management agent listens on.
pub const DEFAULT_AGENT_PORT: u16 = 2224;

/// One reachable node: a label plus the addresses to try, in preference
/// order. Identity is the label alone; two targets with the same label are
/// the same node even if their address lists differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    label: String,
    addrs: Vec<String>,
    port: u16,
}

impl Target {
    pub fn new<I, S>(label: impl Into<String>, addrs: I, port: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label = label.into();
        let mut addrs: Vec<String> = addrs.into_iter().map(Into::into).collect();
        // A label is a resolvable hostname in most deployments.
        if addrs.is_empty() {
            addrs.push(label.clone());
        }
        Self { label, addrs, port }
    }

    /// Target with no explicit addresses, reached through its label.
    pub fn from_label(label: impl Into<String>) -> Self {
        Self::new(label, Vec::<String>::new(), DEFAULT_AGENT_PORT)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_label_only() {
        let a = Target::new("n1", ["10.0.0.1"], 2224);
        let b = Target::new("n1", ["10.0.0.99", "10.0.0.1"], 3000);
        let c = Target::new("n2", ["10.0.0.1"], 2224);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn label_becomes_the_address_when_none_given() {
        let t = Target::from_label("n1");
        assert_eq!(t.addrs(), ["n1"]);
        assert_eq!(t.port(), DEFAULT_AGENT_PORT);
    }
}
