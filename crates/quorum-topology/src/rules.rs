//! Topology rules: participant name -> names it may peer with.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::TopologyError;

/// Optional restriction on which participants are advertised to each other.
///
/// Serialized as a plain JSON object, e.g. `{"a": ["b", "c"], "b": ["a"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    rules: BTreeMap<String, Vec<String>>,
}

impl Topology {
    /// Topology without rules: every participant peers with every other.
    pub fn full_mesh() -> Self {
        Self::default()
    }

    /// Parse a topology document.
    ///
    /// Rejects rules keyed by, or listing, an empty name since such an entry
    /// can never match an enrolled participant.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let topology: Self = serde_json::from_str(json)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Add (or replace) the rule for `name`.
    #[must_use]
    pub fn with_rule<I, S>(mut self, name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .insert(name.into(), allowed.into_iter().map(Into::into).collect());
        self
    }

    fn validate(&self) -> Result<(), TopologyError> {
        for (name, allowed) in &self.rules {
            if name.is_empty() || allowed.iter().any(String::is_empty) {
                return Err(TopologyError::EmptyName(name.clone()));
            }
        }
        Ok(())
    }

    /// True when no participant is restricted.
    pub fn is_full_mesh(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of restricted participants.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if no rules are defined.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule for `name`, if one exists.
    pub fn rule_for(&self, name: &str) -> Option<&[String]> {
        self.rules.get(name).map(Vec::as_slice)
    }

    /// May `from` be given `to` as a peer?
    ///
    /// A participant without a rule falls back to full mesh.
    pub fn allows(&self, from: &str, to: &str) -> bool {
        match self.rules.get(from) {
            Some(allowed) => allowed.iter().any(|name| name == to),
            None => true,
        }
    }

    /// Names referenced by the rules that are not in `known`.
    ///
    /// Rules are advisory, so unknown names are not an error; callers log them.
    pub fn unknown_names<'a>(&'a self, known: &BTreeSet<&str>) -> Vec<&'a str> {
        let mut unknown: BTreeSet<&str> = BTreeSet::new();
        for (name, allowed) in &self.rules {
            for candidate in std::iter::once(name).chain(allowed.iter()) {
                if !known.contains(candidate.as_str()) {
                    unknown.insert(candidate.as_str());
                }
            }
        }
        unknown.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_of_lists() {
        let topology = Topology::from_json(r#"{"a": ["b"], "b": ["a", "c"]}"#).unwrap();
        assert_eq!(topology.len(), 2);
        assert_eq!(topology.rule_for("a"), Some(&["b".to_string()][..]));
        assert!(topology.rule_for("c").is_none());
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            Topology::from_json(r#"{"a": "b"}"#),
            Err(TopologyError::Parse(_))
        ));
        assert!(matches!(
            Topology::from_json("[1, 2]"),
            Err(TopologyError::Parse(_))
        ));
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(
            Topology::from_json(r#"{"": ["a"]}"#),
            Err(TopologyError::EmptyName(_))
        ));
        assert!(matches!(
            Topology::from_json(r#"{"a": [""]}"#),
            Err(TopologyError::EmptyName(name)) if name == "a"
        ));
    }

    #[test]
    fn missing_rule_falls_back_to_full_mesh() {
        let topology = Topology::full_mesh().with_rule("a", ["b"]);
        assert!(topology.allows("a", "b"));
        assert!(!topology.allows("a", "c"));
        assert!(!topology.allows("a", "a"));
        assert!(topology.allows("c", "a"));
        assert!(topology.allows("c", "c"));
    }

    #[test]
    fn self_only_rule() {
        let topology = Topology::from_json(r#"{"a": ["a"]}"#).unwrap();
        assert!(topology.allows("a", "a"));
        assert!(!topology.allows("a", "b"));
    }

    #[test]
    fn unknown_names_reported_once() {
        let topology = Topology::full_mesh()
            .with_rule("a", ["b", "ghost"])
            .with_rule("phantom", ["ghost"]);
        let known: BTreeSet<&str> = ["a", "b"].into_iter().collect();
        assert_eq!(topology.unknown_names(&known), vec!["ghost", "phantom"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let topology = Topology::full_mesh().with_rule("a", ["b"]);
        let json = serde_json::to_string(&topology).unwrap();
        assert_eq!(json, r#"{"a":["b"]}"#);
        assert_eq!(Topology::from_json(&json).unwrap(), topology);
    }
}
