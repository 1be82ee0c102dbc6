use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Organism(String);

impl Organism {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Organism {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', " ");
        let canonical = match normalized.as_str() {
            "homo sapiens" | "homosapiens" => "human".to_string(),
            "mus musculus" | "musmusculus" => "mouse".to_string(),
            other => other.to_string(),
        };
        let is_valid = !canonical.is_empty()
            && canonical
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == ' ' || ch == '-');
        if !is_valid {
            return Err(KiraError::InvalidOrganism(value.to_string()));
        }
        Ok(Self(canonical))
    }
}

impl TryFrom<String> for Organism {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Organism> for String {
    fn from(value: Organism) -> Self {
        value.0
    }
}

/// Ontology term identifier such as `CL:0000084` or `UBERON:0001264`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(prefix, _)| prefix)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Matching strategies in precedence order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Synonym,
    FuzzyRatio,
    FuzzyPartial,
}

impl Strategy {
    pub const PRECEDENCE: [Strategy; 4] = [
        Strategy::Exact,
        Strategy::Synonym,
        Strategy::FuzzyRatio,
        Strategy::FuzzyPartial,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Exact => write!(f, "exact"),
            Strategy::Synonym => write!(f, "synonym"),
            Strategy::FuzzyRatio => write!(f, "fuzzy_ratio"),
            Strategy::FuzzyPartial => write!(f, "fuzzy_partial"),
        }
    }
}

/// What to do when an anatomical constraint cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnatomyFallback {
    #[default]
    Propagate,
    Unrestricted,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_organism_aliases() {
        let org: Organism = "Homo sapiens".parse().unwrap();
        assert_eq!(org.as_str(), "human");
        let org: Organism = "mus_musculus".parse().unwrap();
        assert_eq!(org.as_str(), "mouse");
        let org: Organism = " Zebrafish ".parse().unwrap();
        assert_eq!(org.as_str(), "zebrafish");
    }

    #[test]
    fn parse_organism_invalid() {
        let err = "".parse::<Organism>().unwrap_err();
        assert_matches!(err, KiraError::InvalidOrganism(_));
        let err = "../etc".parse::<Organism>().unwrap_err();
        assert_matches!(err, KiraError::InvalidOrganism(_));
    }

    #[test]
    fn strategy_precedence_matches_ordering() {
        let mut sorted = Strategy::PRECEDENCE.to_vec();
        sorted.sort();
        assert_eq!(sorted, Strategy::PRECEDENCE.to_vec());
        assert_eq!(Strategy::FuzzyPartial.to_string(), "fuzzy_partial");
    }

    #[test]
    fn node_id_prefix() {
        assert_eq!(NodeId::new("CL:0000084").prefix(), Some("CL"));
        assert_eq!(NodeId::new("orphan").prefix(), None);
    }
}
