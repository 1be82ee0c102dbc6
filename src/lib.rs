//! Maps free-text cell-type labels of single-cell datasets onto versioned
//! cell-type ontologies.

pub mod aggregate;
pub mod anatomy;
pub mod classmap;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod obo;
pub mod ontology;
pub mod output;
pub mod source;
pub mod store;
pub mod strategy;

pub use aggregate::{MatchOutput, MatchResult};
pub use error::KiraError;
pub use matcher::{CelltypeMatcher, MatchOptions, match_celltypes};
