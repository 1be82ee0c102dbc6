use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid organism: {0:?}")]
    InvalidOrganism(String),

    #[error("no ontology registered for organism {0}")]
    #[diagnostic(help("built-in organisms are `human` and `mouse`"))]
    UnknownOrganism(String),

    #[error("unknown ontology version {version} for organism {organism}")]
    UnknownVersion { organism: String, version: String },

    #[error("could not resolve anatomical constraint: {0}")]
    #[diagnostic(help("retry without the constraint or use an UBERON id or name"))]
    UnresolvedAnatomy(String),

    #[error("invalid ontology: {0}")]
    InvalidOntology(String),

    #[error("ontology node not found: {0}")]
    UnknownNode(String),

    #[error("failed to parse OBO file at line {line}: {message}")]
    OboParse { line: usize, message: String },

    #[error("invalid class map: {0}")]
    InvalidClassMap(String),

    #[error("class map already exists at {0}")]
    ClassMapExists(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("ontology request failed: {0}")]
    OntologyHttp(String),

    #[error("ontology server returned status {status}: {message}")]
    OntologyStatus { status: u16, message: String },
}
