#![allow(dead_code)]

use kira_celltype_mapper::domain::{NodeId, Organism};
use kira_celltype_mapper::error::KiraError;
use kira_celltype_mapper::ontology::{OntologySpec, TermRecord};
use kira_celltype_mapper::source::{OntologySource, resolve_version};

/// In-memory source serving hand-written releases.
pub struct FixtureSource {
    pub specs: Vec<OntologySpec>,
}

impl OntologySource for FixtureSource {
    fn versions(&self, organism: &Organism) -> Result<Vec<String>, KiraError> {
        Ok(self
            .specs
            .iter()
            .filter(|spec| &spec.organism == organism)
            .map(|spec| spec.version.clone())
            .collect())
    }

    fn load(&self, organism: &Organism, version: Option<&str>) -> Result<OntologySpec, KiraError> {
        let version = resolve_version(organism, &self.versions(organism)?, version)?;
        Ok(self
            .specs
            .iter()
            .find(|spec| &spec.organism == organism && spec.version == version)
            .cloned()
            .expect("resolved version exists"))
    }
}

pub fn human() -> Organism {
    "human".parse().unwrap()
}

pub fn term(id: &str, name: &str, synonyms: &[&str], parents: &[&str]) -> TermRecord {
    TermRecord {
        id: NodeId::new(id),
        name: name.to_string(),
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        parents: parents.iter().map(|p| NodeId::new(*p)).collect(),
        located_in: Vec::new(),
    }
}

pub fn fixture(celltypes: Vec<TermRecord>) -> FixtureSource {
    FixtureSource {
        specs: vec![OntologySpec {
            organism: human(),
            version: "fixture".to_string(),
            celltypes,
            anatomy: Vec::new(),
        }],
    }
}
