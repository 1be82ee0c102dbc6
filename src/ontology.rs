use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{NodeId, Organism};
use crate::error::KiraError;
use crate::source::OntologySource;

/// Serialized form of one ontology release as handed out by an [`OntologySource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologySpec {
    pub organism: Organism,
    pub version: String,
    #[serde(default)]
    pub celltypes: Vec<TermRecord>,
    #[serde(default)]
    pub anatomy: Vec<TermRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub parents: Vec<NodeId>,
    #[serde(default)]
    pub located_in: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OntologySummary {
    pub organism: String,
    pub version: String,
    pub celltypes: usize,
    pub synonyms: usize,
    pub anatomy: usize,
}

#[derive(Debug, Clone)]
pub struct OntologyNode {
    pub id: NodeId,
    pub name: String,
    pub synonyms: Vec<String>,
    pub parents: BTreeSet<NodeId>,
    pub children: BTreeSet<NodeId>,
    pub located_in: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    Names,
    Synonyms,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermText {
    Name,
    Synonym,
}

/// One searchable string of the ontology and the node it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct NamedEntry<'a> {
    pub text: &'a str,
    pub node: &'a OntologyNode,
    pub kind: TermText,
}

/// A directed is-a graph over one family of terms.
#[derive(Debug, Clone, Default)]
pub struct TermGraph {
    nodes: Vec<OntologyNode>,
    index: HashMap<NodeId, usize>,
}

impl TermGraph {
    fn from_records(records: Vec<TermRecord>, label: &str) -> Result<Self, KiraError> {
        let mut graph = TermGraph::default();
        for record in records {
            if graph.index.contains_key(&record.id) {
                return Err(KiraError::InvalidOntology(format!(
                    "duplicate {label} id {}",
                    record.id
                )));
            }
            let mut synonyms = Vec::new();
            for synonym in record.synonyms {
                if synonym != record.name && !synonyms.contains(&synonym) {
                    synonyms.push(synonym);
                }
            }
            graph.index.insert(record.id.clone(), graph.nodes.len());
            graph.nodes.push(OntologyNode {
                id: record.id,
                name: record.name,
                synonyms,
                parents: record.parents.into_iter().collect(),
                children: BTreeSet::new(),
                located_in: record.located_in.into_iter().collect(),
            });
        }

        let mut edges = Vec::new();
        for node in &graph.nodes {
            for parent in &node.parents {
                let Some(&parent_idx) = graph.index.get(parent) else {
                    return Err(KiraError::InvalidOntology(format!(
                        "{label} {} lists undeclared parent {parent}",
                        node.id
                    )));
                };
                edges.push((parent_idx, node.id.clone()));
            }
        }
        for (parent_idx, child) in edges {
            graph.nodes[parent_idx].children.insert(child);
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &OntologyNode> {
        self.nodes.iter()
    }

    pub fn get(&self, id: &NodeId) -> Option<&OntologyNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node(&self, id: &NodeId) -> Result<&OntologyNode, KiraError> {
        self.get(id)
            .ok_or_else(|| KiraError::UnknownNode(id.to_string()))
    }

    /// Nodes carrying `text` within `scope`, in insertion order.
    pub fn find_all(&self, text: &str, scope: LookupScope, case_sensitive: bool) -> Vec<&NodeId> {
        let folded = text.to_lowercase();
        let equals = |candidate: &str| {
            if case_sensitive {
                candidate == text
            } else {
                candidate.to_lowercase() == folded
            }
        };
        self.nodes
            .iter()
            .filter(|node| {
                (scope != LookupScope::Synonyms && equals(&node.name))
                    || (scope != LookupScope::Names && node.synonyms.iter().any(|syn| equals(syn)))
            })
            .map(|node| &node.id)
            .collect()
    }

    pub fn ancestors(&self, id: &NodeId) -> Result<HashSet<NodeId>, KiraError> {
        self.traverse(id, |node| &node.parents)
    }

    pub fn descendants(&self, id: &NodeId) -> Result<HashSet<NodeId>, KiraError> {
        self.traverse(id, |node| &node.children)
    }

    fn traverse<F>(&self, start: &NodeId, next: F) -> Result<HashSet<NodeId>, KiraError>
    where
        F: Fn(&OntologyNode) -> &BTreeSet<NodeId>,
    {
        let start_node = self.node(start)?;
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&NodeId> = next(start_node).iter().collect();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.get(current) {
                queue.extend(next(node).iter().filter(|id| !visited.contains(*id)));
            }
        }
        Ok(visited)
    }
}

/// Cell-type ontology of one organism and release, together with the anatomy
/// terms its cell types are located in.
#[derive(Debug, Clone)]
pub struct OntologyGraph {
    organism: Organism,
    version: String,
    celltypes: TermGraph,
    anatomy: TermGraph,
}

impl OntologyGraph {
    pub fn build(
        source: &dyn OntologySource,
        organism: &Organism,
        version: Option<&str>,
    ) -> Result<Self, KiraError> {
        let spec = source.load(organism, version)?;
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: OntologySpec) -> Result<Self, KiraError> {
        let celltypes = TermGraph::from_records(spec.celltypes, "cell type")?;
        let anatomy = TermGraph::from_records(spec.anatomy, "anatomy term")?;
        for node in celltypes.nodes() {
            if let Some(missing) = node.located_in.iter().find(|id| anatomy.get(id).is_none()) {
                return Err(KiraError::InvalidOntology(format!(
                    "cell type {} is located in undeclared anatomy term {missing}",
                    node.id
                )));
            }
        }
        debug!(
            organism = %spec.organism,
            version = %spec.version,
            celltypes = celltypes.len(),
            anatomy = anatomy.len(),
            "built ontology graph"
        );
        Ok(Self {
            organism: spec.organism,
            version: spec.version,
            celltypes,
            anatomy,
        })
    }

    pub fn organism(&self) -> &Organism {
        &self.organism
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn summary(&self) -> OntologySummary {
        OntologySummary {
            organism: self.organism.to_string(),
            version: self.version.clone(),
            celltypes: self.celltypes.len(),
            synonyms: self.celltypes.nodes().map(|node| node.synonyms.len()).sum(),
            anatomy: self.anatomy.len(),
        }
    }

    pub fn celltypes(&self) -> &TermGraph {
        &self.celltypes
    }

    pub fn anatomy(&self) -> &TermGraph {
        &self.anatomy
    }

    pub fn node(&self, id: &NodeId) -> Result<&OntologyNode, KiraError> {
        self.celltypes.node(id)
    }

    /// First node whose display name equals `name`, falling back to synonyms
    /// when `include_synonyms` is set. Case-sensitive hits win over
    /// case-insensitive ones within each scope.
    pub fn lookup_exact(&self, name: &str, include_synonyms: bool) -> Option<&NodeId> {
        let mut scopes = vec![LookupScope::Names];
        if include_synonyms {
            scopes.push(LookupScope::Synonyms);
        }
        scopes.into_iter().find_map(|scope| {
            [true, false].into_iter().find_map(|case_sensitive| {
                self.celltypes
                    .find_all(name, scope, case_sensitive)
                    .into_iter()
                    .next()
            })
        })
    }

    /// Every display name, followed by its synonyms when requested, in
    /// insertion order.
    pub fn names_and_synonyms(&self, include_synonyms: bool) -> Vec<NamedEntry<'_>> {
        let mut entries = Vec::new();
        for node in self.celltypes.nodes() {
            entries.push(NamedEntry {
                text: &node.name,
                node,
                kind: TermText::Name,
            });
            if include_synonyms {
                entries.extend(node.synonyms.iter().map(|syn| NamedEntry {
                    text: syn,
                    node,
                    kind: TermText::Synonym,
                }));
            }
        }
        entries
    }

    pub fn ancestors(&self, id: &NodeId) -> Result<HashSet<NodeId>, KiraError> {
        self.celltypes.ancestors(id)
    }

    pub fn descendants(&self, id: &NodeId) -> Result<HashSet<NodeId>, KiraError> {
        self.celltypes.descendants(id)
    }

    /// Id of the node carrying this exact display name.
    pub fn convert_to_id(&self, name: &str) -> Result<&NodeId, KiraError> {
        self.celltypes
            .find_all(name, LookupScope::Names, true)
            .into_iter()
            .next()
            .ok_or_else(|| KiraError::UnknownNode(name.to_string()))
    }
}
