use std::collections::HashSet;

use tracing::debug;

use crate::domain::NodeId;
use crate::error::KiraError;
use crate::ontology::{LookupScope, OntologyGraph};

/// Narrows the cell-type pool to terms located within an anatomical structure.
pub struct AnatomicalFilter;

impl AnatomicalFilter {
    /// Anatomy nodes named by `constraint`: an exact id, else every term whose
    /// name or synonym equals it case-insensitively.
    pub fn resolve(graph: &OntologyGraph, constraint: &str) -> Result<Vec<NodeId>, KiraError> {
        let trimmed = constraint.trim();
        let anatomy = graph.anatomy();
        let by_id = NodeId::new(trimmed);
        if anatomy.get(&by_id).is_some() {
            return Ok(vec![by_id]);
        }
        let hits = anatomy
            .find_all(trimmed, LookupScope::Both, false)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        if hits.is_empty() {
            return Err(KiraError::UnresolvedAnatomy(constraint.to_string()));
        }
        Ok(hits)
    }

    /// Allowed cell-type ids, or `None` when unconstrained.
    ///
    /// A cell type is allowed when it, or one of its ancestors, is located in
    /// the resolved structure or any of its sub-structures.
    pub fn restrict(
        graph: &OntologyGraph,
        constraint: Option<&str>,
    ) -> Result<Option<HashSet<NodeId>>, KiraError> {
        let Some(constraint) = constraint else {
            return Ok(None);
        };

        let mut structures = HashSet::new();
        for id in Self::resolve(graph, constraint)? {
            structures.extend(graph.anatomy().descendants(&id)?);
            structures.insert(id);
        }

        let mut allowed = HashSet::new();
        for node in graph.celltypes().nodes() {
            if node.located_in.iter().any(|anat| structures.contains(anat)) {
                allowed.extend(graph.descendants(&node.id)?);
                allowed.insert(node.id.clone());
            }
        }
        debug!(
            constraint,
            structures = structures.len(),
            celltypes = allowed.len(),
            "applied anatomical constraint"
        );
        Ok(Some(allowed))
    }
}
