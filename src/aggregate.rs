use std::collections::{BTreeMap, HashSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::Strategy;
use crate::strategy::{CandidatePool, MatchCandidate};

/// Candidates of every strategy that ran for one query, in precedence order.
pub type StrategyResults = Vec<(Strategy, Vec<MatchCandidate>)>;

/// Matches for one query.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MatchResult {
    /// The query already is a term of the ontology.
    Scalar(String),
    List(Vec<String>),
    StrategyMap(BTreeMap<Strategy, Vec<String>>),
}

impl MatchResult {
    /// Suggested names in precedence order, whatever the shape.
    pub fn names(&self) -> Vec<&str> {
        match self {
            MatchResult::Scalar(name) => vec![name.as_str()],
            MatchResult::List(names) => names.iter().map(String::as_str).collect(),
            MatchResult::StrategyMap(map) => {
                let mut seen = HashSet::new();
                map.values()
                    .flatten()
                    .map(String::as_str)
                    .filter(|name| seen.insert(*name))
                    .collect()
            }
        }
    }
}

/// Shapes one query's strategy results.
///
/// With `choices_for_perfect_match` off, a query found verbatim in the pool
/// collapses to itself, even when several nodes share that text.
pub fn aggregate(
    query: &str,
    results: &StrategyResults,
    pool: &CandidatePool,
    choices_for_perfect_match: bool,
    keep_strategy: bool,
) -> MatchResult {
    if !choices_for_perfect_match && pool.contains_text(query) {
        return MatchResult::Scalar(query.to_string());
    }
    if keep_strategy {
        let map = results
            .iter()
            .map(|(strategy, candidates)| {
                let names = candidates
                    .iter()
                    .map(|candidate| candidate.name.clone())
                    .collect();
                (*strategy, names)
            })
            .collect();
        return MatchResult::StrategyMap(map);
    }
    let mut ordered = results.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|(strategy, _)| *strategy);
    let mut seen = HashSet::new();
    let names = ordered
        .into_iter()
        .flat_map(|(_, candidates)| candidates)
        .filter(|candidate| seen.insert(candidate.node_id.clone()))
        .map(|candidate| candidate.name.clone())
        .collect();
    MatchResult::List(names)
}

/// Matches for a whole batch of queries.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutput {
    /// One query submitted and the caller did not ask for a mapping.
    Single(MatchResult),
    /// Results keyed by query, in input order.
    Batch(Vec<(String, MatchResult)>),
}

impl MatchOutput {
    /// Applies the batch cardinality rule to per-query results. Repeated
    /// queries keep their first position.
    pub fn from_results(
        submitted: usize,
        results: Vec<(String, MatchResult)>,
        always_return_list: bool,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut batch = results
            .into_iter()
            .filter(|(query, _)| seen.insert(query.clone()))
            .collect::<Vec<_>>();
        if submitted == 1 && !always_return_list && batch.len() == 1 {
            let (_, result) = batch.remove(0);
            return MatchOutput::Single(result);
        }
        MatchOutput::Batch(batch)
    }

    pub fn get(&self, query: &str) -> Option<&MatchResult> {
        match self {
            MatchOutput::Single(_) => None,
            MatchOutput::Batch(batch) => batch
                .iter()
                .find(|(key, _)| key == query)
                .map(|(_, result)| result),
        }
    }
}

impl Serialize for MatchOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MatchOutput::Single(result) => result.serialize(serializer),
            MatchOutput::Batch(batch) => {
                let mut map = serializer.serialize_map(Some(batch.len()))?;
                for (query, result) in batch {
                    map.serialize_entry(query, result)?;
                }
                map.end()
            }
        }
    }
}
