use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::{NodeId, Strategy};
use crate::ontology::{OntologyGraph, TermText};

pub const PERFECT_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub text: String,
    pub node_id: NodeId,
    pub name: String,
    pub kind: TermText,
}

/// Searchable names and synonyms left after target omission and anatomical
/// restriction, in ontology insertion order.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: Vec<PoolEntry>,
}

impl CandidatePool {
    pub fn new(
        graph: &OntologyGraph,
        include_synonyms: bool,
        allowed: Option<&HashSet<NodeId>>,
        omit_target_list: &[String],
    ) -> Self {
        let entries = graph
            .names_and_synonyms(include_synonyms)
            .into_iter()
            .filter(|entry| !omit_target_list.iter().any(|omit| omit == &entry.node.name))
            .filter(|entry| allowed.is_none_or(|allowed| allowed.contains(&entry.node.id)))
            .map(|entry| PoolEntry {
                text: entry.text.to_string(),
                node_id: entry.node.id.clone(),
                name: entry.node.name.clone(),
                kind: entry.kind,
            })
            .collect();
        Self { entries }
    }

    pub fn from_entries(entries: Vec<PoolEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-sensitive membership of `text` among pool strings.
    pub fn contains_text(&self, text: &str) -> bool {
        self.entries.iter().any(|entry| entry.text == text)
    }

    /// Pool entry carrying exactly `text`, display names before synonyms.
    pub fn resolve_text(&self, text: &str) -> Option<&PoolEntry> {
        let mut hits = self.entries.iter().filter(|entry| entry.text == text);
        let first = hits.next()?;
        if first.kind == TermText::Name {
            return Some(first);
        }
        Some(
            hits.find(|entry| entry.kind == TermText::Name)
                .unwrap_or(first),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub text: String,
    pub node_id: NodeId,
    pub name: String,
    pub score: f64,
    pub strategy: Strategy,
}

impl Strategy {
    /// Scores `query` against `pool`, best first, at most `n_suggest` distinct
    /// nodes. Blank queries yield nothing.
    pub fn score(self, query: &str, pool: &CandidatePool, n_suggest: usize) -> Vec<MatchCandidate> {
        if query.trim().is_empty() || n_suggest == 0 {
            return Vec::new();
        }
        match self {
            Strategy::Exact => exact(self, query, pool.entries.iter(), n_suggest),
            Strategy::Synonym => exact(
                self,
                query,
                pool.entries
                    .iter()
                    .filter(|entry| entry.kind == TermText::Synonym),
                n_suggest,
            ),
            Strategy::FuzzyRatio => fuzzy(self, query, pool, n_suggest, ratio),
            Strategy::FuzzyPartial => fuzzy(self, query, pool, n_suggest, partial_ratio),
        }
    }
}

fn exact<'a, I>(strategy: Strategy, query: &str, entries: I, n_suggest: usize) -> Vec<MatchCandidate>
where
    I: Iterator<Item = &'a PoolEntry> + Clone,
{
    let folded = query.to_lowercase();
    let sensitive = collect_exact(strategy, entries.clone(), n_suggest, |text| text == query);
    if !sensitive.is_empty() {
        return sensitive;
    }
    collect_exact(strategy, entries, n_suggest, |text| text.to_lowercase() == folded)
}

fn collect_exact<'a, I, F>(
    strategy: Strategy,
    entries: I,
    n_suggest: usize,
    equals: F,
) -> Vec<MatchCandidate>
where
    I: Iterator<Item = &'a PoolEntry>,
    F: Fn(&str) -> bool,
{
    // display names outrank synonyms regardless of pool position
    let (names, synonyms): (Vec<_>, Vec<_>) = entries
        .filter(|entry| equals(&entry.text))
        .partition(|entry| entry.kind == TermText::Name);
    let mut seen = HashSet::new();
    names
        .into_iter()
        .chain(synonyms)
        .filter(|entry| seen.insert(entry.node_id.clone()))
        .take(n_suggest)
        .map(|entry| candidate(strategy, entry, PERFECT_SCORE))
        .collect()
}

fn fuzzy(
    strategy: Strategy,
    query: &str,
    pool: &CandidatePool,
    n_suggest: usize,
    scorer: fn(&str, &str) -> f64,
) -> Vec<MatchCandidate> {
    let query = normalize(query);
    // best entry per node; the node keeps the pool position of its first entry
    let mut best: Vec<(&PoolEntry, f64)> = Vec::new();
    let mut slots: HashMap<&NodeId, usize> = HashMap::new();
    for entry in &pool.entries {
        let score = scorer(&query, &normalize(&entry.text));
        match slots.get(&entry.node_id) {
            Some(&slot) => {
                if score > best[slot].1 {
                    best[slot] = (entry, score);
                }
            }
            None => {
                slots.insert(&entry.node_id, best.len());
                best.push((entry, score));
            }
        }
    }
    best.sort_by(|a, b| b.1.total_cmp(&a.1));
    best.into_iter()
        .take(n_suggest)
        .map(|(entry, score)| candidate(strategy, entry, score))
        .collect()
}

fn candidate(strategy: Strategy, entry: &PoolEntry, score: f64) -> MatchCandidate {
    MatchCandidate {
        text: entry.text.clone(),
        node_id: entry.node_id.clone(),
        name: entry.name.clone(),
        score,
        strategy,
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whole-string similarity in `[0, 100]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best similarity of the shorter string against every equally long window
/// of the longer one, in `[0, 100]`.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    let long_chars = long.chars().collect::<Vec<_>>();
    if short_len == 0 {
        return 0.0;
    }
    if short_len == long_chars.len() {
        return ratio(short, long);
    }
    long_chars
        .windows(short_len)
        .map(|window| {
            let window = window.iter().collect::<String>();
            strsim::normalized_levenshtein(short, &window) * 100.0
        })
        .fold(0.0, f64::max)
}
