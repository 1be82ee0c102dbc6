use tracing::{debug, warn};

use crate::aggregate::{MatchOutput, MatchResult, StrategyResults, aggregate};
use crate::anatomy::AnatomicalFilter;
use crate::domain::{AnatomyFallback, Organism, Strategy};
use crate::error::KiraError;
use crate::ontology::OntologyGraph;
use crate::source::OntologySource;
use crate::strategy::CandidatePool;

pub const DEFAULT_N_SUGGEST: usize = 4;
pub const DEFAULT_PARTIAL_THRESHOLD: f64 = 90.0;

pub fn default_omit_target_list() -> Vec<String> {
    vec!["cell".to_string()]
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Ontology release; latest when unset.
    pub version: Option<String>,
    pub include_synonyms: bool,
    pub anatomical_constraint: Option<String>,
    pub anatomy_fallback: AnatomyFallback,
    /// Display names never suggested.
    pub omit_target_list: Vec<String>,
    pub n_suggest: usize,
    /// When off, a query that already is an ontology term is returned as is.
    pub choices_for_perfect_match: bool,
    pub keep_strategy: bool,
    pub always_return_list: bool,
    /// Best whole-string score below which partial matching is added.
    pub threshold_for_partial_matching: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            version: None,
            include_synonyms: true,
            anatomical_constraint: None,
            anatomy_fallback: AnatomyFallback::Propagate,
            omit_target_list: default_omit_target_list(),
            n_suggest: DEFAULT_N_SUGGEST,
            choices_for_perfect_match: true,
            keep_strategy: false,
            always_return_list: false,
            threshold_for_partial_matching: DEFAULT_PARTIAL_THRESHOLD,
        }
    }
}

/// Matches free-text labels against one ontology graph.
#[derive(Debug, Clone)]
pub struct CelltypeMatcher {
    graph: OntologyGraph,
    options: MatchOptions,
    pool: CandidatePool,
}

impl CelltypeMatcher {
    pub fn new(graph: OntologyGraph, options: MatchOptions) -> Result<Self, KiraError> {
        let constraint = options.anatomical_constraint.as_deref();
        let allowed = match AnatomicalFilter::restrict(&graph, constraint) {
            Ok(allowed) => allowed,
            Err(KiraError::UnresolvedAnatomy(name))
                if options.anatomy_fallback == AnatomyFallback::Unrestricted =>
            {
                warn!(constraint = %name, "anatomical constraint not resolved, matching unrestricted");
                None
            }
            Err(err) => return Err(err),
        };
        let pool = CandidatePool::new(
            &graph,
            options.include_synonyms,
            allowed.as_ref(),
            &options.omit_target_list,
        );
        debug!(entries = pool.len(), "prepared candidate pool");
        Ok(Self {
            graph,
            options,
            pool,
        })
    }

    pub fn graph(&self) -> &OntologyGraph {
        &self.graph
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    /// Runs every applicable strategy in precedence order.
    pub fn candidates(&self, query: &str) -> StrategyResults {
        if query.trim().is_empty() {
            warn!("empty query yields no matches");
        }
        let n = self.options.n_suggest;
        let mut results = vec![(Strategy::Exact, Strategy::Exact.score(query, &self.pool, n))];
        if self.options.include_synonyms {
            results.push((
                Strategy::Synonym,
                Strategy::Synonym.score(query, &self.pool, n),
            ));
        }
        let lenient = Strategy::FuzzyRatio.score(query, &self.pool, n);
        let best = lenient.first().map(|candidate| candidate.score).unwrap_or(0.0);
        results.push((Strategy::FuzzyRatio, lenient));
        if best < self.options.threshold_for_partial_matching {
            results.push((
                Strategy::FuzzyPartial,
                Strategy::FuzzyPartial.score(query, &self.pool, n),
            ));
        }
        debug!(
            query,
            best_ratio = best,
            strategies = results.len(),
            "scored query"
        );
        results
    }

    pub fn match_query(&self, query: &str) -> MatchResult {
        let results = self.candidates(query);
        aggregate(
            query,
            &results,
            &self.pool,
            self.options.choices_for_perfect_match,
            self.options.keep_strategy,
        )
    }

    pub fn match_batch<S: AsRef<str>>(&self, queries: &[S]) -> MatchOutput {
        let results = queries
            .iter()
            .map(|query| {
                let query = query.as_ref();
                (query.to_string(), self.match_query(query))
            })
            .collect();
        MatchOutput::from_results(queries.len(), results, self.options.always_return_list)
    }
}

/// Builds the graph for `organism` from `source` and matches every query.
pub fn match_celltypes<S: AsRef<str>>(
    queries: &[S],
    organism: &Organism,
    options: &MatchOptions,
    source: &dyn OntologySource,
) -> Result<MatchOutput, KiraError> {
    let graph = OntologyGraph::build(source, organism, options.version.as_deref())?;
    let matcher = CelltypeMatcher::new(graph, options.clone())?;
    Ok(matcher.match_batch(queries))
}

/// Non-blank lines of a query file, trimmed.
pub fn query_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
