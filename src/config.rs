use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::classmap::default_omit_list;
use crate::domain::{AnatomyFallback, Organism};
use crate::error::KiraError;
use crate::matcher::MatchOptions;

pub const DEFAULT_CONFIG_FILE: &str = "kira-ctm.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub ontology_dir: Option<String>,
    #[serde(default)]
    pub matching: MatchingEntry,
    #[serde(default)]
    pub classmap: ClassMapEntry,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MatchingEntry {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub include_synonyms: Option<bool>,
    #[serde(default)]
    pub anatomical_constraint: Option<String>,
    #[serde(default)]
    pub anatomy_fallback: Option<AnatomyFallback>,
    #[serde(default)]
    pub omit_target_list: Option<Vec<String>>,
    #[serde(default)]
    pub n_suggest: Option<usize>,
    #[serde(default)]
    pub choices_for_perfect_match: Option<bool>,
    #[serde(default)]
    pub keep_strategy: Option<bool>,
    #[serde(default)]
    pub always_return_list: Option<bool>,
    #[serde(default)]
    pub threshold_for_partial_matching: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ClassMapEntry {
    #[serde(default)]
    pub omit_list: Option<Vec<String>>,
    #[serde(default)]
    pub protected_writing: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub organism: Option<Organism>,
    pub ontology_dir: Option<Utf8PathBuf>,
    pub options: MatchOptions,
    pub omit_list: Vec<String>,
    pub protected_writing: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `kira-ctm.json` in the working directory when present.
    /// Without either, defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let organism = config
            .organism
            .as_deref()
            .map(str::parse::<Organism>)
            .transpose()?;

        let defaults = MatchOptions::default();
        let matching = config.matching;
        let threshold = matching
            .threshold_for_partial_matching
            .unwrap_or(defaults.threshold_for_partial_matching);
        if !(0.0..=100.0).contains(&threshold) {
            return Err(KiraError::ConfigParse(format!(
                "threshold_for_partial_matching must be within 0..=100, got {threshold}"
            )));
        }
        let options = MatchOptions {
            version: matching.version.or(defaults.version),
            include_synonyms: matching.include_synonyms.unwrap_or(defaults.include_synonyms),
            anatomical_constraint: matching
                .anatomical_constraint
                .or(defaults.anatomical_constraint),
            anatomy_fallback: matching.anatomy_fallback.unwrap_or(defaults.anatomy_fallback),
            omit_target_list: matching
                .omit_target_list
                .unwrap_or(defaults.omit_target_list),
            n_suggest: matching.n_suggest.unwrap_or(defaults.n_suggest),
            choices_for_perfect_match: matching
                .choices_for_perfect_match
                .unwrap_or(defaults.choices_for_perfect_match),
            keep_strategy: matching.keep_strategy.unwrap_or(defaults.keep_strategy),
            always_return_list: matching
                .always_return_list
                .unwrap_or(defaults.always_return_list),
            threshold_for_partial_matching: threshold,
        };

        Ok(ResolvedConfig {
            schema_version,
            organism,
            ontology_dir: config.ontology_dir.map(Utf8PathBuf::from),
            options,
            omit_list: config.classmap.omit_list.unwrap_or_else(default_omit_list),
            protected_writing: config.classmap.protected_writing.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert!(resolved.organism.is_none());
        assert_eq!(resolved.options, MatchOptions::default());
        assert_eq!(resolved.omit_list, default_omit_list());
        assert!(resolved.protected_writing);
    }
}
