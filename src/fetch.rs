use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::info;

use crate::domain::Organism;
use crate::error::KiraError;
use crate::obo::parse_obo_header;
use crate::store::{OntologyFormat, OntologyStore};

const CL_RELEASE_URL: &str = "http://purl.obolibrary.org/obo/cl/releases";
const UBERON_BASIC_URL: &str = "http://purl.obolibrary.org/obo/uberon/basic.obo";

pub trait OntologyFetcher: Send + Sync {
    /// Raw OBO text of the Cell Ontology release `version`.
    fn download_obo(&self, version: &str) -> Result<Vec<u8>, KiraError>;

    /// Raw OBO text of the UBERON anatomy the cell types are located in.
    fn download_anatomy_obo(&self) -> Result<Vec<u8>, KiraError>;
}

#[derive(Clone)]
pub struct HttpOntologyFetcher {
    client: Client,
    base_url: String,
    anatomy_url: String,
}

impl HttpOntologyFetcher {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_urls(CL_RELEASE_URL, UBERON_BASIC_URL)
    }

    pub fn with_urls(base_url: &str, anatomy_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-ctm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::OntologyHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KiraError::OntologyHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anatomy_url: anatomy_url.to_string(),
        })
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KiraError::OntologyHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "ontology request failed".to_string());
            return Err(KiraError::OntologyStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::OntologyHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl OntologyFetcher for HttpOntologyFetcher {
    fn download_obo(&self, version: &str) -> Result<Vec<u8>, KiraError> {
        self.get(&format!("{}/{version}/cl-basic.obo", self.base_url))
    }

    fn download_anatomy_obo(&self) -> Result<Vec<u8>, KiraError> {
        self.get(&self.anatomy_url)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub organism: String,
    pub version: String,
    /// `download` or `cache`.
    pub action: String,
    pub path: Utf8PathBuf,
    pub anatomy_path: Utf8PathBuf,
    pub data_version: Option<String>,
    pub anatomy_data_version: Option<String>,
}

/// Stores the OBO release `version` for `organism` together with its anatomy
/// companion, reusing stored copies unless `force` is set.
pub fn fetch_release<F: OntologyFetcher + ?Sized>(
    fetcher: &F,
    store: &OntologyStore,
    organism: &Organism,
    version: &str,
    force: bool,
) -> Result<FetchResult, KiraError> {
    let path = store.release_path(organism, version, OntologyFormat::Obo);
    let anatomy_path = store.anatomy_path(organism, version, OntologyFormat::Obo);
    let mut result = FetchResult {
        organism: organism.to_string(),
        version: version.to_string(),
        action: "cache".to_string(),
        path,
        anatomy_path,
        data_version: None,
        anatomy_data_version: None,
    };

    if force || !result.path.exists() {
        let bytes = fetcher.download_obo(version)?;
        result.data_version = store_obo(&result.path, &bytes, "release")?;
        result.action = "download".to_string();
    }
    if force || !result.anatomy_path.exists() {
        let bytes = fetcher.download_anatomy_obo()?;
        result.anatomy_data_version = store_obo(&result.anatomy_path, &bytes, "anatomy")?;
        result.action = "download".to_string();
    }
    if result.action == "download" {
        info!(%organism, version, path = %result.path, "stored ontology release");
    }
    Ok(result)
}

fn store_obo(path: &Utf8Path, bytes: &[u8], what: &str) -> Result<Option<String>, KiraError> {
    if !bytes.starts_with(b"format-version:") {
        return Err(KiraError::OntologyHttp(format!("{what} {path} is not an OBO file")));
    }
    OntologyStore::write_atomic(path, bytes)?;
    let (data_version, _) = parse_obo_header(bytes);
    Ok(data_version)
}
