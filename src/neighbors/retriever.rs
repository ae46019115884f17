use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CaseError;

use super::types::{NeighborLabel, NeighborRecord};

/// Where the neighbors in a report came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalProvenance {
    pub index_path: String,
    pub collection: String,
}

/// Source of similar historical cases.
pub trait NeighborRetriever: Send + Sync {
    /// Up to `top_k` neighbors for the query text, most similar first.
    /// An absent index is reported as `CaseError::RetrievalUnavailable`.
    fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<NeighborRecord>, CaseError>> + Send;

    fn provenance(&self) -> RetrievalProvenance;
}

/// One line of the case index file.
#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(default, deserialize_with = "crate::lenient::opt_i64")]
    transaction_id: Option<i64>,
    #[serde(default)]
    label: Option<NeighborLabel>,
    document: String,
}

#[derive(Debug)]
struct IndexedCase {
    transaction_id: Option<i64>,
    label: Option<NeighborLabel>,
    document: String,
    tokens: HashSet<String>,
}

/// Case index stored as JSON lines at `{index_dir}/{collection}.jsonl`.
///
/// The file is read once when the retriever is opened. Distance between the query and a
/// case is `1 - jaccard` over their `key=value` tokens.
#[derive(Clone)]
pub struct CaseIndexRetriever {
    path: PathBuf,
    collection: String,
    cases: Option<Arc<Vec<IndexedCase>>>,
}

impl CaseIndexRetriever {
    /// Open the collection's index file. A missing file is not an error here: the
    /// retriever is created without cases and reports itself unavailable on use.
    pub fn open(index_dir: impl AsRef<Path>, collection: &str) -> eyre::Result<Self> {
        let path = index_dir.as_ref().join(format!("{}.jsonl", collection));

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Case index not found, similar-case retrieval disabled"
            );
            return Ok(Self {
                path,
                collection: collection.to_string(),
                cases: None,
            });
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| eyre::eyre!("Failed to read case index '{}': {}", path.display(), e))?;
        let cases = parse_index(&content);

        tracing::info!(
            cases = cases.len(),
            collection,
            path = %path.display(),
            "Loaded case index"
        );

        Ok(Self {
            path,
            collection: collection.to_string(),
            cases: Some(Arc::new(cases)),
        })
    }

    pub fn is_available(&self) -> bool {
        self.cases.is_some()
    }

    pub fn len(&self) -> usize {
        self.cases.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rank(cases: &[IndexedCase], query_text: &str, top_k: usize) -> Vec<NeighborRecord> {
        let query = tokenize(query_text);

        let mut ranked: Vec<NeighborRecord> = cases
            .iter()
            .map(|case| NeighborRecord {
                transaction_id: case.transaction_id,
                label: case.label.clone(),
                document: case.document.clone(),
                distance: Some(jaccard_distance(&query, &case.tokens)),
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        ranked.truncate(top_k);
        ranked
    }
}

impl NeighborRetriever for CaseIndexRetriever {
    async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<NeighborRecord>, CaseError> {
        let cases = self.cases.as_ref().ok_or_else(|| {
            CaseError::RetrievalUnavailable(format!(
                "no case index at '{}'",
                self.path.display()
            ))
        })?;

        Ok(Self::rank(cases, query_text, top_k))
    }

    fn provenance(&self) -> RetrievalProvenance {
        RetrievalProvenance {
            index_path: self.path.display().to_string(),
            collection: self.collection.clone(),
        }
    }
}

fn parse_index(content: &str) -> Vec<IndexedCase> {
    let mut cases = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<IndexEntry>(line) {
            Ok(entry) => cases.push(IndexedCase {
                tokens: tokenize(&entry.document),
                transaction_id: entry.transaction_id,
                label: entry.label,
                document: entry.document,
            }),
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed index entry");
            }
        }
    }

    cases
}

/// Split a `key=value | key=value` document into its tokens. Identifier and label
/// tokens are dropped: the query never has them and they must not affect distance.
fn tokenize(text: &str) -> HashSet<String> {
    text.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| !t.starts_with("TransactionID=") && !t.starts_with("label="))
        .map(str::to_string)
        .collect()
}

fn jaccard_distance(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    1.0 - intersection as f64 / union as f64
}
