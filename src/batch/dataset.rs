use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Read;

use crate::lenient::parse_integral;

/// A transaction id with its known outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledCase {
    pub transaction_id: i64,
    pub label: i64,
}

/// Load `(id, label)` pairs from a CSV file. Rows where either column is missing or
/// unparsable are dropped.
pub fn load_labeled_cases(
    path: &str,
    id_col: &str,
    label_col: &str,
) -> eyre::Result<Vec<LabeledCase>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("Failed to open batch CSV '{}': {}", path, e))?;
    let cases = read_labeled_cases(file, id_col, label_col)
        .map_err(|e| eyre::eyre!("Failed to read batch CSV '{}': {}", path, e))?;
    tracing::info!(path, rows = cases.len(), "Labeled cases loaded");
    Ok(cases)
}

pub fn read_labeled_cases<Rd: Read>(
    input: Rd,
    id_col: &str,
    label_col: &str,
) -> eyre::Result<Vec<LabeledCase>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            let available: Vec<&str> = headers.iter().take(30).collect();
            eyre::eyre!("column '{}' not found in columns: {:?}", name, available)
        })
    };
    let id_idx = column(id_col)?;
    let label_idx = column(label_col)?;

    let mut cases = Vec::new();
    let mut dropped = 0usize;
    for result in reader.records() {
        let record = result?;
        let id = record.get(id_idx).and_then(parse_integral);
        let label = record.get(label_idx).and_then(parse_integral);
        match (id, label) {
            (Some(transaction_id), Some(label)) => cases.push(LabeledCase {
                transaction_id,
                label,
            }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Skipped rows with missing id or label");
    }
    Ok(cases)
}

/// Draw `min(n, len)` cases without replacement. The same seed gives the same sample.
pub fn sample_cases(cases: &[LabeledCase], n: usize, seed: u64) -> Vec<LabeledCase> {
    let mut rng = StdRng::seed_from_u64(seed);
    cases
        .choose_multiple(&mut rng, n.min(cases.len()))
        .copied()
        .collect()
}
