pub mod retriever;
pub mod stats;
pub mod types;

pub use retriever::{CaseIndexRetriever, NeighborRetriever, RetrievalProvenance};
pub use stats::summarize;
pub use types::{NeighborLabel, NeighborRecord, NeighborStats, PartitionStats};
