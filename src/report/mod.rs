pub mod assembler;
pub mod narrative;
pub mod types;

pub use assembler::{ReportAssembler, DEFAULT_MAX_DISTANCE, DEFAULT_TOP_K};
pub use types::{CaseReport, Explanation};
