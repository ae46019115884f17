pub mod api;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod evidence;
pub mod lenient;
pub mod neighbors;
pub mod policy;
pub mod report;
pub mod scoring;
pub mod signals;

pub use error::CaseError;
pub use neighbors::summarize;
pub use policy::decide;
pub use report::ReportAssembler;
pub use signals::compute_signals;
