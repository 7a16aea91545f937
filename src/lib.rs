pub mod errors;
pub mod file;
pub mod filter;
pub mod instance;
pub mod metadata;
pub mod report;
pub mod select;
pub mod spacing;
pub mod table;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use errors::{QaError, QaErrorKind};
pub use filter::{filter_report, QualityThresholds, QualityVerdict};
pub use instance::{check_instances, ConsistencyResult};
pub use report::{build_report, ReportMode, ReportRow, ReportSummary};
pub use select::{select_dominant_folder, Selection, CANONICAL_FOLDER_NAME};
pub use spacing::{is_evenly_spaced, validate_spacing};
