pub mod dicom;
pub mod qa;

pub use self::dicom::DicomError;
pub use self::qa::{QaError, QaErrorKind};
