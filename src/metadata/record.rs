use dicom::dictionary_std::tags;
use dicom::object::{FileDicomObject, InMemDicomObject};
use snafu::ResultExt;
use std::path::{Path, PathBuf};

use crate::errors::dicom::{ConvertValueSnafu, ReadSnafu};
use crate::errors::DicomError;
use crate::file::DicomFileOperations;

pub const INSTANCE_NUMBER_NAME: &str = "Instance Number";
pub const SLICE_LOCATION_NAME: &str = "Slice Location";

/// The header fields of a single DICOM file that the QA checks look at.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    path: PathBuf,
    instance_number: Option<i32>,
    slice_location: Option<f64>,
}

impl ImageRecord {
    pub fn new<P: AsRef<Path>>(
        path: P,
        instance_number: Option<i32>,
        slice_location: Option<f64>,
    ) -> Self {
        Self {
            path: PathBuf::from(path.as_ref()),
            instance_number,
            slice_location,
        }
    }

    /// Read the header of the DICOM file at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, DicomError> {
        let path = path.as_ref();
        let file = path.dcmread().context(ReadSnafu)?;
        let (instance_number, slice_location) = read_fields(&file)?;
        Ok(Self::new(path, instance_number, slice_location))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn instance_number(&self) -> Option<i32> {
        self.instance_number
    }

    pub fn slice_location(&self) -> Option<f64> {
        self.slice_location
    }
}

impl AsRef<Path> for ImageRecord {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

fn read_fields(
    file: &FileDicomObject<InMemDicomObject>,
) -> Result<(Option<i32>, Option<f64>), DicomError> {
    let instance_number = file
        .get(tags::INSTANCE_NUMBER)
        .map(|elem| elem.value().to_int::<i32>())
        .transpose()
        .context(ConvertValueSnafu {
            name: INSTANCE_NUMBER_NAME,
        })?;

    // Some scanners write an empty or malformed Slice Location; it is treated as absent.
    let slice_location = file
        .get(tags::SLICE_LOCATION)
        .and_then(|elem| match elem.value().to_float64() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Ignoring unreadable {}: {}", SLICE_LOCATION_NAME, e);
                None
            }
        });

    Ok((instance_number, slice_location))
}
