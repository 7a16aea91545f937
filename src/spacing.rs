use snafu::ResultExt;
use std::path::Path;

use crate::errors::qa::{DicomSnafu, IoSnafu};
use crate::errors::QaError;
use crate::file::DicomFileOperations;
use crate::metadata::ImageRecord;

/// Fewer locations than this carry no spacing to compare.
pub const MIN_COMPARABLE_LOCATIONS: usize = 3;

/// Check whether slice locations are evenly spaced.
///
/// Locations are sorted in descending order and the first gap is taken as the reference. Every
/// pair of consecutive gaps must differ by strictly less than that reference gap. Fewer than three
/// locations always pass.
pub fn is_evenly_spaced(locations: &[f64]) -> bool {
    let mut sorted = locations.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    if sorted.len() < MIN_COMPARABLE_LOCATIONS {
        return true;
    }
    let reference = sorted[0] - sorted[1];
    sorted.windows(3).all(|w| {
        let upper = w[0] - w[1];
        let lower = w[1] - w[2];
        (upper - lower).abs() < reference
    })
}

fn slice_locations<I>(paths: I) -> Result<Vec<f64>, QaError>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let mut locations = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let record = ImageRecord::read(path).context(DicomSnafu { path })?;
        match record.slice_location() {
            Some(location) => locations.push(location),
            None => tracing::debug!("No slice location in {}, skipping", path.display()),
        }
    }
    Ok(locations)
}

fn check_locations(folder: &Path, locations: &[f64]) -> bool {
    tracing::debug!(
        "Read {} slice locations from {}",
        locations.len(),
        folder.display()
    );
    if locations.len() < MIN_COMPARABLE_LOCATIONS {
        tracing::warn!(
            "Only {} slice locations in {}, spacing check passes trivially",
            locations.len(),
            folder.display()
        );
    }
    is_evenly_spaced(locations)
}

/// Validate slice spacing over all DICOM files under `folder` (recursively). Files without a
/// Slice Location are left out of the comparison.
pub fn validate_spacing<P: AsRef<Path>>(folder: P) -> Result<bool, QaError> {
    let folder = folder.as_ref();
    let paths = folder.find_dicoms().context(IoSnafu { path: folder })?;
    let locations = slice_locations(paths)?;
    Ok(check_locations(folder, &locations))
}

/// Like `validate_spacing`, but with a progress spinner during file discovery.
pub fn validate_spacing_with_spinner<P: AsRef<Path>>(folder: P) -> Result<bool, QaError> {
    let folder = folder.as_ref();
    let paths = folder
        .find_dicoms_with_spinner()
        .context(IoSnafu { path: folder })?
        .collect::<Vec<_>>();
    let locations = slice_locations(paths)?;
    Ok(check_locations(folder, &locations))
}
