use snafu::{OptionExt, ResultExt};
use std::path::Path;

use crate::errors::qa::{DicomSnafu, EmptyFolderSnafu, IoSnafu, MissingMetadataSnafu};
use crate::errors::QaError;
use crate::file::DicomFileOperations;
use crate::metadata::{ImageRecord, INSTANCE_NUMBER_NAME};

/// Agreement between the Instance Number range and the number of files in a folder.
///
/// `expected_span` is `max - min + 1` over the Instance Numbers and `discrepancy` is
/// `expected_span - observed_count`. A folder is consistent when the discrepancy is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyResult {
    pub observed_count: i64,
    pub expected_span: i64,
    pub discrepancy: i64,
}

impl ConsistencyResult {
    /// Build a result from a set of Instance Numbers. Returns `None` for an empty input.
    pub fn from_instance_numbers<I>(instance_numbers: I) -> Option<Self>
    where
        I: IntoIterator<Item = i32>,
    {
        let mut bounds: Option<(i64, i64)> = None;
        let mut observed_count = 0i64;
        for n in instance_numbers {
            let n = n as i64;
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(n), max.max(n)),
                None => (n, n),
            });
            observed_count += 1;
        }
        let (min, max) = bounds?;
        let expected_span = max - min + 1;
        Some(Self {
            observed_count,
            expected_span,
            discrepancy: expected_span - observed_count,
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.discrepancy == 0
    }
}

impl From<ConsistencyResult> for (i64, i64, i64) {
    fn from(result: ConsistencyResult) -> Self {
        (
            result.observed_count,
            result.expected_span,
            result.discrepancy,
        )
    }
}

fn instance_number_of(path: &Path) -> Result<i32, QaError> {
    ImageRecord::read(path)
        .context(DicomSnafu { path })?
        .instance_number()
        .context(MissingMetadataSnafu {
            path,
            name: INSTANCE_NUMBER_NAME,
        })
}

fn check_paths<I>(folder: &Path, paths: I) -> Result<ConsistencyResult, QaError>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let instance_numbers = paths
        .into_iter()
        .map(|p| instance_number_of(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        "Read {} instance numbers from {}",
        instance_numbers.len(),
        folder.display()
    );
    ConsistencyResult::from_instance_numbers(instance_numbers)
        .context(EmptyFolderSnafu { path: folder })
}

/// Check that the Instance Numbers of all DICOM files under `folder` (recursively) form a range
/// as long as the number of files.
pub fn check_instances<P: AsRef<Path>>(folder: P) -> Result<ConsistencyResult, QaError> {
    let folder = folder.as_ref();
    let paths = folder.find_dicoms().context(IoSnafu { path: folder })?;
    check_paths(folder, paths)
}

/// Like `check_instances`, but with a progress spinner during file discovery.
pub fn check_instances_with_spinner<P: AsRef<Path>>(
    folder: P,
) -> Result<ConsistencyResult, QaError> {
    let folder = folder.as_ref();
    let paths = folder
        .find_dicoms_with_spinner()
        .context(IoSnafu { path: folder })?
        .collect::<Vec<_>>();
    check_paths(folder, paths)
}
