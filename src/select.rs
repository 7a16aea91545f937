use snafu::ResultExt;
use std::path::{Path, PathBuf};

use crate::errors::qa::{IoSnafu, NoInstanceFoldersSnafu, RenameSnafu};
use crate::errors::QaError;
use crate::file::{DicomFileOperations, DirectoryOperations};

/// Name given to the instance folder chosen for a session. Its presence marks a session as processed.
pub const CANONICAL_FOLDER_NAME: &str = "new_max";

/// Outcome of selecting the dominant instance folder of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The folder with the most DICOM files was renamed to the canonical name.
    Renamed {
        folder: PathBuf,
        target: PathBuf,
        count: usize,
    },
    /// A canonical folder already existed and nothing was renamed.
    AlreadyProcessed { target: PathBuf },
}

impl Selection {
    /// Path of the canonical folder, whether it was just created or already present.
    pub fn target(&self) -> &Path {
        match self {
            Selection::Renamed { target, .. } => target,
            Selection::AlreadyProcessed { target } => target,
        }
    }

    pub fn is_already_processed(&self) -> bool {
        matches!(self, Selection::AlreadyProcessed { .. })
    }
}

/// Pick the instance folder holding the most DICOM files. Only files directly inside each folder
/// are counted. Ties go to the first folder in name order.
fn dominant_folder(folders: &[PathBuf]) -> Result<Option<(&PathBuf, usize)>, QaError> {
    let mut best: Option<(&PathBuf, usize)> = None;
    for folder in folders {
        let count = folder.count_direct_dicoms().context(IoSnafu { path: folder })?;
        tracing::debug!("{} holds {} DICOM files", folder.display(), count);
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((folder, count)),
        }
    }
    Ok(best)
}

/// Select the dominant instance folder of `session` and rename it to [`CANONICAL_FOLDER_NAME`].
///
/// The rename is not reversible. If the session already contains an entry with the canonical name,
/// nothing is renamed and [`Selection::AlreadyProcessed`] is returned.
pub fn select_dominant_folder<P: AsRef<Path>>(session: P) -> Result<Selection, QaError> {
    let session = session.as_ref();
    let folders = session
        .subdirectories()
        .context(IoSnafu { path: session })?;
    if folders.is_empty() {
        return NoInstanceFoldersSnafu { path: session }.fail();
    }

    let target = session.join(CANONICAL_FOLDER_NAME);
    if target.exists() {
        tracing::warn!(
            "A folder is already called '{}' in {}. This session may have been processed before, please review for discrepancies",
            CANONICAL_FOLDER_NAME,
            session.display()
        );
        return Ok(Selection::AlreadyProcessed { target });
    }

    let (folder, count) = match dominant_folder(&folders)? {
        Some(best) => best,
        None => return NoInstanceFoldersSnafu { path: session }.fail(),
    };
    std::fs::rename(folder, &target).context(RenameSnafu {
        folder,
        target: &target,
    })?;
    tracing::info!(
        "Renamed {} ({} DICOM files) to {}",
        folder.display(),
        count,
        target.display()
    );

    Ok(Selection::Renamed {
        folder: folder.clone(),
        target,
        count,
    })
}
