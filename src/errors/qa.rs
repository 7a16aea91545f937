use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

use crate::errors::DicomError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QaError {
    #[snafu(display("path does not exist: {}", path.display()))]
    PathNotFound { path: PathBuf },

    #[snafu(display("not a directory: {}", path.display()))]
    NotADirectory { path: PathBuf },

    #[snafu(display("no subject folders found in {}", path.display()))]
    NoSubjects { path: PathBuf },

    #[snafu(display("no DICOM files found in {}", path.display()))]
    EmptyFolder { path: PathBuf },

    #[snafu(display("no instance folders found in session {}", path.display()))]
    NoInstanceFolders { path: PathBuf },

    #[snafu(display("{} is missing {}", path.display(), name))]
    MissingMetadata { path: PathBuf, name: &'static str },

    #[snafu(display("DICOM error on {}: {}", path.display(), source))]
    Dicom {
        path: PathBuf,
        #[snafu(source(from(DicomError, Box::new)))]
        source: Box<DicomError>,
    },

    #[snafu(display("IO error on {}: {}", path.display(), source))]
    Io {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to rename {} to {}: {}", folder.display(), target.display(), source))]
    Rename {
        folder: PathBuf,
        target: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },
}

/// Discriminant of a [`QaError`], for callers that only care about what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QaErrorKind {
    PathNotFound,
    NotADirectory,
    NoSubjects,
    EmptyFolder,
    NoInstanceFolders,
    MissingMetadata,
    Dicom,
    Io,
    Rename,
}

impl QaError {
    pub fn kind(&self) -> QaErrorKind {
        match self {
            QaError::PathNotFound { .. } => QaErrorKind::PathNotFound,
            QaError::NotADirectory { .. } => QaErrorKind::NotADirectory,
            QaError::NoSubjects { .. } => QaErrorKind::NoSubjects,
            QaError::EmptyFolder { .. } => QaErrorKind::EmptyFolder,
            QaError::NoInstanceFolders { .. } => QaErrorKind::NoInstanceFolders,
            QaError::MissingMetadata { .. } => QaErrorKind::MissingMetadata,
            QaError::Dicom { .. } => QaErrorKind::Dicom,
            QaError::Io { .. } => QaErrorKind::Io,
            QaError::Rename { .. } => QaErrorKind::Rename,
        }
    }
}

impl fmt::Display for QaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QaErrorKind::PathNotFound => "path-not-found",
            QaErrorKind::NotADirectory => "not-a-directory",
            QaErrorKind::NoSubjects => "no-subjects",
            QaErrorKind::EmptyFolder => "empty-folder",
            QaErrorKind::NoInstanceFolders => "no-instance-folders",
            QaErrorKind::MissingMetadata => "missing-metadata",
            QaErrorKind::Dicom => "dicom",
            QaErrorKind::Io => "io",
            QaErrorKind::Rename => "rename",
        };
        write!(f, "{}", name)
    }
}

/// Fails with [`QaError::PathNotFound`] or [`QaError::NotADirectory`] unless `path` is an existing directory.
pub fn ensure_dir<P: Into<PathBuf>>(path: P) -> Result<PathBuf, QaError> {
    let path = path.into();
    if !path.exists() {
        return PathNotFoundSnafu { path }.fail();
    }
    if !path.is_dir() {
        return NotADirectorySnafu { path }.fail();
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_ensure_dir_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let err = ensure_dir(&missing).unwrap_err();
        assert_eq!(err.kind(), QaErrorKind::PathNotFound);
    }

    #[test]
    fn test_ensure_dir_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = ensure_dir(&file).unwrap_err();
        assert_eq!(err.kind(), QaErrorKind::NotADirectory);
    }

    #[test]
    fn test_ensure_dir_ok() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(ensure_dir(temp_dir.path()).unwrap(), temp_dir.path());
    }

    #[rstest]
    #[case(QaErrorKind::EmptyFolder, "empty-folder")]
    #[case(QaErrorKind::NoInstanceFolders, "no-instance-folders")]
    #[case(QaErrorKind::MissingMetadata, "missing-metadata")]
    fn test_kind_display(#[case] kind: QaErrorKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }
}
