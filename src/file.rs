use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, OpenFileOptions, ReadError};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rust_search::SearchBuilder;
use std::path::{Path, PathBuf};

type IOResult<T> = Result<T, std::io::Error>;

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

pub fn default_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner
}

fn not_a_directory() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, "Not a directory")
}

pub trait DicomFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a DICOM extension.
    fn has_dicom_extension(&self) -> bool {
        let path = self.as_ref();
        if let Some(ext) = path.extension() {
            return ext == "dcm" || ext == "dicom" || ext == "DCM" || ext == "DICOM";
        }
        false
    }

    /// Check if a path is a DICOM file. Only regular files with a DICOM extension qualify.
    fn is_dicom_file(&self) -> bool {
        self.has_dicom_extension() && self.as_ref().is_file()
    }

    /// Find all DICOM files under a directory, recursively. Order is unspecified.
    fn find_dicoms(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(not_a_directory());
        }
        let result = SearchBuilder::default()
            .location(dir)
            .build()
            .map(PathBuf::from)
            .filter(|file| file.is_dicom_file());
        Ok(result)
    }

    /// Find all DICOM files in a directory, with a progress spinner.
    fn find_dicoms_with_spinner(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let spinner = default_spinner();
        spinner.set_message("Searching for DICOM files");
        let result = self.find_dicoms()?.inspect(move |_| {
            spinner.tick();
        });
        Ok(result)
    }

    /// Count the DICOM files that are immediate children of a directory.
    /// Files in nested directories are not counted.
    fn count_direct_dicoms(&self) -> IOResult<usize> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(not_a_directory());
        }
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            if entry?.path().is_dicom_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Read the DICOM file header, stopping before the pixel data.
    fn dcmread(&self) -> Result<DefaultDicomObject, ReadError> {
        OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(self.as_ref())
    }
}

impl<P: AsRef<Path>> DicomFileOperations for P {}

pub trait DirectoryOperations
where
    Self: AsRef<Path>,
{
    /// List the immediate subdirectories, sorted by file name.
    fn subdirectories(&self) -> IOResult<Vec<PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(not_a_directory());
        }
        let mut result = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                result.push(path);
            }
        }
        Ok(result
            .into_iter()
            .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
            .collect())
    }

    /// The final path component as a string, used as a subject or session identifier.
    fn identifier(&self) -> String {
        self.as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl<P: AsRef<Path>> DirectoryOperations for P {}
