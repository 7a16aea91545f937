use indicatif::{ProgressBar, ProgressFinish, ProgressIterator};
use snafu::ResultExt;
use std::path::Path;

use crate::errors::qa::{ensure_dir, IoSnafu, NoSubjectsSnafu};
use crate::errors::QaError;
use crate::file::{default_bar, DirectoryOperations};
use crate::instance::{check_instances, ConsistencyResult};
use crate::select::select_dominant_folder;
use crate::spacing::validate_spacing;
use crate::table::{Column, Table, TableError};

pub const SUBJECT: &str = "subject";
pub const SESSION: &str = "session";
pub const SINGLE_FOLDER: &str = "single_folder";
pub const INSTANCE_N: &str = "instanceN";
pub const DICOM_N: &str = "dicomN";
pub const DISCREPANCY: &str = "dicomN-instanceN";
pub const DISTANCE_CHECK: &str = "distance_check";

pub const DEFAULT_INSTANCE_REPORT: &str = "instance_num_check.csv";
pub const DEFAULT_SPACING_REPORT: &str = "slice_dist_check.csv";

/// Which check is run on the dominant folder of each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    InstanceCheck,
    SlicingCheck,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckOutcome {
    Consistency(ConsistencyResult),
    Spacing(bool),
}

/// One row per session. Failed sessions keep their error instead of a result.
#[derive(Debug)]
pub struct ReportRow {
    subject: String,
    session: String,
    single_folder: bool,
    already_processed: bool,
    outcome: Result<CheckOutcome, QaError>,
}

impl ReportRow {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn single_folder(&self) -> bool {
        self.single_folder
    }

    /// Whether the session already had a canonical folder before this run.
    pub fn already_processed(&self) -> bool {
        self.already_processed
    }

    pub fn outcome(&self) -> Result<&CheckOutcome, &QaError> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<&QaError> {
        self.outcome.as_ref().err()
    }

    pub fn consistency(&self) -> Option<&ConsistencyResult> {
        match &self.outcome {
            Ok(CheckOutcome::Consistency(result)) => Some(result),
            _ => None,
        }
    }

    pub fn spacing(&self) -> Option<bool> {
        match &self.outcome {
            Ok(CheckOutcome::Spacing(regular)) => Some(*regular),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ReportSummary {
    pub mode: ReportMode,
    pub rows: Vec<ReportRow>,
}

impl ReportSummary {
    pub fn num_failed(&self) -> usize {
        self.rows.iter().filter(|r| r.error().is_some()).count()
    }

    pub fn num_already_processed(&self) -> usize {
        self.rows.iter().filter(|r| r.already_processed()).count()
    }

    /// Tabular form of the report. Failed sessions get blank result cells.
    pub fn to_table(&self) -> Result<Table, TableError> {
        let rows = &self.rows;
        let single_folder = Column::Int(
            rows.iter()
                .map(|r| Some(r.single_folder() as i64))
                .collect(),
        );
        let sessions = Column::Text(rows.iter().map(|r| Some(r.session.clone())).collect());
        match self.mode {
            ReportMode::InstanceCheck => {
                let results = rows.iter().map(|r| r.consistency()).collect::<Vec<_>>();
                Table::new()
                    .with_column(
                        SUBJECT,
                        Column::Text(rows.iter().map(|r| Some(r.subject.clone())).collect()),
                    )?
                    .with_column(SESSION, sessions)?
                    .with_column(SINGLE_FOLDER, single_folder)?
                    .with_column(
                        INSTANCE_N,
                        Column::Int(results.iter().map(|c| c.map(|c| c.observed_count)).collect()),
                    )?
                    .with_column(
                        DICOM_N,
                        Column::Int(results.iter().map(|c| c.map(|c| c.expected_span)).collect()),
                    )?
                    .with_column(
                        DISCREPANCY,
                        Column::Int(results.iter().map(|c| c.map(|c| c.discrepancy)).collect()),
                    )
            }
            ReportMode::SlicingCheck => Table::new()
                .with_column(SESSION, sessions)?
                .with_column(SINGLE_FOLDER, single_folder)?
                .with_column(
                    DISTANCE_CHECK,
                    Column::Int(rows.iter().map(|r| r.spacing().map(i64::from)).collect()),
                ),
        }
    }

    /// Write the report; the format follows the extension of `dest`.
    pub fn write<P: AsRef<Path>>(&self, dest: P) -> Result<(), TableError> {
        self.to_table()?.write(dest)
    }
}

fn check_session(session: &Path, mode: ReportMode) -> Result<(bool, CheckOutcome), QaError> {
    let selection = select_dominant_folder(session)?;
    let folder = selection.target();
    let outcome = match mode {
        ReportMode::InstanceCheck => CheckOutcome::Consistency(check_instances(folder)?),
        ReportMode::SlicingCheck => CheckOutcome::Spacing(validate_spacing(folder)?),
    };
    Ok((selection.is_already_processed(), outcome))
}

/// Select the dominant folder of a session and run the check for `mode` on it. Never fails; any
/// error is recorded in the row.
pub fn process_session(subject: &str, session: &Path, mode: ReportMode) -> ReportRow {
    let single_folder = session
        .subdirectories()
        .map(|folders| folders.len() == 1)
        .unwrap_or(false);
    let (already_processed, outcome) = match check_session(session, mode) {
        Ok((already_processed, outcome)) => (already_processed, Ok(outcome)),
        Err(e) => {
            tracing::warn!(
                "Session {} failed ({}): {}",
                session.display(),
                e.kind(),
                snafu::Report::from_error(&e)
            );
            (false, Err(e))
        }
    };
    ReportRow {
        subject: subject.to_string(),
        session: session.identifier(),
        single_folder,
        already_processed,
        outcome,
    }
}

fn build(root: &Path, mode: ReportMode, pb: ProgressBar) -> Result<ReportSummary, QaError> {
    let root = ensure_dir(root)?;
    let subjects = root.subdirectories().context(IoSnafu { path: &root })?;
    if subjects.is_empty() {
        return NoSubjectsSnafu { path: root }.fail();
    }
    tracing::info!("Number of subjects found: {}", subjects.len());

    pb.set_length(subjects.len() as u64);
    let mut rows = Vec::new();
    for subject in subjects.iter().progress_with(pb) {
        let subject_id = subject.identifier();
        let sessions = match subject.subdirectories() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Unable to list sessions of {}: {}", subject.display(), e);
                continue;
            }
        };
        for session in sessions {
            rows.push(process_session(&subject_id, &session, mode));
        }
    }

    Ok(ReportSummary { mode, rows })
}

/// Walk `root/subject/session`, selecting and checking the dominant folder of every session.
/// Rows follow subject then session name order.
pub fn build_report<P: AsRef<Path>>(root: P, mode: ReportMode) -> Result<ReportSummary, QaError> {
    build(root.as_ref(), mode, ProgressBar::hidden())
}

/// Like `build_report`, but with a progress bar over subjects.
pub fn build_report_with_progress<P: AsRef<Path>>(
    root: P,
    mode: ReportMode,
) -> Result<ReportSummary, QaError> {
    let pb = default_bar(0).with_finish(ProgressFinish::AndLeave);
    pb.set_message("Subjects");
    build(root.as_ref(), mode, pb)
}
