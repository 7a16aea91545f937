use std::fmt;
use std::path::{Path, PathBuf};

use crate::instance::ConsistencyResult;
use crate::report::{DISCREPANCY, INSTANCE_N};
use crate::table::{Column, Table, TableError};

pub const VERDICT: &str = "auto";
pub const DEFAULT_MIN_SLICES: i64 = 20;
pub const DEFAULT_MAX_DISCREPANCY: i64 = 0;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("report not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("unable to process report {}: {source}", .path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    Good,
    Bad,
}

impl QualityVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityVerdict::Good => "good",
            QualityVerdict::Bad => "bad",
        }
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds of the pass/fail rule. A session is bad when its discrepancy exceeds
/// `max_discrepancy` or it has fewer than `min_slices` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub min_slices: i64,
    pub max_discrepancy: i64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_slices: DEFAULT_MIN_SLICES,
            max_discrepancy: DEFAULT_MAX_DISCREPANCY,
        }
    }
}

impl QualityThresholds {
    /// Apply the rule to possibly blank report cells. A blank discrepancy never exceeds the
    /// limit, while a blank count is below any minimum.
    pub fn verdict(&self, observed_count: Option<i64>, discrepancy: Option<i64>) -> QualityVerdict {
        let too_many_missing = discrepancy.is_some_and(|d| d > self.max_discrepancy);
        let too_few_slices = observed_count.map_or(true, |n| n < self.min_slices);
        if too_many_missing || too_few_slices {
            QualityVerdict::Bad
        } else {
            QualityVerdict::Good
        }
    }

    pub fn verdict_for(&self, result: &ConsistencyResult) -> QualityVerdict {
        self.verdict(Some(result.observed_count), Some(result.discrepancy))
    }
}

/// Compute the verdict column for an instance-check table. Cells that are not integers count as
/// blanks.
pub fn verdicts(
    table: &Table,
    thresholds: &QualityThresholds,
) -> Result<Vec<QualityVerdict>, TableError> {
    let observed = table.int_values_or_blank(INSTANCE_N)?;
    let discrepancy = table.int_values_or_blank(DISCREPANCY)?;
    Ok(observed
        .into_iter()
        .zip(discrepancy)
        .map(|(n, d)| thresholds.verdict(n, d))
        .collect())
}

/// Add the verdict column to a table, replacing an existing one. Returns the verdict of every row.
pub fn apply_filter(
    table: &mut Table,
    thresholds: &QualityThresholds,
) -> Result<Vec<QualityVerdict>, TableError> {
    let verdicts = verdicts(table, thresholds)?;
    let column = Column::Text(
        verdicts
            .iter()
            .map(|v| Some(v.as_str().to_string()))
            .collect(),
    );
    table.set_column(VERDICT, column)?;
    Ok(verdicts)
}

/// Filter an instance-check report in place. Returns the verdict of every row.
pub fn filter_report<P: AsRef<Path>>(
    path: P,
    thresholds: &QualityThresholds,
) -> Result<Vec<QualityVerdict>, FilterError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(FilterError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let table_err = |source| FilterError::Table {
        path: path.to_path_buf(),
        source,
    };

    let mut table = Table::read(path).map_err(table_err)?;
    let verdicts = apply_filter(&mut table, thresholds).map_err(table_err)?;
    table.write(path).map_err(table_err)?;

    tracing::info!(
        "Filtered {} rows of {}: {} bad",
        verdicts.len(),
        path.display(),
        verdicts.iter().filter(|v| **v == QualityVerdict::Bad).count()
    );
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::good(Some(361), Some(0), QualityVerdict::Good)]
    #[case::missing_instances(Some(3), Some(1), QualityVerdict::Bad)]
    #[case::few_slices(Some(19), Some(0), QualityVerdict::Bad)]
    #[case::boundary(Some(20), Some(0), QualityVerdict::Good)]
    #[case::negative_discrepancy(Some(40), Some(-2), QualityVerdict::Good)]
    #[case::blank_discrepancy(Some(40), None, QualityVerdict::Good)]
    #[case::blank_count(None, Some(0), QualityVerdict::Bad)]
    #[case::blank_row(None, None, QualityVerdict::Bad)]
    fn test_verdict(
        #[case] observed: Option<i64>,
        #[case] discrepancy: Option<i64>,
        #[case] expected: QualityVerdict,
    ) {
        let thresholds = QualityThresholds::default();
        assert_eq!(thresholds.verdict(observed, discrepancy), expected);
    }

    #[test]
    fn test_verdict_custom_thresholds() {
        let thresholds = QualityThresholds {
            min_slices: 2,
            max_discrepancy: 1,
        };
        assert_eq!(thresholds.verdict(Some(3), Some(1)), QualityVerdict::Good);
        assert_eq!(thresholds.verdict(Some(1), Some(0)), QualityVerdict::Bad);
        assert_eq!(thresholds.verdict(Some(3), Some(2)), QualityVerdict::Bad);
    }

    #[rstest]
    #[case(vec![1, 2, 4], QualityVerdict::Bad)]
    #[case((1..=361).collect(), QualityVerdict::Good)]
    fn test_verdict_for(#[case] numbers: Vec<i32>, #[case] expected: QualityVerdict) {
        let result = ConsistencyResult::from_instance_numbers(numbers).unwrap();
        assert_eq!(QualityThresholds::default().verdict_for(&result), expected);
    }

    fn write_report(path: &Path) {
        std::fs::write(
            path,
            "subject,session,single_folder,instanceN,dicomN,dicomN-instanceN\n\
             s1,a,1,361,361,0\n\
             s1,b,0,3,4,1\n\
             s2,a,1,,,\n\
             s3,a,1,25.0,25.0,0.0\n",
        )
        .unwrap();
    }

    #[test]
    fn test_filter_report_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("instance_num_check.csv");
        write_report(&path);

        let verdicts = filter_report(&path, &QualityThresholds::default()).unwrap();
        assert_eq!(
            verdicts,
            vec![
                QualityVerdict::Good,
                QualityVerdict::Bad,
                QualityVerdict::Bad,
                QualityVerdict::Good
            ]
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "subject,session,single_folder,instanceN,dicomN,dicomN-instanceN,auto"
        );
        assert_eq!(lines[1], "s1,a,1,361,361,0,good");
        assert_eq!(lines[3], "s2,a,1,,,,bad");
    }

    #[test]
    fn test_filter_report_twice_replaces_column() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.csv");
        write_report(&path);

        filter_report(&path, &QualityThresholds::default()).unwrap();
        let strict = QualityThresholds {
            min_slices: 400,
            max_discrepancy: 0,
        };
        filter_report(&path, &strict).unwrap();

        let table = Table::read(&path).unwrap();
        assert_eq!(table.column_names().len(), 7);
        assert_eq!(
            table.column(VERDICT),
            Some(&Column::Text(vec![Some("bad".to_string()); 4]))
        );
    }

    #[test]
    fn test_filter_report_parquet() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("report.csv");
        let parquet_path = temp_dir.path().join("report.parquet");
        write_report(&csv_path);
        Table::read(&csv_path).unwrap().write(&parquet_path).unwrap();

        let verdicts = filter_report(&parquet_path, &QualityThresholds::default()).unwrap();
        assert_eq!(verdicts[0], QualityVerdict::Good);
        let table = Table::read(&parquet_path).unwrap();
        assert!(table.column(VERDICT).is_some());
    }

    #[test]
    fn test_filter_report_unparseable_cells() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("instance_num_check.csv");
        std::fs::write(
            &path,
            "subject,session,single_folder,instanceN,dicomN,dicomN-instanceN\n\
             s1,a,1,1.5,2,0\n\
             s1,b,1,30,30,dicom error\n\
             s2,a,1,dicom error,,\n",
        )
        .unwrap();

        let verdicts = filter_report(&path, &QualityThresholds::default()).unwrap();
        assert_eq!(
            verdicts,
            vec![QualityVerdict::Bad, QualityVerdict::Good, QualityVerdict::Bad]
        );
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().nth(2), Some("s1,b,1,30,30,dicom error,good"));
    }

    #[test]
    fn test_apply_filter_returns_column_verdicts() {
        let mut table = Table::new()
            .with_column(INSTANCE_N, Column::Int(vec![Some(361), Some(3)]))
            .unwrap()
            .with_column(DISCREPANCY, Column::Int(vec![Some(0), Some(1)]))
            .unwrap();
        let verdicts = apply_filter(&mut table, &QualityThresholds::default()).unwrap();
        assert_eq!(verdicts, vec![QualityVerdict::Good, QualityVerdict::Bad]);
        assert_eq!(
            table.column(VERDICT),
            Some(&Column::Text(vec![
                Some("good".to_string()),
                Some("bad".to_string())
            ]))
        );
    }

    #[test]
    fn test_filter_report_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = filter_report(temp_dir.path().join("none.csv"), &QualityThresholds::default());
        assert!(matches!(result, Err(FilterError::NotFound { .. })));
    }

    #[test]
    fn test_filter_report_wrong_columns() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("slice_dist_check.csv");
        std::fs::write(&path, "session,single_folder,distance_check\na,1,1\n").unwrap();
        let result = filter_report(&path, &QualityThresholds::default());
        assert!(matches!(
            result,
            Err(FilterError::Table {
                source: TableError::MissingColumn { .. },
                ..
            })
        ));
    }
}
