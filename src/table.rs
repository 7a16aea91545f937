use arrow::array::{Array, ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReader;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use snafu::{OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BATCH_SIZE: usize = 1024;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TableError {
    #[snafu(display("Invalid extension for {}, supported extensions: {}", path.display(), supported.join(", ")))]
    InvalidExtension {
        path: PathBuf,
        supported: Vec<&'static str>,
    },

    #[snafu(display("IO error on {}: {:?}", path.display(), source))]
    Io {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("CSV error on {}: {:?}", path.display(), source))]
    Csv {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("Arrow error: {:?}", source))]
    Arrow {
        #[snafu(source(from(ArrowError, Box::new)))]
        source: Box<ArrowError>,
    },

    #[snafu(display("Parquet error: {:?}", source))]
    Parquet {
        #[snafu(source(from(ParquetError, Box::new)))]
        source: Box<ParquetError>,
    },

    #[snafu(display("Missing column: {}", name))]
    MissingColumn { name: String },

    #[snafu(display("Column {} has {} rows, expected {}", name, actual, expected))]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("Invalid integer '{}' in column {} at row {}", value, name, row))]
    InvalidInteger {
        name: String,
        row: usize,
        value: String,
    },

    #[snafu(display("Unsupported type {} for column {}", data_type, name))]
    UnsupportedColumnType { name: String, data_type: DataType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_extension(path: &Path) -> Result<Self, TableError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => InvalidExtensionSnafu {
                path,
                supported: vec!["csv", "parquet"],
            }
            .fail(),
        }
    }
}

/// A column of nullable cells. Null cells are written as blanks in CSV.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Int(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
            Column::Text(values) => values[row].clone().unwrap_or_default(),
        }
    }

    fn field(&self, name: &str) -> Field {
        let data_type = match self {
            Column::Int(_) => DataType::Int64,
            Column::Text(_) => DataType::Utf8,
        };
        Field::new(name, data_type, true)
    }

    fn to_array(&self) -> ArrayRef {
        match self {
            Column::Int(values) => Arc::new(Int64Array::from(values.clone())),
            Column::Text(values) => Arc::new(StringArray::from(values.clone())),
        }
    }
}

/// Parse an integer cell. Whole-valued decimals such as `361.0` are accepted, since tools that
/// store integer columns with blanks as floating point write them that way.
fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// An ordered set of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Add a column, replacing any existing column of the same name in place.
    pub fn set_column<S: Into<String>>(&mut self, name: S, column: Column) -> Result<(), TableError> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return LengthMismatchSnafu {
                name,
                expected: self.num_rows(),
                actual: column.len(),
            }
            .fail();
        }
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Builder-style `set_column`.
    pub fn with_column<S: Into<String>>(mut self, name: S, column: Column) -> Result<Self, TableError> {
        self.set_column(name, column)?;
        Ok(self)
    }

    /// Read a column as integers. Text columns are parsed, blanks become `None`.
    pub fn int_values(&self, name: &str) -> Result<Vec<Option<i64>>, TableError> {
        let column = self.column(name).context(MissingColumnSnafu { name })?;
        match column {
            Column::Int(values) => Ok(values.clone()),
            Column::Text(values) => values
                .iter()
                .enumerate()
                .map(|(row, value)| match value.as_deref().map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(value) => parse_int(value).map(Some).context(InvalidIntegerSnafu {
                        name,
                        row,
                        value,
                    }),
                })
                .collect(),
        }
    }

    /// Like `int_values`, but cells that are not integers are logged and read as blanks.
    pub fn int_values_or_blank(&self, name: &str) -> Result<Vec<Option<i64>>, TableError> {
        let column = self.column(name).context(MissingColumnSnafu { name })?;
        match column {
            Column::Int(values) => Ok(values.clone()),
            Column::Text(values) => Ok(values
                .iter()
                .enumerate()
                .map(|(row, value)| match value.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(value) => {
                        let parsed = parse_int(value);
                        if parsed.is_none() {
                            tracing::warn!(
                                "Invalid integer '{}' in column {} at row {}, read as blank",
                                value,
                                name,
                                row
                            );
                        }
                        parsed
                    }
                })
                .collect()),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        match TableFormat::from_extension(path)? {
            TableFormat::Csv => Self::read_csv(path),
            TableFormat::Parquet => Self::read_parquet(path),
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let path = path.as_ref();
        match TableFormat::from_extension(path)? {
            TableFormat::Csv => self.write_csv(path),
            TableFormat::Parquet => self.write_parquet(path),
        }
    }

    /// Read a CSV file with a header row. All columns are read as text.
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let mut reader = csv::Reader::from_path(path).context(CsvSnafu { path })?;
        let names = reader
            .headers()
            .context(CsvSnafu { path })?
            .iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record.context(CsvSnafu { path })?;
            for (i, column) in values.iter_mut().enumerate() {
                let cell = record.get(i).filter(|v| !v.is_empty()).map(String::from);
                column.push(cell);
            }
        }
        Ok(Self {
            names,
            columns: values.into_iter().map(Column::Text).collect(),
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_path(path).context(CsvSnafu { path })?;
        writer.write_record(&self.names).context(CsvSnafu { path })?;
        for row in 0..self.num_rows() {
            let record = self.columns.iter().map(|c| c.cell(row));
            writer.write_record(record).context(CsvSnafu { path })?;
        }
        writer.flush().context(IoSnafu { path })?;
        Ok(())
    }

    pub fn read_parquet(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).context(IoSnafu { path })?;
        let reader = ParquetRecordBatchReader::try_new(file, BATCH_SIZE).context(ParquetSnafu)?;

        let schema = reader.schema();
        let names = schema
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect::<Vec<_>>();
        let mut columns = schema
            .fields()
            .iter()
            .map(|f| match f.data_type() {
                DataType::Int32 | DataType::Int64 => Ok(Column::Int(Vec::new())),
                DataType::Utf8 => Ok(Column::Text(Vec::new())),
                other => UnsupportedColumnTypeSnafu {
                    name: f.name().as_str(),
                    data_type: other.clone(),
                }
                .fail(),
            })
            .collect::<Result<Vec<_>, _>>()?;

        for batch in reader {
            let batch = batch.context(ArrowSnafu)?;
            for (i, column) in columns.iter_mut().enumerate() {
                append_array(column, batch.column(i).as_ref(), &names[i])?;
            }
        }

        Ok(Self { names, columns })
    }

    pub fn write_parquet(&self, path: &Path) -> Result<(), TableError> {
        let schema = Schema::new(
            self.names
                .iter()
                .zip(self.columns.iter())
                .map(|(name, column)| column.field(name))
                .collect::<Vec<_>>(),
        );
        let arrays = self.columns.iter().map(Column::to_array).collect::<Vec<_>>();
        let batch = RecordBatch::try_new(Arc::new(schema), arrays).context(ArrowSnafu)?;

        let file = File::create(path).context(IoSnafu { path })?;
        let props = WriterProperties::builder().build();
        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), Some(props)).context(ParquetSnafu)?;
        writer.write(&batch).context(ParquetSnafu)?;
        writer.close().context(ParquetSnafu)?;
        Ok(())
    }
}

fn append_array(column: &mut Column, array: &dyn Array, name: &str) -> Result<(), TableError> {
    let unsupported = || {
        UnsupportedColumnTypeSnafu {
            name,
            data_type: array.data_type().clone(),
        }
        .build()
    };
    match column {
        Column::Int(values) => {
            if let Some(array) = array.as_any().downcast_ref::<Int64Array>() {
                values.extend(array.iter());
            } else if let Some(array) = array.as_any().downcast_ref::<Int32Array>() {
                values.extend(array.iter().map(|v| v.map(i64::from)));
            } else {
                return Err(unsupported());
            }
        }
        Column::Text(values) => {
            let array = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(unsupported)?;
            values.extend(array.iter().map(|v| v.map(String::from)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Table {
        Table::new()
            .with_column(
                "session",
                Column::Text(vec![Some("s1".into()), Some("s2".into()), Some("s3".into())]),
            )
            .unwrap()
            .with_column("count", Column::Int(vec![Some(361), None, Some(-1)]))
            .unwrap()
    }

    #[rstest]
    #[case("report.csv", Ok(TableFormat::Csv))]
    #[case("report.parquet", Ok(TableFormat::Parquet))]
    #[case("report.txt", Err(()))]
    #[case("report", Err(()))]
    fn test_format_from_extension(#[case] path: &str, #[case] expected: Result<TableFormat, ()>) {
        let result = TableFormat::from_extension(Path::new(path)).map_err(|_| ());
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case("361", Some(361))]
    #[case(" 20 ", Some(20))]
    #[case("-3", Some(-3))]
    #[case("361.0", Some(361))]
    #[case("1.5", None)]
    #[case("abc", None)]
    fn test_parse_int(#[case] value: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(value), expected);
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = sample();
        let result = table.set_column("short", Column::Int(vec![Some(1)]));
        assert!(matches!(result, Err(TableError::LengthMismatch { .. })));
    }

    #[test]
    fn test_set_column_replaces() {
        let mut table = sample();
        table
            .set_column("count", Column::Int(vec![Some(1), Some(2), Some(3)]))
            .unwrap();
        assert_eq!(table.column_names(), &["session", "count"]);
        assert_eq!(
            table.int_values("count").unwrap(),
            vec![Some(1), Some(2), Some(3)]
        );
    }

    #[test]
    fn test_csv_blanks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.csv");
        sample().write(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "session,count\ns1,361\ns2,\ns3,-1\n");

        let table = Table::read(&path).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.int_values("count").unwrap(), vec![Some(361), None, Some(-1)]);
        assert!(matches!(
            table.int_values("session"),
            Err(TableError::InvalidInteger { .. })
        ));
        assert!(matches!(
            table.int_values("missing"),
            Err(TableError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_int_values_or_blank() {
        let table = Table::new()
            .with_column(
                "count",
                Column::Text(vec![
                    Some("25.0".to_string()),
                    Some("1.5".to_string()),
                    Some("dicom error".to_string()),
                    None,
                ]),
            )
            .unwrap();
        assert_eq!(
            table.int_values_or_blank("count").unwrap(),
            vec![Some(25), None, None, None]
        );
        assert!(matches!(
            table.int_values_or_blank("missing"),
            Err(TableError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_parquet_keeps_types() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.parquet");
        let table = sample();
        table.write(&path).unwrap();
        assert_eq!(Table::read(&path).unwrap(), table);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        let table = Table::new()
            .with_column("session", Column::Text(vec![]))
            .unwrap();
        table.write(&path).unwrap();
        let read = Table::read(&path).unwrap();
        assert_eq!(read.column_names(), &["session"]);
        assert_eq!(read.num_rows(), 0);
    }
}
