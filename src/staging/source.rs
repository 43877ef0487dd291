//! Tabular sources feeding the staging loader

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::error::LoadError;

/// One row of a tabular source: column names paired with type-erased values
///
/// Values are kept as text; `None` marks an empty field and is loaded as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Record {
    /// Create a record over a shared column list
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Column names, in source order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values, in column order
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Look up a value by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    /// Number of values in this record
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the record has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(column, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(|v| v.as_deref()))
    }
}

/// Everything read from a source: its column set and all records
#[derive(Debug, Clone)]
pub struct SourceData {
    /// Column names from the header
    pub columns: Arc<[String]>,
    /// Records in source order
    pub records: Vec<Record>,
}

impl SourceData {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the source had a header but no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A bounded, ordered sequence of records with a discovered column set
///
/// Sources are read eagerly: the loader never starts writing before the whole
/// source has been read.
pub trait TabularSource {
    /// Short description for logs and error messages (e.g. the file path)
    fn describe(&self) -> String;

    /// Read every record
    fn read_all(&mut self) -> Result<SourceData, LoadError>;
}

/// Delimited text file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    /// Source over the given file, comma-delimited
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Use a different single-byte delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, reason: impl ToString) -> LoadError {
        LoadError::SourceUnreadable {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TabularSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_all(&mut self) -> Result<SourceData, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .map_err(|e| self.unreadable(e))?;

        let header = reader.headers().map_err(|e| self.unreadable(e))?;
        if header.is_empty() || header.iter().all(str::is_empty) {
            return Err(self.unreadable("missing header row"));
        }

        let columns: Vec<String> = header.iter().map(str::to_string).collect();
        for (i, column) in columns.iter().enumerate() {
            if column.is_empty() {
                return Err(self.unreadable(format!("header column {} has no name", i + 1)));
            }
            if columns[..i].contains(column) {
                return Err(self.unreadable(format!("duplicate column '{column}' in header")));
            }
        }
        let columns: Arc<[String]> = columns.into();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let row = result.map_err(|e| self.unreadable(e))?;
            if row.len() != columns.len() {
                return Err(LoadError::SchemaMismatch {
                    record: idx + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let values = row
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect();
            records.push(Record::new(Arc::clone(&columns), values));
        }

        debug!(
            path = %self.path.display(),
            columns = columns.len(),
            records = records.len(),
            "Read tabular source"
        );

        Ok(SourceData { columns, records })
    }
}

/// Records held in memory, for programmatic callers and tests
#[derive(Debug, Clone)]
pub struct InMemorySource {
    columns: Arc<[String]>,
    rows: Vec<Vec<Option<String>>>,
}

impl InMemorySource {
    /// Empty source with the given columns
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; empty strings are kept as values, use `None` for NULL
    pub fn with_row<S: AsRef<str>>(mut self, values: &[Option<S>]) -> Self {
        self.rows.push(
            values
                .iter()
                .map(|v| v.as_ref().map(|s| s.as_ref().to_string()))
                .collect(),
        );
        self
    }
}

impl TabularSource for InMemorySource {
    fn describe(&self) -> String {
        format!("<memory: {} rows>", self.rows.len())
    }

    fn read_all(&mut self) -> Result<SourceData, LoadError> {
        let records = self
            .rows
            .iter()
            .map(|values| Record::new(Arc::clone(&self.columns), values.clone()))
            .collect();
        Ok(SourceData {
            columns: Arc::clone(&self.columns),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_csv_reads_header_and_records() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "id,name\n1,A\n2,B\n");

        let data = CsvSource::open(&path).read_all().unwrap();
        assert_eq!(&*data.columns, &["id".to_string(), "name".to_string()]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.records[0].get("id"), Some("1"));
        assert_eq!(data.records[1].get("name"), Some("B"));
    }

    #[test]
    fn test_csv_empty_field_is_null() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "id,name,email\n1,,a@example.com\n");

        let data = CsvSource::open(&path).read_all().unwrap();
        let record = &data.records[0];
        assert_eq!(record.values()[1], None);
        assert_eq!(record.get("email"), Some("a@example.com"));
    }

    #[test]
    fn test_csv_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "projects.csv", "id,title\n1,\"Roof, north wing\"\n");

        let data = CsvSource::open(&path).read_all().unwrap();
        assert_eq!(data.records[0].get("title"), Some("Roof, north wing"));
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "employees.csv", "id;name\n1;Ada\n");

        let data = CsvSource::open(&path)
            .with_delimiter(b';')
            .read_all()
            .unwrap();
        assert_eq!(data.records[0].get("name"), Some("Ada"));
    }

    #[test]
    fn test_csv_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut source = CsvSource::open(dir.path().join("missing.csv"));
        assert!(source.path().ends_with("missing.csv"));
        assert_eq!(source.describe(), source.path().display().to_string());
        let err = source.read_all().unwrap_err();
        assert!(matches!(err, LoadError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_csv_ragged_row() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "id,name\n1,A\n2\n");

        let err = CsvSource::open(&path).read_all().unwrap_err();
        match err {
            LoadError::SchemaMismatch {
                record,
                expected,
                found,
            } => {
                assert_eq!(record, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_csv_header_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "id,name\n");

        let data = CsvSource::open(&path).read_all().unwrap();
        assert!(data.is_empty());
        assert_eq!(data.columns.len(), 2);
    }

    #[test]
    fn test_csv_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "");

        let err = CsvSource::open(&path).read_all().unwrap_err();
        assert!(matches!(err, LoadError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_csv_duplicate_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "clients.csv", "id,id\n1,2\n");

        let err = CsvSource::open(&path).read_all().unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_record_iter_keeps_order() {
        let mut source = InMemorySource::new(&["b", "a"]).with_row(&[Some("2"), None]);
        let data = source.read_all().unwrap();
        let pairs: Vec<_> = data.records[0].iter().collect();
        assert_eq!(pairs, vec![("b", Some("2")), ("a", None)]);
    }
}
