//! Flight logs on disk, for the plotter.
//!
//! A log is a CSV file whose header row names a timestamp column followed by
//! any number of attributes, and whose every other row is plain numbers:
//!
//! ```text
//! time,thrust,yaw,altitude
//! 0.00,0.0,0.0,2.5
//! 0.05,12.5,0.0,2.5
//! ```
//!
//! Several files can be loaded as one table as long as they agree on their
//! attributes; the rows are merged and ordered by timestamp.

use nom::{
    bytes::complete::take_till,
    character::complete::{char, space0},
    combinator::all_consuming,
    multi::separated_list1,
    number::complete::double,
    sequence::delimited,
    Finish, IResult,
};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

/// One row of a log.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    /// One value per attribute, in header order.
    pub values: Vec<f64>,
}

/// A whole log, rows ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogTable {
    pub attributes: Vec<String>,
    pub rows: Vec<Sample>,
}

impl LogTable {
    /// `(timestamp, value)` pairs of one attribute, or `None` if the log has
    /// no such attribute.
    pub fn series(&self, name: &str) -> Option<Vec<(f64, f64)>> {
        let idx = self.attributes.iter().position(|a| a == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| (row.timestamp, row.values[idx]))
                .collect(),
        )
    }

    /// Smallest and largest timestamp.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.rows.first()?.timestamp, self.rows.last()?.timestamp))
    }
}

#[derive(Debug)]
pub enum SourceError {
    /// The file could not be read at all.
    Unavailable { path: PathBuf, source: std::io::Error },
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// A file's header does not match the first file's.
    MismatchedAttributes {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// There was nothing to plot.
    Empty,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            SourceError::MalformedRow { path, line, reason } => {
                write!(f, "{}:{}: {}", path.display(), line, reason)
            }
            SourceError::MismatchedAttributes {
                path,
                expected,
                found,
            } => write!(
                f,
                "{} has columns [{}] but [{}] was expected",
                path.display(),
                found.join(", "),
                expected.join(", ")
            ),
            SourceError::Empty => write!(f, "no data rows"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Unavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// `DataSource`
///
/// Anything that can produce a [`LogTable`].
pub trait DataSource {
    fn load(&mut self) -> Result<LogTable, SourceError>;
}

/// One or more CSV files read as a single table.
#[derive(Debug, Clone)]
pub struct CsvLog {
    paths: Vec<PathBuf>,
}

impl CsvLog {
    pub fn new<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }
}

impl DataSource for CsvLog {
    fn load(&mut self) -> Result<LogTable, SourceError> {
        let mut table: Option<LogTable> = None;

        for path in &self.paths {
            let text = fs::read_to_string(path).map_err(|source| SourceError::Unavailable {
                path: path.clone(),
                source,
            })?;
            let file = parse_csv(&text, path)?;

            table = Some(match table.take() {
                None => file,
                Some(mut table) => {
                    if table.attributes != file.attributes {
                        return Err(SourceError::MismatchedAttributes {
                            path: path.clone(),
                            expected: table.attributes,
                            found: file.attributes,
                        });
                    }
                    table.rows.extend(file.rows);
                    table
                }
            });
        }

        let mut table = table.ok_or(SourceError::Empty)?;
        if table.rows.is_empty() {
            return Err(SourceError::Empty);
        }
        table
            .rows
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(table)
    }
}

fn header(input: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(separated_list1(char(','), take_till(|c: char| c == ',')))(input)
}

fn row(input: &str) -> IResult<&str, Vec<f64>> {
    all_consuming(separated_list1(char(','), delimited(space0, double, space0)))(input)
}

/// Parses one file. Blank lines are skipped; line numbers in errors are
/// 1-based and count them anyway.
fn parse_csv(text: &str, path: &Path) -> Result<LogTable, SourceError> {
    let malformed = |line: usize, reason: String| SourceError::MalformedRow {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let Some((line_no, first)) = lines.next() else {
        return Err(SourceError::Empty);
    };
    let (_, names) = header(first)
        .finish()
        .map_err(|e| malformed(line_no, format!("bad header: {:?}", e.code)))?;
    let names: Vec<String> = names.iter().map(|n| n.trim().to_owned()).collect();
    if names.len() < 2 {
        return Err(malformed(
            line_no,
            "header needs a timestamp and at least one attribute".to_owned(),
        ));
    }

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let (_, fields) = row(line)
            .finish()
            .map_err(|_| malformed(line_no, format!("not a row of numbers: {:?}", line)))?;
        if fields.len() != names.len() {
            return Err(malformed(
                line_no,
                format!("expected {} fields, found {}", names.len(), fields.len()),
            ));
        }
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(malformed(line_no, "non-finite value".to_owned()));
        }
        rows.push(Sample {
            timestamp: fields[0],
            values: fields[1..].to_vec(),
        });
    }

    Ok(LogTable {
        attributes: names[1..].to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn single_file() {
        let file = log_file("time, thrust, yaw\n0.0, 1, 2\n\n0.5, 3, 4\r\n");
        let table = CsvLog::new([file.path()]).load().unwrap();

        assert_eq!(table.attributes, vec!["thrust", "yaw"]);
        assert_eq!(table.series("yaw"), Some(vec![(0.0, 2.0), (0.5, 4.0)]));
        assert_eq!(table.series("pitch"), None);
        assert_eq!(table.time_span(), Some((0.0, 0.5)));
    }

    #[test]
    fn files_are_merged_in_time_order() {
        let late = log_file("t,a\n2,20\n3,30\n");
        let early = log_file("t,a\n0,0\n1,10\n");
        let table = CsvLog::new([late.path(), early.path()]).load().unwrap();

        assert_eq!(
            table.series("a").unwrap(),
            vec![(0.0, 0.0), (1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]
        );
    }

    #[test]
    fn bad_rows_name_the_line() {
        let file = log_file("t,a,b\n0,1,2\n1,oops,3\n");
        match CsvLog::new([file.path()]).load() {
            Err(SourceError::MalformedRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }

        let file = log_file("t,a,b\n0,1\n");
        match CsvLog::new([file.path()]).load() {
            Err(SourceError::MalformedRow { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 3"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mismatched_headers_are_rejected() {
        let a = log_file("t,a\n0,1\n");
        let b = log_file("t,b\n0,1\n");
        assert!(matches!(
            CsvLog::new([a.path(), b.path()]).load(),
            Err(SourceError::MismatchedAttributes { .. })
        ));
    }

    #[test]
    fn nothing_to_plot() {
        let header_only = log_file("t,a\n");
        assert!(matches!(
            CsvLog::new([header_only.path()]).load(),
            Err(SourceError::Empty)
        ));
        let blank = log_file("\n\n");
        assert!(matches!(
            CsvLog::new([blank.path()]).load(),
            Err(SourceError::Empty)
        ));
        assert!(matches!(
            CsvLog::new(Vec::<PathBuf>::new()).load(),
            Err(SourceError::Empty)
        ));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvLog::new([dir.path().join("nope.csv")])
            .load()
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert!(err.to_string().contains("nope.csv"));
    }
}
