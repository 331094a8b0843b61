//! Line-oriented file sources.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};
use crate::row::Row;
use crate::types::RowStream;

/// Parses one JSON object line into a [Row].  The usual parser handed
/// to [from_file].
pub fn json_row(line: &str) -> anyhow::Result<Row> {
    Ok(serde_json::from_str(line)?)
}

/// Opens `path` and returns a stream yielding one parsed row per line.
/// The stream is single use: it owns the file handle, reads it once
/// and closes it when exhausted or dropped.  To run a graph against
/// the same file more than once, register a factory that calls
/// `from_file` afresh (see [Sources::factory](crate::Sources::factory)).
pub fn from_file(
    path: impl AsRef<Path>,
    parser: impl Fn(&str) -> anyhow::Result<Row> + 'static,
) -> Result<RowStream> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path).map_err(|e| FlowError::SourceIo {
        path: path.clone(),
        source: e,
    })?;
    Ok(Box::new(FileRows {
        lines: BufReader::new(file).lines(),
        parser: Box::new(parser),
        path,
        line: 0,
        done: false,
    }))
}

struct FileRows {
    lines: Lines<BufReader<File>>,
    parser: Box<dyn Fn(&str) -> anyhow::Result<Row>>,
    path: PathBuf,
    line: usize,
    done: bool,
}

impl Iterator for FileRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.lines.next() {
            None => {
                self.done = true;
                debug!("finished reading {:?} ({} lines)", self.path, self.line);
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(FlowError::SourceIo {
                    path: self.path.clone(),
                    source: e,
                }))
            }
            Some(Ok(text)) => {
                self.line += 1;
                match (self.parser)(&text) {
                    Ok(row) => Some(Ok(row)),
                    Err(e) => {
                        self.done = true;
                        Some(Err(FlowError::Parse {
                            path: self.path.clone(),
                            line: self.line,
                            source: e,
                        }))
                    }
                }
            }
        }
    }
}
