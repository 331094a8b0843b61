use crate::error::Result;
use crate::row::Row;
use crate::types::{Mapper, Rows};

/// The ASCII punctuation set stripped by [FilterPunctuation].
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Yields its row unchanged.
pub struct DummyMapper;

impl Mapper for DummyMapper {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()> {
        out.push(row);
        Ok(())
    }
}

/// Strips ASCII punctuation characters from one column.
pub struct FilterPunctuation {
    column: String,
}

impl FilterPunctuation {
    pub fn new(column: impl Into<String>) -> FilterPunctuation {
        FilterPunctuation {
            column: column.into(),
        }
    }
}

impl Mapper for FilterPunctuation {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let cleaned: String = row
            .str_field(&self.column)?
            .chars()
            .filter(|c| !PUNCTUATION.contains(*c))
            .collect();
        row.set(self.column.clone(), cleaned);
        out.push(row);
        Ok(())
    }
}

/// Lowercases one column.
pub struct LowerCase {
    column: String,
}

impl LowerCase {
    pub fn new(column: impl Into<String>) -> LowerCase {
        LowerCase {
            column: column.into(),
        }
    }
}

impl Mapper for LowerCase {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let lowered = row.str_field(&self.column)?.to_lowercase();
        row.set(self.column.clone(), lowered);
        out.push(row);
        Ok(())
    }
}

/// Splits one column, emitting one row per part with every other field
/// preserved.  Without an explicit separator it splits on runs of
/// whitespace.
pub struct Split {
    column: String,
    separator: Option<String>,
}

impl Split {
    pub fn new(column: impl Into<String>) -> Split {
        Split {
            column: column.into(),
            separator: None,
        }
    }

    pub fn with_separator(column: impl Into<String>, separator: impl Into<String>) -> Split {
        Split {
            column: column.into(),
            separator: Some(separator.into()),
        }
    }

    fn emit(&self, row: &Row, part: &str, out: &mut Rows) {
        let mut split = row.clone();
        split.set(self.column.clone(), part);
        out.push(split);
    }
}

impl Mapper for Split {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()> {
        let text = row.str_field(&self.column)?.to_string();
        match &self.separator {
            Some(sep) => {
                for part in text.split(sep.as_str()) {
                    self.emit(&row, part, out);
                }
            }
            None => {
                for part in text.split_whitespace() {
                    self.emit(&row, part, out);
                }
            }
        }
        Ok(())
    }
}
