use crate::error::Result;
use crate::row::Row;
use crate::types::{Mapper, Rows};

/// Inverse document frequency: emits `{word, result}` with
/// `result = ln(doc_count / word_docs)`.
pub struct Idf {
    doc_count: String,
    word_docs: String,
    word: String,
    result_column: String,
}

impl Idf {
    pub fn new(
        doc_count: impl Into<String>,
        word_docs: impl Into<String>,
        word: impl Into<String>,
        result_column: impl Into<String>,
    ) -> Idf {
        Idf {
            doc_count: doc_count.into(),
            word_docs: word_docs.into(),
            word: word.into(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for Idf {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()> {
        let total = row.num_field(&self.doc_count)?;
        let entries = row.num_field(&self.word_docs)?;
        let mut result = Row::new();
        result.set(self.word.clone(), row.field(&self.word)?.clone());
        result.set(self.result_column.clone(), (total / entries).ln());
        out.push(result);
        Ok(())
    }
}

/// Pointwise mutual information: writes
/// `ln(doc_freq / total_freq)` into the result column.
pub struct Pmi {
    doc_freq: String,
    total_freq: String,
    result_column: String,
}

impl Pmi {
    pub fn new(
        doc_freq: impl Into<String>,
        total_freq: impl Into<String>,
        result_column: impl Into<String>,
    ) -> Pmi {
        Pmi {
            doc_freq: doc_freq.into(),
            total_freq: total_freq.into(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for Pmi {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let doc_freq = row.num_field(&self.doc_freq)?;
        let total_freq = row.num_field(&self.total_freq)?;
        row.set(self.result_column.clone(), (doc_freq / total_freq).ln());
        out.push(row);
        Ok(())
    }
}
