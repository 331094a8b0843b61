use std::collections::BTreeMap;

use crate::error::Result;
use crate::row::{Key, Row, key_of};
use crate::types::{GroupRows, Reducer, Rows};

/// Relative frequency of each distinct value of one column within a
/// group.  Emits one row per distinct value, carrying the group-key
/// fields of the group's first row; frequencies sum to 1 per group.
/// Output is ordered by the counted value.
pub struct TermFrequency {
    column: String,
    result_column: String,
}

impl TermFrequency {
    pub fn new(column: impl Into<String>) -> TermFrequency {
        TermFrequency {
            column: column.into(),
            result_column: "tf".to_string(),
        }
    }

    pub fn with_result_column(mut self, result_column: impl Into<String>) -> TermFrequency {
        self.result_column = result_column.into();
        self
    }
}

impl Reducer for TermFrequency {
    fn apply(&self, keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        let column = std::slice::from_ref(&self.column);
        let mut counts: BTreeMap<Key, i64> = BTreeMap::new();
        let mut total: i64 = 0;
        let mut sample = None;
        while let Some(row) = group.next().transpose()? {
            let value = key_of(&row, column)?;
            *counts.entry(value).or_insert(0) += 1;
            total += 1;
            if sample.is_none() {
                sample = Some(row);
            }
        }
        let Some(sample) = sample else { return Ok(()) };
        for (value, count) in counts {
            let mut result = Row::new();
            for key in keys {
                result.set(key.clone(), sample.field(key)?.clone());
            }
            let value = value.into_values().pop().unwrap();
            result.set(self.column.clone(), value);
            result.set(self.result_column.clone(), count as f64 / total as f64);
            out.push(result);
        }
        Ok(())
    }
}
