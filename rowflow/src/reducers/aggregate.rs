use crate::error::{FlowError, Result};
use crate::row::{Row, Value, ValueKind};
use crate::types::{GroupRows, Reducer, Rows};

/// Copy the group-key fields of `sample` onto a fresh result row.
fn keyed_row(keys: &[String], sample: &Row) -> Result<Row> {
    let mut result = Row::new();
    for key in keys {
        result.set(key.clone(), sample.field(key)?.clone());
    }
    Ok(result)
}

/// Emits one row per group carrying the group key and the group size.
pub struct Count {
    column: String,
}

impl Count {
    pub fn new(column: impl Into<String>) -> Count {
        Count {
            column: column.into(),
        }
    }
}

impl Reducer for Count {
    fn apply(&self, keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        let mut sample = None;
        let mut size: i64 = 0;
        while let Some(row) = group.next().transpose()? {
            if sample.is_none() {
                sample = Some(row);
            }
            size += 1;
        }
        let Some(sample) = sample else { return Ok(()) };
        let mut result = keyed_row(keys, &sample)?;
        result.set(self.column.clone(), size);
        out.push(result);
        Ok(())
    }
}

/// Like [Count], but emits the result row once per input row.  A
/// fixture tool for exercising fan-out, not a production reducer.
pub struct SafeCount {
    column: String,
}

impl SafeCount {
    pub fn new(column: impl Into<String>) -> SafeCount {
        SafeCount {
            column: column.into(),
        }
    }
}

impl Reducer for SafeCount {
    fn apply(&self, keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        let mut sample = None;
        let mut size: i64 = 0;
        while let Some(row) = group.next().transpose()? {
            if sample.is_none() {
                sample = Some(row);
            }
            size += 1;
        }
        let Some(sample) = sample else { return Ok(()) };
        let mut result = keyed_row(keys, &sample)?;
        result.set(self.column.clone(), size);
        for _ in 1..size {
            out.push(result.clone());
        }
        out.push(result);
        Ok(())
    }
}

/// Emits one row per group carrying the group key and each named
/// column summed, with int/float promotion.
pub struct Sum {
    columns: Vec<String>,
}

impl Sum {
    pub fn new(columns: &[&str]) -> Sum {
        Sum {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Reducer for Sum {
    fn apply(&self, keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        let mut sums = vec![Value::Int(0); self.columns.len()];
        let mut sample = None;
        while let Some(row) = group.next().transpose()? {
            for (column, sum) in self.columns.iter().zip(sums.iter_mut()) {
                let value = row.field(column)?;
                *sum = sum.try_add(value).ok_or_else(|| FlowError::FieldKind {
                    field: column.clone(),
                    expected: ValueKind::Float,
                    found: value.kind(),
                })?;
            }
            if sample.is_none() {
                sample = Some(row);
            }
        }
        let Some(sample) = sample else { return Ok(()) };
        let mut result = keyed_row(keys, &sample)?;
        for (column, sum) in self.columns.iter().zip(sums) {
            result.set(column.clone(), sum);
        }
        out.push(result);
        Ok(())
    }
}
