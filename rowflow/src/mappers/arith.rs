use crate::error::{FlowError, Result};
use crate::row::{Row, Value, ValueKind};
use crate::types::{Mapper, Rows};

/// Writes the arithmetic product of several columns into a result
/// column.  Integer columns stay integer until a float joins in.
pub struct Product {
    columns: Vec<String>,
    result_column: String,
}

impl Product {
    pub fn new(columns: &[&str], result_column: impl Into<String>) -> Product {
        Product {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for Product {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let mut product = Value::Int(1);
        for column in &self.columns {
            let value = row.field(column)?;
            product = product.try_mul(value).ok_or_else(|| FlowError::FieldKind {
                field: column.clone(),
                expected: ValueKind::Float,
                found: value.kind(),
            })?;
        }
        row.set(self.result_column.clone(), product);
        out.push(row);
        Ok(())
    }
}

/// Drops rows that fail the supplied predicate.
pub struct Filter {
    predicate: Box<dyn Fn(&Row) -> bool>,
}

impl Filter {
    pub fn new(predicate: impl Fn(&Row) -> bool + 'static) -> Filter {
        Filter {
            predicate: Box::new(predicate),
        }
    }
}

impl Mapper for Filter {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()> {
        if (self.predicate)(&row) {
            out.push(row);
        }
        Ok(())
    }
}

/// Emits a new row restricted to the named columns.  A missing column
/// is an error.
pub struct Project {
    columns: Vec<String>,
}

impl Project {
    pub fn new(columns: &[&str]) -> Project {
        Project {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Mapper for Project {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()> {
        let mut projected = Row::new();
        for column in &self.columns {
            projected.set(column.clone(), row.field(column)?.clone());
        }
        out.push(projected);
        Ok(())
    }
}
