use crate::error::Result;
use crate::types::{GroupRows, Reducer, Rows};

/// Emits the first row of each group.
pub struct FirstReducer;

impl Reducer for FirstReducer {
    fn apply(&self, _keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        if let Some(row) = group.next().transpose()? {
            out.push(row);
        }
        Ok(())
    }
}
