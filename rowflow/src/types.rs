use crate::error::Result;
use crate::row::{Key, Row, key_of};

/// A lazily produced, single pass, finite sequence of rows.  Errors
/// travel in band; operators fuse after yielding one.  A stream has
/// exactly one consumer and is not restartable; restarting means
/// re-running the graph against its sources.
pub type RowStream = Box<dyn Iterator<Item = Result<Row>>>;

/// Output buffer that operator primitives emit into.
pub type Rows = Vec<Row>;

/// Per row transform producing zero or more rows.  May inspect any
/// field and add, remove or overwrite fields.  Must not assume any
/// ordering of calls.
pub trait Mapper {
    fn apply(&self, row: Row, out: &mut Rows) -> Result<()>;
}

/// Per group transform.  `keys` is the field-name tuple the stream is
/// grouped by; `group` iterates the rows of exactly one group and can
/// be drained once only.  Rows left unread when `apply` returns are
/// discarded by the operator.
pub trait Reducer {
    fn apply(&self, keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()>;
}

/// Single pass iterator over the rows of one maximal run of equal
/// group keys.  Pulls from the shared upstream and parks the first row
/// of the following group back into the operator's carry slot.
pub struct GroupRows<'a> {
    key: &'a Key,
    keys: &'a [String],
    first: Option<Row>,
    upstream: &'a mut RowStream,
    carry: &'a mut Option<Row>,
    done: bool,
}

impl<'a> GroupRows<'a> {
    pub(crate) fn new(
        key: &'a Key,
        keys: &'a [String],
        first: Row,
        upstream: &'a mut RowStream,
        carry: &'a mut Option<Row>,
    ) -> GroupRows<'a> {
        GroupRows {
            key,
            keys,
            first: Some(first),
            upstream,
            carry,
            done: false,
        }
    }

    /// Consume whatever the reducer left behind, surfacing errors.
    pub(crate) fn finish(&mut self) -> Result<()> {
        for row in self {
            row?;
        }
        Ok(())
    }
}

impl Iterator for GroupRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(row) = self.first.take() {
            return Some(Ok(row));
        }
        let row = match self.upstream.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            Some(Ok(row)) => row,
        };
        match key_of(&row, self.keys) {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(key) if key == *self.key => Some(Ok(row)),
            Ok(_) => {
                *self.carry = Some(row);
                self.done = true;
                None
            }
        }
    }
}
