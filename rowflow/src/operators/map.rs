use derive_new::new;

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::Result;
use crate::row::Row;
use crate::types::{Mapper, RowStream, Rows};

/// Applies a [Mapper] to every upstream row, flattening its output in
/// input order.  Rows produced from one input row stay contiguous.
/// Used by [map](crate::Graph::map).
#[derive(new)]
pub struct MapStream {
    upstream: RowStream,
    mapper: Rc<dyn Mapper>,
    #[new(default)]
    pending: VecDeque<Row>,
    #[new(default)]
    scratch: Rows,
    #[new(default)]
    done: bool,
}

impl Iterator for MapStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.upstream.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(row)) => {
                    if let Err(e) = self.mapper.apply(row, &mut self.scratch) {
                        self.done = true;
                        self.scratch.clear();
                        return Some(Err(e));
                    }
                    self.pending.extend(self.scratch.drain(..));
                }
            }
        }
    }
}
