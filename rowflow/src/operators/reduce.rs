use derive_new::new;

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::Result;
use crate::row::{Row, key_of};
use crate::types::{GroupRows, Reducer, RowStream, Rows};

/// Invokes a [Reducer] once per maximal run of consecutive rows with
/// equal key tuples.  The input must be grouped by the key tuple:
/// equal keys contiguous, which is weaker than fully sorted.  Groups
/// come out in input order, rows within a group in the reducer's yield
/// order.  Used by [reduce](crate::Graph::reduce).
///
/// An empty key tuple makes the whole stream one group.
#[derive(new)]
pub struct ReduceStream {
    upstream: RowStream,
    reducer: Rc<dyn Reducer>,
    keys: Vec<String>,
    #[new(default)]
    carry: Option<Row>,
    #[new(default)]
    pending: VecDeque<Row>,
    #[new(default)]
    scratch: Rows,
    #[new(default)]
    done: bool,
}

impl Iterator for ReduceStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            let first = match self.carry.take() {
                Some(row) => row,
                None => match self.upstream.next() {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(Err(e)) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    Some(Ok(row)) => row,
                },
            };
            let key = match key_of(&first, &self.keys) {
                Ok(key) => key,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let mut group =
                GroupRows::new(&key, &self.keys, first, &mut self.upstream, &mut self.carry);
            let outcome = self
                .reducer
                .apply(&self.keys, &mut group, &mut self.scratch)
                .and_then(|()| group.finish());
            if let Err(e) = outcome {
                self.done = true;
                self.scratch.clear();
                return Some(Err(e));
            }
            self.pending.extend(self.scratch.drain(..));
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::reducers::{Count, FirstReducer};
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        Row::try_from(value).unwrap()
    }

    fn stream(rows: Vec<Row>) -> RowStream {
        Box::new(rows.into_iter().map(Ok))
    }

    fn reduce(rows: Vec<Row>, reducer: Rc<dyn Reducer>, keys: &[&str]) -> Rows {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        ReduceStream::new(stream(rows), reducer, keys)
            .collect::<Result<Rows>>()
            .unwrap()
    }

    #[test]
    fn first_reducer_keeps_one_row_per_group() {
        let rows = vec![
            row(json!({"test_id": 1, "text": "hello, world"})),
            row(json!({"test_id": 2, "text": "bye!"})),
        ];
        let result = reduce(rows.clone(), Rc::new(FirstReducer), &["test_id"]);
        assert_eq!(result, rows);
    }

    #[test]
    fn counts_consecutive_groups() {
        let rows = vec![
            row(json!({"doc_id": 2, "text": "hell"})),
            row(json!({"doc_id": 1, "text": "hello"})),
            row(json!({"doc_id": 2, "text": "hello"})),
            row(json!({"doc_id": 1, "text": "little"})),
            row(json!({"doc_id": 2, "text": "little"})),
            row(json!({"doc_id": 2, "text": "little"})),
            row(json!({"doc_id": 1, "text": "my"})),
            row(json!({"doc_id": 2, "text": "my"})),
            row(json!({"doc_id": 1, "text": "world"})),
        ];
        let result = reduce(rows, Rc::new(Count::new("count")), &["text"]);
        let expected = vec![
            row(json!({"text": "hell", "count": 1})),
            row(json!({"text": "hello", "count": 2})),
            row(json!({"text": "little", "count": 3})),
            row(json!({"text": "my", "count": 2})),
            row(json!({"text": "world", "count": 1})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn grouped_but_unsorted_input_is_accepted() {
        // grouping is the contract, not full sort order
        let rows = vec![
            row(json!({"k": "b"})),
            row(json!({"k": "b"})),
            row(json!({"k": "a"})),
            row(json!({"k": "c"})),
        ];
        let result = reduce(rows, Rc::new(Count::new("n")), &["k"]);
        let expected = vec![
            row(json!({"k": "b", "n": 2})),
            row(json!({"k": "a", "n": 1})),
            row(json!({"k": "c", "n": 1})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn empty_key_tuple_groups_the_whole_stream() {
        let rows = vec![
            row(json!({"a": 1})),
            row(json!({"b": 2})),
            row(json!({"c": 3})),
        ];
        let result = reduce(rows, Rc::new(Count::new("n")), &[]);
        assert_eq!(result, vec![row(json!({"n": 3}))]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let result = reduce(vec![], Rc::new(Count::new("n")), &["k"]);
        assert!(result.is_empty());
    }

    #[test]
    fn missing_key_field_fails_the_stream() {
        let rows = vec![row(json!({"other": 1}))];
        let keys = vec!["k".to_string()];
        let mut reduced = ReduceStream::new(stream(rows), Rc::new(Count::new("n")), keys);
        assert!(reduced.next().unwrap().is_err());
        assert!(reduced.next().is_none());
    }
}
