use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::row::{Key, Row, key_of};
use crate::types::{GroupRows, Reducer, Rows};

/// Emits the n rows of each group with the largest value in one
/// column, largest first.  Keeps a bounded heap, so memory is O(n)
/// regardless of group size.  Tie order is unspecified.
pub struct TopN {
    column: String,
    n: usize,
}

impl TopN {
    pub fn new(column: impl Into<String>, n: usize) -> TopN {
        TopN {
            column: column.into(),
            n,
        }
    }
}

struct Ranked {
    key: Key,
    seq: usize,
    row: Row,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Ranked) -> Ordering {
        self.key.cmp(&other.key).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Ranked) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Ranked) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Reducer for TopN {
    fn apply(&self, _keys: &[String], group: &mut GroupRows<'_>, out: &mut Rows) -> Result<()> {
        let column = std::slice::from_ref(&self.column);
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(self.n + 1);
        let mut seq = 0;
        while let Some(row) = group.next().transpose()? {
            let key = key_of(&row, column)?;
            heap.push(Reverse(Ranked { key, seq, row }));
            if heap.len() > self.n {
                heap.pop();
            }
            seq += 1;
        }
        for Reverse(ranked) in heap.into_sorted_vec() {
            out.push(ranked.row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::operators::ReduceStream;
    use crate::types::RowStream;
    use serde_json::json;
    use std::rc::Rc;

    fn row(value: serde_json::Value) -> Row {
        Row::try_from(value).unwrap()
    }

    fn reduce(rows: Vec<Row>, reducer: Rc<dyn Reducer>, keys: &[&str]) -> Rows {
        let stream: RowStream = Box::new(rows.into_iter().map(Ok));
        let keys = keys.iter().map(|k| k.to_string()).collect();
        ReduceStream::new(stream, reducer, keys)
            .collect::<Result<Rows>>()
            .unwrap()
    }

    #[test]
    fn keeps_the_top_three_per_group() {
        let matches = vec![
            row(json!({"match_id": 1, "player_id": 1, "rank": 42})),
            row(json!({"match_id": 1, "player_id": 2, "rank": 7})),
            row(json!({"match_id": 1, "player_id": 3, "rank": 0})),
            row(json!({"match_id": 1, "player_id": 4, "rank": 39})),
            row(json!({"match_id": 2, "player_id": 5, "rank": 15})),
            row(json!({"match_id": 2, "player_id": 6, "rank": 39})),
            row(json!({"match_id": 2, "player_id": 7, "rank": 27})),
            row(json!({"match_id": 2, "player_id": 8, "rank": 7})),
        ];
        let mut result = reduce(matches, Rc::new(TopN::new("rank", 3)), &["match_id"]);
        result.sort_by_key(|r| {
            (
                r.int_field("match_id").unwrap(),
                r.int_field("player_id").unwrap(),
            )
        });
        let expected = vec![
            row(json!({"match_id": 1, "player_id": 1, "rank": 42})),
            row(json!({"match_id": 1, "player_id": 2, "rank": 7})),
            row(json!({"match_id": 1, "player_id": 4, "rank": 39})),
            row(json!({"match_id": 2, "player_id": 5, "rank": 15})),
            row(json!({"match_id": 2, "player_id": 6, "rank": 39})),
            row(json!({"match_id": 2, "player_id": 7, "rank": 27})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn emits_largest_first() {
        let rows = vec![
            row(json!({"k": 1, "rank": 2})),
            row(json!({"k": 1, "rank": 9})),
            row(json!({"k": 1, "rank": 5})),
        ];
        let result = reduce(rows, Rc::new(TopN::new("rank", 2)), &["k"]);
        let ranks: Vec<i64> = result.iter().map(|r| r.int_field("rank").unwrap()).collect();
        assert_eq!(ranks, [9, 5]);
    }

    #[test]
    fn missing_rank_column_is_an_error() {
        let rows = vec![row(json!({"k": 1}))];
        let stream: RowStream = Box::new(rows.into_iter().map(Ok));
        let mut reduced = ReduceStream::new(
            stream,
            Rc::new(TopN::new("rank", 2)),
            vec!["k".to_string()],
        );
        assert!(reduced.next().unwrap().is_err());
    }
}
