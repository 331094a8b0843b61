use std::cmp::Ordering;
use std::mem;

use crate::error::{FlowError, Result};
use crate::row::{Key, Row, key_of};
use crate::types::RowStream;

/// How a [Joiner] treats keys present on only one side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Outer,
    Left,
    Right,
}

/// Join strategy plus the suffixes appended to colliding field names.
/// Fields present on both sides split into `<name><left_suffix>` and
/// `<name><right_suffix>`, except the join-key fields, which stay
/// unsuffixed and carry the left value.
#[derive(Clone, Debug)]
pub struct Joiner {
    kind: JoinKind,
    left_suffix: String,
    right_suffix: String,
}

impl Joiner {
    pub fn inner() -> Joiner {
        Joiner::of(JoinKind::Inner)
    }

    pub fn outer() -> Joiner {
        Joiner::of(JoinKind::Outer)
    }

    pub fn left() -> Joiner {
        Joiner::of(JoinKind::Left)
    }

    pub fn right() -> Joiner {
        Joiner::of(JoinKind::Right)
    }

    fn of(kind: JoinKind) -> Joiner {
        Joiner {
            kind,
            left_suffix: "_1".to_string(),
            right_suffix: "_2".to_string(),
        }
    }

    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Joiner {
        self.left_suffix = left.into();
        self.right_suffix = right.into();
        self
    }

    fn keeps_left(&self) -> bool {
        matches!(self.kind, JoinKind::Outer | JoinKind::Left)
    }

    fn keeps_right(&self) -> bool {
        matches!(self.kind, JoinKind::Outer | JoinKind::Right)
    }
}

/// One side of the join: a sorted stream with one row of lookahead,
/// grouped on the fly.  Enforces the sorted contract: any key
/// regression fails the join fast.
struct Cursor {
    stream: RowStream,
    keys: Vec<String>,
    lookahead: Option<(Key, Row)>,
    last: Option<Key>,
    exhausted: bool,
}

impl Cursor {
    fn new(stream: RowStream, keys: Vec<String>) -> Cursor {
        Cursor {
            stream,
            keys,
            lookahead: None,
            last: None,
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.lookahead.is_some() || self.exhausted {
            return Ok(());
        }
        match self.stream.next() {
            None => self.exhausted = true,
            Some(row) => {
                let row = row?;
                let key = key_of(&row, &self.keys)?;
                if let Some(last) = &self.last {
                    if key < *last {
                        return Err(FlowError::Ordering {
                            prev: last.to_string(),
                            next: key.to_string(),
                        });
                    }
                }
                self.last = Some(key.clone());
                self.lookahead = Some((key, row));
            }
        }
        Ok(())
    }

    /// Key of the next pending group, if any.
    fn peek_key(&mut self) -> Result<Option<Key>> {
        self.fill()?;
        Ok(self.lookahead.as_ref().map(|(key, _)| key.clone()))
    }

    /// Next row of the group under `key`, or None once the group ends.
    fn next_in(&mut self, key: &Key) -> Result<Option<Row>> {
        self.fill()?;
        if matches!(&self.lookahead, Some((k, _)) if k == key) {
            Ok(self.lookahead.take().map(|(_, row)| row))
        } else {
            Ok(None)
        }
    }

    fn take_group(&mut self, key: &Key) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_in(key)? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn skip_group(&mut self, key: &Key) -> Result<()> {
        while self.next_in(key)?.is_some() {}
        Ok(())
    }
}

enum Phase {
    /// Compare the pending group keys and pick the next move.
    Compare,
    /// Pass the current left-only group through unchanged.
    PassLeft(Key),
    /// Pass the current right-only group through unchanged.
    PassRight(Key),
    /// Cross product for one matched key: the left group is buffered,
    /// the right group streams one row at a time.
    Cross {
        key: Key,
        left: Vec<Row>,
        right_row: Option<Row>,
        index: usize,
    },
    Finished,
}

/// Co-grouped sort-merge join of two streams sorted by the same key
/// tuple.  Output order follows the merge walk over keys.  Memory is
/// bounded by one left group.  Used by [join](crate::Graph::join).
pub struct JoinStream {
    left: Cursor,
    right: Cursor,
    joiner: Joiner,
    keys: Vec<String>,
    phase: Phase,
}

impl JoinStream {
    pub fn new(left: RowStream, right: RowStream, joiner: Joiner, keys: Vec<String>) -> JoinStream {
        JoinStream {
            left: Cursor::new(left, keys.clone()),
            right: Cursor::new(right, keys.clone()),
            joiner,
            keys,
            phase: Phase::Compare,
        }
    }

    fn step(&mut self) -> Result<Option<Row>> {
        loop {
            if let Phase::Cross {
                left,
                right_row: Some(current),
                index,
                ..
            } = &mut self.phase
            {
                if *index < left.len() {
                    let merged = merge_rows(
                        &left[*index],
                        current,
                        &self.keys,
                        &self.joiner.left_suffix,
                        &self.joiner.right_suffix,
                    );
                    *index += 1;
                    return Ok(Some(merged));
                }
            }
            match mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return Ok(None),
                Phase::PassLeft(key) => {
                    if let Some(row) = self.left.next_in(&key)? {
                        self.phase = Phase::PassLeft(key);
                        return Ok(Some(row));
                    }
                    self.phase = Phase::Compare;
                }
                Phase::PassRight(key) => {
                    if let Some(row) = self.right.next_in(&key)? {
                        self.phase = Phase::PassRight(key);
                        return Ok(Some(row));
                    }
                    self.phase = Phase::Compare;
                }
                Phase::Cross { key, left, .. } => match self.right.next_in(&key)? {
                    Some(row) => {
                        self.phase = Phase::Cross {
                            key,
                            left,
                            right_row: Some(row),
                            index: 0,
                        };
                    }
                    None => self.phase = Phase::Compare,
                },
                Phase::Compare => {
                    let left_key = self.left.peek_key()?;
                    let right_key = self.right.peek_key()?;
                    self.phase = match (left_key, right_key) {
                        (None, None) => Phase::Finished,
                        (Some(key), None) => self.left_only(key)?,
                        (None, Some(key)) => self.right_only(key)?,
                        (Some(lk), Some(rk)) => match lk.cmp(&rk) {
                            Ordering::Less => self.left_only(lk)?,
                            Ordering::Greater => self.right_only(rk)?,
                            Ordering::Equal => {
                                let left = self.left.take_group(&lk)?;
                                if left.is_empty() {
                                    return Err(FlowError::EmptyJoin);
                                }
                                Phase::Cross {
                                    key: lk,
                                    left,
                                    right_row: None,
                                    index: 0,
                                }
                            }
                        },
                    };
                }
            }
        }
    }

    fn left_only(&mut self, key: Key) -> Result<Phase> {
        if self.joiner.keeps_left() {
            Ok(Phase::PassLeft(key))
        } else {
            self.left.skip_group(&key)?;
            Ok(Phase::Compare)
        }
    }

    fn right_only(&mut self, key: Key) -> Result<Phase> {
        if self.joiner.keeps_right() {
            Ok(Phase::PassRight(key))
        } else {
            self.right.skip_group(&key)?;
            Ok(Phase::Compare)
        }
    }
}

impl Iterator for JoinStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => {
                self.phase = Phase::Finished;
                Some(Err(e))
            }
        }
    }
}

/// Merge one left and one right row of a matched key.  One-sided
/// fields pass through; shared non-key fields split into the two
/// suffixed fields; key fields keep the (equal) left value.
fn merge_rows(
    left: &Row,
    right: &Row,
    keys: &[String],
    left_suffix: &str,
    right_suffix: &str,
) -> Row {
    let mut merged = Row::new();
    for (name, value) in left.iter() {
        if right.contains(name) && !keys.contains(name) {
            merged.set(format!("{name}{left_suffix}"), value.clone());
            merged.set(
                format!("{name}{right_suffix}"),
                right.get(name).cloned().unwrap(),
            );
        } else {
            merged.set(name.clone(), value.clone());
        }
    }
    for (name, value) in right.iter() {
        if !left.contains(name) {
            merged.set(name.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {

    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        Row::try_from(value).unwrap()
    }

    fn stream(rows: Vec<Row>) -> RowStream {
        Box::new(rows.into_iter().map(Ok))
    }

    fn join(joiner: Joiner, left: Vec<Row>, right: Vec<Row>, keys: &[&str]) -> Vec<Row> {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        JoinStream::new(stream(left), stream(right), joiner, keys)
            .collect::<Result<Vec<Row>>>()
            .unwrap()
    }

    fn players() -> Vec<Row> {
        vec![
            row(json!({"player_id": 0, "username": "root"})),
            row(json!({"player_id": 1, "username": "XeroX"})),
            row(json!({"player_id": 2, "username": "jay"})),
        ]
    }

    #[test]
    fn inner_join_matches_by_key() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 3, "player_id": 1, "score": 22})),
            row(json!({"game_id": 1, "player_id": 3, "score": 99})),
        ];
        let users = vec![
            row(json!({"player_id": 1, "username": "XeroX"})),
            row(json!({"player_id": 2, "username": "jay"})),
            row(json!({"player_id": 3, "username": "Destroyer"})),
        ];
        let mut result = join(Joiner::inner(), games, users, &["player_id"]);
        result.sort_by_key(|r| r.int_field("game_id").unwrap());
        let expected = vec![
            row(json!({"game_id": 1, "player_id": 3, "score": 99, "username": "Destroyer"})),
            row(json!({"game_id": 2, "player_id": 1, "score": 17, "username": "XeroX"})),
            row(json!({"game_id": 3, "player_id": 1, "score": 22, "username": "XeroX"})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn inner_join_drops_unmatched_keys() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22})),
            row(json!({"game_id": 1, "player_id": 3, "score": 9999999})),
        ];
        let result = join(Joiner::inner(), games, players(), &["player_id"]);
        let expected = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17, "username": "XeroX"})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22, "username": "jay"})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn outer_join_passes_lonely_groups_through() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22})),
            row(json!({"game_id": 1, "player_id": 3, "score": 9999999})),
        ];
        let result = join(Joiner::outer(), games, players(), &["player_id"]);
        // key order: the playerless p0 row, merged p1 and p2, the unknown p3 game
        let expected = vec![
            row(json!({"player_id": 0, "username": "root"})),
            row(json!({"game_id": 2, "player_id": 1, "score": 17, "username": "XeroX"})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22, "username": "jay"})),
            row(json!({"game_id": 1, "player_id": 3, "score": 9999999})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22})),
            row(json!({"game_id": 4, "player_id": 2, "score": 41})),
            row(json!({"game_id": 1, "player_id": 3, "score": 0})),
        ];
        let result = join(Joiner::left(), games, players(), &["player_id"]);
        let expected = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17, "username": "XeroX"})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22, "username": "jay"})),
            row(json!({"game_id": 4, "player_id": 2, "score": 41, "username": "jay"})),
            row(json!({"game_id": 1, "player_id": 3, "score": 0})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn right_join_keeps_unmatched_right_rows() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 5, "player_id": 1, "score": 34})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22})),
            row(json!({"game_id": 4, "player_id": 2, "score": 41})),
            row(json!({"game_id": 1, "player_id": 3, "score": 0})),
        ];
        let result = join(Joiner::right(), games, players(), &["player_id"]);
        let expected = vec![
            row(json!({"player_id": 0, "username": "root"})),
            row(json!({"game_id": 2, "player_id": 1, "score": 17, "username": "XeroX"})),
            row(json!({"game_id": 5, "player_id": 1, "score": 34, "username": "XeroX"})),
            row(json!({"game_id": 3, "player_id": 2, "score": 22, "username": "jay"})),
            row(json!({"game_id": 4, "player_id": 2, "score": 41, "username": "jay"})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn colliding_fields_split_into_suffixed_pairs() {
        let games = vec![
            row(json!({"game_id": 2, "player_id": 1, "score": 17})),
            row(json!({"game_id": 3, "player_id": 1, "score": 22})),
            row(json!({"game_id": 1, "player_id": 3, "score": 99})),
        ];
        let maxes = vec![
            row(json!({"player_id": 1, "username": "XeroX", "score": 400})),
            row(json!({"player_id": 2, "username": "jay", "score": 451})),
            row(json!({"player_id": 3, "username": "Destroyer", "score": 999})),
        ];
        let joiner = Joiner::inner().with_suffixes("_game", "_max");
        let mut result = join(joiner, games, maxes, &["player_id"]);
        result.sort_by_key(|r| r.int_field("game_id").unwrap());
        let expected = vec![
            row(json!({
                "game_id": 1, "player_id": 3, "score_game": 99,
                "score_max": 999, "username": "Destroyer"
            })),
            row(json!({
                "game_id": 2, "player_id": 1, "score_game": 17,
                "score_max": 400, "username": "XeroX"
            })),
            row(json!({
                "game_id": 3, "player_id": 1, "score_game": 22,
                "score_max": 400, "username": "XeroX"
            })),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn cross_product_multiplies_group_sizes() {
        let left = vec![
            row(json!({"k": 1, "a": 1})),
            row(json!({"k": 1, "a": 2})),
        ];
        let right = vec![
            row(json!({"k": 1, "b": 10})),
            row(json!({"k": 1, "b": 20})),
            row(json!({"k": 1, "b": 30})),
        ];
        let result = join(Joiner::inner(), left, right, &["k"]);
        assert_eq!(result.len(), 6);
        // right side is the outer loop of the cross product
        assert_eq!(result[0], row(json!({"k": 1, "a": 1, "b": 10})));
        assert_eq!(result[1], row(json!({"k": 1, "a": 2, "b": 10})));
        assert_eq!(result[2], row(json!({"k": 1, "a": 1, "b": 20})));
    }

    #[test]
    fn inner_join_is_symmetric_modulo_suffixes() {
        let left = vec![
            row(json!({"k": 1, "v": 1})),
            row(json!({"k": 2, "v": 2})),
        ];
        let right = vec![
            row(json!({"k": 1, "v": 10})),
            row(json!({"k": 3, "v": 30})),
        ];
        let forward = join(
            Joiner::inner().with_suffixes("_l", "_r"),
            left.clone(),
            right.clone(),
            &["k"],
        );
        let backward = join(
            Joiner::inner().with_suffixes("_r", "_l"),
            right,
            left,
            &["k"],
        );
        assert_eq!(forward, backward);
    }

    #[test]
    fn self_join_on_a_unique_key_is_identity() {
        let rows = vec![
            row(json!({"k": 1, "v": "a"})),
            row(json!({"k": 2, "v": "b"})),
            row(json!({"k": 3, "v": "c"})),
        ];
        let result = join(Joiner::inner(), rows.clone(), rows.clone(), &["k"]);
        let stripped: Vec<Row> = result
            .into_iter()
            .map(|r| {
                let mut out = Row::new();
                out.set("k", r.get("k").unwrap().clone());
                out.set("v", r.get("v_1").unwrap().clone());
                out
            })
            .collect();
        assert_eq!(stripped, rows);
    }

    #[test]
    fn key_regression_fails_fast() {
        let left = vec![
            row(json!({"k": 2, "v": 1})),
            row(json!({"k": 1, "v": 2})),
        ];
        let right = vec![row(json!({"k": 1, "w": 1}))];
        let keys = vec!["k".to_string()];
        let mut joined = JoinStream::new(stream(left), stream(right), Joiner::inner(), keys);
        let mut saw_error = false;
        for item in &mut joined {
            if let Err(e) = item {
                assert!(matches!(e, FlowError::Ordering { .. }));
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn empty_sides_join_to_nothing() {
        let result = join(Joiner::outer(), vec![], vec![], &["k"]);
        assert!(result.is_empty());
    }
}
