use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{FlowError, Result};
use crate::operators::{JoinStream, Joiner, MapStream, ReduceStream, SortStream};
use crate::types::{Mapper, Reducer, RowStream, Rows};

/// The named input sources a graph executes against: a mapping from
/// source name to a nullary factory returning a fresh row stream.
///
/// Factories for restartable sources should close over whatever they
/// need to restart (a path, a `Vec` of rows).  A raw single-use stream
/// can be registered too, with the documented caveat that only the
/// first execution sees its rows.
#[derive(Default)]
pub struct Sources {
    factories: HashMap<String, Box<dyn FnMut() -> RowStream>>,
}

impl Sources {
    pub fn new() -> Sources {
        Sources::default()
    }

    /// Register a factory that is invoked once per execution of every
    /// graph node reading this source.
    pub fn factory(
        mut self,
        name: impl Into<String>,
        factory: impl FnMut() -> RowStream + 'static,
    ) -> Sources {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Register rows that are cloned afresh for every execution.
    pub fn rows(self, name: impl Into<String>, rows: Rows) -> Sources {
        self.factory(name, move || {
            Box::new(rows.clone().into_iter().map(Ok)) as RowStream
        })
    }

    /// Register a single-use stream.  The first execution consumes it;
    /// any later execution silently sees an exhausted source, exactly
    /// like re-running a graph over a spent file iterator.  Wrap the
    /// construction in [Sources::factory] when re-execution matters.
    pub fn stream(self, name: impl Into<String>, stream: RowStream) -> Sources {
        let mut slot = Some(stream);
        self.factory(name, move || {
            slot.take()
                .unwrap_or_else(|| Box::new(std::iter::empty()) as RowStream)
        })
    }

    fn open(&mut self, name: &str) -> Result<RowStream> {
        match self.factories.get_mut(name) {
            Some(factory) => Ok(factory()),
            None => Err(FlowError::UnknownSource(name.to_string())),
        }
    }
}

enum GraphNode {
    Source(String),
    Map {
        upstream: Graph,
        mapper: Rc<dyn Mapper>,
    },
    Reduce {
        upstream: Graph,
        reducer: Rc<dyn Reducer>,
        keys: Vec<String>,
    },
    Sort {
        upstream: Graph,
        keys: Vec<String>,
    },
    Join {
        left: Graph,
        right: Graph,
        joiner: Joiner,
        keys: Vec<String>,
    },
}

/// A lazy, reusable description of a pipeline: an execution tree of
/// stages over named sources.  Graphs are cheap handles; combinators
/// return new graphs wrapping their upstream, and `join` composes two
/// graphs into a DAG.  Nothing runs and nothing is allocated until
/// [run](Graph::run) or [run_iter](Graph::run_iter) materialises the
/// tree into a stream of iterator adapters.  On every execution each
/// source a graph mentions is opened afresh through its factory.
#[derive(Clone)]
pub struct Graph {
    node: Rc<GraphNode>,
}

impl Graph {
    fn wrap(node: GraphNode) -> Graph {
        Graph {
            node: Rc::new(node),
        }
    }

    /// A graph reading the named input source.
    pub fn from_source(name: impl Into<String>) -> Graph {
        Graph::wrap(GraphNode::Source(name.into()))
    }

    /// Extend with a [Map](MapStream) stage.
    pub fn map(&self, mapper: impl Mapper + 'static) -> Graph {
        Graph::wrap(GraphNode::Map {
            upstream: self.clone(),
            mapper: Rc::new(mapper),
        })
    }

    /// Extend with a [Reduce](ReduceStream) stage grouping by `keys`.
    /// The upstream must be grouped: equal key tuples contiguous.
    pub fn reduce(&self, reducer: impl Reducer + 'static, keys: &[&str]) -> Graph {
        Graph::wrap(GraphNode::Reduce {
            upstream: self.clone(),
            reducer: Rc::new(reducer),
            keys: owned(keys),
        })
    }

    /// Extend with an external [Sort](SortStream) stage by `keys`.
    pub fn sort(&self, keys: &[&str]) -> Graph {
        Graph::wrap(GraphNode::Sort {
            upstream: self.clone(),
            keys: owned(keys),
        })
    }

    /// Join this graph (the left side) with `other` (the right side).
    /// Both must produce streams sorted by `keys`.
    pub fn join(&self, joiner: Joiner, other: &Graph, keys: &[&str]) -> Graph {
        Graph::wrap(GraphNode::Join {
            left: self.clone(),
            right: other.clone(),
            joiner,
            keys: owned(keys),
        })
    }

    /// Execute against `sources` and materialise every row.
    pub fn run(&self, sources: &mut Sources) -> Result<Rows> {
        let rows = self.run_iter(sources)?.collect::<Result<Rows>>()?;
        debug!("graph run materialised {} rows", rows.len());
        Ok(rows)
    }

    /// Execute against `sources`, returning the lazy output stream.
    pub fn run_iter(&self, sources: &mut Sources) -> Result<RowStream> {
        self.produce(sources)
    }

    fn produce(&self, sources: &mut Sources) -> Result<RowStream> {
        match &*self.node {
            GraphNode::Source(name) => sources.open(name),
            GraphNode::Map { upstream, mapper } => Ok(Box::new(MapStream::new(
                upstream.produce(sources)?,
                mapper.clone(),
            ))),
            GraphNode::Reduce {
                upstream,
                reducer,
                keys,
            } => Ok(Box::new(ReduceStream::new(
                upstream.produce(sources)?,
                reducer.clone(),
                keys.clone(),
            ))),
            GraphNode::Sort { upstream, keys } => Ok(Box::new(SortStream::new(
                upstream.produce(sources)?,
                keys.clone(),
            ))),
            GraphNode::Join {
                left,
                right,
                joiner,
                keys,
            } => {
                let left = left.produce(sources)?;
                let right = right.produce(sources)?;
                Ok(Box::new(JoinStream::new(
                    left,
                    right,
                    joiner.clone(),
                    keys.clone(),
                )))
            }
        }
    }
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::mappers::{FilterPunctuation, LowerCase, Split};
    use crate::reducers::Count;
    use crate::row::Row;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        Row::try_from(value).unwrap()
    }

    fn docs() -> Rows {
        vec![
            row(json!({"doc_id": 1, "text": "hello, my little WORLD"})),
            row(json!({"doc_id": 2, "text": "Hello, my little little hell"})),
        ]
    }

    fn split_words(source: &str) -> Graph {
        Graph::from_source(source)
            .map(FilterPunctuation::new("text"))
            .map(LowerCase::new("text"))
            .map(Split::new("text"))
    }

    #[test]
    fn map_pipeline() {
        let graph = split_words("docs");
        let result = graph
            .run(&mut Sources::new().rows("docs", docs()))
            .unwrap();
        let expected = vec![
            row(json!({"doc_id": 1, "text": "hello"})),
            row(json!({"doc_id": 1, "text": "my"})),
            row(json!({"doc_id": 1, "text": "little"})),
            row(json!({"doc_id": 1, "text": "world"})),
            row(json!({"doc_id": 2, "text": "hello"})),
            row(json!({"doc_id": 2, "text": "my"})),
            row(json!({"doc_id": 2, "text": "little"})),
            row(json!({"doc_id": 2, "text": "little"})),
            row(json!({"doc_id": 2, "text": "hell"})),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn sort_then_count() {
        let graph = split_words("docs")
            .sort(&["text"])
            .reduce(Count::new("count"), &["text"]);
        let result = graph
            .run(&mut Sources::new().rows("docs", docs()))
            .unwrap();
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
    fn graphs_are_reusable_across_executions() {
        let graph = split_words("docs").sort(&["text"]);
        let mut sources = Sources::new().rows("docs", docs());
        let first = graph.run(&mut sources).unwrap();
        let second = graph.run(&mut sources).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
    }

    #[test]
    fn single_use_streams_are_spent_after_one_run() {
        let graph = Graph::from_source("docs");
        let stream: RowStream = Box::new(docs().into_iter().map(Ok));
        let mut sources = Sources::new().stream("docs", stream);
        assert_eq!(graph.run(&mut sources).unwrap().len(), 2);
        assert!(graph.run(&mut sources).unwrap().is_empty());
    }

    #[test]
    fn unknown_source_is_an_error() {
        let graph = Graph::from_source("nope");
        let err = graph.run(&mut Sources::new()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownSource(_)));
    }

    #[test]
    fn run_iter_is_lazy_per_row() {
        let graph = split_words("docs");
        let mut sources = Sources::new().rows("docs", docs());
        let mut stream = graph.run_iter(&mut sources).unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.str_field("text").unwrap(), "hello");
        drop(stream);
    }
}
