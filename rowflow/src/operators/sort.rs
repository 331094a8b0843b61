use priority_queue::PriorityQueue;
use tempfile::TempDir;

use std::cmp::Reverse;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use crate::error::{FlowError, Result};
use crate::row::{Key, Row, ValueKind, key_of};
use crate::types::RowStream;

/// Number of rows held in memory per sorted run unless overridden.
pub const DEFAULT_RUN_CAPACITY: usize = 100_000;

/// External merge sort: sorts its upstream lexicographically by a key
/// tuple, ascending, stable for equal keys.  Reads bounded runs into
/// memory, spills each sorted run to a temporary file and merges the
/// runs back with a priority queue keyed by (key tuple, run id); the
/// run id keeps the merge stable.  An input that fits in one run never
/// touches disk.  Spill files live in a per invocation temp directory
/// that is removed when the stream is dropped, so abandoning or
/// failing a sort cleans up as well.  Used by [sort](crate::Graph::sort).
pub struct SortStream {
    keys: Vec<String>,
    run_capacity: usize,
    state: State,
}

enum State {
    Pending(RowStream),
    Draining(std::vec::IntoIter<Row>),
    Merging(Merger),
    Finished,
}

impl SortStream {
    pub fn new(upstream: RowStream, keys: Vec<String>) -> SortStream {
        SortStream::with_run_capacity(upstream, keys, DEFAULT_RUN_CAPACITY)
    }

    pub fn with_run_capacity(
        upstream: RowStream,
        keys: Vec<String>,
        run_capacity: usize,
    ) -> SortStream {
        SortStream {
            keys,
            run_capacity: run_capacity.max(1),
            state: State::Pending(upstream),
        }
    }

    /// Consume the whole upstream into sorted runs.  All reading work
    /// happens here, on the first pull.
    fn prepare(&self, mut upstream: RowStream) -> Result<State> {
        let mut kinds: Vec<Option<ValueKind>> = vec![None; self.keys.len()];
        let mut run: Vec<(Key, Row)> = Vec::new();
        let mut spiller: Option<Spiller> = None;
        loop {
            let mut ended = false;
            while run.len() < self.run_capacity {
                match upstream.next() {
                    None => {
                        ended = true;
                        break;
                    }
                    Some(row) => {
                        let row = row?;
                        let key = self.checked_key(&row, &mut kinds)?;
                        run.push((key, row));
                    }
                }
            }
            run.sort_by(|a, b| a.0.cmp(&b.0));
            if ended && spiller.is_none() {
                debug!("sorted {} rows in memory", run.len());
                let rows: Vec<Row> = run.into_iter().map(|(_, row)| row).collect();
                return Ok(State::Draining(rows.into_iter()));
            }
            if spiller.is_none() {
                spiller = Some(Spiller::create()?);
            }
            if !run.is_empty() {
                spiller.as_mut().unwrap().write_run(&run)?;
                run.clear();
            }
            if ended {
                let spiller = spiller.take().unwrap();
                debug!("merging {} spilled runs", spiller.paths.len());
                return Ok(State::Merging(Merger::open(spiller, self.keys.clone())?));
            }
        }
    }

    /// Extract the sort key, pinning the kind of every key field to the
    /// kind first seen there.  Mixed kinds under one field are an
    /// error; ints and floats mix freely.
    fn checked_key(&self, row: &Row, kinds: &mut [Option<ValueKind>]) -> Result<Key> {
        let key = key_of(row, &self.keys)?;
        for (slot, (value, field)) in kinds
            .iter_mut()
            .zip(key.values().iter().zip(self.keys.iter()))
        {
            let kind = value.kind();
            match slot {
                None => *slot = Some(kind),
                Some(seen) if seen.accepts(kind) => {}
                Some(seen) => {
                    return Err(FlowError::FieldKind {
                        field: field.clone(),
                        expected: *seen,
                        found: kind,
                    });
                }
            }
        }
        Ok(key)
    }
}

impl Iterator for SortStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending(_) = self.state {
            let State::Pending(upstream) = std::mem::replace(&mut self.state, State::Finished)
            else {
                unreachable!()
            };
            match self.prepare(upstream) {
                Ok(state) => self.state = state,
                Err(e) => return Some(Err(e)),
            }
        }
        match &mut self.state {
            State::Finished => None,
            State::Pending(_) => unreachable!(),
            State::Draining(rows) => match rows.next() {
                Some(row) => Some(Ok(row)),
                None => {
                    self.state = State::Finished;
                    None
                }
            },
            State::Merging(merger) => match merger.next_row() {
                Ok(Some(row)) => Some(Ok(row)),
                Ok(None) => {
                    self.state = State::Finished;
                    None
                }
                Err(e) => {
                    self.state = State::Finished;
                    Some(Err(e))
                }
            },
        }
    }
}

/// Writes sorted runs as length prefixed JSON records, one file per
/// run, under a unique temporary directory.
struct Spiller {
    dir: TempDir,
    paths: Vec<PathBuf>,
}

impl Spiller {
    fn create() -> Result<Spiller> {
        let dir = tempfile::Builder::new()
            .prefix("rowflow-sort-")
            .tempdir()
            .map_err(FlowError::Spill)?;
        Ok(Spiller {
            dir,
            paths: Vec::new(),
        })
    }

    fn write_run(&mut self, run: &[(Key, Row)]) -> Result<()> {
        let path = self.dir.path().join(format!("run-{}.spill", self.paths.len()));
        let mut out = BufWriter::new(File::create(&path).map_err(FlowError::Spill)?);
        for (_, row) in run {
            let bytes = serde_json::to_vec(row).map_err(FlowError::SpillCodec)?;
            out.write_all(&(bytes.len() as u32).to_le_bytes())
                .map_err(FlowError::Spill)?;
            out.write_all(&bytes).map_err(FlowError::Spill)?;
        }
        out.flush().map_err(FlowError::Spill)?;
        debug!("spilled run of {} rows to {:?}", run.len(), path);
        self.paths.push(path);
        Ok(())
    }
}

struct RunReader {
    reader: BufReader<File>,
    path: PathBuf,
}

impl RunReader {
    fn open(path: PathBuf) -> Result<RunReader> {
        let file = File::open(&path).map_err(FlowError::Spill)?;
        Ok(RunReader {
            reader: BufReader::new(file),
            path,
        })
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(FlowError::Spill(e)),
            Ok(()) => {}
        }
        let mut buf = vec![0u8; u32::from_le_bytes(len) as usize];
        self.reader.read_exact(&mut buf).map_err(FlowError::Spill)?;
        serde_json::from_slice(&buf)
            .map(Some)
            .map_err(FlowError::SpillCodec)
    }

    /// Drained runs are removed eagerly; the temp directory catches
    /// whatever an early drop leaves behind.
    fn remove(self) {
        let path = self.path;
        drop(self.reader);
        if let Err(e) = fs::remove_file(&path) {
            debug!("could not remove drained spill {path:?}: {e}");
        }
    }
}

struct RunSlot {
    reader: Option<RunReader>,
    staged: Option<Row>,
}

/// K-way merge over the spilled runs.  The queue holds one entry per
/// live run, prioritised by the staged row's key with the run id as
/// stable tiebreaker.
struct Merger {
    _dir: TempDir,
    keys: Vec<String>,
    runs: Vec<RunSlot>,
    queue: PriorityQueue<usize, Reverse<(Key, usize)>>,
}

impl Merger {
    fn open(spiller: Spiller, keys: Vec<String>) -> Result<Merger> {
        let mut merger = Merger {
            _dir: spiller.dir,
            keys,
            runs: Vec::with_capacity(spiller.paths.len()),
            queue: PriorityQueue::new(),
        };
        for (id, path) in spiller.paths.into_iter().enumerate() {
            let mut reader = RunReader::open(path)?;
            match reader.read_row()? {
                Some(row) => {
                    let key = key_of(&row, &merger.keys)?;
                    merger.queue.push(id, Reverse((key, id)));
                    merger.runs.push(RunSlot {
                        reader: Some(reader),
                        staged: Some(row),
                    });
                }
                None => {
                    reader.remove();
                    merger.runs.push(RunSlot {
                        reader: None,
                        staged: None,
                    });
                }
            }
        }
        Ok(merger)
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let Some((id, _)) = self.queue.pop() else {
            return Ok(None);
        };
        let slot = &mut self.runs[id];
        let row = slot.staged.take().unwrap();
        if let Some(reader) = slot.reader.as_mut() {
            match reader.read_row()? {
                Some(next) => {
                    let key = key_of(&next, &self.keys)?;
                    slot.staged = Some(next);
                    self.queue.push(id, Reverse((key, id)));
                }
                None => slot.reader.take().unwrap().remove(),
            }
        }
        Ok(Some(row))
    }
}
