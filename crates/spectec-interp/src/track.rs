//! Path-condition and dependency tracking
//!
//! Two concerns, kept separate:
//!
//! - The **phantom log** records branches an evaluation decided not to enter,
//!   each with the conjunction of enclosing guards entered up to that point.
//!   A downstream searcher negates individual phantoms to find inputs that
//!   cover them. The log is append-only and survives failed evaluations.
//! - The **value graph** is the append-only record of every value the
//!   evaluation produced, keyed by vid, with dependency edges from a value to
//!   the vids read to produce it. The fuzzer uses it to slice an input back
//!   to the fields that influenced a guard.

use crate::value::{Value, Vid};
use serde::Serialize;
use spectec_il::{Exp, Guard, IterExp, Pid};
use std::fmt;

/// One conjunct of the context path: a guard the evaluation entered
#[derive(Clone, Debug, Serialize)]
pub enum PathEntry {
    /// An `if` condition that held (for all its iterations)
    Cond { exp: Exp, iters: Vec<IterExp> },
    /// A case guard that was satisfied by the scrutinee
    Guard { scrut: Exp, guard: Guard },
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathEntry::Cond { exp, iters } => {
                write!(f, "{exp}")?;
                for it in iters {
                    write!(f, "{it}")?;
                }
                Ok(())
            }
            PathEntry::Guard { scrut, guard } => write!(f, "{scrut} {guard}"),
        }
    }
}

/// A phantom that was missed: the branch was not entered
#[derive(Clone, Debug, Serialize)]
pub struct PhantomHit {
    pub pid: Pid,
    /// Conjunction of enclosing guards at the decision point
    pub path: Vec<PathEntry>,
}

/// Append-only log of missed branches
#[derive(Debug, Default)]
pub struct PhantomLog {
    hits: Vec<PhantomHit>,
}

impl PhantomLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pid: Pid, path: Vec<PathEntry>) {
        self.hits.push(PhantomHit { pid, path });
    }

    pub fn hits(&self) -> &[PhantomHit] {
        &self.hits
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.hits.iter().map(|h| h.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// One registered value with its dependency link set
#[derive(Debug)]
struct GraphEntry {
    value: Value,
    deps: Vec<Vid>,
}

/// Append-only record of produced values and their provenance
///
/// Vids are indices into the registration order, so every dependency edge
/// points strictly backwards and the graph is a DAG by construction.
#[derive(Debug, Default)]
pub struct ValueGraph {
    entries: Vec<GraphEntry>,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next vid and register the finished value under it
    pub fn next_vid(&self) -> Vid {
        Vid(self.entries.len() as u64)
    }

    pub fn register(&mut self, value: Value) {
        debug_assert_eq!(value.note.vid, self.next_vid(), "vid out of order");
        self.entries.push(GraphEntry {
            value,
            deps: Vec::new(),
        });
    }

    pub fn get(&self, vid: Vid) -> Option<&Value> {
        self.entries.get(vid.0 as usize).map(|e| &e.value)
    }

    /// Link a value to the vids that were read to produce it
    pub fn add_deps(&mut self, vid: Vid, reads: impl IntoIterator<Item = Vid>) {
        let Some(entry) = self.entries.get_mut(vid.0 as usize) else {
            debug_assert!(false, "dependency on unregistered value {vid}");
            return;
        };
        for read in reads {
            debug_assert!(read < vid, "dependency edge must point backwards");
            entry.deps.push(read);
        }
    }

    pub fn deps(&self, vid: Vid) -> &[Vid] {
        self.entries
            .get(vid.0 as usize)
            .map(|e| e.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every dependency edge points to an earlier registration
    pub fn edges_point_backwards(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.deps.iter().all(|d| (d.0 as usize) < i))
    }
}
