//! Cooperative chunk driver and run supersession.
//!
//! Every long-running operation is a [`ChunkedJob`]: a state machine that
//! processes one bounded chunk of rows per [`ChunkedJob::step`] call and
//! reports [`Progress`] in between. Nothing runs concurrently; the host decides
//! when to call `step` again, which is where it gets to service other work.
//!
//! Results are published through a [`ResultSlot`]. Each run is stamped with a
//! [`RunId`] when it begins and the slot only accepts a result from the run
//! that is still current, so a superseded run can never overwrite a newer one
//! regardless of completion order.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use log::debug;

/// Chunk size used by the aggregator and the value-summary tabulator.
pub const CALC_CHUNK_SIZE: usize = 5_000;
/// Chunk size used by the KPI reducer.
pub const KPI_CHUNK_SIZE: usize = 20_000;
/// Chunk size used by the row scanner.
pub const SEARCH_CHUNK_SIZE: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(processed: usize, total: usize) -> Self {
        Self { processed, total }
    }

    /// Rounded percentage in `0..=100`. An empty input counts as complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let ratio = self.processed.min(self.total) as f64 / self.total as f64;
        (ratio * 100.0).round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Pending(Progress),
    Done(T),
}

pub trait ChunkedJob {
    type Output;

    /// Processes at most one chunk. Once `Done` has been returned the job
    /// must not be stepped again.
    fn step(&mut self) -> Step<Self::Output>;
}

/// Half-open range of the next chunk: `[cursor, min(cursor + size, total))`.
pub fn chunk_bounds(cursor: usize, chunk_size: usize, total: usize) -> (usize, usize) {
    let start = cursor.min(total);
    let end = start.saturating_add(chunk_size.max(1)).min(total);
    (start, end)
}

/// Drives `job` to completion, reporting the percentage after every chunk.
pub fn run_to_completion<J, F>(mut job: J, mut on_progress: F) -> J::Output
where
    J: ChunkedJob,
    F: FnMut(u8),
{
    loop {
        match job.step() {
            Step::Pending(progress) => on_progress(progress.percent()),
            Step::Done(output) => {
                on_progress(100);
                return output;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Single-writer result slot with last-started-wins semantics.
#[derive(Debug)]
pub struct ResultSlot<T> {
    next: Cell<u64>,
    current: Cell<Option<RunId>>,
    value: RefCell<Option<T>>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self {
            next: Cell::new(0),
            current: Cell::new(None),
            value: RefCell::new(None),
        }
    }
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run; any earlier run becomes stale.
    pub fn begin(&self) -> RunId {
        let id = RunId(self.next.get() + 1);
        self.next.set(id.0);
        self.current.set(Some(id));
        id
    }

    pub fn is_current(&self, id: RunId) -> bool {
        self.current.get() == Some(id)
    }

    /// Stores `value` if `id` is still the active run. Returns whether the
    /// value was accepted.
    pub fn publish(&self, id: RunId, value: T) -> bool {
        if !self.is_current(id) {
            debug!(
                "Discarding result of superseded run {} (current {:?})",
                id.0,
                self.current.get().map(RunId::get)
            );
            return false;
        }
        *self.value.borrow_mut() = Some(value);
        self.current.set(None);
        true
    }

    /// True while a run has begun and not yet published.
    pub fn is_pending(&self) -> bool {
        self.current.get().is_some()
    }

    pub fn take(&self) -> Option<T> {
        self.value.borrow_mut().take()
    }
}

impl<T: Clone> ResultSlot<T> {
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

type BoxedStep<T> = Box<dyn FnMut() -> Step<T>>;

struct ScheduledRun<T> {
    slot: String,
    id: RunId,
    step: BoxedStep<T>,
}

/// Round-robin cooperative scheduler over named result slots.
///
/// Each [`Scheduler::tick`] advances exactly one chunk of one in-flight run.
/// Submitting a job for a slot that already has a run in flight replaces it.
pub struct Scheduler<T> {
    slots: Vec<(String, ResultSlot<T>)>,
    queue: VecDeque<ScheduledRun<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<T: 'static> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<J>(&mut self, slot: &str, job: J) -> RunId
    where
        J: ChunkedJob + 'static,
        J::Output: Into<T>,
    {
        let mut job = job;
        self.submit_step(
            slot,
            Box::new(move || match job.step() {
                Step::Pending(progress) => Step::Pending(progress),
                Step::Done(output) => Step::Done(output.into()),
            }),
        )
    }

    fn submit_step(&mut self, slot: &str, step: BoxedStep<T>) -> RunId {
        let id = self.slot_mut(slot).begin();
        let before = self.queue.len();
        self.queue.retain(|run| run.slot != slot);
        if self.queue.len() != before {
            debug!("Run {} supersedes in-flight work for '{slot}'", id.get());
        }
        self.queue.push_back(ScheduledRun {
            slot: slot.to_string(),
            id,
            step,
        });
        id
    }

    /// Advances one chunk. `on_progress` receives the slot name and percent.
    /// Returns `false` when nothing is left to run.
    pub fn tick<F>(&mut self, mut on_progress: F) -> bool
    where
        F: FnMut(&str, u8),
    {
        let Some(mut run) = self.queue.pop_front() else {
            return false;
        };
        match (run.step)() {
            Step::Pending(progress) => {
                on_progress(&run.slot, progress.percent());
                self.queue.push_back(run);
            }
            Step::Done(output) => {
                on_progress(&run.slot, 100);
                self.slot_mut(&run.slot).publish(run.id, output);
            }
        }
        !self.queue.is_empty()
    }

    pub fn run_until_idle<F>(&mut self, mut on_progress: F)
    where
        F: FnMut(&str, u8),
    {
        while self.tick(&mut on_progress) {}
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn slot(&self, name: &str) -> Option<&ResultSlot<T>> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, slot)| slot)
    }

    pub fn take(&self, name: &str) -> Option<T> {
        self.slot(name).and_then(ResultSlot::take)
    }

    fn slot_mut(&mut self, name: &str) -> &mut ResultSlot<T> {
        let position = match self.slots.iter().position(|(slot, _)| slot == name) {
            Some(position) => position,
            None => {
                self.slots.push((name.to_string(), ResultSlot::new()));
                self.slots.len() - 1
            }
        };
        &mut self.slots[position].1
    }
}
