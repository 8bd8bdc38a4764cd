use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::automaton;
use super::time_stamped::{SequentialOp, TimeStamped};
use crate::error::TesterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinearizabilityResult {
    Success,
    Failure(String),
}

/// Runs a worker on several threads against a shared concurrent object, then checks that the
/// recorded history can be explained by the sequential model.
pub struct LinearizabilityTester<C, S, Ret> {
    num_threads: usize,
    iterations: usize,
    concurrent: C,
    sequential: S,
    _ret: PhantomData<fn() -> Ret>,
}

impl<C, S, Ret> LinearizabilityTester<C, S, Ret>
where
    C: Sync,
    S: Clone + Hash + Eq + Send,
    Ret: Clone + PartialEq + Debug + Send,
{
    /// `iterations` is the most calls a single thread's log will record.
    pub fn new(num_threads: usize, iterations: usize, concurrent: C, sequential: S) -> Self {
        LinearizabilityTester {
            num_threads,
            iterations,
            concurrent,
            sequential,
            _ret: PhantomData,
        }
    }

    pub fn run(
        &mut self,
        worker: fn(usize, &mut ThreadLog<C, S, Ret>),
    ) -> Result<LinearizabilityResult, TesterError> {
        let pool = ThreadPoolBuilder::new().num_threads(self.num_threads).build()?;
        let clock = AtomicUsize::new(0);
        let concurrent = &self.concurrent;
        let iterations = self.iterations;

        let logs: Vec<Vec<TimeStamped<S, Ret>>> = pool.install(|| {
            (0..self.num_threads)
                .into_par_iter()
                .with_max_len(1)
                .map(|id| {
                    let mut log = ThreadLog::new(iterations, concurrent, &clock);
                    worker(id, &mut log);
                    log.calls
                })
                .collect()
        });

        let history: Vec<TimeStamped<S, Ret>> = logs.into_iter().flatten().collect();
        debug!(
            "checking {} calls from {} threads for linearizability",
            history.len(),
            self.num_threads
        );

        Ok(automaton::check(self.sequential.clone(), history))
    }

    pub fn concurrent(&self) -> &C {
        &self.concurrent
    }
}

/// The per-thread record of calls made on the concurrent object.
pub struct ThreadLog<'a, C, S, Ret> {
    iterations: usize,
    concurrent: &'a C,
    clock: &'a AtomicUsize,
    calls: Vec<TimeStamped<S, Ret>>,
}

impl<'a, C, S, Ret: Clone> ThreadLog<'a, C, S, Ret> {
    fn new(iterations: usize, concurrent: &'a C, clock: &'a AtomicUsize) -> Self {
        ThreadLog {
            iterations,
            concurrent,
            clock,
            calls: Vec::new(),
        }
    }

    /// Call `op` on the concurrent object and record it, to be checked against `seq_op`.
    /// Once the log is full the call is not made.
    pub fn log(
        &mut self,
        id: usize,
        op: fn(&C) -> Option<Ret>,
        message: String,
        seq_op: SequentialOp<S, Ret>,
    ) {
        if self.calls.len() >= self.iterations {
            return;
        }
        let invoked = self.clock.fetch_add(1, Ordering::SeqCst);
        let result = op(self.concurrent);
        let returned = self.clock.fetch_add(1, Ordering::SeqCst);
        self.calls.push(TimeStamped {
            thread: id,
            message,
            invoked,
            returned,
            op: seq_op,
            arg: None,
            result,
        });
    }

    /// Like `log`, for an operation that takes a value and returns nothing.
    pub fn log_val(
        &mut self,
        id: usize,
        op: fn(&C, Ret),
        val: Ret,
        message: String,
        seq_op: SequentialOp<S, Ret>,
    ) {
        if self.calls.len() >= self.iterations {
            return;
        }
        let invoked = self.clock.fetch_add(1, Ordering::SeqCst);
        op(self.concurrent, val.clone());
        let returned = self.clock.fetch_add(1, Ordering::SeqCst);
        self.calls.push(TimeStamped {
            thread: id,
            message,
            invoked,
            returned,
            op: seq_op,
            arg: Some(val),
            result: None,
        });
    }
}
