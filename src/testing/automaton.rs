use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use super::linearizability_tester::LinearizabilityResult;
use super::time_stamped::TimeStamped;

/// A point in the search: the state of the sequential object after linearizing some set of calls.
#[derive(Clone, PartialEq, Eq, Hash)]
struct Configuration<Seq> {
    sequential: Seq,
    linearized: Vec<u64>,
}

impl<Seq> Configuration<Seq> {
    fn is_linearized(&self, call: usize) -> bool {
        self.linearized[call / 64] & (1 << (call % 64)) != 0
    }

    fn with_linearized(&self, sequential: Seq, call: usize) -> Self {
        let mut linearized = self.linearized.clone();
        linearized[call / 64] |= 1 << (call % 64);
        Configuration { sequential, linearized }
    }
}

struct Frame<Seq> {
    config: Configuration<Seq>,
    candidates: Vec<usize>,
    next: usize,
}

/// Calls that may be linearized next: those not yet linearized that were invoked before every
/// other pending call returned. `history` must be sorted by invocation.
fn minimal_calls<Seq, Ret>(
    config: &Configuration<Seq>,
    history: &[TimeStamped<Seq, Ret>],
) -> Vec<usize> {
    let mut min_return = usize::MAX;
    let mut candidates = Vec::new();
    for (index, call) in history.iter().enumerate() {
        if call.invoked > min_return {
            break;
        }
        if config.is_linearized(index) {
            continue;
        }
        min_return = min_return.min(call.returned);
        candidates.push(index);
    }
    candidates.retain(|&index| history[index].invoked < min_return);
    candidates
}

/// Searches for a sequential order of `history` that respects real-time order and matches every
/// recorded result when replayed against `sequential`.
pub(crate) fn check<Seq, Ret>(
    sequential: Seq,
    mut history: Vec<TimeStamped<Seq, Ret>>,
) -> LinearizabilityResult
where
    Seq: Clone + Hash + Eq,
    Ret: Clone + PartialEq + Debug,
{
    if history.is_empty() {
        return LinearizabilityResult::Success;
    }
    history.sort_by_key(|call| call.invoked);

    let total = history.len();
    let root = Configuration {
        sequential,
        linearized: vec![0; (total + 63) / 64],
    };
    let mut visited: HashSet<Configuration<Seq>> = HashSet::new();
    let mut stack = vec![Frame {
        candidates: minimal_calls(&root, &history),
        config: root,
        next: 0,
    }];
    let mut deepest = 0;
    let mut stuck_at: Vec<usize> = stack[0].candidates.clone();

    while let Some(frame) = stack.last_mut() {
        if frame.next == frame.candidates.len() {
            stack.pop();
            continue;
        }
        let index = frame.candidates[frame.next];
        frame.next += 1;

        let call = &history[index];
        let (next_sequential, expected) = (call.op)(&frame.config.sequential, call.arg.clone());
        if expected != call.result {
            continue;
        }

        let config = frame.config.with_linearized(next_sequential, index);
        let linearized = stack.len();
        if linearized == total {
            return LinearizabilityResult::Success;
        }
        if !visited.insert(config.clone()) {
            continue;
        }

        let candidates = minimal_calls(&config, &history);
        if linearized > deepest {
            deepest = linearized;
            stuck_at = candidates.clone();
        }
        stack.push(Frame { config, candidates, next: 0 });
    }

    let pending: Vec<String> = stuck_at
        .iter()
        .map(|&index| format!("{:?}", history[index]))
        .collect();
    LinearizabilityResult::Failure(format!(
        "linearized at most {} of {} calls; no pending call fits next: {}",
        deepest,
        total,
        pending.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::check;
    use crate::testing::time_stamped::{SequentialOp, TimeStamped};
    use crate::testing::LinearizabilityResult;
    use im::Vector;

    fn sequential_enqueue(
        queue: &Vector<usize>,
        val: Option<usize>,
    ) -> (Vector<usize>, Option<usize>) {
        let mut queue = queue.clone();
        if let Some(val) = val {
            queue.push_back(val);
        }
        (queue, None)
    }

    fn sequential_dequeue(
        queue: &Vector<usize>,
        _val: Option<usize>,
    ) -> (Vector<usize>, Option<usize>) {
        let mut queue = queue.clone();
        let res = queue.pop_front();
        (queue, res)
    }

    fn call(
        thread: usize,
        span: (usize, usize),
        op: SequentialOp<Vector<usize>, usize>,
        arg: Option<usize>,
        result: Option<usize>,
    ) -> TimeStamped<Vector<usize>, usize> {
        TimeStamped {
            thread,
            message: format!("{:?} -> {:?}", arg, result),
            invoked: span.0,
            returned: span.1,
            op,
            arg,
            result,
        }
    }

    #[test]
    fn test_overlapping_enqueues_may_reorder() {
        let history = vec![
            call(0, (0, 5), sequential_enqueue, Some(1), None),
            call(1, (1, 2), sequential_enqueue, Some(2), None),
            call(1, (6, 7), sequential_dequeue, None, Some(2)),
            call(0, (8, 9), sequential_dequeue, None, Some(1)),
            call(0, (10, 11), sequential_dequeue, None, None),
        ];
        assert_eq!(check(Vector::new(), history), LinearizabilityResult::Success);
    }

    #[test]
    fn test_real_time_order_is_respected() {
        let history = vec![
            call(0, (0, 1), sequential_enqueue, Some(1), None),
            call(1, (2, 3), sequential_enqueue, Some(2), None),
            call(1, (4, 5), sequential_dequeue, None, Some(2)),
        ];
        match check(Vector::new(), history) {
            LinearizabilityResult::Failure(msg) => assert!(msg.contains("of 3 calls")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_dequeue_overlapping_enqueue() {
        // The dequeue may take effect before the enqueue it overlaps with
        let history = vec![
            call(0, (0, 3), sequential_enqueue, Some(7), None),
            call(1, (1, 2), sequential_dequeue, None, None),
            call(1, (4, 5), sequential_dequeue, None, Some(7)),
        ];
        assert_eq!(check(Vector::new(), history), LinearizabilityResult::Success);
    }

    #[test]
    fn test_duplicated_value_fails() {
        let history = vec![
            call(0, (0, 1), sequential_enqueue, Some(3), None),
            call(1, (2, 4), sequential_dequeue, None, Some(3)),
            call(2, (3, 5), sequential_dequeue, None, Some(3)),
        ];
        assert!(matches!(check(Vector::new(), history), LinearizabilityResult::Failure(_)));
    }
}
