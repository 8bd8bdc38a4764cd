//! Utilities for testing linearizability of lock-free data structures based on the strategy
//! defined by Lowe in [Testing for Linearizability](http://www.cs.ox.ac.uk/people/gavin.lowe/LinearizabiltyTesting/paper.pdf).
//! This should be done by using the LinearizabilityTester struct and the ThreadLog.
//!
//! # Example
//! This is an example of how to use the LinearizabilityTester on a queue. The tester needs
//! a sequential reference data structure along with operations defined on it to match those on
//! the concurrent object.
//! ```
//! use im::Vector;
//! use lockfree_queue::structures::Queue;
//! use lockfree_queue::testing::{LinearizabilityResult, LinearizabilityTester, ThreadLog};
//!
//! fn sequential_dequeue(
//!     queue: &Vector<usize>,
//!     _val: Option<usize>,
//! ) -> (Vector<usize>, Option<usize>) {
//!     let mut queue = queue.clone();
//!     let res = queue.pop_front();
//!     (queue, res)
//! }
//!
//! fn sequential_enqueue(
//!     queue: &Vector<usize>,
//!     val: Option<usize>,
//! ) -> (Vector<usize>, Option<usize>) {
//!     let mut queue = queue.clone();
//!     queue.push_back(val.unwrap());
//!     (queue, None)
//! }
//!
//! fn worker(id: usize, log: &mut ThreadLog<Queue<usize>, Vector<usize>, usize>) {
//!     for i in 0..50 {
//!         if i % 2 == 0 {
//!             let val = id * 1000 + i;
//!             let msg = format!("enqueue: {}", val);
//!             log.log_val(id, Queue::enqueue, val, msg, sequential_enqueue);
//!         } else {
//!             log.log(id, Queue::dequeue, "dequeue".to_owned(), sequential_dequeue);
//!         }
//!     }
//! }
//!
//! let mut linearizer: LinearizabilityTester<Queue<usize>, Vector<usize>, usize>
//!         = LinearizabilityTester::new(4, 1000, Queue::new(), Vector::new());
//! let result = linearizer.run(worker).unwrap();
//!
//! assert_eq!(result, LinearizabilityResult::Success);
//! ```

pub use self::linearizability_tester::{LinearizabilityResult, LinearizabilityTester, ThreadLog};
pub use self::time_stamped::SequentialOp;

mod automaton;
mod linearizability_tester;
mod time_stamped;
