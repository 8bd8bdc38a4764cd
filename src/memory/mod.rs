//! A module for lock-free memory management.
//!
//! The struct in this module allows for lock-free memory management, meaning that
//! it can be used in the development of lock-free data structures. It helps ensure
//! that no pieces of data are freed while other threads can still access them, and
//! prevents the [ABA problem](https://en.wikipedia.org/wiki/ABA_problem).

pub use self::hazardpointers::HPBRManager;

mod hazardpointers;
