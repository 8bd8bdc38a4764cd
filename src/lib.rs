//! A lock-free queue for Rust.
//!
//! This crate provides an unbounded multi-producer, multi-consumer FIFO queue built on
//! compare-and-swap, together with the lock-free memory management it needs. Neither
//! `enqueue` nor `dequeue` ever takes a lock: the structure as a whole always makes progress,
//! even if any one thread is suspended in the middle of an operation.
//!
//! The `testing` module holds the linearizability checker used to test the queue.

pub mod config;
pub mod error;
pub mod memory;
pub mod structures;
pub mod testing;

pub use self::config::Config;
pub use self::structures::Queue;
