use std::cell::UnsafeCell;
use std::cmp;
use std::fmt;
use std::hint;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use log::debug;
use rand::Rng;

use crate::config::Config;
use crate::error::ConfigError;
use crate::memory::HPBRManager;

// Hazard pointer slots: the node read from head or tail, and the node after it
const CURRENT_HAZARD: usize = 0;
const NEXT_HAZARD: usize = 1;

/// A lock-free Michael-Scott queue.
///
/// This queue is an implementation of that described in [Simple, Fast, and Practical
/// Non-blocking and Blocking Concurrent Queue Algorithms](https://dl.acm.org/citation.cfm?id=248106).
/// It is implemented as a linked-list of nodes, headed by a sentinel node whose value is never
/// read. Nodes unlinked by `dequeue` are reclaimed with hazard pointers.
///
/// Any number of threads may call `enqueue` and `dequeue` at the same time, usually through an
/// `Arc<Queue<T>>`. Neither operation ever blocks: a thread that loses a race retries, and a thread
/// that finds the tail lagging behind the last node moves it forward before retrying.
pub struct Queue<T: Send> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    manager: HPBRManager<Node<T>>,
    max_backoff: u32,
}

unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T: Send> Queue<T> {
    /// Create a new Queue.
    /// # Examples
    /// ```
    /// use lockfree_queue::structures::Queue;
    ///
    /// let queue: Queue<String> = Queue::new();
    /// assert!(queue.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    /// Create a new Queue with the given reclamation and back-off settings.
    /// # Examples
    /// ```
    /// use lockfree_queue::config::Config;
    /// use lockfree_queue::structures::Queue;
    ///
    /// let config = Config { retire_threshold: 16, max_backoff: 0 };
    /// let queue: Queue<u64> = Queue::with_config(config).unwrap();
    /// queue.enqueue(1);
    /// assert_eq!(queue.dequeue(), Some(1));
    /// ```
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: Config) -> Self {
        debug!("creating queue with {:?}", config);
        let dummy_node = Box::into_raw(Box::new(Node::new_dummy_node()));
        Queue {
            head: AtomicPtr::new(dummy_node),
            tail: AtomicPtr::new(dummy_node),
            manager: HPBRManager::new(config.retire_threshold, 2),
            max_backoff: config.max_backoff,
        }
    }

    /// Add a new element to the back of the queue.
    /// # Examples
    /// ```
    /// use lockfree_queue::structures::Queue;
    ///
    /// let queue: Queue<String> = Queue::new();
    /// queue.enqueue("hello".to_owned());
    /// ```
    pub fn enqueue(&self, val: T) {
        let mut backoff = Backoff::new(self.max_backoff);
        let node = Box::into_raw(Box::new(Node::new(val)));
        while !self.try_enqueue(node) {
            backoff.spin();
        }
        self.manager.unprotect(CURRENT_HAZARD);
    }

    fn try_enqueue(&self, node: *mut Node<T>) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        self.manager.protect(tail, CURRENT_HAZARD);
        // Is the tail still consistent? Required for the hazard pointer to work
        if !ptr::eq(tail, self.tail.load(Ordering::Acquire)) {
            return false;
        }

        let next = unsafe { (*tail).next.load(Ordering::Acquire) };
        if !ptr::eq(tail, self.tail.load(Ordering::Acquire)) {
            return false;
        }

        // Is the tail actually the end of the queue?
        if !next.is_null() {
            // If it isn't, finish the other enqueue by moving the tail on
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
            return false;
        }

        // Try to CAS our node onto the end of the queue
        let linked = unsafe {
            (*tail)
                .next
                .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        };
        if linked {
            // Anyone who sees the tail lagging will fix it if this fails
            let _ = self
                .tail
                .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed);
        }
        linked
    }

    /// Take an element from the front of the queue, or return None if the queue is empty.
    /// # Examples
    /// ```
    /// use lockfree_queue::structures::Queue;
    ///
    /// let queue: Queue<String> = Queue::new();
    /// queue.enqueue("hello".to_owned());
    /// assert_eq!(queue.dequeue(), Some("hello".to_owned()));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn dequeue(&self) -> Option<T> {
        let mut backoff = Backoff::new(self.max_backoff);
        let result = loop {
            if let Ok(val) = self.try_dequeue() {
                break val;
            }
            backoff.spin();
        };
        self.manager.unprotect(CURRENT_HAZARD);
        self.manager.unprotect(NEXT_HAZARD);
        result
    }

    fn try_dequeue(&self) -> Result<Option<T>, ()> {
        let head = self.head.load(Ordering::Acquire);
        self.manager.protect(head, CURRENT_HAZARD);
        if !ptr::eq(head, self.head.load(Ordering::Acquire)) {
            return Err(());
        }

        let tail = self.tail.load(Ordering::Acquire);
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        self.manager.protect(next, NEXT_HAZARD);
        // While head has not moved, next is still linked behind it and cannot have been retired
        if !ptr::eq(head, self.head.load(Ordering::Acquire)) {
            return Err(());
        }

        if next.is_null() {
            return Ok(None);
        }

        if ptr::eq(head, tail) {
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
            return Err(());
        }

        match self
            .head
            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // next is the new sentinel. Only the thread that advanced head reads its value,
                // and NEXT_HAZARD keeps it alive until then.
                let data = unsafe { (*next).take_value() };
                self.manager.unprotect(CURRENT_HAZARD);
                self.manager.retire(head);
                Ok(Some(data))
            }
            Err(_) => Err(()),
        }
    }

    /// Whether the queue held no elements at the moment it was looked at.
    pub fn is_empty(&self) -> bool {
        let head = loop {
            let head = self.head.load(Ordering::Acquire);
            self.manager.protect(head, CURRENT_HAZARD);
            if ptr::eq(head, self.head.load(Ordering::Acquire)) {
                break head;
            }
        };
        let empty = unsafe { (*head).next.load(Ordering::Acquire).is_null() };
        self.manager.unprotect(CURRENT_HAZARD);
        empty
    }
}

impl<T: Send> Drop for Queue<T> {
    fn drop(&mut self) {
        let sentinel = *self.head.get_mut();
        unsafe {
            let mut current = (*sentinel).next.load(Ordering::Relaxed);
            drop(Box::from_raw(sentinel));
            while !current.is_null() {
                let node = Box::from_raw(current);
                current = node.next.load(Ordering::Relaxed);
                drop(node.take_value());
            }
        }
    }
}

impl<T: Send> Default for Queue<T> {
    fn default() -> Self {
        Queue::new()
    }
}

impl<T: Send> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Queue")
            .field("is_empty", &self.is_empty())
            .field("max_backoff", &self.max_backoff)
            .field("manager", &self.manager)
            .finish()
    }
}

impl<T: Send> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Queue::new();
        for val in iter {
            queue.enqueue(val);
        }
        queue
    }
}

impl<T: Send> Extend<T> for Queue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for val in iter {
            self.enqueue(val);
        }
    }
}

/// Drains an owned queue front to back.
pub struct IntoIter<T: Send>(Queue<T>);

impl<T: Send> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.dequeue()
    }
}

impl<T: Send> IntoIterator for Queue<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter(self)
    }
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Node {
            next: AtomicPtr::default(),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        }
    }

    fn new_dummy_node() -> Self {
        Node {
            next: AtomicPtr::default(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Moves the value out. Must be called at most once, and never on a dummy node.
    unsafe fn take_value(&self) -> T {
        ptr::read((*self.value.get()).as_ptr())
    }
}

/// Randomised exponential back-off, spinning only.
struct Backoff {
    limit: u32,
    max: u32,
}

impl Backoff {
    fn new(max: u32) -> Self {
        Backoff { limit: 1, max }
    }

    fn spin(&mut self) {
        if self.max == 0 {
            return;
        }
        let spins = rand::thread_rng().gen_range(0..self.limit);
        for _ in 0..spins {
            hint::spin_loop();
        }
        self.limit = cmp::min(self.limit.saturating_mul(2), self.max);
    }
}
