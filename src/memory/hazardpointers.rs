use std::cell::UnsafeCell;
use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::ptr;
use std::sync::atomic::{fence, AtomicPtr, Ordering};

use log::{debug, trace};
use thread_local::ThreadLocal;

/// A hazard pointer based record manager, as described by Michael in
/// [Hazard Pointers: Safe Memory Reclamation for Lock-Free Objects](https://ieeexplore.ieee.org/document/1291819).
///
/// Every thread that touches the manager owns `num_hp_per_thread` hazard pointers, which are
/// linked into a global list the first time the thread uses the manager. A thread announces that
/// it is about to dereference a record with `protect`, and hands unlinked records back with
/// `retire`. Once a thread has more than `max_retired` records waiting, it scans the global list
/// and frees every record that no hazard pointer currently points at.
pub struct HPBRManager<T: Send> {
    thread_info: ThreadLocal<UnsafeCell<ThreadLocalInfo<T>>>,
    head: AtomicPtr<HazardPointer<T>>,
    max_retired: usize,
    num_hp_per_thread: usize,
}

impl<T: Send> fmt::Debug for HPBRManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HPBRManager")
            .field("hazard_pointers", &self.hazard_pointer_count())
            .field("retired_here", &self.retired_count())
            .field("max_retired", &self.max_retired)
            .field("num_hp_per_thread", &self.num_hp_per_thread)
            .finish()
    }
}

impl<T: Send> HPBRManager<T> {
    pub fn new(max_retired: usize, num_hp_per_thread: usize) -> Self {
        debug!(
            "creating hazard pointer manager: max_retired={}, hazards per thread={}",
            max_retired, num_hp_per_thread
        );
        HPBRManager {
            thread_info: ThreadLocal::new(),
            head: AtomicPtr::default(),
            max_retired,
            num_hp_per_thread,
        }
    }

    fn allocate_hp(&self) -> *mut HazardPointer<T> {
        let new_hp_ptr = Box::into_raw(Box::new(HazardPointer::new()));

        // Hazard pointers are only ever pushed, and live until the manager is dropped
        loop {
            let old_head = self.head.load(Ordering::Acquire);
            unsafe {
                (*new_hp_ptr).next.store(old_head, Ordering::Relaxed);
            }
            if self
                .head
                .compare_exchange_weak(old_head, new_hp_ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return new_hp_ptr;
            }
        }
    }

    /// Publish `record` in this thread's hazard pointer number `hazard_num`.
    ///
    /// The caller must re-read the location it loaded `record` from after this returns, and only
    /// dereference `record` if it is still there. Panics if `hazard_num` is not below the number
    /// of hazard pointers per thread.
    pub fn protect(&self, record: *mut T, hazard_num: usize) {
        self.hazard_pointer(hazard_num)
            .protected
            .store(record, Ordering::Release);
        // The announcement must be visible before the caller re-validates
        fence(Ordering::SeqCst);
    }

    pub fn unprotect(&self, hazard_num: usize) {
        self.hazard_pointer(hazard_num)
            .protected
            .store(ptr::null_mut(), Ordering::Release);
    }

    /// Hand over a record that has been unlinked from the data structure. It is freed once no
    /// hazard pointer protects it.
    pub fn retire(&self, record: *mut T) {
        let retired = unsafe {
            let thread_info = self.get_mut_thread_info();
            thread_info.retired_list.push(record);
            thread_info.retired_list.len()
        };

        if retired > self.max_retired {
            self.scan();
        }
    }

    /// The number of records retired by the calling thread that have not been freed yet.
    pub fn retired_count(&self) -> usize {
        self.thread_info
            .get()
            .map(|cell| unsafe { (*cell.get()).retired_list.len() })
            .unwrap_or(0)
    }

    fn hazard_pointer_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.head.load(Ordering::Acquire);
        while !current.is_null() {
            count += 1;
            current = unsafe { (*current).next.load(Ordering::Acquire) };
        }
        count
    }

    /// Deletes every retired record of this thread that is not protected by a hazard pointer.
    fn scan(&self) {
        // Pairs with the fence in `protect`: either we see the announcement, or the protecting
        // thread sees the record unlinked and backs off.
        fence(Ordering::SeqCst);

        let mut hazard_set: HashSet<*mut T> = HashSet::new();
        let mut current = self.head.load(Ordering::Acquire);
        while !current.is_null() {
            let hazard_pointer = unsafe { &*current };
            let protected = hazard_pointer.protected.load(Ordering::Acquire);
            if !protected.is_null() {
                hazard_set.insert(protected);
            }
            current = hazard_pointer.next.load(Ordering::Acquire);
        }

        let retired = unsafe { mem::take(&mut self.get_mut_thread_info().retired_list) };
        let scanned = retired.len();
        let mut still_hazardous = Vec::new();
        for record in retired {
            if hazard_set.contains(&record) {
                still_hazardous.push(record);
            } else {
                unsafe { Self::free(record) };
            }
        }

        trace!(
            "scanned {} retired records against {} hazards: freed {}, deferred {}",
            scanned,
            hazard_set.len(),
            scanned - still_hazardous.len(),
            still_hazardous.len()
        );

        unsafe {
            self.get_mut_thread_info()
                .retired_list
                .extend(still_hazardous);
        }
    }

    unsafe fn free(garbage: *mut T) {
        drop(Box::from_raw(garbage));
    }

    fn hazard_pointer(&self, hazard_num: usize) -> &HazardPointer<T> {
        unsafe {
            let hp = self.get_mut_thread_info().local_hazards[hazard_num];
            &*hp
        }
    }

    /// Get the thread local info described in the paper as a mutable reference.
    /// On first access, will create hazard pointers for the thread and add them
    /// to the central list.
    ///
    /// Only the calling thread ever reaches its own entry, so the reference is unique as long as
    /// it is not held across another call into the manager.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut_thread_info(&self) -> &mut ThreadLocalInfo<T> {
        let thread_info_ptr = self
            .thread_info
            .get_or(|| {
                let starting_hp: Vec<*mut HazardPointer<T>> =
                    (0..self.num_hp_per_thread).map(|_| self.allocate_hp()).collect();
                debug!(
                    "registered {} hazard pointers for {:?}",
                    starting_hp.len(),
                    std::thread::current().id()
                );
                UnsafeCell::new(ThreadLocalInfo::new(starting_hp))
            })
            .get();

        &mut *thread_info_ptr
    }
}

impl<T: Send> Drop for HPBRManager<T> {
    fn drop(&mut self) {
        for cell in self.thread_info.iter_mut() {
            for record in cell.get_mut().retired_list.drain(..) {
                unsafe { Self::free(record) };
            }
        }

        let mut current = *self.head.get_mut();
        while !current.is_null() {
            let hazard_pointer = unsafe { Box::from_raw(current) };
            current = hazard_pointer.next.load(Ordering::Relaxed);
        }
    }
}

struct HazardPointer<T> {
    protected: AtomicPtr<T>,
    next: AtomicPtr<HazardPointer<T>>,
}

impl<T> HazardPointer<T> {
    fn new() -> Self {
        HazardPointer {
            protected: AtomicPtr::default(),
            next: AtomicPtr::default(),
        }
    }
}

struct ThreadLocalInfo<T> {
    local_hazards: Vec<*mut HazardPointer<T>>,
    retired_list: Vec<*mut T>,
}

// The raw pointers are owned by the manager, and records are `Send`
unsafe impl<T: Send> Send for ThreadLocalInfo<T> {}

impl<T> ThreadLocalInfo<T> {
    fn new(starting_hazards: Vec<*mut HazardPointer<T>>) -> Self {
        ThreadLocalInfo {
            local_hazards: starting_hazards,
            retired_list: Vec::new(),
        }
    }
}
