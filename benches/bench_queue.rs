use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::queue::SegQueue;
use lockfree_queue::structures::Queue;
use std::collections::VecDeque;

use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

const TOTAL_OPS: usize = 10000;
const THREAD_COUNTS: [usize; 4] = [2, 4, 8, 16];

/// The operations a benchmarked queue must offer.
trait BenchQueue: Send + Sync + 'static {
    fn new_queue() -> Self;
    fn push(&self, val: usize);
    fn pop(&self) -> Option<usize>;
}

impl BenchQueue for Queue<usize> {
    fn new_queue() -> Self {
        Queue::new()
    }

    fn push(&self, val: usize) {
        self.enqueue(val);
    }

    fn pop(&self) -> Option<usize> {
        self.dequeue()
    }
}

impl BenchQueue for Mutex<VecDeque<usize>> {
    fn new_queue() -> Self {
        Mutex::new(VecDeque::new())
    }

    fn push(&self, val: usize) {
        self.lock().unwrap().push_back(val);
    }

    fn pop(&self) -> Option<usize> {
        self.lock().unwrap().pop_front()
    }
}

impl BenchQueue for SegQueue<usize> {
    fn new_queue() -> Self {
        SegQueue::new()
    }

    fn push(&self, val: usize) {
        SegQueue::push(self, val);
    }

    fn pop(&self) -> Option<usize> {
        SegQueue::pop(self)
    }
}

fn spawn_producer<Q: BenchQueue>(queue: &Arc<Q>, amount: usize) -> JoinHandle<()> {
    let q = queue.clone();
    thread::spawn(move || {
        for i in 0..amount {
            q.push(i);
        }
    })
}

fn spawn_consumer<Q: BenchQueue>(queue: &Arc<Q>, amount: usize) -> JoinHandle<()> {
    let q = queue.clone();
    thread::spawn(move || {
        for _ in 0..amount {
            while q.pop().is_none() {}
        }
    })
}

fn join_all(wait_vec: Vec<JoinHandle<()>>) {
    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn run_equal<Q: BenchQueue>(num_threads: usize) {
    let queue = Arc::new(Q::new_queue());
    let amount = TOTAL_OPS / num_threads;
    let mut wait_vec = Vec::new();
    for _ in 0..num_threads / 2 {
        wait_vec.push(spawn_producer(&queue, amount));
        wait_vec.push(spawn_consumer(&queue, amount));
    }
    join_all(wait_vec);
}

fn run_mp_sc<Q: BenchQueue>(num_threads: usize) {
    let queue = Arc::new(Q::new_queue());
    let amount = TOTAL_OPS / num_threads;
    let mut wait_vec = vec![spawn_consumer(&queue, amount * (num_threads - 1))];
    for _ in 0..num_threads - 1 {
        wait_vec.push(spawn_producer(&queue, amount));
    }
    join_all(wait_vec);
}

fn run_sp_mc<Q: BenchQueue>(num_threads: usize) {
    let queue = Arc::new(Q::new_queue());
    let amount = TOTAL_OPS / num_threads;
    let mut wait_vec = vec![spawn_producer(&queue, amount * (num_threads - 1))];
    for _ in 0..num_threads - 1 {
        wait_vec.push(spawn_consumer(&queue, amount));
    }
    join_all(wait_vec);
}

fn bench_scenario(c: &mut Criterion, name: &str, scenario: [fn(usize); 3]) {
    let mut group = c.benchmark_group(name);
    for num_threads in THREAD_COUNTS.iter() {
        group.bench_with_input(BenchmarkId::new("lockfree", num_threads), num_threads, |b, &n| {
            b.iter(|| scenario[0](n))
        });
        group.bench_with_input(BenchmarkId::new("mutex", num_threads), num_threads, |b, &n| {
            b.iter(|| scenario[1](n))
        });
        group.bench_with_input(BenchmarkId::new("crossbeam", num_threads), num_threads, |b, &n| {
            b.iter(|| scenario[2](n))
        });
    }
    group.finish();
}

fn bench_queue_equal(c: &mut Criterion) {
    bench_scenario(
        c,
        "queue_equal",
        [
            run_equal::<Queue<usize>>,
            run_equal::<Mutex<VecDeque<usize>>>,
            run_equal::<SegQueue<usize>>,
        ],
    );
}

fn bench_queue_mp_sc(c: &mut Criterion) {
    bench_scenario(
        c,
        "queue_mp_sc",
        [
            run_mp_sc::<Queue<usize>>,
            run_mp_sc::<Mutex<VecDeque<usize>>>,
            run_mp_sc::<SegQueue<usize>>,
        ],
    );
}

fn bench_queue_sp_mc(c: &mut Criterion) {
    bench_scenario(
        c,
        "queue_sp_mc",
        [
            run_sp_mc::<Queue<usize>>,
            run_sp_mc::<Mutex<VecDeque<usize>>>,
            run_sp_mc::<SegQueue<usize>>,
        ],
    );
}

criterion_group!(benches, bench_queue_equal, bench_queue_mp_sc, bench_queue_sp_mc);
criterion_main!(benches);
