use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

/// Error produced by one failed queue task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// Failure recorded when a task panicked instead of returning an error.
#[derive(Debug)]
pub struct TaskPanicked {
	message: String,
}

impl TaskPanicked {
	fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
		let message = payload
			.downcast_ref::<&str>()
			.map(|s| (*s).to_string())
			.or_else(|| payload.downcast_ref::<String>().cloned())
			.unwrap_or_else(|| "task panicked".to_string());
		Self { message }
	}
}

impl std::fmt::Display for TaskPanicked {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "task panicked: {}", self.message)
	}
}

impl std::error::Error for TaskPanicked {}

/// Counter snapshot for one work queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
	pub pending: usize,
	pub running: usize,
	pub spawned_total: u64,
	pub completed_total: u64,
	pub failed_total: u64,
}

struct State {
	queue: VecDeque<Task>,
	running: usize,
	failures: Vec<TaskError>,
	shutdown: bool,
	spawned_total: u64,
	completed_total: u64,
	failed_total: u64,
}

struct Shared {
	name: String,
	capacity: usize,
	state: Mutex<State>,
	not_empty: Condvar,
	not_full: Condvar,
	idle: Condvar,
}

/// Bounded FIFO of fallible tasks executed by a fixed pool of named
/// OS threads.
///
/// Tasks run to completion on a worker thread; `join()` is the only
/// suspension point for callers. Failures (including caught panics) are
/// collected and observed after the barrier via `has_failures()` /
/// `take_failures()`.
pub struct WorkQueue {
	shared: Arc<Shared>,
	workers: Vec<JoinHandle<()>>,
}

impl WorkQueue {
	/// Creates a queue and spawns its worker pool.
	///
	/// # Panics
	///
	/// Panics if `capacity` or `parallelism` is zero.
	pub fn new(name: impl Into<String>, capacity: usize, parallelism: usize) -> Self {
		assert!(capacity > 0, "queue capacity must be > 0");
		assert!(parallelism > 0, "queue parallelism must be > 0");

		let name = name.into();
		let shared = Arc::new(Shared {
			name: name.clone(),
			capacity,
			state: Mutex::new(State {
				queue: VecDeque::new(),
				running: 0,
				failures: Vec::new(),
				shutdown: false,
				spawned_total: 0,
				completed_total: 0,
				failed_total: 0,
			}),
			not_empty: Condvar::new(),
			not_full: Condvar::new(),
			idle: Condvar::new(),
		});

		let workers = (0..parallelism)
			.map(|i| {
				let shared = Arc::clone(&shared);
				thread::Builder::new()
					.name(format!("{name}-{i}"))
					.spawn(move || worker_loop(&shared))
					.expect("failed to spawn work-queue thread")
			})
			.collect();

		tracing::trace!(queue = %name, capacity, parallelism, "worker.queue.start");

		Self { shared, workers }
	}

	/// Creates a queue with the pool sized to hardware concurrency.
	pub fn with_default_parallelism(name: impl Into<String>, capacity: usize) -> Self {
		let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
		Self::new(name, capacity, parallelism)
	}

	/// Queue name, as given at construction.
	pub fn name(&self) -> &str {
		&self.shared.name
	}

	/// Enqueues one task, blocking while the queue is at capacity.
	pub fn enqueue<F>(&self, task: F)
	where
		F: FnOnce() -> Result<(), TaskError> + Send + 'static,
	{
		let mut state = self.shared.state.lock();
		while state.queue.len() >= self.shared.capacity {
			self.shared.not_full.wait(&mut state);
		}
		state.queue.push_back(Box::new(task));
		state.spawned_total = state.spawned_total.wrapping_add(1);
		drop(state);
		self.shared.not_empty.notify_one();
	}

	/// Blocks until the queue is empty and no task is running.
	pub fn join(&self) {
		let mut state = self.shared.state.lock();
		while !state.queue.is_empty() || state.running > 0 {
			self.shared.idle.wait(&mut state);
		}
	}

	/// Returns whether any task has failed since the last `take_failures`.
	pub fn has_failures(&self) -> bool {
		!self.shared.state.lock().failures.is_empty()
	}

	/// Number of collected failures.
	pub fn failure_count(&self) -> usize {
		self.shared.state.lock().failures.len()
	}

	/// Drains and returns the collected failures.
	pub fn take_failures(&self) -> Vec<TaskError> {
		std::mem::take(&mut self.shared.state.lock().failures)
	}

	/// Drains the collected failures, logging each under `category`.
	///
	/// Returns the number of failures reported.
	pub fn report_failures(&self, category: &str) -> usize {
		let failures = self.take_failures();
		for error in &failures {
			tracing::error!(queue = %self.shared.name, category, error = %error, "worker.queue.task_failed");
		}
		failures.len()
	}

	/// Number of tasks waiting for a worker.
	pub fn len(&self) -> usize {
		self.shared.state.lock().queue.len()
	}

	/// Returns whether no tasks are waiting.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns a counter snapshot.
	pub fn stats(&self) -> QueueStats {
		let state = self.shared.state.lock();
		QueueStats {
			pending: state.queue.len(),
			running: state.running,
			spawned_total: state.spawned_total,
			completed_total: state.completed_total,
			failed_total: state.failed_total,
		}
	}
}

impl Drop for WorkQueue {
	fn drop(&mut self) {
		{
			let mut state = self.shared.state.lock();
			state.shutdown = true;
		}
		self.shared.not_empty.notify_all();
		for handle in self.workers.drain(..) {
			let _ = handle.join();
		}
	}
}

impl std::fmt::Debug for WorkQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkQueue")
			.field("name", &self.shared.name)
			.field("capacity", &self.shared.capacity)
			.field("stats", &self.stats())
			.finish()
	}
}

fn worker_loop(shared: &Shared) {
	loop {
		let task = {
			let mut state = shared.state.lock();
			loop {
				if let Some(task) = state.queue.pop_front() {
					state.running += 1;
					shared.not_full.notify_one();
					break task;
				}
				if state.shutdown {
					return;
				}
				shared.not_empty.wait(&mut state);
			}
		};

		let outcome = panic::catch_unwind(AssertUnwindSafe(task));

		let mut state = shared.state.lock();
		state.running -= 1;
		state.completed_total = state.completed_total.wrapping_add(1);
		match outcome {
			Ok(Ok(())) => {}
			Ok(Err(error)) => {
				state.failed_total = state.failed_total.wrapping_add(1);
				state.failures.push(error);
			}
			Err(payload) => {
				state.failed_total = state.failed_total.wrapping_add(1);
				state.failures.push(Box::new(TaskPanicked::from_payload(payload)));
			}
		}
		if state.queue.is_empty() && state.running == 0 {
			shared.idle.notify_all();
		}
	}
}
