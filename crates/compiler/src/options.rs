use serde::{Deserialize, Serialize};

/// Tunables for the compilation and activation pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
	/// Bound on the work queue used by engine-owned pipelines.
	pub queue_capacity: usize,
	/// Worker-pool size; `None` means hardware concurrency.
	pub parallelism: Option<usize>,
	/// How many levels of child-object expansion may recurse before
	/// the batch fails with divergence.
	pub max_child_expansion_depth: usize,
}

impl Default for CompilerOptions {
	fn default() -> Self {
		Self {
			queue_capacity: 25_000,
			parallelism: None,
			max_child_expansion_depth: 64,
		}
	}
}

impl CompilerOptions {
	pub(crate) fn effective_parallelism(&self) -> usize {
		self.parallelism
			.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
	}
}
