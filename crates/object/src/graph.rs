use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ConfigObject;

type ObjectKey = (String, String);

fn key_of(object: &dyn ConfigObject) -> ObjectKey {
	(object.reflection_type().name().to_string(), object.name())
}

/// Inter-object dependency edges, maintained by the daemon's object
/// types and consulted during reload.
///
/// An edge `child -> parent` means `parent` was derived from (or refers
/// to) `child` and must be torn down when `child` is replaced. The
/// closure walk guards against cycles with a visited set on the caller
/// side.
#[derive(Default)]
pub struct DependencyGraph {
	edges: Mutex<FxHashMap<ObjectKey, Vec<Arc<dyn ConfigObject>>>>,
}

impl DependencyGraph {
	/// Creates an empty edge set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records that `parent` depends on `child`.
	pub fn insert(&self, child: &dyn ConfigObject, parent: Arc<dyn ConfigObject>) {
		self.edges.lock().entry(key_of(child)).or_default().push(parent);
	}

	/// Removes one `child -> parent` edge, if present.
	pub fn remove(&self, child: &dyn ConfigObject, parent: &dyn ConfigObject) {
		let mut edges = self.edges.lock();
		if let Some(parents) = edges.get_mut(&key_of(child)) {
			let parent_key = key_of(parent);
			parents.retain(|p| key_of(p.as_ref()) != parent_key);
			if parents.is_empty() {
				edges.remove(&key_of(child));
			}
		}
	}

	/// Returns the recorded parents of `child`.
	pub fn parents(&self, child: &dyn ConfigObject) -> Vec<Arc<dyn ConfigObject>> {
		self.edges.lock().get(&key_of(child)).cloned().unwrap_or_default()
	}
}

impl std::fmt::Debug for DependencyGraph {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DependencyGraph")
			.field("edges", &self.edges.lock().len())
			.finish()
	}
}
