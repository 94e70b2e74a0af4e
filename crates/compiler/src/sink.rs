use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vigil_object::{DebugInfo, Value};

/// Persistence record for one successfully committed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledObject {
	#[serde(rename = "type")]
	pub type_name: String,
	pub name: String,
	/// Serialized `CONFIG`-phase fields.
	pub properties: Value,
	/// Attribute-source map collected during evaluation.
	pub debug_hints: Value,
	/// `[path, first_line, first_column, last_line, last_column]`.
	pub debug_info: (PathBuf, u32, u32, u32, u32),
}

impl CompiledObject {
	pub(crate) fn debug_info_tuple(di: &DebugInfo) -> (PathBuf, u32, u32, u32, u32) {
		(
			di.path.clone(),
			di.first_line,
			di.first_column,
			di.last_line,
			di.last_column,
		)
	}
}

/// Sink receiving one record per committed object.
///
/// The surrounding daemon points this at its compiler-context output;
/// the engine only emits.
pub trait CompiledSink: Send + Sync {
	fn write_object(&self, record: CompiledObject);
}

/// Sink that discards all records.
#[derive(Debug, Default)]
pub struct NullSink;

impl CompiledSink for NullSink {
	fn write_object(&self, _record: CompiledObject) {}
}

/// Sink that buffers records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
	records: Mutex<Vec<CompiledObject>>,
}

impl MemorySink {
	/// Creates an empty sink.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the records written so far.
	pub fn records(&self) -> Vec<CompiledObject> {
		self.records.lock().clone()
	}
}

impl CompiledSink for MemorySink {
	fn write_object(&self, record: CompiledObject) {
		self.records.lock().push(record);
	}
}
