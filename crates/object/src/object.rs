use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{ConfigType, DebugInfo, FieldAttrs, ObjectError, Value};

/// Name-existence checks offered to [`ConfigObject::validate`].
pub trait ValidationUtils {
	/// Returns whether a non-abstract declaration of `(type_name, name)`
	/// is registered.
	fn validate_name(&self, type_name: &str, name: &str) -> bool;
}

/// One live configuration object.
///
/// Implementations use interior mutability: every method takes `&self`
/// and instances are shared as `Arc<dyn ConfigObject>`. The common
/// attribute plumbing is available by embedding [`ObjectCore`].
///
/// Lifecycle contract: `activate` leaves the object with
/// `is_active() == true`, `deactivate` with `false`. The engine skips
/// both activation phases for objects that are already active.
pub trait ConfigObject: Send + Sync {
	/// The type that produced this object.
	fn reflection_type(&self) -> Arc<dyn ConfigType>;

	/// Reads one field by id.
	fn field(&self, fid: usize) -> Result<Value, ObjectError>;

	/// Writes one field by id.
	fn set_field(&self, fid: usize, value: Value) -> Result<(), ObjectError>;

	/// Canonical object name.
	fn name(&self) -> String;

	fn set_name(&self, name: &str);

	/// User-visible name before composition; empty when unset.
	fn short_name(&self) -> String;

	fn set_short_name(&self, name: &str);

	fn zone_name(&self) -> String;

	fn set_zone_name(&self, zone: &str);

	fn package(&self) -> String;

	fn set_package(&self, package: &str);

	/// How the object came to exist (e.g. `"object"` for directly
	/// declared ones).
	fn creation_type(&self) -> String;

	fn set_creation_type(&self, creation_type: &str);

	fn debug_info(&self) -> Option<DebugInfo>;

	fn set_debug_info(&self, debug_info: DebugInfo);

	/// Reads one extension value.
	fn extension(&self, key: &str) -> Option<Value>;

	/// Writes one extension value.
	fn set_extension(&self, key: &str, value: Value);

	fn is_active(&self) -> bool;

	/// Validates fields of the given attribute phase.
	fn validate(&self, _phase: FieldAttrs, _utils: &dyn ValidationUtils) -> Result<(), ObjectError> {
		Ok(())
	}

	/// Called once after this object's own fields are populated.
	fn on_config_loaded(&self) -> Result<(), ObjectError> {
		Ok(())
	}

	/// Called once all objects of the batch have loaded, in type
	/// dependency order.
	fn on_all_config_loaded(&self) -> Result<(), ObjectError> {
		Ok(())
	}

	/// Expands child declarations of `child_type` derived from this
	/// object.
	fn create_child_objects(&self, _child_type: &Arc<dyn ConfigType>) -> Result<(), ObjectError> {
		Ok(())
	}

	fn pre_activate(&self) -> Result<(), ObjectError> {
		Ok(())
	}

	fn activate(&self, runtime_created: bool) -> Result<(), ObjectError>;

	fn deactivate(&self, runtime_removed: bool) -> Result<(), ObjectError>;
}

#[derive(Debug, Default)]
struct CoreState {
	name: String,
	short_name: String,
	zone_name: String,
	package: String,
	creation_type: String,
	debug_info: Option<DebugInfo>,
}

/// Embeddable storage for the common [`ConfigObject`] attributes.
///
/// Concrete object types hold one of these and forward the attribute
/// methods to it, adding only their own field storage.
#[derive(Debug, Default)]
pub struct ObjectCore {
	state: RwLock<CoreState>,
	extensions: RwLock<FxHashMap<String, Value>>,
	active: AtomicBool,
}

impl ObjectCore {
	/// Creates empty attribute storage.
	pub fn new() -> Self {
		Self::default()
	}

	pub fn name(&self) -> String {
		self.state.read().name.clone()
	}

	pub fn set_name(&self, name: &str) {
		self.state.write().name = name.to_string();
	}

	pub fn short_name(&self) -> String {
		self.state.read().short_name.clone()
	}

	pub fn set_short_name(&self, name: &str) {
		self.state.write().short_name = name.to_string();
	}

	pub fn zone_name(&self) -> String {
		self.state.read().zone_name.clone()
	}

	pub fn set_zone_name(&self, zone: &str) {
		self.state.write().zone_name = zone.to_string();
	}

	pub fn package(&self) -> String {
		self.state.read().package.clone()
	}

	pub fn set_package(&self, package: &str) {
		self.state.write().package = package.to_string();
	}

	pub fn creation_type(&self) -> String {
		self.state.read().creation_type.clone()
	}

	pub fn set_creation_type(&self, creation_type: &str) {
		self.state.write().creation_type = creation_type.to_string();
	}

	pub fn debug_info(&self) -> Option<DebugInfo> {
		self.state.read().debug_info.clone()
	}

	pub fn set_debug_info(&self, debug_info: DebugInfo) {
		self.state.write().debug_info = Some(debug_info);
	}

	pub fn extension(&self, key: &str) -> Option<Value> {
		self.extensions.read().get(key).cloned()
	}

	pub fn set_extension(&self, key: &str, value: Value) {
		self.extensions.write().insert(key.to_string(), value);
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	pub fn set_active(&self, active: bool) {
		self.active.store(active, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn core_attributes_round_trip() {
		let core = ObjectCore::new();
		core.set_name("web-01");
		core.set_short_name("web");
		core.set_zone_name("master");
		core.set_package("_etc");
		core.set_creation_type("object");

		assert_eq!(core.name(), "web-01");
		assert_eq!(core.short_name(), "web");
		assert_eq!(core.zone_name(), "master");
		assert_eq!(core.package(), "_etc");
		assert_eq!(core.creation_type(), "object");
		assert!(core.debug_info().is_none());
	}

	#[test]
	fn extensions_and_active_flag() {
		let core = ObjectCore::new();
		assert!(!core.is_active());
		core.set_active(true);
		assert!(core.is_active());

		assert!(core.extension("ConfigObjectDeleted").is_none());
		core.set_extension("ConfigObjectDeleted", Value::Bool(true));
		assert_eq!(core.extension("ConfigObjectDeleted"), Some(Value::Bool(true)));
	}
}
