use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{ConfigObject, FieldInfo, ObjectError};

/// Capability of types whose canonical object names are derived from
/// object attributes rather than declared directly.
pub trait NameComposer: Send + Sync {
	/// Derives the canonical name from the declared name and the
	/// materialized object. `None` means the name could not be derived.
	fn make_name(&self, declared: &str, object: &dyn ConfigObject) -> Option<String>;
}

/// One class of configuration objects.
///
/// Implementations typically construct themselves with
/// `Arc::new_cyclic` so instances produced by [`ConfigType::instantiate`]
/// can hold their reflection type.
pub trait ConfigType: Send + Sync {
	/// Type name.
	fn name(&self) -> &str;

	/// Plural form used in log statistics.
	fn plural_name(&self) -> String {
		format!("{}s", self.name())
	}

	/// Creates a fresh, unregistered object of this type.
	fn instantiate(&self) -> Result<Arc<dyn ConfigObject>, ObjectError>;

	/// Number of fields in the type's field table.
	fn field_count(&self) -> usize;

	/// Metadata for one field.
	fn field_info(&self, fid: usize) -> Option<FieldInfo>;

	/// Type names whose all-loaded pass must complete before this
	/// type's child-object expansion runs.
	fn load_dependencies(&self) -> Vec<String> {
		Vec::new()
	}

	/// Registers a live instance in the per-type table.
	fn register_instance(&self, object: Arc<dyn ConfigObject>) -> Result<(), ObjectError>;

	/// Removes a live instance by name.
	fn unregister_instance(&self, name: &str);

	/// Looks up a live instance by name.
	fn instance(&self, name: &str) -> Option<Arc<dyn ConfigObject>>;

	/// Name-composition capability, if this type has one.
	fn name_composer(&self) -> Option<&dyn NameComposer> {
		None
	}
}

/// Per-type table of live instances, for embedding in [`ConfigType`]
/// implementations.
#[derive(Default)]
pub struct InstanceMap {
	inner: RwLock<FxHashMap<String, Arc<dyn ConfigObject>>>,
}

impl InstanceMap {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts one instance keyed by its current name.
	pub fn register(&self, type_name: &str, object: Arc<dyn ConfigObject>) -> Result<(), ObjectError> {
		let name = object.name();
		let mut guard = self.inner.write();
		if guard.contains_key(&name) {
			return Err(ObjectError::DuplicateObject {
				type_name: type_name.to_string(),
				name,
			});
		}
		tracing::trace!(ty = type_name, name = %name, "object.instance.register");
		guard.insert(name, object);
		Ok(())
	}

	/// Removes one instance by name.
	pub fn unregister(&self, name: &str) {
		if self.inner.write().remove(name).is_some() {
			tracing::trace!(name, "object.instance.unregister");
		}
	}

	/// Looks up one instance by name.
	pub fn get(&self, name: &str) -> Option<Arc<dyn ConfigObject>> {
		self.inner.read().get(name).cloned()
	}

	/// Returns all instances, sorted by name.
	pub fn all(&self) -> Vec<Arc<dyn ConfigObject>> {
		let guard = self.inner.read();
		let mut entries: Vec<_> = guard.iter().collect();
		entries.sort_by(|a, b| a.0.cmp(b.0));
		entries.into_iter().map(|(_, obj)| Arc::clone(obj)).collect()
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for InstanceMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstanceMap").field("len", &self.len()).finish()
	}
}

/// Table of known object types, keyed by type name.
#[derive(Default)]
pub struct TypeRegistry {
	inner: RwLock<FxHashMap<String, Arc<dyn ConfigType>>>,
}

impl TypeRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a type, replacing any previous entry of the same name.
	pub fn insert(&self, ty: Arc<dyn ConfigType>) {
		self.inner.write().insert(ty.name().to_string(), ty);
	}

	/// Looks up a type by name.
	pub fn get(&self, name: &str) -> Option<Arc<dyn ConfigType>> {
		self.inner.read().get(name).cloned()
	}

	/// Returns all registered types, sorted by name for deterministic
	/// iteration.
	pub fn all(&self) -> Vec<Arc<dyn ConfigType>> {
		let guard = self.inner.read();
		let mut types: Vec<_> = guard.values().cloned().collect();
		types.sort_by(|a, b| a.name().cmp(b.name()));
		types
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for TypeRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let names: Vec<String> = self.inner.read().keys().cloned().collect();
		f.debug_struct("TypeRegistry").field("types", &names).finish()
	}
}
