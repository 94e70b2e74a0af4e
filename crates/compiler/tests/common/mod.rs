//! Shared test doubles for the engine integration tests.
//!
//! `TestType` / `TestObject` give the compiler a configurable object
//! model: a field schema, load dependencies, an optional name composer,
//! injectable lifecycle failures, and a journal recording callback
//! order.

// Each integration binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use vigil_compiler::{EvalError, Expression, expression_fn};
use vigil_object::{
	ConfigObject, ConfigType, DebugInfo, FieldAttrs, FieldInfo, InstanceMap, NameComposer,
	ObjectCore, ObjectError, TypeRegistry, ValidationUtils, Value,
};
use vigil_worker::WorkQueue;

type HookFn = Box<dyn Fn(&TestObject) -> Result<(), ObjectError> + Send + Sync>;
type ChildHookFn = Box<dyn Fn(&TestObject, &Arc<dyn ConfigType>) -> Result<(), ObjectError> + Send + Sync>;
type ComposerFn = Box<dyn Fn(&str, &dyn ConfigObject) -> Option<String> + Send + Sync>;

/// Shared event log for callback-ordering assertions.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, event: impl Into<String>) {
		self.0.lock().push(event.into());
	}

	pub fn events(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	/// Index of the first event matching `event`, if recorded.
	pub fn position(&self, event: &str) -> Option<usize> {
		self.0.lock().iter().position(|e| e == event)
	}
}

#[derive(Default)]
struct Hooks {
	validate: Option<HookFn>,
	on_loaded: Option<HookFn>,
	on_all_loaded: Option<HookFn>,
	children: Option<ChildHookFn>,
	pre_activate: Option<HookFn>,
}

/// Configurable test implementation of [`ConfigType`].
pub struct TestType {
	name: String,
	plural: String,
	fields: Vec<FieldInfo>,
	load_deps: Vec<String>,
	composer: Option<ComposerFn>,
	hooks: Hooks,
	instances: InstanceMap,
	journal: Journal,
	weak: Weak<TestType>,
}

impl TestType {
	pub fn builder(name: impl Into<String>) -> TestTypeBuilder {
		let name = name.into();
		TestTypeBuilder {
			plural: format!("{name}s"),
			name,
			fields: Vec::new(),
			load_deps: Vec::new(),
			composer: None,
			hooks: Hooks::default(),
			journal: Journal::new(),
		}
	}

	/// Field id for a schema field name.
	pub fn field_id(&self, name: &str) -> Option<usize> {
		self.fields.iter().position(|info| info.name == name)
	}
}

impl ConfigType for TestType {
	fn name(&self) -> &str {
		&self.name
	}

	fn plural_name(&self) -> String {
		self.plural.clone()
	}

	fn instantiate(&self) -> Result<Arc<dyn ConfigObject>, ObjectError> {
		let ty = self.weak.upgrade().expect("type still registered");
		Ok(Arc::new(TestObject {
			ty,
			core: ObjectCore::new(),
			fields: RwLock::new(vec![Value::Null; self.fields.len()]),
		}))
	}

	fn field_count(&self) -> usize {
		self.fields.len()
	}

	fn field_info(&self, fid: usize) -> Option<FieldInfo> {
		self.fields.get(fid).cloned()
	}

	fn load_dependencies(&self) -> Vec<String> {
		self.load_deps.clone()
	}

	fn register_instance(&self, object: Arc<dyn ConfigObject>) -> Result<(), ObjectError> {
		self.instances.register(&self.name, object)
	}

	fn unregister_instance(&self, name: &str) {
		self.instances.unregister(name);
	}

	fn instance(&self, name: &str) -> Option<Arc<dyn ConfigObject>> {
		self.instances.get(name)
	}

	fn name_composer(&self) -> Option<&dyn NameComposer> {
		self.composer.as_ref().map(|_| self as &dyn NameComposer)
	}
}

impl NameComposer for TestType {
	fn make_name(&self, declared: &str, object: &dyn ConfigObject) -> Option<String> {
		let composer = self.composer.as_ref()?;
		composer(declared, object)
	}
}

pub struct TestTypeBuilder {
	name: String,
	plural: String,
	fields: Vec<FieldInfo>,
	load_deps: Vec<String>,
	composer: Option<ComposerFn>,
	hooks: Hooks,
	journal: Journal,
}

impl TestTypeBuilder {
	#[must_use]
	pub fn field(mut self, name: impl Into<String>, attrs: FieldAttrs) -> Self {
		self.fields.push(FieldInfo::new(name, attrs));
		self
	}

	#[must_use]
	pub fn load_dependency(mut self, type_name: impl Into<String>) -> Self {
		self.load_deps.push(type_name.into());
		self
	}

	#[must_use]
	pub fn composer(
		mut self,
		composer: impl Fn(&str, &dyn ConfigObject) -> Option<String> + Send + Sync + 'static,
	) -> Self {
		self.composer = Some(Box::new(composer));
		self
	}

	#[must_use]
	pub fn validate(mut self, hook: impl Fn(&TestObject) -> Result<(), ObjectError> + Send + Sync + 'static) -> Self {
		self.hooks.validate = Some(Box::new(hook));
		self
	}

	#[must_use]
	pub fn on_loaded(mut self, hook: impl Fn(&TestObject) -> Result<(), ObjectError> + Send + Sync + 'static) -> Self {
		self.hooks.on_loaded = Some(Box::new(hook));
		self
	}

	#[must_use]
	pub fn on_all_loaded(
		mut self,
		hook: impl Fn(&TestObject) -> Result<(), ObjectError> + Send + Sync + 'static,
	) -> Self {
		self.hooks.on_all_loaded = Some(Box::new(hook));
		self
	}

	#[must_use]
	pub fn children(
		mut self,
		hook: impl Fn(&TestObject, &Arc<dyn ConfigType>) -> Result<(), ObjectError> + Send + Sync + 'static,
	) -> Self {
		self.hooks.children = Some(Box::new(hook));
		self
	}

	#[must_use]
	pub fn pre_activate(
		mut self,
		hook: impl Fn(&TestObject) -> Result<(), ObjectError> + Send + Sync + 'static,
	) -> Self {
		self.hooks.pre_activate = Some(Box::new(hook));
		self
	}

	#[must_use]
	pub fn journal(mut self, journal: Journal) -> Self {
		self.journal = journal;
		self
	}

	/// Builds the type and inserts it into `registry`.
	pub fn register(self, registry: &TypeRegistry) -> Arc<TestType> {
		let ty = Arc::new_cyclic(|weak| TestType {
			name: self.name,
			plural: self.plural,
			fields: self.fields,
			load_deps: self.load_deps,
			composer: self.composer,
			hooks: self.hooks,
			instances: InstanceMap::new(),
			journal: self.journal,
			weak: weak.clone(),
		});
		let shared: Arc<dyn ConfigType> = ty.clone();
		registry.insert(shared);
		ty
	}
}

/// Test implementation of [`ConfigObject`]: an [`ObjectCore`] plus a
/// typed field vector.
pub struct TestObject {
	ty: Arc<TestType>,
	core: ObjectCore,
	fields: RwLock<Vec<Value>>,
}

impl ConfigObject for TestObject {
	fn reflection_type(&self) -> Arc<dyn ConfigType> {
		let ty: Arc<dyn ConfigType> = self.ty.clone();
		ty
	}

	fn field(&self, fid: usize) -> Result<Value, ObjectError> {
		self.fields.read().get(fid).cloned().ok_or(ObjectError::UnknownField(fid))
	}

	fn set_field(&self, fid: usize, value: Value) -> Result<(), ObjectError> {
		let mut fields = self.fields.write();
		let slot = fields.get_mut(fid).ok_or(ObjectError::UnknownField(fid))?;
		*slot = value;
		Ok(())
	}

	fn name(&self) -> String {
		self.core.name()
	}

	fn set_name(&self, name: &str) {
		self.core.set_name(name);
	}

	fn short_name(&self) -> String {
		self.core.short_name()
	}

	fn set_short_name(&self, name: &str) {
		self.core.set_short_name(name);
	}

	fn zone_name(&self) -> String {
		self.core.zone_name()
	}

	fn set_zone_name(&self, zone: &str) {
		self.core.set_zone_name(zone);
	}

	fn package(&self) -> String {
		self.core.package()
	}

	fn set_package(&self, package: &str) {
		self.core.set_package(package);
	}

	fn creation_type(&self) -> String {
		self.core.creation_type()
	}

	fn set_creation_type(&self, creation_type: &str) {
		self.core.set_creation_type(creation_type);
	}

	fn debug_info(&self) -> Option<DebugInfo> {
		self.core.debug_info()
	}

	fn set_debug_info(&self, debug_info: DebugInfo) {
		self.core.set_debug_info(debug_info);
	}

	fn extension(&self, key: &str) -> Option<Value> {
		self.core.extension(key)
	}

	fn set_extension(&self, key: &str, value: Value) {
		self.core.set_extension(key, value);
	}

	fn is_active(&self) -> bool {
		self.core.is_active()
	}

	fn validate(&self, _phase: FieldAttrs, _utils: &dyn ValidationUtils) -> Result<(), ObjectError> {
		match &self.ty.hooks.validate {
			Some(hook) => hook(self),
			None => Ok(()),
		}
	}

	fn on_config_loaded(&self) -> Result<(), ObjectError> {
		self.ty.journal.push(format!("loaded:{}", self.name()));
		match &self.ty.hooks.on_loaded {
			Some(hook) => hook(self),
			None => Ok(()),
		}
	}

	fn on_all_config_loaded(&self) -> Result<(), ObjectError> {
		self.ty.journal.push(format!("all_loaded:{}", self.name()));
		match &self.ty.hooks.on_all_loaded {
			Some(hook) => hook(self),
			None => Ok(()),
		}
	}

	fn create_child_objects(&self, child_type: &Arc<dyn ConfigType>) -> Result<(), ObjectError> {
		self.ty
			.journal
			.push(format!("children:{}:{}", self.name(), child_type.name()));
		match &self.ty.hooks.children {
			Some(hook) => hook(self, child_type),
			None => Ok(()),
		}
	}

	fn pre_activate(&self) -> Result<(), ObjectError> {
		self.ty.journal.push(format!("pre_activate:{}", self.name()));
		match &self.ty.hooks.pre_activate {
			Some(hook) => hook(self),
			None => Ok(()),
		}
	}

	fn activate(&self, runtime_created: bool) -> Result<(), ObjectError> {
		self.ty
			.journal
			.push(format!("activate:{}:{runtime_created}", self.name()));
		self.core.set_active(true);
		Ok(())
	}

	fn deactivate(&self, runtime_removed: bool) -> Result<(), ObjectError> {
		self.ty
			.journal
			.push(format!("deactivate:{}:{runtime_removed}", self.name()));
		self.core.set_active(false);
		Ok(())
	}
}

/// Initializes test logging; safe to call from every test.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// A small work queue for driving the pipelines in tests.
pub fn queue() -> WorkQueue {
	WorkQueue::new("test", 1024, 4)
}

/// An expression body that does nothing.
pub fn noop_expr() -> Arc<dyn Expression> {
	expression_fn(|_, _| Ok(()))
}

/// An expression body that always fails.
pub fn failing_expr(message: &str) -> Arc<dyn Expression> {
	let message = message.to_string();
	expression_fn(move |_, _| Err(EvalError::new(message.clone())))
}

/// An expression body assigning schema fields by name on `this`,
/// recording a hint per assignment.
pub fn set_fields_expr(values: Vec<(&'static str, Value)>) -> Arc<dyn Expression> {
	expression_fn(move |frame, hints| {
		let this = frame
			.this
			.clone()
			.ok_or_else(|| EvalError::new("expression requires an object frame"))?;
		let ty = this.reflection_type();
		for (field, value) in &values {
			let fid = (0..ty.field_count())
				.find(|&fid| ty.field_info(fid).is_some_and(|info| info.name == *field))
				.ok_or_else(|| EvalError::new(format!("type '{}' has no field '{field}'", ty.name())))?;
			this.set_field(fid, value.clone())
				.map_err(|error| EvalError::new(error.to_string()))?;
			hints
				.attribute(field)
				.add_message("assigned", DebugInfo::at("/etc/vigil/test.conf", 1, 1));
		}
		Ok(())
	})
}
