use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use vigil_object::{ConfigObject, DebugInfo, Value};

use crate::context::ActivationContext;
use crate::eval::Expression;

/// One pending configuration declaration: the recipe for producing a
/// single runtime object.
pub struct ConfigItem {
	type_name: String,
	name: String,
	abstract_: bool,
	default_template: bool,
	ignore_on_error: bool,
	expression: RwLock<Option<Arc<dyn Expression>>>,
	filter: Option<Arc<dyn Expression>>,
	scope: FxHashMap<String, Value>,
	debug_info: DebugInfo,
	zone: String,
	package: String,
	creation_type: String,
	activation_context: OnceLock<Option<Arc<ActivationContext>>>,
	object: RwLock<Option<Arc<dyn ConfigObject>>>,
	dropped: OnceLock<()>,
}

impl ConfigItem {
	/// Declared type name.
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	/// Declared name; empty for composite-named declarations.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Whether the item is a template and never materializes.
	pub fn is_abstract(&self) -> bool {
		self.abstract_
	}

	/// Whether the item participates in the implicit-template pool.
	pub fn is_default_template(&self) -> bool {
		self.default_template
	}

	/// Whether materialization failures drop the item instead of
	/// failing the batch.
	pub fn is_ignore_on_error(&self) -> bool {
		self.ignore_on_error
	}

	/// Source location of the declaration.
	pub fn debug_info(&self) -> &DebugInfo {
		&self.debug_info
	}

	/// Outer-lexical bindings copied into the evaluation frame.
	pub fn scope(&self) -> &FxHashMap<String, Value> {
		&self.scope
	}

	/// The declaration body, unless discarded after commit.
	pub fn expression(&self) -> Option<Arc<dyn Expression>> {
		self.expression.read().clone()
	}

	/// Optional predicate expression, retained as metadata.
	pub fn filter(&self) -> Option<Arc<dyn Expression>> {
		self.filter.clone()
	}

	pub fn zone(&self) -> &str {
		&self.zone
	}

	pub fn package(&self) -> &str {
		&self.package
	}

	pub fn creation_type(&self) -> &str {
		&self.creation_type
	}

	/// The batch token captured at first registration.
	pub fn activation_context(&self) -> Option<Arc<ActivationContext>> {
		self.activation_context.get().cloned().flatten()
	}

	/// The produced runtime object, once committed.
	pub fn object(&self) -> Option<Arc<dyn ConfigObject>> {
		self.object.read().clone()
	}

	pub(crate) fn bind_context(&self, context: Option<Arc<ActivationContext>>) {
		let _ = self.activation_context.set(context);
	}

	pub(crate) fn set_object(&self, object: Arc<dyn ConfigObject>) {
		*self.object.write() = Some(object);
	}

	pub(crate) fn take_object(&self) -> Option<Arc<dyn ConfigObject>> {
		self.object.write().take()
	}

	/// Releases the expression once it is no longer needed; saves
	/// memory across reloads.
	pub(crate) fn discard_expression(&self) {
		*self.expression.write() = None;
	}

	/// Marks the item as dropped via ignore-on-error so later drains
	/// skip it and its path is recorded only once.
	pub(crate) fn mark_dropped(&self) {
		let _ = self.dropped.set(());
	}

	pub(crate) fn is_dropped(&self) -> bool {
		self.dropped.get().is_some()
	}

	/// Whether the item still awaits materialization.
	pub(crate) fn is_pending(&self) -> bool {
		!self.abstract_ && !self.is_dropped() && self.object.read().is_none()
	}
}

impl std::fmt::Debug for ConfigItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConfigItem")
			.field("type_name", &self.type_name)
			.field("name", &self.name)
			.field("abstract", &self.abstract_)
			.field("default_template", &self.default_template)
			.field("ignore_on_error", &self.ignore_on_error)
			.field("debug_info", &self.debug_info)
			.field("committed", &self.object.read().is_some())
			.finish()
	}
}

/// Builder for [`ConfigItem`].
pub struct ConfigItemBuilder {
	type_name: String,
	name: String,
	abstract_: bool,
	default_template: bool,
	ignore_on_error: bool,
	expression: Option<Arc<dyn Expression>>,
	filter: Option<Arc<dyn Expression>>,
	scope: FxHashMap<String, Value>,
	debug_info: DebugInfo,
	zone: String,
	package: String,
	creation_type: String,
}

impl ConfigItemBuilder {
	/// Starts a declaration of the given type.
	pub fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			name: String::new(),
			abstract_: false,
			default_template: false,
			ignore_on_error: false,
			expression: None,
			filter: None,
			scope: FxHashMap::default(),
			debug_info: DebugInfo::default(),
			zone: String::new(),
			package: String::new(),
			creation_type: "object".to_string(),
		}
	}

	#[must_use]
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	#[must_use]
	pub fn abstract_(mut self, abstract_: bool) -> Self {
		self.abstract_ = abstract_;
		self
	}

	#[must_use]
	pub fn default_template(mut self, default_template: bool) -> Self {
		self.default_template = default_template;
		self
	}

	#[must_use]
	pub fn ignore_on_error(mut self, ignore_on_error: bool) -> Self {
		self.ignore_on_error = ignore_on_error;
		self
	}

	#[must_use]
	pub fn expression(mut self, expression: Arc<dyn Expression>) -> Self {
		self.expression = Some(expression);
		self
	}

	#[must_use]
	pub fn filter(mut self, filter: Arc<dyn Expression>) -> Self {
		self.filter = Some(filter);
		self
	}

	/// Adds one outer-lexical binding to the evaluation scope.
	#[must_use]
	pub fn scope_var(mut self, key: impl Into<String>, value: Value) -> Self {
		self.scope.insert(key.into(), value);
		self
	}

	#[must_use]
	pub fn debug_info(mut self, debug_info: DebugInfo) -> Self {
		self.debug_info = debug_info;
		self
	}

	#[must_use]
	pub fn zone(mut self, zone: impl Into<String>) -> Self {
		self.zone = zone.into();
		self
	}

	#[must_use]
	pub fn package(mut self, package: impl Into<String>) -> Self {
		self.package = package.into();
		self
	}

	#[must_use]
	pub fn creation_type(mut self, creation_type: impl Into<String>) -> Self {
		self.creation_type = creation_type.into();
		self
	}

	/// Finalizes the declaration.
	pub fn build(self) -> ConfigItem {
		ConfigItem {
			type_name: self.type_name,
			name: self.name,
			abstract_: self.abstract_,
			default_template: self.default_template,
			ignore_on_error: self.ignore_on_error,
			expression: RwLock::new(self.expression),
			filter: self.filter,
			scope: self.scope,
			debug_info: self.debug_info,
			zone: self.zone,
			package: self.package,
			creation_type: self.creation_type,
			activation_context: OnceLock::new(),
			object: RwLock::new(None),
			dropped: OnceLock::new(),
		}
	}
}
