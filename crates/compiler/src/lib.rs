//! Configuration item compilation and activation.
//!
//! The compiler takes a batch of evaluated declarations ([`ConfigItem`])
//! tagged with an [`ActivationContext`], materializes them into live
//! objects on a shared [`vigil_worker::WorkQueue`], runs the
//! dependency-ordered all-loaded pass with child-object expansion to a
//! fixed point, activates the result, and supports live object reload
//! with state preservation.

mod activate;
mod commit;
mod context;
mod error;
mod eval;
mod item;
mod options;
mod registry;
mod reload;
mod sink;

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use vigil_object::{DependencyGraph, TypeRegistry};

pub use context::{ActivationContext, ActivationScope};
pub use error::{CompileError, Result};
pub use eval::{DebugHints, EvalError, Expression, Frame, expression_fn};
pub use item::{ConfigItem, ConfigItemBuilder};
pub use options::CompilerOptions;
pub use sink::{CompiledObject, CompiledSink, MemorySink, NullSink};

use registry::ItemRegistry;

/// The configuration engine handle.
///
/// Owns the item registry, the type table, the dependency graph, the
/// persistence sink, and the activation lock. The original daemon keeps
/// these as process-wide state; callers here share one `Arc<Compiler>`
/// instead, which keeps independent engines (and tests) isolated.
pub struct Compiler {
	types: Arc<TypeRegistry>,
	graph: Arc<DependencyGraph>,
	sink: Arc<dyn CompiledSink>,
	options: CompilerOptions,
	items: ItemRegistry,
	activation: Mutex<()>,
	mod_attrs: RwLock<Option<Arc<dyn Expression>>>,
	weak: Weak<Compiler>,
}

impl Compiler {
	/// Creates an engine with default options, a fresh dependency
	/// graph, and no persistence sink.
	pub fn new(types: Arc<TypeRegistry>) -> Arc<Self> {
		Self::builder(types).build()
	}

	/// Starts building an engine.
	pub fn builder(types: Arc<TypeRegistry>) -> CompilerBuilder {
		CompilerBuilder {
			types,
			graph: None,
			sink: None,
			options: CompilerOptions::default(),
		}
	}

	/// The engine's type table.
	pub fn types(&self) -> &Arc<TypeRegistry> {
		&self.types
	}

	/// The inter-object dependency edges consulted during reload.
	pub fn graph(&self) -> &Arc<DependencyGraph> {
		&self.graph
	}

	/// The engine's tunables.
	pub fn options(&self) -> &CompilerOptions {
		&self.options
	}

	/// A fresh strong handle, for task closures outliving the borrow.
	///
	/// Callers always reach the engine through an `Arc`, so the upgrade
	/// cannot fail while a method runs.
	pub(crate) fn shared(&self) -> Arc<Compiler> {
		self.weak.upgrade().expect("engine accessed during teardown")
	}

	/// Sets the expression restoring operator overrides, evaluated at
	/// activation when requested.
	pub fn set_mod_attrs(&self, expression: Option<Arc<dyn Expression>>) {
		*self.mod_attrs.write() = expression;
	}

	/// Registers a declaration under the current activation context.
	pub fn register_item(&self, item: ConfigItem) -> Result<Arc<ConfigItem>> {
		let item = Arc::new(item);
		self.items.register(&item, &self.types)?;
		Ok(item)
	}

	/// Unregisters a declaration and tears down its object, if any.
	pub fn unregister_item(&self, item: &Arc<ConfigItem>) {
		self.items.unregister(item);
	}

	/// Looks up a declaration by (type, name).
	pub fn item(&self, type_name: &str, name: &str) -> Option<Arc<ConfigItem>> {
		self.items.get(type_name, name)
	}

	/// Snapshot of all declarations of one type.
	pub fn items_of(&self, type_name: &str) -> Vec<Arc<ConfigItem>> {
		self.items.items_of(type_name)
	}

	/// Snapshot of the default templates of one type.
	pub fn default_templates_of(&self, type_name: &str) -> Vec<Arc<ConfigItem>> {
		self.items.default_templates_of(type_name)
	}

	/// Snapshot of the source paths dropped via ignore-on-error.
	pub fn ignored_items(&self) -> Vec<PathBuf> {
		self.items.ignored_items()
	}

	/// Best-effort deletes recorded ignored paths containing `prefix`
	/// and clears the set.
	pub fn remove_ignored_items(&self, prefix: &str) {
		self.items.remove_ignored_items(prefix);
	}
}

impl std::fmt::Debug for Compiler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Compiler")
			.field("types", &self.types)
			.field("options", &self.options)
			.finish()
	}
}

/// Builder for [`Compiler`].
pub struct CompilerBuilder {
	types: Arc<TypeRegistry>,
	graph: Option<Arc<DependencyGraph>>,
	sink: Option<Arc<dyn CompiledSink>>,
	options: CompilerOptions,
}

impl CompilerBuilder {
	/// Shares an existing dependency graph.
	#[must_use]
	pub fn graph(mut self, graph: Arc<DependencyGraph>) -> Self {
		self.graph = Some(graph);
		self
	}

	/// Sets the persistence sink receiving compiled-object records.
	#[must_use]
	pub fn sink(mut self, sink: Arc<dyn CompiledSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Overrides the default options.
	#[must_use]
	pub fn options(mut self, options: CompilerOptions) -> Self {
		self.options = options;
		self
	}

	/// Finalizes the engine.
	pub fn build(self) -> Arc<Compiler> {
		Arc::new_cyclic(|weak| Compiler {
			types: self.types,
			graph: self.graph.unwrap_or_default(),
			sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
			options: self.options,
			items: ItemRegistry::default(),
			activation: Mutex::new(()),
			mod_attrs: RwLock::new(None),
			weak: weak.clone(),
		})
	}
}
