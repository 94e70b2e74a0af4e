use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use vigil_object::TypeRegistry;

use crate::context::{ActivationContext, ActivationScope};
use crate::error::CompileError;
use crate::item::ConfigItem;

type ItemMap = FxHashMap<String, Arc<ConfigItem>>;

#[derive(Default)]
struct Tables {
	items: FxHashMap<String, ItemMap>,
	default_templates: FxHashMap<String, ItemMap>,
	unnamed_items: Vec<Arc<ConfigItem>>,
	ignored_items: Vec<PathBuf>,
}

/// The table of pending and committed declarations, keyed by
/// (type, name).
///
/// All tables sit behind a single mutex; bulk operations snapshot under
/// the lock so no callback ever runs while it is held.
#[derive(Default)]
pub(crate) struct ItemRegistry {
	tables: Mutex<Tables>,
}

impl ItemRegistry {
	/// Registers a declaration, capturing the current activation
	/// context.
	///
	/// Non-abstract declarations of composite-named types go to the
	/// unnamed list (their final name is unknown until
	/// materialization); everything else is keyed by (type, name) and
	/// duplicate declarations are rejected with both spans.
	pub fn register(&self, item: &Arc<ConfigItem>, types: &TypeRegistry) -> Result<(), CompileError> {
		item.bind_context(ActivationScope::current());

		let composite = types
			.get(item.type_name())
			.is_some_and(|ty| ty.name_composer().is_some());

		let mut tables = self.tables.lock();

		if !item.is_abstract() && composite {
			tables.unnamed_items.push(Arc::clone(item));
			return Ok(());
		}

		let by_name = tables.items.entry(item.type_name().to_string()).or_default();
		if let Some(existing) = by_name.get(item.name()) {
			return Err(CompileError::DuplicateDeclaration {
				type_name: item.type_name().to_string(),
				name: item.name().to_string(),
				existing: existing.debug_info().clone(),
				new: item.debug_info().clone(),
			});
		}
		by_name.insert(item.name().to_string(), Arc::clone(item));

		if item.is_default_template() {
			tables
				.default_templates
				.entry(item.type_name().to_string())
				.or_default()
				.insert(item.name().to_string(), Arc::clone(item));
		}

		Ok(())
	}

	/// Unregisters a declaration and tears down its produced object,
	/// if any.
	pub fn unregister(&self, item: &Arc<ConfigItem>) {
		if let Some(object) = item.take_object() {
			object.reflection_type().unregister_instance(&object.name());
		}

		let mut tables = self.tables.lock();
		tables.unnamed_items.retain(|other| !Arc::ptr_eq(other, item));
		if let Some(by_name) = tables.items.get_mut(item.type_name())
			&& by_name.get(item.name()).is_some_and(|other| Arc::ptr_eq(other, item))
		{
			by_name.remove(item.name());
		}
		if let Some(by_name) = tables.default_templates.get_mut(item.type_name())
			&& by_name.get(item.name()).is_some_and(|other| Arc::ptr_eq(other, item))
		{
			by_name.remove(item.name());
		}
	}

	/// Point lookup by (type, name).
	pub fn get(&self, type_name: &str, name: &str) -> Option<Arc<ConfigItem>> {
		self.tables.lock().items.get(type_name)?.get(name).cloned()
	}

	/// Snapshot of all declarations of one type.
	pub fn items_of(&self, type_name: &str) -> Vec<Arc<ConfigItem>> {
		let tables = self.tables.lock();
		let Some(by_name) = tables.items.get(type_name) else {
			return Vec::new();
		};
		let mut items: Vec<_> = by_name.values().cloned().collect();
		items.sort_by(|a, b| a.name().cmp(b.name()));
		items
	}

	/// Snapshot of the default templates of one type.
	pub fn default_templates_of(&self, type_name: &str) -> Vec<Arc<ConfigItem>> {
		let tables = self.tables.lock();
		let Some(by_name) = tables.default_templates.get(type_name) else {
			return Vec::new();
		};
		let mut items: Vec<_> = by_name.values().cloned().collect();
		items.sort_by(|a, b| a.name().cmp(b.name()));
		items
	}

	/// Drains the declarations pending for `context`.
	///
	/// Returns `(named, unnamed)`. Matching unnamed entries are removed
	/// from the unnamed list; named entries stay registered so abstract
	/// templates and committed items remain discoverable.
	pub fn drain_pending(
		&self,
		context: Option<&Arc<ActivationContext>>,
	) -> (Vec<Arc<ConfigItem>>, Vec<Arc<ConfigItem>>) {
		let mut tables = self.tables.lock();

		let mut named = Vec::new();
		for by_name in tables.items.values() {
			for item in by_name.values() {
				if item.is_pending() && ActivationContext::matches(item.activation_context().as_ref(), context) {
					named.push(Arc::clone(item));
				}
			}
		}
		named.sort_by(|a, b| (a.type_name(), a.name()).cmp(&(b.type_name(), b.name())));

		let mut unnamed = Vec::new();
		let mut kept = Vec::new();
		for item in tables.unnamed_items.drain(..) {
			if !ActivationContext::matches(item.activation_context().as_ref(), context) {
				kept.push(item);
				continue;
			}
			if item.is_pending() {
				unnamed.push(item);
			}
		}
		tables.unnamed_items = kept;

		(named, unnamed)
	}

	/// Records the source path of a declaration dropped via
	/// ignore-on-error.
	pub fn record_ignored(&self, path: PathBuf) {
		self.tables.lock().ignored_items.push(path);
	}

	/// Snapshot of the recorded ignored paths.
	pub fn ignored_items(&self) -> Vec<PathBuf> {
		self.tables.lock().ignored_items.clone()
	}

	/// Best-effort deletes every recorded path containing `prefix` and
	/// clears the set.
	pub fn remove_ignored_items(&self, prefix: &str) {
		let mut tables = self.tables.lock();
		for path in &tables.ignored_items {
			if !path.to_string_lossy().contains(prefix) {
				continue;
			}
			tracing::debug!(path = %path.display(), "config.item.remove_ignored");
			let _ = std::fs::remove_file(path);
		}
		tables.ignored_items.clear();
	}
}

#[cfg(test)]
mod tests {
	use vigil_object::DebugInfo;

	use super::*;
	use crate::item::ConfigItemBuilder;

	fn types() -> TypeRegistry {
		TypeRegistry::new()
	}

	fn item(type_name: &str, name: &str) -> Arc<ConfigItem> {
		Arc::new(
			ConfigItemBuilder::new(type_name)
				.name(name)
				.debug_info(DebugInfo::at(format!("/etc/vigil/{name}.conf"), 1, 1))
				.build(),
		)
	}

	#[test]
	fn register_and_lookup() {
		let registry = ItemRegistry::default();
		let types = types();
		let a = item("Host", "a");
		registry.register(&a, &types).unwrap();

		assert!(registry.get("Host", "a").is_some());
		assert!(registry.get("Host", "b").is_none());
		assert_eq!(registry.items_of("Host").len(), 1);
	}

	#[test]
	fn duplicate_declaration_rejected() {
		let registry = ItemRegistry::default();
		let types = types();
		registry.register(&item("Host", "a"), &types).unwrap();

		let err = registry.register(&item("Host", "a"), &types).unwrap_err();
		assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
		assert!(registry.get("Host", "a").is_some());
	}

	#[test]
	fn default_templates_tracked() {
		let registry = ItemRegistry::default();
		let types = types();
		let tmpl = Arc::new(
			ConfigItemBuilder::new("Host")
				.name("base")
				.abstract_(true)
				.default_template(true)
				.build(),
		);
		registry.register(&tmpl, &types).unwrap();

		assert_eq!(registry.default_templates_of("Host").len(), 1);
		registry.unregister(&tmpl);
		assert!(registry.default_templates_of("Host").is_empty());
		assert!(registry.get("Host", "base").is_none());
	}

	#[test]
	fn drain_filters_by_context() {
		let registry = ItemRegistry::default();
		let types = types();

		let scope = ActivationScope::new();
		let a = item("Host", "a");
		registry.register(&a, &types).unwrap();
		let context = scope.context();
		drop(scope);

		// Different batch.
		let other_scope = ActivationScope::new();
		registry.register(&item("Host", "b"), &types).unwrap();
		drop(other_scope);

		let (named, unnamed) = registry.drain_pending(Some(&context));
		assert_eq!(named.len(), 1);
		assert_eq!(named[0].name(), "a");
		assert!(unnamed.is_empty());

		// Named items stay registered after the drain.
		assert!(registry.get("Host", "a").is_some());
	}

	#[test]
	fn abstract_items_never_drain() {
		let registry = ItemRegistry::default();
		let types = types();

		let scope = ActivationScope::new();
		let tmpl = Arc::new(ConfigItemBuilder::new("Host").name("base").abstract_(true).build());
		registry.register(&tmpl, &types).unwrap();

		let (named, unnamed) = registry.drain_pending(Some(&scope.context()));
		assert!(named.is_empty());
		assert!(unnamed.is_empty());
	}

	#[test]
	fn ignored_paths_recorded_and_cleared() {
		let registry = ItemRegistry::default();
		registry.record_ignored(PathBuf::from("/etc/vigil/bad.conf"));
		assert_eq!(registry.ignored_items().len(), 1);

		registry.remove_ignored_items("/nonexistent");
		assert!(registry.ignored_items().is_empty());
	}
}
