//! The reload-object protocol.
//!
//! Snapshot-deletes the dependency closure of a live object, rebuilds
//! it via a user callback under a fresh activation context, then either
//! restores state into the new incarnation or rolls the originals back.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use vigil_object::{
	ConfigObject, ConfigType, FieldAttrs, ObjectError, Value, deserialize_fields, serialize_fields,
};

use crate::Compiler;
use crate::context::ActivationScope;
use crate::error::{CompileError, Result};
use crate::eval::{DebugHints, EvalError, Expression, Frame, expression_fn};
use crate::item::{ConfigItem, ConfigItemBuilder};

/// One node of the deleted closure, in discovery order.
struct DeletedObject {
	object: Arc<dyn ConfigObject>,
	item: Option<Arc<ConfigItem>>,
}

/// Shallow-copies every `CONFIG`-flagged field from `source` into
/// `destination`.
fn migrate_config_fields(source: &dyn ConfigObject, destination: &dyn ConfigObject) -> std::result::Result<(), ObjectError> {
	let ty = source.reflection_type();
	for fid in 0..ty.field_count() {
		let Some(info) = ty.field_info(fid) else {
			continue;
		};
		if !info.attrs.intersects(FieldAttrs::CONFIG) {
			continue;
		}
		destination.set_field(fid, source.field(fid)?)?;
	}
	Ok(())
}

impl Compiler {
	/// Atomically replaces a live object with a fresh version rebuilt
	/// by `callback`, preserving downstream state where possible.
	///
	/// With `destroy_first == false` the engine builds a synthetic
	/// declaration that imports default templates, migrates the
	/// original's `CONFIG` fields, and then invokes `callback` in the
	/// new object's frame. With `destroy_first == true` the callback
	/// alone is expected to recreate the object from scratch.
	///
	/// Any rebuild failure triggers a full rollback of the deleted
	/// closure before the error propagates.
	pub fn reload_object(
		&self,
		object: &Arc<dyn ConfigObject>,
		destroy_first: bool,
		callback: Arc<dyn Expression>,
	) -> Result<()> {
		let mut deleted = Vec::new();
		let mut visited = FxHashSet::default();
		self.delete_closure(object, &mut deleted, &mut visited);

		let ty = object.reflection_type();
		let name = object.name();

		match self.rebuild_object(&ty, &name, object, destroy_first, &callback) {
			Ok(()) => self.restore_objects(&deleted, false),
			Err(error) => {
				if let Err(restore_error) = self.restore_objects(&deleted, true) {
					tracing::error!(error = %restore_error, "config.reload.restore_failed");
				}
				Err(error)
			}
		}
	}

	/// Depth-first walk over the dependency-graph parents: records each
	/// node, marks it deleted, deactivates it, and unregisters it
	/// (item-level when a declaration exists, object-level otherwise).
	fn delete_closure(
		&self,
		object: &Arc<dyn ConfigObject>,
		deleted: &mut Vec<DeletedObject>,
		visited: &mut FxHashSet<(String, String)>,
	) {
		let ty = object.reflection_type();
		let name = object.name();
		if !visited.insert((ty.name().to_string(), name.clone())) {
			return;
		}

		let item = self.item(ty.name(), &name);
		deleted.push(DeletedObject {
			object: Arc::clone(object),
			item: item.clone(),
		});

		for parent in self.graph().parents(object.as_ref()) {
			self.delete_closure(&parent, deleted, visited);
		}

		tracing::warn!(name = %name, ty = %ty.name(), "Deactivating object for reload");

		object.set_extension("ConfigObjectDeleted", Value::Bool(true));
		if let Err(error) = object.deactivate(true) {
			tracing::warn!(name = %name, error = %error, "config.reload.deactivate_failed");
		}

		match &item {
			Some(item) => self.unregister_item(item),
			None => ty.unregister_instance(&name),
		}
	}

	fn rebuild_object(
		&self,
		ty: &Arc<dyn ConfigType>,
		name: &str,
		source: &Arc<dyn ConfigObject>,
		destroy_first: bool,
		callback: &Arc<dyn Expression>,
	) -> Result<()> {
		if destroy_first {
			let callback = Arc::clone(callback);
			let name = name.to_string();
			self.run_with_activation_context(move || {
				let mut frame = Frame::new();
				let mut hints = DebugHints::default();
				callback
					.evaluate(&mut frame, &mut hints)
					.map_err(|source| CompileError::Evaluation { name, source })
			})?;
		} else {
			let item = ConfigItemBuilder::new(ty.name())
				.name(name)
				.creation_type("object")
				.expression(self.reload_expression(ty, source, callback))
				.build();
			self.run_with_activation_context(|| self.register_item(item).map(|_| ()))?;
		}

		if ty.instance(name).is_none() {
			return Err(CompileError::ReloadFailed(
				"callback failed to re-create the object".to_string(),
			));
		}

		Ok(())
	}

	/// Builds the synthetic declaration body: import default templates,
	/// migrate `CONFIG` fields from the deleted original, then hand the
	/// frame to the user callback.
	fn reload_expression(
		&self,
		ty: &Arc<dyn ConfigType>,
		source: &Arc<dyn ConfigObject>,
		callback: &Arc<dyn Expression>,
	) -> Arc<dyn Expression> {
		let compiler = self.weak.clone();
		let type_name = ty.name().to_string();
		let source = Arc::clone(source);
		let callback = Arc::clone(callback);

		expression_fn(move |frame, hints| {
			let Some(compiler) = compiler.upgrade() else {
				return Err(EvalError::new("engine dropped during reload"));
			};
			let Some(this) = frame.this.clone() else {
				return Err(EvalError::new("reload expression requires an object frame"));
			};

			for template in compiler.default_templates_of(&type_name) {
				if let Some(expression) = template.expression() {
					expression.evaluate(frame, hints)?;
				}
			}

			migrate_config_fields(source.as_ref(), this.as_ref())
				.map_err(|error| EvalError::new(error.to_string()))?;

			callback.evaluate(frame, hints)
		})
	}

	/// Walks the deleted closure in discovery order: hands `STATE`
	/// fields to re-created objects, and fully resurrects originals
	/// that were not re-created when `recover_apply` is set or the
	/// object was directly declared.
	fn restore_objects(&self, deleted: &[DeletedObject], recover_apply: bool) -> Result<()> {
		let _scope = ActivationScope::new();

		for entry in deleted {
			let old = &entry.object;
			let ty = old.reflection_type();
			let name = old.name();

			if let Some(new_object) = ty.instance(&name) {
				tracing::warn!(name = %name, ty = %ty.name(), "Restoring state for newly-created object");
				let state = serialize_fields(old.as_ref(), FieldAttrs::STATE)?;
				deserialize_fields(new_object.as_ref(), &state, FieldAttrs::STATE)?;
			} else if recover_apply || old.creation_type() == "object" {
				tracing::warn!(name = %name, ty = %ty.name(), "Recovering object");

				old.set_extension("ConfigObjectDeleted", Value::Bool(false));
				if let Some(item) = &entry.item {
					self.items.register(item, self.types())?;
				}
				old.on_config_loaded()
					.map_err(|source| CompileError::LoadCallback { name: name.clone(), source })?;
				ty.register_instance(Arc::clone(old))?;
				old.on_all_config_loaded()
					.map_err(|source| CompileError::AllLoaded { name: name.clone(), source })?;
				old.pre_activate()?;
				old.activate(true)?;
			}
		}

		Ok(())
	}
}
