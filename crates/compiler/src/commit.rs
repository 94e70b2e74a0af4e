//! The commit pipeline.
//!
//! One declaration at a time: materialize, compose the canonical name,
//! validate, run the load callback, persist, register. Batches run in
//! parallel on a work queue, then the dependency-ordered all-loaded
//! pass fires cross-object callbacks and expands child declarations to
//! a fixed point.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use vigil_object::{ConfigObject, ConfigType, FieldAttrs, ValidationUtils, serialize_fields};
use vigil_worker::WorkQueue;

use crate::Compiler;
use crate::context::{ActivationContext, ActivationScope};
use crate::error::{CompileError, Result};
use crate::eval::{DebugHints, Frame};
use crate::item::ConfigItem;
use crate::sink::CompiledObject;

/// Name-existence checks backed by the engine's item registry.
struct DefaultValidationUtils<'a> {
	compiler: &'a Compiler,
}

impl ValidationUtils for DefaultValidationUtils<'_> {
	fn validate_name(&self, type_name: &str, name: &str) -> bool {
		self.compiler
			.item(type_name, name)
			.is_some_and(|item| !item.is_abstract())
	}
}

impl Compiler {
	/// Materializes one declaration into a live, validated, registered
	/// object.
	///
	/// Returns `None` for abstract declarations and for declarations
	/// dropped via ignore-on-error. `discard_expression` releases the
	/// body after evaluation; it is not needed again.
	pub fn commit(
		&self,
		item: &Arc<ConfigItem>,
		discard_expression: bool,
	) -> Result<Option<Arc<dyn ConfigObject>>> {
		let Some(ty) = self.types().get(item.type_name()) else {
			return Err(CompileError::TypeNotFound {
				type_name: item.type_name().to_string(),
				debug_info: item.debug_info().clone(),
			});
		};

		if item.is_abstract() {
			return Ok(None);
		}

		tracing::debug!(ty = %item.type_name(), name = %item.name(), "config.item.commit");

		let object = ty.instantiate()?;
		object.set_debug_info(item.debug_info().clone());
		object.set_zone_name(item.zone());
		object.set_package(item.package());
		object.set_creation_type(item.creation_type());
		object.set_name(item.name());

		let mut hints = DebugHints::default();
		let mut frame = Frame::for_object(Arc::clone(&object));
		for (key, value) in item.scope() {
			frame.locals.insert(key.clone(), value.clone());
		}

		if let Some(expression) = item.expression()
			&& let Err(source) = expression.evaluate(&mut frame, &mut hints)
		{
			return self.ignore_or_fail(
				item,
				CompileError::Evaluation {
					name: item.name().to_string(),
					source,
				},
			);
		}

		if discard_expression {
			item.discard_expression();
		}

		let short_name = object.short_name();
		let item_name = if short_name.is_empty() {
			item.name().to_string()
		} else {
			object.set_name(&short_name);
			short_name
		};

		let mut name = item_name.clone();
		if let Some(composer) = ty.name_composer() {
			if name.is_empty() {
				return Err(CompileError::EmptyName {
					debug_info: item.debug_info().clone(),
				});
			}
			name = composer
				.make_name(&name, object.as_ref())
				.filter(|composed| !composed.is_empty())
				.ok_or_else(|| CompileError::NameComposition {
					type_name: ty.name().to_string(),
					name: name.clone(),
				})?;
		}

		if name != item_name {
			object.set_short_name(&item_name);
		}
		object.set_name(&name);

		let utils = DefaultValidationUtils { compiler: self };
		if let Err(error) = object.validate(FieldAttrs::CONFIG, &utils) {
			return self.ignore_or_fail(
				item,
				CompileError::Validation {
					name: item.name().to_string(),
					message: error.to_string(),
					hints: Some(hints.to_value()),
				},
			);
		}

		if let Err(source) = object.on_config_loaded() {
			return self.ignore_or_fail(
				item,
				CompileError::LoadCallback {
					name: item.name().to_string(),
					source,
				},
			);
		}

		self.sink.write_object(CompiledObject {
			type_name: ty.name().to_string(),
			name: item.name().to_string(),
			properties: serialize_fields(object.as_ref(), FieldAttrs::CONFIG)?,
			debug_hints: hints.to_value(),
			debug_info: CompiledObject::debug_info_tuple(item.debug_info()),
		});

		ty.register_instance(Arc::clone(&object))?;
		item.set_object(Arc::clone(&object));

		Ok(Some(object))
	}

	/// Drops the item if it is ignore-on-error, recording its source
	/// path; otherwise fails with `error`.
	fn ignore_or_fail(
		&self,
		item: &Arc<ConfigItem>,
		error: CompileError,
	) -> Result<Option<Arc<dyn ConfigObject>>> {
		if !item.is_ignore_on_error() {
			return Err(error);
		}
		tracing::debug!(
			name = %item.name(),
			ty = %item.type_name(),
			error = %error,
			"config.object.ignored"
		);
		item.mark_dropped();
		self.items.record_ignored(item.debug_info().path.clone());
		Ok(None)
	}

	/// Commits every declaration pending for `context`, then drives the
	/// dependency-ordered all-loaded pass and child expansion to a
	/// fixed point. New declarations appended by child expansion
	/// recurse through the same pipeline.
	fn commit_pending(
		&self,
		context: Option<&Arc<ActivationContext>>,
		queue: &WorkQueue,
		new_items: &mut Vec<Arc<ConfigItem>>,
		depth: usize,
	) -> Result<()> {
		if depth >= self.options.max_child_expansion_depth {
			return Err(CompileError::ChildExpansionDivergence { depth });
		}

		let (named, unnamed) = self.items.drain_pending(context);
		let batch: Vec<(Arc<ConfigItem>, bool)> = named
			.into_iter()
			.map(|item| (item, false))
			.chain(unnamed.into_iter().map(|item| (item, true)))
			.collect();

		if batch.is_empty() {
			return Ok(());
		}

		for (item, discard) in &batch {
			new_items.push(Arc::clone(item));
			let engine = self.shared();
			let item = Arc::clone(item);
			let discard = *discard;
			queue.enqueue(move || engine.commit(&item, discard).map(|_| ()).map_err(Into::into));
		}

		queue.join();
		if queue.has_failures() {
			return Err(CompileError::BatchAborted {
				failed: queue.failure_count(),
			});
		}

		// Fire on_all_config_loaded per type stratum, expanding child
		// objects once a type's dependencies have completed theirs.
		let types = self.types().all();
		let mut completed: FxHashSet<String> = FxHashSet::default();

		while completed.len() != types.len() {
			let before = completed.len();

			for ty in &types {
				if completed.contains(ty.name()) {
					continue;
				}

				let unresolved = ty
					.load_dependencies()
					.iter()
					.any(|dep| self.types().get(dep).is_some() && !completed.contains(dep));
				if unresolved {
					continue;
				}

				for (item, _) in &batch {
					let Some(object) = item.object() else {
						continue;
					};
					if item.type_name() != ty.name() {
						continue;
					}
					let engine = self.shared();
					let item = Arc::clone(item);
					queue.enqueue(move || match object.on_all_config_loaded() {
						Ok(()) => Ok(()),
						Err(source) => {
							let error = CompileError::AllLoaded {
								name: item.name().to_string(),
								source,
							};
							if !item.is_ignore_on_error() {
								return Err(error.into());
							}
							tracing::debug!(
								name = %item.name(),
								ty = %item.type_name(),
								error = %error,
								"config.object.ignored"
							);
							engine.unregister_item(&item);
							item.mark_dropped();
							engine.items.record_ignored(item.debug_info().path.clone());
							Ok(())
						}
					});
				}

				completed.insert(ty.name().to_string());

				queue.join();
				if queue.has_failures() {
					return Err(CompileError::BatchAborted {
						failed: queue.failure_count(),
					});
				}

				for dep in ty.load_dependencies() {
					for (item, _) in &batch {
						let Some(object) = item.object() else {
							continue;
						};
						if item.type_name() != dep {
							continue;
						}
						let child_type: Arc<dyn ConfigType> = Arc::clone(ty);
						let item = Arc::clone(item);
						queue.enqueue(move || {
							let _scope = ActivationScope::enter(item.activation_context());
							object.create_child_objects(&child_type).map_err(|source| {
								CompileError::ChildObjects {
									name: item.name().to_string(),
									source,
								}
								.into()
							})
						});
					}
				}

				queue.join();
				if queue.has_failures() {
					return Err(CompileError::BatchAborted {
						failed: queue.failure_count(),
					});
				}

				self.commit_pending(context, queue, new_items, depth + 1)?;
			}

			if completed.len() == before {
				let remaining = types
					.iter()
					.filter(|ty| !completed.contains(ty.name()))
					.map(|ty| ty.name().to_string())
					.collect();
				return Err(CompileError::DependencyCycle { remaining });
			}
		}

		Ok(())
	}

	/// Commits the batch pending for `context`.
	///
	/// On success `new_items` holds every materialized declaration; on
	/// failure every declaration the batch introduced is unregistered
	/// and the queue's collected failures are reported under the
	/// `config` category.
	pub fn commit_items(
		&self,
		context: Option<&Arc<ActivationContext>>,
		queue: &WorkQueue,
		new_items: &mut Vec<Arc<ConfigItem>>,
		silent: bool,
	) -> Result<()> {
		if !silent {
			tracing::info!("Committing config item(s).");
		}

		if let Err(error) = self.commit_pending(context, queue, new_items, 0) {
			queue.report_failures("config");
			for item in new_items.iter() {
				self.unregister_item(item);
			}
			return Err(error);
		}

		new_items.retain(|item| item.object().is_some());

		if !silent {
			let mut counts: FxHashMap<String, (usize, Arc<dyn ConfigType>)> = FxHashMap::default();
			for item in new_items.iter() {
				let Some(object) = item.object() else {
					continue;
				};
				let ty = object.reflection_type();
				counts
					.entry(ty.name().to_string())
					.and_modify(|entry| entry.0 += 1)
					.or_insert((1, ty));
			}
			let mut names: Vec<_> = counts.keys().cloned().collect();
			names.sort();
			for name in names {
				let (count, ty) = &counts[&name];
				let label = if *count != 1 { ty.plural_name() } else { ty.name().to_string() };
				tracing::info!("Instantiated {count} {label}.");
			}
		}

		Ok(())
	}
}
