//! The activation pipeline.
//!
//! Two serial phases, each parallelized over the work queue:
//! pre-activate, then activate. A single engine-wide mutex keeps
//! batches from overlapping at this step.

use std::sync::Arc;

use vigil_worker::WorkQueue;

use crate::Compiler;
use crate::context::ActivationScope;
use crate::error::{CompileError, Result};
use crate::eval::{DebugHints, Frame};
use crate::item::ConfigItem;

impl Compiler {
	/// Activates every not-yet-active object of the batch.
	///
	/// `runtime_created` distinguishes live reload (`true`) from the
	/// initial daemon startup (`false`). When `with_mod_attrs` is set,
	/// the engine's modified-attributes expression is evaluated first
	/// to restore operator overrides; its failure is logged but does
	/// not abort activation.
	pub fn activate_items(
		&self,
		queue: &WorkQueue,
		new_items: &[Arc<ConfigItem>],
		runtime_created: bool,
		silent: bool,
		with_mod_attrs: bool,
	) -> Result<()> {
		let _guard = self.activation.lock();

		if with_mod_attrs
			&& let Some(expression) = self.mod_attrs.read().clone()
		{
			let mut frame = Frame::new();
			let mut hints = DebugHints::default();
			if let Err(error) = expression.evaluate(&mut frame, &mut hints) {
				tracing::error!(error = %error, "config.mod_attrs.failed");
			}
		}

		for item in new_items {
			let Some(object) = item.object() else {
				continue;
			};
			if object.is_active() {
				continue;
			}
			tracing::trace!(
				name = %object.name(),
				ty = %object.reflection_type().name(),
				"config.object.pre_activate"
			);
			queue.enqueue(move || object.pre_activate().map_err(Into::into));
		}

		queue.join();
		if queue.has_failures() {
			let failed = queue.report_failures("ConfigItem");
			return Err(CompileError::BatchAborted { failed });
		}

		if !silent {
			tracing::info!("Triggering Start signal for config items");
		}

		for item in new_items {
			let Some(object) = item.object() else {
				continue;
			};
			if object.is_active() {
				continue;
			}
			tracing::trace!(
				name = %object.name(),
				ty = %object.reflection_type().name(),
				"config.object.activate"
			);
			queue.enqueue(move || object.activate(runtime_created).map_err(Into::into));
		}

		queue.join();
		if queue.has_failures() {
			let failed = queue.report_failures("ConfigItem");
			return Err(CompileError::BatchAborted { failed });
		}

		if !silent {
			tracing::info!("Activated all objects.");
		}

		Ok(())
	}

	/// Enters a fresh activation context, runs `f` (which is expected
	/// to register declarations), then silently commits and activates
	/// the batch on an engine-owned queue.
	pub fn run_with_activation_context<F>(&self, f: F) -> Result<()>
	where
		F: FnOnce() -> Result<()>,
	{
		let scope = ActivationScope::new();
		f()?;

		let queue = WorkQueue::new(
			"config-commit",
			self.options.queue_capacity,
			self.options.effective_parallelism(),
		);
		let context = Some(scope.context());
		let mut new_items = Vec::new();

		self.commit_items(context.as_ref(), &queue, &mut new_items, true)?;
		self.activate_items(&queue, &new_items, false, true, false)?;

		Ok(())
	}
}
