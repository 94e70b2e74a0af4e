use std::cell::RefCell;
use std::sync::Arc;

/// Opaque identity token for one batch of pending declarations.
///
/// Contexts carry no payload; they exist so that a nested commit does
/// not drain items belonging to an outer batch. Equality is `Arc`
/// identity.
#[derive(Debug)]
pub struct ActivationContext(());

impl ActivationContext {
	/// Creates a fresh context identity.
	pub fn new() -> Arc<Self> {
		Arc::new(Self(()))
	}

	/// Compares two optional contexts by identity.
	pub fn matches(a: Option<&Arc<Self>>, b: Option<&Arc<Self>>) -> bool {
		match (a, b) {
			(Some(a), Some(b)) => Arc::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		}
	}
}

thread_local! {
	static STACK: RefCell<Vec<Arc<ActivationContext>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard that makes a context current for the enclosing scope.
///
/// Declarations registered while the scope is alive inherit its context.
/// Scopes nest; dropping pops the innermost entry.
#[derive(Debug)]
pub struct ActivationScope {
	context: Arc<ActivationContext>,
}

impl ActivationScope {
	/// Enters a scope with a fresh context.
	pub fn new() -> Self {
		Self::enter(None)
	}

	/// Enters a scope with the given context, or a fresh one if `None`.
	pub fn enter(context: Option<Arc<ActivationContext>>) -> Self {
		let context = context.unwrap_or_else(ActivationContext::new);
		STACK.with_borrow_mut(|stack| stack.push(Arc::clone(&context)));
		Self { context }
	}

	/// The context this scope made current.
	pub fn context(&self) -> Arc<ActivationContext> {
		Arc::clone(&self.context)
	}

	/// The innermost current context on this thread, if any.
	pub fn current() -> Option<Arc<ActivationContext>> {
		STACK.with_borrow(|stack| stack.last().cloned())
	}
}

impl Default for ActivationScope {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for ActivationScope {
	fn drop(&mut self) {
		STACK.with_borrow_mut(|stack| {
			stack.pop();
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn current_is_none_outside_scopes() {
		assert!(ActivationScope::current().is_none());
	}

	#[test]
	fn scopes_nest_and_unwind() {
		let outer = ActivationScope::new();
		let outer_ctx = outer.context();
		assert!(ActivationContext::matches(
			ActivationScope::current().as_ref(),
			Some(&outer_ctx)
		));

		{
			let inner = ActivationScope::new();
			assert!(!Arc::ptr_eq(&inner.context(), &outer_ctx));
			assert!(ActivationContext::matches(
				ActivationScope::current().as_ref(),
				Some(&inner.context())
			));
		}

		assert!(ActivationContext::matches(
			ActivationScope::current().as_ref(),
			Some(&outer_ctx)
		));
	}

	#[test]
	fn reentering_preserves_identity() {
		let scope = ActivationScope::new();
		let ctx = scope.context();
		drop(scope);

		let reentered = ActivationScope::enter(Some(Arc::clone(&ctx)));
		assert!(Arc::ptr_eq(&reentered.context(), &ctx));
	}

	#[test]
	fn contexts_compare_by_identity() {
		let a = ActivationContext::new();
		let b = ActivationContext::new();
		assert!(ActivationContext::matches(Some(&a), Some(&a)));
		assert!(!ActivationContext::matches(Some(&a), Some(&b)));
		assert!(ActivationContext::matches(None, None));
		assert!(!ActivationContext::matches(Some(&a), None));
	}
}
