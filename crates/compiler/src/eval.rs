//! Expression seam and evaluation support.
//!
//! The AST evaluator lives in the parsing front-end; the compiler only
//! needs an opaque callable that populates a nascent object through an
//! evaluation [`Frame`], reporting attribute provenance into
//! [`DebugHints`].

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::json;
use thiserror::Error;
use vigil_object::{ConfigObject, DebugInfo, Value};

/// Failure of one expression evaluation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EvalError {
	pub message: String,
	pub debug_info: Option<DebugInfo>,
}

impl EvalError {
	/// Creates an evaluation error.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			debug_info: None,
		}
	}

	/// Attaches the source location of the failing expression.
	#[must_use]
	pub fn with_debug_info(mut self, debug_info: DebugInfo) -> Self {
		self.debug_info = Some(debug_info);
		self
	}
}

/// Evaluation frame: the object under construction plus the lexical
/// bindings visible to the expression.
pub struct Frame {
	pub this: Option<Arc<dyn ConfigObject>>,
	pub locals: FxHashMap<String, Value>,
}

impl Frame {
	/// Creates a frame with no bound object.
	pub fn new() -> Self {
		Self {
			this: None,
			locals: FxHashMap::default(),
		}
	}

	/// Creates a frame bound to a nascent object.
	pub fn for_object(object: Arc<dyn ConfigObject>) -> Self {
		Self {
			this: Some(object),
			locals: FxHashMap::default(),
		}
	}
}

impl Default for Frame {
	fn default() -> Self {
		Self::new()
	}
}

/// An evaluatable expression body.
///
/// Any `Fn(&mut Frame, &mut DebugHints) -> Result<(), EvalError>` is an
/// expression, so callers can pass closures directly.
pub trait Expression: Send + Sync {
	fn evaluate(&self, frame: &mut Frame, hints: &mut DebugHints) -> Result<(), EvalError>;
}

impl<F> Expression for F
where
	F: Fn(&mut Frame, &mut DebugHints) -> Result<(), EvalError> + Send + Sync,
{
	fn evaluate(&self, frame: &mut Frame, hints: &mut DebugHints) -> Result<(), EvalError> {
		self(frame, hints)
	}
}

/// Wraps a closure as a shared expression body.
pub fn expression_fn<F>(f: F) -> Arc<dyn Expression>
where
	F: Fn(&mut Frame, &mut DebugHints) -> Result<(), EvalError> + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Nested attribute-to-source map collected during evaluation and
/// consumed by validation diagnostics and the persistence record.
#[derive(Debug, Clone, Default)]
pub struct DebugHints {
	messages: Vec<(String, DebugInfo)>,
	properties: FxHashMap<String, DebugHints>,
}

impl DebugHints {
	/// Records a message at the current nesting level.
	pub fn add_message(&mut self, message: impl Into<String>, debug_info: DebugInfo) {
		self.messages.push((message.into(), debug_info));
	}

	/// Returns the hint node for one attribute, creating it on demand.
	pub fn attribute(&mut self, name: &str) -> &mut DebugHints {
		self.properties.entry(name.to_string()).or_default()
	}

	/// Returns whether no hints were collected.
	pub fn is_empty(&self) -> bool {
		self.messages.is_empty() && self.properties.is_empty()
	}

	/// Renders the tree as a JSON value of the form
	/// `{"messages": [...], "properties": {...}}`.
	pub fn to_value(&self) -> Value {
		let messages: Vec<Value> = self
			.messages
			.iter()
			.map(|(message, di)| {
				json!([
					message,
					di.path.display().to_string(),
					di.first_line,
					di.first_column,
					di.last_line,
					di.last_column
				])
			})
			.collect();

		let mut properties = serde_json::Map::new();
		let mut names: Vec<_> = self.properties.keys().collect();
		names.sort();
		for name in names {
			properties.insert(name.clone(), self.properties[name].to_value());
		}

		json!({
			"messages": messages,
			"properties": Value::Object(properties),
		})
	}
}
