//! Error types for configuration compilation.

use thiserror::Error;
use vigil_object::{DebugInfo, ObjectError, Value};

use crate::eval::EvalError;

/// Errors that can occur while committing, activating, or reloading
/// configuration items.
#[derive(Debug, Error)]
pub enum CompileError {
	/// The declared type is not a known object type.
	#[error("type '{type_name}' does not exist ({debug_info})")]
	TypeNotFound {
		/// Declared type name.
		type_name: String,
		/// Where the declaration came from.
		debug_info: DebugInfo,
	},

	/// A declaration of the same (type, name) already exists.
	#[error(
		"a configuration item of type '{type_name}' and name '{name}' already exists ({existing}), new declaration: {new}"
	)]
	DuplicateDeclaration {
		type_name: String,
		name: String,
		/// Span of the first declaration.
		existing: DebugInfo,
		/// Span of the rejected declaration.
		new: DebugInfo,
	},

	/// A composite-named declaration materialized with an empty name.
	#[error("object name must not be empty ({debug_info})")]
	EmptyName { debug_info: DebugInfo },

	/// The type's name composer could not derive a canonical name.
	#[error("could not determine name for object of type '{type_name}' from '{name}'")]
	NameComposition { type_name: String, name: String },

	/// The declaration's expression failed to evaluate.
	#[error("evaluation of '{name}' failed: {source}")]
	Evaluation {
		name: String,
		#[source]
		source: EvalError,
	},

	/// Config-phase validation failed.
	#[error("validation of '{name}' failed: {message}")]
	Validation {
		name: String,
		message: String,
		/// Attribute-source map collected during evaluation.
		hints: Option<Value>,
	},

	/// The object's config-loaded callback failed.
	#[error("config-loaded callback for '{name}' failed: {source}")]
	LoadCallback {
		name: String,
		#[source]
		source: ObjectError,
	},

	/// The object's all-config-loaded callback failed.
	#[error("all-config-loaded callback for '{name}' failed: {source}")]
	AllLoaded {
		name: String,
		#[source]
		source: ObjectError,
	},

	/// Child-object expansion failed.
	#[error("child-object expansion for '{name}' failed: {source}")]
	ChildObjects {
		name: String,
		#[source]
		source: ObjectError,
	},

	/// Child expansion kept producing new declarations past the
	/// configured depth cap.
	#[error("child-object expansion exceeded {depth} levels without reaching a fixed point")]
	ChildExpansionDivergence { depth: usize },

	/// The registered object types have a load-dependency cycle.
	#[error("load dependencies of types [{}] form a cycle", .remaining.join(", "))]
	DependencyCycle { remaining: Vec<String> },

	/// A reload callback did not produce a replacement object.
	#[error("reload failed: {0}")]
	ReloadFailed(String),

	/// One or more queued tasks failed; the batch was rolled back.
	#[error("{failed} task(s) failed while processing the batch")]
	BatchAborted { failed: usize },

	/// An object-model operation failed.
	#[error(transparent)]
	Object(#[from] ObjectError),
}

/// Result type for compilation operations.
pub type Result<T> = std::result::Result<T, CompileError>;
