//! Error types for the object model.

use thiserror::Error;

/// Errors raised by objects, types, and their lifecycle callbacks.
#[derive(Debug, Error)]
pub enum ObjectError {
	/// A field id outside the type's field table.
	#[error("unknown field id {0}")]
	UnknownField(usize),

	/// A field rejected the assigned value.
	#[error("field '{field}' rejected value: {message}")]
	InvalidField {
		/// Field name.
		field: String,
		/// Why the value was rejected.
		message: String,
	},

	/// Attribute validation failed.
	#[error("validation failed for '{attribute}': {message}")]
	Validation {
		/// Dotted attribute path that failed.
		attribute: String,
		/// Validation message.
		message: String,
	},

	/// An instance with this name is already registered for the type.
	#[error("an object of type '{type_name}' and name '{name}' already exists")]
	DuplicateObject {
		/// Type name.
		type_name: String,
		/// Object name.
		name: String,
	},

	/// A lifecycle callback failed.
	#[error("{0}")]
	Callback(String),
}

impl ObjectError {
	/// Shorthand for a callback failure.
	pub fn callback(message: impl Into<String>) -> Self {
		Self::Callback(message.into())
	}
}
