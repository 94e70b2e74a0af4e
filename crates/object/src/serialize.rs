//! Attribute-filtered field (de)serialization.
//!
//! Used for the persistence record (`CONFIG` phase) and for handing
//! runtime state across a reload (`STATE` phase).

use serde_json::Map;

use crate::{ConfigObject, FieldAttrs, ObjectError, Value};

/// Serializes every field whose attributes intersect `attrs` into a
/// JSON object keyed by field name.
pub fn serialize_fields(object: &dyn ConfigObject, attrs: FieldAttrs) -> Result<Value, ObjectError> {
	let ty = object.reflection_type();
	let mut map = Map::new();
	for fid in 0..ty.field_count() {
		let Some(info) = ty.field_info(fid) else {
			continue;
		};
		if !info.attrs.intersects(attrs) {
			continue;
		}
		map.insert(info.name, object.field(fid)?);
	}
	Ok(Value::Object(map))
}

/// Writes back fields whose attributes intersect `attrs` from a JSON
/// object previously produced by [`serialize_fields`].
///
/// Fields absent from `value` are left untouched.
pub fn deserialize_fields(object: &dyn ConfigObject, value: &Value, attrs: FieldAttrs) -> Result<(), ObjectError> {
	let Value::Object(map) = value else {
		return Ok(());
	};
	let ty = object.reflection_type();
	for fid in 0..ty.field_count() {
		let Some(info) = ty.field_info(fid) else {
			continue;
		};
		if !info.attrs.intersects(attrs) {
			continue;
		}
		if let Some(field_value) = map.get(&info.name) {
			object.set_field(fid, field_value.clone())?;
		}
	}
	Ok(())
}
