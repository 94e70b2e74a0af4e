use serde::{Deserialize, Serialize};

/// Field attribute bits.
///
/// This is a bitflags-style struct for combining multiple attributes.
/// `CONFIG` marks user-declared configuration fields, `STATE` marks
/// runtime state carried across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldAttrs(u8);

impl FieldAttrs {
	pub const NONE: Self = Self(0);
	pub const CONFIG: Self = Self(1 << 0);
	pub const STATE: Self = Self(1 << 1);

	/// Creates an empty attribute set.
	#[inline]
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Returns true if no attributes are set.
	#[inline]
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Returns true if every bit of `other` is set in `self`.
	#[inline]
	pub const fn contains(self, other: Self) -> bool {
		(self.0 & other.0) == other.0
	}

	/// Returns true if any bit of `other` is set in `self`.
	#[inline]
	pub const fn intersects(self, other: Self) -> bool {
		(self.0 & other.0) != 0
	}

	/// Combines two attribute sets.
	#[inline]
	pub const fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	/// Returns the raw bits for conversion.
	#[inline]
	pub const fn bits(self) -> u8 {
		self.0
	}

	/// Creates an attribute set from raw bits.
	#[inline]
	pub const fn from_bits(bits: u8) -> Self {
		Self(bits)
	}
}

impl std::ops::BitOr for FieldAttrs {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self::Output {
		self.union(rhs)
	}
}

impl std::ops::BitOrAssign for FieldAttrs {
	fn bitor_assign(&mut self, rhs: Self) {
		*self = self.union(rhs);
	}
}

/// Metadata for one field of a [`crate::ConfigType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
	pub name: String,
	pub attrs: FieldAttrs,
}

impl FieldInfo {
	/// Creates field metadata.
	pub fn new(name: impl Into<String>, attrs: FieldAttrs) -> Self {
		Self {
			name: name.into(),
			attrs,
		}
	}
}
