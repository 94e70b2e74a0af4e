use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source location of one declaration: path plus first/last line and
/// column of its span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
	pub path: PathBuf,
	pub first_line: u32,
	pub first_column: u32,
	pub last_line: u32,
	pub last_column: u32,
}

impl DebugInfo {
	/// Creates a debug location for a full span.
	pub fn new(path: impl Into<PathBuf>, first_line: u32, first_column: u32, last_line: u32, last_column: u32) -> Self {
		Self {
			path: path.into(),
			first_line,
			first_column,
			last_line,
			last_column,
		}
	}

	/// Creates a single-point location, for synthetic declarations.
	pub fn at(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
		Self::new(path, line, column, line, column)
	}
}

impl std::fmt::Display for DebugInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"in {}: {}:{}-{}:{}",
			self.path.display(),
			self.first_line,
			self.first_column,
			self.last_line,
			self.last_column
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_shows_path_and_span() {
		let di = DebugInfo::new("/etc/vigil/hosts.conf", 5, 1, 9, 2);
		assert_eq!(di.to_string(), "in /etc/vigil/hosts.conf: 5:1-9:2");
	}
}
