use std::ops::Deref;

use gc::{Gc, Finalize, Trace};


/// Strings in Lua are immutable byte sequences.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Trace, Finalize)]
pub struct Str(Gc<Box<[u8]>>);


impl Str {
	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self(self.0.clone())
	}


	/// Get the underlying slice.
	pub fn as_bytes(&self) -> &[u8] {
		self.as_ref()
	}


	/// Get the string length.
	pub fn len(&self) -> usize {
		self.0.len()
	}


	/// Whether the string is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}


	/// Concatenate two strings into a new one.
	pub fn concat(&self, other: &Self) -> Self {
		let mut bytes = Vec::with_capacity(self.len() + other.len());
		bytes.extend_from_slice(self.as_bytes());
		bytes.extend_from_slice(other.as_bytes());
		bytes.into()
	}


	/// Attempt to parse the string contents as a number, per Lua's string to number
	/// coercion.
	pub fn to_number(&self) -> Option<f64> {
		let text = std::str::from_utf8(self.as_bytes()).ok()?;
		let text = text.trim();

		if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
			u64::from_str_radix(hex, 16).ok().map(|value| value as f64)
		} else {
			text.parse().ok()
		}
	}
}


impl AsRef<[u8]> for Str {
	fn as_ref(&self) -> &[u8] {
		self.0.deref().deref()
	}
}


impl<'a> From<&'a [u8]> for Str {
	fn from(string: &'a [u8]) -> Self {
		Self(
			Gc::new(string.into())
		)
	}
}


impl From<Box<[u8]>> for Str {
	fn from(string: Box<[u8]>) -> Self {
		Self(
			Gc::new(string)
		)
	}
}


impl From<Vec<u8>> for Str {
	fn from(vec: Vec<u8>) -> Self {
		Self::from(vec.into_boxed_slice())
	}
}


impl<'a> From<&'a str> for Str {
	fn from(string: &'a str) -> Self {
		string.as_bytes().into()
	}
}


impl From<String> for Str {
	fn from(string: String) -> Self {
		string.into_bytes().into()
	}
}
