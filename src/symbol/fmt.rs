use super::{Interner, Symbol};
use crate::fmt::Display;


impl<'a> Display<'a> for Symbol {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut std::fmt::Formatter<'_>, context: Self::Context) -> std::fmt::Result {
		let ident = context
			.resolve(*self)
			.unwrap_or(b"<invalid symbol>");

		write!(f, "{}", String::from_utf8_lossy(ident))
	}
}
