use std::fmt;
use std::fmt::Display as _;

use super::{Error, Expected};
use crate::{
	fmt::{Display, Show},
	symbol::Interner,
};


impl<'a> Display<'a> for Expected {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::Token(token) => write!(f, "'{}'", Show(token, context)),
			Self::Description(description) => description.fmt(f),
		}
	}
}


impl<'a> Display<'a> for Error {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::Lexer(error) => error.fmt(f),

			Self::UnexpectedEof => "unexpected end of file".fmt(f),

			Self::Unexpected { token, expected } => write!(
				f,
				"{} - unexpected '{}', expected {}.",
				token.pos,
				Show(&token.kind, context),
				Show(expected, context),
			),

			Self::InvalidStatement { pos } => {
				write!(f, "{} - expected a statement, found an expression.", pos)
			}

			Self::InvalidAssignment { pos } => {
				write!(f, "{} - invalid assignment target.", pos)
			}
		}
	}
}
