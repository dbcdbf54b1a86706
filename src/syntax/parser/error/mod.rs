mod fmt;

use super::lexer::{self, Token, TokenKind};
use super::SourcePos;


/// What the parser was expecting when it found an unexpected token.
#[derive(Debug)]
pub enum Expected {
	Token(TokenKind),
	Description(&'static str),
}


/// A syntax error. The parser aborts on the first error.
#[derive(Debug)]
pub enum Error {
	/// An error from the lexer.
	Lexer(lexer::Error),
	/// Premature end of file.
	UnexpectedEof,
	/// Unexpected token.
	Unexpected {
		token: Token,
		expected: Expected,
	},
	/// An expression statement that is not a function call.
	InvalidStatement {
		pos: SourcePos,
	},
	/// An assignment target that is not an identifier or access expression.
	InvalidAssignment {
		pos: SourcePos,
	},
}


impl Error {
	pub fn unexpected_eof() -> Self {
		Self::UnexpectedEof
	}


	pub fn unexpected(token: Token, expected: TokenKind) -> Self {
		Self::Unexpected {
			token,
			expected: Expected::Token(expected),
		}
	}


	pub fn unexpected_msg(token: Token, expected: &'static str) -> Self {
		Self::Unexpected {
			token,
			expected: Expected::Description(expected),
		}
	}


	pub fn invalid_statement(pos: SourcePos) -> Self {
		Self::InvalidStatement { pos }
	}


	pub fn invalid_assignment(pos: SourcePos) -> Self {
		Self::InvalidAssignment { pos }
	}
}


impl From<lexer::Error> for Error {
	fn from(error: lexer::Error) -> Self {
		Self::Lexer(error)
	}
}
