mod fmt;

use super::SourcePos;


/// The kind of lexical error.
#[derive(Debug)]
pub enum ErrorKind {
	/// Unexpected end of file.
	UnexpectedEof,
	/// Unexpected character.
	Unexpected(u8),
	/// Invalid escape sequence in a string literal.
	InvalidEscapeSequence(Box<[u8]>),
	/// Invalid number literal.
	InvalidNumber(Box<[u8]>),
	/// Malformed long bracket delimiter ([=*[ without the closing bracket).
	InvalidLongBracket,
	/// Unterminated short string literal.
	UnterminatedString,
	/// Unterminated long string literal or long comment.
	UnterminatedLongBracket,
}


/// A lexical error.
#[derive(Debug)]
pub struct Error {
	pub error: ErrorKind,
	pub pos: SourcePos,
}


impl std::error::Error for Error {}


impl Error {
	pub fn unexpected_eof(pos: SourcePos) -> Self {
		Self { error: ErrorKind::UnexpectedEof, pos }
	}


	pub fn unexpected(input: u8, pos: SourcePos) -> Self {
		Self { error: ErrorKind::Unexpected(input), pos }
	}


	pub fn invalid_escape_sequence(sequence: &[u8], pos: SourcePos) -> Self {
		Self {
			error: ErrorKind::InvalidEscapeSequence(sequence.into()),
			pos,
		}
	}


	pub fn invalid_number(number: &[u8], pos: SourcePos) -> Self {
		Self {
			error: ErrorKind::InvalidNumber(number.into()),
			pos,
		}
	}


	pub fn invalid_long_bracket(pos: SourcePos) -> Self {
		Self { error: ErrorKind::InvalidLongBracket, pos }
	}


	pub fn unterminated_string(pos: SourcePos) -> Self {
		Self { error: ErrorKind::UnterminatedString, pos }
	}


	pub fn unterminated_long_bracket(pos: SourcePos) -> Self {
		Self { error: ErrorKind::UnterminatedLongBracket, pos }
	}
}
