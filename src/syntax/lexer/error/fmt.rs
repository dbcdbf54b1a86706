use std::fmt::{self, Display};

use super::{Error, ErrorKind};


impl Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::UnexpectedEof => "unexpected end of file".fmt(f),

			Self::Unexpected(value) => write!(f, "unexpected '{}'", *value as char),

			Self::InvalidEscapeSequence(sequence) => write!(
				f,
				"invalid escape sequence: {}",
				String::from_utf8_lossy(sequence)
			),

			Self::InvalidNumber(number) => {
				write!(f, "malformed number: {}", String::from_utf8_lossy(number))
			}

			Self::InvalidLongBracket => "malformed long bracket delimiter".fmt(f),

			Self::UnterminatedString => "unterminated string literal".fmt(f),

			Self::UnterminatedLongBracket => "unterminated long bracket".fmt(f),
		}
	}
}


impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} - {}.", self.pos, self.error)
	}
}
