use super::{
	comment::Comment,
	root::Root,
	Cursor,
	Error,
	Literal,
	SourcePos,
	State,
	Token,
	TokenKind,
	Transition,
};


/// The current escape sequence state in a short string literal.
#[derive(Debug)]
enum Escape {
	/// Not in an escape sequence.
	None,
	/// A backslash has been consumed.
	Start { offset: usize, pos: SourcePos },
	/// A hexadecimal escape (\xXX).
	Hex { offset: usize, pos: SourcePos, digits: u8, value: u8 },
	/// A decimal escape (\ddd), up to three digits.
	Dec { offset: usize, pos: SourcePos, count: u8, value: u16 },
	/// A \z escape, which skips following whitespace.
	SkipWhitespace,
}


/// The state for lexing short string literals.
#[derive(Debug)]
pub(super) struct StringLiteral {
	/// The quote character, either single or double.
	quote: u8,
	/// The parsed bytes.
	value: Vec<u8>,
	/// The escape sequence state.
	escaping: Escape,
	/// The position of the literal.
	pos: SourcePos,
}


impl StringLiteral {
	pub fn at(quote: u8, cursor: &Cursor) -> Self {
		Self {
			quote,
			value: Vec::with_capacity(8), // We expect most literals to not be empty.
			escaping: Escape::None,
			pos: cursor.pos(),
		}
	}


	pub fn visit(mut self, cursor: &Cursor) -> Transition {
		match (&self.escaping, cursor.peek()) {
			// EOF while scanning a literal is always an error.
			(_, None) => Transition::error(Root, Error::unterminated_string(self.pos)),

			// Escaped character.
			(&Escape::Start { offset, pos }, Some(value)) => match value {
				b'a' => self.push_escaped(0x07),
				b'b' => self.push_escaped(0x08),
				b'f' => self.push_escaped(0x0C),
				b'n' => self.push_escaped(b'\n'),
				b'r' => self.push_escaped(b'\r'),
				b't' => self.push_escaped(b'\t'),
				b'v' => self.push_escaped(0x0B),
				b'\\' => self.push_escaped(b'\\'),
				b'"' => self.push_escaped(b'"'),
				b'\'' => self.push_escaped(b'\''),
				b'\n' => self.push_escaped(b'\n'),

				b'x' => {
					self.escaping = Escape::Hex { offset, pos, digits: 0, value: 0 };
					Transition::step(self)
				}

				c if c.is_ascii_digit() => {
					self.escaping = Escape::Dec {
						offset,
						pos,
						count: 1,
						value: (c - b'0') as u16,
					};
					Transition::step(self)
				}

				b'z' => {
					self.escaping = Escape::SkipWhitespace;
					Transition::step(self)
				}

				_ => {
					let sequence = &cursor.slice()[offset ..= cursor.offset()];
					Transition::error(Root, Error::invalid_escape_sequence(sequence, pos))
				}
			},

			// Hexadecimal escape digits.
			(&Escape::Hex { offset, pos, digits, value }, Some(c)) => {
				match (c as char).to_digit(16) {
					Some(digit) => {
						let value = value << 4 | digit as u8;

						if digits == 1 {
							self.push_escaped(value)
						} else {
							self.escaping = Escape::Hex { offset, pos, digits: digits + 1, value };
							Transition::step(self)
						}
					}

					None => {
						let sequence = &cursor.slice()[offset ..= cursor.offset()];
						Transition::error(Root, Error::invalid_escape_sequence(sequence, pos))
					}
				}
			}

			// Decimal escape digits.
			(&Escape::Dec { offset, pos, count, value }, Some(c)) => {
				if c.is_ascii_digit() && count < 3 {
					let value = value * 10 + (c - b'0') as u16;

					if value > u8::MAX as u16 {
						let sequence = &cursor.slice()[offset ..= cursor.offset()];
						Transition::error(Root, Error::invalid_escape_sequence(sequence, pos))
					} else {
						self.escaping = Escape::Dec { offset, pos, count: count + 1, value };
						Transition::step(self)
					}
				} else {
					self.value.push(value as u8);
					self.escaping = Escape::None;
					Transition::resume(self)
				}
			}

			// \z skips whitespace, including line breaks.
			(&Escape::SkipWhitespace, Some(c)) => {
				if c.is_ascii_whitespace() {
					Transition::step(self)
				} else {
					self.escaping = Escape::None;
					Transition::resume(self)
				}
			}

			// An unescaped line break is not allowed in a short string.
			(&Escape::None, Some(b'\n')) => {
				Transition::error(Root, Error::unterminated_string(self.pos))
			}

			// Closing quote.
			(&Escape::None, Some(c)) if c == self.quote => Transition::produce(
				Root,
				Token {
					kind: TokenKind::Literal(Literal::String(self.value.into())),
					pos: self.pos,
				},
			),

			// Begin of escape sequence.
			(&Escape::None, Some(b'\\')) => {
				self.escaping = Escape::Start { offset: cursor.offset(), pos: cursor.pos() };
				Transition::step(self)
			}

			// Ordinary character.
			(&Escape::None, Some(value)) => {
				self.value.push(value);
				Transition::step(self)
			}
		}
	}


	fn push_escaped(mut self, value: u8) -> Transition {
		self.value.push(value);
		self.escaping = Escape::None;
		Transition::step(self)
	}
}


impl From<StringLiteral> for State {
	fn from(state: StringLiteral) -> State {
		State::StringLiteral(state)
	}
}


/// Whether a long bracket delimits a string literal or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LongBracketMode {
	Comment,
	StringLiteral,
}


/// The state for lexing the opening long bracket delimiter ([, followed by a possibly
/// empty sequence of =, followed by [).
#[derive(Debug)]
pub(super) struct LongBracketOpen {
	mode: LongBracketMode,
	level: u8,
	pos: SourcePos,
}


impl LongBracketOpen {
	pub fn at(mode: LongBracketMode, cursor: &Cursor) -> Self {
		Self { mode, level: 0, pos: cursor.pos() }
	}


	pub fn visit(mut self, cursor: &Cursor) -> Transition {
		match cursor.peek() {
			Some(b'=') => {
				self.level += 1;
				Transition::step(self)
			}

			Some(b'[') => Transition::step(
				LongBracket::new(self.mode, self.level, self.pos)
			),

			// A malformed delimiter in a comment degrades to a plain line comment, as the
			// consumed characters are comment content anyway.
			_ if self.mode == LongBracketMode::Comment => Transition::resume(Comment),

			Some(_) => Transition::error(Root, Error::invalid_long_bracket(self.pos)),

			None => Transition::error(Root, Error::unexpected_eof(cursor.pos())),
		}
	}
}


impl From<LongBracketOpen> for State {
	fn from(state: LongBracketOpen) -> State {
		State::LongBracketOpen(state)
	}
}


/// The state for lexing the contents of a long bracketed string or comment, up to and
/// including the closing delimiter of matching level.
#[derive(Debug)]
pub(super) struct LongBracket {
	mode: LongBracketMode,
	level: u8,
	/// The collected bytes. Unused for comments.
	value: Vec<u8>,
	/// The amount of = consumed in a partial closing delimiter, if any.
	closing: Option<u8>,
	/// Whether we're still at the very beginning, where a leading line break is skipped.
	at_start: bool,
	pos: SourcePos,
}


impl LongBracket {
	pub fn new(mode: LongBracketMode, level: u8, pos: SourcePos) -> Self {
		Self {
			mode,
			level,
			value: Vec::new(),
			closing: None,
			at_start: true,
			pos,
		}
	}


	pub fn visit(mut self, cursor: &Cursor) -> Transition {
		match (self.closing, cursor.peek()) {
			(_, None) => Transition::error(Root, Error::unterminated_long_bracket(self.pos)),

			// Partial closing delimiter.
			(Some(count), Some(b'=')) => {
				self.closing = Some(count + 1);
				Transition::step(self)
			}

			(Some(count), Some(b']')) => {
				if count == self.level {
					// Complete closing delimiter.
					match self.mode {
						LongBracketMode::Comment => Transition::step(Root),

						LongBracketMode::StringLiteral => Transition::produce(
							Root,
							Token {
								kind: TokenKind::Literal(Literal::String(self.value.into())),
								pos: self.pos,
							},
						),
					}
				} else {
					// The previous bracket and equal signs were content, and this bracket may
					// start a new closing delimiter.
					self.flush_closing(count);
					self.closing = Some(0);
					Transition::step(self)
				}
			}

			(Some(count), Some(_)) => {
				self.flush_closing(count);
				self.closing = None;
				Transition::resume(self)
			}

			(None, Some(b']')) => {
				self.at_start = false;
				self.closing = Some(0);
				Transition::step(self)
			}

			// The first line break right after the opening delimiter is not part of the
			// content.
			(None, Some(b'\r')) if self.at_start => Transition::step(self),
			(None, Some(b'\n')) if self.at_start => {
				self.at_start = false;
				Transition::step(self)
			}

			(None, Some(c)) => {
				self.at_start = false;

				if self.mode == LongBracketMode::StringLiteral {
					self.value.push(c);
				}

				Transition::step(self)
			}
		}
	}


	/// Append a partial closing delimiter, which turned out to be content, to the value.
	fn flush_closing(&mut self, count: u8) {
		if self.mode == LongBracketMode::StringLiteral {
			self.value.push(b']');
			self.value.extend(std::iter::repeat(b'=').take(count as usize));
		}
	}
}


impl From<LongBracket> for State {
	fn from(state: LongBracket) -> State {
		State::LongBracket(state)
	}
}
