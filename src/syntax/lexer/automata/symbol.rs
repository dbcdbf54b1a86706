use super::{
	comment::CommentOpen,
	number::NumberLiteral,
	root::Root,
	string::{LongBracketMode, LongBracketOpen},
	Cursor,
	Error,
	Operator,
	SourcePos,
	State,
	Token,
	TokenKind,
	Transition,
};


/// The state for lexing multi-character symbols.
#[derive(Debug)]
pub(super) struct Symbol {
	first: u8,
	pos: SourcePos,
}


impl Symbol {
	pub fn from_first(first: u8, cursor: &Cursor) -> Self {
		Self { first, pos: cursor.pos() }
	}


	pub fn visit(self, cursor: &Cursor) -> Transition {
		let token = |kind| Token { kind, pos: self.pos };
		let operator = |op| token(TokenKind::Operator(op));

		let skip_produce = |output| Transition::resume_produce(Root, output);

		match (self.first, cursor.peek()) {
			(b'=', Some(b'=')) => Transition::produce(Root, operator(Operator::Equals)),
			(b'=', _) => skip_produce(token(TokenKind::Assign)),

			(b'~', Some(b'=')) => Transition::produce(Root, operator(Operator::NotEquals)),
			(b'~', _) => Transition::resume_error(Root, Error::unexpected(self.first, self.pos)),

			(b'<', Some(b'=')) => Transition::produce(Root, operator(Operator::LowerEquals)),
			(b'<', _) => skip_produce(operator(Operator::Lower)),

			(b'>', Some(b'=')) => Transition::produce(Root, operator(Operator::GreaterEquals)),
			(b'>', _) => skip_produce(operator(Operator::Greater)),

			(b':', Some(b':')) => Transition::produce(Root, token(TokenKind::DoubleColon)),
			(b':', _) => skip_produce(token(TokenKind::Colon)),

			// Dashes may open a comment.
			(b'-', Some(b'-')) => Transition::step(CommentOpen),
			(b'-', _) => skip_produce(operator(Operator::Minus)),

			// Brackets may open a long string literal.
			(b'[', Some(b'[')) | (b'[', Some(b'=')) => Transition::resume(
				LongBracketOpen::at(LongBracketMode::StringLiteral, cursor)
			),
			(b'[', _) => skip_produce(token(TokenKind::OpenBracket)),

			// Dots come in one (access), two (concat) and three (ellipsis) character
			// flavors, and may also start a fractional number literal.
			(b'.', Some(b'.')) => Transition::step(DoubleDot { pos: self.pos }),
			(b'.', Some(c)) if c.is_ascii_digit() => Transition::step(NumberLiteral::after_dot(cursor)),
			(b'.', _) => skip_produce(token(TokenKind::Dot)),

			// We must have covered all possibilites for the first character. The peeked
			// character is wildcarded, which will cover everthing including EOF (None).
			_ => unreachable!("invalid first character in symbol state"),
		}
	}
}


impl From<Symbol> for State {
	fn from(state: Symbol) -> State {
		State::Symbol(state)
	}
}


/// The state after two consumed dots, which may yet become an ellipsis.
#[derive(Debug)]
pub(super) struct DoubleDot {
	pub pos: SourcePos,
}


impl DoubleDot {
	pub fn visit(self, cursor: &Cursor) -> Transition {
		let token = |kind| Token { kind, pos: self.pos };

		match cursor.peek() {
			Some(b'.') => Transition::produce(Root, token(TokenKind::Ellipsis)),
			_ => Transition::resume_produce(Root, token(TokenKind::Operator(Operator::Concat))),
		}
	}
}


impl From<DoubleDot> for State {
	fn from(state: DoubleDot) -> State {
		State::DoubleDot(state)
	}
}


/// Helper for symbols.
pub enum SymbolChar {
	/// Not a symbol character.
	None,
	/// Some symbols are single characters. We can produce them straight away.
	Single(TokenKind),
	/// Others have two or more characters, so we must handle those separately.
	Double { first: u8 },
}


impl SymbolChar {
	pub fn from_first(first: u8) -> Self {
		let token = Self::Single;
		let operator = |op| token(TokenKind::Operator(op));
		let double = |c| Self::Double { first: c };

		match first {
			// Single character.
			b'+' => operator(Operator::Plus),
			b'*' => operator(Operator::Times),
			b'/' => operator(Operator::Div),
			b'%' => operator(Operator::Mod),
			b'^' => operator(Operator::Pow),
			b'#' => operator(Operator::Len),
			b',' => token(TokenKind::Comma),
			b';' => token(TokenKind::Semicolon),
			b'(' => token(TokenKind::OpenParens),
			b')' => token(TokenKind::CloseParens),
			b']' => token(TokenKind::CloseBracket),
			b'{' => token(TokenKind::OpenBrace),
			b'}' => token(TokenKind::CloseBrace),

			// Double character.
			b'=' => double(first),
			b'~' => double(first),
			b'<' => double(first),
			b'>' => double(first),
			b':' => double(first),
			b'-' => double(first),
			b'[' => double(first),
			b'.' => double(first),

			// Not a symbol character:
			_ => SymbolChar::None,
		}
	}
}
