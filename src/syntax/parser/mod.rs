mod error;
#[cfg(test)]
mod tests;

use super::ast::{Block, Expr, Statement, TableField};
use super::lexer::{self, Keyword, Literal, Operator, Token, TokenKind};
use super::SourcePos;
use crate::symbol::Symbol;
pub use error::{Error, Expected};


/// The parser for Lua syntax.
/// Unlike the lexer, the parser is not incremental: the first error aborts the parse.
#[derive(Debug)]
pub struct Parser<I>
where
	I: Iterator<Item = Result<Token, lexer::Error>>,
{
	// We don't use a std::iter::Peekable instead of a (Iterator, Option<Token>) pair
	// because we must be able to move from `token`, but Peekable only returns a reference.
	cursor: I,
	token: Option<Token>,
	// A second lookahead slot, required only to disambiguate record fields in table
	// constructors (name = expr).
	pending: Option<Token>,
	// The interned "self" symbol, for the implicit parameter of method definitions.
	self_symbol: Symbol,
}


impl<I> Parser<I>
where
	I: Iterator<Item = Result<Token, lexer::Error>>,
{
	/// Create a new parser for the given input.
	pub fn new(mut cursor: I, self_symbol: Symbol) -> Result<Self, Error> {
		let token = cursor.next().transpose()?;

		Ok(Self { cursor, token, pending: None, self_symbol })
	}


	/// Parse the input, producing the top-level block.
	pub fn parse(mut self) -> Result<Block, Error> {
		let block = self.parse_block()?;

		match self.token.take() {
			None => Ok(block),
			Some(token) => Err(Error::unexpected_msg(token, "end of file")),
		}
	}


	/// Step the cursor, placing the next token on self.token.
	fn step(&mut self) -> Result<(), Error> {
		self.token = match self.pending.take() {
			Some(token) => Some(token),
			None => self.cursor.next().transpose()?,
		};

		Ok(())
	}


	/// Peek the token after the current one, pulling it into the pending slot.
	fn peek_second(&mut self) -> Result<Option<&TokenKind>, Error> {
		if self.pending.is_none() {
			self.pending = self.cursor.next().transpose()?;
		}

		Ok(self.pending.as_ref().map(|token| &token.kind))
	}


	/// Try and eat a token.
	fn eat<F, T>(&mut self, eat: F) -> Result<T, Error>
	where
		F: FnOnce(Token) -> Result<T, (Error, Token)>,
	{
		if let Some(token) = self.token.take() {
			match eat(token) {
				Ok(value) => {
					// Token successfully consumed.
					self.step()?;
					Ok(value)
				}

				Err((error, token)) => {
					// Fail, rollback the token and produce an error.
					self.token = Some(token);
					Err(error)
				}
			}
		} else {
			Err(Error::unexpected_eof())
		}
	}


	/// Consume the expected token, or produce an error.
	fn expect(&mut self, expected: TokenKind) -> Result<(), Error> {
		self.eat(|token| match token {
			Token { kind, .. } if kind == expected => Ok(()),
			token => Err((Error::unexpected(token.clone(), expected), token)),
		})
	}


	/// Check whether the current token is of the given kind, without consuming it.
	fn check(&self, expected: &TokenKind) -> bool {
		matches!(&self.token, Some(Token { kind, .. }) if kind == expected)
	}


	/// Consume the current token if it is of the given kind.
	fn test(&mut self, expected: &TokenKind) -> Result<bool, Error> {
		if self.check(expected) {
			self.step()?;
			Ok(true)
		} else {
			Ok(false)
		}
	}


	/// Parse an identifier.
	fn parse_identifier(&mut self) -> Result<Symbol, Error> {
		self.eat(|token| match token {
			Token { kind: TokenKind::Identifier(symbol), .. } => Ok(symbol),
			token => Err((Error::unexpected_msg(token.clone(), "identifier"), token)),
		})
	}


	/// Parse a block of statements, stopping at a block terminator keyword or EOF.
	/// A return statement, if present, is always the last statement of the block.
	fn parse_block(&mut self) -> Result<Block, Error> {
		let mut block = Vec::new();

		loop {
			match &self.token {
				// Empty statements.
				Some(Token { kind: TokenKind::Semicolon, .. }) => self.step()?,

				Some(Token { kind, .. }) if kind.is_block_terminator() => break,

				Some(_) => {
					let statement = self.parse_statement()?;
					let is_return = matches!(statement, Statement::Return { .. });

					block.push(statement);

					if is_return {
						// There may be no statements following a return in a block.
						break;
					}
				}

				// Break on eof.
				None => break,
			}
		}

		Ok(block.into())
	}


	/// Parse a single statement.
	fn parse_statement(&mut self) -> Result<Statement, Error> {
		match self.token.take() {
			// Local declaration, including local functions.
			Some(Token { kind: TokenKind::Keyword(Keyword::Local), pos }) => {
				self.step()?;

				if self.test(&TokenKind::Keyword(Keyword::Function))? {
					let name = self.parse_identifier()?;
					let function = self.parse_function_body(pos, false)?;

					Ok(Statement::LocalFunction { name, function, pos })
				} else {
					let names = self.parse_name_list()?;

					let exprs =
						if self.test(&TokenKind::Assign)? {
							self.parse_expr_list()?
						} else {
							Box::default()
						};

					Ok(Statement::Local { names, exprs, pos })
				}
			}

			// If.
			Some(Token { kind: TokenKind::Keyword(Keyword::If), pos }) => {
				self.step()?;
				self.parse_if(pos)
			}

			// While.
			Some(Token { kind: TokenKind::Keyword(Keyword::While), pos }) => {
				self.step()?;

				let condition = self.parse_expression()?;
				self.expect(TokenKind::Keyword(Keyword::Do))?;
				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::End))?;

				Ok(Statement::While { condition, block, pos })
			}

			// Repeat.
			Some(Token { kind: TokenKind::Keyword(Keyword::Repeat), pos }) => {
				self.step()?;

				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::Until))?;
				let condition = self.parse_expression()?;

				Ok(Statement::Repeat { block, condition, pos })
			}

			// For, both numeric and generic.
			Some(Token { kind: TokenKind::Keyword(Keyword::For), pos }) => {
				self.step()?;
				self.parse_for(pos)
			}

			// Do.
			Some(Token { kind: TokenKind::Keyword(Keyword::Do), .. }) => {
				self.step()?;

				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::End))?;

				Ok(Statement::Do(block))
			}

			// Function declaration, which is sugar for an assignment.
			Some(Token { kind: TokenKind::Keyword(Keyword::Function), pos }) => {
				self.step()?;
				self.parse_function_statement(pos)
			}

			// Return.
			Some(Token { kind: TokenKind::Keyword(Keyword::Return), pos }) => {
				self.step()?;

				let exprs = match &self.token {
					None => Box::default(),
					Some(Token { kind: TokenKind::Semicolon, .. }) => Box::default(),
					Some(Token { kind, .. }) if kind.is_block_terminator() => Box::default(),
					Some(_) => self.parse_expr_list()?,
				};

				self.test(&TokenKind::Semicolon)?;

				Ok(Statement::Return { exprs, pos })
			}

			// Break.
			Some(Token { kind: TokenKind::Keyword(Keyword::Break), pos }) => {
				self.step()?;

				Ok(Statement::Break { pos })
			}

			// Goto.
			Some(Token { kind: TokenKind::Keyword(Keyword::Goto), pos }) => {
				self.step()?;

				let label = self.parse_identifier()?;

				Ok(Statement::Goto { label, pos })
			}

			// Label.
			Some(Token { kind: TokenKind::DoubleColon, pos }) => {
				self.step()?;

				let name = self.parse_identifier()?;
				self.expect(TokenKind::DoubleColon)?;

				Ok(Statement::Label { name, pos })
			}

			// Expression statement: a call or an assignment.
			Some(token) => {
				self.token = Some(token);

				let expr = self.parse_suffixed()?;

				match &self.token {
					Some(Token { kind: TokenKind::Assign, .. })
					| Some(Token { kind: TokenKind::Comma, .. }) => self.parse_assignment(expr),

					_ => match expr {
						Expr::FunctionCall { .. } | Expr::MethodCall { .. } => {
							Ok(Statement::Expr(expr))
						}

						expr => Err(Error::invalid_statement(expr.pos())),
					},
				}
			}

			// EOF.
			None => Err(Error::unexpected_eof()),
		}
	}


	/// Parse an if statement after the if/elseif keyword. Elseif chains are desugared
	/// into nested if statements.
	fn parse_if(&mut self, pos: SourcePos) -> Result<Statement, Error> {
		let condition = self.parse_expression()?;
		self.expect(TokenKind::Keyword(Keyword::Then))?;
		let then = self.parse_block()?;

		let otherwise = match self.token.take() {
			Some(Token { kind: TokenKind::Keyword(Keyword::End), .. }) => {
				self.step()?;
				None
			}

			Some(Token { kind: TokenKind::Keyword(Keyword::Else), .. }) => {
				self.step()?;

				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::End))?;

				Some(block)
			}

			Some(Token { kind: TokenKind::Keyword(Keyword::ElseIf), pos: elseif_pos }) => {
				self.step()?;

				let nested = self.parse_if(elseif_pos)?;

				Some(Block(Box::new([nested])))
			}

			Some(token) => return Err(Error::unexpected_msg(token, "end, else or elseif")),

			None => return Err(Error::unexpected_eof()),
		};

		Ok(Statement::If { condition, then, otherwise, pos })
	}


	/// Parse a for statement after the for keyword. The loop is numeric if the first
	/// variable is followed by an assignment, and generic otherwise.
	fn parse_for(&mut self, pos: SourcePos) -> Result<Statement, Error> {
		let variable = self.parse_identifier()?;

		match self.token.take() {
			Some(Token { kind: TokenKind::Assign, .. }) => {
				self.step()?;

				let start = self.parse_expression()?;
				self.expect(TokenKind::Comma)?;
				let limit = self.parse_expression()?;

				let step =
					if self.test(&TokenKind::Comma)? {
						Some(self.parse_expression()?)
					} else {
						None
					};

				self.expect(TokenKind::Keyword(Keyword::Do))?;
				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::End))?;

				Ok(Statement::NumericFor { variable, start, limit, step, block, pos })
			}

			token => {
				self.token = token;

				let mut variables = vec![variable];
				while self.test(&TokenKind::Comma)? {
					variables.push(self.parse_identifier()?);
				}

				self.expect(TokenKind::Keyword(Keyword::In))?;
				let exprs = self.parse_expr_list()?;
				self.expect(TokenKind::Keyword(Keyword::Do))?;
				let block = self.parse_block()?;
				self.expect(TokenKind::Keyword(Keyword::End))?;

				Ok(Statement::GenericFor { variables: variables.into(), exprs, block, pos })
			}
		}
	}


	/// Parse a function statement after the function keyword.
	/// `function a.b.c:m() ... end` is sugar for `a.b.c.m = function(self) ... end`.
	fn parse_function_statement(&mut self, pos: SourcePos) -> Result<Statement, Error> {
		let name = self.parse_identifier()?;
		let mut target = Expr::Identifier { identifier: name, pos };
		let mut is_method = false;

		loop {
			match &self.token {
				Some(Token { kind: TokenKind::Dot, pos: dot_pos }) => {
					let dot_pos = *dot_pos;
					self.step()?;

					let field = self.parse_identifier()?;
					target = Expr::Field { object: target.into(), field, pos: dot_pos };
				}

				Some(Token { kind: TokenKind::Colon, pos: colon_pos }) => {
					let colon_pos = *colon_pos;
					self.step()?;

					let field = self.parse_identifier()?;
					target = Expr::Field { object: target.into(), field, pos: colon_pos };
					is_method = true;
					break;
				}

				_ => break,
			}
		}

		let function = self.parse_function_body(pos, is_method)?;

		Ok(
			Statement::Assign {
				targets: Box::new([target]),
				exprs: Box::new([function]),
				pos,
			}
		)
	}


	/// Parse an assignment statement, given the already parsed first target.
	fn parse_assignment(&mut self, first: Expr) -> Result<Statement, Error> {
		let mut targets = vec![first];

		while self.test(&TokenKind::Comma)? {
			targets.push(self.parse_suffixed()?);
		}

		for target in &targets {
			if !target.is_assignable() {
				return Err(Error::invalid_assignment(target.pos()));
			}
		}

		let pos = targets[0].pos();

		self.expect(TokenKind::Assign)?;
		let exprs = self.parse_expr_list()?;

		Ok(Statement::Assign { targets: targets.into(), exprs, pos })
	}


	/// Parse a non-empty comma-separated name list.
	fn parse_name_list(&mut self) -> Result<Box<[Symbol]>, Error> {
		let mut names = vec![self.parse_identifier()?];

		while self.test(&TokenKind::Comma)? {
			names.push(self.parse_identifier()?);
		}

		Ok(names.into())
	}


	/// Parse a non-empty comma-separated expression list.
	fn parse_expr_list(&mut self) -> Result<Box<[Expr]>, Error> {
		let mut exprs = vec![self.parse_expression()?];

		while self.test(&TokenKind::Comma)? {
			exprs.push(self.parse_expression()?);
		}

		Ok(exprs.into())
	}


	/// Parse a single expression.
	fn parse_expression(&mut self) -> Result<Expr, Error> {
		self.parse_binop(
			|parser| parser.parse_binop(
				|parser| parser.parse_binop(
					Self::parse_concat,
					Operator::is_comparison,
				),
				|&op| op == Operator::And,
			),
			|&op| op == Operator::Or,
		)
	}


	/// Parse a left-associative binary operator level.
	fn parse_binop<P, F>(&mut self, mut parse_higher_prec: P, mut check: F) -> Result<Expr, Error>
	where
		P: FnMut(&mut Self) -> Result<Expr, Error>,
		F: FnMut(&Operator) -> bool,
	{
		let mut expr = parse_higher_prec(self)?;

		loop {
			match self.token.take() {
				Some(Token { kind: TokenKind::Operator(op), pos }) if check(&op) => {
					self.step()?;

					let right = parse_higher_prec(self)?;

					expr = Expr::BinaryOp {
						left: expr.into(),
						op: op.into(),
						right: right.into(),
						pos,
					};
				}

				token => {
					self.token = token;
					break;
				}
			}
		}

		Ok(expr)
	}


	/// Parse a concat level expression. Concatenation is right-associative.
	fn parse_concat(&mut self) -> Result<Expr, Error> {
		let left = self.parse_binop(
			|parser| parser.parse_binop(Self::parse_unary, Operator::is_factor),
			Operator::is_term,
		)?;

		match self.token.take() {
			Some(Token { kind: TokenKind::Operator(Operator::Concat), pos }) => {
				self.step()?;

				let right = self.parse_concat()?;

				Ok(
					Expr::BinaryOp {
						left: left.into(),
						op: Operator::Concat.into(),
						right: right.into(),
						pos,
					}
				)
			}

			token => {
				self.token = token;
				Ok(left)
			}
		}
	}


	/// Parse a unary operator expression. The operand of a unary operator includes
	/// exponentiations, as -x^2 denotes -(x^2).
	fn parse_unary(&mut self) -> Result<Expr, Error> {
		match self.token.take() {
			Some(Token { kind: TokenKind::Operator(op), pos }) if op.is_unary() => {
				self.step()?;

				let operand = self.parse_unary()?;

				Ok(
					Expr::UnaryOp {
						op: op.into(),
						operand: operand.into(),
						pos,
					}
				)
			}

			token => {
				self.token = token;
				self.parse_pow()
			}
		}
	}


	/// Parse an exponentiation. Exponentiation is right-associative, and binds tighter
	/// than unary operators on the left, but allows them on the right (2^-3).
	fn parse_pow(&mut self) -> Result<Expr, Error> {
		let base = self.parse_simple()?;

		match self.token.take() {
			Some(Token { kind: TokenKind::Operator(Operator::Pow), pos }) => {
				self.step()?;

				let right = self.parse_unary()?;

				Ok(
					Expr::BinaryOp {
						left: base.into(),
						op: Operator::Pow.into(),
						right: right.into(),
						pos,
					}
				)
			}

			token => {
				self.token = token;
				Ok(base)
			}
		}
	}


	/// Parse a simple expression: literals, varargs, table constructors, function
	/// expressions, or a suffixed expression.
	fn parse_simple(&mut self) -> Result<Expr, Error> {
		match self.token.take() {
			Some(Token { kind: TokenKind::Literal(literal), pos }) => {
				self.step()?;

				Ok(
					match literal {
						Literal::Nil => Expr::Nil { pos },
						Literal::True => Expr::True { pos },
						Literal::False => Expr::False { pos },
						Literal::Number(value) => Expr::Number { value, pos },
						Literal::String(value) => Expr::String { value, pos },
					}
				)
			}

			Some(Token { kind: TokenKind::Ellipsis, pos }) => {
				self.step()?;

				Ok(Expr::Vararg { pos })
			}

			Some(token @ Token { kind: TokenKind::OpenBrace, .. }) => {
				self.token = Some(token);
				self.parse_table()
			}

			Some(Token { kind: TokenKind::Keyword(Keyword::Function), pos }) => {
				self.step()?;
				self.parse_function_body(pos, false)
			}

			token => {
				self.token = token;
				self.parse_suffixed()
			}
		}
	}


	/// Parse a primary expression (identifier or parenthesized expression) followed by
	/// any number of suffixes: field access, indexing, calls and method calls.
	fn parse_suffixed(&mut self) -> Result<Expr, Error> {
		let mut expr = match self.token.take() {
			Some(Token { kind: TokenKind::Identifier(identifier), pos }) => {
				self.step()?;

				Expr::Identifier { identifier, pos }
			}

			Some(Token { kind: TokenKind::OpenParens, pos }) => {
				self.step()?;

				let inner = self.parse_expression()?;
				self.expect(TokenKind::CloseParens)?;

				Expr::Parens { inner: inner.into(), pos }
			}

			Some(token) => {
				// We need to restore the token because it may be some delimiter.
				self.token = Some(token.clone());
				return Err(Error::unexpected_msg(token, "expression"));
			}

			None => return Err(Error::unexpected_eof()),
		};

		loop {
			match &self.token {
				Some(Token { kind: TokenKind::Dot, pos }) => {
					let pos = *pos;
					self.step()?;

					let field = self.parse_identifier()?;
					expr = Expr::Field { object: expr.into(), field, pos };
				}

				Some(Token { kind: TokenKind::OpenBracket, pos }) => {
					let pos = *pos;
					self.step()?;

					let key = self.parse_expression()?;
					self.expect(TokenKind::CloseBracket)?;

					expr = Expr::Index { object: expr.into(), key: key.into(), pos };
				}

				Some(Token { kind: TokenKind::Colon, pos }) => {
					let pos = *pos;
					self.step()?;

					let method = self.parse_identifier()?;
					let args = self.parse_call_args()?;

					expr = Expr::MethodCall { object: expr.into(), method, args, pos };
				}

				Some(Token { kind: TokenKind::OpenParens, pos })
				| Some(Token { kind: TokenKind::OpenBrace, pos })
				| Some(Token { kind: TokenKind::Literal(Literal::String(_)), pos }) => {
					let pos = *pos;

					let args = self.parse_call_args()?;

					expr = Expr::FunctionCall { function: expr.into(), args, pos };
				}

				_ => break,
			}
		}

		Ok(expr)
	}


	/// Parse the arguments of a call, which accept three surface forms: a parenthesized
	/// list, a single string literal, or a single table constructor.
	fn parse_call_args(&mut self) -> Result<Box<[Expr]>, Error> {
		match self.token.take() {
			Some(Token { kind: TokenKind::OpenParens, .. }) => {
				self.step()?;

				let args =
					if self.check(&TokenKind::CloseParens) {
						Box::default()
					} else {
						self.parse_expr_list()?
					};

				self.expect(TokenKind::CloseParens)?;

				Ok(args)
			}

			Some(Token { kind: TokenKind::Literal(Literal::String(value)), pos }) => {
				self.step()?;

				Ok(Box::new([ Expr::String { value, pos } ]))
			}

			Some(token @ Token { kind: TokenKind::OpenBrace, .. }) => {
				self.token = Some(token);

				let table = self.parse_table()?;

				Ok(Box::new([table]))
			}

			Some(token) => {
				self.token = Some(token.clone());
				Err(Error::unexpected_msg(token, "function arguments"))
			}

			None => Err(Error::unexpected_eof()),
		}
	}


	/// Parse a function body after the function keyword: parameter list, block and end.
	fn parse_function_body(&mut self, pos: SourcePos, is_method: bool) -> Result<Expr, Error> {
		self.expect(TokenKind::OpenParens)?;

		let mut params = Vec::new();
		let mut is_vararg = false;

		if is_method {
			params.push(self.self_symbol);
		}

		loop {
			match self.token.take() {
				Some(Token { kind: TokenKind::Identifier(param), .. }) => {
					self.step()?;
					params.push(param);

					if !self.test(&TokenKind::Comma)? {
						break;
					}
				}

				Some(Token { kind: TokenKind::Ellipsis, .. }) => {
					self.step()?;
					is_vararg = true;
					break;
				}

				Some(token @ Token { kind: TokenKind::CloseParens, .. }) => {
					self.token = Some(token);
					break;
				}

				Some(token) => {
					self.token = Some(token.clone());
					return Err(Error::unexpected_msg(token, "parameter"));
				}

				None => return Err(Error::unexpected_eof()),
			}
		}

		self.expect(TokenKind::CloseParens)?;
		let body = self.parse_block()?;
		self.expect(TokenKind::Keyword(Keyword::End))?;

		Ok(Expr::Function { params: params.into(), is_vararg, body, pos })
	}


	/// Parse a table constructor. Fields are classified by lookahead into list style
	/// (expr), record style (name = expr) and general style ([expr] = expr).
	fn parse_table(&mut self) -> Result<Expr, Error> {
		let pos = match &self.token {
			Some(token) => token.pos,
			None => return Err(Error::unexpected_eof()),
		};

		self.expect(TokenKind::OpenBrace)?;

		let mut fields = Vec::new();

		while !self.check(&TokenKind::CloseBrace) {
			fields.push(self.parse_table_field()?);

			// Field separators are commas or semicolons.
			if !self.test(&TokenKind::Comma)? && !self.test(&TokenKind::Semicolon)? {
				break;
			}
		}

		self.expect(TokenKind::CloseBrace)?;

		Ok(Expr::Table { fields: fields.into(), pos })
	}


	/// Parse a single table constructor field.
	fn parse_table_field(&mut self) -> Result<TableField, Error> {
		// General style: [expr] = expr
		if self.test(&TokenKind::OpenBracket)? {
			let key = self.parse_expression()?;
			self.expect(TokenKind::CloseBracket)?;
			self.expect(TokenKind::Assign)?;
			let value = self.parse_expression()?;

			return Ok(TableField::General(key, value));
		}

		// Record style (name = expr) requires a second token of lookahead, as a lone
		// name is a valid list style field.
		let name = match &self.token {
			Some(Token { kind: TokenKind::Identifier(name), .. }) => Some(*name),
			_ => None,
		};

		if let Some(name) = name {
			if matches!(self.peek_second()?, Some(TokenKind::Assign)) {
				self.step()?; // name
				self.step()?; // =

				let value = self.parse_expression()?;

				return Ok(TableField::Record(name, value));
			}
		}

		// List style: expr
		Ok(TableField::List(self.parse_expression()?))
	}
}
