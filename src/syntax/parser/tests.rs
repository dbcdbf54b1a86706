use assert_matches::assert_matches;

use super::*;
use super::super::ast::{BinaryOp, Expr, Statement, TableField, UnaryOp};
use super::super::lexer::{Cursor, Lexer};
use crate::symbol::Interner;


fn parse(input: &str) -> Result<Block, Error> {
	let mut interner = Interner::new();
	parse_with(input, &mut interner)
}


fn parse_with(input: &str, interner: &mut Interner) -> Result<Block, Error> {
	let self_symbol = interner.get_or_intern(b"self");
	let cursor = Cursor::from(input.as_bytes());
	let lexer = Lexer::new(cursor, interner);
	Parser::new(lexer, self_symbol)?.parse()
}


#[test]
fn test_local_declaration() {
	let block = parse("local a, b = 1, 'x'").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Local { names, exprs, .. } ] => {
			assert_eq!(names.len(), 2);
			assert_matches!(
				&exprs[..],
				[ Expr::Number { value, .. }, Expr::String { .. } ] => assert_eq!(*value, 1.0)
			);
		}
	);
}


#[test]
fn test_precedence() {
	// a + b * c parses as a + (b * c).
	let block = parse("return a + b * c").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Return { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::BinaryOp { op: BinaryOp::Plus, right, .. } ] => assert_matches!(
				right.as_ref(),
				Expr::BinaryOp { op: BinaryOp::Times, .. }
			)
		)
	);
}


#[test]
fn test_comparison_precedence() {
	// a < b == c parses as (a < b) == c, as both share a precedence level.
	let block = parse("return a < b == c").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Return { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::BinaryOp { op: BinaryOp::Equals, left, .. } ] => assert_matches!(
				left.as_ref(),
				Expr::BinaryOp { op: BinaryOp::Lower, .. }
			)
		)
	);
}


#[test]
fn test_concat_right_associative() {
	// a .. b .. c parses as a .. (b .. c).
	let block = parse("return a .. b .. c").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Return { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::BinaryOp { op: BinaryOp::Concat, right, .. } ] => assert_matches!(
				right.as_ref(),
				Expr::BinaryOp { op: BinaryOp::Concat, .. }
			)
		)
	);
}


#[test]
fn test_unary_pow() {
	// -x^2 parses as -(x^2).
	let block = parse("return -x^2").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Return { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::UnaryOp { op: UnaryOp::Minus, operand, .. } ] => assert_matches!(
				operand.as_ref(),
				Expr::BinaryOp { op: BinaryOp::Pow, .. }
			)
		)
	);
}


#[test]
fn test_statement_disambiguation() {
	// A call is a valid statement.
	assert_matches!(
		&parse("f(1)").unwrap().0[..],
		[ Statement::Expr(Expr::FunctionCall { .. }) ]
	);

	// An assignment to an index.
	assert_matches!(
		&parse("t[1], a = 1, 2").unwrap().0[..],
		[ Statement::Assign { targets, .. } ] => assert_matches!(
			&targets[..],
			[ Expr::Index { .. }, Expr::Identifier { .. } ]
		)
	);

	// A bare expression is not a valid statement.
	assert_matches!(
		parse("a + b"),
		Err(Error::InvalidStatement { .. })
	);

	// A call is not a valid assignment target.
	assert_matches!(
		parse("f(), a = 1"),
		Err(Error::InvalidAssignment { .. })
	);
}


#[test]
fn test_for_disambiguation() {
	assert_matches!(
		&parse("for i = 1, 10 do end").unwrap().0[..],
		[ Statement::NumericFor { step: None, .. } ]
	);

	assert_matches!(
		&parse("for i = 1, 10, 2 do end").unwrap().0[..],
		[ Statement::NumericFor { step: Some(_), .. } ]
	);

	assert_matches!(
		&parse("for k, v in pairs(t) do end").unwrap().0[..],
		[ Statement::GenericFor { variables, .. } ] => assert_eq!(variables.len(), 2)
	);
}


#[test]
fn test_if_desugar() {
	let block = parse(
		"
			if a then
				f()
			elseif b then
				g()
			else
				h()
			end
		"
	).unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::If { otherwise: Some(otherwise), .. } ] => assert_matches!(
			&otherwise.0[..],
			[ Statement::If { otherwise: Some(_), .. } ]
		)
	);
}


#[test]
fn test_table_constructor() {
	let block = parse("return { 1, x = 2, [3] = 4, f(), }").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Return { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::Table { fields, .. } ] => assert_matches!(
				&fields[..],
				[
					TableField::List(_),
					TableField::Record(_, _),
					TableField::General(_, _),
					TableField::List(Expr::FunctionCall { .. }),
				]
			)
		)
	);
}


#[test]
fn test_call_surfaces() {
	// Parenthesized list, single string, single table constructor.
	assert_matches!(
		&parse("f(1, 2)").unwrap().0[..],
		[ Statement::Expr(Expr::FunctionCall { args, .. }) ] => assert_eq!(args.len(), 2)
	);

	assert_matches!(
		&parse("f 'x'").unwrap().0[..],
		[ Statement::Expr(Expr::FunctionCall { args, .. }) ] => assert_matches!(
			&args[..],
			[ Expr::String { .. } ]
		)
	);

	assert_matches!(
		&parse("f { 1 }").unwrap().0[..],
		[ Statement::Expr(Expr::FunctionCall { args, .. }) ] => assert_matches!(
			&args[..],
			[ Expr::Table { .. } ]
		)
	);
}


#[test]
fn test_method_definition() {
	let mut interner = Interner::new();
	let block = parse_with("function t.a:m(x) return self end", &mut interner).unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Assign { targets, exprs, .. } ] => {
			assert_matches!(
				&targets[..],
				[ Expr::Field { object, .. } ] => assert_matches!(
					object.as_ref(),
					Expr::Field { .. }
				)
			);

			assert_matches!(
				&exprs[..],
				[ Expr::Function { params, .. } ] => {
					assert_eq!(params.len(), 2);
					assert_eq!(interner.resolve(params[0]), Some(b"self".as_ref()));
				}
			);
		}
	);
}


#[test]
fn test_varargs() {
	let block = parse("function f(a, ...) return ... end").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Assign { exprs, .. } ] => assert_matches!(
			&exprs[..],
			[ Expr::Function { is_vararg: true, body, .. } ] => assert_matches!(
				&body.0[..],
				[ Statement::Return { exprs, .. } ] => assert_matches!(
					&exprs[..],
					[ Expr::Vararg { .. } ]
				)
			)
		)
	);
}


#[test]
fn test_goto_label() {
	let block = parse("do goto done end ::done::").unwrap();

	assert_matches!(
		&block.0[..],
		[ Statement::Do(block), Statement::Label { .. } ] => assert_matches!(
			&block.0[..],
			[ Statement::Goto { .. } ]
		)
	);
}


#[test]
fn test_parse_errors() {
	assert_matches!(parse("local = 1"), Err(Error::Unexpected { .. }));
	assert_matches!(parse("if a then"), Err(Error::UnexpectedEof));
	assert_matches!(parse("return 1 2"), Err(Error::Unexpected { .. }));
	assert_matches!(parse("f(])"), Err(Error::Unexpected { .. }));
}
