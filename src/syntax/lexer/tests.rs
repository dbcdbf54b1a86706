use super::*;

use assert_matches::assert_matches;


macro_rules! token {
	($kind:pat) => {
		Ok(Token { kind: $kind, .. })
	};
}

macro_rules! error {
	($error:pat) => {
		Err(Error { error: $error, .. })
	};
}

macro_rules! assert_symbol {
	($interner:ident, $symbol:ident, $expected:literal) => {
		assert_eq!($interner.resolve(*$symbol), Some($expected.as_ref()))
	};
}


fn lex(input: &str, interner: &mut symbol::Interner) -> Vec<Result<Token, Error>> {
	let cursor = Cursor::from(input.as_bytes());
	let lexer = Lexer::new(cursor, interner);
	lexer.collect()
}


/// Check that TokenKind is not too big, because it gets moved around a lot.
#[test]
fn test_token_kind_size() {
	assert!(std::mem::size_of::<TokenKind>() <= 32);
}


#[test]
fn test_simple_function() {
	let input = r#"
		local function fat(n)
			if n <= 1 then -- here's a comment
				return 1
			end
			return n * fat(n - 1)
		end
	"#;

	let mut interner = symbol::Interner::new();
	let tokens = lex(input, &mut interner);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Keyword(Keyword::Local)),
			token!(TokenKind::Keyword(Keyword::Function)),
			token!(TokenKind::Identifier(fat1)),
			token!(TokenKind::OpenParens),
			token!(TokenKind::Identifier(n1)),
			token!(TokenKind::CloseParens),
			token!(TokenKind::Keyword(Keyword::If)),
			token!(TokenKind::Identifier(n2)),
			token!(TokenKind::Operator(Operator::LowerEquals)),
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::Keyword(Keyword::Then)),
			token!(TokenKind::Keyword(Keyword::Return)),
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::Keyword(Keyword::End)),
			token!(TokenKind::Keyword(Keyword::Return)),
			token!(TokenKind::Identifier(n3)),
			token!(TokenKind::Operator(Operator::Times)),
			token!(TokenKind::Identifier(fat2)),
			token!(TokenKind::OpenParens),
			token!(TokenKind::Identifier(n4)),
			token!(TokenKind::Operator(Operator::Minus)),
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::CloseParens),
			token!(TokenKind::Keyword(Keyword::End)),
		]
			=> {
				assert_symbol!(interner, fat1, b"fat");
				assert_symbol!(interner, fat2, b"fat");
				assert_symbol!(interner, n1, b"n");
				assert_symbol!(interner, n2, b"n");
				assert_symbol!(interner, n3, b"n");
				assert_symbol!(interner, n4, b"n");
			}
	);
}


#[test]
fn test_number_literals() {
	let mut interner = symbol::Interner::new();
	let tokens = lex("3 345 0xff 0xBEBADA 3.0 3.1416 314.16e-2 0.31416E1 0xA23p-4 0x1.8p3 .5", &mut interner);

	let numbers: Vec<f64> = tokens
		.into_iter()
		.map(|token| match token {
			Ok(Token { kind: TokenKind::Literal(Literal::Number(n)), .. }) => n,
			other => panic!("expected number, got {:?}", other),
		})
		.collect();

	assert_eq!(
		numbers,
		&[
			3.0,
			345.0,
			255.0,
			12499674.0,
			3.0,
			3.1416,
			3.1416,
			3.1416,
			0xA23 as f64 / 16.0,
			12.0,
			0.5,
		]
	);
}


#[test]
fn test_malformed_numbers() {
	let mut interner = symbol::Interner::new();

	assert_matches!(
		&lex("123abc", &mut interner)[..],
		[ error!(ErrorKind::InvalidNumber(_)) ]
	);

	assert_matches!(
		&lex("0x", &mut interner)[..],
		[ error!(ErrorKind::InvalidNumber(_)) ]
	);

	assert_matches!(
		&lex("1.2.3", &mut interner)[..],
		[ error!(ErrorKind::InvalidNumber(_)) ]
	);
}


#[test]
fn test_string_literals() {
	let mut interner = symbol::Interner::new();

	let tokens = lex(
		r#" "hello" 'world' "esc\n\t\\\"" "\x41\66\z
			 end" "#,
		&mut interner
	);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Literal(Literal::String(s1))),
			token!(TokenKind::Literal(Literal::String(s2))),
			token!(TokenKind::Literal(Literal::String(s3))),
			token!(TokenKind::Literal(Literal::String(s4))),
		]
			=> {
				assert_eq!(s1.as_ref(), b"hello");
				assert_eq!(s2.as_ref(), b"world");
				assert_eq!(s3.as_ref(), b"esc\n\t\\\"");
				assert_eq!(s4.as_ref(), b"ABend");
			}
	);
}


#[test]
fn test_long_strings() {
	let mut interner = symbol::Interner::new();

	let tokens = lex(
		"[[alo\n123\"]] [==[\nalo\n123\",]]==]",
		&mut interner
	);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Literal(Literal::String(s1))),
			token!(TokenKind::Literal(Literal::String(s2))),
		]
			=> {
				assert_eq!(s1.as_ref(), b"alo\n123\"");
				assert_eq!(s2.as_ref(), b"alo\n123\",]]");
			}
	);
}


#[test]
fn test_long_comments() {
	let mut interner = symbol::Interner::new();

	let tokens = lex(
		"1 --[[ a long\ncomment ]] 2 --[==[ nested ]] still going ]==] 3 -- line\n4",
		&mut interner
	);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::Literal(Literal::Number(_))),
			token!(TokenKind::Literal(Literal::Number(_))),
		]
	);
}


#[test]
fn test_operators() {
	let mut interner = symbol::Interner::new();

	let tokens = lex("== ~= <= >= < > = ( ) { } [ ] ; : :: , . .. ... + - * / % ^ #", &mut interner);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Operator(Operator::Equals)),
			token!(TokenKind::Operator(Operator::NotEquals)),
			token!(TokenKind::Operator(Operator::LowerEquals)),
			token!(TokenKind::Operator(Operator::GreaterEquals)),
			token!(TokenKind::Operator(Operator::Lower)),
			token!(TokenKind::Operator(Operator::Greater)),
			token!(TokenKind::Assign),
			token!(TokenKind::OpenParens),
			token!(TokenKind::CloseParens),
			token!(TokenKind::OpenBrace),
			token!(TokenKind::CloseBrace),
			token!(TokenKind::OpenBracket),
			token!(TokenKind::CloseBracket),
			token!(TokenKind::Semicolon),
			token!(TokenKind::Colon),
			token!(TokenKind::DoubleColon),
			token!(TokenKind::Comma),
			token!(TokenKind::Dot),
			token!(TokenKind::Operator(Operator::Concat)),
			token!(TokenKind::Ellipsis),
			token!(TokenKind::Operator(Operator::Plus)),
			token!(TokenKind::Operator(Operator::Minus)),
			token!(TokenKind::Operator(Operator::Times)),
			token!(TokenKind::Operator(Operator::Div)),
			token!(TokenKind::Operator(Operator::Mod)),
			token!(TokenKind::Operator(Operator::Pow)),
			token!(TokenKind::Operator(Operator::Len)),
		]
	);
}


#[test]
fn test_labels() {
	let mut interner = symbol::Interner::new();

	let tokens = lex("goto continue ::continue::", &mut interner);

	assert_matches!(
		&tokens[..],
		[
			token!(TokenKind::Keyword(Keyword::Goto)),
			token!(TokenKind::Identifier(_)),
			token!(TokenKind::DoubleColon),
			token!(TokenKind::Identifier(label)),
			token!(TokenKind::DoubleColon),
		]
			=> assert_symbol!(interner, label, b"continue")
	);
}


#[test]
fn test_unterminated_string() {
	let mut interner = symbol::Interner::new();

	assert_matches!(
		&lex("\"abc", &mut interner)[..],
		[ error!(ErrorKind::UnterminatedString) ]
	);

	assert_matches!(
		&lex("\"abc\ndef\"", &mut interner)[..],
		[ error!(ErrorKind::UnterminatedString), .. ]
	);

	assert_matches!(
		&lex("[[abc", &mut interner)[..],
		[ error!(ErrorKind::UnterminatedLongBracket) ]
	);
}


#[test]
fn test_invalid_escape() {
	let mut interner = symbol::Interner::new();

	assert_matches!(
		&lex(r#""a\qb""#, &mut interner)[..],
		[ error!(ErrorKind::InvalidEscapeSequence(_)), .. ]
	);
}


#[test]
fn test_source_positions() {
	let mut interner = symbol::Interner::new();

	let tokens = lex("a\nbc\r\nd", &mut interner);

	assert_matches!(
		&tokens[..],
		[
			Ok(Token { pos: pos_a, .. }),
			Ok(Token { pos: pos_b, .. }),
			Ok(Token { pos: pos_d, .. }),
		]
			=> {
				assert_eq!((pos_a.line, pos_a.column), (1, 0));
				assert_eq!((pos_b.line, pos_b.column), (2, 0));
				assert_eq!((pos_d.line, pos_d.column), (3, 0));
			}
	);
}
