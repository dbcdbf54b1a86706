use assert_matches::assert_matches;

use super::{Analysis, Error, Source};
use crate::symbol::Interner;


fn analyze(input: &str) -> Result<Analysis, Error> {
	let mut interner = Interner::new();
	let source = Source {
		path: std::path::Path::new("<test>").into(),
		contents: input.as_bytes().into(),
	};
	let chunk_name = interner.get_or_intern(b"<test>");

	Analysis::analyze(&source, chunk_name, &mut interner)
}


#[test]
fn test_analyze_ok() {
	let analysis = analyze(
		"
			local function map(f, t)
				local result = {}
				for i, v in ipairs(t) do
					result[i] = f(v)
				end
				return result
			end

			return map(function (x) return x * 2 end, { 1, 2, 3 })
		"
	);

	assert_matches!(analysis, Ok(_));
}


#[test]
fn test_analyze_lexer_error() {
	assert_matches!(
		analyze("local a = 'unterminated"),
		Err(Error::Lexer(_))
	);
}


#[test]
fn test_analyze_parser_error() {
	assert_matches!(
		analyze("local a ="),
		Err(Error::UnexpectedEof)
	);
}
