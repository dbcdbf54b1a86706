pub mod ast;
pub mod lexer;
pub mod parser;
mod source;
#[cfg(test)]
mod tests;

use crate::symbol::{self, Symbol};
pub use ast::Ast;
use lexer::Lexer;
use parser::Parser;
pub use parser::Error;
pub use source::{Source, SourcePos};


/// Syntactical analysis.
/// Both lexical and syntactical errors abort the analysis, and therefore the first error
/// is the only one reported.
#[derive(Debug)]
pub struct Analysis {
	/// The produced AST.
	pub ast: Ast,
}


impl Analysis {
	/// Perform syntax analysis in the given source.
	pub fn analyze(
		source: &Source,
		chunk_name: Symbol,
		interner: &mut symbol::Interner,
	) -> Result<Self, Error> {
		let self_symbol = interner.get_or_intern(b"self");

		let cursor = lexer::Cursor::from(source.contents.as_ref());
		let lexer = Lexer::new(cursor, interner);

		let parser = Parser::new(lexer, self_symbol)?;
		let statements = parser.parse()?;

		Ok(
			Analysis {
				ast: Ast {
					source: chunk_name,
					statements,
				},
			}
		)
	}
}


/// Print the token stream of the given source to stdout. Lexical errors are printed in
/// place of the offending token, and don't interrupt the stream.
pub fn dump_tokens(source: &Source, interner: &mut symbol::Interner) {
	let cursor = lexer::Cursor::from(source.contents.as_ref());

	let tokens: Vec<_> = Lexer::new(cursor, interner).collect();

	for token in tokens {
		match token {
			Ok(token) => println!("{}", crate::fmt::Show(&token, &*interner)),
			Err(error) => println!("{}", error),
		}
	}
}
