mod args;
mod bytecode;
mod compiler;
mod fmt;
mod runtime;
mod symbol;
mod syntax;
mod term;
#[cfg(test)]
mod tests;

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use term::color;

use args::{Args, Command};
use runtime::Runtime;


fn main() -> ! {
	let command = match args::parse(std::env::args_os()) {
		Ok(command) => command,
		Err(error) => {
			eprint!("{}", error);
			std::process::exit(1)
		}
	};

	let exit_code = match command {
		Command::Run(args) => run(args),
		Command::Help(msg) | Command::Version(msg) => {
			println!("{}", msg);
			0
		},
	};

	std::process::exit(exit_code)
}


fn run(args: Args) -> i32 {
	let mut interner = symbol::Interner::new();

	let source = {
		let result = match &args.script_path {
			Some(path) => syntax::Source::from_path(path.as_path()),
			None => syntax::Source::from_reader(Path::new("<stdin>"), std::io::stdin().lock()),
		};

		match result {
			Ok(source) => source,
			Err(error) => {
				eprintln!("{}: {}", color::Fg(color::Red, "Error"), error);
				return 1;
			}
		}
	};

	// ----------------------------------------------------------------------------------------
	let chunk_name = interner.get_or_intern(source.path.as_os_str().as_bytes());

	if args.print_tokens {
		syntax::dump_tokens(&source, &mut interner);
	}

	let ast = match syntax::Analysis::analyze(&source, chunk_name, &mut interner) {
		Ok(analysis) => analysis.ast,
		Err(error) => {
			eprintln!(
				"{}: {}",
				color::Fg(color::Red, "Error"),
				fmt::Show(&error, &interner)
			);
			return 2;
		}
	};

	if args.print_ast {
		println!("{}", fmt::Show(&ast, syntax::ast::fmt::Context::from(&interner)));
	}

	// ----------------------------------------------------------------------------------------
	let chunk = match compiler::compile(&ast, &mut interner) {
		Ok(chunk) => chunk,
		Err(error) => {
			eprintln!(
				"{}: {}",
				color::Fg(color::Red, "Error"),
				fmt::Show(&error, &interner)
			);
			return 2;
		}
	};

	if args.print_bytecode {
		println!("{}", fmt::Show(&chunk, bytecode::fmt::Context::from(&interner)));
	}

	if args.check {
		return 0;
	}

	// ----------------------------------------------------------------------------------------
	let mut runtime = Runtime::new(interner);

	match runtime.eval(chunk) {
		Ok(_) => 0,
		Err(panic) => {
			eprintln!(
				"{}: {}",
				color::Fg(color::Red, "Error"),
				fmt::Show(&panic, runtime.interner())
			);
			1
		}
	}
}
