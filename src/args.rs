use std::ffi::OsString;
use std::path::PathBuf;

use clap::{clap_app, crate_authors, crate_version, crate_description};


#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
	Help(Box<str>),
	Version(Box<str>),
	Run(Args)
}


#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Args {
	/// The script to run. None means standard input.
	pub script_path: Option<PathBuf>,
	/// Parse and compile, but don't run.
	pub check: bool,
	/// Print the token stream.
	pub print_tokens: bool,
	/// Print the AST.
	pub print_ast: bool,
	/// Print the compiled bytecode.
	pub print_bytecode: bool,
}


pub fn parse<A, T>(args: A) -> clap::Result<Command>
where
	A: IntoIterator<Item = T>,
	T: Into<OsString> + Clone
{
	let app = clap_app!(
		Luar =>
			(version: crate_version!())
			(author: crate_authors!())
			(about: crate_description!())
			(@arg check: --check "Parse and compile, but don't execute.")
			(@arg tokens: --tokens "Print the token stream")
			(@arg ast: --ast "Print the AST")
			(@arg bytecode: --bytecode "Print the compiled bytecode")
			(@arg script: "The script to run. Reads from stdin if omitted.")
	);

	match app.get_matches_from_safe(args) {
		Ok(matches) => Ok(
			Command::Run(
				Args {
					script_path: matches
						.value_of_os("script")
						.map(PathBuf::from),
					check: matches.is_present("check"),
					print_tokens: matches.is_present("tokens"),
					print_ast: matches.is_present("ast"),
					print_bytecode: matches.is_present("bytecode"),
				}
			)
		),

		Err(error) => match error.kind {
			clap::ErrorKind::HelpDisplayed => Ok(
				Command::Help(error.message.into_boxed_str())
			),
			clap::ErrorKind::VersionDisplayed => Ok(
				Command::Version(error.message.into_boxed_str())
			),
			_ => Err(error)
		}
	}
}
