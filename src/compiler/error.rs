use std::fmt;

use crate::{
	fmt::Display,
	symbol::{Interner, Symbol},
	syntax::SourcePos,
};


/// A semantic error found while compiling an AST.
#[derive(Debug)]
pub enum Error {
	/// A break statement outside any loop.
	BreakOutsideLoop {
		pos: SourcePos,
	},
	/// A goto without a visible or following label.
	UndefinedLabel {
		label: Symbol,
		pos: SourcePos,
	},
	/// The function requires more registers than a frame can address.
	TooManyRegisters {
		pos: SourcePos,
	},
	/// The function captures more upvalues than a descriptor can address.
	TooManyUpvalues {
		pos: SourcePos,
	},
}


impl Error {
	pub fn break_outside_loop(pos: SourcePos) -> Self {
		Self::BreakOutsideLoop { pos }
	}


	pub fn undefined_label(label: Symbol, pos: SourcePos) -> Self {
		Self::UndefinedLabel { label, pos }
	}


	pub fn too_many_registers(pos: SourcePos) -> Self {
		Self::TooManyRegisters { pos }
	}


	pub fn too_many_upvalues(pos: SourcePos) -> Self {
		Self::TooManyUpvalues { pos }
	}
}


impl<'a> Display<'a> for Error {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::BreakOutsideLoop { pos } => {
				write!(f, "{} - break outside a loop.", pos)
			}

			Self::UndefinedLabel { label, pos } => {
				write!(f, "{} - no visible label '", pos)?;
				label.fmt(f, context)?;
				write!(f, "' for goto.")
			}

			Self::TooManyRegisters { pos } => {
				write!(f, "{} - function or expression too complex.", pos)
			}

			Self::TooManyUpvalues { pos } => {
				write!(f, "{} - too many upvalues.", pos)
			}
		}
	}
}
