use std::fmt;

use bstr::ByteSlice;

use super::{Panic, PanicKind, TraceFrame, Traceback};
use crate::{
	fmt::Display,
	symbol::Interner,
};
use super::super::source::SourcePos;


/// Render a position as Lua does in error messages: source:line.
struct Location<'a>(&'a SourcePos);


impl<'a> Display<'a> for Location<'a> {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		self.0.source.fmt(f, context)?;
		write!(f, ":{}", self.0.line)
	}
}


impl<'a> Display<'a> for PanicKind {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::StackOverflow { pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": stack overflow")
			}

			Self::InvalidArithmetic { value, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to perform arithmetic on a {} value", value.type_name())
			}

			Self::InvalidCompare { left, right, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to compare {} with {}", left.type_name(), right.type_name())
			}

			Self::InvalidConcat { value, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to concatenate a {} value", value.type_name())
			}

			Self::InvalidIndex { value, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to index a {} value", value.type_name())
			}

			Self::InvalidCall { value, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to call a {} value", value.type_name())
			}

			Self::InvalidLength { value, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": attempt to get length of a {} value", value.type_name())
			}

			Self::ForClause { clause, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": 'for' {} must be a number", clause)
			}

			Self::TableIndex { error, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": {}", error)
			}

			Self::AssertionFailed { message, pos } => {
				Location(pos).fmt(f, context)?;

				match message {
					Some(message) => write!(f, ": {}", message),
					None => write!(f, ": assertion failed!"),
				}
			}

			Self::TypeError { value, expected, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": bad argument ({} expected, got {})", expected, value.type_name())
			}

			Self::InvalidArgs { got, expected, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": wrong number of arguments ({} expected, got {})", expected, got)
			}

			Self::Coroutine { message, pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": {}", message)
			}

			Self::Interrupted { pos } => {
				Location(pos).fmt(f, context)?;
				write!(f, ": interrupted")
			}

			Self::Custom { value } => write!(f, "{}", value),

			Self::Io(error) => write!(f, "io error: {}", error),
		}
	}
}


impl<'a> Display<'a> for TraceFrame {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		write!(f, "\t")?;
		self.source.fmt(f, context)?;
		write!(f, ":{}: in ", self.line)?;

		match (&self.name, self.is_root) {
			(None, true) => write!(f, "main chunk"),
			(Some(name), true) => write!(f, "function '{}' (root)", name.as_bstr()),
			(Some(name), false) => write!(f, "function '{}'", name.as_bstr()),
			(None, false) => write!(f, "anonymous function"),
		}
	}
}


impl<'a> Display<'a> for Traceback {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		write!(f, "stack traceback:")?;

		for frame in self.0.iter() {
			writeln!(f)?;
			frame.fmt(f, context)?;
		}

		Ok(())
	}
}


impl<'a> Display<'a> for Panic {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		self.kind.fmt(f, context)?;

		if let Some(traceback) = &self.traceback {
			writeln!(f)?;
			traceback.fmt(f, context)?;
		}

		Ok(())
	}
}
