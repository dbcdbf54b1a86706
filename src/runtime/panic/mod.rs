mod fmt;

use std::io;

use crate::symbol::{Interner, Symbol};
use super::source::SourcePos;
use super::value::{InvalidKey, Value};


/// A runtime error, which Lua code may intercept with a protected call.
#[derive(Debug)]
pub struct Panic {
	pub kind: PanicKind,
	/// The call stack at the point where the panic was raised. Attached by the
	/// dispatch loop when the panic first crosses it.
	pub traceback: Option<Traceback>,
}


#[derive(Debug)]
pub enum PanicKind {
	/// The value stack outgrew its limit.
	StackOverflow {
		pos: SourcePos,
	},
	/// Arithmetic on a value that is neither a number nor provides a metamethod.
	InvalidArithmetic {
		value: Value,
		pos: SourcePos,
	},
	/// Comparison between incompatible types.
	InvalidCompare {
		left: Value,
		right: Value,
		pos: SourcePos,
	},
	/// Concatenation of a value that is neither a string nor a number.
	InvalidConcat {
		value: Value,
		pos: SourcePos,
	},
	/// Indexing a value that is not a table and provides no metamethod.
	InvalidIndex {
		value: Value,
		pos: SourcePos,
	},
	/// Calling a value that is not a function and provides no metamethod.
	InvalidCall {
		value: Value,
		pos: SourcePos,
	},
	/// Taking the length of a value without a length.
	InvalidLength {
		value: Value,
		pos: SourcePos,
	},
	/// A clause of a numeric for loop did not coerce to a number.
	ForClause {
		clause: &'static str,
		pos: SourcePos,
	},
	/// An invalid table key (nil or NaN).
	TableIndex {
		error: InvalidKey,
		pos: SourcePos,
	},
	/// A failed assert.
	AssertionFailed {
		message: Option<Value>,
		pos: SourcePos,
	},
	/// A native function received an argument of the wrong type.
	TypeError {
		value: Value,
		expected: &'static str,
		pos: SourcePos,
	},
	/// A native function received the wrong number of arguments.
	InvalidArgs {
		got: u32,
		expected: u32,
		pos: SourcePos,
	},
	/// An invalid coroutine operation.
	Coroutine {
		message: &'static str,
		pos: SourcePos,
	},
	/// A cancellation fault injected at a suspension point.
	Interrupted {
		pos: SourcePos,
	},
	/// An arbitrary value raised by the error function.
	Custom {
		value: Value,
	},
	/// An IO error escaping a native function.
	Io(io::Error),
}


impl Panic {
	fn new(kind: PanicKind) -> Self {
		Self { kind, traceback: None }
	}


	pub fn stack_overflow(pos: SourcePos) -> Self {
		Self::new(PanicKind::StackOverflow { pos })
	}


	pub fn invalid_arithmetic(value: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidArithmetic { value, pos })
	}


	pub fn invalid_compare(left: Value, right: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidCompare { left, right, pos })
	}


	pub fn invalid_concat(value: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidConcat { value, pos })
	}


	pub fn invalid_index(value: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidIndex { value, pos })
	}


	pub fn invalid_call(value: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidCall { value, pos })
	}


	pub fn invalid_length(value: Value, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidLength { value, pos })
	}


	pub fn for_clause(clause: &'static str, pos: SourcePos) -> Self {
		Self::new(PanicKind::ForClause { clause, pos })
	}


	pub fn table_index(error: InvalidKey, pos: SourcePos) -> Self {
		Self::new(PanicKind::TableIndex { error, pos })
	}


	pub fn assertion_failed(message: Option<Value>, pos: SourcePos) -> Self {
		Self::new(PanicKind::AssertionFailed { message, pos })
	}


	pub fn type_error(value: Value, expected: &'static str, pos: SourcePos) -> Self {
		Self::new(PanicKind::TypeError { value, expected, pos })
	}


	pub fn invalid_args(got: u32, expected: u32, pos: SourcePos) -> Self {
		Self::new(PanicKind::InvalidArgs { got, expected, pos })
	}


	pub fn coroutine(message: &'static str, pos: SourcePos) -> Self {
		Self::new(PanicKind::Coroutine { message, pos })
	}


	pub fn interrupted(pos: SourcePos) -> Self {
		Self::new(PanicKind::Interrupted { pos })
	}


	pub fn custom(value: Value) -> Self {
		Self::new(PanicKind::Custom { value })
	}


	pub fn io(error: io::Error) -> Self {
		Self::new(PanicKind::Io(error))
	}


	/// Attach a traceback, if none has been attached yet.
	pub fn with_traceback<F>(mut self, capture: F) -> Self
	where
		F: FnOnce() -> Traceback,
	{
		if self.traceback.is_none() {
			self.traceback = Some(capture());
		}

		self
	}


	/// Convert the panic into the value seen by protected calls.
	/// Custom panics carry their value verbatim, every other kind produces a position
	/// qualified message string.
	pub fn to_value(&self, interner: &Interner) -> Value {
		use crate::fmt::FmtString;

		match &self.kind {
			PanicKind::Custom { value } => value.copy(),
			_ => self.kind.fmt_string(interner).into(),
		}
	}
}


impl From<io::Error> for Panic {
	fn from(error: io::Error) -> Self {
		Self::io(error)
	}
}


/// A single frame of a captured traceback.
#[derive(Debug)]
pub struct TraceFrame {
	pub source: Symbol,
	pub line: u32,
	/// The function name, if statically known.
	pub name: Option<Box<[u8]>>,
	/// Whether this is the root frame of its thread.
	pub is_root: bool,
}


/// The call stack captured when a panic was raised, innermost frame first.
#[derive(Debug, Default)]
pub struct Traceback(pub Box<[TraceFrame]>);
