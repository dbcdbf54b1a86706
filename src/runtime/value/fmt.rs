use std::fmt::{self, Display};

use bstr::ByteSlice;

use super::{Function, Value};


/// The display of a value matches the output of the tostring function: scalars render
/// their contents, while reference types render their kind and address.
impl Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Nil => "nil".fmt(f),

			Self::Bool(b) => b.fmt(f),

			Self::Number(number) => number.fmt_lua().fmt(f),

			Self::String(string) => string.as_bytes().as_bstr().fmt(f),

			Self::Table(table) => write!(f, "table: {:#x}", table.address()),

			Self::Function(fun) => match &**fun {
				Function::Lua(_) => {
					write!(f, "function: {:#x}", &**fun as *const Function as usize)
				}
				Function::Rust(native) => write!(f, "function: builtin: {}", native.name()),
			},

			Self::Thread(thread) => write!(f, "thread: {:#x}", thread.address()),

			Self::UserData(userdata) => write!(f, "userdata: {:#x}", userdata.address()),
		}
	}
}
