use gc::{Finalize, Trace};

use crate::fmt::Show;

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(ErrorFun) }

#[derive(Trace, Finalize)]
struct ErrorFun;

impl NativeFun for ErrorFun {
	fn name(&self) -> &'static str { "error" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let value = context.arg(0);

		// A string message at level one and above gets the position of the caller
		// prepended, qualifying it with the chunk name.
		let level = match context.arg(1) {
			Value::Nil => 1.0,
			Value::Number(level) => level.0,
			_ => 1.0,
		};

		let value = match &value {
			Value::String(message) if level > 0.0 => {
				let mut qualified = format!(
					"{}:{}: ",
					Show(&context.pos.source, context.interner()),
					context.pos.line,
				).into_bytes();

				qualified.extend_from_slice(message.as_bytes());

				Value::from(qualified.as_slice())
			}

			_ => value,
		};

		Err(Panic::custom(value))
	}
}
