use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(ToNumber) }

#[derive(Trace, Finalize)]
struct ToNumber;

impl NativeFun for ToNumber {
	fn name(&self) -> &'static str { "tonumber" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let value = context.arg(0);

		// With an explicit base, the value must be a string of digits in that base.
		if context.args_len >= 2 && !context.arg(1).is_nil() {
			let base = match context.arg(1).as_number() {
				Some(base) if (2.0 ..= 36.0).contains(&base) => base as u32,
				other => return Err(
					Panic::type_error(
						other.map(Value::from).unwrap_or(context.arg(1)),
						"base between 2 and 36",
						context.pos,
					)
				),
			};

			let parsed = value
				.as_str()
				.and_then(|string| std::str::from_utf8(string.as_bytes()).ok())
				.and_then(|text| i64::from_str_radix(text.trim(), base).ok())
				.map(|number| Value::from(number as f64))
				.unwrap_or(Value::Nil);

			return Ok(Control::value(parsed));
		}

		let parsed = match &value {
			Value::Number(_) => value.copy(),

			Value::String(string) => string
				.to_number()
				.map(Value::from)
				.unwrap_or(Value::Nil),

			_ => Value::Nil,
		};

		Ok(Control::value(parsed))
	}
}
