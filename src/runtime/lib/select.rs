use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(Select) }

#[derive(Trace, Finalize)]
struct Select;

impl NativeFun for Select {
	fn name(&self) -> &'static str { "select" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let rest = context.args_len.saturating_sub(1);

		match context.arg(0) {
			// select('#', ...) counts the remaining arguments.
			Value::String(string) if string.as_bytes() == b"#" => {
				Ok(Control::value((rest as f64).into()))
			}

			Value::Number(number) if number.0 >= 1.0 => {
				let from = number.0 as usize;

				Ok(
					Control::Return(
						(from ..= rest)
							.map(|ix| context.arg(ix))
							.collect()
					)
				)
			}

			// Negative indices count from the end.
			Value::Number(number) if number.0 < 0.0 => {
				let back = (-number.0) as usize;

				if back > rest {
					return Err(Panic::type_error(context.arg(0), "index in range", context.pos));
				}

				let from = rest + 1 - back;

				Ok(
					Control::Return(
						(from ..= rest)
							.map(|ix| context.arg(ix))
							.collect()
					)
				)
			}

			other => Err(Panic::type_error(other, "number or '#'", context.pos)),
		}
	}
}
