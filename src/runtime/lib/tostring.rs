use gc::{Finalize, Trace};

use super::{
	metamethod,
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
};


inventory::submit!{ RustFun::from(ToString) }

#[derive(Trace, Finalize)]
struct ToString;

impl NativeFun for ToString {
	fn name(&self) -> &'static str { "tostring" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		if context.args_len == 0 {
			return Err(Panic::invalid_args(0, 1, context.pos));
		}

		let value = context.arg(0);

		// A __tostring metamethod takes over entirely.
		if let Some(handler) = metamethod(&value, &context.vm.meta_names().tostring) {
			return Ok(
				Control::Call {
					function: handler,
					args: vec![value],
					protection: None,
				}
			);
		}

		Ok(Control::value(value.to_string().into()))
	}
}
