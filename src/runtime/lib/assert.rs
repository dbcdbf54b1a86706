use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
};


inventory::submit!{ RustFun::from(Assert) }

#[derive(Trace, Finalize)]
struct Assert;

impl NativeFun for Assert {
	fn name(&self) -> &'static str { "assert" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		if context.args_len == 0 {
			return Err(Panic::invalid_args(0, 1, context.pos));
		}

		if context.arg(0).is_truthy() {
			// All arguments are forwarded on success.
			Ok(Control::Return(context.args()))
		} else {
			let message = match context.arg(1) {
				message if message.is_nil() => None,
				message => Some(message),
			};

			Err(Panic::assertion_failed(message, context.pos))
		}
	}
}
