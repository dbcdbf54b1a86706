use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	Protection,
	RustFun,
};


inventory::submit!{ RustFun::from(Pcall) }

#[derive(Trace, Finalize)]
struct Pcall;

impl NativeFun for Pcall {
	fn name(&self) -> &'static str { "pcall" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		if context.args_len == 0 {
			return Err(Panic::invalid_args(0, 1, context.pos));
		}

		let function = context.arg(0);
		let args = (1 .. context.args_len)
			.map(|ix| context.arg(ix))
			.collect();

		Ok(
			Control::Call {
				function,
				args,
				protection: Some(Protection { handler: None }),
			}
		)
	}
}
