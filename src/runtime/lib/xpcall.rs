use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	Protection,
	RustFun,
};


inventory::submit!{ RustFun::from(Xpcall) }

#[derive(Trace, Finalize)]
struct Xpcall;

impl NativeFun for Xpcall {
	fn name(&self) -> &'static str { "xpcall" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		if context.args_len < 2 {
			return Err(Panic::invalid_args(context.args_len as u32, 2, context.pos));
		}

		let function = context.arg(0);
		let handler = context.arg(1);
		let args = (2 .. context.args_len)
			.map(|ix| context.arg(ix))
			.collect();

		Ok(
			Control::Call {
				function,
				args,
				protection: Some(Protection { handler: Some(handler) }),
			}
		)
	}
}
