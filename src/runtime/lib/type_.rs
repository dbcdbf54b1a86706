use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
};


inventory::submit!{ RustFun::from(Type) }

#[derive(Trace, Finalize)]
struct Type;

impl NativeFun for Type {
	fn name(&self) -> &'static str { "type" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		if context.args_len == 0 {
			return Err(Panic::invalid_args(0, 1, context.pos));
		}

		Ok(Control::value(context.arg(0).type_name().into()))
	}
}
