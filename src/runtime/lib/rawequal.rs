use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
};


inventory::submit!{ RustFun::from(RawEqual) }

#[derive(Trace, Finalize)]
struct RawEqual;

impl NativeFun for RawEqual {
	fn name(&self) -> &'static str { "rawequal" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		Ok(Control::value((context.arg(0) == context.arg(1)).into()))
	}
}
