use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(RawGet) }

#[derive(Trace, Finalize)]
struct RawGet;

impl NativeFun for RawGet {
	fn name(&self) -> &'static str { "rawget" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		match context.arg(0) {
			Value::Table(table) => Ok(Control::value(table.get(&context.arg(1)))),
			other => Err(Panic::type_error(other, "table", context.pos)),
		}
	}
}
