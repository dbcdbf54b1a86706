use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(RawLen) }

#[derive(Trace, Finalize)]
struct RawLen;

impl NativeFun for RawLen {
	fn name(&self) -> &'static str { "rawlen" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		match context.arg(0) {
			Value::Table(table) => Ok(Control::value((table.length() as f64).into())),
			Value::String(string) => Ok(Control::value((string.len() as f64).into())),
			other => Err(Panic::type_error(other, "table or string", context.pos)),
		}
	}
}
