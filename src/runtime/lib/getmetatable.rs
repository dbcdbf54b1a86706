use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(GetMetatable) }

#[derive(Trace, Finalize)]
struct GetMetatable;

impl NativeFun for GetMetatable {
	fn name(&self) -> &'static str { "getmetatable" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let metatable = context
			.arg(0)
			.metatable()
			.map(Value::Table)
			.unwrap_or(Value::Nil);

		Ok(Control::value(metatable))
	}
}
