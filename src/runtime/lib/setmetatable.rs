use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(SetMetatable) }

#[derive(Trace, Finalize)]
struct SetMetatable;

impl NativeFun for SetMetatable {
	fn name(&self) -> &'static str { "setmetatable" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let table = match context.arg(0) {
			Value::Table(table) => table,
			other => return Err(Panic::type_error(other, "table", context.pos)),
		};

		match context.arg(1) {
			Value::Nil => table.set_metatable(None),
			Value::Table(metatable) => table.set_metatable(Some(metatable)),
			other => return Err(Panic::type_error(other, "nil or table", context.pos)),
		}

		Ok(Control::value(Value::Table(table)))
	}
}
