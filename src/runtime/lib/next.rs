use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(Next) }

#[derive(Trace, Finalize)]
pub(super) struct Next;

impl NativeFun for Next {
	fn name(&self) -> &'static str { "next" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let table = match context.arg(0) {
			Value::Table(table) => table,
			other => return Err(Panic::type_error(other, "table", context.pos)),
		};

		let key = context.arg(1);

		match table.next(&key) {
			Ok(Some((key, value))) => Ok(Control::Return(vec![key, value])),
			Ok(None) => Ok(Control::value(Value::Nil)),
			Err(_) => Err(Panic::custom("invalid key to 'next'".into())),
		}
	}
}
