use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(RawSet) }

#[derive(Trace, Finalize)]
struct RawSet;

impl NativeFun for RawSet {
	fn name(&self) -> &'static str { "rawset" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		match context.arg(0) {
			Value::Table(table) => {
				table
					.set(context.arg(1), context.arg(2))
					.map_err(|error| Panic::table_index(error, context.pos.copy()))?;

				Ok(Control::value(Value::Table(table)))
			}

			other => Err(Panic::type_error(other, "table", context.pos)),
		}
	}
}
