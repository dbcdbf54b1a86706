use gc::{Finalize, Trace};

use super::{
	next::Next,
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(Pairs) }

#[derive(Trace, Finalize)]
struct Pairs;

impl NativeFun for Pairs {
	fn name(&self) -> &'static str { "pairs" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let table = context.arg(0);

		if !matches!(table, Value::Table(_)) {
			return Err(Panic::type_error(table, "table", context.pos));
		}

		Ok(
			Control::Return(
				vec![
					RustFun::from(Next).into(),
					table,
					Value::Nil,
				]
			)
		)
	}
}
