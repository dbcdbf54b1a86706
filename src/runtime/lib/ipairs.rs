use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(Ipairs) }

#[derive(Trace, Finalize)]
struct Ipairs;

impl NativeFun for Ipairs {
	fn name(&self) -> &'static str { "ipairs" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let table = context.arg(0);

		if !matches!(table, Value::Table(_)) {
			return Err(Panic::type_error(table, "table", context.pos));
		}

		Ok(
			Control::Return(
				vec![
					RustFun::from(IpairsIter).into(),
					table,
					0.0.into(),
				]
			)
		)
	}
}


/// The iterator function of ipairs: steps through integer keys, stopping at the first
/// nil in sequence.
#[derive(Trace, Finalize)]
struct IpairsIter;

impl NativeFun for IpairsIter {
	fn name(&self) -> &'static str { "ipairs.iterator" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let table = match context.arg(0) {
			Value::Table(table) => table,
			other => return Err(Panic::type_error(other, "table", context.pos)),
		};

		let index = match context.arg(1).as_number() {
			Some(index) => index as i64 + 1,
			None => return Err(Panic::type_error(context.arg(1), "number", context.pos)),
		};

		match table.get_int(index) {
			Value::Nil => Ok(Control::value(Value::Nil)),
			value => Ok(Control::Return(vec![(index as f64).into(), value])),
		}
	}
}
