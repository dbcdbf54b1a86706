automod::dir!("src/runtime/lib");

use super::{
	panic::Panic,
	value::{CallContext, Control, NativeFun, Protection, RustFun, Table, Value},
	vm::{metamethod, Thread, Vm},
};


/// Register the base library into the global environment.
/// Native functions submit themselves through the inventory registry; a dot in the
/// name denotes an entry in a nested table (coroutine.resume).
pub fn register(vm: &mut Vm) {
	let globals = vm.globals();

	for fun in inventory::iter::<RustFun> {
		let name = fun.name();

		match name.split_once('.') {
			None => {
				globals
					.set(name.into(), fun.copy().into())
					.expect("invalid builtin name");
			}

			Some((module, entry)) => {
				let key: Value = module.into();

				let table = match globals.get(&key) {
					Value::Table(table) => table,

					_ => {
						let table = Table::new();
						globals
							.set(key, Value::Table(table.copy()))
							.expect("invalid builtin module name");
						table
					}
				};

				table
					.set(entry.into(), fun.copy().into())
					.expect("invalid builtin name");
			}
		}
	}

	globals
		.set("_G".into(), globals.copy().into())
		.expect("failed to register _G");

	globals
		.set("_VERSION".into(), "Lua 5.2".into())
		.expect("failed to register _VERSION");
}


inventory::collect!(RustFun);
