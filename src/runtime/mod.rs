mod lib;
mod panic;
mod source;
#[cfg(test)]
mod tests;
pub mod value;
pub mod vm;

use std::rc::Rc;

use crate::bytecode::Chunk;
use crate::symbol::Interner;
use value::{LuaFun, Table, Value};
pub use panic::{Panic, TraceFrame, Traceback};
pub use source::SourcePos;
pub use vm::{Interruption, Vm};
use vm::Upvalue;


/// The module loader boundary: how a require facility, which is not part of the core,
/// obtains module sources. Implementations are registered by the embedder.
pub trait ModuleLoader {
	/// Check whether the module exists.
	fn exists(&mut self, name: &[u8]) -> bool;
	/// Retrieve the module's source text.
	fn load(&mut self, name: &[u8]) -> std::io::Result<Vec<u8>>;
}


/// The Lua runtime: a virtual machine with the base library registered.
pub struct Runtime {
	vm: Vm,
	module_loader: Option<Box<dyn ModuleLoader>>,
}


impl Runtime {
	pub fn new(interner: Interner) -> Self {
		let mut vm = Vm::new(interner);
		lib::register(&mut vm);

		Self { vm, module_loader: None }
	}


	/// Evaluate a compiled chunk as the main function, on the main thread.
	/// The chunk is closed over the global environment through its _ENV upvalue.
	pub fn eval(&mut self, chunk: Chunk) -> Result<Vec<Value>, Panic> {
		let source = chunk.source;

		let main = LuaFun::from_chunk(
			Rc::new(chunk),
			Box::new([ Upvalue::closed(self.vm.globals().into()) ]),
		);

		self.vm.call_value(main.into(), Vec::new(), SourcePos::file(source))
	}


	pub fn interner(&self) -> &Interner {
		self.vm.interner()
	}


	pub fn interner_mut(&mut self) -> &mut Interner {
		self.vm.interner_mut()
	}


	/// The global environment table.
	pub fn globals(&self) -> Table {
		self.vm.globals()
	}


	/// A handle for requesting cancellation from outside the interpreter.
	pub fn interruption(&self) -> Interruption {
		self.vm.interruption()
	}


	pub fn set_module_loader<L: ModuleLoader + 'static>(&mut self, loader: L) {
		self.module_loader = Some(Box::new(loader));
	}


	pub fn module_loader(&mut self) -> Option<&mut (dyn ModuleLoader + 'static)> {
		self.module_loader.as_deref_mut()
	}
}
