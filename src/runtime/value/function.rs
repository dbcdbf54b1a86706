use std::{
	fmt::{self, Debug},
	ops::Deref,
	rc::Rc,
};

use gc::{custom_trace, Gc, Finalize, Trace};

use crate::bytecode::Chunk;
use crate::symbol;
use super::super::{
	panic::Panic,
	source::SourcePos,
	vm::{Thread, Upvalue, Vm},
};
use super::Value;


/// A function object.
#[derive(Debug)]
pub enum Function {
	Lua(LuaFun),
	Rust(RustFun),
}


impl Function {
	/// Shallow copy.
	pub fn copy(&self) -> Self {
		match self {
			Function::Lua(fun) => Function::Lua(fun.copy()),
			Function::Rust(fun) => Function::Rust(fun.copy()),
		}
	}


	/// A human readable name for diagnostics.
	pub fn name(&self) -> Option<Box<[u8]>> {
		match self {
			Function::Lua(fun) => fun.chunk.name.clone(),
			Function::Rust(fun) => Some(fun.name().as_bytes().into()),
		}
	}
}


impl Finalize for Function { }


unsafe impl Trace for Function {
	custom_trace!(this, {
		match this {
			Function::Lua(fun) => mark(fun),
			Function::Rust(fun) => mark(fun),
		}
	});
}


impl From<LuaFun> for Function {
	fn from(fun: LuaFun) -> Self {
		Self::Lua(fun)
	}
}


impl From<RustFun> for Function {
	fn from(fun: RustFun) -> Self {
		Self::Rust(fun)
	}
}


impl<T: NativeFun> From<T> for Function {
	fn from(fun: T) -> Self {
		Self::Rust(fun.into())
	}
}


/// A closure: a compiled function prototype plus its captured upvalues. The constants
/// of the prototype are materialized once, when the closure is instantiated.
pub struct LuaFun {
	pub chunk: Rc<Chunk>,
	pub constants: Box<[Value]>,
	pub upvalues: Box<[Upvalue]>,
}


impl LuaFun {
	/// Build a closure over a chunk, materializing its constant pool into values.
	pub fn from_chunk(chunk: Rc<Chunk>, upvalues: Box<[Upvalue]>) -> Self {
		use crate::bytecode::Constant;

		let constants: Box<[Value]> = chunk
			.constants
			.iter()
			.map(|constant| match constant {
				Constant::Nil => Value::Nil,
				Constant::Bool(b) => (*b).into(),
				Constant::Number(n) => (*n).into(),
				Constant::String(s) => s.as_ref().into(),
			})
			.collect();

		Self { chunk, constants, upvalues }
	}


	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self {
			chunk: self.chunk.clone(),
			constants: self
				.constants
				.iter()
				.map(Value::copy)
				.collect(),
			upvalues: self
				.upvalues
				.iter()
				.map(Upvalue::copy)
				.collect(),
		}
	}
}


impl Finalize for LuaFun { }


// The chunk is plain data shared through a Rc, and holds no garbage collected values.
unsafe impl Trace for LuaFun {
	custom_trace!(this, {
		mark(&this.constants);
		mark(&this.upvalues);
	});
}


impl Debug for LuaFun {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.chunk.name {
			Some(name) => write!(f, "function {}", String::from_utf8_lossy(name)),
			None => write!(f, "function <anonymous>"),
		}
	}
}


/// The result of a native function call: either plain values, or a request for the
/// virtual machine to perform a control operation on the native's behalf. This is how
/// protected calls, yields and resumes are expressed without reentering the dispatch
/// loop from native code.
#[derive(Debug)]
pub enum Control {
	/// Plain return values.
	Return(Vec<Value>),
	/// Invoke the given function through the trampoline, delivering its results as the
	/// native's own. When protection is given, the call becomes a protected boundary.
	Call {
		function: Value,
		args: Vec<Value>,
		protection: Option<Protection>,
	},
	/// Suspend the running coroutine, handing the values to its resumer.
	Yield(Vec<Value>),
	/// Resume the given coroutine with the given arguments. A protected resume reports
	/// failures as a (false, message) tuple; an unprotected one (coroutine.wrap)
	/// propagates them.
	Resume {
		thread: Thread,
		args: Vec<Value>,
		protected: bool,
	},
}


impl Control {
	/// A single plain return value.
	pub fn value(value: Value) -> Self {
		Self::Return(vec![value])
	}


	/// No return values.
	pub fn none() -> Self {
		Self::Return(Vec::new())
	}
}


/// A protected call boundary, established by pcall or xpcall.
#[derive(Debug)]
pub struct Protection {
	/// The message handler, for xpcall.
	pub handler: Option<Value>,
}


/// Context for a native function call.
pub struct CallContext<'a> {
	/// The virtual machine.
	pub vm: &'a mut Vm,
	/// The stack index of the first argument in the running thread.
	pub args_start: usize,
	/// The number of arguments.
	pub args_len: usize,
	/// The source position of the call, which allows proper location of panics.
	pub pos: SourcePos,
}


impl<'a> CallContext<'a> {
	/// Get the argument at the given index, or nil if absent.
	pub fn arg(&self, ix: usize) -> Value {
		if ix < self.args_len {
			self.vm.stack_get(self.args_start + ix)
		} else {
			Value::Nil
		}
	}


	/// Copy all arguments out of the stack.
	pub fn args(&self) -> Vec<Value> {
		(0 .. self.args_len)
			.map(|ix| self.arg(ix))
			.collect()
	}


	/// Get the symbol interner.
	pub fn interner(&self) -> &symbol::Interner {
		self.vm.interner()
	}


	/// Invoke a function from native code, reentering the virtual machine. Nested Lua
	/// calls made by the invoked function still run on the flat dispatch loop, but the
	/// native frame itself occupies the host stack, so coroutines cannot yield across
	/// this boundary.
	pub fn call(&mut self, function: Value, args: Vec<Value>) -> Result<Vec<Value>, Panic> {
		self.vm.call_value(function, args, self.pos.copy())
	}
}


/// A native function implementation.
pub trait NativeFun: Trace + Finalize + 'static {
	/// Get a human-readable name for the function.
	/// This is also used for registration in the global environment, with dots
	/// denoting nested tables (coroutine.resume), and therefore must be unique.
	fn name(&self) -> &'static str;
	/// Invoke the function.
	fn call(&self, context: CallContext) -> Result<Control, Panic>;
}


/// A garbage-collected native function.
#[derive(Trace, Finalize)]
pub struct RustFun(Gc<Box<dyn NativeFun>>);


impl RustFun {
	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self(self.0.clone())
	}


	/// Get a human-readable name for the function.
	pub fn name(&self) -> &'static str {
		self.0.deref().name()
	}


	/// Invoke the function.
	pub fn call(&self, context: CallContext) -> Result<Control, Panic> {
		self.0.deref().call(context)
	}
}


impl Debug for RustFun {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}


impl<T: NativeFun> From<T> for RustFun {
	fn from(fun: T) -> Self {
		Self(Gc::new(Box::new(fun)))
	}
}
