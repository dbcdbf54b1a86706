mod frame;
mod meta;
mod ops;
#[cfg(test)]
mod tests;
mod thread;
mod upvalue;

use std::{
	cell::Cell,
	rc::Rc,
};

use gc::Gc;

use crate::bytecode::{self, Chunk, OpCode};
use crate::symbol::Interner;
use super::panic::{Panic, TraceFrame, Traceback};
use super::source::SourcePos;
use super::value::{
	CallContext,
	Control,
	Function,
	LuaFun,
	Protection,
	Table,
	Value,
};
pub use frame::{Frame, PostOp};
pub use meta::{binary_metamethod, metamethod, MetaNames};
pub use thread::{Status, Thread};
pub use upvalue::Upvalue;


/// The value stack limit, per thread.
const STACK_LIMIT: usize = 1 << 20;

/// The call stack limit, per thread. Tail calls don't consume frames.
const FRAME_LIMIT: usize = 200_000;

/// How long a metatable chain may grow before indexing gives up.
const META_CHAIN_LIMIT: usize = 100;


/// A cloneable handle to request cancellation of a running interpreter.
/// The signal is checked at suspension points, where it is injected as a panic.
#[derive(Debug, Clone, Default)]
pub struct Interruption(Rc<Cell<bool>>);


impl Interruption {
	pub fn interrupt(&self) {
		self.0.set(true);
	}


	pub fn is_interrupted(&self) -> bool {
		self.0.get()
	}


	pub fn clear(&self) {
		self.0.set(false);
	}
}


/// A resumer blocked on a coroutine.
#[derive(Debug)]
struct ResumeEntry {
	thread: Thread,
	/// Where the resume results are delivered once the coroutine yields or finishes.
	post: PostOp,
	/// Whether failures produce a (false, message) tuple instead of propagating.
	protected: bool,
}


/// The arguments of a call being set up.
enum CallArgs {
	/// The arguments are already in place on the stack, right after the callee slot.
	OnStack {
		func_ix: usize,
		count: usize,
	},
	/// The arguments are owned values, to be placed by the call machinery.
	Owned(Vec<Value>),
}


/// One dispatch step either continues, or finishes a host invocation with values.
type Step = Option<Vec<Value>>;


/// The virtual machine.
///
/// The dispatch loop is a trampoline: Lua to Lua calls, metamethod dispatch and
/// index fallbacks push a frame and restart the loop in place, so the interpreter's
/// recursion depth never depends on the host call stack. The single exception is a
/// native function reentering the interpreter through CallContext::call, which is a
/// host stack boundary by definition.
pub struct Vm {
	/// The running thread.
	current: Thread,
	/// Threads blocked resuming other threads, outermost first.
	resume_chain: Vec<ResumeEntry>,
	/// The global environment, reachable from Lua code through the _ENV upvalue.
	globals: Table,
	/// Pre-built metamethod name keys.
	meta: MetaNames,
	/// The symbol interner.
	interner: Interner,
	/// The cancellation signal.
	interruption: Interruption,
}


impl Vm {
	pub fn new(interner: Interner) -> Self {
		Self {
			current: Thread::main(),
			resume_chain: Vec::new(),
			globals: Table::new(),
			meta: MetaNames::new(),
			interner,
			interruption: Interruption::default(),
		}
	}


	pub fn interner(&self) -> &Interner {
		&self.interner
	}


	pub fn interner_mut(&mut self) -> &mut Interner {
		&mut self.interner
	}


	pub fn globals(&self) -> Table {
		self.globals.copy()
	}


	pub fn interruption(&self) -> Interruption {
		self.interruption.clone()
	}


	pub fn current_thread(&self) -> Thread {
		self.current.copy()
	}


	pub fn meta_names(&self) -> &MetaNames {
		&self.meta
	}


	/// Read a slot of the running thread's stack.
	pub fn stack_get(&self, ix: usize) -> Value {
		self.current.stack_get(ix)
	}


	/// Invoke a callable value, running the dispatch loop until it returns.
	/// This is the host entry point, used both by the runtime to start a program and by
	/// native functions reentering the interpreter.
	pub fn call_value(
		&mut self,
		function: Value,
		mut args: Vec<Value>,
		pos: SourcePos,
	) -> Result<Vec<Value>, Panic> {
		let function = self.resolve_callable(function, &mut args, &pos)?;

		match &*function {
			Function::Rust(native) => {
				let native = native.copy();

				let args_len = args.len();
				let args_start = {
					let mut state = self.current.state_mut();
					let start = state.stack.len();
					state.stack.extend(args);
					start
				};

				let control = native.call(
					CallContext {
						vm: self,
						args_start,
						args_len,
						pos: pos.copy(),
					}
				);

				self.current.state_mut().stack.truncate(args_start);

				match control? {
					Control::Return(values) => Ok(values),

					Control::Call { function, args, protection } => match protection {
						None => self.call_value(function, args, pos),

						Some(protection) => match self.call_value(function, args, pos.copy()) {
							Ok(mut values) => {
								values.insert(0, true.into());
								Ok(values)
							}

							Err(panic) => {
								let value = self.protected_error_value(panic, protection, &pos)?;
								Ok(vec![false.into(), value])
							}
						},
					},

					Control::Yield(_) => Err(
						Panic::coroutine("attempt to yield across a native call boundary", pos)
					),

					Control::Resume { .. } => Err(
						Panic::coroutine("attempt to resume across a native call boundary", pos)
					),
				}
			}

			Function::Lua(_) => {
				self.push_lua_frame(function.clone(), CallArgs::Owned(args), PostOp::Root, None, &pos)?;
				self.run()
			}
		}
	}


	// ---- The dispatch loop ----

	fn run(&mut self) -> Result<Vec<Value>, Panic> {
		loop {
			match self.step() {
				Ok(None) => (),

				Ok(Some(values)) => return Ok(values),

				Err(panic) => {
					let panic = panic.with_traceback(|| self.capture_traceback());

					if let Some(values) = self.unwind(panic)? {
						return Ok(values);
					}
				}
			}
		}
	}


	/// Execute a single instruction of the running thread's topmost frame.
	fn step(&mut self) -> Result<Step, Panic> {
		let (function, base, pc) = {
			let state = self.current.state();
			let frame = state.frames.last().expect("dispatch without a frame");
			(frame.function.clone(), frame.base, frame.pc)
		};

		let lua = match &*function {
			Function::Lua(lua) => lua,
			Function::Rust(_) => unreachable!("native function in a frame"),
		};

		let chunk = &lua.chunk;
		let instruction = chunk.code[pc];

		{
			let mut state = self.current.state_mut();
			state.frames.last_mut().expect("dispatch without a frame").pc = pc + 1;
		}

		let pos = SourcePos::new(chunk.pos_at(pc), chunk.source);

		let a = instruction.a() as usize;

		match instruction.opcode() {
			OpCode::Move => {
				let value = self.reg(base, instruction.b() as usize);
				self.set_reg(base, a, value);
			}

			OpCode::LoadK => {
				let value = lua.constants[instruction.bx() as usize].copy();
				self.set_reg(base, a, value);
			}

			OpCode::LoadBool => {
				self.set_reg(base, a, (instruction.b() != 0).into());

				if instruction.c() != 0 {
					self.skip_instruction();
				}
			}

			OpCode::LoadNil => {
				for i in 0 ..= instruction.b() as usize {
					self.set_reg(base, a + i, Value::Nil);
				}
			}

			OpCode::GetUpVal => {
				let value = lua.upvalues[instruction.b() as usize].get();
				self.set_reg(base, a, value);
			}

			OpCode::SetUpVal => {
				let value = self.reg(base, a);
				lua.upvalues[instruction.b() as usize].set(value);
			}

			OpCode::GetTabUp => {
				let object = lua.upvalues[instruction.b() as usize].get();
				let key = self.rk(lua, base, instruction.c());
				self.index_get(object, key, base + a, &pos)?;
			}

			OpCode::GetTable => {
				let object = self.reg(base, instruction.b() as usize);
				let key = self.rk(lua, base, instruction.c());
				self.index_get(object, key, base + a, &pos)?;
			}

			OpCode::SetTabUp => {
				let object = lua.upvalues[a].get();
				let key = self.rk(lua, base, instruction.b());
				let value = self.rk(lua, base, instruction.c());
				self.index_set(object, key, value, &pos)?;
			}

			OpCode::SetTable => {
				let object = self.reg(base, a);
				let key = self.rk(lua, base, instruction.b());
				let value = self.rk(lua, base, instruction.c());
				self.index_set(object, key, value, &pos)?;
			}

			OpCode::NewTable => {
				self.set_reg(base, a, Table::new().into());
			}

			OpCode::Self_ => {
				let object = self.reg(base, instruction.b() as usize);
				let key = self.rk(lua, base, instruction.c());
				self.set_reg(base, a + 1, object.copy());
				self.index_get(object, key, base + a, &pos)?;
			}

			OpCode::Add | OpCode::Sub | OpCode::Mul
			| OpCode::Div | OpCode::Mod | OpCode::Pow => {
				let op = match instruction.opcode() {
					OpCode::Add => ops::Arith::Add,
					OpCode::Sub => ops::Arith::Sub,
					OpCode::Mul => ops::Arith::Mul,
					OpCode::Div => ops::Arith::Div,
					OpCode::Mod => ops::Arith::Mod,
					_ => ops::Arith::Pow,
				};

				let left = self.rk(lua, base, instruction.b());
				let right = self.rk(lua, base, instruction.c());

				match ops::arith_fast_path(op, &left, &right) {
					Some(value) => self.set_reg(base, a, value),

					None => {
						let name = match op {
							ops::Arith::Add => &self.meta.add,
							ops::Arith::Sub => &self.meta.sub,
							ops::Arith::Mul => &self.meta.mul,
							ops::Arith::Div => &self.meta.div,
							ops::Arith::Mod => &self.meta.modulo,
							ops::Arith::Pow => &self.meta.pow,
						};

						match binary_metamethod(&left, &right, name) {
							Some(handler) => self.begin_call(
								handler,
								CallArgs::Owned(vec![left, right]),
								PostOp::SetResult { dst: base + a },
								None,
								&pos,
							)?,

							None => {
								let offender =
									if left.coerce_number().is_none() { left } else { right };

								return Err(Panic::invalid_arithmetic(offender, pos));
							}
						}
					}
				}
			}

			OpCode::Unm => {
				let value = self.reg(base, instruction.b() as usize);

				match value.coerce_number() {
					Some(number) => self.set_reg(base, a, (-number).into()),

					None => match metamethod(&value, &self.meta.unm) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![value.copy(), value]),
							PostOp::SetResult { dst: base + a },
							None,
							&pos,
						)?,

						None => return Err(Panic::invalid_arithmetic(value, pos)),
					},
				}
			}

			OpCode::Not => {
				let value = self.reg(base, instruction.b() as usize);
				self.set_reg(base, a, (!value.is_truthy()).into());
			}

			OpCode::Len => {
				let value = self.reg(base, instruction.b() as usize);

				match &value {
					Value::String(string) => {
						let length = string.len() as f64;
						self.set_reg(base, a, length.into());
					}

					Value::Table(table) => match metamethod(&value, &self.meta.len) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![value.copy()]),
							PostOp::SetResult { dst: base + a },
							None,
							&pos,
						)?,

						None => {
							let length = table.length() as f64;
							self.set_reg(base, a, length.into());
						}
					},

					_ => match metamethod(&value, &self.meta.len) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![value.copy()]),
							PostOp::SetResult { dst: base + a },
							None,
							&pos,
						)?,

						None => return Err(Panic::invalid_length(value, pos)),
					},
				}
			}

			OpCode::Concat => {
				self.concat_fold(
					base + a,
					base + instruction.b() as usize,
					base + instruction.c() as usize,
					&pos,
				)?;
			}

			OpCode::Jmp => {
				self.jump(instruction.sbx());

				if a != 0 {
					self.close_upvalues(base + a - 1);
				}
			}

			OpCode::Eq => {
				let left = self.rk(lua, base, instruction.b());
				let right = self.rk(lua, base, instruction.c());
				let expect = a != 0;

				let equal = left == right;

				let same_reference_kind = matches!(
					(&left, &right),
					(Value::Table(_), Value::Table(_)) | (Value::UserData(_), Value::UserData(_))
				);

				if !equal && same_reference_kind {
					if let Some(handler) = binary_metamethod(&left, &right, &self.meta.eq) {
						self.begin_call(
							handler,
							CallArgs::Owned(vec![left, right]),
							PostOp::Compare { expect, invert: false },
							None,
							&pos,
						)?;

						return Ok(None);
					}
				}

				if equal != expect {
					self.skip_instruction();
				}
			}

			OpCode::Lt => {
				let left = self.rk(lua, base, instruction.b());
				let right = self.rk(lua, base, instruction.c());
				let expect = a != 0;

				match ops::lt_fast_path(&left, &right) {
					Some(result) => {
						if result != expect {
							self.skip_instruction();
						}
					}

					None => match binary_metamethod(&left, &right, &self.meta.lt) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![left, right]),
							PostOp::Compare { expect, invert: false },
							None,
							&pos,
						)?,

						None => return Err(Panic::invalid_compare(left, right, pos)),
					},
				}
			}

			OpCode::Le => {
				let left = self.rk(lua, base, instruction.b());
				let right = self.rk(lua, base, instruction.c());
				let expect = a != 0;

				match ops::le_fast_path(&left, &right) {
					Some(result) => {
						if result != expect {
							self.skip_instruction();
						}
					}

					None => match binary_metamethod(&left, &right, &self.meta.le) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![left, right]),
							PostOp::Compare { expect, invert: false },
							None,
							&pos,
						)?,

						// a <= b falls back to not (b < a).
						None => match binary_metamethod(&left, &right, &self.meta.lt) {
							Some(handler) => self.begin_call(
								handler,
								CallArgs::Owned(vec![right, left]),
								PostOp::Compare { expect, invert: true },
								None,
								&pos,
							)?,

							None => return Err(Panic::invalid_compare(left, right, pos)),
						},
					},
				}
			}

			OpCode::Test => {
				let value = self.reg(base, a);

				if value.is_truthy() != (instruction.c() != 0) {
					self.skip_instruction();
				}
			}

			OpCode::TestSet => {
				let value = self.reg(base, instruction.b() as usize);

				if value.is_truthy() == (instruction.c() != 0) {
					self.set_reg(base, a, value);
				} else {
					self.skip_instruction();
				}
			}

			OpCode::Call => {
				let func_ix = base + a;
				let b = instruction.b();

				let count =
					if b == 0 {
						let top = self.current.state().top;
						top.saturating_sub(func_ix + 1)
					} else {
						b as usize - 1
					};

				let callee = self.stack_get(func_ix);

				self.begin_call(
					callee,
					CallArgs::OnStack { func_ix, count },
					PostOp::Call { dst: func_ix, want: instruction.c() },
					None,
					&pos,
				)?;
			}

			OpCode::TailCall => {
				let func_ix = base + a;
				let b = instruction.b();

				let count =
					if b == 0 {
						let top = self.current.state().top;
						top.saturating_sub(func_ix + 1)
					} else {
						b as usize - 1
					};

				let callee = self.stack_get(func_ix);
				let args: Vec<Value> = (0 .. count)
					.map(|i| self.stack_get(func_ix + 1 + i))
					.collect();

				self.tail_call(callee, args, &pos)?;
			}

			OpCode::Return => {
				let b = instruction.b();

				let count =
					if b == 0 {
						let top = self.current.state().top;
						top.saturating_sub(base + a)
					} else {
						b as usize - 1
					};

				let results: Vec<Value> = (0 .. count)
					.map(|i| self.stack_get(base + a + i))
					.collect();

				return self.pop_frame(results);
			}

			OpCode::ForPrep => {
				let initial = self.for_number(base, a, "initial value", &pos)?;
				let _limit = self.for_number(base, a + 1, "limit", &pos)?;
				let step = self.for_number(base, a + 2, "step", &pos)?;

				self.set_reg(base, a, (initial - step).into());
				self.jump(instruction.sbx());
			}

			OpCode::ForLoop => {
				let index = self.reg(base, a).as_number().expect("for index");
				let limit = self.reg(base, a + 1).as_number().expect("for limit");
				let step = self.reg(base, a + 2).as_number().expect("for step");

				let index = index + step;

				let proceed =
					if step >= 0.0 {
						index <= limit
					} else {
						index >= limit
					};

				self.set_reg(base, a, index.into());

				if proceed {
					self.set_reg(base, a + 3, index.into());
					self.jump(instruction.sbx());
				}
			}

			OpCode::TForCall => {
				let iterator = self.reg(base, a);
				let state = self.reg(base, a + 1);
				let control = self.reg(base, a + 2);

				self.begin_call(
					iterator,
					CallArgs::Owned(vec![state, control]),
					PostOp::Iter { dst: base + a + 3, want: instruction.c() },
					None,
					&pos,
				)?;
			}

			OpCode::TForLoop => {
				let value = self.reg(base, a + 1);

				if !value.is_nil() {
					self.set_reg(base, a, value);
					self.jump(instruction.sbx());
				}
			}

			OpCode::SetList => {
				let table = match self.reg(base, a) {
					Value::Table(table) => table,
					other => return Err(Panic::invalid_index(other, pos)),
				};

				let b = instruction.b();

				let count =
					if b == 0 {
						let top = self.current.state().top;
						top.saturating_sub(base + a + 1)
					} else {
						b as usize
					};

				let batch =
					if instruction.c() == 0 {
						// The real batch number lives in the following ExtraArg.
						let extra = {
							let mut state = self.current.state_mut();
							let frame = state.frames.last_mut().expect("dispatch without a frame");
							let extra = chunk.code[frame.pc];
							frame.pc += 1;
							extra
						};

						extra.ax()
					} else {
						instruction.c()
					};

				let offset = (batch as i64 - 1) * bytecode::FIELDS_PER_FLUSH as i64;

				for i in 1 ..= count {
					let value = self.reg(base, a + i);
					table.set_int(offset + i as i64, value);
				}
			}

			OpCode::Closure => {
				let proto = lua.chunk.protos[instruction.bx() as usize].clone();
				let closure = self.instantiate(lua, &proto, base);
				self.set_reg(base, a, closure);
			}

			OpCode::VarArg => {
				let b = instruction.b();
				let vararg: Vec<Value> = {
					let state = self.current.state();
					let frame = state.frames.last().expect("dispatch without a frame");
					frame.vararg.iter().map(Value::copy).collect()
				};

				if b == 0 {
					let count = vararg.len();

					for (i, value) in vararg.into_iter().enumerate() {
						self.set_reg(base, a + i, value);
					}

					self.current.state_mut().top = base + a + count;
				} else {
					for i in 0 .. b as usize - 1 {
						let value = vararg.get(i).map(Value::copy).unwrap_or(Value::Nil);
						self.set_reg(base, a + i, value);
					}
				}
			}

			OpCode::ExtraArg => {
				// Consumed by the preceding instruction; stray ones are no-ops.
			}
		}

		Ok(None)
	}


	// ---- Registers and operands ----

	fn reg(&self, base: usize, i: usize) -> Value {
		self.current.stack_get(base + i)
	}


	fn set_reg(&self, base: usize, i: usize, value: Value) {
		self.current.stack_set(base + i, value);
	}


	/// Resolve a register-or-constant operand.
	fn rk(&self, lua: &LuaFun, base: usize, operand: u32) -> Value {
		if bytecode::rk_is_constant(operand) {
			lua.constants[bytecode::rk_index(operand)].copy()
		} else {
			self.current.stack_get(base + operand as usize)
		}
	}


	fn jump(&self, offset: i32) {
		let mut state = self.current.state_mut();
		let frame = state.frames.last_mut().expect("jump without a frame");
		frame.pc = (frame.pc as i64 + offset as i64) as usize;
	}


	fn skip_instruction(&self) {
		self.jump(1);
	}


	fn for_number(
		&self,
		base: usize,
		i: usize,
		clause: &'static str,
		pos: &SourcePos,
	) -> Result<f64, Panic> {
		let value = self.reg(base, i);

		match value.coerce_number() {
			Some(number) => {
				self.set_reg(base, i, number.into());
				Ok(number)
			}

			None => Err(Panic::for_clause(clause, pos.copy())),
		}
	}


	// ---- Calls ----

	/// Follow the __call metamethod chain until an actual function is found, shifting
	/// the callable itself into the argument list at each step.
	fn resolve_callable(
		&self,
		callee: Value,
		args: &mut Vec<Value>,
		pos: &SourcePos,
	) -> Result<Gc<Function>, Panic> {
		let mut callee = callee;

		for _ in 0 .. META_CHAIN_LIMIT {
			match callee {
				Value::Function(function) => return Ok(function),

				other => match metamethod(&other, &self.meta.call) {
					Some(handler) => {
						args.insert(0, other);
						callee = handler;
					}

					None => return Err(Panic::invalid_call(other, pos.copy())),
				},
			}
		}

		Err(Panic::invalid_call(callee, pos.copy()))
	}


	/// Set up a call from within the dispatch loop. Lua targets push a frame and return
	/// immediately, to be executed by the restarted loop; native targets run in place,
	/// and their control result is applied before returning.
	fn begin_call(
		&mut self,
		callee: Value,
		args: CallArgs,
		post: PostOp,
		protection: Option<Protection>,
		pos: &SourcePos,
	) -> Result<(), Panic> {
		// Following a __call chain forces the arguments into owned form, since the
		// callable is shifted in front of them.
		let (function, args) = match callee {
			Value::Function(function) => (function, args),

			other => {
				let mut owned = match args {
					CallArgs::Owned(owned) => owned,

					CallArgs::OnStack { func_ix, count } => (0 .. count)
						.map(|i| self.stack_get(func_ix + 1 + i))
						.collect(),
				};

				let function = self.resolve_callable(other, &mut owned, pos)?;
				(function, CallArgs::Owned(owned))
			}
		};

		match &*function {
			Function::Lua(_) => {
				// Protected frames deliver through a wrapper that inserts the true
				// prefix; error unwinding strips it and substitutes false.
				let post = match &protection {
					Some(_) => PostOp::Protected(Box::new(post)),
					None => post,
				};

				self.push_lua_frame(function.clone(), args, post, protection, pos)
			}

			Function::Rust(native) => {
				let native = native.copy();

				let (args_start, args_len, scratch) = match args {
					CallArgs::OnStack { func_ix, count } => (func_ix + 1, count, None),

					CallArgs::Owned(owned) => {
						let len = owned.len();
						let mut state = self.current.state_mut();
						let start = state.stack.len();
						state.stack.extend(owned);
						(start, len, Some(start))
					}
				};

				let control = native.call(
					CallContext {
						vm: self,
						args_start,
						args_len,
						pos: pos.copy(),
					}
				);

				if let Some(scratch) = scratch {
					self.current.state_mut().stack.truncate(scratch);
				}

				match control {
					Err(panic) => match protection {
						// A protected native failed without ever getting a frame.
						Some(protection) => {
							let panic = panic.with_traceback(|| self.capture_traceback());
							let value = self.protected_error_value(panic, protection, pos)?;
							self.deliver(post, vec![false.into(), value])?;
							Ok(())
						}

						None => Err(panic),
					},

					Ok(Control::Return(values)) => {
						let post = match protection {
							Some(_) => PostOp::Protected(Box::new(post)),
							None => post,
						};

						self.deliver(post, values)?;
						Ok(())
					}

					Ok(Control::Call { function, args, protection: inner }) => {
						let post = match protection {
							Some(_) => PostOp::Protected(Box::new(post)),
							None => post,
						};

						self.begin_call(function, CallArgs::Owned(args), post, inner, pos)
					}

					Ok(Control::Yield(values)) => self.do_yield(values, post, pos),

					Ok(Control::Resume { thread, args, protected }) => {
						self.do_resume(thread, args, post, protected, pos)
					}
				}
			}
		}
	}


	/// Push a frame for a Lua closure.
	fn push_lua_frame(
		&mut self,
		function: Gc<Function>,
		args: CallArgs,
		post: PostOp,
		protection: Option<Protection>,
		pos: &SourcePos,
	) -> Result<(), Panic> {
		let (param_count, is_vararg, max_stack) = match &*function {
			Function::Lua(lua) => (
				lua.chunk.param_count as usize,
				lua.chunk.is_vararg,
				lua.chunk.max_stack as usize,
			),
			Function::Rust(_) => unreachable!("native function in a Lua frame"),
		};

		let mut state = self.current.state_mut();

		if state.frames.len() >= FRAME_LIMIT {
			return Err(Panic::stack_overflow(pos.copy()));
		}

		let (base, given) = match args {
			CallArgs::OnStack { func_ix, count } => (func_ix + 1, count),

			CallArgs::Owned(owned) => {
				let base = state.stack.len();
				state.stack.extend(owned.iter().map(Value::copy));
				(base, owned.len())
			}
		};

		if base + max_stack > STACK_LIMIT {
			return Err(Panic::stack_overflow(pos.copy()));
		}

		// Extra arguments beyond the declared parameters become the varargs.
		let vararg: Box<[Value]> =
			if is_vararg && given > param_count {
				(param_count .. given)
					.map(|i| {
						state.stack
							.get(base + i)
							.map(Value::copy)
							.unwrap_or(Value::Nil)
					})
					.collect()
			} else {
				Box::default()
			};

		// Missing arguments read as nil, and stale stack contents must not leak into
		// the frame's registers.
		if state.stack.len() < base + max_stack {
			state.stack.resize_with(base + max_stack, Value::default);
		}

		for i in given .. param_count {
			state.stack[base + i] = Value::Nil;
		}

		state.top = base + param_count;

		state.frames.push(
			Frame {
				function,
				base,
				pc: 0,
				vararg,
				post,
				protection,
			}
		);

		Ok(())
	}


	/// Perform a tail call: the current frame is replaced instead of stacked, keeping
	/// its delivery and protection, so that self recursion runs in constant frame
	/// space.
	fn tail_call(&mut self, callee: Value, mut args: Vec<Value>, pos: &SourcePos) -> Result<(), Panic> {
		let function = self.resolve_callable(callee, &mut args, pos)?;

		match &*function {
			Function::Rust(_) => {
				// A native tail target runs in place, and its results finish the frame.
				let results = self.call_native_now(&function, args, pos)?;
				self.pop_frame(results)?;
				Ok(())
			}

			Function::Lua(lua) => {
				let base = {
					let state = self.current.state();
					let frame = state.frames.last().expect("tail call without a frame");
					frame.base
				};

				self.close_upvalues(base);

				let param_count = lua.chunk.param_count as usize;
				let is_vararg = lua.chunk.is_vararg;
				let max_stack = lua.chunk.max_stack as usize;

				let vararg: Box<[Value]> =
					if is_vararg && args.len() > param_count {
						args[param_count ..].iter().map(Value::copy).collect()
					} else {
						Box::default()
					};

				let mut state = self.current.state_mut();

				if state.stack.len() < base + max_stack {
					state.stack.resize_with(base + max_stack, Value::default);
				}

				for i in 0 .. max_stack {
					state.stack[base + i] = args.get(i).map(Value::copy).unwrap_or(Value::Nil);
				}

				state.top = base + param_count;

				let frame = state.frames.last_mut().expect("tail call without a frame");
				frame.function = function.clone();
				frame.pc = 0;
				frame.vararg = vararg;

				Ok(())
			}
		}
	}


	/// Run a native function immediately with owned arguments, expecting plain results.
	fn call_native_now(
		&mut self,
		function: &Gc<Function>,
		args: Vec<Value>,
		pos: &SourcePos,
	) -> Result<Vec<Value>, Panic> {
		let native = match &**function {
			Function::Rust(native) => native.copy(),
			Function::Lua(_) => unreachable!("lua function in native call"),
		};

		let args_len = args.len();
		let args_start = {
			let mut state = self.current.state_mut();
			let start = state.stack.len();
			state.stack.extend(args);
			start
		};

		let control = native.call(
			CallContext {
				vm: self,
				args_start,
				args_len,
				pos: pos.copy(),
			}
		);

		self.current.state_mut().stack.truncate(args_start);

		match control? {
			Control::Return(values) => Ok(values),

			Control::Call { function, args, protection } => match protection {
				None => self.call_value(function, args, pos.copy()),

				Some(protection) => match self.call_value(function, args, pos.copy()) {
					Ok(mut values) => {
						values.insert(0, true.into());
						Ok(values)
					}

					Err(panic) => {
						let value = self.protected_error_value(panic, protection, pos)?;
						Ok(vec![false.into(), value])
					}
				},
			},

			Control::Yield(_) => Err(
				Panic::coroutine("attempt to yield across a native call boundary", pos.copy())
			),

			Control::Resume { .. } => Err(
				Panic::coroutine("attempt to resume across a native call boundary", pos.copy())
			),
		}
	}


	/// Pop the topmost frame, delivering its results to the frame below, the resumer,
	/// or out of the dispatch loop.
	fn pop_frame(&mut self, results: Vec<Value>) -> Result<Step, Panic> {
		let frame = {
			let mut state = self.current.state_mut();
			state.frames.pop().expect("return without a frame")
		};

		self.close_upvalues(frame.base);

		{
			let mut state = self.current.state_mut();
			state.stack.truncate(frame.base);
			state.top = frame.base;
		}

		self.deliver(frame.post, results)
	}


	/// Write delivered values per the post operation recorded at call time.
	fn deliver(&mut self, post: PostOp, mut values: Vec<Value>) -> Result<Step, Panic> {
		match post {
			PostOp::Root => Ok(Some(values)),

			PostOp::Coroutine => self.finish_coroutine(Ok(values)),

			PostOp::Call { dst, want } => {
				if want == 0 {
					let count = values.len();

					for (i, value) in values.into_iter().enumerate() {
						self.current.stack_set(dst + i, value);
					}

					self.current.state_mut().top = dst + count;
				} else {
					let mut values = values.into_iter();

					for i in 0 .. want as usize - 1 {
						let value = values.next().unwrap_or(Value::Nil);
						self.current.stack_set(dst + i, value);
					}
				}

				Ok(None)
			}

			PostOp::SetResult { dst } => {
				let value = values.into_iter().next().unwrap_or(Value::Nil);
				self.current.stack_set(dst, value);
				Ok(None)
			}

			PostOp::Discard => Ok(None),

			PostOp::Compare { expect, invert } => {
				let result = values
					.first()
					.map(Value::is_truthy)
					.unwrap_or(false);

				if (result != invert) != expect {
					self.skip_instruction();
				}

				Ok(None)
			}

			PostOp::Iter { dst, want } => {
				let mut values = values.into_iter();

				for i in 0 .. want as usize {
					let value = values.next().unwrap_or(Value::Nil);
					self.current.stack_set(dst + i, value);
				}

				Ok(None)
			}

			PostOp::Concat { a, b, c } => {
				let value = values.into_iter().next().unwrap_or(Value::Nil);
				self.current.stack_set(c - 1, value);

				// The position of the original instruction is gone; the fold itself
				// reports errors at the operands.
				let pos = self.current_pos();
				self.concat_fold(a, b, c - 1, &pos)?;
				Ok(None)
			}

			PostOp::Protected(inner) => {
				values.insert(0, true.into());
				self.deliver(*inner, values)
			}
		}
	}


	// ---- Indexing ----

	/// Read obj[key] into a stack slot, following the __index chain. A metamethod
	/// function synthesizes a call whose single result lands in the destination.
	fn index_get(
		&mut self,
		object: Value,
		key: Value,
		dst: usize,
		pos: &SourcePos,
	) -> Result<(), Panic> {
		let mut object = object;

		for _ in 0 .. META_CHAIN_LIMIT {
			if let Value::Table(table) = &object {
				let value = table.get(&key);

				if !value.is_nil() {
					self.current.stack_set(dst, value);
					return Ok(());
				}

				match metamethod(&object, &self.meta.index) {
					None => {
						self.current.stack_set(dst, Value::Nil);
						return Ok(());
					}

					Some(handler @ Value::Function(_)) => {
						return self.begin_call(
							handler,
							CallArgs::Owned(vec![object, key]),
							PostOp::SetResult { dst },
							None,
							pos,
						);
					}

					Some(next) => {
						object = next;
						continue;
					}
				}
			}

			match metamethod(&object, &self.meta.index) {
				Some(handler @ Value::Function(_)) => {
					return self.begin_call(
						handler,
						CallArgs::Owned(vec![object, key]),
						PostOp::SetResult { dst },
						None,
						pos,
					);
				}

				Some(next) => object = next,

				None => return Err(Panic::invalid_index(object, pos.copy())),
			}
		}

		Err(Panic::invalid_index(object, pos.copy()))
	}


	/// Write obj[key] = value, following the __newindex chain.
	fn index_set(
		&mut self,
		object: Value,
		key: Value,
		value: Value,
		pos: &SourcePos,
	) -> Result<(), Panic> {
		let mut object = object;

		for _ in 0 .. META_CHAIN_LIMIT {
			if let Value::Table(table) = &object {
				let existing = table.get(&key);

				if !existing.is_nil() {
					return table
						.set(key, value)
						.map_err(|error| Panic::table_index(error, pos.copy()));
				}

				match metamethod(&object, &self.meta.newindex) {
					None => {
						return table
							.set(key, value)
							.map_err(|error| Panic::table_index(error, pos.copy()));
					}

					Some(handler @ Value::Function(_)) => {
						return self.begin_call(
							handler,
							CallArgs::Owned(vec![object, key, value]),
							PostOp::Discard,
							None,
							pos,
						);
					}

					Some(next) => {
						object = next;
						continue;
					}
				}
			}

			match metamethod(&object, &self.meta.newindex) {
				Some(handler @ Value::Function(_)) => {
					return self.begin_call(
						handler,
						CallArgs::Owned(vec![object, key, value]),
						PostOp::Discard,
						None,
						pos,
					);
				}

				Some(next) => object = next,

				None => return Err(Panic::invalid_index(object, pos.copy())),
			}
		}

		Err(Panic::invalid_index(object, pos.copy()))
	}


	// ---- Concatenation ----

	/// Fold a concatenation over the absolute stack range [b, c], right to left,
	/// leaving the result in stack[a]. A pair requiring a metamethod suspends the fold
	/// into a synthesized call; the post operation resumes it.
	fn concat_fold(&mut self, a: usize, b: usize, c: usize, pos: &SourcePos) -> Result<(), Panic> {
		let mut c = c;

		while c > b {
			let left = self.current.stack_get(c - 1);
			let right = self.current.stack_get(c);

			match ops::concat_fast_path(&left, &right) {
				Some(value) => {
					self.current.stack_set(c - 1, value);
					c -= 1;
				}

				None => {
					return match binary_metamethod(&left, &right, &self.meta.concat) {
						Some(handler) => self.begin_call(
							handler,
							CallArgs::Owned(vec![left, right]),
							PostOp::Concat { a, b, c },
							None,
							pos,
						),

						None => {
							let offender = match &left {
								Value::String(_) | Value::Number(_) => right,
								_ => left,
							};

							Err(Panic::invalid_concat(offender, pos.copy()))
						}
					};
				}
			}
		}

		if a != b {
			let value = self.current.stack_get(b);
			self.current.stack_set(a, value);
		}

		Ok(())
	}


	// ---- Closures and upvalues ----

	/// Instantiate a closure from a prototype, capturing upvalues per its descriptors.
	fn instantiate(&mut self, enclosing: &LuaFun, proto: &Rc<Chunk>, base: usize) -> Value {
		let upvalues: Box<[Upvalue]> = proto
			.upvalues
			.iter()
			.map(|desc| match desc.kind {
				bytecode::UpvalueKind::Register(register) => {
					self.find_or_create_upvalue(base + register as usize)
				}

				bytecode::UpvalueKind::Upvalue(ix) => enclosing.upvalues[ix as usize].copy(),
			})
			.collect();

		LuaFun::from_chunk(proto.clone(), upvalues).into()
	}


	/// Find an open upvalue aliasing the given register of the running thread, or
	/// create one. Sharing is what makes sibling closures observe the same variable.
	fn find_or_create_upvalue(&mut self, register: usize) -> Upvalue {
		let existing = {
			let state = self.current.state();

			state.open_upvalues
				.iter()
				.find(|(ix, _)| *ix == register)
				.map(|(_, upvalue)| upvalue.copy())
		};

		match existing {
			Some(upvalue) => upvalue,

			None => {
				let upvalue = Upvalue::open(self.current.copy(), register);

				let mut state = self.current.state_mut();
				let insert_at = state.open_upvalues
					.iter()
					.position(|(ix, _)| *ix > register)
					.unwrap_or(state.open_upvalues.len());

				state.open_upvalues.insert(insert_at, (register, upvalue.copy()));

				upvalue
			}
		}
	}


	/// Close every open upvalue aliasing a register at or above the boundary.
	/// This runs on explicit close jumps, on scope exits with captured locals, and on
	/// every frame pop, which guarantees the open to closed transition happens exactly
	/// once per register.
	fn close_upvalues(&mut self, boundary: usize) {
		let to_close: Vec<Upvalue> = {
			let mut state = self.current.state_mut();

			let split = state.open_upvalues
				.iter()
				.position(|(ix, _)| *ix >= boundary)
				.unwrap_or(state.open_upvalues.len());

			state.open_upvalues
				.split_off(split)
				.into_iter()
				.map(|(_, upvalue)| upvalue)
				.collect()
		};

		for upvalue in to_close {
			upvalue.close();
		}
	}


	// ---- Coroutines ----

	/// Suspend the running coroutine, delivering the yielded values to its resumer.
	fn do_yield(&mut self, values: Vec<Value>, post: PostOp, pos: &SourcePos) -> Result<(), Panic> {
		if self.resume_chain.is_empty() {
			return Err(
				Panic::coroutine("attempt to yield from outside a coroutine", pos.copy())
			);
		}

		// A pending host invocation in this thread cannot be suspended.
		let crosses_host = self.current
			.state()
			.frames
			.iter()
			.any(|frame| matches!(frame.post, PostOp::Root));

		if crosses_host {
			return Err(
				Panic::coroutine("attempt to yield across a native call boundary", pos.copy())
			);
		}

		if self.interruption.is_interrupted() {
			return Err(Panic::interrupted(pos.copy()));
		}

		{
			let mut state = self.current.state_mut();
			state.resume_post = Some(post);
			state.status = Status::Suspended;
		}

		let entry = self.resume_chain.pop().expect("yield without a resumer");
		entry.thread.set_status(Status::Running);
		self.current = entry.thread.copy();

		let mut values = values;
		if entry.protected {
			values.insert(0, true.into());
		}

		self.deliver(entry.post, values)?;
		Ok(())
	}


	/// Resume a suspended coroutine. The first resume starts the body function with
	/// the given arguments; later resumes complete the pending yield with them.
	fn do_resume(
		&mut self,
		thread: Thread,
		args: Vec<Value>,
		post: PostOp,
		protected: bool,
		pos: &SourcePos,
	) -> Result<(), Panic> {
		if self.interruption.is_interrupted() {
			return Err(Panic::interrupted(pos.copy()));
		}

		if thread.status() != Status::Suspended {
			let message = match thread.status() {
				Status::Dead => "cannot resume dead coroutine",
				Status::Running => "cannot resume non-suspended coroutine",
				_ => "cannot resume non-suspended coroutine",
			};

			if protected {
				self.deliver(post, vec![false.into(), message.into()])?;
				return Ok(());
			}

			return Err(Panic::coroutine(message, pos.copy()));
		}

		self.current.set_status(Status::Normal);
		self.resume_chain.push(
			ResumeEntry {
				thread: self.current.copy(),
				post,
				protected,
			}
		);

		thread.set_status(Status::Running);
		self.current = thread.copy();

		let start = self.current.state_mut().start.take();

		match start {
			// First resume: start the body from scratch.
			Some(function) => self.begin_call(
				Value::Function(function),
				CallArgs::Owned(args),
				PostOp::Coroutine,
				None,
				pos,
			),

			// The coroutine is blocked in a yield: the resume arguments become the
			// yield's results.
			None => {
				let resume_post = self.current
					.state_mut()
					.resume_post
					.take()
					.expect("suspended coroutine without a resume point");

				self.deliver(resume_post, args)?;
				Ok(())
			}
		}
	}


	/// A coroutine finished, by return or by error. Control goes back to the resumer.
	fn finish_coroutine(&mut self, outcome: Result<Vec<Value>, Panic>) -> Result<Step, Panic> {
		self.current.set_status(Status::Dead);

		let entry = self.resume_chain.pop().expect("coroutine finished without a resumer");
		entry.thread.set_status(Status::Running);
		self.current = entry.thread.copy();

		match outcome {
			Ok(mut values) => {
				if entry.protected {
					values.insert(0, true.into());
				}

				self.deliver(entry.post, values)
			}

			Err(panic) => {
				if entry.protected {
					let value = panic.to_value(&self.interner);
					self.deliver(entry.post, vec![false.into(), value])
				} else {
					// An unprotected resumer propagates the panic in its own context.
					Err(panic)
				}
			}
		}
	}


	// ---- Errors ----

	/// Unwind the call stack after a panic: frames are popped until a protected
	/// boundary converts the panic into a failure tuple, a coroutine boundary hands it
	/// to the resumer, or a host boundary propagates it out.
	fn unwind(&mut self, panic: Panic) -> Result<Step, Panic> {
		loop {
			let has_frame = !self.current.state().frames.is_empty();

			if !has_frame {
				// A thread with no frames left can only be a coroutine that died
				// before pushing any, which cannot happen from within the loop.
				return Err(panic);
			}

			let (is_protected, is_root, is_coroutine) = {
				let state = self.current.state();
				let frame = state.frames.last().expect("unwind without a frame");

				(
					frame.protection.is_some(),
					matches!(frame.post, PostOp::Root),
					matches!(frame.post, PostOp::Coroutine),
				)
			};

			let frame = {
				let mut state = self.current.state_mut();
				state.frames.pop().expect("unwind without a frame")
			};

			self.close_upvalues(frame.base);

			{
				let mut state = self.current.state_mut();
				state.stack.truncate(frame.base);
				state.top = frame.base;
			}

			if is_protected {
				// Protected boundary: truncate back to the call site and produce the
				// failure tuple instead of propagating.
				let protection = frame.protection.expect("protected frame without protection");
				let pos = self.current_pos();
				let value = self.protected_error_value(panic, protection, &pos)?;

				let post = match frame.post {
					PostOp::Protected(inner) => *inner,
					other => other,
				};

				return self.deliver(post, vec![false.into(), value]);
			}

			if is_root {
				return Err(panic);
			}

			if is_coroutine {
				return self.finish_coroutine(Err(panic));
			}

			// Ordinary frame: keep unwinding.
		}
	}


	/// Produce the error value delivered by a protected boundary, running the xpcall
	/// message handler if one was registered.
	fn protected_error_value(
		&mut self,
		panic: Panic,
		protection: Protection,
		pos: &SourcePos,
	) -> Result<Value, Panic> {
		let value = panic.to_value(&self.interner);

		match protection.handler {
			None => Ok(value),

			Some(handler) => {
				let results = self.call_value(handler, vec![value], pos.copy())?;
				Ok(results.into_iter().next().unwrap_or(Value::Nil))
			}
		}
	}


	/// Capture the live call stack for a traceback, across the resume chain.
	fn capture_traceback(&self) -> Traceback {
		let mut frames = Vec::new();

		let mut collect = |thread: &Thread| {
			let state = thread.state();

			for frame in state.frames.iter().rev() {
				if let Function::Lua(lua) = &*frame.function {
					let pc = frame.pc.saturating_sub(1);

					frames.push(
						TraceFrame {
							source: lua.chunk.source,
							line: lua.chunk.pos_at(pc).line,
							name: lua.chunk.name.clone(),
							is_root: matches!(frame.post, PostOp::Root | PostOp::Coroutine),
						}
					);
				}
			}
		};

		collect(&self.current);

		for entry in self.resume_chain.iter().rev() {
			collect(&entry.thread);
		}

		Traceback(frames.into())
	}


	/// The position of the instruction currently executing in the topmost frame.
	fn current_pos(&self) -> SourcePos {
		let state = self.current.state();

		match state.frames.last() {
			Some(frame) => match &*frame.function {
				Function::Lua(lua) => SourcePos::new(
					lua.chunk.pos_at(frame.pc.saturating_sub(1)),
					lua.chunk.source,
				),

				Function::Rust(_) => SourcePos::file(crate::symbol::Symbol::default()),
			},

			None => SourcePos::file(crate::symbol::Symbol::default()),
		}
	}
}
