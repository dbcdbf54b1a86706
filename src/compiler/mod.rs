mod context;
mod error;
#[cfg(test)]
mod tests;

use std::rc::Rc;

use crate::bytecode::{
	rk_constant,
	Chunk,
	Constant,
	Instruction,
	OpCode,
	UpvalueDesc,
	UpvalueKind,
	FIELDS_PER_FLUSH,
	MAX_C,
};
use crate::symbol::{Interner, Symbol};
use crate::syntax::ast::{Ast, BinaryOp, Block, Expr, Statement, TableField, UnaryOp};
use crate::syntax::SourcePos;
use context::{FunctionContext, Label, PendingGoto, Scope};
pub use error::Error;


/// Compile an AST into a chunk.
pub fn compile(ast: &Ast, interner: &mut Interner) -> Result<Chunk, Error> {
	let env_symbol = interner.get_or_intern(b"_ENV");

	let mut compiler = Compiler {
		source: ast.source,
		env_symbol,
		interner,
		contexts: Vec::new(),
	};

	compiler.compile_root(&ast.statements)
}


/// Where a name resolves to.
enum NameSlot {
	Local(u8),
	Upvalue(u8),
	/// Global access is sugar for indexing the _ENV upvalue.
	Global {
		env: u8,
		name: u32,
	},
}


/// A prepared assignment target.
enum AssignTarget {
	Local(u8),
	Upvalue(u8),
	Global {
		env: u8,
		name: u32,
	},
	Table {
		object: u8,
		key: u32,
	},
}


/// The compiler lowers one AST into one chunk, visiting nodes while threading the
/// function context stack: one context per function being compiled, the enclosing ones
/// reachable for upvalue resolution.
struct Compiler<'a> {
	source: Symbol,
	env_symbol: Symbol,
	interner: &'a Interner,
	contexts: Vec<FunctionContext>,
}


impl<'a> Compiler<'a> {
	fn ctx(&mut self) -> &mut FunctionContext {
		self.contexts.last_mut().expect("no function context")
	}


	fn emit(&mut self, instruction: Instruction, pos: &SourcePos) -> usize {
		self.ctx().emit(instruction, *pos)
	}


	fn current_pc(&mut self) -> usize {
		self.ctx().current_pc()
	}


	/// Emit a placeholder jump, to be patched later.
	fn emit_jump(&mut self, close_boundary: u8, pos: &SourcePos) -> usize {
		self.emit(Instruction::asbx(OpCode::Jmp, close_boundary, 0), pos)
	}


	/// Patch a jump to land at the current position.
	fn patch_jump(&mut self, pc: usize) {
		let target = self.current_pc();
		self.patch_jump_to(pc, target);
	}


	fn patch_jump_to(&mut self, pc: usize, target: usize) {
		let offset = target as i32 - pc as i32 - 1;
		self.ctx().code[pc].set_sbx(offset);
	}


	// ---- Functions ----

	fn compile_root(&mut self, block: &Block) -> Result<Chunk, Error> {
		let mut context = FunctionContext::new(None);

		// The main chunk accepts varargs and captures the environment as its sole
		// upvalue.
		context.is_vararg = true;
		context.upvalues.push(
			UpvalueDesc {
				name: self.env_symbol,
				kind: UpvalueKind::Register(0),
			}
		);

		self.contexts.push(context);
		self.ctx().enter_scope(false);

		self.compile_statements(block)?;

		self.finish_function(&SourcePos::default())
	}


	/// Compile a function expression into a chunk, registering it as a prototype of the
	/// enclosing function. Returns the prototype index.
	fn compile_function(
		&mut self,
		params: &[Symbol],
		is_vararg: bool,
		body: &Block,
		name: Option<Box<[u8]>>,
		pos: &SourcePos,
	) -> Result<u32, Error> {
		let mut context = FunctionContext::new(name);
		context.param_count = params.len() as u8;
		context.is_vararg = is_vararg;

		self.contexts.push(context);
		self.ctx().enter_scope(false);

		for param in params {
			let reg = self.ctx().alloc_reg(pos)?;
			self.ctx().declare_local(*param, reg);
		}

		self.compile_statements(body)?;

		let chunk = self.finish_function(pos)?;

		let parent = self.ctx();
		parent.protos.push(Rc::new(chunk));

		Ok(parent.protos.len() as u32 - 1)
	}


	/// Emit the implicit return and seal the topmost function context into a chunk.
	fn finish_function(&mut self, pos: &SourcePos) -> Result<Chunk, Error> {
		self.emit(Instruction::abc(OpCode::Return, 0, 1, 0), pos);

		let context = self.contexts.pop().expect("no function context");

		if let Some(pending) = context.pending_gotos.first() {
			return Err(Error::undefined_label(pending.label, pending.pos));
		}

		Ok(
			Chunk {
				source: self.source,
				name: context.name,
				code: context.code.into(),
				source_info: context.source_info.into(),
				constants: context.constants.into(),
				upvalues: context.upvalues.into(),
				protos: context.protos.into(),
				param_count: context.param_count,
				is_vararg: context.is_vararg,
				max_stack: context.max_stack,
			}
		)
	}


	// ---- Name resolution ----

	fn symbol_bytes(&self, symbol: Symbol) -> Rc<[u8]> {
		self.interner
			.resolve(symbol)
			.expect("unresolved symbol")
			.into()
	}


	fn string_constant(&mut self, symbol: Symbol) -> u32 {
		let bytes = self.symbol_bytes(symbol);
		self.ctx().add_constant(Constant::String(bytes))
	}


	/// Resolve a name: locals of the current function first, then upvalues through the
	/// enclosing functions, then the global environment.
	fn resolve_name(&mut self, name: Symbol, pos: &SourcePos) -> Result<NameSlot, Error> {
		let depth = self.contexts.len() - 1;

		if let Some(reg) = self.contexts[depth].resolve_local(name) {
			return Ok(NameSlot::Local(reg));
		}

		if let Some(ix) = self.resolve_upvalue(depth, name, pos)? {
			return Ok(NameSlot::Upvalue(ix));
		}

		// Global: sugar for _ENV.name. The environment always resolves, since the
		// root context owns it.
		let env = self
			.resolve_upvalue(depth, self.env_symbol, pos)?
			.expect("unresolvable environment");

		let name = self.string_constant(name);

		Ok(NameSlot::Global { env, name })
	}


	/// Resolve a name as an upvalue of the function at the given context depth,
	/// recursing into the enclosing function. Capturing a local of the enclosing
	/// function marks its scope, forcing close instructions at scope exit.
	fn resolve_upvalue(
		&mut self,
		depth: usize,
		name: Symbol,
		pos: &SourcePos,
	) -> Result<Option<u8>, Error> {
		if let Some(ix) = self.contexts[depth].find_upvalue(name) {
			return Ok(Some(ix));
		}

		if depth == 0 {
			return Ok(None);
		}

		if let Some(reg) = self.contexts[depth - 1].resolve_local(name) {
			self.contexts[depth - 1].mark_captured(reg);

			return self
				.add_upvalue(depth, name, UpvalueKind::Register(reg), pos)
				.map(Some);
		}

		match self.resolve_upvalue(depth - 1, name, pos)? {
			Some(parent_ix) => self
				.add_upvalue(depth, name, UpvalueKind::Upvalue(parent_ix), pos)
				.map(Some),

			None => Ok(None),
		}
	}


	fn add_upvalue(
		&mut self,
		depth: usize,
		name: Symbol,
		kind: UpvalueKind,
		pos: &SourcePos,
	) -> Result<u8, Error> {
		let upvalues = &mut self.contexts[depth].upvalues;

		if upvalues.len() >= u8::MAX as usize {
			return Err(Error::too_many_upvalues(*pos));
		}

		upvalues.push(UpvalueDesc { name, kind });
		Ok(upvalues.len() as u8 - 1)
	}


	// ---- Expressions ----

	/// Compile an expression into a register-or-constant operand. Literals go through
	/// the constant pool when it is still addressable by an RK operand.
	fn expr_to_rk(&mut self, expr: &Expr) -> Result<u32, Error> {
		let constant = match expr {
			Expr::Nil { .. } => Some(Constant::Nil),
			Expr::True { .. } => Some(Constant::Bool(true)),
			Expr::False { .. } => Some(Constant::Bool(false)),
			Expr::Number { value, .. } => Some(Constant::Number(*value)),
			Expr::String { value, .. } => Some(Constant::String(value.as_ref().into())),
			_ => None,
		};

		if let Some(constant) = constant {
			let ix = self.ctx().add_constant(constant);

			if ix <= MAX_C - rk_constant(0) {
				return Ok(rk_constant(ix));
			}
		}

		self.expr_to_any_reg(expr).map(u32::from)
	}


	/// Compile an expression into any register: locals are used in place, everything
	/// else is materialized into a fresh register.
	fn expr_to_any_reg(&mut self, expr: &Expr) -> Result<u8, Error> {
		if let Expr::Identifier { identifier, pos } = expr {
			if let NameSlot::Local(reg) = self.resolve_name(*identifier, pos)? {
				return Ok(reg);
			}
		}

		let pos = expr.pos();
		let reg = self.ctx().alloc_reg(&pos)?;
		self.expr_to_reg(expr, reg)?;
		Ok(reg)
	}


	/// Compile an expression, materializing its single value into the given register.
	fn expr_to_reg(&mut self, expr: &Expr, dst: u8) -> Result<(), Error> {
		match expr {
			Expr::Nil { pos } => {
				self.emit(Instruction::abc(OpCode::LoadNil, dst, 0, 0), pos);
			}

			Expr::True { pos } => {
				self.emit(Instruction::abc(OpCode::LoadBool, dst, 1, 0), pos);
			}

			Expr::False { pos } => {
				self.emit(Instruction::abc(OpCode::LoadBool, dst, 0, 0), pos);
			}

			Expr::Number { value, pos } => {
				let ix = self.ctx().add_constant(Constant::Number(*value));
				self.emit(Instruction::abx(OpCode::LoadK, dst, ix), pos);
			}

			Expr::String { value, pos } => {
				let ix = self.ctx().add_constant(Constant::String(value.as_ref().into()));
				self.emit(Instruction::abx(OpCode::LoadK, dst, ix), pos);
			}

			Expr::Vararg { pos } => {
				self.emit(Instruction::abc(OpCode::VarArg, dst, 2, 0), pos);
			}

			Expr::Identifier { identifier, pos } => {
				match self.resolve_name(*identifier, pos)? {
					NameSlot::Local(reg) => {
						if reg != dst {
							self.emit(Instruction::abc(OpCode::Move, dst, reg as u32, 0), pos);
						}
					}

					NameSlot::Upvalue(ix) => {
						self.emit(Instruction::abc(OpCode::GetUpVal, dst, ix as u32, 0), pos);
					}

					NameSlot::Global { env, name } => {
						self.emit(Instruction::abc(OpCode::GetTabUp, dst, env as u32, name), pos);
					}
				}
			}

			Expr::Index { object, key, pos } => {
				let saved = self.ctx().free_reg;
				let object = self.expr_to_any_reg(object)?;
				let key = self.expr_to_rk(key)?;
				self.emit(Instruction::abc(OpCode::GetTable, dst, object as u32, key), pos);
				self.ctx().free_to(saved);
			}

			Expr::Field { object, field, pos } => {
				let saved = self.ctx().free_reg;
				let object = self.expr_to_any_reg(object)?;
				let key = self.field_rk(*field)?;
				self.emit(Instruction::abc(OpCode::GetTable, dst, object as u32, key), pos);
				self.ctx().free_to(saved);
			}

			Expr::UnaryOp { op, operand, pos } => {
				let saved = self.ctx().free_reg;
				let operand = self.expr_to_any_reg(operand)?;
				self.ctx().free_to(saved);

				let opcode = match op {
					UnaryOp::Minus => OpCode::Unm,
					UnaryOp::Not => OpCode::Not,
					UnaryOp::Len => OpCode::Len,
				};

				self.emit(Instruction::abc(opcode, dst, operand as u32, 0), pos);
			}

			Expr::BinaryOp { op, left, right, pos } => {
				self.binary_op_to_reg(*op, left, right, dst, pos)?;
			}

			Expr::FunctionCall { .. } | Expr::MethodCall { .. } => {
				let saved = self.ctx().free_reg;
				let results = self.compile_call(expr, 2)?;

				if results != dst {
					self.emit(Instruction::abc(OpCode::Move, dst, results as u32, 0), &expr.pos());
				}

				self.ctx().free_to(saved);
			}

			Expr::Function { params, is_vararg, body, pos } => {
				let proto = self.compile_function(params, *is_vararg, body, None, pos)?;
				self.emit(Instruction::abx(OpCode::Closure, dst, proto), pos);
			}

			Expr::Table { fields, pos } => {
				self.table_to_reg(fields, dst, pos)?;
			}

			Expr::Parens { inner, .. } => {
				self.expr_to_reg(inner, dst)?;
			}
		}

		Ok(())
	}


	fn field_rk(&mut self, field: Symbol) -> Result<u32, Error> {
		let ix = self.string_constant(field);

		if ix <= MAX_C - rk_constant(0) {
			Ok(rk_constant(ix))
		} else {
			// The constant pool outgrew the RK operand range; spill through a register.
			let pos = SourcePos::default();
			let reg = self.ctx().alloc_reg(&pos)?;
			self.emit(Instruction::abx(OpCode::LoadK, reg, ix), &pos);
			Ok(reg as u32)
		}
	}


	fn binary_op_to_reg(
		&mut self,
		op: BinaryOp,
		left: &Expr,
		right: &Expr,
		dst: u8,
		pos: &SourcePos,
	) -> Result<(), Error> {
		match op {
			BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Times
			| BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
				let opcode = match op {
					BinaryOp::Plus => OpCode::Add,
					BinaryOp::Minus => OpCode::Sub,
					BinaryOp::Times => OpCode::Mul,
					BinaryOp::Div => OpCode::Div,
					BinaryOp::Mod => OpCode::Mod,
					_ => OpCode::Pow,
				};

				let saved = self.ctx().free_reg;
				let b = self.expr_to_rk(left)?;
				let c = self.expr_to_rk(right)?;
				self.emit(Instruction::abc(opcode, dst, b, c), pos);
				self.ctx().free_to(saved);
			}

			BinaryOp::Concat => {
				// All operands of a concat chain go into consecutive registers, and a
				// single instruction folds them.
				let saved = self.ctx().free_reg;
				let first = self.ctx().free_reg;

				let mut operand = left;
				let mut tail = Some(right);

				loop {
					let reg = self.ctx().alloc_reg(pos)?;
					self.expr_to_reg(operand, reg)?;

					match tail.take() {
						Some(Expr::BinaryOp { op: BinaryOp::Concat, left, right, .. }) => {
							operand = left.as_ref();
							tail = Some(right.as_ref());
						}

						Some(last) => {
							let reg = self.ctx().alloc_reg(pos)?;
							self.expr_to_reg(last, reg)?;
							break;
						}

						None => break,
					}
				}

				let last = self.ctx().free_reg - 1;
				self.emit(
					Instruction::abc(OpCode::Concat, dst, first as u32, last as u32),
					pos,
				);
				self.ctx().free_to(saved);
			}

			BinaryOp::And | BinaryOp::Or => {
				// Short circuit in value position: test, move, jump over the right
				// operand.
				let polarity = if op == BinaryOp::And { 0 } else { 1 };

				let saved = self.ctx().free_reg;
				let test = self.expr_to_any_reg(left)?;
				self.ctx().free_to(saved);

				self.emit(
					Instruction::abc(OpCode::TestSet, dst, test as u32, polarity),
					pos,
				);
				let over_right = self.emit_jump(0, pos);

				self.expr_to_reg(right, dst)?;
				self.patch_jump(over_right);
			}

			BinaryOp::Equals | BinaryOp::NotEquals
			| BinaryOp::Lower | BinaryOp::LowerEquals
			| BinaryOp::Greater | BinaryOp::GreaterEquals => {
				// A comparison materialized as a boolean lowers to the jump form
				// followed by a load-bool pair.
				let saved = self.ctx().free_reg;
				let jump = self.comparison_jump(op, left, right, true, pos)?;
				self.ctx().free_to(saved);

				self.emit(Instruction::abc(OpCode::LoadBool, dst, 0, 1), pos);
				let target = self.current_pc();
				self.patch_jump_to(jump, target);
				self.emit(Instruction::abc(OpCode::LoadBool, dst, 1, 0), pos);
			}
		}

		Ok(())
	}


	/// Emit a comparison in jump form: the emitted jump is taken when the comparison's
	/// truth equals jump_if. Returns the jump's pc for patching.
	fn comparison_jump(
		&mut self,
		op: BinaryOp,
		left: &Expr,
		right: &Expr,
		jump_if: bool,
		pos: &SourcePos,
	) -> Result<usize, Error> {
		let b = self.expr_to_rk(left)?;
		let c = self.expr_to_rk(right)?;

		// Greater-than flavors swap operands; inequality inverts the polarity.
		let (opcode, b, c, expect) = match op {
			BinaryOp::Equals => (OpCode::Eq, b, c, jump_if),
			BinaryOp::NotEquals => (OpCode::Eq, b, c, !jump_if),
			BinaryOp::Lower => (OpCode::Lt, b, c, jump_if),
			BinaryOp::Greater => (OpCode::Lt, c, b, jump_if),
			BinaryOp::LowerEquals => (OpCode::Le, b, c, jump_if),
			BinaryOp::GreaterEquals => (OpCode::Le, c, b, jump_if),
			_ => unreachable!("non-comparison operator"),
		};

		self.emit(Instruction::abc(opcode, expect as u8, b, c), pos);
		Ok(self.emit_jump(0, pos))
	}


	/// Compile an expression as a condition: the returned jumps are taken when its
	/// truthiness equals jump_if, and control falls through otherwise.
	fn cond_jump(&mut self, expr: &Expr, jump_if: bool) -> Result<Vec<usize>, Error> {
		match expr {
			// Constant conditions fold into unconditional jumps or nothing at all.
			Expr::Nil { pos } | Expr::False { pos } => {
				if !jump_if {
					Ok(vec![self.emit_jump(0, pos)])
				} else {
					Ok(Vec::new())
				}
			}

			Expr::True { pos } => {
				if jump_if {
					Ok(vec![self.emit_jump(0, pos)])
				} else {
					Ok(Vec::new())
				}
			}

			Expr::UnaryOp { op: UnaryOp::Not, operand, .. } => {
				self.cond_jump(operand, !jump_if)
			}

			Expr::BinaryOp { op: BinaryOp::And, left, right, .. } => {
				if jump_if {
					// Jump when both are truthy: fail over the left first.
					let left_false = self.cond_jump(left, false)?;
					let jumps = self.cond_jump(right, true)?;

					for jump in left_false {
						self.patch_jump(jump);
					}

					Ok(jumps)
				} else {
					let mut jumps = self.cond_jump(left, false)?;
					jumps.extend(self.cond_jump(right, false)?);
					Ok(jumps)
				}
			}

			Expr::BinaryOp { op: BinaryOp::Or, left, right, .. } => {
				if jump_if {
					let mut jumps = self.cond_jump(left, true)?;
					jumps.extend(self.cond_jump(right, true)?);
					Ok(jumps)
				} else {
					let left_true = self.cond_jump(left, true)?;
					let jumps = self.cond_jump(right, false)?;

					for jump in left_true {
						self.patch_jump(jump);
					}

					Ok(jumps)
				}
			}

			Expr::BinaryOp { op, left, right, pos } if is_comparison(*op) => {
				let saved = self.ctx().free_reg;
				let jump = self.comparison_jump(*op, left, right, jump_if, pos)?;
				self.ctx().free_to(saved);
				Ok(vec![jump])
			}

			expr => {
				let pos = expr.pos();
				let saved = self.ctx().free_reg;
				let test = self.expr_to_any_reg(expr)?;
				self.ctx().free_to(saved);

				self.emit(
					Instruction::abc(OpCode::Test, test, 0, jump_if as u32),
					&pos,
				);

				Ok(vec![self.emit_jump(0, &pos)])
			}
		}
	}


	// ---- Calls ----

	/// Compile a call expression at fresh registers. The result count operand follows
	/// the usual convention: 0 means all results, n means n - 1 results. Returns the
	/// register where results start.
	fn compile_call(&mut self, expr: &Expr, want: u32) -> Result<u8, Error> {
		let (function, args, method, pos) = match expr {
			Expr::FunctionCall { function, args, pos } => {
				(Some(function.as_ref()), args, None, pos)
			}

			Expr::MethodCall { object, method, args, pos } => {
				(None, args, Some((object.as_ref(), *method)), pos)
			}

			_ => unreachable!("not a call expression"),
		};

		let base = self.ctx().alloc_reg(pos)?;

		let mut fixed_args = 0u32;

		match method {
			Some((object, name)) => {
				// obj:m(...) evaluates obj once: SELF fills the function and the
				// implicit first argument.
				let saved = self.ctx().free_reg;
				let object = self.expr_to_any_reg(object)?;
				let key = self.field_rk(name)?;
				self.ctx().free_to(saved);

				self.ctx().alloc_reg(pos)?; // the self slot
				self.emit(Instruction::abc(OpCode::Self_, base, object as u32, key), pos);

				fixed_args += 1;
			}

			None => {
				self.expr_to_reg(function.expect("function expression"), base)?;
			}
		}

		// All arguments but the last go into consecutive registers; a trailing
		// multi-value expression leaves the argument count open.
		let mut open = false;

		for (ix, arg) in args.iter().enumerate() {
			let last = ix + 1 == args.len();

			if last && arg.is_multi_valued() {
				self.compile_open(arg)?;
				open = true;
			} else {
				let reg = self.ctx().alloc_reg(&arg.pos())?;
				self.expr_to_reg(arg, reg)?;
				fixed_args += 1;
			}
		}

		let b = if open { 0 } else { fixed_args + 1 };

		self.emit(Instruction::abc(OpCode::Call, base, b, want), pos);

		// Reserve the result registers, releasing the argument ones.
		let results = if want == 0 { 1 } else { (want - 1).max(1) } as u8;

		if self.ctx().free_reg < base + results {
			while self.ctx().free_reg < base + results {
				self.ctx().alloc_reg(pos)?;
			}
		} else {
			self.ctx().free_to(base + results);
		}

		Ok(base)
	}


	/// Compile a multi-valued expression at the current register cursor, leaving all
	/// its results open ended.
	fn compile_open(&mut self, expr: &Expr) -> Result<(), Error> {
		match expr {
			Expr::FunctionCall { .. } | Expr::MethodCall { .. } => {
				self.compile_call(expr, 0)?;
				Ok(())
			}

			Expr::Vararg { pos } => {
				let reg = self.ctx().alloc_reg(pos)?;
				self.emit(Instruction::abc(OpCode::VarArg, reg, 0, 0), pos);
				Ok(())
			}

			_ => unreachable!("not a multi-valued expression"),
		}
	}


	/// Compile an expression list into consecutive fresh registers, adjusted to
	/// produce exactly want values when given, or all values otherwise.
	/// Returns the base register and whether the list ended open.
	fn compile_explist(
		&mut self,
		exprs: &[Expr],
		want: Option<usize>,
		pos: &SourcePos,
	) -> Result<(u8, bool), Error> {
		let base = self.ctx().free_reg;

		if exprs.is_empty() {
			if let Some(want) = want {
				if want > 0 {
					for _ in 0 .. want {
						self.ctx().alloc_reg(pos)?;
					}

					self.emit(
						Instruction::abc(OpCode::LoadNil, base, want as u32 - 1, 0),
						pos,
					);
				}
			}

			return Ok((base, false));
		}

		for (ix, expr) in exprs.iter().enumerate() {
			let last = ix + 1 == exprs.len();

			if !last {
				let reg = self.ctx().alloc_reg(&expr.pos())?;
				self.expr_to_reg(expr, reg)?;
				continue;
			}

			// The last expression absorbs the adjustment.
			match want {
				None => {
					if expr.is_multi_valued() {
						self.compile_open(expr)?;
						return Ok((base, true));
					}

					let reg = self.ctx().alloc_reg(&expr.pos())?;
					self.expr_to_reg(expr, reg)?;
				}

				Some(want) => {
					let produced = exprs.len() - 1;
					let missing = want.saturating_sub(produced);

					if missing == 0 {
						// Extra expressions are evaluated and discarded.
						let saved = self.ctx().free_reg;
						let reg = self.ctx().alloc_reg(&expr.pos())?;
						self.expr_to_reg(expr, reg)?;
						self.ctx().free_to(saved);
					} else if expr.is_multi_valued() {
						self.compile_multi(expr, missing)?;
					} else {
						let reg = self.ctx().alloc_reg(&expr.pos())?;
						self.expr_to_reg(expr, reg)?;

						if missing > 1 {
							let first_nil = self.ctx().free_reg;

							for _ in 1 .. missing {
								self.ctx().alloc_reg(&expr.pos())?;
							}

							self.emit(
								Instruction::abc(
									OpCode::LoadNil,
									first_nil,
									missing as u32 - 2,
									0,
								),
								&expr.pos(),
							);
						}
					}
				}
			}
		}

		// More expressions than wanted leave their extra registers behind.
		if let Some(want) = want {
			let target = base + want as u8;

			if self.ctx().free_reg > target {
				self.ctx().free_to(target);
			}
		}

		Ok((base, false))
	}


	/// Compile a multi-valued expression into exactly count fresh registers.
	fn compile_multi(&mut self, expr: &Expr, count: usize) -> Result<(), Error> {
		match expr {
			Expr::FunctionCall { .. } | Expr::MethodCall { .. } => {
				self.compile_call(expr, count as u32 + 1)?;
				Ok(())
			}

			Expr::Vararg { pos } => {
				let base = self.ctx().free_reg;

				for _ in 0 .. count {
					self.ctx().alloc_reg(pos)?;
				}

				self.emit(
					Instruction::abc(OpCode::VarArg, base, count as u32 + 1, 0),
					pos,
				);
				Ok(())
			}

			_ => unreachable!("not a multi-valued expression"),
		}
	}


	// ---- Table constructors ----

	/// Compile a table constructor. List fields flush in batches through SetList, with
	/// a trailing multi-value field flushing open ended.
	fn table_to_reg(&mut self, fields: &[TableField], dst: u8, pos: &SourcePos) -> Result<(), Error> {
		let saved = self.ctx().free_reg;

		// The batch registers must directly follow the table register, so the table is
		// built at the cursor top and moved afterwards when needed.
		let table = self.ctx().alloc_reg(pos)?;
		self.emit(Instruction::abc(OpCode::NewTable, table, 0, 0), pos);

		let mut pending = 0u32;
		let mut batch = 1u32;

		for (ix, field) in fields.iter().enumerate() {
			let last = ix + 1 == fields.len();

			match field {
				TableField::List(expr) if last && expr.is_multi_valued() => {
					self.compile_open(expr)?;
					self.emit_setlist(table, 0, batch, pos)?;
					pending = 0;
				}

				TableField::List(expr) => {
					let reg = self.ctx().alloc_reg(&expr.pos())?;
					self.expr_to_reg(expr, reg)?;
					pending += 1;

					if pending == FIELDS_PER_FLUSH {
						self.emit_setlist(table, pending, batch, pos)?;
						self.ctx().free_to(table + 1);
						pending = 0;
						batch += 1;
					}
				}

				TableField::Record(name, expr) => {
					let inner = self.ctx().free_reg;
					let key = self.field_rk(*name)?;
					let value = self.expr_to_rk(expr)?;
					self.emit(Instruction::abc(OpCode::SetTable, table, key, value), pos);
					self.ctx().free_to(inner);
				}

				TableField::General(key, value) => {
					let inner = self.ctx().free_reg;
					let key = self.expr_to_rk(key)?;
					let value = self.expr_to_rk(value)?;
					self.emit(Instruction::abc(OpCode::SetTable, table, key, value), pos);
					self.ctx().free_to(inner);
				}
			}
		}

		if pending > 0 {
			self.emit_setlist(table, pending, batch, pos)?;
		}

		self.ctx().free_to(saved);

		if table != dst {
			self.emit(Instruction::abc(OpCode::Move, dst, table as u32, 0), pos);
		}

		Ok(())
	}


	fn emit_setlist(&mut self, table: u8, count: u32, batch: u32, pos: &SourcePos) -> Result<(), Error> {
		if batch <= MAX_C {
			self.emit(Instruction::abc(OpCode::SetList, table, count, batch), pos);
		} else {
			// The batch number outgrew the C operand: it rides in an extra argument.
			self.emit(Instruction::abc(OpCode::SetList, table, count, 0), pos);
			self.emit(Instruction::ax(OpCode::ExtraArg, batch), pos);
		}

		Ok(())
	}


	// ---- Statements ----

	fn compile_statements(&mut self, block: &Block) -> Result<(), Error> {
		for statement in block.0.iter() {
			let saved = self.ctx().free_reg;
			self.compile_statement(statement)?;

			// Expression temporaries die at statement boundaries; registers of
			// freshly declared locals survive.
			let floor = self.local_floor();
			self.ctx().free_to(saved.max(floor));
		}

		Ok(())
	}


	/// The lowest register the cursor may return to: one past the last declared local.
	fn local_floor(&mut self) -> u8 {
		let ctx = self.ctx();

		ctx.scopes
			.iter()
			.rev()
			.find_map(|scope| scope.locals.last().map(|(_, reg)| reg + 1))
			.unwrap_or(0)
	}


	/// Compile a block in its own scope, emitting the upvalue close when the scope
	/// captured locals.
	fn compile_block(&mut self, block: &Block, pos: &SourcePos) -> Result<Scope, Error> {
		self.ctx().enter_scope(false);
		self.compile_statements(block)?;
		self.finish_scope(pos)
	}


	/// Exit the current scope, emitting a close jump if any of its locals were
	/// captured by an inner closure.
	fn finish_scope(&mut self, pos: &SourcePos) -> Result<Scope, Error> {
		let scope = self.ctx().exit_scope();

		if scope.has_captured {
			self.emit(
				Instruction::asbx(OpCode::Jmp, scope.start_reg + 1, 0),
				pos,
			);
		}

		Ok(scope)
	}


	fn compile_statement(&mut self, statement: &Statement) -> Result<(), Error> {
		match statement {
			Statement::Local { names, exprs, pos } => {
				// The values are compiled before the names become visible, so that
				// local x = x refers to the enclosing x.
				let (base, _) = self.compile_explist(exprs, Some(names.len()), pos)?;

				for (ix, name) in names.iter().enumerate() {
					self.ctx().declare_local(*name, base + ix as u8);
				}

				Ok(())
			}

			Statement::LocalFunction { name, function, pos } => {
				// The name is visible inside the body, enabling self recursion
				// through an upvalue.
				let reg = self.ctx().alloc_reg(pos)?;
				self.ctx().declare_local(*name, reg);

				if let Expr::Function { params, is_vararg, body, pos } = function {
					let fn_name = Some(self.symbol_bytes(*name).as_ref().into());
					let proto = self.compile_function(params, *is_vararg, body, fn_name, pos)?;
					self.emit(Instruction::abx(OpCode::Closure, reg, proto), pos);
				} else {
					unreachable!("local function without function expression");
				}

				Ok(())
			}

			Statement::Assign { targets, exprs, pos } => {
				self.compile_assign(targets, exprs, pos)
			}

			Statement::If { condition, then, otherwise, pos } => {
				let to_else = self.cond_jump(condition, false)?;

				self.compile_block(then, pos)?;

				match otherwise {
					Some(otherwise) => {
						let over_else = self.emit_jump(0, pos);

						for jump in to_else {
							self.patch_jump(jump);
						}

						self.compile_block(otherwise, pos)?;
						self.patch_jump(over_else);
					}

					None => {
						for jump in to_else {
							self.patch_jump(jump);
						}
					}
				}

				Ok(())
			}

			Statement::While { condition, block, pos } => {
				let start = self.current_pc();
				let to_exit = self.cond_jump(condition, false)?;

				self.ctx().enter_scope(true);
				self.compile_statements(block)?;
				let scope = self.finish_scope(pos)?;

				let back = self.emit_jump(0, pos);
				self.patch_jump_to(back, start);

				for jump in to_exit {
					self.patch_jump(jump);
				}

				for jump in scope.breaks {
					self.patch_jump(jump);
				}

				Ok(())
			}

			Statement::Repeat { block, condition, pos } => {
				let start = self.current_pc();

				self.ctx().enter_scope(true);
				self.compile_statements(block)?;

				// The condition still sees the block's locals.
				let to_repeat = self.cond_jump(condition, false)?;

				let scope = self.finish_scope(pos)?;

				for jump in to_repeat {
					// The back edge leaves the iteration's scope, closing captured
					// locals on the way.
					if scope.has_captured {
						self.ctx().code[jump].set_a(scope.start_reg + 1);
					}

					self.patch_jump_to(jump, start);
				}

				for jump in scope.breaks {
					self.patch_jump(jump);
				}

				Ok(())
			}

			Statement::NumericFor { variable, start, limit, step, block, pos } => {
				let saved = self.ctx().free_reg;

				// Three control registers, then the user variable.
				let base = self.ctx().alloc_reg(pos)?;
				self.ctx().alloc_reg(pos)?;
				self.ctx().alloc_reg(pos)?;

				self.expr_to_reg(start, base)?;
				self.expr_to_reg(limit, base + 1)?;

				match step {
					Some(step) => self.expr_to_reg(step, base + 2)?,

					None => {
						let one = self.ctx().add_constant(Constant::Number(1.0));
						self.emit(Instruction::abx(OpCode::LoadK, base + 2, one), pos);
					}
				}

				self.ctx().enter_scope(true);
				let variable_reg = self.ctx().alloc_reg(pos)?;
				self.ctx().declare_local(*variable, variable_reg);

				let prep = self.emit(Instruction::asbx(OpCode::ForPrep, base, 0), pos);
				let body_start = self.current_pc();

				self.compile_statements(block)?;
				let scope = self.finish_scope(pos)?;

				let loop_pc = self.current_pc();
				self.patch_jump_to(prep, loop_pc);

				let back = self.emit(Instruction::asbx(OpCode::ForLoop, base, 0), pos);
				self.patch_jump_to(back, body_start);

				for jump in scope.breaks {
					self.patch_jump(jump);
				}

				self.ctx().free_to(saved);
				Ok(())
			}

			Statement::GenericFor { variables, exprs, block, pos } => {
				let saved = self.ctx().free_reg;

				// Iterator, state and control values.
				let (base, _) = self.compile_explist(exprs, Some(3), pos)?;

				self.ctx().enter_scope(true);

				for variable in variables.iter() {
					let reg = self.ctx().alloc_reg(pos)?;
					self.ctx().declare_local(*variable, reg);
				}

				let to_call = self.emit_jump(0, pos);
				let body_start = self.current_pc();

				self.compile_statements(block)?;
				let scope = self.finish_scope(pos)?;

				self.patch_jump(to_call);

				self.emit(
					Instruction::abc(OpCode::TForCall, base, 0, variables.len() as u32),
					pos,
				);

				let back = self.emit(Instruction::asbx(OpCode::TForLoop, base + 2, 0), pos);
				self.patch_jump_to(back, body_start);

				for jump in scope.breaks {
					self.patch_jump(jump);
				}

				self.ctx().free_to(saved);
				Ok(())
			}

			Statement::Do(block) => {
				let pos = SourcePos::default();
				self.compile_block(block, &pos)?;
				Ok(())
			}

			Statement::Return { exprs, pos } => {
				// A lone call as the returned expression becomes a tail call,
				// reusing the frame.
				if let [expr] = &exprs[..] {
					if matches!(expr, Expr::FunctionCall { .. } | Expr::MethodCall { .. }) {
						return self.compile_tail_call(expr, pos);
					}
				}

				let (base, open) = self.compile_explist(exprs, None, pos)?;

				let b =
					if open {
						0
					} else {
						exprs.len() as u32 + 1
					};

				self.emit(Instruction::abc(OpCode::Return, base, b, 0), pos);
				Ok(())
			}

			Statement::Break { pos } => {
				let boundary = match self.ctx().captured_up_to_loop() {
					Some(start_reg) => start_reg + 1,
					None => 0,
				};

				let jump = self.emit_jump(boundary, pos);

				match self.ctx().innermost_loop() {
					Some(scope) => {
						scope.breaks.push(jump);
						Ok(())
					}

					None => Err(Error::break_outside_loop(*pos)),
				}
			}

			Statement::Goto { label, pos } => {
				match self.ctx().resolve_label(*label) {
					// A visible label: jump backwards right away, closing upvalues
					// down to the label's register level.
					Some((target, level)) => {
						let jump = self.emit_jump(level + 1, pos);
						self.patch_jump_to(jump, target);
						Ok(())
					}

					// Otherwise the jump is queued until the label is declared.
					None => {
						let jump = self.emit_jump(0, pos);

						self.ctx().pending_gotos.push(
							PendingGoto {
								label: *label,
								pc: jump,
								pos: *pos,
							}
						);

						Ok(())
					}
				}
			}

			Statement::Label { name, .. } => {
				let pc = self.current_pc();
				let level = self.ctx().free_reg;

				self.ctx()
					.scopes
					.last_mut()
					.expect("label outside scope")
					.labels
					.push(Label { name: *name, pc, reg: level });

				// Resolve forward gotos waiting for this label.
				let mut pending = std::mem::take(&mut self.ctx().pending_gotos);

				pending.retain(|goto| {
					if goto.label == *name {
						let offset = pc as i32 - goto.pc as i32 - 1;
						let code = &mut self.contexts
							.last_mut()
							.expect("no function context")
							.code;

						code[goto.pc].set_sbx(offset);
						code[goto.pc].set_a(level + 1);
						false
					} else {
						true
					}
				});

				self.ctx().pending_gotos = pending;

				Ok(())
			}

			Statement::Expr(expr) => {
				// A call in statement position discards all results.
				self.compile_call(expr, 1)?;
				Ok(())
			}
		}
	}


	fn compile_tail_call(&mut self, expr: &Expr, pos: &SourcePos) -> Result<(), Error> {
		// Set up the function and arguments exactly like a regular call, but emit
		// TailCall, which unwinds the current frame instead of stacking a new one.
		let (function, args, method) = match expr {
			Expr::FunctionCall { function, args, .. } => (Some(function.as_ref()), args, None),
			Expr::MethodCall { object, method, args, .. } => {
				(None, args, Some((object.as_ref(), *method)))
			}
			_ => unreachable!("not a call expression"),
		};

		let base = self.ctx().alloc_reg(pos)?;
		let mut fixed_args = 0u32;

		match method {
			Some((object, name)) => {
				let saved = self.ctx().free_reg;
				let object = self.expr_to_any_reg(object)?;
				let key = self.field_rk(name)?;
				self.ctx().free_to(saved);

				self.ctx().alloc_reg(pos)?;
				self.emit(Instruction::abc(OpCode::Self_, base, object as u32, key), pos);

				fixed_args += 1;
			}

			None => {
				self.expr_to_reg(function.expect("function expression"), base)?;
			}
		}

		let mut open = false;

		for (ix, arg) in args.iter().enumerate() {
			let last = ix + 1 == args.len();

			if last && arg.is_multi_valued() {
				self.compile_open(arg)?;
				open = true;
			} else {
				let reg = self.ctx().alloc_reg(&arg.pos())?;
				self.expr_to_reg(arg, reg)?;
				fixed_args += 1;
			}
		}

		let b = if open { 0 } else { fixed_args + 1 };

		self.emit(Instruction::abc(OpCode::TailCall, base, b, 0), pos);
		Ok(())
	}


	// ---- Assignment ----

	fn compile_assign(
		&mut self,
		targets: &[Expr],
		exprs: &[Expr],
		pos: &SourcePos,
	) -> Result<(), Error> {
		// Single local target with a single value writes straight into the register.
		if let ([Expr::Identifier { identifier, pos: id_pos }], [value]) = (targets, exprs) {
			if let NameSlot::Local(reg) = self.resolve_name(*identifier, id_pos)? {
				return self.expr_to_reg(value, reg);
			}
		}

		// Target prefixes are evaluated before the values.
		let mut prepared = Vec::with_capacity(targets.len());

		for target in targets {
			let prepared_target = match target {
				Expr::Identifier { identifier, pos } => {
					match self.resolve_name(*identifier, pos)? {
						NameSlot::Local(reg) => AssignTarget::Local(reg),
						NameSlot::Upvalue(ix) => AssignTarget::Upvalue(ix),
						NameSlot::Global { env, name } => AssignTarget::Global { env, name },
					}
				}

				Expr::Index { object, key, .. } => {
					let object = self.expr_to_any_reg(object)?;
					let key = self.expr_to_rk(key)?;
					AssignTarget::Table { object, key }
				}

				Expr::Field { object, field, .. } => {
					let object = self.expr_to_any_reg(object)?;
					let key = self.field_rk(*field)?;
					AssignTarget::Table { object, key }
				}

				_ => unreachable!("invalid assignment target"),
			};

			prepared.push(prepared_target);
		}

		let (base, _) = self.compile_explist(exprs, Some(targets.len()), pos)?;

		for (ix, target) in prepared.into_iter().enumerate() {
			let value = base + ix as u8;

			match target {
				AssignTarget::Local(reg) => {
					if reg != value {
						self.emit(Instruction::abc(OpCode::Move, reg, value as u32, 0), pos);
					}
				}

				AssignTarget::Upvalue(upvalue) => {
					self.emit(
						Instruction::abc(OpCode::SetUpVal, value, upvalue as u32, 0),
						pos,
					);
				}

				AssignTarget::Global { env, name } => {
					self.emit(
						Instruction::abc(OpCode::SetTabUp, env, name, value as u32),
						pos,
					);
				}

				AssignTarget::Table { object, key } => {
					self.emit(
						Instruction::abc(OpCode::SetTable, object, key, value as u32),
						pos,
					);
				}
			}
		}

		Ok(())
	}
}


fn is_comparison(op: BinaryOp) -> bool {
	matches!(
		op,
		BinaryOp::Equals | BinaryOp::NotEquals
			| BinaryOp::Lower | BinaryOp::LowerEquals
			| BinaryOp::Greater | BinaryOp::GreaterEquals
	)
}
