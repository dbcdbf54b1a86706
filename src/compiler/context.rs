use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{Chunk, Constant, Instruction, UpvalueDesc, MAX_REGISTER};
use crate::symbol::Symbol;
use crate::syntax::SourcePos;
use super::error::Error;


/// A label visible in a scope.
#[derive(Debug)]
pub struct Label {
	pub name: Symbol,
	pub pc: usize,
	/// The register level at the label. Jumps to the label close every upvalue at or
	/// above this level, as those registers are dying.
	pub reg: u8,
}


/// A goto whose label hasn't been seen yet. Forward gotos are patched when the label
/// is declared; any still pending at function end are undefined.
#[derive(Debug)]
pub struct PendingGoto {
	pub label: Symbol,
	pub pc: usize,
	pub pos: SourcePos,
}


/// A lexical scope: the compiler's per-block state.
#[derive(Debug)]
pub struct Scope {
	/// Locals declared in this scope, in declaration order.
	pub locals: Vec<(Symbol, u8)>,
	/// Labels declared in this scope.
	pub labels: Vec<Label>,
	/// The first free register when the scope was entered, restored at exit.
	pub start_reg: u8,
	/// Whether any local of this scope is captured by an inner closure, which forces
	/// an upvalue close on exit.
	pub has_captured: bool,
	/// Whether this scope is a loop body.
	pub is_loop: bool,
	/// Break jumps awaiting the loop exit address.
	pub breaks: Vec<usize>,
}


/// The per-function compilation state: one per Lua function being compiled, nested
/// while inner functions compile.
#[derive(Debug)]
pub struct FunctionContext {
	pub code: Vec<Instruction>,
	pub source_info: Vec<SourcePos>,
	pub constants: Vec<Constant>,
	/// Deduplication of the constant pool, by value.
	constant_map: HashMap<Constant, u32>,
	pub protos: Vec<Rc<Chunk>>,
	pub upvalues: Vec<UpvalueDesc>,
	pub scopes: Vec<Scope>,
	pub pending_gotos: Vec<PendingGoto>,
	pub param_count: u8,
	pub is_vararg: bool,
	/// The register allocation cursor.
	pub free_reg: u8,
	/// The high water mark of register usage.
	pub max_stack: u8,
	/// The function name, if statically known.
	pub name: Option<Box<[u8]>>,
}


impl FunctionContext {
	pub fn new(name: Option<Box<[u8]>>) -> Self {
		Self {
			code: Vec::new(),
			source_info: Vec::new(),
			constants: Vec::new(),
			constant_map: HashMap::new(),
			protos: Vec::new(),
			upvalues: Vec::new(),
			scopes: Vec::new(),
			pending_gotos: Vec::new(),
			param_count: 0,
			is_vararg: false,
			free_reg: 0,
			max_stack: 2,
			name,
		}
	}


	pub fn emit(&mut self, instruction: Instruction, pos: SourcePos) -> usize {
		self.code.push(instruction);
		self.source_info.push(pos);
		self.code.len() - 1
	}


	pub fn current_pc(&self) -> usize {
		self.code.len()
	}


	/// Intern a constant, deduplicating by value.
	pub fn add_constant(&mut self, constant: Constant) -> u32 {
		match self.constant_map.get(&constant) {
			Some(ix) => *ix,

			None => {
				let ix = self.constants.len() as u32;
				self.constants.push(constant.clone());
				self.constant_map.insert(constant, ix);
				ix
			}
		}
	}


	/// Allocate the next free register.
	pub fn alloc_reg(&mut self, pos: &SourcePos) -> Result<u8, Error> {
		if self.free_reg >= MAX_REGISTER {
			return Err(Error::too_many_registers(*pos));
		}

		let reg = self.free_reg;
		self.free_reg += 1;

		if self.free_reg > self.max_stack {
			self.max_stack = self.free_reg;
		}

		Ok(reg)
	}


	/// Restore the register cursor to a previous level.
	pub fn free_to(&mut self, level: u8) {
		debug_assert!(level <= self.free_reg);
		self.free_reg = level;
	}


	/// Enter a new lexical scope.
	pub fn enter_scope(&mut self, is_loop: bool) {
		self.scopes.push(
			Scope {
				locals: Vec::new(),
				labels: Vec::new(),
				start_reg: self.free_reg,
				has_captured: false,
				is_loop,
				breaks: Vec::new(),
			}
		);
	}


	/// Leave the current scope, restoring the register cursor.
	/// Returns the scope for break patching and close handling.
	pub fn exit_scope(&mut self) -> Scope {
		let scope = self.scopes.pop().expect("unbalanced scopes");
		self.free_reg = scope.start_reg;
		scope
	}


	/// Declare a local in the current scope, bound to an already allocated register.
	pub fn declare_local(&mut self, name: Symbol, reg: u8) {
		self.scopes
			.last_mut()
			.expect("local outside scope")
			.locals
			.push((name, reg));
	}


	/// Resolve a name against the locals visible in this function, innermost first.
	pub fn resolve_local(&self, name: Symbol) -> Option<u8> {
		for scope in self.scopes.iter().rev() {
			for (local, reg) in scope.locals.iter().rev() {
				if *local == name {
					return Some(*reg);
				}
			}
		}

		None
	}


	/// Mark the scope owning the given register as capturing, forcing close-upvalue
	/// instructions on its exits.
	pub fn mark_captured(&mut self, reg: u8) {
		for scope in self.scopes.iter_mut().rev() {
			if scope.locals.iter().any(|(_, r)| *r == reg) {
				scope.has_captured = true;
				return;
			}
		}
	}


	/// Find the upvalue index for a name, if this function already captures it.
	pub fn find_upvalue(&self, name: Symbol) -> Option<u8> {
		self.upvalues
			.iter()
			.position(|desc| desc.name == name)
			.map(|ix| ix as u8)
	}


	/// Resolve a label visible from the current position, innermost scope first.
	pub fn resolve_label(&self, name: Symbol) -> Option<(usize, u8)> {
		for scope in self.scopes.iter().rev() {
			for label in scope.labels.iter().rev() {
				if label.name == name {
					return Some((label.pc, label.reg));
				}
			}
		}

		None
	}


	/// Find the innermost enclosing loop scope.
	pub fn innermost_loop(&mut self) -> Option<&mut Scope> {
		self.scopes.iter_mut().rev().find(|scope| scope.is_loop)
	}


	/// Whether any scope up to and including the innermost loop captures locals.
	pub fn captured_up_to_loop(&self) -> Option<u8> {
		let mut boundary = None;

		for scope in self.scopes.iter().rev() {
			if scope.has_captured {
				boundary = Some(scope.start_reg);
			}

			if scope.is_loop {
				break;
			}
		}

		boundary
	}
}
