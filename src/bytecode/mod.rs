pub mod chunk;
pub mod fmt;
#[cfg(test)]
mod tests;

pub use chunk::{Chunk, Constant, UpvalueDesc, UpvalueKind};


/// Field sizes, in bits.
const SIZE_OP: u32 = 6;
const SIZE_A: u32 = 8;
const SIZE_C: u32 = 9;
const SIZE_B: u32 = 9;
const SIZE_BX: u32 = SIZE_B + SIZE_C; // 18
const SIZE_AX: u32 = SIZE_A + SIZE_B + SIZE_C; // 26

/// Field positions.
const POS_OP: u32 = 0;
const POS_A: u32 = POS_OP + SIZE_OP; // 6
const POS_C: u32 = POS_A + SIZE_A; // 14
const POS_B: u32 = POS_C + SIZE_C; // 23
const POS_BX: u32 = POS_C; // 14
const POS_AX: u32 = POS_A; // 6

const fn mask(bits: u32) -> u32 {
	(1 << bits) - 1
}

pub const MAX_A: u32 = mask(SIZE_A); // 255
pub const MAX_B: u32 = mask(SIZE_B); // 511
pub const MAX_C: u32 = mask(SIZE_C); // 511
pub const MAX_BX: u32 = mask(SIZE_BX); // 262143
pub const MAX_AX: u32 = mask(SIZE_AX); // 67108863

/// The bias for the signed interpretation of the Bx field.
pub const BIAS_SBX: i32 = 131071;
pub const MAX_SBX: i32 = MAX_BX as i32 - BIAS_SBX; // 131072
pub const MIN_SBX: i32 = -BIAS_SBX; // -131071

/// Operands at or above this threshold denote constants instead of registers.
pub const CONSTANT_BIT: u32 = 256;

/// The maximum register index addressable by an A operand.
pub const MAX_REGISTER: u8 = 249;

/// How many list fields a single SetList instruction flushes.
pub const FIELDS_PER_FLUSH: u32 = 50;


/// Build a constant operand for the given constant pool index.
pub const fn rk_constant(index: u32) -> u32 {
	index + CONSTANT_BIT
}


/// Check whether an operand denotes a constant.
pub const fn rk_is_constant(operand: u32) -> bool {
	operand >= CONSTANT_BIT
}


/// Get the constant pool index of a constant operand.
pub const fn rk_index(operand: u32) -> usize {
	(operand - CONSTANT_BIT) as usize
}


/// The operation codes.
///
/// In the comments below, R(X) denotes the register addressed by operand X, K(X) the
/// constant pool entry addressed by X, RK(X) a register or constant depending on the
/// threshold, U(X) the upvalue addressed by X, and P(X) the nested prototype addressed
/// by X. Result counts follow the usual convention: an operand of 0 means "all available
/// values", and N+1 means exactly N values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
	/// A B | R(A) := R(B)
	Move = 0,
	/// A Bx | R(A) := K(Bx)
	LoadK,
	/// A B C | R(A) := bool(B); if C, skip the next instruction
	LoadBool,
	/// A B | R(A), ..., R(A+B) := nil
	LoadNil,
	/// A B | R(A) := U(B)
	GetUpVal,
	/// A B C | R(A) := U(B)[RK(C)]
	GetTabUp,
	/// A B C | R(A) := R(B)[RK(C)]
	GetTable,
	/// A B C | U(A)[RK(B)] := RK(C)
	SetTabUp,
	/// A B | U(B) := R(A)
	SetUpVal,
	/// A B C | R(A)[RK(B)] := RK(C)
	SetTable,
	/// A B C | R(A) := new table (B and C are size hints for the array and hash parts)
	NewTable,
	/// A B C | R(A+1) := R(B); R(A) := R(B)[RK(C)]
	Self_,
	/// A B C | R(A) := RK(B) + RK(C)
	Add,
	/// A B C | R(A) := RK(B) - RK(C)
	Sub,
	/// A B C | R(A) := RK(B) * RK(C)
	Mul,
	/// A B C | R(A) := RK(B) / RK(C)
	Div,
	/// A B C | R(A) := RK(B) % RK(C), with floored remainder
	Mod,
	/// A B C | R(A) := RK(B) ^ RK(C)
	Pow,
	/// A B | R(A) := -R(B)
	Unm,
	/// A B | R(A) := not R(B)
	Not,
	/// A B | R(A) := length of R(B)
	Len,
	/// A B C | R(A) := R(B) .. ... .. R(C)
	Concat,
	/// A sBx | pc += sBx; if A, close all upvalues at or above R(A-1)
	Jmp,
	/// A B C | if (RK(B) == RK(C)) != A, skip the next instruction
	Eq,
	/// A B C | if (RK(B) < RK(C)) != A, skip the next instruction
	Lt,
	/// A B C | if (RK(B) <= RK(C)) != A, skip the next instruction
	Le,
	/// A C | if truthiness of R(A) != C, skip the next instruction
	Test,
	/// A B C | if truthiness of R(B) == C, R(A) := R(B), else skip the next instruction
	TestSet,
	/// A B C | R(A), ..., R(A+C-2) := R(A)(R(A+1), ..., R(A+B-1))
	Call,
	/// A B | return R(A)(R(A+1), ..., R(A+B-1)), reusing the caller's frame
	TailCall,
	/// A B | return R(A), ..., R(A+B-2)
	Return,
	/// A sBx | R(A) -= R(A+2); pc += sBx
	ForPrep,
	/// A sBx | R(A) += R(A+2); if the loop continues, pc += sBx and R(A+3) := R(A)
	ForLoop,
	/// A C | R(A+3), ..., R(A+2+C) := R(A)(R(A+1), R(A+2))
	TForCall,
	/// A sBx | if R(A+1) != nil, R(A) := R(A+1) and pc += sBx
	TForLoop,
	/// A B C | R(A)[(C-1)*50 + i] := R(A+i), for 1 <= i <= B; C == 0 takes C from the
	/// next ExtraArg instruction
	SetList,
	/// A Bx | R(A) := closure of P(Bx), capturing upvalues per the prototype descriptors
	Closure,
	/// A B | R(A), ..., R(A+B-2) := varargs
	VarArg,
	/// Ax | extended argument for the previous instruction
	ExtraArg,
}


impl OpCode {
	/// Number of opcodes.
	pub const COUNT: usize = 38;

	/// Get the opcode from its encoded value.
	pub fn from_u8(value: u8) -> Option<OpCode> {
		use OpCode::*;

		const TABLE: [OpCode; OpCode::COUNT] = [
			Move, LoadK, LoadBool, LoadNil, GetUpVal, GetTabUp, GetTable, SetTabUp,
			SetUpVal, SetTable, NewTable, Self_, Add, Sub, Mul, Div, Mod, Pow, Unm, Not,
			Len, Concat, Jmp, Eq, Lt, Le, Test, TestSet, Call, TailCall, Return, ForPrep,
			ForLoop, TForCall, TForLoop, SetList, Closure, VarArg, ExtraArg,
		];

		TABLE.get(value as usize).copied()
	}


	/// Get the mnemonic of this opcode.
	pub fn name(&self) -> &'static str {
		use OpCode::*;

		match self {
			Move => "MOVE",
			LoadK => "LOADK",
			LoadBool => "LOADBOOL",
			LoadNil => "LOADNIL",
			GetUpVal => "GETUPVAL",
			GetTabUp => "GETTABUP",
			GetTable => "GETTABLE",
			SetTabUp => "SETTABUP",
			SetUpVal => "SETUPVAL",
			SetTable => "SETTABLE",
			NewTable => "NEWTABLE",
			Self_ => "SELF",
			Add => "ADD",
			Sub => "SUB",
			Mul => "MUL",
			Div => "DIV",
			Mod => "MOD",
			Pow => "POW",
			Unm => "UNM",
			Not => "NOT",
			Len => "LEN",
			Concat => "CONCAT",
			Jmp => "JMP",
			Eq => "EQ",
			Lt => "LT",
			Le => "LE",
			Test => "TEST",
			TestSet => "TESTSET",
			Call => "CALL",
			TailCall => "TAILCALL",
			Return => "RETURN",
			ForPrep => "FORPREP",
			ForLoop => "FORLOOP",
			TForCall => "TFORCALL",
			TForLoop => "TFORLOOP",
			SetList => "SETLIST",
			Closure => "CLOSURE",
			VarArg => "VARARG",
			ExtraArg => "EXTRAARG",
		}
	}


	/// The operand format of this opcode.
	pub fn format(&self) -> Format {
		use OpCode::*;

		match self {
			LoadK | Closure => Format::ABx,
			Jmp | ForPrep | ForLoop | TForLoop => Format::AsBx,
			ExtraArg => Format::Ax,
			_ => Format::ABC,
		}
	}
}


/// Operand formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	ABC,
	ABx,
	AsBx,
	Ax,
}


/// A packed 32-bit instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);


impl Instruction {
	/// Build an instruction with A, B and C operands.
	pub fn abc(op: OpCode, a: u8, b: u32, c: u32) -> Self {
		debug_assert!(b <= MAX_B, "operand B out of range: {}", b);
		debug_assert!(c <= MAX_C, "operand C out of range: {}", c);

		Self(
			(op as u32) << POS_OP
				| (a as u32) << POS_A
				| c << POS_C
				| b << POS_B
		)
	}


	/// Build an instruction with A and Bx operands.
	pub fn abx(op: OpCode, a: u8, bx: u32) -> Self {
		debug_assert!(bx <= MAX_BX, "operand Bx out of range: {}", bx);

		Self(
			(op as u32) << POS_OP
				| (a as u32) << POS_A
				| bx << POS_BX
		)
	}


	/// Build an instruction with A and signed Bx operands.
	pub fn asbx(op: OpCode, a: u8, sbx: i32) -> Self {
		debug_assert!(
			(MIN_SBX ..= MAX_SBX).contains(&sbx),
			"operand sBx out of range: {}",
			sbx
		);

		Self::abx(op, a, (sbx + BIAS_SBX) as u32)
	}


	/// Build an instruction with a single Ax operand.
	pub fn ax(op: OpCode, ax: u32) -> Self {
		debug_assert!(ax <= MAX_AX, "operand Ax out of range: {}", ax);

		Self(
			(op as u32) << POS_OP
				| ax << POS_AX
		)
	}


	pub fn opcode(&self) -> OpCode {
		let value = (self.0 >> POS_OP) & mask(SIZE_OP);

		OpCode::from_u8(value as u8).expect("invalid opcode")
	}


	pub fn a(&self) -> u8 {
		((self.0 >> POS_A) & mask(SIZE_A)) as u8
	}


	pub fn b(&self) -> u32 {
		(self.0 >> POS_B) & mask(SIZE_B)
	}


	pub fn c(&self) -> u32 {
		(self.0 >> POS_C) & mask(SIZE_C)
	}


	pub fn bx(&self) -> u32 {
		(self.0 >> POS_BX) & mask(SIZE_BX)
	}


	pub fn sbx(&self) -> i32 {
		self.bx() as i32 - BIAS_SBX
	}


	pub fn ax(&self) -> u32 {
		(self.0 >> POS_AX) & mask(SIZE_AX)
	}


	// Mutators, for backpatching jumps.

	pub fn set_a(&mut self, a: u8) {
		self.0 = (self.0 & !(mask(SIZE_A) << POS_A)) | ((a as u32) << POS_A);
	}


	pub fn set_b(&mut self, b: u32) {
		debug_assert!(b <= MAX_B);
		self.0 = (self.0 & !(mask(SIZE_B) << POS_B)) | (b << POS_B);
	}


	pub fn set_c(&mut self, c: u32) {
		debug_assert!(c <= MAX_C);
		self.0 = (self.0 & !(mask(SIZE_C) << POS_C)) | (c << POS_C);
	}


	pub fn set_sbx(&mut self, sbx: i32) {
		debug_assert!((MIN_SBX ..= MAX_SBX).contains(&sbx));

		let bx = (sbx + BIAS_SBX) as u32;
		self.0 = (self.0 & !(mask(SIZE_BX) << POS_BX)) | (bx << POS_BX);
	}
}
