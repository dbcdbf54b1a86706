use std::fmt;
use std::fmt::Display as _;

use super::{rk_index, rk_is_constant, Chunk, Constant, Format, Instruction, OpCode, UpvalueKind};
use crate::{
	fmt::{Display, Indentation},
	symbol::Interner,
};


/// The context for disassembling chunks.
#[derive(Debug, Copy, Clone)]
pub struct Context<'a> {
	interner: &'a Interner,
	indentation: Indentation,
}


impl<'a> From<&'a Interner> for Context<'a> {
	fn from(interner: &'a Interner) -> Self {
		Self {
			interner,
			indentation: Indentation::default(),
		}
	}
}


impl fmt::Debug for Instruction {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let op = self.opcode();

		write!(f, "{}", op.name())?;

		match op.format() {
			Format::ABC => write!(f, " {} {} {}", self.a(), self.b(), self.c()),
			Format::ABx => write!(f, " {} {}", self.a(), self.bx()),
			Format::AsBx => write!(f, " {} {}", self.a(), self.sbx()),
			Format::Ax => write!(f, " {}", self.ax()),
		}
	}
}


impl fmt::Display for Constant {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Nil => "nil".fmt(f),
			Self::Bool(b) => b.fmt(f),
			Self::Number(n) => n.fmt(f),
			Self::String(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
		}
	}
}


/// Render the interesting RK operands of an instruction as a trailing comment.
fn fmt_rk_comment(f: &mut fmt::Formatter, chunk: &Chunk, instruction: Instruction) -> fmt::Result {
	let mut operands = Vec::new();

	if instruction.opcode().format() == Format::ABC {
		for operand in [instruction.b(), instruction.c()] {
			if rk_is_constant(operand) {
				if let Some(constant) = chunk.constants.get(rk_index(operand)) {
					operands.push(constant);
				}
			}
		}
	}

	if let (OpCode::LoadK, Some(constant)) = (
		instruction.opcode(),
		chunk.constants.get(instruction.bx() as usize),
	) {
		operands.push(constant);
	}

	let mut first = true;
	for operand in operands {
		f.write_str(if std::mem::take(&mut first) { "\t; " } else { ", " })?;
		write!(f, "{}", operand)?;
	}

	Ok(())
}


impl<'a> Display<'a> for Chunk {
	type Context = Context<'a>;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		let indentation = context.indentation;

		write!(f, "{}function ", indentation)?;

		match &self.name {
			Some(name) => write!(f, "{}", String::from_utf8_lossy(name))?,
			None => write!(f, "<anonymous>")?,
		}

		writeln!(
			f,
			" ({} params{}, {} slots, {} upvalues, {} constants, {} functions)",
			self.param_count,
			if self.is_vararg { "+" } else { "" },
			self.max_stack,
			self.upvalues.len(),
			self.constants.len(),
			self.protos.len(),
		)?;

		for (pc, instruction) in self.code.iter().enumerate() {
			write!(
				f,
				"{}\t[{}]\t{}\t{:?}",
				indentation,
				pc + 1,
				self.pos_at(pc).line,
				instruction,
			)?;

			fmt_rk_comment(f, self, *instruction)?;
			writeln!(f)?;
		}

		for (ix, upvalue) in self.upvalues.iter().enumerate() {
			write!(f, "{}\tupvalue {} ", indentation, ix)?;
			upvalue.name.fmt(f, context.interner)?;

			match upvalue.kind {
				UpvalueKind::Register(reg) => writeln!(f, " <- register {}", reg)?,
				UpvalueKind::Upvalue(up) => writeln!(f, " <- upvalue {}", up)?,
			}
		}

		for proto in self.protos.iter() {
			proto.as_ref().fmt(
				f,
				Context {
					interner: context.interner,
					indentation: indentation.increase(),
				},
			)?;
		}

		Ok(())
	}
}
