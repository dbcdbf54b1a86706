use std::fmt;
use std::fmt::Display as _;

use super::{Ast, BinaryOp, Block, Expr, Statement, TableField, UnaryOp};
use crate::{
	fmt::{Display, Indentation},
	symbol::Interner,
};


/// The context for formatting AST nodes.
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


impl<'a> Context<'a> {
	fn indent(self) -> Self {
		Self {
			interner: self.interner,
			indentation: self.indentation.increase(),
		}
	}
}


impl std::fmt::Display for UnaryOp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Minus => "-".fmt(f),
			Self::Not => "not ".fmt(f),
			Self::Len => "#".fmt(f),
		}
	}
}


impl std::fmt::Display for BinaryOp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let op = match self {
			Self::Plus => "+",
			Self::Minus => "-",
			Self::Times => "*",
			Self::Div => "/",
			Self::Mod => "%",
			Self::Pow => "^",
			Self::Equals => "==",
			Self::NotEquals => "~=",
			Self::Greater => ">",
			Self::GreaterEquals => ">=",
			Self::Lower => "<",
			Self::LowerEquals => "<=",
			Self::And => "and",
			Self::Or => "or",
			Self::Concat => "..",
		};

		op.fmt(f)
	}
}


impl<'a> Display<'a> for Block {
	type Context = Context<'a>;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		for statement in self.0.iter() {
			write!(f, "{}", context.indentation)?;
			statement.fmt(f, context)?;
			writeln!(f)?;
		}

		Ok(())
	}
}


fn fmt_list<'a, T>(
	f: &mut fmt::Formatter,
	items: impl IntoIterator<Item = &'a T>,
	context: Context<'a>,
) -> fmt::Result
where
	T: Display<'a, Context = Context<'a>> + 'a,
{
	let mut first = true;

	for item in items {
		if !std::mem::take(&mut first) {
			write!(f, ", ")?;
		}

		item.fmt(f, context)?;
	}

	Ok(())
}


fn fmt_names<'a>(
	f: &mut fmt::Formatter,
	names: &[super::Symbol],
	context: Context<'a>,
) -> fmt::Result {
	let mut first = true;

	for name in names {
		if !std::mem::take(&mut first) {
			write!(f, ", ")?;
		}

		name.fmt(f, context.interner)?;
	}

	Ok(())
}


impl<'a> Display<'a> for Expr {
	type Context = Context<'a>;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::Nil { .. } => "nil".fmt(f),
			Self::True { .. } => "true".fmt(f),
			Self::False { .. } => "false".fmt(f),
			Self::Number { value, .. } => value.fmt(f),
			Self::String { value, .. } => write!(f, "\"{}\"", String::from_utf8_lossy(value)),
			Self::Vararg { .. } => "...".fmt(f),

			Self::Identifier { identifier, .. } => identifier.fmt(f, context.interner),

			Self::Index { object, key, .. } => {
				object.fmt(f, context)?;
				write!(f, "[")?;
				key.fmt(f, context)?;
				write!(f, "]")
			}

			Self::Field { object, field, .. } => {
				object.fmt(f, context)?;
				write!(f, ".")?;
				field.fmt(f, context.interner)
			}

			Self::UnaryOp { op, operand, .. } => {
				write!(f, "{}", op)?;
				write!(f, "(")?;
				operand.fmt(f, context)?;
				write!(f, ")")
			}

			Self::BinaryOp { left, op, right, .. } => {
				write!(f, "(")?;
				left.fmt(f, context)?;
				write!(f, " {} ", op)?;
				right.fmt(f, context)?;
				write!(f, ")")
			}

			Self::FunctionCall { function, args, .. } => {
				function.fmt(f, context)?;
				write!(f, "(")?;
				fmt_list(f, args.iter(), context)?;
				write!(f, ")")
			}

			Self::MethodCall { object, method, args, .. } => {
				object.fmt(f, context)?;
				write!(f, ":")?;
				method.fmt(f, context.interner)?;
				write!(f, "(")?;
				fmt_list(f, args.iter(), context)?;
				write!(f, ")")
			}

			Self::Function { params, is_vararg, body, .. } => {
				write!(f, "function (")?;
				fmt_names(f, params, context)?;

				if *is_vararg {
					if !params.is_empty() {
						write!(f, ", ")?;
					}
					write!(f, "...")?;
				}

				writeln!(f, ")")?;
				body.fmt(f, context.indent())?;
				write!(f, "{}end", context.indentation)
			}

			Self::Table { fields, .. } => {
				write!(f, "{{ ")?;

				for field in fields.iter() {
					match field {
						TableField::List(expr) => expr.fmt(f, context)?,

						TableField::Record(name, expr) => {
							name.fmt(f, context.interner)?;
							write!(f, " = ")?;
							expr.fmt(f, context)?;
						}

						TableField::General(key, expr) => {
							write!(f, "[")?;
							key.fmt(f, context)?;
							write!(f, "] = ")?;
							expr.fmt(f, context)?;
						}
					}

					write!(f, ", ")?;
				}

				write!(f, "}}")
			}

			Self::Parens { inner, .. } => {
				write!(f, "(")?;
				inner.fmt(f, context)?;
				write!(f, ")")
			}
		}
	}
}


impl<'a> Display<'a> for Statement {
	type Context = Context<'a>;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		match self {
			Self::Local { names, exprs, .. } => {
				write!(f, "local ")?;
				fmt_names(f, names, context)?;

				if !exprs.is_empty() {
					write!(f, " = ")?;
					fmt_list(f, exprs.iter(), context)?;
				}

				Ok(())
			}

			Self::LocalFunction { name, function, .. } => {
				write!(f, "local ")?;
				name.fmt(f, context.interner)?;
				write!(f, " = ")?;
				function.fmt(f, context)
			}

			Self::Assign { targets, exprs, .. } => {
				fmt_list(f, targets.iter(), context)?;
				write!(f, " = ")?;
				fmt_list(f, exprs.iter(), context)
			}

			Self::If { condition, then, otherwise, .. } => {
				write!(f, "if ")?;
				condition.fmt(f, context)?;
				writeln!(f, " then")?;
				then.fmt(f, context.indent())?;

				if let Some(otherwise) = otherwise {
					writeln!(f, "{}else", context.indentation)?;
					otherwise.fmt(f, context.indent())?;
				}

				write!(f, "{}end", context.indentation)
			}

			Self::While { condition, block, .. } => {
				write!(f, "while ")?;
				condition.fmt(f, context)?;
				writeln!(f, " do")?;
				block.fmt(f, context.indent())?;
				write!(f, "{}end", context.indentation)
			}

			Self::Repeat { block, condition, .. } => {
				writeln!(f, "repeat")?;
				block.fmt(f, context.indent())?;
				write!(f, "{}until ", context.indentation)?;
				condition.fmt(f, context)
			}

			Self::NumericFor { variable, start, limit, step, block, .. } => {
				write!(f, "for ")?;
				variable.fmt(f, context.interner)?;
				write!(f, " = ")?;
				start.fmt(f, context)?;
				write!(f, ", ")?;
				limit.fmt(f, context)?;

				if let Some(step) = step {
					write!(f, ", ")?;
					step.fmt(f, context)?;
				}

				writeln!(f, " do")?;
				block.fmt(f, context.indent())?;
				write!(f, "{}end", context.indentation)
			}

			Self::GenericFor { variables, exprs, block, .. } => {
				write!(f, "for ")?;
				fmt_names(f, variables, context)?;
				write!(f, " in ")?;
				fmt_list(f, exprs.iter(), context)?;
				writeln!(f, " do")?;
				block.fmt(f, context.indent())?;
				write!(f, "{}end", context.indentation)
			}

			Self::Do(block) => {
				writeln!(f, "do")?;
				block.fmt(f, context.indent())?;
				write!(f, "{}end", context.indentation)
			}

			Self::Return { exprs, .. } => {
				write!(f, "return ")?;
				fmt_list(f, exprs.iter(), context)
			}

			Self::Break { .. } => "break".fmt(f),

			Self::Goto { label, .. } => {
				write!(f, "goto ")?;
				label.fmt(f, context.interner)
			}

			Self::Label { name, .. } => {
				write!(f, "::")?;
				name.fmt(f, context.interner)?;
				write!(f, "::")
			}

			Self::Expr(expr) => expr.fmt(f, context),
		}
	}
}


impl<'a> Display<'a> for Ast {
	type Context = Context<'a>;

	fn fmt(&self, f: &mut fmt::Formatter, context: Self::Context) -> fmt::Result {
		self.statements.fmt(f, context)
	}
}
