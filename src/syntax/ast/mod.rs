pub mod fmt;

use super::{lexer, SourcePos};
pub use crate::symbol::Symbol;


/// A block is a list of statements, constituting a new scope.
#[derive(Debug, Default)]
pub struct Block(pub Box<[Statement]>);


impl From<Box<[Statement]>> for Block {
	fn from(block: Box<[Statement]>) -> Self {
		Self(block)
	}
}


impl From<Vec<Statement>> for Block {
	fn from(block: Vec<Statement>) -> Self {
		Self(block.into())
	}
}


/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
	Minus, // -
	Not,   // not
	Len,   // #
}


/// Warning, the following instance may panic if used with unmapped operators.
impl From<lexer::Operator> for UnaryOp {
	fn from(op: lexer::Operator) -> Self {
		match op {
			lexer::Operator::Minus => UnaryOp::Minus,
			lexer::Operator::Not => UnaryOp::Not,
			lexer::Operator::Len => UnaryOp::Len,
			_ => panic!("invalid operator"),
		}
	}
}


/// Binary operators.
/// Assignment and access are not represented as operators, but directly as
/// statements/expressions instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Plus,  // +
	Minus, // -
	Times, // *
	Div,   // /
	Mod,   // %
	Pow,   // ^

	Equals,        // ==
	NotEquals,     // ~=
	Greater,       // >
	GreaterEquals, // >=
	Lower,         // <
	LowerEquals,   // <=

	And, // and
	Or,  // or

	Concat, // ..
}


/// Warning, the following instance may panic if used with unmapped operators.
impl From<lexer::Operator> for BinaryOp {
	fn from(op: lexer::Operator) -> Self {
		match op {
			lexer::Operator::Plus => BinaryOp::Plus,
			lexer::Operator::Minus => BinaryOp::Minus,
			lexer::Operator::Times => BinaryOp::Times,
			lexer::Operator::Div => BinaryOp::Div,
			lexer::Operator::Mod => BinaryOp::Mod,
			lexer::Operator::Pow => BinaryOp::Pow,
			lexer::Operator::Equals => BinaryOp::Equals,
			lexer::Operator::NotEquals => BinaryOp::NotEquals,
			lexer::Operator::Greater => BinaryOp::Greater,
			lexer::Operator::GreaterEquals => BinaryOp::GreaterEquals,
			lexer::Operator::Lower => BinaryOp::Lower,
			lexer::Operator::LowerEquals => BinaryOp::LowerEquals,
			lexer::Operator::And => BinaryOp::And,
			lexer::Operator::Or => BinaryOp::Or,
			lexer::Operator::Concat => BinaryOp::Concat,
			_ => panic!("invalid operator"),
		}
	}
}


/// A single field in a table constructor.
#[derive(Debug)]
pub enum TableField {
	/// A positional field: { expr }
	List(Expr),
	/// A named field: { name = expr }
	Record(Symbol, Expr),
	/// A computed field: { [expr] = expr }
	General(Expr, Expr),
}


/// Expressions of all kinds in the language.
#[derive(Debug)]
pub enum Expr {
	Nil {
		pos: SourcePos,
	},
	True {
		pos: SourcePos,
	},
	False {
		pos: SourcePos,
	},
	Number {
		value: f64,
		pos: SourcePos,
	},
	String {
		value: Box<[u8]>,
		pos: SourcePos,
	},
	/// The variable arguments expression (...).
	Vararg {
		pos: SourcePos,
	},
	Identifier {
		identifier: Symbol,
		pos: SourcePos,
	},
	/// Bracketed access (a[b]).
	Index {
		object: Box<Expr>,
		key: Box<Expr>,
		pos: SourcePos,
	},
	/// Dotted access (a.b).
	Field {
		object: Box<Expr>,
		field: Symbol,
		pos: SourcePos,
	},
	UnaryOp {
		op: UnaryOp,
		operand: Box<Expr>,
		pos: SourcePos,
	},
	BinaryOp {
		left: Box<Expr>,
		op: BinaryOp,
		right: Box<Expr>,
		pos: SourcePos,
	},
	FunctionCall {
		function: Box<Expr>,
		args: Box<[Expr]>,
		pos: SourcePos,
	},
	/// Method call (obj:name(args)), which evaluates obj a single time.
	MethodCall {
		object: Box<Expr>,
		method: Symbol,
		args: Box<[Expr]>,
		pos: SourcePos,
	},
	Function {
		params: Box<[Symbol]>,
		is_vararg: bool,
		body: Block,
		pos: SourcePos,
	},
	Table {
		fields: Box<[TableField]>,
		pos: SourcePos,
	},
	/// A parenthesized expression, which truncates multiple values to a single one.
	Parens {
		inner: Box<Expr>,
		pos: SourcePos,
	},
}


impl Expr {
	pub fn pos(&self) -> SourcePos {
		match self {
			Self::Nil { pos } => *pos,
			Self::True { pos } => *pos,
			Self::False { pos } => *pos,
			Self::Number { pos, .. } => *pos,
			Self::String { pos, .. } => *pos,
			Self::Vararg { pos } => *pos,
			Self::Identifier { pos, .. } => *pos,
			Self::Index { pos, .. } => *pos,
			Self::Field { pos, .. } => *pos,
			Self::UnaryOp { pos, .. } => *pos,
			Self::BinaryOp { pos, .. } => *pos,
			Self::FunctionCall { pos, .. } => *pos,
			Self::MethodCall { pos, .. } => *pos,
			Self::Function { pos, .. } => *pos,
			Self::Table { pos, .. } => *pos,
			Self::Parens { pos, .. } => *pos,
		}
	}


	/// Check whether the expression may produce multiple values.
	pub fn is_multi_valued(&self) -> bool {
		matches!(
			self,
			Self::FunctionCall { .. } | Self::MethodCall { .. } | Self::Vararg { .. }
		)
	}


	/// Check whether the expression is a valid assignment target.
	pub fn is_assignable(&self) -> bool {
		matches!(
			self,
			Self::Identifier { .. } | Self::Index { .. } | Self::Field { .. }
		)
	}
}


/// Statements of all kinds in the language.
#[derive(Debug)]
pub enum Statement {
	/// Declares local variables, possibly with initial values.
	Local {
		names: Box<[Symbol]>,
		exprs: Box<[Expr]>,
		pos: SourcePos,
	},
	/// Declares a local function, whose name is visible in its own body.
	LocalFunction {
		name: Symbol,
		function: Expr,
		pos: SourcePos,
	},
	/// Assigns to a list of targets, which are identifier or access expressions.
	Assign {
		targets: Box<[Expr]>,
		exprs: Box<[Expr]>,
		pos: SourcePos,
	},
	If {
		condition: Expr,
		then: Block,
		otherwise: Option<Block>,
		pos: SourcePos,
	},
	While {
		condition: Expr,
		block: Block,
		pos: SourcePos,
	},
	/// Repeat-until loop. The condition may refer to locals declared in the block.
	Repeat {
		block: Block,
		condition: Expr,
		pos: SourcePos,
	},
	NumericFor {
		variable: Symbol,
		start: Expr,
		limit: Expr,
		step: Option<Expr>,
		block: Block,
		pos: SourcePos,
	},
	GenericFor {
		variables: Box<[Symbol]>,
		exprs: Box<[Expr]>,
		block: Block,
		pos: SourcePos,
	},
	Do(Block),
	Return {
		exprs: Box<[Expr]>,
		pos: SourcePos,
	},
	Break {
		pos: SourcePos,
	},
	Goto {
		label: Symbol,
		pos: SourcePos,
	},
	Label {
		name: Symbol,
		pos: SourcePos,
	},
	Expr(Expr),
}


/// The abstract syntax tree for a source file.
#[derive(Debug)]
pub struct Ast {
	/// The chunk name, usually derived from the source path.
	pub source: Symbol,
	/// The program.
	pub statements: Block,
}
