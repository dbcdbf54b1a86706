use assert_matches::assert_matches;

use super::*;
use crate::bytecode::{rk_is_constant, OpCode};
use crate::symbol::Interner;
use crate::syntax::{Analysis, Source};


fn compile_source(input: &str) -> Result<Chunk, Error> {
	let mut interner = Interner::new();
	compile_with(input, &mut interner)
}


fn compile_with(input: &str, interner: &mut Interner) -> Result<Chunk, Error> {
	let source = Source {
		path: std::path::Path::new("<test>").into(),
		contents: input.as_bytes().into(),
	};

	let chunk_name = interner.get_or_intern(b"<test>");
	let analysis = Analysis::analyze(&source, chunk_name, interner).expect("syntax error");

	compile(&analysis.ast, interner)
}


fn opcodes(chunk: &Chunk) -> Vec<OpCode> {
	chunk.code.iter().map(|instruction| instruction.opcode()).collect()
}


#[test]
fn test_constant_expression() {
	let chunk = compile_source("return 1 + 2").unwrap();

	// Both literal operands come from the constant pool.
	assert_eq!(
		opcodes(&chunk),
		[OpCode::Add, OpCode::Return, OpCode::Return]
	);

	let add = chunk.code[0];
	assert!(rk_is_constant(add.b()));
	assert!(rk_is_constant(add.c()));
}


#[test]
fn test_constant_pool_dedup() {
	let chunk = compile_source("return 1 + 1, 'x' .. 'x'").unwrap();

	// 1 and 'x' each appear once in the pool.
	assert_eq!(chunk.constants.len(), 2);
}


#[test]
fn test_register_discipline() {
	let chunk = compile_source(
		"
			local a = 1
			local b = 2
			local c = a + b
			return c
		"
	).unwrap();

	// Three locals plus at most a few temporaries.
	assert!(chunk.max_stack >= 3);
	assert!(chunk.max_stack <= 5, "max_stack: {}", chunk.max_stack);

	// The statement temporaries are reclaimed: the ADD writes straight into c's
	// register, reading the locals in place.
	let add = chunk.code
		.iter()
		.find(|instruction| instruction.opcode() == OpCode::Add)
		.expect("no ADD emitted");

	assert_eq!(add.a(), 2);
	assert_eq!(add.b(), 0);
	assert_eq!(add.c(), 1);
}


#[test]
fn test_globals_go_through_env() {
	let chunk = compile_source("x = 1 return x").unwrap();

	assert_matches!(chunk.upvalues.as_ref(), [ desc ] => {
		assert_eq!(desc.kind, crate::bytecode::UpvalueKind::Register(0));
	});

	assert!(opcodes(&chunk).contains(&OpCode::SetTabUp));
	assert!(opcodes(&chunk).contains(&OpCode::GetTabUp));
}


#[test]
fn test_upvalue_resolution() {
	let chunk = compile_source(
		"
			local outer = 1

			local function middle()
				local function inner()
					return outer
				end
				return inner
			end

			return middle
		"
	).unwrap();

	// middle captures outer as a register upvalue, inner chains through middle's
	// upvalue list.
	let middle = &chunk.protos[0];
	let inner = &middle.protos[0];

	assert_matches!(middle.upvalues.as_ref(), [ desc ] => {
		assert_matches!(desc.kind, crate::bytecode::UpvalueKind::Register(0));
	});

	assert_matches!(inner.upvalues.as_ref(), [ desc ] => {
		assert_matches!(desc.kind, crate::bytecode::UpvalueKind::Upvalue(0));
	});
}


#[test]
fn test_captured_scope_emits_close() {
	let chunk = compile_source(
		"
			local fns = {}
			for i = 1, 3 do
				local x = i
				fns[i] = function () return x end
			end
			return fns
		"
	).unwrap();

	// The loop body scope captured x, so some jump carries a close boundary.
	let closes = chunk.code
		.iter()
		.filter(|instruction| {
			instruction.opcode() == OpCode::Jmp && instruction.a() != 0
		})
		.count();

	assert!(closes >= 1);
}


#[test]
fn test_tail_call() {
	let chunk = compile_source(
		"
			local function loop(n)
				return loop(n - 1)
			end
		"
	).unwrap();

	let loop_fn = &chunk.protos[0];
	assert!(opcodes(loop_fn).contains(&OpCode::TailCall));
	assert!(!opcodes(loop_fn).contains(&OpCode::Call));
}


#[test]
fn test_multi_return_sentinels() {
	let chunk = compile_source(
		"
			local function f() end
			return f(f())
		"
	).unwrap();

	// The inner call leaves its results open (C == 0), the outer consumes them all
	// (B == 0), and the return forwards everything.
	let calls: Vec<_> = chunk.code
		.iter()
		.filter(|instruction| matches!(
			instruction.opcode(),
			OpCode::Call | OpCode::TailCall | OpCode::Return
		))
		.collect();

	assert!(calls.iter().any(|call| call.b() == 0 || call.c() == 0));
}


#[test]
fn test_setlist_batching() {
	let mut source = String::from("return {");
	for i in 0 .. 120 {
		source.push_str(&format!("{},", i));
	}
	source.push('}');

	let chunk = compile_source(&source).unwrap();

	let batches: Vec<_> = chunk.code
		.iter()
		.filter(|instruction| instruction.opcode() == OpCode::SetList)
		.collect();

	// 120 list fields flush as 50 + 50 + 20.
	assert_eq!(batches.len(), 3);
	assert_eq!(batches[0].b(), 50);
	assert_eq!(batches[0].c(), 1);
	assert_eq!(batches[1].c(), 2);
	assert_eq!(batches[2].b(), 20);
	assert_eq!(batches[2].c(), 3);
}


#[test]
fn test_numeric_for_shape() {
	let chunk = compile_source("for i = 1, 10 do end").unwrap();

	let ops = opcodes(&chunk);
	assert!(ops.contains(&OpCode::ForPrep));
	assert!(ops.contains(&OpCode::ForLoop));
}


#[test]
fn test_generic_for_shape() {
	let chunk = compile_source("for k, v in pairs({}) do end").unwrap();

	let ops = opcodes(&chunk);
	assert!(ops.contains(&OpCode::TForCall));
	assert!(ops.contains(&OpCode::TForLoop));

	let tforcall = chunk.code
		.iter()
		.find(|instruction| instruction.opcode() == OpCode::TForCall)
		.unwrap();

	assert_eq!(tforcall.c(), 2); // two loop variables
}


#[test]
fn test_break_outside_loop() {
	assert_matches!(
		compile_source("break"),
		Err(Error::BreakOutsideLoop { .. })
	);
}


#[test]
fn test_undefined_goto() {
	assert_matches!(
		compile_source("goto nowhere"),
		Err(Error::UndefinedLabel { .. })
	);
}


#[test]
fn test_source_positions_track_lines() {
	let chunk = compile_source("local a = 1\nlocal b = 2\nreturn a + b").unwrap();

	let first = chunk.source_info.first().unwrap();
	let last = chunk.source_info[chunk.code.len() - 2];

	assert_eq!(first.line, 1);
	assert_eq!(last.line, 3);
}
