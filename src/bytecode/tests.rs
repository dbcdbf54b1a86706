use super::*;


#[test]
fn test_abc_roundtrip() {
	let instruction = Instruction::abc(OpCode::Add, 10, 20, 300);

	assert_eq!(instruction.opcode(), OpCode::Add);
	assert_eq!(instruction.a(), 10);
	assert_eq!(instruction.b(), 20);
	assert_eq!(instruction.c(), 300);
}


#[test]
fn test_abc_max_values() {
	let instruction = Instruction::abc(OpCode::SetTable, 255, 511, 511);

	assert_eq!(instruction.a(), 255);
	assert_eq!(instruction.b(), 511);
	assert_eq!(instruction.c(), 511);
}


#[test]
fn test_bit_layout() {
	// Opcode in bits [0:6), A in [6:14), C in [14:23), B in [23:32).
	let instruction = Instruction::abc(OpCode::Move, 1, 2, 3);

	assert_eq!(
		instruction.0,
		(OpCode::Move as u32) | 1 << 6 | 3 << 14 | 2 << 23
	);
}


#[test]
fn test_abx_roundtrip() {
	let instruction = Instruction::abx(OpCode::LoadK, 5, 100_000);

	assert_eq!(instruction.opcode(), OpCode::LoadK);
	assert_eq!(instruction.a(), 5);
	assert_eq!(instruction.bx(), 100_000);
}


#[test]
fn test_sbx_bias() {
	// The signed interpretation of Bx has a fixed bias.
	let instruction = Instruction::asbx(OpCode::Jmp, 0, 0);
	assert_eq!(instruction.bx(), BIAS_SBX as u32);
	assert_eq!(instruction.sbx(), 0);

	let instruction = Instruction::asbx(OpCode::Jmp, 0, -10);
	assert_eq!(instruction.sbx(), -10);

	let instruction = Instruction::asbx(OpCode::ForLoop, 3, MAX_SBX);
	assert_eq!(instruction.sbx(), MAX_SBX);

	let instruction = Instruction::asbx(OpCode::ForPrep, 3, MIN_SBX);
	assert_eq!(instruction.sbx(), MIN_SBX);
}


#[test]
fn test_ax_roundtrip() {
	let instruction = Instruction::ax(OpCode::ExtraArg, MAX_AX);

	assert_eq!(instruction.opcode(), OpCode::ExtraArg);
	assert_eq!(instruction.ax(), MAX_AX);
}


#[test]
fn test_rk_threshold() {
	assert!(!rk_is_constant(0));
	assert!(!rk_is_constant(255));
	assert!(rk_is_constant(256));
	assert!(rk_is_constant(511));

	assert_eq!(rk_constant(0), 256);
	assert_eq!(rk_index(rk_constant(42)), 42);
}


#[test]
fn test_all_opcodes_decode() {
	for value in 0 .. OpCode::COUNT {
		let op = OpCode::from_u8(value as u8).expect("valid opcode");
		assert_eq!(op as usize, value);
	}

	assert!(OpCode::from_u8(OpCode::COUNT as u8).is_none());
}


#[test]
fn test_backpatching() {
	let mut instruction = Instruction::asbx(OpCode::Jmp, 1, 0);

	instruction.set_sbx(42);
	assert_eq!(instruction.sbx(), 42);
	assert_eq!(instruction.a(), 1); // preserved
	assert_eq!(instruction.opcode(), OpCode::Jmp); // preserved

	let mut instruction = Instruction::abc(OpCode::Call, 3, 2, 0);
	instruction.set_c(5);
	assert_eq!(instruction.c(), 5);
	assert_eq!(instruction.b(), 2); // preserved

	instruction.set_b(1);
	assert_eq!(instruction.b(), 1);
	assert_eq!(instruction.c(), 5); // preserved
}


#[test]
fn test_constant_dedup_key() {
	use std::collections::HashMap;

	let mut pool: HashMap<Constant, usize> = HashMap::new();

	pool.insert(Constant::Number(1.0), 0);
	pool.insert(Constant::String("x".as_bytes().into()), 1);

	assert_eq!(pool.get(&Constant::Number(1.0)), Some(&0));
	assert_eq!(pool.get(&Constant::String("x".as_bytes().into())), Some(&1));
	assert_eq!(pool.get(&Constant::Number(2.0)), None);

	// Zero and negative zero are distinct constants, bitwise.
	pool.insert(Constant::Number(-0.0), 2);
	assert_eq!(pool.get(&Constant::Number(0.0)), None);
}
