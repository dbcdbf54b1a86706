use super::*;
use super::super::value::Value;


#[test]
fn test_upvalue_lifecycle() {
	let thread = Thread::main();
	thread.stack_set(0, 10.0.into());

	let upvalue = Upvalue::open(thread.copy(), 0);

	// Open upvalues alias the register, never copying.
	assert_eq!(upvalue.get(), Value::from(10.0));

	thread.stack_set(0, 20.0.into());
	assert_eq!(upvalue.get(), Value::from(20.0));

	upvalue.set(30.0.into());
	assert_eq!(thread.stack_get(0), Value::from(30.0));

	// Closing snapshots the current value; the register is dead afterwards.
	upvalue.close();
	thread.stack_set(0, 99.0.into());
	assert_eq!(upvalue.get(), Value::from(30.0));

	upvalue.set(40.0.into());
	assert_eq!(upvalue.get(), Value::from(40.0));
	assert_eq!(thread.stack_get(0), Value::from(99.0));
}


#[test]
fn test_shared_upvalues_observe_the_snapshot() {
	let thread = Thread::main();
	thread.stack_set(3, "shared".into());

	let first = Upvalue::open(thread.copy(), 3);
	let second = first.copy();

	first.close();
	second.set("updated".into());

	assert_eq!(first.get(), Value::from("updated"));
}


#[test]
fn test_thread_status_names() {
	assert_eq!(Status::Suspended.name(), "suspended");
	assert_eq!(Status::Running.name(), "running");
	assert_eq!(Status::Normal.name(), "normal");
	assert_eq!(Status::Dead.name(), "dead");

	let main = Thread::main();
	assert_eq!(main.status(), Status::Running);
	assert!(main.is_main());
}


#[test]
fn test_stack_slots_default_to_nil() {
	let thread = Thread::main();

	assert_eq!(thread.stack_get(100), Value::Nil);

	thread.stack_set(5, true.into());
	assert_eq!(thread.stack_get(5), Value::from(true));
	assert_eq!(thread.stack_get(4), Value::Nil);
}


#[test]
fn test_interruption_handle() {
	let interruption = Interruption::default();
	let handle = interruption.clone();

	assert!(!interruption.is_interrupted());

	handle.interrupt();
	assert!(interruption.is_interrupted());

	interruption.clear();
	assert!(!handle.is_interrupted());
}
