use gc::{Gc, GcCell, Finalize, Trace};

use super::super::value::Value;
use super::thread::Thread;


/// A variable captured by a closure.
///
/// An upvalue starts open, aliasing a register of the owning thread by index. It is
/// closed exactly once, when the aliased register is about to die: the current value is
/// snapshotted into owned storage, and every closure sharing this upvalue observes the
/// snapshot from then on.
///
/// The open state holds the owning thread handle plus a register index, never a
/// pointer, since the thread's backing stack may be resized at any time.
#[derive(Debug, Clone)]
#[derive(Trace, Finalize)]
pub struct Upvalue(Gc<GcCell<UpvalueState>>);


#[derive(Debug)]
#[derive(Trace, Finalize)]
enum UpvalueState {
	Open {
		thread: Thread,
		register: usize,
	},
	Closed(Value),
}


impl Upvalue {
	/// Create an open upvalue aliasing the given register.
	pub fn open(thread: Thread, register: usize) -> Self {
		Self(
			Gc::new(GcCell::new(UpvalueState::Open { thread, register }))
		)
	}


	/// Create an upvalue born closed, owning the given value. The root _ENV upvalue is
	/// of this kind.
	pub fn closed(value: Value) -> Self {
		Self(
			Gc::new(GcCell::new(UpvalueState::Closed(value)))
		)
	}


	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self(self.0.clone())
	}


	/// Read the current value.
	pub fn get(&self) -> Value {
		match &*self.0.borrow() {
			UpvalueState::Open { thread, register } => thread.stack_get(*register),
			UpvalueState::Closed(value) => value.copy(),
		}
	}


	/// Write a value, either through to the aliased register or into the owned storage.
	pub fn set(&self, value: Value) {
		match &mut *self.0.borrow_mut() {
			UpvalueState::Open { thread, register } => thread.stack_set(*register, value),
			UpvalueState::Closed(slot) => *slot = value,
		}
	}


	/// Close the upvalue, snapshotting the aliased register into owned storage.
	/// Closing an already closed upvalue is a no-op.
	pub fn close(&self) {
		let value = self.get();
		*self.0.borrow_mut() = UpvalueState::Closed(value);
	}
}
