use std::hash::{Hash, Hasher};
use std::ops::Deref;

use gc::{custom_trace, Gc, GcCell, GcCellRef, GcCellRefMut, Finalize, Trace};

use super::super::value::{Function, Value};
use super::frame::{Frame, PostOp};
use super::upvalue::Upvalue;


/// The lifecycle of a coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	/// Created or yielded, ready to be resumed.
	Suspended,
	/// Currently executing.
	Running,
	/// Resumed another coroutine, and is waiting for it to yield or finish.
	Normal,
	/// Finished, either by returning or by an uncaught error.
	Dead,
}


impl Status {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Suspended => "suspended",
			Self::Running => "running",
			Self::Normal => "normal",
			Self::Dead => "dead",
		}
	}
}


/// A logical thread of execution: an independent value stack and call stack.
/// The main thread is a degenerate case which cannot be resumed or yielded from.
#[derive(Debug, Clone)]
#[derive(Trace, Finalize)]
pub struct Thread(Gc<GcCell<ThreadState>>);


#[derive(Debug)]
pub struct ThreadState {
	/// The value stack. Grows on demand; slots beyond the allocated length read as nil.
	pub stack: Vec<Value>,
	/// One past the last meaningful stack slot, for open ended value sequences.
	pub top: usize,
	/// The call stack.
	pub frames: Vec<Frame>,
	/// Open upvalues aliasing this thread's registers, sorted by register index.
	pub open_upvalues: Vec<(usize, Upvalue)>,
	pub status: Status,
	/// The body function of a coroutine that hasn't been resumed yet.
	pub start: Option<Gc<Function>>,
	/// Where resume arguments land when this thread is suspended in a yield.
	pub resume_post: Option<PostOp>,
	/// Whether this is the main thread.
	pub is_main: bool,
}


impl Finalize for ThreadState { }


// Frames and post operations are traced manually; everything else derives.
unsafe impl Trace for ThreadState {
	custom_trace!(this, {
		mark(&this.stack);
		mark(&this.frames);

		for (_, upvalue) in &this.open_upvalues {
			mark(upvalue);
		}

		mark(&this.start);
	});
}


impl Thread {
	/// Create the main thread.
	pub fn main() -> Self {
		Self::with_state(
			ThreadState {
				stack: Vec::with_capacity(64),
				top: 0,
				frames: Vec::new(),
				open_upvalues: Vec::new(),
				status: Status::Running,
				start: None,
				resume_post: None,
				is_main: true,
			}
		)
	}


	/// Create a suspended coroutine that will run the given function once resumed.
	pub fn coroutine(function: Gc<Function>) -> Self {
		Self::with_state(
			ThreadState {
				stack: Vec::new(),
				top: 0,
				frames: Vec::new(),
				open_upvalues: Vec::new(),
				status: Status::Suspended,
				start: Some(function),
				resume_post: None,
				is_main: false,
			}
		)
	}


	fn with_state(state: ThreadState) -> Self {
		Self(Gc::new(GcCell::new(state)))
	}


	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self(self.0.clone())
	}


	/// Referential equality.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		std::ptr::eq(self.0.deref(), other.0.deref())
	}


	/// A stable address, for display purposes.
	pub fn address(&self) -> usize {
		self.0.deref() as *const GcCell<ThreadState> as usize
	}


	pub fn state(&self) -> GcCellRef<ThreadState> {
		self.0.deref().borrow()
	}


	pub fn state_mut(&self) -> GcCellRefMut<ThreadState> {
		self.0.deref().borrow_mut()
	}


	pub fn status(&self) -> Status {
		self.state().status
	}


	pub fn set_status(&self, status: Status) {
		self.state_mut().status = status;
	}


	pub fn is_main(&self) -> bool {
		self.state().is_main
	}


	/// Read a stack slot. Slots beyond the allocated length read as nil.
	pub fn stack_get(&self, ix: usize) -> Value {
		self.state()
			.stack
			.get(ix)
			.map(Value::copy)
			.unwrap_or(Value::Nil)
	}


	/// Write a stack slot, growing the stack as needed.
	pub fn stack_set(&self, ix: usize, value: Value) {
		let mut state = self.state_mut();

		if ix >= state.stack.len() {
			state.stack.resize_with(ix + 1, Value::default);
		}

		state.stack[ix] = value;
	}
}


impl PartialEq for Thread {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}


impl Eq for Thread { }


impl Hash for Thread {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.address().hash(state)
	}
}
