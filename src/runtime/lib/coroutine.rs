use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Thread,
	Value,
};


inventory::submit!{ RustFun::from(Create) }

/// coroutine.create
#[derive(Trace, Finalize)]
struct Create;

impl NativeFun for Create {
	fn name(&self) -> &'static str { "coroutine.create" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let function = match context.arg(0) {
			Value::Function(function) => function,
			other => return Err(Panic::type_error(other, "function", context.pos)),
		};

		Ok(Control::value(Thread::coroutine(function).into()))
	}
}


inventory::submit!{ RustFun::from(Resume) }

/// coroutine.resume
#[derive(Trace, Finalize)]
struct Resume;

impl NativeFun for Resume {
	fn name(&self) -> &'static str { "coroutine.resume" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let thread = match context.arg(0) {
			Value::Thread(thread) => thread,
			other => return Err(Panic::type_error(other, "coroutine", context.pos)),
		};

		let args = (1 .. context.args_len)
			.map(|ix| context.arg(ix))
			.collect();

		Ok(Control::Resume { thread, args, protected: true })
	}
}


inventory::submit!{ RustFun::from(Yield) }

/// coroutine.yield
#[derive(Trace, Finalize)]
struct Yield;

impl NativeFun for Yield {
	fn name(&self) -> &'static str { "coroutine.yield" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		Ok(Control::Yield(context.args()))
	}
}


inventory::submit!{ RustFun::from(Status) }

/// coroutine.status
#[derive(Trace, Finalize)]
struct Status;

impl NativeFun for Status {
	fn name(&self) -> &'static str { "coroutine.status" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let thread = match context.arg(0) {
			Value::Thread(thread) => thread,
			other => return Err(Panic::type_error(other, "coroutine", context.pos)),
		};

		Ok(Control::value(thread.status().name().into()))
	}
}


inventory::submit!{ RustFun::from(Running) }

/// coroutine.running
#[derive(Trace, Finalize)]
struct Running;

impl NativeFun for Running {
	fn name(&self) -> &'static str { "coroutine.running" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let current = context.vm.current_thread();
		let is_main = current.is_main();

		Ok(
			Control::Return(
				vec![
					current.into(),
					is_main.into(),
				]
			)
		)
	}
}


inventory::submit!{ RustFun::from(Wrap) }

/// coroutine.wrap
#[derive(Trace, Finalize)]
struct Wrap;

impl NativeFun for Wrap {
	fn name(&self) -> &'static str { "coroutine.wrap" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let function = match context.arg(0) {
			Value::Function(function) => function,
			other => return Err(Panic::type_error(other, "function", context.pos)),
		};

		let wrapped = Wrapped {
			thread: Thread::coroutine(function),
		};

		Ok(Control::value(RustFun::from(wrapped).into()))
	}
}


/// The callable produced by coroutine.wrap: resumes its coroutine unprotected, so
/// errors propagate to the caller and results come without the boolean prefix.
#[derive(Trace, Finalize)]
struct Wrapped {
	thread: Thread,
}

impl NativeFun for Wrapped {
	fn name(&self) -> &'static str { "coroutine.wrapped" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		Ok(
			Control::Resume {
				thread: self.thread.copy(),
				args: context.args(),
				protected: false,
			}
		)
	}
}
