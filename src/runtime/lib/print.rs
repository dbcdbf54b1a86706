use std::io::{self, Write};

use gc::{Finalize, Trace};

use super::{
	CallContext,
	Control,
	NativeFun,
	Panic,
	RustFun,
	Value,
};


inventory::submit!{ RustFun::from(Print) }

#[derive(Trace, Finalize)]
struct Print;


impl Print {
	fn print<W: Write>(value: &Value, mut writer: W) -> io::Result<()> {
		match value {
			Value::String(string) => writer.write_all(string.as_bytes()),
			value => write!(writer, "{}", value),
		}
	}
}


impl NativeFun for Print {
	fn name(&self) -> &'static str { "print" }

	fn call(&self, context: CallContext) -> Result<Control, Panic> {
		let stdout = io::stdout();
		let mut stdout = stdout.lock();

		for ix in 0 .. context.args_len {
			if ix > 0 {
				write!(stdout, "\t").map_err(Panic::io)?;
			}

			Self::print(&context.arg(ix), &mut stdout).map_err(Panic::io)?;
		}

		writeln!(stdout).map_err(Panic::io)?;

		Ok(Control::none())
	}
}
