pub mod util;

use crate::fmt::FmtString;


#[test]
fn test_uncaught_error_has_traceback() {
	let (runtime, result) = util::eval(
		"
			local function inner()
				error('boom')
			end

			local function outer()
				inner()
			end

			outer()
		"
	);

	let panic = result.expect_err("expected error");
	let message = panic.fmt_string(runtime.interner());

	assert!(message.contains("boom"), "message: {}", message);
	assert!(message.contains("stack traceback:"), "message: {}", message);
	assert!(message.contains("main chunk"), "message: {}", message);
	assert!(message.contains("inner"), "message: {}", message);
}


#[test]
fn test_error_position_is_chunk_qualified() {
	let (runtime, result) = util::eval("error('oops')");

	let panic = result.expect_err("expected error");
	let message = panic.fmt_string(runtime.interner());

	assert!(message.starts_with("<test>:1: oops"), "message: {}", message);
}
