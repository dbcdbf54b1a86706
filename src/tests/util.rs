use std::path::Path;

use crate::compiler;
use crate::runtime::{value::Value, Panic, Runtime};
use crate::symbol::Interner;
use crate::syntax::{Analysis, Source};


/// Run a Lua source through the whole pipeline, returning the runtime alongside the
/// outcome so callers can resolve symbols in errors.
pub fn eval(source: &str) -> (Runtime, Result<Vec<Value>, Panic>) {
	let mut interner = Interner::new();

	let source = Source {
		path: Path::new("<test>").into(),
		contents: source.as_bytes().into(),
	};

	let chunk_name = interner.get_or_intern(b"<test>");

	let analysis = Analysis::analyze(&source, chunk_name, &mut interner)
		.unwrap_or_else(|error| panic!(
			"syntax error: {}",
			crate::fmt::Show(&error, &interner)
		));

	let chunk = compiler::compile(&analysis.ast, &mut interner)
		.unwrap_or_else(|error| panic!(
			"compile error: {}",
			crate::fmt::Show(&error, &interner)
		));

	let mut runtime = Runtime::new(interner);
	let result = runtime.eval(chunk);

	(runtime, result)
}


/// Run a source expected to succeed, returning its values.
pub fn eval_values(source: &str) -> Vec<Value> {
	let (runtime, result) = eval(source);

	result.unwrap_or_else(|panic| panic!(
		"runtime error: {}",
		crate::fmt::Show(&panic, runtime.interner())
	))
}


/// Run a source expected to fail, returning the formatted error message.
pub fn eval_error(source: &str) -> String {
	use crate::fmt::FmtString;

	let (runtime, result) = eval(source);

	match result {
		Ok(values) => panic!("expected error, got {:?} values", values.len()),
		Err(panic) => panic.fmt_string(runtime.interner()),
	}
}


/// Assert the values are numbers equal to the expectation.
pub fn assert_numbers(values: &[Value], expected: &[f64]) {
	let numbers: Vec<f64> = values
		.iter()
		.map(|value| value.as_number().expect("expected number"))
		.collect();

	assert_eq!(numbers, expected);
}


/// Assert a single string result.
pub fn assert_string(values: &[Value], expected: &str) {
	match values {
		[ Value::String(string) ] => assert_eq!(string.as_bytes(), expected.as_bytes()),
		other => panic!("expected a single string, got {} values", other.len()),
	}
}
