use super::super::value::Value;


/// The pre-built metamethod name keys, allocated once per virtual machine so that
/// metamethod lookups don't allocate.
#[derive(Debug)]
pub struct MetaNames {
	pub index: Value,
	pub newindex: Value,
	pub add: Value,
	pub sub: Value,
	pub mul: Value,
	pub div: Value,
	pub modulo: Value,
	pub pow: Value,
	pub unm: Value,
	pub len: Value,
	pub concat: Value,
	pub eq: Value,
	pub lt: Value,
	pub le: Value,
	pub call: Value,
	pub tostring: Value,
}


impl MetaNames {
	pub fn new() -> Self {
		Self {
			index: "__index".into(),
			newindex: "__newindex".into(),
			add: "__add".into(),
			sub: "__sub".into(),
			mul: "__mul".into(),
			div: "__div".into(),
			modulo: "__mod".into(),
			pow: "__pow".into(),
			unm: "__unm".into(),
			len: "__len".into(),
			concat: "__concat".into(),
			eq: "__eq".into(),
			lt: "__lt".into(),
			le: "__le".into(),
			call: "__call".into(),
			tostring: "__tostring".into(),
		}
	}
}


/// Look up a metamethod on the value's metatable. Returns None when the value has no
/// metatable, or the metatable has no such entry.
pub fn metamethod(value: &Value, name: &Value) -> Option<Value> {
	let metatable = value.metatable()?;

	match metatable.get(name) {
		Value::Nil => None,
		handler => Some(handler),
	}
}


/// Look up a binary operation metamethod, searching first the left then the right
/// operand.
pub fn binary_metamethod(left: &Value, right: &Value, name: &Value) -> Option<Value> {
	metamethod(left, name).or_else(|| metamethod(right, name))
}
