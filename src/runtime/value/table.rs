use std::{
	collections::HashMap,
	hash::{Hash, Hasher},
	ops::Deref,
};

use gc::{Gc, GcCell, Finalize, Trace};

use super::{InvalidKey, Value};


/// A Lua table: a dense 1-based array part plus a hash part, with an optional shared
/// metatable.
///
/// Invariant: any key denoting a positive integer within the array's length (plus one,
/// for appends) lives in the array part; every other key lives in the hash part.
/// Writing nil removes the entry from either part.
#[derive(Debug, Clone)]
#[derive(Trace, Finalize)]
pub struct Table(Gc<GcCell<TableData>>);


#[derive(Debug, Default)]
#[derive(Trace, Finalize)]
struct TableData {
	array: Vec<Value>,
	hash: HashMap<Value, Value>,
	metatable: Option<Table>,
}


impl Table {
	pub fn new() -> Self {
		Self(Gc::new(GcCell::new(TableData::default())))
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
		self.0.deref() as *const GcCell<TableData> as usize
	}


	/// Get the value associated with the given key, or nil.
	pub fn get(&self, key: &Value) -> Value {
		let data = self.0.deref().borrow();

		if let Some(ix) = array_index(key) {
			if ix <= data.array.len() {
				return data.array[ix - 1].copy();
			}
		}

		match normalize_key(key.copy()) {
			Ok(key) => data.hash
				.get(&key)
				.map(Value::copy)
				.unwrap_or(Value::Nil),

			// Invalid keys are never present.
			Err(_) => Value::Nil,
		}
	}


	/// Get the value associated with a 1-based integer key. This is the fast path for
	/// sequence access.
	pub fn get_int(&self, key: i64) -> Value {
		let data = self.0.deref().borrow();

		if key >= 1 && (key as usize) <= data.array.len() {
			return data.array[key as usize - 1].copy();
		}

		data.hash
			.get(&Value::Number((key as f64).into()))
			.map(Value::copy)
			.unwrap_or(Value::Nil)
	}


	/// Associate a value with the given key. Writing nil removes the entry.
	pub fn set(&self, key: Value, value: Value) -> Result<(), InvalidKey> {
		let mut data = self.0.deref().borrow_mut();

		if let Some(ix) = array_index(&key) {
			return Ok(data.set_array(ix, value));
		}

		let key = normalize_key(key)?;

		if value.is_nil() {
			data.hash.remove(&key);
		} else {
			data.hash.insert(key, value);
		}

		Ok(())
	}


	/// Associate a value with a 1-based integer key.
	pub fn set_int(&self, key: i64, value: Value) {
		let mut data = self.0.deref().borrow_mut();

		if key >= 1 {
			data.set_array(key as usize, value);
		} else if value.is_nil() {
			data.hash.remove(&Value::Number((key as f64).into()));
		} else {
			data.hash.insert(Value::Number((key as f64).into()), value);
		}
	}


	/// Get a border of the table: a length n such that t[n] is non-nil and t[n+1] is
	/// nil. This is the value of the # operator.
	pub fn length(&self) -> i64 {
		let data = self.0.deref().borrow();

		if data.array.is_empty() {
			// The sequence may continue in the hash part.
			let mut length = 0i64;

			while data.hash.contains_key(&Value::Number(((length + 1) as f64).into())) {
				length += 1;
			}

			return length;
		}

		if !data.array.last().expect("empty array").is_nil() {
			return data.array.len() as i64;
		}

		// Binary search for a border within the array part.
		let mut low = 0usize;
		let mut high = data.array.len();

		while low < high {
			let middle = (low + high) / 2;

			if data.array[middle].is_nil() {
				high = middle;
			} else {
				low = middle + 1;
			}
		}

		low as i64
	}


	/// Get the key-value pair following the given key, for iteration. A nil key starts
	/// the iteration. Returns None when the iteration is finished.
	/// The table must not be modified between calls during an iteration.
	pub fn next(&self, key: &Value) -> Result<Option<(Value, Value)>, InvalidKey> {
		let data = self.0.deref().borrow();

		// The array part comes first.
		let hash_start = match key {
			Value::Nil => Some(0),

			key => match array_index(key) {
				Some(ix) if ix <= data.array.len() => Some(ix),
				_ => None,
			},
		};

		if let Some(start) = hash_start {
			for (ix, value) in data.array[start ..].iter().enumerate() {
				if !value.is_nil() {
					return Ok(
						Some(
							(
								Value::Number(((start + ix + 1) as f64).into()),
								value.copy(),
							)
						)
					);
				}
			}

			return Ok(first_hash_entry(&data.hash));
		}

		// The key is in the hash part: find it and return the following entry.
		let key = normalize_key(key.copy())?;
		let mut found = false;

		for (entry_key, entry_value) in data.hash.iter() {
			if found {
				return Ok(Some((entry_key.copy(), entry_value.copy())));
			}

			if *entry_key == key {
				found = true;
			}
		}

		if found {
			Ok(None)
		} else {
			Err(InvalidKey::Nil)
		}
	}


	pub fn metatable(&self) -> Option<Table> {
		self.0
			.deref()
			.borrow()
			.metatable
			.as_ref()
			.map(Table::copy)
	}


	pub fn set_metatable(&self, metatable: Option<Table>) {
		self.0.deref().borrow_mut().metatable = metatable;
	}
}


impl Default for Table {
	fn default() -> Self {
		Self::new()
	}
}


impl PartialEq for Table {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}


impl Eq for Table { }


impl Hash for Table {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(self.0.deref() as *const GcCell<TableData> as usize).hash(state)
	}
}


impl TableData {
	/// Set a 1-based array index, growing the array part by one when appending, and
	/// migrating any subsequent entries from the hash part.
	fn set_array(&mut self, ix: usize, value: Value) {
		if ix <= self.array.len() {
			self.array[ix - 1] = value;

			// Trim trailing nils so the border search stays within the array.
			while matches!(self.array.last(), Some(Value::Nil)) {
				self.array.pop();
			}
		} else if ix == self.array.len() + 1 {
			if value.is_nil() {
				return;
			}

			self.array.push(value);
			self.migrate_from_hash();
		} else if value.is_nil() {
			self.hash.remove(&Value::Number((ix as f64).into()));
		} else {
			self.hash.insert(Value::Number((ix as f64).into()), value);
		}
	}


	/// Move consecutive integer keys from the hash part into the array part.
	fn migrate_from_hash(&mut self) {
		loop {
			let next = Value::Number(((self.array.len() + 1) as f64).into());

			match self.hash.remove(&next) {
				Some(value) => self.array.push(value),
				None => break,
			}
		}
	}
}


/// Check whether a key addresses the array part: a number with an integral value of at
/// least one, small enough to index a vector.
fn array_index(key: &Value) -> Option<usize> {
	match key {
		Value::Number(number) if number.is_integer() => {
			let value = number.0;

			if value >= 1.0 && value <= usize::MAX as f64 {
				Some(value as usize)
			} else {
				None
			}
		}

		_ => None,
	}
}


/// Validate and normalize a hash part key. Negative zero is folded into positive zero
/// so that bitwise hashing agrees with numeric equality.
fn normalize_key(key: Value) -> Result<Value, InvalidKey> {
	match key {
		Value::Nil => Err(InvalidKey::Nil),

		Value::Number(number) if number.is_nan() => Err(InvalidKey::NaN),

		Value::Number(number) if number.0 == 0.0 => Ok(Value::Number(0.0.into())),

		key => Ok(key),
	}
}


fn first_hash_entry(hash: &HashMap<Value, Value>) -> Option<(Value, Value)> {
	hash
		.iter()
		.next()
		.map(|(key, value)| (key.copy(), value.copy()))
}
