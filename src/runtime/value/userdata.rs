use std::{
	fmt::{self, Debug},
	hash::{Hash, Hasher},
	ops::Deref,
};

use gc::{Gc, GcCell, Finalize, Trace};

use super::Table;


/// Host data exposed to Lua code.
/// Hosts register concrete types implementing this trait; the core only moves the
/// values around and dispatches metamethods through the attached metatable.
pub trait NativeData: Trace + Finalize + 'static {
	/// A human readable name for the wrapped type.
	fn type_name(&self) -> &'static str;
}


/// A garbage-collected userdata value with an optional metatable.
#[derive(Trace, Finalize)]
pub struct UserData(Gc<UserDataInner>);


#[derive(Trace, Finalize)]
struct UserDataInner {
	data: GcCell<Box<dyn NativeData>>,
	metatable: GcCell<Option<Table>>,
}


impl UserData {
	pub fn new<T: NativeData>(data: T) -> Self {
		Self(
			Gc::new(
				UserDataInner {
					data: GcCell::new(Box::new(data)),
					metatable: GcCell::new(None),
				}
			)
		)
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
		self.0.deref() as *const UserDataInner as usize
	}


	pub fn type_name(&self) -> &'static str {
		self.0.data.borrow().type_name()
	}


	pub fn metatable(&self) -> Option<Table> {
		self.0
			.metatable
			.borrow()
			.as_ref()
			.map(Table::copy)
	}


	pub fn set_metatable(&self, metatable: Option<Table>) {
		*self.0.metatable.borrow_mut() = metatable;
	}
}


impl Debug for UserData {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "userdata ({})", self.type_name())
	}
}


impl Hash for UserData {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(self.0.deref() as *const UserDataInner as usize).hash(state)
	}
}
