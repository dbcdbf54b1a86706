use std::{
	cmp::Ordering,
	hash::{Hash, Hasher},
	ops::{Add, Sub, Mul, Div, Rem, Neg},
};

use gc::{Finalize, Trace};


/// The Lua number type, a IEEE-754 double.
/// This type supports full ordering and hashing.
/// NaN is lower and different than every other value, including itself, but the hash is
/// the same for all NaN values.
#[derive(Debug, Default, Clone)]
#[derive(Trace, Finalize)]
pub struct Float(pub f64);


impl Float {
	/// Shallow copy.
	pub fn copy(&self) -> Self {
		Self(self.0)
	}


	/// Check if the float is not a number.
	pub fn is_nan(&self) -> bool {
		self.0.is_nan()
	}


	/// Check if the float denotes an integer value.
	pub fn is_integer(&self) -> bool {
		self.0.fract() == 0.0 && self.0.is_finite()
	}


	/// The modulo operation, with the result following the sign of the divisor.
	/// This is Lua's floored remainder, not the truncated remainder of IEEE-754.
	pub fn modulo(&self, other: &Self) -> Self {
		let result = self.0 % other.0;

		if result != 0.0 && (result < 0.0) != (other.0 < 0.0) {
			Self(result + other.0)
		} else {
			Self(result)
		}
	}


	/// Format the float the way Lua does (%.14g): up to 14 significant digits, preferring
	/// plain notation for reasonably sized exponents.
	pub fn fmt_lua(&self) -> String {
		let value = self.0;

		if value.is_nan() {
			return "nan".into();
		}

		if value.is_infinite() {
			return if value < 0.0 { "-inf".into() } else { "inf".into() };
		}

		// Round to 14 significant digits to learn the decimal exponent.
		let formatted = format!("{:.13e}", value);

		let (mantissa, exponent) = formatted
			.split_once('e')
			.expect("exponential format produced no exponent");

		let exponent: i32 = exponent
			.parse()
			.expect("exponential format produced an invalid exponent");

		if (-4 .. 14).contains(&exponent) {
			// Plain notation, with enough decimals for 14 significant digits.
			let decimals = (13 - exponent).max(0) as usize;
			let mut result = format!("{:.*}", decimals, value);

			if result.contains('.') {
				result.truncate(result.trim_end_matches('0').trim_end_matches('.').len());
			}

			result
		} else {
			let mantissa = mantissa
				.trim_end_matches('0')
				.trim_end_matches('.');

			format!(
				"{}e{}{:02}",
				mantissa,
				if exponent < 0 { "-" } else { "+" },
				exponent.abs()
			)
		}
	}
}


impl PartialEq for Float {
	fn eq(&self, other: &Self) -> bool {
		!self.is_nan()
			&& !other.is_nan()
			&& self.0 == other.0
	}
}


impl Eq for Float { }


impl PartialOrd for Float {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}


impl Ord for Float {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self.is_nan(), other.is_nan()) {
			(true, _) => Ordering::Less,
			(false, true) => Ordering::Greater,
			(false, false) => self.0
				.partial_cmp(&other.0)
				.expect("non-nan float comparison failed"),
		}
	}
}


impl Hash for Float {
	fn hash<H: Hasher>(&self, state: &mut H) {
		let float =
			if self.is_nan() {
				f64::NAN // Make sure that the hash equals for all NaN values.
			} else {
				self.0
			};

		float.to_bits().hash(state)
	}
}


impl From<f64> for Float {
	fn from(f: f64) -> Self {
		Self(f)
	}
}


op_impl!(Float, unary, Neg, neg);
op_impl!(Float, binary, Add, add);
op_impl!(Float, binary, Sub, sub);
op_impl!(Float, binary, Mul, mul);
op_impl!(Float, binary, Div, div);
op_impl!(Float, binary, Rem, rem);
