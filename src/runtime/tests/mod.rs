use assert_matches::assert_matches;

use crate::tests::util::{assert_numbers, assert_string, eval_error, eval_values};
use super::value::Value;


// ---- Arithmetic ----

#[test]
fn test_arithmetic_matches_host_doubles() {
	assert_numbers(&eval_values("return 1 + 2, 2 * 3.5, 10 / 4, 2 ^ 10"), &[3.0, 7.0, 2.5, 1024.0]);

	// Division by zero follows IEEE-754.
	assert_numbers(&eval_values("return 1 / 0 - 1 / 0 ~= 1 / 0 - 1 / 0 and 1 or 0"), &[1.0]);
}


#[test]
fn test_division_formats_like_lua() {
	assert_string(&eval_values("return tostring(1 / 3)"), "0.33333333333333");
	assert_string(&eval_values("return tostring(10)"), "10");
	assert_string(&eval_values("return tostring(-0.5)"), "-0.5");
}


#[test]
fn test_modulo_is_floored() {
	assert_numbers(
		&eval_values("return 5 % 3, 5 % -3, -5 % 3, -5 % -3"),
		&[2.0, -1.0, 1.0, -2.0],
	);
}


#[test]
fn test_string_coercion_in_arithmetic() {
	assert_numbers(&eval_values("return '10' + 5, '2' * '3'"), &[15.0, 6.0]);
}


#[test]
fn test_unary_operators() {
	assert_numbers(&eval_values("return -3, #'hello', # {1, 2, 3}"), &[-3.0, 5.0, 3.0]);

	assert_matches!(
		&eval_values("return not nil, not false, not 0")[..],
		[ Value::Bool(true), Value::Bool(true), Value::Bool(false) ]
	);
}


// ---- Control flow ----

#[test]
fn test_if_chains() {
	let source = "
		local function classify(n)
			if n < 0 then
				return 'negative'
			elseif n == 0 then
				return 'zero'
			else
				return 'positive'
			end
		end

		return classify(-1) .. classify(0) .. classify(3)
	";

	assert_string(&eval_values(source), "negativezeropositive");
}


#[test]
fn test_while_loop() {
	let source = "
		local n = 0
		local total = 0
		while n < 10 do
			n = n + 1
			total = total + n
		end
		return total
	";

	assert_numbers(&eval_values(source), &[55.0]);
}


#[test]
fn test_repeat_until_sees_block_locals() {
	let source = "
		local n = 0
		repeat
			local done = n >= 3
			n = n + 1
		until done
		return n
	";

	assert_numbers(&eval_values(source), &[4.0]);
}


#[test]
fn test_numeric_for() {
	assert_numbers(
		&eval_values("local t = 0 for i = 1, 10 do t = t + i end return t"),
		&[55.0],
	);

	assert_numbers(
		&eval_values("local t = 0 for i = 10, 1, -2 do t = t + i end return t"),
		&[30.0],
	);

	// The loop body doesn't run when the range is empty.
	assert_numbers(
		&eval_values("local t = 0 for i = 1, 0 do t = t + 1 end return t"),
		&[0.0],
	);
}


#[test]
fn test_numeric_for_clause_errors() {
	let message = eval_error("for i = {}, 10 do end");
	assert!(message.contains("'for' initial value must be a number"), "{}", message);

	let message = eval_error("for i = 1, {} do end");
	assert!(message.contains("'for' limit must be a number"), "{}", message);

	let message = eval_error("for i = 1, 10, {} do end");
	assert!(message.contains("'for' step must be a number"), "{}", message);
}


#[test]
fn test_break() {
	let source = "
		local n = 0
		while true do
			n = n + 1
			if n == 7 then
				break
			end
		end
		return n
	";

	assert_numbers(&eval_values(source), &[7.0]);
}


#[test]
fn test_goto() {
	let source = "
		local t = 0
		for i = 1, 10 do
			if i % 2 == 0 then
				goto continue
			end
			t = t + i
			::continue::
		end
		return t
	";

	assert_numbers(&eval_values(source), &[25.0]);
}


// ---- Functions ----

#[test]
fn test_multiple_returns_and_adjustment() {
	let source = "
		local function three()
			return 1, 2, 3
		end

		local a, b, c, d = three()
		return a, b, c, d
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(a), Value::Number(b), Value::Number(c), Value::Nil ] => {
			assert_eq!((a.0, b.0, c.0), (1.0, 2.0, 3.0));
		}
	);
}


#[test]
fn test_truncation_in_expression_position() {
	let source = "
		local function three()
			return 1, 2, 3
		end

		-- Parenthesizing truncates to one value; mid-list calls yield one value.
		local a, b = (three())
		local c, d = three(), 10
		return a, b, c, d
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(a), Value::Nil, Value::Number(c), Value::Number(d) ] => {
			assert_eq!((a.0, c.0, d.0), (1.0, 1.0, 10.0));
		}
	);
}


#[test]
fn test_varargs() {
	let source = "
		local function tail(...)
			local first = ...
			return first, select('#', ...)
		end

		return tail(10, 20, 30)
	";

	assert_numbers(&eval_values(source), &[10.0, 3.0]);
}


#[test]
fn test_method_calls() {
	let source = "
		local account = { balance = 100 }

		function account:deposit(amount)
			self.balance = self.balance + amount
		end

		account:deposit(50)
		return account.balance
	";

	assert_numbers(&eval_values(source), &[150.0]);
}


#[test]
fn test_call_surfaces() {
	let source = "
		local function id(x) return x end
		return id 'str' .. id { 1 }[1]
	";

	assert_string(&eval_values(source), "str1");
}


#[test]
fn test_tail_recursion_runs_in_constant_frame_space() {
	let source = "
		local function countdown(n)
			if n == 0 then
				return 'done'
			end
			return countdown(n - 1)
		end

		return countdown(100000)
	";

	assert_string(&eval_values(source), "done");
}


#[test]
fn test_deep_non_tail_recursion_overflows_gracefully() {
	let message = eval_error(
		"
			local function down(n)
				return 1 + down(n + 1)
			end

			return down(1)
		"
	);

	assert!(message.contains("stack overflow"), "{}", message);
}


// ---- Closures and upvalues ----

#[test]
fn test_counter_closure() {
	let source = "
		local function counter()
			local n = 0
			return function ()
				n = n + 1
				return n
			end
		end

		local tick = counter()
		tick()
		tick()
		return tick()
	";

	assert_numbers(&eval_values(source), &[3.0]);
}


#[test]
fn test_loop_locals_close_per_iteration() {
	let source = "
		local t = {}
		for i = 1, 3 do
			local x = i
			t[i] = function () return x end
		end
		return t[1](), t[2](), t[3]()
	";

	assert_numbers(&eval_values(source), &[1.0, 2.0, 3.0]);
}


#[test]
fn test_sibling_closures_share_upvalues() {
	let source = "
		local function pair()
			local n = 0
			local function get() return n end
			local function bump() n = n + 1 end
			return get, bump
		end

		local get, bump = pair()
		bump()
		bump()
		return get()
	";

	assert_numbers(&eval_values(source), &[2.0]);
}


#[test]
fn test_global_access_through_env() {
	let source = "
		value = 42
		local function read()
			return value
		end
		return read()
	";

	assert_numbers(&eval_values(source), &[42.0]);
}


// ---- Tables ----

#[test]
fn test_table_constructor_styles() {
	let source = "
		local key = 'answer'
		local t = { 1, 2, three = 3, [key] = 42, 4 }
		return t[1], t[2], t[3], t.three, t.answer
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(a), Value::Number(b), Value::Number(c), Value::Number(d), Value::Number(e) ] => {
			assert_eq!((a.0, b.0, c.0, d.0, e.0), (1.0, 2.0, 4.0, 3.0, 42.0));
		}
	);
}


#[test]
fn test_table_constructor_batches() {
	// More fields than a single SetList flush.
	let mut source = String::from("local t = {");
	for i in 1 ..= 120 {
		source.push_str(&format!("{},", i));
	}
	source.push_str("} return #t, t[1], t[60], t[120]");

	assert_numbers(&eval_values(&source), &[120.0, 1.0, 60.0, 120.0]);
}


#[test]
fn test_trailing_multi_value_field() {
	let source = "
		local function three() return 1, 2, 3 end
		local t = { 0, three() }
		return #t, t[4]
	";

	assert_numbers(&eval_values(source), &[4.0, 3.0]);
}


#[test]
fn test_border_consistent_with_ipairs() {
	let source = "
		local t = {}
		t[1] = 1
		t[2] = 2
		t[4] = 4

		local count = 0
		for _ in ipairs(t) do
			count = count + 1
		end

		local border = #t
		local consistent = t[border] ~= nil and t[border + 1] == nil
		return count, consistent and 1 or 0
	";

	// ipairs stops at the first nil in sequence; the border must be internally
	// consistent with the table's contents.
	assert_numbers(&eval_values(source), &[2.0, 1.0]);
}


#[test]
fn test_nil_assignment_removes() {
	let source = "
		local t = { x = 1 }
		t.x = nil
		return t.x == nil and 1 or 0
	";

	assert_numbers(&eval_values(source), &[1.0]);
}


#[test]
fn test_pairs_iterates_everything() {
	let source = "
		local t = { 10, 20, alpha = 1, beta = 2 }
		local count, total = 0, 0
		for k, v in pairs(t) do
			count = count + 1
			total = total + v
		end
		return count, total
	";

	assert_numbers(&eval_values(source), &[4.0, 33.0]);
}


// ---- Metatables ----

#[test]
fn test_index_metamethod_table() {
	let source = "
		local defaults = { greeting = 'hello' }
		local t = setmetatable({}, { __index = defaults })
		return t.greeting
	";

	assert_string(&eval_values(source), "hello");
}


#[test]
fn test_index_metamethod_function() {
	let source = "
		local t = setmetatable({}, {
			__index = function (table, key)
				return key .. '!'
			end,
		})
		return t.hi
	";

	assert_string(&eval_values(source), "hi!");
}


#[test]
fn test_newindex_metamethod() {
	let source = "
		local log = {}
		local t = setmetatable({}, {
			__newindex = function (table, key, value)
				rawset(table, key, value)
				log[#log + 1] = key
			end,
		})

		t.a = 1
		t.a = 2 -- now a raw write, the key exists
		t.b = 3
		return #log, t.a
	";

	assert_numbers(&eval_values(source), &[2.0, 2.0]);
}


#[test]
fn test_arithmetic_metamethods() {
	let source = "
		local meta = {
			__add = function (l, r) return l.n + r.n end,
			__mul = function (l, r) return l.n * r.n end,
		}

		local a = setmetatable({ n = 6 }, meta)
		local b = setmetatable({ n = 7 }, meta)
		return a + b, a * b
	";

	assert_numbers(&eval_values(source), &[13.0, 42.0]);
}


#[test]
fn test_comparison_metamethods() {
	let source = "
		local meta = {
			__lt = function (l, r) return l.n < r.n end,
			__eq = function (l, r) return l.n == r.n end,
		}

		local a = setmetatable({ n = 1 }, meta)
		local b = setmetatable({ n = 2 }, meta)
		local c = setmetatable({ n = 1 }, meta)

		-- a <= b falls back to not (b < a).
		local le = a <= b
		return (a < b) and 1 or 0, (a == c) and 1 or 0, le and 1 or 0
	";

	assert_numbers(&eval_values(source), &[1.0, 1.0, 1.0]);
}


#[test]
fn test_call_metamethod() {
	let source = "
		local callable = setmetatable({}, {
			__call = function (self, x)
				return x * 2
			end,
		})
		return callable(21)
	";

	assert_numbers(&eval_values(source), &[42.0]);
}


#[test]
fn test_concat_and_len_metamethods() {
	let source = "
		local box = setmetatable({ value = 'hi' }, {
			__concat = function (l, r)
				local lv = type(l) == 'table' and l.value or l
				local rv = type(r) == 'table' and r.value or r
				return lv .. rv
			end,
			__len = function (self) return 99 end,
		})

		return 'say: ' .. box, #box
	";

	let values = eval_values(source);
	assert_matches!(
		&values[..],
		[ Value::String(s), Value::Number(n) ] => {
			assert_eq!(s.as_bytes(), b"say: hi");
			assert_eq!(n.0, 99.0);
		}
	);
}


// ---- Errors and protected calls ----

#[test]
fn test_pcall_shapes() {
	let source = "
		local ok, err = pcall(function () error('x') end)
		local ok2, a, b = pcall(function () return 1, 2 end)
		return ok and 1 or 0, err, ok2 and 1 or 0, a, b
	";

	assert_matches!(
		&eval_values(source)[..],
		[
			Value::Number(failed),
			Value::String(message),
			Value::Number(ok),
			Value::Number(a),
			Value::Number(b),
		] => {
			assert_eq!(failed.0, 0.0);
			assert!(message.as_bytes().ends_with(b": x"));
			assert!(message.as_bytes().starts_with(b"<test>"));
			assert_eq!((ok.0, a.0, b.0), (1.0, 1.0, 2.0));
		}
	);
}


#[test]
fn test_error_with_non_string_value() {
	let source = "
		local ok, err = pcall(function () error({ code = 42 }) end)
		return ok and 1 or 0, err.code
	";

	assert_numbers(&eval_values(source), &[0.0, 42.0]);
}


#[test]
fn test_xpcall_handler() {
	let source = "
		local ok, result = xpcall(
			function () error('inner') end,
			function (message) return 'handled: ' .. message end
		)
		return ok and 1 or 0, result
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(ok), Value::String(result) ] => {
			assert_eq!(ok.0, 0.0);
			assert!(result.as_bytes().starts_with(b"handled: "));
		}
	);
}


#[test]
fn test_nested_pcall() {
	let source = "
		local ok, ok2, err = pcall(pcall, function () error('deep') end, nil)
		return ok and 1 or 0, ok2 and 1 or 0, err
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(outer), Value::Number(inner), Value::String(_) ] => {
			assert_eq!((outer.0, inner.0), (1.0, 0.0));
		}
	);
}


#[test]
fn test_runtime_type_errors() {
	let message = eval_error("return nil + 1");
	assert!(message.contains("attempt to perform arithmetic on a nil value"), "{}", message);

	let message = eval_error("return {} < {}");
	assert!(message.contains("attempt to compare"), "{}", message);

	let message = eval_error("local x; x()");
	assert!(message.contains("attempt to call a nil value"), "{}", message);

	let message = eval_error("local x; return x.field");
	assert!(message.contains("attempt to index a nil value"), "{}", message);

	let message = eval_error("return {} .. ''");
	assert!(message.contains("attempt to concatenate a table value"), "{}", message);
}


#[test]
fn test_assert() {
	assert_numbers(&eval_values("return assert(41 + 1)"), &[42.0]);

	let message = eval_error("assert(false)");
	assert!(message.contains("assertion failed!"), "{}", message);

	let message = eval_error("assert(nil, 'custom reason')");
	assert!(message.contains("custom reason"), "{}", message);
}


// ---- Coroutines ----

#[test]
fn test_coroutine_roundtrip() {
	let source = "
		local co = coroutine.create(function ()
			coroutine.yield('a', 1)
			return 'b', 2
		end)

		local ok1, x1, y1 = coroutine.resume(co)
		local ok2, x2, y2 = coroutine.resume(co)
		local status = coroutine.status(co)

		return ok1 and 1 or 0, x1, y1, ok2 and 1 or 0, x2, y2, status
	";

	assert_matches!(
		&eval_values(source)[..],
		[
			Value::Number(ok1), Value::String(x1), Value::Number(y1),
			Value::Number(ok2), Value::String(x2), Value::Number(y2),
			Value::String(status),
		] => {
			assert_eq!(ok1.0, 1.0);
			assert_eq!(x1.as_bytes(), b"a");
			assert_eq!(y1.0, 1.0);
			assert_eq!(ok2.0, 1.0);
			assert_eq!(x2.as_bytes(), b"b");
			assert_eq!(y2.0, 2.0);
			assert_eq!(status.as_bytes(), b"dead");
		}
	);
}


#[test]
fn test_resume_arguments_become_yield_results() {
	let source = "
		local co = coroutine.create(function (first)
			local second = coroutine.yield(first * 2)
			return second + 1
		end)

		local _, doubled = coroutine.resume(co, 10)
		local _, final = coroutine.resume(co, 100)
		return doubled, final
	";

	assert_numbers(&eval_values(source), &[20.0, 101.0]);
}


#[test]
fn test_resume_dead_coroutine() {
	let source = "
		local co = coroutine.create(function () end)
		coroutine.resume(co)
		local ok, message = coroutine.resume(co)
		return ok and 1 or 0, message
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(ok), Value::String(message) ] => {
			assert_eq!(ok.0, 0.0);
			assert_eq!(message.as_bytes(), b"cannot resume dead coroutine");
		}
	);
}


#[test]
fn test_coroutine_error_is_protected() {
	let source = "
		local co = coroutine.create(function ()
			error('inside')
		end)

		local ok, message = coroutine.resume(co)
		return ok and 1 or 0, message, coroutine.status(co)
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::Number(ok), Value::String(message), Value::String(status) ] => {
			assert_eq!(ok.0, 0.0);
			assert!(message.as_bytes().ends_with(b": inside"));
			assert_eq!(status.as_bytes(), b"dead");
		}
	);
}


#[test]
fn test_coroutine_wrap() {
	let source = "
		local generate = coroutine.wrap(function ()
			for i = 1, 3 do
				coroutine.yield(i)
			end
		end)

		return generate() + generate() + generate()
	";

	assert_numbers(&eval_values(source), &[6.0]);
}


#[test]
fn test_yield_from_main_fails() {
	let message = eval_error("coroutine.yield(1)");
	assert!(message.contains("outside a coroutine"), "{}", message);
}


#[test]
fn test_nested_coroutines() {
	let source = "
		local inner = coroutine.create(function ()
			coroutine.yield('inner value')
		end)

		local outer = coroutine.create(function ()
			local _, value = coroutine.resume(inner)
			coroutine.yield(value)
		end)

		local _, value = coroutine.resume(outer)
		return value, coroutine.status(outer)
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::String(value), Value::String(status) ] => {
			assert_eq!(value.as_bytes(), b"inner value");
			assert_eq!(status.as_bytes(), b"suspended");
		}
	);
}


#[test]
fn test_yield_across_metamethod() {
	// A metamethod is an ordinary frame on the coroutine's stack, so it may yield.
	let source = "
		local t = setmetatable({}, {
			__index = function (table, key)
				return coroutine.yield(key)
			end,
		})

		local co = coroutine.create(function ()
			return t.field
		end)

		local _, key = coroutine.resume(co)
		local _, result = coroutine.resume(co, 'answered')
		return key, result
	";

	assert_matches!(
		&eval_values(source)[..],
		[ Value::String(key), Value::String(result) ] => {
			assert_eq!(key.as_bytes(), b"field");
			assert_eq!(result.as_bytes(), b"answered");
		}
	);
}


// ---- Strings and values ----

#[test]
fn test_concat_chain() {
	assert_string(&eval_values("return 'a' .. 'b' .. 1 .. 2"), "ab12");
}


#[test]
fn test_string_comparison() {
	assert_numbers(
		&eval_values("return ('abc' < 'abd') and 1 or 0, ('b' < 'ab') and 1 or 0"),
		&[1.0, 0.0],
	);
}


#[test]
fn test_equality_semantics() {
	let source = "
		local t = {}
		local same = t
		return (t == same) and 1 or 0,
			({} == {}) and 1 or 0,
			('a' == 'a') and 1 or 0,
			(1 == 1.0) and 1 or 0,
			(0/0 == 0/0) and 1 or 0
	";

	assert_numbers(&eval_values(source), &[1.0, 0.0, 1.0, 1.0, 0.0]);
}


#[test]
fn test_tostring_and_tonumber() {
	assert_string(&eval_values("return tostring(nil) .. '/' .. tostring(true)"), "nil/true");

	assert_numbers(
		&eval_values("return tonumber('42'), tonumber('0x10'), tonumber('ff', 16)"),
		&[42.0, 16.0, 255.0],
	);

	assert_matches!(
		&eval_values("return tonumber('not a number')")[..],
		[ Value::Nil ]
	);
}


#[test]
fn test_type_function() {
	let source = "
		return type(nil), type(true), type(1), type('s'), type({}), type(print)
	";

	let values = eval_values(source);
	let names: Vec<&[u8]> = values
		.iter()
		.map(|value| match value {
			Value::String(string) => string.as_bytes(),
			other => panic!("expected string, got {}", other.type_name()),
		})
		.collect();

	assert_eq!(
		names,
		[
			b"nil".as_ref(),
			b"boolean".as_ref(),
			b"number".as_ref(),
			b"string".as_ref(),
			b"table".as_ref(),
			b"function".as_ref(),
		]
	);
}


// ---- Determinism ----

#[test]
fn test_compilation_is_deterministic() {
	use crate::compiler;
	use crate::symbol::Interner;
	use crate::syntax::{Analysis, Source};
	use std::path::Path;

	let source_text = "
		local function fib(n)
			if n < 2 then return n end
			return fib(n - 1) + fib(n - 2)
		end

		local t = { fib(10), x = 'y', [1 + 1] = {} }
		for k, v in pairs(t) do print(k, v) end
		return #t
	";

	let compile = || {
		let mut interner = Interner::new();
		let source = Source {
			path: Path::new("<test>").into(),
			contents: source_text.as_bytes().into(),
		};
		let chunk_name = interner.get_or_intern(b"<test>");
		let analysis = Analysis::analyze(&source, chunk_name, &mut interner).unwrap();
		compiler::compile(&analysis.ast, &mut interner).unwrap()
	};

	let first = compile();
	let second = compile();

	fn assert_chunks_equal(a: &crate::bytecode::Chunk, b: &crate::bytecode::Chunk) {
		assert_eq!(a.code.as_ref(), b.code.as_ref());
		assert_eq!(a.constants.as_ref(), b.constants.as_ref());
		assert_eq!(a.max_stack, b.max_stack);
		assert_eq!(a.protos.len(), b.protos.len());

		for (a, b) in a.protos.iter().zip(b.protos.iter()) {
			assert_chunks_equal(a, b);
		}
	}

	assert_chunks_equal(&first, &second);
}
