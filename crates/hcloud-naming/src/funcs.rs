//! The function catalog available to name templates.
//!
//! Every entry is a pure string primitive with Go `strings` semantics, or
//! one of the side-effect-free template builtins. Nothing here takes a
//! callback, touches I/O or reads global state. Index results are byte
//! offsets, as in Go.

use std::cmp::Ordering;

use crate::value::{Ty, Value};

pub(crate) type Impl = fn(&[Value]) -> Result<Value, String>;
pub(crate) type Check = fn(&[Ty]) -> Result<Ty, String>;

/// Upper bound on strings built by `repeat`; names are short.
const MAX_REPEAT_LEN: usize = 1 << 16;

pub(crate) enum Sig {
    /// Fixed parameter list and result type.
    Fixed(&'static [Ty], Ty),
    /// Variadic or polymorphic builtins check their own arguments.
    Custom(Check),
}

pub(crate) struct Func {
    pub name: &'static str,
    pub sig: Sig,
    pub call: Impl,
}

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Func").field("name", &self.name).finish()
    }
}

impl Func {
    /// Type-check a call, returning the result type.
    pub(crate) fn check(&self, args: &[Ty]) -> Result<Ty, String> {
        match &self.sig {
            Sig::Fixed(params, ret) => {
                if params.len() != args.len() {
                    return Err(format!(
                        "wrong number of args for {}: want {} got {}",
                        self.name,
                        params.len(),
                        args.len()
                    ));
                }
                for (idx, (param, arg)) in params.iter().zip(args).enumerate() {
                    if !param.accepts(*arg) {
                        return Err(format!(
                            "wrong type for argument {} of {}: expected {}, got {}",
                            idx + 1,
                            self.name,
                            param.name(),
                            arg.name()
                        ));
                    }
                }
                Ok(*ret)
            }
            Sig::Custom(check) => check(args).map_err(|e| format!("{}: {e}", self.name)),
        }
    }
}

/// Look up a function by template name.
pub(crate) fn lookup(name: &str) -> Option<&'static Func> {
    CATALOG.iter().find(|f| f.name == name)
}

/// Names of every function a template may call.
pub fn function_names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|f| f.name)
}

const S: &[Ty] = &[Ty::Str];
const SS: &[Ty] = &[Ty::Str, Ty::Str];
const SI: &[Ty] = &[Ty::Str, Ty::Int];
const SSS: &[Ty] = &[Ty::Str, Ty::Str, Ty::Str];
const SSI: &[Ty] = &[Ty::Str, Ty::Str, Ty::Int];
const SSSI: &[Ty] = &[Ty::Str, Ty::Str, Ty::Str, Ty::Int];
const LS: &[Ty] = &[Ty::List, Ty::Str];

macro_rules! func {
    ($name:literal, $params:expr => $ret:ident, $imp:expr) => {
        Func {
            name: $name,
            sig: Sig::Fixed($params, Ty::$ret),
            call: $imp,
        }
    };
    ($name:literal, custom $check:expr, $imp:expr) => {
        Func {
            name: $name,
            sig: Sig::Custom($check),
            call: $imp,
        }
    };
}

static CATALOG: &[Func] = &[
    // ── strings ─────────────────────────────────────────────────────
    func!("compare", SS => Int, |a| Ok(Value::Int(ordering(s(a, 0)?.cmp(s(a, 1)?))))),
    func!("contains", SS => Bool, |a| Ok(Value::Bool(s(a, 0)?.contains(s(a, 1)?)))),
    func!("containsAny", SS => Bool, |a| {
        let (hay, chars) = (s(a, 0)?, s(a, 1)?);
        Ok(Value::Bool(chars.chars().any(|c| hay.contains(c))))
    }),
    func!("containsRune", SI => Bool, |a| {
        let hay = s(a, 0)?;
        Ok(Value::Bool(rune(n(a, 1)?).is_some_and(|c| hay.contains(c))))
    }),
    func!("count", SS => Int, |a| {
        let (hay, sub) = (s(a, 0)?, s(a, 1)?);
        let count = if sub.is_empty() {
            hay.chars().count() + 1
        } else {
            hay.matches(sub).count()
        };
        Ok(Value::Int(count as i64))
    }),
    func!("equalFold", SS => Bool, |a| {
        let (x, y) = (s(a, 0)?, s(a, 1)?);
        Ok(Value::Bool(
            x.chars()
                .flat_map(char::to_lowercase)
                .eq(y.chars().flat_map(char::to_lowercase)),
        ))
    }),
    func!("fields", S => List, |a| {
        Ok(Value::List(s(a, 0)?.split_whitespace().map(str::to_string).collect()))
    }),
    func!("hasPrefix", SS => Bool, |a| Ok(Value::Bool(s(a, 0)?.starts_with(s(a, 1)?)))),
    func!("hasSuffix", SS => Bool, |a| Ok(Value::Bool(s(a, 0)?.ends_with(s(a, 1)?)))),
    func!("indexAny", SS => Int, |a| {
        let (hay, chars) = (s(a, 0)?, s(a, 1)?);
        Ok(position(hay.char_indices().find(|&(_, c)| chars.contains(c)).map(|(i, _)| i)))
    }),
    func!("indexByte", SI => Int, |a| {
        let (hay, b) = (s(a, 0)?, byte(n(a, 1)?)?);
        Ok(position(hay.bytes().position(|x| x == b)))
    }),
    func!("indexRune", SI => Int, |a| {
        let hay = s(a, 0)?;
        Ok(position(rune(n(a, 1)?).and_then(|c| hay.find(c))))
    }),
    func!("join", LS => Str, |a| Ok(Value::Str(l(a, 0)?.join(s(a, 1)?)))),
    func!("lastIndex", SS => Int, |a| Ok(position(s(a, 0)?.rfind(s(a, 1)?)))),
    func!("lastIndexAny", SS => Int, |a| {
        let (hay, chars) = (s(a, 0)?, s(a, 1)?);
        Ok(position(
            hay.char_indices().rev().find(|&(_, c)| chars.contains(c)).map(|(i, _)| i),
        ))
    }),
    func!("lastIndexByte", SI => Int, |a| {
        let (hay, b) = (s(a, 0)?, byte(n(a, 1)?)?);
        Ok(position(hay.bytes().rposition(|x| x == b)))
    }),
    func!("repeat", SI => Str, |a| {
        let (base, count) = (s(a, 0)?, n(a, 1)?);
        let count = usize::try_from(count).map_err(|_| "negative repeat count".to_string())?;
        match base.len().checked_mul(count) {
            Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::Str(base.repeat(count))),
            _ => Err(format!("repeat result exceeds {MAX_REPEAT_LEN} bytes")),
        }
    }),
    func!("replace", SSSI => Str, |a| {
        let (hay, old, new, limit) = (s(a, 0)?, s(a, 1)?, s(a, 2)?, n(a, 3)?);
        Ok(Value::Str(match usize::try_from(limit) {
            Ok(limit) => hay.replacen(old, new, limit),
            Err(_) => hay.replace(old, new),
        }))
    }),
    func!("replaceAll", SSS => Str, |a| Ok(Value::Str(s(a, 0)?.replace(s(a, 1)?, s(a, 2)?)))),
    func!("split", SS => List, |a| Ok(Value::List(gen_split(s(a, 0)?, s(a, 1)?, false, -1)))),
    func!("splitAfter", SS => List, |a| Ok(Value::List(gen_split(s(a, 0)?, s(a, 1)?, true, -1)))),
    func!("splitAfterN", SSI => List, |a| {
        Ok(Value::List(gen_split(s(a, 0)?, s(a, 1)?, true, n(a, 2)?)))
    }),
    func!("splitN", SSI => List, |a| {
        Ok(Value::List(gen_split(s(a, 0)?, s(a, 1)?, false, n(a, 2)?)))
    }),
    func!("toLower", S => Str, |a| Ok(Value::Str(s(a, 0)?.to_lowercase()))),
    // No title-case table in core; upper case matches it outside digraphs.
    func!("toTitle", S => Str, |a| Ok(Value::Str(s(a, 0)?.to_uppercase()))),
    func!("toUpper", S => Str, |a| Ok(Value::Str(s(a, 0)?.to_uppercase()))),
    // Template strings are always valid UTF-8, so there is nothing to replace.
    func!("toValidUTF8", SS => Str, |a| Ok(Value::Str(s(a, 0)?.to_string()))),
    func!("trim", SS => Str, |a| {
        let cutset = s(a, 1)?;
        Ok(Value::Str(s(a, 0)?.trim_matches(|c| cutset.contains(c)).to_string()))
    }),
    func!("trimLeft", SS => Str, |a| {
        let cutset = s(a, 1)?;
        Ok(Value::Str(s(a, 0)?.trim_start_matches(|c| cutset.contains(c)).to_string()))
    }),
    func!("trimPrefix", SS => Str, |a| {
        let hay = s(a, 0)?;
        Ok(Value::Str(hay.strip_prefix(s(a, 1)?).unwrap_or(hay).to_string()))
    }),
    func!("trimRight", SS => Str, |a| {
        let cutset = s(a, 1)?;
        Ok(Value::Str(s(a, 0)?.trim_end_matches(|c| cutset.contains(c)).to_string()))
    }),
    func!("trimSpace", S => Str, |a| Ok(Value::Str(s(a, 0)?.trim().to_string()))),
    func!("trimSuffix", SS => Str, |a| {
        let hay = s(a, 0)?;
        Ok(Value::Str(hay.strip_suffix(s(a, 1)?).unwrap_or(hay).to_string()))
    }),
    // ── builtins ────────────────────────────────────────────────────
    func!("and", custom check_logic, |a| {
        let last = a.last().ok_or_else(missing)?;
        Ok(a.iter().find(|v| !v.is_truthy()).unwrap_or(last).clone())
    }),
    func!("or", custom check_logic, |a| {
        let last = a.last().ok_or_else(missing)?;
        Ok(a.iter().find(|v| v.is_truthy()).unwrap_or(last).clone())
    }),
    func!("not", custom check_not, |a| {
        Ok(Value::Bool(!a.first().ok_or_else(missing)?.is_truthy()))
    }),
    func!("eq", custom check_eq, |a| {
        let (first, rest) = a.split_first().ok_or_else(missing)?;
        for other in rest {
            if values_equal(first, other)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }),
    func!("ne", custom check_ne, |a| {
        Ok(Value::Bool(!values_equal(arg(a, 0)?, arg(a, 1)?)?))
    }),
    func!("lt", custom check_order, |a| Ok(Value::Bool(order(a)?.is_lt()))),
    func!("le", custom check_order, |a| Ok(Value::Bool(order(a)?.is_le()))),
    func!("gt", custom check_order, |a| Ok(Value::Bool(order(a)?.is_gt()))),
    func!("ge", custom check_order, |a| Ok(Value::Bool(order(a)?.is_ge()))),
    func!("len", custom check_len, |a| match arg(a, 0)? {
        Value::Str(text) => Ok(Value::Int(text.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(format!("len of {}", other.ty().name())),
    }),
    func!("index", custom check_index, |a| {
        let idx = n(a, 1)?;
        let out_of_range = || format!("index out of range: {idx}");
        let pos = usize::try_from(idx).map_err(|_| out_of_range())?;
        match arg(a, 0)? {
            Value::List(items) => items
                .get(pos)
                .map(|item| Value::Str(item.clone()))
                .ok_or_else(out_of_range),
            Value::Str(text) => text
                .as_bytes()
                .get(pos)
                .map(|b| Value::Int(i64::from(*b)))
                .ok_or_else(out_of_range),
            other => Err(format!("can't index item of type {}", other.ty().name())),
        }
    }),
    func!("print", custom check_print, |a| Ok(Value::Str(sprint(a)))),
];

// ── argument helpers ───────────────────────────────────────────────

fn missing() -> String {
    "missing argument".to_string()
}

fn arg(args: &[Value], idx: usize) -> Result<&Value, String> {
    args.get(idx).ok_or_else(missing)
}

fn s(args: &[Value], idx: usize) -> Result<&str, String> {
    arg(args, idx)?.as_str()
}

fn n(args: &[Value], idx: usize) -> Result<i64, String> {
    arg(args, idx)?.as_int()
}

fn l(args: &[Value], idx: usize) -> Result<&[String], String> {
    arg(args, idx)?.as_list()
}

fn rune(code: i64) -> Option<char> {
    u32::try_from(code).ok().and_then(char::from_u32)
}

fn byte(code: i64) -> Result<u8, String> {
    u8::try_from(code).map_err(|_| format!("{code} overflows byte"))
}

fn position(found: Option<usize>) -> Value {
    Value::Int(found.map_or(-1, |i| i as i64))
}

fn ordering(ord: Ordering) -> i64 {
    match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Go's `genSplit`: split `s` around `sep` into at most `limit` pieces
/// (`limit < 0` means unlimited), keeping the separator when `keep_sep`.
fn gen_split(s: &str, sep: &str, keep_sep: bool, limit: i64) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    if sep.is_empty() {
        return explode(s, limit);
    }
    let limit = if limit < 0 {
        s.matches(sep).count() + 1
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    };
    let limit = limit.min(s.len() + 1);

    let save = if keep_sep { sep.len() } else { 0 };
    let mut out = Vec::with_capacity(limit);
    let mut rest = s;
    while out.len() + 1 < limit {
        let Some(m) = rest.find(sep) else { break };
        out.push(rest[..m + save].to_string());
        rest = &rest[m + sep.len()..];
    }
    out.push(rest.to_string());
    out
}

/// Split into single characters, the last piece holding the remainder.
fn explode(s: &str, limit: i64) -> Vec<String> {
    let count = s.chars().count();
    let limit = usize::try_from(limit).map_or(count, |l| l.min(count));
    let mut out = Vec::with_capacity(limit);
    let mut rest = s;
    while out.len() + 1 < limit {
        let Some(c) = rest.chars().next() else { break };
        out.push(c.to_string());
        rest = &rest[c.len_utf8()..];
    }
    if limit > 0 {
        out.push(rest.to_string());
    }
    out
}

fn values_equal(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::List(_), _) | (_, Value::List(_)) => Err("non-comparable type".to_string()),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn order(args: &[Value]) -> Result<Ordering, String> {
    match (arg(args, 0)?, arg(args, 1)?) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (x, y) if x.ty() == y.ty() => Err(format!("invalid type for comparison: {}", x.ty().name())),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

/// `fmt.Sprint`: spaces go between operands when neither is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (idx, value) in args.iter().enumerate() {
        if idx > 0 {
            let prev_is_str = matches!(args[idx - 1], Value::Str(_));
            if !prev_is_str && !matches!(value, Value::Str(_)) {
                out.push(' ');
            }
        }
        out.push_str(&value.to_string());
    }
    out
}

// ── builtin type checks ────────────────────────────────────────────

fn check_logic(args: &[Ty]) -> Result<Ty, String> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| "at least 1 arg required".to_string())?;
    Ok(if rest.iter().all(|t| t == first) {
        *first
    } else {
        Ty::Any
    })
}

fn check_not(args: &[Ty]) -> Result<Ty, String> {
    match args {
        [_] => Ok(Ty::Bool),
        _ => Err(format!("want 1 arg, got {}", args.len())),
    }
}

fn comparable(args: &[Ty], allow_bool: bool) -> Result<(), String> {
    if args.contains(&Ty::List) {
        return Err("non-comparable type []string".to_string());
    }
    if !allow_bool && args.contains(&Ty::Bool) {
        return Err("invalid type for comparison: bool".to_string());
    }
    let mut known = args.iter().filter(|t| **t != Ty::Any);
    if let Some(first) = known.next()
        && known.any(|t| t != first)
    {
        return Err("incompatible types for comparison".to_string());
    }
    Ok(())
}

fn check_eq(args: &[Ty]) -> Result<Ty, String> {
    if args.len() < 2 {
        return Err("missing argument for comparison".to_string());
    }
    comparable(args, true)?;
    Ok(Ty::Bool)
}

fn check_ne(args: &[Ty]) -> Result<Ty, String> {
    if args.len() != 2 {
        return Err(format!("want 2 args, got {}", args.len()));
    }
    comparable(args, true)?;
    Ok(Ty::Bool)
}

fn check_order(args: &[Ty]) -> Result<Ty, String> {
    if args.len() != 2 {
        return Err(format!("want 2 args, got {}", args.len()));
    }
    comparable(args, false)?;
    Ok(Ty::Bool)
}

fn check_len(args: &[Ty]) -> Result<Ty, String> {
    match args {
        [Ty::Str | Ty::List | Ty::Any] => Ok(Ty::Int),
        [other] => Err(format!("len of {}", other.name())),
        _ => Err(format!("want 1 arg, got {}", args.len())),
    }
}

fn check_index(args: &[Ty]) -> Result<Ty, String> {
    match args {
        [Ty::List, idx] if Ty::Int.accepts(*idx) => Ok(Ty::Str),
        [Ty::Str, idx] if Ty::Int.accepts(*idx) => Ok(Ty::Int),
        [Ty::Any, idx] if Ty::Int.accepts(*idx) => Ok(Ty::Any),
        [_, _] => Err("can index only a list or string with an int".to_string()),
        _ => Err(format!("want 2 args, got {}", args.len())),
    }
}

fn check_print(_args: &[Ty]) -> Result<Ty, String> {
    Ok(Ty::Str)
}
