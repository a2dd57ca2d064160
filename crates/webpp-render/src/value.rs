//! Scalar values stored in the render context.
//!
//! A [`Value`] is a tagged sum over the host scalars plus a lazily
//! evaluated variant. Values expose three operations used by the
//! renderer: [`output`](Value::output) (canonical text),
//! [`format`](Value::format) (printf-style) and
//! [`is_true`](Value::is_true) (fails for anything but a boolean).

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::error::{Error, Result};

/// A render-context scalar.
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    String(String),
    /// A deferred computation, evaluated at most once on first access.
    Lazy(Lazy),
}

/// A callable evaluated on first access; the result is cached.
/// Evaluation errors are not cached and re-propagate on every access.
pub struct Lazy {
    thunk: Box<dyn Fn() -> Result<Value>>,
    cell: OnceCell<Box<Value>>,
}

impl Lazy {
    pub fn new(thunk: impl Fn() -> Result<Value> + 'static) -> Self {
        Self {
            thunk: Box::new(thunk),
            cell: OnceCell::new(),
        }
    }

    fn eval(&self) -> Result<&Value> {
        self.cell
            .get_or_try_init(|| (self.thunk)().map(Box::new))
            .map(|boxed| &**boxed)
    }
}

impl Value {
    /// Explicit string constructor, for callers holding a `Display`able
    /// that should be stored as text.
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Wrap a fallible thunk as a lazy value.
    pub fn lazy(thunk: impl Fn() -> Result<Value> + 'static) -> Self {
        Value::Lazy(Lazy::new(thunk))
    }

    /// Canonical text form. Booleans render as `1`/`0`, reals use the
    /// shortest round-trip representation.
    pub fn output(&self) -> Result<String> {
        match self {
            Value::Int(v) => Ok(v.to_string()),
            Value::Real(v) => Ok(v.to_string()),
            Value::Bool(true) => Ok("1".to_string()),
            Value::Bool(false) => Ok("0".to_string()),
            Value::String(v) => Ok(v.clone()),
            Value::Lazy(lazy) => lazy.eval()?.output(),
        }
    }

    /// Printf-style formatting: `%[flags][width][.precision]conv` with
    /// the `d i u x X o f F e E g G s %` conversions.
    pub fn format(&self, fmt: &str) -> Result<String> {
        match self {
            Value::Lazy(lazy) => lazy.eval()?.format(fmt),
            other => format_with(fmt, other),
        }
    }

    /// The boolean value; fails for every non-boolean variant.
    pub fn is_true(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::Lazy(lazy) => lazy.eval()?.is_true(),
            other => Err(Error::new(format!(
                "is_true(): '{}' is not a boolean",
                other.output()?
            ))),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Real(v) => f.debug_tuple("Real").field(v).finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::String(v) => f.debug_tuple("String").field(v).finish(),
            Value::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
    conv: char,
}

/// Apply a printf-style format string to a single value. The first
/// conversion consumes the value; further conversions are an error.
fn format_with(fmt: &str, value: &Value) -> Result<String> {
    let mut out = String::new();
    let mut substituted = false;

    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        if substituted {
            return Err(Error::new(format!(
                "format '{}' expects a single argument",
                fmt
            )));
        }
        let spec = parse_spec(fmt, &mut chars)?;
        out.push_str(&apply_spec(&spec, value)?);
        substituted = true;
    }

    Ok(out)
}

fn parse_spec(fmt: &str, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Spec> {
    let mut spec = Spec {
        minus: false,
        plus: false,
        zero: false,
        space: false,
        width: 0,
        precision: None,
        conv: '\0',
    };

    while let Some(&c) = chars.peek() {
        match c {
            '-' => spec.minus = true,
            '+' => spec.plus = true,
            '0' => spec.zero = true,
            ' ' => spec.space = true,
            '#' => {}
            _ => break,
        }
        chars.next();
    }

    while let Some(&c) = chars.peek() {
        if let Some(digit) = c.to_digit(10) {
            spec.width = spec.width * 10 + digit as usize;
            chars.next();
        } else {
            break;
        }
    }

    if chars.peek() == Some(&'.') {
        chars.next();
        let mut precision = 0usize;
        while let Some(&c) = chars.peek() {
            if let Some(digit) = c.to_digit(10) {
                precision = precision * 10 + digit as usize;
                chars.next();
            } else {
                break;
            }
        }
        spec.precision = Some(precision);
    }

    // Length modifiers carry no meaning here.
    while let Some(&c) = chars.peek() {
        if matches!(c, 'l' | 'h' | 'z' | 'j' | 't' | 'L') {
            chars.next();
        } else {
            break;
        }
    }

    spec.conv = chars
        .next()
        .ok_or_else(|| Error::new(format!("format '{}': missing conversion", fmt)))?;
    Ok(spec)
}

fn apply_spec(spec: &Spec, value: &Value) -> Result<String> {
    match spec.conv {
        'd' | 'i' | 'u' => Ok(pad_number(int_value(value, spec.conv)?.to_string(), spec)),
        'x' => Ok(pad_number(
            format!("{:x}", int_value(value, spec.conv)?),
            spec,
        )),
        'X' => Ok(pad_number(
            format!("{:X}", int_value(value, spec.conv)?),
            spec,
        )),
        'o' => Ok(pad_number(
            format!("{:o}", int_value(value, spec.conv)?),
            spec,
        )),
        'f' | 'F' => {
            let x = real_value(value, spec.conv)?;
            let precision = spec.precision.unwrap_or(6);
            Ok(pad_number(format!("{:.*}", precision, x), spec))
        }
        'e' | 'E' => {
            let x = real_value(value, spec.conv)?;
            let precision = spec.precision.unwrap_or(6);
            let mut s = format!("{:.*e}", precision, x);
            if spec.conv == 'E' {
                s = s.to_uppercase();
            }
            Ok(pad_number(s, spec))
        }
        'g' | 'G' => {
            let x = real_value(value, spec.conv)?;
            Ok(pad_number(x.to_string(), spec))
        }
        's' => {
            let mut s = value.output()?;
            if let Some(precision) = spec.precision {
                if let Some((cut, _)) = s.char_indices().nth(precision) {
                    s.truncate(cut);
                }
            }
            Ok(pad_text(s, spec))
        }
        other => Err(Error::new(format!(
            "unsupported format conversion '%{}'",
            other
        ))),
    }
}

fn int_value(value: &Value, conv: char) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Bool(v) => Ok(i64::from(*v)),
        Value::Real(v) => Ok(*v as i64),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| Error::new(format!("bad cast '{}' to integer in '%{}'", s, conv))),
        // `Value::format` resolves lazy values before formatting
        Value::Lazy(lazy) => int_value(lazy.eval()?, conv),
    }
}

fn real_value(value: &Value, conv: char) -> Result<f64> {
    match value {
        Value::Real(v) => Ok(*v),
        Value::Int(v) => Ok(*v as f64),
        Value::Bool(v) => Ok(f64::from(u8::from(*v))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| Error::new(format!("bad cast '{}' to real in '%{}'", s, conv))),
        Value::Lazy(lazy) => real_value(lazy.eval()?, conv),
    }
}

fn pad_number(mut core: String, spec: &Spec) -> String {
    if spec.plus && !core.starts_with('-') {
        core.insert(0, '+');
    } else if spec.space && !core.starts_with('-') {
        core.insert(0, ' ');
    }

    let len = core.chars().count();
    if len >= spec.width {
        return core;
    }
    let fill = spec.width - len;

    if spec.minus {
        core.extend(std::iter::repeat(' ').take(fill));
        core
    } else if spec.zero {
        // zero padding goes after the sign
        let sign_len = if core.starts_with(['-', '+', ' ']) { 1 } else { 0 };
        let zeros: String = std::iter::repeat('0').take(fill).collect();
        core.insert_str(sign_len, &zeros);
        core
    } else {
        let mut padded: String = std::iter::repeat(' ').take(fill).collect();
        padded.push_str(&core);
        padded
    }
}

fn pad_text(core: String, spec: &Spec) -> String {
    let len = core.chars().count();
    if len >= spec.width {
        return core;
    }
    let fill = spec.width - len;
    if spec.minus {
        let mut out = core;
        out.extend(std::iter::repeat(' ').take(fill));
        out
    } else {
        let mut out: String = std::iter::repeat(' ').take(fill).collect();
        out.push_str(&core);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn output_of_scalars() {
        assert_eq!(Value::from(42).output().unwrap(), "42");
        assert_eq!(Value::from(true).output().unwrap(), "1");
        assert_eq!(Value::from(false).output().unwrap(), "0");
        assert_eq!(Value::from("abuser<>").output().unwrap(), "abuser<>");
        assert_eq!(
            Value::from(std::f64::consts::PI).output().unwrap(),
            "3.141592653589793"
        );
        assert_eq!(Value::from(3.0).output().unwrap(), "3");
    }

    #[test]
    fn is_true_only_on_booleans() {
        assert!(Value::from(true).is_true().unwrap());
        assert!(!Value::from(false).is_true().unwrap());

        let err = Value::from(42).is_true().unwrap_err();
        assert_eq!(err.message(), "is_true(): '42' is not a boolean");
    }

    #[test]
    fn format_floats() {
        assert_eq!(Value::from(3.1415).format("%.3f").unwrap(), "3.142");
        assert_eq!(
            Value::from(std::f64::consts::PI).format("%.2f").unwrap(),
            "3.14"
        );
        assert_eq!(
            Value::from(std::f64::consts::PI).format("%03.4f").unwrap(),
            "3.1416"
        );
        assert_eq!(Value::from(0.5).format("%08.3f").unwrap(), "0000.500");
        assert_eq!(Value::from(-0.5).format("%08.3f").unwrap(), "-000.500");
    }

    #[test]
    fn format_integers_and_strings() {
        assert_eq!(Value::from(42).format("%d").unwrap(), "42");
        assert_eq!(Value::from(42).format("%5d").unwrap(), "   42");
        assert_eq!(Value::from(42).format("%-5d|").unwrap(), "42   |");
        assert_eq!(Value::from(42).format("%05d").unwrap(), "00042");
        assert_eq!(Value::from(255).format("%x").unwrap(), "ff");
        assert_eq!(Value::from(true).format("%d").unwrap(), "1");
        assert_eq!(Value::from("abc").format("[%s]").unwrap(), "[abc]");
        assert_eq!(Value::from("abcdef").format("%.3s").unwrap(), "abc");
        assert_eq!(Value::from(42).format("100%%").unwrap(), "100%");
    }

    #[test]
    fn format_embedded_in_literal_text() {
        assert_eq!(
            Value::from(0.7853981633974483).format("dec(%03.4f)").unwrap(),
            "dec(0.7854)"
        );
    }

    #[test]
    fn format_rejects_second_conversion() {
        let err = Value::from(1).format("%d %d").unwrap_err();
        assert!(err.message().contains("single argument"));
    }

    #[test]
    fn lazy_evaluates_once_and_caches() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let value = Value::lazy(move || {
            counter.set(counter.get() + 1);
            Ok(Value::from(42))
        });

        assert_eq!(value.output().unwrap(), "42");
        assert_eq!(value.format("%d").unwrap(), "42");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn lazy_bool_delegates_is_true() {
        let value = Value::lazy(|| Ok(Value::from(true)));
        assert!(value.is_true().unwrap());
        assert_eq!(value.format("%d").unwrap(), "1");
    }

    #[test]
    fn lazy_errors_are_not_cached() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let value = Value::lazy(move || {
            counter.set(counter.get() + 1);
            Err(Error::new("backend unavailable"))
        });

        assert!(value.output().is_err());
        assert!(value.output().is_err());
        assert_eq!(calls.get(), 2);
    }
}
