//! S-expression helpers shared by config loading, replay scripts and
//! status reporting.
//!
//! Plists are walked cons-by-cons.  Both `Value::Keyword("key")` (elisp
//! parser) and `Value::Symbol(":key")` (default parser) forms are accepted.

use lexpr::Value;

/// `t` / `nil` for a boolean.
pub fn bool_sexp(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote and escape a string.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

/// Whether `car` is the keyword `key` in either parser form.
fn is_keyword(car: &Value, key: &str) -> bool {
    match car {
        Value::Keyword(k) => k.as_ref() == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// Raw value following `:key` in a plist.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                if is_keyword(pair.car(), key) {
                    return match pair.cdr() {
                        Value::Cons(next) => Some(next.car()),
                        _ => None,
                    };
                }
                current = pair.cdr();
            }
            _ => return None,
        }
    }
}

/// Extract a keyword value from a plist as a string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(atom_string(val))
}

/// Render an atom the way plist consumers expect: keywords and symbols
/// without their colon, strings unquoted, booleans as `t`/`nil`.
pub fn atom_string(val: &Value) -> String {
    match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => bool_sexp(*b).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    }
}

/// Extract an integer value from a plist.
pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a floating-point value from a plist.
pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_value(value, key).and_then(number)
}

/// Extract a string value from a plist.
pub fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a boolean value from a plist.
/// Treats "nil" as false, anything else as true.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil" && s != "#f" && s != "false")
}

/// Numeric value of an atom, accepting integers and floats.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Elements of a proper list (non-recursive, unlike a flatten).
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    items
}

/// Head symbol of a command form like `(mouse-down 10 20)`.
pub fn head_symbol(value: &Value) -> Option<&str> {
    match value {
        Value::Cons(pair) => pair.car().as_symbol(),
        _ => None,
    }
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        lexpr::from_str(s).unwrap()
    }

    #[test]
    fn test_get_keyword_symbol_form() {
        let v = parse("(:variant memory :pairs 3)");
        assert_eq!(get_keyword(&v, "variant").as_deref(), Some("memory"));
        assert_eq!(get_int(&v, "pairs"), Some(3));
        assert_eq!(get_keyword(&v, "missing"), None);
    }

    #[test]
    fn test_get_float_accepts_integers() {
        let v = parse("(:alpha 0.25 :hold-ms 1500)");
        assert_eq!(get_float(&v, "alpha"), Some(0.25));
        assert_eq!(get_float(&v, "hold-ms"), Some(1500.0));
    }

    #[test]
    fn test_get_bool() {
        let v = parse("(:mirror nil :depth t)");
        assert_eq!(get_bool(&v, "mirror"), Some(false));
        assert_eq!(get_bool(&v, "depth"), Some(true));
    }

    #[test]
    fn test_get_string_unquotes() {
        let v = parse("(:value \"cat\")");
        assert_eq!(get_string(&v, "value").as_deref(), Some("cat"));
    }

    #[test]
    fn test_get_value_nested_list() {
        let v = parse("(:words (\"I\" \"see\") :n 1)");
        let words = get_value(&v, "words").unwrap();
        assert_eq!(list_items(words).len(), 2);
    }

    #[test]
    fn test_key_at_end_has_no_value() {
        let v = parse("(:a 1 :b)");
        assert!(get_value(&v, "b").is_none());
    }

    #[test]
    fn test_head_symbol() {
        let v = parse("(mouse-down 10 20)");
        assert_eq!(head_symbol(&v), Some("mouse-down"));
        assert_eq!(list_items(&v).len(), 3);
    }

    #[test]
    fn test_escape_and_quote() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(escape_string("c:\\x"), "c:\\\\x");
    }

    #[test]
    fn test_format_event() {
        let e = format_event("pinch-start", &[("x", "10.0"), ("y", "20.0")]);
        assert_eq!(e, "(:type :event :event :pinch-start :x 10.0 :y 20.0)");
    }
}
