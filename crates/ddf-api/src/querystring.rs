//! Decodes a query-endpoint's query string into the JSON query object
//! the compiler expects. Two encodings are accepted: Rails/PHP-style
//! bracket notation (`select[key][]=geo&select[value][]=population`)
//! tried first, falling back to a single percent-encoded JSON blob.

use serde_json::{Map, Value};

pub fn decode(raw_query: &str) -> Option<Value> {
    if raw_query.is_empty() {
        return None;
    }
    parse_bracket_notation(raw_query).or_else(|| parse_json_blob(raw_query))
}

fn parse_json_blob(raw_query: &str) -> Option<Value> {
    let decoded = percent_decode(raw_query);
    serde_json::from_str(&decoded).ok()
}

fn parse_bracket_notation(raw_query: &str) -> Option<Value> {
    let mut root = Value::Object(Map::new());
    let mut saw_bracket = false;

    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(raw_key);
        let value_str = percent_decode(raw_value);
        if key.contains('[') {
            saw_bracket = true;
        }
        let segments = split_segments(&key);
        if segments.is_empty() {
            return None;
        }
        insert_path(&mut root, &segments, coerce_scalar(&value_str));
    }

    if saw_bracket { Some(root) } else { None }
}

enum Segment {
    Key(String),
    Push,
}

fn split_segments(key: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = key.char_indices().peekable();
    let mut current = String::new();

    while let Some((_, c)) = chars.next() {
        match c {
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                for (_, c2) in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    inner.push(c2);
                }
                if inner.is_empty() {
                    segments.push(Segment::Push);
                } else {
                    segments.push(Segment::Key(inner));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(Segment::Key(current));
    }
    segments
}

/// `node` is always already the container variant `segments[0]` expects,
/// by construction of [`placeholder_for`] at each prior insertion.
fn insert_path(node: &mut Value, segments: &[Segment], value: Value) {
    match segments.split_first() {
        None => *node = value,
        Some((Segment::Key(k), rest)) => {
            let map = node.as_object_mut().expect("key segment implies an object container");
            let entry = map.entry(k.clone()).or_insert_with(|| placeholder_for(rest));
            insert_path(entry, rest, value);
        }
        Some((Segment::Push, rest)) => {
            let mut child = placeholder_for(rest);
            insert_path(&mut child, rest, value);
            let array = node.as_array_mut().expect("push segment implies an array container");
            array.push(child);
        }
    }
}

fn placeholder_for(rest: &[Segment]) -> Value {
    match rest.first() {
        Some(Segment::Push) => Value::Array(Vec::new()),
        Some(Segment::Key(_)) | None => Value::Object(Map::new()),
    }
}

fn coerce_scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(raw.to_string()),
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
                out.push(bytes[i]);
                i += 1;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bracket_notation_into_nested_object() {
        let value = decode("select%5Bkey%5D%5B%5D=geo&select%5Bvalue%5D%5B%5D=population&from=datapoints").unwrap();
        assert_eq!(value["select"]["key"][0], Value::String("geo".to_string()));
        assert_eq!(value["select"]["value"][0], Value::String("population".to_string()));
        assert_eq!(value["from"], Value::String("datapoints".to_string()));
    }

    #[test]
    fn falls_back_to_json_blob_when_no_brackets() {
        let raw = "%7B%22select%22%3A%7B%22key%22%3A%5B%22geo%22%5D%7D%7D";
        let value = decode(raw).unwrap();
        assert_eq!(value["select"]["key"][0], Value::String("geo".to_string()));
    }

    #[test]
    fn numeric_values_are_coerced() {
        let value = decode("where%5Btime%5D=2020").unwrap();
        assert_eq!(value["where"]["time"], Value::from(2020));
    }
}
