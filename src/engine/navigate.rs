use serde_json::Value;

pub const PATH_SEPARATOR: char = '.';

pub fn navigate<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for segment in path.split(PATH_SEPARATOR) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(parse_index(segment)?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Array index segments are plain ASCII digits; `+1` or `-0` are keys, not indexes.
pub fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment.parse::<usize>().ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<'a> {
    pub segments: Vec<String>,
    pub value: &'a Value,
}

impl Leaf<'_> {
    pub fn path(&self) -> String {
        self.segments.join(&PATH_SEPARATOR.to_string())
    }

    pub fn is_addressable(&self) -> bool {
        !self
            .segments
            .iter()
            .any(|segment| segment.contains(PATH_SEPARATOR))
    }
}

pub fn flatten(value: &Value) -> Vec<Leaf<'_>> {
    let mut leaves = Vec::new();
    flatten_into(value, &mut Vec::new(), &mut leaves);
    leaves
}

fn flatten_into<'a>(value: &'a Value, segments: &mut Vec<String>, leaves: &mut Vec<Leaf<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                segments.push(key.clone());
                flatten_into(child, segments, leaves);
                segments.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                segments.push(index.to_string());
                flatten_into(child, segments, leaves);
                segments.pop();
            }
        }
        scalar => {
            if !segments.is_empty() {
                leaves.push(Leaf {
                    segments: segments.clone(),
                    value: scalar,
                });
            }
        }
    }
}

pub fn split_path(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).collect()
}

pub fn is_covered_by(segments: &[String], roots: &[Vec<&str>]) -> bool {
    roots.iter().any(|root| {
        root.len() <= segments.len()
            && root
                .iter()
                .zip(segments)
                .all(|(expected, actual)| *expected == actual.as_str())
    })
}
