//! Accessor paths into a record's JSON value.
//!
//! Paths use the familiar dotted/bracketed notation:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `a.b` | nested property |
//! | `a[0]` / `a.0` | array element (or key `"0"` on an object) |
//! | `a["b.c"]` / `a['b.c']` | property whose name contains separators |
//!
//! Reads never fail on missing segments, they resolve to `None`. Writes
//! materialize whatever containers the path needs.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How far past the end of an array a write may reach.
const MAX_ARRAY_PAD: usize = 1 << 16;

/// Error type for path parsing and path writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("empty segment at position {0}")]
    EmptySegment(usize),

    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),

    #[error("unterminated quote starting at position {0}")]
    UnterminatedQuote(usize),

    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("segment '{0}' cannot index an array")]
    KeyOnArray(String),

    #[error("index {index} is too far past the end of an array of length {len}")]
    IndexTooLarge { index: usize, len: usize },

    #[error("cannot descend into a {0}")]
    NotAContainer(&'static str),
}

/// A single step in a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The array position this segment addresses, if any.
    ///
    /// Numeric keys count too, so `a["0"]` reaches the first element of an array.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => parse_index(k),
        }
    }

    /// The object property name this segment addresses.
    pub fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }

    fn lookup_key(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Segment::Key(k) => std::borrow::Cow::Borrowed(k.as_str()),
            Segment::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // "01" is a key, not an index
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// A parsed, non-empty accessor path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        s.parse()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        loop {
            if chars[i] == '[' {
                let (segment, next) = parse_bracket(&chars, i)?;
                segments.push(segment);
                i = next;
            } else {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                if i == start {
                    return Err(PathError::EmptySegment(start));
                }
                let name: String = chars[start..i].iter().collect();
                segments.push(match parse_index(&name) {
                    Some(idx) => Segment::Index(idx),
                    None => Segment::Key(name),
                });
            }

            if i >= chars.len() {
                break;
            }
            match chars[i] {
                '.' => {
                    i += 1;
                    if i >= chars.len() {
                        return Err(PathError::EmptySegment(i));
                    }
                }
                '[' => {}
                c => return Err(PathError::UnexpectedChar(c, i)),
            }
        }

        Ok(Path { segments })
    }
}

/// Parse `[...]` starting at `start`; returns the segment and the position after `]`.
fn parse_bracket(chars: &[char], start: usize) -> Result<(Segment, usize), PathError> {
    let mut i = start + 1;
    match chars.get(i) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            let quote_start = i;
            i += 1;
            let mut name = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(PathError::UnterminatedQuote(quote_start)),
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or(PathError::UnterminatedQuote(quote_start))?;
                        name.push(*escaped);
                        i += 2;
                    }
                    Some(&c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        name.push(c);
                        i += 1;
                    }
                }
            }
            match chars.get(i) {
                Some(']') => Ok((Segment::Key(name), i + 1)),
                Some(&c) => Err(PathError::UnexpectedChar(c, i)),
                None => Err(PathError::UnclosedBracket(start)),
            }
        }
        _ => {
            let content_start = i;
            while i < chars.len() && chars[i] != ']' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(PathError::UnclosedBracket(start));
            }
            if i == content_start {
                return Err(PathError::EmptySegment(content_start));
            }
            let content: String = chars[content_start..i].iter().collect();
            let segment = match parse_index(content.trim()) {
                Some(idx) => Segment::Index(idx),
                None => Segment::Key(content),
            };
            Ok((segment, i + 1))
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Key(k) if k.contains(['.', '[', ']', '"', '\'']) || parse_index(k).is_some() => {
                    write!(f, "[\"{}\"]", k.replace('\\', "\\\\").replace('"', "\\\""))?
                }
                Segment::Key(k) => {
                    if n > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
            }
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn child<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment.lookup_key().as_ref()),
        Value::Array(arr) => arr.get(segment.as_index()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment.lookup_key().as_ref()),
        Value::Array(arr) => arr.get_mut(segment.as_index()?),
        _ => None,
    }
}

/// Resolve `path` inside `root`.
pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments
        .iter()
        .try_fold(root, |current, segment| child(current, segment))
}

/// Resolve `path` inside `root` for mutation, without creating anything.
pub fn get_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in &path.segments {
        current = child_mut(current, segment)?;
    }
    Some(current)
}

/// Slot for `segment` in a container, inserting `null` if needed.
fn slot_mut<'a>(container: &'a mut Value, segment: &Segment) -> Result<&'a mut Value, PathError> {
    match container {
        Value::Object(map) => Ok(map.entry(segment.as_key()).or_insert(Value::Null)),
        Value::Array(arr) => {
            let index = segment
                .as_index()
                .ok_or_else(|| PathError::KeyOnArray(segment.as_key()))?;
            if index >= arr.len() {
                if index - arr.len() > MAX_ARRAY_PAD {
                    return Err(PathError::IndexTooLarge { index, len: arr.len() });
                }
                arr.resize(index + 1, Value::Null);
            }
            Ok(&mut arr[index])
        }
        other => Err(PathError::NotAContainer(type_name(other))),
    }
}

/// Write `value` at `path`, creating intermediate containers.
///
/// A missing or scalar intermediate becomes an array when the following
/// segment is numeric and an object otherwise. The root itself must already
/// be an object or array.
pub fn set(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    if !is_container(root) {
        return Err(PathError::NotAContainer(type_name(root)));
    }

    let mut current = root;
    for (n, segment) in path.segments.iter().enumerate() {
        let slot = slot_mut(current, segment)?;
        match path.segments.get(n + 1) {
            None => {
                *slot = value;
                return Ok(());
            }
            Some(next) => {
                if !is_container(slot) {
                    *slot = if next.as_index().is_some() {
                        Value::Array(Vec::new())
                    } else {
                        Value::Object(Map::new())
                    };
                }
                current = slot;
            }
        }
    }
    Ok(())
}

/// Clear the value at `path`.
///
/// Object properties are removed; array slots are nulled so later indices
/// keep their positions. Returns `false` when nothing was there to clear.
pub fn clear(root: &mut Value, path: &Path) -> bool {
    let Some((last, parents)) = path.segments.split_last() else {
        return false;
    };

    let mut parent = root;
    for segment in parents {
        match child_mut(parent, segment) {
            Some(next) => parent = next,
            None => return false,
        }
    }

    match parent {
        Value::Object(map) => map.remove(last.lookup_key().as_ref()).is_some(),
        Value::Array(arr) => match last.as_index().and_then(|i| arr.get_mut(i)) {
            Some(slot) => {
                *slot = Value::Null;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Loose truthiness: `null`, `false`, `0` and `""` are falsy, everything
/// else (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
