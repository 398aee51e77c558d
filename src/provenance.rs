//! Source locations for instances and diagnostics.
//!
//! A [`Path`] renders as `orders[0].lines[id=100].qty`: fields joined by
//! dots, positions as `[i]`, keyed children as `[name=value,...]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Value;

/// Line/column range in a source document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self { line, column, end_line, end_column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}:{}", self.line, self.column, self.end_line, self.end_column)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    Key(Vec<(String, String)>),
}

/// Canonical location inside a document. Immutable; builders return a
/// new path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn field(&self, name: &str) -> Self {
        self.with(Segment::Field(name.to_string()))
    }

    pub fn index(&self, i: usize) -> Self {
        self.with(Segment::Index(i))
    }

    /// Keyed element, e.g. `[id=100]` or `[region="us",id=7]`.
    pub fn key<'a>(&self, parts: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        self.with(Segment::Key(
            parts.into_iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
        ))
    }

    fn with(&self, seg: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(seg);
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
                Segment::Key(parts) => {
                    write!(f, "[")?;
                    for (j, (n, v)) in parts.iter().enumerate() {
                        if j > 0 { write!(f, ",")?; }
                        write!(f, "{n}={v}")?;
                    }
                    write!(f, "]")?;
                }
            }
        }
        Ok(())
    }
}

/// Where an instance came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub source: Option<String>,
    pub path: Path,
    pub span: Option<Span>,
}

impl Provenance {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), path: Path::root(), span: None }
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = path;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let id = Value::Int(100);
        let p = Path::root().field("orders").index(0).field("lines").key([("id", &id)]).field("qty");
        assert_eq!(p.to_string(), "orders[0].lines[id=100].qty");
        assert_eq!(Path::root().to_string(), "");
        assert_eq!(Path::root().index(2).field("x").to_string(), "[2].x");
    }

    #[test]
    fn test_composite_key_segment() {
        let region = Value::from("us");
        let id = Value::Int(7);
        let p = Path::root().field("sites").key([("region", &region), ("id", &id)]);
        assert_eq!(p.to_string(), r#"sites[region="us",id=7]"#);
    }
}
