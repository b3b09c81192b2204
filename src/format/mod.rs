//! Text scene/resource documents (`.tscn`, `.tres`)
//!
//! A document is a list of `[tag key=value ...]` sections, each followed by
//! `key = value` property lines.

pub mod error;
mod parser;

pub use error::SyntaxError;
pub use parser::parse_document;

/// A literal value as written in the document, before references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    ExtRef(String),
    SubRef(String),
    Array(Vec<RawValue>),
    /// Dictionaries, math types and other constructors the validator does not inspect.
    Opaque(String),
}

impl RawValue {
    /// String or integer payload, as used by ids and paths.
    pub fn as_key(&self) -> Option<String> {
        match self {
            RawValue::Str(s) => Some(s.clone()),
            RawValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub tag: String,
    pub attributes: Vec<(String, RawValue)>,
    pub properties: Vec<(String, RawValue)>,
}

impl Section {
    pub fn attribute(&self, key: &str) -> Option<&RawValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Attribute as a plain string (`id="1"` and `id=1` both work).
    pub fn attribute_str(&self, key: &str) -> Option<String> {
        self.attribute(key).and_then(RawValue::as_key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The leading `[gd_scene ...]` / `[gd_resource ...]` section.
    pub header: Section,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn sections_tagged<'d>(&'d self, tag: &'d str) -> impl Iterator<Item = &'d Section> + 'd {
        self.sections.iter().filter(move |s| s.tag == tag)
    }
}
