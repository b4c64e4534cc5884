//! Layout attributes carried by graph-mutation events.
//!
//! Attribute values arrive untyped from the event source. They are decoded
//! once here into the typed settings the engine understands; anything that
//! is not a layout attribute, or has the wrong type, decodes to `None` and
//! is merely forwarded.

use serde::{Deserialize, Serialize};

/// An untyped attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

/// Attribute names may carry a `layout.` namespace.
fn layout_name(name: &str) -> &str {
    name.strip_prefix("layout.").unwrap_or(name)
}

/// Graph-level layout settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphAttribute {
    Force(f64),
    /// Raw level, clamped by the engine.
    Quality(i64),
    ExactZone(f64),
    OutputStats(bool),
    StabilizationLimit(f64),
}

impl GraphAttribute {
    /// Decode a graph attribute. `value` is None when the attribute was
    /// removed.
    pub fn parse(name: &str, value: Option<&AttributeValue>) -> Option<Self> {
        let number = value.and_then(AttributeValue::as_number);
        match layout_name(name) {
            "force" => number.map(GraphAttribute::Force),
            "quality" => number.map(|q| GraphAttribute::Quality(q as i64)),
            "exact-zone" => number.map(GraphAttribute::ExactZone),
            "output-stats" => Some(GraphAttribute::OutputStats(
                value.is_some_and(|v| v.as_bool() != Some(false)),
            )),
            "stabilization-limit" => number.map(GraphAttribute::StabilizationLimit),
            _ => None,
        }
    }
}

/// Node-level layout settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeAttribute {
    /// None restores the default weight.
    Weight(Option<f64>),
}

impl NodeAttribute {
    pub fn parse(name: &str, value: Option<&AttributeValue>) -> Option<Self> {
        match layout_name(name) {
            "weight" => match value {
                None => Some(NodeAttribute::Weight(None)),
                Some(v) => v.as_number().map(|w| NodeAttribute::Weight(Some(w))),
            },
            _ => None,
        }
    }
}

/// Edge-level layout settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeAttribute {
    /// None restores the default weight.
    Weight(Option<f64>),
    Ignored(bool),
}

impl EdgeAttribute {
    pub fn parse(name: &str, value: Option<&AttributeValue>) -> Option<Self> {
        match layout_name(name) {
            "weight" => match value {
                None => Some(EdgeAttribute::Weight(None)),
                Some(v) => v.as_number().map(|w| EdgeAttribute::Weight(Some(w))),
            },
            "ignored" => match value {
                None => Some(EdgeAttribute::Ignored(false)),
                Some(v) => v.as_bool().map(EdgeAttribute::Ignored),
            },
            _ => None,
        }
    }
}
