// Strongly-typed plan IR. No host-language syntax here.
//
// A plan is a list of statements over named handles (coders, containers and
// values). `runtime` executes it against `serde_json::Value`, `Display`
// renders it as pseudocode.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::CodingKey;

pub type Ident = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Decode,
    Encode,
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Wire type of the tag slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    #[default]
    String,
    Int,
    Double,
    Bool,
}

/// A resolved case tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Double(OrderedFloat<f64>),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    String,
    Int,
    Double,
    Bool,
    /// any JSON value
    Json,
    Array(Box<FieldType>),
    Optional(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(Ident),
    Tag(TagValue),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = coder`
    BindCoder { name: Ident, coder: Ident },
    /// keyed container over a coder
    KeyedContainer { name: Ident, coder: Ident, key_type: Ident, mode: Mode },
    /// keyed container nested under `key` of `parent`
    NestedContainer { name: Ident, parent: Ident, key: CodingKey, key_type: Ident, mode: Mode },
    /// single-value coder for the slot at `key`
    SuperCoder { name: Ident, container: Ident, key: CodingKey, mode: Mode },
    /// `var name = container`
    BindContainer { name: Ident, container: Ident },
    Let { name: Ident, value: Expr },
    DecodeKey {
        name: Ident,
        ty: FieldType,
        container: Ident,
        key: CodingKey,
        default: Option<Value>,
    },
    DecodeCoder { name: Ident, ty: FieldType, coder: Ident, default: Option<Value> },
    EncodeKey { value: Expr, ty: FieldType, container: Ident, key: CodingKey },
    EncodeCoder { value: Expr, ty: FieldType, coder: Ident },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBlock(pub Vec<Stmt>);

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TagType {
    pub fn field_type(self) -> FieldType {
        match self {
            TagType::String => FieldType::String,
            TagType::Int => FieldType::Int,
            TagType::Double => FieldType::Double,
            TagType::Bool => FieldType::Bool,
        }
    }
}

impl TagValue {
    /// Coerce a declared tag to the switcher's tag type. Integers widen to
    /// doubles; everything else must already agree.
    pub fn coerce(self, ty: TagType) -> Option<TagValue> {
        match (self, ty) {
            (TagValue::Str(s), TagType::String) => Some(TagValue::Str(s)),
            (TagValue::Int(i), TagType::Int) => Some(TagValue::Int(i)),
            (TagValue::Int(i), TagType::Double) => Some(TagValue::Double(OrderedFloat(i as f64))),
            (TagValue::Double(d), TagType::Double) => Some(TagValue::Double(d)),
            (TagValue::Bool(b), TagType::Bool) => Some(TagValue::Bool(b)),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TagValue::Str(s) => value.as_str() == Some(s.as_str()),
            TagValue::Int(i) => value.as_i64() == Some(*i),
            TagValue::Double(d) => value.as_f64() == Some(d.0),
            TagValue::Bool(b) => value.as_bool() == Some(*b),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TagValue::Str(s) => Value::from(s.clone()),
            TagValue::Int(i) => Value::from(*i),
            TagValue::Double(d) => Value::from(d.0),
            TagValue::Bool(b) => Value::from(*b),
        }
    }
}

impl FieldType {
    /// Whether `value` is a valid wire representation of this type.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Double => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Json => true,
            FieldType::Array(item) => value
                .as_array()
                .is_some_and(|xs| xs.iter().all(|x| item.check(x))),
            FieldType::Optional(inner) => value.is_null() || inner.check(value),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    fn parse(src: &str) -> Option<FieldType> {
        let src = src.trim();
        if let Some(inner) = src.strip_suffix('?') {
            return Some(FieldType::Optional(Box::new(FieldType::parse(inner)?)));
        }
        if let Some(inner) = src.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Some(FieldType::Array(Box::new(FieldType::parse(inner)?)));
        }
        match src {
            "String" => Some(FieldType::String),
            "Int" => Some(FieldType::Int),
            "Double" => Some(FieldType::Double),
            "Bool" => Some(FieldType::Bool),
            "Json" => Some(FieldType::Json),
            _ => None,
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldType::parse(&value).ok_or_else(|| format!("unknown field type `{value}`"))
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, stmt: Stmt) {
        self.0.push(stmt);
    }
    pub fn extend(&mut self, other: CodeBlock) {
        self.0.extend(other.0);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Stmt> {
        self.0.iter()
    }
}

impl From<Stmt> for CodeBlock {
    fn from(stmt: Stmt) -> Self {
        CodeBlock(vec![stmt])
    }
}

impl FromIterator<Stmt> for CodeBlock {
    fn from_iter<I: IntoIterator<Item = Stmt>>(iter: I) -> Self {
        CodeBlock(iter.into_iter().collect())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("String"),
            FieldType::Int => f.write_str("Int"),
            FieldType::Double => f.write_str("Double"),
            FieldType::Bool => f.write_str("Bool"),
            FieldType::Json => f.write_str("Json"),
            FieldType::Array(item) => write!(f, "[{item}]"),
            FieldType::Optional(inner) => write!(f, "{inner}?"),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{s:?}"),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::Double(d) => write!(f, "{:?}", d.0),
            TagValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => f.write_str(name),
            Expr::Tag(tag) => write!(f, "{tag}"),
            Expr::Literal(value) => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn op(mode: &Mode, decode: &'static str, encode: &'static str) -> &'static str {
            match mode {
                Mode::Decode => decode,
                Mode::Encode => encode,
            }
        }
        match self {
            Stmt::BindCoder { name, coder } => write!(f, "let {name} = {coder};"),
            Stmt::KeyedContainer { name, coder, key_type, mode } => {
                let call = op(mode, "container", "container_mut");
                write!(f, "let {name} = {coder}.{call}::<{key_type}>()?;")
            }
            Stmt::NestedContainer { name, parent, key, key_type, mode } => {
                let call = op(mode, "nested", "nested_mut");
                write!(f, "let {name} = {parent}.{call}::<{key_type}>({key_type}::{})?;", key.name)
            }
            Stmt::SuperCoder { name, container, key, mode } => {
                let call = op(mode, "super_decoder", "super_encoder");
                write!(f, "let {name} = {container}.{call}({})?;", key.name)
            }
            Stmt::BindContainer { name, container } => write!(f, "let mut {name} = {container};"),
            Stmt::Let { name, value } => write!(f, "let {name} = {value};"),
            Stmt::DecodeKey { name, ty, container, key, default } => match default {
                Some(default) => write!(
                    f,
                    "let {name} = {container}.decode_if_present::<{ty}>({})?.unwrap_or({default});",
                    key.name
                ),
                None => write!(f, "let {name} = {container}.decode::<{ty}>({})?;", key.name),
            },
            Stmt::DecodeCoder { name, ty, coder, default } => match default {
                Some(default) => write!(f, "let {name} = {coder}.decode_if_present::<{ty}>()?.unwrap_or({default});"),
                None => write!(f, "let {name} = {coder}.decode::<{ty}>()?;"),
            },
            Stmt::EncodeKey { value, ty, container, key } => {
                write!(f, "{container}.encode::<{ty}>(&{value}, {})?;", key.name)
            }
            Stmt::EncodeCoder { value, ty, coder } => write!(f, "{coder}.encode::<{ty}>(&{value})?;"),
        }
    }
}

impl fmt::Display for CodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.0 {
            writeln!(f, "{stmt}")?;
        }
        Ok(())
    }
}
