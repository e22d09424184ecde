//! Property variables: the capability set of a single decodable/encodable
//! value, and the decorator used to re-home a variable without rewriting it.
use std::fmt;

use serde_json::Value;

use crate::ir::{CodeBlock, Expr, FieldType, Ident, Stmt};
use crate::keys::CodingKey;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Where a property variable is decoded from or encoded to.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyLocation {
    /// A single-value coder; keyed access needs a container of `key_type`.
    Coder { coder: Ident, key_type: Ident },
    /// The slot at `key` of an open keyed container.
    Container { container: Ident, key: CodingKey },
}

/// A value that can take part in a decode and/or encode plan.
///
/// Flags are optional: `None` means "not specified" and is read as enabled by
/// the `is_*` helpers.
pub trait PropertyVariable: fmt::Debug {
    fn name(&self) -> &str;
    fn ty(&self) -> &FieldType;
    fn default_value(&self) -> Option<&Value>;

    fn decode(&self) -> Option<bool>;
    fn encode(&self) -> Option<bool>;
    fn require_decodable(&self) -> Option<bool>;
    fn require_encodable(&self) -> Option<bool>;

    fn decoding(&self, location: &PropertyLocation) -> CodeBlock;
    fn encoding(&self, location: &PropertyLocation) -> CodeBlock;

    fn is_decoded(&self) -> bool {
        self.decode().unwrap_or(true)
    }
    fn is_encoded(&self) -> bool {
        self.encode().unwrap_or(true)
    }
    /// A variable with both directions disabled takes no part in the plan.
    fn is_emitted(&self) -> bool {
        self.is_decoded() || self.is_encoded()
    }
}

/// Plain property: decoded into and encoded from a binding named after it.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicPropertyVariable {
    pub name: Ident,
    pub ty: FieldType,
    pub value: Option<Value>,
    pub decode: Option<bool>,
    pub encode: Option<bool>,
}

/// Operations a [`ComposedVariable`] may replace. Every method forwards to
/// `base` unless overridden.
pub trait Override<B: PropertyVariable>: fmt::Debug {
    fn default_value<'a>(&'a self, base: &'a B) -> Option<&'a Value> {
        base.default_value()
    }
    fn decode(&self, base: &B) -> Option<bool> {
        base.decode()
    }
    fn encode(&self, base: &B) -> Option<bool> {
        base.encode()
    }
    fn require_decodable(&self, base: &B) -> Option<bool> {
        base.require_decodable()
    }
    fn require_encodable(&self, base: &B) -> Option<bool> {
        base.require_encodable()
    }
    fn decoding(&self, base: &B, location: &PropertyLocation) -> CodeBlock {
        base.decoding(location)
    }
    fn encoding(&self, base: &B, location: &PropertyLocation) -> CodeBlock {
        base.encoding(location)
    }
}

/// Decorator over an owned `base` variable.
#[derive(Debug, Clone)]
pub struct ComposedVariable<B, O> {
    pub base: B,
    pub overrides: O,
}

/// Decodes with a fallback value when the slot is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultValue {
    pub value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl BasicPropertyVariable {
    pub fn new(name: impl Into<Ident>, ty: FieldType) -> Self {
        Self { name: name.into(), ty, value: None, decode: None, encode: None }
    }

    pub fn with_default(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    pub fn with_flags(mut self, decode: Option<bool>, encode: Option<bool>) -> Self {
        self.decode = decode;
        self.encode = encode;
        self
    }
}

impl PropertyVariable for BasicPropertyVariable {
    fn name(&self) -> &str {
        &self.name
    }
    fn ty(&self) -> &FieldType {
        &self.ty
    }
    fn default_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
    fn decode(&self) -> Option<bool> {
        self.decode
    }
    fn encode(&self) -> Option<bool> {
        self.encode
    }
    fn require_decodable(&self) -> Option<bool> {
        self.decode
    }
    fn require_encodable(&self) -> Option<bool> {
        self.encode
    }

    fn decoding(&self, location: &PropertyLocation) -> CodeBlock {
        if !self.is_decoded() {
            return match &self.value {
                Some(value) => Stmt::Let {
                    name: self.name.clone(),
                    value: Expr::Literal(value.clone()),
                }
                .into(),
                None => CodeBlock::new(),
            };
        }
        let default = self.value.clone();
        match location {
            PropertyLocation::Coder { coder, .. } => Stmt::DecodeCoder {
                name: self.name.clone(),
                ty: self.ty.clone(),
                coder: coder.clone(),
                default,
            }
            .into(),
            PropertyLocation::Container { container, key } => Stmt::DecodeKey {
                name: self.name.clone(),
                ty: self.ty.clone(),
                container: container.clone(),
                key: key.clone(),
                default,
            }
            .into(),
        }
    }

    fn encoding(&self, location: &PropertyLocation) -> CodeBlock {
        if !self.is_encoded() {
            return CodeBlock::new();
        }
        let value = Expr::Var(self.name.clone());
        match location {
            PropertyLocation::Coder { coder, .. } => Stmt::EncodeCoder {
                value,
                ty: self.ty.clone(),
                coder: coder.clone(),
            }
            .into(),
            PropertyLocation::Container { container, key } => Stmt::EncodeKey {
                value,
                ty: self.ty.clone(),
                container: container.clone(),
                key: key.clone(),
            }
            .into(),
        }
    }
}

impl<T: PropertyVariable + ?Sized> PropertyVariable for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn ty(&self) -> &FieldType {
        (**self).ty()
    }
    fn default_value(&self) -> Option<&Value> {
        (**self).default_value()
    }
    fn decode(&self) -> Option<bool> {
        (**self).decode()
    }
    fn encode(&self) -> Option<bool> {
        (**self).encode()
    }
    fn require_decodable(&self) -> Option<bool> {
        (**self).require_decodable()
    }
    fn require_encodable(&self) -> Option<bool> {
        (**self).require_encodable()
    }
    fn decoding(&self, location: &PropertyLocation) -> CodeBlock {
        (**self).decoding(location)
    }
    fn encoding(&self, location: &PropertyLocation) -> CodeBlock {
        (**self).encoding(location)
    }
}

impl<B, O> ComposedVariable<B, O> {
    pub fn new(base: B, overrides: O) -> Self {
        Self { base, overrides }
    }
}

impl<B, O> PropertyVariable for ComposedVariable<B, O>
where
    B: PropertyVariable,
    O: Override<B>,
{
    fn name(&self) -> &str {
        self.base.name()
    }
    fn ty(&self) -> &FieldType {
        self.base.ty()
    }
    fn default_value(&self) -> Option<&Value> {
        self.overrides.default_value(&self.base)
    }
    fn decode(&self) -> Option<bool> {
        self.overrides.decode(&self.base)
    }
    fn encode(&self) -> Option<bool> {
        self.overrides.encode(&self.base)
    }
    fn require_decodable(&self) -> Option<bool> {
        self.overrides.require_decodable(&self.base)
    }
    fn require_encodable(&self) -> Option<bool> {
        self.overrides.require_encodable(&self.base)
    }
    fn decoding(&self, location: &PropertyLocation) -> CodeBlock {
        self.overrides.decoding(&self.base, location)
    }
    fn encoding(&self, location: &PropertyLocation) -> CodeBlock {
        self.overrides.encoding(&self.base, location)
    }
}

impl<B: PropertyVariable> Override<B> for DefaultValue {
    fn default_value<'a>(&'a self, _base: &'a B) -> Option<&'a Value> {
        Some(&self.value)
    }

    fn decoding(&self, base: &B, location: &PropertyLocation) -> CodeBlock {
        if !base.is_decoded() {
            return base.decoding(location);
        }
        let name = base.name().to_string();
        let ty = base.ty().clone();
        let default = Some(self.value.clone());
        match location {
            PropertyLocation::Coder { coder, .. } => {
                Stmt::DecodeCoder { name, ty, coder: coder.clone(), default }.into()
            }
            PropertyLocation::Container { container, key } => Stmt::DecodeKey {
                name,
                ty,
                container: container.clone(),
                key: key.clone(),
                default,
            }
            .into(),
        }
    }
}
