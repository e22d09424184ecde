//! Tag placement strategies.
//!
//! A switcher decides where a sum type's tag lives and where each case's
//! fields are read from / written to. Cases never see the difference: they
//! get a [`CaseData`] handle and decode or encode their own fields against it.
pub mod adjacent;
pub mod builders;
pub mod internal;

use crate::case::CaseVariable;
use crate::ir::{CodeBlock, Expr, Ident, TagType, TagValue};
use crate::keys::CodingKeysDecl;

pub use adjacent::{AdjacentSwitcher, AdjacentlyTaggable, CoderBinding, CoderVariable};
pub use internal::{InternalSwitcher, PathRegistration, SharedContainer, VariableBuilder};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Entry point of a decode/encode routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitcherLocation {
    pub coder: Ident,
    pub key_type: Ident,
}

/// Per-case code the switcher contributes to encoding, run against a fresh
/// binding holding the case's tag.
#[derive(Debug, Clone, Copy)]
pub enum PayloadBuilder<'s> {
    Empty,
    Identifier(&'s InternalSwitcher),
}

/// Where a case's fields live.
#[derive(Debug, Clone)]
pub enum CaseData<'s> {
    /// Behind their own container opened over `handle`.
    NestedContainer(Ident, PayloadBuilder<'s>),
    /// Beside the tag, through the coder `handle` shared by all cases.
    SharedCoder(Ident, PayloadBuilder<'s>),
}

#[derive(Debug, Clone)]
pub struct GeneratedFragment<'s> {
    pub data: CaseData<'s>,
    /// Switch subject.
    pub expr: Expr,
    /// Code run before the switch.
    pub code: CodeBlock,
    /// Whether the switch needs an arm for tags matching no case.
    pub default_case: bool,
}

pub trait TagSwitcher {
    fn key_expression(&self, case: &CaseVariable) -> TagValue;
    fn decoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_>;
    fn encoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_>;
    fn auxiliary_declarations(&self) -> Vec<CodingKeysDecl>;
    /// Whether case fields share the container holding the tag.
    fn shares_root_container(&self) -> bool;
    fn tag_type(&self) -> TagType;
    /// Wire path of the tag slot.
    fn tag_path(&self) -> Vec<String>;
}

/// The closed set of supported strategies.
#[derive(Debug)]
pub enum Switcher {
    Adjacent(AdjacentSwitcher<InternalSwitcher>),
    Internal(InternalSwitcher),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl PayloadBuilder<'_> {
    pub fn build(&self, name: &str) -> CodeBlock {
        match self {
            PayloadBuilder::Empty => CodeBlock::new(),
            PayloadBuilder::Identifier(switcher) => switcher.encode_identifier(name),
        }
    }
}

impl<'s> CaseData<'s> {
    pub fn handle(&self) -> &Ident {
        match self {
            CaseData::NestedContainer(handle, _) | CaseData::SharedCoder(handle, _) => handle,
        }
    }

    pub fn payload(&self) -> &PayloadBuilder<'s> {
        match self {
            CaseData::NestedContainer(_, payload) | CaseData::SharedCoder(_, payload) => payload,
        }
    }
}

impl TagSwitcher for Switcher {
    fn key_expression(&self, case: &CaseVariable) -> TagValue {
        match self {
            Switcher::Adjacent(s) => s.key_expression(case),
            Switcher::Internal(s) => s.key_expression(case),
        }
    }

    fn decoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        match self {
            Switcher::Adjacent(s) => s.decoding(location),
            Switcher::Internal(s) => s.decoding(location),
        }
    }

    fn encoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        match self {
            Switcher::Adjacent(s) => s.encoding(location),
            Switcher::Internal(s) => s.encoding(location),
        }
    }

    fn auxiliary_declarations(&self) -> Vec<CodingKeysDecl> {
        match self {
            Switcher::Adjacent(s) => s.auxiliary_declarations(),
            Switcher::Internal(s) => s.auxiliary_declarations(),
        }
    }

    fn shares_root_container(&self) -> bool {
        match self {
            Switcher::Adjacent(s) => s.shares_root_container(),
            Switcher::Internal(s) => s.shares_root_container(),
        }
    }

    fn tag_type(&self) -> TagType {
        match self {
            Switcher::Adjacent(s) => s.tag_type(),
            Switcher::Internal(s) => s.tag_type(),
        }
    }

    fn tag_path(&self) -> Vec<String> {
        match self {
            Switcher::Adjacent(s) => s.tag_path(),
            Switcher::Internal(s) => s.tag_path(),
        }
    }
}
