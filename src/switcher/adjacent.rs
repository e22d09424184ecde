//! Adjacent tagging: `{ "<tag>": <tag>, "<content>": { <case fields> } }`.
//!
//! Built on top of a base switcher owning the tag. The content slot is one
//! more variable in the base tree whose decoding/encoding binds a coder for
//! that slot instead of reading a value.
use crate::case::CaseVariable;
use crate::ir::{CodeBlock, FieldType, Ident, Mode, Stmt, TagType, TagValue};
use crate::keys::{CodingKey, CodingKeysDecl, DuplicateKey, KeyRegistry, RegisteredPath};
use crate::variable::{BasicPropertyVariable, ComposedVariable, Override, PropertyLocation, PropertyVariable};

use super::{CaseData, GeneratedFragment, SwitcherLocation, TagSwitcher};

/// Name the content slot is registered under.
pub const CONTENT_FIELD: &str = "content";
/// Auxiliary key table naming the tag and content slots.
pub const TAGGING_KEYS: &str = "TaggingKeys";

/// A switcher that can host the content variable in its own tree.
pub trait AdjacentlyTaggable: TagSwitcher + Sized {
    fn registering(self, variable: Box<dyn PropertyVariable>, keys: &RegisteredPath) -> Self;
}

/// Binds the coder for a slot to a fixed name, per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoderBinding {
    pub decoder: Ident,
    pub encoder: Ident,
}

pub type CoderVariable = ComposedVariable<BasicPropertyVariable, CoderBinding>;

#[derive(Debug)]
pub struct AdjacentSwitcher<W> {
    base: W,
    decoder: Ident,
    encoder: Ident,
    slots: Vec<CodingKey>,
}

impl CoderBinding {
    fn bind(name: &Ident, location: &PropertyLocation, mode: Mode) -> CodeBlock {
        match location {
            PropertyLocation::Coder { coder, .. } => {
                Stmt::BindCoder { name: name.clone(), coder: coder.clone() }.into()
            }
            PropertyLocation::Container { container, key } => Stmt::SuperCoder {
                name: name.clone(),
                container: container.clone(),
                key: key.clone(),
                mode,
            }
            .into(),
        }
    }
}

impl<B: PropertyVariable> Override<B> for CoderBinding {
    fn decode(&self, _base: &B) -> Option<bool> {
        Some(true)
    }
    fn encode(&self, _base: &B) -> Option<bool> {
        Some(true)
    }
    fn require_decodable(&self, _base: &B) -> Option<bool> {
        Some(false)
    }
    fn require_encodable(&self, _base: &B) -> Option<bool> {
        Some(false)
    }
    fn decoding(&self, _base: &B, location: &PropertyLocation) -> CodeBlock {
        CoderBinding::bind(&self.decoder, location, Mode::Decode)
    }
    fn encoding(&self, _base: &B, location: &PropertyLocation) -> CodeBlock {
        CoderBinding::bind(&self.encoder, location, Mode::Encode)
    }
}

impl<W: AdjacentlyTaggable> AdjacentSwitcher<W> {
    /// # Panics
    ///
    /// When `content_path` is empty.
    pub fn new(
        base: W,
        decoder: impl Into<Ident>,
        encoder: impl Into<Ident>,
        content_path: &[String],
        registry: &mut KeyRegistry,
    ) -> Result<Self, DuplicateKey> {
        assert!(!content_path.is_empty(), "content key path must not be empty");
        let decoder = decoder.into();
        let encoder = encoder.into();
        let keys = registry.add(content_path, CONTENT_FIELD)?;

        let mut slots: Vec<CodingKey> = base
            .tag_path()
            .last()
            .and_then(|wire| registry.get(wire))
            .cloned()
            .into_iter()
            .collect();
        slots.extend(keys.last().cloned());

        let variable: CoderVariable = ComposedVariable::new(
            BasicPropertyVariable::new(CONTENT_FIELD, FieldType::Json),
            CoderBinding { decoder: decoder.clone(), encoder: encoder.clone() },
        );
        tracing::debug!(content = ?keys.wire(), "adjacent switcher");
        let base = base.registering(Box::new(variable), &keys);
        Ok(Self { base, decoder, encoder, slots })
    }
}

impl<W: AdjacentlyTaggable> TagSwitcher for AdjacentSwitcher<W> {
    fn key_expression(&self, case: &CaseVariable) -> TagValue {
        self.base.key_expression(case)
    }

    fn decoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        let mut generated = self.base.decoding(location);
        let payload = *generated.data.payload();
        generated.data = CaseData::NestedContainer(self.decoder.clone(), payload);
        generated
    }

    fn encoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        let mut generated = self.base.encoding(location);
        let payload = *generated.data.payload();
        generated.data = CaseData::NestedContainer(self.encoder.clone(), payload);
        generated
    }

    fn auxiliary_declarations(&self) -> Vec<CodingKeysDecl> {
        let mut decls = self.base.auxiliary_declarations();
        decls.push(CodingKeysDecl { type_name: TAGGING_KEYS.to_string(), keys: self.slots.clone() });
        decls
    }

    fn shares_root_container(&self) -> bool {
        false
    }

    fn tag_type(&self) -> TagType {
        self.base.tag_type()
    }

    fn tag_path(&self) -> Vec<String> {
        self.base.tag_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{KeyPath, SumTypeDecl, Tagging};
    use crate::switcher::{builders, InternalSwitcher, PayloadBuilder};

    fn path(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn switcher(tag: &[&str], content: &[&str]) -> Result<AdjacentSwitcher<InternalSwitcher>, DuplicateKey> {
        let decl = SumTypeDecl {
            name: "Shape".into(),
            tagging: Tagging::Adjacent {
                tag: KeyPath::new(tag.iter().copied()).unwrap(),
                content: KeyPath::new(content.iter().copied()).unwrap(),
            },
            tag_type: TagType::String,
            identifier_default: None,
            fallback: None,
            cases: Vec::new(),
        };
        let mut reg = KeyRegistry::new();
        let base =
            InternalSwitcher::new("type_container", "tag", TagType::String, &path(tag), &mut reg, &decl, builders::basic)?;
        AdjacentSwitcher::new(base, "content_decoder", "content_encoder", &path(content), &mut reg)
    }

    fn location(coder: &str) -> SwitcherLocation {
        SwitcherLocation { coder: coder.into(), key_type: "CodingKeys".into() }
    }

    #[test]
    fn decoding_routes_cases_to_content_decoder() {
        let s = switcher(&["type"], &["payload"]).unwrap();
        let generated = s.decoding(&location("decoder"));
        assert!(matches!(generated.data, CaseData::NestedContainer(ref h, PayloadBuilder::Empty) if h == "content_decoder"));
        let last = generated.code.0.last().cloned();
        match last {
            Some(Stmt::SuperCoder { name, container, key, mode }) => {
                assert_eq!(name, "content_decoder");
                assert_eq!(container, "container");
                assert_eq!(key.wire, "payload");
                assert_eq!(mode, Mode::Decode);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn encoding_keeps_tag_payload() {
        let s = switcher(&["type"], &["payload"]).unwrap();
        let generated = s.encoding(&location("encoder"));
        assert!(matches!(generated.data, CaseData::NestedContainer(ref h, PayloadBuilder::Identifier(_)) if h == "content_encoder"));
        let kinds: Vec<_> = generated
            .code
            .iter()
            .map(|s| match s {
                Stmt::KeyedContainer { .. } => "keyed",
                Stmt::BindContainer { .. } => "bind",
                Stmt::SuperCoder { .. } => "super",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["keyed", "bind", "super"]);
    }

    #[test]
    fn auxiliary_keys_name_both_slots() {
        let s = switcher(&["meta", "kind"], &["meta", "body"]).unwrap();
        let decls = s.auxiliary_declarations();
        assert_eq!(decls.len(), 1);
        let wires: Vec<_> = decls[0].keys.iter().map(|k| k.wire.as_str()).collect();
        assert_eq!(wires, ["kind", "body"]);
        assert!(!s.shares_root_container());
        assert_eq!(s.tag_path(), ["meta", "kind"]);
    }

    #[test]
    fn content_on_tag_slot_is_a_duplicate() {
        let err = switcher(&["type"], &["type"]).unwrap_err();
        assert_eq!(err.existing, "tag");
        assert_eq!(err.field, CONTENT_FIELD);
    }
}
