//! Internal tagging: `{ "<identifier>": <tag>, <case fields inlined> }`.
//!
//! The identifier is registered once in a property tree owned by the switcher.
//! Every case shares the root container, so the only per-case hook is how the
//! tag value is computed and written.
use std::fmt;

use crate::case::CaseVariable;
use crate::decl::SumTypeDecl;
use crate::ir::{CodeBlock, Expr, Ident, Stmt, TagType, TagValue};
use crate::keys::{CodingKey, CodingKeysDecl, DuplicateKey, KeyRegistry, RegisteredPath};
use crate::tree::PropertyTree;
use crate::variable::{BasicPropertyVariable, ComposedVariable, Override, PropertyLocation, PropertyVariable};

use super::adjacent::AdjacentlyTaggable;
use super::{CaseData, GeneratedFragment, PayloadBuilder, SwitcherLocation, TagSwitcher};

/// Container the switcher's own tree opens over the coder.
pub const SWITCH_CONTAINER: &str = "container";

/// Identifier variable handed to a [`VariableBuilder`].
pub struct PathRegistration<'a> {
    pub decl: &'a SumTypeDecl,
    pub key: Vec<String>,
    pub variable: Box<dyn PropertyVariable>,
}

/// Post-processes the identifier variable (and optionally its key path).
/// Must be pure: the same input always yields the same registration.
pub type VariableBuilder = for<'a> fn(PathRegistration<'a>) -> PathRegistration<'a>;

pub struct InternalSwitcher {
    encode_container: Ident,
    identifier: Ident,
    identifier_type: TagType,
    decl: SumTypeDecl,
    keys: RegisteredPath,
    key: CodingKey,
    tree: PropertyTree,
    builder: VariableBuilder,
}

/// Binds the container the wrapped variable would be encoded into to a
/// shared name, so every case can write its tag into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedContainer {
    pub encode_container: Ident,
}

impl InternalSwitcher {
    /// # Panics
    ///
    /// When `key_path` (or the path returned by `builder`) is empty.
    pub fn new(
        encode_container: impl Into<Ident>,
        identifier: impl Into<Ident>,
        identifier_type: TagType,
        key_path: &[String],
        registry: &mut KeyRegistry,
        decl: &SumTypeDecl,
        builder: VariableBuilder,
    ) -> Result<Self, DuplicateKey> {
        assert!(!key_path.is_empty(), "identifier key path must not be empty");
        let encode_container = encode_container.into();
        let identifier = identifier.into();

        let variable = BasicPropertyVariable::new(identifier.clone(), identifier_type.field_type());
        let output = builder(PathRegistration {
            decl,
            key: key_path.to_vec(),
            variable: Box::new(variable),
        });
        assert!(!output.key.is_empty(), "identifier key path must not be empty");
        let keys = registry.add(&output.key, &identifier)?;
        let Some(key) = keys.last().cloned() else {
            panic!("identifier key path must not be empty");
        };

        let shared = SharedContainer { encode_container: encode_container.clone() };
        let mut tree = PropertyTree::new(SWITCH_CONTAINER);
        tree.register(Box::new(ComposedVariable::new(output.variable, shared)), &keys);
        tracing::debug!(identifier = %identifier, path = ?keys.wire(), "internal switcher");

        Ok(Self {
            encode_container,
            identifier,
            identifier_type,
            decl: decl.clone(),
            keys,
            key,
            tree,
            builder,
        })
    }

    /// Fresh identifier variable named `name`, before the builder runs.
    fn base(&self, name: &str) -> BasicPropertyVariable {
        BasicPropertyVariable::new(name, self.identifier_type.field_type())
    }

    /// Write the tag bound to `name` into the shared container.
    pub(crate) fn encode_identifier(&self, name: &str) -> CodeBlock {
        let output = (self.builder)(PathRegistration {
            decl: &self.decl,
            key: Vec::new(),
            variable: Box::new(self.base(name)),
        });
        output.variable.encoding(&PropertyLocation::Container {
            container: self.encode_container.clone(),
            key: self.key.clone(),
        })
    }
}

impl fmt::Debug for InternalSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalSwitcher")
            .field("encode_container", &self.encode_container)
            .field("identifier", &self.identifier)
            .field("identifier_type", &self.identifier_type)
            .field("keys", &self.keys)
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl TagSwitcher for InternalSwitcher {
    /// Explicit tag, else the case name as a string.
    fn key_expression(&self, case: &CaseVariable) -> TagValue {
        match case.explicit_tag() {
            Some(tag) => tag.clone(),
            None => TagValue::Str(case.name().to_string()),
        }
    }

    fn decoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        let code = self.tree.decoding(&PropertyLocation::Coder {
            coder: location.coder.clone(),
            key_type: location.key_type.clone(),
        });
        GeneratedFragment {
            data: CaseData::SharedCoder(location.coder.clone(), PayloadBuilder::Empty),
            expr: Expr::Var(self.identifier.clone()),
            code,
            default_case: true,
        }
    }

    fn encoding(&self, location: &SwitcherLocation) -> GeneratedFragment<'_> {
        let code = self.tree.encoding(&PropertyLocation::Coder {
            coder: location.coder.clone(),
            key_type: location.key_type.clone(),
        });
        GeneratedFragment {
            data: CaseData::SharedCoder(location.coder.clone(), PayloadBuilder::Identifier(self)),
            expr: Expr::Var("self".to_string()),
            code,
            default_case: true,
        }
    }

    fn auxiliary_declarations(&self) -> Vec<CodingKeysDecl> {
        Vec::new()
    }

    fn shares_root_container(&self) -> bool {
        true
    }

    fn tag_type(&self) -> TagType {
        self.identifier_type
    }

    fn tag_path(&self) -> Vec<String> {
        self.keys.wire()
    }
}

impl AdjacentlyTaggable for InternalSwitcher {
    fn registering(mut self, variable: Box<dyn PropertyVariable>, keys: &RegisteredPath) -> Self {
        self.tree.register(variable, keys);
        self
    }
}

impl<B: PropertyVariable> Override<B> for SharedContainer {
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

    /// # Panics
    ///
    /// On a coder location: a shared binding only exists for containers.
    fn encoding(&self, _base: &B, location: &PropertyLocation) -> CodeBlock {
        match location {
            PropertyLocation::Coder { coder, .. } => {
                panic!("cannot bind shared container `{}` to coder `{coder}`", self.encode_container)
            }
            PropertyLocation::Container { container, .. } => Stmt::BindContainer {
                name: self.encode_container.clone(),
                container: container.clone(),
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{KeyPath, Tagging};
    use crate::ir::FieldType;
    use crate::switcher::builders;

    fn decl() -> SumTypeDecl {
        SumTypeDecl {
            name: "Shape".into(),
            tagging: Tagging::Internal { identifier: KeyPath::new(["type"]).unwrap() },
            tag_type: TagType::String,
            identifier_default: None,
            fallback: None,
            cases: Vec::new(),
        }
    }

    fn location(coder: &str) -> SwitcherLocation {
        SwitcherLocation { coder: coder.into(), key_type: "CodingKeys".into() }
    }

    fn switcher(path: &[&str]) -> InternalSwitcher {
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        let mut reg = KeyRegistry::new();
        InternalSwitcher::new("type_container", "tag", TagType::String, &path, &mut reg, &decl(), builders::basic)
            .unwrap()
    }

    #[test]
    fn decoding_reads_identifier_from_ambient_container() {
        let s = switcher(&["type"]);
        let generated = s.decoding(&location("decoder"));
        assert!(generated.default_case);
        assert_eq!(generated.expr, Expr::Var("tag".into()));
        assert!(matches!(generated.data, CaseData::SharedCoder(ref h, PayloadBuilder::Empty) if h == "decoder"));
        match &generated.code.0[..] {
            [Stmt::KeyedContainer { name, .. }, Stmt::DecodeKey { name: tag, key, .. }] => {
                assert_eq!(name, SWITCH_CONTAINER);
                assert_eq!(tag, "tag");
                assert_eq!(key.wire, "type");
            }
            other => panic!("unexpected code {other:?}"),
        }
    }

    #[test]
    fn encoding_binds_shared_container_and_payload_writes_tag() {
        let s = switcher(&["meta", "type"]);
        let generated = s.encoding(&location("encoder"));
        let last = generated.code.0.last().cloned();
        assert_eq!(
            last,
            Some(Stmt::BindContainer { name: "type_container".into(), container: "container_meta".into() })
        );
        let payload = generated.data.payload().build("tag_circle");
        match &payload.0[..] {
            [Stmt::EncodeKey { value, container, key, ty }] => {
                assert_eq!(value, &Expr::Var("tag_circle".into()));
                assert_eq!(container, "type_container");
                assert_eq!(key.wire, "type");
                assert_eq!(ty, &FieldType::String);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_identifier_path_panics() {
        switcher(&[]);
    }

    #[test]
    #[should_panic(expected = "cannot bind shared container")]
    fn shared_container_rejects_coder_locations() {
        let var = ComposedVariable::new(
            BasicPropertyVariable::new("tag", FieldType::String),
            SharedContainer { encode_container: "type_container".into() },
        );
        var.encoding(&PropertyLocation::Coder { coder: "encoder".into(), key_type: "CodingKeys".into() });
    }

    #[test]
    fn shared_container_forwards_decoding() {
        let base = BasicPropertyVariable::new("tag", FieldType::String);
        let location = PropertyLocation::Coder { coder: "decoder".into(), key_type: "CodingKeys".into() };
        let expected = base.decoding(&location);
        let var = ComposedVariable::new(base, SharedContainer { encode_container: "c".into() });
        assert_eq!(var.decoding(&location), expected);
        assert_eq!(var.require_encodable(), Some(false));
    }
}
