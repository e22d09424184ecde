//! One case of a sum type and its associated variables.
use indexmap::IndexSet;

use crate::decl::CaseDecl;
use crate::error::{Diagnostic, DiagnosticKind, Subject};
use crate::ir::{CodeBlock, Ident, TagValue};
use crate::keys::KeyRegistry;
use crate::switcher::CaseData;
use crate::tree::PropertyTree;
use crate::variable::{BasicPropertyVariable, PropertyLocation, PropertyVariable};

/// Container opened over a case's coder handle.
pub const CASE_CONTAINER: &str = "case_container";

/// A field of a case as seen by plan arms: wire field name and the value
/// binding the plan reads it from / writes it to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field: String,
    pub binding: Ident,
    /// Encoding fails when the value lacks this field.
    pub required: bool,
}

#[derive(Debug)]
pub struct CaseVariable {
    name: String,
    tag: Option<TagValue>,
    tree: PropertyTree,
}

impl CaseVariable {
    /// Register the case's fields. Fields whose key path is already taken
    /// (within the case, or in the root container when `share_root`) are
    /// reported and left out of the plan.
    pub fn new(
        decl: &CaseDecl,
        registry: &mut KeyRegistry,
        share_root: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut tree = PropertyTree::new(CASE_CONTAINER);
        if !share_root {
            tree = tree.with_forced_container();
        }
        let mut names = IndexSet::new();
        for field in &decl.fields {
            let subject = Subject::Field { case: decl.name.clone(), field: field.name.clone() };
            if !names.insert(field.name.as_str()) {
                diagnostics.push(Diagnostic::error(
                    subject,
                    DiagnosticKind::DuplicateField { field: field.name.clone() },
                ));
                continue;
            }
            let variable = BasicPropertyVariable::new(field.name.clone(), field.ty.clone())
                .with_default(field.default.clone())
                .with_flags(field.decode, field.encode);
            if !variable.is_emitted() {
                tracing::debug!(case = %decl.name, field = %field.name, "field neither decoded nor encoded");
                continue;
            }
            if !variable.is_decoded() && variable.value.is_none() {
                diagnostics.push(Diagnostic::warning(
                    subject.clone(),
                    DiagnosticKind::DecodeDisabledWithoutDefault { field: field.name.clone() },
                ));
            }
            match registry.add_in_case(&decl.name, &field.key_path(), &field.name, share_root) {
                Ok(keys) => tree.register(Box::new(variable), &keys),
                Err(err) => diagnostics.push(Diagnostic::error(subject, err)),
            }
        }
        Self { name: decl.name.clone(), tag: decl.tag.clone(), tree }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag value written in the declaration, if any.
    pub fn explicit_tag(&self) -> Option<&TagValue> {
        self.tag.as_ref()
    }

    pub fn variables(&self) -> Vec<&dyn PropertyVariable> {
        self.tree.variables()
    }

    pub fn decoded_fields(&self) -> Vec<FieldBinding> {
        self.variables()
            .into_iter()
            .filter(|v| v.is_decoded() || v.default_value().is_some())
            .map(|v| FieldBinding { field: v.name().to_string(), binding: v.name().to_string(), required: false })
            .collect()
    }

    pub fn encoded_fields(&self) -> Vec<FieldBinding> {
        self.variables()
            .into_iter()
            .filter(|v| v.is_encoded())
            .map(|v| FieldBinding {
                field: v.name().to_string(),
                binding: v.name().to_string(),
                required: !v.ty().is_optional(),
            })
            .collect()
    }

    /// Field decoding against the handle the switcher routed this case to.
    pub fn decoding(&self, data: &CaseData<'_>, key_type: &str) -> CodeBlock {
        self.tree.decoding(&PropertyLocation::Coder {
            coder: data.handle().clone(),
            key_type: key_type.to_string(),
        })
    }

    /// Tag binding, the switcher's payload code, then field encoding.
    pub fn encoding(&self, data: &CaseData<'_>, key_type: &str, tag_binding: &str) -> CodeBlock {
        let mut code = data.payload().build(tag_binding);
        code.extend(self.tree.encoding(&PropertyLocation::Coder {
            coder: data.handle().clone(),
            key_type: key_type.to_string(),
        }));
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::FieldDecl;
    use crate::ir::FieldType;

    #[test]
    fn duplicate_field_names_are_flagged() {
        let decl = CaseDecl::new(
            "circle",
            vec![FieldDecl::new("radius", FieldType::Double), FieldDecl::new("radius", FieldType::Int)],
        );
        let mut reg = KeyRegistry::new();
        let mut diagnostics = Vec::new();
        let case = CaseVariable::new(&decl, &mut reg, false, &mut diagnostics);
        assert_eq!(case.variables().len(), 1);
        assert_eq!(case.variables()[0].ty(), &FieldType::Double);
        assert!(matches!(diagnostics[0].kind, DiagnosticKind::DuplicateField { .. }));
    }

    #[test]
    fn colliding_paths_keep_first_field() {
        let mut second = FieldDecl::new("r", FieldType::Double);
        second.path = crate::decl::KeyPath::new(["radius"]);
        let decl = CaseDecl::new("circle", vec![FieldDecl::new("radius", FieldType::Double), second]);
        let mut reg = KeyRegistry::new();
        let mut diagnostics = Vec::new();
        let case = CaseVariable::new(&decl, &mut reg, false, &mut diagnostics);
        let names: Vec<_> = case.variables().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, ["radius"]);
        match &diagnostics[..] {
            [d] => match &d.kind {
                DiagnosticKind::DuplicateKey(dup) => {
                    assert_eq!(dup.existing, "radius");
                    assert_eq!(dup.field, "r");
                }
                other => panic!("unexpected diagnostic {other:?}"),
            },
            other => panic!("unexpected diagnostics {other:?}"),
        }
    }

    #[test]
    fn encoded_fields_mark_optional_as_not_required() {
        let decl = CaseDecl::new(
            "point",
            vec![
                FieldDecl::new("x", FieldType::Int),
                FieldDecl::new("label", FieldType::Optional(Box::new(FieldType::String))),
            ],
        );
        let mut reg = KeyRegistry::new();
        let case = CaseVariable::new(&decl, &mut reg, true, &mut Vec::new());
        let required: Vec<_> = case.encoded_fields().iter().map(|f| f.required).collect();
        assert_eq!(required, [true, false]);
    }
}
