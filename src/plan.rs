//! Plan assembly: cases plus a switcher in, one decode and one encode plan out.
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::case::{CaseVariable, FieldBinding};
use crate::decl::{SumTypeDecl, Tagging};
use crate::error::{AssemblyError, Diagnostic, DiagnosticKind, Subject};
use crate::ir::{CodeBlock, Expr, Ident, Stmt, TagType, TagValue};
use crate::keys::{identifier_for, CodingKeysDecl, DuplicateKey, KeyRegistry};
use crate::switcher::{builders, AdjacentSwitcher, InternalSwitcher, Switcher, SwitcherLocation, TagSwitcher};

pub const DECODER: &str = "decoder";
pub const ENCODER: &str = "encoder";
pub const CODING_KEYS: &str = "CodingKeys";
pub const TYPE_CONTAINER: &str = "type_container";
pub const CONTENT_DECODER: &str = "content_decoder";
pub const CONTENT_ENCODER: &str = "content_encoder";
/// Value binding holding the decoded tag.
pub const TAG_BINDING: &str = "__tag";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeArm {
    pub case: String,
    pub tag: TagValue,
    pub body: CodeBlock,
    /// Bindings collected into the decoded value, in declaration order.
    pub fields: Vec<FieldBinding>,
}

/// What decoding does when the tag matches no arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultArm {
    /// Index of the arm decoded instead.
    Fallback(usize),
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodePlan {
    pub location: SwitcherLocation,
    pub prelude: CodeBlock,
    pub subject: Expr,
    pub arms: Vec<DecodeArm>,
    pub default: DefaultArm,
    /// Wire path of the tag, for error locations.
    pub tag_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeArm {
    pub case: String,
    pub tag: TagValue,
    pub tag_binding: Ident,
    pub fields: Vec<FieldBinding>,
    pub body: CodeBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub location: SwitcherLocation,
    pub prelude: CodeBlock,
    pub subject: Expr,
    pub arms: Vec<EncodeArm>,
}

/// Whether field types need decode / encode support at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub decodable: bool,
    pub encodable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub type_name: String,
    pub tag_type: TagType,
    pub coding_keys: CodingKeysDecl,
    pub auxiliary: Vec<CodingKeysDecl>,
    pub requirements: Requirements,
    pub decode: DecodePlan,
    pub encode: EncodePlan,
}

/// Result of [`assemble`]. `plan` is `None` only when the tag slots
/// themselves could not be laid out; every other problem drops the offending
/// field or case and is reported in `diagnostics`.
#[derive(Debug)]
pub struct Assembly {
    pub plan: Option<Plan>,
    pub diagnostics: Vec<Diagnostic>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Assembly {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The plan, unless any error was reported.
    pub fn into_result(self, type_name: &str) -> Result<Plan, AssemblyError> {
        let failed = self.has_errors();
        match self.plan {
            Some(plan) if !failed => Ok(plan),
            _ => Err(AssemblyError { type_name: type_name.to_string(), diagnostics: self.diagnostics }),
        }
    }
}

impl Plan {
    pub fn arm_for_case(&self, case: &str) -> Option<&EncodeArm> {
        self.encode.arms.iter().find(|arm| arm.case == case)
    }
}

pub fn assemble(decl: &SumTypeDecl) -> Assembly {
    let span = tracing::debug_span!("assemble", type_name = %decl.name);
    let _guard = span.enter();

    let mut diagnostics = Vec::new();
    let decl = normalize_identifier_default(decl, &mut diagnostics);
    let mut registry = KeyRegistry::new();

    let switcher = match build_switcher(&decl, &mut registry) {
        Ok(switcher) => switcher,
        Err(err) => {
            diagnostics.push(Diagnostic::error(Subject::SumType(decl.name.clone()), err));
            report(&decl.name, &diagnostics);
            return Assembly { plan: None, diagnostics };
        }
    };

    let share_root = switcher.shares_root_container();
    let mut seen = IndexSet::new();
    let mut cases = Vec::new();
    for case in &decl.cases {
        if !seen.insert(case.name.as_str()) {
            diagnostics.push(Diagnostic::error(
                Subject::Case(case.name.clone()),
                DiagnosticKind::DuplicateCase { case: case.name.clone() },
            ));
            continue;
        }
        cases.push(CaseVariable::new(case, &mut registry, share_root, &mut diagnostics));
    }

    let tagged = resolve_tags(&switcher, &cases, &mut diagnostics);

    let decoding = switcher.decoding(&SwitcherLocation { coder: DECODER.into(), key_type: CODING_KEYS.into() });
    let default = match (&decl.fallback, decoding.default_case) {
        (Some(fallback), true) => match tagged.iter().position(|(case, _)| case.name() == fallback) {
            Some(index) => DefaultArm::Fallback(index),
            None => {
                diagnostics.push(Diagnostic::error(
                    Subject::SumType(decl.name.clone()),
                    DiagnosticKind::UnknownFallback { case: fallback.clone() },
                ));
                DefaultArm::Fail
            }
        },
        _ => DefaultArm::Fail,
    };
    let decode = DecodePlan {
        location: SwitcherLocation { coder: DECODER.into(), key_type: CODING_KEYS.into() },
        prelude: decoding.code.clone(),
        subject: decoding.expr.clone(),
        arms: tagged
            .iter()
            .map(|(case, tag)| DecodeArm {
                case: case.name().to_string(),
                tag: tag.clone(),
                body: case.decoding(&decoding.data, CODING_KEYS),
                fields: case.decoded_fields(),
            })
            .collect(),
        default,
        tag_path: switcher.tag_path(),
    };

    let encoding = switcher.encoding(&SwitcherLocation { coder: ENCODER.into(), key_type: CODING_KEYS.into() });
    let encode = EncodePlan {
        location: SwitcherLocation { coder: ENCODER.into(), key_type: CODING_KEYS.into() },
        prelude: encoding.code.clone(),
        subject: encoding.expr.clone(),
        arms: tagged
            .iter()
            .map(|(case, tag)| {
                let tag_binding = format!("{TAG_BINDING}_{}", identifier_for(case.name()));
                let mut body = CodeBlock::from(Stmt::Let { name: tag_binding.clone(), value: Expr::Tag(tag.clone()) });
                body.extend(case.encoding(&encoding.data, CODING_KEYS, &tag_binding));
                EncodeArm {
                    case: case.name().to_string(),
                    tag: tag.clone(),
                    tag_binding,
                    fields: case.encoded_fields(),
                    body,
                }
            })
            .collect(),
    };

    let requirements = requirements(&cases);
    tracing::debug!(cases = tagged.len(), keys = registry.len(), "plan assembled");
    report(&decl.name, &diagnostics);

    let plan = Plan {
        type_name: decl.name.clone(),
        tag_type: switcher.tag_type(),
        coding_keys: registry.coding_keys(CODING_KEYS),
        auxiliary: switcher.auxiliary_declarations(),
        requirements,
        decode,
        encode,
    };
    Assembly { plan: Some(plan), diagnostics }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn build_switcher(decl: &SumTypeDecl, registry: &mut KeyRegistry) -> Result<Switcher, DuplicateKey> {
    match &decl.tagging {
        Tagging::Internal { identifier } => {
            let switcher = InternalSwitcher::new(
                TYPE_CONTAINER,
                TAG_BINDING,
                decl.tag_type,
                identifier.keys(),
                registry,
                decl,
                builders::attributed,
            )?;
            Ok(Switcher::Internal(switcher))
        }
        Tagging::Adjacent { tag, content } => {
            let base = InternalSwitcher::new(
                TYPE_CONTAINER,
                TAG_BINDING,
                decl.tag_type,
                tag.keys(),
                registry,
                decl,
                builders::attributed,
            )?;
            let switcher = AdjacentSwitcher::new(base, CONTENT_DECODER, CONTENT_ENCODER, content.keys(), registry)?;
            Ok(Switcher::Adjacent(switcher))
        }
    }
}

/// Coerce the declared identifier default to the tag type, dropping it with
/// a diagnostic when it does not fit.
fn normalize_identifier_default(decl: &SumTypeDecl, diagnostics: &mut Vec<Diagnostic>) -> SumTypeDecl {
    let mut decl = decl.clone();
    if let Some(default) = decl.identifier_default.take() {
        match default.clone().coerce(decl.tag_type) {
            Some(coerced) => decl.identifier_default = Some(coerced),
            None => diagnostics.push(Diagnostic::error(
                Subject::SumType(decl.name.clone()),
                DiagnosticKind::TagTypeMismatch { tag: default, expected: decl.tag_type },
            )),
        }
    }
    decl
}

/// Cases paired with their switch tag. Cases whose tag does not fit the tag
/// type, or repeats an earlier case's tag, are reported and left out.
fn resolve_tags<'c>(
    switcher: &Switcher,
    cases: &'c [CaseVariable],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(&'c CaseVariable, TagValue)> {
    let expected = switcher.tag_type();
    let mut owners: IndexMap<TagValue, &str> = IndexMap::new();
    let mut tagged = Vec::new();
    for case in cases {
        let declared = switcher.key_expression(case);
        let subject = Subject::Case(case.name().to_string());
        let Some(tag) = declared.clone().coerce(expected) else {
            diagnostics.push(Diagnostic::error(subject, DiagnosticKind::TagTypeMismatch { tag: declared, expected }));
            continue;
        };
        if let Some(existing) = owners.get(&tag) {
            diagnostics.push(Diagnostic::error(
                subject,
                DiagnosticKind::DuplicateTag { tag, existing: existing.to_string() },
            ));
            continue;
        }
        owners.insert(tag.clone(), case.name());
        tagged.push((case, tag));
    }
    tagged
}

fn requirements(cases: &[CaseVariable]) -> Requirements {
    let variables = || cases.iter().flat_map(|case| case.variables());
    Requirements {
        decodable: variables().any(|v| v.is_decoded() && v.require_decodable().unwrap_or(true)),
        encodable: variables().any(|v| v.is_encoded() && v.require_encodable().unwrap_or(true)),
    }
}

fn report(type_name: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        tracing::warn!(type_name, "{diagnostic}");
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

fn write_block(f: &mut fmt::Formatter<'_>, code: &CodeBlock, indent: usize) -> fmt::Result {
    for stmt in code.iter() {
        writeln!(f, "{:indent$}{stmt}", "")?;
    }
    Ok(())
}

fn field_list(fields: &[FieldBinding]) -> String {
    fields.iter().map(|f| f.binding.as_str()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {} ({:?} tag)", self.type_name, self.tag_type)?;
        write!(f, "{}", self.coding_keys)?;
        for decl in &self.auxiliary {
            write!(f, "{decl}")?;
        }

        let mut bounds = Vec::new();
        if self.requirements.decodable {
            bounds.push("Decode");
        }
        if self.requirements.encodable {
            bounds.push("Encode");
        }
        if !bounds.is_empty() {
            writeln!(f, "// fields require: {}", bounds.join(" + "))?;
        }

        let name = &self.type_name;
        writeln!(f)?;
        writeln!(f, "fn decode({}) -> {name} {{", self.decode.location.coder)?;
        write_block(f, &self.decode.prelude, 4)?;
        writeln!(f, "    match {} {{", self.decode.subject)?;
        for arm in &self.decode.arms {
            writeln!(f, "        {} => {{", arm.tag)?;
            write_block(f, &arm.body, 12)?;
            writeln!(f, "            {name}::{} {{ {} }}", arm.case, field_list(&arm.fields))?;
            writeln!(f, "        }}")?;
        }
        match self.decode.default {
            DefaultArm::Fallback(index) => {
                let case = self.decode.arms.get(index).map(|arm| arm.case.as_str()).unwrap_or("?");
                writeln!(f, "        _ => /* fallback */ {case},")?;
            }
            DefaultArm::Fail => writeln!(f, "        other => fail!(UnmatchedTag(other)),")?,
        }
        writeln!(f, "    }}")?;
        writeln!(f, "}}")?;

        writeln!(f)?;
        writeln!(f, "fn encode({}, {}) {{", self.encode.subject, self.encode.location.coder)?;
        write_block(f, &self.encode.prelude, 4)?;
        writeln!(f, "    match {} {{", self.encode.subject)?;
        for arm in &self.encode.arms {
            writeln!(f, "        {name}::{} {{ {} }} => {{", arm.case, field_list(&arm.fields))?;
            write_block(f, &arm.body, 12)?;
            writeln!(f, "        }}")?;
        }
        writeln!(f, "    }}")?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{CaseDecl, FieldDecl, KeyPath};
    use crate::error::Severity;
    use crate::ir::FieldType;

    fn path(xs: &[&str]) -> KeyPath {
        KeyPath::new(xs.iter().copied()).unwrap()
    }

    fn shape(tagging: Tagging, cases: Vec<CaseDecl>) -> SumTypeDecl {
        SumTypeDecl {
            name: "Shape".into(),
            tagging,
            tag_type: TagType::String,
            identifier_default: None,
            fallback: None,
            cases,
        }
    }

    fn circle() -> CaseDecl {
        CaseDecl::new("circle", vec![FieldDecl::new("radius", FieldType::Double)])
    }

    fn square() -> CaseDecl {
        CaseDecl::new("square", vec![FieldDecl::new("side", FieldType::Double)])
    }

    fn internal() -> Tagging {
        Tagging::Internal { identifier: path(&["type"]) }
    }

    fn adjacent() -> Tagging {
        Tagging::Adjacent { tag: path(&["type"]), content: path(&["payload"]) }
    }

    #[test]
    fn arms_follow_declaration_order() {
        let decl = shape(internal(), vec![square(), circle()]);
        let plan = assemble(&decl).into_result("Shape").unwrap();
        let cases: Vec<_> = plan.decode.arms.iter().map(|a| a.case.as_str()).collect();
        assert_eq!(cases, ["square", "circle"]);
        let again = assemble(&decl).into_result("Shape").unwrap();
        assert_eq!(plan, again);
    }

    #[test]
    fn default_tags_are_case_names() {
        let plan = assemble(&shape(adjacent(), vec![circle()])).into_result("Shape").unwrap();
        assert_eq!(plan.decode.arms[0].tag, TagValue::Str("circle".into()));
        assert_eq!(plan.encode.arms[0].tag_binding, "__tag_circle");
        assert_eq!(plan.decode.default, DefaultArm::Fail);
        assert_eq!(plan.decode.tag_path, ["type"]);
        assert_eq!(plan.auxiliary.len(), 1);
    }

    #[test]
    fn internal_field_on_identifier_slot_is_duplicate_key() {
        let mut case = circle();
        let mut kind = FieldDecl::new("kind", FieldType::String);
        kind.path = Some(path(&["type"]));
        case.fields.push(kind);
        let assembly = assemble(&shape(internal(), vec![case]));
        assert!(assembly.has_errors());
        assert!(matches!(assembly.diagnostics[0].kind, DiagnosticKind::DuplicateKey(_)));
        // plan still built, offending field dropped
        let plan = assembly.plan.unwrap();
        assert_eq!(plan.decode.arms[0].fields.len(), 1);
    }

    #[test]
    fn field_above_nested_identifier_is_duplicate_key() {
        let tagging = Tagging::Internal { identifier: path(&["meta", "kind"]) };
        let mut case = circle();
        case.fields.push(FieldDecl::new("meta", FieldType::Int));
        let assembly = assemble(&shape(tagging, vec![case]));
        match &assembly.diagnostics[..] {
            [d] => match &d.kind {
                DiagnosticKind::DuplicateKey(dup) => assert_eq!(dup.conflict, ["meta", "kind"]),
                other => panic!("unexpected diagnostic {other:?}"),
            },
            other => panic!("unexpected diagnostics {other:?}"),
        }
        let plan = assembly.plan.unwrap();
        assert_eq!(plan.decode.arms[0].fields.len(), 1);
    }

    #[test]
    fn content_enclosing_tag_fails_layout() {
        let tagging = Tagging::Adjacent { tag: path(&["meta", "kind"]), content: path(&["meta"]) };
        let assembly = assemble(&shape(tagging, vec![circle()]));
        assert!(assembly.plan.is_none());
        assert!(matches!(assembly.diagnostics[..], [Diagnostic { kind: DiagnosticKind::DuplicateKey(_), .. }]));
    }

    #[test]
    fn adjacent_fields_do_not_collide_with_tag() {
        let mut case = circle();
        case.fields.push(FieldDecl::new("type", FieldType::String));
        let assembly = assemble(&shape(adjacent(), vec![case]));
        assert!(!assembly.has_errors(), "{:?}", assembly.diagnostics);
    }

    #[test]
    fn tag_validation() {
        let mut decl = shape(internal(), vec![circle(), square()]);
        decl.cases[1].tag = Some(TagValue::Str("circle".into()));
        decl.fallback = Some("triangle".into());
        let mut one = CaseDecl::new("one", Vec::new());
        one.tag = Some(TagValue::Int(1));
        decl.cases.push(one);
        decl.cases.push(circle());

        let assembly = assemble(&decl);
        let kinds: Vec<_> = assembly.diagnostics.iter().map(|d| &d.kind).collect();
        assert!(matches!(kinds[0], DiagnosticKind::DuplicateCase { .. }));
        assert!(kinds.iter().any(|k| matches!(k, DiagnosticKind::DuplicateTag { existing, .. } if existing == "circle")));
        assert!(kinds.iter().any(|k| matches!(k, DiagnosticKind::TagTypeMismatch { .. })));
        assert!(kinds.iter().any(|k| matches!(k, DiagnosticKind::UnknownFallback { .. })));
        assert_eq!(assembly.plan.unwrap().decode.arms.len(), 1);
    }

    #[test]
    fn explicit_fallback_for_both_strategies() {
        for tagging in [internal(), adjacent()] {
            let mut decl = shape(tagging, vec![circle(), square()]);
            decl.fallback = Some("square".into());
            let plan = assemble(&decl).into_result("Shape").unwrap();
            assert_eq!(plan.decode.default, DefaultArm::Fallback(1));
        }
    }

    #[test]
    fn mismatched_identifier_default_is_reported() {
        let mut decl = shape(internal(), vec![circle()]);
        decl.tag_type = TagType::Int;
        decl.cases[0].tag = Some(TagValue::Int(1));
        decl.identifier_default = Some(TagValue::Str("one".into()));
        let err = assemble(&decl).into_result("Shape").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert!(matches!(err.diagnostics[0].kind, DiagnosticKind::TagTypeMismatch { .. }));
    }

    #[test]
    fn content_on_tag_slot_fails_assembly() {
        let decl = shape(Tagging::Adjacent { tag: path(&["type"]), content: path(&["type"]) }, vec![circle()]);
        let assembly = assemble(&decl);
        assert!(assembly.plan.is_none());
        assert_eq!(assembly.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn rendering_mentions_every_case() {
        let plan = assemble(&shape(adjacent(), vec![circle(), square()])).into_result("Shape").unwrap();
        let text = plan.to_string();
        assert!(text.contains("Shape::circle { radius }"));
        assert!(text.contains("Shape::square { side }"));
        assert!(text.contains("UnmatchedTag"));
        assert!(text.contains("super_decoder(payload)"));
    }
}
