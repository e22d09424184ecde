//! Coding key interning and key path registration.
//!
//! Every key path declared by a variable goes through a [`KeyRegistry`]. Keys
//! are interned by wire text so the same key declared from two places is one
//! key, and full paths are claimed per container scope so two fields landing
//! on the same slot are reported instead of silently overwriting each other.
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::Ident;

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

const RESERVED: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "false", "fn", "for", "if",
    "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self",
    "Self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where",
    "while",
];

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// An interned coding key. `wire` is the text found in documents, `name` the
/// identifier used when the key is rendered. Equality is by wire text.
#[derive(Debug, Clone, Eq)]
pub struct CodingKey {
    pub name: Ident,
    pub wire: String,
}

/// A key path after registration, one interned key per segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisteredPath(pub Vec<CodingKey>);

/// Container scope a path is claimed in. Paths of different cases never
/// collide with each other; they collide with root claims only when the case
/// shares the root container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Root,
    Case(String),
}

/// Two claims on the same slot, or one claim on a slot inside the other's
/// value. `conflict` is the path already claimed by `existing`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "key path `{}` of `{field}` overlaps `{}` used by `{existing}`",
    path.join("."),
    conflict.join(".")
)]
pub struct DuplicateKey {
    pub path: Vec<String>,
    pub conflict: Vec<String>,
    pub existing: String,
    pub field: String,
}

/// Rendered key table, e.g. the CodingKeys type of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingKeysDecl {
    pub type_name: Ident,
    pub keys: Vec<CodingKey>,
}

#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: IndexMap<String, CodingKey>,
    names: HashSet<Ident>,
    claims: IndexMap<Scope, IndexMap<Vec<String>, String>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl PartialEq for CodingKey {
    fn eq(&self, other: &Self) -> bool {
        self.wire == other.wire
    }
}

impl Hash for CodingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wire.hash(state);
    }
}

impl fmt::Display for CodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire)
    }
}

impl RegisteredPath {
    pub fn last(&self) -> Option<&CodingKey> {
        self.0.last()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn wire(&self) -> Vec<String> {
        self.0.iter().map(|k| k.wire.clone()).collect()
    }
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `keys` for `field` in the root scope.
    pub fn add(&mut self, keys: &[String], field: &str) -> Result<RegisteredPath, DuplicateKey> {
        self.claim(Scope::Root, keys, field, false)
    }

    /// Register `keys` for `field` of `case`. With `share_root` the case's
    /// fields live in the root container, so root claims are checked too.
    pub fn add_in_case(
        &mut self,
        case: &str,
        keys: &[String],
        field: &str,
        share_root: bool,
    ) -> Result<RegisteredPath, DuplicateKey> {
        self.claim(Scope::Case(case.to_string()), keys, field, share_root)
    }

    fn claim(
        &mut self,
        scope: Scope,
        keys: &[String],
        field: &str,
        share_root: bool,
    ) -> Result<RegisteredPath, DuplicateKey> {
        let path = keys.to_vec();
        let root = Scope::Root;
        let mut owners = vec![&scope];
        if share_root && scope != root {
            owners.push(&root);
        }
        for owner in owners {
            let Some(claims) = self.claims.get(owner) else {
                continue;
            };
            // re-adding a field's own path in its own scope is a no-op
            let conflict = claims.iter().find(|(claimed, existing)| {
                overlaps(claimed, &path) && !(owner == &scope && existing.as_str() == field)
            });
            if let Some((claimed, existing)) = conflict {
                tracing::debug!(field, existing = %existing, path = ?path, claimed = ?claimed, "conflicting key path");
                return Err(DuplicateKey {
                    path,
                    conflict: claimed.clone(),
                    existing: existing.clone(),
                    field: field.to_string(),
                });
            }
        }
        self.claims
            .entry(scope)
            .or_default()
            .entry(path)
            .or_insert_with(|| field.to_string());
        Ok(RegisteredPath(keys.iter().map(|key| self.intern(key)).collect()))
    }

    /// Intern a single key, deriving a unique identifier name on first sight.
    pub fn intern(&mut self, wire: &str) -> CodingKey {
        if let Some(key) = self.keys.get(wire) {
            return key.clone();
        }
        let base = identifier_for(wire);
        let mut name = base.clone();
        let mut n = 1;
        while self.names.contains(&name) {
            name = format!("{base}{n}");
            n += 1;
        }
        self.names.insert(name.clone());
        let key = CodingKey { name, wire: wire.to_string() };
        self.keys.insert(wire.to_string(), key.clone());
        key
    }

    pub fn get(&self, wire: &str) -> Option<&CodingKey> {
        self.keys.get(wire)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All interned keys in first-registration order.
    pub fn coding_keys(&self, type_name: &str) -> CodingKeysDecl {
        CodingKeysDecl {
            type_name: type_name.to_string(),
            keys: self.keys.values().cloned().collect(),
        }
    }
}

impl fmt::Display for CodingKeysDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "enum {} {{", self.type_name)?;
        for key in &self.keys {
            writeln!(f, "    {} = {:?},", key.name, key.wire)?;
        }
        writeln!(f, "}}")
    }
}

/// Equal paths, or one path a prefix of the other.
fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

/// Identifier form of a wire key.
pub fn identifier_for(wire: &str) -> Ident {
    let mut name = NON_IDENT.replace_all(wire, "_").into_owned();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn interns_keys_once() {
        let mut reg = KeyRegistry::new();
        let a = reg.add(&path(&["meta", "kind"]), "kind").unwrap();
        let b = reg.add(&path(&["meta", "id"]), "id").unwrap();
        assert_eq!(a.0[0], b.0[0]);
        assert_eq!(reg.len(), 3);
        let decl = reg.coding_keys("CodingKeys");
        let wires: Vec<_> = decl.keys.iter().map(|k| k.wire.as_str()).collect();
        assert_eq!(wires, ["meta", "kind", "id"]);
    }

    #[test]
    fn duplicate_full_path_keeps_first_owner() {
        let mut reg = KeyRegistry::new();
        reg.add(&path(&["a", "b"]), "first").unwrap();
        let err = reg.add(&path(&["a", "b"]), "second").unwrap_err();
        assert_eq!(err.existing, "first");
        assert_eq!(err.field, "second");
        // still owned by the first field
        assert!(reg.add(&path(&["a", "b"]), "first").is_ok());
    }

    #[test]
    fn prefix_paths_conflict_both_ways() {
        let mut reg = KeyRegistry::new();
        reg.add(&path(&["meta", "kind"]), "__tag").unwrap();
        let err = reg.add_in_case("event", &path(&["meta"]), "meta", true).unwrap_err();
        assert_eq!(err.conflict, ["meta", "kind"]);
        assert_eq!(err.existing, "__tag");
        assert_eq!(err.to_string(), "key path `meta` of `meta` overlaps `meta.kind` used by `__tag`");
        assert!(reg.add_in_case("event", &path(&["meta", "source"]), "source", true).is_ok());

        reg.add_in_case("pair", &path(&["a"]), "a", false).unwrap();
        let err = reg.add_in_case("pair", &path(&["a", "b"]), "b", false).unwrap_err();
        assert_eq!(err.path, ["a", "b"]);
        assert_eq!(err.conflict, ["a"]);
        assert!(reg.add_in_case("other", &path(&["a", "b"]), "b", false).is_ok());
    }

    #[test]
    fn root_claims_bind_case_fields_of_any_name() {
        let mut reg = KeyRegistry::new();
        reg.add(&path(&["type"]), "type").unwrap();
        let err = reg.add_in_case("circle", &path(&["type"]), "type", true).unwrap_err();
        assert_eq!(err.existing, "type");
    }

    #[test]
    fn case_scopes_are_isolated_unless_sharing_root() {
        let mut reg = KeyRegistry::new();
        reg.add(&path(&["type"]), "type").unwrap();
        assert!(reg.add_in_case("circle", &path(&["radius"]), "radius", true).is_ok());
        assert!(reg.add_in_case("square", &path(&["radius"]), "radius", true).is_ok());
        assert!(reg.add_in_case("circle", &path(&["type"]), "kind", false).is_ok());
        let err = reg.add_in_case("square", &path(&["type"]), "kind", true).unwrap_err();
        assert_eq!(err.existing, "type");
    }

    #[test]
    fn identifier_names_are_sanitized_and_unique() {
        let mut reg = KeyRegistry::new();
        assert_eq!(reg.intern("first-name").name, "first_name");
        assert_eq!(reg.intern("first_name").name, "first_name1");
        assert_eq!(reg.intern("type").name, "type_");
        assert_eq!(reg.intern("2d").name, "_2d");
    }
}
