//! Key-path indexed tree of property variables.
//!
//! Containers are opened while walking the tree: one keyed container per coder
//! location, one nested container per key prefix that has children. Leaves
//! emit their own code against whatever container is open at their depth.
use indexmap::IndexMap;

use crate::ir::{CodeBlock, Ident, Mode, Stmt};
use crate::keys::{CodingKey, RegisteredPath};
use crate::variable::{PropertyLocation, PropertyVariable};

/// Key type used for containers opened below a container slot.
pub const DEFAULT_KEY_TYPE: &str = "CodingKeys";

#[derive(Debug, Default)]
struct Node {
    variables: Vec<Box<dyn PropertyVariable>>,
    children: IndexMap<CodingKey, Node>,
}

#[derive(Debug)]
pub struct PropertyTree {
    root: Node,
    container: Ident,
    force_container: bool,
}

impl Node {
    fn register(&mut self, variable: Box<dyn PropertyVariable>, keys: &[CodingKey]) {
        match keys.split_first() {
            None => self.variables.push(variable),
            Some((first, rest)) => self
                .children
                .entry(first.clone())
                .or_default()
                .register(variable, rest),
        }
    }

    fn has_work(&self, mode: Mode) -> bool {
        let enabled = |v: &Box<dyn PropertyVariable>| match mode {
            Mode::Decode => v.is_decoded() || v.default_value().is_some(),
            Mode::Encode => v.is_encoded(),
        };
        self.variables.iter().any(enabled) || self.children.values().any(|c| c.has_work(mode))
    }

    fn len(&self) -> usize {
        self.variables.len() + self.children.values().map(Node::len).sum::<usize>()
    }
}

impl PropertyTree {
    /// `container` names the keyed container opened at the root.
    pub fn new(container: impl Into<Ident>) -> Self {
        Self { root: Node::default(), container: container.into(), force_container: false }
    }

    /// Always open the root container when encoding, even with nothing to write.
    pub fn with_forced_container(mut self) -> Self {
        self.force_container = true;
        self
    }

    pub fn register(&mut self, variable: Box<dyn PropertyVariable>, keys: &RegisteredPath) {
        tracing::debug!(variable = variable.name(), path = ?keys.wire(), "register property");
        self.root.register(variable, &keys.0);
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variables in registration order, depth first.
    pub fn variables(&self) -> Vec<&dyn PropertyVariable> {
        fn collect<'a>(node: &'a Node, out: &mut Vec<&'a dyn PropertyVariable>) {
            out.extend(node.variables.iter().map(|v| v.as_ref()));
            for child in node.children.values() {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    pub fn decoding(&self, location: &PropertyLocation) -> CodeBlock {
        self.walk(location, Mode::Decode)
    }

    pub fn encoding(&self, location: &PropertyLocation) -> CodeBlock {
        self.walk(location, Mode::Encode)
    }

    fn walk(&self, location: &PropertyLocation, mode: Mode) -> CodeBlock {
        let mut code = CodeBlock::new();
        for variable in &self.root.variables {
            code.extend(emit(variable.as_ref(), location, mode));
        }
        let forced = self.force_container && mode == Mode::Encode;
        if !self.root.children.values().any(|c| c.has_work(mode)) && !forced {
            return code;
        }
        match location {
            PropertyLocation::Coder { coder, key_type } => {
                code.push(Stmt::KeyedContainer {
                    name: self.container.clone(),
                    coder: coder.clone(),
                    key_type: key_type.clone(),
                    mode,
                });
                code.extend(walk_children(&self.root, &self.container, key_type, mode));
            }
            PropertyLocation::Container { container, key } => {
                // rooted at a slot: children live one level further down
                let nested = format!("{container}_{}", key.name);
                code.push(Stmt::NestedContainer {
                    name: nested.clone(),
                    parent: container.clone(),
                    key: key.clone(),
                    key_type: DEFAULT_KEY_TYPE.to_string(),
                    mode,
                });
                code.extend(walk_children(&self.root, &nested, &DEFAULT_KEY_TYPE.to_string(), mode));
            }
        }
        code
    }
}

fn emit(variable: &dyn PropertyVariable, location: &PropertyLocation, mode: Mode) -> CodeBlock {
    match mode {
        Mode::Decode => variable.decoding(location),
        Mode::Encode => variable.encoding(location),
    }
}

fn walk_children(node: &Node, container: &Ident, key_type: &Ident, mode: Mode) -> CodeBlock {
    let mut code = CodeBlock::new();
    for (key, child) in &node.children {
        let location = PropertyLocation::Container { container: container.clone(), key: key.clone() };
        for variable in &child.variables {
            code.extend(emit(variable.as_ref(), &location, mode));
        }
        if child.children.values().any(|c| c.has_work(mode)) {
            let nested = format!("{container}_{}", key.name);
            code.push(Stmt::NestedContainer {
                name: nested.clone(),
                parent: container.clone(),
                key: key.clone(),
                key_type: key_type.clone(),
                mode,
            });
            code.extend(walk_children(child, &nested, key_type, mode));
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FieldType;
    use crate::keys::KeyRegistry;
    use crate::variable::BasicPropertyVariable;

    fn coder() -> PropertyLocation {
        PropertyLocation::Coder { coder: "decoder".into(), key_type: "CodingKeys".into() }
    }

    fn tree_with(paths: &[(&str, &str)]) -> PropertyTree {
        let mut reg = KeyRegistry::new();
        let mut tree = PropertyTree::new("container");
        for (name, path) in paths {
            let path: Vec<String> = path.split('.').map(|s| s.to_string()).collect();
            let keys = reg.add(&path, name).unwrap();
            tree.register(Box::new(BasicPropertyVariable::new(*name, FieldType::Int)), &keys);
        }
        tree
    }

    fn count_nested(code: &CodeBlock) -> Vec<String> {
        code.iter()
            .filter_map(|s| match s {
                Stmt::NestedContainer { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn shared_prefix_opens_one_nested_container() {
        let tree = tree_with(&[("x", "pos.x"), ("y", "pos.y"), ("id", "id")]);
        let code = tree.decoding(&coder());
        assert_eq!(count_nested(&code), ["container_pos"]);
        assert!(matches!(code.0[0], Stmt::KeyedContainer { .. }));
        let encoded = tree.encoding(&coder());
        assert_eq!(count_nested(&encoded), ["container_pos"]);
        assert_eq!(tree.variables().iter().map(|v| v.name()).collect::<Vec<_>>(), ["x", "y", "id"]);
    }

    #[test]
    fn empty_tree_opens_nothing_unless_forced() {
        let tree = PropertyTree::new("container");
        assert!(tree.decoding(&coder()).is_empty());
        let forced = PropertyTree::new("container").with_forced_container();
        assert_eq!(forced.encoding(&coder()).0.len(), 1);
        assert!(forced.decoding(&coder()).is_empty());
    }

    #[test]
    fn slot_rooted_tree_nests_under_the_slot() {
        let tree = tree_with(&[("x", "x"), ("y", "y")]);
        let mut reg = KeyRegistry::new();
        let body = reg.intern("body");
        let location = PropertyLocation::Container { container: "outer".into(), key: body.clone() };
        let code = tree.decoding(&location);
        match &code.0[0] {
            Stmt::NestedContainer { name, parent, key, key_type, mode } => {
                assert_eq!((name.as_str(), parent.as_str()), ("outer_body", "outer"));
                assert_eq!((key, key_type.as_str(), *mode), (&body, DEFAULT_KEY_TYPE, Mode::Decode));
            }
            other => panic!("unexpected statement {other}"),
        }
        let containers: Vec<_> = code.0[1..]
            .iter()
            .filter_map(|s| match s {
                Stmt::DecodeKey { container, .. } => Some(container.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(containers, ["outer_body", "outer_body"]);
        assert_eq!(count_nested(&tree.encoding(&location)), ["outer_body"]);
    }

    #[test]
    fn disabled_subtree_is_skipped() {
        let mut reg = KeyRegistry::new();
        let mut tree = PropertyTree::new("container");
        let keys = reg.add(&["a".to_string(), "b".to_string()], "b").unwrap();
        let var = BasicPropertyVariable::new("b", FieldType::Int).with_flags(None, Some(false));
        tree.register(Box::new(var), &keys);
        assert!(tree.encoding(&coder()).is_empty());
        assert!(!tree.decoding(&coder()).is_empty());
    }
}
