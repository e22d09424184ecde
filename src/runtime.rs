//! Plan interpreter over `serde_json::Value`.
//!
//! Handles (coders and containers) and values live in separate namespaces.
//! While decoding a handle is a node of the input document, possibly missing;
//! while encoding it is a key path into the output being built.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeError, EncodeError};
use crate::ir::{CodeBlock, Expr, FieldType, Ident, Mode, Stmt};
use crate::plan::{DefaultArm, Plan};

/// A runtime value of a sum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub case: String,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

impl EnumValue {
    pub fn new(case: impl Into<String>) -> Self {
        Self { case: case.into(), fields: IndexMap::new() }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
struct Node<'v> {
    value: Option<&'v Value>,
    path: String,
}

struct DecodeScope<'v> {
    handles: IndexMap<Ident, Node<'v>>,
    values: IndexMap<Ident, Value>,
}

pub fn decode(plan: &Plan, document: &Value) -> Result<EnumValue, DecodeError> {
    let mut scope = DecodeScope {
        handles: IndexMap::from([(
            plan.decode.location.coder.clone(),
            Node { value: Some(document), path: "$".to_string() },
        )]),
        values: IndexMap::new(),
    };
    scope.run(&plan.decode.prelude)?;
    let subject = scope.eval(&plan.decode.subject)?;

    let unmatched = || DecodeError::UnmatchedTag { tag: subject.clone(), path: json_path(&plan.decode.tag_path) };
    let arm = match plan.decode.arms.iter().find(|arm| arm.tag.matches(&subject)) {
        Some(arm) => arm,
        None => match plan.decode.default {
            DefaultArm::Fallback(index) => plan.decode.arms.get(index).ok_or_else(unmatched)?,
            DefaultArm::Fail => return Err(unmatched()),
        },
    };
    tracing::trace!(case = %arm.case, tag = %subject, "decode arm");
    scope.run(&arm.body)?;

    let fields = arm
        .fields
        .iter()
        .filter_map(|f| scope.values.get(&f.binding).map(|v| (f.field.clone(), v.clone())))
        .collect();
    Ok(EnumValue { case: arm.case.clone(), fields })
}

impl<'v> DecodeScope<'v> {
    fn node(&self, name: &str) -> Result<Node<'v>, DecodeError> {
        self.handles.get(name).cloned().ok_or_else(|| DecodeError::Unbound(name.to_string()))
    }

    fn object(&self, name: &str) -> Result<(Option<&'v Map<String, Value>>, String), DecodeError> {
        let node = self.node(name)?;
        match node.value {
            None | Some(Value::Null) => Ok((None, node.path)),
            Some(Value::Object(map)) => Ok((Some(map), node.path)),
            Some(_) => Err(DecodeError::ExpectedObject { path: node.path }),
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, DecodeError> {
        match expr {
            Expr::Var(name) => self.values.get(name).cloned().ok_or_else(|| DecodeError::Unbound(name.clone())),
            Expr::Tag(tag) => Ok(tag.to_json()),
            Expr::Literal(value) => Ok(value.clone()),
        }
    }

    fn run(&mut self, code: &CodeBlock) -> Result<(), DecodeError> {
        for stmt in code.iter() {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), DecodeError> {
        match stmt {
            Stmt::BindCoder { name, coder } | Stmt::BindContainer { name, container: coder } => {
                let node = self.node(coder)?;
                self.handles.insert(name.clone(), node);
            }
            Stmt::KeyedContainer { name, coder, .. } => {
                let node = self.node(coder)?;
                match node.value {
                    Some(Value::Object(_)) => {}
                    _ => return Err(DecodeError::ExpectedObject { path: node.path }),
                }
                self.handles.insert(name.clone(), node);
            }
            Stmt::NestedContainer { name, parent, key, .. } => {
                let (map, path) = self.object(parent)?;
                let child = map.and_then(|m| m.get(&key.wire));
                let path = format!("{path}.{}", key.wire);
                if let Some(value) = child.filter(|v| !v.is_object() && !v.is_null()) {
                    tracing::trace!(%value, %path, "nested container is not an object");
                    return Err(DecodeError::ExpectedObject { path });
                }
                self.handles.insert(name.clone(), Node { value: child, path });
            }
            Stmt::SuperCoder { name, container, key, mode: Mode::Decode } => {
                let (map, path) = self.object(container)?;
                let node = Node { value: map.and_then(|m| m.get(&key.wire)), path: format!("{path}.{}", key.wire) };
                self.handles.insert(name.clone(), node);
            }
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                self.values.insert(name.clone(), value);
            }
            Stmt::DecodeKey { name, ty, container, key, default } => {
                let (map, path) = self.object(container)?;
                let slot = map.and_then(|m| m.get(&key.wire));
                let value = read(ty, slot, default.as_ref(), &format!("{path}.{}", key.wire)).map_err(|err| {
                    match err {
                        DecodeError::MissingKey { .. } => DecodeError::MissingKey { key: key.wire.clone(), path },
                        other => other,
                    }
                })?;
                self.values.insert(name.clone(), value);
            }
            Stmt::DecodeCoder { name, ty, coder, default } => {
                let node = self.node(coder)?;
                let value = read(ty, node.value, default.as_ref(), &node.path)?;
                self.values.insert(name.clone(), value);
            }
            other => return Err(DecodeError::Unsupported(other.to_string())),
        }
        Ok(())
    }
}

/// Missing and null slots fall back to the default, then to null for
/// optional types.
fn read(ty: &FieldType, slot: Option<&Value>, default: Option<&Value>, path: &str) -> Result<Value, DecodeError> {
    match slot.filter(|v| !v.is_null()) {
        Some(value) if ty.check(value) => Ok(value.clone()),
        Some(value) => Err(DecodeError::TypeMismatch {
            expected: ty.to_string(),
            found: value.clone(),
            path: path.to_string(),
        }),
        None => match default {
            Some(default) => Ok(default.clone()),
            None if ty.is_optional() => Ok(Value::Null),
            None => Err(DecodeError::MissingKey { key: String::new(), path: path.to_string() }),
        },
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODING
// ————————————————————————————————————————————————————————————————————————————

struct EncodeScope {
    root: Value,
    handles: IndexMap<Ident, Vec<String>>,
    values: IndexMap<Ident, Value>,
}

pub fn encode(plan: &Plan, value: &EnumValue) -> Result<Value, EncodeError> {
    let arm = plan.arm_for_case(&value.case).ok_or_else(|| EncodeError::UnknownCase(value.case.clone()))?;
    let mut scope = EncodeScope {
        root: Value::Null,
        handles: IndexMap::from([(plan.encode.location.coder.clone(), Vec::new())]),
        values: IndexMap::new(),
    };
    for field in &arm.fields {
        let bound = match value.fields.get(&field.field) {
            Some(v) => v.clone(),
            None if field.required => {
                return Err(EncodeError::MissingField { case: arm.case.clone(), field: field.field.clone() });
            }
            None => Value::Null,
        };
        scope.values.insert(field.binding.clone(), bound);
    }
    tracing::trace!(case = %arm.case, "encode arm");
    scope.run(&plan.encode.prelude)?;
    scope.run(&arm.body)?;
    Ok(scope.root)
}

impl EncodeScope {
    fn path(&self, name: &str) -> Result<Vec<String>, EncodeError> {
        self.handles.get(name).cloned().ok_or_else(|| EncodeError::Unbound(name.to_string()))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EncodeError> {
        match expr {
            Expr::Var(name) => self.values.get(name).cloned().ok_or_else(|| EncodeError::Unbound(name.clone())),
            Expr::Tag(tag) => Ok(tag.to_json()),
            Expr::Literal(value) => Ok(value.clone()),
        }
    }

    fn run(&mut self, code: &CodeBlock) -> Result<(), EncodeError> {
        for stmt in code.iter() {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), EncodeError> {
        match stmt {
            Stmt::BindCoder { name, coder } | Stmt::BindContainer { name, container: coder } => {
                let path = self.path(coder)?;
                self.handles.insert(name.clone(), path);
            }
            Stmt::KeyedContainer { name, coder, .. } => {
                let path = self.path(coder)?;
                ensure_object(&mut self.root, &path)?;
                self.handles.insert(name.clone(), path);
            }
            Stmt::NestedContainer { name, parent, key, .. } => {
                let mut path = self.path(parent)?;
                path.push(key.wire.clone());
                ensure_object(&mut self.root, &path)?;
                self.handles.insert(name.clone(), path);
            }
            Stmt::SuperCoder { name, container, key, mode: Mode::Encode } => {
                let mut path = self.path(container)?;
                path.push(key.wire.clone());
                self.handles.insert(name.clone(), path);
            }
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                self.values.insert(name.clone(), value);
            }
            Stmt::EncodeKey { value, ty, container, key } => {
                let Some(encoded) = self.checked(value, ty)? else {
                    return Ok(());
                };
                let mut path = self.path(container)?;
                let map = ensure_object(&mut self.root, &path)?;
                if map.get(&key.wire).is_some_and(|existing| !existing.is_null()) {
                    path.push(key.wire.clone());
                    return Err(EncodeError::Occupied(json_path(&path)));
                }
                map.insert(key.wire.clone(), encoded);
            }
            Stmt::EncodeCoder { value, ty, coder } => {
                let Some(encoded) = self.checked(value, ty)? else {
                    return Ok(());
                };
                let path = self.path(coder)?;
                write_at(&mut self.root, &path, encoded)?;
            }
            other => return Err(EncodeError::Unsupported(other.to_string())),
        }
        Ok(())
    }

    /// The value to write, or `None` for an absent optional.
    fn checked(&self, expr: &Expr, ty: &FieldType) -> Result<Option<Value>, EncodeError> {
        let value = self.eval(expr)?;
        if value.is_null() && ty.is_optional() {
            return Ok(None);
        }
        if !ty.check(&value) {
            return Err(EncodeError::TypeMismatch { field: expr.to_string(), expected: ty.to_string(), found: value });
        }
        Ok(Some(value))
    }
}

/// Walk `path` from `root`, turning null slots into objects on the way.
fn ensure_object<'a>(root: &'a mut Value, path: &[String]) -> Result<&'a mut Map<String, Value>, EncodeError> {
    let mut current = root;
    for (depth, key) in path.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return Err(EncodeError::Occupied(json_path(&path[..depth])));
        };
        current = map.entry(key.clone()).or_insert(Value::Null);
    }
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => Ok(map),
        _ => Err(EncodeError::Occupied(json_path(path))),
    }
}

fn write_at(root: &mut Value, path: &[String], value: Value) -> Result<(), EncodeError> {
    let Some((last, parents)) = path.split_last() else {
        if !root.is_null() {
            return Err(EncodeError::Occupied(json_path(path)));
        }
        *root = value;
        return Ok(());
    };
    let map = ensure_object(root, parents)?;
    if map.get(last).is_some_and(|existing| !existing.is_null()) {
        return Err(EncodeError::Occupied(json_path(path)));
    }
    map.insert(last.clone(), value);
    Ok(())
}

fn json_path(keys: &[String]) -> String {
    keys.iter().fold("$".to_string(), |mut acc, key| {
        acc.push('.');
        acc.push_str(key);
        acc
    })
}
