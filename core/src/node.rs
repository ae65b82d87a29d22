//! Persistent state tree
//!
//! [`Node`] is an immutable tree of maps, lists and scalars built on `im`
//! collections. Every write returns a new tree that shares all untouched
//! subtrees with the old one, so comparing an unchanged branch is a pointer
//! check.

use im::{OrdMap, Vector};
use serde_json::{Map, Number, Value};
use std::sync::Arc;

use crate::error::{ArborError, ArborResult};
use crate::path::{Path, Segment};

/// One value in a state tree
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Vector<Node>),
    Map(OrdMap<String, Node>),
}

impl Node {
    pub fn empty_map() -> Self {
        Node::Map(OrdMap::new())
    }

    /// Convert plain data into a persistent tree
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(Arc::from(s)),
            Value::Array(items) => Node::List(items.into_iter().map(Node::from_json).collect()),
            Value::Object(fields) => Node::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Node::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into plain data
    pub fn to_json(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.to_string()),
            Node::List(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    /// True when both nodes are the same shared collection
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::List(a), Node::List(b)) => a.ptr_eq(b),
            (Node::Map(a), Node::Map(b)) => a.ptr_eq(b),
            (Node::String(a), Node::String(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Resolve a path; `None` when any segment does not resolve
    pub fn get_in(&self, path: &Path) -> Option<&Node> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    fn child(&self, segment: &Segment) -> Option<&Node> {
        match self {
            Node::Map(fields) => fields.get(&*segment.key()),
            Node::List(items) => segment.index().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Return a tree with `value` written at `path`
    ///
    /// Missing (or `null`) intermediate levels become maps. Fails when the
    /// path runs through a scalar or addresses a list with a non-index key.
    pub fn set_in(&self, path: &Path, value: Node) -> ArborResult<Node> {
        set_at(Some(self), path, 0, value)
    }

    /// Return a tree without the value at `path`, or `None` if nothing is there
    ///
    /// List elements are removed and later elements shift down.
    pub fn delete_in(&self, path: &Path) -> Option<Node> {
        if path.is_root() {
            return None;
        }
        delete_at(self, path, 0)
    }

    /// Deep merge: maps merge key by key, everything else is replaced
    pub fn merge_deep(&self, patch: &Node) -> Node {
        match (self, patch) {
            (Node::Map(base), Node::Map(changes)) => {
                let mut merged = base.clone();
                for (key, incoming) in changes.iter() {
                    let next = match merged.get(key) {
                        Some(existing) => existing.merge_deep(incoming),
                        None => incoming.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
                Node::Map(merged)
            }
            _ => patch.clone(),
        }
    }
}

fn set_at(node: Option<&Node>, path: &Path, depth: usize, value: Node) -> ArborResult<Node> {
    let Some(segment) = path.segments().get(depth) else {
        return Ok(value);
    };

    match node {
        None | Some(Node::Null) => {
            let child = set_at(None, path, depth + 1, value)?;
            Ok(Node::Map(OrdMap::unit(segment.key().into_owned(), child)))
        }
        Some(Node::Map(fields)) => {
            let key = segment.key();
            let child = set_at(fields.get(&*key), path, depth + 1, value)?;
            Ok(Node::Map(fields.update(key.into_owned(), child)))
        }
        Some(Node::List(items)) => {
            let index = segment.index().ok_or_else(|| {
                ArborError::invalid_argument(format!(
                    "cannot set '{}': '{}' is a list and '{}' is not an index",
                    path,
                    path.prefix(depth),
                    segment
                ))
            })?;
            if index > items.len() {
                return Err(ArborError::invalid_argument(format!(
                    "cannot set '{}': index {} is past the end of '{}' (length {})",
                    path,
                    index,
                    path.prefix(depth),
                    items.len()
                )));
            }
            let child = set_at(items.get(index), path, depth + 1, value)?;
            let mut items = items.clone();
            if index < items.len() {
                items.set(index, child);
            } else {
                items.push_back(child);
            }
            Ok(Node::List(items))
        }
        Some(_) => Err(ArborError::invalid_argument(format!(
            "cannot set '{}': '{}' holds a scalar",
            path,
            path.prefix(depth)
        ))),
    }
}

fn delete_at(node: &Node, path: &Path, depth: usize) -> Option<Node> {
    let segment = &path.segments()[depth];
    let last = depth + 1 == path.len();

    match node {
        Node::Map(fields) => {
            let key = segment.key();
            let child = fields.get(&*key)?;
            if last {
                return Some(Node::Map(fields.without(&*key)));
            }
            let child = delete_at(child, path, depth + 1)?;
            Some(Node::Map(fields.update(key.into_owned(), child)))
        }
        Node::List(items) => {
            let index = segment.index()?;
            let child = items.get(index)?;
            let replacement = if last {
                None
            } else {
                Some(delete_at(child, path, depth + 1)?)
            };
            let mut items = items.clone();
            match replacement {
                Some(child) => {
                    items.set(index, child);
                }
                None => {
                    items.remove(index);
                }
            }
            Some(Node::List(items))
        }
        _ => None,
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => numbers_equal(a, b),
            (Node::String(a), Node::String(b)) => a == b,
            (Node::List(a), Node::List(b)) => a.ptr_eq(b) || a == b,
            (Node::Map(a), Node::Map(b)) => a.ptr_eq(b) || a == b,
            _ => false,
        }
    }
}

/// Integers compare exactly; floats compare by value so `1` equals `1.0`
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        (None, None) => a.as_u64() == b.as_u64(),
        _ => false,
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_json(value)
    }
}
