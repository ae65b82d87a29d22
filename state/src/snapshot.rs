//! Immutable state snapshots

use arbor_core::{ArborError, ArborResult, Node, Path};
use serde_json::Value;

/// One immutable value of an entire state tree
///
/// The root is always a map. Cloning is O(1) and a snapshot is never
/// modified in place: every write returns a new snapshot sharing all
/// untouched subtrees with this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    root: Node,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            root: Node::empty_map(),
        }
    }
}

impl Snapshot {
    /// Build a snapshot from plain data; the value must be an object
    pub fn from_json(value: Value) -> ArborResult<Self> {
        Self::from_node(Node::from_json(value))
    }

    pub fn from_node(root: Node) -> ArborResult<Self> {
        if !root.is_map() {
            return Err(ArborError::invalid_argument(
                "Store: initial state must be an object.",
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Resolve a parsed path against this snapshot
    pub fn lookup(&self, path: &Path) -> Option<&Node> {
        self.root.get_in(path)
    }

    /// Plain value at a dotted path (`""` is the whole tree)
    pub fn get(&self, path: &str) -> Option<Value> {
        self.lookup(&Path::parse(path)).map(Node::to_json)
    }

    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    /// True when both snapshots are literally the same tree
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        self.root.ptr_eq(&other.root)
    }

    /// True when the value at `path` differs between the two snapshots
    ///
    /// A path that resolves in one snapshot and not the other counts as a
    /// change; a path missing from both does not.
    pub fn changed_at(&self, other: &Snapshot, path: &Path) -> bool {
        match (self.lookup(path), other.lookup(path)) {
            (None, None) => false,
            (Some(a), Some(b)) => !(a.ptr_eq(b) || a == b),
            _ => true,
        }
    }

    /// New snapshot with `value` written at `path`
    pub fn with_value(&self, path: &Path, value: Node) -> ArborResult<Snapshot> {
        if path.is_root() && !value.is_map() {
            return Err(ArborError::invalid_argument(
                "cannot replace the root with a non-object value",
            ));
        }
        Ok(Snapshot {
            root: self.root.set_in(path, value)?,
        })
    }

    /// New snapshot without the value at `path`; the root path empties the tree
    pub fn without(&self, path: &Path) -> Snapshot {
        if path.is_root() {
            return Snapshot::default();
        }
        match self.root.delete_in(path) {
            Some(root) => Snapshot { root },
            None => self.clone(),
        }
    }

    /// New snapshot with `patch` deep-merged in
    pub fn merged(&self, patch: &Node) -> Snapshot {
        Snapshot {
            root: self.root.merge_deep(patch),
        }
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        match &self.root {
            Node::Map(fields) => fields.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_must_be_object() {
        assert!(Snapshot::from_json(json!({})).is_ok());
        let err = Snapshot::from_json(json!(42)).unwrap_err();
        assert_eq!(err.to_string(), "Store: initial state must be an object.");
        assert!(Snapshot::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_get_plain_values() {
        let snapshot = Snapshot::from_json(json!({"user": {"id": 1, "name": "John"}})).unwrap();
        assert_eq!(snapshot.get("user"), Some(json!({"id": 1, "name": "John"})));
        assert_eq!(snapshot.get("user.name"), Some(json!("John")));
        assert_eq!(snapshot.get("user.age"), None);
        assert_eq!(snapshot.get(""), Some(snapshot.to_json()));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_writes_do_not_touch_previous_snapshot() {
        let before = Snapshot::from_json(json!({"foo": 1})).unwrap();
        let after = before
            .with_value(&Path::parse("foo"), Node::from_json(json!(2)))
            .unwrap();
        assert_eq!(before.get("foo"), Some(json!(1)));
        assert_eq!(after.get("foo"), Some(json!(2)));
    }

    #[test]
    fn test_changed_at() {
        let old = Snapshot::from_json(json!({"a": {"x": 1}, "b": 1})).unwrap();
        let new = old
            .with_value(&Path::parse("b"), Node::from_json(json!(2)))
            .unwrap();
        assert!(!old.changed_at(&new, &Path::parse("a")));
        assert!(old.changed_at(&new, &Path::parse("b")));
        assert!(!old.changed_at(&new, &Path::parse("missing")));
        assert!(old.changed_at(&new, &Path::root()));

        let added = old
            .with_value(&Path::parse("c"), Node::from_json(json!(null)))
            .unwrap();
        assert!(old.changed_at(&added, &Path::parse("c")));
    }

    #[test]
    fn test_root_replacement_requires_object() {
        let snapshot = Snapshot::default();
        assert!(snapshot
            .with_value(&Path::root(), Node::from_json(json!(1)))
            .is_err());
        let replaced = snapshot
            .with_value(&Path::root(), Node::from_json(json!({"a": 1})))
            .unwrap();
        assert_eq!(replaced.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_without() {
        let snapshot = Snapshot::from_json(json!({"a": 1, "b": [1, 2]})).unwrap();
        assert_eq!(snapshot.without(&Path::parse("a")).to_json(), json!({"b": [1, 2]}));
        assert_eq!(snapshot.without(&Path::parse("b.0")).to_json(), json!({"a": 1, "b": [2]}));
        assert!(snapshot.without(&Path::parse("zzz")).ptr_eq(&snapshot));
        assert!(snapshot.without(&Path::root()).is_empty());
    }
}
