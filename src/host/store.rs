//! Arena of host-managed objects addressed by [`ObjectId`]

use std::collections::{HashMap, VecDeque};

use super::{Liveness, ObjectGraph};
use crate::model::{ObjectId, ObjectKind, TypeIdentity, Value};

#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjectKind,
    pub name: String,
    pub type_name: String,
    pub script: Option<TypeIdentity>,
    pub fields: HashMap<String, Value>,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
}

impl Object {
    pub fn node(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Node, name, type_name)
    }

    pub fn resource(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Resource, name, type_name)
    }

    fn new(kind: ObjectKind, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            type_name: type_name.into(),
            script: None,
            fields: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: impl Into<TypeIdentity>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// Handles are never reused, so a freed handle stays dangling for the
/// lifetime of the store.
#[derive(Debug, Default)]
pub struct ObjectStore {
    next_id: u64,
    objects: HashMap<ObjectId, Object>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId::new(self.next_id)
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        let id = self.allocate();
        self.objects.insert(id, object);
        id
    }

    /// A handle that has never referred to a live object.
    pub fn dangling(&mut self) -> ObjectId {
        self.allocate()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn set_field(&mut self, id: ObjectId, name: impl Into<String>, value: Value) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.fields.insert(name.into(), value);
        }
    }

    /// Append `child` to `parent`'s children, detaching it from any previous parent.
    pub fn attach(&mut self, parent: ObjectId, child: ObjectId) {
        if let Some(previous) = self.objects.get(&child).and_then(|c| c.parent)
            && let Some(old_parent) = self.objects.get_mut(&previous)
        {
            old_parent.children.retain(|&c| c != child);
        }
        if let Some(object) = self.objects.get_mut(&child) {
            object.parent = Some(parent);
        }
        if let Some(object) = self.objects.get_mut(&parent) {
            object.children.push(child);
        }
    }

    /// Child of `parent` with the given name.
    pub fn find_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|o| o.name == name))
    }

    /// Resolve a scene-relative node path (`.`, `A`, `A/B`) from `root`.
    pub fn find_by_path(&self, root: ObjectId, path: &str) -> Option<ObjectId> {
        if path == "." || path.is_empty() {
            return Some(root);
        }
        path.split('/')
            .try_fold(root, |node, name| self.find_child(node, name))
    }

    /// Resolve a node path relative to `from`, as stored in a node-typed member.
    ///
    /// Understands `.`, `..`, child names and `%Name` unique names, and ignores a
    /// trailing `:property` subpath. Absolute paths do not resolve.
    pub fn resolve_node_path(&self, from: ObjectId, path: &str) -> Option<ObjectId> {
        let nodes = path.split(':').next().unwrap_or_default();
        if nodes.starts_with('/') {
            return None;
        }

        let mut current = from;
        for name in nodes.split('/').filter(|name| !name.is_empty()) {
            current = match name {
                "." => current,
                ".." => self.get(current)?.parent?,
                _ => match name.strip_prefix('%') {
                    Some(unique) => self.find_unique(current, unique)?,
                    None => self.find_child(current, name)?,
                },
            };
        }
        Some(current)
    }

    /// First node named `name` in the tree containing `node`, searched from its root.
    fn find_unique(&self, node: ObjectId, name: &str) -> Option<ObjectId> {
        let mut root = node;
        while let Some(parent) = self.get(root)?.parent {
            root = parent;
        }

        let mut pending = VecDeque::from([root]);
        while let Some(id) = pending.pop_front() {
            let object = self.get(id)?;
            if object.name == name {
                return Some(id);
            }
            pending.extend(object.children.iter().copied());
        }
        None
    }

    /// Free one object without touching the objects it references.
    pub fn free(&mut self, id: ObjectId) -> Option<Object> {
        let object = self.objects.remove(&id)?;
        if let Some(parent) = object.parent
            && let Some(p) = self.objects.get_mut(&parent)
        {
            p.children.retain(|&c| c != id);
        }
        Some(object)
    }

    /// Free `root` and every structural descendant; returns how many objects were freed.
    pub fn free_subtree(&mut self, root: ObjectId) -> usize {
        let mut pending = vec![root];
        let mut freed = 0;
        while let Some(id) = pending.pop() {
            if let Some(object) = self.free(id) {
                pending.extend(object.children);
                freed += 1;
            }
        }
        freed
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        // next_id keeps counting so old handles stay dangling
        self.objects.clear();
    }

    /// Slash-joined names from the scene root down to `id`.
    pub fn node_path(&self, id: ObjectId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.get(c)) {
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }
}

impl Liveness for ObjectStore {
    fn is_live(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }
}

impl ObjectGraph for ObjectStore {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.get(id).map(|o| o.kind)
    }

    fn script_type(&self, id: ObjectId) -> Option<TypeIdentity> {
        self.get(id)?.script.clone()
    }

    fn field(&self, id: ObjectId, member: &str) -> Value {
        self.get(id)
            .and_then(|o| o.fields.get(member))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.get(id).map(|o| o.children.clone()).unwrap_or_default()
    }

    fn label(&self, id: ObjectId) -> String {
        match self.get(id) {
            Some(object) if object.kind == ObjectKind::Node => self.node_path(id),
            Some(object) => match object.fields.get("resource_name") {
                Some(Value::Str(name)) if !name.is_empty() => name.clone(),
                _ if !object.name.is_empty() => object.name.clone(),
                _ => object.type_name.clone(),
            },
            None => id.to_string(),
        }
    }
}
