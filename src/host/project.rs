//! Project host backed by text scene/resource files on disk

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use super::{
    ClassRegistry, Introspected, Liveness, LoadError, Loaded, Object, ObjectGraph, ObjectStore,
    ProjectHost, TypeIntrospector,
};
use crate::format::{Document, RawValue, Section, parse_document};
use crate::model::{ObjectId, ObjectKind, TypeIdentity, Value};
use crate::rules::ExtractionError;
use crate::scanner::{SCENE_EXTENSION, is_resource_extension};

/// A parsed scene, ready to be instantiated.
#[derive(Debug)]
pub struct PackedScene {
    pub path: String,
    nodes: Vec<NodeTemplate>,
}

impl PackedScene {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug)]
struct NodeTemplate {
    name: String,
    type_name: Option<String>,
    parent: Option<String>,
    /// Path of the scene this node instances.
    instance: Option<String>,
    /// `Some(None)` clears an inherited script.
    script: Option<Option<TypeIdentity>>,
    properties: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
struct ExtResource {
    type_name: String,
    path: String,
}

/// Id tables of one document.
struct Bindings {
    path: String,
    ext: HashMap<String, ExtResource>,
    sub: HashMap<String, ObjectId>,
}

impl Bindings {
    fn ext(&self, id: &str) -> Result<&ExtResource, LoadError> {
        self.ext.get(id).ok_or_else(|| LoadError::UnknownExtResource {
            path: self.path.clone(),
            id: id.to_string(),
        })
    }

    fn sub(&self, id: &str) -> Result<ObjectId, LoadError> {
        self.sub
            .get(id)
            .copied()
            .ok_or_else(|| LoadError::UnknownSubResource {
                path: self.path.clone(),
                id: id.to_string(),
            })
    }
}

pub struct Project {
    root: PathBuf,
    scheme: String,
    store: ObjectStore,
    classes: ClassRegistry,
    /// Loaded resources and asset stubs by path, for the current scan.
    resources: HashMap<String, ObjectId>,
    scenes: HashMap<String, Rc<PackedScene>>,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, scheme: impl Into<String>, classes: ClassRegistry) -> Self {
        Self {
            root: root.into(),
            scheme: scheme.into(),
            store: ObjectStore::new(),
            classes,
            resources: HashMap::new(),
            scenes: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// `res://a/b.tscn` -> `<root>/a/b.tscn`
    pub fn to_disk_path(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix(self.scheme.as_str()).unwrap_or(path);
        self.root.join(relative.trim_start_matches('/'))
    }

    /// `<root>/a/b.tscn` -> `res://a/b.tscn`; `None` outside the root.
    pub fn to_scheme_path(&self, disk: &Path) -> Option<String> {
        to_scheme_path(&self.root, &self.scheme, disk)
    }

    fn read_document(&self, path: &str) -> Result<Document, LoadError> {
        let disk = self.to_disk_path(path);
        let content = std::fs::read_to_string(&disk).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path.to_string(),
                }
            } else {
                LoadError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })?;
        Ok(parse_document(path, &content)?)
    }

    /// Load a resource file, reusing the cached instance if it was loaded before.
    pub fn load_resource(&mut self, path: &str) -> Result<ObjectId, LoadError> {
        if let Some(&id) = self.resources.get(path) {
            return Ok(id);
        }

        let doc = self.read_document(path)?;
        if doc.header.tag != "gd_resource" {
            return Err(LoadError::UnsupportedDocument {
                path: path.to_string(),
                expected: "resource",
                found: doc.header.tag.clone(),
            });
        }

        let type_name = doc
            .header
            .attribute_str("script_class")
            .or_else(|| doc.header.attribute_str("type"))
            .unwrap_or_else(|| "Resource".to_string());
        let id = self.store.insert(Object::resource(String::new(), type_name));

        // Cached before its properties resolve, so cyclic references find it
        self.resources.insert(path.to_string(), id);
        let mut created = Vec::new();
        match self.populate_resource(id, path, &doc, &mut created) {
            Ok(()) => {
                debug!("Loaded resource {path} as {id}");
                Ok(id)
            }
            Err(err) => {
                self.resources.remove(path);
                self.store.free(id);
                self.free_all(created);
                Err(err)
            }
        }
    }

    fn populate_resource(
        &mut self,
        id: ObjectId,
        path: &str,
        doc: &Document,
        created: &mut Vec<ObjectId>,
    ) -> Result<(), LoadError> {
        let bindings = self.bind(path, doc, created)?;
        for section in doc.sections_tagged("resource") {
            self.apply_properties(id, section, &bindings)?;
        }
        Ok(())
    }

    /// Parse a scene file into a reusable template.
    pub fn load_scene(&mut self, path: &str) -> Result<Rc<PackedScene>, LoadError> {
        if let Some(scene) = self.scenes.get(path) {
            return Ok(Rc::clone(scene));
        }

        let doc = self.read_document(path)?;
        if doc.header.tag != "gd_scene" {
            return Err(LoadError::UnsupportedDocument {
                path: path.to_string(),
                expected: "scene",
                found: doc.header.tag.clone(),
            });
        }

        let mut created = Vec::new();
        let nodes = match self.scene_nodes(path, &doc, &mut created) {
            Ok(nodes) => nodes,
            Err(err) => {
                self.free_all(created);
                return Err(err);
            }
        };

        let scene = Rc::new(PackedScene {
            path: path.to_string(),
            nodes,
        });
        self.scenes.insert(path.to_string(), Rc::clone(&scene));
        debug!("Loaded scene {path} ({} nodes)", scene.node_count());
        Ok(scene)
    }

    fn scene_nodes(
        &mut self,
        path: &str,
        doc: &Document,
        created: &mut Vec<ObjectId>,
    ) -> Result<Vec<NodeTemplate>, LoadError> {
        let bindings = self.bind(path, doc, created)?;
        let mut nodes = Vec::new();
        for section in doc.sections_tagged("node") {
            nodes.push(self.node_template(section, &bindings)?);
        }

        if !nodes.first().is_some_and(|root| root.parent.is_none()) {
            return Err(LoadError::EmptyScene {
                path: path.to_string(),
            });
        }
        Ok(nodes)
    }

    /// Free objects allocated by a load that failed part way.
    fn free_all(&mut self, created: Vec<ObjectId>) {
        for id in created {
            self.store.free(id);
        }
    }

    fn node_template(&mut self, section: &Section, bindings: &Bindings) -> Result<NodeTemplate, LoadError> {
        let name = section
            .attribute_str("name")
            .ok_or_else(|| LoadError::MissingAttribute {
                path: bindings.path.clone(),
                section: section.tag.clone(),
                attribute: "name",
            })?;

        let instance = match section.attribute("instance") {
            Some(RawValue::ExtRef(id)) => Some(bindings.ext(id)?.path.clone()),
            _ => None,
        };

        let mut script = None;
        let mut properties = Vec::new();
        for (key, raw) in &section.properties {
            if key == "script" {
                script = Some(script_identity(raw, bindings)?);
            } else {
                properties.push((key.clone(), self.resolve(raw, bindings)?));
            }
        }

        Ok(NodeTemplate {
            name,
            type_name: section.attribute_str("type"),
            parent: section.attribute_str("parent"),
            instance,
            script,
            properties,
        })
    }

    /// Register `[ext_resource]` ids and build every `[sub_resource]`.
    ///
    /// Sub-resource handles are recorded in `created` as soon as they are allocated.
    fn bind(&mut self, path: &str, doc: &Document, created: &mut Vec<ObjectId>) -> Result<Bindings, LoadError> {
        let mut bindings = Bindings {
            path: path.to_string(),
            ext: HashMap::new(),
            sub: HashMap::new(),
        };

        for section in doc.sections_tagged("ext_resource") {
            let id = required_attribute(path, section, "id")?;
            let ext_path = required_attribute(path, section, "path")?;
            bindings.ext.insert(
                id,
                ExtResource {
                    type_name: section.attribute_str("type").unwrap_or_default(),
                    path: ext_path,
                },
            );
        }

        // Allocate every handle first so sub-resources may reference later ones
        let mut subs = Vec::new();
        for section in doc.sections_tagged("sub_resource") {
            let id = required_attribute(path, section, "id")?;
            let type_name = section
                .attribute_str("type")
                .unwrap_or_else(|| "Resource".to_string());
            let object = self.store.insert(Object::resource(String::new(), type_name));
            created.push(object);
            bindings.sub.insert(id, object);
            subs.push((object, section));
        }

        for (object, section) in subs {
            self.apply_properties(object, section, &bindings)?;
        }

        Ok(bindings)
    }

    fn apply_properties(&mut self, object: ObjectId, section: &Section, bindings: &Bindings) -> Result<(), LoadError> {
        for (key, raw) in &section.properties {
            if key == "script" {
                let script = script_identity(raw, bindings)?;
                if let Some(target) = self.store.get_mut(object) {
                    target.script = script;
                }
            } else {
                let value = self.resolve(raw, bindings)?;
                self.store.set_field(object, key.clone(), value);
            }
        }
        Ok(())
    }

    fn resolve(&mut self, raw: &RawValue, bindings: &Bindings) -> Result<Value, LoadError> {
        Ok(match raw {
            RawValue::Nil => Value::Nil,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Int(i) => Value::Int(*i),
            RawValue::Float(f) => Value::Float(*f),
            RawValue::Str(s) => Value::Str(s.clone()),
            RawValue::Opaque(s) => Value::Opaque(s.clone()),
            RawValue::SubRef(id) => Value::Object(bindings.sub(id)?),
            RawValue::ExtRef(id) => {
                let ext = bindings.ext(id)?.clone();
                Value::Object(self.external(&ext)?)
            }
            RawValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, bindings))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Handle for an external reference. Missing targets become dangling handles.
    fn external(&mut self, ext: &ExtResource) -> Result<ObjectId, LoadError> {
        if let Some(&id) = self.resources.get(&ext.path) {
            return Ok(id);
        }

        if !self.to_disk_path(&ext.path).exists() {
            debug!("{} does not exist; reference is dangling", ext.path);
            let id = self.store.dangling();
            self.resources.insert(ext.path.clone(), id);
            return Ok(id);
        }

        if has_extension(&ext.path, is_resource_extension) {
            return self.load_resource(&ext.path);
        }

        // Packed scenes, textures, scripts: present but not inspected
        let name = ext.path.rsplit('/').next().unwrap_or(&ext.path).to_string();
        let id = self.store.insert(Object::resource(name, ext.type_name.clone()));
        self.resources.insert(ext.path.clone(), id);
        Ok(id)
    }

    fn instantiate_packed(
        &mut self,
        scene: &PackedScene,
        stack: &mut Vec<String>,
        created: &mut Vec<ObjectId>,
    ) -> Result<ObjectId, LoadError> {
        if stack.contains(&scene.path) {
            return Err(LoadError::RecursiveInstance {
                path: stack.first().cloned().unwrap_or_default(),
                through: scene.path.clone(),
            });
        }

        stack.push(scene.path.clone());
        let result = self.build_nodes(scene, stack, created);
        stack.pop();
        result
    }

    fn build_nodes(
        &mut self,
        scene: &PackedScene,
        stack: &mut Vec<String>,
        created: &mut Vec<ObjectId>,
    ) -> Result<ObjectId, LoadError> {
        let mut root: Option<ObjectId> = None;

        for template in &scene.nodes {
            let parent = match (root, template.parent.as_deref()) {
                (None, _) => None,
                (Some(root), None) => Some(root),
                (Some(root), Some(path)) => Some(self.store.find_by_path(root, path).ok_or_else(
                    || LoadError::UnknownParent {
                        path: scene.path.clone(),
                        node: template.name.clone(),
                        parent: path.to_string(),
                    },
                )?),
            };

            let node = match &template.instance {
                Some(instance_path) => {
                    let packed = self.load_scene(instance_path)?;
                    let id = self.instantiate_packed(&packed, stack, created)?;
                    if let Some(object) = self.store.get_mut(id) {
                        object.name = template.name.clone();
                    }
                    id
                }
                None => {
                    // A typeless entry naming an existing child overrides an instanced node
                    let existing = match (parent, &template.type_name) {
                        (Some(parent), None) => self.store.find_child(parent, &template.name),
                        _ => None,
                    };
                    match existing {
                        Some(id) => id,
                        None => {
                            let type_name = template.type_name.clone().unwrap_or_else(|| "Node".to_string());
                            let id = self.store.insert(Object::node(template.name.clone(), type_name));
                            created.push(id);
                            id
                        }
                    }
                }
            };

            if let Some(parent) = parent
                && self.store.get(node).is_some_and(|o| o.parent.is_none())
            {
                self.store.attach(parent, node);
            }
            if let Some(script) = &template.script
                && let Some(object) = self.store.get_mut(node)
            {
                object.script = script.clone();
            }
            for (key, value) in &template.properties {
                self.store.set_field(node, key.clone(), value.clone());
            }

            root.get_or_insert(node);
        }

        root.ok_or_else(|| LoadError::EmptyScene {
            path: scene.path.clone(),
        })
    }

    /// Replace node-path members under `root` with the nodes they name.
    ///
    /// Empty paths become unset; paths naming no node become dangling handles.
    fn resolve_node_references(&mut self, root: ObjectId) {
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            pending.extend(self.store.children(node));
            let Some(script) = self.store.script_type(node) else {
                continue;
            };

            for member in self.classes.node_members(script.as_str()) {
                let value = self.store.field(node, &member);
                if value == Value::Nil {
                    continue;
                }
                let resolved = self.resolve_node_value(node, &value);
                self.store.set_field(node, member, resolved);
            }
        }
    }

    fn resolve_node_value(&mut self, from: ObjectId, value: &Value) -> Value {
        match value.unwrapped() {
            Value::Str(path) if path.is_empty() => Value::Nil,
            // Absolute paths name nodes outside the instanced scene
            Value::Str(path) if path.starts_with('/') => value.clone(),
            Value::Str(path) => match self.store.resolve_node_path(from, path) {
                Some(target) => Value::Object(target),
                None => {
                    debug!(
                        "{}: node path {path} names no node; reference is dangling",
                        self.store.node_path(from)
                    );
                    Value::Object(self.store.dangling())
                }
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_node_value(from, item))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

fn required_attribute(path: &str, section: &Section, attribute: &'static str) -> Result<String, LoadError> {
    section
        .attribute_str(attribute)
        .ok_or_else(|| LoadError::MissingAttribute {
            path: path.to_string(),
            section: section.tag.clone(),
            attribute,
        })
}

/// Script identity for a `script = ...` property.
///
/// External scripts are identified by path; built-in scripts by document and id.
fn script_identity(raw: &RawValue, bindings: &Bindings) -> Result<Option<TypeIdentity>, LoadError> {
    Ok(match raw {
        RawValue::ExtRef(id) => Some(TypeIdentity::new(bindings.ext(id)?.path.clone())),
        RawValue::SubRef(id) => {
            bindings.sub(id)?;
            Some(TypeIdentity::new(format!("{}::{}", bindings.path, id)))
        }
        _ => None,
    })
}

fn has_extension(path: &str, accept: impl Fn(&str) -> bool) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(accept)
}

pub(crate) fn to_scheme_path(root: &Path, scheme: &str, disk: &Path) -> Option<String> {
    let relative = disk.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    Some(format!("{scheme}{}", parts.join("/")))
}

impl Liveness for Project {
    fn is_live(&self, id: ObjectId) -> bool {
        self.store.is_live(id)
    }
}

impl ObjectGraph for Project {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.store.kind(id)
    }

    fn script_type(&self, id: ObjectId) -> Option<TypeIdentity> {
        self.store.script_type(id)
    }

    fn field(&self, id: ObjectId, member: &str) -> Value {
        self.store.field(id, member)
    }

    fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.store.children(id)
    }

    fn label(&self, id: ObjectId) -> String {
        self.store.label(id)
    }
}

impl TypeIntrospector for Project {
    fn instantiate(
        &self,
        identity: &TypeIdentity,
    ) -> Result<Option<Box<dyn Introspected + '_>>, ExtractionError> {
        self.classes.instantiate(identity)
    }
}

impl ProjectHost for Project {
    type Scene = Rc<PackedScene>;

    fn begin_scan(&mut self) {
        self.resources.clear();
        self.scenes.clear();
        self.store.clear();
    }

    fn load(&mut self, path: &str) -> Result<Loaded<Self::Scene>, LoadError> {
        if has_extension(path, |ext| ext == SCENE_EXTENSION) {
            self.load_scene(path).map(Loaded::Scene)
        } else {
            self.load_resource(path).map(Loaded::Resource)
        }
    }

    fn instantiate_scene(&mut self, scene: &Self::Scene) -> Result<ObjectId, LoadError> {
        let mut stack = Vec::new();
        let mut created = Vec::new();
        match self.instantiate_packed(scene, &mut stack, &mut created) {
            Ok(root) => {
                self.resolve_node_references(root);
                Ok(root)
            }
            Err(err) => {
                self.free_all(created);
                Err(err)
            }
        }
    }

    fn release_scene_root(&mut self, root: ObjectId) {
        let freed = self.store.free_subtree(root);
        debug!("Released scene instance {root} ({freed} nodes)");
    }
}
