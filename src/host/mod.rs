//! Interfaces the validator consumes from its host, plus the bundled
//! on-disk project host

pub mod classes;
pub mod error;
pub mod project;
pub mod store;

pub use classes::{ClassRegistry, TypeManifest};
pub use error::LoadError;
pub use project::{PackedScene, Project};
pub use store::{Object, ObjectStore};

use crate::model::{ObjectId, ObjectKind, TypeIdentity, Value};
use crate::rules::ExtractionError;

/// Host liveness check.
pub trait Liveness {
    /// Whether `id` still refers to a live object.
    fn is_live(&self, id: ObjectId) -> bool;
}

/// Read access to loaded objects.
pub trait ObjectGraph: Liveness {
    /// Capability of a live object, `None` for unknown or freed handles.
    fn kind(&self, id: ObjectId) -> Option<ObjectKind>;

    /// The script type attached to the object, if any.
    fn script_type(&self, id: ObjectId) -> Option<TypeIdentity>;

    /// Current value of a field; absent fields read as [`Value::Nil`].
    fn field(&self, id: ObjectId, member: &str) -> Value;

    /// Structural scene children in tree order. Empty for resources.
    fn children(&self, id: ObjectId) -> Vec<ObjectId>;

    /// Human-readable label: the node path for nodes, a display name for resources.
    fn label(&self, id: ObjectId) -> String;
}

/// Validation markers attached to a member declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Markers {
    /// The member must hold a set value.
    pub required: bool,
    /// Every element of the member's collection must be set.
    pub required_members: bool,
}

impl Markers {
    pub fn any(self) -> bool {
        self.required || self.required_members
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    /// Exposed to the editor/inspector at runtime.
    pub exported: bool,
    pub markers: Markers,
}

/// Members declared directly on one level of an inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLevel {
    pub identity: TypeIdentity,
    pub members: Vec<MemberInfo>,
}

/// A throwaway instance constructed only for introspection.
///
/// Dropping it releases the instance.
pub trait Introspected {
    /// Inheritance chain, most-derived level first, excluding the platform base object.
    fn type_chain(&self) -> Vec<TypeLevel>;
}

pub trait TypeIntrospector {
    /// Construct a probe instance of `identity`.
    ///
    /// `Ok(None)` means the identity is not a script type known to the host.
    fn instantiate(
        &self,
        identity: &TypeIdentity,
    ) -> Result<Option<Box<dyn Introspected + '_>>, ExtractionError>;
}

/// Result of loading one persisted file.
#[derive(Debug)]
pub enum Loaded<S> {
    /// Scene container; must be instantiated before it can be walked.
    Scene(S),
    /// Plain resource, walkable as-is.
    Resource(ObjectId),
}

/// Everything a project scan needs from the host.
pub trait ProjectHost: ObjectGraph + TypeIntrospector {
    type Scene;

    /// Called once at the start of each scan; drops per-scan loader state.
    fn begin_scan(&mut self) {}

    fn load(&mut self, path: &str) -> Result<Loaded<Self::Scene>, LoadError>;

    fn instantiate_scene(&mut self, scene: &Self::Scene) -> Result<ObjectId, LoadError>;

    fn release_scene_root(&mut self, root: ObjectId);
}

/// An instantiated scene root, released when dropped.
pub struct SceneInstance<'h, H: ProjectHost + ?Sized> {
    host: &'h mut H,
    root: ObjectId,
}

impl<'h, H: ProjectHost + ?Sized> SceneInstance<'h, H> {
    pub fn instantiate(host: &'h mut H, scene: &H::Scene) -> Result<Self, LoadError> {
        let root = host.instantiate_scene(scene)?;
        Ok(Self { host, root })
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn host(&self) -> &H {
        &*self.host
    }
}

impl<H: ProjectHost + ?Sized> Drop for SceneInstance<'_, H> {
    fn drop(&mut self) {
        self.host.release_scene_root(self.root);
    }
}
