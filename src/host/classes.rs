//! Static type table read from the project's type manifest

use anyhow::{Context, Result};
use serde::Deserialize;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::{Introspected, Markers, MemberInfo, TypeIntrospector, TypeLevel};
use crate::model::TypeIdentity;
use crate::rules::ExtractionError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeManifest {
    #[serde(default)]
    pub types: Vec<ClassDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    /// Script path; the primary type identity.
    pub script: String,

    #[serde(default)]
    pub class_name: Option<String>,

    /// Parent script path or class name. Anything not in the manifest is a
    /// native base and ends the chain.
    #[serde(default)]
    pub extends: Option<String>,

    #[serde(default = "default_true")]
    pub instantiable: bool,

    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberDecl {
    pub name: String,

    #[serde(default = "default_true")]
    pub exported: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub required_members: bool,

    /// Holds a node path, resolved against the instanced tree.
    #[serde(default)]
    pub node: bool,
}

fn default_true() -> bool {
    true
}

/// Registry of script types, keyed by script path and class name.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDecl>,
    index: HashMap<String, usize>,
    live_probes: Cell<usize>,
    probes_created: Cell<usize>,
}

impl ClassRegistry {
    pub fn new(manifest: TypeManifest) -> Self {
        let mut index = HashMap::new();
        for (i, class) in manifest.types.iter().enumerate() {
            index.insert(class.script.clone(), i);
            if let Some(name) = &class.class_name {
                index.insert(name.clone(), i);
            }
        }

        Self {
            classes: manifest.types,
            index,
            live_probes: Cell::new(0),
            probes_created: Cell::new(0),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: TypeManifest =
            serde_yaml::from_str(content).context("Failed to parse type manifest")?;
        Ok(Self::new(manifest))
    }

    /// Load the manifest at `path`; a missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No type manifest at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read type manifest: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid type manifest: {}", path.display()))
    }

    pub fn get(&self, identity: &str) -> Option<&ClassDecl> {
        self.index.get(identity).map(|&i| &self.classes[i])
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Probe instances currently alive.
    pub fn live_probes(&self) -> usize {
        self.live_probes.get()
    }

    /// Probe instances constructed over the registry's lifetime.
    pub fn probes_created(&self) -> usize {
        self.probes_created.get()
    }

    /// Members of `identity` and its bases that hold node paths.
    ///
    /// A derived declaration shadows a base member of the same name.
    pub fn node_members(&self, identity: &str) -> Vec<String> {
        let mut seen_classes = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut members = Vec::new();
        let mut current = self.index.get(identity).copied();

        while let Some(i) = current {
            if !seen_classes.insert(i) {
                break;
            }
            let class = &self.classes[i];
            for member in &class.members {
                if seen_names.insert(member.name.as_str()) && member.node {
                    members.push(member.name.clone());
                }
            }
            current = class
                .extends
                .as_deref()
                .and_then(|parent| self.index.get(parent).copied());
        }
        members
    }

    fn chain(&self, identity: &TypeIdentity, root: usize) -> Result<Vec<TypeLevel>, ExtractionError> {
        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(root);

        while let Some(i) = current {
            let class = &self.classes[i];
            if !visited.insert(i) {
                return Err(ExtractionError::InheritanceCycle {
                    identity: identity.clone(),
                    through: TypeIdentity::new(class.script.clone()),
                });
            }

            levels.push(TypeLevel {
                identity: TypeIdentity::new(class.script.clone()),
                members: class
                    .members
                    .iter()
                    .map(|m| MemberInfo {
                        name: m.name.clone(),
                        exported: m.exported,
                        markers: Markers {
                            required: m.required,
                            required_members: m.required_members,
                        },
                    })
                    .collect(),
            });

            current = class
                .extends
                .as_deref()
                .and_then(|parent| self.index.get(parent).copied());
        }

        Ok(levels)
    }
}

/// Throwaway instance handed out by [`ClassRegistry::instantiate`].
struct Probe<'r> {
    registry: &'r ClassRegistry,
    chain: Vec<TypeLevel>,
}

impl Introspected for Probe<'_> {
    fn type_chain(&self) -> Vec<TypeLevel> {
        self.chain.clone()
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        let live = &self.registry.live_probes;
        live.set(live.get().saturating_sub(1));
    }
}

impl TypeIntrospector for ClassRegistry {
    fn instantiate(
        &self,
        identity: &TypeIdentity,
    ) -> Result<Option<Box<dyn Introspected + '_>>, ExtractionError> {
        let Some(&root) = self.index.get(identity.as_str()) else {
            return Ok(None);
        };

        let class = &self.classes[root];
        if !class.instantiable {
            return Err(ExtractionError::NotInstantiable {
                identity: identity.clone(),
                reason: "declared as not instantiable".to_string(),
            });
        }

        let chain = self.chain(identity, root)?;

        self.live_probes.set(self.live_probes.get() + 1);
        self.probes_created.set(self.probes_created.get() + 1);
        Ok(Some(Box::new(Probe {
            registry: self,
            chain,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_defaults() {
        let registry = ClassRegistry::from_yaml(
            r#"
types:
  - script: res://item.gd
    members:
      - name: icon
"#,
        )
        .unwrap();

        let class = registry.get("res://item.gd").unwrap();
        assert!(class.instantiable);
        assert!(class.members[0].exported);
        assert!(!class.members[0].required);
        assert!(!class.members[0].required_members);
        assert!(!class.members[0].node);
    }

    #[test]
    fn test_node_members_follow_inheritance() {
        let registry = ClassRegistry::from_yaml(
            r#"
types:
  - script: res://actor.gd
    class_name: Actor
    members:
      - { name: target, node: true }
      - { name: home, node: true }
  - script: res://guard.gd
    extends: Actor
    members:
      - { name: post, required: true, node: true }
      - { name: home }
"#,
        )
        .unwrap();

        assert_eq!(registry.node_members("res://guard.gd"), vec!["post", "target"]);
        assert_eq!(registry.node_members("Actor"), vec!["target", "home"]);
        assert!(registry.node_members("res://unknown.gd").is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = ClassRegistry::from_yaml(
            r#"
types:
  - script: res://item.gd
    requierd: true
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extends_stops_at_native_base() {
        let registry = ClassRegistry::from_yaml(
            r#"
types:
  - script: res://enemy.gd
    extends: CharacterBody2D
    members:
      - { name: target, required: true }
"#,
        )
        .unwrap();

        let probe = registry.instantiate(&"res://enemy.gd".into()).unwrap().unwrap();
        assert_eq!(probe.type_chain().len(), 1);
        assert_eq!(registry.live_probes(), 1);
        drop(probe);
        assert_eq!(registry.live_probes(), 0);
    }

    #[test]
    fn test_inheritance_cycle_is_an_extraction_error() {
        let registry = ClassRegistry::from_yaml(
            r#"
types:
  - script: res://a.gd
    extends: res://b.gd
  - script: res://b.gd
    extends: res://a.gd
"#,
        )
        .unwrap();

        let result = registry.instantiate(&"res://a.gd".into());
        assert!(matches!(
            result,
            Err(ExtractionError::InheritanceCycle { .. })
        ));
        assert_eq!(registry.live_probes(), 0);
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ClassRegistry::load(&dir.path().join("types.yml")).unwrap();
        assert!(registry.is_empty());
    }
}
