//! Depth-first traversal of loaded object graphs

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

use crate::host::{ObjectGraph, TypeIntrospector};
use crate::model::{ObjectId, ObjectKind, Value, is_unset};
use crate::rules::{RuleExtractor, ValidationRule};

/// Object identities already validated during the current scan.
#[derive(Debug, Default)]
pub struct VisitedSet(HashSet<ObjectId>);

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as visited; false if it already was.
    pub fn insert(&mut self, id: ObjectId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// One step of the chain from a scanned file down to a violating member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    File { path: String },
    Node { path: String },
    Resource { name: String },
    Field { name: String },
    Element { field: String, index: usize },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::File { path } | Segment::Node { path } => f.write_str(path),
            Segment::Resource { name } | Segment::Field { name } => f.write_str(name),
            Segment::Element { field, index } => write!(f, "{field}[{index}]"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextPath(Vec<Segment>);

impl ContextPath {
    pub fn for_file(path: impl Into<String>) -> Self {
        Self(vec![Segment::File { path: path.into() }])
    }

    /// A copy of this path extended by `segment`.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// The scanned file at the head of the chain.
    pub fn file(&self) -> Option<&str> {
        match self.0.first() {
            Some(Segment::File { path }) => Some(path),
            _ => None,
        }
    }

    /// Everything below the file, joined with ` > `.
    pub fn chain(&self) -> String {
        self.0
            .iter()
            .filter(|s| !matches!(s, Segment::File { .. }))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    AssignmentRequired,
    ElementUnset { index: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::AssignmentRequired => f.write_str("Assignment required"),
            Violation::ElementUnset { index } => write!(f, "Element [{index}] is not assigned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub context: ContextPath,
    pub member: String,
    pub violation: Violation,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} :: {} :: {} -> {}",
            self.context.file().unwrap_or("<unknown>"),
            self.context.chain(),
            self.member,
            self.violation
        )
    }
}

/// Receives violations as soon as they are found.
pub trait ErrorSink {
    fn emit(&mut self, error: ValidationError);
}

impl ErrorSink for Vec<ValidationError> {
    fn emit(&mut self, error: ValidationError) {
        self.push(error);
    }
}

/// Context shared by pending steps; materialized only when a violation is reported.
#[derive(Clone)]
struct Trail(Rc<TrailNode>);

struct TrailNode {
    segments: Vec<Segment>,
    parent: Option<Trail>,
}

impl Trail {
    fn new(context: &ContextPath) -> Self {
        Self(Rc::new(TrailNode {
            segments: context.0.clone(),
            parent: None,
        }))
    }

    fn child(&self, segment: Segment) -> Self {
        Self(Rc::new(TrailNode {
            segments: vec![segment],
            parent: Some(self.clone()),
        }))
    }

    fn to_context(&self) -> ContextPath {
        let mut levels = Vec::new();
        let mut current = Some(self);
        while let Some(trail) = current {
            levels.push(&trail.0.segments);
            current = trail.0.parent.as_ref();
        }
        ContextPath(levels.into_iter().rev().flatten().cloned().collect())
    }
}

impl Drop for TrailNode {
    // Unlink iteratively; a long chain would otherwise drop recursively
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(Trail(node)) = parent {
            parent = match Rc::try_unwrap(node) {
                Ok(mut node) => node.parent.take(),
                Err(_) => None,
            };
        }
    }
}

/// Pending work of a walk, popped in depth-first order.
enum Step {
    Object { id: ObjectId, trail: Trail },
    Rule { object: ObjectId, rule: ValidationRule, trail: Trail },
    Element { member: String, index: usize, value: Value, trail: Trail },
}

/// Applies type rules to every object reachable from a scanned root.
pub struct GraphWalker<'a, H: ?Sized> {
    host: &'a H,
    rules: &'a mut RuleExtractor,
    visited: &'a mut VisitedSet,
    sink: &'a mut dyn ErrorSink,
}

impl<'a, H> GraphWalker<'a, H>
where
    H: ObjectGraph + TypeIntrospector + ?Sized,
{
    pub fn new(
        host: &'a H,
        rules: &'a mut RuleExtractor,
        visited: &'a mut VisitedSet,
        sink: &'a mut dyn ErrorSink,
    ) -> Self {
        Self {
            host,
            rules,
            visited,
            sink,
        }
    }

    /// Validate a scene node and, unconditionally, all of its descendants.
    pub fn validate_scene_node(&mut self, node: ObjectId, file: &str) -> usize {
        let file = ContextPath::for_file(file);
        let mut errors = 0;
        let mut pending = vec![node];

        while let Some(node) = pending.pop() {
            let context = file.child(Segment::Node {
                path: self.host.label(node),
            });
            errors += self.validate_object(node, &context);
            pending.extend(self.host.children(node).into_iter().rev());
        }
        errors
    }

    /// Validate a resource loaded directly from `file`.
    pub fn validate_resource(&mut self, resource: ObjectId, file: &str) -> usize {
        let context = ContextPath::for_file(file).child(Segment::Resource {
            name: self.host.label(resource),
        });
        self.validate_object(resource, &context)
    }

    /// Validate one object and the resources its required members point to.
    ///
    /// Returns the number of violations found below this object that were
    /// not already counted earlier in the scan. Nesting depth is bounded only
    /// by memory.
    pub fn validate_object(&mut self, object: ObjectId, context: &ContextPath) -> usize {
        let mut errors = 0;
        let mut pending = vec![Step::Object {
            id: object,
            trail: Trail::new(context),
        }];

        while let Some(step) = pending.pop() {
            match step {
                Step::Object { id, trail } => self.expand_object(id, trail, &mut pending),
                Step::Rule { object, rule, trail } => {
                    errors += self.apply_rule(object, rule, trail, &mut pending);
                }
                Step::Element {
                    member,
                    index,
                    value,
                    trail,
                } => {
                    if is_unset(&value, self.host) {
                        self.emit(&trail, &member, Violation::ElementUnset { index });
                        errors += 1;
                    } else if let Some(nested) = self.nested_resource(&value) {
                        pending.push(Step::Object {
                            id: nested,
                            trail: trail.child(Segment::Element {
                                field: member,
                                index,
                            }),
                        });
                    }
                }
            }
        }
        errors
    }

    fn expand_object(&mut self, object: ObjectId, trail: Trail, pending: &mut Vec<Step>) {
        if !self.visited.insert(object) {
            return;
        }
        let Some(identity) = self.host.script_type(object) else {
            return;
        };

        let rules = self.rules.rules_for(&identity, self.host);
        pending.extend(rules.iter().rev().map(|rule| Step::Rule {
            object,
            rule: rule.clone(),
            trail: trail.clone(),
        }));
    }

    fn apply_rule(
        &mut self,
        object: ObjectId,
        rule: ValidationRule,
        trail: Trail,
        pending: &mut Vec<Step>,
    ) -> usize {
        let value = self.host.field(object, &rule.member);
        let unset = is_unset(&value, self.host);

        if rule.requires_single_value && unset {
            self.emit(&trail, &rule.member, Violation::AssignmentRequired);
            return 1;
        }

        if rule.requires_member_validity {
            if !unset {
                self.queue_elements(value, rule.member, trail, pending);
            }
            return 0;
        }

        if let Some(nested) = self.nested_resource(&value) {
            pending.push(Step::Object {
                id: nested,
                trail: trail.child(Segment::Field { name: rule.member }),
            });
        }
        0
    }

    fn queue_elements(&self, value: Value, member: String, trail: Trail, pending: &mut Vec<Step>) {
        let Some(elements) = value.elements() else {
            trace!("{member} is not a collection; skipping element checks");
            return;
        };

        let steps: Vec<Step> = elements
            .iter()
            .enumerate()
            .map(|(index, element)| Step::Element {
                member: member.clone(),
                index,
                value: element.unwrapped().clone(),
                trail: trail.clone(),
            })
            .collect();
        pending.extend(steps.into_iter().rev());
    }

    /// Resources are followed through fields; nodes are reached through the tree.
    fn nested_resource(&self, value: &Value) -> Option<ObjectId> {
        let id = value.as_object()?;
        match self.host.kind(id) {
            Some(ObjectKind::Resource) => Some(id),
            _ => None,
        }
    }

    fn emit(&mut self, trail: &Trail, member: &str, violation: Violation) {
        self.sink.emit(ValidationError {
            context: trail.to_context(),
            member: member.to_string(),
            violation,
        });
    }
}
