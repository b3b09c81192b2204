//! Per-type discovery of required members

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::host::TypeIntrospector;
use crate::model::TypeIdentity;

/// One required member of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRule {
    pub member: String,
    /// The member itself must be set.
    pub requires_single_value: bool,
    /// Every element of the member's collection must be set.
    pub requires_member_validity: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("type '{identity}' cannot be instantiated: {reason}")]
    NotInstantiable {
        identity: TypeIdentity,
        reason: String,
    },

    #[error("type '{identity}' has a cyclic inheritance chain through '{through}'")]
    InheritanceCycle {
        identity: TypeIdentity,
        through: TypeIdentity,
    },
}

/// Memoizing rule extractor.
///
/// The type-to-rules mapping is static for a given build, so the cache is
/// kept across scans.
#[derive(Debug, Default)]
pub struct RuleExtractor {
    cache: HashMap<TypeIdentity, Arc<[ValidationRule]>>,
}

impl RuleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for `identity`, extracted on first use.
    ///
    /// An extraction failure is logged and cached as an empty rule set.
    pub fn rules_for<I>(&mut self, identity: &TypeIdentity, introspector: &I) -> Arc<[ValidationRule]>
    where
        I: TypeIntrospector + ?Sized,
    {
        if let Some(rules) = self.cache.get(identity) {
            return Arc::clone(rules);
        }

        let rules: Arc<[ValidationRule]> = match Self::extract(identity, introspector) {
            Ok(rules) => {
                debug!("Extracted {} rule(s) for {}", rules.len(), identity);
                rules.into()
            }
            Err(err) => {
                warn!("{err}; no rules will be enforced for this type");
                Arc::from(Vec::new())
            }
        };

        self.cache.insert(identity.clone(), Arc::clone(&rules));
        rules
    }

    /// Uncached extraction.
    ///
    /// Walks the chain most-derived first; a member name already seen on a
    /// more-derived level is an override and is not added again.
    pub fn extract<I>(
        identity: &TypeIdentity,
        introspector: &I,
    ) -> Result<Vec<ValidationRule>, ExtractionError>
    where
        I: TypeIntrospector + ?Sized,
    {
        // The probe lives only for this block
        let chain = match introspector.instantiate(identity)? {
            Some(probe) => probe.type_chain(),
            None => return Ok(Vec::new()),
        };

        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for level in chain {
            for member in level.members {
                if !seen.insert(member.name.clone()) {
                    continue;
                }
                if !member.exported || !member.markers.any() {
                    continue;
                }
                rules.push(ValidationRule {
                    member: member.name,
                    requires_single_value: member.markers.required,
                    requires_member_validity: member.markers.required_members,
                });
            }
        }

        Ok(rules)
    }

    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
