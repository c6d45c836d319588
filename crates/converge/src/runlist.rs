//! Run lists - the ordered declaration of resources to converge.
//!
//! A run list may include other run lists; inclusion forms a DAG that
//! is flattened depth-first at the point of inclusion before execution.
//! Order is part of the contract: later resources may depend on earlier
//! ones' side effects.

use crate::facts::PlatformFacts;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};

/// A top-level platform condition that skips an entire run list.
///
/// Matching is exact on family and (when given) version. This is the
/// deliberate early-exit of the driver, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformGate {
    pub family: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PlatformGate {
    pub fn matches(&self, facts: &PlatformFacts) -> bool {
        self.family == facts.family
            && self
                .version
                .as_ref()
                .is_none_or(|version| *version == facts.version)
    }

    /// Human-readable explanation for the skip.
    pub fn describe(&self) -> String {
        self.reason.clone().unwrap_or_else(|| match &self.version {
            Some(version) => format!("platform {} {} is not supported", self.family, version),
            None => format!("platform {} is not supported", self.family),
        })
    }
}

/// One entry of a run list: a resource, or a nested included list.
#[derive(Debug, Clone, PartialEq)]
pub enum RunItem {
    Resource(Resource),
    Include(RunList),
}

/// An ordered sequence of resources and included run lists, owned by
/// the convergence driver for the duration of one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunList {
    pub name: String,
    /// Platform conditions under which this whole list is skipped
    pub skip_when: Vec<PlatformGate>,
    pub items: Vec<RunItem>,
}

impl RunList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skip_when: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Append a resource declaration.
    pub fn push(&mut self, resource: Resource) {
        self.items.push(RunItem::Resource(resource));
    }

    /// Append a nested run list at this point.
    pub fn include(&mut self, list: RunList) {
        self.items.push(RunItem::Include(list));
    }

    /// The first matching skip condition for these facts, if any.
    pub fn gate(&self, facts: &PlatformFacts) -> Option<&PlatformGate> {
        self.skip_when.iter().find(|g| g.matches(facts))
    }

    /// Flatten to declaration order, inlining includes depth-first.
    ///
    /// Included lists whose own gate matches the facts are skipped
    /// wholesale, mirroring the top-level early exit.
    pub fn flatten(&self, facts: &PlatformFacts) -> Vec<&Resource> {
        let mut resources = Vec::new();
        self.collect(facts, &mut resources);
        resources
    }

    fn collect<'a>(&'a self, facts: &PlatformFacts, out: &mut Vec<&'a Resource>) {
        for item in &self.items {
            match item {
                RunItem::Resource(resource) => out.push(resource),
                RunItem::Include(list) => {
                    if let Some(gate) = list.gate(facts) {
                        log::info!(
                            "skipping included run list '{}': {}",
                            list.name,
                            gate.describe()
                        );
                    } else {
                        list.collect(facts, out);
                    }
                }
            }
        }
    }

    /// Every resource regardless of platform gates, for validation.
    pub fn all_resources(&self) -> Vec<&Resource> {
        let mut resources = Vec::new();
        self.collect_all(&mut resources);
        resources
    }

    fn collect_all<'a>(&'a self, out: &mut Vec<&'a Resource>) {
        for item in &self.items {
            match item {
                RunItem::Resource(resource) => out.push(resource),
                RunItem::Include(list) => list.collect_all(out),
            }
        }
    }

    /// Total resource count including nested lists.
    pub fn len(&self) -> usize {
        self.all_resources().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
