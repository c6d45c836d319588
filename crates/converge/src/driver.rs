//! The convergence driver - orchestrates one run over a run list.
//!
//! Per resource the driver moves through a fixed pipeline: platform
//! constraint, conditional resolution, guards, then execution. The run
//! is fail-fast: the first failed resource aborts it, and resources
//! after the failure are never touched.

use crate::capability::Capabilities;
use crate::error::ConvergenceError;
use crate::executor::{ApplyResult, Executor};
use crate::facts::PlatformFacts;
use crate::resource::Resource;
use crate::runlist::RunList;

/// Options for a single convergence run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Evaluate constraints, conditionals and guards but perform no
    /// actions; actionable resources are reported as skipped.
    pub dry_run: bool,
}

/// Why a resource performed no work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Real work was performed
    Applied,
    /// Desired state was already satisfied
    Unchanged,
    /// The resource did not run at all
    Skipped { reason: String },
}

/// What happened to one resource during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub id: String,
    pub kind: &'static str,
    pub outcome: Outcome,
}

/// Whether the run converged or exited early on a platform gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Converged,
    /// A top-level skip condition matched; nothing was evaluated.
    PlatformSkipped { reason: String },
}

/// The full account of one convergence run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,
    pub resources: Vec<ResourceReport>,
}

impl RunReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.resources.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Drives a run list to convergence against a set of platform facts.
pub struct Driver<'a> {
    facts: PlatformFacts,
    executor: Executor<'a>,
}

impl<'a> Driver<'a> {
    pub fn new(facts: PlatformFacts, capabilities: Capabilities<'a>) -> Self {
        Self {
            facts,
            executor: Executor::new(capabilities),
        }
    }

    /// Run the list to completion or first failure.
    ///
    /// A matching top-level skip condition short-circuits the whole run
    /// with `RunStatus::PlatformSkipped` and an empty resource list.
    pub fn run(&self, list: &RunList, options: RunOptions) -> Result<RunReport, ConvergenceError> {
        if let Some(gate) = list.gate(&self.facts) {
            let reason = gate.describe();
            log::warn!("skipping run list '{}': {}", list.name, reason);
            return Ok(RunReport {
                status: RunStatus::PlatformSkipped { reason },
                resources: Vec::new(),
            });
        }

        let mut reports = Vec::new();
        for resource in list.flatten(&self.facts) {
            match self.converge_one(resource, options) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    log::error!("aborting run after '{}': {e}", resource.id());
                    return Err(e);
                }
            }
        }

        Ok(RunReport {
            status: RunStatus::Converged,
            resources: reports,
        })
    }

    fn converge_one(
        &self,
        resource: &Resource,
        options: RunOptions,
    ) -> Result<ResourceReport, ConvergenceError> {
        let id = resource.id();
        let kind = resource.kind();
        let skipped = |reason: String| ResourceReport {
            id: id.clone(),
            kind,
            outcome: Outcome::Skipped { reason },
        };

        if let Some(constraint) = resource.constraint()
            && !constraint.matches(&self.facts)
        {
            log::debug!("skipping '{id}': platform constraint not met");
            return Ok(skipped("platform constraint not met".to_string()));
        }

        // Conditionals must resolve before any guard runs or action
        // fires; an unresolvable value aborts the run.
        let resolved = resource.resolve(&self.facts)?;

        let blocked = resolved
            .guards()
            .blocked_reason()
            .map_err(|source| ConvergenceError::GuardExecutionFailure {
                resource: id.clone(),
                source,
            })?;
        if let Some(reason) = blocked {
            log::debug!("skipping '{id}': {reason}");
            return Ok(skipped(reason.to_string()));
        }

        if options.dry_run {
            log::info!("dry run: would apply {kind} '{id}'");
            return Ok(skipped("dry run".to_string()));
        }

        let outcome = match self.executor.apply(&resolved) {
            Ok(ApplyResult::Applied) => Outcome::Applied,
            Ok(ApplyResult::Unchanged) => Outcome::Unchanged,
            Err(source) => {
                return Err(ConvergenceError::ResourceFailed {
                    resource: id,
                    kind,
                    source,
                });
            }
        };

        Ok(ResourceReport { id, kind, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardPredicate;
    use crate::resource::{ActionVerb, CommandResource, PackageResource, PlatformConstraint};
    use crate::runlist::PlatformGate;
    use crate::testutil::FakeWorld;

    fn facts() -> PlatformFacts {
        PlatformFacts::new("ubuntu", "12.04", "x86_64")
    }

    fn touch_command(name: &str, path: &std::path::Path) -> Resource {
        Resource::Command(CommandResource {
            name: name.to_string(),
            script: format!("touch {}", path.display()),
            cwd: None,
            best_effort: false,
            actions: vec![ActionVerb::Run],
            only_if: None,
            not_if: None,
            constraint: None,
        })
    }

    fn failing_command(name: &str) -> Resource {
        Resource::Command(CommandResource {
            name: name.to_string(),
            script: "exit 7".to_string(),
            cwd: None,
            best_effort: false,
            actions: vec![ActionVerb::Run],
            only_if: None,
            not_if: None,
            constraint: None,
        })
    }

    fn package(name: &str) -> Resource {
        Resource::Package(PackageResource {
            name: name.to_string(),
            packages: Vec::new(),
            actions: vec![ActionVerb::Install],
            only_if: None,
            not_if: None,
            constraint: None,
        })
    }

    #[test]
    fn failure_aborts_before_later_resources_run() {
        let dir = tempfile::tempdir().unwrap();
        let markers: Vec<_> = (1..=4).map(|i| dir.path().join(format!("m{i}"))).collect();

        // Five resources, third fails: 1-2 stay applied, 4-5 never run.
        let mut list = RunList::new("main");
        list.push(touch_command("first", &markers[0]));
        list.push(touch_command("second", &markers[1]));
        list.push(failing_command("boom"));
        list.push(touch_command("fourth", &markers[2]));
        list.push(touch_command("fifth", &markers[3]));

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let err = driver.run(&list, RunOptions::default()).unwrap_err();

        assert!(matches!(
            err,
            ConvergenceError::ResourceFailed { ref resource, .. } if resource == "boom"
        ));
        assert!(markers[0].exists());
        assert!(markers[1].exists());
        assert!(!markers[2].exists());
        assert!(!markers[3].exists());
    }

    #[test]
    fn top_level_gate_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let mut list = RunList::new("main");
        list.skip_when.push(PlatformGate {
            family: "ubuntu".to_string(),
            version: Some("12.04".to_string()),
            reason: Some("not supported here".to_string()),
        });
        list.push(touch_command("step", &marker));

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let report = driver.run(&list, RunOptions::default()).unwrap();

        assert_eq!(
            report.status,
            RunStatus::PlatformSkipped {
                reason: "not supported here".to_string()
            }
        );
        assert!(report.resources.is_empty());
        assert!(!marker.exists());
    }

    #[test]
    fn guard_blocks_action_and_reports_skip() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = dir.path().join("sentinel");
        let marker = dir.path().join("marker");
        std::fs::write(&sentinel, b"x").unwrap();

        let mut cmd = match touch_command("guarded", &marker) {
            Resource::Command(c) => c,
            _ => unreachable!(),
        };
        cmd.not_if = Some(GuardPredicate::FileExists {
            file_exists: sentinel,
        });

        let mut list = RunList::new("main");
        list.push(Resource::Command(cmd));

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let report = driver.run(&list, RunOptions::default()).unwrap();

        assert_eq!(
            report.resources[0].outcome,
            Outcome::Skipped {
                reason: "not_if guard returned true".to_string()
            }
        );
        assert!(!marker.exists());
    }

    #[test]
    fn unmet_constraint_skips_without_resolving_conditionals() {
        use crate::conditional::{Conditional, PlatformValue};

        // The conditional has no value for these facts; the constraint
        // must short-circuit before resolution would fail.
        let by_platform = PlatformValue::default().with("rhel", "6.0", "couchdb".to_string());
        let resource = Resource::Package(PackageResource {
            name: "couchdb".to_string(),
            packages: vec![Conditional::ByPlatform { by_platform }],
            actions: vec![ActionVerb::Install],
            only_if: None,
            not_if: None,
            constraint: Some(PlatformConstraint {
                family: Some("rhel".to_string()),
                version_at_least: None,
                version_below: None,
            }),
        });

        let mut list = RunList::new("main");
        list.push(resource);

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let report = driver.run(&list, RunOptions::default()).unwrap();

        assert_eq!(
            report.resources[0].outcome,
            Outcome::Skipped {
                reason: "platform constraint not met".to_string()
            }
        );
    }

    #[test]
    fn unresolved_conditional_aborts_the_run() {
        use crate::conditional::{Conditional, PlatformValue};

        let by_platform = PlatformValue::default().with("rhel", "6.0", "couchdb".to_string());
        let resource = Resource::Package(PackageResource {
            name: "couchdb".to_string(),
            packages: vec![Conditional::ByPlatform { by_platform }],
            actions: vec![ActionVerb::Install],
            only_if: None,
            not_if: None,
            constraint: None,
        });

        let mut list = RunList::new("main");
        list.push(resource);

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let err = driver.run(&list, RunOptions::default()).unwrap_err();
        assert!(matches!(err, ConvergenceError::UnresolvedConditional { .. }));
    }

    #[test]
    fn second_run_is_all_unchanged() {
        use crate::resource::{DirectoryResource, ServiceResource};

        let dir = tempfile::tempdir().unwrap();

        let mut list = RunList::new("main");
        list.push(package("libfoo"));
        list.push(Resource::Directory(DirectoryResource {
            path: dir.path().join("opt/x"),
            owner: None,
            group: None,
            mode: Some(0o770),
            actions: vec![ActionVerb::Create],
            only_if: None,
            not_if: None,
            constraint: None,
        }));
        list.push(Resource::Service(ServiceResource {
            name: "x".to_string(),
            supports: Vec::new(),
            actions: vec![ActionVerb::Enable, ActionVerb::Start],
            only_if: None,
            not_if: None,
            constraint: None,
        }));

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());

        let first = driver.run(&list, RunOptions::default()).unwrap();
        assert_eq!(first.applied(), 3);
        assert_eq!(first.unchanged(), 0);

        let second = driver.run(&list, RunOptions::default()).unwrap();
        assert_eq!(second.applied(), 0);
        assert_eq!(second.unchanged(), 3);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let mut list = RunList::new("main");
        list.push(package("erlang"));
        list.push(touch_command("step", &marker));

        let world = FakeWorld::new();
        let driver = Driver::new(facts(), world.capabilities());
        let report = driver.run(&list, RunOptions { dry_run: true }).unwrap();

        assert_eq!(report.skipped(), 2);
        assert!(!marker.exists());
        assert!(world.install_calls.borrow().is_empty());
        assert!(world.installed.borrow().is_empty());
    }

    #[test]
    fn report_counts_are_consistent() {
        let report = RunReport {
            status: RunStatus::Converged,
            resources: vec![
                ResourceReport {
                    id: "a".to_string(),
                    kind: "package",
                    outcome: Outcome::Applied,
                },
                ResourceReport {
                    id: "b".to_string(),
                    kind: "package",
                    outcome: Outcome::Unchanged,
                },
                ResourceReport {
                    id: "c".to_string(),
                    kind: "command",
                    outcome: Outcome::Skipped {
                        reason: "dry run".to_string(),
                    },
                },
            ],
        };
        assert_eq!(report.applied(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.skipped(), 1);
    }
}
