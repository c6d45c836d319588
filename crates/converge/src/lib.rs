//! # Converge
//!
//! A single-node convergence engine for declarative provisioning.
//!
//! Resources declare desired system state; the driver walks a run list
//! in declaration order and brings each resource to its desired state,
//! performing only the work that is actually missing.
//!
//! ## Core Concepts
//!
//! - **Resource**: A typed declaration of desired state (package,
//!   remote file, directory, file, user, service, command)
//! - **Conditional**: A value that resolves per platform family and
//!   version, with an explicit default and no silent fallback
//! - **Guards**: `only_if` / `not_if` probes evaluated immediately
//!   before an action, the idempotence idiom for command resources
//! - **RunList**: An ordered, includable sequence of resources
//! - **Driver**: Runs the pipeline per resource - constraint,
//!   conditional resolution, guards, execution - and fails fast
//!
//! ## Example
//!
//! ```ignore
//! use converge::{
//!     Capabilities, Driver, PlatformFacts, Resource, RunList, RunOptions,
//! };
//!
//! let facts = PlatformFacts::detect()?;
//! let mut list = RunList::new("couchdb");
//! list.push(Resource::Package(/* ... */));
//!
//! let caps = Capabilities { templates, packages, remote, services };
//! let report = Driver::new(facts, caps).run(&list, RunOptions::default())?;
//! println!("{} applied, {} unchanged", report.applied(), report.unchanged());
//! ```
//!
//! ## Capability Traits
//!
//! External collaborators are injected behind traits so the engine
//! stays testable without touching the real system:
//!
//! - [`TemplateEngine`]: Renders file content from a template reference
//! - [`PackageManager`]: Queries, installs and removes packages
//! - [`RemoteSource`]: Downloads URLs to local paths
//! - [`ServiceManager`]: Applies enable/start/etc. to OS services

pub mod capability;
pub mod conditional;
pub mod driver;
pub mod error;
pub mod executor;
pub mod facts;
pub mod guard;
pub mod resource;
pub mod runlist;

pub use capability::{
    Capabilities, PackageManager, RemoteSource, ServiceChange, ServiceManager, TemplateEngine,
};
pub use conditional::{Conditional, PlatformValue, DEFAULT_KEY};
pub use driver::{Driver, Outcome, ResourceReport, RunOptions, RunReport, RunStatus};
pub use error::{ActionError, ConvergenceError};
pub use executor::{checksum_file, ApplyResult, Executor};
pub use facts::PlatformFacts;
pub use guard::{GuardPredicate, Guards};
pub use resource::{
    ActionVerb, CommandResource, DirectoryResource, FileResource, PackageResource,
    PlatformConstraint, RemoteFileResource, Resource, ServiceResource, UserResource,
};
pub use runlist::{PlatformGate, RunItem, RunList};
