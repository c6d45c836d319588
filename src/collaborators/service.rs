//! systemd service management.
//!
//! Enable and start verbs probe current state first so an
//! already-satisfied verb reports no change; restart always acts.

use converge::{ActionError, ActionVerb, ServiceChange, ServiceManager};
use std::process::{Command, Stdio};

pub struct SystemctlManager;

impl SystemctlManager {
    pub fn new() -> Self {
        Self
    }

    fn probe(&self, service: &str, query: &str) -> Result<bool, ActionError> {
        // Non-zero exit means "no" here, not a failed probe.
        let status = Command::new("systemctl")
            .args([query, service])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| self.error(service, format!("failed to run systemctl: {e}")))?;
        Ok(status.success())
    }

    fn act(&self, service: &str, verb: &str) -> Result<(), ActionError> {
        log::info!("systemctl {verb} {service}");
        let output = Command::new("systemctl")
            .args([verb, service])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.error(service, format!("failed to run systemctl: {e}")))?;

        if !output.status.success() {
            return Err(self.error(
                service,
                format!(
                    "systemctl {verb} exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }

    fn error(&self, service: &str, message: String) -> ActionError {
        ActionError::Service {
            service: service.to_string(),
            message,
        }
    }
}

impl ServiceManager for SystemctlManager {
    fn apply(&self, service: &str, verb: ActionVerb) -> Result<ServiceChange, ActionError> {
        let (probe, act) = match verb {
            ActionVerb::Enable => (Some(("is-enabled", true)), "enable"),
            ActionVerb::Disable => (Some(("is-enabled", false)), "disable"),
            ActionVerb::Start => (Some(("is-active", true)), "start"),
            ActionVerb::Stop => (Some(("is-active", false)), "stop"),
            ActionVerb::Restart => (None, "restart"),
            ActionVerb::Status => {
                let active = self.probe(service, "is-active")?;
                log::info!(
                    "service {service} is {}",
                    if active { "active" } else { "inactive" }
                );
                return Ok(ServiceChange::AlreadySatisfied);
            }
            other => {
                return Err(self.error(service, format!("verb '{other}' is not a service verb")));
            }
        };

        if let Some((query, want)) = probe
            && self.probe(service, query)? == want
        {
            return Ok(ServiceChange::AlreadySatisfied);
        }

        self.act(service, act)?;
        Ok(ServiceChange::Changed)
    }
}
