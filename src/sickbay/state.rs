//! Remediation state machine
//!
//! Type-safe lifecycle for one remediation run using the state-machines crate,
//! in dynamic dispatch mode since steps are driven by runtime health checks.

use state_machines::state_machine;

state_machine! {
    name: RemediationMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Precheck, Healthy, Remediating, Acting, Verifying, Succeeded, AllFailed],
    events {
        begin {
            transition: { from: Idle, to: Precheck }
        }
        pass {
            transition: { from: Precheck, to: Healthy }
        }
        degrade {
            transition: { from: Precheck, to: Remediating }
        }
        act {
            transition: { from: [Remediating, Verifying], to: Acting }
        }
        verify {
            transition: { from: Acting, to: Verifying }
        }
        recover {
            transition: { from: Verifying, to: Succeeded }
        }
        exhaust {
            transition: { from: [Remediating, Verifying], to: AllFailed }
        }
    }
}

/// Simple state enum for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Precheck,
    Healthy,
    Remediating,
    Acting,
    Verifying,
    Succeeded,
    AllFailed,
}

impl Phase {
    /// Parse phase from the machine's state name
    pub fn from_state(s: &str) -> Self {
        match s {
            "Precheck" => Phase::Precheck,
            "Healthy" => Phase::Healthy,
            "Remediating" => Phase::Remediating,
            "Acting" => Phase::Acting,
            "Verifying" => Phase::Verifying,
            "Succeeded" => Phase::Succeeded,
            "AllFailed" => Phase::AllFailed,
            _ => Phase::Idle,
        }
    }

    /// Run has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Healthy | Phase::Succeeded | Phase::AllFailed)
    }
}

/// One remediation run's position in the lifecycle
pub struct RemediationFlow {
    machine: DynamicRemediationMachine<()>,
}

impl RemediationFlow {
    pub fn new() -> Self {
        Self {
            machine: RemediationMachine::new(()).into_dynamic(),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_state(self.machine.current_state())
    }

    pub fn begin(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Begin)
    }

    pub fn pass(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Pass)
    }

    pub fn degrade(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Degrade)
    }

    pub fn act(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Act)
    }

    pub fn verify(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Verify)
    }

    pub fn recover(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Recover)
    }

    pub fn exhaust(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(RemediationMachineEvent::Exhaust)
    }
}

impl Default for RemediationFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let flow = RemediationFlow::new();
        assert_eq!(flow.phase(), Phase::Idle);
        assert!(!flow.phase().is_terminal());
    }

    #[test]
    fn test_healthy_path() {
        let mut flow = RemediationFlow::new();
        flow.begin().unwrap();
        assert_eq!(flow.phase(), Phase::Precheck);
        flow.pass().unwrap();
        assert_eq!(flow.phase(), Phase::Healthy);
        assert!(flow.phase().is_terminal());
    }

    #[test]
    fn test_second_step_succeeds() {
        let mut flow = RemediationFlow::new();
        flow.begin().unwrap();
        flow.degrade().unwrap();

        flow.act().unwrap();
        flow.verify().unwrap();
        assert_eq!(flow.phase(), Phase::Verifying);

        // Verification failed, next action
        flow.act().unwrap();
        flow.verify().unwrap();
        flow.recover().unwrap();
        assert_eq!(flow.phase(), Phase::Succeeded);
    }

    #[test]
    fn test_all_failed() {
        let mut flow = RemediationFlow::new();
        flow.begin().unwrap();
        flow.degrade().unwrap();
        for _ in 0..3 {
            flow.act().unwrap();
            flow.verify().unwrap();
        }
        flow.exhaust().unwrap();
        assert_eq!(flow.phase(), Phase::AllFailed);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut flow = RemediationFlow::new();
        // Cannot act before the precheck
        assert!(flow.act().is_err());

        flow.begin().unwrap();
        flow.pass().unwrap();
        // Healthy is terminal
        assert!(flow.degrade().is_err());
        assert!(flow.act().is_err());
    }
}
