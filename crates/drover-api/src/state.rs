//! Process lifecycle state

/// Lifecycle of a managed process.
///
/// `Created -> Running -> Completed | Failed | Killed`; the three right-hand
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Running { pid: u32 },
    Completed,
    Failed,
    Killed,
}

impl ProcessState {
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessState::Running { pid } => Some(*pid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_has_pid() {
        assert_eq!(ProcessState::Running { pid: 7 }.pid(), Some(7));
        assert_eq!(ProcessState::Created.pid(), None);
        assert_eq!(ProcessState::Killed.pid(), None);
    }
}
