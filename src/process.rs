//! RTT client process lifecycle
//!
//! The controller launches the client at most once per profile run and only
//! stops a process it launched itself. Clients started by the user are never
//! touched.

use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::constants::process as timing;

/// Program and working directory for the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub working_dir: PathBuf,
}

/// A client process this controller launched
pub trait RunningProcess {
    fn id(&self) -> u32;

    /// Stop the process and wait for it to exit
    fn terminate(self: Box<Self>) -> Result<()>;
}

pub trait ProcessLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Box<dyn RunningProcess>>;
}

/// Launches real processes via `std::process::Command`
#[derive(Debug, Default)]
pub struct ChildLauncher;

impl ProcessLauncher for ChildLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Box<dyn RunningProcess>> {
        let child = Command::new(&spec.program)
            .current_dir(&spec.working_dir)
            .spawn()
            .with_context(|| format!("Failed to spawn RTT client {:?}", spec.program))?;
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Ask politely first; returns true once the process has exited
    #[cfg(unix)]
    fn request_exit(&mut self) -> Result<bool> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.child.id() as i32);
        if let Err(err) = kill(pid, Signal::SIGTERM) {
            warn!(pid = self.child.id(), error = %err, "Failed to send SIGTERM to RTT client");
            return Ok(false);
        }

        let deadline = Instant::now() + Duration::from_millis(timing::TERMINATE_GRACE_MS);
        while Instant::now() < deadline {
            if self
                .child
                .try_wait()
                .context("Failed to query RTT client status")?
                .is_some()
            {
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(timing::EXIT_POLL_MS));
        }
        Ok(false)
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) -> Result<bool> {
        Ok(false)
    }
}

impl RunningProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn terminate(mut self: Box<Self>) -> Result<()> {
        if self
            .child
            .try_wait()
            .context("Failed to query RTT client status")?
            .is_some()
        {
            debug!(pid = self.child.id(), "RTT client already exited");
            return Ok(());
        }

        if self.request_exit()? {
            return Ok(());
        }

        warn!(pid = self.child.id(), "RTT client did not exit, killing it");
        let _ = self.child.kill();
        self.child
            .wait()
            .context("Failed to wait for RTT client exit")?;
        Ok(())
    }
}

/// What happened at profile start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    Launched { pid: u32 },
    /// Already launched during this run
    AlreadyRunning { pid: u32 },
    /// Configuration was not written; never run against a stale file
    ConfigNotCurrent,
    /// Policy does not allow this profile to start processes
    PolicyDisallows,
}

/// What happened at profile stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Stopped { pid: u32 },
    NotStartedThisRun,
    PolicyDisallows { pid: u32 },
}

/// Per-run record of the process we launched
struct ProcessRunRecord {
    process: Box<dyn RunningProcess>,
}

pub struct ProcessController {
    launcher: Box<dyn ProcessLauncher>,
    run: Option<ProcessRunRecord>,
}

impl fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessController")
            .field("running_pid", &self.running_pid())
            .finish()
    }
}

impl Default for ProcessController {
    fn default() -> Self {
        Self::new(Box::new(ChildLauncher))
    }
}

impl ProcessController {
    pub fn new(launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            run: None,
        }
    }

    /// PID of the client launched during the current run, if any
    pub fn running_pid(&self) -> Option<u32> {
        self.run.as_ref().map(|record| record.process.id())
    }

    pub fn on_profile_start(
        &mut self,
        policy_allows: bool,
        config_current: bool,
        spec: &LaunchSpec,
    ) -> Result<StartDecision> {
        if !config_current {
            debug!("Not launching RTT client: configuration was not written");
            return Ok(StartDecision::ConfigNotCurrent);
        }
        if !policy_allows {
            debug!("Not launching RTT client: process control disabled for this profile");
            return Ok(StartDecision::PolicyDisallows);
        }
        if let Some(pid) = self.running_pid() {
            debug!(pid, "RTT client already launched during this run");
            return Ok(StartDecision::AlreadyRunning { pid });
        }

        let process = self.launcher.launch(spec)?;
        let pid = process.id();
        info!(pid, program = %spec.program.display(), "Started RTT client");
        self.run = Some(ProcessRunRecord { process });
        Ok(StartDecision::Launched { pid })
    }

    /// Ends the run; the run record is cleared whatever the decision
    pub fn on_profile_stop(&mut self, policy_allows: bool) -> Result<StopDecision> {
        let Some(record) = self.run.take() else {
            return Ok(StopDecision::NotStartedThisRun);
        };
        let pid = record.process.id();
        if !policy_allows {
            info!(pid, "Leaving RTT client running: process control disabled for this profile");
            return Ok(StopDecision::PolicyDisallows { pid });
        }

        info!(pid, "Stopping RTT client");
        record.process.terminate()?;
        Ok(StopDecision::Stopped { pid })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, FakeLauncher};
    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            program: PathBuf::from("/bms/Tools/RTTRemote/RTTClient64.exe"),
            working_dir: PathBuf::from("/bms/Tools/RTTRemote"),
        }
    }

    fn controller() -> (ProcessController, FakeLauncher) {
        let launcher = FakeLauncher::default();
        (ProcessController::new(Box::new(launcher.clone())), launcher)
    }

    #[test]
    fn test_start_then_stop_is_symmetric() {
        let (mut controller, launcher) = controller();
        let started = controller.on_profile_start(true, true, &spec()).unwrap();
        assert_eq!(started, StartDecision::Launched { pid: 1001 });
        assert_eq!(controller.running_pid(), Some(1001));

        let stopped = controller.on_profile_stop(true).unwrap();
        assert_eq!(stopped, StopDecision::Stopped { pid: 1001 });
        assert_eq!(controller.running_pid(), None);
        assert_eq!(
            *launcher.calls.borrow(),
            vec![Call::Launch(spec().program), Call::Terminate(1001)]
        );
    }

    #[test]
    fn test_stale_config_never_launches() {
        let (mut controller, launcher) = controller();
        let decision = controller.on_profile_start(true, false, &spec()).unwrap();
        assert_eq!(decision, StartDecision::ConfigNotCurrent);
        assert_eq!(controller.on_profile_stop(true).unwrap(), StopDecision::NotStartedThisRun);
        assert!(launcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_policy_refusal_is_silent_no_op() {
        let (mut controller, launcher) = controller();
        assert_eq!(
            controller.on_profile_start(false, true, &spec()).unwrap(),
            StartDecision::PolicyDisallows
        );
        assert_eq!(controller.on_profile_stop(false).unwrap(), StopDecision::NotStartedThisRun);
        assert!(launcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_at_most_one_launch_per_run() {
        let (mut controller, launcher) = controller();
        controller.on_profile_start(true, true, &spec()).unwrap();
        let again = controller.on_profile_start(true, true, &spec()).unwrap();
        assert_eq!(again, StartDecision::AlreadyRunning { pid: 1001 });
        assert_eq!(launcher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_stop_without_policy_forgets_process() {
        let (mut controller, launcher) = controller();
        controller.on_profile_start(true, true, &spec()).unwrap();
        assert_eq!(
            controller.on_profile_stop(false).unwrap(),
            StopDecision::PolicyDisallows { pid: 1001 }
        );
        assert_eq!(controller.running_pid(), None);
        assert_eq!(launcher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_launch_failure_records_nothing() {
        let launcher = FakeLauncher {
            fail: true,
            ..FakeLauncher::default()
        };
        let mut controller = ProcessController::new(Box::new(launcher));
        assert!(controller.on_profile_start(true, true, &spec()).is_err());
        assert_eq!(controller.running_pid(), None);
    }

    #[test]
    fn test_new_run_can_launch_again() {
        let (mut controller, launcher) = controller();
        controller.on_profile_start(true, true, &spec()).unwrap();
        controller.on_profile_stop(true).unwrap();
        let second = controller.on_profile_start(true, true, &spec()).unwrap();
        assert_eq!(second, StartDecision::Launched { pid: 1003 });
        assert_eq!(launcher.calls.borrow().len(), 3);
    }
}
