//! Host-facing RTT configuration synchronizer
//!
//! Owns the generated configuration buffer, the ownership state and the
//! process controller for one host profile. The host drives it through
//! viewport updates, profile lifecycle events and diagnostic pulls; every call
//! runs synchronously on the caller's thread.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{LocalOptions, NetworkOptions, ProcessControlOptions, RttSettings};
use crate::consent::{ConsentAnswer, ConsentPrompter, ConsentRequest};
use crate::display::{self, DisplayChannel, ResolvedDisplaySet};
use crate::events::{Listeners, OptionGroup, SyncEvent};
use crate::file_sync::{self, SyncOutcome};
use crate::ownership::{self, FileOwnership, OwnershipState};
use crate::paths::{RttPaths, backup_path};
use crate::process::{LaunchSpec, ProcessController, ProcessLauncher, StartDecision, StopDecision};
use crate::serializer::{self, GeneratedConfig, GlobalOptions};
use crate::status::{self, StatusContext, StatusReportItem};
use crate::types::ViewportRegion;

/// Result of a successful profile start
#[derive(Debug)]
pub struct ProfileStart {
    pub sync: SyncOutcome,
    pub process: StartDecision,
}

#[derive(Debug)]
pub struct RttSynchronizer {
    settings: RttSettings,
    install_dir: Option<PathBuf>,
    state: OwnershipState,
    resolved: ResolvedDisplaySet,
    config: GeneratedConfig,
    process: ProcessController,
    listeners: Listeners,
}

impl RttSynchronizer {
    pub fn new(settings: RttSettings, install_dir: Option<PathBuf>) -> Self {
        Self::with_process_controller(settings, install_dir, ProcessController::default())
    }

    pub fn with_launcher(
        settings: RttSettings,
        install_dir: Option<PathBuf>,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Self {
        Self::with_process_controller(settings, install_dir, ProcessController::new(launcher))
    }

    fn with_process_controller(
        settings: RttSettings,
        install_dir: Option<PathBuf>,
        process: ProcessController,
    ) -> Self {
        let state = OwnershipState::from_flags(settings.enabled, settings.awaiting_consent);
        let resolved = ResolvedDisplaySet::default();
        let config = serializer::serialize(&GlobalOptions::from(&settings), &resolved, &DisplayChannel::ALL);
        Self {
            settings,
            install_dir,
            state,
            resolved,
            config,
            process,
            listeners: Listeners::default(),
        }
    }

    /// Register a listener for state, option and configuration changes
    pub fn subscribe(&mut self, listener: impl FnMut(&SyncEvent) + 'static) {
        self.listeners.push(listener);
    }

    /// Settings to persist with the profile
    pub fn settings(&self) -> &RttSettings {
        &self.settings
    }

    pub fn state(&self) -> OwnershipState {
        self.state
    }

    pub fn config(&self) -> &GeneratedConfig {
        &self.config
    }

    pub fn install_dir(&self) -> Option<&Path> {
        self.install_dir.as_deref()
    }

    pub fn paths(&self) -> Option<RttPaths> {
        RttPaths::from_install_dir(self.install_dir())
    }

    pub fn running_pid(&self) -> Option<u32> {
        self.process.running_pid()
    }

    pub fn set_install_dir(&mut self, install_dir: Option<PathBuf>) {
        self.install_dir = install_dir;
    }

    pub fn set_renderer(&mut self, renderer: i32) {
        if self.settings.renderer != renderer {
            self.settings.renderer = renderer;
            self.options_changed(OptionGroup::Renderer);
        }
    }

    pub fn set_networked(&mut self, networked: bool) {
        if self.settings.networked != networked {
            self.settings.networked = networked;
            self.options_changed(OptionGroup::Networked);
        }
    }

    pub fn set_local_options(&mut self, local: LocalOptions) {
        if self.settings.local != local {
            self.settings.local = local;
            self.options_changed(OptionGroup::Local);
        }
    }

    pub fn set_network_options(&mut self, network: NetworkOptions) {
        if self.settings.network != network {
            self.settings.network = network;
            self.options_changed(OptionGroup::Network);
        }
    }

    pub fn set_process_control(&mut self, process_control: ProcessControlOptions) {
        if self.settings.process_control != process_control {
            self.settings.process_control = process_control;
            self.listeners.emit(SyncEvent::OptionsChanged(OptionGroup::ProcessControl));
        }
    }

    /// Turn the feature on or off without prompting.
    ///
    /// Turning it on does not resolve a pending consent; that only happens in
    /// [`Self::on_interactively_enabled`].
    pub fn set_enabled(&mut self, enabled: bool) {
        let next = if enabled {
            self.state.enable()
        } else {
            self.state.disable()
        };
        self.transition(next);
    }

    /// Regenerate the in-memory configuration from the host's viewports; no I/O
    pub fn update<'a, I>(&mut self, viewports: I)
    where
        I: IntoIterator<Item = &'a ViewportRegion>,
    {
        self.resolved = display::resolve(viewports);
        if self.regenerate() {
            debug!(displays = self.resolved.len(), "RTT configuration regenerated");
            self.listeners.emit(SyncEvent::ConfigRegenerated);
        } else {
            debug!("RTT configuration unchanged");
        }
    }

    /// Fix up state after a persisted configuration is attached to a profile
    pub fn on_loaded(&mut self) {
        let (enabled, awaiting_consent) = self.state.flags();
        if self.settings.enabled != enabled || self.settings.awaiting_consent != awaiting_consent {
            warn!(state = %self.state, "Normalizing inconsistent RTT enable flags");
            self.settings.enabled = enabled;
            self.settings.awaiting_consent = awaiting_consent;
        }
        self.check_ownership();
    }

    /// Write the configuration and start the client if allowed.
    ///
    /// Refusals are not errors; they are reported by the ready check. Only I/O
    /// failures while writing, and a failed client launch, abort the start.
    pub fn on_profile_start(&mut self) -> Result<Option<ProfileStart>> {
        if self.state == OwnershipState::Disabled {
            return Ok(None);
        }

        self.check_ownership();
        let paths = self.paths();
        let contents = self.config.contents();
        let sync = file_sync::sync(paths.as_ref(), self.state, &contents);
        if let SyncOutcome::Failed(e) = sync {
            return Err(anyhow::Error::new(e).context("Failed to write RTT configuration at profile start"));
        }

        let process = match &paths {
            Some(paths) => {
                let spec = LaunchSpec {
                    program: paths.executable(&self.settings.process_control.executable),
                    working_dir: paths.tool_dir(),
                };
                self.process.on_profile_start(
                    self.settings.process_control.run_with_profile,
                    sync.is_current(),
                    &spec,
                )?
            }
            None => StartDecision::ConfigNotCurrent,
        };

        Ok(Some(ProfileStart { sync, process }))
    }

    /// Stop the client if this run started it and policy allows
    pub fn on_profile_stop(&mut self) -> Result<StopDecision> {
        self.process
            .on_profile_stop(self.settings.process_control.run_with_profile)
    }

    pub fn on_ready_check(&self) -> Vec<StatusReportItem> {
        let paths = self.paths();
        status::ready_check(&self.status_context(paths.as_ref()))
    }

    pub fn on_status_report(&self) -> Vec<StatusReportItem> {
        let paths = self.paths();
        status::status_report(&self.status_context(paths.as_ref()))
    }

    /// Enable at the user's request, taking over a foreign file with consent.
    ///
    /// Returns the resulting state. Declining leaves the feature disabled.
    pub fn on_interactively_enabled(
        &mut self,
        prompter: &mut dyn ConsentPrompter,
    ) -> Result<OwnershipState> {
        let Some(paths) = self.paths() else {
            self.transition(OwnershipState::Active);
            return Ok(self.state);
        };

        let target = paths.config_file();
        let ownership = ownership::inspect(&target)
            .with_context(|| format!("Failed to read RTT configuration {:?}", target))?;
        if ownership != FileOwnership::Foreign {
            self.transition(OwnershipState::Active);
            return Ok(self.state);
        }

        let request = ConsentRequest {
            backup: backup_path(&target),
            target,
        };
        let answer = prompter.confirm_takeover(&request);
        info!(answer = ?answer, path = %request.target.display(), "RTT takeover prompt answered");

        if answer == ConsentAnswer::Yes {
            let backup = file_sync::adopt(&request.target, &self.config.contents())
                .context("Failed to take ownership of RTT configuration")?;
            debug!(backup = %backup.display(), "Foreign RTT configuration preserved");
        }
        self.transition(self.state.consent(answer));
        Ok(self.state)
    }

    fn status_context<'a>(&'a self, paths: Option<&'a RttPaths>) -> StatusContext<'a> {
        StatusContext {
            state: self.state,
            paths,
            config: &self.config,
            settings: &self.settings,
            resolved_displays: self.resolved.len(),
            running_pid: self.process.running_pid(),
        }
    }

    /// Suspend if an active synchronizer finds a foreign file at the target
    fn check_ownership(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let Some(paths) = self.paths() else {
            return;
        };
        let target = paths.config_file();
        match ownership::inspect(&target) {
            Ok(found) => {
                let next = self.state.after_inspection(found);
                if next != self.state {
                    warn!(path = %target.display(), "RTT configuration file was not generated by this application; waiting for consent");
                }
                self.transition(next);
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "Unable to inspect RTT configuration");
            }
        }
    }

    fn transition(&mut self, to: OwnershipState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        let (enabled, awaiting_consent) = to.flags();
        self.settings.enabled = enabled;
        self.settings.awaiting_consent = awaiting_consent;
        info!(from = %from, to = %to, "RTT synchronizer state changed");
        self.listeners.emit(SyncEvent::StateChanged { from, to });
    }

    fn options_changed(&mut self, group: OptionGroup) {
        self.regenerate();
        self.listeners.emit(SyncEvent::OptionsChanged(group));
    }

    /// Returns true if the text changed
    fn regenerate(&mut self) -> bool {
        let config = serializer::serialize(
            &GlobalOptions::from(&self.settings),
            &self.resolved,
            &DisplayChannel::ALL,
        );
        if config == self.config {
            return false;
        }
        self.config = config;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::rtt;
    use crate::process::testing::{Call, FakeLauncher};
    use crate::types::Rect;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        launcher: FakeLauncher,
        sync: RttSynchronizer,
        events: Rc<RefCell<Vec<SyncEvent>>>,
    }

    fn harness(settings: RttSettings) -> Harness {
        let dir = TempDir::new().unwrap();
        let launcher = FakeLauncher::default();
        let mut sync = RttSynchronizer::with_launcher(
            settings,
            Some(dir.path().to_path_buf()),
            Box::new(launcher.clone()),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        sync.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        sync.update(&[ViewportRegion::new("HUD", Rect::new(10.4, 20.6, 100.0, 50.0))]);
        Harness {
            dir,
            launcher,
            sync,
            events,
        }
    }

    fn enabled() -> RttSettings {
        RttSettings {
            enabled: true,
            ..RttSettings::default()
        }
    }

    fn target(h: &Harness) -> PathBuf {
        h.sync.paths().unwrap().config_file()
    }

    #[test]
    fn test_first_start_creates_file_without_launch_by_default() {
        let mut h = harness(enabled());
        let start = h.sync.on_profile_start().unwrap().unwrap();
        assert!(matches!(start.sync, SyncOutcome::Updated));
        assert_eq!(start.process, StartDecision::PolicyDisallows);

        let written = std::fs::read_to_string(target(&h)).unwrap();
        assert!(written.starts_with(rtt::MARKER));
        assert!(written.contains("HUD_Y = 21"));
        assert!(h.launcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_start_launches_and_stop_terminates() {
        let mut settings = enabled();
        settings.process_control.run_with_profile = true;
        let mut h = harness(settings);

        let start = h.sync.on_profile_start().unwrap().unwrap();
        assert_eq!(start.process, StartDecision::Launched { pid: 1001 });
        assert_eq!(h.sync.running_pid(), Some(1001));

        assert_eq!(h.sync.on_profile_stop().unwrap(), StopDecision::Stopped { pid: 1001 });
        let calls = h.launcher.calls.borrow();
        assert!(matches!(calls[0], Call::Launch(ref program) if program.ends_with("Tools/RTTRemote/RTTClient64.exe")));
        assert_eq!(calls[1], Call::Terminate(1001));
    }

    #[test]
    fn test_second_start_is_up_to_date() {
        let mut h = harness(enabled());
        h.sync.on_profile_start().unwrap();
        h.sync.on_profile_stop().unwrap();
        let start = h.sync.on_profile_start().unwrap().unwrap();
        assert!(matches!(start.sync, SyncOutcome::UpToDate));
    }

    #[test]
    fn test_foreign_file_on_start_suspends_and_skips_launch() {
        let mut settings = enabled();
        settings.process_control.run_with_profile = true;
        let mut h = harness(settings);
        std::fs::create_dir_all(target(&h).parent().unwrap()).unwrap();
        std::fs::write(target(&h), "RENDERER = 4").unwrap();

        let start = h.sync.on_profile_start().unwrap().unwrap();
        assert!(matches!(start.sync, SyncOutcome::Refused(_)));
        assert_eq!(start.process, StartDecision::ConfigNotCurrent);
        assert_eq!(h.sync.state(), OwnershipState::AwaitingConsent);
        assert!(!h.sync.settings().enabled);
        assert!(h.sync.settings().awaiting_consent);
        assert_eq!(std::fs::read_to_string(target(&h)).unwrap(), "RENDERER = 4");
        assert!(h.launcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_on_loaded_detects_foreign_file() {
        let mut h = harness(enabled());
        std::fs::create_dir_all(target(&h).parent().unwrap()).unwrap();
        std::fs::write(target(&h), "; hand tuned").unwrap();

        h.sync.on_loaded();
        assert_eq!(h.sync.state(), OwnershipState::AwaitingConsent);
        assert!(status::blocks_profile(&h.sync.on_ready_check()));
        assert!(h.events.borrow().contains(&SyncEvent::StateChanged {
            from: OwnershipState::Active,
            to: OwnershipState::AwaitingConsent,
        }));
    }

    #[test]
    fn test_on_loaded_normalizes_both_flags() {
        let settings = RttSettings {
            enabled: true,
            awaiting_consent: true,
            ..RttSettings::default()
        };
        let mut h = harness(settings);
        h.sync.on_loaded();
        assert_eq!(h.sync.state(), OwnershipState::AwaitingConsent);
        assert!(!h.sync.settings().enabled);
    }

    #[test]
    fn test_consent_yes_backs_up_and_takes_over() {
        let mut h = harness(enabled());
        std::fs::create_dir_all(target(&h).parent().unwrap()).unwrap();
        std::fs::write(target(&h), "user settings").unwrap();
        h.sync.on_loaded();

        let mut asked = 0;
        let mut prompter = |request: &ConsentRequest| {
            asked += 1;
            assert!(request.backup.ends_with("RTTClient.original"));
            ConsentAnswer::Yes
        };
        let state = h.sync.on_interactively_enabled(&mut prompter).unwrap();
        assert_eq!(asked, 1);
        assert_eq!(state, OwnershipState::Active);

        let backup = target(&h).with_extension("original");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "user settings");
        assert_eq!(std::fs::read_to_string(target(&h)).unwrap(), h.sync.config().contents());

        let start = h.sync.on_profile_start().unwrap().unwrap();
        assert!(matches!(start.sync, SyncOutcome::UpToDate));
    }

    #[test]
    fn test_consent_declined_disables() {
        for answer in [ConsentAnswer::No, ConsentAnswer::Cancel] {
            let mut h = harness(enabled());
            std::fs::create_dir_all(target(&h).parent().unwrap()).unwrap();
            std::fs::write(target(&h), "user settings").unwrap();
            h.sync.on_loaded();

            let mut prompter = move |_: &ConsentRequest| answer;
            let state = h.sync.on_interactively_enabled(&mut prompter).unwrap();
            assert_eq!(state, OwnershipState::Disabled);
            assert_eq!(std::fs::read_to_string(target(&h)).unwrap(), "user settings");
            assert!(!target(&h).with_extension("original").exists());
        }
    }

    #[test]
    fn test_interactive_enable_without_foreign_file_skips_prompt() {
        let mut h = harness(RttSettings::default());
        let mut prompter = |_: &ConsentRequest| -> ConsentAnswer {
            panic!("should not prompt");
        };
        let state = h.sync.on_interactively_enabled(&mut prompter).unwrap();
        assert_eq!(state, OwnershipState::Active);
        assert!(!target(&h).exists());
    }

    #[test]
    fn test_disabled_start_does_nothing() {
        let mut h = harness(RttSettings::default());
        assert!(h.sync.on_profile_start().unwrap().is_none());
        assert!(!target(&h).exists());
    }

    #[test]
    fn test_unreadable_target_aborts_start() {
        let mut h = harness(enabled());
        // A file where the tool directory should be
        std::fs::write(h.dir.path().join("Tools"), "not a directory").unwrap();
        let err = h.sync.on_profile_start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<file_sync::SyncError>(),
            Some(file_sync::SyncError::Read { .. })
        ));
        assert_eq!(h.sync.running_pid(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_failure_aborts_start_without_launch() {
        let mut settings = enabled();
        settings.process_control.run_with_profile = true;
        let mut h = harness(settings);
        let tool_dir = h.sync.paths().unwrap().tool_dir();
        std::fs::create_dir_all(&tool_dir).unwrap();
        std::os::unix::fs::symlink(h.dir.path().join("gone").join("RTTClient.INI"), target(&h))
            .unwrap();

        let err = h.sync.on_profile_start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<file_sync::SyncError>(),
            Some(file_sync::SyncError::Write { .. })
        ));
        assert_eq!(format!("{err:#}").matches("os error").count(), 1);
        assert_eq!(h.sync.running_pid(), None);
        assert!(h.launcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_option_change_regenerates_and_notifies() {
        let mut h = harness(enabled());
        h.events.borrow_mut().clear();

        let mut network = h.sync.settings().network.clone();
        network.port = 45000;
        h.sync.set_network_options(network.clone());
        h.sync.set_network_options(network);

        assert!(h.sync.config().lines().contains(&"PORT = 45000".to_string()));
        assert_eq!(
            *h.events.borrow(),
            vec![SyncEvent::OptionsChanged(OptionGroup::Network)]
        );
    }

    #[test]
    fn test_update_notifies_only_on_change() {
        let mut h = harness(enabled());
        h.events.borrow_mut().clear();
        let regions = [ViewportRegion::new("HUD", Rect::new(10.4, 20.6, 100.0, 50.0))];
        h.sync.update(&regions);
        assert!(h.events.borrow().is_empty());

        h.sync.update(&[ViewportRegion::new("RWR", Rect::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(*h.events.borrow(), vec![SyncEvent::ConfigRegenerated]);
        assert!(h.sync.config().lines().contains(&"USE_HUD = 0".to_string()));
    }

    #[test]
    fn test_set_enabled_does_not_resolve_consent() {
        let settings = RttSettings {
            awaiting_consent: true,
            ..RttSettings::default()
        };
        let mut h = harness(settings);
        h.sync.set_enabled(true);
        assert_eq!(h.sync.state(), OwnershipState::AwaitingConsent);
        h.sync.set_enabled(false);
        assert_eq!(h.sync.state(), OwnershipState::Disabled);
    }
}
