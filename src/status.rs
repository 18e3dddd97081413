//! Ready-check and status-report diagnostics
//!
//! Everything here is derived from stored state on demand; nothing is written
//! and the ownership state is never changed.

use std::fmt;

use serde::Serialize;

use crate::config::RttSettings;
use crate::file_sync::{self, Refusal, SyncPlan};
use crate::ownership::{FileOwnership, OwnershipState};
use crate::paths::RttPaths;
use crate::serializer::GeneratedConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Presentation hints for the host's report view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const NONE: StatusFlags = StatusFlags(0);
    pub const CONFIGURATION_UP_TO_DATE: StatusFlags = StatusFlags(1);
    pub const VERBOSE: StatusFlags = StatusFlags(1 << 1);

    pub fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlags) -> StatusFlags {
        StatusFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReportItem {
    pub severity: Severity,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub flags: StatusFlags,
}

impl StatusReportItem {
    pub fn info(status: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            status: status.into(),
            recommendation: None,
            flags: StatusFlags::NONE,
        }
    }

    pub fn warning(status: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            status: status.into(),
            recommendation: Some(recommendation.into()),
            flags: StatusFlags::NONE,
        }
    }

    pub fn error(status: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            status: status.into(),
            recommendation: Some(recommendation.into()),
            flags: StatusFlags::NONE,
        }
    }

    pub fn with_flags(mut self, flags: StatusFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl fmt::Display for StatusReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.status)?;
        if let Some(recommendation) = &self.recommendation {
            write!(f, "\n        -> {recommendation}")?;
        }
        Ok(())
    }
}

/// Any `Error` item keeps the profile from being declared runnable
pub fn blocks_profile(items: &[StatusReportItem]) -> bool {
    items.iter().any(|item| item.severity == Severity::Error)
}

/// Snapshot of synchronizer state the reporter reads
pub struct StatusContext<'a> {
    pub state: OwnershipState,
    pub paths: Option<&'a RttPaths>,
    pub config: &'a GeneratedConfig,
    pub settings: &'a RttSettings,
    pub resolved_displays: usize,
    pub running_pid: Option<u32>,
}

const RECOMMEND_CONSENT: &str = "Re-enable RTT configuration generation and confirm taking ownership of the existing file; it will be kept as a backup";
const RECOMMEND_INSTALL_DIR: &str = "Configure a valid Falcon BMS installation directory";

pub fn ready_check(ctx: &StatusContext<'_>) -> Vec<StatusReportItem> {
    let mut items = Vec::new();

    match ctx.state {
        OwnershipState::Disabled => {
            items.push(StatusReportItem::info("RTT configuration generation is disabled"));
            return items;
        }
        OwnershipState::AwaitingConsent => {
            let status = match ctx.paths {
                Some(paths) => format!(
                    "RTT configuration generation is suspended because '{}' was not generated by this application",
                    paths.config_file().display()
                ),
                None => "RTT configuration generation is suspended until ownership of the existing file is confirmed".to_string(),
            };
            items.push(StatusReportItem::error(status, RECOMMEND_CONSENT));
            return items;
        }
        OwnershipState::Active => {
            items.push(StatusReportItem::info("RTT configuration generation is enabled"));
        }
    }

    items.extend(file_items(ctx));
    items.extend(option_items(ctx));
    items.extend(process_items(ctx));
    items
}

/// Ready-check items followed by every generated line as a verbose item
pub fn status_report(ctx: &StatusContext<'_>) -> Vec<StatusReportItem> {
    let mut items = ready_check(ctx);
    if ctx.state == OwnershipState::Active {
        items.extend(ctx.config.lines().iter().map(|line| {
            StatusReportItem::info(line.clone())
                .with_flags(StatusFlags::CONFIGURATION_UP_TO_DATE | StatusFlags::VERBOSE)
        }));
    }
    if let Some(pid) = ctx.running_pid {
        items.push(StatusReportItem::info(format!(
            "RTT client started by this profile is running (PID {pid})"
        )));
    }
    items
}

fn file_items(ctx: &StatusContext<'_>) -> Vec<StatusReportItem> {
    let content = ctx.config.contents();
    let plan = match file_sync::plan(ctx.paths, ctx.state, &content) {
        Ok(plan) => plan,
        Err(e) => {
            return vec![StatusReportItem::error(
                format!("Unable to check the RTT configuration file: {e}: {}", e.io_error()),
                "Check the permissions of the RTT configuration file",
            )];
        }
    };

    let item = match plan {
        SyncPlan::UpToDate => {
            let path = ctx.paths.map(|p| p.config_file().display().to_string()).unwrap_or_default();
            StatusReportItem::info(format!("RTT configuration file '{path}' is up to date"))
                .with_flags(StatusFlags::CONFIGURATION_UP_TO_DATE)
        }
        SyncPlan::Write {
            path,
            existing: FileOwnership::Missing | FileOwnership::Empty,
        } => StatusReportItem::info(format!(
            "RTT configuration file '{}' will be created when the profile starts",
            path.display()
        )),
        SyncPlan::Write { path, .. } => StatusReportItem::info(format!(
            "RTT configuration file '{}' will be updated when the profile starts",
            path.display()
        )),
        SyncPlan::Refuse(reason @ Refusal::NotOwned(_)) => StatusReportItem::error(
            format!("RTT configuration file will not be written: {reason}"),
            RECOMMEND_CONSENT,
        ),
        SyncPlan::Refuse(reason @ (Refusal::NoInstallDir | Refusal::MissingInstallDir(_))) => {
            StatusReportItem::error(
                format!("RTT configuration file cannot be written: {reason}"),
                RECOMMEND_INSTALL_DIR,
            )
        }
        SyncPlan::Refuse(reason) => StatusReportItem::error(reason.to_string(), RECOMMEND_CONSENT),
    };
    vec![item]
}

fn option_items(ctx: &StatusContext<'_>) -> Vec<StatusReportItem> {
    let mut items = Vec::new();
    if ctx.resolved_displays == 0 {
        items.push(StatusReportItem::warning(
            "No viewports in this profile match an RTT display, so RTT will not show anything",
            "Add viewports named HUD, PFL, DED, RWR, MFDLEFT, MFDRIGHT or HMS (append _ONTOP for overlays)",
        ));
    }
    if ctx.settings.networked && ctx.settings.network.host.trim().is_empty() {
        items.push(StatusReportItem::warning(
            "RTT is configured for networked mode but no host is set",
            "Set the network host to the address of the computer running Falcon BMS",
        ));
    }
    items
}

fn process_items(ctx: &StatusContext<'_>) -> Vec<StatusReportItem> {
    let control = &ctx.settings.process_control;
    if !control.run_with_profile {
        return vec![StatusReportItem::info(
            "The RTT client will not be started or stopped by this profile",
        )];
    }

    let Some(paths) = ctx.paths else {
        // already reported as an invalid target path
        return Vec::new();
    };
    let executable = paths.executable(&control.executable);
    if executable.is_file() {
        vec![StatusReportItem::info(format!(
            "The RTT client '{}' will be started and stopped with this profile",
            executable.display()
        ))]
    } else {
        vec![StatusReportItem::error(
            format!("The RTT client '{}' does not exist", executable.display()),
            "Check the RTT client executable name or disable starting RTT with the profile",
        )]
    }
}
