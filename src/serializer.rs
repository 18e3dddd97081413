//! RTTClient.INI generation
//!
//! Output order is fixed: header, global options, one `USE_*` line for every
//! catalogue channel, geometry for present channels, then overlay flags for
//! present channels. The RTT client does not care about order; we keep it
//! canonical so identical inputs always produce identical bytes.

use crate::config::RttSettings;
use crate::constants::{geometry, rtt, text};
use crate::display::{DisplayChannel, ResolvedDisplaySet};

/// Global option values written before the per-display sections
#[derive(Debug, Clone, Copy)]
pub struct GlobalOptions<'a> {
    pub renderer: i32,
    pub networked: bool,
    pub local: &'a crate::config::LocalOptions,
    pub network: &'a crate::config::NetworkOptions,
}

impl<'a> From<&'a RttSettings> for GlobalOptions<'a> {
    fn from(settings: &'a RttSettings) -> Self {
        Self {
            renderer: settings.renderer,
            networked: settings.networked,
            local: &settings.local,
            network: &settings.network,
        }
    }
}

/// Generated file contents, one entry per line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedConfig {
    lines: Vec<String>,
}

impl GeneratedConfig {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// File contents joined with the platform newline, no trailing newline
    pub fn contents(&self) -> String {
        self.lines.join(text::NEWLINE)
    }
}

/// Header line carrying the ownership marker and generator version
pub fn header_line() -> String {
    format!("{} {}", rtt::MARKER, rtt::GENERATOR_VERSION)
}

/// Round the way RTT coordinates always have been: add one half, truncate
pub fn round_coordinate(value: f64) -> i64 {
    (value + geometry::ROUNDING_BIAS) as i64
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

pub fn serialize(
    options: &GlobalOptions<'_>,
    resolved: &ResolvedDisplaySet,
    supported: &[DisplayChannel],
) -> GeneratedConfig {
    let mut lines = vec![header_line()];

    let local = options.local;
    let network = options.network;
    lines.push(format!("RENDERER = {}", options.renderer));
    lines.push(format!("NETWORKED = {}", flag(options.networked)));
    lines.push(format!("FPS = {}", local.fps));
    lines.push(format!("HOST = {}", network.host));
    lines.push(format!("PORT = {}", network.port));
    lines.push(format!("DATA_F4 = {}", flag(network.data_f4)));
    lines.push(format!("DATA_BMS = {}", flag(network.data_bms)));
    lines.push(format!("DATA_OSB = {}", flag(network.data_osb)));
    lines.push(format!("DATA_IVIBE = {}", flag(network.data_ivibe)));
    lines.push(format!("DATA_STRINGS = {}", flag(network.data_strings)));
    lines.push(format!("DATA_DRAWING = {}", flag(network.data_drawing)));
    lines.push(format!("LOCAL_GRID = {}", flag(local.local_grid)));

    for channel in supported {
        lines.push(format!("USE_{} = {}", channel, flag(resolved.contains(*channel))));
    }

    for (channel, display) in resolved.iter() {
        let rect = &display.region.rect;
        lines.push(format!("{}_X = {}", channel, round_coordinate(rect.x)));
        lines.push(format!("{}_Y = {}", channel, round_coordinate(rect.y)));
        lines.push(format!("{}_W = {}", channel, round_coordinate(rect.width)));
        lines.push(format!("{}_H = {}", channel, round_coordinate(rect.height)));
    }

    for (channel, display) in resolved.iter() {
        lines.push(format!("{}_ONTOP = {}", channel, flag(display.overlay)));
    }

    GeneratedConfig { lines }
}
