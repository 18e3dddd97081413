//! Display resolution: host viewport names to RTT display channels

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::types::ViewportRegion;

/// Display slots the RTT client can render into, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DisplayChannel {
    Hud,
    Pfl,
    Ded,
    Rwr,
    MfdLeft,
    MfdRight,
    Hms,
}

impl DisplayChannel {
    /// Full catalogue in canonical order
    pub const ALL: [DisplayChannel; 7] = [
        DisplayChannel::Hud,
        DisplayChannel::Pfl,
        DisplayChannel::Ded,
        DisplayChannel::Rwr,
        DisplayChannel::MfdLeft,
        DisplayChannel::MfdRight,
        DisplayChannel::Hms,
    ];

    /// Name used in RTTClient.INI keys
    pub fn name(self) -> &'static str {
        match self {
            DisplayChannel::Hud => "HUD",
            DisplayChannel::Pfl => "PFL",
            DisplayChannel::Ded => "DED",
            DisplayChannel::Rwr => "RWR",
            DisplayChannel::MfdLeft => "MFDLEFT",
            DisplayChannel::MfdRight => "MFDRIGHT",
            DisplayChannel::Hms => "HMS",
        }
    }
}

impl fmt::Display for DisplayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One accepted viewport name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportAlias {
    pub name: &'static str,
    pub channel: DisplayChannel,
    pub overlay: bool,
}

const fn alias(name: &'static str, channel: DisplayChannel, overlay: bool) -> ViewportAlias {
    ViewportAlias {
        name,
        channel,
        overlay,
    }
}

/// Viewport names we recognize; `*_ONTOP` names are overlay variants
pub static VIEWPORT_ALIASES: [ViewportAlias; 14] = [
    alias("HUD", DisplayChannel::Hud, false),
    alias("HUD_ONTOP", DisplayChannel::Hud, true),
    alias("PFL", DisplayChannel::Pfl, false),
    alias("PFL_ONTOP", DisplayChannel::Pfl, true),
    alias("DED", DisplayChannel::Ded, false),
    alias("DED_ONTOP", DisplayChannel::Ded, true),
    alias("RWR", DisplayChannel::Rwr, false),
    alias("RWR_ONTOP", DisplayChannel::Rwr, true),
    alias("MFDLEFT", DisplayChannel::MfdLeft, false),
    alias("MFDLEFT_ONTOP", DisplayChannel::MfdLeft, true),
    alias("MFDRIGHT", DisplayChannel::MfdRight, false),
    alias("MFDRIGHT_ONTOP", DisplayChannel::MfdRight, true),
    alias("HMS", DisplayChannel::Hms, false),
    alias("HMS_ONTOP", DisplayChannel::Hms, true),
];

/// Exact, case-sensitive lookup in the alias catalogue
pub fn lookup(viewport_name: &str) -> Option<&'static ViewportAlias> {
    VIEWPORT_ALIASES.iter().find(|a| a.name == viewport_name)
}

/// A channel's winning region
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDisplay {
    pub region: ViewportRegion,
    pub overlay: bool,
}

/// Channel -> first matching region, iterated in canonical channel order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDisplaySet {
    displays: BTreeMap<DisplayChannel, ResolvedDisplay>,
}

impl ResolvedDisplaySet {
    pub fn get(&self, channel: DisplayChannel) -> Option<&ResolvedDisplay> {
        self.displays.get(&channel)
    }

    pub fn contains(&self, channel: DisplayChannel) -> bool {
        self.displays.contains_key(&channel)
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DisplayChannel, &ResolvedDisplay)> {
        self.displays.iter().map(|(channel, display)| (*channel, display))
    }
}

/// Resolve host regions into the displays RTT should render.
///
/// Unknown names are skipped. When several regions map to the same channel
/// the first one in input order wins and the rest are dropped.
pub fn resolve<'a, I>(regions: I) -> ResolvedDisplaySet
where
    I: IntoIterator<Item = &'a ViewportRegion>,
{
    let mut displays = BTreeMap::new();
    for region in regions {
        let Some(alias) = lookup(&region.name) else {
            continue;
        };
        if displays.contains_key(&alias.channel) {
            debug!(viewport = %region.name, channel = %alias.channel, "Ignoring duplicate viewport for channel");
            continue;
        }
        displays.insert(
            alias.channel,
            ResolvedDisplay {
                region: region.clone(),
                overlay: alias.overlay,
            },
        );
    }
    ResolvedDisplaySet { displays }
}
