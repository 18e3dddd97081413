use serde::{Deserialize, Serialize};

/// Absolute on-screen rectangle of a viewport, in host coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// A named display region supplied by the host on every resolution pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportRegion {
    pub name: String,
    #[serde(flatten)]
    pub rect: Rect,
}

impl ViewportRegion {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }

    /// True if the name is one of the catalogue's overlay aliases
    pub fn is_overlay(&self) -> bool {
        crate::display::lookup(&self.name).is_some_and(|alias| alias.overlay)
    }
}
