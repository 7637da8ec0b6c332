//! Display cutout geometry and placement of content behind it
//!
//! Cutout detection is a pure function of the top safe-area inset the host
//! reports. The metrics table holds the reserved region for each kind.

use crate::geometry::{Rect, Size};

/// Smallest top inset reported by devices with a dynamic island
pub const ISLAND_MIN_INSET: f64 = 59.0;

/// Smallest top inset reported by devices with a notch
pub const NOTCH_MIN_INSET: f64 = 44.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoutKind {
    DynamicIsland,
    Notch,
    None,
}

impl CutoutKind {
    pub fn from_safe_area_top(inset: f64) -> Self {
        if inset >= ISLAND_MIN_INSET {
            CutoutKind::DynamicIsland
        } else if inset >= NOTCH_MIN_INSET {
            CutoutKind::Notch
        } else {
            CutoutKind::None
        }
    }
}

/// Size and top offset of a cutout, in points
#[derive(Debug, Clone, Copy, PartialEq)]
struct CutoutMetrics {
    width: f64,
    height: f64,
    top: f64,
}

fn metrics(kind: CutoutKind) -> Option<CutoutMetrics> {
    match kind {
        CutoutKind::DynamicIsland => Some(CutoutMetrics {
            width: 126.0,
            height: 37.0,
            top: 11.0,
        }),
        CutoutKind::Notch => Some(CutoutMetrics {
            width: 162.0,
            height: 33.0,
            top: 0.0,
        }),
        CutoutKind::None => None,
    }
}

/// Kind and screen rectangle of a device cutout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoutGeometry {
    pub kind: CutoutKind,
    pub rect: Rect,
}

impl CutoutGeometry {
    /// Geometry for a screen `screen_width` points wide with the given top inset
    pub fn for_screen(screen_width: f64, safe_area_top: f64) -> Self {
        let kind = CutoutKind::from_safe_area_top(safe_area_top);
        let rect = match metrics(kind) {
            Some(m) => Rect::new((screen_width - m.width) / 2.0, m.top, m.width, m.height),
            None => Rect::new(screen_width / 2.0, 0.0, 0.0, 0.0),
        };
        Self { kind, rect }
    }

    /// Content placed below this y offset clears the cutout
    pub fn content_offset(&self) -> f64 {
        match self.kind {
            CutoutKind::None => 0.0,
            _ => self.rect.max_y(),
        }
    }
}

/// Horizontal alignment of an overlay inside the cutout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoutAlignment {
    Leading,
    #[default]
    Center,
    Trailing,
}

/// Frame for an overlay drawn behind the cutout
///
/// Returns `None` when hidden or when the device has no cutout. The overlay
/// is vertically centered on the cutout.
pub fn position_behind_cutout(
    geometry: &CutoutGeometry,
    overlay: Size,
    alignment: CutoutAlignment,
    visible: bool,
) -> Option<Rect> {
    if !visible || geometry.kind == CutoutKind::None {
        return None;
    }
    let cutout = geometry.rect;
    let x = match alignment {
        CutoutAlignment::Leading => cutout.x,
        CutoutAlignment::Center => cutout.center().0 - overlay.width / 2.0,
        CutoutAlignment::Trailing => cutout.max_x() - overlay.width,
    };
    let y = cutout.center().1 - overlay.height / 2.0;
    Some(Rect::new(x, y, overlay.width, overlay.height))
}
