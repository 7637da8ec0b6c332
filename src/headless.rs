//! In-memory platform adapter and software live source
//!
//! `HeadlessPlatform` models a secure-input primitive whose excluded child
//! can be present, missing (an unsupported platform version) or swapped for
//! a new identity at runtime. `HeadlessScene` is a software compositor over
//! a backdrop bitmap that honors capture-surface exclusion, so sampling and
//! previews work without a display.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use image::{imageops, Rgba as Px, RgbaImage};
use parking_lot::Mutex;
use tracing::debug;

use crate::color::{ColorScheme, Rgba};
use crate::geometry::{Rect, Size};
use crate::layer::Presentation;
use crate::sampler::LiveSource;
use crate::surface::{ChildId, ExclusionPlatform, SecureHost, SurfaceHandle};

#[derive(Debug, Default)]
struct HostRecord {
    child: Option<ChildId>,
    contents: Vec<(ChildId, SurfaceHandle)>,
    frame: Size,
}

#[derive(Debug, Default)]
struct PlatformState {
    exposes_child: bool,
    next_id: u64,
    hosts: HashMap<u64, HostRecord>,
    insert_log: Vec<SurfaceHandle>,
    frame_updates: usize,
}

impl PlatformState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Headless capture-exclusion adapter
///
/// Clones share state, so a test can keep one clone for inspection while
/// compositors own the other.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    state: Rc<RefCell<PlatformState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(PlatformState {
                exposes_child: true,
                ..Default::default()
            })),
        }
    }

    /// A platform whose secure primitive has no excluded child
    pub fn unsupported() -> Self {
        let platform = Self::new();
        platform.state.borrow_mut().exposes_child = false;
        platform
    }

    /// Give every live host a fresh excluded child identity
    pub fn swap_exclusion_children(&self) {
        let mut state = self.state.borrow_mut();
        let ids: Vec<u64> = state.hosts.keys().copied().collect();
        for id in ids {
            let child = ChildId(state.next_id());
            if let Some(host) = state.hosts.get_mut(&id) {
                if host.child.is_some() {
                    host.child = Some(child);
                }
            }
        }
    }

    /// Drop the excluded child from every live host
    pub fn remove_exclusion_children(&self) {
        let mut state = self.state.borrow_mut();
        state.exposes_child = false;
        for host in state.hosts.values_mut() {
            host.child = None;
        }
    }

    /// How many times content tagged `surface` was inserted
    pub fn insertions(&self, surface: SurfaceHandle) -> usize {
        self.state
            .borrow()
            .insert_log
            .iter()
            .filter(|tag| **tag == surface)
            .count()
    }

    pub fn frame_updates(&self) -> usize {
        self.state.borrow().frame_updates
    }

    pub fn live_hosts(&self) -> usize {
        self.state.borrow().hosts.len()
    }

    /// Current frame of the host holding `surface`
    pub fn frame_of(&self, surface: SurfaceHandle) -> Option<Size> {
        self.state
            .borrow()
            .hosts
            .values()
            .find(|h| h.contents.iter().any(|(_, tag)| *tag == surface))
            .map(|h| h.frame)
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ExclusionPlatform for HeadlessPlatform {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_host(&self) -> Box<dyn SecureHost> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let child = if state.exposes_child {
            Some(ChildId(state.next_id()))
        } else {
            None
        };
        state.hosts.insert(
            id,
            HostRecord {
                child,
                ..Default::default()
            },
        );
        Box::new(HeadlessHost {
            id,
            state: self.state.clone(),
        })
    }
}

struct HeadlessHost {
    id: u64,
    state: Rc<RefCell<PlatformState>>,
}

impl SecureHost for HeadlessHost {
    fn exclusion_child(&self) -> Option<ChildId> {
        self.state.borrow().hosts.get(&self.id).and_then(|h| h.child)
    }

    fn has_content(&self, child: ChildId, tag: SurfaceHandle) -> bool {
        self.state
            .borrow()
            .hosts
            .get(&self.id)
            .is_some_and(|h| h.contents.contains(&(child, tag)))
    }

    fn insert_content(&mut self, child: ChildId, tag: SurfaceHandle) {
        let mut state = self.state.borrow_mut();
        state.insert_log.push(tag);
        if let Some(host) = state.hosts.get_mut(&self.id) {
            host.contents.push((child, tag));
        }
    }

    fn set_frame(&mut self, size: Size) {
        let mut state = self.state.borrow_mut();
        state.frame_updates += 1;
        if let Some(host) = state.hosts.get_mut(&self.id) {
            host.frame = size;
        }
    }
}

impl Drop for HeadlessHost {
    fn drop(&mut self) {
        self.state.borrow_mut().hosts.remove(&self.id);
    }
}

#[derive(Debug, Clone, Copy)]
struct SurfacePaint {
    surface: SurfaceHandle,
    frame: Rect,
    color: Rgba,
}

/// Software live source: a backdrop plus fills drawn by capture surfaces
#[derive(Debug)]
pub struct HeadlessScene {
    backdrop: Mutex<RgbaImage>,
    surfaces: Mutex<Vec<SurfacePaint>>,
    scale: f64,
    available: AtomicBool,
    renders: AtomicUsize,
    last_excluded: Mutex<Vec<SurfaceHandle>>,
}

impl HeadlessScene {
    pub fn new(backdrop: RgbaImage) -> Self {
        Self {
            backdrop: Mutex::new(backdrop),
            surfaces: Mutex::new(Vec::new()),
            scale: 1.0,
            available: AtomicBool::new(true),
            renders: AtomicUsize::new(0),
            last_excluded: Mutex::new(Vec::new()),
        }
    }

    /// A backdrop of one color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Px(rgba)))
    }

    /// Pixels per point
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the backdrop, e.g. after an appearance change
    pub fn set_backdrop(&self, backdrop: RgbaImage) {
        *self.backdrop.lock() = backdrop;
    }

    /// Draw `color` over `frame` on behalf of a capture surface
    pub fn paint_surface(&self, surface: SurfaceHandle, frame: Rect, color: Rgba) {
        let mut surfaces = self.surfaces.lock();
        surfaces.retain(|p| p.surface != surface);
        surfaces.push(SurfacePaint {
            surface,
            frame,
            color,
        });
    }

    pub fn clear_surface(&self, surface: SurfaceHandle) {
        self.surfaces.lock().retain(|p| p.surface != surface);
    }

    /// Make subsequent renders fail
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn last_excluded(&self) -> Vec<SurfaceHandle> {
        self.last_excluded.lock().clone()
    }

    /// The full live frame
    pub fn snapshot(&self) -> RgbaImage {
        let mut frame = self.backdrop.lock().clone();
        for paint in self.surfaces.lock().iter() {
            fill_rect(&mut frame, &paint.frame, self.scale, paint.color);
        }
        frame
    }
}

impl LiveSource for HeadlessScene {
    fn render_region(&self, region: Rect, excluding: &[SurfaceHandle]) -> Option<RgbaImage> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        *self.last_excluded.lock() = excluding.to_vec();

        if !self.available.load(Ordering::SeqCst) {
            return None;
        }

        let mut frame = self.backdrop.lock().clone();
        for paint in self.surfaces.lock().iter() {
            if excluding.contains(&paint.surface) {
                continue;
            }
            fill_rect(&mut frame, &paint.frame, self.scale, paint.color);
        }

        let (x, y, w, h) = region.to_pixel_bounds(self.scale, frame.width(), frame.height())?;
        debug!("Headless render {}x{} at ({}, {})", w, h, x, y);
        Some(imageops::crop_imm(&frame, x, y, w, h).to_image())
    }
}

/// Source-over `color` onto `frame` inside `rect` (points)
pub fn fill_rect(frame: &mut RgbaImage, rect: &Rect, scale: f64, color: Rgba) {
    let Some((x, y, w, h)) = rect.to_pixel_bounds(scale, frame.width(), frame.height()) else {
        return;
    };
    for py in y..y + h {
        for px in x..x + w {
            let dst = Rgba::from_rgba8(frame.get_pixel(px, py).0);
            let a = color.a;
            let out_a = a + dst.a * (1.0 - a);
            let blend = |s: f32, d: f32| {
                if out_a <= 0.0 {
                    0.0
                } else {
                    (s * a + d * dst.a * (1.0 - a)) / out_a
                }
            };
            let out = Rgba::new(
                blend(color.r, dst.r),
                blend(color.g, dst.g),
                blend(color.b, dst.b),
                out_a,
            );
            frame.put_pixel(px, py, Px(out.to_rgba8()));
        }
    }
}

/// Paint what one node presents into a preview bitmap
///
/// Content is drawn as a block of the scheme's foreground color.
pub fn paint_presentation(
    frame: &mut RgbaImage,
    bounds: &Rect,
    scale: f64,
    presentation: &Presentation,
    scheme: ColorScheme,
) {
    match presentation {
        Presentation::Blank => {}
        Presentation::Fill(fill) => fill_rect(frame, bounds, scale, fill.representative()),
        Presentation::Content(_) => {
            fill_rect(frame, bounds, scale, scheme.platform_default_foreground())
        }
    }
}
