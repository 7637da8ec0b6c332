//! Capture-excluded rendering surfaces
//!
//! Every supported platform already keeps the internal surface of a secure
//! text-entry field out of screenshots, recordings and mirrored output.
//! A [`CaptureSurface`] instantiates that secure primitive through an
//! [`ExclusionPlatform`] adapter, finds the capture-excluded child the
//! primitive manages, and hosts arbitrary content inside it.
//!
//! If the primitive exposes no such child the surface fails closed: it
//! renders nothing, never the unprotected content.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::geometry::Size;
use crate::layer::Layer;

static NEXT_SURFACE: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of one mounted capture surface
///
/// Also used as the insertion tag inside the platform's excluded child, so
/// re-inserting after a child identity change can be detected and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    fn next() -> Self {
        Self(NEXT_SURFACE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of the capture-excluded child inside a secure host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildId(pub u64);

/// One instance of the platform's secure-input primitive
pub trait SecureHost {
    /// The internally managed child the platform omits from captures
    ///
    /// `None` means this platform version does not expose one.
    fn exclusion_child(&self) -> Option<ChildId>;

    /// Whether content tagged `tag` is already inside `child`
    fn has_content(&self, child: ChildId, tag: SurfaceHandle) -> bool;

    /// Insert content tagged `tag` as a child of `child`
    fn insert_content(&mut self, child: ChildId, tag: SurfaceHandle);

    /// Resize the host and its hosted content in place
    fn set_frame(&mut self, size: Size);
}

/// Adapter for one platform's capture exclusion mechanism
pub trait ExclusionPlatform {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Instantiate a fresh secure host, exclusively owned by the caller
    fn create_host(&self) -> Box<dyn SecureHost>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Unmounted,
    Attached(ChildId),
    FailedClosed,
}

/// A long-lived surface that is visible live and omitted from captures
pub struct CaptureSurface {
    handle: SurfaceHandle,
    platform: &'static str,
    host: Box<dyn SecureHost>,
    attachment: Attachment,
    size: Size,
}

impl CaptureSurface {
    /// Instantiate the secure primitive and attach to its excluded child
    pub fn mount(platform: &dyn ExclusionPlatform) -> Self {
        let mut surface = Self {
            handle: SurfaceHandle::next(),
            platform: platform.name(),
            host: platform.create_host(),
            attachment: Attachment::Unmounted,
            size: Size::ZERO,
        };
        surface.sync_child();
        debug!(
            "Mounted capture surface {} on {} (protected={})",
            surface.handle.raw(),
            surface.platform,
            surface.is_protected()
        );
        surface
    }

    pub fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// True while content is hosted inside an excluded child
    pub fn is_protected(&self) -> bool {
        matches!(self.attachment, Attachment::Attached(_))
    }

    /// The reason this surface renders nothing, if it does
    pub fn error(&self) -> Option<CaptureError> {
        match self.attachment {
            Attachment::Attached(_) => None,
            Attachment::Unmounted | Attachment::FailedClosed => {
                Some(CaptureError::UnsupportedPlatformPrimitive {
                    platform: self.platform,
                })
            }
        }
    }

    /// Wrap `content` so it is drawn live and skipped by captures
    pub fn render(&self, content: Layer) -> Layer {
        match self.attachment {
            Attachment::Attached(_) => Layer::excluded(self.handle, content),
            Attachment::Unmounted | Attachment::FailedClosed => Layer::Empty,
        }
    }

    /// Resize for a layout pass and re-check the excluded child
    pub fn layout(&mut self, size: Size) {
        if size != self.size {
            self.size = size;
            self.host.set_frame(size);
        }
        self.sync_child();
    }

    fn sync_child(&mut self) {
        match (self.host.exclusion_child(), self.attachment) {
            (Some(child), Attachment::Attached(current)) if child == current => {}
            (Some(child), _) => {
                if !self.host.has_content(child, self.handle) {
                    self.host.insert_content(child, self.handle);
                }
                if let Attachment::Attached(previous) = self.attachment {
                    debug!(
                        "Capture surface {} moved from child {} to {}",
                        self.handle.raw(),
                        previous.0,
                        child.0
                    );
                }
                self.attachment = Attachment::Attached(child);
            }
            (None, attachment) => {
                if attachment != Attachment::FailedClosed {
                    warn!(
                        "Secure primitive on {} exposes no excluded child; surface {} renders nothing",
                        self.platform,
                        self.handle.raw()
                    );
                }
                self.attachment = Attachment::FailedClosed;
            }
        }
    }
}

impl Drop for CaptureSurface {
    fn drop(&mut self) {
        debug!("Tearing down capture surface {}", self.handle.raw());
    }
}

impl std::fmt::Debug for CaptureSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSurface")
            .field("handle", &self.handle)
            .field("platform", &self.platform)
            .field("attachment", &self.attachment)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPlatform;
    use crate::layer::{ContentNode, Presentation, RenderTarget};

    #[test]
    fn test_mount_attaches_once() {
        let platform = HeadlessPlatform::new();
        let surface = CaptureSurface::mount(&platform);
        assert!(surface.is_protected());
        assert!(surface.error().is_none());
        assert_eq!(platform.insertions(surface.handle()), 1);
    }

    #[test]
    fn test_layout_resizes_without_reinserting() {
        let platform = HeadlessPlatform::new();
        let mut surface = CaptureSurface::mount(&platform);
        surface.layout(Size::new(100.0, 40.0));
        surface.layout(Size::new(120.0, 40.0));
        surface.layout(Size::new(120.0, 40.0));
        assert_eq!(platform.insertions(surface.handle()), 1);
        assert_eq!(platform.frame_updates(), 2);
        assert_eq!(platform.live_hosts(), 1);
    }

    #[test]
    fn test_child_swap_inserts_into_new_child_once() {
        let platform = HeadlessPlatform::new();
        let mut surface = CaptureSurface::mount(&platform);
        platform.swap_exclusion_children();
        surface.layout(Size::new(10.0, 10.0));
        surface.layout(Size::new(10.0, 10.0));
        assert!(surface.is_protected());
        assert_eq!(platform.insertions(surface.handle()), 2);
    }

    #[test]
    fn test_unsupported_primitive_fails_closed() {
        let platform = HeadlessPlatform::unsupported();
        let surface = CaptureSurface::mount(&platform);
        assert!(!surface.is_protected());
        assert!(matches!(
            surface.error(),
            Some(CaptureError::UnsupportedPlatformPrimitive { .. })
        ));

        let tree = surface.render(ContentNode::new("pin").into());
        assert_eq!(tree, Layer::Empty);
        assert_eq!(tree.present(RenderTarget::Live), Presentation::Blank);
    }

    #[test]
    fn test_child_removed_after_mount_fails_closed() {
        let platform = HeadlessPlatform::new();
        let mut surface = CaptureSurface::mount(&platform);
        surface.layout(Size::new(50.0, 20.0));
        assert!(surface.is_protected());

        platform.remove_exclusion_children();
        surface.layout(Size::new(50.0, 20.0));

        assert!(!surface.is_protected());
        assert!(matches!(
            surface.error(),
            Some(CaptureError::UnsupportedPlatformPrimitive { .. })
        ));
        let tree = surface.render(ContentNode::new("pin").into());
        assert_eq!(tree, Layer::Empty);
        assert!(tree.present(RenderTarget::Live).is_blank());
    }

    #[test]
    fn test_drop_releases_host() {
        let platform = HeadlessPlatform::new();
        let surface = CaptureSurface::mount(&platform);
        assert_eq!(platform.live_hosts(), 1);
        drop(surface);
        assert_eq!(platform.live_hosts(), 0);
    }
}
