//! # capture-mask
//!
//! Capture-aware compositing for UI content.
//!
//! Some content must vanish from screenshots and recordings, some must show
//! up only in them, and some must sit behind a display cutout. This crate
//! resolves those intents into layered visual trees built on one platform
//! primitive: a surface the OS renders live but omits from every capture.
//!
//! ## Features
//!
//! - `Secure` nodes: visible live, blank in captures
//! - `Watermark` nodes: covered live by an opaque fill, revealed in captures
//! - Watermark fills sampled from the surrounding live output
//! - Replacement: live viewers see a stand-in, captures see the original
//! - Fail-closed behavior when the platform primitive is unavailable
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use capture_mask::{
//!     apply_capture_mode, CaptureMode, CompositorEnv, ContentNode, HeadlessPlatform,
//!     HeadlessScene, PixelSampler, Rect, RenderTarget,
//! };
//!
//! let scene = Arc::new(HeadlessScene::solid(320, 240, [255, 255, 255, 255]));
//! let env = CompositorEnv::new(
//!     Rc::new(HeadlessPlatform::new()),
//!     Arc::new(PixelSampler::new(scene)),
//! );
//!
//! let mut node = apply_capture_mode(ContentNode::new("4111 1111"), CaptureMode::Secure, &env);
//! node.layout(Rect::new(16.0, 16.0, 200.0, 24.0));
//!
//! let tree = node.tree();
//! assert!(!tree.present(RenderTarget::Live).is_blank());
//! assert!(tree.present(RenderTarget::Capture).is_blank());
//! ```

mod color;
mod compositor;
mod cutout;
mod error;
mod geometry;
mod headless;
mod layer;
mod replacement;
mod runtime;
mod sampler;
mod surface;

pub use color::{Background, BackgroundSpec, ColorScheme, Rgba};
pub use compositor::{apply_capture_mode, CaptureMode, CaptureModeCompositor, CompositorEnv, Phase};
pub use cutout::{
    position_behind_cutout, CutoutAlignment, CutoutGeometry, CutoutKind, ISLAND_MIN_INSET,
    NOTCH_MIN_INSET,
};
pub use error::{CaptureError, CaptureResult, SampleFailure};
pub use geometry::{Rect, Size};
pub use headless::{fill_rect, paint_presentation, HeadlessPlatform, HeadlessScene};
pub use layer::{ContentNode, Layer, Presentation, RenderTarget};
pub use replacement::{apply_replacement, ReplacementCompositor};
pub use sampler::{
    average_color, center_color, LiveSource, PixelSampler, SampleOrigin, SampleRequest,
    SampleStrategy, SampledColor, SamplerConfig, DEFAULT_ALPHA_THRESHOLD, DEFAULT_SETTLE_DELAY,
};
pub use surface::{CaptureSurface, ChildId, ExclusionPlatform, SecureHost, SurfaceHandle};

/// Check whether `platform` can exclude content from captures
///
/// Instantiates one throwaway secure host and looks for its excluded child.
pub fn is_supported(platform: &dyn ExclusionPlatform) -> bool {
    platform.create_host().exclusion_child().is_some()
}
