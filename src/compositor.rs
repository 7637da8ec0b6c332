//! Capture-mode compositing for one content node
//!
//! A node is shown in one of three modes:
//!
//! - `Visible`: drawn directly.
//! - `Secure`: drawn inside a capture surface, so captures see blank space.
//! - `Watermark`: drawn normally but covered by an opaque fill that lives in
//!   a capture surface. Live viewers see the fill, captures see the content.
//!
//! A watermark without a declared background samples its fill from the live
//! output around it. Until a sample resolves, the node draws nothing.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::color::{Background, BackgroundSpec, ColorScheme};
use crate::error::{CaptureError, CaptureResult};
use crate::geometry::Rect;
use crate::layer::Layer;
use crate::sampler::{PixelSampler, SampleRequest, SampledColor};
use crate::surface::{CaptureSurface, ExclusionPlatform, SurfaceHandle};

static NEXT_NODE: AtomicU64 = AtomicU64::new(1);

/// How a node should appear to live viewers and captures
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureMode {
    #[default]
    Visible,
    Secure,
    Watermark(BackgroundSpec),
}

impl CaptureMode {
    /// Watermark over a declared fill, or a sampled one for `None`
    pub fn watermark(background: impl Into<BackgroundSpec>) -> Self {
        CaptureMode::Watermark(background.into())
    }

    /// Watermark whose fill is sampled from the surrounding live output
    pub fn sampled_watermark() -> Self {
        CaptureMode::Watermark(BackgroundSpec::Sampled)
    }
}

/// Observable compositor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Visible,
    Secure,
    SamplingWatermark,
    ResolvedWatermark,
}

/// Collaborators shared by every compositor on a host
#[derive(Clone)]
pub struct CompositorEnv {
    platform: Rc<dyn ExclusionPlatform>,
    sampler: Arc<PixelSampler>,
}

impl CompositorEnv {
    pub fn new(platform: Rc<dyn ExclusionPlatform>, sampler: Arc<PixelSampler>) -> Self {
        Self { platform, sampler }
    }

    pub fn platform(&self) -> &dyn ExclusionPlatform {
        self.platform.as_ref()
    }

    pub fn sampler(&self) -> &Arc<PixelSampler> {
        &self.sampler
    }
}

impl std::fmt::Debug for CompositorEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositorEnv")
            .field("platform", &self.platform.name())
            .field("sampler", &self.sampler)
            .finish()
    }
}

/// A sample in flight; dropping it cancels the task
#[derive(Debug)]
struct PendingSample {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for PendingSample {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug)]
struct SampleOutcome {
    generation: u64,
    result: CaptureResult<SampledColor>,
}

#[derive(Debug)]
enum NodeState {
    Visible,
    Secure {
        surface: CaptureSurface,
    },
    /// `pending` is `None` while waiting for a usable layout or a retry trigger
    SamplingWatermark {
        surface: CaptureSurface,
        pending: Option<PendingSample>,
    },
    ResolvedWatermark {
        surface: CaptureSurface,
        fill: Background,
    },
}

impl NodeState {
    fn phase(&self) -> Phase {
        match self {
            NodeState::Visible => Phase::Visible,
            NodeState::Secure { .. } => Phase::Secure,
            NodeState::SamplingWatermark { .. } => Phase::SamplingWatermark,
            NodeState::ResolvedWatermark { .. } => Phase::ResolvedWatermark,
        }
    }

    fn surface_mut(&mut self) -> Option<&mut CaptureSurface> {
        match self {
            NodeState::Visible => None,
            NodeState::Secure { surface }
            | NodeState::SamplingWatermark { surface, .. }
            | NodeState::ResolvedWatermark { surface, .. } => Some(surface),
        }
    }

    fn surface(&self) -> Option<&CaptureSurface> {
        match self {
            NodeState::Visible => None,
            NodeState::Secure { surface }
            | NodeState::SamplingWatermark { surface, .. }
            | NodeState::ResolvedWatermark { surface, .. } => Some(surface),
        }
    }

    /// Give up the surface if this is a watermark state
    fn into_watermark_surface(self) -> Option<CaptureSurface> {
        match self {
            NodeState::SamplingWatermark { surface, .. }
            | NodeState::ResolvedWatermark { surface, .. } => Some(surface),
            NodeState::Visible | NodeState::Secure { .. } => None,
        }
    }
}

/// Resolves a node's [`CaptureMode`] into a layered tree
///
/// Owned by the UI thread. Sampling runs as a tokio task and reports back
/// through a channel; call [`poll`](Self::poll) or [`settle`](Self::settle)
/// to apply results.
pub struct CaptureModeCompositor {
    id: u64,
    content: Layer,
    mode: CaptureMode,
    state: NodeState,
    env: CompositorEnv,
    frame: Rect,
    scheme: ColorScheme,
    ancestors: Vec<Background>,
    generation: u64,
    outcomes_tx: UnboundedSender<SampleOutcome>,
    outcomes_rx: UnboundedReceiver<SampleOutcome>,
    last_error: Option<CaptureError>,
}

impl CaptureModeCompositor {
    /// `content` may itself be another compositor's [`tree`](Self::tree)
    pub fn new(content: impl Into<Layer>, mode: CaptureMode, env: CompositorEnv) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let mut compositor = Self {
            id: NEXT_NODE.fetch_add(1, Ordering::Relaxed),
            content: content.into(),
            mode: CaptureMode::Visible,
            state: NodeState::Visible,
            env,
            frame: Rect::default(),
            scheme: ColorScheme::default(),
            ancestors: Vec::new(),
            generation: 0,
            outcomes_tx,
            outcomes_rx,
            last_error: None,
        };
        compositor.set_mode(mode);
        compositor
    }

    pub fn content(&self) -> &Layer {
        &self.content
    }

    /// Replace the wrapped content, e.g. after a nested node re-rendered
    pub fn set_content(&mut self, content: impl Into<Layer>) {
        self.content = content.into();
    }

    pub fn mode(&self) -> &CaptureMode {
        &self.mode
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.scheme
    }

    /// The capture surface backing this node, if the mode needs one
    pub fn surface_handle(&self) -> Option<SurfaceHandle> {
        self.state.surface().map(|s| s.handle())
    }

    /// The watermark fill currently drawn, once resolved
    pub fn resolved_fill(&self) -> Option<&Background> {
        match &self.state {
            NodeState::ResolvedWatermark { fill, .. } => Some(fill),
            _ => None,
        }
    }

    /// Whether a sample task is in flight
    pub fn is_sampling(&self) -> bool {
        matches!(
            self.state,
            NodeState::SamplingWatermark {
                pending: Some(_),
                ..
            }
        )
    }

    /// Most recent non-fatal failure, kept for hosts that report it
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    /// Switch modes; a mode equal to the current one is a no-op
    pub fn set_mode(&mut self, mode: CaptureMode) {
        if mode == self.mode {
            return;
        }
        debug!(
            "Node {} capture mode {:?} -> {:?}",
            self.id,
            self.mode,
            mode
        );
        self.mode = mode;

        let previous = std::mem::replace(&mut self.state, NodeState::Visible);
        let reusable = previous.into_watermark_surface();

        self.state = match self.mode.clone() {
            CaptureMode::Visible => NodeState::Visible,
            CaptureMode::Secure => NodeState::Secure {
                surface: self.mount_surface(None),
            },
            CaptureMode::Watermark(BackgroundSpec::Fill(fill)) => NodeState::ResolvedWatermark {
                surface: self.mount_surface(reusable),
                fill,
            },
            CaptureMode::Watermark(BackgroundSpec::Sampled) => NodeState::SamplingWatermark {
                surface: self.mount_surface(reusable),
                pending: None,
            },
        };

        if self.is_auto_watermark() {
            self.request_sample();
        }
    }

    /// Apply a layout pass
    ///
    /// A size change restarts sampling for an auto-sampled watermark; a pure
    /// move does not.
    pub fn layout(&mut self, frame: Rect) {
        let resized = frame.size() != self.frame.size();
        self.frame = frame;
        if let Some(surface) = self.state.surface_mut() {
            surface.layout(frame.size());
            if let Some(err) = surface.error() {
                self.last_error = Some(err);
            }
        }

        if !self.is_auto_watermark() {
            return;
        }
        let idle = matches!(
            self.state,
            NodeState::SamplingWatermark { pending: None, .. }
        );
        if resized || idle {
            self.request_sample();
        }
    }

    /// Apply an appearance change; invalidates any sampled fill
    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        if scheme == self.scheme {
            return;
        }
        self.scheme = scheme;
        if self.is_auto_watermark() {
            self.request_sample();
        }
    }

    /// Declared backgrounds of the enclosing containers, nearest first
    pub fn set_ancestor_backgrounds(&mut self, ancestors: Vec<Background>) {
        self.ancestors = ancestors;
    }

    /// Apply every sample result that has already arrived
    pub fn poll(&mut self) {
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.apply_outcome(outcome);
        }
    }

    /// Wait for the in-flight sample, if any, and apply it
    pub async fn settle(&mut self) {
        while self.is_sampling() {
            match self.outcomes_rx.recv().await {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
    }

    /// The layered tree to draw for the current state
    pub fn tree(&self) -> Layer {
        let content = self.content.clone();
        match &self.state {
            NodeState::Visible => content,
            NodeState::Secure { surface } if surface.is_protected() => {
                Layer::Stack(vec![Layer::hidden(content.clone()), surface.render(content)])
            }
            NodeState::ResolvedWatermark { surface, fill } if surface.is_protected() => {
                Layer::Stack(vec![content, surface.render(Layer::Fill(fill.clone()))])
            }
            // Sampling, or a surface that failed closed: lay out, draw nothing
            NodeState::Secure { .. }
            | NodeState::SamplingWatermark { .. }
            | NodeState::ResolvedWatermark { .. } => Layer::hidden(content),
        }
    }

    fn is_auto_watermark(&self) -> bool {
        self.mode == CaptureMode::Watermark(BackgroundSpec::Sampled)
    }

    fn mount_surface(&mut self, reusable: Option<CaptureSurface>) -> CaptureSurface {
        let mut surface = reusable.unwrap_or_else(|| CaptureSurface::mount(self.env.platform()));
        surface.layout(self.frame.size());
        if let Some(err) = surface.error() {
            self.last_error = Some(err);
        }
        surface
    }

    /// Enter (or re-enter) the sampling state with one fresh request
    ///
    /// Any earlier pending sample is cancelled and its generation retired.
    fn request_sample(&mut self) {
        if !matches!(
            self.state,
            NodeState::SamplingWatermark { .. } | NodeState::ResolvedWatermark { .. }
        ) {
            return;
        }
        self.generation += 1;
        let generation = self.generation;

        let previous = std::mem::replace(&mut self.state, NodeState::Visible);
        let Some(surface) = previous.into_watermark_surface() else {
            return;
        };

        let pending = if !surface.is_protected() || self.frame.size().is_empty() {
            None
        } else {
            // Own fill plus any nested surfaces inside the content
            let request = SampleRequest::new(self.frame, self.scheme)
                .excluding(surface.handle())
                .excluding_all(self.content.surfaces())
                .with_ancestors(self.ancestors.clone());
            self.spawn_sample(generation, request)
        };

        self.state = NodeState::SamplingWatermark { surface, pending };
    }

    fn spawn_sample(&mut self, generation: u64, request: SampleRequest) -> Option<PendingSample> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("No async runtime for watermark sampling: {}", e);
                self.last_error = Some(CaptureError::Runtime(e.to_string()));
                return None;
            }
        };

        debug!(
            "Node {} sampling generation {} over {:?}",
            self.id,
            generation,
            request.region
        );
        let sampler = self.env.sampler.clone();
        let tx = self.outcomes_tx.clone();
        let task = handle.spawn(async move {
            let result = sampler.sample_after_settle(request).await;
            let _ = tx.send(SampleOutcome { generation, result });
        });
        Some(PendingSample { generation, task })
    }

    fn apply_outcome(&mut self, outcome: SampleOutcome) {
        let awaited = matches!(
            &self.state,
            NodeState::SamplingWatermark { pending: Some(pending), .. }
                if pending.generation == outcome.generation
        );
        if !awaited {
            let stale = CaptureError::StaleResult {
                generation: outcome.generation,
                current: self.generation,
            };
            debug!("Discarding sample: {}", stale);
            return;
        }

        let previous = std::mem::replace(&mut self.state, NodeState::Visible);
        let Some(surface) = previous.into_watermark_surface() else {
            return;
        };

        self.state = match outcome.result {
            Ok(sampled) => {
                debug!(
                    "Node {} watermark resolved to {:?} ({:?})",
                    self.id,
                    sampled.color.to_rgba8(),
                    sampled.origin
                );
                NodeState::ResolvedWatermark {
                    surface,
                    fill: Background::Solid(sampled.color),
                }
            }
            Err(e) => {
                warn!("Node {} watermark sample failed: {}", self.id, e);
                self.last_error = Some(e);
                NodeState::SamplingWatermark {
                    surface,
                    pending: None,
                }
            }
        };
    }
}

impl std::fmt::Debug for CaptureModeCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureModeCompositor")
            .field("id", &self.id)
            .field("content", &self.content)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("frame", &self.frame)
            .field("scheme", &self.scheme)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Wrap `node` for `mode`
pub fn apply_capture_mode(
    node: impl Into<Layer>,
    mode: CaptureMode,
    env: &CompositorEnv,
) -> CaptureModeCompositor {
    CaptureModeCompositor::new(node, mode, env.clone())
}
