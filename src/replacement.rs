//! Swap what live viewers see for a replacement while captures keep the original
//!
//! The composite is built from the bottom up:
//!
//! 1. the original, drawn normally;
//! 2. a capture surface holding an opaque backdrop for the current scheme
//!    with the replacement on top of it;
//! 3. an undrawn placeholder of the replacement, so the composite is laid
//!    out at least as large as the replacement.
//!
//! Live viewers see the replacement over its backdrop. Captures skip the
//! surface and see the original.

use tracing::{debug, warn};

use crate::color::{Background, ColorScheme};
use crate::compositor::CompositorEnv;
use crate::error::CaptureError;
use crate::geometry::Size;
use crate::layer::{ContentNode, Layer};
use crate::surface::CaptureSurface;

/// A node whose live appearance is replaced
#[derive(Debug)]
pub struct ReplacementCompositor {
    original: ContentNode,
    swap: Option<Swap>,
}

#[derive(Debug)]
struct Swap {
    replacement: ContentNode,
    surface: CaptureSurface,
    backdrop: Background,
}

impl ReplacementCompositor {
    /// Build the composite; with `enabled` false the original is returned untouched
    pub fn compose(
        original: ContentNode,
        replacement: ContentNode,
        enabled: bool,
        env: &CompositorEnv,
        scheme: ColorScheme,
    ) -> Self {
        if !enabled {
            return Self {
                original,
                swap: None,
            };
        }

        let surface = CaptureSurface::mount(env.platform());
        if !surface.is_protected() {
            warn!(
                "Replacement for node {} cannot hide the original live; showing replacement everywhere",
                original.id()
            );
        }
        debug!(
            "Node {} replaced live by node {}",
            original.id(),
            replacement.id()
        );
        Self {
            original,
            swap: Some(Swap {
                replacement,
                surface,
                backdrop: backdrop_for(scheme),
            }),
        }
    }

    pub fn original(&self) -> &ContentNode {
        &self.original
    }

    pub fn replacement(&self) -> Option<&ContentNode> {
        self.swap.as_ref().map(|s| &s.replacement)
    }

    pub fn is_enabled(&self) -> bool {
        self.swap.is_some()
    }

    /// Why the original cannot be kept out of the live view, if it cannot
    pub fn error(&self) -> Option<CaptureError> {
        self.swap.as_ref().and_then(|s| s.surface.error())
    }

    pub fn layout(&mut self, size: Size) {
        if let Some(swap) = self.swap.as_mut() {
            swap.surface.layout(size);
        }
    }

    /// Recompute the opaque backdrop behind the replacement
    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        if let Some(swap) = self.swap.as_mut() {
            swap.backdrop = backdrop_for(scheme);
        }
    }

    pub fn tree(&self) -> Layer {
        let original = Layer::Content(self.original.clone());
        let Some(swap) = &self.swap else {
            return original;
        };
        let replacement = Layer::Content(swap.replacement.clone());

        if !swap.surface.is_protected() {
            // Never fall back to showing the original live
            return Layer::Stack(vec![Layer::hidden(original), replacement]);
        }

        Layer::Stack(vec![
            original,
            swap.surface.render(Layer::Stack(vec![
                Layer::Fill(swap.backdrop.clone()),
                replacement.clone(),
            ])),
            Layer::hidden(replacement),
        ])
    }
}

fn backdrop_for(scheme: ColorScheme) -> Background {
    Background::Solid(scheme.platform_default_background())
}

/// Replace `node` for live viewers; `replacement` is only built when enabled
pub fn apply_replacement<F>(
    node: ContentNode,
    replacement: F,
    enabled: bool,
    env: &CompositorEnv,
    scheme: ColorScheme,
) -> ReplacementCompositor
where
    F: FnOnce() -> ContentNode,
{
    if !enabled {
        return ReplacementCompositor {
            original: node,
            swap: None,
        };
    }
    ReplacementCompositor::compose(node, replacement(), true, env, scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessPlatform, HeadlessScene};
    use crate::layer::{Presentation, RenderTarget};
    use crate::sampler::PixelSampler;
    use std::rc::Rc;
    use std::sync::Arc;

    fn env_for(platform: &HeadlessPlatform) -> CompositorEnv {
        let scene = Arc::new(HeadlessScene::solid(8, 8, [0, 0, 0, 255]));
        CompositorEnv::new(
            Rc::new(platform.clone()),
            Arc::new(PixelSampler::new(scene)),
        )
    }

    #[test]
    fn test_disabled_is_identical_to_original() {
        let platform = HeadlessPlatform::new();
        let env = env_for(&platform);
        let node = ContentNode::new("balance");
        let mut built = false;
        let composite = apply_replacement(
            node.clone(),
            || {
                built = true;
                ContentNode::new("****")
            },
            false,
            &env,
            ColorScheme::Light,
        );

        assert!(!built);
        assert_eq!(composite.tree(), Layer::Content(node.clone()));
        for target in [RenderTarget::Live, RenderTarget::Capture] {
            assert_eq!(
                composite.tree().present(target),
                Layer::Content(node.clone()).present(target)
            );
        }
        assert_eq!(platform.live_hosts(), 0);
    }

    #[test]
    fn test_replacement_live_original_in_capture() {
        let platform = HeadlessPlatform::new();
        let env = env_for(&platform);
        let original = ContentNode::new("real name");
        let replacement = ContentNode::new("redacted");
        let mut composite = apply_replacement(
            original.clone(),
            || replacement.clone(),
            true,
            &env,
            ColorScheme::Dark,
        );
        composite.layout(Size::new(100.0, 20.0));

        let tree = composite.tree();
        assert_eq!(tree.present(RenderTarget::Live), Presentation::Content(replacement));
        assert_eq!(tree.present(RenderTarget::Capture), Presentation::Content(original));
    }

    #[test]
    fn test_backdrop_follows_scheme() {
        let platform = HeadlessPlatform::new();
        let env = env_for(&platform);
        let mut composite = ReplacementCompositor::compose(
            ContentNode::new("a"),
            ContentNode::new("b"),
            true,
            &env,
            ColorScheme::Light,
        );
        let backdrop = |c: &ReplacementCompositor| match c.tree() {
            Layer::Stack(layers) => match &layers[1] {
                Layer::Excluded { content, .. } => match content.as_ref() {
                    Layer::Stack(inner) => inner[0].clone(),
                    other => other.clone(),
                },
                other => other.clone(),
            },
            other => other,
        };
        assert_eq!(
            backdrop(&composite),
            Layer::Fill(Background::Solid(ColorScheme::Light.platform_default_background()))
        );
        composite.set_color_scheme(ColorScheme::Dark);
        assert_eq!(
            backdrop(&composite),
            Layer::Fill(Background::Solid(ColorScheme::Dark.platform_default_background()))
        );
    }

    #[test]
    fn test_unsupported_platform_never_shows_original_live() {
        let platform = HeadlessPlatform::unsupported();
        let env = env_for(&platform);
        let original = ContentNode::new("secret");
        let replacement = ContentNode::new("public");
        let composite = ReplacementCompositor::compose(
            original,
            replacement.clone(),
            true,
            &env,
            ColorScheme::Light,
        );
        assert!(composite.error().is_some());
        assert_eq!(
            composite.tree().present(RenderTarget::Live),
            Presentation::Content(replacement)
        );
    }
}
