//! Layered visual trees produced by the compositors
//!
//! A [`Layer`] tree describes how a node is drawn inside its own bounds.
//! Every child of a [`Layer::Stack`] covers the same bounds, later children
//! on top. [`Layer::present`] resolves the tree for one render target, which
//! is how hosts preview and tests verify what a live viewer and a capture
//! each see.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::color::Background;
use crate::surface::SurfaceHandle;

static NEXT_CONTENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, caller-supplied renderable content
///
/// The compositors only wrap it; they never look inside.
#[derive(Debug, Clone)]
pub struct ContentNode {
    id: u64,
    label: Arc<str>,
}

impl ContentNode {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_CONTENT_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ContentNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContentNode {}

/// Which pipeline a render is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The on-device display
    Live,
    /// Screenshots, recordings and mirrored output
    Capture,
}

/// What ends up visible in a node's bounds for one render target
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    Blank,
    Content(ContentNode),
    Fill(Background),
}

impl Presentation {
    pub fn is_blank(&self) -> bool {
        matches!(self, Presentation::Blank)
    }
}

/// One node of a composited tree
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Empty,
    Content(ContentNode),
    /// Participates in layout, never drawn
    Hidden(Box<Layer>),
    Fill(Background),
    /// Bottom to top
    Stack(Vec<Layer>),
    /// Drawn on the live display only
    Excluded {
        surface: SurfaceHandle,
        content: Box<Layer>,
    },
}

impl Layer {
    pub fn hidden(inner: Layer) -> Self {
        Layer::Hidden(Box::new(inner))
    }

    pub fn excluded(surface: SurfaceHandle, content: Layer) -> Self {
        Layer::Excluded {
            surface,
            content: Box::new(content),
        }
    }

    /// Resolve what a viewer of `target` sees
    pub fn present(&self, target: RenderTarget) -> Presentation {
        match self {
            Layer::Empty | Layer::Hidden(_) => Presentation::Blank,
            Layer::Content(node) => Presentation::Content(node.clone()),
            Layer::Fill(fill) => Presentation::Fill(fill.clone()),
            Layer::Stack(children) => children
                .iter()
                .rev()
                .map(|child| child.present(target))
                .find(|p| !p.is_blank())
                .unwrap_or(Presentation::Blank),
            Layer::Excluded { content, .. } => match target {
                RenderTarget::Live => content.present(target),
                RenderTarget::Capture => Presentation::Blank,
            },
        }
    }

    /// Capture surfaces referenced anywhere in the tree
    pub fn surfaces(&self) -> Vec<SurfaceHandle> {
        let mut out = Vec::new();
        self.collect_surfaces(&mut out);
        out
    }

    fn collect_surfaces(&self, out: &mut Vec<SurfaceHandle>) {
        match self {
            Layer::Empty | Layer::Content(_) | Layer::Fill(_) => {}
            Layer::Hidden(inner) => inner.collect_surfaces(out),
            Layer::Stack(children) => children.iter().for_each(|c| c.collect_surfaces(out)),
            Layer::Excluded { surface, content } => {
                out.push(*surface);
                content.collect_surfaces(out);
            }
        }
    }
}

impl From<ContentNode> for Layer {
    fn from(node: ContentNode) -> Self {
        Layer::Content(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    #[test]
    fn test_top_of_stack_wins() {
        let text = ContentNode::new("text");
        let fill = Background::Solid(Rgba::WHITE);
        let tree = Layer::Stack(vec![Layer::Content(text.clone()), Layer::Fill(fill.clone())]);
        assert_eq!(tree.present(RenderTarget::Live), Presentation::Fill(fill));
    }

    #[test]
    fn test_excluded_blank_in_capture() {
        let text = ContentNode::new("secret");
        let tree = Layer::excluded(SurfaceHandle::from_raw(7), Layer::Content(text.clone()));
        assert_eq!(tree.present(RenderTarget::Live), Presentation::Content(text));
        assert!(tree.present(RenderTarget::Capture).is_blank());
        assert_eq!(tree.surfaces(), vec![SurfaceHandle::from_raw(7)]);
    }

    #[test]
    fn test_hidden_never_drawn() {
        let tree = Layer::Stack(vec![Layer::hidden(ContentNode::new("sizer").into())]);
        assert!(tree.present(RenderTarget::Live).is_blank());
        assert!(tree.present(RenderTarget::Capture).is_blank());
    }

    #[test]
    fn test_content_ids_unique() {
        assert_ne!(ContentNode::new("a"), ContentNode::new("a"));
    }
}
