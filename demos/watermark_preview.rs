//! Example: Resolve an auto-sampled watermark and save live/capture previews
//!
//! Writes `watermark_live.png` (what the user sees) and
//! `watermark_capture.png` (what a screenshot records).

use std::rc::Rc;
use std::sync::Arc;

use capture_mask::{
    apply_capture_mode, paint_presentation, CaptureMode, ColorScheme, CompositorEnv, ContentNode,
    HeadlessPlatform, HeadlessScene, PixelSampler, Rect, RenderTarget,
};
use image::{Rgba, RgbaImage};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    // A two-tone backdrop so the sampled fill depends on placement
    let mut backdrop = RgbaImage::from_pixel(320, 200, Rgba([236, 240, 244, 255]));
    for y in 100..200 {
        for x in 0..320 {
            backdrop.put_pixel(x, y, Rgba([40, 44, 52, 255]));
        }
    }
    let scene = Arc::new(HeadlessScene::new(backdrop));
    let env = CompositorEnv::new(
        Rc::new(HeadlessPlatform::new()),
        Arc::new(PixelSampler::new(scene.clone())),
    );

    let frame = Rect::new(40.0, 130.0, 240.0, 40.0);
    let mut node = apply_capture_mode(
        ContentNode::new("Shared with you - do not forward"),
        CaptureMode::sampled_watermark(),
        &env,
    );
    node.set_color_scheme(ColorScheme::Dark);
    node.layout(frame);

    println!("Sampling watermark background...");
    node.settle().await;

    match node.resolved_fill() {
        Some(fill) => println!("Resolved fill: {:?}", fill.representative().to_rgba8()),
        None => {
            eprintln!("Watermark did not resolve: {:?}", node.last_error());
            return;
        }
    }

    let tree = node.tree();
    for (target, filename) in [
        (RenderTarget::Live, "watermark_live.png"),
        (RenderTarget::Capture, "watermark_capture.png"),
    ] {
        let mut preview = scene.snapshot();
        paint_presentation(&mut preview, &frame, 1.0, &tree.present(target), ColorScheme::Dark);
        match preview.save(filename) {
            Ok(_) => println!("Saved {:?} preview to: {}", target, filename),
            Err(e) => println!("Failed to save {}: {}", filename, e),
        }
    }
}
