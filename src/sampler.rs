//! Pixel sampling of the live composited output
//!
//! A watermark with no declared background takes its fill from whatever is
//! drawn around it. The sampler renders the live output for the watermark's
//! region into an offscreen bitmap (with the watermark's own surfaces
//! excluded so it never samples itself) and reduces that bitmap to one color.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tracing::debug;

use crate::color::{Background, ColorScheme, Rgba};
use crate::error::{CaptureError, CaptureResult};
use crate::geometry::Rect;
use crate::runtime;
use crate::surface::SurfaceHandle;

/// Default wait between an invalidation and the sample itself
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Averaged alpha below this is reported as translucent
pub const DEFAULT_ALPHA_THRESHOLD: f32 = 0.5;

/// Something that can render the current live display output
pub trait LiveSource: Send + Sync {
    /// Render the live output inside `region` (screen points) into a bitmap
    ///
    /// Surfaces listed in `excluding` must be left out of this one render.
    /// Returns `None` when no output is available.
    fn render_region(&self, region: Rect, excluding: &[SurfaceHandle]) -> Option<RgbaImage>;
}

/// How a rendered bitmap is reduced to one color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleStrategy {
    /// Alpha-weighted average over every pixel
    #[default]
    RegionAverage,
    /// The pixel at the center of the region
    CenterPixel,
}

/// Sampler configuration
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub settle_delay: Duration,
    pub strategy: SampleStrategy,
    pub alpha_threshold: f32,
    /// Smallest region area (square points) worth sampling
    pub min_area: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            strategy: SampleStrategy::RegionAverage,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            min_area: 1.0,
        }
    }
}

impl SamplerConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_strategy(mut self, strategy: SampleStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: f32) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }
}

/// One sampling round-trip
#[derive(Debug, Clone)]
pub struct SampleRequest {
    pub region: Rect,
    pub excluding: Vec<SurfaceHandle>,
    pub scheme: ColorScheme,
    /// Declared backgrounds of the enclosing containers, nearest first
    pub ancestors: Vec<Background>,
}

impl SampleRequest {
    pub fn new(region: Rect, scheme: ColorScheme) -> Self {
        Self {
            region,
            excluding: Vec::new(),
            scheme,
            ancestors: Vec::new(),
        }
    }

    pub fn excluding(mut self, surface: SurfaceHandle) -> Self {
        if !self.excluding.contains(&surface) {
            self.excluding.push(surface);
        }
        self
    }

    pub fn excluding_all(self, surfaces: impl IntoIterator<Item = SurfaceHandle>) -> Self {
        surfaces.into_iter().fold(self, Self::excluding)
    }

    pub fn with_ancestors(mut self, ancestors: Vec<Background>) -> Self {
        self.ancestors = ancestors;
        self
    }
}

/// Where a sampled color came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    Region,
    Ancestor,
    PlatformDefault,
}

/// A usable background color produced by sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledColor {
    pub color: Rgba,
    pub origin: SampleOrigin,
}

/// Samples the live output and reduces it to one representative color
#[derive(Clone)]
pub struct PixelSampler {
    source: Arc<dyn LiveSource>,
    config: SamplerConfig,
}

impl PixelSampler {
    pub fn new(source: Arc<dyn LiveSource>) -> Self {
        Self::with_config(source, SamplerConfig::default())
    }

    pub fn with_config(source: Arc<dyn LiveSource>, config: SamplerConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample immediately, without waiting for layout to settle
    pub fn sample(&self, request: &SampleRequest) -> CaptureResult<SampledColor> {
        let region = request.region;
        if region.is_degenerate(self.config.min_area) {
            return Err(CaptureError::InsufficientArea {
                width: region.width,
                height: region.height,
            });
        }

        let bitmap = self
            .source
            .render_region(region, &request.excluding)
            .ok_or_else(|| CaptureError::RenderUnavailable("live source returned no bitmap".into()))?;

        match self.reduce(&bitmap) {
            Ok(color) => {
                debug!(
                    "Sampled {:?} over {}x{} px at ({}, {})",
                    color.to_rgba8(),
                    bitmap.width(),
                    bitmap.height(),
                    region.x,
                    region.y
                );
                Ok(SampledColor {
                    color,
                    origin: SampleOrigin::Region,
                })
            }
            Err(CaptureError::Translucent { alpha }) => {
                debug!("Sample translucent (alpha {:.2}), walking ancestors", alpha);
                Ok(fallback_background(request))
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for the settle delay, then sample
    pub async fn sample_after_settle(&self, request: SampleRequest) -> CaptureResult<SampledColor> {
        tokio::time::sleep(self.config.settle_delay).await;
        self.sample(&request)
    }

    /// Blocking form of [`PixelSampler::sample_after_settle`]
    pub fn sample_blocking(&self, request: SampleRequest) -> CaptureResult<SampledColor> {
        let sampler = self.clone();
        runtime::block_on(async move { sampler.sample_after_settle(request).await })?
    }

    fn reduce(&self, bitmap: &RgbaImage) -> CaptureResult<Rgba> {
        let color = match self.config.strategy {
            SampleStrategy::RegionAverage => average_color(bitmap),
            SampleStrategy::CenterPixel => center_color(bitmap),
        }
        .ok_or_else(|| CaptureError::RenderUnavailable("empty bitmap".into()))?;

        if color.a < self.config.alpha_threshold {
            return Err(CaptureError::Translucent { alpha: color.a });
        }
        Ok(color.with_alpha(1.0))
    }
}

impl std::fmt::Debug for PixelSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSampler").field("config", &self.config).finish()
    }
}

/// Alpha-weighted mean color of a bitmap
///
/// Color channels are averaged weighted by alpha so transparent pixels do
/// not darken the result; the returned alpha is the plain mean.
pub fn average_color(bitmap: &RgbaImage) -> Option<Rgba> {
    let count = (bitmap.width() as u64) * (bitmap.height() as u64);
    if count == 0 {
        return None;
    }

    let mut sum = [0.0f64; 4];
    for px in bitmap.pixels() {
        let a = px[3] as f64 / 255.0;
        sum[0] += px[0] as f64 / 255.0 * a;
        sum[1] += px[1] as f64 / 255.0 * a;
        sum[2] += px[2] as f64 / 255.0 * a;
        sum[3] += a;
    }

    let alpha = sum[3] / count as f64;
    if sum[3] <= f64::EPSILON {
        return Some(Rgba::CLEAR);
    }
    Some(Rgba::new(
        (sum[0] / sum[3]) as f32,
        (sum[1] / sum[3]) as f32,
        (sum[2] / sum[3]) as f32,
        alpha as f32,
    ))
}

/// Color of the pixel at the bitmap's center
pub fn center_color(bitmap: &RgbaImage) -> Option<Rgba> {
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return None;
    }
    let px = bitmap.get_pixel(bitmap.width() / 2, bitmap.height() / 2);
    Some(Rgba::from_rgba8(px.0))
}

/// Nearest opaque ancestor background, else the scheme's neutral default
fn fallback_background(request: &SampleRequest) -> SampledColor {
    match request.ancestors.iter().find(|bg| bg.is_opaque()) {
        Some(bg) => SampledColor {
            color: bg.representative(),
            origin: SampleOrigin::Ancestor,
        },
        None => SampledColor {
            color: request.scheme.platform_default_background(),
            origin: SampleOrigin::PlatformDefault,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessScene;
    use image::Rgba as Px;

    fn sampler_over(scene: &Arc<HeadlessScene>) -> PixelSampler {
        PixelSampler::new(scene.clone())
    }

    #[test]
    fn test_zero_area_skips_render() {
        let scene = Arc::new(HeadlessScene::solid(64, 64, [10, 20, 30, 255]));
        let sampler = sampler_over(&scene);

        for region in [Rect::new(0.0, 0.0, 0.0, 20.0), Rect::new(0.0, 0.0, 20.0, 0.0)] {
            let err = sampler
                .sample(&SampleRequest::new(region, ColorScheme::Light))
                .unwrap_err();
            assert!(matches!(err, CaptureError::InsufficientArea { .. }));
        }
        assert_eq!(scene.render_count(), 0);
    }

    #[test]
    fn test_region_average_over_stripes() {
        let mut canvas = RgbaImage::from_pixel(10, 10, Px([0, 0, 0, 255]));
        for y in 0..10 {
            for x in 5..10 {
                canvas.put_pixel(x, y, Px([255, 255, 255, 255]));
            }
        }
        let scene = Arc::new(HeadlessScene::new(canvas));
        let sampled = sampler_over(&scene)
            .sample(&SampleRequest::new(Rect::new(0.0, 0.0, 10.0, 10.0), ColorScheme::Light))
            .unwrap();
        assert_eq!(sampled.origin, SampleOrigin::Region);
        assert!(sampled.color.approx_eq(&Rgba::new(0.5, 0.5, 0.5, 1.0), 0.01));
    }

    #[test]
    fn test_center_pixel_strategy() {
        let mut canvas = RgbaImage::from_pixel(9, 9, Px([0, 0, 255, 255]));
        canvas.put_pixel(4, 4, Px([255, 0, 0, 255]));
        let scene = Arc::new(HeadlessScene::new(canvas));
        let sampler = PixelSampler::with_config(
            scene.clone(),
            SamplerConfig::default().with_strategy(SampleStrategy::CenterPixel),
        );
        let sampled = sampler
            .sample(&SampleRequest::new(Rect::new(0.0, 0.0, 9.0, 9.0), ColorScheme::Light))
            .unwrap();
        assert_eq!(sampled.color.to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn test_translucent_uses_nearest_opaque_ancestor() {
        let scene = Arc::new(HeadlessScene::solid(32, 32, [200, 0, 0, 60]));
        let ancestors = vec![
            Background::Material {
                tint: Rgba::WHITE,
                blur_radius: 10.0,
            },
            Background::Solid(Rgba::new(0.0, 0.5, 0.0, 1.0)),
            Background::Solid(Rgba::new(0.0, 0.0, 1.0, 1.0)),
        ];
        let request = SampleRequest::new(Rect::new(0.0, 0.0, 16.0, 16.0), ColorScheme::Dark)
            .with_ancestors(ancestors);

        let sampled = sampler_over(&scene).sample(&request).unwrap();
        assert_eq!(sampled.origin, SampleOrigin::Ancestor);
        assert_eq!(sampled.color, Rgba::new(0.0, 0.5, 0.0, 1.0));
    }

    #[test]
    fn test_translucent_without_ancestor_uses_scheme_default() {
        let scene = Arc::new(HeadlessScene::solid(32, 32, [0, 0, 0, 0]));
        let sampler = sampler_over(&scene);
        let region = Rect::new(0.0, 0.0, 16.0, 16.0);

        let light = sampler.sample(&SampleRequest::new(region, ColorScheme::Light)).unwrap();
        assert_eq!(light.origin, SampleOrigin::PlatformDefault);
        assert_eq!(light.color, ColorScheme::Light.platform_default_background());

        let dark = sampler.sample(&SampleRequest::new(region, ColorScheme::Dark)).unwrap();
        assert_eq!(dark.color, ColorScheme::Dark.platform_default_background());
    }

    #[test]
    fn test_render_unavailable() {
        let scene = Arc::new(HeadlessScene::solid(8, 8, [1, 2, 3, 255]));
        scene.set_available(false);
        let err = sampler_over(&scene)
            .sample(&SampleRequest::new(Rect::new(0.0, 0.0, 4.0, 4.0), ColorScheme::Light))
            .unwrap_err();
        assert!(matches!(err, CaptureError::RenderUnavailable(_)));
    }

    #[test]
    fn test_excluded_surface_is_not_sampled() {
        let scene = Arc::new(HeadlessScene::solid(20, 20, [0, 0, 255, 255]));
        let own = SurfaceHandle::from_raw(99);
        scene.paint_surface(own, Rect::new(0.0, 0.0, 20.0, 20.0), Rgba::WHITE);

        let request = SampleRequest::new(Rect::new(0.0, 0.0, 20.0, 20.0), ColorScheme::Light)
            .excluding(own);
        let sampled = sampler_over(&scene).sample(&request).unwrap();
        assert_eq!(sampled.color.to_rgba8(), [0, 0, 255, 255]);
        assert_eq!(scene.last_excluded(), vec![own]);
    }

    #[test]
    fn test_lower_alpha_threshold_accepts_translucent_region() {
        let scene = Arc::new(HeadlessScene::solid(16, 16, [200, 0, 0, 60]));
        let request = SampleRequest::new(Rect::new(0.0, 0.0, 8.0, 8.0), ColorScheme::Light);

        let strict = sampler_over(&scene).sample(&request).unwrap();
        assert_eq!(strict.origin, SampleOrigin::PlatformDefault);

        let lenient = PixelSampler::with_config(
            scene.clone(),
            SamplerConfig::default().with_alpha_threshold(0.2),
        );
        let sampled = lenient.sample(&request).unwrap();
        assert_eq!(sampled.origin, SampleOrigin::Region);
        assert_eq!(sampled.color.to_rgba8(), [200, 0, 0, 255]);
    }

    #[test]
    fn test_min_area_rejects_small_region_without_render() {
        let scene = Arc::new(HeadlessScene::solid(16, 16, [1, 2, 3, 255]));
        let sampler = PixelSampler::with_config(scene.clone(), SamplerConfig::default().with_min_area(10.0));

        let err = sampler
            .sample(&SampleRequest::new(Rect::new(0.0, 0.0, 2.0, 2.0), ColorScheme::Light))
            .unwrap_err();
        assert!(matches!(err, CaptureError::InsufficientArea { .. }));
        assert_eq!(scene.render_count(), 0);

        assert!(sampler
            .sample(&SampleRequest::new(Rect::new(0.0, 0.0, 4.0, 4.0), ColorScheme::Light))
            .is_ok());
        assert_eq!(scene.render_count(), 1);
    }

    #[test]
    fn test_excluding_all_skips_duplicates() {
        let a = SurfaceHandle::from_raw(1);
        let b = SurfaceHandle::from_raw(2);
        let request = SampleRequest::new(Rect::new(0.0, 0.0, 4.0, 4.0), ColorScheme::Light)
            .excluding(a)
            .excluding_all([b, a, b]);
        assert_eq!(request.excluding, vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_after_settle_waits() {
        let scene = Arc::new(HeadlessScene::solid(8, 8, [9, 9, 9, 255]));
        let sampler = sampler_over(&scene);
        let start = tokio::time::Instant::now();
        sampler
            .sample_after_settle(SampleRequest::new(Rect::new(0.0, 0.0, 8.0, 8.0), ColorScheme::Light))
            .await
            .unwrap();
        assert!(start.elapsed() >= DEFAULT_SETTLE_DELAY);
    }

    #[test]
    fn test_sample_blocking() {
        let scene = Arc::new(HeadlessScene::solid(8, 8, [0, 255, 0, 255]));
        let sampler = PixelSampler::with_config(
            scene.clone(),
            SamplerConfig::default().with_settle_delay(Duration::from_millis(1)),
        );
        let sampled = sampler
            .sample_blocking(SampleRequest::new(Rect::new(0.0, 0.0, 8.0, 8.0), ColorScheme::Light))
            .unwrap();
        assert_eq!(sampled.color.to_rgba8(), [0, 255, 0, 255]);
    }
}
