//! Colors, appearance schemes and declared backgrounds

/// Normalized RGBA color, each channel in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const CLEAR: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        )
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Fully covers what is underneath
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0 - f32::EPSILON * 4.0
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Channel-wise closeness, used for sample comparisons
    pub fn approx_eq(&self, other: &Rgba, tolerance: f32) -> bool {
        (self.r - other.r).abs() <= tolerance
            && (self.g - other.g).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
            && (self.a - other.a).abs() <= tolerance
    }
}

/// Light or dark appearance of the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    /// Neutral system background for this scheme
    pub fn platform_default_background(&self) -> Rgba {
        match self {
            ColorScheme::Light => Rgba::WHITE,
            ColorScheme::Dark => Rgba::BLACK,
        }
    }

    pub fn platform_default_foreground(&self) -> Rgba {
        match self {
            ColorScheme::Light => Rgba::BLACK,
            ColorScheme::Dark => Rgba::WHITE,
        }
    }
}

/// A concrete fill a caller can declare behind content
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Solid(Rgba),
    /// Stops ordered by offset in `[0, 1]`
    LinearGradient { stops: Vec<(f32, Rgba)> },
    /// Blurred system material; never fully opaque
    Material { tint: Rgba, blur_radius: f32 },
}

impl Background {
    /// Reduce the fill to one color
    pub fn representative(&self) -> Rgba {
        match self {
            Background::Solid(color) => *color,
            Background::LinearGradient { stops } => {
                if stops.is_empty() {
                    return Rgba::CLEAR;
                }
                let n = stops.len() as f32;
                let sum = stops.iter().fold([0.0f32; 4], |acc, (_, c)| {
                    [acc[0] + c.r, acc[1] + c.g, acc[2] + c.b, acc[3] + c.a]
                });
                Rgba::new(sum[0] / n, sum[1] / n, sum[2] / n, sum[3] / n)
            }
            Background::Material { tint, .. } => *tint,
        }
    }

    pub fn is_opaque(&self) -> bool {
        match self {
            Background::Solid(color) => color.is_opaque(),
            Background::LinearGradient { stops } => {
                !stops.is_empty() && stops.iter().all(|(_, c)| c.is_opaque())
            }
            Background::Material { .. } => false,
        }
    }
}

impl From<Rgba> for Background {
    fn from(color: Rgba) -> Self {
        Background::Solid(color)
    }
}

/// Where a watermark's fill comes from
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSpec {
    Fill(Background),
    /// Derive the fill by sampling the surrounding live output
    Sampled,
}

impl From<Background> for BackgroundSpec {
    fn from(fill: Background) -> Self {
        BackgroundSpec::Fill(fill)
    }
}

impl From<Option<Background>> for BackgroundSpec {
    fn from(value: Option<Background>) -> Self {
        match value {
            Some(fill) => BackgroundSpec::Fill(fill),
            None => BackgroundSpec::Sampled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_round_trip_quantizes() {
        let c = Rgba::from_rgba8([255, 128, 0, 255]);
        assert!(c.is_opaque());
        assert_eq!(c.to_rgba8(), [255, 128, 0, 255]);
    }

    #[test]
    fn test_gradient_representative_and_opacity() {
        let g = Background::LinearGradient {
            stops: vec![(0.0, Rgba::BLACK), (1.0, Rgba::WHITE)],
        };
        assert!(g.representative().approx_eq(&Rgba::new(0.5, 0.5, 0.5, 1.0), 1e-6));
        assert!(g.is_opaque());

        let empty = Background::LinearGradient { stops: vec![] };
        assert!(!empty.is_opaque());
    }

    #[test]
    fn test_material_is_never_opaque() {
        let m = Background::Material {
            tint: Rgba::WHITE,
            blur_radius: 20.0,
        };
        assert!(!m.is_opaque());
    }

    #[test]
    fn test_scheme_defaults_differ() {
        assert_ne!(
            ColorScheme::Light.platform_default_background(),
            ColorScheme::Dark.platform_default_background()
        );
        assert_eq!(BackgroundSpec::from(None), BackgroundSpec::Sampled);
        assert_eq!(
            BackgroundSpec::from(Background::Solid(Rgba::BLACK)),
            BackgroundSpec::Fill(Background::Solid(Rgba::BLACK))
        );
    }
}
