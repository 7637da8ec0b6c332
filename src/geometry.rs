//! Points-based geometry shared by surfaces, sampling and cutout placement

/// A width/height pair in points
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// True when either side is zero or negative
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle in screen points, origin at the top-left
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn area(&self) -> f64 {
        self.size().area()
    }

    /// True when the rect is too small to carry a meaningful sample
    ///
    /// A side under one point counts as degenerate, as does an area under
    /// `min_area`.
    pub fn is_degenerate(&self, min_area: f64) -> bool {
        self.width < 1.0 || self.height < 1.0 || self.area() < min_area
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= x || max_y <= y {
            return None;
        }
        Some(Rect::new(x, y, max_x - x, max_y - y))
    }

    /// Convert to whole-pixel bounds clamped to a `width` x `height` bitmap
    ///
    /// Returns `(x, y, width, height)`, or `None` when nothing of the rect
    /// lands inside the bitmap.
    pub fn to_pixel_bounds(&self, scale: f64, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let bitmap = Rect::new(0.0, 0.0, width as f64, height as f64);
        let scaled = Rect::new(
            self.x * scale,
            self.y * scale,
            self.width * scale,
            self.height * scale,
        );
        let clipped = scaled.intersection(&bitmap)?;
        let x0 = clipped.x.floor() as u32;
        let y0 = clipped.y.floor() as u32;
        let x1 = (clipped.max_x().ceil() as u32).min(width);
        let y1 = (clipped.max_y().ceil() as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_rects() {
        assert!(Rect::new(0.0, 0.0, 0.0, 20.0).is_degenerate(1.0));
        assert!(Rect::new(0.0, 0.0, 20.0, 0.4).is_degenerate(1.0));
        assert!(!Rect::new(0.0, 0.0, 2.0, 2.0).is_degenerate(1.0));
        assert!(Rect::new(0.0, 0.0, 2.0, 2.0).is_degenerate(10.0));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(a.intersection(&Rect::new(20.0, 0.0, 1.0, 1.0)), None);
    }

    #[test]
    fn test_pixel_bounds_clamped() {
        let r = Rect::new(-2.0, 3.0, 10.0, 100.0);
        assert_eq!(r.to_pixel_bounds(2.0, 16, 16), Some((0, 6, 16, 10)));
        assert_eq!(Rect::new(40.0, 40.0, 2.0, 2.0).to_pixel_bounds(1.0, 16, 16), None);
    }
}
