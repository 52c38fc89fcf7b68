//! Screen-space points and rectangles used for hit-testing.

/// A position in screen space (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    pub fn offset_from(&self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn to_sexp(&self) -> String {
        format!("(:x {:.1} :y {:.1})", self.x, self.y)
    }
}

/// Axis-aligned rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether a point lies inside (edges inclusive on the top-left,
    /// exclusive on the bottom-right).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Same size, moved so its top-left corner is at `origin`.
    pub fn moved_to(&self, origin: Point) -> Rect {
        Rect::new(origin.x, origin.y, self.width, self.height)
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:x {:.1} :y {:.1} :w {:.1} :h {:.1})",
            self.x, self.y, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let r = Rect::new(10.0, 10.0, 100.0, 50.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(109.9, 59.9)));
        assert!(!r.contains(Point::new(110.0, 30.0)));
        assert!(!r.contains(Point::new(50.0, 60.0)));
        assert!(!r.contains(Point::new(9.9, 30.0)));
    }

    #[test]
    fn test_moved_to_keeps_size() {
        let r = Rect::new(0.0, 0.0, 40.0, 20.0).moved_to(Point::new(5.0, 7.0));
        assert_eq!(r, Rect::new(5.0, 7.0, 40.0, 20.0));
        assert_eq!(r.center(), Point::new(25.0, 17.0));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        assert!((a.distance(Point::new(3.0, 4.0)) - 5.0).abs() < 1e-6);
        assert_eq!(Point::new(5.0, 5.0).offset_from(Point::new(2.0, 1.0)), Point::new(3.0, 4.0));
    }
}
