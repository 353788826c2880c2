//! Corner-anchored placement of an overlay relative to its trigger element.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
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

    pub fn corner(&self, corner: Corner) -> Point {
        let x = match corner {
            Corner::TopLeft | Corner::BottomLeft => self.x,
            Corner::TopRight | Corner::BottomRight => self.x + self.width,
        };
        let y = match corner {
            Corner::TopLeft | Corner::TopRight => self.y,
            Corner::BottomLeft | Corner::BottomRight => self.y + self.height,
        };
        Point { x, y }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Which trigger corner to anchor against, which overlay corner lands on it,
/// and the gap added to the reference point (rightward/downward positive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionPolicy {
    pub ref_corner: Corner,
    pub overlay_corner: Corner,
    pub h_gap: f64,
    pub v_gap: f64,
}

impl PositionPolicy {
    pub fn new(ref_corner: Corner, overlay_corner: Corner) -> Self {
        Self {
            ref_corner,
            overlay_corner,
            h_gap: 0.0,
            v_gap: 0.0,
        }
    }

    pub fn with_gaps(mut self, h_gap: f64, v_gap: f64) -> Self {
        self.h_gap = h_gap;
        self.v_gap = v_gap;
        self
    }
}

/// Overlay origin (its top-left) such that `overlay_corner` lands on the
/// gapped reference corner of the trigger.
pub fn anchor_origin(trigger: Rect, overlay: Size, policy: PositionPolicy) -> Point {
    let reference = trigger.corner(policy.ref_corner);
    let x_offset = match policy.overlay_corner {
        Corner::TopLeft | Corner::BottomLeft => 0.0,
        Corner::TopRight | Corner::BottomRight => overlay.width,
    };
    let y_offset = match policy.overlay_corner {
        Corner::TopLeft | Corner::TopRight => 0.0,
        Corner::BottomLeft | Corner::BottomRight => overlay.height,
    };
    Point {
        x: reference.x + policy.h_gap - x_offset,
        y: reference.y + policy.v_gap - y_offset,
    }
}
