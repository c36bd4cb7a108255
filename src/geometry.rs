//! Direction handling, distance comparison and block outline paths.
//!
//! Outlines are built in logical coordinates where `+x` is the reading
//! direction. The builder multiplies every horizontal offset by the
//! direction sign and flips arc sweeps, so a shape is described once and
//! mirrors for right-to-left layouts.

use eframe::egui;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    /// Signed multiplier applied to every horizontal offset.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Ltr => 1.0,
            Direction::Rtl => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Ltr => Direction::Rtl,
            Direction::Rtl => Direction::Ltr,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

pub fn distance_sq(a: egui::Pos2, b: egui::Pos2) -> f32 {
    (a - b).length_sq()
}

/// `true` when `a` and `b` are no more than `max` apart.
pub fn within(a: egui::Pos2, b: egui::Pos2, max: f32) -> bool {
    distance_sq(a, b) <= max * max
}

/// `true` when a pointer travelled strictly further than `threshold`.
pub fn exceeds(delta: egui::Vec2, threshold: f32) -> bool {
    delta.length_sq() > threshold * threshold
}

/// Screen-space rectangle of a node whose origin sits on its start corner.
pub fn node_rect(origin: egui::Pos2, size: egui::Vec2, direction: Direction) -> egui::Rect {
    match direction {
        Direction::Ltr => egui::Rect::from_min_size(origin, size),
        Direction::Rtl => egui::Rect::from_min_max(
            egui::pos2(origin.x - size.x, origin.y),
            egui::pos2(origin.x, origin.y + size.y),
        ),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotchShape {
    pub wall: f32,
    pub width: f32,
    pub height: f32,
}

impl NotchShape {
    pub fn total_width(&self) -> f32 {
        2.0 * self.wall + self.width
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCmd {
    MoveTo(egui::Pos2),
    LineTo(egui::Pos2),
    /// Circular arc with the SVG small-arc convention.
    ArcTo {
        radius: f32,
        sweep: bool,
        to: egui::Pos2,
    },
    CubicTo {
        c1: egui::Pos2,
        c2: egui::Pos2,
        to: egui::Pos2,
    },
    Close,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    cmds: Vec<PathCmd>,
    sign: f32,
    cursor: egui::Pos2,
}

impl Default for Path {
    fn default() -> Self {
        Self::new(Direction::Ltr)
    }
}

impl Path {
    pub fn new(direction: Direction) -> Self {
        Self {
            cmds: Vec::new(),
            sign: direction.sign(),
            cursor: egui::Pos2::ZERO,
        }
    }

    pub fn commands(&self) -> &[PathCmd] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    fn physical(&self, logical: egui::Pos2) -> egui::Pos2 {
        egui::pos2(logical.x * self.sign, logical.y)
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.cursor = egui::pos2(x, y);
        self.cmds.push(PathCmd::MoveTo(self.physical(self.cursor)));
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.cursor = egui::pos2(x, y);
        self.cmds.push(PathCmd::LineTo(self.physical(self.cursor)));
        self
    }

    pub fn l(&mut self, dx: f32, dy: f32) -> &mut Self {
        self.line_to(self.cursor.x + dx, self.cursor.y + dy)
    }

    pub fn h(&mut self, dx: f32) -> &mut Self {
        self.l(dx, 0.0)
    }

    pub fn h_to(&mut self, x: f32) -> &mut Self {
        self.line_to(x, self.cursor.y)
    }

    pub fn v(&mut self, dy: f32) -> &mut Self {
        self.l(0.0, dy)
    }

    pub fn v_to(&mut self, y: f32) -> &mut Self {
        self.line_to(self.cursor.x, y)
    }

    /// Relative arc. `clockwise` is in logical coordinates and flips when
    /// the path is mirrored.
    pub fn arc(&mut self, radius: f32, dx: f32, dy: f32, clockwise: bool) -> &mut Self {
        self.cursor = egui::pos2(self.cursor.x + dx, self.cursor.y + dy);
        let sweep = if self.sign < 0.0 { !clockwise } else { clockwise };
        self.cmds.push(PathCmd::ArcTo {
            radius,
            sweep,
            to: self.physical(self.cursor),
        });
        self
    }

    /// Relative cubic curve; all three points are offsets from the cursor.
    pub fn curve(&mut self, c1: egui::Vec2, c2: egui::Vec2, end: egui::Vec2) -> &mut Self {
        let from = self.cursor;
        self.cursor = from + end;
        self.cmds.push(PathCmd::CubicTo {
            c1: self.physical(from + c1),
            c2: self.physical(from + c2),
            to: self.physical(self.cursor),
        });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.cmds.push(PathCmd::Close);
        self
    }

    /// Notch cut into the edge while travelling forward along the top.
    pub fn notch_forward(&mut self, notch: NotchShape) -> &mut Self {
        self.l(notch.wall, notch.height)
            .h(notch.width)
            .l(notch.wall, -notch.height)
    }

    /// Notch traced while travelling backward along a bottom edge.
    pub fn notch_backward(&mut self, notch: NotchShape) -> &mut Self {
        self.l(-notch.wall, notch.height)
            .h(-notch.width)
            .l(-notch.wall, -notch.height)
    }

    /// Rounded cap for the top of a hat block, ending `width` further along.
    pub fn hat(&mut self, width: f32, height: f32) -> &mut Self {
        self.curve(
            egui::vec2(width * 0.25, -height),
            egui::vec2(width * 0.75, -height),
            egui::vec2(width, 0.0),
        )
    }

    pub fn rect(width: f32, height: f32, direction: Direction) -> Self {
        let mut path = Self::new(direction);
        path.move_to(0.0, 0.0)
            .h_to(width)
            .v_to(height)
            .h_to(0.0)
            .close();
        path
    }

    /// Capsule whose end caps have radius `height / 2`.
    pub fn pill(width: f32, height: f32, direction: Direction) -> Self {
        let r = height / 2.0;
        let mut path = Self::new(direction);
        path.move_to(r, 0.0)
            .h_to(width - r)
            .arc(r, 0.0, height, true)
            .h_to(r)
            .arc(r, 0.0, -height, true)
            .close();
        path
    }

    /// Hexagon with pointed ends; `side` is the horizontal cut at each end.
    pub fn hexagon(width: f32, height: f32, side: f32, direction: Direction) -> Self {
        let mut path = Self::new(direction);
        path.move_to(0.0, height / 2.0)
            .line_to(side, 0.0)
            .h_to(width - side)
            .line_to(width, height / 2.0)
            .line_to(width - side, height)
            .h_to(side)
            .close();
        path
    }

    pub fn to_svg_d(&self) -> String {
        let mut out = String::new();
        for cmd in &self.cmds {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = match cmd {
                PathCmd::MoveTo(p) => write!(out, "M{} {}", fmt(p.x), fmt(p.y)),
                PathCmd::LineTo(p) => write!(out, "L{} {}", fmt(p.x), fmt(p.y)),
                PathCmd::ArcTo { radius, sweep, to } => write!(
                    out,
                    "A{r} {r} 0 0 {} {} {}",
                    u8::from(*sweep),
                    fmt(to.x),
                    fmt(to.y),
                    r = fmt(*radius)
                ),
                PathCmd::CubicTo { c1, c2, to } => write!(
                    out,
                    "C{} {} {} {} {} {}",
                    fmt(c1.x),
                    fmt(c1.y),
                    fmt(c2.x),
                    fmt(c2.y),
                    fmt(to.x),
                    fmt(to.y)
                ),
                PathCmd::Close => write!(out, "Z"),
            };
        }
        out
    }

    /// Flattens the outline into one polygon per subpath, offset by `origin`.
    pub fn flatten(&self, origin: egui::Pos2, steps: usize) -> Vec<Vec<egui::Pos2>> {
        let steps = steps.max(2);
        let mut polys: Vec<Vec<egui::Pos2>> = Vec::new();
        let mut current: Vec<egui::Pos2> = Vec::new();
        let mut at = egui::Pos2::ZERO;
        for cmd in &self.cmds {
            match *cmd {
                PathCmd::MoveTo(p) => {
                    if current.len() > 1 {
                        polys.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(origin + p.to_vec2());
                    at = p;
                }
                PathCmd::LineTo(p) => {
                    current.push(origin + p.to_vec2());
                    at = p;
                }
                PathCmd::ArcTo { radius, sweep, to } => {
                    for p in arc_points(at, to, radius, sweep, steps) {
                        current.push(origin + p.to_vec2());
                    }
                    at = to;
                }
                PathCmd::CubicTo { c1, c2, to } => {
                    for i in 1..=steps {
                        let t = i as f32 / steps as f32;
                        let u = 1.0 - t;
                        let p = at.to_vec2() * (u * u * u)
                            + c1.to_vec2() * (3.0 * u * u * t)
                            + c2.to_vec2() * (3.0 * u * t * t)
                            + to.to_vec2() * (t * t * t);
                        current.push(origin + p);
                    }
                    at = to;
                }
                PathCmd::Close => {
                    if current.len() > 1 {
                        polys.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if current.len() > 1 {
            polys.push(current);
        }
        for poly in &mut polys {
            poly.dedup_by(|a, b| distance_sq(*a, *b) < 1e-6);
            if poly.len() > 2 && distance_sq(poly[0], poly[poly.len() - 1]) < 1e-6 {
                poly.pop();
            }
        }
        polys
    }
}

fn fmt(v: f32) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

/// Points along the small arc from `from` to `to`, excluding `from`.
fn arc_points(
    from: egui::Pos2,
    to: egui::Pos2,
    radius: f32,
    sweep: bool,
    steps: usize,
) -> Vec<egui::Pos2> {
    let chord = to - from;
    let half = chord.length() / 2.0;
    if half < 1e-6 || radius <= 0.0 {
        return vec![to];
    }
    let mid = from + chord / 2.0;
    let offset = (radius * radius - half * half).max(0.0).sqrt();
    let normal = egui::vec2(-chord.y, chord.x) / chord.length();
    let tau = std::f32::consts::TAU;
    let candidates = [mid + normal * offset, mid - normal * offset];
    let mut chosen = (candidates[0], 0.0f32, 0.0f32);
    for center in candidates {
        let a0 = (from - center).angle();
        let a1 = (to - center).angle();
        let mut delta = a1 - a0;
        if sweep {
            while delta <= 0.0 {
                delta += tau;
            }
        } else {
            while delta >= 0.0 {
                delta -= tau;
            }
        }
        chosen = (center, a0, delta);
        if delta.abs() <= std::f32::consts::PI + 1e-3 {
            break;
        }
    }
    let (center, a0, delta) = chosen;
    let r = (from - center).length();
    (1..=steps)
        .map(|i| {
            let a = a0 + delta * i as f32 / steps as f32;
            center + egui::vec2(a.cos(), a.sin()) * r
        })
        .collect()
}

/// Ear-clipping triangulation of a simple polygon, returning index triples.
pub fn triangulate(points: &[egui::Pos2]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let area: f32 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    let orientation = area.signum();
    let cross = |a: egui::Pos2, b: egui::Pos2, c: egui::Pos2| (b - a).x * (c - a).y - (b - a).y * (c - a).x;
    let inside = |p: egui::Pos2, a: egui::Pos2, b: egui::Pos2, c: egui::Pos2| {
        let d1 = cross(a, b, p) * orientation;
        let d2 = cross(b, c, p) * orientation;
        let d3 = cross(c, a, p) * orientation;
        d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
    };

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut out = Vec::with_capacity(n - 2);
    let mut guard = 0;
    while remaining.len() > 3 && guard < n * n {
        guard += 1;
        let m = remaining.len();
        let mut clipped = false;
        for i in 0..m {
            let ia = remaining[(i + m - 1) % m];
            let ib = remaining[i];
            let ic = remaining[(i + 1) % m];
            let (a, b, c) = (points[ia], points[ib], points[ic]);
            if cross(a, b, c) * orientation <= 0.0 {
                continue;
            }
            let blocked = remaining
                .iter()
                .filter(|&&k| k != ia && k != ib && k != ic)
                .any(|&k| inside(points[k], a, b, c));
            if blocked {
                continue;
            }
            out.push([ia, ib, ic]);
            remaining.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // Degenerate input; fan the rest so something still gets drawn.
            for i in 1..remaining.len() - 1 {
                out.push([remaining[0], remaining[i], remaining[i + 1]]);
            }
            return out;
        }
    }
    if remaining.len() == 3 {
        out.push([remaining[0], remaining[1], remaining[2]]);
    }
    out
}
