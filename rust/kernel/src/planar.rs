// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar regions and their boolean overlay.
//!
//! Faces are planar, so every face-level operation works in a local 2D
//! frame of the face plane. Regions are overlaid with `i_overlay` and mapped
//! back to 3D through the same frame.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Point3, Vector3};

/// Regions smaller than this are dropped from overlay results.
pub const MIN_REGION_AREA: f64 = 1e-10;

/// An orthonormal 2D frame embedded in a 3D plane.
#[derive(Debug, Clone, Copy)]
pub struct PlaneFrame {
    pub origin: Point3<f64>,
    pub normal: Vector3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl PlaneFrame {
    /// Builds a frame through `origin` with the given unit normal. `u × v`
    /// equals the normal, so loops wound along the normal project
    /// counter-clockwise.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        let helper = if normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = normal.cross(&helper).normalize();
        let v = normal.cross(&u);
        Self { origin, normal, u, v }
    }

    /// Plane offset: `normal · p` for points on the plane.
    pub fn offset(&self) -> f64 {
        self.normal.dot(&self.origin.coords)
    }

    /// Signed distance of a point from the plane.
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&(p - self.origin))
    }

    pub fn to_2d(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }

    pub fn to_3d(&self, p: &Point2<f64>) -> Point3<f64> {
        self.origin + self.u * p.x + self.v * p.y
    }

    /// Returns `true` if the other plane is the same plane, either side up.
    pub fn is_coplanar(&self, normal: &Vector3<f64>, offset: f64, tolerance: f64) -> bool {
        let dot = self.normal.dot(normal);
        if dot.abs() < 1.0 - 1e-9 {
            return false;
        }
        (self.offset() - offset * dot.signum()).abs() <= tolerance
    }
}

/// A planar region: one counter-clockwise outer contour and clockwise holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Region {
    pub fn new(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self {
            outer: ensure_ccw(&outer),
            holes: holes.iter().map(|h| ensure_cw(h)).collect(),
        }
    }

    /// Enclosed area, holes subtracted.
    pub fn area(&self) -> f64 {
        signed_area(&self.outer) + self.holes.iter().map(|h| signed_area(h)).sum::<f64>()
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        point_in_contour(p, &self.outer) && !self.holes.iter().any(|h| point_in_contour(p, h))
    }

    /// Axis-aligned bounds of the outer contour.
    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = *self.outer.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.outer {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// A point strictly inside the region.
    pub fn interior_point(&self) -> Option<Point2<f64>> {
        let (min, max) = self.bounds()?;
        // Scan lines through the bounds; take the middle of the widest span
        let mut best: Option<(f64, Point2<f64>)> = None;
        for k in 1..16 {
            let y = min.y + (max.y - min.y) * (k as f64 / 16.0);
            let mut xs: Vec<f64> = Vec::new();
            for contour in std::iter::once(&self.outer).chain(self.holes.iter()) {
                let n = contour.len();
                for i in 0..n {
                    let a = contour[i];
                    let b = contour[(i + 1) % n];
                    if (a.y > y) != (b.y > y) {
                        xs.push(a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x));
                    }
                }
            }
            xs.sort_by(|a, b| a.total_cmp(b));
            for pair in xs.chunks(2) {
                if let [x0, x1] = pair {
                    let width = x1 - x0;
                    if best.map_or(true, |(w, _)| width > w) {
                        best = Some((width, Point2::new((x0 + x1) / 2.0, y)));
                    }
                }
            }
        }
        best.map(|(_, p)| p)
    }

    /// Maps the region onto a plane.
    pub fn to_3d(&self, frame: &PlaneFrame) -> (Vec<Point3<f64>>, Vec<Vec<Point3<f64>>>) {
        let outer = self.outer.iter().map(|p| frame.to_3d(p)).collect();
        let holes = self
            .holes
            .iter()
            .map(|h| h.iter().map(|p| frame.to_3d(p)).collect())
            .collect();
        (outer, holes)
    }

    fn to_paths(&self) -> Vec<Vec<[f64; 2]>> {
        std::iter::once(&self.outer)
            .chain(self.holes.iter())
            .map(|c| contour_to_path(c))
            .collect()
    }
}

/// Projects a face's loops into a frame as a region.
pub fn project_loops(
    frame: &PlaneFrame,
    outer: &[Point3<f64>],
    holes: &[Vec<Point3<f64>>],
) -> Region {
    Region::new(
        outer.iter().map(|p| frame.to_2d(p)).collect(),
        holes
            .iter()
            .map(|h| h.iter().map(|p| frame.to_2d(p)).collect())
            .collect(),
    )
}

/// Union of possibly overlapping contours of any winding.
pub fn union_contours(contours: &[Vec<Point2<f64>>]) -> Vec<Region> {
    let subject: Vec<Vec<[f64; 2]>> = contours
        .iter()
        .filter(|c| c.len() >= 3)
        .map(|c| contour_to_path(&ensure_ccw(c)))
        .collect();
    if subject.is_empty() {
        return Vec::new();
    }
    let clip: Vec<Vec<[f64; 2]>> = Vec::new();
    let result = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_regions(&result)
}

/// Region bounded by closed, non-crossing loops. Nested loops alternate
/// between material and hole.
pub fn fill_loops(contours: &[Vec<Point2<f64>>]) -> Vec<Region> {
    let subject: Vec<Vec<[f64; 2]>> = contours
        .iter()
        .filter(|c| c.len() >= 3)
        .map(|c| contour_to_path(c))
        .collect();
    if subject.is_empty() {
        return Vec::new();
    }
    let clip: Vec<Vec<[f64; 2]>> = Vec::new();
    let result = subject.overlay(&clip, OverlayRule::Union, FillRule::EvenOdd);
    shapes_to_regions(&result)
}

/// Boolean overlay of two region sets.
pub fn overlay(subject: &[Region], clip: &[Region], rule: OverlayRule) -> Vec<Region> {
    let subject_paths: Vec<Vec<[f64; 2]>> = subject.iter().flat_map(Region::to_paths).collect();
    let clip_paths: Vec<Vec<[f64; 2]>> = clip.iter().flat_map(Region::to_paths).collect();
    if subject_paths.is_empty() && clip_paths.is_empty() {
        return Vec::new();
    }
    let result = subject_paths.overlay(&clip_paths, rule, FillRule::NonZero);
    shapes_to_regions(&result)
}

pub fn intersect(subject: &[Region], clip: &[Region]) -> Vec<Region> {
    if subject.is_empty() || clip.is_empty() {
        return Vec::new();
    }
    overlay(subject, clip, OverlayRule::Intersect)
}

pub fn difference(subject: &[Region], clip: &[Region]) -> Vec<Region> {
    if clip.is_empty() {
        return subject.to_vec();
    }
    overlay(subject, clip, OverlayRule::Difference)
}

pub fn union(subject: &[Region], clip: &[Region]) -> Vec<Region> {
    overlay(subject, clip, OverlayRule::Union)
}

/// Total area of a region set.
pub fn total_area(regions: &[Region]) -> f64 {
    regions.iter().map(Region::area).sum()
}

fn shapes_to_regions(shapes: &[Vec<Vec<[f64; 2]>>]) -> Vec<Region> {
    let mut regions = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let Some(first) = shape.first() else {
            continue;
        };
        let outer = simplify_contour(&path_to_contour(first), 1e-12);
        if outer.len() < 3 || signed_area(&outer).abs() <= MIN_REGION_AREA {
            continue;
        }
        let holes: Vec<Vec<Point2<f64>>> = shape
            .iter()
            .skip(1)
            .map(|c| simplify_contour(&path_to_contour(c), 1e-12))
            .filter(|h| h.len() >= 3 && signed_area(h).abs() > MIN_REGION_AREA)
            .collect();
        regions.push(Region::new(outer, holes));
    }
    regions
}

fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

fn path_to_contour(path: &[[f64; 2]]) -> Vec<Point2<f64>> {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

/// Signed area of a contour. Positive when counter-clockwise.
pub fn signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    let n = contour.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y - contour[j].x * contour[i].y;
    }
    area * 0.5
}

pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(contour) < 0.0 {
        contour.iter().rev().copied().collect()
    } else {
        contour.to_vec()
    }
}

pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(contour) > 0.0 {
        contour.iter().rev().copied().collect()
    } else {
        contour.to_vec()
    }
}

/// Removes repeated and collinear points.
pub fn simplify_contour(contour: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    let mut points: Vec<Point2<f64>> = Vec::with_capacity(contour.len());
    for p in contour {
        if points.last().map_or(true, |q| (p - q).norm() > epsilon) {
            points.push(*p);
        }
    }
    while points.len() > 1 && (points[0] - points[points.len() - 1]).norm() <= epsilon {
        points.pop();
    }

    let mut changed = true;
    while changed && points.len() > 3 {
        changed = false;
        let n = points.len();
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];
            let a = curr - prev;
            let b = next - curr;
            let scale = a.norm().max(b.norm()).max(1.0);
            if (a.x * b.y - a.y * b.x).abs() <= epsilon * scale {
                points.remove(i);
                changed = true;
                break;
            }
        }
    }
    points
}

/// Even-odd point in contour test.
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = contour.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Region {
        Region::new(
            vec![
                Point2::new(x0, y0),
                Point2::new(x0 + size, y0),
                Point2::new(x0 + size, y0 + size),
                Point2::new(x0, y0 + size),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn frame_round_trip() {
        let frame = PlaneFrame::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
        let p = Point3::new(4.0, -1.0, 3.0);
        let back = frame.to_3d(&frame.to_2d(&p));
        assert_relative_eq!((back - p).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(frame.distance(&Point3::new(0.0, 0.0, 5.0)), 2.0);
        assert!(frame.is_coplanar(&Vector3::new(0.0, 0.0, -1.0), -3.0, 1e-9));
    }

    #[test]
    fn overlay_of_offset_squares() {
        let a = [square(0.0, 0.0, 2.0)];
        let b = [square(1.0, 0.0, 2.0)];

        assert_relative_eq!(total_area(&intersect(&a, &b)), 2.0, epsilon = 1e-9);
        assert_relative_eq!(total_area(&difference(&a, &b)), 2.0, epsilon = 1e-9);
        assert_relative_eq!(total_area(&union(&a, &b)), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn difference_makes_hole() {
        let outer = [square(0.0, 0.0, 10.0)];
        let inner = [square(4.0, 4.0, 2.0)];
        let result = difference(&outer, &inner);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert_relative_eq!(result[0].area(), 96.0, epsilon = 1e-9);
        assert!(!result[0].contains(&Point2::new(5.0, 5.0)));
        assert!(result[0].contains(&Point2::new(1.0, 1.0)));
    }

    #[test]
    fn union_merges_touching_pieces() {
        let merged = union_contours(&[
            square(0.0, 0.0, 1.0).outer,
            square(1.0, 0.0, 1.0).outer,
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].outer.len(), 4);
        assert_relative_eq!(merged[0].area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn simplify_drops_collinear_points() {
        let contour = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_eq!(simplify_contour(&contour, 1e-9).len(), 4);
    }

    #[test]
    fn interior_point_avoids_hole() {
        let ring = difference(&[square(0.0, 0.0, 10.0)], &[square(1.0, 1.0, 8.0)]);
        let p = ring[0].interior_point().unwrap();
        assert!(ring[0].contains(&p));
    }
}
