//! Small planar predicates shared by pose estimation and zone handling.

use nalgebra::Point2;

/// Twice the signed area of triangle `abc` (positive for counter-clockwise in a y-up frame).
#[inline]
pub fn cross(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed shoelace area.
pub fn polygon_area(poly: &[Point2<f64>]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, a) in poly.iter().enumerate() {
        let b = poly[(i + 1) % poly.len()];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

pub fn centroid(pts: &[Point2<f64>]) -> Option<Point2<f64>> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}

/// Proper or touching intersection of segments `p1p2` and `q1q2`.
pub fn segments_intersect(
    p1: Point2<f64>,
    p2: Point2<f64>,
    q1: Point2<f64>,
    q2: Point2<f64>,
) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

fn on_segment(a: Point2<f64>, b: Point2<f64>, p: Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// A quadrilateral is simple when its two pairs of opposite edges do not cross.
pub fn is_simple_quad(q: &[Point2<f64>; 4]) -> bool {
    !segments_intersect(q[0], q[1], q[2], q[3]) && !segments_intersect(q[1], q[2], q[3], q[0])
}

/// Crossing-number point-in-polygon test.
pub fn point_in_polygon(p: Point2<f64>, poly: &[Point2<f64>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True when any two points are closer than `min_dist`.
pub fn has_near_duplicates(pts: &[Point2<f64>], min_dist: f64) -> bool {
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            if (pts[i] - pts[j]).norm() < min_dist {
                return true;
            }
        }
    }
    false
}

/// True when any three points are collinear.
///
/// The triangle area is compared against `rel_tol` times the squared span of
/// the point set, so the test is scale free.
pub fn has_collinear_triple(pts: &[Point2<f64>], rel_tol: f64) -> bool {
    let span = bounding_diagonal(pts);
    if span <= 0.0 {
        return true;
    }
    let limit = rel_tol * span * span;
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            for k in (j + 1)..pts.len() {
                if cross(pts[i], pts[j], pts[k]).abs() <= limit {
                    return true;
                }
            }
        }
    }
    false
}

fn bounding_diagonal(pts: &[Point2<f64>]) -> f64 {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if pts.is_empty() {
        return 0.0;
    }
    (max - min).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn shoelace_area_of_square() {
        assert!((polygon_area(&square()).abs() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn bow_tie_is_not_simple() {
        let sq = square();
        assert!(is_simple_quad(&sq));
        let bow = [sq[0], sq[1], sq[3], sq[2]];
        assert!(!is_simple_quad(&bow));
    }

    #[test]
    fn ray_casting_inside_outside() {
        let sq = square();
        assert!(point_in_polygon(Point2::new(5.0, 5.0), &sq));
        assert!(point_in_polygon(Point2::new(9.99, 5.0), &sq));
        assert!(!point_in_polygon(Point2::new(10.01, 5.0), &sq));
        assert!(!point_in_polygon(Point2::new(-50.0, 80.0), &sq));
    }

    #[test]
    fn collinear_and_duplicate_detection() {
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(3.0, 3.0),
        ];
        assert!(has_collinear_triple(&line, 1e-6));
        assert!(!has_collinear_triple(&square(), 1e-6));

        let mut dup = square();
        dup[2] = Point2::new(0.2, 0.1);
        assert!(has_near_duplicates(&dup, 1.0));
        assert!(!has_near_duplicates(&square(), 1.0));
    }
}
