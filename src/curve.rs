/*
Curve Model
===========

Sparse, keyframed control curves sampled at arbitrary query positions.
A curve is an ordered list of `CurvePoint`s; between two adjacent points
the value is eased by a unit cubic Bezier built from the left point's
outgoing handle (x1, y1) and the right point's incoming handle (x2, y2).

The same sampler serves two consumers: continuous per-note expression
streams (pitch bend, pressure, timbre) and generic animated-property
keyframe tracks. They must agree exactly, so both go through `evaluate`.

Degenerate inputs resolve to documented fallbacks rather than panics:
- an empty curve evaluates to 0.0
- a single point is a constant curve
- positions outside the keyframe range clamp to the end values
- a zero-length segment contributes fraction 0 (no divide-by-zero)
*/

/// One keyframe: a position/value pair plus the Bezier handle tangents
/// of the segments meeting at this point.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Position of this keyframe, in the curve's time unit (usually beats).
    pub time_offset: f64,
    /// Value at this keyframe.
    pub value: f64,
    /// Outgoing handle of the segment that starts here.
    pub x1: f64,
    pub y1: f64,
    /// Incoming handle of the segment that ends here.
    pub x2: f64,
    pub y2: f64,
}

impl CurvePoint {
    /// A keyframe with identity easing handles (0,0)/(1,1), i.e. the
    /// segment interpolates linearly in value.
    pub fn new(time_offset: f64, value: f64) -> Self {
        Self {
            time_offset,
            value,
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        }
    }

    /// A keyframe with explicit easing handles.
    pub fn with_handles(time_offset: f64, value: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            time_offset,
            value,
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// Result of a segment lookup: the bracketing keyframe indices and the
/// linear fraction of `pos` between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    pub start: usize,
    pub end: usize,
    pub t: f64,
}

/// Find the pair of keyframe positions bracketing `pos`.
///
/// Positions must be sorted ascending. Queries past the last position
/// clamp to `(last, last, 1.0)`; queries before the first clamp to
/// `(0, 0, 0.0)`. No extrapolation.
pub fn locate_segment(pos: f64, positions: &[f64]) -> SegmentHit {
    assert!(
        !positions.is_empty(),
        "locate_segment requires at least one position"
    );

    let last = positions.len() - 1;
    if pos <= positions[0] {
        return SegmentHit {
            start: 0,
            end: 0,
            t: 0.0,
        };
    }
    if pos >= positions[last] {
        return SegmentHit {
            start: last,
            end: last,
            t: 1.0,
        };
    }

    // First index whose position is strictly greater than pos.
    let end = positions.partition_point(|&p| p <= pos);
    let start = end - 1;
    SegmentHit {
        start,
        end,
        t: local_fraction(pos, positions[start], positions[end]),
    }
}

/// Linear fraction of `pos` between `left` and `right`, clamped to [0, 1].
/// A degenerate (zero or negative length) span yields 0.
fn local_fraction(pos: f64, left: f64, right: f64) -> f64 {
    let span = right - left;
    if span <= 0.0 {
        return 0.0;
    }
    ((pos - left) / span).clamp(0.0, 1.0)
}

/// Sample a curve at `pos`.
///
/// An empty curve evaluates to 0.0 — strict callers should validate
/// curve shape before playback rather than rely on the fallback.
pub fn evaluate(pos: f64, points: &[CurvePoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    if points.len() == 1 {
        return points[0].value;
    }

    let last = points.len() - 1;
    if pos <= points[0].time_offset {
        return points[0].value;
    }
    if pos >= points[last].time_offset {
        return points[last].value;
    }

    let end = points.partition_point(|p| p.time_offset <= pos);
    let left = &points[end - 1];
    let right = &points[end];

    let t = local_fraction(pos, left.time_offset, right.time_offset);
    let bezier = UnitBezier::new(left.x1, left.y1, right.x2, right.y2);
    let eased = bezier.sample_y(bezier.solve_t(t));
    left.value + (right.value - left.value) * eased
}

const NEWTON_ITERATIONS: usize = 8;
const SOLVE_EPSILON: f64 = 1e-7;
const DERIVATIVE_EPSILON: f64 = 1e-6;

/// Unit cubic Bezier through (0,0) and (1,1) with control points
/// (x1, y1) and (x2, y2), in polynomial form.
struct UnitBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl UnitBezier {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        Self {
            ax,
            bx,
            cx,
            ay,
            by,
            cy,
        }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    /// Invert x(t) = x: Newton's method, falling back to bisection when
    /// the derivative vanishes or a step leaves [0, 1].
    fn solve_t(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);

        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let err = self.sample_x(t) - x;
            if err.abs() < SOLVE_EPSILON {
                return t;
            }
            let slope = self.sample_dx(t);
            if slope.abs() < DERIVATIVE_EPSILON {
                break;
            }
            let next = t - err / slope;
            if !(0.0..=1.0).contains(&next) {
                break;
            }
            t = next;
        }

        let mut lo = 0.0;
        let mut hi = 1.0;
        while hi - lo > SOLVE_EPSILON {
            let mid = 0.5 * (lo + hi);
            if self.sample_x(mid) < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_pair() -> Vec<CurvePoint> {
        vec![CurvePoint::new(0.0, 10.0), CurvePoint::new(2.0, 20.0)]
    }

    #[test]
    fn empty_curve_falls_back_to_zero() {
        assert_eq!(evaluate(1.0, &[]), 0.0);
    }

    #[test]
    fn single_point_is_constant() {
        let curve = vec![CurvePoint::new(1.0, 42.0)];
        assert_eq!(evaluate(-5.0, &curve), 42.0);
        assert_eq!(evaluate(1.0, &curve), 42.0);
        assert_eq!(evaluate(100.0, &curve), 42.0);
    }

    #[test]
    fn clamps_outside_keyframe_range() {
        let curve = linear_pair();
        assert_eq!(evaluate(-1.0, &curve), 10.0);
        assert_eq!(evaluate(0.0, &curve), 10.0);
        assert_eq!(evaluate(2.0, &curve), 20.0);
        assert_eq!(evaluate(7.5, &curve), 20.0);
    }

    #[test]
    fn identity_handles_give_linear_midpoint() {
        // Handles (0,0)/(1,1) make the eased fraction equal the linear
        // fraction, so the midpoint lands exactly between the values.
        let curve = linear_pair();
        let mid = evaluate(1.0, &curve);
        assert!((mid - 15.0).abs() < 1e-4, "midpoint was {mid}");
    }

    #[test]
    fn eased_segment_stays_within_value_range() {
        let curve = vec![
            CurvePoint::new(0.0, 0.0),
            CurvePoint::with_handles(1.0, 1.0, 0.42, 0.0, 0.58, 1.0),
        ];
        for i in 0..=20 {
            let pos = i as f64 / 20.0;
            let v = evaluate(pos, &curve);
            assert!((0.0..=1.0).contains(&v), "value {v} at pos {pos}");
        }
        // Ease-in-out: slow start, fast middle.
        assert!(evaluate(0.1, &curve) < 0.1);
        assert!(evaluate(0.9, &curve) > 0.9);
    }

    #[test]
    fn solver_handles_flat_derivative() {
        // x(t) = t^3 has zero derivative at t = 0; Newton gives up and
        // bisection must take over.
        let bezier = UnitBezier::new(0.0, 0.0, 0.0, 1.0);
        let t = bezier.solve_t(0.125);
        assert!((bezier.sample_x(t) - 0.125).abs() < 1e-4);
    }

    #[test]
    fn locate_segment_brackets_interior_positions() {
        let positions = [0.0, 1.0, 4.0];
        let hit = locate_segment(2.5, &positions);
        assert_eq!(hit.start, 1);
        assert_eq!(hit.end, 2);
        assert!((hit.t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn locate_segment_clamps_past_the_end() {
        let positions = [0.0, 1.0, 4.0];
        assert_eq!(
            locate_segment(9.0, &positions),
            SegmentHit {
                start: 2,
                end: 2,
                t: 1.0
            }
        );
        assert_eq!(
            locate_segment(-3.0, &positions),
            SegmentHit {
                start: 0,
                end: 0,
                t: 0.0
            }
        );
    }

    #[test]
    fn coincident_positions_yield_zero_fraction() {
        let positions = [0.0, 1.0, 1.0, 2.0];
        let hit = locate_segment(1.0, &positions);
        assert_eq!(hit.t, 0.0);
    }
}
