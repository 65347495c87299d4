//! Eased straight-line interpolation

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map progress in `[0, 1]` to eased progress in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (1.0 - t) * (1.0 - t)
                }
            }
        }
    }
}

/// Upper bound on interpolation steps for one path.
pub const MAX_TWEEN_STEPS: usize = 10_000;

/// Interpolate `steps` positions from `start` to `end`, dropping repeats.
/// `steps` is clamped to `1..=MAX_TWEEN_STEPS`. The last waypoint is `end`
/// unless `start == end`.
pub fn tween_path(start: (i32, i32), end: (i32, i32), steps: usize, easing: Easing) -> Vec<(i32, i32)> {
    let steps = steps.clamp(1, MAX_TWEEN_STEPS);
    let (dx, dy) = ((end.0 - start.0) as f64, (end.1 - start.1) as f64);
    let mut last = start;
    let mut path = Vec::with_capacity(steps);

    for i in 1..=steps {
        let k = easing.apply(i as f64 / steps as f64);
        let p = (
            (start.0 as f64 + dx * k).round() as i32,
            (start.1 as f64 + dy * k).round() as i32,
        );
        if p != last {
            path.push(p);
            last = p;
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_endpoints() {
        for e in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert_eq!(e.apply(0.0), 0.0);
            assert_eq!(e.apply(1.0), 1.0);
        }
        assert!(Easing::EaseIn.apply(0.25) < 0.25);
        assert!(Easing::EaseOut.apply(0.25) > 0.25);
    }

    #[test]
    fn linear_path_is_evenly_spaced() {
        let path = tween_path((0, 0), (100, 0), 4, Easing::Linear);
        assert_eq!(path, vec![(25, 0), (50, 0), (75, 0), (100, 0)]);
    }

    #[test]
    fn zero_length_path_is_empty() {
        assert!(tween_path((5, 5), (5, 5), 10, Easing::EaseInOut).is_empty());
    }

    #[test]
    fn huge_step_counts_are_capped() {
        let path = tween_path((0, 0), (1_000_000, 0), usize::MAX, Easing::Linear);
        assert_eq!(path.len(), MAX_TWEEN_STEPS);
        assert_eq!(path.last(), Some(&(1_000_000, 0)));
    }
}
