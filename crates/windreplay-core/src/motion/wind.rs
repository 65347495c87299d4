//! Wind mouse: gravity pulls the cursor to the target while a decaying random
//! wind pushes it around, which gives curved, human-looking paths.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Wind mouse parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindMouse {
    /// Pull towards the target (G)
    pub gravity: f64,
    /// Wind magnitude (W)
    pub wind: f64,
    /// Velocity cap (M)
    pub max_velocity: f64,
    /// Below this distance wind stops gusting and the cap decays (D)
    pub damping_distance: f64,
    /// Hard bound on simulation steps
    pub max_steps: usize,
}

impl Default for WindMouse {
    fn default() -> Self {
        Self {
            gravity: 9.0,
            wind: 3.0,
            max_velocity: 15.0,
            damping_distance: 12.0,
            max_steps: 10_000,
        }
    }
}

impl WindMouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn wind(mut self, wind: f64) -> Self {
        self.wind = wind;
        self
    }

    pub fn max_velocity(mut self, max_velocity: f64) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn damping_distance(mut self, distance: f64) -> Self {
        self.damping_distance = distance;
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Lazy waypoint sequence from `start` to `end`. `start` itself is never
    /// yielded; the last waypoint is always `end` unless `start == end`.
    pub fn path<'a, R: Rng + ?Sized>(
        &self,
        start: (i32, i32),
        end: (i32, i32),
        rng: &'a mut R,
    ) -> WindPath<'a, R> {
        WindPath {
            params: *self,
            rng,
            pos: (start.0 as f64, start.1 as f64),
            target: (end.0 as f64, end.1 as f64),
            end,
            velocity: (0.0, 0.0),
            gust: (0.0, 0.0),
            max_velocity: self.max_velocity,
            last: start,
            steps: 0,
            done: false,
        }
    }

    /// Walk the path, calling `move_to` once per distinct waypoint.
    /// Returns the number of calls made.
    pub fn drive<R, F>(&self, start: (i32, i32), end: (i32, i32), rng: &mut R, mut move_to: F) -> usize
    where
        R: Rng + ?Sized,
        F: FnMut(i32, i32),
    {
        let mut moves = 0;
        for (x, y) in self.path(start, end, rng) {
            move_to(x, y);
            moves += 1;
        }
        moves
    }
}

pub struct WindPath<'a, R: ?Sized> {
    params: WindMouse,
    rng: &'a mut R,
    pos: (f64, f64),
    target: (f64, f64),
    end: (i32, i32),
    velocity: (f64, f64),
    gust: (f64, f64),
    max_velocity: f64,
    last: (i32, i32),
    steps: usize,
    done: bool,
}

impl<R: Rng + ?Sized> WindPath<'_, R> {
    fn step(&mut self, dist: f64) {
        let sqrt3 = 3f64.sqrt();
        let sqrt5 = 5f64.sqrt();
        let dx = self.target.0 - self.pos.0;
        let dy = self.target.1 - self.pos.1;
        let w_mag = self.params.wind.min(dist);

        if dist >= self.params.damping_distance {
            self.gust.0 = self.gust.0 / sqrt3 + (2.0 * self.rng.gen::<f64>() - 1.0) * w_mag / sqrt5;
            self.gust.1 = self.gust.1 / sqrt3 + (2.0 * self.rng.gen::<f64>() - 1.0) * w_mag / sqrt5;
        } else {
            self.gust.0 /= sqrt3;
            self.gust.1 /= sqrt3;
            if self.max_velocity < 3.0 {
                self.max_velocity = self.rng.gen::<f64>() * 3.0 + 3.0;
            } else {
                self.max_velocity /= sqrt5;
            }
        }

        self.velocity.0 += self.gust.0 + self.params.gravity * dx / dist;
        self.velocity.1 += self.gust.1 + self.params.gravity * dy / dist;

        let v_mag = self.velocity.0.hypot(self.velocity.1);
        if v_mag > self.max_velocity {
            let clip = self.max_velocity / 2.0 + self.rng.gen::<f64>() * self.max_velocity / 2.0;
            self.velocity.0 = self.velocity.0 / v_mag * clip;
            self.velocity.1 = self.velocity.1 / v_mag * clip;
        }

        self.pos.0 += self.velocity.0;
        self.pos.1 += self.velocity.1;
    }
}

impl<R: Rng + ?Sized> Iterator for WindPath<'_, R> {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let dist = (self.target.0 - self.pos.0).hypot(self.target.1 - self.pos.1);

            if dist < 1.0 || self.steps >= self.params.max_steps {
                self.done = true;
                if self.steps >= self.params.max_steps {
                    tracing::debug!(steps = self.steps, "wind mouse hit step cap, snapping to target");
                }
                // Land exactly on the target pixel
                if self.last != self.end {
                    self.last = self.end;
                    return Some(self.end);
                }
                return None;
            }

            self.steps += 1;
            self.step(dist);

            let waypoint = (self.pos.0.round() as i32, self.pos.1.round() as i32);
            if waypoint != self.last {
                self.last = waypoint;
                return Some(waypoint);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn same_start_and_end_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let path: Vec<_> = WindMouse::default().path((40, 40), (40, 40), &mut rng).collect();
        assert!(path.is_empty());
    }

    #[test]
    fn seeded_paths_are_identical() {
        let wm = WindMouse::default();
        let a: Vec<_> = wm.path((0, 0), (500, 300), &mut StdRng::seed_from_u64(7)).collect();
        let b: Vec<_> = wm.path((0, 0), (500, 300), &mut StdRng::seed_from_u64(7)).collect();
        assert_eq!(a, b);
        assert!(a.len() > 1);
    }

    #[test]
    fn ends_on_target_without_repeats() {
        let mut rng = StdRng::seed_from_u64(42);
        let path: Vec<_> = WindMouse::default().path((10, 900), (1200, 20), &mut rng).collect();
        assert_eq!(path.last(), Some(&(1200, 20)));
        assert!(path.windows(2).all(|w| w[0] != w[1]));
        assert_ne!(path[0], (10, 900));
    }

    #[test]
    fn step_cap_bounds_pathological_parameters() {
        let wm = WindMouse::default().gravity(0.0).wind(0.0).max_steps(50);
        let mut rng = StdRng::seed_from_u64(3);
        let path: Vec<_> = wm.path((0, 0), (1000, 0), &mut rng).collect();
        // No pull and no wind: the cursor never moves, then snaps at the cap
        assert_eq!(path, vec![(1000, 0)]);
    }

    #[test]
    fn drive_counts_callbacks() {
        let mut seen = Vec::new();
        let n = WindMouse::default().drive((0, 0), (30, 40), &mut StdRng::seed_from_u64(9), |x, y| {
            seen.push((x, y))
        });
        assert_eq!(n, seen.len());
        assert_eq!(seen.last(), Some(&(30, 40)));
    }
}
