//! Pointer motion models
//!
//! Playback can teleport the pointer (what was recorded) or synthesize a
//! path towards each recorded position.

mod tween;
mod wind;

pub use tween::{tween_path, Easing, MAX_TWEEN_STEPS};
pub use wind::{WindMouse, WindPath};

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum MotionStyle {
    /// Jump straight to the target
    #[default]
    Teleport,
    /// Human-like wind mouse trajectory
    Wind(WindMouse),
    /// Eased straight line in a fixed number of steps
    Tween { easing: Easing, steps: usize },
}

impl MotionStyle {
    /// Intermediate waypoints from `from` to `to`. Empty for `Teleport`.
    pub fn waypoints<R: Rng + ?Sized>(&self, from: (i32, i32), to: (i32, i32), rng: &mut R) -> Vec<(i32, i32)> {
        match self {
            MotionStyle::Teleport => Vec::new(),
            MotionStyle::Wind(wm) => wm.path(from, to, rng).collect(),
            MotionStyle::Tween { easing, steps } => tween_path(from, to, *steps, *easing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn style_round_trips_through_json() {
        let style = MotionStyle::Tween { easing: Easing::EaseOut, steps: 12 };
        let json = serde_json::to_string(&style).unwrap();
        assert!(json.contains(r#""style":"tween""#));
        assert_eq!(serde_json::from_str::<MotionStyle>(&json).unwrap(), style);

        let wind: MotionStyle = serde_json::from_str(r#"{"style":"wind","gravity":5.0}"#).unwrap();
        match wind {
            MotionStyle::Wind(wm) => {
                assert_eq!(wm.gravity, 5.0);
                assert_eq!(wm.wind, 3.0);
            }
            other => panic!("unexpected style {:?}", other),
        }
    }

    #[test]
    fn teleport_has_no_waypoints() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(MotionStyle::Teleport.waypoints((0, 0), (10, 10), &mut rng).is_empty());
        let wind = MotionStyle::Wind(WindMouse::default()).waypoints((0, 0), (10, 10), &mut rng);
        assert_eq!(wind.last(), Some(&(10, 10)));
    }
}
