//! Randomized samplers for interaction timing and geometry.
//!
//! Click coordinates come from a bounded Cauchy distribution: mostly small
//! offsets around the target with the occasional larger jump, which reads as
//! an imprecise human tap rather than the mechanical regularity of uniform or
//! Gaussian noise. Pauses and session lengths are uniform draws over
//! configured bounds.
//!
//! Every sampler is a pure function of its bounds plus an explicit random
//! source, so tests can replay the exact same draws from a seeded `StdRng`.

use std::time::Duration;

use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Cauchy;

use crate::device::{Point, Region, ScreenSize};

/// Draws attempted before falling back to the clamped center.
const MAX_CAUCHY_DRAWS: usize = 100;

/// Pause bounds for the engagement loop, in the original agent's tuning:
/// short pauses while scanning, noticeably longer ones after content of
/// interest was found.
#[derive(Debug, Clone)]
pub struct PauseBounds {
    pub idle_min: Duration,
    pub idle_max: Duration,
    pub engaged_min: Duration,
    pub engaged_max: Duration,
}

impl Default for PauseBounds {
    fn default() -> Self {
        Self {
            idle_min: Duration::from_secs(1),
            idle_max: Duration::from_secs(5),
            engaged_min: Duration::from_secs(2),
            engaged_max: Duration::from_secs(17),
        }
    }
}

/// Draw an integer from a Cauchy distribution truncated to `[min, max]`.
///
/// The underlying distribution is unbounded, so out-of-range draws are
/// rejected and redrawn; after [`MAX_CAUCHY_DRAWS`] attempts the clamped
/// center is returned instead. The result is always within bounds.
pub fn bounded_cauchy<R: Rng + ?Sized>(
    rng: &mut R,
    center: f64,
    scale: f64,
    min: i32,
    max: i32,
) -> i32 {
    let fallback = (center.round() as i32).clamp(min, max.max(min));
    if min >= max {
        return fallback;
    }

    let Ok(dist) = Cauchy::new(center, scale.max(1.0)) else {
        return fallback;
    };

    for _ in 0..MAX_CAUCHY_DRAWS {
        let value = dist.sample(rng).round() as i32;
        if value >= min && value <= max {
            return value;
        }
    }
    fallback
}

/// Sample a click point inside `region`, concentrated around its center.
///
/// `spread` is the per-axis Cauchy scale in pixels. The point is guaranteed
/// to lie inside the region.
pub fn sample_click_point<R: Rng + ?Sized>(
    rng: &mut R,
    region: Region,
    spread: (f64, f64),
) -> Point {
    let center = region.center();
    Point::new(
        bounded_cauchy(rng, center.x as f64, spread.0, region.x_min, region.x_max),
        bounded_cauchy(rng, center.y as f64, spread.1, region.y_min, region.y_max),
    )
}

/// Uniform duration in `[min, max]`. Degenerate bounds return `min`.
pub fn sample_uniform_duration<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    Duration::from_millis(rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64))
}

/// Sample the pause before the next engagement cycle.
///
/// `extended` selects the wider bounds used after content of interest was
/// detected, modeling deeper engagement with what is on screen.
pub fn sample_pause<R: Rng + ?Sized>(rng: &mut R, bounds: &PauseBounds, extended: bool) -> Duration {
    if extended {
        sample_uniform_duration(rng, bounds.engaged_min, bounds.engaged_max)
    } else {
        sample_uniform_duration(rng, bounds.idle_min, bounds.idle_max)
    }
}

/// Sample the total length of a session, fixed once at session start.
pub fn sample_session_duration<R: Rng + ?Sized>(
    rng: &mut R,
    min: Duration,
    max: Duration,
) -> Duration {
    sample_uniform_duration(rng, min, max)
}

/// Sample a downward scroll gesture: randomized start/end points and a
/// 100-200 ms swipe duration.
///
/// Start and end x hover around the horizontal center; y runs from the lower
/// part of the screen toward the middle. If the jittered end point lands
/// above the start the two are swapped so the gesture always scrolls content
/// downward.
pub fn sample_scroll<R: Rng + ?Sized>(
    rng: &mut R,
    screen: ScreenSize,
) -> (Point, Point, Duration) {
    let w = screen.width as f64;
    let h = screen.height as f64;

    let x_min = (w * 0.3) as i32;
    let x_max = (w * 0.7) as i32;
    let y_min = (h * 0.3) as i32;
    let y_max = (h * 0.95) as i32;

    let x1 = bounded_cauchy(rng, w * 0.5, w * 0.02, x_min, x_max);
    let x2 = bounded_cauchy(rng, w * 0.5, w * 0.02, x_min, x_max);
    let y1 = bounded_cauchy(rng, h * 0.85, h * 0.05, y_min, y_max);
    let mut y2 = bounded_cauchy(rng, h * 0.4, h * 0.05, y_min, y_max);

    if y1 < y2 {
        y2 = bounded_cauchy(rng, h * 0.4, h * 0.05, y_min, y_max);
    }
    let (y_start, y_end) = if y1 >= y2 { (y1, y2) } else { (y2, y1) };

    let duration = Duration::from_millis(rng.gen_range(100..=200));
    (Point::new(x1, y_start), Point::new(x2, y_end), duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bounded_cauchy_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let value = bounded_cauchy(&mut rng, 300.0, 10.0, 150, 540);
            assert!((150..=540).contains(&value), "escaped bounds: {value}");
        }
    }

    #[test]
    fn test_bounded_cauchy_degenerate_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(bounded_cauchy(&mut rng, 100.0, 5.0, 42, 42), 42);
        // Center outside the range clamps to the nearest bound.
        assert_eq!(bounded_cauchy(&mut rng, 0.0, 5.0, 42, 42), 42);
    }

    #[test]
    fn test_click_point_inside_region() {
        let mut rng = StdRng::seed_from_u64(13);
        let region = Region::new(162, 288, 540, 960);
        for _ in 0..10_000 {
            let point = sample_click_point(&mut rng, region, (10.8, 19.2));
            assert!(region.contains(point), "point outside region: {point:?}");
        }
    }

    #[test]
    fn test_pause_bounds() {
        let mut rng = StdRng::seed_from_u64(21);
        let bounds = PauseBounds::default();
        for _ in 0..1_000 {
            let idle = sample_pause(&mut rng, &bounds, false);
            assert!(idle >= bounds.idle_min && idle <= bounds.idle_max);

            let engaged = sample_pause(&mut rng, &bounds, true);
            assert!(engaged >= bounds.engaged_min && engaged <= bounds.engaged_max);
        }
    }

    #[test]
    fn test_session_duration_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let min = Duration::from_secs(45 * 60);
        let max = Duration::from_secs(60 * 60);
        for _ in 0..1_000 {
            let duration = sample_session_duration(&mut rng, min, max);
            assert!(duration >= min && duration <= max);
        }
    }

    #[test]
    fn test_uniform_duration_degenerate() {
        let mut rng = StdRng::seed_from_u64(3);
        let d = Duration::from_secs(5);
        assert_eq!(sample_uniform_duration(&mut rng, d, d), d);
        assert_eq!(
            sample_uniform_duration(&mut rng, d, Duration::from_secs(1)),
            d
        );
    }

    #[test]
    fn test_scroll_moves_downward() {
        let mut rng = StdRng::seed_from_u64(99);
        let screen = ScreenSize::new(1080, 1920);
        for _ in 0..1_000 {
            let (from, to, duration) = sample_scroll(&mut rng, screen);
            assert!(from.y >= to.y, "scroll gesture moved upward");
            assert!(duration >= Duration::from_millis(100));
            assert!(duration <= Duration::from_millis(200));
            for x in [from.x, to.x] {
                assert!((324..=756).contains(&x));
            }
        }
    }

    #[test]
    fn test_seeded_replay_is_deterministic() {
        let region = Region::new(0, 0, 500, 500);
        let mut a = StdRng::seed_from_u64(1234);
        let mut b = StdRng::seed_from_u64(1234);
        for _ in 0..100 {
            assert_eq!(
                sample_click_point(&mut a, region, (5.0, 5.0)),
                sample_click_point(&mut b, region, (5.0, 5.0))
            );
        }
    }
}
