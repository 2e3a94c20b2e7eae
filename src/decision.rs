//! Content decision engine.
//!
//! Turns one frame's classifier scores into a concrete decision: whether to
//! click, where, and whether the following pause should be extended. Acting
//! on a label also increments its cumulative counter, so the counter store
//! only ever reflects decisions that were carried out.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::warn;

use crate::counts::LabelCounterStore;
use crate::device::{Point, Region, ScreenSize};
use crate::sampling;

/// Confidence a label must exceed before the engine acts on it.
pub const DEFAULT_THRESHOLD: f64 = 0.51;

/// Default content vocabulary the classifier is asked to score.
///
/// Order matters: ties at the maximum score are broken in favor of the
/// earlier label, so this list doubles as the tie-break priority.
pub const DEFAULT_LABELS: &[&str] = &[
    "love", "couple", "romantic", "kissing", "fighting", "judo", "mma", "boxing", "jiujitsu",
    "programming", "robotics", "pcb", "microcontrollers", "party", "friendship", "motorcycles",
    "motogp", "motocross", "couple goals", "wedding", "date", "heart", "affection", "intimacy",
    "passion", "champion", "kickboxing", "wrestling", "combat sports", "technology", "electronics",
    "automation", "mechanical engineering", "arduino", "raspberry pi", "self-driving cars", "ai",
    "virtual reality", "coding", "programmer", "developer", "guitar", "dancing", "love story",
    "romantic dinner", "long distance relationship", "relationship goals", "friends",
    "bachelor party", "dance floor", "nightlife", "motorcycle racing", "dirt bike",
    "off-road racing", "rally", "superbike", "rider", "helmet", "adventure sports",
];

/// An ordered set of labels submitted to the classifier.
#[derive(Debug, Clone)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

/// Outcome of one decision step.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether a click should be issued this cycle.
    pub act: bool,
    /// Click target, present iff `act`.
    pub point: Option<Point>,
    /// The label that triggered the action, present iff `act`.
    pub label: Option<String>,
    /// Whether the following pause should use the extended bounds.
    pub extend_pause: bool,
}

impl Decision {
    fn pass() -> Self {
        Self {
            act: false,
            point: None,
            label: None,
            extend_pause: false,
        }
    }
}

/// Stateless decision policy over classifier scores.
///
/// Holds the label vocabulary, the detection threshold, an optional mapping
/// from label to click region, and the counter store incremented when a
/// decision is acted on.
pub struct DecisionEngine {
    labels: LabelSet,
    threshold: f64,
    regions: HashMap<String, Region>,
    counts: Arc<LabelCounterStore>,
}

impl DecisionEngine {
    pub fn new(labels: LabelSet, threshold: f64, counts: Arc<LabelCounterStore>) -> Self {
        Self {
            labels,
            threshold,
            regions: HashMap::new(),
            counts,
        }
    }

    /// Associate a label with a specific click region. Labels without a
    /// mapping use the default central region.
    pub fn with_region(mut self, label: impl Into<String>, region: Region) -> Self {
        self.regions.insert(label.into(), region);
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn counts(&self) -> &Arc<LabelCounterStore> {
        &self.counts
    }

    /// Decide what to do with one frame's scores.
    ///
    /// `scores` must be in label order, one per label. The highest score wins;
    /// ties break toward the earlier label. Above the threshold the decision
    /// is a click at a point sampled inside the label's region, and the
    /// label's counter is incremented. Otherwise the caller falls through to
    /// a scroll gesture.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        scores: &[f64],
        screen: ScreenSize,
        rng: &mut R,
    ) -> Decision {
        if scores.len() != self.labels.len() {
            warn!(
                expected = self.labels.len(),
                got = scores.len(),
                "classifier returned wrong score count, skipping cycle"
            );
            return Decision::pass();
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, &score) in scores.iter().enumerate() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((index, score)),
            }
        }

        let Some((index, score)) = best else {
            return Decision::pass();
        };
        if score <= self.threshold {
            return Decision::pass();
        }

        let Some(label) = self.labels.get(index) else {
            return Decision::pass();
        };

        let region = self
            .regions
            .get(label)
            .copied()
            .unwrap_or_else(|| default_click_region(screen));
        let spread = (
            screen.width as f64 * 0.01,
            screen.height as f64 * 0.01,
        );
        let point = sampling::sample_click_point(rng, region, spread);

        self.counts.increment(label);

        Decision {
            act: true,
            point: Some(point),
            label: Some(label.to_string()),
            extend_pause: true,
        }
    }
}

/// Central region where feed content is clickable: the block between 15% and
/// 50% of each screen dimension.
pub fn default_click_region(screen: ScreenSize) -> Region {
    let w = screen.width as f64;
    let h = screen.height as f64;
    Region::new(
        (w * 0.15) as i32,
        (h * 0.15) as i32,
        (w * 0.5) as i32,
        (h * 0.5) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine_with(labels: &[&str]) -> DecisionEngine {
        DecisionEngine::new(
            LabelSet::new(labels.iter().map(|s| s.to_string()).collect()),
            DEFAULT_THRESHOLD,
            Arc::new(LabelCounterStore::new()),
        )
    }

    #[test]
    fn test_above_threshold_clicks_and_counts() {
        let engine = engine_with(&["love", "programming"]);
        let screen = ScreenSize::new(1080, 1920);
        let mut rng = StdRng::seed_from_u64(1);

        let decision = engine.decide(&[0.8, 0.3], screen, &mut rng);
        assert!(decision.act);
        assert!(decision.extend_pause);
        assert_eq!(decision.label.as_deref(), Some("love"));

        let point = decision.point.unwrap();
        assert!(default_click_region(screen).contains(point));

        let counts = engine.counts().snapshot();
        assert_eq!(counts.get("love"), Some(&1));
        assert_eq!(counts.get("programming"), None);
        assert_eq!(engine.counts().total(), 1);
    }

    #[test]
    fn test_below_threshold_passes() {
        let engine = engine_with(&["love", "programming"]);
        let mut rng = StdRng::seed_from_u64(2);

        let decision = engine.decide(&[0.45, 0.3], ScreenSize::default(), &mut rng);
        assert!(!decision.act);
        assert!(!decision.extend_pause);
        assert!(decision.point.is_none());
        assert_eq!(engine.counts().total(), 0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let engine = engine_with(&["love"]);
        let mut rng = StdRng::seed_from_u64(3);
        let decision = engine.decide(&[DEFAULT_THRESHOLD], ScreenSize::default(), &mut rng);
        assert!(!decision.act);
    }

    #[test]
    fn test_tie_breaks_by_declaration_order() {
        let engine = engine_with(&["judo", "boxing", "mma"]);
        let mut rng = StdRng::seed_from_u64(4);
        let decision = engine.decide(&[0.7, 0.7, 0.7], ScreenSize::default(), &mut rng);
        assert_eq!(decision.label.as_deref(), Some("judo"));
    }

    #[test]
    fn test_mapped_region_wins_over_default() {
        let region = Region::new(900, 1700, 1000, 1800);
        let engine = engine_with(&["love"]).with_region("love", region);
        let mut rng = StdRng::seed_from_u64(5);

        let decision = engine.decide(&[0.9], ScreenSize::new(1080, 1920), &mut rng);
        assert!(region.contains(decision.point.unwrap()));
    }

    #[test]
    fn test_score_count_mismatch_passes() {
        let engine = engine_with(&["love", "programming"]);
        let mut rng = StdRng::seed_from_u64(6);
        let decision = engine.decide(&[0.9], ScreenSize::default(), &mut rng);
        assert!(!decision.act);
        assert_eq!(engine.counts().total(), 0);
    }

    #[test]
    fn test_default_label_set_order() {
        let labels = LabelSet::default();
        assert_eq!(labels.len(), DEFAULT_LABELS.len());
        assert_eq!(labels.get(0), Some("love"));
        assert_eq!(labels.get(9), Some("programming"));
    }
}
