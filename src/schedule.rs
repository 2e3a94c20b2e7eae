//! Diurnal schedule generation.
//!
//! Each day gets three target interaction windows (morning, afternoon,
//! bedtime) drawn from profile-specific base ranges. The ranges model when a
//! student of that school type plausibly has their phone in hand; the
//! per-day jitter keeps consecutive days from looking identical.
//!
//! Generation is a pure function of `(profile, date, rng)`, so tests replay
//! it with a seeded generator while production draws fresh randomness daily.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum separation between consecutive windows.
const MIN_GAP_MINUTES: i64 = 60;

/// Redraws attempted when jitter places a window too close to its
/// predecessor, before clamping to predecessor + gap.
const MAX_REDRAWS: usize = 8;

/// Behavioral template parameterizing base activity times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SchoolProfile {
    University,
    HighSchool,
    PrimarySchool,
}

impl SchoolProfile {
    /// Base ranges per window, in minutes since midnight of the schedule
    /// date. Ranges past 1440 spill into the next day (university bedtime
    /// runs up to 00:30).
    fn base_ranges(&self) -> [(WindowKind, (u32, u32)); 3] {
        match self {
            SchoolProfile::University => [
                (WindowKind::Morning, (8 * 60, 9 * 60)),
                (WindowKind::Afternoon, (15 * 60, 18 * 60)),
                (WindowKind::Bedtime, (23 * 60, 24 * 60 + 30)),
            ],
            SchoolProfile::HighSchool => [
                (WindowKind::Morning, (7 * 60 + 30, 8 * 60 + 30)),
                (WindowKind::Afternoon, (15 * 60, 16 * 60)),
                (WindowKind::Bedtime, (21 * 60, 22 * 60 + 30)),
            ],
            SchoolProfile::PrimarySchool => [
                (WindowKind::Morning, (7 * 60 + 30, 8 * 60 + 30)),
                (WindowKind::Afternoon, (15 * 60, 16 * 60)),
                (WindowKind::Bedtime, (20 * 60, 21 * 60)),
            ],
        }
    }
}

impl std::fmt::Display for SchoolProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchoolProfile::University => write!(f, "university"),
            SchoolProfile::HighSchool => write!(f, "high_school"),
            SchoolProfile::PrimarySchool => write!(f, "primary_school"),
        }
    }
}

/// The three canonical daily windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Morning,
    Afternoon,
    Bedtime,
}

impl WindowKind {
    pub fn label(&self) -> &'static str {
        match self {
            WindowKind::Morning => "morning",
            WindowKind::Afternoon => "afternoon",
            WindowKind::Bedtime => "bedtime",
        }
    }

    /// Session length bounds for a window of this kind, in minutes.
    /// The long afternoon block is where most of the day's engagement lands.
    pub fn session_minutes(&self) -> (u64, u64) {
        match self {
            WindowKind::Morning => (45, 60),
            WindowKind::Afternoon => (160, 180),
            WindowKind::Bedtime => (75, 90),
        }
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single target time plus its per-day fired flag.
#[derive(Debug, Clone)]
pub struct ScheduleWindow {
    pub kind: WindowKind,
    /// Full local timestamp; may fall on the day after the schedule date
    /// when a bedtime range wraps midnight.
    pub target: NaiveDateTime,
    fired: bool,
}

impl ScheduleWindow {
    pub fn new(kind: WindowKind, target: NaiveDateTime) -> Self {
        Self {
            kind,
            target,
            fired: false,
        }
    }

    pub fn fired(&self) -> bool {
        self.fired
    }
}

/// One day's set of target interaction windows, sorted by time.
///
/// A schedule is never mutated past its fired flags; when the day rolls over
/// it is superseded by a freshly generated one.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub date: NaiveDate,
    windows: Vec<ScheduleWindow>,
}

impl DaySchedule {
    /// Generate the schedule for `date` under `profile`.
    ///
    /// Exactly three windows, strictly increasing, separated by at least
    /// [`MIN_GAP_MINUTES`]. If jitter draws a window too close to its
    /// predecessor the later window is re-drawn, then clamped.
    pub fn generate<R: Rng + ?Sized>(
        profile: SchoolProfile,
        date: NaiveDate,
        rng: &mut R,
    ) -> DaySchedule {
        let day_start = date.and_time(NaiveTime::MIN);
        let mut windows: Vec<ScheduleWindow> = Vec::with_capacity(3);

        for (kind, (lo, hi)) in profile.base_ranges() {
            let draw = |rng: &mut R| day_start + Duration::minutes(rng.gen_range(lo..=hi) as i64);

            let mut target = draw(rng);
            if let Some(prev) = windows.last() {
                let earliest = prev.target + Duration::minutes(MIN_GAP_MINUTES);
                let mut attempts = 0;
                while target < earliest && attempts < MAX_REDRAWS {
                    target = draw(rng);
                    attempts += 1;
                }
                if target < earliest {
                    target = earliest;
                }
            }

            windows.push(ScheduleWindow {
                kind,
                target,
                fired: false,
            });
        }

        DaySchedule { date, windows }
    }

    /// Build a schedule from explicit windows, sorted by target time.
    ///
    /// The generated path is [`DaySchedule::generate`]; this one serves
    /// callers that pin windows themselves.
    pub fn from_windows(date: NaiveDate, mut windows: Vec<ScheduleWindow>) -> DaySchedule {
        windows.sort_by_key(|w| w.target);
        DaySchedule { date, windows }
    }

    pub fn windows(&self) -> &[ScheduleWindow] {
        &self.windows
    }

    /// First unfired window within `tolerance` of `now`, if any.
    pub fn next_due(&self, now: NaiveDateTime, tolerance: Duration) -> Option<usize> {
        self.windows
            .iter()
            .position(|w| !w.fired && (now - w.target).abs() <= tolerance)
    }

    /// Mark a window as fired for the rest of this day.
    pub fn mark_fired(&mut self, index: usize) {
        if let Some(window) = self.windows.get_mut(index) {
            window.fired = true;
        }
    }

    /// Whether this schedule should be superseded.
    ///
    /// Stale once the local date has moved past the schedule date *and* the
    /// last window's tolerance has elapsed, so a bedtime window that landed
    /// past midnight still gets its chance to fire.
    pub fn is_stale(&self, now: NaiveDateTime, tolerance: Duration) -> bool {
        if now.date() == self.date {
            return false;
        }
        match self.windows.last() {
            Some(last) => now > last.target + tolerance,
            None => true,
        }
    }
}
