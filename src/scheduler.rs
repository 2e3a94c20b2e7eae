//! Scheduler and keep-alive loops.
//!
//! The scheduler polls wall-clock time against the day's schedule,
//! regenerates the schedule when the day rolls over, and fires at most one
//! session per window. Sessions run on their own thread; the scheduler keeps
//! the handle so completion and panics are observable, and joins any
//! in-flight session before exiting.
//!
//! The keep-alive loop is independent: a periodic no-op query that stops the
//! control channel from idling out, never fatal on failure.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::agent::Shutdown;
use crate::counts::LabelCounterStore;
use crate::decision::DecisionEngine;
use crate::device::{DeviceControl, UnlockMethod};
use crate::schedule::{DaySchedule, SchoolProfile, WindowKind};
use crate::session::{InteractionSession, SessionConfig, SessionReport, SessionSlot};
use crate::vision::{Classifier, FrameSource};

/// Current wall-clock time in the effective timezone.
///
/// The controlled device need not share the host's clock; when a timezone is
/// configured the schedule is evaluated in it.
pub fn now_in(tz: Option<Tz>) -> NaiveDateTime {
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
        None => Local::now().naive_local(),
    }
}

/// Everything the scheduler loop needs to fire sessions.
pub struct Scheduler {
    pub profile: SchoolProfile,
    pub unlock: UnlockMethod,
    pub timezone: Option<Tz>,
    pub poll_interval: Duration,
    pub tolerance: chrono::Duration,
    /// Starting schedule; `None` draws a fresh one for today. Lets callers
    /// pin the first day's windows instead of relying on the daily draw.
    pub initial_schedule: Option<DaySchedule>,
    /// Session parameters applied to every window in place of the
    /// per-window defaults. The window kind still comes from the trigger.
    pub session_override: Option<SessionConfig>,
    pub device: Arc<dyn DeviceControl>,
    pub frames: Arc<dyn FrameSource>,
    pub classifier: Arc<dyn Classifier>,
    pub engine: Arc<DecisionEngine>,
    pub counts: Arc<LabelCounterStore>,
    pub slot: SessionSlot,
    pub shutdown: Shutdown,
}

impl Scheduler {
    /// Run the scheduling loop until the stop signal arrives.
    pub fn run(self) {
        let mut rng = rand::thread_rng();
        let mut schedule = match self.initial_schedule.clone() {
            Some(schedule) => schedule,
            None => DaySchedule::generate(self.profile, now_in(self.timezone).date(), &mut rng),
        };
        log_schedule(&schedule);

        let mut session: Option<JoinHandle<SessionReport>> = None;

        loop {
            let now = now_in(self.timezone);

            if schedule.is_stale(now, self.tolerance) {
                schedule = DaySchedule::generate(self.profile, now.date(), &mut rng);
                log_schedule(&schedule);
            }

            if session.as_ref().is_some_and(|h| h.is_finished()) {
                reap(&mut session);
            }

            if let Some(index) = schedule.next_due(now, self.tolerance) {
                let kind = schedule.windows()[index].kind;
                // Fired regardless of the slot: a trigger arriving while a
                // session is active is dropped, not queued.
                schedule.mark_fired(index);

                match self.slot.try_acquire() {
                    Some(permit) => {
                        // A free slot means any previous session thread is
                        // done; join it before its handle is replaced.
                        reap(&mut session);
                        info!(window = %kind, "schedule window due, starting session");
                        match self.spawn_session(kind, permit) {
                            Ok(handle) => session = Some(handle),
                            Err(e) => error!("could not spawn session thread: {e}"),
                        }
                    }
                    None => {
                        warn!(window = %kind, "session already active, dropping trigger");
                    }
                }
            }

            if self.shutdown.wait(self.poll_interval) {
                break;
            }
        }

        if session.is_some() {
            debug!("waiting for in-flight session to wind down");
            reap(&mut session);
        }
        info!("scheduler loop exited");
    }

    fn spawn_session(
        &self,
        kind: WindowKind,
        permit: crate::session::SessionPermit,
    ) -> io::Result<JoinHandle<SessionReport>> {
        let config = match &self.session_override {
            Some(template) => SessionConfig {
                window: kind,
                ..template.clone()
            },
            None => SessionConfig::for_window(kind, self.unlock.clone()),
        };
        let session = InteractionSession::new(
            self.device.clone(),
            self.frames.clone(),
            self.classifier.clone(),
            self.engine.clone(),
            self.counts.clone(),
            config,
            self.shutdown.clone(),
        );

        thread::Builder::new()
            .name("cadence-session".to_string())
            .spawn(move || {
                // Hold the slot permit for the life of the thread; drop
                // releases it even if the session panics.
                let _permit = permit;
                let mut rng = rand::thread_rng();
                session.run(&mut rng)
            })
    }
}

/// Join a finished (or finishing) session thread and record its fate.
fn reap(session: &mut Option<JoinHandle<SessionReport>>) {
    if let Some(handle) = session.take() {
        match handle.join() {
            Ok(report) => debug!(
                session = %report.id,
                outcome = ?report.outcome,
                "session thread reaped"
            ),
            Err(_) => error!("session thread panicked"),
        }
    }
}

fn log_schedule(schedule: &DaySchedule) {
    let windows: Vec<String> = schedule
        .windows()
        .iter()
        .map(|w| format!("{} {}", w.kind, w.target.format("%Y-%m-%d %H:%M")))
        .collect();
    info!(date = %schedule.date, windows = windows.join(", "), "daily schedule generated");
}

/// Periodic heartbeat on the device-control channel.
///
/// Failures are logged and retried on the next interval; only the stop
/// signal ends the loop.
pub fn keep_alive_loop(device: Arc<dyn DeviceControl>, interval: Duration, shutdown: Shutdown) {
    info!(secs = interval.as_secs(), "keep-alive loop started");
    loop {
        // Ping first so the channel is exercised immediately on start, not
        // only after a full interval.
        match device.ping() {
            Ok(()) => debug!("keep-alive ping ok"),
            Err(e) => warn!("keep-alive ping failed: {e}"),
        }
        if shutdown.wait(interval) {
            break;
        }
    }
    info!("keep-alive loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_in_utc_matches_utc_clock() {
        let naive = now_in(Some(Tz::UTC));
        let reference = Utc::now().naive_utc();
        assert!((reference - naive).num_seconds().abs() < 5);
    }

    #[test]
    fn test_now_in_none_uses_local_clock() {
        let naive = now_in(None);
        let reference = Local::now().naive_local();
        assert!((reference - naive).num_seconds().abs() < 5);
    }
}
