//! Display-side progress values derived between snapshot updates.
//!
//! Cooldowns advance with the local clock; task, skill and inventory values
//! are plain ratios read from the latest record. Nothing here writes back
//! into the [`Snapshot`].

use crate::Snapshot;
use artidash_protocol::{Character, SKILLS};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClampPolicy {
    /// Pin percentages to `[0, 100]`.
    #[default]
    Clamped,
    /// Report the raw ratio: below zero after expiry, above 100 when a new
    /// expiry lies further out than its stated duration.
    Unclamped,
}

impl ClampPolicy {
    pub fn apply(self, percent: f64) -> f64 {
        match self {
            Self::Clamped => percent.clamp(0.0, 100.0),
            Self::Unclamped => percent,
        }
    }
}

/// Raw cooldown percentage. `None` when there is no duration to divide by.
pub fn cooldown_percent(
    expires: OffsetDateTime,
    duration_secs: i64,
    now: OffsetDateTime,
) -> Option<f64> {
    if duration_secs <= 0 {
        return None;
    }
    let remaining = (expires - now).as_seconds_f64();
    Some(remaining / duration_secs as f64 * 100.0)
}

/// `part / whole` as a percentage. `None` for a non-positive `whole`.
pub fn ratio_percent(part: i64, whole: i64) -> Option<f64> {
    if whole <= 0 {
        return None;
    }
    Some(part as f64 / whole as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownTimer {
    expires: Option<OffsetDateTime>,
    duration_secs: i64,
    state: TimerState,
    started_at: Option<OffsetDateTime>,
    samples: u64,
}

impl CooldownTimer {
    fn new(character: &Character, now: OffsetDateTime) -> Self {
        let mut timer = Self {
            expires: None,
            duration_secs: character.cooldown_duration,
            state: TimerState::Idle,
            started_at: None,
            samples: 0,
        };
        timer.restart(character.cooldown_expires, now);
        timer
    }

    fn restart(&mut self, expires: Option<OffsetDateTime>, now: OffsetDateTime) {
        self.expires = expires;
        self.samples = 0;
        // A cleared cooldown parks the timer; nothing is left to sample.
        (self.state, self.started_at) = match expires {
            Some(_) => (TimerState::Running, Some(now)),
            None => (TimerState::Idle, None),
        };
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// When sampling last (re)started against the current expiry.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    /// Ticks taken since the last (re)start.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    fn sample(&mut self, now: OffsetDateTime) -> Option<f64> {
        if self.state == TimerState::Idle {
            return None;
        }
        self.samples += 1;
        cooldown_percent(self.expires?, self.duration_secs, now)
    }

    fn remaining_secs(&self, now: OffsetDateTime) -> Option<f64> {
        self.expires.map(|expires| (expires - now).as_seconds_f64())
    }
}

/// What a [`TimerTable::sync`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerSync {
    pub started: Vec<String>,
    pub restarted: Vec<String>,
    pub canceled: Vec<String>,
}

impl TimerSync {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.restarted.is_empty() && self.canceled.is_empty()
    }
}

/// One cooldown timer per character in the snapshot, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TimerTable {
    timers: BTreeMap<String, CooldownTimer>,
}

impl TimerTable {
    /// Brings the table in line with `snapshot`: new names get a timer, a
    /// changed expiry restarts it, vanished names are canceled.
    pub fn sync(&mut self, snapshot: &Snapshot, now: OffsetDateTime) -> TimerSync {
        let mut report = TimerSync::default();

        let gone: Vec<String> = self
            .timers
            .keys()
            .filter(|name| !snapshot.characters.contains_key(*name))
            .cloned()
            .collect();
        for name in gone {
            self.timers.remove(&name);
            report.canceled.push(name);
        }

        for (name, character) in &snapshot.characters {
            match self.timers.get_mut(name) {
                None => {
                    self.timers
                        .insert(name.clone(), CooldownTimer::new(character, now));
                    report.started.push(name.clone());
                }
                Some(timer) => {
                    timer.duration_secs = character.cooldown_duration;
                    if timer.expires != character.cooldown_expires {
                        timer.restart(character.cooldown_expires, now);
                        report.restarted.push(name.clone());
                    }
                }
            }
        }

        report
    }

    pub fn get(&self, name: &str) -> Option<&CooldownTimer> {
        self.timers.get(name)
    }

    pub fn state(&self, name: &str) -> Option<TimerState> {
        self.timers.get(name).map(CooldownTimer::state)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn running(&self) -> usize {
        self.timers
            .values()
            .filter(|t| t.state == TimerState::Running)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterProgress {
    pub cooldown: Option<f64>,
    pub cooldown_remaining_secs: Option<f64>,
    pub cooldown_timer: TimerState,
    pub task: Option<f64>,
    /// Keyed by every name in [`SKILLS`].
    pub skills: BTreeMap<String, Option<f64>>,
    pub inventory_used: i64,
    pub inventory_max: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub sampled_at: OffsetDateTime,
}

/// Owns the timer table and the latest sampled values.
#[derive(Debug, Clone, Default)]
pub struct ProgressInterpolator {
    clamp: ClampPolicy,
    timers: TimerTable,
    progress: BTreeMap<String, CharacterProgress>,
}

impl ProgressInterpolator {
    pub fn new(clamp: ClampPolicy) -> Self {
        Self {
            clamp,
            timers: TimerTable::default(),
            progress: BTreeMap::new(),
        }
    }

    pub fn timers(&self) -> &TimerTable {
        &self.timers
    }

    /// Call after every snapshot change. Updates the timer table and
    /// resamples so new records show up without waiting for a tick.
    pub fn sync(&mut self, snapshot: &Snapshot, now: OffsetDateTime) -> TimerSync {
        let report = self.timers.sync(snapshot, now);
        for name in &report.canceled {
            self.progress.remove(name);
        }
        self.tick(snapshot, now);
        report
    }

    /// One sampling pass over every timer.
    pub fn tick(&mut self, snapshot: &Snapshot, now: OffsetDateTime) {
        let clamp = self.clamp;
        for (name, timer) in self.timers.timers.iter_mut() {
            let Some(character) = snapshot.character(name) else {
                continue;
            };
            let cooldown = timer.sample(now).map(|pct| clamp.apply(pct));
            let remaining = timer.remaining_secs(now).map(|secs| match clamp {
                ClampPolicy::Clamped => secs.max(0.0),
                ClampPolicy::Unclamped => secs,
            });
            let skills = SKILLS
                .iter()
                .map(|skill| {
                    let pct = character
                        .max_xp(skill)
                        .and_then(|max| ratio_percent(character.xp(skill), max))
                        .map(|pct| clamp.apply(pct));
                    (skill.to_string(), pct)
                })
                .collect();

            self.progress.insert(
                name.clone(),
                CharacterProgress {
                    cooldown,
                    cooldown_remaining_secs: remaining,
                    cooldown_timer: timer.state,
                    task: ratio_percent(character.task_progress, character.task_total),
                    skills,
                    inventory_used: character.inventory_count(),
                    inventory_max: character.inventory_max_items,
                    sampled_at: now,
                },
            );
        }
    }

    pub fn progress(&self, name: &str) -> Option<&CharacterProgress> {
        self.progress.get(name)
    }

    pub fn all(&self) -> &BTreeMap<String, CharacterProgress> {
        &self.progress
    }
}
