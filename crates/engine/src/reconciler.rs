use crate::Snapshot;
use artidash_protocol::{ProtocolError, UpdateMessage};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// What to do with characters the producer stopped mentioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Never prune. A silent character keeps its last record forever.
    #[default]
    Keep,
    /// Drop characters not mentioned for longer than this.
    EvictAfter(std::time::Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Changed {
        snapshot: Arc<Snapshot>,
        /// Name of the replaced/inserted character, if its record changed.
        character: Option<String>,
        bank: bool,
    },
    Unchanged,
}

impl ApplyOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Liveness {
    last_seen: OffsetDateTime,
    epoch: u64,
}

/// Single writer for the [`Snapshot`]. Messages must be fed in delivery
/// order; nothing is buffered or reordered here.
#[derive(Debug)]
pub struct Reconciler {
    snapshot: Arc<Snapshot>,
    // Kept outside the snapshot so that re-applying an identical payload
    // leaves the snapshot bit-for-bit equal.
    liveness: HashMap<String, Liveness>,
    epoch: u64,
    stale_policy: StalePolicy,
    dropped: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(StalePolicy::default())
    }
}

impl Reconciler {
    pub fn new(stale_policy: StalePolicy) -> Self {
        Self {
            snapshot: Arc::new(Snapshot::default()),
            liveness: HashMap::new(),
            epoch: 0,
            stale_policy,
            dropped: 0,
        }
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Messages rejected by [`apply_text`](Self::apply_text) so far.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped
    }

    /// Replaces the named character and/or the whole bank. Absent halves
    /// are left untouched.
    pub fn apply_update(&mut self, message: UpdateMessage, now: OffsetDateTime) -> ApplyOutcome {
        let mut changed_character = None;
        let mut changed_bank = false;

        if let Some(character) = message.character {
            self.liveness.insert(
                character.name.clone(),
                Liveness {
                    last_seen: now,
                    epoch: self.epoch,
                },
            );
            if self.snapshot.characters.get(&character.name) != Some(&character) {
                let name = character.name.clone();
                Arc::make_mut(&mut self.snapshot)
                    .characters
                    .insert(name.clone(), character);
                changed_character = Some(name);
            }
        }

        if let Some(bank) = message.bank {
            if self.snapshot.bank.as_ref() != Some(&bank) {
                Arc::make_mut(&mut self.snapshot).bank = Some(bank);
                changed_bank = true;
            }
        }

        if changed_character.is_none() && !changed_bank {
            return ApplyOutcome::Unchanged;
        }

        Arc::make_mut(&mut self.snapshot).rev += 1;
        ApplyOutcome::Changed {
            snapshot: self.current_snapshot(),
            character: changed_character,
            bank: changed_bank,
        }
    }

    /// Parses and applies one event body. A rejected body leaves the
    /// snapshot untouched and is counted in
    /// [`dropped_messages`](Self::dropped_messages).
    pub fn apply_text(
        &mut self,
        text: &str,
        now: OffsetDateTime,
    ) -> Result<ApplyOutcome, ProtocolError> {
        match UpdateMessage::parse(text) {
            Ok(Some(message)) => Ok(self.apply_update(message, now)),
            Ok(None) => Ok(ApplyOutcome::Unchanged),
            Err(err) => {
                self.dropped += 1;
                Err(err)
            }
        }
    }

    /// Starts a new connection epoch. Returns the new epoch number.
    pub fn note_connected(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// True when `name` is known but has not been mentioned since the most
    /// recent (re)connect.
    pub fn is_stale(&self, name: &str) -> bool {
        self.liveness
            .get(name)
            .is_some_and(|seen| seen.epoch < self.epoch)
    }

    pub fn stale_names(&self) -> Vec<String> {
        self.snapshot
            .names()
            .filter(|name| self.is_stale(name))
            .map(str::to_string)
            .collect()
    }

    pub fn last_seen(&self, name: &str) -> Option<OffsetDateTime> {
        self.liveness.get(name).map(|seen| seen.last_seen)
    }

    /// Applies the stale policy. Returns the evicted names, in name order.
    pub fn evict_stale(&mut self, now: OffsetDateTime) -> Vec<String> {
        let StalePolicy::EvictAfter(max_age) = self.stale_policy else {
            return Vec::new();
        };
        let max_age = time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX);

        let mut evicted: Vec<String> = self
            .liveness
            .iter()
            .filter(|(_, seen)| now - seen.last_seen > max_age)
            .map(|(name, _)| name.clone())
            .collect();
        if evicted.is_empty() {
            return evicted;
        }
        evicted.sort();

        let snapshot = Arc::make_mut(&mut self.snapshot);
        for name in &evicted {
            self.liveness.remove(name);
            snapshot.characters.remove(name);
        }
        snapshot.rev += 1;
        tracing::debug!(count = evicted.len(), "evicted stale characters");
        evicted
    }
}
