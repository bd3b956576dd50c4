//! Client-side state for the artidash dashboard.
//!
//! [`Reconciler`] folds stream messages into a [`Snapshot`];
//! [`ProgressInterpolator`] derives time-based progress from it.

mod interpolator;
mod reconciler;
mod snapshot;

pub use artidash_protocol as protocol;
pub use interpolator::{
    cooldown_percent, ratio_percent, CharacterProgress, ClampPolicy, Clock, CooldownTimer,
    ManualClock, ProgressInterpolator, SystemClock, TimerState, TimerSync, TimerTable,
};
pub use reconciler::{ApplyOutcome, Reconciler, StalePolicy};
pub use snapshot::Snapshot;
