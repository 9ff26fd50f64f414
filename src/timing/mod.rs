//! Adaptive pacing
//!
//! Computes the wait between cycles and keeps the bounded history used
//! to avoid regular timing patterns.

pub mod clock;
pub mod controller;
pub mod memory;
pub mod pattern;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{health_factor, success_rate_factor, time_of_day_factor, TimingController};
pub use memory::TimingMemory;
pub use pattern::{detect_pattern, MIN_PATTERN_SAMPLES};
pub use types::{
    AdaptationState, PatternDetection, PatternKind, Phase, TimingFactors, TimingRecord,
    TimingStatistics,
};
