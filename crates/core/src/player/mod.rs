use serde::{Deserialize, Serialize};

use crate::{MetronomeError, Result};

/// Number of player slots in an ensemble.
pub const SLOT_COUNT: usize = 4;

/// Number of coupling coefficients (alphas or betas) per player.
pub const COUPLING_COUNT: usize = 4;

/// Lowest and highest selectable MIDI channel.
pub const MIDI_CHANNEL_MIN: u8 = 1;
pub const MIDI_CHANNEL_MAX: u8 = 16;

/// Normalised level slider.
pub const VOLUME_RANGE: ParamRange = ParamRange::new(0.0, 1.0, 0.01);
/// Delay dial, in milliseconds.
pub const DELAY_RANGE: ParamRange = ParamRange::new(0.0, 200.0, 0.5);
/// Motor noise standard deviation, in milliseconds.
pub const MOTOR_NOISE_RANGE: ParamRange = ParamRange::new(0.0, 10.0, 0.01);
/// Time keeper noise standard deviation, in milliseconds.
pub const TIME_KEEPER_NOISE_RANGE: ParamRange = ParamRange::new(0.0, 50.0, 0.01);
/// Alpha and beta coupling dials.
pub const COUPLING_RANGE: ParamRange = ParamRange::new(0.0, 1.0, 0.01);

/// Inclusive value range of a continuous control together with the
/// resolution the control snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamps into `[min, max]`. NaN maps to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Clamps and then rounds to the nearest multiple of `step`.
    ///
    /// Rounding divides by the integral inverse of the step so that values
    /// such as `0.29` come out as the nearest double rather than
    /// `0.29000000000000004`.
    pub fn snap(&self, value: f64) -> f64 {
        let clamped = self.clamp(value);
        if self.step <= 0.0 {
            return clamped;
        }
        let inverse = (1.0 / self.step).round();
        if inverse >= 1.0 {
            self.clamp((clamped * inverse).round() / inverse)
        } else {
            self.clamp((clamped / self.step).round() * self.step)
        }
    }
}

/// Zero-based position of a player within the ensemble.
///
/// Constructing one is the only place slot bounds are checked, so every
/// API that takes a `SlotIndex` can index its storage directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(pub(crate) usize);

impl SlotIndex {
    pub fn new(index: usize) -> Result<Self> {
        if index < SLOT_COUNT {
            Ok(Self(index))
        } else {
            Err(MetronomeError::out_of_range(
                "slot index",
                index as i64,
                0,
                SLOT_COUNT as i64 - 1,
            ))
        }
    }

    /// Maps a 1-based player id back to its slot.
    pub fn from_player_id(id: u32) -> Result<Self> {
        if (1..=SLOT_COUNT as u32).contains(&id) {
            Ok(Self(id as usize - 1))
        } else {
            Err(MetronomeError::out_of_range(
                "player id",
                i64::from(id),
                1,
                SLOT_COUNT as i64,
            ))
        }
    }

    /// Iterates all slots in ascending order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT).map(SlotIndex)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// The 1-based player id that lives in this slot.
    pub fn player_id(self) -> u32 {
        self.0 as u32 + 1
    }
}

impl TryFrom<i64> for SlotIndex {
    type Error = MetronomeError;

    fn try_from(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(MetronomeError::out_of_range(
                "slot index",
                value,
                0,
                SLOT_COUNT as i64 - 1,
            ));
        }
        Self::new(value as usize)
    }
}

impl TryFrom<i32> for SlotIndex {
    type Error = MetronomeError;

    fn try_from(value: i32) -> Result<Self> {
        Self::try_from(i64::from(value))
    }
}

/// One performer's tunable parameters.
///
/// Field ranges are guaranteed by whoever builds the record (the aggregator
/// or the CSV decoder); the record itself does not re-validate. When
/// `is_user` is set only `id`, `is_user`, `midi_channel` and `volume` carry
/// meaning, the timing and coupling fields keep whatever the dials last held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: u32,
    pub is_user: bool,
    pub midi_channel: u8,
    pub volume: f64,
    /// Milliseconds.
    pub delay: f64,
    pub motor_noise_std: f64,
    pub time_keeper_noise_std: f64,
    pub alphas: [f64; COUPLING_COUNT],
    pub betas: [f64; COUPLING_COUNT],
}

impl PlayerRecord {
    /// Record held by a slot before any values were committed: a user player
    /// on the slot's default MIDI channel with every dial at zero.
    pub fn placeholder(slot: SlotIndex) -> Self {
        Self {
            id: slot.player_id(),
            is_user: true,
            midi_channel: default_midi_channel(slot),
            volume: 0.0,
            delay: 0.0,
            motor_noise_std: 0.0,
            time_keeper_noise_std: 0.0,
            alphas: [0.0; COUPLING_COUNT],
            betas: [0.0; COUPLING_COUNT],
        }
    }

    /// Slot this record belongs to, derived from its id.
    pub fn slot(&self) -> Result<SlotIndex> {
        SlotIndex::from_player_id(self.id)
    }
}

/// MIDI channel a slot's selector starts on.
pub fn default_midi_channel(slot: SlotIndex) -> u8 {
    (slot.get() as u8 + MIDI_CHANNEL_MIN).min(MIDI_CHANNEL_MAX)
}
