use crate::control::ControlSurface;
use crate::player::{
    ParamRange, PlayerRecord, SlotIndex, COUPLING_COUNT, COUPLING_RANGE, DELAY_RANGE,
    MIDI_CHANNEL_MAX, MIDI_CHANNEL_MIN, MOTOR_NOISE_RANGE, SLOT_COUNT, TIME_KEEPER_NOISE_RANGE,
    VOLUME_RANGE,
};
use crate::{EnsembleStore, Result};

/// Builds [`PlayerRecord`]s from the current position of the controls.
///
/// Control surfaces are expected to keep their values inside the declared
/// ranges already. Anything that slips through is clamped here and logged,
/// so an out-of-range record is never constructed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterAggregator;

impl ParameterAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Reads one player row. The timing and coupling dials are copied even
    /// for user players so their positions survive a later player count
    /// change.
    pub fn read_slot<S: ControlSurface + ?Sized>(
        &self,
        surface: &S,
        slot: SlotIndex,
        is_user: bool,
    ) -> PlayerRecord {
        PlayerRecord {
            id: slot.player_id(),
            is_user,
            midi_channel: clamp_channel(slot, surface.midi_channel(slot)),
            volume: clamp_value(slot, "volume", VOLUME_RANGE, surface.volume(slot)),
            delay: clamp_value(slot, "delay", DELAY_RANGE, surface.delay(slot)),
            motor_noise_std: clamp_value(
                slot,
                "motor_noise_std",
                MOTOR_NOISE_RANGE,
                surface.motor_noise_std(slot),
            ),
            time_keeper_noise_std: clamp_value(
                slot,
                "time_keeper_noise_std",
                TIME_KEEPER_NOISE_RANGE,
                surface.time_keeper_noise_std(slot),
            ),
            alphas: clamp_coupling(slot, "alpha", surface.alphas(slot)),
            betas: clamp_coupling(slot, "beta", surface.betas(slot)),
        }
    }

    /// Reads all four rows using the user flags currently held by `store`.
    pub fn read_all<S: ControlSurface + ?Sized>(
        &self,
        surface: &S,
        store: &EnsembleStore,
    ) -> [PlayerRecord; SLOT_COUNT] {
        std::array::from_fn(|i| {
            let slot = SlotIndex(i);
            self.read_slot(surface, slot, store.is_user(slot))
        })
    }

    /// Reads every row and writes the full set into `store` in one step.
    pub fn collect<S: ControlSurface + ?Sized>(
        &self,
        surface: &S,
        store: &mut EnsembleStore,
    ) -> Result<()> {
        let records = self.read_all(surface, store);
        store.replace_all(records)?;
        tracing::debug!(
            user_players = store.active_user_count(),
            "collected player parameters"
        );
        Ok(())
    }
}

fn clamp_channel(slot: SlotIndex, raw: u8) -> u8 {
    let channel = raw.clamp(MIDI_CHANNEL_MIN, MIDI_CHANNEL_MAX);
    if channel != raw {
        tracing::warn!(slot = slot.get(), raw, channel, "midi channel clamped");
    }
    channel
}

fn clamp_value(slot: SlotIndex, field: &'static str, range: ParamRange, raw: f64) -> f64 {
    let value = range.clamp(raw);
    if value != raw {
        tracing::warn!(slot = slot.get(), field, raw, value, "control value clamped");
    }
    value
}

fn clamp_coupling(
    slot: SlotIndex,
    field: &'static str,
    raw: [f64; COUPLING_COUNT],
) -> [f64; COUPLING_COUNT] {
    raw.map(|value| clamp_value(slot, field, COUPLING_RANGE, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlSurfaceState;

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    struct WildSurface;

    impl ControlSurface for WildSurface {
        fn active_user_count(&self) -> usize {
            0
        }
        fn midi_channel(&self, _slot: SlotIndex) -> u8 {
            99
        }
        fn volume(&self, _slot: SlotIndex) -> f64 {
            -0.5
        }
        fn delay(&self, _slot: SlotIndex) -> f64 {
            500.0
        }
        fn motor_noise_std(&self, _slot: SlotIndex) -> f64 {
            f64::NAN
        }
        fn time_keeper_noise_std(&self, _slot: SlotIndex) -> f64 {
            25.0
        }
        fn alphas(&self, _slot: SlotIndex) -> [f64; COUPLING_COUNT] {
            [1.5, 0.5, -0.1, 0.25]
        }
        fn betas(&self, _slot: SlotIndex) -> [f64; COUPLING_COUNT] {
            [0.0; COUPLING_COUNT]
        }
    }

    #[test]
    fn reads_a_modelled_row() {
        let mut surface = ControlSurfaceState::new();
        surface.set_midi_channel(slot(1), 2);
        surface.set_volume(slot(1), 0.75);
        surface.set_delay(slot(1), 10.0);
        surface.set_alphas(slot(1), [0.1, 0.2, 0.3, 0.4]);

        let record = ParameterAggregator::new().read_slot(&surface, slot(1), false);
        assert_eq!(record.id, 2);
        assert!(!record.is_user);
        assert_eq!(record.midi_channel, 2);
        assert_eq!(record.volume, 0.75);
        assert_eq!(record.delay, 10.0);
        assert_eq!(record.alphas, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn user_rows_keep_dial_positions() {
        let mut surface = ControlSurfaceState::new();
        surface.set_delay(slot(0), 30.0);
        surface.set_betas(slot(0), [0.9, 0.8, 0.7, 0.6]);

        let record = ParameterAggregator::new().read_slot(&surface, slot(0), true);
        assert!(record.is_user);
        assert_eq!(record.delay, 30.0);
        assert_eq!(record.betas, [0.9, 0.8, 0.7, 0.6]);
    }

    #[test]
    fn clamps_values_outside_their_ranges() {
        let record = ParameterAggregator::new().read_slot(&WildSurface, slot(3), false);
        assert_eq!(record.midi_channel, 16);
        assert_eq!(record.volume, 0.0);
        assert_eq!(record.delay, 200.0);
        assert_eq!(record.motor_noise_std, 0.0);
        assert_eq!(record.time_keeper_noise_std, 25.0);
        assert_eq!(record.alphas, [1.0, 0.5, 0.0, 0.25]);
    }

    #[test]
    fn collect_follows_store_flags() {
        let mut surface = ControlSurfaceState::new();
        surface.set_volume(slot(3), 0.4);
        let mut store = EnsembleStore::with_active_user_count(2).unwrap();

        ParameterAggregator::new()
            .collect(&surface, &mut store)
            .unwrap();

        let flags: Vec<bool> = store.records().iter().map(|r| r.is_user).collect();
        assert_eq!(flags, vec![true, true, false, false]);
        assert_eq!(store.slot(3).unwrap().volume, 0.4);
        assert_eq!(store.active_user_count(), 2);
    }
}
