//! Control surface abstraction.
//!
//! The editor never talks to concrete widgets. Everything the aggregator
//! needs is a "current value of control X" query on [`ControlSurface`].
//! [`ControlSurfaceState`] is the in-memory implementation used by the
//! command line front end and by tests; its setters clamp and snap exactly
//! like the rotary dials and channel selectors they stand in for.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::player::{
    default_midi_channel, SlotIndex, COUPLING_COUNT, COUPLING_RANGE, DELAY_RANGE,
    MIDI_CHANNEL_MAX, MIDI_CHANNEL_MIN, MOTOR_NOISE_RANGE, SLOT_COUNT, TIME_KEEPER_NOISE_RANGE,
    VOLUME_RANGE,
};
use crate::{MetronomeError, Result, DEFAULT_USER_PLAYERS};

/// Read access to the raw values held by the editor's controls.
pub trait ControlSurface {
    /// Current selection of the "number of user players" control.
    fn active_user_count(&self) -> usize;

    fn midi_channel(&self, slot: SlotIndex) -> u8;

    fn volume(&self, slot: SlotIndex) -> f64;

    fn delay(&self, slot: SlotIndex) -> f64;

    fn motor_noise_std(&self, slot: SlotIndex) -> f64;

    fn time_keeper_noise_std(&self, slot: SlotIndex) -> f64;

    /// Alpha dials of the row belonging to `slot`, one per other player.
    fn alphas(&self, slot: SlotIndex) -> [f64; COUPLING_COUNT];

    /// Beta dials of the row belonging to `slot`, one per other player.
    fn betas(&self, slot: SlotIndex) -> [f64; COUPLING_COUNT];
}

/// Positions of every control belonging to one player row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlRow {
    pub midi_channel: u8,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub motor_noise_std: f64,
    #[serde(default)]
    pub time_keeper_noise_std: f64,
    #[serde(default)]
    pub alphas: [f64; COUPLING_COUNT],
    #[serde(default)]
    pub betas: [f64; COUPLING_COUNT],
}

impl ControlRow {
    fn for_slot(slot: SlotIndex) -> Self {
        Self {
            midi_channel: default_midi_channel(slot),
            volume: 0.0,
            delay: 0.0,
            motor_noise_std: 0.0,
            time_keeper_noise_std: 0.0,
            alphas: [0.0; COUPLING_COUNT],
            betas: [0.0; COUPLING_COUNT],
        }
    }

    fn normalise(&mut self) {
        self.midi_channel = self.midi_channel.clamp(MIDI_CHANNEL_MIN, MIDI_CHANNEL_MAX);
        self.volume = VOLUME_RANGE.snap(self.volume);
        self.delay = DELAY_RANGE.snap(self.delay);
        self.motor_noise_std = MOTOR_NOISE_RANGE.snap(self.motor_noise_std);
        self.time_keeper_noise_std = TIME_KEEPER_NOISE_RANGE.snap(self.time_keeper_noise_std);
        for value in self.alphas.iter_mut().chain(self.betas.iter_mut()) {
            *value = COUPLING_RANGE.snap(*value);
        }
    }
}

/// In-memory control surface, loadable from a JSON preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSurfaceState {
    pub user_players: usize,
    pub rows: [ControlRow; SLOT_COUNT],
}

impl Default for ControlSurfaceState {
    fn default() -> Self {
        Self {
            user_players: DEFAULT_USER_PLAYERS,
            rows: std::array::from_fn(|i| ControlRow::for_slot(SlotIndex(i))),
        }
    }
}

impl ControlSurfaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON preset and snaps every value onto its control.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut state: Self = serde_json::from_str(text)?;
        if state.user_players > SLOT_COUNT {
            return Err(MetronomeError::out_of_range(
                "user players",
                state.user_players as i64,
                0,
                SLOT_COUNT as i64,
            ));
        }
        for row in &mut state.rows {
            row.normalise();
        }
        Ok(state)
    }

    /// Reads a JSON preset from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| MetronomeError::Serialize(err.to_string()))
    }

    pub fn row(&self, slot: SlotIndex) -> &ControlRow {
        &self.rows[slot.get()]
    }

    pub fn set_user_players(&mut self, count: usize) -> Result<()> {
        if count > SLOT_COUNT {
            return Err(MetronomeError::out_of_range(
                "user players",
                count as i64,
                0,
                SLOT_COUNT as i64,
            ));
        }
        self.user_players = count;
        Ok(())
    }

    pub fn set_midi_channel(&mut self, slot: SlotIndex, channel: u8) {
        self.rows[slot.get()].midi_channel = channel.clamp(MIDI_CHANNEL_MIN, MIDI_CHANNEL_MAX);
    }

    pub fn set_volume(&mut self, slot: SlotIndex, value: f64) {
        self.rows[slot.get()].volume = VOLUME_RANGE.snap(value);
    }

    pub fn set_delay(&mut self, slot: SlotIndex, value: f64) {
        self.rows[slot.get()].delay = DELAY_RANGE.snap(value);
    }

    pub fn set_motor_noise_std(&mut self, slot: SlotIndex, value: f64) {
        self.rows[slot.get()].motor_noise_std = MOTOR_NOISE_RANGE.snap(value);
    }

    pub fn set_time_keeper_noise_std(&mut self, slot: SlotIndex, value: f64) {
        self.rows[slot.get()].time_keeper_noise_std = TIME_KEEPER_NOISE_RANGE.snap(value);
    }

    pub fn set_alphas(&mut self, slot: SlotIndex, values: [f64; COUPLING_COUNT]) {
        self.rows[slot.get()].alphas = values.map(|v| COUPLING_RANGE.snap(v));
    }

    pub fn set_betas(&mut self, slot: SlotIndex, values: [f64; COUPLING_COUNT]) {
        self.rows[slot.get()].betas = values.map(|v| COUPLING_RANGE.snap(v));
    }
}

impl ControlSurface for ControlSurfaceState {
    fn active_user_count(&self) -> usize {
        self.user_players
    }

    fn midi_channel(&self, slot: SlotIndex) -> u8 {
        self.row(slot).midi_channel
    }

    fn volume(&self, slot: SlotIndex) -> f64 {
        self.row(slot).volume
    }

    fn delay(&self, slot: SlotIndex) -> f64 {
        self.row(slot).delay
    }

    fn motor_noise_std(&self, slot: SlotIndex) -> f64 {
        self.row(slot).motor_noise_std
    }

    fn time_keeper_noise_std(&self, slot: SlotIndex) -> f64 {
        self.row(slot).time_keeper_noise_std
    }

    fn alphas(&self, slot: SlotIndex) -> [f64; COUPLING_COUNT] {
        self.row(slot).alphas
    }

    fn betas(&self, slot: SlotIndex) -> [f64; COUPLING_COUNT] {
        self.row(slot).betas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    #[test]
    fn defaults_match_fresh_editor() {
        let state = ControlSurfaceState::new();
        assert_eq!(state.active_user_count(), 1);
        for i in 0..SLOT_COUNT {
            assert_eq!(state.midi_channel(slot(i)), i as u8 + 1);
            assert_eq!(state.volume(slot(i)), 0.0);
        }
    }

    #[test]
    fn setters_clamp_and_snap() {
        let mut state = ControlSurfaceState::new();
        state.set_midi_channel(slot(0), 0);
        state.set_volume(slot(0), 0.756);
        state.set_delay(slot(1), 250.0);
        state.set_alphas(slot(2), [0.123, -1.0, 2.0, 0.5]);

        assert_eq!(state.midi_channel(slot(0)), 1);
        assert_eq!(state.volume(slot(0)), 0.76);
        assert_eq!(state.delay(slot(1)), 200.0);
        assert_eq!(state.alphas(slot(2)), [0.12, 0.0, 1.0, 0.5]);
        assert!(state.set_user_players(5).is_err());
    }

    #[test]
    fn presets_fill_missing_fields_with_defaults() {
        let json = r#"{
            "user_players": 2,
            "rows": [
                { "midi_channel": 9, "volume": 0.5 },
                { "midi_channel": 2 },
                { "midi_channel": 3, "delay": 12.2 },
                { "midi_channel": 40 }
            ]
        }"#;
        let state = ControlSurfaceState::from_json(json).unwrap();
        assert_eq!(state.active_user_count(), 2);
        assert_eq!(state.midi_channel(slot(0)), 9);
        assert_eq!(state.delay(slot(2)), 12.0);
        assert_eq!(state.midi_channel(slot(3)), MIDI_CHANNEL_MAX);

        let empty = ControlSurfaceState::from_json("{}").unwrap();
        assert_eq!(empty, ControlSurfaceState::default());
    }

    #[test]
    fn malformed_presets_are_config_errors() {
        let err = ControlSurfaceState::from_json("{ not json").unwrap_err();
        assert!(matches!(err, MetronomeError::Config(_)));
    }

    #[test]
    fn preset_json_survives_a_save_and_reload() {
        let mut state = ControlSurfaceState::new();
        state.set_betas(slot(3), [0.5, 0.6, 0.7, 0.8]);
        let json = state.to_json().unwrap();
        assert_eq!(ControlSurfaceState::from_json(&json).unwrap(), state);
    }
}
