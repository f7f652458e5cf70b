//! Core library for the Adaptive Metronome editor.
//!
//! The crate holds the parameter side of the plugin editor: the per-player
//! record, the four-slot ensemble, the aggregation pass that reads controls
//! into records, and the CSV format used to export and re-import them.
//! Rendering, audio and MIDI processing live elsewhere; the editor only sees
//! them through the [`ControlSurface`] trait and the host hooks on
//! [`EditorCoordinator`].

pub mod aggregate;
pub mod config;
pub mod control;
pub mod csv;
pub mod editor;
pub mod ensemble;
pub mod error;
pub mod player;

pub use aggregate::ParameterAggregator;
pub use config::{AppConfig, EditorConfig, ExportConfig};
pub use control::{ControlRow, ControlSurface, ControlSurfaceState};
pub use editor::{EditorCoordinator, EditorEvent};
pub use ensemble::{EnsembleSnapshot, EnsembleStore, DEFAULT_USER_PLAYERS};
pub use error::{MetronomeError, Result};
pub use player::{ParamRange, PlayerRecord, SlotIndex, COUPLING_COUNT, SLOT_COUNT};
