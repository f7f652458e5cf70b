use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::EditorConfig;
use crate::control::ControlSurface;
use crate::{csv, EnsembleSnapshot, EnsembleStore, ParameterAggregator, Result};

/// Discrete triggers raised by the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The "number of user players" selection changed.
    PlayerCountChanged(usize),
    /// Pull every control value into the ensemble.
    CommitRequested,
    /// Write the ensemble as it currently stands. Does not commit first.
    ExportRequested(PathBuf),
    /// Replace ensemble slots from a previously exported file.
    ImportRequested(PathBuf),
}

/// Owns the ensemble and decides when control values are aggregated and
/// when the result is serialised.
///
/// All calls happen on the editor's control thread. Anything that needs the
/// ensemble from another context takes a [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct EditorCoordinator<S: ControlSurface> {
    surface: S,
    store: EnsembleStore,
    aggregator: ParameterAggregator,
    status: String,
}

impl<S: ControlSurface> EditorCoordinator<S> {
    /// Opens the editor with the default single user player.
    pub fn new(surface: S) -> Self {
        tracing::debug!("editor opened");
        Self {
            surface,
            store: EnsembleStore::new(),
            aggregator: ParameterAggregator::new(),
            status: String::new(),
        }
    }

    /// Opens the editor with the configured player count.
    pub fn with_config(surface: S, config: &EditorConfig) -> Result<Self> {
        let mut editor = Self::new(surface);
        editor
            .store
            .set_active_user_count(config.initial_user_players)?;
        Ok(editor)
    }

    pub fn handle(&mut self, event: EditorEvent) -> Result<()> {
        match event {
            EditorEvent::PlayerCountChanged(count) => self.player_count_changed(count),
            EditorEvent::CommitRequested => self.commit(),
            EditorEvent::ExportRequested(path) => self.export_to_path(&path),
            EditorEvent::ImportRequested(path) => self.import_from_path(&path).map(|_| ()),
        }
    }

    /// Re-derives the user flags. Numeric fields are left alone until the
    /// next commit.
    pub fn player_count_changed(&mut self, count: usize) -> Result<()> {
        self.store.set_active_user_count(count)?;
        tracing::info!(user_players = count, "player count changed");
        Ok(())
    }

    /// Raises a player count change from the surface's current selection.
    pub fn sync_player_count(&mut self) -> Result<()> {
        let count = self.surface.active_user_count();
        self.handle(EditorEvent::PlayerCountChanged(count))
    }

    /// Aggregates all four rows from the control surface into the ensemble.
    pub fn commit(&mut self) -> Result<()> {
        self.aggregator.collect(&self.surface, &mut self.store)?;
        self.set_status("Players updated");
        Ok(())
    }

    /// Writes the current ensemble into `writer`.
    pub fn export_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        csv::write_to(writer, self.store.records())
    }

    /// Writes the current ensemble to `path`, replacing any existing file.
    pub fn export_to_path(&mut self, path: &Path) -> Result<()> {
        match csv::export_to_path(path, self.store.records()) {
            Ok(()) => {
                self.set_status(format!("Saved player parameters to {}", path.display()));
                Ok(())
            }
            Err(err) => {
                tracing::error!(?path, %err, "export failed");
                self.set_status(format!("Export failed: {err}"));
                Err(err)
            }
        }
    }

    /// Loads a previously exported file into the ensemble. The control
    /// surface is not touched, so the next commit overwrites imported values.
    pub fn import_from_path(&mut self, path: &Path) -> Result<usize> {
        match csv::import_from_path(&mut self.store, path) {
            Ok(rows) => {
                self.set_status(format!("Loaded {rows} players from {}", path.display()));
                Ok(rows)
            }
            Err(err) => {
                tracing::error!(?path, %err, "import failed");
                self.set_status(format!("Import failed: {err}"));
                Err(err)
            }
        }
    }

    /// Host hook for persisting plugin state. Nothing is persisted yet.
    pub fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Host hook for restoring plugin state. Accepts and ignores any data.
    pub fn load_state(&mut self, data: &[u8]) {
        tracing::debug!(bytes = data.len(), "ignoring persisted host state");
    }

    pub fn snapshot(&self) -> EnsembleSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &EnsembleStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Last status message shown to the user.
    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        tracing::info!(status = %self.status);
    }
}

impl<S: ControlSurface> Drop for EditorCoordinator<S> {
    fn drop(&mut self) {
        tracing::debug!("editor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlSurfaceState;
    use crate::player::SlotIndex;
    use crate::MetronomeError;

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    fn scenario_surface() -> ControlSurfaceState {
        let mut surface = ControlSurfaceState::new();
        surface.set_midi_channel(slot(0), 1);
        surface.set_volume(slot(0), 0.5);
        surface.set_midi_channel(slot(1), 2);
        surface.set_volume(slot(1), 0.75);
        surface.set_delay(slot(1), 10.0);
        surface.set_motor_noise_std(slot(1), 1.0);
        surface.set_time_keeper_noise_std(slot(1), 2.0);
        surface.set_alphas(slot(1), [0.1, 0.2, 0.3, 0.4]);
        surface.set_betas(slot(1), [0.5, 0.6, 0.7, 0.8]);
        surface
    }

    fn exported(editor: &EditorCoordinator<ControlSurfaceState>) -> String {
        let mut sink = Vec::new();
        editor.export_to(&mut sink).unwrap();
        String::from_utf8(sink).unwrap()
    }

    #[test]
    fn commit_then_export_produces_expected_lines() {
        let mut editor = EditorCoordinator::new(scenario_surface());
        let flags: Vec<(u32, bool)> = editor
            .store()
            .records()
            .iter()
            .map(|r| (r.id, r.is_user))
            .collect();
        assert_eq!(flags, vec![(1, true), (2, false), (3, false), (4, false)]);

        editor.handle(EditorEvent::CommitRequested).unwrap();
        let text = exported(&editor);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "1,1,1,0.5,,,,,,,,,,");
        assert_eq!(lines[2], "2,0,2,0.75,10,1,2,0.1,0.5,0.2,0.6,0.3,0.7,0.4,0.8");
        assert_eq!(editor.status(), "Players updated");
    }

    #[test]
    fn export_does_not_commit_implicitly() {
        let editor = EditorCoordinator::new(scenario_surface());
        let text = exported(&editor);
        assert!(text.contains("\n2,0,2,0,0,0,0,0,0,0,0,0,0,0,0\n"), "{text}");
    }

    #[test]
    fn player_count_change_only_touches_user_flags() {
        let mut editor = EditorCoordinator::new(scenario_surface());
        editor.commit().unwrap();
        let before = *editor.store().slot(1).unwrap();

        editor.handle(EditorEvent::PlayerCountChanged(3)).unwrap();
        let after = *editor.store().slot(1).unwrap();
        assert!(after.is_user);
        assert_eq!(after.delay, before.delay);
        assert_eq!(after.alphas, before.alphas);

        editor.surface_mut().set_volume(slot(1), 0.1);
        assert_eq!(editor.store().slot(1).unwrap().volume, 0.75);
    }

    #[test]
    fn invalid_player_count_is_fatal() {
        let mut editor = EditorCoordinator::new(ControlSurfaceState::new());
        let err = editor
            .handle(EditorEvent::PlayerCountChanged(5))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(editor.store().active_user_count(), 1);
    }

    #[test]
    fn export_and_import_through_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("player_parameters.csv");

        let mut editor = EditorCoordinator::new(scenario_surface());
        editor.commit().unwrap();
        editor
            .handle(EditorEvent::ExportRequested(path.clone()))
            .unwrap();
        assert!(editor.status().starts_with("Saved player parameters"));

        let mut other = EditorCoordinator::new(ControlSurfaceState::new());
        other.player_count_changed(0).unwrap();
        other.handle(EditorEvent::ImportRequested(path)).unwrap();
        assert_eq!(other.store().active_user_count(), 1);
        assert_eq!(other.store().slot(1).unwrap(), editor.store().slot(1).unwrap());
    }

    #[test]
    fn failed_export_is_reported_and_store_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nope").join("out.csv");
        let mut editor = EditorCoordinator::new(scenario_surface());
        let before = editor.store().clone();

        let err = editor.export_to_path(&path).unwrap_err();
        assert!(matches!(err, MetronomeError::Io(_)));
        assert!(!err.is_fatal());
        assert!(editor.status().starts_with("Export failed"));
        assert_eq!(editor.store(), &before);
    }

    #[test]
    fn failed_import_is_reported_and_store_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.csv");
        std::fs::write(&path, format!("{}\n2,0,2\n", csv::header())).unwrap();

        let mut editor = EditorCoordinator::new(scenario_surface());
        editor.commit().unwrap();
        let before = editor.store().clone();

        let err = editor.import_from_path(&path).unwrap_err();
        assert!(matches!(err, MetronomeError::Format { line: 2, .. }));
        assert_eq!(editor.store(), &before);
        assert!(editor.status().starts_with("Import failed"));
    }

    #[test]
    fn host_state_hooks_are_inert() {
        let mut editor = EditorCoordinator::new(scenario_surface());
        editor.commit().unwrap();
        let before = editor.store().clone();

        assert!(editor.save_state().is_empty());
        editor.load_state(b"anything at all");
        assert_eq!(editor.store(), &before);
    }

    #[test]
    fn player_count_follows_surface_selection() {
        let mut surface = scenario_surface();
        surface.set_user_players(4).unwrap();
        let mut editor = EditorCoordinator::new(surface);

        editor.sync_player_count().unwrap();
        assert_eq!(editor.store().active_user_count(), 4);
        assert!(editor.store().records().iter().all(|r| r.is_user));
    }

    #[test]
    fn configured_player_count_applies_on_open() {
        let config = EditorConfig {
            initial_user_players: 2,
        };
        let editor = EditorCoordinator::with_config(ControlSurfaceState::new(), &config).unwrap();
        assert_eq!(editor.snapshot().active_user_count(), 2);
    }
}
