use std::sync::Arc;

use crate::player::{PlayerRecord, SlotIndex, SLOT_COUNT};
use crate::{MetronomeError, Result};

/// Player count selected when the editor opens.
pub const DEFAULT_USER_PLAYERS: usize = 1;

/// Fixed set of four player slots plus the number of leading slots that are
/// played live.
///
/// Every slot always holds a record whose id is its position + 1. Slots below
/// `active_user_count` are user players, the remaining ones are modelled.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleStore {
    slots: [PlayerRecord; SLOT_COUNT],
    active_user_count: usize,
}

impl Default for EnsembleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleStore {
    /// Creates a store with the default single user player.
    pub fn new() -> Self {
        let mut store = Self {
            slots: std::array::from_fn(|i| PlayerRecord::placeholder(SlotIndex(i))),
            active_user_count: 0,
        };
        store.apply_user_flags(DEFAULT_USER_PLAYERS);
        store
    }

    /// Creates a store with an explicit initial player count.
    pub fn with_active_user_count(count: usize) -> Result<Self> {
        let mut store = Self::new();
        store.set_active_user_count(count)?;
        Ok(store)
    }

    pub fn active_user_count(&self) -> usize {
        self.active_user_count
    }

    /// Marks the first `count` slots as user players and the rest as modelled.
    /// Only the `is_user` flags change; calling it again with the same count
    /// leaves the store untouched.
    pub fn set_active_user_count(&mut self, count: usize) -> Result<()> {
        if count > SLOT_COUNT {
            return Err(MetronomeError::out_of_range(
                "active user count",
                count as i64,
                0,
                SLOT_COUNT as i64,
            ));
        }
        self.apply_user_flags(count);
        Ok(())
    }

    /// Returns the record in slot `index`.
    pub fn slot(&self, index: usize) -> Result<&PlayerRecord> {
        let slot = SlotIndex::new(index)?;
        Ok(self.get(slot))
    }

    pub fn get(&self, slot: SlotIndex) -> &PlayerRecord {
        &self.slots[slot.get()]
    }

    /// Whether `slot` is currently played live.
    pub fn is_user(&self, slot: SlotIndex) -> bool {
        slot.get() < self.active_user_count
    }

    /// Overwrites slot `index`. The record must carry the slot's player id.
    pub fn replace_slot(&mut self, index: usize, record: PlayerRecord) -> Result<()> {
        let slot = SlotIndex::new(index)?;
        check_record_id(slot, &record)?;
        self.slots[slot.get()] = record;
        Ok(())
    }

    /// Overwrites every slot in one step. Nothing is written unless all
    /// records carry the id of the slot they land in.
    pub fn replace_all(&mut self, records: [PlayerRecord; SLOT_COUNT]) -> Result<()> {
        for (slot, record) in SlotIndex::all().zip(records.iter()) {
            check_record_id(slot, record)?;
        }
        self.slots = records;
        Ok(())
    }

    pub fn records(&self) -> &[PlayerRecord; SLOT_COUNT] {
        &self.slots
    }

    /// Pretty-printed JSON array of all four records.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.slots)
            .map_err(|err| MetronomeError::Serialize(err.to_string()))
    }

    /// Copies the current state into an immutable value that can be handed
    /// to another thread.
    pub fn snapshot(&self) -> EnsembleSnapshot {
        EnsembleSnapshot {
            records: Arc::new(self.slots),
            active_user_count: self.active_user_count,
        }
    }

    fn apply_user_flags(&mut self, count: usize) {
        self.active_user_count = count;
        for (index, record) in self.slots.iter_mut().enumerate() {
            record.is_user = index < count;
        }
    }
}

fn check_record_id(slot: SlotIndex, record: &PlayerRecord) -> Result<()> {
    if record.id == slot.player_id() {
        Ok(())
    } else {
        let id = i64::from(slot.player_id());
        Err(MetronomeError::out_of_range(
            "player id",
            i64::from(record.id),
            id,
            id,
        ))
    }
}

/// Read-only copy of an [`EnsembleStore`] taken at a single point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleSnapshot {
    records: Arc<[PlayerRecord; SLOT_COUNT]>,
    active_user_count: usize,
}

impl EnsembleSnapshot {
    pub fn records(&self) -> &[PlayerRecord; SLOT_COUNT] {
        &self.records
    }

    pub fn active_user_count(&self) -> usize {
        self.active_user_count
    }
}
