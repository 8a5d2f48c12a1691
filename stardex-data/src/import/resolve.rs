//! Identity resolution for sectors and names.
//!
//! One cache lives for exactly one importer run and is owned by it; the
//! maps are not safe to share across runs. Sectors are identified by
//! (name, grid cell): the same name recurring in different cells is
//! expected and must never merge, so each name keys an append-only list of
//! per-cell slots queried by exact cell match.
#![forbid(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use stardex_core::{ClassifiedName, NameClassifier, SystemRecord};

use crate::store::{StoreError, SystemStore};

/// A system row staged for the next block flush.
pub(super) struct PendingRow {
    pub(super) record: SystemRecord,
    pub(super) name: ClassifiedName,
    pub(super) grid_id: u16,
}

/// One named spatial partition, unique per (name, grid cell).
pub(super) struct Sector {
    /// Assigned id; negative until resolved, then stable for the run.
    pub(super) id: i64,
    pub(super) grid_id: u16,
    pub(super) name: String,
    /// Rows awaiting the next block flush.
    pub(super) pending: Vec<PendingRow>,
    /// Set when the sector still needs its insert.
    pub(super) dirty: bool,
}

/// Run-scoped deduplication cache for sectors.
pub(super) struct SectorCache {
    slots: Vec<Sector>,
    by_name: HashMap<String, Vec<usize>>,
    by_id: HashMap<i64, usize>,
    next_sector_id: i64,
    latest: Option<DateTime<Utc>>,
}

impl SectorCache {
    pub(super) fn new(next_sector_id: i64) -> Self {
        Self {
            slots: Vec::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_sector_id,
            latest: None,
        }
    }

    /// Resolve one record into its sector and stage the row for writing.
    ///
    /// Classifies the name, finds or appends the sector slot, assigns the
    /// sector id (optimistically when the tables are presumed empty,
    /// otherwise falling back to a point lookup) and enqueues the pending
    /// row. Returns `Ok(false)` when the record was skipped; only store
    /// failures abort the block.
    pub(super) fn resolve(
        &mut self,
        store: &SystemStore,
        classifier: &dyn NameClassifier,
        record: SystemRecord,
        grid_id: u16,
        presume_empty: bool,
    ) -> Result<bool, StoreError> {
        let name = match classifier.classify(&record.name) {
            Ok(classified) => classified,
            Err(err) => {
                warn!(
                    "skipping record {} ({:?}): {err}",
                    record.external_id, record.name
                );
                return Ok(false);
            }
        };

        if let Some(date) = record.date
            && self.latest.is_none_or(|seen| date > seen)
        {
            self.latest = Some(date);
        }

        let slot = self.slot_for(&name.sector, grid_id);
        if self.slots[slot].id < 0 {
            let existing = if presume_empty {
                None
            } else {
                store.find_sector_id(&self.slots[slot].name, grid_id)?
            };
            let sector = &mut self.slots[slot];
            match existing {
                Some(id) => sector.id = id,
                None => {
                    sector.id = self.next_sector_id;
                    self.next_sector_id += 1;
                    sector.dirty = true;
                }
            }
            self.by_id.insert(sector.id, slot);
        }

        self.slots[slot].pending.push(PendingRow {
            record,
            name,
            grid_id,
        });
        Ok(true)
    }

    /// Find the slot for (name, grid cell), appending a fresh unresolved
    /// sector when no cell in the name's list matches.
    fn slot_for(&mut self, sector_name: &str, grid_id: u16) -> usize {
        if let Some(slots) = self.by_name.get(sector_name) {
            for &slot in slots {
                if self.slots[slot].grid_id == grid_id {
                    return slot;
                }
            }
        }
        let slot = self.slots.len();
        self.slots.push(Sector {
            id: -1,
            grid_id,
            name: sector_name.to_owned(),
            pending: Vec::new(),
            dirty: false,
        });
        self.by_name
            .entry(sector_name.to_owned())
            .or_default()
            .push(slot);
        slot
    }

    /// Ids of every resolved sector, in ascending order. Id assignment
    /// happens before any row is staged, so this covers all sectors the
    /// write phase can need.
    pub(super) fn ordered_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The sector carrying a resolved id.
    pub(super) fn sector_by_id_mut(&mut self, id: i64) -> Option<&mut Sector> {
        self.by_id
            .get(&id)
            .copied()
            .map(move |slot| &mut self.slots[slot])
    }

    /// Latest timestamp among resolved records.
    pub(super) const fn latest_date(&self) -> Option<DateTime<Utc>> {
        self.latest
    }
}
