//! Saved cursor positions per template slot
//!
//! Each slot (one card template of a template set) keeps a saved
//! selection and scroll value for each pane, plus a seven-entry history
//! of recent edit locations. The style pane is shared by every slot of a
//! set, so its data always lives under slot 0.
//!
//! Every save is written through to a [`ProfileStore`], keyed by the
//! template-set name:
//!
//! ```text
//! { "<set>": { "cursor_positions": { "0": { "front_button": {...}, ... } },
//!              "timestamp": 1712345678.5 } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::host::{Pane, Selection};

/// Number of entries in each position history
pub const HISTORY_LEN: usize = 7;

/// Offsets this close to an existing history entry update it in place
pub const HISTORY_TOLERANCE: usize = 400;

/// One remembered location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(default)]
    pub cursor_position: usize,
    #[serde(default)]
    pub cursor_position_end: usize,
    #[serde(default)]
    pub vertical_scroll: i64,
}

impl PositionRecord {
    pub fn new(selection: Selection, vertical_scroll: i64) -> Self {
        Self {
            cursor_position: selection.start(),
            cursor_position_end: selection.end(),
            vertical_scroll,
        }
    }

    pub fn selection(&self) -> Selection {
        Selection::new(self.cursor_position, self.cursor_position_end)
    }
}

/// Saved state of one pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    #[serde(flatten)]
    pub current: PositionRecord,
    #[serde(default = "empty_history")]
    pub position_history: Vec<PositionRecord>,
}

fn empty_history() -> Vec<PositionRecord> {
    vec![PositionRecord::default(); HISTORY_LEN]
}

impl Default for SavedPosition {
    fn default() -> Self {
        Self {
            current: PositionRecord::default(),
            position_history: empty_history(),
        }
    }
}

impl SavedPosition {
    fn normalize(&mut self) {
        self.position_history
            .resize(HISTORY_LEN, PositionRecord::default());
    }

    /// Record a location in the history
    ///
    /// An entry within [`HISTORY_TOLERANCE`] of the new offset moves to
    /// the front and is overwritten; otherwise the oldest entry is
    /// dropped.
    pub fn push_history(&mut self, record: PositionRecord) {
        let near = self
            .position_history
            .iter()
            .position(|e| e.cursor_position.abs_diff(record.cursor_position) <= HISTORY_TOLERANCE);
        match near {
            Some(idx) => {
                self.position_history.remove(idx);
            }
            None => {
                self.position_history.pop();
            }
        }
        self.position_history.insert(0, record);
    }
}

/// Saved state of every pane of one slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPositions {
    #[serde(default)]
    pub front_button: SavedPosition,
    #[serde(default)]
    pub back_button: SavedPosition,
    #[serde(default)]
    pub style_button: SavedPosition,
}

impl SlotPositions {
    pub fn pane(&self, pane: Pane) -> &SavedPosition {
        match pane {
            Pane::Front => &self.front_button,
            Pane::Back => &self.back_button,
            Pane::Style => &self.style_button,
        }
    }

    pub fn pane_mut(&mut self, pane: Pane) -> &mut SavedPosition {
        match pane {
            Pane::Front => &mut self.front_button,
            Pane::Back => &mut self.back_button,
            Pane::Style => &mut self.style_button,
        }
    }

    fn normalize(&mut self) {
        for pane in Pane::ALL {
            self.pane_mut(pane).normalize();
        }
    }
}

/// Durable per-profile storage of cursor records
pub trait ProfileStore {
    /// Stored record of a template set, if any
    fn load(&self, set_name: &str) -> Result<Option<Value>>;

    /// Replace the stored record of a template set
    fn store(&mut self, set_name: &str, value: Value) -> Result<()>;
}

/// Keeps records in memory only
#[derive(Debug, Default, Clone)]
pub struct MemoryProfileStore {
    pub entries: HashMap<String, Value>,
    /// Number of `store` calls
    pub writes: usize,
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, set_name: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(set_name).cloned())
    }

    fn store(&mut self, set_name: &str, value: Value) -> Result<()> {
        self.entries.insert(set_name.to_string(), value);
        self.writes += 1;
        Ok(())
    }
}

/// Keeps every template set's record in one JSON object file
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/cardcode/cursor_positions.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("cardcode").join("cursor_positions.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&contents)? {
            Value::Object(map) => Ok(map),
            _ => {
                warn!(path = %self.path.display(), "cursor file is not an object, starting over");
                Ok(Map::new())
            }
        }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, set_name: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(set_name))
    }

    fn store(&mut self, set_name: &str, value: Value) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(set_name.to_string(), value);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(all))?)?;
        Ok(())
    }
}

/// Cursor positions of one template set
pub struct CursorStore {
    set_name: String,
    slots: BTreeMap<usize, SlotPositions>,
    /// Position in the history walk, 0 is the newest entry
    history_index: usize,
    store: Box<dyn ProfileStore>,
}

impl CursorStore {
    /// Load the record of `set_name`, or start with `slot_count` empty slots
    pub fn open(set_name: &str, slot_count: usize, store: Box<dyn ProfileStore>) -> Self {
        let loaded = match store.load(set_name) {
            Ok(Some(value)) => parse_record(&value),
            Ok(None) => None,
            Err(e) => {
                warn!(set = set_name, error = %e, "failed to load cursor positions");
                None
            }
        };
        let slots = loaded.unwrap_or_else(|| {
            (0..slot_count)
                .map(|i| (i, SlotPositions::default()))
                .collect()
        });
        debug!(set = set_name, slots = slots.len(), "cursor store opened");
        Self {
            set_name: set_name.to_string(),
            slots,
            history_index: 0,
            store,
        }
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Option<&SlotPositions> {
        self.slots.get(&slot)
    }

    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Slot that physically holds `pane` data of `slot`
    fn storage_slot(slot: usize, pane: Pane) -> usize {
        if pane.is_style() {
            0
        } else {
            slot
        }
    }

    fn entry(&mut self, slot: usize, pane: Pane) -> &mut SavedPosition {
        self.slots
            .entry(Self::storage_slot(slot, pane))
            .or_default()
            .pane_mut(pane)
    }

    /// Saved state for `slot`/`pane`, if present
    pub fn get(&self, slot: usize, pane: Pane) -> Option<&SavedPosition> {
        self.slots
            .get(&Self::storage_slot(slot, pane))
            .map(|s| s.pane(pane))
    }

    /// Remember the selection and scroll of the active pane
    ///
    /// Nothing is recorded unless the editing widget has focus. Returns
    /// whether a record was written.
    pub fn save(
        &mut self,
        slot: usize,
        pane: Pane,
        selection: Selection,
        vertical_scroll: i64,
        focused: bool,
    ) -> Result<bool> {
        if !focused {
            return Ok(false);
        }
        self.entry(slot, pane).current = PositionRecord::new(selection, vertical_scroll);
        self.persist()?;
        Ok(true)
    }

    /// Push the current location into the pane's history
    pub fn save_unique(
        &mut self,
        slot: usize,
        pane: Pane,
        selection: Selection,
        vertical_scroll: i64,
        focused: bool,
    ) -> bool {
        if !focused {
            return false;
        }
        self.entry(slot, pane)
            .push_history(PositionRecord::new(selection, vertical_scroll));
        true
    }

    /// Saved location of `slot`/`pane`; creates an empty entry if needed
    /// and restarts the history walk
    pub fn restore(&mut self, slot: usize, pane: Pane) -> PositionRecord {
        self.history_index = 0;
        self.entry(slot, pane).current
    }

    /// Restart the history walk at the newest entry
    pub fn reset_history_walk(&mut self) {
        self.history_index = 0;
    }

    /// Step to an older history entry, stopping at the oldest
    pub fn history_back(&mut self, slot: usize, pane: Pane) -> PositionRecord {
        self.history_index = (self.history_index + 1).min(HISTORY_LEN - 1);
        self.history_entry(slot, pane)
    }

    /// Step to a newer history entry, stopping at the newest
    pub fn history_forward(&mut self, slot: usize, pane: Pane) -> PositionRecord {
        self.history_index = self.history_index.saturating_sub(1);
        self.history_entry(slot, pane)
    }

    fn history_entry(&mut self, slot: usize, pane: Pane) -> PositionRecord {
        let idx = self.history_index;
        self.entry(slot, pane)
            .position_history
            .get(idx)
            .copied()
            .unwrap_or_default()
    }

    /// Forget a removed slot and shift later slots down
    pub fn remove_slot(&mut self, removed: usize) {
        if !self.slots.contains_key(&removed) {
            return;
        }
        if removed == 0 {
            let style = self.slots[&0].style_button.clone();
            if let Some(next) = self.slots.get_mut(&1) {
                next.style_button = style;
            }
        }
        self.slots.remove(&removed);
        let later: Vec<usize> = self.slots.range(removed + 1..).map(|(&k, _)| k).collect();
        for key in later {
            if let Some(entry) = self.slots.remove(&key) {
                self.slots.insert(key - 1, entry);
            }
        }
        debug!(removed, remaining = self.slots.len(), "slot removed");
    }

    /// Append a fresh slot, returning its index
    pub fn add_slot(&mut self) -> usize {
        let index = self.slots.len();
        self.insert_slot(index);
        index
    }

    /// Insert a fresh slot at `index`, shifting later slots up
    pub fn insert_slot(&mut self, index: usize) {
        let later: Vec<usize> = self.slots.range(index..).map(|(&k, _)| k).rev().collect();
        for key in later {
            if let Some(entry) = self.slots.remove(&key) {
                self.slots.insert(key + 1, entry);
            }
        }
        self.slots.insert(index, SlotPositions::default());
        if index == 0 {
            if let Some(old_first) = self.slots.get(&1) {
                let style = old_first.style_button.clone();
                self.slots.entry(0).or_default().style_button = style;
            }
        }
    }

    /// Exchange two slots' entries; shared style data stays at slot 0
    ///
    /// Nothing changes unless both slots exist.
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b || !self.slots.contains_key(&a) || !self.slots.contains_key(&b) {
            return;
        }
        let shared_style = self.slots.get(&0).map(|s| s.style_button.clone());
        let (Some(first), Some(second)) = (self.slots.remove(&a), self.slots.remove(&b)) else {
            return;
        };
        self.slots.insert(a, second);
        self.slots.insert(b, first);
        if let Some(style) = shared_style {
            self.slots.entry(0).or_default().style_button = style;
        }
    }

    /// Write the whole set to the profile store
    pub fn persist(&mut self) -> Result<()> {
        // integer map keys serialize as strings
        let positions = serde_json::to_value(&self.slots)?;
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let record = json!({
            "cursor_positions": positions,
            "timestamp": timestamp,
        });
        self.store.store(&self.set_name, record)
    }
}

/// Decode a stored record; slot keys stored as strings become integers
fn parse_record(value: &Value) -> Option<BTreeMap<usize, SlotPositions>> {
    let positions = value.get("cursor_positions")?.as_object()?;
    let mut slots = BTreeMap::new();
    for (key, entry) in positions {
        let Ok(index) = key.trim().parse::<usize>() else {
            warn!(key = %key, "dropping cursor record with non-numeric slot");
            continue;
        };
        let mut parsed: SlotPositions = match serde_json::from_value(entry.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(slot = index, error = %e, "unreadable cursor record, using defaults");
                SlotPositions::default()
            }
        };
        parsed.normalize();
        slots.insert(index, parsed);
    }
    Some(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(slots: usize) -> CursorStore {
        CursorStore::open("Basic", slots, Box::new(MemoryProfileStore::default()))
    }

    fn at(pos: usize) -> Selection {
        Selection::cursor(pos)
    }

    #[test]
    fn test_save_requires_focus() {
        let mut cs = store(1);
        assert!(!cs.save(0, Pane::Front, at(5), 0, false).unwrap());
        assert_eq!(cs.restore(0, Pane::Front), PositionRecord::default());

        assert!(cs.save(0, Pane::Front, Selection::new(9, 3), 40, true).unwrap());
        let rec = cs.restore(0, Pane::Front);
        assert_eq!((rec.cursor_position, rec.cursor_position_end, rec.vertical_scroll), (3, 9, 40));
    }

    #[test]
    fn test_style_stored_at_slot_zero() {
        let mut cs = store(3);
        cs.save(2, Pane::Style, at(77), 0, true).unwrap();
        assert_eq!(cs.slot(0).unwrap().style_button.current.cursor_position, 77);
        assert_eq!(cs.slot(2).unwrap().style_button.current.cursor_position, 0);
        assert_eq!(cs.restore(1, Pane::Style).cursor_position, 77);
    }

    #[test]
    fn test_history_dedup_and_evict() {
        let mut cs = store(1);
        cs.save_unique(0, Pane::Front, at(100), 0, true);
        let history = &cs.get(0, Pane::Front).unwrap().position_history;
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0].cursor_position, 100);

        cs.save_unique(0, Pane::Front, at(250), 0, true);
        let history = &cs.get(0, Pane::Front).unwrap().position_history;
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0].cursor_position, 250);
        assert!(!history.iter().any(|e| e.cursor_position == 100));

        cs.save_unique(0, Pane::Front, at(10_000), 0, true);
        let history = &cs.get(0, Pane::Front).unwrap().position_history;
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0].cursor_position, 10_000);
        assert_eq!(history[1].cursor_position, 250);
    }

    #[test]
    fn test_history_walk_clamps() {
        let mut cs = store(1);
        for pos in [1000, 2000, 3000] {
            cs.save_unique(0, Pane::Back, at(pos), 0, true);
        }
        assert_eq!(cs.history_back(0, Pane::Back).cursor_position, 2000);
        assert_eq!(cs.history_back(0, Pane::Back).cursor_position, 1000);
        for _ in 0..10 {
            cs.history_back(0, Pane::Back);
        }
        assert_eq!(cs.history_index(), HISTORY_LEN - 1);

        for _ in 0..10 {
            cs.history_forward(0, Pane::Back);
        }
        assert_eq!(cs.history_index(), 0);
        assert_eq!(cs.history_forward(0, Pane::Back).cursor_position, 3000);

        cs.history_back(0, Pane::Back);
        cs.restore(0, Pane::Back);
        assert_eq!(cs.history_index(), 0);
    }

    #[test]
    fn test_remove_middle_slot() {
        let mut cs = store(3);
        for slot in 0..3 {
            cs.save(slot, Pane::Front, at(slot * 10 + 1), 0, true).unwrap();
        }
        cs.save(0, Pane::Style, at(500), 0, true).unwrap();

        cs.remove_slot(1);
        assert_eq!(cs.slot_count(), 2);
        assert_eq!(cs.get(1, Pane::Front).unwrap().current.cursor_position, 21);
        assert_eq!(cs.get(0, Pane::Front).unwrap().current.cursor_position, 1);
        assert_eq!(cs.get(0, Pane::Style).unwrap().current.cursor_position, 500);
    }

    #[test]
    fn test_remove_first_slot_keeps_style() {
        let mut cs = store(3);
        cs.save(1, Pane::Front, at(11), 0, true).unwrap();
        cs.save(0, Pane::Style, at(500), 0, true).unwrap();

        cs.remove_slot(0);
        assert_eq!(cs.slot_count(), 2);
        assert_eq!(cs.get(0, Pane::Front).unwrap().current.cursor_position, 11);
        assert_eq!(cs.get(0, Pane::Style).unwrap().current.cursor_position, 500);
    }

    #[test]
    fn test_add_and_insert_slot() {
        let mut cs = store(2);
        cs.save(1, Pane::Front, at(8), 0, true).unwrap();
        cs.save(0, Pane::Style, at(4), 0, true).unwrap();
        assert_eq!(cs.add_slot(), 2);
        assert_eq!(cs.get(2, Pane::Front).unwrap().current, PositionRecord::default());

        cs.insert_slot(0);
        assert_eq!(cs.slot_count(), 4);
        assert_eq!(cs.get(2, Pane::Front).unwrap().current.cursor_position, 8);
        assert_eq!(cs.get(0, Pane::Style).unwrap().current.cursor_position, 4);
    }

    #[test]
    fn test_swap_keeps_style_at_zero() {
        let mut cs = store(2);
        cs.save(0, Pane::Front, at(1), 0, true).unwrap();
        cs.save(1, Pane::Front, at(2), 0, true).unwrap();
        cs.save(0, Pane::Style, at(3), 0, true).unwrap();

        cs.swap_slots(0, 1);
        assert_eq!(cs.get(0, Pane::Front).unwrap().current.cursor_position, 2);
        assert_eq!(cs.get(1, Pane::Front).unwrap().current.cursor_position, 1);
        assert_eq!(cs.get(0, Pane::Style).unwrap().current.cursor_position, 3);
    }

    #[test]
    fn test_swap_with_missing_slot_is_ignored() {
        let mut cs = store(2);
        cs.save(0, Pane::Front, at(1), 0, true).unwrap();

        cs.swap_slots(0, 5);
        assert_eq!(cs.slot_count(), 2);
        assert_eq!(cs.get(0, Pane::Front).unwrap().current.cursor_position, 1);
        assert!(cs.get(5, Pane::Front).is_none());
    }

    #[test]
    fn test_write_through_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("positions.json");

        let mut cs = CursorStore::open("Cloze", 2, Box::new(JsonProfileStore::new(&path)));
        cs.save(1, Pane::Back, Selection::new(4, 12), 30, true).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["Cloze"]["timestamp"].as_f64().unwrap() > 0.0);
        assert_eq!(raw["Cloze"]["cursor_positions"]["1"]["back_button"]["cursor_position_end"], 12);

        let mut reopened = CursorStore::open("Cloze", 0, Box::new(JsonProfileStore::new(&path)));
        assert_eq!(reopened.slot_count(), 2);
        let rec = reopened.restore(1, Pane::Back);
        assert_eq!(rec.selection(), Selection::new(4, 12));
        assert_eq!(rec.vertical_scroll, 30);
    }

    #[test]
    fn test_other_sets_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let mut a = CursorStore::open("A", 1, Box::new(JsonProfileStore::new(&path)));
        let mut b = CursorStore::open("B", 1, Box::new(JsonProfileStore::new(&path)));
        a.save(0, Pane::Front, at(1), 0, true).unwrap();
        b.save(0, Pane::Front, at(2), 0, true).unwrap();

        let mut a = CursorStore::open("A", 1, Box::new(JsonProfileStore::new(&path)));
        assert_eq!(a.restore(0, Pane::Front).cursor_position, 1);
    }

    #[test]
    fn test_legacy_keys_coerced() {
        let mut mem = MemoryProfileStore::default();
        mem.entries.insert(
            "Old".to_string(),
            json!({
                "cursor_positions": {
                    " 2": { "front_button": { "cursor_position": 6, "cursor_position_end": 6, "vertical_scroll": 0 } },
                    "bogus": {},
                },
                "timestamp": 1.0,
            }),
        );
        let cs = CursorStore::open("Old", 0, Box::new(mem));
        assert_eq!(cs.slot_count(), 1);
        let saved = cs.get(2, Pane::Front).unwrap();
        assert_eq!(saved.current.cursor_position, 6);
        assert_eq!(saved.position_history.len(), HISTORY_LEN);
    }
}
