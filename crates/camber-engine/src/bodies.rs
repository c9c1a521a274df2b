//! The transient body map a rebuild session maintains.
//!
//! Bodies are keyed by the feature id that introduced them; the kernel handle
//! is an opaque integer owned by the current rebuild session only. Insertion
//! order is preserved — it drives the fixed color palette cycle, default
//! names, and every deterministic iteration over bodies.

use camber_kernel::{BodyId, PlaneFrame};
use uuid::Uuid;

/// Fixed palette cycled by body insertion order.
pub const BODY_PALETTE: [&str; 6] = [
    "#4c7dd0", "#d0884c", "#5cab7d", "#c95c5c", "#8e6cc0", "#b8a23e",
];

/// Outline of one profile ring, in its contribution's plane coordinates.
#[derive(Debug, Clone)]
pub struct RingOutline {
    pub polygon: Vec<(f64, f64)>,
    pub is_hole: bool,
}

/// Sketch-loop metadata contributed to a body by one feature: the extrude or
/// revolve that created it, or a cut that punched it. The reference index
/// builder attributes faces and edges to contributions.
#[derive(Debug, Clone)]
pub struct LoopContribution {
    pub feature: Uuid,
    pub plane: PlaneFrame,
    pub rings: Vec<RingOutline>,
    pub revolved: bool,
}

/// One body in the map.
#[derive(Debug, Clone)]
pub struct BodyEntry {
    pub handle: BodyId,
    pub name: String,
    pub color: String,
    pub source_feature: Uuid,
    pub contributions: Vec<LoopContribution>,
}

/// Insertion-ordered body map.
#[derive(Debug, Default)]
pub struct BodyMap {
    entries: Vec<(Uuid, BodyEntry)>,
    /// Total bodies ever inserted; drives `Body{n}` names and palette cycling.
    inserted: usize,
}

impl BodyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Uuid, &BodyEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    pub fn get(&self, key: Uuid) -> Option<&BodyEntry> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, key: Uuid) -> Option<&mut BodyEntry> {
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, e)| e)
    }

    /// Find a body either keyed by this feature or created by it. Shallow
    /// face/edge references name the source feature, which can differ from
    /// the surviving key after merges.
    pub fn find_for_feature(&self, feature: Uuid) -> Option<(Uuid, &BodyEntry)> {
        self.iter()
            .find(|(k, e)| *k == feature || e.source_feature == feature)
    }

    /// Insert a new standalone body, assigning default name and palette color
    /// where none was requested.
    pub fn insert_new(
        &mut self,
        key: Uuid,
        handle: BodyId,
        name: Option<String>,
        color: Option<String>,
        contribution: LoopContribution,
    ) {
        let n = self.inserted;
        self.inserted += 1;
        let entry = BodyEntry {
            handle,
            name: name.unwrap_or_else(|| format!("Body{}", n + 1)),
            color: color.unwrap_or_else(|| BODY_PALETTE[n % BODY_PALETTE.len()].to_string()),
            source_feature: key,
            contributions: vec![contribution],
        };
        self.entries.push((key, entry));
    }

    /// Replace the handle of an existing entry (after a boolean), keeping its
    /// key, name, and color.
    pub fn replace_handle(&mut self, key: Uuid, handle: BodyId) {
        if let Some(entry) = self.get_mut(key) {
            entry.handle = handle;
        }
    }

    pub fn remove(&mut self, key: Uuid) -> Option<BodyEntry> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camber_kernel::BodyId;

    fn contribution(feature: Uuid) -> LoopContribution {
        LoopContribution {
            feature,
            plane: PlaneFrame::xy(),
            rings: Vec::new(),
            revolved: false,
        }
    }

    #[test]
    fn default_names_and_palette_cycle_by_insertion() {
        let mut map = BodyMap::new();
        for i in 0..8 {
            let key = Uuid::new_v4();
            map.insert_new(key, BodyId(i), None, None, contribution(key));
        }
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries[0].1.name, "Body1");
        assert_eq!(entries[7].1.name, "Body8");
        assert_eq!(entries[6].1.color, BODY_PALETTE[0]);
        assert_eq!(entries[7].1.color, BODY_PALETTE[1]);
    }

    #[test]
    fn removal_does_not_reuse_serial_numbers() {
        let mut map = BodyMap::new();
        let a = Uuid::new_v4();
        map.insert_new(a, BodyId(1), None, None, contribution(a));
        map.remove(a);
        let b = Uuid::new_v4();
        map.insert_new(b, BodyId(2), None, None, contribution(b));
        assert_eq!(map.get(b).unwrap().name, "Body2");
    }

    #[test]
    fn find_for_feature_matches_source() {
        let mut map = BodyMap::new();
        let key = Uuid::new_v4();
        map.insert_new(key, BodyId(1), None, None, contribution(key));
        assert!(map.find_for_feature(key).is_some());
        assert!(map.find_for_feature(Uuid::new_v4()).is_none());
    }
}
