//! Terrain layers and fixed-capacity layer groups.

use crate::error::{TerrainError, TerrainResult};
use crate::mask::{PackedLayerMask, CHANNELS};
use std::sync::Arc;
use uuid::Uuid;

/// Maximum layers blended by one group.
pub const MAX_LAYERS_PER_GROUP: usize = CHANNELS;

/// Named reference to an external material asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TerrainLayer {
    name: String,
    material: Uuid,
}

impl TerrainLayer {
    /// Creates a layer.
    #[must_use]
    pub fn new(name: impl Into<String>, material: Uuid) -> Self {
        Self {
            name: name.into(),
            material,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Material asset id.
    #[must_use]
    pub const fn material(&self) -> Uuid {
        self.material
    }
}

/// Shared handle to a layer. Identity is the allocation, not the contents.
pub type LayerRef = Arc<TerrainLayer>;

/// Index of a layer group in its container's group table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Table position.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Up to four layers blended by one mask.
///
/// Invariants: occupied slots are contiguous from slot 0, `count` equals
/// the number of occupied slots, and no layer appears twice. Slot `i`
/// is weighted by mask channel `i`.
#[derive(Clone, Debug)]
pub struct TerrainLayerGroup {
    slots: [Option<LayerRef>; MAX_LAYERS_PER_GROUP],
    count: usize,
    mask: PackedLayerMask,
}

impl TerrainLayerGroup {
    /// Creates an empty group with an opaque mask.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either mask side is 0.
    pub fn new(mask_width: u32, mask_height: u32) -> TerrainResult<Self> {
        Ok(Self::with_mask(PackedLayerMask::opaque(mask_width, mask_height)?))
    }

    /// Creates an empty group using `mask`.
    #[must_use]
    pub fn with_mask(mask: PackedLayerMask) -> Self {
        Self {
            slots: Default::default(),
            count: 0,
            mask,
        }
    }

    /// Number of occupied slots.
    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// True if no slot is occupied.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True if all slots are occupied.
    #[must_use]
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.count == MAX_LAYERS_PER_GROUP
    }

    /// Blend mask.
    #[must_use]
    pub const fn mask(&self) -> &PackedLayerMask {
        &self.mask
    }

    /// Mutable blend mask.
    pub fn mask_mut(&mut self) -> &mut PackedLayerMask {
        &mut self.mask
    }

    /// Slot contents.
    ///
    /// # Errors
    ///
    /// [`TerrainError::SlotOutOfRange`] for `index >= 4`.
    pub fn slot(&self, index: usize) -> TerrainResult<Option<&LayerRef>> {
        self.slots
            .get(index)
            .map(Option::as_ref)
            .ok_or(TerrainError::SlotOutOfRange {
                index,
                capacity: MAX_LAYERS_PER_GROUP,
            })
    }

    /// Occupied layers in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerRef> {
        self.slots.iter().flatten()
    }

    /// Slot holding `layer`, by identity.
    #[must_use]
    pub fn position(&self, layer: &LayerRef) -> Option<usize> {
        self.slots[..self.count]
            .iter()
            .position(|s| s.as_ref().is_some_and(|l| Arc::ptr_eq(l, layer)))
    }

    /// True if `layer` (by identity) is in the group.
    #[must_use]
    pub fn contains(&self, layer: &LayerRef) -> bool {
        self.position(layer).is_some()
    }

    /// Appends `layer` and returns its slot.
    ///
    /// # Errors
    ///
    /// [`TerrainError::DuplicateLayer`] or [`TerrainError::LayerGroupFull`];
    /// the group is unchanged on error.
    pub fn add_layer(&mut self, layer: LayerRef) -> TerrainResult<usize> {
        if self.contains(&layer) {
            return Err(TerrainError::DuplicateLayer {
                name: layer.name().to_owned(),
            });
        }
        if self.is_full() {
            return Err(TerrainError::LayerGroupFull {
                capacity: MAX_LAYERS_PER_GROUP,
            });
        }
        let slot = self.count;
        self.slots[slot] = Some(layer);
        self.count += 1;
        Ok(slot)
    }

    /// Removes `layer`, shifting later slots and their mask channels down.
    ///
    /// Returns false if the layer was not in the group.
    pub fn remove_layer(&mut self, layer: &LayerRef) -> bool {
        let Some(slot) = self.position(layer) else {
            return false;
        };
        self.remove_slot(slot);
        true
    }

    fn remove_slot(&mut self, slot: usize) {
        self.mask.remove_channel(slot);
        for i in slot + 1..self.count {
            self.slots[i - 1] = self.slots[i].take();
        }
        self.slots[self.count - 1] = None;
        self.count -= 1;
    }

    /// Removes layers whose mask channel has no weight anywhere, last slot
    /// first, and compacts the remaining channels. Returns the removed layers.
    pub fn prune_unused_layers(&mut self) -> Vec<LayerRef> {
        let occupation = self.mask.channel_occupation();
        let mut removed = Vec::new();
        for slot in (0..self.count).rev() {
            if occupation[slot] == 0 {
                if let Some(layer) = self.slots[slot].clone() {
                    self.remove_slot(slot);
                    removed.push(layer);
                }
            }
        }
        removed.reverse();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn layer(name: &str) -> LayerRef {
        Arc::new(TerrainLayer::new(name, Uuid::from_u128(name.len() as u128)))
    }

    #[test]
    fn test_fifth_layer_rejected_without_mutation() {
        let mut group = TerrainLayerGroup::new(4, 4).unwrap();
        let layers: Vec<_> = ["a", "b", "c", "d"].iter().map(|n| layer(n)).collect();
        for (i, l) in layers.iter().enumerate() {
            assert_eq!(group.add_layer(l.clone()).unwrap(), i);
        }
        let before: Vec<_> = group.iter().cloned().collect();

        let err = group.add_layer(layer("e")).unwrap_err();
        assert!(matches!(err, TerrainError::LayerGroupFull { capacity: 4 }));
        assert_eq!(group.len(), 4);
        let after: Vec<_> = group.iter().cloned().collect();
        assert!(before.iter().zip(&after).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn test_duplicate_rejected_by_identity() {
        let mut group = TerrainLayerGroup::new(2, 2).unwrap();
        let grass = layer("grass");
        group.add_layer(grass.clone()).unwrap();
        assert!(matches!(
            group.add_layer(grass.clone()),
            Err(TerrainError::DuplicateLayer { .. })
        ));
        // Equal contents, different allocation: a distinct layer.
        group.add_layer(layer("grass")).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_slot_bounds() {
        let group = TerrainLayerGroup::new(1, 1).unwrap();
        assert!(group.slot(3).unwrap().is_none());
        assert!(matches!(
            group.slot(4),
            Err(TerrainError::SlotOutOfRange { index: 4, capacity: 4 })
        ));
    }

    #[test]
    fn test_remove_shifts_slots_and_channels() {
        let mut group = TerrainLayerGroup::new(1, 1).unwrap();
        let (a, b, c) = (layer("a"), layer("bb"), layer("ccc"));
        for l in [&a, &b, &c] {
            group.add_layer(l.clone()).unwrap();
        }
        group
            .mask_mut()
            .set_pixel(0, 0, Vec4::new(0.2, 0.3, 0.5, 0.0))
            .unwrap();

        assert!(group.remove_layer(&b));
        assert!(!group.remove_layer(&b));
        assert_eq!(group.len(), 2);
        assert!(Arc::ptr_eq(group.slot(1).unwrap().unwrap(), &c));
        assert!(group.slot(2).unwrap().is_none());

        let w = group.mask().pixel(0, 0).unwrap();
        assert!((w.x - 0.2).abs() < 1e-4);
        assert!((w.y - 0.5).abs() < 1e-4);
        assert_eq!(w.z, 0.0);
    }

    #[test]
    fn test_remove_first_of_full_group() {
        let mut group = TerrainLayerGroup::new(1, 1).unwrap();
        let layers: Vec<_> = ["a", "bb", "ccc", "dddd"].iter().map(|n| layer(n)).collect();
        for l in &layers {
            group.add_layer(l.clone()).unwrap();
        }
        group
            .mask_mut()
            .set_pixel(0, 0, Vec4::new(0.1, 0.2, 0.3, 0.4))
            .unwrap();

        assert!(group.remove_layer(&layers[0]));
        assert_eq!(group.len(), 3);
        assert!(!group.is_full());
        assert!(Arc::ptr_eq(group.slot(2).unwrap().unwrap(), &layers[3]));
        let w = group.mask().pixel(0, 0).unwrap();
        assert!((w - Vec4::new(0.2, 0.3, 0.4, 0.0)).abs().max_element() < 1e-4);
        group.add_layer(layer("eeeee")).unwrap();
    }

    #[test]
    fn test_prune_unused() {
        let mut group = TerrainLayerGroup::new(2, 1).unwrap();
        let (a, b, c) = (layer("a"), layer("bb"), layer("ccc"));
        for l in [&a, &b, &c] {
            group.add_layer(l.clone()).unwrap();
        }
        group
            .mask_mut()
            .set_pixel(1, 0, Vec4::new(0.0, 0.0, 1.0, 0.0))
            .unwrap();

        let removed = group.prune_unused_layers();
        assert_eq!(removed.len(), 1);
        assert!(Arc::ptr_eq(&removed[0], &b));
        assert_eq!(group.len(), 2);
        assert!(Arc::ptr_eq(group.slot(1).unwrap().unwrap(), &c));
        assert_eq!(group.mask().channel_occupation(), [1, 1, 0, 0]);
    }
}
