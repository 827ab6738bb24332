use std::collections::HashMap;
use std::hash::Hash;

/// Insertion-ordered map from an opaque material identity to a dense index.
///
/// The registry owns its keys, so callers can pass ids, names or handles
/// without tying the atlas to their lifetimes. Indices are stable for the
/// lifetime of the registry.
#[derive(Debug, Clone)]
pub struct MaterialRegistry<M> {
    index_of: HashMap<M, u32>,
    materials: Vec<M>,
}

impl<M> Default for MaterialRegistry<M> {
    fn default() -> Self {
        Self {
            index_of: HashMap::new(),
            materials: Vec::new(),
        }
    }
}

impl<M: Hash + Eq + Clone> MaterialRegistry<M> {
    /// Return the dense index of `material`, assigning the next one if unseen.
    pub fn register(&mut self, material: &M) -> u32 {
        if let Some(&index) = self.index_of.get(material) {
            return index;
        }
        let index = self.materials.len() as u32;
        self.index_of.insert(material.clone(), index);
        self.materials.push(material.clone());
        index
    }

    /// Index of an already registered material.
    pub fn index_of(&self, material: &M) -> Option<u32> {
        self.index_of.get(material).copied()
    }
}

impl<M> MaterialRegistry<M> {
    /// Material identity for a dense index.
    pub fn get(&self, index: u32) -> Option<&M> {
        self.materials.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Materials in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.materials.iter()
    }

    pub fn clear(&mut self) {
        self.index_of.clear();
        self.materials.clear();
    }
}
