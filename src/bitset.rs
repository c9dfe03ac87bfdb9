//! Fixed-width set of component types.
//! The component set is closed and small, so one `u64` word holds it.

use crate::component::ComponentType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentSet {
    word: u64,
}

impl ComponentSet {
    pub const fn empty() -> Self {
        Self { word: 0 }
    }

    pub fn all() -> Self {
        ComponentType::ALL.iter().copied().collect()
    }

    pub fn insert(&mut self, ty: ComponentType) -> bool {
        let bit = 1u64 << ty.index();
        let fresh = self.word & bit == 0;
        self.word |= bit;
        fresh
    }

    pub fn remove(&mut self, ty: ComponentType) -> bool {
        let bit = 1u64 << ty.index();
        let present = self.word & bit != 0;
        self.word &= !bit;
        present
    }

    pub fn contains(&self, ty: ComponentType) -> bool {
        self.word & (1u64 << ty.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.word.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.word == 0
    }

    /// Returns true if this set shares any member with `other`.
    pub fn intersects(&self, other: &Self) -> bool {
        self.word & other.word != 0
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self {
            word: self.word & !other.word,
        }
    }

    /// Members in ascending type order, which is the wire order.
    pub fn iter(&self) -> Ones {
        Ones { word: self.word }
    }
}

impl FromIterator<ComponentType> for ComponentSet {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for ty in iter {
            set.insert(ty);
        }
        set
    }
}

impl IntoIterator for ComponentSet {
    type Item = ComponentType;
    type IntoIter = Ones;

    fn into_iter(self) -> Ones {
        self.iter()
    }
}

pub struct Ones {
    word: u64,
}

impl Iterator for Ones {
    type Item = ComponentType;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word != 0 {
            let trailing = self.word.trailing_zeros() as usize;
            self.word &= !(1 << trailing); // Clear the bit we just found
            if let Some(ty) = ComponentType::ALL.get(trailing) {
                return Some(*ty);
            }
        }
        None
    }
}
