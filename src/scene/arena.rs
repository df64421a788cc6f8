use std::fmt::Debug;
use std::marker::PhantomData;

/// Handle type usable as an [`Arena`] key.
pub trait ArenaKey: Copy + Ord + Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub u32);

        impl ArenaKey for $name {
            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_key!(
    /// Handle of an avatar (the owner of grabbers).
    AvatarId
);
arena_key!(
    /// Handle of a grabber (tracked hand proxy).
    GrabberId
);
arena_key!(
    /// Handle of a grabbable object.
    ObjectId
);
arena_key!(
    /// Handle of a grabbable anchor.
    AnchorId
);

/// Slot storage with stable handles. Removed slots are never reused, so a
/// stale handle resolves to `None` instead of a different record.
#[derive(Debug, Clone)]
pub struct Arena<K: ArenaKey, T> {
    slots: Vec<Option<T>>,
    _key: PhantomData<K>,
}

impl<K: ArenaKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _key: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> K {
        let key = K::from_index(self.slots.len());
        self.slots.push(Some(value));
        key
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        self.slots.get_mut(key.index()).and_then(Option::take)
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::from_index(i), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (K::from_index(i), v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}
