use std::cell::RefCell;

/// A cached value stamped with the tree revision it was computed at.
///
/// The tree bumps its revision on every structural change, so a stamp that no
/// longer matches means the value is stale and gets recomputed on next access.
#[derive(Debug, Clone)]
pub struct Memo<T> {
    slot: RefCell<Option<(u64, T)>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `revision`, computing it with `f` if absent or stale.
    pub fn get_or_insert_with<F>(&self, revision: u64, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some((stamp, value)) = self.slot.borrow().as_ref() {
            if *stamp == revision {
                return value.clone();
            }
        }
        let value = f();
        *self.slot.borrow_mut() = Some((revision, value.clone()));
        value
    }

    /// Whether a value stamped with `revision` is cached
    #[cfg(test)]
    pub(crate) fn is_fresh(&self, revision: u64) -> bool {
        matches!(self.slot.borrow().as_ref(), Some((stamp, _)) if *stamp == revision)
    }

    #[cfg(test)]
    pub(crate) fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }
}
