use std::cell::Cell;

/// Where a [`OrderedList::seek`] starts counting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(usize),
    Current(isize),
    End(isize),
}

/// Insertion-ordered owning sequence with a traversal cursor.
///
/// Positions returned by [`append`](Self::append) stay valid until an
/// element before them is removed. Secondary indices store these
/// positions, so owners rebuild them after removal.
#[derive(Debug, Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
    cursor: Cell<Option<usize>>,
}

impl<T> OrderedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: Cell::new(None),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            cursor: Cell::new(None),
        }
    }

    /// Appends `item` and returns its position.
    pub fn append(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut T> {
        self.items.get_mut(position)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Moves the cursor and returns the element under it. A target
    /// outside the list leaves the cursor unset.
    pub fn seek(&self, from: SeekFrom) -> Option<&T> {
        let target = match from {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self
                .cursor
                .get()
                .and_then(|c| c.checked_add_signed(delta)),
            SeekFrom::End(delta) => self
                .items
                .len()
                .checked_sub(1)
                .and_then(|last| last.checked_add_signed(delta)),
        }
        .filter(|&p| p < self.items.len());
        self.cursor.set(target);
        target.and_then(|p| self.items.get(p))
    }

    /// Advances the cursor; an unset cursor starts at the head.
    pub fn next(&self) -> Option<&T> {
        let target = match self.cursor.get() {
            Some(c) => c + 1,
            None => 0,
        };
        self.seek(SeekFrom::Start(target))
    }

    /// Steps the cursor back; an unset cursor starts at the tail.
    pub fn prev(&self) -> Option<&T> {
        match self.cursor.get() {
            Some(0) => {
                self.cursor.set(None);
                None
            }
            Some(c) => self.seek(SeekFrom::Start(c - 1)),
            None => self.seek(SeekFrom::End(0)),
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.cursor.get().and_then(|c| self.items.get(c))
    }

    pub fn position(&self) -> Option<usize> {
        self.cursor.get()
    }

    pub fn rewind(&self) {
        self.cursor.set(None);
    }

    pub fn remove(&mut self, position: usize) -> Option<T> {
        if position >= self.items.len() {
            return None;
        }
        let item = self.items.remove(position);
        if let Some(c) = self.cursor.get() {
            self.cursor.set(match c {
                c if c == position => None,
                c if c > position => Some(c - 1),
                c => Some(c),
            });
        }
        Some(item)
    }

    /// Keeps only elements matching `keep`; resets the cursor.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
        self.cursor.set(None);
    }

    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(|item| pred(item))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor.set(None);
    }
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a OrderedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
