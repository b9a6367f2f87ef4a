use std::cmp::min;
use std::ops::Index;

use crate::error::{RelError, Result};
use crate::utils::MyHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
    refs: u32,
}

impl<T> Entry<T> {
    /// Create a new cell with the given value.
    pub fn new(value: T) -> Self {
        Self {
            value,
            next: 0,
            occupied: false,
            refs: 0,
        }
    }
}

impl<T> Default for Entry<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Hash-consing arena with chained buckets and per-slot reference counts.
///
/// Slots are handed out lazily up to `2^bits`; index `0` is a permanently
/// occupied sentry, so `0` doubles as the "end of chain" marker.
pub struct Table<T> {
    data: Vec<Entry<T>>,
    max_capacity: usize,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Index of the first *possibly* free (non-occupied) cell.
    min_free: usize,
    /// Index of the last occupied cell.
    last_index: usize,
    /// Number of occupied cells.
    real_size: usize,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table able to hold up to `2^bits` cells.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let max_capacity = 1 << bits;
        let mut data: Vec<Entry<T>> = Vec::with_capacity(min(max_capacity, 1 << 10));
        data.push(Entry::default());
        data[0].occupied = true; // Set 0th cell as occupied (sentry).

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;
        let buckets = vec![0; buckets_size];
        let bitmask = (buckets_size - 1) as u64;

        Self {
            data,
            max_capacity,
            buckets,
            bitmask,
            min_free: 1,
            last_index: 0,
            real_size: 0,
        }
    }

    /// Allocate a new cell in the table and return its index.
    pub(crate) fn alloc(&mut self) -> Result<usize> {
        let index = (self.min_free..=self.last_index)
            .find(|&i| !self.data[i].occupied)
            .unwrap_or(self.last_index + 1);

        if index >= self.max_capacity {
            return Err(RelError::OutOfMemory {
                capacity: self.max_capacity,
            });
        }
        if index == self.data.len() {
            self.data.push(Entry::default());
        }
        self.last_index = self.last_index.max(index);

        let entry = &mut self.data[index];
        entry.occupied = true;
        entry.next = 0;
        entry.refs = 0;
        self.min_free = index + 1;
        self.real_size += 1;

        Ok(index)
    }

    /// Add a new value to the table (without registering it in a bucket).
    pub fn add(&mut self, value: T) -> Result<usize> {
        let index = self.alloc()?;
        self.data[index].value = value;
        Ok(index)
    }
}

impl<T> Table<T> {
    /// Get the maximal number of cells (including the sentry).
    pub fn capacity(&self) -> usize {
        self.max_capacity
    }
    /// Get the index of the last occupied cell.
    pub fn size(&self) -> usize {
        self.last_index
    }
    /// Get the number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        assert!(self.data[index].occupied, "Index {} is not occupied", index);
        &self.data[index].value
    }

    /// Check if the cell at the given index is occupied.
    pub fn is_occupied(&self, index: usize) -> bool {
        assert_ne!(index, 0, "Index is 0");
        index < self.data.len() && self.data[index].occupied
    }
    /// Get the index of the next cell.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }
    /// Set the index of the next cell.
    pub fn set_next(&mut self, index: usize, next: usize) {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next = next;
    }

    /// Get the reference count of the cell.
    pub fn refs(&self, index: usize) -> u32 {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].refs
    }
    /// Increment the reference count of the cell.
    pub fn inc_ref(&mut self, index: usize) {
        assert!(self.is_occupied(index), "Index {} is not occupied", index);
        let refs = &mut self.data[index].refs;
        *refs = refs.saturating_add(1);
    }
    /// Decrement the reference count of the cell and return the new count.
    pub fn dec_ref(&mut self, index: usize) -> u32 {
        assert!(self.is_occupied(index), "Index {} is not occupied", index);
        let refs = &mut self.data[index].refs;
        assert!(*refs > 0, "Reference count of {} underflows", index);
        *refs -= 1;
        *refs
    }

    /// Free the cell at the given index. Does *not* unlink it from its bucket.
    pub fn drop(&mut self, index: usize) {
        assert_ne!(index, 0, "Index is 0");
        assert!(self.data[index].occupied, "Index {} is not occupied", index);

        self.data[index].occupied = false;
        self.data[index].next = 0;
        self.data[index].refs = 0;
        self.min_free = min(self.min_free, index);
        self.real_size -= 1;
        while self.last_index > 0 && !self.data[self.last_index].occupied {
            self.last_index -= 1;
        }
    }

    /// Iterate over the indices of all occupied cells (excluding the sentry).
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=self.last_index).filter(move |&i| self.data[i].occupied)
    }
}

impl<T> Table<T>
where
    T: MyHash,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Find the index of an equal value registered in the buckets.
    pub fn find(&self, value: &T) -> Option<usize>
    where
        T: Eq,
    {
        let mut index = self.buckets[self.bucket_index(value)];
        while index != 0 {
            if value == self.value(index) {
                return Some(index);
            }
            index = self.next(index);
        }
        None
    }

    /// Put a value into the table.
    ///
    /// Returns its index and whether a new cell was created.
    pub fn put(&mut self, value: T) -> Result<(usize, bool)>
    where
        T: Eq + Default,
    {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            // Create new node and put it into the bucket.
            let i = self.add(value)?;
            self.buckets[bucket_index] = i;
            return Ok((i, true));
        }

        loop {
            assert!(index > 0);

            if &value == self.value(index) {
                // The node already exists.
                return Ok((index, false));
            }

            let next = self.next(index);

            if next == 0 {
                // Create new node and append it to the bucket.
                let i = self.add(value)?;
                self.set_next(index, i);
                return Ok((i, true));
            } else {
                // Go to the next node in the bucket.
                index = next;
            }
        }
    }

    /// Unlink the cell from its bucket chain and free it.
    pub fn remove(&mut self, index: usize) {
        let bucket_index = self.bucket_index(self.value(index));
        let head = self.buckets[bucket_index];

        if head == index {
            self.buckets[bucket_index] = self.next(index);
        } else {
            let mut prev = head;
            while prev != 0 && self.next(prev) != index {
                prev = self.next(prev);
            }
            assert_ne!(prev, 0, "Cell {} is not registered in its bucket", index);
            let next = self.next(index);
            self.set_next(prev, next);
        }

        self.drop(index);
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_alloc() {
        let mut storage = Table::<()>::new(2);
        assert_eq!(storage.alloc(), Ok(1));
        assert_eq!(storage.alloc(), Ok(2));
        assert_eq!(storage.alloc(), Ok(3));
    }

    #[test]
    fn test_alloc_too_much() {
        let mut storage = Table::<()>::new(2);
        assert_eq!(storage.alloc(), Ok(1));
        assert_eq!(storage.alloc(), Ok(2));
        assert_eq!(storage.alloc(), Ok(3));
        assert_eq!(storage.alloc(), Err(RelError::OutOfMemory { capacity: 4 }));
    }

    #[test]
    fn test_add() {
        let mut table = Table::new(2);
        let index = table.add(42).unwrap();
        assert_eq!(table[index], 42);
        assert_eq!(table.next(index), 0);
    }

    #[test]
    fn test_drop_and_reuse() {
        let mut storage = Table::new(2);
        let index = storage.add(42).unwrap();
        let other = storage.add(43).unwrap();
        assert!(storage.is_occupied(index));
        storage.drop(index);
        assert!(!storage.is_occupied(index));
        assert_eq!(storage.real_size(), 1);
        assert_eq!(storage.add(44), Ok(index));
        assert_eq!(storage[other], 43);
    }

    #[test]
    fn test_put() {
        let mut storage = Table::new(2);
        let (index1, new1) = storage.put(Item(5)).unwrap();
        let (index2, new2) = storage.put(Item(-5)).unwrap();
        assert!(new1 && new2);
        assert_ne!(index1, index2);
        assert_eq!(storage[index1], Item(5));
        assert_eq!(storage[index2], Item(-5));
        assert_eq!(storage.next(index1), index2);

        let (again, new) = storage.put(Item(-5)).unwrap();
        assert_eq!(again, index2);
        assert!(!new);
    }

    #[test]
    fn test_remove_from_chain() {
        let mut storage = Table::new(3);
        let (a, _) = storage.put(Item(5)).unwrap();
        let (b, _) = storage.put(Item(-5)).unwrap();
        let (c, _) = storage.put(Item(13)).unwrap(); // 13 & 7 == 5
        assert_eq!(storage.find(&Item(13)), Some(c));

        storage.remove(b);
        assert_eq!(storage.find(&Item(-5)), None);
        assert_eq!(storage.find(&Item(5)), Some(a));
        assert_eq!(storage.find(&Item(13)), Some(c));

        storage.remove(a);
        assert_eq!(storage.find(&Item(5)), None);
        assert_eq!(storage.find(&Item(13)), Some(c));
        assert_eq!(storage.real_size(), 1);
    }

    #[test]
    fn test_refs() {
        let mut storage = Table::new(2);
        let index = storage.add(7).unwrap();
        assert_eq!(storage.refs(index), 0);
        storage.inc_ref(index);
        storage.inc_ref(index);
        assert_eq!(storage.dec_ref(index), 1);
        assert_eq!(storage.dec_ref(index), 0);
    }

    #[test]
    #[should_panic(expected = "underflows")]
    fn test_refs_underflow() {
        let mut storage = Table::new(2);
        let index = storage.add(7).unwrap();
        storage.dec_ref(index);
    }
}
