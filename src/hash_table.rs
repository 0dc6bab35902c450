use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;

use crate::error::TryReserveError;

/// Bucket count used by [`HashTable::new`].
pub const DEFAULT_CAPACITY: usize = 16;

/// Number of bins reported by [`HashTable::chain_histogram`]. The last bin
/// aggregates every chain at least `CHAIN_HISTOGRAM_LEN - 1` entries long.
#[cfg(any(test, feature = "stats"))]
pub const CHAIN_HISTOGRAM_LEN: usize = 9;

/// Returns `true` when `populated` is strictly above three quarters of
/// `capacity`.
#[inline(always)]
fn exceeds_load_factor(populated: usize, capacity: usize) -> bool {
    populated as u128 * 4 > capacity as u128 * 3
}

/// Folds a hash into a bucket index.
///
/// `capacity` must be a power of two, which every growth step preserves by
/// doubling.
#[inline(always)]
pub(crate) fn index_for(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}

/// Whether memory allocation errors should return an error or abort.
#[derive(Copy, Clone)]
enum Fallibility {
    Fallible,
    Infallible,
}

impl Fallibility {
    /// Error to return on capacity overflow.
    fn capacity_overflow(self) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::CapacityOverflow,
            Fallibility::Infallible => panic!("Hash table capacity overflow"),
        }
    }

    /// Error to return on allocation error.
    fn alloc_err(self, layout: Layout) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::AllocError { layout },
            Fallibility::Infallible => handle_alloc_error(layout),
        }
    }
}

#[derive(Clone)]
struct Slot<V> {
    hash: u64,
    value: V,
}

type Bucket<V> = Vec<Slot<V>>;

/// The bucket storage of a table. Its length is the table's capacity, so the
/// two can only ever change together, by replacing the whole array.
#[derive(Clone)]
struct BucketArray<V> {
    buckets: Box<[Bucket<V>]>,
}

impl<V> BucketArray<V> {
    fn allocate(capacity: usize, fallibility: Fallibility) -> Result<Self, TryReserveError> {
        debug_assert!(capacity.is_power_of_two());

        let Ok(layout) = Layout::array::<Bucket<V>>(capacity) else {
            return Err(fallibility.capacity_overflow());
        };

        let mut buckets = Vec::new();
        if buckets.try_reserve_exact(capacity).is_err() {
            return Err(fallibility.alloc_err(layout));
        }
        // Empty vectors don't allocate, so a bucket's chain only comes into
        // existence on the first insert at its index.
        buckets.resize_with(capacity, Vec::new);

        Ok(Self {
            buckets: buckets.into_boxed_slice(),
        })
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline(always)]
    fn bucket(&self, hash: u64) -> &Bucket<V> {
        &self.buckets[index_for(hash, self.capacity())]
    }

    #[inline(always)]
    fn bucket_mut(&mut self, hash: u64) -> &mut Bucket<V> {
        let index = index_for(hash, self.capacity());
        &mut self.buckets[index]
    }
}

/// Returns the bucket count for a requested capacity: the next power of two,
/// and never less than one.
fn bucket_count_for(capacity: usize) -> Option<usize> {
    capacity.max(1).checked_next_power_of_two()
}

#[cfg(any(test, feature = "stats"))]
/// Summary of how entries are spread across the bucket array.
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of elements currently in the table
    pub populated: usize,
    /// Number of buckets
    pub capacity: usize,
    /// Number of buckets holding at least one entry
    pub occupied_buckets: usize,
    /// Length of the longest chain
    pub longest_chain: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {} in {} buckets ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Bucket Usage: {}/{} ({:.2}% occupied)",
            self.occupied_buckets,
            self.capacity,
            if self.capacity == 0 {
                0.0
            } else {
                (self.occupied_buckets as f64 / self.capacity as f64) * 100.0
            }
        );
        println!("Longest chain: {} entries", self.longest_chain);
    }
}

/// A separately chained hash table.
///
/// `HashTable<V>` stores values of type `V` in a power-of-two array of
/// buckets, each bucket holding the values whose hash folds to its index.
/// Like the raw tables of other hashing crates, it requires you to provide
/// both the hash value and an equality predicate for each operation.
///
/// The table grows by doubling as soon as it holds more than three quarters
/// as many values as it has buckets. It never shrinks on removal.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use chain_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     chain_hash::hash_table::Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     chain_hash::hash_table::Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Clone)]
pub struct HashTable<V> {
    array: BucketArray<V>,
    populated: usize,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field(
                "chains",
                &self.array.buckets.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with at least `capacity` buckets.
    ///
    /// The bucket count is rounded up to the next power of two, and a request
    /// for zero buckets still allocates one.
    ///
    /// # Panics
    ///
    /// Panics if the rounded bucket count overflows `usize`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    ///
    /// let table: HashTable<String> = HashTable::with_capacity(0);
    /// assert_eq!(table.capacity(), 1);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let Some(capacity) = bucket_count_for(capacity) else {
            panic!("Hash table capacity overflow");
        };
        let Ok(array) = BucketArray::allocate(capacity, Fallibility::Infallible) else {
            unreachable!("infallible allocation reported an error");
        };

        Self {
            array,
            populated: 0,
        }
    }

    /// Returns an iterator over all values in the table.
    ///
    /// The iterator yields `&V` references in an arbitrary order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(1, |&v: &u64| v == 10).or_insert(10);
    /// table.entry(2, |&v: &u64| v == 20).or_insert(20);
    ///
    /// let mut values: Vec<u64> = table.iter().copied().collect();
    /// values.sort();
    /// assert_eq!(values, [10, 20]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: self.array.buckets.iter().flatten(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// After calling `drain()`, the table will be empty. The bucket array is
    /// kept.
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            bucket_index: 0,
        }
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of buckets. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.array.capacity()
    }

    /// Removes all elements from the table, keeping the bucket array.
    pub fn clear(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::trace!(len = self.populated, "clearing hash table");

        for bucket in self.array.buckets.iter_mut() {
            bucket.clear();
        }
        self.populated = 0;
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// After this call, inserting `additional` more values will not trigger a
    /// resize. Does nothing if the current bucket array is already large
    /// enough.
    ///
    /// # Panics
    ///
    /// Panics if the new bucket count overflows `usize`, and aborts through
    /// [`handle_alloc_error`] if the allocator fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.reserve(100);
    /// assert_eq!(table.capacity(), 256);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        if self
            .reserve_impl(additional, Fallibility::Infallible)
            .is_err()
        {
            unreachable!("infallible reservation reported an error");
        }
    }

    /// Tries to reserve capacity for at least `additional` more elements.
    ///
    /// # Errors
    ///
    /// Returns [`TryReserveError::CapacityOverflow`] if the required bucket
    /// count overflows, or [`TryReserveError::AllocError`] if the allocator
    /// fails. The table is left untouched on error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::TryReserveError;
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// assert!(table.try_reserve(10).is_ok());
    /// assert_eq!(
    ///     table.try_reserve(usize::MAX),
    ///     Err(TryReserveError::CapacityOverflow)
    /// );
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.reserve_impl(additional, Fallibility::Fallible)
    }

    fn reserve_impl(
        &mut self,
        additional: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        let Some(required) = self.populated.checked_add(additional) else {
            return Err(fallibility.capacity_overflow());
        };

        let result = self.resize_to_fit(required, fallibility);
        #[cfg(feature = "tracing")]
        if let Err(error) = &result {
            tracing::debug!(additional, %error, "bucket array reservation failed");
        }
        result
    }

    /// Removes and returns a value from the table.
    ///
    /// Every value in the target bucket that matches `eq` is dropped from the
    /// table and the element count goes down by exactly the number of values
    /// removed. With a consistent hash and equality there is at most one.
    /// Missing values leave the count untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.remove(42, |&n| n == 42), Some(42));
    /// assert!(table.is_empty());
    ///
    /// assert_eq!(table.remove(99, |&n| n == 99), None);
    /// assert_eq!(table.len(), 0);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let bucket = self.array.bucket_mut(hash);
        let mut removed = bucket.extract_if(.., |slot| slot.hash == hash && eq(&slot.value));
        let first = removed.next();
        let extra = removed.count();

        self.populated -= usize::from(first.is_some()) + extra;
        first.map(|slot| slot.value)
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::Entry;
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    ///
    /// match table.entry(7, |s: &String| s == "hello") {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     Entry::Occupied(mut entry) => {
    ///         *entry.get_mut() = "updated".to_string();
    ///     }
    /// }
    ///
    /// assert_eq!(table.find(7, |s| s == "hello"), Some(&"hello".to_string()));
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        let index = index_for(hash, self.capacity());
        let position = self.array.buckets[index]
            .iter()
            .position(|slot| slot.hash == hash && eq(&slot.value));

        match position {
            Some(position) => Entry::Occupied(OccupiedEntry {
                table: self,
                index,
                position,
            }),
            None => Entry::Vacant(VacantEntry { table: self, hash }),
        }
    }

    /// Finds a value in the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.find(42, |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(99, |&n| n == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        self.array
            .bucket(hash)
            .iter()
            .find(|slot| slot.hash == hash && eq(&slot.value))
            .map(|slot| &slot.value)
    }

    /// Finds a value in the table and returns a mutable reference to it.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        self.array
            .bucket_mut(hash)
            .iter_mut()
            .find(|slot| slot.hash == hash && eq(&slot.value))
            .map(|slot| &mut slot.value)
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        if self
            .resize_to_fit(self.populated, Fallibility::Infallible)
            .is_err()
        {
            unreachable!("infallible resize reported an error");
        }
    }

    /// Doubles the bucket count until `required` values fit under the load
    /// factor, then rehashes into the new array.
    fn resize_to_fit(
        &mut self,
        required: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        let mut capacity = self.capacity();
        while exceeds_load_factor(required, capacity) {
            capacity = match capacity.checked_mul(2) {
                Some(capacity) => capacity,
                None => return Err(fallibility.capacity_overflow()),
            };
        }

        if capacity != self.capacity() {
            self.resize(capacity, fallibility)?;
        }
        Ok(())
    }

    fn resize(&mut self, capacity: usize, fallibility: Fallibility) -> Result<(), TryReserveError> {
        let mut array = BucketArray::allocate(capacity, fallibility)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = self.capacity(),
            to = capacity,
            len = self.populated,
            "rehashing bucket array"
        );

        let old = core::mem::replace(&mut self.array.buckets, Box::default());
        for slot in old.into_vec().into_iter().flatten() {
            array.bucket_mut(slot.hash).push(slot);
        }
        self.array = array;

        Ok(())
    }

    /// Computes a histogram of chain lengths for the current table state.
    ///
    /// Index `i` of the returned vector counts the buckets holding exactly `i`
    /// values. The final bin, `CHAIN_HISTOGRAM_LEN - 1`, also counts every
    /// longer chain.
    #[cfg(any(test, feature = "stats"))]
    pub fn chain_histogram(&self) -> Vec<usize> {
        let mut hist = alloc::vec![0usize; CHAIN_HISTOGRAM_LEN];
        for bucket in self.array.buckets.iter() {
            hist[bucket.len().min(CHAIN_HISTOGRAM_LEN - 1)] += 1;
        }
        hist
    }

    /// Returns bucket utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            occupied_buckets: self
                .array
                .buckets
                .iter()
                .filter(|bucket| !bucket.is_empty())
                .count(),
            longest_chain: self.array.buckets.iter().map(Vec::len).max().unwrap_or(0),
            load_factor: self.populated as f64 / self.capacity() as f64,
        }
    }

    /// Asserts the structural invariants of the table.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert!(self.capacity().is_power_of_two());
        assert!(!exceeds_load_factor(self.populated, self.capacity()));

        let mut total = 0;
        for (index, bucket) in self.array.buckets.iter().enumerate() {
            for slot in bucket {
                assert_eq!(index_for(slot.hash, self.capacity()), index);
            }
            total += bucket.len();
        }
        assert_eq!(total, self.populated);
    }
}

/// A view into a single entry in the hash table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// A vacant entry - no value matched the predicate
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry - a value matched the predicate
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    ///
    /// If the entry is occupied, returns a mutable reference to the existing
    /// value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry.
    ///
    /// If the entry is vacant, returns `None` without inserting anything.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use chain_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    ///
    /// let result = table.entry(42, |&n: &u64| n == 42).and_modify(|v| *v += 1);
    /// assert_eq!(result, None);
    ///
    /// table.entry(42, |&n: &u64| n == 42).or_insert(42);
    ///
    /// let result = table.entry(42, |&n: &u64| n == 42).and_modify(|v| *v += 1);
    /// assert_eq!(result, Some(&mut 43));
    /// ```
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the hash table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when no
/// stored value matches the predicate.
///
/// [`entry`]: HashTable::entry
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts a value into the vacant entry and returns a mutable reference to
    /// it.
    ///
    /// If the table now holds more than three quarters as many values as it
    /// has buckets, the bucket array is doubled.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        table.populated += 1;
        // Growing ahead of the push lets the new slot land directly in its
        // final bucket.
        if exceeds_load_factor(table.populated, table.capacity()) {
            table.grow();
        }

        let bucket = table.array.bucket_mut(self.hash);
        let position = bucket.len();
        bucket.push(Slot {
            hash: self.hash,
            value,
        });
        &mut bucket[position].value
    }
}

/// A view into an occupied entry in the hash table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when a
/// stored value matches the predicate.
///
/// [`entry`]: HashTable::entry
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
    position: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.table.array.buckets[self.index][self.position].value
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.table.array.buckets[self.index][self.position].value
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the entry.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.table.array.buckets[self.index][self.position].value
    }

    /// Removes the entry from the table and returns the value.
    pub fn remove(self) -> V {
        self.table.populated -= 1;
        self.table.array.buckets[self.index]
            .remove(self.position)
            .value
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`].
/// It yields `&V` references in an arbitrary order.
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V> {
    inner: core::iter::Flatten<core::slice::Iter<'a, Bucket<V>>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.inner.next()?;
        self.remaining -= 1;
        Some(&slot.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
/// It yields owned `V` values and empties the table as it iterates.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    bucket_index: usize,
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<'a, V> Iterator for Drain<'a, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(bucket) = self.table.array.buckets.get_mut(self.bucket_index) {
            if let Some(slot) = bucket.pop() {
                self.table.populated -= 1;
                return Some(slot.value);
            }
            self.bucket_index += 1;
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V> ExactSizeIterator for Drain<'_, V> {}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn insert_item(table: &mut HashTable<Item>, hash: u64, key: u64, value: i32) {
        match table.entry(hash, |v| v.key == key) {
            Entry::Vacant(v) => {
                v.insert(Item { key, value });
            }
            Entry::Occupied(_) => panic!("unexpected occupied entry for {key}: {table:#?}"),
        }
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            insert_item(&mut table, hash, k, (k as i32) * 2);
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                }),
                "{:#?}",
                table
            );
        }
        assert_eq!(table.len(), 32);
        table.check_invariants();

        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == k).map(|v| v.value),
                Some((k as i32) * 2)
            );
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |v| v.key == 999).is_none());
    }

    #[test]
    fn duplicate_entry_is_occupied() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        let k = 42u64;
        let hash = hash_key(&state, k);

        insert_item(&mut table, hash, k, 7);

        match table.entry(hash, |v| v.key == k) {
            Entry::Occupied(mut occ) => {
                let prev_value = occ.get().value;
                *occ.get_mut() = Item { key: k, value: 11 };
                assert_eq!(prev_value, 7);
            }
            Entry::Vacant(_) => panic!("should be occupied: {}#{:02X} in {:#?}", k, hash, table),
        }
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(hash, |v| v.key == k).unwrap().value, 11);
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..5u64 {
            insert_item(&mut table, hash_key(&state, k), k, 1);
        }

        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            if let Some(v) = table.find_mut(hash, |v| v.key == k) {
                v.value += 9;
            }
        }
        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k).unwrap().value, 10);
        }
        assert!(table.find_mut(hash_key(&state, 5), |v| v.key == 5).is_none());
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..8u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }
        assert_eq!(table.len(), 8);

        for k in [0u64, 3, 7] {
            let hash = hash_key(&state, k);
            let removed = table.remove(hash, |v| v.key == k).expect("should remove");
            assert_eq!(removed.key, k);
        }
        assert_eq!(table.len(), 5);
        table.check_invariants();

        let hash = hash_key(&state, 1000);
        assert!(table.remove(hash, |v| v.key == 1000).is_none());
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn remove_miss_in_populated_bucket_keeps_count() {
        let mut table: HashTable<Item> = HashTable::new();
        insert_item(&mut table, 0, 1, 1);
        insert_item(&mut table, 0, 2, 2);

        assert!(table.remove(0, |v| v.key == 3).is_none());
        assert_eq!(table.len(), 2);
        table.check_invariants();
    }

    #[test]
    fn growth_threshold() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        assert_eq!(table.capacity(), DEFAULT_CAPACITY);

        for k in 0..12u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }
        assert_eq!(table.capacity(), 16);

        insert_item(&mut table, hash_key(&state, 12), 12, 12);
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.len(), 13);
        table.check_invariants();

        for k in 0..13u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k).unwrap().value, k as i32);
        }
    }

    #[test]
    fn updates_and_removals_never_grow() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..12u64 {
            insert_item(&mut table, k, k, 0);
        }
        for k in 0..12u64 {
            *table.entry(k, |v| v.key == k).or_insert(Item { key: k, value: 0 }) =
                Item { key: k, value: 1 };
            assert!(table.find(k, |v| v.key == k).is_some());
        }
        for k in 0..12u64 {
            table.remove(k, |v| v.key == k);
        }
        assert_eq!(table.capacity(), 16);
        assert!(table.is_empty());
    }

    #[test]
    fn with_capacity_rounds_to_power_of_two() {
        assert_eq!(HashTable::<u8>::with_capacity(0).capacity(), 1);
        assert_eq!(HashTable::<u8>::with_capacity(1).capacity(), 1);
        assert_eq!(HashTable::<u8>::with_capacity(17).capacity(), 32);
        assert_eq!(HashTable::<u8>::with_capacity(64).capacity(), 64);
    }

    #[test]
    fn single_bucket_grows_on_first_insert() {
        let mut table: HashTable<Item> = HashTable::with_capacity(1);
        insert_item(&mut table, 5, 5, 5);
        assert_eq!(table.capacity(), 2);
        table.check_invariants();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..100000u64 {
            let hash = hash_key(&state, k);
            insert_item(&mut table, hash, k, k as i32);
        }

        assert_eq!(table.len(), 100000);
        assert_eq!(table.capacity(), 262144);
        table.check_invariants();

        for k in 0..100000u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: k as i32
                })
            );
        }
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<Item> = HashTable::new();
        let hash = 0;
        for k in 0..65u64 {
            insert_item(&mut table, hash, k, k as i32);
        }

        assert_eq!(table.len(), 65);
        assert_eq!(table.debug_stats().longest_chain, 65);
        assert_eq!(table.debug_stats().occupied_buckets, 1);
        for k in 0..65u64 {
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: k as i32
                }),
                "{:#?}",
                table
            );
        }
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 10..20u64 {
            insert_item(&mut table, hash_key(&state, k), k, (k as i32) + 1);
        }
        let collected: Vec<u64> = table.iter().map(|v| v.key).collect();
        assert_eq!(collected.len(), 10);
        assert_eq!(table.iter().len(), 10);
        for k in 10..20u64 {
            assert!(collected.contains(&k));
        }

        let capacity = table.capacity();
        let drained: Vec<Item> = table.drain().collect();
        assert_eq!(drained.len(), 10);
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), capacity);

        for k in 10..20u64 {
            let hash = hash_key(&state, k);
            assert!(table.find(hash, |v| v.key == k).is_none());
        }
    }

    #[test]
    fn dropped_drain_empties_table() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..10u64 {
            insert_item(&mut table, k, k, 0);
        }

        let mut drain = table.drain();
        assert!(drain.next().is_some());
        drop(drain);

        assert!(table.is_empty());
        table.check_invariants();
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct StringItem {
        key: String,
        value: i32,
    }

    fn hash_string_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    #[test]
    fn insert_find_remove_string_keys() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::new();
        let keys = ["hello", "world", "foo", "bar", "baz"];

        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            table.entry(hash, |v| v.key == *k).or_insert(StringItem {
                key: k.to_string(),
                value: i as i32,
            });
        }
        assert_eq!(table.len(), keys.len());

        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == *k).unwrap().value, i as i32);
        }

        let hash_foo = hash_string_key(&state, "foo");
        let removed = table.remove(hash_foo, |v| v.key == "foo").unwrap();
        assert_eq!(removed.value, 2);
        assert_eq!(table.len(), 4);
        assert!(table.find(hash_foo, |v| v.key == "foo").is_none());
    }

    #[test]
    fn entry_or_insert_with_and_default() {
        let mut table: HashTable<Vec<u32>> = HashTable::new();
        table.entry(1, |v| v.is_empty()).or_default().push(1);
        assert_eq!(table.find(1, |v| v == &vec![1]), Some(&vec![1]));

        let value = table
            .entry(2, |v| v == &vec![9])
            .or_insert_with(|| vec![9]);
        value.push(10);
        assert_eq!(table.find(2, |v| v.len() == 2), Some(&vec![9, 10]));

        let existing = table
            .entry(2, |v| v.len() == 2)
            .or_insert_with(|| panic!("should not be called"));
        assert_eq!(existing, &vec![9, 10]);
    }

    #[test]
    fn occupied_entry_remove() {
        let mut table: HashTable<Item> = HashTable::new();
        insert_item(&mut table, 3, 3, 30);
        insert_item(&mut table, 3, 4, 40);

        match table.entry(3, |v| v.key == 3) {
            Entry::Occupied(entry) => assert_eq!(entry.remove().value, 30),
            Entry::Vacant(_) => unreachable!(),
        }
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(3, |v| v.key == 4).unwrap().value, 40);
        table.check_invariants();
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..40u64 {
            insert_item(&mut table, k, k, 0);
        }
        let capacity = table.capacity();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert!(table.find(1, |v| v.key == 1).is_none());
        table.check_invariants();
    }

    #[test]
    fn reserve_avoids_growth() {
        let mut table: HashTable<Item> = HashTable::new();
        table.reserve(100);
        let capacity = table.capacity();
        assert_eq!(capacity, 256);

        for k in 0..100u64 {
            insert_item(&mut table, k, k, 0);
        }
        assert_eq!(table.capacity(), capacity);

        table.reserve(0);
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn try_reserve_overflow() {
        let mut table: HashTable<Item> = HashTable::new();
        assert_eq!(
            table.try_reserve(usize::MAX),
            Err(TryReserveError::CapacityOverflow)
        );

        insert_item(&mut table, 1, 1, 1);
        assert_eq!(
            table.try_reserve(usize::MAX),
            Err(TryReserveError::CapacityOverflow)
        );
        assert_eq!(table.capacity(), DEFAULT_CAPACITY);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..50u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }

        let cloned = table.clone();
        assert_eq!(cloned.len(), table.len());
        assert_eq!(cloned.capacity(), table.capacity());
        for k in 0..50u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                cloned.find(hash, |v| v.key == k),
                table.find(hash, |v| v.key == k)
            );
        }

        table.remove(hash_key(&state, 0), |v| v.key == 0);
        assert_eq!(cloned.len(), 50);
    }

    #[test]
    fn histogram_output() {
        let mut table: HashTable<Item> = HashTable::with_capacity(8);
        for k in 0..3u64 {
            insert_item(&mut table, 0, k, 0);
        }
        insert_item(&mut table, 1, 10, 0);

        let hist = table.chain_histogram();
        assert_eq!(hist.len(), CHAIN_HISTOGRAM_LEN);
        assert_eq!(hist[0], 6);
        assert_eq!(hist[1], 1);
        assert_eq!(hist[3], 1);
        assert_eq!(hist.iter().sum::<usize>(), table.capacity());

        #[cfg(feature = "std")]
        table.debug_stats().print();
    }
}
