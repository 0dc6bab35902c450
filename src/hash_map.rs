use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::error::TryReserveError;
use crate::hash_table::DEFAULT_CAPACITY;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

/// Hash of the absent key. It folds into bucket 0 at every capacity.
const ABSENT_KEY_HASH: u64 = 0;

/// Matches a stored key against a lookup key, where `None` on either side is
/// the absent key and only ever equals itself.
fn equivalent_key<Q, K, V>(key: Option<&Q>) -> impl Fn(&(Option<K>, V)) -> bool + '_
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    move |(stored, _)| match (stored, key) {
        (Some(stored), Some(key)) => key.eq(stored.borrow()),
        (None, None) => true,
        _ => false,
    }
}

/// A hash map implemented using the chained [`HashTable`] as the underlying
/// storage.
///
/// Keys must implement `Hash + Eq`. The hasher builder `S` turns each key
/// into the `u64` that picks its bucket.
///
/// Besides regular keys the map can hold one value under the *absent key*,
/// through [`insert_absent`], [`get_absent`] and friends. The absent key
/// always hashes to 0 and lives in bucket 0, next to any regular key whose
/// hash folds there; the two never interfere.
///
/// [`insert_absent`]: HashMap::insert_absent
/// [`get_absent`]: HashMap::get_absent
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use chain_hash::HashMap;
///
/// let mut map: HashMap<_, _> = HashMap::new();
/// map.insert("one", 1);
/// map.insert("two", 2);
/// map.insert("three", 3);
/// assert_eq!(map.len(), 3);
/// assert_eq!(map.get("two"), Some(&2));
///
/// map.remove("two");
/// assert_eq!(map.get("two"), None);
/// assert_eq!(map.len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    table: HashTable<(Option<K>, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Returns the number of elements in the map, the absent key included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds neither keyed entries nor an absent-key
    /// value.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of buckets. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Drops every entry, the absent key included. The bucket count is kept.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Visits every entry in bucket order.
    ///
    /// The iterator yields `(Option<&K>, &V)` pairs in an arbitrary order,
    /// with `None` standing for the absent key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert_absent("none");
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(None, &"none"), (Some(&1), &"a")]);
    /// # }
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Visits every key, `None` standing for the absent key.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Visits every stored value.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Moves every entry out of the map. The map is empty once the iterator is
    /// dropped, whether or not it was run to completion.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Computes a histogram of chain lengths, see
    /// [`HashTable::chain_histogram`].
    #[cfg(feature = "stats")]
    pub fn chain_histogram(&self) -> alloc::vec::Vec<usize> {
        self.table.chain_histogram()
    }

    /// Returns bucket utilization statistics, see [`HashTable::debug_stats`].
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new hash map with the default bucket count and the given
    /// hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use chain_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 16);
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates a new hash map with at least `capacity` buckets and the given
    /// hasher builder.
    ///
    /// The bucket count is rounded up to the next power of two.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Grows the bucket array so that `additional` more entries can be added
    /// without a resize.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Tries to reserve capacity for at least `additional` more elements.
    ///
    /// # Errors
    ///
    /// Returns a [`TryReserveError`] if the bucket count would overflow or the
    /// allocator fails. The map is left untouched on error.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Stores `value` under `key`.
    ///
    /// An existing entry keeps its key and has its value swapped, and the old
    /// value comes back. A new key adds an entry, which may double the bucket
    /// array.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// # }
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.insert_slot(Some(key), value)
    }

    /// Inserts a value under the absent key, returning the previous one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut map: HashMap<String, i32> = HashMap::new();
    /// assert_eq!(map.insert_absent(1), None);
    /// assert_eq!(map.insert_absent(2), Some(1));
    /// assert_eq!(map.get_absent(), Some(&2));
    /// assert_eq!(map.len(), 1);
    /// # }
    /// ```
    pub fn insert_absent(&mut self, value: V) -> Option<V> {
        self.insert_slot(None, value)
    }

    /// Looks up the value stored under `key`.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and
    /// `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert("hello".to_string(), 1);
    /// assert_eq!(map.get("hello"), Some(&1));
    /// assert_eq!(map.get("world"), None);
    /// # }
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(Some(key)).map(|(_, v)| v)
    }

    /// Returns a reference to the value stored under the absent key.
    pub fn get_absent(&self) -> Option<&V> {
        self.find_slot::<K>(None).map(|(_, v)| v)
    }

    /// Looks up the value stored under `key` for modification.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot_mut(Some(key)).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored under the absent key.
    pub fn get_absent_mut(&mut self) -> Option<&mut V> {
        self.find_slot_mut::<K>(None).map(|(_, v)| v)
    }

    /// Returns `true` if `key` has an entry.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).is_some()
    }

    /// Returns `true` if the map holds a value under the absent key.
    pub fn contains_absent(&self) -> bool {
        self.get_absent().is_some()
    }

    /// Takes the entry for `key` out of the map and returns its value.
    ///
    /// Removing a key that is not present leaves the map, and its length,
    /// unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// assert!(map.is_empty());
    /// # }
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_slot(Some(key)).map(|(_, v)| v)
    }

    /// Removes the value stored under the absent key.
    pub fn remove_absent(&mut self) -> Option<V> {
        self.remove_slot::<K>(None).map(|(_, v)| v)
    }

    /// Like [`remove`](HashMap::remove), but hands back the stored key too.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_slot(Some(key))
            .and_then(|(k, v)| k.map(|k| (k, v)))
    }

    /// Resolves `key` to its slot, occupied or not, so it can be read or filled
    /// with a single lookup.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let mut letters: HashMap<_, _> = HashMap::new();
    /// for ch in "a short treatise on fungi".chars() {
    ///     *letters.entry(ch).or_insert(0) += 1;
    /// }
    ///
    /// assert_eq!(letters.get(&'s'), Some(&2));
    /// assert_eq!(letters.get(&'t'), Some(&3));
    /// assert_eq!(letters.get(&'y'), None);
    /// # }
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_key(Some(&key));
        match self.table.entry(hash, equivalent_key(Some(&key))) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    fn hash_key<Q>(&self, key: Option<&Q>) -> u64
    where
        Q: ?Sized + Hash,
    {
        key.map_or(ABSENT_KEY_HASH, |key| self.hash_builder.hash_one(key))
    }

    fn insert_slot(&mut self, key: Option<K>, value: V) -> Option<V> {
        let hash = self.hash_key(key.as_ref());
        match self.table.entry(hash, equivalent_key(key.as_ref())) {
            TableEntry::Occupied(mut entry) => {
                Some(core::mem::replace(&mut entry.get_mut().1, value))
            }
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    fn find_slot<Q>(&self, key: Option<&Q>) -> Option<&(Option<K>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_key(key);
        self.table.find(hash, equivalent_key(key))
    }

    fn find_slot_mut<Q>(&mut self, key: Option<&Q>) -> Option<&mut (Option<K>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_key(key);
        self.table.find_mut(hash, equivalent_key(key))
    }

    fn remove_slot<Q>(&mut self, key: Option<&Q>) -> Option<(Option<K>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_key(key);
        self.table.remove(hash, equivalent_key(key))
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.table.check_invariants();
        for (key, _) in self.table.iter() {
            let hash = self.hash_key(key.as_ref());
            assert!(self.table.find(hash, equivalent_key(key.as_ref())).is_some());
        }
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a new hash map with 16 buckets using the default hasher
    /// builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashMap;
    ///
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 16);
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash map with at least `capacity` buckets using the
    /// default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (Option<&'a K>, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The slot for one key, as returned by [`HashMap::entry`].
pub enum Entry<'a, K, V> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Fills a vacant slot with `default`, then returns the slot's value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Fills a vacant slot with `default()`, which is only called when needed.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Runs `f` on the value of an occupied slot. Vacant slots pass through
    /// unchanged.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// The key this slot belongs to.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V> Entry<'a, K, V>
where
    V: Default,
{
    /// Fills a vacant slot with `V::default()`.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A slot with no entry yet. Holds on to the key until a value arrives.
pub struct VacantEntry<'a, K, V> {
    entry: crate::hash_table::VacantEntry<'a, (Option<K>, V)>,
    key: K,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// The key a later [`insert`](VacantEntry::insert) will store.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Gives the key back without inserting.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Adds the entry, growing the map when it crosses the load factor.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((Some(self.key), value)).1
    }
}

/// A slot that already holds an entry.
pub struct OccupiedEntry<'a, K, V> {
    entry: crate::hash_table::OccupiedEntry<'a, (Option<K>, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        match &self.entry.get().0 {
            Some(key) => key,
            None => unreachable!("keyed entry resolved to the absent key"),
        }
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        match self.entry.remove() {
            (Some(key), value) => (key, value),
            (None, _) => unreachable!("keyed entry resolved to the absent key"),
        }
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (Option<K>, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Option<&'a K>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_ref(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// An iterator over the keys of a `HashMap`. The absent key is yielded as
/// `None`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = Option<&'a K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V> {
    inner: crate::hash_table::Drain<'a, (Option<K>, V)>,
}

impl<'a, K, V> Iterator for Drain<'a, K, V> {
    type Item = (Option<K>, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}
