use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};
use fnv::FnvHasher;

pub fn hash_single<T: Hash + ?Sized>(object: &T) -> u64 {
    let mut hasher: FnvHasher = Default::default();
    object.hash(&mut hasher);
    hasher.finish()
}

pub type FnvHashMap<K, T> = HashMap<K, T, BuildHasherDefault<FnvHasher>>;
pub type FnvHashSet<K> = HashSet<K, BuildHasherDefault<FnvHasher>>;
