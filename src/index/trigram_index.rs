use crate::utils::Triplet;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// A completed index shared between searches and the incremental updater.
///
/// Readers take the read lock for the duration of a lookup; per-file updates
/// take the write lock, so a reader sees either the old or the new state of a
/// file, never a half-applied one.
pub type SharedIndex = Arc<RwLock<TrigramIndex>>;

/// Inverted index from triplet to the files containing it.
///
/// Alongside the forward map the index keeps, per file, the triplets it
/// contributed (so a file can be removed) and the modification time that was
/// current when it was read (so stale change events can be dropped).
#[derive(Debug, Default, Clone)]
pub struct TrigramIndex {
    paths_by_triplet: FxHashMap<Triplet, FxHashSet<Arc<Path>>>,
    triplets_by_path: FxHashMap<Arc<Path>, FxHashSet<Triplet>>,
    times_by_path: FxHashMap<Arc<Path>, SystemTime>,
}

/// Size summary of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub triplets: usize,
}

impl TrigramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedIndex {
        Arc::new(RwLock::new(self))
    }

    /// Record that `path` contains `key`.
    ///
    /// Returns `false` if the pair was already present.
    pub fn add_triplet(&mut self, key: Triplet, path: &Arc<Path>) -> bool {
        let inserted = self
            .paths_by_triplet
            .entry(key)
            .or_default()
            .insert(Arc::clone(path));
        if inserted {
            self.triplets_by_path
                .entry(Arc::clone(path))
                .or_default()
                .insert(key);
        }
        inserted
    }

    /// Files containing `key` (empty if none).
    pub fn lookup(&self, key: &Triplet) -> FxHashSet<Arc<Path>> {
        self.paths_by_triplet.get(key).cloned().unwrap_or_default()
    }

    /// Files containing every one of `triplets`, sorted by path.
    ///
    /// An empty `triplets` slice yields no candidates.
    pub fn candidates(&self, triplets: &[Triplet]) -> Vec<Arc<Path>> {
        let mut sets = Vec::with_capacity(triplets.len());
        for key in triplets {
            match self.paths_by_triplet.get(key) {
                Some(set) => sets.push(set),
                None => return Vec::new(),
            }
        }

        // Sort by size for efficient intersection
        sets.sort_by_key(|s| s.len());

        let Some((smallest, rest)) = sets.split_first() else {
            return Vec::new();
        };

        let mut result: Vec<Arc<Path>> = smallest
            .iter()
            .filter(|path| rest.iter().all(|set| set.contains(*path)))
            .cloned()
            .collect();
        result.sort();
        result
    }

    /// Deep, point-in-time copy of the triplet map.
    pub fn clone_paths_by_triplet(&self) -> FxHashMap<Triplet, FxHashSet<PathBuf>> {
        self.paths_by_triplet
            .iter()
            .map(|(key, paths)| (*key, paths.iter().map(|p| p.to_path_buf()).collect()))
            .collect()
    }

    pub fn register_path_time(&mut self, path: &Arc<Path>, mtime: SystemTime) {
        self.times_by_path.insert(Arc::clone(path), mtime);
    }

    pub fn path_time(&self, path: &Path) -> Option<SystemTime> {
        self.times_by_path.get(path).copied()
    }

    /// Replace everything known about `path` with `triplets` and `mtime`.
    pub fn bulk_add(&mut self, triplets: FxHashSet<Triplet>, path: &Path, mtime: SystemTime) {
        self.bulk_remove(path);

        let path: Arc<Path> = Arc::from(path);
        for key in &triplets {
            self.paths_by_triplet
                .entry(*key)
                .or_default()
                .insert(Arc::clone(&path));
        }
        self.times_by_path.insert(Arc::clone(&path), mtime);
        if !triplets.is_empty() {
            self.triplets_by_path.insert(path, triplets);
        }
    }

    /// Forget `path`: its triplet memberships and its recorded mtime.
    ///
    /// Returns whether anything was known about the path.
    pub fn bulk_remove(&mut self, path: &Path) -> bool {
        let had_time = self.times_by_path.remove(path).is_some();
        let Some(triplets) = self.triplets_by_path.remove(path) else {
            return had_time;
        };

        for key in triplets {
            if let Some(paths) = self.paths_by_triplet.get_mut(&key) {
                paths.remove(path);
                if paths.is_empty() {
                    self.paths_by_triplet.remove(&key);
                }
            }
        }
        true
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.times_by_path.contains_key(path) || self.triplets_by_path.contains_key(path)
    }

    /// All registered files, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .times_by_path
            .keys()
            .chain(self.triplets_by_path.keys())
            .map(|p| p.to_path_buf())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    pub fn triplet_count(&self) -> usize {
        self.paths_by_triplet.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths().len()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            files: self.path_count(),
            triplets: self.triplet_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::extract_triplets;
    use std::time::Duration;

    fn path(p: &str) -> Arc<Path> {
        Arc::from(Path::new(p))
    }

    #[test]
    fn test_add_triplet_is_idempotent() {
        let mut index = TrigramIndex::new();
        let a = path("/a.txt");
        assert!(index.add_triplet(Triplet::new("abc"), &a));
        assert!(!index.add_triplet(Triplet::new("abc"), &a));
        assert_eq!(index.lookup(&Triplet::new("abc")).len(), 1);
    }

    #[test]
    fn test_lookup_missing_is_empty() {
        let index = TrigramIndex::new();
        assert!(index.lookup(&Triplet::new("zzz")).is_empty());
    }

    #[test]
    fn test_candidates_intersect() {
        let mut index = TrigramIndex::new();
        let a = path("/a.txt");
        let b = path("/b.txt");
        for key in ["abc", "bcd"] {
            index.add_triplet(Triplet::new(key), &a);
        }
        index.add_triplet(Triplet::new("abc"), &b);

        let both = [Triplet::new("abc"), Triplet::new("bcd")];
        assert_eq!(index.candidates(&both), vec![a.clone()]);
        assert_eq!(index.candidates(&[Triplet::new("abc")]).len(), 2);
        assert!(index.candidates(&[Triplet::new("xyz")]).is_empty());
        assert!(index.candidates(&[]).is_empty());
    }

    #[test]
    fn test_clone_is_detached() {
        let mut index = TrigramIndex::new();
        let a = path("/a.txt");
        index.add_triplet(Triplet::new("abc"), &a);

        let snapshot = index.clone_paths_by_triplet();
        index.add_triplet(Triplet::new("abc"), &path("/b.txt"));

        assert_eq!(snapshot[&Triplet::new("abc")].len(), 1);
        assert_eq!(index.lookup(&Triplet::new("abc")).len(), 2);
    }

    #[test]
    fn test_bulk_add_and_remove() {
        let mut index = TrigramIndex::new();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let file = Path::new("/dir/file.txt");

        index.bulk_add(extract_triplets("hello"), file, mtime);
        assert_eq!(index.path_time(file), Some(mtime));
        assert_eq!(index.triplet_count(), 3);
        assert!(index.contains_path(file));

        assert!(index.bulk_remove(file));
        assert_eq!(index.path_time(file), None);
        assert_eq!(index.triplet_count(), 0);
        assert!(!index.bulk_remove(file));
    }

    #[test]
    fn test_bulk_add_replaces_previous_content() {
        let mut index = TrigramIndex::new();
        let file = Path::new("/f.txt");
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(1);

        index.bulk_add(extract_triplets("abcd"), file, t0);
        index.bulk_add(extract_triplets("wxyz"), file, t1);

        assert!(index.lookup(&Triplet::new("abc")).is_empty());
        assert_eq!(index.lookup(&Triplet::new("xyz")).len(), 1);
        assert_eq!(index.path_time(file), Some(t1));
    }

    #[test]
    fn test_bulk_remove_keeps_other_files() {
        let mut index = TrigramIndex::new();
        let t = SystemTime::UNIX_EPOCH;
        index.bulk_add(extract_triplets("shared"), Path::new("/a"), t);
        index.bulk_add(extract_triplets("shared"), Path::new("/b"), t);

        index.bulk_remove(Path::new("/a"));

        let remaining = index.lookup(&Triplet::new("sha"));
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains(Path::new("/b")));
    }

    #[test]
    fn test_paths_include_files_without_triplets() {
        let mut index = TrigramIndex::new();
        let empty = path("/empty.bin");
        index.register_path_time(&empty, SystemTime::UNIX_EPOCH);
        index.add_triplet(Triplet::new("abc"), &path("/a.txt"));

        assert_eq!(
            index.paths(),
            vec![PathBuf::from("/a.txt"), PathBuf::from("/empty.bin")]
        );
        assert_eq!(index.stats(), IndexStats { files: 2, triplets: 1 });
    }
}
