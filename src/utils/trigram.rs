use rustc_hash::FxHashSet;
use std::fmt;

/// Three consecutive characters: the key of the trigram index.
///
/// Triplets are built from Unicode scalar values, not bytes, so a triplet
/// never splits a multi-byte character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triplet([char; 3]);

impl Triplet {
    /// Number of characters in a triplet
    pub const LEN: usize = 3;

    pub fn from_chars(chars: [char; 3]) -> Self {
        Triplet(chars)
    }

    /// Build a triplet from a three-character key.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not exactly three characters long. Index keys of any
    /// other length are a programming error.
    pub fn new(key: &str) -> Self {
        match Self::parse(key) {
            Some(triplet) => triplet,
            None => panic!("triplet key must be exactly 3 characters, got {key:?}"),
        }
    }

    /// Non-panicking variant of [`Triplet::new`].
    pub fn parse(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let triplet = [chars.next()?, chars.next()?, chars.next()?];
        if chars.next().is_some() {
            return None;
        }
        Some(Triplet(triplet))
    }

    pub fn chars(&self) -> [char; 3] {
        self.0
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}{b}{c}")
    }
}

/// Slide a 3-character window across a single line, calling `f` for every
/// triplet in order (duplicates included).
#[inline]
pub fn for_each_line_triplet(line: &str, mut f: impl FnMut(Triplet)) {
    let mut chars = line.chars();
    let (Some(mut first), Some(mut second)) = (chars.next(), chars.next()) else {
        return;
    };
    for third in chars {
        f(Triplet([first, second, third]));
        first = second;
        second = third;
    }
}

/// Extract the unique triplets of every line of `content`.
///
/// Lines are split like [`str::lines`], so triplets never span a line break.
pub fn extract_triplets(content: &str) -> FxHashSet<Triplet> {
    let mut triplets = FxHashSet::default();
    for line in content.lines() {
        for_each_line_triplet(line, |t| {
            triplets.insert(t);
        });
    }
    triplets
}

/// Extract the triplets of a search token, deduplicated, in order of first
/// appearance.
pub fn token_triplets(token: &str) -> Vec<Triplet> {
    let mut seen = FxHashSet::default();
    let mut triplets = Vec::new();
    for_each_line_triplet(token, |t| {
        if seen.insert(t) {
            triplets.push(t);
        }
    });
    triplets
}

/// Check if content is likely binary
pub fn is_binary(content: &[u8]) -> bool {
    let sample_size = content.len().min(8192);
    let sample = &content[..sample_size];

    // Any NUL byte in the sample is a strong binary signal for text search
    if memchr::memchr(0, sample).is_some() {
        return true;
    }

    // Check for high proportion of non-text bytes
    let non_text_count = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t' && b != 0x0c)
        .count();

    non_text_count > sample_size / 8
}
