//! Prefix extraction for bucketization.
//!
//! A [`PrefixExtractor`] maps a user key to the shorter slice that picks
//! its bucket. The variant set is fixed by the public API, so this is a
//! tagged enum with direct dispatch rather than an open trait.
//!
//! Extractor names are bit-stable across runs; the enclosing engine
//! records them in compatibility metadata, so changing a name string is a
//! format change.

/// Maps a user key to the prefix slice used for bucket selection.
///
/// # Contract
///
/// `transform` is pure, and its result is always a prefix of the input.
/// [`PrefixExtractor::in_domain`] gates `transform`;
/// [`PrefixExtractor::in_range`] answers whether a slice could be a
/// `transform` output; [`PrefixExtractor::same_result_when_appended`]
/// answers whether extending the input can ever change the output.
#[derive(Clone, Debug)]
pub enum PrefixExtractor {
    /// First `prefix_len` bytes; inputs shorter than that are out of
    /// domain.
    Fixed { prefix_len: usize, name: String },

    /// First `min(cap_len, input len)` bytes; every input is in domain.
    Capped { cap_len: usize, name: String },

    /// The whole key. Every append changes the output, so prefix
    /// bucketing degenerates to exact-key bucketing.
    Noop,
}

impl PrefixExtractor {
    /// Extractor taking the first `prefix_len` bytes.
    #[must_use]
    pub fn fixed(prefix_len: usize) -> Self {
        Self::Fixed {
            prefix_len,
            name: format!("hashlinklist.FixedPrefix.{prefix_len}"),
        }
    }

    /// Extractor taking at most the first `cap_len` bytes.
    #[must_use]
    pub fn capped(cap_len: usize) -> Self {
        Self::Capped {
            cap_len,
            name: format!("hashlinklist.CappedPrefix.{cap_len}"),
        }
    }

    /// The identity extractor.
    #[must_use]
    pub const fn noop() -> Self {
        Self::Noop
    }

    /// Stable identifier, recorded in on-disk compatibility metadata.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Fixed { name, .. } | Self::Capped { name, .. } => name,

            Self::Noop => "hashlinklist.Noop",
        }
    }

    /// Extract the bucket prefix of `src`.
    ///
    /// Requires `in_domain(src)`; violating that is a caller bug, checked
    /// in debug builds.
    #[must_use]
    pub fn transform<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        debug_assert!(self.in_domain(src), "transform input out of domain");
        match self {
            Self::Fixed { prefix_len, .. } => &src[..*prefix_len],

            Self::Capped { cap_len, .. } => &src[..src.len().min(*cap_len)],

            Self::Noop => src,
        }
    }

    /// Whether `src` is a valid `transform` input.
    #[must_use]
    pub fn in_domain(&self, src: &[u8]) -> bool {
        match self {
            Self::Fixed { prefix_len, .. } => src.len() >= *prefix_len,

            Self::Capped { .. } | Self::Noop => true,
        }
    }

    /// Whether `dst` could have been produced by `transform`.
    #[must_use]
    pub fn in_range(&self, dst: &[u8]) -> bool {
        match self {
            Self::Fixed { prefix_len, .. } => dst.len() == *prefix_len,

            Self::Capped { cap_len, .. } => dst.len() <= *cap_len,

            Self::Noop => true,
        }
    }

    /// Whether `transform(prefix ++ x) == transform(prefix)` for every
    /// suffix `x`.
    #[must_use]
    pub fn same_result_when_appended(&self, prefix: &[u8]) -> bool {
        match self {
            Self::Fixed { prefix_len, .. } => prefix.len() >= *prefix_len,

            Self::Capped { cap_len, .. } => prefix.len() >= *cap_len,

            Self::Noop => false,
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    //  Name Stability
    // ========================================================================

    #[test]
    fn test_names_are_bit_stable() {
        assert_eq!(PrefixExtractor::fixed(8).name(), "hashlinklist.FixedPrefix.8");
        assert_eq!(PrefixExtractor::capped(3).name(), "hashlinklist.CappedPrefix.3");
        assert_eq!(PrefixExtractor::noop().name(), "hashlinklist.Noop");
    }

    // ========================================================================
    //  Fixed
    // ========================================================================

    #[test]
    fn test_fixed_takes_exactly_prefix_len_bytes() {
        let t = PrefixExtractor::fixed(3);
        assert_eq!(t.transform(b"catfish"), b"cat");
        assert_eq!(t.transform(b"cat"), b"cat");
    }

    #[test]
    fn test_fixed_short_input_is_out_of_domain() {
        let t = PrefixExtractor::fixed(3);
        assert!(!t.in_domain(b"ab"));
        assert!(t.in_domain(b"abc"));
    }

    #[test]
    fn test_fixed_in_range_requires_exact_length() {
        let t = PrefixExtractor::fixed(3);
        assert!(t.in_range(b"abc"));
        assert!(!t.in_range(b"ab"));
        assert!(!t.in_range(b"abcd"));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "transform input out of domain")]
    fn test_fixed_transform_out_of_domain_asserts() {
        let t = PrefixExtractor::fixed(4);
        let _ = t.transform(b"ab");
    }

    // ========================================================================
    //  Capped
    // ========================================================================

    #[test]
    fn test_capped_short_input_returns_whole_input() {
        let t = PrefixExtractor::capped(3);
        assert_eq!(t.transform(b"ab"), b"ab");
        assert_eq!(t.transform(b"abc123"), b"abc");
        assert!(t.in_range(b"ab"));
    }

    #[test]
    fn test_capped_everything_in_domain() {
        let t = PrefixExtractor::capped(3);
        assert!(t.in_domain(b""));
        assert!(t.in_domain(b"a very long key"));
    }

    #[test]
    fn test_capped_in_range_bounded_by_cap() {
        let t = PrefixExtractor::capped(3);
        assert!(t.in_range(b""));
        assert!(t.in_range(b"abc"));
        assert!(!t.in_range(b"abcd"));
    }

    // ========================================================================
    //  Noop
    // ========================================================================

    #[test]
    fn test_noop_is_identity() {
        let t = PrefixExtractor::noop();
        assert_eq!(t.transform(b"anything"), b"anything");
        assert!(t.in_domain(b""));
        assert!(t.in_range(b"anything"));
    }

    // ========================================================================
    //  SameResultWhenAppended Truth Table
    // ========================================================================

    #[test]
    fn test_same_result_when_appended() {
        let fixed = PrefixExtractor::fixed(3);
        assert!(fixed.same_result_when_appended(b"abc"));
        assert!(fixed.same_result_when_appended(b"abcd"));
        assert!(!fixed.same_result_when_appended(b"ab"));

        let capped = PrefixExtractor::capped(3);
        assert!(capped.same_result_when_appended(b"abc"));
        assert!(!capped.same_result_when_appended(b"ab"));

        let noop = PrefixExtractor::noop();
        assert!(!noop.same_result_when_appended(b"abc"));
        assert!(!noop.same_result_when_appended(b""));
    }
}
