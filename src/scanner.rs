use crate::error::SearchError;

/// Streaming Boyer-Moore-Horspool search for a fixed needle, typically a
/// multipart boundary.
///
/// Data arrives in arbitrary chunks. A match that straddles two chunks is
/// still found: the end of each chunk that could begin a match is carried
/// over to the next call. Match positions are absolute offsets into the
/// whole stream.
///
/// ```rust
/// use trellis::BoundarySearch;
///
/// let mut search = BoundarySearch::new("--xyz", 4).unwrap();
/// assert_eq!(search.find(b"abc--x").unwrap(), 0);
/// assert!(search.has_trailing());
/// assert_eq!(search.find(b"yz def").unwrap(), 1);
/// assert_eq!(search.pop(), vec![3]);
/// ```
#[derive(Debug, Clone)]
pub struct BoundarySearch {
    needle: Vec<u8>,
    skip: [usize; 256],
    max_find: usize,
    found: Vec<usize>,
    total: usize,
    // Carried-over tail followed by the chunk being scanned.
    window: Vec<u8>,
}

impl BoundarySearch {
    /// Build a searcher that records at most `max_find` matches between
    /// calls to [`BoundarySearch::pop`].
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyNeedle`] if `needle` is empty.
    pub fn new(needle: impl AsRef<[u8]>, max_find: usize) -> Result<Self, SearchError> {
        let needle = needle.as_ref().to_vec();
        if needle.is_empty() {
            return Err(SearchError::EmptyNeedle);
        }

        let n = needle.len();
        let mut skip = [n; 256];
        for (i, &b) in needle[..n - 1].iter().enumerate() {
            skip[usize::from(b)] = n - 1 - i;
        }

        Ok(Self {
            needle,
            skip,
            max_find,
            found: Vec::with_capacity(max_find),
            total: 0,
            window: Vec::new(),
        })
    }

    /// Scan the next `chunk` of the stream and return how many matches it
    /// completed.
    ///
    /// # Errors
    ///
    /// [`SearchError::TooManyMatches`] once more than `max_find` matches are
    /// pending. The matches that fit are kept and can still be popped.
    pub fn find(&mut self, chunk: &[u8]) -> Result<usize, SearchError> {
        let base = self.total - self.window.len();
        self.window.extend_from_slice(chunk);
        self.total += chunk.len();

        let n = self.needle.len();
        let len = self.window.len();
        let mut hits = 0;
        let mut i = 0;
        let mut resume = 0;

        while i + n <= len {
            let candidate = &self.window[i..i + n];
            if candidate == self.needle.as_slice() {
                if self.found.len() == self.max_find {
                    tracing::debug!(max = self.max_find, offset = base + i, "too many matches");
                    self.keep_tail(len, len);
                    return Err(SearchError::TooManyMatches { max: self.max_find });
                }
                self.found.push(base + i);
                hits += 1;
                i += n;
                resume = i;
            } else {
                i += self.skip[usize::from(self.window[i + n - 1])];
            }
        }

        self.keep_tail(len, resume);
        Ok(hits)
    }

    /// Matches recorded since the last [`BoundarySearch::pop`].
    pub fn nfound(&self) -> usize {
        self.found.len()
    }

    /// Take the recorded match offsets, oldest first.
    pub fn pop(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.found)
    }

    /// Bytes fed through [`BoundarySearch::find`] so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// `true` if the stream so far ends in a proper prefix of the needle.
    pub fn has_trailing(&self) -> bool {
        !self.window.is_empty()
    }

    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    pub fn max_find(&self) -> usize {
        self.max_find
    }

    /// Forget all matches and stream position.
    pub fn reset(&mut self) {
        self.found.clear();
        self.total = 0;
        self.window.clear();
    }

    /// Keep only the longest suffix of the window, starting at or after
    /// `min_start`, that is a proper prefix of the needle.
    fn keep_tail(&mut self, len: usize, min_start: usize) {
        let longest = (self.needle.len() - 1).min(len - min_start);
        let keep = (1..=longest)
            .rev()
            .find(|&k| self.window[len - k..] == self.needle[..k])
            .unwrap_or(0);
        self.window.drain(..len - keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_table_uses_last_occurrence() {
        let search = BoundarySearch::new("abcab", 1).unwrap();
        assert_eq!(search.skip[usize::from(b'a')], 1);
        assert_eq!(search.skip[usize::from(b'b')], 3);
        assert_eq!(search.skip[usize::from(b'c')], 2);
        assert_eq!(search.skip[usize::from(b'z')], 5);
    }

    #[test]
    fn empty_needle_is_rejected() {
        assert_eq!(
            BoundarySearch::new("", 3).unwrap_err(),
            SearchError::EmptyNeedle
        );
    }

    #[test]
    fn tail_is_the_longest_needle_prefix() {
        let mut search = BoundarySearch::new("aab", 4).unwrap();
        search.find(b"xxaa").unwrap();
        assert_eq!(search.window, b"aa");
        search.find(b"a").unwrap();
        assert_eq!(search.window, b"aa");
        assert_eq!(search.find(b"b").unwrap(), 1);
        assert_eq!(search.pop(), vec![3]);
        assert!(!search.has_trailing());
    }

    #[test]
    fn matches_do_not_overlap() {
        let mut search = BoundarySearch::new("aa", 8).unwrap();
        assert_eq!(search.find(b"aaaaa").unwrap(), 2);
        assert_eq!(search.pop(), vec![0, 2]);
        // The fifth 'a' still starts a possible match.
        assert!(search.has_trailing());
        assert_eq!(search.find(b"a").unwrap(), 1);
        assert_eq!(search.pop(), vec![4]);
    }

    #[test]
    fn single_byte_needle_never_trails() {
        let mut search = BoundarySearch::new("-", 8).unwrap();
        assert_eq!(search.find(b"a-b-").unwrap(), 2);
        assert!(!search.has_trailing());
        assert_eq!(search.pop(), vec![1, 3]);
    }
}
