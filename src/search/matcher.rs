use memchr::memmem;

/// Finds every start column of a literal token in a line, overlaps included.
pub struct TokenMatcher {
    finder: memmem::Finder<'static>,
}

impl TokenMatcher {
    pub fn new(token: &str) -> Self {
        Self {
            finder: memmem::Finder::new(token.as_bytes()).into_owned(),
        }
    }

    /// 1-based character columns at which the token starts in `line`.
    ///
    /// Matching is done on bytes; a UTF-8 needle can only match at character
    /// boundaries of UTF-8 text, so byte offsets map cleanly to columns.
    pub fn columns(&self, line: &str) -> Vec<usize> {
        let bytes = line.as_bytes();
        let mut columns = Vec::new();

        let mut search_from = 0;
        let mut counted_to = 0;
        let mut column = 1;

        while let Some(found) = self.finder.find(&bytes[search_from..]) {
            let start = search_from + found;
            column += line[counted_to..start].chars().count();
            counted_to = start;
            columns.push(column);

            // Step one character so overlapping occurrences are reported
            let step = line[start..].chars().next().map_or(1, char::len_utf8);
            search_from = start + step;
            if search_from > bytes.len() {
                break;
            }
        }

        columns
    }
}
