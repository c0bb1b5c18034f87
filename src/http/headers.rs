use crate::http::parser::ParseError;

const CRLF: &[u8] = b"\r\n";

/// Case-insensitive header container.
///
/// Names are stored lower-cased. Setting a name that is already present
/// appends the new value joined with `", "`, which is how repeated header
/// lines are coalesced while parsing. Entries keep their insertion order so
/// responses are written in the order headers were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name`, or an empty string if it is absent.
    pub fn get(&self, name: &str) -> &str {
        self.position(name)
            .map(|i| self.entries[i].1.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Adds a value, joining it onto an existing one with `", "`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self
                .entries
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    /// Overwrites any existing value.
    pub fn replace(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = value.to_string(),
            None => self
                .entries
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    pub fn delete(&mut self, name: &str) {
        if let Some(i) = self.position(name) {
            self.entries.remove(i);
        }
    }

    /// Returns the declared body length.
    ///
    /// A numeric `content-length` wins. Without one, `transfer-encoding:
    /// chunked` counts as present with an unspecified length of `0`.
    pub fn has_content_length(&self) -> Option<usize> {
        match self.get("content-length").parse::<usize>() {
            Ok(len) => Some(len),
            Err(_) if self.get("transfer-encoding").eq_ignore_ascii_case("chunked") => Some(0),
            Err(_) => None,
        }
    }

    /// Parses one physical header line from the front of `buf`.
    ///
    /// Returns the number of bytes consumed and whether the blank line that
    /// ends the header section was reached. Nothing is consumed until a full
    /// line is available.
    pub fn parse_line(&mut self, buf: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(end) = find_crlf(buf) else {
            return Ok((0, false));
        };

        if end == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = &buf[..end];
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::InvalidHeaderLine)?;

        let name = trim_start_spaces(&line[..colon]);
        if name.is_empty() || name.ends_with(b" ") || !name.iter().all(|&b| is_token(b)) {
            return Err(ParseError::InvalidHeaderLine);
        }

        let value = std::str::from_utf8(&line[colon + 1..])
            .map_err(|_| ParseError::InvalidHeaderLine)?
            .trim_matches(|c: char| c == ' ' || c == '\t');

        // token bytes are ASCII, so this cannot fail
        let name = std::str::from_utf8(name).map_err(|_| ParseError::InvalidHeaderLine)?;
        self.set(name, value);

        Ok((end + CRLF.len(), false))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k.as_ref(), v.as_ref());
        }
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

fn trim_start_spaces(mut bytes: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = bytes {
        bytes = rest;
    }
    bytes
}

fn is_token(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}
