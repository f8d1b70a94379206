use std::fmt;

/// Bodies longer than this are cut in logs. Inline documents easily reach megabytes.
const PREVIEW_LIMIT: usize = 4096;

/// A loggable view of a wire body: UTF-8 is shown as is, other bytes are escaped, and long
/// bodies are truncated with a note of how much was left out.
pub(crate) struct BodyPreview<'a> {
    bytes: &'a [u8],
    limit: usize,
}

impl<'a> BodyPreview<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        BodyPreview {
            bytes,
            limit: PREVIEW_LIMIT,
        }
    }

    #[cfg(test)]
    fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl fmt::Debug for BodyPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (shown, rest) = self.bytes.split_at(self.bytes.len().min(self.limit));
        match std::str::from_utf8(shown) {
            Ok(s) => f.write_str(s)?,
            // A cut may land inside a character; keep the valid prefix readable.
            Err(e) if e.error_len().is_none() => {
                let (valid, tail) = shown.split_at(e.valid_up_to());
                f.write_str(&String::from_utf8_lossy(valid))?;
                escape(f, tail)?;
            }
            Err(_) => escape(f, shown)?,
        }
        if !rest.is_empty() {
            write!(f, "... ({} more bytes)", rest.len())?;
        }
        Ok(())
    }
}

fn escape(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &c in bytes {
        match c {
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            b'\\' => f.write_str("\\\\")?,
            c if c.is_ascii_graphic() || c == b' ' => write!(f, "{}", c as char)?,
            c => write!(f, "\\x{c:02x}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_body_is_shown_verbatim() {
        let preview = BodyPreview::new(b"{\"text\":\"h\xc3\xa9\"}");
        assert_eq!(format!("{preview:?}"), "{\"text\":\"hé\"}");
    }

    #[test]
    fn test_binary_body_is_escaped() {
        let preview = BodyPreview::new(b"ok\xff\n");
        assert_eq!(format!("{preview:?}"), "ok\\xff\\n");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let preview = BodyPreview::new(b"abcdefgh").with_limit(3);
        assert_eq!(format!("{preview:?}"), "abc... (5 more bytes)");

        // Cut in the middle of "é".
        let preview = BodyPreview::new("aé".as_bytes()).with_limit(2);
        assert_eq!(format!("{preview:?}"), "a\\xc3... (1 more bytes)");
    }
}
