//! Text encodings and the incremental decoder.

use std::fmt;
use std::str::FromStr;

use crate::FsError;

/// A text encoding supported by text sessions.
///
/// Resolved from the usual labels, case-insensitively, with `_` and `-`
/// treated alike:
///
/// | Encoding | Labels |
/// |----------|--------|
/// | [`Utf8`](Encoding::Utf8) | `utf-8`, `utf8`, `u8` |
/// | [`Utf16Le`](Encoding::Utf16Le) | `utf-16le`, `utf-16-le` |
/// | [`Utf16Be`](Encoding::Utf16Be) | `utf-16be`, `utf-16-be` |
/// | [`Latin1`](Encoding::Latin1) | `latin-1`, `latin1`, `iso-8859-1`, `l1` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// UTF-16, little endian, no byte order mark.
    Utf16Le,
    /// UTF-16, big endian, no byte order mark.
    Utf16Be,
    /// ISO-8859-1: one byte per code point up to U+00FF.
    Latin1,
}

impl Encoding {
    /// Resolve an encoding label.
    ///
    /// # Errors
    ///
    /// - [`FsError::UnknownEncoding`] for labels not in the table above
    pub fn from_label(label: &str) -> Result<Self, FsError> {
        let key = label.trim().to_ascii_lowercase().replace('_', "-");
        match key.as_str() {
            "utf-8" | "utf8" | "u8" => Ok(Encoding::Utf8),
            "utf-16le" | "utf-16-le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf-16-be" | "utf16be" => Ok(Encoding::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(Encoding::Latin1),
            _ => Err(FsError::UnknownEncoding {
                label: label.to_string(),
            }),
        }
    }

    /// Canonical label.
    pub const fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Latin1 => "latin-1",
        }
    }

    /// A fresh incremental decoder for this encoding.
    pub fn decoder(&self) -> IncrementalDecoder {
        IncrementalDecoder::new(*self)
    }

    /// Encode `text`.
    ///
    /// # Errors
    ///
    /// - [`FsError::Encode`] if a character has no representation
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, FsError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Encoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| FsError::Encode {
                        encoding: self.name(),
                        details: format!("character {c:?} is outside latin-1"),
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

/// Decoder that accepts bytes in arbitrary chunks.
///
/// A multi-byte sequence split across two chunks is held back until the
/// rest arrives. Decoding is strict: malformed input fails, and so does a
/// sequence still incomplete when the final chunk is decoded.
///
/// # Example
///
/// ```rust
/// use vpath::Encoding;
///
/// let mut decoder = Encoding::Utf8.decoder();
/// let bytes = "é".as_bytes();
/// assert_eq!(decoder.decode(&bytes[..1], false).unwrap(), "");
/// assert_eq!(decoder.decode(&bytes[1..], true).unwrap(), "é");
/// ```
#[derive(Debug, Clone)]
pub struct IncrementalDecoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl IncrementalDecoder {
    /// A decoder in its initial state.
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    /// The encoding being decoded.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bytes held back from previous calls.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Forget any partial sequence.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Decode the next chunk. Pass `last = true` with the final chunk (which
    /// may be empty) to flush the decoder.
    ///
    /// # Errors
    ///
    /// - [`FsError::Decode`] on malformed input, or on a trailing partial
    ///   sequence when `last` is set
    pub fn decode(&mut self, bytes: &[u8], last: bool) -> Result<String, FsError> {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);
        let text = match self.encoding {
            Encoding::Utf8 => self.decode_utf8(input, last)?,
            Encoding::Utf16Le => self.decode_utf16(input, last, u16::from_le_bytes)?,
            Encoding::Utf16Be => self.decode_utf16(input, last, u16::from_be_bytes)?,
            Encoding::Latin1 => input.iter().map(|&b| char::from(b)).collect(),
        };
        Ok(text)
    }

    fn error(&self, details: String) -> FsError {
        FsError::Decode {
            encoding: self.encoding.name(),
            details,
        }
    }

    fn decode_utf8(&mut self, mut input: Vec<u8>, last: bool) -> Result<String, FsError> {
        let valid = match std::str::from_utf8(&input) {
            Ok(_) => input.len(),
            Err(e) => match e.error_len() {
                Some(len) => {
                    return Err(self.error(format!(
                        "invalid sequence of {len} byte(s) at offset {}",
                        e.valid_up_to()
                    )));
                }
                None if last => {
                    return Err(self.error(format!(
                        "truncated sequence of {} byte(s) at end of input",
                        input.len() - e.valid_up_to()
                    )));
                }
                None => e.valid_up_to(),
            },
        };
        self.pending = input.split_off(valid);
        String::from_utf8(input).map_err(|e| self.error(e.to_string()))
    }

    fn decode_utf16(
        &mut self,
        mut input: Vec<u8>,
        last: bool,
        unit: fn([u8; 2]) -> u16,
    ) -> Result<String, FsError> {
        let mut whole = input.len() - input.len() % 2;
        if whole >= 2 {
            let tail = unit([input[whole - 2], input[whole - 1]]);
            if (0xD800..0xDC00).contains(&tail) {
                // A high surrogate waits for its pair.
                whole -= 2;
            }
        }
        if last && whole != input.len() {
            return Err(self.error(format!(
                "truncated sequence of {} byte(s) at end of input",
                input.len() - whole
            )));
        }
        self.pending = input.split_off(whole);
        let units = input.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.map_err(|e| self.error(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_in_chunks(encoding: Encoding, bytes: &[u8], size: usize) -> String {
        let mut decoder = encoding.decoder();
        let mut out = String::new();
        for chunk in bytes.chunks(size) {
            out.push_str(&decoder.decode(chunk, false).unwrap());
        }
        out.push_str(&decoder.decode(&[], true).unwrap());
        out
    }

    #[test]
    fn labels() {
        assert_eq!(Encoding::from_label("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_label("utf_16_le").unwrap(), Encoding::Utf16Le);
        assert_eq!(Encoding::from_label("ISO-8859-1").unwrap(), Encoding::Latin1);
        assert_eq!("utf-16be".parse::<Encoding>().unwrap(), Encoding::Utf16Be);
        assert!(matches!(
            Encoding::from_label("ebcdic"),
            Err(FsError::UnknownEncoding { .. })
        ));
        assert_eq!(Encoding::default().to_string(), "utf-8");
    }

    #[test]
    fn utf8_sequences_split_at_every_byte() {
        let text = "aé€😀z";
        for size in 1..=4 {
            assert_eq!(decode_in_chunks(Encoding::Utf8, text.as_bytes(), size), text);
        }
    }

    #[test]
    fn utf16_split_surrogate_pairs() {
        let text = "x😀y";
        for encoding in [Encoding::Utf16Le, Encoding::Utf16Be] {
            let bytes = encoding.encode(text).unwrap();
            for size in 1..=3 {
                assert_eq!(decode_in_chunks(encoding, &bytes, size), text);
            }
        }
    }

    #[test]
    fn latin1_round_trip_and_unmappable() {
        let bytes = Encoding::Latin1.encode("café").unwrap();
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(decode_in_chunks(Encoding::Latin1, &bytes, 1), "café");
        assert!(matches!(
            Encoding::Latin1.encode("€"),
            Err(FsError::Encode { .. })
        ));
    }

    #[test]
    fn malformed_utf8_fails() {
        let mut decoder = Encoding::Utf8.decoder();
        assert!(matches!(
            decoder.decode(b"ok\xffno", false),
            Err(FsError::Decode { .. })
        ));
    }

    #[test]
    fn truncated_tail_fails_on_final() {
        let mut decoder = Encoding::Utf8.decoder();
        let euro = "€".as_bytes();
        assert_eq!(decoder.decode(&euro[..2], false).unwrap(), "");
        assert_eq!(decoder.pending().len(), 2);
        assert!(decoder.decode(&[], true).is_err());

        let mut decoder = Encoding::Utf16Le.decoder();
        assert!(decoder.decode(&[0x41], true).is_err());
    }

    #[test]
    fn reset_discards_partial_state() {
        let mut decoder = Encoding::Utf8.decoder();
        let euro = "€".as_bytes();
        decoder.decode(&euro[..1], false).unwrap();
        decoder.reset();
        assert!(decoder.pending().is_empty());
        assert_eq!(decoder.decode(b"plain", true).unwrap(), "plain");
    }
}
