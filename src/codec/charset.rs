//! Named character encodings for export and import files.
//!
//! Lines are framed on the encoding's own LF code unit, so a UTF-16 file is
//! split on `0A 00` (little endian) or `00 0A` (big endian) rather than on a
//! raw `0x0A` byte that may be half of another character.

use std::fmt;

use crate::error::{ExportError, ParseError, ParseErrorKind};

/// Byte-order mark as it appears at the start of a decoded first line.
pub const BOM: char = '\u{feff}';

/// A text encoding supported for export destinations and import sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CharacterEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl CharacterEncoding {
    /// Resolve an encoding name, ignoring case and `-`/`_` separators.
    ///
    /// `UTF-16` on its own means big endian, as the IANA registry reads it.
    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        let key: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "utf8" => Ok(CharacterEncoding::Utf8),
            "utf16le" => Ok(CharacterEncoding::Utf16Le),
            "utf16be" | "utf16" => Ok(CharacterEncoding::Utf16Be),
            "iso88591" | "latin1" | "l1" | "iso8859" => Ok(CharacterEncoding::Latin1),
            "usascii" | "ascii" => Ok(CharacterEncoding::Ascii),
            _ => Err(ParseError::new(
                ParseErrorKind::UnsupportedEncoding,
                format!("unknown character encoding '{name}'"),
            )),
        }
    }

    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            CharacterEncoding::Utf8 => "UTF-8",
            CharacterEncoding::Utf16Le => "UTF-16LE",
            CharacterEncoding::Utf16Be => "UTF-16BE",
            CharacterEncoding::Latin1 => "ISO-8859-1",
            CharacterEncoding::Ascii => "US-ASCII",
        }
    }

    /// Width in bytes of one code unit.
    pub fn unit_width(&self) -> usize {
        match self {
            CharacterEncoding::Utf16Le | CharacterEncoding::Utf16Be => 2,
            _ => 1,
        }
    }

    /// Encode `text`; characters the encoding cannot represent are an error.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ExportError> {
        match self {
            CharacterEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            CharacterEncoding::Utf16Le => {
                Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
            }
            CharacterEncoding::Utf16Be => {
                Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
            }
            CharacterEncoding::Latin1 => self.encode_single_byte(text, 0xFF),
            CharacterEncoding::Ascii => self.encode_single_byte(text, 0x7F),
        }
    }

    fn encode_single_byte(&self, text: &str, max: u32) -> Result<Vec<u8>, ExportError> {
        text.chars()
            .map(|c| {
                let code = c as u32;
                if code <= max {
                    Ok(code as u8)
                } else {
                    Err(ExportError::Encoding(format!(
                        "character {c:?} (U+{code:04X}) cannot be encoded as {}",
                        self.name()
                    )))
                }
            })
            .collect()
    }

    /// Decode a complete byte sequence.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, ParseError> {
        match self {
            CharacterEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| decoding_error(format!("invalid UTF-8: {e}"))),
            CharacterEncoding::Utf16Le | CharacterEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(decoding_error("odd number of bytes in UTF-16 text"));
                }
                let little = *self == CharacterEncoding::Utf16Le;
                let units = bytes.chunks_exact(2).map(|pair| {
                    if little {
                        u16::from_le_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_be_bytes([pair[0], pair[1]])
                    }
                });
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|e| decoding_error(format!("invalid UTF-16: {e}")))
            }
            CharacterEncoding::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            CharacterEncoding::Ascii => bytes
                .iter()
                .map(|b| {
                    if b.is_ascii() {
                        Ok(char::from(*b))
                    } else {
                        Err(decoding_error(format!("byte 0x{b:02X} is not US-ASCII")))
                    }
                })
                .collect(),
        }
    }

    /// The encoded LF code unit.
    pub fn newline(&self) -> &'static [u8] {
        match self {
            CharacterEncoding::Utf16Le => &[0x0A, 0x00],
            CharacterEncoding::Utf16Be => &[0x00, 0x0A],
            _ => b"\n",
        }
    }
}

impl fmt::Display for CharacterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decoding_error(message: impl Into<String>) -> ParseError {
    ParseError::new(ParseErrorKind::Decoding, message)
}

/// Splits an incoming byte stream into encoded lines.
///
/// Bytes are pushed as they arrive; complete lines (terminator removed) are
/// pulled with [`LineDecoder::next_line`]. A trailing carriage return is
/// dropped when the line is decoded.
#[derive(Debug)]
pub struct LineDecoder {
    encoding: CharacterEncoding,
    pending: Vec<u8>,
    start: usize,
    scanned: usize,
}

impl LineDecoder {
    pub fn new(encoding: CharacterEncoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
            start: 0,
            scanned: 0,
        }
    }

    pub fn encoding(&self) -> CharacterEncoding {
        self.encoding
    }

    /// Append raw bytes read from the source.
    ///
    /// Lines already handed out are discarded here, once per chunk.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.pending.extend_from_slice(bytes);
    }

    /// Take the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.encoding.newline();
        let width = newline.len();
        let mut offset = self.scanned.max(self.start);
        while offset + width <= self.pending.len() {
            if &self.pending[offset..offset + width] == newline {
                let line = self.pending[self.start..offset].to_vec();
                self.start = offset + width;
                self.scanned = self.start;
                return Some(line);
            }
            offset += width;
        }
        self.scanned = offset;
        None
    }

    /// Take whatever is left once the source is exhausted.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = self.pending.split_off(self.start);
        self.pending.clear();
        self.start = 0;
        self.scanned = 0;
        if rest.is_empty() { None } else { Some(rest) }
    }

    /// Decode one raw line, dropping a trailing CR.
    pub fn decode_line(&self, raw: &[u8]) -> Result<String, ParseError> {
        let mut text = self.encoding.decode(raw)?;
        if text.ends_with('\r') {
            text.pop();
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(CharacterEncoding::from_name("utf-8").unwrap(), CharacterEncoding::Utf8);
        assert_eq!(CharacterEncoding::from_name("UTF8").unwrap(), CharacterEncoding::Utf8);
        assert_eq!(
            CharacterEncoding::from_name("utf_16le").unwrap(),
            CharacterEncoding::Utf16Le
        );
        assert_eq!(
            CharacterEncoding::from_name("UTF-16").unwrap(),
            CharacterEncoding::Utf16Be
        );
        assert_eq!(
            CharacterEncoding::from_name("latin1").unwrap(),
            CharacterEncoding::Latin1
        );
        let err = CharacterEncoding::from_name("KOI8-R").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn test_utf16_round_trip() {
        for encoding in [CharacterEncoding::Utf16Le, CharacterEncoding::Utf16Be] {
            let text = "{\"name\":\"Zoë 😀\"}";
            let bytes = encoding.encode(text).unwrap();
            assert_eq!(bytes.len() % 2, 0);
            assert_eq!(encoding.decode(&bytes).unwrap(), text);
        }
    }

    #[test]
    fn test_latin1_rejects_unmappable() {
        let encoding = CharacterEncoding::Latin1;
        assert_eq!(encoding.encode("café").unwrap(), b"caf\xe9".to_vec());
        assert_eq!(encoding.decode(b"caf\xe9").unwrap(), "café");
        assert!(encoding.encode("€").is_err());
    }

    #[test]
    fn test_ascii_decode_rejects_high_bytes() {
        assert!(CharacterEncoding::Ascii.decode(b"ok\xff").is_err());
    }

    #[test]
    fn test_line_decoder_utf8_with_crlf_and_partial_chunks() {
        let mut decoder = LineDecoder::new(CharacterEncoding::Utf8);
        decoder.push(b"{\"a\":1}\r\n{\"a\"");
        let first = decoder.next_line().unwrap();
        assert_eq!(decoder.decode_line(&first).unwrap(), "{\"a\":1}");
        assert!(decoder.next_line().is_none());
        decoder.push(b":2}");
        assert!(decoder.next_line().is_none());
        let rest = decoder.finish().unwrap();
        assert_eq!(decoder.decode_line(&rest).unwrap(), "{\"a\":2}");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_line_decoder_utf16_ignores_misaligned_newline_bytes() {
        let encoding = CharacterEncoding::Utf16Le;
        // U+0A0A encodes as 0A 0A, which must not be taken for a newline
        let text = "\u{0a0a}x\ny";
        let bytes = encoding.encode(text).unwrap();
        let mut decoder = LineDecoder::new(encoding);
        decoder.push(&bytes[..3]);
        assert!(decoder.next_line().is_none());
        decoder.push(&bytes[3..]);
        let first = decoder.next_line().unwrap();
        assert_eq!(decoder.decode_line(&first).unwrap(), "\u{0a0a}x");
        let rest = decoder.finish().unwrap();
        assert_eq!(decoder.decode_line(&rest).unwrap(), "y");
    }

    #[test]
    fn test_line_decoder_many_lines_across_chunks() {
        let mut input = Vec::new();
        for i in 0..500 {
            input.extend_from_slice(format!("{{\"n\":{i}}}\n").as_bytes());
        }
        let mut decoder = LineDecoder::new(CharacterEncoding::Utf8);
        let mut lines = Vec::new();
        for chunk in input.chunks(37) {
            decoder.push(chunk);
            assert!(decoder.pending.len() < chunk.len() + 10);
            while let Some(line) = decoder.next_line() {
                lines.push(decoder.decode_line(&line).unwrap());
            }
        }
        assert!(decoder.finish().is_none());
        assert_eq!(lines.len(), 500);
        assert_eq!(lines[0], "{\"n\":0}");
        assert_eq!(lines[499], "{\"n\":499}");
    }
}
