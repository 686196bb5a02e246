use paste::paste;

use crate::{
    endian::Endian,
    error::{Corruption, Error, Result},
    utils::saturating_usize,
};

/// Generates a `read_<ty>` method that decodes one fixed-width scalar in the reader's byte order.
macro_rules! read_scalars {
    ($($t:ty),* $(,)?) => {
        paste! {
            $(
                #[inline]
                pub fn [<read_ $t>](&mut self) -> Result<$t> {
                    const SIZE: usize = core::mem::size_of::<$t>();

                    let mut buf = [0; SIZE];
                    buf.copy_from_slice(self.take(SIZE)?);

                    Ok(match self.endian {
                        Endian::Little => <$t>::from_le_bytes(buf),
                        Endian::Big => <$t>::from_be_bytes(buf),
                    })
                }
            )*
        }
    };
}

/// A bounds-checked cursor over the bytes of a byte file.
///
/// Every read checks the remaining length first; running off the end is a
/// [`Corruption::UnexpectedEof`] carrying the offset of the failed read.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            cursor: 0,
            endian,
        }
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(Error::corrupt(
                self.cursor,
                Corruption::UnexpectedEof {
                    needed: len,
                    remaining,
                },
            ));
        }

        let bytes = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    read_scalars!(u8, u16, u32, u64, i64, f64);

    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.cursor;

        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(Error::corrupt(offset, Corruption::InvalidBoolean(byte))),
        }
    }

    /// Reads a string with a `u64` length prefix.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let len = self.read_u64()?;
        self.read_utf8(saturating_usize(len))
    }

    /// Reads a string with a `u8` length prefix.
    pub fn read_short_string(&mut self) -> Result<&'a str> {
        let len = self.read_u8()?;
        self.read_utf8(len as usize)
    }

    fn read_utf8(&mut self, len: usize) -> Result<&'a str> {
        let offset = self.cursor;
        let bytes = self.take(len)?;

        std::str::from_utf8(bytes).map_err(|_| Error::corrupt(offset, Corruption::InvalidUtf8))
    }

    /// Reads one UTF-8 encoded character. The sequence length comes from the lead byte.
    pub fn read_character(&mut self) -> Result<char> {
        let offset = self.cursor;
        let invalid = |kind| Error::corrupt(offset, kind);

        let lead = self.read_u8()?;
        let (len, mut code, min) = match lead {
            0x00..=0x7F => return Ok(lead as char),
            0xC0..=0xDF => (2, (lead & 0x1F) as u32, 0x80),
            0xE0..=0xEF => (3, (lead & 0x0F) as u32, 0x800),
            0xF0..=0xF7 => (4, (lead & 0x07) as u32, 0x1_0000),
            _ => return Err(invalid(Corruption::InvalidUtf8)),
        };

        for &byte in self.take(len - 1)? {
            if byte & 0xC0 != 0x80 {
                return Err(invalid(Corruption::InvalidUtf8));
            }
            code = (code << 6) | (byte & 0x3F) as u32;
        }

        // Overlong encodings.
        if code < min {
            return Err(invalid(Corruption::InvalidUtf8));
        }

        char::from_u32(code).ok_or_else(|| invalid(Corruption::InvalidCharacter(code)))
    }

    /// Reads a `u64` element count and checks that `count` elements of at least `min_size` bytes
    /// each can still fit in the input.
    pub fn read_count(&mut self, what: &'static str, min_size: usize) -> Result<usize> {
        let offset = self.cursor;
        let count = self.read_u64()?;
        self.check_count(offset, what, count, min_size)
    }

    /// Like [`read_count`](Self::read_count), for tables with a `u8` count.
    pub fn read_short_count(&mut self, what: &'static str, min_size: usize) -> Result<usize> {
        let offset = self.cursor;
        let count = self.read_u8()?;
        self.check_count(offset, what, count as u64, min_size)
    }

    fn check_count(
        &self,
        offset: usize,
        what: &'static str,
        count: u64,
        min_size: usize,
    ) -> Result<usize> {
        let remaining = self.remaining();
        let needed = saturating_usize(count).saturating_mul(min_size.max(1));

        if needed > remaining {
            return Err(Error::corrupt(
                offset,
                Corruption::CountOverflow {
                    what,
                    count,
                    remaining,
                },
            ));
        }

        Ok(saturating_usize(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corruption(result: Result<impl std::fmt::Debug>) -> (usize, Corruption) {
        match result {
            Err(Error::CorruptByteFile { offset, kind }) => (offset, kind),
            other => panic!("expected a corrupt byte file error, got {other:?}"),
        }
    }

    #[test]
    fn characters_of_every_width() {
        let bytes = [0x41, 0xEA, 0xB0, 0x80, 0xF0, 0x9F, 0x98, 0x80, 0xC3, 0xA9];
        let mut reader = ByteReader::new(&bytes, Endian::Little);

        assert_eq!(reader.read_character().unwrap(), 'A');
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_character().unwrap(), '가');
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read_character().unwrap(), '😀');
        assert_eq!(reader.position(), 8);
        assert_eq!(reader.read_character().unwrap(), 'é');
        assert!(reader.is_empty());
    }

    #[test]
    fn malformed_characters_are_rejected() {
        let mut reader = ByteReader::new(&[0xEA, 0x41, 0x80], Endian::Little);
        assert_eq!(corruption(reader.read_character()), (0, Corruption::InvalidUtf8));

        // Continuation byte as lead.
        let (_, kind) = corruption(ByteReader::new(&[0x80], Endian::Little).read_character());
        assert_eq!(kind, Corruption::InvalidUtf8);

        // Overlong 'A'.
        let (_, kind) = corruption(ByteReader::new(&[0xC1, 0x81], Endian::Little).read_character());
        assert_eq!(kind, Corruption::InvalidUtf8);

        // Surrogate half.
        let (_, kind) =
            corruption(ByteReader::new(&[0xED, 0xA0, 0x80], Endian::Little).read_character());
        assert_eq!(kind, Corruption::InvalidCharacter(0xD800));

        let (_, kind) = corruption(ByteReader::new(&[0xF0, 0x9F], Endian::Little).read_character());
        assert!(matches!(kind, Corruption::UnexpectedEof { needed: 3, remaining: 1 }));
    }

    #[test]
    fn scalars_follow_configured_byte_order() {
        let bytes = [0x01, 0x02, 0x03, 0x04];

        assert_eq!(
            ByteReader::new(&bytes, Endian::Little).read_u32().unwrap(),
            0x0403_0201
        );
        assert_eq!(
            ByteReader::new(&bytes, Endian::Big).read_u32().unwrap(),
            0x0102_0304
        );
        assert_eq!(
            ByteReader::new(&bytes, Endian::Big).read_u16().unwrap(),
            0x0102
        );
    }

    #[test]
    fn reads_past_end_fail_without_advancing() {
        let mut reader = ByteReader::new(&[1, 2, 3], Endian::Little);
        reader.read_u8().unwrap();

        let (offset, kind) = corruption(reader.read_u64());
        assert_eq!(offset, 1);
        assert_eq!(
            kind,
            Corruption::UnexpectedEof {
                needed: 8,
                remaining: 2
            }
        );
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn booleans_must_be_zero_or_one() {
        let mut reader = ByteReader::new(&[0, 1, 2], Endian::Little);

        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert_eq!(corruption(reader.read_bool()), (2, Corruption::InvalidBoolean(2)));
    }

    #[test]
    fn strings_are_length_prefixed_utf8() {
        let mut bytes = 6u64.to_le_bytes().to_vec();
        bytes.extend_from_slice("하늘".as_bytes());
        bytes.push(2);
        bytes.extend_from_slice(b"hi");
        bytes.push(1);
        bytes.push(0xFF);

        let mut reader = ByteReader::new(&bytes, Endian::Little);
        assert_eq!(reader.read_string().unwrap(), "하늘");
        assert_eq!(reader.read_short_string().unwrap(), "hi");
        assert_eq!(corruption(reader.read_short_string()).1, Corruption::InvalidUtf8);
    }

    #[test]
    fn huge_counts_are_rejected_before_allocation() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 4]);

        let (offset, kind) =
            corruption(ByteReader::new(&bytes, Endian::Little).read_count("constant", 1));
        assert_eq!(offset, 0);
        assert_eq!(
            kind,
            Corruption::CountOverflow {
                what: "constant",
                count: u64::MAX,
                remaining: 4
            }
        );

        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 4]);
        assert_eq!(
            ByteReader::new(&bytes, Endian::Little)
                .read_count("line", 2)
                .unwrap(),
            2
        );
    }
}
