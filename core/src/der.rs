//! DER-style TLV support for the OATH application.
//!
//! Every record is a single-octet tag, a length in DER short or long form,
//! and the value itself.

/// Errors raised while decoding TLV records from a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Expected a TLV record but the buffer is empty")]
    Empty,

    #[error("TLV record is truncated: {expected} octets expected, {available} available")]
    Truncated { expected: usize, available: usize },

    #[error("Invalid length encoding ({0:#04X})")]
    InvalidLength(u8),

    #[error("Wrong tag. Expected: {expected:#04X}, got: {found:#04X}")]
    TagMismatch { expected: u8, found: u8 },

    #[error("Invalid value in the record tagged {0:#04X}")]
    InvalidValue(u8),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stateful TLV reader over a response buffer.
pub struct Reader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from the buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Determines whether every record has been consumed.
    pub fn is_empty(&self) -> bool {
        self.cursor >= self.buffer.len()
    }

    /// The octets not consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.cursor.min(self.buffer.len())..]
    }

    /// Reads data of specified size and seeks the cursor.
    fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        let rest = self.rest();
        if rest.len() < length {
            return Err(Error::Truncated {
                expected: length,
                available: rest.len(),
            });
        }

        self.cursor += length;
        Ok(&rest[..length])
    }

    /// Reads a next octet and seeks the cursor.
    fn next_octet(&mut self) -> Result<u8> {
        self.read(1).map(|octet| octet[0])
    }

    /// Reads the length of data at the current position, seeking the cursor.
    fn read_length(&mut self) -> Result<usize> {
        let head = self.next_octet()?;
        if head & 0x80 == 0 {
            return Ok(head as usize);
        }

        let count = (head & 0x7F) as usize;
        if count == 0 || count > std::mem::size_of::<u32>() {
            return Err(Error::InvalidLength(head));
        }

        Ok(self
            .read(count)?
            .iter()
            .fold(0usize, |size, &octet| (size << 8) | octet as usize))
    }

    /// Reads the next record whatever its tag is, seeking the cursor.
    pub fn read_any(&mut self) -> Result<(u8, &'a [u8])> {
        if self.is_empty() {
            return Err(Error::Empty);
        }

        let tag = self.next_octet()?;
        let length = self.read_length()?;

        Ok((tag, self.read(length)?))
    }

    /// Reads the next record, which must carry the tag.
    pub fn read_tag(&mut self, expected: u8) -> Result<&'a [u8]> {
        match self.read_any()? {
            (found, value) if found == expected => Ok(value),
            (found, _) => Err(Error::TagMismatch { expected, found }),
        }
    }
}

/// Decodes the first record, returning its tag, value and the rest of the buffer.
pub fn decode(buffer: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    let mut reader = Reader::new(buffer);
    let (tag, value) = reader.read_any()?;

    Ok((tag, value, reader.rest()))
}

/// Decodes the first record, which must carry the tag, returning its value and the rest.
pub fn decode_tag(buffer: &[u8], tag: u8) -> Result<(&[u8], &[u8])> {
    let mut reader = Reader::new(buffer);
    let value = reader.read_tag(tag)?;

    Ok((value, reader.rest()))
}

/// Encodes a length in DER short form below 0x80, long form otherwise.
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }

    let octets = length.to_be_bytes();
    let skip = octets.iter().take_while(|&&octet| octet == 0).count();
    let significant = &octets[skip..];

    let mut buffer = Vec::with_capacity(1 + significant.len());
    buffer.push(0x80 | significant.len() as u8);
    buffer.extend_from_slice(significant);
    buffer
}

/// Encodes a single record.
pub fn encode(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut buffer = vec![tag];
    buffer.append(&mut encode_length(value.len()));
    buffer.extend_from_slice(value);
    buffer
}

/// Encodes the records in the given order and concatenates them.
pub fn pack(records: &[(u8, &[u8])]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|&(tag, value)| encode(tag, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for length in 0..=300 {
            let value: Vec<u8> = (0..length).map(|i| i as u8).collect();
            let encoded = encode(0x71, &value);

            assert_eq!((0x71, value.as_slice(), &[][..]), decode(&encoded).unwrap());
        }
    }

    #[test]
    fn test_long_form_boundary() {
        assert_eq!(vec![0x7F], encode_length(0x7F));
        assert_eq!(vec![0x81, 0x80], encode_length(0x80));
        assert_eq!(vec![0x81, 0xFF], encode_length(0xFF));
        assert_eq!(vec![0x82, 0x01, 0x2C], encode_length(300));
    }

    #[test]
    fn test_decode_non_minimal_long_form() {
        let short = [0x75, 0x02, 0xAB, 0xCD];
        let long = [0x75, 0x82, 0x00, 0x02, 0xAB, 0xCD];

        assert_eq!(decode(&short).unwrap(), decode(&long).unwrap());
    }

    #[test]
    fn test_decode_keeps_rest() {
        let buffer = pack(&[(0x79, &[4u8, 3, 1][..]), (0x71, &b"id"[..])]);
        let (version, rest) = decode_tag(&buffer, 0x79).unwrap();

        assert_eq!(&[4u8, 3, 1][..], version);
        assert_eq!(encode(0x71, b"id"), rest);
    }

    #[test]
    fn test_decode_tag_mismatch() {
        assert_eq!(
            Err(Error::TagMismatch {
                expected: 0x76,
                found: 0x75
            }),
            decode_tag(&[0x75, 0x00], 0x76),
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(Err(Error::Empty), decode(&[]));
        assert_eq!(
            Err(Error::Truncated {
                expected: 1,
                available: 0
            }),
            decode(&[0x71]),
        );
        assert_eq!(
            Err(Error::Truncated {
                expected: 4,
                available: 2
            }),
            decode(&[0x71, 0x04, 0x01, 0x02]),
        );
        assert_eq!(Err(Error::InvalidLength(0x80)), decode(&[0x71, 0x80]));
    }

    #[test]
    fn test_pack_keeps_order() {
        assert_eq!(
            vec![0x75, 0x01, 0xAA, 0x74, 0x00, 0x71, 0x01, 0xBB],
            pack(&[(0x75, &[0xAAu8][..]), (0x74, &[][..]), (0x71, &[0xBB][..])]),
        );
    }
}
