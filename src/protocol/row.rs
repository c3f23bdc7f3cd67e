use crate::constant::NULL_VALUE;
use crate::error::{Error, Result};
use crate::protocol::primitive::read_string_lenenc;

/// A borrowed text-protocol row.
///
/// Each column is either `0xFB` (NULL) or a length-encoded string. The payload
/// belongs to the connection's receive buffer and is only valid until the next
/// call that mutates the connection.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    payload: &'a [u8],
    num_columns: usize,
}

impl<'a> RowRef<'a> {
    /// Wrap a row payload, checking that it holds exactly `num_columns` values.
    pub fn new(payload: &'a [u8], num_columns: usize) -> Result<Self> {
        let mut rest = payload;
        for _ in 0..num_columns {
            (_, rest) = read_text_value(rest)?;
        }
        if !rest.is_empty() {
            return Err(Error::InvalidPacket);
        }
        Ok(Self {
            payload,
            num_columns,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Raw payload bytes of the row packet
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn values(&self) -> TextValues<'a> {
        TextValues {
            rest: self.payload,
            remaining: self.num_columns,
        }
    }

    /// Value of column `idx`; `Ok(None)` for NULL.
    pub fn get(&self, idx: usize) -> Result<Option<&'a [u8]>> {
        self.values()
            .nth(idx)
            .unwrap_or_else(|| Err(Error::BadUsageError(format!("no column at index {idx}"))))
    }
}

/// Iterator over the values of a [`RowRef`]
pub struct TextValues<'a> {
    rest: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for TextValues<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match read_text_value(self.rest) {
            Ok((value, rest)) => {
                self.rest = rest;
                Some(Ok(value))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

fn read_text_value(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    match data.split_first() {
        Some((&NULL_VALUE, rest)) => Ok((None, rest)),
        Some(_) => read_string_lenenc(data).map(|(value, rest)| (Some(value), rest)),
        None => Err(Error::UnexpectedEof),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_with_null() {
        let payload = [0x01, b'1', 0xFB, 0x03, b'a', b'b', b'c'];
        let row = RowRef::new(&payload, 3).unwrap();
        let values: Vec<_> = row.values().collect::<Result<_>>().unwrap();
        assert_eq!(values, vec![Some(&b"1"[..]), None, Some(&b"abc"[..])]);
        assert_eq!(row.get(2).unwrap(), Some(&b"abc"[..]));
        assert!(row.get(3).is_err());
    }

    #[test]
    fn empty_string_is_not_null() {
        let row = RowRef::new(&[0x00], 1).unwrap();
        assert_eq!(row.get(0).unwrap(), Some(&b""[..]));
    }

    #[test]
    fn column_count_mismatch() {
        let payload = [0x01, b'1', 0x01, b'2'];
        assert!(matches!(RowRef::new(&payload, 1), Err(Error::InvalidPacket)));
        assert!(matches!(RowRef::new(&payload, 3), Err(Error::UnexpectedEof)));
    }
}
