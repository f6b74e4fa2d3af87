//! The engine's `WriteBatch` wire format: the payload durability treats
//! as opaque bytes inside each `WalRecord` (spec §3 "byte payload of one
//! committed `WriteBatch`"). One batch is a sequence of per-column-family
//! puts/deletes, applied in order starting at the record's
//! `starting_sequence`.

use strata_core::error::{Error, Result};

/// One write within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    /// Target column family id.
    pub column_family_id: u32,
    /// User key.
    pub key: Vec<u8>,
    /// `None` marks a deletion.
    pub value: Option<Vec<u8>>,
}

/// A decoded batch: an ordered list of operations, all assigned
/// sequence numbers starting at the record's `starting_sequence`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// The operations, in commit order.
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// An empty batch (used for the go-live dummy anchor record).
    pub fn empty() -> Self {
        WriteBatch::default()
    }

    /// Append a put.
    pub fn put(&mut self, column_family_id: u32, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp { column_family_id, key, value: Some(value) });
    }

    /// Append a delete.
    pub fn delete(&mut self, column_family_id: u32, key: Vec<u8>) {
        self.ops.push(BatchOp { column_family_id, key, value: None });
    }

    /// Number of operations in this batch.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether this batch carries no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Encode to bytes: count(4) then per-op `cf_id(4) key_len(4) key
    /// has_value(1) [value_len(4) value]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for op in &self.ops {
            buf.extend_from_slice(&op.column_family_id.to_le_bytes());
            buf.extend_from_slice(&(op.key.len() as u32).to_le_bytes());
            buf.extend_from_slice(&op.key);
            match &op.value {
                Some(v) => {
                    buf.push(1);
                    buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                    buf.extend_from_slice(v);
                }
                None => buf.push(0),
            }
        }
        buf
    }

    /// Decode from bytes produced by [`WriteBatch::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let count = read_u32(bytes, &mut pos)?;
        let mut ops = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let column_family_id = read_u32(bytes, &mut pos)?;
            let key_len = read_u32(bytes, &mut pos)? as usize;
            let key = read_bytes(bytes, &mut pos, key_len)?;
            let has_value = read_u8(bytes, &mut pos)?;
            let value = if has_value == 1 {
                let value_len = read_u32(bytes, &mut pos)? as usize;
                Some(read_bytes(bytes, &mut pos, value_len)?)
            } else {
                None
            };
            ops.push(BatchOp { column_family_id, key, value });
        }
        Ok(WriteBatch { ops })
    }
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    if *pos + 1 > bytes.len() {
        return Err(Error::corruption("truncated WriteBatch"));
    }
    let v = bytes[*pos];
    *pos += 1;
    Ok(v)
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 4 > bytes.len() {
        return Err(Error::corruption("truncated WriteBatch"));
    }
    let v = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

fn read_bytes(bytes: &[u8], pos: &mut usize, len: usize) -> Result<Vec<u8>> {
    if *pos + len > bytes.len() {
        return Err(Error::corruption("truncated WriteBatch"));
    }
    let v = bytes[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(v)
}
