//! Pluggable encoding seam for `WriteBatch` payloads. Kept as an ambient
//! extension point in the teacher's style: durability never needs to
//! know how a batch is encoded, only that it's a byte slice.

use strata_core::error::Result;

/// Encodes and decodes the opaque batch payload carried by a `WalRecord`.
/// The default (and only) codec shipped here treats batches as already
/// being framed bytes; callers that need structured batches (key/value
/// pairs, column family routing) implement this seam on the engine side.
pub trait BatchCodec: Send + Sync {
    /// Validate that `bytes` is a well-formed batch without fully
    /// decoding it. Used by the engine's `ReplaySink` before applying.
    fn validate(&self, bytes: &[u8]) -> Result<()>;
}

/// A codec that accepts any non-empty byte slice. Useful as a default
/// when the engine's own batch format already self-validates.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueBatchCodec;

impl BatchCodec for OpaqueBatchCodec {
    fn validate(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(strata_core::error::Error::corruption("empty WAL batch payload"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_codec_rejects_empty_batch() {
        let codec = OpaqueBatchCodec;
        assert!(codec.validate(&[]).is_err());
        assert!(codec.validate(&[1, 2, 3]).is_ok());
    }
}
