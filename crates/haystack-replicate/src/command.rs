//! The replicated write command: the deterministic state-machine entry
//! consensus carries from the leader to every replica.

use haystack_storage::Needle;
use haystack_types::{Cookie, VolumeId};

use crate::error::{ReplicateError, ReplicateResult};

/// `{Vid, EncodedNeedle}` — the payload consensus replicates for one
/// write. `encoded_needle` is produced by [`Needle::encode_payload`]: it
/// carries every field except `Offset` and `Size`, which are positional
/// and assigned deterministically when the command is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub vid: VolumeId,
    pub encoded_needle: Vec<u8>,
}

impl WriteCommand {
    pub fn new(vid: VolumeId, needle: &Needle) -> Self {
        Self {
            vid,
            encoded_needle: needle.encode_payload(),
        }
    }

    /// Serializes the command for transport/log storage: `Vid(4) ||
    /// EncodedNeedle`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.encoded_needle.len());
        buf.extend_from_slice(&self.vid.as_u32().to_be_bytes());
        buf.extend_from_slice(&self.encoded_needle);
        buf
    }

    pub fn decode(bytes: &[u8]) -> ReplicateResult<Self> {
        if bytes.len() < 4 {
            return Err(ReplicateError::MalformedCommand(
                "command shorter than the 4-byte Vid prefix".to_string(),
            ));
        }
        let vid = VolumeId::new(u32::from_be_bytes(bytes[0..4].try_into().expect("4 bytes")));
        Ok(Self {
            vid,
            encoded_needle: bytes[4..].to_vec(),
        })
    }
}

/// The log-command return value, reported back to the client that
/// submitted the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRes {
    pub vid: VolumeId,
    pub cookie: Cookie,
    pub offset: u64,
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_encode_decode() {
        let needle = Needle::new(11, b"hello".to_vec()).unwrap();
        let command = WriteCommand::new(VolumeId::new(2), &needle);
        let bytes = command.encode();
        let decoded = WriteCommand::decode(&bytes).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(WriteCommand::decode(&[1, 2, 3]).is_err());
    }
}
