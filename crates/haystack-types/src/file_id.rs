use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Cookie, VolumeId};

/// The logical handle returned to clients for a single needle:
/// `{volume, offset, size, cookie}`.
///
/// `offset` is in [`crate::PADDING_BLOCK`]-byte units, not raw bytes — see
/// [`crate::byte_position_from_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub volume_id: VolumeId,
    pub offset: u64,
    pub size: u32,
    pub cookie: Cookie,
}

impl FileId {
    pub fn new(volume_id: VolumeId, offset: u64, size: u32, cookie: Cookie) -> Self {
        Self {
            volume_id,
            offset,
            size,
            cookie,
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}/{}/{}",
            self.volume_id, self.offset, self.size, self.cookie
        )
    }
}

/// Error parsing a [`FileId`] from its canonical string form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFileIdError {
    #[error("missing ',' separating volume id from offset/size/cookie")]
    MissingComma,
    #[error("expected offset/size/cookie, got {0:?}")]
    MalformedTriple(String),
    #[error("invalid volume id: {0}")]
    VolumeId(#[from] crate::ParseVolumeIdError),
    #[error("invalid integer in file id")]
    Integer,
}

impl FromStr for FileId {
    type Err = ParseFileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vid_str, rest) = s.split_once(',').ok_or(ParseFileIdError::MissingComma)?;
        let volume_id: VolumeId = vid_str.parse()?;

        let mut parts = rest.split('/');
        let (Some(offset), Some(size), Some(cookie), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseFileIdError::MalformedTriple(rest.to_string()));
        };

        let offset = offset.parse().map_err(|_| ParseFileIdError::Integer)?;
        let size = size.parse().map_err(|_| ParseFileIdError::Integer)?;
        let cookie = cookie.parse().map_err(|_| ParseFileIdError::Integer)?;

        Ok(FileId::new(volume_id, offset, size, cookie))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let fid = FileId::new(VolumeId::new(2), 0, 5, 123);
        let rendered = fid.to_string();
        assert_eq!(rendered, "2,0/5/123");
        assert_eq!(rendered.parse::<FileId>().unwrap(), fid);
    }

    #[test]
    fn rejects_missing_comma() {
        assert_eq!(
            "2-0/5/123".parse::<FileId>(),
            Err(ParseFileIdError::MissingComma)
        );
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(matches!(
            "2,0/5".parse::<FileId>(),
            Err(ParseFileIdError::MalformedTriple(_))
        ));
        assert!(matches!(
            "2,0/5/1/2".parse::<FileId>(),
            Err(ParseFileIdError::MalformedTriple(_))
        ));
    }
}
