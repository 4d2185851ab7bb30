use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one volume (one `.dat` file) cluster-wide.
///
/// String form is the plain decimal representation, matching the filename
/// convention `<collection>_<vid>.dat` / `<vid>.dat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeId(u32);

impl VolumeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VolumeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<VolumeId> for u32 {
    fn from(id: VolumeId) -> Self {
        id.0
    }
}

/// Error parsing a [`VolumeId`] from its decimal string form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid volume id {input:?}")]
pub struct ParseVolumeIdError {
    input: String,
}

impl FromStr for VolumeId {
    type Err = ParseVolumeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(VolumeId)
            .map_err(|_| ParseVolumeIdError {
                input: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let vid = VolumeId::new(42);
        assert_eq!(vid.to_string().parse::<VolumeId>().unwrap(), vid);
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-number".parse::<VolumeId>().is_err());
        assert!("-1".parse::<VolumeId>().is_err());
        assert!("".parse::<VolumeId>().is_err());
    }
}
