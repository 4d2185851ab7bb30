//! CLI configuration, parsed with `clap`'s derive API.

use haystack_types::VolumeId;

/// Flags and positional arguments for a single `haystackd` node.
///
/// Mirrors the source's flag set (`-h`, `-p`, `-join`, `-vl`, positional
/// data path) but generalizes the hard-coded bootstrap volume set `1,2,3`
/// into [`Self::bootstrap_volumes`], per §4.3's note that the set of
/// three is configuration, not a literal constant.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "haystackd", author, version, about = "A small replicated needle store.")]
pub struct Config {
    /// Hostname advertised in this node's connection string.
    #[arg(short = 'h', long = "host", default_value = "localhost")]
    pub host: String,

    /// HTTP (and consensus) port.
    #[arg(short = 'p', long = "port", default_value_t = 4001)]
    pub port: u16,

    /// `host:port` of an existing leader to join. Empty bootstraps a new
    /// single-node cluster.
    #[arg(long = "join", default_value = "")]
    pub join: String,

    /// Directory for volume `.dat` files.
    #[arg(long = "volume-dir", default_value = "")]
    pub volume_dir: String,

    /// Collection tag applied to the bootstrap volume set.
    #[arg(long = "collection", default_value = "photo")]
    pub collection: String,

    /// Volume ids created at bootstrap and cycled by round-robin
    /// placement.
    #[arg(long = "bootstrap-volumes", value_delimiter = ',', default_value = "1,2,3")]
    pub bootstrap_volumes: Vec<u32>,

    /// Directory holding this node's consensus identity and log.
    pub data_path: String,
}

impl Config {
    pub fn connection_string(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn bootstrap_volume_ids(&self) -> Vec<VolumeId> {
        self.bootstrap_volumes.iter().copied().map(VolumeId::new).collect()
    }

    pub fn volume_dir(&self) -> String {
        if self.volume_dir.is_empty() {
            self.data_path.clone()
        } else {
            self.volume_dir.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_the_source_flag_set() {
        let config = Config::parse_from(["haystackd", "/tmp/d"]);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 4001);
        assert_eq!(config.join, "");
        assert_eq!(config.data_path, "/tmp/d");
        assert_eq!(config.bootstrap_volume_ids(), vec![VolumeId::new(1), VolumeId::new(2), VolumeId::new(3)]);
    }

    #[test]
    fn volume_dir_falls_back_to_data_path_when_unset() {
        let config = Config::parse_from(["haystackd", "/tmp/d"]);
        assert_eq!(config.volume_dir(), "/tmp/d");
    }

    #[test]
    fn bootstrap_volumes_can_be_overridden() {
        let config = Config::parse_from(["haystackd", "--bootstrap-volumes", "5,6", "/tmp/d"]);
        assert_eq!(config.bootstrap_volume_ids(), vec![VolumeId::new(5), VolumeId::new(6)]);
    }
}
