pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod exporters;
pub mod generator;
mod logger;
pub mod model;
pub mod phonemes;
pub mod synth;
pub mod timing;

use std::collections::BTreeMap;

pub use config::LipSyncConfig;
pub use error::{Error, Result};
pub use exporters::Exporter;
pub use generator::LipSyncGenerator;
pub use logger::Logger;

/// A mapping of various liblipsync metadata.
pub fn metadata() -> BTreeMap<&'static str, String> {
    let mut mapping = BTreeMap::new();

    let is_debug = cfg!(debug_assertions);
    mapping.insert("DEBUG", is_debug.to_string());
    mapping.insert("RELEASE", (!is_debug).to_string());

    mapping.insert("VERSION", env!("CARGO_PKG_VERSION").to_string());
    mapping.insert("VERSION_MAJOR", env!("CARGO_PKG_VERSION_MAJOR").to_string());
    mapping.insert("VERSION_MINOR", env!("CARGO_PKG_VERSION_MINOR").to_string());
    mapping.insert("VERSION_PATCH", env!("CARGO_PKG_VERSION_PATCH").to_string());

    mapping.insert("LIBLIPSYNC_AUTHORS", env!("CARGO_PKG_AUTHORS").to_string());

    mapping
}

/// Name written into the `generator` field of exported files.
pub fn generator_tag() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_has_version() {
        let metadata = metadata();

        assert_eq!(metadata["VERSION"], env!("CARGO_PKG_VERSION"));
        assert_ne!(metadata["DEBUG"], metadata["RELEASE"]);
    }

    #[test]
    fn generator_tag_names_crate() {
        assert!(generator_tag().starts_with("liblipsync "));
    }
}
