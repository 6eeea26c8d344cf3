use std::time::Duration;

/// Runtime configuration snapshot built from CLI arguments and environment
/// variables at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub root_dir: String,
    pub public_url: String,
    /// Maximum age after which a committed artifact is treated as expired.
    pub retention: Duration,
}
