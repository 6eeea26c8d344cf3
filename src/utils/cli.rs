use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Cache server listening host
    #[arg(long, env = "CACHE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Cache server listening port
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Data root owned by the storage engine
    #[arg(long, env = "CACHE_ROOTDIR", default_value = "/data")]
    pub root: String,

    /// Public base URL used for download locators when a request carries no
    /// Origin header
    #[arg(
        long,
        env = "CACHE_PUBLIC_URL",
        default_value = "http://127.0.0.1:8080"
    )]
    pub url: String,

    /// Retention window for committed artifacts, in days
    #[arg(long, env = "CACHE_RETENTION_DAYS", default_value_t = 7)]
    pub retention_days: u64,
}
