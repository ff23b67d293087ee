use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Seconds between heartbeat events on every open event stream
    #[arg(long, env, default_value_t = sse::settings::DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
    pub sse_heartbeat_interval_secs: u64,

    /// Seconds between liveness sweeps over all open connections
    #[arg(long, env, default_value_t = sse::settings::DEFAULT_SWEEP_INTERVAL.as_secs())]
    pub sse_sweep_interval_secs: u64,

    /// A connection silent for longer than this many seconds is evicted.
    /// Must be greater than the heartbeat interval.
    #[arg(long, env, default_value_t = sse::settings::DEFAULT_STALE_THRESHOLD.as_secs())]
    pub sse_stale_threshold_secs: u64,

    /// Events buffered per connection before new ones are dropped for it
    #[arg(long, env, default_value_t = sse::settings::DEFAULT_CHANNEL_CAPACITY)]
    pub sse_channel_capacity: usize,

    /// Upper bound on simultaneously open connections
    #[arg(long, env, default_value_t = sse::settings::DEFAULT_MAX_CONNECTIONS)]
    pub sse_max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Parse from an explicit argument list instead of the process arguments.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Config::parse_from(args)
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn sse_settings(&self) -> sse::Settings {
        sse::Settings {
            heartbeat_interval: Duration::from_secs(self.sse_heartbeat_interval_secs),
            sweep_interval: Duration::from_secs(self.sse_sweep_interval_secs),
            stale_threshold: Duration::from_secs(self.sse_stale_threshold_secs),
            channel_capacity: self.sse_channel_capacity,
            max_connections: self.sse_max_connections,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hub_defaults() {
        let config = Config::from_args(["realtime_hub"]);
        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert_eq!(config.runtime_env, RustEnv::Development);

        let settings = config.sse_settings();
        assert_eq!(settings, sse::Settings::default());
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(settings.sweep_interval, Duration::from_secs(60));
        assert_eq!(settings.stale_threshold, Duration::from_secs(90));
    }

    #[test]
    fn sse_flags_flow_into_settings() {
        let config = Config::from_args([
            "realtime_hub",
            "--sse-heartbeat-interval-secs",
            "5",
            "--sse-sweep-interval-secs",
            "10",
            "--sse-stale-threshold-secs",
            "15",
            "--sse-channel-capacity",
            "4",
            "--sse-max-connections",
            "2",
        ]);

        let settings = config.sse_settings();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(settings.sweep_interval, Duration::from_secs(10));
        assert_eq!(settings.stale_threshold, Duration::from_secs(15));
        assert_eq!(settings.channel_capacity, 4);
        assert_eq!(settings.max_connections, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn allowed_origins_split_on_commas() {
        let config = Config::from_args([
            "realtime_hub",
            "--allowed-origins",
            "https://a.example,https://b.example",
        ]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn runtime_env_parses_case_insensitively() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));

        let config = Config::from_args(["realtime_hub", "--runtime-env", "production"]);
        assert_eq!(config.runtime_env(), RustEnv::Production);
    }
}
