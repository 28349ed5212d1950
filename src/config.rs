//! Startup configuration: transport selection and port resolution.
//!
//! The launcher contract is small: `--transport=stdio|http` picks the
//! transport (default stdio; unknown values fall back to stdio with a
//! warning), and the HTTP port resolves as the `PORT` environment variable
//! first, then `--port=`, then 8081.

use tracing::warn;

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8081;

/// Which transport the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

/// Resolved startup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: TransportMode,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Resolve the configuration from process arguments and environment.
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(&args, std::env::var("PORT").ok().as_deref())
    }

    fn parse(args: &[String], env_port: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(value) = find_option(args, "--transport=") {
            config.transport = match value {
                "stdio" => TransportMode::Stdio,
                "http" => TransportMode::Http,
                other => {
                    warn!("unknown transport '{other}', falling back to stdio");
                    TransportMode::Stdio
                }
            };
        }

        // PORT takes precedence over --port= for hosted deployments that
        // inject the listen port through the environment.
        if let Some(raw) = env_port.or_else(|| find_option(args, "--port=")) {
            match raw.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!("invalid port '{raw}', using {DEFAULT_PORT}"),
            }
        }

        config
    }
}

fn find_option<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().find_map(|arg| arg.strip_prefix(prefix))
}
