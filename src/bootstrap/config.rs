use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_port: u16,
    pub debug: bool,
    pub cors_allowed_origins: Vec<String>,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source, so the parsing
    /// and defaulting rules are testable without reading the process
    /// environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_port = lookup("API_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        // Diagnostics default on; set DEBUG=0/false/no to quiet them.
        let debug = !matches!(
            lookup("DEBUG").as_deref(),
            Some("0") | Some("false") | Some("no")
        );
        let cors_allowed_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => vec!["*".to_string()],
        };
        let ping_interval_secs = lookup("PING_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(25);
        let ping_timeout_secs = lookup("PING_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);
        if ping_interval_secs == 0 {
            anyhow::bail!("PING_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            api_port,
            debug,
            cors_allowed_origins,
            ping_interval_secs,
            ping_timeout_secs,
        })
    }

    pub fn allow_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }

    /// Handshake-time origin policy. Requests without an Origin header come
    /// from non-browser clients and are let through; a present origin must
    /// match the configured list unless the wildcard is in effect.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(o) => self.allow_any_origin() || self.cors_allowed_origins.iter().any(|a| a == o),
        }
    }
}

fn parse_origins(raw: &str) -> anyhow::Result<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.is_empty() {
        anyhow::bail!("CORS_ALLOWED_ORIGINS is set but contains no origins");
    }
    Ok(origins)
}
