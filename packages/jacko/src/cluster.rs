use std::fmt;

use crate::error::ConfigError;

pub use history_server_client::DEFAULT_PORT;

/// One job-history source, as configured for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl ClusterDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse `host[:port][,name]`.
    ///
    /// `position` is the 1-based position of the argument on the command line
    /// and names unnamed clusters `cluster{position}`.
    pub fn parse(spec: &str, position: usize) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidClusterSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (address, name) = match spec.split_once(',') {
            Some((address, name)) => (address.trim(), name.trim()),
            None => (spec.trim(), ""),
        };
        let name = if name.is_empty() {
            format!("cluster{}", position)
        } else {
            name.to_string()
        };

        let (scheme, rest) = match address.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, address),
        };
        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid("port must be a number between 0 and 65535"))?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let host = match scheme {
            Some(scheme) => format!("{}://{}", scheme, host),
            None => host.to_string(),
        };
        Ok(Self::new(name, host, port))
    }
}

impl fmt::Display for ClusterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}
