//! Plain key/value configuration: one directive per line, `#` comments,
//! blank lines ignored.
//!
//! ```text
//! # where the HTTP server binds
//! listen 127.0.0.1:8053
//! # upstream resolver, DoT enabled
//! forward 9.9.9.9:853 tls
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Port assumed when the `listen` directive names only a host.
const DEFAULT_LISTEN_PORT: u16 = 443;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown key {0}")]
    UnknownKey(String),

    #[error("missing value for key {0}")]
    MissingValue(String),

    #[error("too many values for key {0}")]
    ExtraValues(String),

    #[error("invalid tls option in forward: {0}")]
    InvalidOption(String),
}

/// Runtime settings: where the HTTP server binds and which resolver every
/// query is forwarded to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub listen: String,
    pub forward: String,
    pub use_tls: bool,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        text.parse()
    }

    /// The bind address, with the default port appended when the directive
    /// named only a host.
    pub fn listen_addr(&self) -> String {
        if self.listen.contains(':') {
            self.listen.clone()
        } else {
            format!("{}:{DEFAULT_LISTEN_PORT}", self.listen)
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Config::default();
        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields[0] {
                "listen" => match fields.as_slice() {
                    [_] => return Err(ConfigError::MissingValue("listen".into())),
                    [_, value] => config.listen = value.to_string(),
                    _ => return Err(ConfigError::ExtraValues("listen".into())),
                },
                "forward" => match fields.as_slice() {
                    [_] => return Err(ConfigError::MissingValue("forward".into())),
                    [_, value] => config.forward = value.to_string(),
                    [_, value, "tls"] => {
                        config.forward = value.to_string();
                        config.use_tls = true;
                    }
                    [_, _, option] => return Err(ConfigError::InvalidOption(option.to_string())),
                    _ => return Err(ConfigError::ExtraValues("forward".into())),
                },
                key => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listen_and_forward() {
        let config: Config = "listen 127.0.0.1:8053\nforward 9.9.9.9:53\n"
            .parse()
            .unwrap();

        assert_eq!(config.listen, "127.0.0.1:8053");
        assert_eq!(config.listen_addr(), "127.0.0.1:8053");
        assert_eq!(config.forward, "9.9.9.9:53");
        assert!(!config.use_tls);
    }

    #[test]
    fn forward_tls_option_enables_dot() {
        let config: Config = "forward 9.9.9.9:853 tls".parse().unwrap();

        assert_eq!(config.forward, "9.9.9.9:853");
        assert!(config.use_tls);
    }

    #[test]
    fn forward_rejects_unknown_option() {
        let err = "forward 9.9.9.9:853 bogus".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption(o) if o == "bogus"));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# a comment\n\nlisten example.org\n# another comment\nforward 9.9.9.9:53\n";
        let config: Config = text.parse().unwrap();

        assert_eq!(config.listen, "example.org");
        assert_eq!(config.listen_addr(), "example.org:443");
        assert_eq!(config.forward, "9.9.9.9:53");
    }

    #[test]
    fn unknown_keys_fail() {
        let err = "listne 127.0.0.1:8053".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(k) if k == "listne"));
    }

    #[test]
    fn missing_values_fail() {
        assert!(matches!(
            "listen".parse::<Config>().unwrap_err(),
            ConfigError::MissingValue(k) if k == "listen"
        ));
        assert!(matches!(
            "forward".parse::<Config>().unwrap_err(),
            ConfigError::MissingValue(k) if k == "forward"
        ));
    }

    #[test]
    fn extra_values_fail() {
        assert!(matches!(
            "listen 127.0.0.1 8053".parse::<Config>().unwrap_err(),
            ConfigError::ExtraValues(k) if k == "listen"
        ));
        assert!(matches!(
            "forward 9.9.9.9:853 tls tls".parse::<Config>().unwrap_err(),
            ConfigError::ExtraValues(k) if k == "forward"
        ));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = Config::from_file("/nonexistent/dohproxy.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Read { path, .. } if path.contains("dohproxy.conf")));
    }
}
