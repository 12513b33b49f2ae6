use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Backup file restored at start and written at shutdown. None = no persistence.
    pub backup_path: Option<PathBuf>,
    pub reap_interval: Duration,
    /// Read deadline in seconds per connection, 0 = wait forever.
    pub timeout: u64,
    pub max_line_bytes: usize,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            backup_path: Some(PathBuf::from("storage.bak")),
            reap_interval: Duration::from_secs(2),
            timeout: 300,
            max_line_bytes: 1024 * 1024,
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--port" => {
                    if i + 1 < args.len() {
                        if let Ok(p) = args[i + 1].parse() {
                            config.port = p;
                        }
                        i += 1;
                    }
                }
                "--bind" => {
                    if i + 1 < args.len() {
                        config.bind = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--backup" => {
                    if i + 1 < args.len() {
                        config.backup_path = if args[i + 1].is_empty() {
                            None
                        } else {
                            Some(PathBuf::from(&args[i + 1]))
                        };
                        i += 1;
                    }
                }
                "--reap-interval-ms" => {
                    if i + 1 < args.len() {
                        if let Ok(ms) = args[i + 1].parse::<u64>() {
                            if ms > 0 {
                                config.reap_interval = Duration::from_millis(ms);
                            }
                        }
                        i += 1;
                    }
                }
                "--timeout" => {
                    if i + 1 < args.len() {
                        if let Ok(t) = args[i + 1].parse() {
                            config.timeout = t;
                        }
                        i += 1;
                    }
                }
                "--max-line" => {
                    if i + 1 < args.len() {
                        if let Ok(n) = args[i + 1].parse::<usize>() {
                            if n > 0 {
                                config.max_line_bytes = n;
                            }
                        }
                        i += 1;
                    }
                }
                "--loglevel" => {
                    if i + 1 < args.len() {
                        config.loglevel = args[i + 1].clone();
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        config
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        if self.timeout > 0 {
            Some(Duration::from_secs(self.timeout))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(&[]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.backup_path, Some(PathBuf::from("storage.bak")));
        assert_eq!(config.reap_interval, Duration::from_secs(2));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_flags() {
        let config = Config::from_args(&args(&[
            "--port",
            "9000",
            "--bind",
            "0.0.0.0",
            "--reap-interval-ms",
            "250",
            "--timeout",
            "0",
            "--backup",
            "/tmp/data.bak",
        ]));
        assert_eq!(config.addr(), "0.0.0.0:9000");
        assert_eq!(config.reap_interval, Duration::from_millis(250));
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.backup_path, Some(PathBuf::from("/tmp/data.bak")));
    }

    #[test]
    fn test_empty_backup_disables_persistence() {
        let config = Config::from_args(&args(&["--backup", ""]));
        assert!(config.backup_path.is_none());
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::from_args(&args(&["--port", "notaport", "--reap-interval-ms", "0", "--bogus"]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.reap_interval, Duration::from_secs(2));
    }
}
