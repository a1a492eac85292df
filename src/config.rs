use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Runtime configuration, resolved once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub monitor_poll_seconds: u64,
    pub default_interval_seconds: i32,
    pub default_timeout_seconds: i32,
    pub port: u16,
}

impl Default for Config {
    /// The documented tunable defaults, with no database configured —
    /// tests that exercise routes through a pool handed to them directly
    /// (rather than `Config::from_env`) use this instead of touching the
    /// environment.
    fn default() -> Self {
        Config {
            database_url: String::new(),
            monitor_poll_seconds: 5,
            default_interval_seconds: 60,
            default_timeout_seconds: 8,
            port: 5000,
        }
    }
}

const DSN_VARS: &[&str] = &[
    "DATABASE_URL",
    "DATABASE_URI",
    "POSTGRES_URL",
    "POSTGRESQL_URL",
    "POSTGRES_CONNECTION_STRING",
    "DB_URL",
];

impl Config {
    pub fn from_env() -> Self {
        Config {
            database_url: resolve_database_url().expect(
                "no database connection string found in the environment (set DATABASE_URL or DB_HOST/DB_USER/...)",
            ),
            monitor_poll_seconds: env_u64("MONITOR_POLL_SECONDS", 5),
            default_interval_seconds: env_i32("DEFAULT_INTERVAL_SECONDS", 60),
            default_timeout_seconds: env_i32("DEFAULT_TIMEOUT_SECONDS", 8),
            port: env_u64("PORT", 5000) as u16,
        }
    }
}

/// A direct connection string wins if set; otherwise the DSN is
/// synthesized from discrete host/user/pass/db variables with
/// URL-encoded credentials.
pub fn resolve_database_url() -> Option<String> {
    for var in DSN_VARS {
        if let Ok(v) = std::env::var(var) {
            if !v.trim().is_empty() {
                return Some(v);
            }
        }
    }

    let host = first_env(&["DB_HOST", "POSTGRES_HOST"])?;
    let port = first_env(&["DB_PORT", "POSTGRES_PORT"]).unwrap_or_else(|| "5432".to_string());
    let user = first_env(&["DB_USER", "POSTGRES_USER"])?;
    let password = first_env(&["DB_PASSWORD", "POSTGRES_PASSWORD"]).unwrap_or_default();
    let name = first_env(&["DB_NAME", "POSTGRES_DB", "DB_DATABASE"])?;
    let sslmode = first_env(&["DB_SSLMODE", "PGSSLMODE"]).unwrap_or_else(|| "disable".to_string());

    let user_enc = encode(&user);
    let pass_enc = encode(&password);
    let name_enc = encode(&name);

    Some(format!(
        "postgres://{user}:{pass}@{host}:{port}/{name}?sslmode={ssl}",
        user = user_enc,
        pass = pass_enc,
        host = host,
        port = port,
        name = name_enc,
        ssl = sslmode,
    ))
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| std::env::var(n).ok().filter(|v| !v.trim().is_empty()))
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_all() {
        for v in DSN_VARS.iter().chain(&[
            "DB_HOST", "POSTGRES_HOST", "DB_PORT", "POSTGRES_PORT", "DB_USER", "POSTGRES_USER",
            "DB_PASSWORD", "POSTGRES_PASSWORD", "DB_NAME", "POSTGRES_DB", "DB_DATABASE",
            "DB_SSLMODE", "PGSSLMODE",
        ]) {
            std::env::remove_var(v);
        }
    }

    #[test]
    fn prefers_direct_dsn() {
        clear_all();
        std::env::set_var("DATABASE_URL", "postgres://x:y@localhost/z");
        assert_eq!(resolve_database_url().as_deref(), Some("postgres://x:y@localhost/z"));
        clear_all();
    }

    #[test]
    fn synthesizes_and_encodes_credentials() {
        clear_all();
        std::env::set_var("DB_HOST", "db.internal");
        std::env::set_var("DB_USER", "svc");
        std::env::set_var("DB_PASSWORD", "p@ss w/ord");
        std::env::set_var("DB_NAME", "pulsewatch");
        let dsn = resolve_database_url().expect("dsn");
        assert!(dsn.contains("db.internal"));
        assert!(dsn.contains("p%40ss"));
        assert!(dsn.contains("sslmode=disable"));
        clear_all();
    }

    #[test]
    fn none_without_host() {
        clear_all();
        assert!(resolve_database_url().is_none());
    }

    #[test]
    fn from_env_reads_tunables() {
        clear_all();
        std::env::set_var("DATABASE_URL", "postgres://x:y@localhost/z");
        std::env::set_var("PORT", "9090");
        std::env::set_var("DEFAULT_INTERVAL_SECONDS", "30");
        std::env::set_var("DEFAULT_TIMEOUT_SECONDS", "15");

        let config = Config::from_env();
        assert_eq!(config.port, 9090);
        assert_eq!(config.default_interval_seconds, 30);
        assert_eq!(config.default_timeout_seconds, 15);

        std::env::remove_var("PORT");
        std::env::remove_var("DEFAULT_INTERVAL_SECONDS");
        std::env::remove_var("DEFAULT_TIMEOUT_SECONDS");
        clear_all();
    }
}
