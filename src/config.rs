use std::env;

/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub store_backend: StoreBackend,
    pub seed_on_start: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = match get("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("STORE_BACKEND must be postgres or memory, got {other}"),
        };

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let session_ttl_hours = get("SESSION_TTL_HOURS")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(24);
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            anyhow::bail!(
                "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {session_ttl_hours}"
            );
        }
        let seed_on_start = get("SEED_ON_START")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            store_backend,
            seed_on_start,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_database_url() {
        let cfg = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/hospital_db")]))
            .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.bind_addr, "127.0.0.1:3000");
        assert_eq!(cfg.session_ttl_hours, 24);
        assert!(cfg.seed_on_start);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let cfg = Config::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("SESSION_TTL_HOURS", "abc"),
            ("SEED_ON_START", "false"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.session_ttl_hours, 24);
        assert!(!cfg.seed_on_start);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("STORE_BACKEND", "mongo")])).is_err());
    }

    #[test]
    fn test_session_ttl_must_be_in_range() {
        let base = [("STORE_BACKEND", "memory")];
        for bad in ["0", "-5", "9223372036854775807"] {
            let pairs = [base[0], ("SESSION_TTL_HOURS", bad)];
            assert!(Config::from_lookup(lookup(&pairs)).is_err(), "accepted {bad}");
        }

        let pairs = [base[0], ("SESSION_TTL_HOURS", "8784")];
        assert_eq!(Config::from_lookup(lookup(&pairs)).unwrap().session_ttl_hours, 8784);
    }
}
