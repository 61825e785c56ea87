use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub scheduling: SchedulingPolicy,
}

/// Where appointments, availability windows and reference data are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Scheduling constants shared by the booking engine, the lateness guard,
/// the query layer and the slot generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingPolicy {
    /// Length of every booked appointment. Independent of the segment
    /// duration advertised by the slot generator.
    pub appointment_duration_minutes: i64,
    pub min_minutes_before_start: i64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// How far ahead working days are listed when no end date is given.
    pub working_days_horizon_months: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            appointment_duration_minutes: 30,
            min_minutes_before_start: 60,
            default_page_size: 10,
            max_page_size: 100,
            working_days_horizon_months: 1,
        }
    }
}

impl SchedulingPolicy {
    pub fn appointment_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.appointment_duration_minutes)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingPolicy::default();

        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|e: String| warn!("{}, falling back to memory", e))
                        .ok()
                })
                .unwrap_or(StorageBackend::Memory),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            scheduling: SchedulingPolicy {
                appointment_duration_minutes: positive_from_env(
                    "APPOINTMENT_DURATION_MINUTES",
                    defaults.appointment_duration_minutes,
                ),
                min_minutes_before_start: positive_from_env(
                    "MIN_MINUTES_BEFORE_START",
                    defaults.min_minutes_before_start,
                ),
                default_page_size: positive_from_env("DEFAULT_PAGE_SIZE", defaults.default_page_size),
                max_page_size: positive_from_env("MAX_PAGE_SIZE", defaults.max_page_size),
                working_days_horizon_months: positive_from_env(
                    "WORKING_DAYS_HORIZON_MONTHS",
                    defaults.working_days_horizon_months,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        if self.supabase_jwt_secret.is_empty() {
            return false;
        }
        match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        }
    }
}

fn positive_from_env<T>(key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                warn!("{} has invalid value '{}', using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("mysql".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn default_policy_matches_documented_constants() {
        let policy = SchedulingPolicy::default();
        assert_eq!(policy.appointment_duration(), chrono::Duration::minutes(30));
        assert_eq!(policy.min_minutes_before_start, 60);
        assert_eq!(policy.default_page_size, 10);
        assert_eq!(policy.max_page_size, 100);
    }
}
