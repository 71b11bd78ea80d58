use std::{env, net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Context, Result};

use crate::{
    constants::{
        DEFAULT_BIND_ADDRESS, DEFAULT_MAX_CONNECTIONS, MAX_COOKING_TIME, MAX_INGREDIENT_AMOUNT,
        MAX_SESSION_TTL_HOURS, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, SESSION_TTL_HOURS,
    },
    validation::{Bounds, RecipeLimits},
};

/// Credentials of an administrator created on startup when missing.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: SocketAddr,
    pub max_connections: u32,
    pub session_ttl_hours: i64,
    pub limits: RecipeLimits,
    pub admin: Option<AdminSeed>,
}

impl ServerConfig {
    /// Reads the process environment, after loading `.env` when one exists.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(anyhow!("Failed to load .env file: {e}"));
            }
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        let bind_address: SocketAddr = parse_or(
            &lookup,
            "BIND_ADDRESS",
            DEFAULT_BIND_ADDRESS.parse::<SocketAddr>()?,
        )?;
        let max_connections =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let session_ttl_hours = parse_or(&lookup, "SESSION_TTL_HOURS", SESSION_TTL_HOURS)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(anyhow!(
                "SESSION_TTL_HOURS must be between 1 and {} ({})",
                MAX_SESSION_TTL_HOURS,
                session_ttl_hours
            ));
        }

        let limits = RecipeLimits {
            cooking_time: bounds(
                &lookup,
                ("MIN_COOKING_TIME", MIN_COOKING_TIME),
                ("MAX_COOKING_TIME", MAX_COOKING_TIME),
            )?,
            amount: bounds(
                &lookup,
                ("MIN_INGREDIENT_AMOUNT", MIN_INGREDIENT_AMOUNT),
                ("MAX_INGREDIENT_AMOUNT", MAX_INGREDIENT_AMOUNT),
            )?,
        };

        let admin = match (
            lookup("ADMIN_USERNAME"),
            lookup("ADMIN_EMAIL"),
            lookup("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(AdminSeed {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(anyhow!(
                    "ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together"
                ))
            }
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_address,
            max_connections,
            session_ttl_hours,
            limits,
            admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {key} ({value}): {e}")),
        None => Ok(default),
    }
}

fn bounds<F>(lookup: &F, min: (&str, i32), max: (&str, i32)) -> Result<Bounds>
where
    F: Fn(&str) -> Option<String>,
{
    let lower = parse_or(lookup, min.0, min.1)?;
    let upper = parse_or(lookup, max.0, max.1)?;
    if lower < 1 || lower > upper {
        return Err(anyhow!(
            "{} must be at least 1 and not exceed {} ({lower} > {upper})",
            min.0,
            max.0
        ));
    }

    Ok(Bounds::new(lower, upper))
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
    fn applies_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.session_ttl_hours, SESSION_TTL_HOURS);
        assert_eq!(config.limits, RecipeLimits::default());
        assert!(config.admin.is_none());
    }

    #[test]
    fn overrides_recipe_bounds() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
            ("MAX_COOKING_TIME", "90"),
            ("MIN_INGREDIENT_AMOUNT", "5"),
        ]))
        .unwrap();

        assert_eq!(config.limits.cooking_time, Bounds::new(MIN_COOKING_TIME, 90));
        assert_eq!(config.limits.amount.min, 5);
    }

    #[test]
    fn rejects_missing_secret_and_inverted_bounds() {
        assert!(ServerConfig::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://localhost/foodgram"
        )]))
        .is_err());

        assert!(ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
            ("MIN_COOKING_TIME", "10"),
            ("MAX_COOKING_TIME", "5"),
        ]))
        .is_err());
    }

    #[test]
    fn bounds_session_ttl() {
        for ttl in ["0", "-5", "9223372036854775807"] {
            assert!(
                ServerConfig::from_lookup(lookup(&[
                    ("DATABASE_URL", "postgres://localhost/foodgram"),
                    ("JWT_SECRET", "secret"),
                    ("SESSION_TTL_HOURS", ttl),
                ]))
                .is_err(),
                "{ttl}"
            );
        }

        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
            ("SESSION_TTL_HOURS", "48"),
        ]))
        .unwrap();
        assert_eq!(config.session_ttl_hours, 48);
    }

    #[test]
    fn requires_complete_admin_seed() {
        assert!(ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
            ("ADMIN_USERNAME", "admin"),
        ]))
        .is_err());
    }
}
