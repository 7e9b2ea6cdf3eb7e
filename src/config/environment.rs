//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno: servidor, JWT, CORS,
//! franja laboral para derivar ventanas, reintentos ante conflicto y el
//! webhook opcional de notificaciones.

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use std::env;

use crate::services::transition_engine::BusinessHours;
use crate::utils::validation::validate_time;

/// Configuración del entorno
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub business_window_start: NaiveTime,
    pub business_window_end: NaiveTime,
    pub business_utc_offset_minutes: i32,
    pub max_conflict_retries: u32,
    pub notification_webhook_url: Option<String>,
    pub log_level: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        let hours = BusinessHours::default();
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            jwt_secret: "development-secret".to_string(),
            cors_origins: Vec::new(),
            business_window_start: hours.start,
            business_window_end: hours.end,
            business_utc_offset_minutes: 0,
            max_conflict_retries: 1,
            notification_webhook_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Cargar desde variables de entorno del proceso
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Cargar desde cualquier fuente clave → valor (tests)
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = lookup("ENVIRONMENT").unwrap_or(defaults.environment);
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => secret,
            _ if environment == "production" => {
                return Err(anyhow!("JWT_SECRET must be set in production"))
            }
            _ => defaults.jwt_secret,
        };

        let config = Self {
            port: parse_or(&lookup, "PORT", defaults.port)?,
            host: lookup("HOST").unwrap_or(defaults.host),
            jwt_secret,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            business_window_start: time_or(
                &lookup,
                "BUSINESS_WINDOW_START",
                defaults.business_window_start,
            )?,
            business_window_end: time_or(
                &lookup,
                "BUSINESS_WINDOW_END",
                defaults.business_window_end,
            )?,
            business_utc_offset_minutes: parse_or(
                &lookup,
                "BUSINESS_UTC_OFFSET_MINUTES",
                defaults.business_utc_offset_minutes,
            )?,
            max_conflict_retries: parse_or(
                &lookup,
                "MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )?,
            notification_webhook_url: lookup("NOTIFICATION_WEBHOOK_URL")
                .filter(|url| !url.trim().is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            environment,
        };

        // Falla pronto si la franja es inválida
        config.business_hours()?;
        Ok(config)
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Franja laboral con la que se derivan las ventanas de programación
    pub fn business_hours(&self) -> Result<BusinessHours> {
        let offset = FixedOffset::east_opt(self.business_utc_offset_minutes * 60).ok_or_else(|| {
            anyhow!(
                "BUSINESS_UTC_OFFSET_MINUTES out of range: {}",
                self.business_utc_offset_minutes
            )
        })?;
        BusinessHours::new(self.business_window_start, self.business_window_end, offset)
            .map_err(|e| anyhow!(e.to_string()))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

fn time_or<F>(lookup: &F, key: &str, default: NaiveTime) -> Result<NaiveTime>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => validate_time(&raw)
            .map_err(|_| anyhow!("{} must be HH:MM, got '{}'", key, raw)),
        None => Ok(default),
    }
}
