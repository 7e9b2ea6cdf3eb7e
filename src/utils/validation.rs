//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validar y convertir
//! los campos que llegan por HTTP antes de tocar el store.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::utils::errors::{AppError, AppResult};

/// Validar y convertir string a fecha
pub fn validate_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        let mut error = ValidationError::new("date");
        error.add_param("value".into(), &value.to_string());
        error.add_param("format".into(), &"YYYY-MM-DD".to_string());
        error
    })
}

/// Validar y convertir string a hora del día (HH:MM o HH:MM:SS)
pub fn validate_time(value: &str) -> Result<NaiveTime, ValidationError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| {
            let mut error = ValidationError::new("time");
            error.add_param("value".into(), &value.to_string());
            error.add_param("format".into(), &"HH:MM".to_string());
            error
        })
}

/// Validar y convertir string a datetime
pub fn validate_datetime(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            let mut error = ValidationError::new("datetime");
            error.add_param("value".into(), &value.to_string());
            error.add_param("format".into(), &"RFC3339".to_string());
            error
        })
}

/// Validar que un importe no sea negativo
pub fn validate_fee_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Envolver un `ValidationError` en el `AppError` del campo indicado
pub fn field_error(field: &'static str, error: ValidationError) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    AppError::Validation(errors)
}

/// Parsear un campo de fecha obligatorio
pub fn parse_date_field(field: &'static str, value: &str) -> AppResult<NaiveDate> {
    validate_date(value).map_err(|e| field_error(field, e))
}

/// Parsear un campo datetime opcional
pub fn parse_optional_datetime_field(
    field: &'static str,
    value: Option<&str>,
) -> AppResult<Option<DateTime<Utc>>> {
    value
        .map(|v| validate_datetime(v).map_err(|e| field_error(field, e)))
        .transpose()
}
