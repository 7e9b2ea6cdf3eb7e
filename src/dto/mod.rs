//! DTOs de la API HTTP
//!
//! Cuerpos de entrada y salida en camelCase. La conversión a comandos del
//! orquestador valida los campos antes de cualquier lectura del store.

use serde::Serialize;

pub mod delivery_dto;

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}
