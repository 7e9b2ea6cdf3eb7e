//! Middleware del sistema
//!
//! Este módulo contiene la autenticación del actor y la configuración de
//! CORS.

pub mod auth;
pub mod cors;

pub use auth::{decode_actor, generate_jwt_token, AuthenticatedActor, Claims};
pub use cors::cors_layer;
