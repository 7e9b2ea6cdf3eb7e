//! Middleware de autenticación JWT
//!
//! Este módulo maneja la autenticación JWT: extrae el token Bearer,
//! lo valida y entrega al handler el actor `(id, rol)` que ejecuta la
//! operación. La gestión de usuarios vive fuera de este servicio.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{Actor, ActorRole},
    state::AppState,
    utils::errors::AppError,
};

/// Claims del JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // actor_id
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Actor autenticado que se inyecta en los handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Extraer token del header Authorization
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Token de autorización requerido".to_string()))?;

        decode_actor(token, &state.config.jwt_secret).map(AuthenticatedActor)
    }
}

/// Decodificar y validar un JWT
pub fn decode_actor(token: &str, secret: &str) -> Result<Actor, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Token inválido".to_string()))?;

    let claims = token_data.claims;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("ID de actor inválido".to_string()))?;
    let role = ActorRole::parse(&claims.role)
        .ok_or_else(|| AppError::Unauthorized(format!("Rol desconocido: {}", claims.role)))?;

    Ok(Actor::new(id, role))
}

/// Función para generar JWT token
pub fn generate_jwt_token(actor: &Actor, secret: &str, ttl_seconds: i64) -> Result<String, AppError> {
    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::seconds(ttl_seconds);

    let claims = Claims {
        sub: actor.id.to_string(),
        role: actor.role.as_str().to_string(),
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Error generando JWT: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_actor_identity() {
        let actor = Actor::specialist(Uuid::new_v4());
        let token = generate_jwt_token(&actor, "secret", 60).unwrap();
        assert_eq!(decode_actor(&token, "secret").unwrap(), actor);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = generate_jwt_token(&Actor::admin(Uuid::new_v4()), "secret", 60).unwrap();
        assert!(matches!(
            decode_actor(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = generate_jwt_token(&Actor::client(Uuid::new_v4()), "secret", -3600).unwrap();
        assert!(matches!(
            decode_actor(&token, "secret"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
