//! Ciclo de vida de recogidas y entregas de vehículos
//!
//! Servicio HTTP que negocia, programa, ejecuta y audita las solicitudes
//! de recogida (pickup) y entrega (delivery) entre clientes, administración
//! y especialistas.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_app;
pub use state::AppState;
