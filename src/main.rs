use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use delivery_lifecycle::config::{DatabaseConfig, EnvironmentConfig};
use delivery_lifecycle::database::DatabaseConnection;
use delivery_lifecycle::repositories::{
    CollectionFeeRepository, DeliveryRequestRepository, VehicleRepository,
};
use delivery_lifecycle::services::{
    DeliveryOrchestrator, FeeResolver, LogNotificationSink, NotificationSink, ReadAggregator,
    SideEffectProjector, SideEffectPublisher, TransitionEngine, WebhookNotificationSink,
};
use delivery_lifecycle::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("🚚 Delivery Lifecycle - Recogidas y entregas de vehículos");
    info!("=========================================================");

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::connect(&DatabaseConfig::from_env()?).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };
    let pool = db_connection.pool();

    let requests = Arc::new(DeliveryRequestRepository::new(pool.clone()));
    let fees = Arc::new(CollectionFeeRepository::new(pool.clone()));
    let vehicles = Arc::new(VehicleRepository::new(pool));

    // Proyector de efectos secundarios en su propia tarea
    let notifier: Arc<dyn NotificationSink> = match &config.notification_webhook_url {
        Some(url) => {
            info!("📨 Notificaciones vía webhook: {}", url);
            Arc::new(WebhookNotificationSink::new(reqwest::Client::new(), url.clone()))
        }
        None => Arc::new(LogNotificationSink),
    };
    let (publisher, effects) = SideEffectPublisher::channel();
    let projector = SideEffectProjector::new(vehicles.clone(), notifier).spawn(effects);

    let hours = config.business_hours()?;
    info!(
        "🕘 Franja laboral {}-{} (UTC{:+} min)",
        hours.start,
        hours.end,
        config.business_utc_offset_minutes
    );

    let orchestrator = DeliveryOrchestrator::new(
        requests.clone(),
        FeeResolver::new(fees),
        TransitionEngine::new(hours),
        publisher,
    )
    .with_max_conflict_retries(config.max_conflict_retries);
    let aggregator = ReadAggregator::new(requests, vehicles);

    let addr: SocketAddr = config.server_url().parse()?;
    let app = create_app(AppState::new(config, orchestrator, aggregator));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("   POST /api/deliveries/proposals - Proponer fecha");
    info!("   POST /api/deliveries/:id/approve|reject|cancel - Decidir propuesta");
    info!("   POST /api/deliveries/:id/schedule - Programar ventana");
    info!("   POST /api/deliveries/:id/in-transit|delivered - Ejecución");
    info!("   GET  /api/deliveries/:id[/events] - Detalle y auditoría");
    info!("   GET  /api/deliveries/summary|pending-approvals|scheduled - Vistas");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    // El router ya soltó el publisher: el proyector drena lo pendiente y termina
    if let Err(e) = projector.await {
        error!("❌ El proyector terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
