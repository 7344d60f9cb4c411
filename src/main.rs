use std::io::Error;
use std::sync::Arc;
use std::time::Duration;

use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tokio::main;
use tracing::info;

use crate::{
    application::{
        handlers::{
            delivery::DeliveryHandler,
            dispatch::{DispatchConfig, DispatchLoop},
        },
        usecases::{
            cancel_snooze::CancelSnoozeUseCase, register_workspace::RegisterWorkspaceUseCase,
            schedule_snooze::ScheduleSnoozeUseCase,
        },
    },
    config::Config,
    domain::repositories::{MessageStore, WorkspaceTokenStore},
    infrastructure::{
        crypto::AesGcmTokenCipher,
        intercom::IntercomClient,
        repositories::postgres::{PostgresMessageStore, PostgresWorkspaceTokenStore},
        scheduler::JobScheduler,
    },
    presentation::http::endpoints::{
        health::HealthEndpoints,
        root::ApiState,
        snoozes::SnoozesEndpoints,
        workspaces::WorkspacesEndpoints,
    },
};

mod application;
mod config;
mod domain;
mod infrastructure;
mod presentation;
mod telemetry;

#[main]
async fn main() -> Result<(), Error> {
    let config = Config::try_parse().map_err(Error::other)?;
    telemetry::init();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(Error::other)?;
    sqlx::migrate!().run(&pool).await.map_err(Error::other)?;

    let cipher = AesGcmTokenCipher::from_hex(&config.encryption_key).map_err(Error::other)?;
    let messages: Arc<dyn MessageStore> = PostgresMessageStore::new(pool.clone());
    let tokens: Arc<dyn WorkspaceTokenStore> = PostgresWorkspaceTokenStore::new(pool);

    let gateway = IntercomClient::new(
        config.intercom_base_url.clone(),
        Arc::clone(&cipher),
        config.breaker_config(),
        config.retry_policy(),
    );

    let scheduler = JobScheduler::start().await;
    let delivery = Arc::new(DeliveryHandler::new(
        Arc::clone(&messages),
        Arc::clone(&tokens),
        Arc::clone(&gateway),
    ));
    let dispatch = DispatchLoop::new(
        Arc::clone(&messages),
        Arc::clone(&scheduler),
        delivery,
        DispatchConfig {
            interval: config.dispatch_interval(),
            heartbeat_url: config.heartbeat_url.clone(),
        },
    );
    let _dispatch_handle = dispatch.spawn();

    let state = Arc::new(ApiState {
        schedule_snooze_usecase: Arc::new(ScheduleSnoozeUseCase::new(
            Arc::clone(&messages),
            Arc::clone(&tokens),
            Arc::clone(&gateway),
            Arc::clone(&cipher),
        )),
        cancel_snooze_usecase: Arc::new(CancelSnoozeUseCase::new(
            Arc::clone(&messages),
            Arc::clone(&tokens),
            Arc::clone(&gateway),
            Arc::clone(&scheduler),
        )),
        register_workspace_usecase: Arc::new(RegisterWorkspaceUseCase::new(
            Arc::clone(&tokens),
            Arc::clone(&cipher),
        )),
        gateway,
        scheduler: Arc::clone(&scheduler),
    });

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);
    let api_service = OpenApiService::new(
        (
            HealthEndpoints::new(Arc::clone(&state)),
            SnoozesEndpoints::new(Arc::clone(&state)),
            WorkspacesEndpoints::new(Arc::clone(&state)),
        ),
        "Snooze+ API",
        "0.1.0",
    )
    .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    info!(%server_url, "starting server");

    Server::new(TcpListener::bind(format!("localhost:{}", config.port)))
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
            },
            Some(Duration::from_secs(10)),
        )
        .await?;

    // Cancel outstanding delivery timers before the process exits.
    scheduler.shutdown().await;

    Ok(())
}
