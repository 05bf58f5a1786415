mod automation;
mod db_core;
mod error;
mod mail;
mod model;
mod rate_limiters;
mod request_tracing;
mod routes;
mod server_config;
mod state;
#[cfg(test)]
mod testing;

use std::{env, net::SocketAddr, sync::Arc};

use automation::{engine::AutomationEngine, AutomationSettings};
use axum::{extract::FromRef, Router};
use mail::gmail::GmailTransport;
use mimalloc::MiMalloc;
use rate_limiters::RateLimiters;
use routes::AppRouter;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::{signal, task::JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    http_client: HttpClient,
    conn: DatabaseConnection,
    rate_limiters: RateLimiters,
    engine: AutomationEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;
    let rate_limiters = RateLimiters::from_env();

    let transport = Arc::new(GmailTransport::new(
        http_client.clone(),
        rate_limiters.clone(),
    ));
    let engine = AutomationEngine::new(
        conn.clone(),
        transport,
        rate_limiters.clone(),
        AutomationSettings::from_config(),
    );

    let state = ServerState {
        http_client,
        conn,
        rate_limiters,
        engine,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    state.engine.init().await?;

    let router = AppRouter::create(state.clone());

    let mut scheduler = JobScheduler::new()
        .await
        .expect("Failed to create scheduler");

    {
        let engine = state.engine.clone();
        scheduler
            .add(Job::new_async(
                server_config::cfg.settings.reply_sweep_schedule.as_str(),
                move |uuid, mut l| {
                    let engine = engine.clone();
                    Box::pin(async move {
                        tracing::debug!("Running reply sweep job {}", uuid);
                        state::tasks::run_reply_sweep(engine).await;

                        let next_tick = l.next_tick_for_job(uuid).await;
                        if let Ok(Some(ts)) = next_tick {
                            tracing::debug!("Next reply sweep at {:?}", ts);
                        }
                    })
                },
            )?)
            .await?;

        let engine = state.engine.clone();
        scheduler
            .add(Job::new_async(
                server_config::cfg.settings.follow_up_tick_schedule.as_str(),
                move |uuid, mut l| {
                    let engine = engine.clone();
                    Box::pin(async move {
                        tracing::debug!("Running follow up tick job {}", uuid);
                        state::tasks::run_follow_up_tick(engine).await;

                        let next_tick = l.next_tick_for_job(uuid).await;
                        if let Ok(Some(ts)) = next_tick {
                            tracing::debug!("Next follow up tick at {:?}", ts);
                        }
                    })
                },
            )?)
            .await?;
    }

    let engine = state.engine.clone();
    scheduler.set_shutdown_handler(Box::new(move || {
        let engine = engine.clone();
        Box::pin(async move {
            engine.shutdown().await;
            tracing::info!("Shutting down scheduler");
        })
    }));

    println!("Starting scheduler...");
    match scheduler.start().await {
        Ok(_) => {
            println!("-------- SCHEDULER STARTED --------");
        }
        Err(e) => {
            println!("Failed to start scheduler: {:?}", e);
        }
    }

    run_server(router, scheduler).await?;

    Ok(())
}

async fn shutdown_signal(mut scheduler: JobScheduler) {
    if env::var("NO_SHUTDOWN").unwrap_or("false".to_string()) == "true" {
        return;
    }

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            scheduler.shutdown().await.unwrap();
            println!("Cleanups done, shutting down");
            std::process::exit(0);

        },
        _ = terminate => {
            scheduler.shutdown().await.unwrap();
            println!("Cleanups done, shutting down");
            std::process::exit(0);
        },
    }
}

fn run_server(router: Router, scheduler: JobScheduler) -> JoinHandle<()> {
    tokio::spawn(async {
        // Start the server
        let port = env::var("PORT").unwrap_or("5006".to_string());
        tracing::info!("Replypilot server running on http://0.0.0.0:{}", port);
        // check config
        println!("{}", *server_config::cfg);

        // run it with hyper
        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().unwrap()));
        tracing::debug!("listening on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await
        .unwrap();
    })
}
