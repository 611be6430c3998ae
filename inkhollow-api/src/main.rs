use inkhollow_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use inkhollow_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::{FeedSettings, ServerState};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("TBR_SPACING_MINUTES must be positive, got {0}")]
    TbrSpacing(i64),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_tbr_spacing_minutes() -> i64 {
    60
}

fn default_feed_content_limit() -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(199)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    worker_id: WorkerId,
    process_id: ProcessId,
    #[serde(default)]
    run_migrations: bool,
    #[serde(default = "default_tbr_spacing_minutes")]
    tbr_spacing_minutes: i64,
    #[serde(default = "default_feed_content_limit")]
    feed_content_limit: NonZeroU32,
}

impl Env {
    fn feed_settings(&self) -> Result<FeedSettings, InitError> {
        let tbr_spacing = PositiveDuration::from_minutes(self.tbr_spacing_minutes)
            .ok_or(InitError::TbrSpacing(self.tbr_spacing_minutes))?;

        Ok(FeedSettings {
            tbr_spacing,
            content_limit: self.feed_content_limit,
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkhollow_api=debug,\
                inkhollow_common=debug,\
                inkhollow_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c, shutting down"),
            Err(err) => tracing::error!(error = %err, "Could not listen for ctrl-c"),
        }
        trigger.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let feed_settings = env.feed_settings()?;

    let db_client = DbClient::connect(&env.database_url, env.worker_id, env.process_id).await?;
    if env.run_migrations {
        db_client.migrate().await?;
        info!("Applied database migrations");
    }

    let state = ServerState {
        db_client: Arc::new(db_client),
        feed_settings,
    };

    let app = server::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Env, InitError};
    use time::Duration;

    fn env(extra: &[(&str, &str)]) -> Result<Env, envy::Error> {
        let base = [
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/inkhollow"),
            ("WORKER_ID", "1"),
            ("PROCESS_ID", "2"),
        ];
        let vars = base
            .iter()
            .chain(extra)
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()));
        envy::from_iter(vars)
    }

    #[test]
    fn defaults_apply() {
        let env = env(&[]).unwrap();
        let settings = env.feed_settings().unwrap();

        assert!(!env.run_migrations);
        assert_eq!(settings.tbr_spacing.get(), Duration::HOUR);
        assert_eq!(settings.content_limit.get(), 200);
    }

    #[test]
    fn content_limit_must_be_positive() {
        assert!(env(&[("FEED_CONTENT_LIMIT", "0")]).is_err());
        assert!(env(&[("FEED_CONTENT_LIMIT", "-3")]).is_err());
        assert_eq!(
            env(&[("FEED_CONTENT_LIMIT", "25")])
                .unwrap()
                .feed_content_limit
                .get(),
            25
        );
    }

    #[test]
    fn tbr_spacing_must_be_positive_and_in_range() {
        for minutes in ["0", "-10", "9223372036854775807"] {
            let env = env(&[("TBR_SPACING_MINUTES", minutes)]).unwrap();
            assert!(matches!(
                env.feed_settings(),
                Err(InitError::TbrSpacing(_))
            ));
        }
    }
}
