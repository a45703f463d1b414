// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use verification_server::{
    api::router,
    auth::{ApiKeyDigester, SessionVerifier},
    clock::SystemClock,
    config::Config,
    notify::HttpChannelProvider,
    state::{AppState, Components},
    storage::{database::DATABASE_FILE, CredentialStore, InMemoryStore, RedbStore, User},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_store(config: &Config) -> Arc<dyn CredentialStore> {
    match &config.data_dir {
        Some(dir) => {
            let path = Path::new(dir).join(DATABASE_FILE);
            tracing::info!(path = %path.display(), "Opening redb credential store");
            Arc::new(RedbStore::open(&path).expect("Failed to open credential store"))
        }
        None => {
            tracing::warn!("DATA_DIR not set; records are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    }
}

async fn seed_admin(store: &dyn CredentialStore, email: &str) {
    match store.find_user_by_email(email).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let mut admin = User::new(email, "Administrator");
            admin.admin = true;
            match store.save_user(&admin).await {
                Ok(()) => tracing::info!(email = %admin.email, "Created bootstrap admin"),
                Err(e) => tracing::error!(error = %e, "Failed to create bootstrap admin"),
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to look up bootstrap admin"),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_json);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let store = open_store(&config);
    if let Some(email) = &config.bootstrap_admin_email {
        seed_admin(store.as_ref(), email).await;
    }

    let identity =
        SessionVerifier::from_config(&config.session).expect("session keys validated by config");
    let api_keys =
        ApiKeyDigester::new(&config.api_key_secret).expect("Failed to key API key digester");

    let state = AppState::new(
        Components {
            store,
            identity: Arc::new(identity),
            channels: Arc::new(HttpChannelProvider::new()),
            clock: Arc::new(SystemClock),
            api_keys,
        },
        &config,
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate");
            tracing::info!(%addr, "Verification server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        _ => {
            tracing::info!(%addr, "Verification server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    tracing::info!("Server stopped");
}
