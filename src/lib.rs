//! Documentation of the book quiz backend.
//!
//! Community-submitted quiz questions tied to books, peer approval, and
//! scored quiz sessions that award points to reader profiles.
//!
//!
//!
//! # Question Lifecycle
//!
//! - A contributor submits a question for a book: two options, one correct
//! - The question sits unapproved until three distinct users endorse it
//! - Each user can endorse a question once, there is no downvote
//! - Approval is one-way, a question never leaves the pool
//! - Quiz sessions draw up to 10 approved questions per genre, shuffled
//! - A finished session awards 10 points per correct answer
//!
//!
//!
//! # Notes
//!
//! ## Redis
//! All durable state sits in Redis behind a small document-store trait.
//! Documents are hashes, one per question/result/user, with JSON field
//! values. The two multi-writer spots are handled with Redis primitives
//! rather than read-then-write:
//!
//! - vote counts and point balances use `HINCRBY`
//! - voter membership uses a Lua script that appends only if absent
//!
//! Result records and point awards are two separate writes. If the second
//! fails the result exists without its award; callers see the storage error
//! as-is, nothing is retried.
//!
//! ## Testing
//! The test suite runs against an in-memory store, no Redis needed:
//! ```sh
//! cargo test
//! ```
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod models;
pub mod quiz;
pub mod routes;
pub mod state;
pub mod store;

use routes::{pending_handler, quiz_handler, result_handler, submit_question_handler, vote_handler};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/questions", post(submit_question_handler))
        .route("/questions/pending", get(pending_handler))
        .route("/questions/{id}/votes", post(vote_handler))
        .route("/quiz", get(quiz_handler))
        .route("/results", post(result_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
