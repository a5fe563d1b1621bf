//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ai_chat::OpenAiChatAdapter, db::PgStore},
    config::Config,
    error::ApiError,
    web::{
        admin::{
            approve_doctor_handler, assign_doctor_handler, list_doctors_handler,
            list_unassigned_sessions_handler, review_session_handler,
        },
        auth::{login_handler, logout_handler, signup_handler},
        chat::{list_chat_messages_handler, post_chat_message_handler},
        docs::ApiDoc,
        middleware::require_auth,
        progress::{get_profile_handler, list_certifications_handler},
        sessions::{
            book_session_handler, cancel_session_handler, complete_session_handler,
            get_session_handler, list_sessions_handler, set_meeting_url_handler,
            start_session_handler, submit_notes_handler,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use therapy_core::ports::DatabaseService;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // Certification definitions are provisioned up front so the award
    // path never has to bootstrap reference data mid-request.
    let certifications = store.ensure_certifications().await?;
    info!("{} certification definitions available", certifications.len());

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let chat_adapter = Arc::new(OpenAiChatAdapter::new(
        openai_client,
        config.chat_model.clone(),
        config.chat_thinking_delay,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: store,
        chat: chat_adapter,
        config: config.clone(),
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/sessions/request", post(book_session_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/start", post(start_session_handler))
        .route("/sessions/{id}/complete", post(complete_session_handler))
        .route("/sessions/{id}/cancel", post(cancel_session_handler))
        .route("/sessions/{id}/meeting-url", put(set_meeting_url_handler))
        .route("/sessions/{id}/notes", post(submit_notes_handler))
        .route(
            "/sessions/{id}/messages",
            post(post_chat_message_handler).get(list_chat_messages_handler),
        )
        .route("/certifications", get(list_certifications_handler))
        .route("/profile", get(get_profile_handler))
        .route("/admin/sessions", get(list_unassigned_sessions_handler))
        .route("/admin/sessions/{id}/assign", put(assign_doctor_handler))
        .route("/admin/sessions/{id}/review", post(review_session_handler))
        .route("/admin/doctors", get(list_doctors_handler))
        .route("/admin/doctors/{id}/approve", put(approve_doctor_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
