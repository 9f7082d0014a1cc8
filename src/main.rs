use std::net::SocketAddr;

use clap::Parser;
use cookie_jwt::cli::{
    Args, build_config, handle_create_user, init_logging, load_jwt_secret, open_database,
    take_create_user_password,
};
use cookie_jwt::{create_app, init_cleanup};
use tracing::{error, info};

// Secrets are read from (and removed from) the environment here, before the
// tokio runtime spawns its worker threads.
fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let new_user = match args.create_user.as_deref() {
        Some(username) => match take_create_user_password() {
            Some(password) => Some((username.to_string(), password)),
            None => std::process::exit(1),
        },
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start the async runtime");
            std::process::exit(1);
        });

    runtime.block_on(serve(args, jwt_secret, new_user));
}

async fn serve(args: Args, jwt_secret: String, new_user: Option<(String, String)>) {
    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, jwt_secret).unwrap_or_else(|e| {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    if let Some((username, password)) = new_user {
        handle_create_user(&config.db, &username, &password).await;
    }

    if !config.auth.profile.secure {
        info!("Session cookies are not marked Secure");
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    init_cleanup(&config.db).await;
    let app = create_app(&config);

    info!(address = %local_addr, "Listening");

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
