use std::{fs::create_dir_all, net::SocketAddr, path::PathBuf};

use anyhow::Result;
use axum::{routing::post, Router};
use clap::Parser;
use tower_http::services::ServeDir;

mod route;

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the address to listen on
    #[arg(long, default_value = "0.0.0.0:8008")]
    pub listen: SocketAddr,
    /// the directory where uploads and generated calendars are staged
    #[arg(long, default_value = "uploads")]
    pub upload_dir: PathBuf,
    /// the directory containing the upload form
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,
}

/// Shared configuration available to all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub upload_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Arguments::parse();
    create_dir_all(&args.upload_dir)?;
    let state = AppState {
        upload_dir: args.upload_dir,
    };
    let app = Router::new()
        .route("/upload", post(route::upload::handler))
        .with_state(state)
        .fallback_service(ServeDir::new(&args.static_dir));
    log::info!("listening on {}", args.listen);
    axum::Server::bind(&args.listen)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
