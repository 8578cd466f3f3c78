use std::net::SocketAddr;

use lingolink_server::chat::ChatProvider;
use lingolink_server::config::Config;
use lingolink_server::store::Store;
use lingolink_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut config = Config::from_env();
    if let Some(port) = std::env::args().nth(1) {
        config.port = port.parse()?;
    }

    let store = Store::open(&config.data_dir)?;
    let chat = ChatProvider::new(&config);
    let state = AppState { store, chat };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await?;
    Ok(())
}
