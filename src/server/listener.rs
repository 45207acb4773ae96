use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::server::service::ProxyService;

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let service = Arc::new(ProxyService::from_config(cfg)?);
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", cfg.listen_addr);

    serve(listener, service).await
}

/// Accepts connections forever, one task per client.
pub async fn serve(listener: TcpListener, service: Arc<ProxyService>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {}", peer);

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, service);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
