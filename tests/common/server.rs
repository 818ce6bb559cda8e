//! Running the HTTP surface on a real socket

use ffmerge::clock::SystemClock;
use ffmerge::{Config, Encoder, HttpFetcher, MergeService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A service listening on an ephemeral port
pub struct TestServer {
    /// Base URL, e.g. `http://127.0.0.1:41234`
    pub base_url: String,
    /// The service behind the router
    pub service: Arc<MergeService>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start the router with a real HTTP fetcher and `encoder`
    pub async fn start(config: Config, encoder: Arc<dyn Encoder>) -> Self {
        let fetcher = HttpFetcher::new(&config.fetch).expect("http client");
        let service = MergeService::with_components(
            config.clone(),
            Arc::new(fetcher),
            encoder,
            Arc::new(SystemClock),
        )
        .await
        .expect("service starts");
        let service = Arc::new(service);

        let listener = tokio::net::TcpListener::bind(config.server.bind_address())
            .await
            .expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        let router = ffmerge::api::create_router(service.clone(), Arc::new(config));
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            service,
            task,
        }
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Shut the service down and stop serving
    pub async fn stop(self) {
        self.service.shutdown().await;
        self.task.abort();
    }
}
