use std::sync::Arc;

use task_tracker::server::TaskServer;
use task_tracker::store::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Owner name used by every in-process test server.
pub const OWNER: &str = "test-svc";

/// Build an actix test service wired to the given `Arc<TaskServer>`.
macro_rules! test_app {
    ($server:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(
                    task_tracker::handlers::AppState {
                        server: $server.clone(),
                    },
                ))
                .configure(task_tracker::handlers::configure),
        )
        .await
    };
}

pub fn memory_server() -> Arc<TaskServer> {
    TaskServer::new(OWNER, Arc::new(MemoryStore::default())).into()
}

/// Spawn a raw TCP server that answers every request with `body` as a
/// JSON 200 response. Returns the base URL and a shutdown handle.
pub fn spawn_model_server(body: String) -> (String, tokio::sync::oneshot::Sender<()>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();
    let listener = tokio::net::TcpListener::from_std(listener).unwrap();

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    if let Ok((mut stream, _)) = result {
                        let response = response.clone();
                        tokio::spawn(async move {
                            let mut buf = [0u8; 4096];
                            let _ = stream.read(&mut buf).await;
                            let _ = stream.write_all(response.as_bytes()).await;
                        });
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }
    });

    (format!("http://{}", addr), shutdown_tx)
}
