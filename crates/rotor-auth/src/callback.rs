//! Loopback receiver for the authorization redirect.

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::io;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Query parameters the identity provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Bind the first address that accepts a listener.
pub async fn bind(addresses: &[String]) -> io::Result<TcpListener> {
    let mut last_error = None;
    for address in addresses {
        match TcpListener::bind(address.as_str()).await {
            Ok(listener) => {
                debug!(address = %address, "Bound authorization callback listener");
                return Ok(listener);
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Could not bind callback listener");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no callback bind address configured")
    }))
}

/// Serve redirects on `listener` until `stop` fires.
///
/// Only the first callback is forwarded; later ones are answered but dropped.
pub async fn serve(
    listener: TcpListener,
    callbacks: mpsc::Sender<AuthorizationCallback>,
    stop: CancellationToken,
) -> io::Result<()> {
    let app = Router::new()
        .route("/", get(receive))
        .with_state(callbacks);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
}

async fn receive(
    State(callbacks): State<mpsc::Sender<AuthorizationCallback>>,
    Query(callback): Query<AuthorizationCallback>,
) -> Html<&'static str> {
    let failed = callback.error.is_some();
    if callbacks.try_send(callback).is_err() {
        debug!("Ignoring repeated authorization callback");
    }
    if failed {
        Html("<html><body>Authorization failed. You may close this window.</body></html>")
    } else {
        Html("<html><body>Authenticated. You may close this window.</body></html>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_falls_through_to_next_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = taken.local_addr().unwrap().to_string();

        let listener = bind(&[taken_addr.clone(), "127.0.0.1:0".to_string()])
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().to_string(), taken_addr);
    }

    #[tokio::test]
    async fn test_bind_without_addresses() {
        let err = bind(&[]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_first_callback_forwarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let server = tokio::spawn(serve(listener, tx, stop.clone()));

        let client = reqwest::Client::new();
        for code in ["first", "second"] {
            let response = client
                .get(format!("http://{addr}/?code={code}&state=s"))
                .send()
                .await
                .unwrap();
            assert!(response.status().is_success());
        }

        let callback = rx.recv().await.unwrap();
        assert_eq!(callback.code.as_deref(), Some("first"));
        assert_eq!(callback.state.as_deref(), Some("s"));
        assert!(rx.try_recv().is_err());

        drop(client);
        stop.cancel();
        server.await.unwrap().unwrap();
    }
}
