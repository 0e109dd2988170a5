//! The short-lived loopback HTTP server that receives the OAuth redirect.
//!
//! A [`CallbackListener`] owns its socket, its serving task and the single-slot channel over
//! which the first authorization outcome is handed to the waiting flow. Nothing here is global,
//! so independent listeners do not interfere with each other.

use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};
use hyper::service::service_fn;
use hyper::{Request, Response};
use oauth2::{AuthorizationCode, CsrfToken, RedirectUrl};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("timed out after {0:?} waiting for the user to authorize access in the browser")]
    ConsentTimeout(Duration),
    #[error("authorization was denied: {0}")]
    ConsentDenied(String),
    #[error("callback listener stopped before an authorization code arrived")]
    ListenerClosed,
}

/// What the redirect told us.
#[derive(Debug)]
enum CallbackOutcome {
    Code(AuthorizationCode),
    Denied(String),
}

/// Everything a request handler needs; shared by all connections.
struct CallbackState {
    path: String,
    csrf: CsrfToken,
    done_html: &'static str,
    outcome: mpsc::Sender<CallbackOutcome>,
}

impl CallbackState {
    fn handle(&self, req: &Request<Incoming>) -> Response<CallbackBody> {
        if req.method() != Method::GET || req.uri().path() != self.path {
            return respond(StatusCode::NOT_FOUND, "Not found.");
        }

        let mut presented_state = None;
        let mut presented_code = None;
        let mut presented_error = None;
        for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes()) {
            match &*k {
                "state" => presented_state = Some(v),
                "code" => presented_code = Some(v),
                "error" => presented_error = Some(v),
                _ => {}
            }
        }

        if presented_state.as_deref() != Some(self.csrf.secret().as_str()) {
            tracing::warn!("ignoring OAuth redirect with mismatched state");
            return respond(StatusCode::BAD_REQUEST, "Invalid state parameter.");
        }

        if let Some(error) = presented_error {
            return Response::new(CallbackBody::delivering(
                "Authorization was not granted. You can close this tab.",
                self.outcome.clone(),
                CallbackOutcome::Denied(error.into_owned()),
            ));
        }

        let Some(code) = presented_code else {
            return respond(StatusCode::BAD_REQUEST, "No authorization code found.");
        };
        let mut response = Response::new(CallbackBody::delivering(
            self.done_html,
            self.outcome.clone(),
            CallbackOutcome::Code(AuthorizationCode::new(code.into_owned())),
        ));
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        response
    }
}

fn respond(status: StatusCode, body: &'static str) -> Response<CallbackBody> {
    let mut response = Response::new(CallbackBody {
        body: Full::from(body),
        pending: None,
    });
    *response.status_mut() = status;
    response
}

/// A response body that hands its outcome to the waiting flow once hyper has taken the last
/// frame of the response.
///
/// If the connection goes away before that, the outcome is handed over when the body is
/// dropped. Only the first outcome ever delivered is kept.
struct CallbackBody {
    body: Full<Bytes>,
    pending: Option<(mpsc::Sender<CallbackOutcome>, CallbackOutcome)>,
}

impl CallbackBody {
    fn delivering(
        body: &'static str,
        to: mpsc::Sender<CallbackOutcome>,
        outcome: CallbackOutcome,
    ) -> Self {
        Self {
            body: Full::from(body),
            pending: Some((to, outcome)),
        }
    }

    fn deliver(&mut self) {
        let Some((to, outcome)) = self.pending.take() else {
            return;
        };
        if to.try_send(outcome).is_err() {
            tracing::debug!("authorization outcome already delivered, dropping duplicate");
        }
    }
}

impl Body for CallbackBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        let frame = Pin::new(&mut this.body).poll_frame(cx);
        if this.body.is_end_stream() {
            this.deliver();
        }
        frame
    }

    fn is_end_stream(&self) -> bool {
        self.body.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.body.size_hint()
    }
}

impl Drop for CallbackBody {
    fn drop(&mut self) {
        self.deliver();
    }
}

/// A running redirect endpoint.
///
/// The socket is bound in [`CallbackListener::bind`] and released by
/// [`CallbackListener::shutdown`], or when the listener is dropped.
pub struct CallbackListener {
    redirect_url: RedirectUrl,
    local_addr: SocketAddr,
    outcomes: mpsc::Receiver<CallbackOutcome>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds `addr` and starts serving `path` in a background task.
    ///
    /// Requests must present `csrf` as their `state` parameter to be accepted. `done_html` is
    /// sent back to the browser once a code has been received.
    pub async fn bind(
        addr: SocketAddr,
        path: &str,
        csrf: CsrfToken,
        done_html: &'static str,
    ) -> std::io::Result<Self> {
        let socket = TcpListener::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        let redirect_url = RedirectUrl::new(format!(
            "http://{}:{}{}",
            local_addr.ip(),
            local_addr.port(),
            path
        ))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let (outcome_tx, outcome_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            path: path.to_string(),
            csrf,
            done_html,
            outcome: outcome_tx,
        });
        let task = tokio::spawn(serve(socket, state, stop_rx));
        tracing::debug!(%local_addr, "OAuth callback listener started");

        Ok(Self {
            redirect_url,
            local_addr,
            outcomes: outcome_rx,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    pub fn redirect_url(&self) -> &RedirectUrl {
        &self.redirect_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the browser to deliver an authorization code, for at most `timeout`.
    pub async fn wait_for_code(
        &mut self,
        timeout: Duration,
    ) -> Result<AuthorizationCode, AuthError> {
        match tokio::time::timeout(timeout, self.outcomes.recv()).await {
            Err(_) => Err(AuthError::ConsentTimeout(timeout)),
            Ok(None) => Err(AuthError::ListenerClosed),
            Ok(Some(CallbackOutcome::Denied(reason))) => Err(AuthError::ConsentDenied(reason)),
            Ok(Some(CallbackOutcome::Code(code))) => Ok(code),
        }
    }

    /// Stops accepting connections and lets in-flight ones finish, for at most `grace`.
    ///
    /// Overrunning the grace period is not an error; the server task is aborted instead.
    pub async fn shutdown(mut self, grace: Duration) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => tracing::debug!("OAuth callback listener stopped"),
            Ok(Err(e)) => tracing::warn!("OAuth callback listener task failed: {e}"),
            Err(_) => {
                tracing::warn!(?grace, "OAuth callback listener did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Accepts connections until told to stop, then drains the open ones.
async fn serve(socket: TcpListener, state: Arc<CallbackState>, mut stop: oneshot::Receiver<()>) {
    let (drain_tx, drain_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = socket.accept() => {
                let (conn, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("failed to accept callback connection: {e}");
                        continue;
                    }
                };
                tracing::trace!(%peer, "accepted callback connection");
                let state = Arc::clone(&state);
                let mut drain = drain_rx.clone();
                connections.spawn(async move {
                    let conn = hyper_util::rt::TokioIo::new(conn);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(state.handle(&req)) }
                    });
                    let mut serve = std::pin::pin!(
                        hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                    );
                    tokio::select! {
                        exit = &mut serve => {
                            if let Err(e) = exit {
                                tracing::debug!(%peer, "callback connection ended with error: {e}");
                            }
                        }
                        _ = drain.changed() => {
                            serve.as_mut().graceful_shutdown();
                            if let Err(e) = serve.await {
                                tracing::debug!(%peer, "callback connection ended with error: {e}");
                            }
                        }
                    }
                });
            }
        }
    }

    // free the port before draining
    drop(socket);
    let _ = drain_tx.send(true);
    while connections.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;

    const DONE: &str = "<html><body>done</body></html>";

    async fn listener(csrf: &str) -> CallbackListener {
        CallbackListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            "/oauth2callback",
            CsrfToken::new(csrf.to_string()),
            DONE,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn delivers_code_after_responding() {
        let mut listener = listener("s3cret").await;
        let url = format!("{}?state=s3cret&code=4%2Fabc", listener.redirect_url().as_str());

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), DONE);

        let code = listener.wait_for_code(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code.secret(), "4/abc");
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn outcome_is_handed_over_after_the_response_body() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut body = CallbackBody::delivering(
            DONE,
            tx,
            CallbackOutcome::Code(AuthorizationCode::new("c".to_string())),
        );
        assert!(rx.try_recv().is_err());

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(&frame.into_data().unwrap()[..], DONE.as_bytes());
        assert!(matches!(
            rx.try_recv(),
            Ok(CallbackOutcome::Code(ref code)) if code.secret() == "c"
        ));
    }

    #[test]
    fn abandoned_response_still_hands_over_outcome() {
        let (tx, mut rx) = mpsc::channel(1);
        let body = CallbackBody::delivering(
            DONE,
            tx,
            CallbackOutcome::Denied("access_denied".to_string()),
        );
        drop(body);
        assert!(matches!(
            rx.try_recv(),
            Ok(CallbackOutcome::Denied(ref reason)) if reason == "access_denied"
        ));
    }

    #[tokio::test]
    async fn code_is_ready_once_response_is_read() {
        let mut listener = listener("st").await;
        let url = format!("{}?state=st&code=ready", listener.redirect_url().as_str());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, DONE);

        let code = listener.wait_for_code(Duration::ZERO).await.unwrap();
        assert_eq!(code.secret(), "ready");
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn redirect_url_points_at_callback_path() {
        let listener = listener("s").await;
        let addr = listener.local_addr();
        assert_eq!(
            listener.redirect_url().as_str(),
            format!("http://127.0.0.1:{}/oauth2callback", addr.port())
        );
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn rejects_wrong_state_and_unknown_paths() {
        let mut listener = listener("expected").await;
        let base = format!("http://{}", listener.local_addr());

        let bad_state = reqwest::get(format!("{base}/oauth2callback?state=other&code=x"))
            .await
            .unwrap();
        assert_eq!(bad_state.status(), reqwest::StatusCode::BAD_REQUEST);

        let favicon = reqwest::get(format!("{base}/favicon.ico")).await.unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let no_code = reqwest::get(format!("{base}/oauth2callback?state=expected"))
            .await
            .unwrap();
        assert_eq!(no_code.status(), reqwest::StatusCode::BAD_REQUEST);

        // none of the above produced a code
        let err = listener
            .wait_for_code(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ConsentTimeout(_)));
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn provider_error_is_reported_as_denial() {
        let mut listener = listener("st").await;
        let url = format!(
            "{}?state=st&error=access_denied",
            listener.redirect_url().as_str()
        );
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let err = listener
            .wait_for_code(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ConsentDenied(ref reason) if reason == "access_denied"));
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn only_first_code_is_kept() {
        let mut listener = listener("st").await;
        let redirect = listener.redirect_url().as_str().to_string();
        for code in ["first", "second"] {
            let response = reqwest::get(format!("{redirect}?state=st&code={code}"))
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            response.text().await.unwrap();
        }

        let code = listener.wait_for_code(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code.secret(), "first");
        listener.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn shutdown_releases_the_port() {
        let listener = listener("st").await;
        let addr = listener.local_addr();
        listener.shutdown(Duration::from_secs(5)).await;

        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port should be free after shutdown");
    }
}
