//! Per-request orchestration.
//!
//! [`HttpApp`] owns the immutable route table, the handler registry and the
//! options bag, and drives each accepted request through the trust, routing,
//! CORS and SSL-redirect stages before dispatching to a handler. Stages
//! short-circuit: the first one that fully forms a response terminates the
//! pipeline.

pub mod cors;
pub mod ssl;
pub mod trust;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::HttpOptions;
use crate::handler::{Handler, HandlerRegistry};
use crate::protocol::{HttpError, Output, Request};
use crate::router::Router;
use crate::server::{ApiServer, ServerError};

/// The application: routes, handlers and options, assembled once at
/// startup and immutable afterwards.
#[derive(Debug)]
pub struct HttpApp {
    options: HttpOptions,
    router: Router,
    handlers: HandlerRegistry,
}

impl HttpApp {
    pub fn builder() -> HttpAppBuilder {
        HttpAppBuilder::new()
    }

    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    /// Runs the accept loop on the given port until the shutdown token is
    /// cancelled. The connection being served when cancellation arrives
    /// always completes; the signal is observed between connections thanks
    /// to the server's bounded accept wait.
    pub async fn start_server(&self, port: u16, shutdown: CancellationToken) -> Result<(), ServerError> {
        info!(port, "starting api mode server");
        let server = ApiServer::bind(port).await?;

        loop {
            if shutdown.is_cancelled() {
                info!("performing graceful shutdown");
                return Ok(());
            }

            let Some((mut request, mut output)) = server.accept().await else {
                continue;
            };

            info!("IN {} {} {}", request.remote_address, request.method, request.uri);

            if let Err(e) = self.process(&mut request, &mut output).await {
                error!(cause = %e, "request failed, closing connection");
                output.coerce_failure();
            }

            if let Err(e) = output.finish().await {
                debug!(cause = %e, "error finishing response");
            }
        }
    }

    /// Handles one request: pipeline stages, dispatch, error mapping.
    ///
    /// Status-class errors are converted into a response here. An `Err`
    /// return means the connection itself is compromised; the caller fails
    /// it without taking the serving loop down.
    pub async fn process(&self, request: &mut Request, output: &mut Output) -> Result<(), HttpError> {
        match self.run_stages(request, output).await {
            Ok(()) => Ok(()),
            Err(error) => self.render_error(error, output).await,
        }
    }

    async fn run_stages(&self, request: &mut Request, output: &mut Output) -> Result<(), HttpError> {
        trust::recover(&self.options, request);

        let (route, action) = self.router.resolve(&request.path)?;
        let service = route.service().to_owned();
        let route = route.clone();
        request.assign_route(route, action);

        if cors::handle(&self.options, request, output)? {
            return Ok(());
        }

        if ssl::handle(&self.options, request, output)? {
            return Ok(());
        }

        self.check_payload_size(request)?;

        let handler = self
            .handlers
            .get(&service)
            .ok_or_else(|| HttpError::application(format!("no handler registered for service '{service}'")))?;
        handler.handle(request, output).await
    }

    /// Rejects oversized bodies before any handler runs.
    fn check_payload_size(&self, request: &Request) -> Result<(), HttpError> {
        let Some(value) = request.headers.get("content-length") else {
            return Ok(());
        };
        let length = value.trim().parse::<u64>().map_err(|_| HttpError::bad_request())?;
        if length > self.options.max_request_body as u64 {
            return Err(HttpError::PayloadTooLarge);
        }
        Ok(())
    }

    async fn render_error(&self, error: HttpError, output: &mut Output) -> Result<(), HttpError> {
        match error {
            HttpError::Application { message, status } => {
                debug!(status, message, "rendering application error");
                output.set_status(status)?;
                output.header("Content-Type: application/json")?;
                let body = serde_json::json!({ "message": message });
                output.write(body.to_string().as_bytes()).await?;
                Ok(())
            }
            other => match other.status_code() {
                // headers registered by earlier stages are preserved
                Some(code) => {
                    debug!(code, "mapping error to status response");
                    output.set_status(code)?;
                    Ok(())
                }
                None => Err(other),
            },
        }
    }
}

/// Assembles an [`HttpApp`].
///
/// Routes and handlers can be wired explicitly (`route` + `handler`) when
/// identifiers come from configuration, or together via `service`, which
/// synthesizes a sequential identifier.
#[derive(Debug)]
pub struct HttpAppBuilder {
    options: HttpOptions,
    router: Router,
    handlers: HandlerRegistry,
    sequence: usize,
}

impl HttpAppBuilder {
    fn new() -> Self {
        Self { options: HttpOptions::default(), router: Router::new(), handlers: HandlerRegistry::new(), sequence: 1 }
    }

    pub fn options(mut self, options: HttpOptions) -> Self {
        self.options = options;
        self
    }

    /// Binds a path to a handler identifier.
    pub fn route<S: Into<String>>(mut self, path: &str, handler_id: S) -> Self {
        self.router.add(path, handler_id);
        self
    }

    /// Registers a handler under an identifier.
    pub fn handler<S, H>(mut self, id: S, handler: H) -> Self
    where
        S: Into<String>,
        H: Handler + 'static,
    {
        self.handlers.register(id, handler);
        self
    }

    /// Binds a path directly to a handler, synthesizing the identifier.
    pub fn service<H: Handler + 'static>(mut self, path: &str, handler: H) -> Self {
        let id = format!("service.{}", self.sequence);
        self.sequence += 1;
        self.router.add(path, id.as_str());
        self.handlers.register(id, handler);
        self
    }

    pub fn build(self) -> HttpApp {
        HttpApp { options: self.options, router: self.router, handlers: self.handlers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsMode, SslRedirectMode};
    use crate::protocol::{HeaderStore, RequestTag};
    use async_trait::async_trait;
    use tokio::io::AsyncReadExt;

    struct HelloHandler;

    #[async_trait]
    impl Handler for HelloHandler {
        async fn handle(&self, request: &mut Request, output: &mut Output) -> Result<(), HttpError> {
            output.header("Content-Type: text/plain")?;
            output.write(format!("hello from {}", request.action).as_bytes()).await?;
            Ok(())
        }
    }

    struct FailingHandler(u16);

    #[async_trait]
    impl Handler for FailingHandler {
        async fn handle(&self, _request: &mut Request, _output: &mut Output) -> Result<(), HttpError> {
            Err(HttpError::Status(self.0))
        }
    }

    fn app(options: HttpOptions) -> HttpApp {
        HttpApp::builder().options(options).service("/api", HelloHandler).build()
    }

    fn get_request(path: &str, headers: &[(&str, &str)]) -> Request {
        Request {
            path: path.to_owned(),
            uri: path.to_owned(),
            host: "example.com".to_owned(),
            headers: headers.iter().copied().collect::<HeaderStore>(),
            ..Default::default()
        }
    }

    async fn run(app: &HttpApp, request: &mut Request) -> (u16, String) {
        let (near, mut far) = tokio::io::duplex(64 * 1024);
        let mut output = Output::new(near);
        app.process(request, &mut output).await.unwrap();
        let status = output.status();
        output.finish().await.unwrap();
        drop(output);

        let mut collected = Vec::new();
        far.read_to_end(&mut collected).await.unwrap();
        (status, String::from_utf8(collected).unwrap())
    }

    #[tokio::test]
    async fn dispatch_passes_action_to_handler() {
        let app = app(HttpOptions::default());
        let mut request = get_request("/api/users/42", &[]);

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 200);
        assert!(wire.ends_with("hello from users/42"));
        assert_eq!(request.route.as_ref().unwrap().path(), "/api");
    }

    #[tokio::test]
    async fn unknown_path_maps_to_404() {
        let app = app(HttpOptions::default());
        let mut request = get_request("/nope", &[]);

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 404);
        assert!(wire.starts_with("HTTP/1.0 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn status_error_preserves_existing_headers() {
        let app = HttpApp::builder()
            .options(HttpOptions { cors_mode: CorsMode::Allow, ..Default::default() })
            .service("/api", FailingHandler(409))
            .build();
        // the CORS echo header is added before the handler fails
        let mut request = get_request("/api", &[("origin", "https://example.com")]);

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 409);
        assert!(wire.contains("Access-Control-Allow-Origin: https://example.com\r\n"));
    }

    #[tokio::test]
    async fn preflight_short_circuits_before_dispatch() {
        let app = HttpApp::builder()
            .options(HttpOptions { cors_mode: CorsMode::Allow, ..Default::default() })
            .service("/api", FailingHandler(500))
            .build();
        let mut request = get_request("/api", &[("origin", "https://example.com")]);
        request.method = "options".to_owned();

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 200);
        assert!(wire.contains("Access-Control-Allow-Methods: GET, HEAD, POST, PUT, PATCH, DELETE\r\n"));
    }

    #[tokio::test]
    async fn ssl_redirect_short_circuits_get() {
        let app = HttpApp::builder()
            .options(HttpOptions { ssl_redirect: SslRedirectMode::Auto, ..Default::default() })
            .service("/api", FailingHandler(500))
            .build();
        let mut request = get_request("/api", &[]);

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 301);
        assert!(wire.contains("Location: https://example.com/api\r\n"));
    }

    #[tokio::test]
    async fn ssl_redirect_lets_post_through() {
        let app = HttpApp::builder()
            .options(HttpOptions { ssl_redirect: SslRedirectMode::Auto, ..Default::default() })
            .service("/api", HelloHandler)
            .build();
        let mut request = get_request("/api", &[]);
        request.method = "post".to_owned();

        let (status, _wire) = run(&app, &mut request).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn oversized_content_length_maps_to_413() {
        let app = app(HttpOptions { max_request_body: 1024, ..Default::default() });
        let mut request = get_request("/api", &[("content-length", "2048")]);

        let (status, _wire) = run(&app, &mut request).await;
        assert_eq!(status, 413);
    }

    #[tokio::test]
    async fn application_error_renders_json_body() {
        struct Failing;

        #[async_trait]
        impl Handler for Failing {
            async fn handle(&self, _request: &mut Request, _output: &mut Output) -> Result<(), HttpError> {
                Err(HttpError::application_with_status("record not ready", 409))
            }
        }

        let app = HttpApp::builder().service("/api", Failing).build();
        let mut request = get_request("/api", &[]);

        let (status, wire) = run(&app, &mut request).await;
        assert_eq!(status, 409);
        assert!(wire.contains("Content-Type: application/json\r\n"));
        assert!(wire.ends_with(r#"{"message":"record not ready"}"#));
    }

    #[tokio::test]
    async fn trust_recovery_runs_before_dispatch() {
        let app = HttpApp::builder()
            .options(HttpOptions { real_ip_header: Some("X-Forwarded-For".to_owned()), ..Default::default() })
            .service("/api", HelloHandler)
            .build();
        let mut request = get_request("/api", &[("x-forwarded-for", "203.0.113.7")]);
        request.remote_address = "10.0.0.2".to_owned();

        let (status, _wire) = run(&app, &mut request).await;
        assert_eq!(status, 200);
        assert_eq!(request.remote_address, "203.0.113.7");
        assert_eq!(request.tag(RequestTag::OriginalAddress), Some("10.0.0.2"));
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_loop_before_accepting() {
        let app = app(HttpOptions::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // port 0 binds an ephemeral port; the loop must exit on the first check
        app.start_server(0, shutdown).await.unwrap();
    }
}
