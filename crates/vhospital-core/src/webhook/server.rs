//! Blocking HTTP listener for webhook deliveries
//!
//! Runs on its own thread. Only `POST {path}` reaches the handler.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

use super::handler::{WebhookHandler, WebhookResponse};
use super::signature::SIGNATURE_HEADER;

/// Largest body accepted from the provider
const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub struct WebhookServer {
    server: Server,
    path: String,
    handler: Arc<WebhookHandler>,
}

impl WebhookServer {
    pub fn bind(addr: &str, path: &str, handler: Arc<WebhookHandler>) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow!("Failed to bind webhook listener on {}: {}", addr, e))?;
        info!("Webhook listener on {} at {}", addr, path);
        Ok(Self {
            server,
            path: path.to_string(),
            handler,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until `unblock` is called
    pub fn serve(&self) {
        for request in self.server.incoming_requests() {
            self.dispatch(request);
        }
        info!("Webhook listener stopped");
    }

    /// Stop a running `serve` loop
    pub fn unblock(&self) {
        self.server.unblock();
    }

    fn dispatch(&self, mut request: Request) {
        let route = request.url().split('?').next().unwrap_or_default();
        debug!("{} {}", request.method(), request.url());

        let response = if route != self.path {
            error_response(404, "Not found")
        } else if *request.method() != Method::Post {
            error_response(405, "Method not allowed")
        } else {
            let signature = request
                .headers()
                .iter()
                .find(|h| h.field.equiv(SIGNATURE_HEADER))
                .map(|h| h.value.as_str().to_string());

            match read_body(&mut request) {
                Ok(body) => self.handler.handle(&body, signature.as_deref()),
                Err(response) => response,
            }
        };

        if let Err(e) = respond(request, response) {
            warn!("Failed to send webhook response: {}", e);
        }
    }
}

fn read_body(request: &mut Request) -> Result<Vec<u8>, WebhookResponse> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)
        .map_err(|e| {
            warn!("Failed to read webhook body: {}", e);
            error_response(400, "Unreadable body")
        })?;

    if body.len() as u64 > MAX_BODY_BYTES {
        return Err(error_response(413, "Payload too large"));
    }
    Ok(body)
}

fn error_response(status: u16, message: &str) -> WebhookResponse {
    WebhookResponse {
        status,
        body: json!({ "success": false, "message": message }),
    }
}

fn respond(request: Request, response: WebhookResponse) -> std::io::Result<()> {
    let mut http =
        Response::from_string(response.body.to_string()).with_status_code(response.status);
    if let Ok(header) = "Content-Type: application/json".parse::<Header>() {
        http = http.with_header(header);
    }
    request.respond(http)
}
