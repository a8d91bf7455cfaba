//! HTTP transport on `tiny_http`.
//!
//! A dedicated accept thread blocks on the listener and forwards each request
//! over a bounded channel to a Tokio task, which hands it to the blocking pool
//! for body reading, routing and the response write.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use stakegate_worker::TaskClass;
use tiny_http::{Header, Request, Response, Server};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

pub mod routes;

pub use routes::{Inbound, Method, Reply, handle};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;
const ACCEPT_QUEUE: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
	#[error("failed to bind {addr}: {reason}")]
	Bind { addr: SocketAddr, reason: String },

	#[error("failed to start accept thread: {0}")]
	Thread(#[from] std::io::Error),
}

pub struct HttpServer {
	addr: SocketAddr,
	server: Arc<Server>,
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}

impl HttpServer {
	/// Binds `addr` and starts serving on the current Tokio runtime.
	pub fn bind(addr: SocketAddr, state: Arc<AppState>) -> Result<Self, HttpError> {
		let server = Server::http(addr).map_err(|e| HttpError::Bind { addr, reason: e.to_string() })?;
		let local = server.server_addr().to_ip().ok_or_else(|| HttpError::Bind {
			addr,
			reason: "unable to determine bound address".into(),
		})?;
		let server = Arc::new(server);

		let (tx, mut rx) = mpsc::channel::<Request>(ACCEPT_QUEUE);
		let accept = Arc::clone(&server);
		stakegate_worker::spawn_named_thread(TaskClass::IoBlocking, "stakegate-http-accept", move || {
			while let Ok(request) = accept.recv() {
				if tx.blocking_send(request).is_err() {
					break;
				}
			}
		})?;

		let shutdown = CancellationToken::new();
		let token = shutdown.clone();
		let task = stakegate_worker::spawn(TaskClass::Request, async move {
			loop {
				tokio::select! {
					_ = token.cancelled() => break,
					maybe_req = rx.recv() => {
						let Some(req) = maybe_req else { break };
						let state = Arc::clone(&state);
						stakegate_worker::spawn_blocking(TaskClass::Request, move || serve_one(&state, req));
					}
				}
			}
		});

		Ok(Self {
			addr: local,
			server,
			shutdown,
			task,
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.addr
	}

	/// Stops accepting requests. Requests already dispatched finish on the
	/// blocking pool.
	pub async fn shutdown(self) {
		self.shutdown.cancel();
		self.server.unblock();
		if let Err(err) = self.task.await
			&& let Some(message) = stakegate_worker::join_error_panic_message(err)
		{
			tracing::error!(panic = %message, "http.dispatch_panicked");
		}
		tracing::info!(addr = %self.addr, "http.stopped");
	}
}

fn serve_one(state: &AppState, mut req: Request) {
	let method = match req.method() {
		tiny_http::Method::Get => Method::Get,
		tiny_http::Method::Post => Method::Post,
		_ => Method::Other,
	};
	let headers = req.headers().iter().map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string())).collect();

	let mut body = Vec::new();
	let read = req.as_reader().take(MAX_BODY_BYTES + 1).read_to_end(&mut body);
	let reply = match read {
		Err(err) => {
			tracing::debug!(error = %err, "http.body_read_failed");
			Reply::error(400, "Bad Request")
		}
		Ok(_) if body.len() as u64 > MAX_BODY_BYTES => Reply::error(413, "Payload Too Large"),
		Ok(_) => {
			let inbound = Inbound {
				method,
				url: req.url().to_string(),
				headers,
				body,
			};
			handle(state, &inbound)
		}
	};

	tracing::debug!(method = ?method, url = %req.url(), status = reply.status, "http.request");
	let mut response = Response::from_string(reply.body.to_string()).with_status_code(reply.status);
	if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
		response = response.with_header(header);
	}
	if let Err(err) = req.respond(response) {
		tracing::debug!(error = %err, "http.respond_failed");
	}
}
