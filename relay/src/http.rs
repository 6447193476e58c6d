//! HTTP trigger surface for manual sends.
//!
//! Exposes `POST /message/send`: the raw request body is forwarded to the
//! outbound binding and the response body is the literal `success` or
//! `fail`.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::bridge::MessageBridge;
use crate::OUTBOUND_BINDING;

pub const SEND_PATH: &str = "/message/send";

fn plain(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle one incoming request - the manual send plus a health probe.
async fn handle_request<B>(
    req: Request<B>,
    bridge: Arc<MessageBridge>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, SEND_PATH) => match req.into_body().collect().await {
            Ok(collected) => {
                let body = String::from_utf8_lossy(&collected.to_bytes()).into_owned();
                info!(bytes = body.len(), "manual send requested");
                if bridge.send(OUTBOUND_BINDING, &body) {
                    plain(StatusCode::OK, "success")
                } else {
                    plain(StatusCode::OK, "fail")
                }
            }
            Err(e) => {
                error!(error = %e, "failed to read request body");
                plain(StatusCode::OK, "fail")
            }
        },
        (&Method::GET, "/health") => plain(StatusCode::OK, "OK"),
        _ => plain(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

/// Serve the dispatch endpoint on an already-bound listener until the task
/// is aborted.
pub async fn serve(
    listener: TcpListener,
    bridge: Arc<MessageBridge>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(addr) = listener.local_addr() {
        info!("dispatch endpoint listening on http://{}{}", addr, SEND_PATH);
    }

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let bridge = bridge.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, bridge.clone()));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("error serving connection: {:?}", err);
            }
        });
    }
}
