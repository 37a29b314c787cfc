#![allow(dead_code)]

use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// A request as seen by the mock server. Non-JSON bodies are `Null`.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
}

type Responder = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

/// Loopback HTTP server answering every request through a closure and
/// recording what it received.
pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let responder: Arc<Responder> = Arc::new(responder);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let service = make_service_fn(move |_| {
            let responder = responder.clone();
            let recorded = recorded.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    handle(req, responder.clone(), recorded.clone())
                }))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(service);
        let url = format!("http://{}", server.local_addr());
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Self {
            url,
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose JSON-RPC `method` is `name`.
    pub fn rpc_calls(&self, name: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.body["method"] == name)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    req: Request<Body>,
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<Recorded>>>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .unwrap_or_default();
    let recorded = Recorded {
        method,
        path,
        query,
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    };

    let (status, body) = responder(&recorded);
    requests.lock().unwrap().push(recorded);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

pub fn json_reply(status: u16, body: Value) -> (u16, String) {
    (status, body.to_string())
}

/// A JSON-RPC 2.0 success echoing the request id.
pub fn rpc_result(request: &Recorded, result: Value) -> (u16, String) {
    json_reply(
        200,
        json!({"jsonrpc": "2.0", "id": request.body["id"], "result": result}),
    )
}

pub fn rpc_error(request: &Recorded, code: i64, message: &str) -> (u16, String) {
    json_reply(
        200,
        json!({"jsonrpc": "2.0", "id": request.body["id"], "error": {"code": code, "message": message}}),
    )
}
