use crate::config::CheckoutConfig;
use crate::domain::checkout::{CheckoutMessage, CheckoutOrder};
use crate::domain::ports::CheckoutWidget;
use crate::error::CheckoutError;
use async_trait::async_trait;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Parking fee checkout</title>
  <script src="https://www.paypal.com/sdk/js?client-id=__CLIENT_ID__&currency=__CURRENCY__"></script>
</head>
<body>
  <h2>Parking fee for <span id="vehicle"></span>: __AMOUNT__ __CURRENCY__</h2>
  <div id="paypal-button-container"></div>
  <p id="status"></p>
  <script>
    const order = __ORDER__;
    document.getElementById('vehicle').textContent = order.vehicle;
    function post(message) {
      return fetch('/message', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(message)
      }).then(function () {
        document.getElementById('status').textContent = 'You can close this window.';
      });
    }
    paypal.Buttons({
      createOrder: function (data, actions) {
        return actions.order.create({
          purchase_units: [{
            amount: { value: order.amount, currency_code: order.currency },
            custom_id: order.vehicle
          }]
        });
      },
      onApprove: function (data, actions) {
        return actions.order.capture().then(function (details) {
          return post({ status: 'success', orderID: data.orderID, purchase: details });
        });
      },
      onCancel: function () { return post({ status: 'cancel' }); },
      onError: function (err) { return post({ status: 'error', error: String(err) }); }
    }).render('#paypal-button-container');
  </script>
</body>
</html>
"#;

/// Renders the hosted button page for one order.
pub fn render_page(client_id: &str, order: &CheckoutOrder) -> String {
    let amount = format!("{:.2}", order.amount.value());
    let data = serde_json::json!({
        "vehicle": order.vehicle_id,
        "amount": amount,
        "currency": order.currency,
    })
    .to_string()
    // keeps `</script>` inside a plate from closing the script block
    .replace('<', "\\u003c");

    PAGE_TEMPLATE
        .replace("__CLIENT_ID__", client_id)
        .replace("__CURRENCY__", &order.currency)
        .replace("__AMOUNT__", &amount)
        .replace("__ORDER__", &data)
}

/// A loopback HTTP server serving one checkout page and accepting exactly
/// one terminal message from it.
pub struct CheckoutSession {
    url: String,
    receiver: oneshot::Receiver<CheckoutMessage>,
    server: JoinHandle<()>,
}

type MessageSlot = Arc<Mutex<Option<oneshot::Sender<CheckoutMessage>>>>;

impl CheckoutSession {
    /// Binds `127.0.0.1:port` (0 picks a free port) and starts serving.
    pub fn start(page: String, port: u16) -> Result<Self, CheckoutError> {
        let (sender, receiver) = oneshot::channel();
        let slot: MessageSlot = Arc::new(Mutex::new(Some(sender)));
        let page = Arc::new(page);

        let service = make_service_fn(move |_| {
            let slot = slot.clone();
            let page = page.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    handle(req, page.clone(), slot.clone())
                }))
            }
        });

        let address = SocketAddr::from(([127, 0, 0, 1], port));
        let server = Server::try_bind(&address)
            .map_err(|e| CheckoutError::Server(e.to_string()))?
            .serve(service);
        let url = format!("http://{}/", server.local_addr());

        let server = tokio::spawn(async move {
            if let Err(err) = server.await {
                error!("Checkout server error: {err}");
            }
        });

        Ok(Self {
            url,
            receiver,
            server,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves with the first message the page posts.
    pub async fn wait(mut self) -> Result<CheckoutMessage, CheckoutError> {
        let message = (&mut self.receiver)
            .await
            .map_err(|_| CheckoutError::Closed);
        self.server.abort();
        message
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    req: Request<Body>,
    page: Arc<String>,
    slot: MessageSlot,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("checkout: {method} {path}");

    let response = match (method, path.as_str()) {
        (Method::GET, "/") => reply(StatusCode::OK, "text/html; charset=utf-8", page.to_string()),
        (Method::POST, "/message") => accept_message(req, &slot).await,
        _ => reply(StatusCode::NOT_FOUND, "text/plain", "Not found".to_string()),
    };
    Ok(response)
}

async fn accept_message(req: Request<Body>, slot: &MessageSlot) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => return reply(StatusCode::BAD_REQUEST, "text/plain", err.to_string()),
    };
    let message = match serde_json::from_slice::<CheckoutMessage>(&bytes) {
        Ok(message) => message,
        Err(err) => {
            warn!("unreadable checkout message: {err}");
            return reply(StatusCode::BAD_REQUEST, "text/plain", err.to_string());
        }
    };

    match slot.lock().await.take() {
        Some(sender) => {
            // The receiver only goes away with the session itself.
            let _ = sender.send(message);
            reply(StatusCode::OK, "text/plain", "ok".to_string())
        }
        None => reply(
            StatusCode::CONFLICT,
            "text/plain",
            "Checkout already completed".to_string(),
        ),
    }
}

fn reply(status: StatusCode, content_type: &'static str, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// [`CheckoutWidget`] that opens the hosted PayPal button in the system
/// browser and waits for the page to report back.
pub struct BrowserCheckout {
    client_id: String,
    port: u16,
    open_browser: bool,
    timeout: Option<Duration>,
}

impl BrowserCheckout {
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            port: config.port,
            open_browser: config.open_browser,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl CheckoutWidget for BrowserCheckout {
    async fn checkout(&self, order: &CheckoutOrder) -> Result<CheckoutMessage, CheckoutError> {
        let session = CheckoutSession::start(render_page(&self.client_id, order), self.port)?;
        let url = session.url().to_string();

        // Launching the browser can block on the spawned opener process.
        let opened = self.open_browser && {
            let target = url.clone();
            tokio::task::spawn_blocking(move || webbrowser::open(&target).is_ok())
                .await
                .unwrap_or(false)
        };
        if opened {
            info!("Opening browser to: {url}");
        } else {
            info!("Open {url} in a browser to complete the PayPal payment.");
        }

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, session.wait())
                .await
                .map_err(|_| CheckoutError::TimedOut(limit.as_secs()))?,
            None => session.wait().await,
        }
    }
}
