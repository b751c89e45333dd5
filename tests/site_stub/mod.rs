use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[allow(dead_code)]
pub const LANDING_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Acme Widgets</title><style>body { font-family: Comic Sans MS; }</style></head>
  <body>
    <nav>Home | Pricing</nav>
    <main>
      <h1>Widgets for everyone</h1>
      <p>We sell <b>synergy</b> at scale.</p>
      <div style="display: none">secret coupon</div>
      <h2>Pricing</h2>
      <p>Call us.</p>
      <script>track("visit")</script>
    </main>
  </body>
</html>
"#;

/// Target website for end-to-end tests.
pub struct SiteStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl SiteStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let base_url = format!("http://{}", server.server_addr());

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().split('?').next().unwrap_or("/").to_owned();
                let (status, body, content_type) = match path.as_str() {
                    "/" => (200, LANDING_HTML, "text/html; charset=utf-8"),
                    "/brochure.pdf" => (200, "%PDF-1.7", "application/pdf"),
                    "/down" => (503, "maintenance", "text/plain"),
                    _ => (404, "not found", "text/html"),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("build header");
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
