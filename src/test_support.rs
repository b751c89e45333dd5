use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const PAGE_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Test</title></head>
  <body><main><h1>Hi</h1><p>Hello world</p></main></body>
</html>
"#;

const SCRIPT_ONLY_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Blank</title></head>
  <body><script>console.log("nothing to read");</script><style>p { color: red; }</style></body>
</html>
"#;

/// Local target site with one route per fetch outcome.
pub struct SiteServer {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SiteServer {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
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
                    "/page" => (200, PAGE_HTML, "text/html; charset=utf-8"),
                    "/blank" => (200, SCRIPT_ONLY_HTML, "text/html"),
                    "/empty" => (200, "   \n", "text/html"),
                    "/accents" => (200, "<p>éééé</p>", "text/html; charset=utf-8"),
                    "/doc.pdf" => (200, "%PDF-1.4 fake", "application/pdf"),
                    "/private" => (403, "forbidden", "text/plain"),
                    "/login" => (401, "unauthorized", "text/plain"),
                    "/broken" => (500, "boom", "text/plain"),
                    "/teapot" => (418, "short and stout", "text/plain"),
                    "/slow" => {
                        thread::spawn(move || {
                            thread::sleep(Duration::from_secs(3));
                            let _ = request.respond(html_response(200, PAGE_HTML, "text/html"));
                        });
                        continue;
                    }
                    _ => (404, "not found", "text/plain"),
                };

                let _ = request.respond(html_response(status, body, content_type));
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

impl Drop for SiteServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn html_response(
    status: u16,
    body: &str,
    content_type: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
        .expect("content-type header");
    tiny_http::Response::from_string(body)
        .with_status_code(status)
        .with_header(header)
}

/// A URL on a loopback port with nothing listening behind it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind scratch listener");
    let addr = listener.local_addr().expect("scratch listener addr");
    drop(listener);
    format!("http://{addr}/")
}
