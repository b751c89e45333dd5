use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const STUB_ROAST: &str = "Your hero section says hi twice. Bold.";

#[derive(Debug, Clone)]
pub struct OpenAiStubConfig {
    pub reply: StubReply,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubReply {
    Roast(String),
    ApiError { status: u16, message: String },
}

impl Default for OpenAiStubConfig {
    fn default() -> Self {
        Self {
            reply: StubReply::Roast(STUB_ROAST.to_owned()),
        }
    }
}

/// Chat-completions stand-in. Requests that do not carry the roast persona
/// and sampling settings are answered with 400.
pub struct OpenAiStub {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    user_messages: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl OpenAiStub {
    pub fn spawn(config: OpenAiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let requests = Arc::new(AtomicUsize::new(0));
        let user_messages = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = {
            let requests = Arc::clone(&requests);
            let user_messages = Arc::clone(&user_messages);
            thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(req)) => req,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let path = request.url().to_string();
                    if request.method() != &tiny_http::Method::Post
                        || path != "/v1/chat/completions"
                    {
                        let _ = request.respond(
                            tiny_http::Response::from_string("not found").with_status_code(404),
                        );
                        continue;
                    }
                    requests.fetch_add(1, Ordering::SeqCst);

                    let mut body = String::new();
                    if request.as_reader().read_to_string(&mut body).is_err() {
                        let _ = request.respond(json_response(400, &error_body("invalid body")));
                        continue;
                    }

                    let parsed: Value = match serde_json::from_str(&body) {
                        Ok(value) => value,
                        Err(_) => {
                            let _ = request.respond(json_response(400, &error_body("invalid json")));
                            continue;
                        }
                    };

                    if let Err(problem) = check_request(&parsed) {
                        let _ = request.respond(json_response(400, &error_body(&problem)));
                        continue;
                    }

                    if let Some(user) = parsed
                        .pointer("/messages/1/content")
                        .and_then(|v| v.as_str())
                    {
                        user_messages
                            .lock()
                            .expect("user messages lock")
                            .push(user.to_owned());
                    }

                    let response = match &config.reply {
                        StubReply::Roast(text) => json_response(
                            200,
                            &serde_json::json!({
                                "id": "chatcmpl-stub",
                                "object": "chat.completion",
                                "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                                "choices": [
                                    {
                                        "index": 0,
                                        "message": { "role": "assistant", "content": text },
                                        "finish_reason": "stop"
                                    }
                                ]
                            }),
                        ),
                        StubReply::ApiError { status, message } => {
                            json_response(*status, &error_body(message))
                        }
                    };
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            base_url,
            requests,
            user_messages,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.user_messages
            .lock()
            .expect("user messages lock")
            .clone()
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn check_request(parsed: &Value) -> Result<(), String> {
    let system = parsed
        .pointer("/messages/0/content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !system.contains("witty roast master") {
        return Err(format!("unexpected system message: {system:?}"));
    }

    let user = parsed
        .pointer("/messages/1/content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !user.starts_with("Roast this content with your sharpest wit:\n") {
        return Err(format!("unexpected user message: {user:?}"));
    }

    if parsed.get("max_tokens").and_then(|v| v.as_u64()) != Some(1000) {
        return Err("max_tokens must be 1000".to_owned());
    }
    let temperature = parsed.get("temperature").and_then(|v| v.as_f64());
    if temperature.is_none_or(|t| (t - 0.9).abs() > 1e-6) {
        return Err(format!("temperature must be 0.9, got {temperature:?}"));
    }

    Ok(())
}

fn error_body(message: &str) -> Value {
    serde_json::json!({ "error": { "message": message, "type": "invalid_request_error" } })
}

fn json_response(status: u16, body: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}
