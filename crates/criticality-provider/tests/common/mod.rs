#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// One canned answer. The longest matching `prefix` wins; among equal
/// prefixes a route whose `request_contains` matches the raw request
/// (headers included) beats one without.
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub request_contains: Option<String>,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Route {
    pub fn json(prefix: &str, body: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            request_contains: None,
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn when(mut self, needle: &str) -> Self {
        self.request_contains = Some(needle.to_string());
        self
    }
}

pub struct MockServer {
    addr: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr").to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &routes, &seen);
            }
        });
        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, path_prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| request_path(r).starts_with(path_prefix))
            .collect()
    }
}

fn request_path(raw: &str) -> &str {
    let target = raw.split_whitespace().nth(1).unwrap_or("");
    target.split('?').next().unwrap_or("")
}

fn pick<'a>(routes: &'a [Route], raw: &str) -> Option<&'a Route> {
    let path = request_path(raw);
    routes
        .iter()
        .filter(|r| path.starts_with(&r.prefix))
        .filter(|r| r.request_contains.as_ref().is_none_or(|n| raw.contains(n.as_str())))
        .max_by_key(|r| (r.prefix.len(), r.request_contains.is_some()))
}

fn serve(mut stream: TcpStream, routes: &[Route], seen: &Mutex<Vec<String>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    let raw = String::from_utf8_lossy(&buf).to_string();
    seen.lock().expect("requests lock").push(raw.clone());

    let (status, headers, body) = match pick(routes, &raw) {
        Some(route) => (route.status, route.headers.clone(), route.body.clone()),
        None => (404, Vec::new(), r#"{"message":"Not Found"}"#.to_string()),
    };
    let mut response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reason(status),
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(&body);
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Status",
    }
}

pub fn epoch_in(secs: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    i64::try_from(now).unwrap_or(0) + secs
}

pub fn rate_limit_body(remaining: u64) -> String {
    format!(
        r#"{{"resources":{{"core":{{"limit":5000,"remaining":{remaining},"reset":{},"used":0}}}}}}"#,
        epoch_in(3600)
    )
}
