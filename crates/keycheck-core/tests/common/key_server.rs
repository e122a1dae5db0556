//! Minimal HTTP/1.1 server standing in for the partner key query page.
//!
//! `GET /querycdkey/cdkey?cdkey=<key>` answers with the page registered for
//! that key (200 with a neutral page otherwise); a request without `cdkey`
//! gets the page registered under the empty key. Request headers are kept so
//! tests can assert what the client sent.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub reason: &'static str,
    pub body: String,
}

impl Page {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            reason: "OK",
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            body: String::new(),
        }
    }
}

/// One received request: the decoded key and the raw header lines.
#[derive(Debug, Clone)]
pub struct Seen {
    pub key: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct KeyServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl KeyServer {
    /// Full endpoint URL for the config's `endpoint`.
    pub fn endpoint(&self) -> String {
        format!("{}querycdkey/cdkey", self.base_url)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start(pages: HashMap<String, Page>) -> KeyServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let pages = Arc::new(pages);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_srv = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let pages = Arc::clone(&pages);
            let seen = Arc::clone(&seen_srv);
            thread::spawn(move || handle(stream, &pages, &seen));
        }
    });
    KeyServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        seen,
    }
}

fn handle(mut stream: TcpStream, pages: &HashMap<String, Page>, seen: &Mutex<Vec<Seen>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = request.split("\r\n");
    let target = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let headers: Vec<(String, String)> = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let key = url::Url::parse(&format!("http://localhost{}", target))
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "cdkey")
                .map(|(_, v)| v.into_owned())
        });
    seen.lock().unwrap().push(Seen {
        key: key.clone(),
        headers,
    });

    // No cdkey at all is the query form itself, registered under "".
    let page = pages
        .get(key.as_deref().unwrap_or(""))
        .cloned()
        .unwrap_or_else(|| Page::ok("<html><body><p>Nothing to report.</p></body></html>"));
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.status,
        page.reason,
        page.body.len(),
        page.body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
