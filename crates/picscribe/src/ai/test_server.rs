//! One-connection-per-response HTTP server for exercising the Ollama
//! clients without a real server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};

pub struct TestServer {
    pub url: String,
    /// Raw request bodies, in arrival order.
    pub requests: Receiver<String>,
}

/// Serves `responses` in order, one per connection, then stops listening.
pub fn serve(responses: Vec<(u16, String)>, delay: Duration) -> TestServer {
    serve_each(
        responses
            .into_iter()
            .map(|(status, body)| (status, body, delay))
            .collect(),
    )
}

/// Like [`serve`], with a separate delay before each response.
pub fn serve_each(responses: Vec<(u16, String, Duration)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = unbounded();

    thread::spawn(move || {
        for (status, body, delay) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let request = read_request(&mut stream);
            let _ = tx.send(request);
            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    TestServer { url, requests: rx }
}

pub fn serve_json(responses: Vec<(u16, String)>) -> String {
    serve(responses, Duration::ZERO).url
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return String::new(),
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}
