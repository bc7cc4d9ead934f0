use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Minimal HTTP server answering each connection with the next canned response.
/// Reads the full request (headers and body) before replying.
pub async fn spawn_mock_server(responses: Vec<String>) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut bodies = Vec::new();
        for resp in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let (reader, mut writer) = stream.split();
            let mut buf_reader = BufReader::new(reader);
            let mut content_length = 0usize;
            let mut line = String::new();
            loop {
                line.clear();
                buf_reader.read_line(&mut line).await.unwrap_or(0);
                if line == "\r\n" || line == "\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
            }
            let mut body = vec![0u8; content_length];
            buf_reader.read_exact(&mut body).await.ok();
            bodies.push(String::from_utf8_lossy(&body).to_string());
            writer.write_all(resp.as_bytes()).await.ok();
            writer.shutdown().await.ok();
        }
        bodies
    });

    (port, handle)
}

pub fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
