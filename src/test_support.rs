//! HTTP fixtures for download tests

use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Canned response for one path
#[derive(Debug, Clone)]
pub enum Route {
    Body(Vec<u8>),
    Status(u16),
    /// Advertise the whole body but hang up after `sent` bytes
    CutOff { body: Vec<u8>, sent: usize },
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Route::Body(body.into())
    }

    pub fn status(status: u16) -> Self {
        Route::Status(status)
    }

    pub fn cut_off(body: impl Into<Vec<u8>>, sent: usize) -> Self {
        Route::CutOff {
            body: body.into(),
            sent,
        }
    }
}

/// Mock server answering GET requests from a route table
///
/// Unknown paths get a 404 from wiremock.
pub struct TestServer {
    mock: MockServer,
    cut_off: HashMap<String, SocketAddr>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let mock = MockServer::start().await;
        let mut cut_off = HashMap::new();

        for (route_path, route) in routes {
            let response = match route {
                Route::Body(body) => ResponseTemplate::new(200).set_body_bytes(body),
                Route::Status(status) => ResponseTemplate::new(status).set_body_string("error"),
                Route::CutOff { body, sent } => {
                    let addr = serve_truncated(body, sent).await;
                    cut_off.insert(route_path.to_string(), addr);
                    continue;
                }
            };
            Mock::given(method("GET"))
                .and(path(route_path))
                .respond_with(response)
                .mount(&mock)
                .await;
        }

        Self { mock, cut_off }
    }

    pub fn url(&self, route_path: &str) -> String {
        match self.cut_off.get(route_path) {
            Some(addr) => format!("http://{}{}", addr, route_path),
            None => format!("{}{}", self.mock.uri(), route_path),
        }
    }
}

/// wiremock always sends complete bodies, so a dropped connection
/// mid-transfer needs its own listener
async fn serve_truncated(body: Vec<u8>, sent: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(&body[..sent]).await;
            let _ = stream.shutdown().await;
        }
    });

    addr
}
