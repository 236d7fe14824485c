use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::error::{ApiError, AppError, AppResult};

use super::client::HttpControllerApi;
use super::port::{ControllerApi, Estimate, OkResponse, TrimParameters};

/// Answers one plain HTTP request and reports the request line.
async fn serve_once(
    listener: TcpListener,
    status_line: &'static str,
    body: &'static str,
    request_tx: mpsc::UnboundedSender<String>,
) {
    let Ok((mut stream, _)) = listener.accept().await else {
        return;
    };
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(bytes) => {
                raw.extend_from_slice(chunk.get(..bytes).unwrap_or_default());
                if raw.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }
    let request = String::from_utf8_lossy(&raw);
    let first_line = request.lines().next().unwrap_or_default().to_owned();
    drop(request_tx.send(first_line));

    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    drop(stream.write_all(response.as_bytes()).await);
    drop(stream.shutdown().await);
}

fn client_for(addr: std::net::SocketAddr) -> AppResult<HttpControllerApi> {
    // Deliberately without the trailing slash; the client normalizes it.
    let base = Url::parse(&format!("http://{addr}/api"))?;
    HttpControllerApi::new(base, Duration::from_secs(5))
}

#[tokio::test(flavor = "current_thread")]
async fn token_request_hits_the_api_mount() -> AppResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(
        listener,
        "200 OK",
        r#"{"target": "wss://controller/ws/abc123"}"#,
        request_tx,
    ));

    let api = client_for(addr)?;
    let token = api.ws_token().await?;
    if token.target != "wss://controller/ws/abc123" {
        return Err(AppError::api(format!("Unexpected target {}", token.target)));
    }

    let first_line = request_rx
        .recv()
        .await
        .ok_or_else(|| AppError::api("Expected a request line"))?;
    if !first_line.starts_with("GET /api/wsToken") {
        return Err(AppError::api(format!("Unexpected request: {first_line}")));
    }
    drop(server.await);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn non_success_status_maps_to_a_status_error() -> AppResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (request_tx, _request_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(listener, "503 Unavailable", "{}", request_tx));

    let api = client_for(addr)?;
    match api.ws_token().await {
        Err(AppError::Api(ApiError::Status { status: 503, .. })) => {}
        Err(other) => {
            return Err(AppError::api(format!("Unexpected error: {other}")));
        }
        Ok(_) => {
            return Err(AppError::api("Expected a 503 to surface as an error"));
        }
    }
    drop(server.await);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn undecodable_body_maps_to_a_decode_error() -> AppResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (request_tx, _request_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(listener, "200 OK", "not json", request_tx));

    let api = client_for(addr)?;
    match api.ws_token().await {
        Err(AppError::Api(ApiError::Decode { path, .. })) => {
            if path != "wsToken" {
                return Err(AppError::api(format!("Unexpected path {path}")));
            }
        }
        Err(other) => {
            return Err(AppError::api(format!("Unexpected error: {other}")));
        }
        Ok(_) => {
            return Err(AppError::api("Expected a decode failure"));
        }
    }
    drop(server.await);
    Ok(())
}

#[test]
fn estimate_decodes_instance_hours() -> AppResult<()> {
    let estimate: Estimate = serde_json::from_str(
        r#"{"testruns": 6, "instanceHours": {"c5n.large": 1.5, "c5n.metal": 0.25}}"#,
    )?;
    if estimate.testruns != 6 {
        return Err(AppError::api("Unexpected run count"));
    }
    if estimate.instance_hours.get("c5n.large") != Some(&1.5) {
        return Err(AppError::api("Unexpected instance hours"));
    }
    Ok(())
}

#[test]
fn ok_response_defaults_to_not_ok() -> AppResult<()> {
    let empty: OkResponse = serde_json::from_str("{}")?;
    if empty.ok {
        return Err(AppError::api("Expected ok to default to false"));
    }
    let acknowledged: OkResponse = serde_json::from_str(r#"{"ok": true}"#)?;
    if !acknowledged.ok {
        return Err(AppError::api("Expected ok to decode"));
    }
    Ok(())
}

#[test]
fn trim_parameters_serialize_with_wire_names() -> AppResult<()> {
    let trim = TrimParameters {
        trim_zeroes_at_start: true,
        trim_zeroes_at_end: false,
        trim_samples_at_start: 30,
    };
    let value = serde_json::to_value(trim)?;
    if value.get("trimZeroes") != Some(&serde_json::Value::Bool(true)) {
        return Err(AppError::api(format!("Unexpected encoding: {value}")));
    }
    if value.get("trimSamples").and_then(serde_json::Value::as_i64) != Some(30) {
        return Err(AppError::api(format!("Unexpected encoding: {value}")));
    }
    Ok(())
}
