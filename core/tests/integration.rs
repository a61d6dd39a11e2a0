//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `ApiClient` and
//! `RequestExecutor` over real HTTP through the default ureq transport.
//! Validates request building, status classification and file transfers
//! against the actual server.

use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use api_core::{
    AccessTokenResponse, ApiClient, ApiError, AuthResponse, ClientConfig, Params, Reachability, RequestExecutor,
    RequestMethod,
};
use mock_server::AppState;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Bind the mock server on a random port and serve `state` from a
/// background runtime.
fn start_server(state: AppState) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, state).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr, reachability: &Reachability) -> ApiClient {
    let config = ClientConfig::new().with_base_url(&format!("http://{addr}"));
    ApiClient::new(RequestExecutor::with_ureq(config, Arc::new(reachability.clone())))
}

fn credentials(user: &str, pass: &str) -> Params {
    let mut params = Params::new();
    params.insert("user".to_string(), user.into());
    params.insert("pass".to_string(), pass.into());
    params
}

#[test]
fn login_lifecycle() {
    // Step 1: start mock server on a random port.
    let addr = start_server(AppState::default());
    let reachability = Reachability::default();
    let client = client(addr, &reachability);

    // Step 2: good credentials decode into AuthResponse.
    let auth: AuthResponse = client
        .load_blocking("/auth/login", RequestMethod::Post, Some(&credentials("a", "b")))
        .unwrap();
    assert!(auth.success);
    assert!(!auth.message.access_token.is_empty());
    assert_eq!(auth.message.expires_in, Some(3600));

    // Step 3: bad credentials surface the service description.
    let err = client
        .load_blocking::<AuthResponse>("/auth/login", RequestMethod::Post, Some(&credentials("a", "x")))
        .unwrap_err();
    assert!(matches!(err, ApiError::Service(_)));
    assert_eq!(err.to_string(), "Invalid credentials");

    // Step 4: an empty body is a JSON syntax error; axum answers 400 with plain text.
    let err = client
        .load_blocking::<AuthResponse>("/auth/login", RequestMethod::Post, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::UnknownParse));

    // Step 5: GET through the callback API.
    let (tx, rx) = mpsc::channel();
    client
        .load_with_message("/auth/access-token", RequestMethod::Get, None, move |value, message| {
            tx.send((value, message)).unwrap();
        })
        .wait();
    let (token, message): (Option<AccessTokenResponse>, Option<String>) = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(token.unwrap().success);
    assert!(message.is_none());

    // Step 6: going offline short-circuits before the network.
    reachability.set_connected(false);
    let err = client
        .load_blocking::<AuthResponse>("/auth/login", RequestMethod::Post, Some(&credentials("a", "b")))
        .unwrap_err();
    assert_eq!(err.to_string(), "No Internet Connection");
}

#[test]
fn raw_execute_keeps_error_statuses() {
    let addr = start_server(AppState::default());
    let client = client(addr, &Reachability::default());

    let response = client
        .executor()
        .execute_blocking("/files/missing.bin", RequestMethod::Get, None, None)
        .unwrap();
    assert_eq!(response.status, 404);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["description"], "File not found");
}

#[test]
fn closed_port_is_transport_error() {
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = unused.local_addr().unwrap();
    drop(unused);

    let client = client(addr, &Reachability::default());
    let err = client
        .load_blocking::<AuthResponse>("/auth/login", RequestMethod::Get, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.to_string().starts_with("error "));
}

#[test]
fn upload_then_download_roundtrip() {
    let addr = start_server(AppState::default());
    let config = ClientConfig::new()
        .with_base_url(&format!("http://{addr}"))
        .with_upload_chunk_size(250);
    let executor = RequestExecutor::with_ureq(config, Arc::new(Reachability::default()));

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("clip.bin");
    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&source, &payload).unwrap();

    // Upload with progress.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (tx, rx) = mpsc::channel();
    executor
        .upload(
            source,
            "/files/clip.bin",
            move |p: f64| sink.lock().unwrap().push(p),
            move |result| tx.send(result).unwrap(),
        )
        .wait();
    let receipt = rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(receipt.status, 201);
    assert_eq!(receipt.bytes, 1000);
    assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    assert!(executor.progress().is_empty());

    // Download it back.
    let dest = dir.path().join("copy.bin");
    let (tx, rx) = mpsc::channel();
    executor
        .download("/files/clip.bin", dest.clone(), move |result| tx.send(result).unwrap())
        .wait();
    let receipt = rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.bytes, 1000);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[test]
fn download_of_seeded_file() {
    let addr = start_server(AppState::with_files([("voice.wav", b"RIFF0000WAVE".to_vec())]));
    let executor = RequestExecutor::with_ureq(
        ClientConfig::new().with_base_url(&format!("http://{addr}")),
        Arc::new(Reachability::default()),
    );

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("voice.wav");
    let receipt = executor.download_blocking("/files/voice.wav", &dest).unwrap();
    assert_eq!(receipt.status, 200);
    assert_eq!(std::fs::read(&dest).unwrap(), b"RIFF0000WAVE");
}
