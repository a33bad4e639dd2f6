mod common;

use std::sync::Arc;

use common::{TestPki, ip_san};
use tokio::{io::AsyncReadExt, io::AsyncWriteExt, net::TcpListener};
use tollgate::{
    config::{AuthLevel, Config, TlsIdentity},
    error::{AssemblyError, ServerError},
    server::{Connection, Server, TlsListener},
};

#[tokio::test]
async fn test_bind_refuses_empty_identity() {
    let result = TlsListener::bind("127.0.0.1:0", &TlsIdentity::default()).await;
    assert!(matches!(result, Err(ServerError::MissingTlsIdentity)));
}

#[tokio::test]
async fn test_bind_reports_assembly_stage() {
    let pki = TestPki::new();
    let identity = pki
        .server_identity(AuthLevel::RequireAndVerifyClientCert)
        .with_ca(pki.path("missing-ca.pem"));

    let err = TlsListener::bind("127.0.0.1:0", &identity)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::Assembly(AssemblyError::CaPool { .. })
    ));
    assert!(err.to_string().contains("assembly"), "{err}");
}

#[tokio::test]
async fn test_bind_reports_bind_stage() {
    let pki = TestPki::new();
    let identity = pki.server_identity(AuthLevel::RequireAndVerifyClientCert);

    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    let err = TlsListener::bind(addr, &identity).await.unwrap_err();
    assert!(
        matches!(err, ServerError::FailedToBind { .. }),
        "Expected bind failure, got {err:?}"
    );
    assert!(err.to_string().contains("bind"), "{err}");
}

#[tokio::test]
async fn test_assembly_runs_before_bind() {
    let pki = TestPki::new();
    let identity = TlsIdentity::new(pki.path("nope.pem"), pki.path("nope.key"));

    // The port is taken, but the broken certificate must be reported first
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    let err = TlsListener::bind(addr, &identity).await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::Assembly(AssemblyError::CertLoad { .. })
    ));
}

#[tokio::test]
async fn test_server_hands_connections_to_handler() {
    let pki = TestPki::new();
    let identity = pki.server_identity(AuthLevel::RequireAndVerifyClientCertAndSan);
    let listener = TlsListener::bind("127.0.0.1:0", &identity).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        tls: identity,
        ..Config::default()
    };
    let mut server = Server::new(Arc::new(config), |mut connection: Connection| async move {
        let name = connection
            .peer
            .map(|peer| peer.display_name())
            .unwrap_or_default();
        let _ = connection
            .stream
            .write_all(format!("hello {name}\n").as_bytes())
            .await;
        let _ = connection.stream.shutdown().await;
    });
    server.set_graceful_shutdown(false);

    let server = Arc::new(server);
    let shutdown = server.shutdown_handle();
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listener).await }
    });

    let client = pki.client("svc-a", vec![ip_san("127.0.0.1")]);
    let mut stream = common::connect(&pki.connector(Some(&client)), addr)
        .await
        .expect("Failed to connect");

    let mut greeting = String::new();
    stream.read_to_string(&mut greeting).await.unwrap();
    assert_eq!(greeting, "hello svc-a\n");

    shutdown.notify_one();
    let result = running.await.unwrap();
    assert!(result.is_ok(), "Server should stop cleanly: {result:?}");
}

#[tokio::test]
async fn test_server_keeps_accepting_after_rejection() {
    let pki = TestPki::new();
    let identity = pki.server_identity(AuthLevel::RequireAndVerifyClientCertAndSan);
    let listener = TlsListener::bind("127.0.0.1:0", &identity).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        tls: identity,
        ..Config::default()
    };
    let mut server = Server::new(Arc::new(config), |mut connection: Connection| async move {
        let _ = connection.stream.write_all(b"ok\n").await;
        let _ = connection.stream.shutdown().await;
    });
    server.set_graceful_shutdown(false);

    let server = Arc::new(server);
    let shutdown = server.shutdown_handle();
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listener).await }
    });

    // A certificate for another host is turned away
    let stranger = pki.client("svc-remote", vec![ip_san("192.0.2.7")]);
    if let Ok(mut stream) = common::connect(&pki.connector(Some(&stranger)), addr).await {
        let mut buf = Vec::new();
        let read = stream.read_to_end(&mut buf).await;
        assert!(read.is_err() || buf.is_empty());
    }

    let local = pki.client("svc-local", vec![ip_san("127.0.0.1")]);
    let mut stream = common::connect(&pki.connector(Some(&local)), addr)
        .await
        .expect("Failed to connect");
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    assert_eq!(reply, "ok\n");

    shutdown.notify_one();
    assert!(running.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_server_survives_panicking_handler() {
    let pki = TestPki::new();
    let identity = pki.server_identity(AuthLevel::RequireAndVerifyClientCert);
    let listener = TlsListener::bind("127.0.0.1:0", &identity).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        tls: identity,
        ..Config::default()
    };
    let mut server = Server::new(Arc::new(config), |mut connection: Connection| async move {
        if connection.peer.as_ref().and_then(|p| p.common_name.as_deref()) == Some("crash") {
            panic!("handler failed");
        }
        let _ = connection.stream.write_all(b"ok\n").await;
        let _ = connection.stream.shutdown().await;
    });
    server.set_graceful_shutdown(false);

    let server = Arc::new(server);
    let shutdown = server.shutdown_handle();
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listener).await }
    });

    let crash = pki.client("crash", Vec::new());
    if let Ok(mut stream) = common::connect(&pki.connector(Some(&crash)), addr).await {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        assert!(buf.is_empty());
    }

    let fine = pki.client("fine", Vec::new());
    let mut stream = common::connect(&pki.connector(Some(&fine)), addr)
        .await
        .expect("Failed to connect");
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    assert_eq!(reply, "ok\n");

    shutdown.notify_one();
    assert!(running.await.unwrap().is_ok());
}
