//! Listener, connector and registry over real sockets.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pulseline_session::{
    connect, connect_with_config, ChannelApplication, DiscardApplication, RegistryError,
    SessionBuilder, SessionConfig, SessionError, SessionHandle, SessionHooks, SessionListener,
    SessionRegistry, TerminationReason,
};
use pulseline_transport::Endpoint;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn echo(session: &SessionHandle, payload: Bytes) {
    let _ = session.try_send(payload);
}

async fn start_echo_server(
    endpoint: &Endpoint,
) -> (Endpoint, Arc<SessionRegistry>, CancellationToken, JoinHandle<()>) {
    let listener = SessionListener::bind(endpoint)
        .await
        .expect("listener should bind")
        .with_application(Arc::new(echo));
    let bound = listener.local_endpoint().expect("local endpoint");
    let registry = Arc::clone(listener.registry());
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let server = tokio::spawn(async move {
        listener.serve(token).await.expect("serve should succeed");
    });
    (bound, registry, shutdown, server)
}

async fn wait_for_sessions(registry: &SessionRegistry, expected: usize) {
    timeout(WAIT, async {
        while registry.len() != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {expected} sessions"));
}

#[tokio::test]
async fn tcp_echo_roundtrip_and_registry_tracking() {
    let endpoint: Endpoint = "127.0.0.1:0".parse().expect("endpoint should parse");
    let (bound, registry, shutdown, server) = start_echo_server(&endpoint).await;

    let (application, mut received) = ChannelApplication::new();
    let client = connect(&bound, Arc::new(application))
        .await
        .expect("client should connect");

    client.send("ping-1").await.expect("send should succeed");
    let echoed = timeout(WAIT, received.recv())
        .await
        .expect("echo should arrive")
        .expect("channel should stay open");
    assert_eq!(echoed, Bytes::from_static(b"ping-1"));
    assert_eq!(registry.len(), 1);

    client.close();
    assert_eq!(client.closed().await, TerminationReason::LocalClose);
    wait_for_sessions(&registry, 0).await;

    shutdown.cancel();
    timeout(WAIT, server)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
}

#[tokio::test]
async fn shutdown_closes_connected_sessions() {
    let endpoint: Endpoint = "127.0.0.1:0".parse().expect("endpoint should parse");
    let (bound, registry, shutdown, server) = start_echo_server(&endpoint).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(
            connect(&bound, Arc::new(DiscardApplication))
                .await
                .expect("client should connect"),
        );
    }
    wait_for_sessions(&registry, 3).await;

    shutdown.cancel();
    timeout(WAIT, server)
        .await
        .expect("server should stop")
        .expect("server task should not panic");

    for client in clients {
        let reason = timeout(WAIT, client.closed())
            .await
            .expect("client should observe the server closing");
        assert_eq!(reason, TerminationReason::PeerClosed);
    }
    wait_for_sessions(&registry, 0).await;
}

#[tokio::test]
async fn connect_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let endpoint: Endpoint = addr.to_string().parse().expect("endpoint should parse");
    let result = connect(&endpoint, Arc::new(DiscardApplication)).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
}

#[tokio::test]
async fn connect_with_invalid_config_fails_before_dialing() {
    let endpoint: Endpoint = "127.0.0.1:1".parse().expect("endpoint should parse");
    let config = SessionConfig {
        probe_period: Duration::from_secs(120),
        ..SessionConfig::default()
    };
    let result =
        connect_with_config(&endpoint, config, Arc::new(DiscardApplication), None).await;
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn unix_socket_echo_roundtrip() {
    let path = std::env::temp_dir().join(format!("pulseline-session-{}.sock", std::process::id()));
    let endpoint = Endpoint::Unix(path.clone());
    let (bound, registry, shutdown, server) = start_echo_server(&endpoint).await;

    let (application, mut received) = ChannelApplication::new();
    let client = connect_with_config(
        &bound,
        SessionConfig::with_liveness_window(Duration::from_secs(5)),
        Arc::new(application),
        Some(registry.clone() as Arc<dyn SessionHooks>),
    )
    .await
    .expect("client should connect");

    client.send("over-uds").await.expect("send should succeed");
    let echoed = timeout(WAIT, received.recv())
        .await
        .expect("echo should arrive")
        .expect("channel should stay open");
    assert_eq!(echoed, Bytes::from_static(b"over-uds"));
    // Client and server side sessions share the registry here.
    assert_eq!(registry.len(), 2);

    client.close();
    client.closed().await;
    wait_for_sessions(&registry, 0).await;

    shutdown.cancel();
    timeout(WAIT, server)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
    assert!(!path.exists(), "socket file should be removed on drop");
}

#[tokio::test]
async fn registry_tracks_sessions_through_hooks() {
    let registry = Arc::new(SessionRegistry::new());
    let builder = SessionBuilder::default().with_hooks(registry.clone());

    let (first_io, _first_peer) = tokio::io::duplex(1024);
    let (second_io, _second_peer) = tokio::io::duplex(1024);
    let first = builder.spawn(first_io, "first").expect("spawn first");
    let second = builder.spawn(second_io, "second").expect("spawn second");

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.ids(), vec![first.id(), second.id()]);
    assert_eq!(
        registry.get(second.id()).map(|s| s.peer().to_string()),
        Some("second".to_string())
    );

    first.close();
    first.closed().await;
    assert_eq!(registry.ids(), vec![second.id()]);
    assert!(registry.get(first.id()).is_none());
    assert_eq!(
        registry.remove(first.id()).unwrap_err(),
        RegistryError::UnknownSession(first.id())
    );

    assert_eq!(
        registry.insert(second.clone()).unwrap_err(),
        RegistryError::DuplicateSession(second.id())
    );

    assert_eq!(registry.close_all(), 1);
    second.closed().await;
    assert!(registry.is_empty());
}
