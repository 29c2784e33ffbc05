//! End-to-end tests of the terminal client against a running relay server.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use chanrelay_client::{ChatClient, ClientConfig, SessionEnd};
use chanrelay_core::Username;
use chanrelay_protocol::UsernameFraming;
use chanrelayd::config::ServerConfig;
use chanrelayd::registry::spawn_registry;
use chanrelayd::server::RelayServer;
use tokio::io::BufReader;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server(framing: UsernameFraming) -> (SocketAddr, CancellationToken) {
    let config = ServerConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        username_framing: framing,
        ..ServerConfig::default()
    };
    let cancel = CancellationToken::new();
    let server = RelayServer::bind(config.clone(), spawn_registry(config.max_clients), cancel.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, cancel)
}

async fn run_script(addr: SocketAddr, framing: UsernameFraming, script: &str) -> (SessionEnd, String) {
    let client = ChatClient::new(ClientConfig { addr, framing });
    let input = BufReader::new(Cursor::new(script.as_bytes().to_vec()));
    let mut output = Vec::new();

    let end = timeout(
        SESSION_TIMEOUT,
        client.run(&Username::parse("alice").unwrap(), input, &mut output),
    )
    .await
    .expect("session should finish")
    .unwrap();

    (end, String::from_utf8(output).unwrap())
}

#[tokio::test]
async fn test_scripted_session_with_line_framing() {
    let (addr, cancel) = spawn_server(UsernameFraming::Line).await;

    let (end, output) = run_script(
        addr,
        UsernameFraming::Line,
        "/join #test\n/list-channels\n/exit\n",
    )
    .await;

    assert_eq!(end, SessionEnd::Exited);
    assert!(output.starts_with("Hello alice, you are now connected."));
    assert!(output.contains("Available channels:\n#test\n"));

    cancel.cancel();
}

#[tokio::test]
async fn test_scripted_session_with_fixed_framing() {
    let (addr, cancel) = spawn_server(UsernameFraming::Fixed).await;

    let (end, output) = run_script(addr, UsernameFraming::Fixed, "/list-users\n").await;

    assert_eq!(end, SessionEnd::InputClosed);
    assert!(output.contains("Online users:\nalice\n"));

    cancel.cancel();
}
