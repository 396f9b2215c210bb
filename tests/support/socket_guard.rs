//! Mock-server startup for sandboxes without localhost networking.
//!
//! Every wiremock-backed test starts its server through
//! [`start_mock_server_or_skip`]. When no localhost port can be bound the test
//! returns early instead of failing, unless `HARVESTER_REQUIRE_SOCKET_TESTS`
//! asks for a hard failure (CI sets it).

use std::net::{Ipv4Addr, TcpListener};

use wiremock::MockServer;

const REQUIRE_ENV: &str = "HARVESTER_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn localhost_bindable() -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).is_ok()
}

/// Starts a mock shop server, or returns `None` when this environment cannot
/// bind a localhost socket.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if localhost_bindable() {
        return Some(MockServer::start().await);
    }

    let test = std::thread::current()
        .name()
        .unwrap_or("unnamed test")
        .to_string();
    assert!(
        !sockets_required(),
        "{test}: cannot bind a localhost socket for the mock shop and {REQUIRE_ENV} is set"
    );
    eprintln!("{test}: no localhost socket, skipping mock-shop test (set {REQUIRE_ENV}=1 to fail instead)");
    None
}
