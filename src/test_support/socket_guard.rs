//! Skips wiremock-backed tests where localhost sockets cannot be bound.
//!
//! Sandboxed CI runners sometimes forbid binding; set
//! `FANDOM_DL_REQUIRE_SOCKET_TESTS=1` to turn the skip into a failure.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Whether socket-bound tests must run instead of being skipped.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("FANDOM_DL_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Returns `true` (after logging the caller) when a localhost socket cannot be bound.
///
/// # Panics
///
/// When binding fails and [`socket_tests_required`] is set.
#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock test skipped",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}. Unset FANDOM_DL_REQUIRE_SOCKET_TESTS to allow skipping."
    );
    eprintln!("{message}. Set FANDOM_DL_REQUIRE_SOCKET_TESTS=1 to fail instead.");
    true
}

/// Starts a mock server, or returns `None` when sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
