//! Handlers served by the stock daemon.

use super::Router;

/// Router with the daemon's built-in events.
///
/// - `ping` answers `pong` and closes.
/// - `version` answers the daemon version and closes.
#[must_use]
pub fn builtin_router() -> Router {
    Router::new()
        .on("ping", |_, stream| {
            stream.write(b"pong");
            stream.close();
        })
        .on("version", |_, stream| {
            stream.write(env!("CARGO_PKG_VERSION").as_bytes());
            stream.close();
        })
}
