//! Built-in `/info` route describing the native side.

use serde_json::{json, Value};

use crate::error::RouteError;
use crate::route::RouteProvider;

pub const INFO_ROUTE: &str = "/info";

pub fn bridge_info() -> Value {
    let bitness = if cfg!(target_pointer_width = "64") { "x64" } else { "x86" };
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "bitness": bitness,
    })
}

pub fn register_info_route(routes: &mut RouteProvider) -> Result<(), RouteError> {
    routes.register_sync(INFO_ROUTE, |_| Ok(bridge_info()))
}
