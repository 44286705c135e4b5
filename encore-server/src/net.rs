use std::net::UdpSocket;

use axum::{extract::State, routing::get, Json};
use serde::Serialize;

use crate::{context::ServerContext, Router};

#[derive(Debug, Serialize)]
pub struct IpInfo {
    ip: String,
    port: u16,
}

/// Best-effort local network address, for the join screen to render as a url
async fn ip(State(context): State<ServerContext>) -> Json<IpInfo> {
    Json(IpInfo {
        ip: guess_local_ip(),
        port: context.port,
    })
}

/// Asks the OS which interface would route to the internet by "connecting"
/// a UDP socket to a public address. No packets are sent. Falls back to
/// loopback when the machine is offline.
fn guess_local_ip() -> String {
    let fallback = || "127.0.0.1".to_string();

    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }

            fallback()
        }
        Err(_) => fallback(),
    }
}

pub fn router() -> Router {
    Router::new().route("/", get(ip))
}
