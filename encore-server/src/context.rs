use std::sync::Arc;

use encore_core::Encore;

use crate::gateway::Gateway;

#[derive(Clone)]
pub struct ServerContext {
    pub encore: Arc<Encore>,
    pub gateway: Arc<Gateway>,
    /// The port the server listens on, echoed by `GET /api/ip`
    pub port: u16,
}
