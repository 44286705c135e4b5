use crossbeam::channel::{Receiver, Sender};

use crate::SessionData;

pub type EventSender = Sender<EncoreEvent>;
pub type EventReceiver = Receiver<EncoreEvent>;

/// Events emitted by the encore system, fanned out to every connected client
#[derive(Debug, Clone)]
pub enum EncoreEvent {
    /// The session changed. Always a full snapshot, never a delta.
    StateUpdate { new_state: SessionData },
    /// The QR code visibility on the display screen was toggled
    QrVisibility { visible: bool },
}
