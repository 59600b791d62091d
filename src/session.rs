//! Display session seam
//!
//! This module defines the trait through which the game core pushes its
//! effects to the presentation collaborator (board rendering, score
//! tiles, podium). The core never renders anything itself; it emits
//! serializable messages and the tunnel decides how to show them.

use crate::game::{SyncMessage, UpdateMessage};

/// Trait for sending messages to the presentation layer
///
/// Implementations might drive a scene graph, a terminal, or a network
/// connection to a remote display; the core only needs the two message
/// channels.
pub trait Tunnel {
    /// Sends an incremental update about a change in the game
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a full view of the current game state
    ///
    /// Used when a display connects or reconnects mid-session and needs
    /// to synchronize from scratch.
    fn send_state(&self, state: &SyncMessage);
}
