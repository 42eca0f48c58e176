use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server accepted the connection. `user_id` is set once the client identified.
    Ready { user_id: Option<Uuid> },

    /// The connection's section subscriptions are now active
    Subscribed { sections: Vec<String> },

    /// A configuration section was written
    ConfigUpdate {
        section: String,
        value: serde_json::Value,
        revision: u64,
    },

    /// Someone started following the receiving user
    FollowCreate { follower_id: Uuid, followee_id: Uuid },

    /// Someone stopped following the receiving user
    FollowRemove { follower_id: Uuid, followee_id: Uuid },
}

impl GatewayEvent {
    /// Returns the section if this event is scoped to a configuration section.
    /// Only connections subscribed to that section receive it.
    pub fn section(&self) -> Option<&str> {
        match self {
            Self::ConfigUpdate { section, .. } => Some(section),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Attach a user to the connection so targeted events can reach it
    Identify { token: String },

    /// Replace the connection's section subscriptions.
    Subscribe { sections: Vec<String> },

    /// Drop sections from the connection's subscriptions.
    Unsubscribe { sections: Vec<String> },
}
