use core::fmt;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use channel_core::{ChannelError, ChatEvent, ChatTransport, UserDescriptor};
use matrix_sdk::{
    Client,
    room::Room,
    ruma::{
        OwnedRoomId, OwnedUserId, RoomId, RoomOrAliasId, UserId,
        events::room::{
            member::{MembershipState, OriginalSyncRoomMemberEvent},
            message::{MessageType, OriginalSyncRoomMessageEvent, RoomMessageEventContent},
        },
    },
};
use serde_json::json;
use tokio::sync::{
    RwLock,
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::{debug, info, warn};

/// Room power level at which a member counts as a moderator.
const MODERATOR_LEVEL: i64 = 50;

#[derive(Debug, Default)]
struct Routes {
    /// Joined room id to the channel name it was configured as.
    rooms: HashMap<OwnedRoomId, String>,
    joined: HashMap<String, OwnedRoomId>,
    events: HashMap<String, UnboundedSender<ChatEvent>>,
}

/// Chat transport over a logged-in Matrix client.
///
/// Channels are addressed by the alias or room id they were configured with.
/// Inbound room events are forwarded to the channel that joined the room.
#[derive(Clone)]
pub(crate) struct MatrixTransport {
    client: Client,
    routes: Arc<RwLock<Routes>>,
    role_levels: Arc<BTreeMap<String, i64>>,
}

impl fmt::Debug for MatrixTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixTransport")
            .field("user_id", &self.client.user_id())
            .field("role_levels", &self.role_levels)
            .finish_non_exhaustive()
    }
}

/// Roles whose minimum power level `level` reaches.
fn roles_for_level(role_levels: &BTreeMap<String, i64>, level: i64) -> Vec<String> {
    role_levels
        .iter()
        .filter(|(_, min)| level >= **min)
        .map(|(role, _)| role.clone())
        .collect()
}

/// Members at or above [`MODERATOR_LEVEL`], sorted by user id.
fn moderators_from_levels(levels: HashMap<OwnedUserId, i64>) -> Vec<String> {
    let mut moderators: Vec<String> = levels
        .into_iter()
        .filter(|(_, level)| *level >= MODERATOR_LEVEL)
        .map(|(user, _)| user.to_string())
        .collect();
    moderators.sort_unstable();
    moderators
}

fn is_own(client: &Client, user_id: &UserId) -> bool {
    client.user_id().is_some_and(|own| own == user_id)
}

impl MatrixTransport {
    pub(crate) fn new(client: Client, role_levels: BTreeMap<String, i64>) -> Self {
        Self {
            client,
            routes: Arc::default(),
            role_levels: Arc::new(role_levels),
        }
    }

    /// Registers `channel` and returns the stream of events for its room.
    pub(crate) async fn attach(&self, channel: &str) -> UnboundedReceiver<ChatEvent> {
        let (tx, rx) = unbounded_channel();
        self.routes
            .write()
            .await
            .events
            .insert(channel.to_owned(), tx);
        rx
    }

    pub(crate) fn install_handlers(&self) {
        let transport = self.clone();
        self.client.add_event_handler(
            move |ev: OriginalSyncRoomMessageEvent, room: Room, client: Client| {
                let transport = transport.clone();
                async move { transport.on_room_message(ev, room, &client).await }
            },
        );

        let transport = self.clone();
        self.client.add_event_handler(
            move |ev: OriginalSyncRoomMemberEvent, room: Room, client: Client| {
                let transport = transport.clone();
                async move { transport.on_member(ev, room, &client).await }
            },
        );
    }

    async fn route(&self, room_id: &RoomId) -> Option<(String, UnboundedSender<ChatEvent>)> {
        let routes = self.routes.read().await;
        let name = routes.rooms.get(room_id)?;
        let tx = routes.events.get(name)?;
        Some((name.clone(), tx.clone()))
    }

    async fn room(&self, channel: &str) -> Result<Room> {
        let room = self
            .routes
            .read()
            .await
            .joined
            .get(channel)
            .and_then(|id| self.client.get_room(id));
        room.ok_or_else(|| ChannelError::UnknownChannel(channel.to_owned()).into())
    }

    async fn describe(&self, room: &Room, sender: &UserId) -> UserDescriptor {
        let display_name = match room.get_member_no_sync(sender).await {
            Ok(Some(member)) => member
                .display_name()
                .map_or_else(|| sender.localpart().to_owned(), ToOwned::to_owned),
            Ok(None) => sender.localpart().to_owned(),
            Err(e) => {
                debug!(error = %e, sender = %sender, "Member lookup failed");
                sender.localpart().to_owned()
            }
        };
        let mut descriptor = UserDescriptor::new(sender.as_str()).with_display_name(display_name);

        // An unreadable power-levels event yields an empty map: level 0, no roles.
        let levels = room.users_with_power_levels().await;
        let level = levels.get(sender).copied().unwrap_or_default();
        descriptor = descriptor.with_roles(roles_for_level(&self.role_levels, level));
        descriptor.extra.insert("power_level".to_owned(), json!(level));
        descriptor
    }

    async fn on_room_message(&self, ev: OriginalSyncRoomMessageEvent, room: Room, client: &Client) {
        let text = match &ev.content.msgtype {
            MessageType::Text(t) => t.body.clone(),
            MessageType::Emote(e) => e.body.clone(),
            MessageType::Audio(_)
            | MessageType::File(_)
            | MessageType::Image(_)
            | MessageType::Location(_)
            | MessageType::Notice(_)
            | MessageType::ServerNotice(_)
            | MessageType::Video(_)
            | MessageType::VerificationRequest(_)
            | _ => return,
        };
        let Some((channel, tx)) = self.route(room.room_id()).await else {
            return;
        };

        let user = self.describe(&room, &ev.sender).await;
        let event = ChatEvent::Message {
            room: channel,
            user,
            text,
            is_self: is_own(client, &ev.sender),
        };
        if tx.send(event).is_err() {
            debug!(room_id = %room.room_id(), "Channel no longer listening");
        }
    }

    async fn on_member(&self, ev: OriginalSyncRoomMemberEvent, room: Room, client: &Client) {
        if ev.content.membership != MembershipState::Join {
            return;
        }
        let Some((channel, tx)) = self.route(room.room_id()).await else {
            return;
        };
        let event = ChatEvent::Join {
            room: channel,
            identity: ev.state_key.to_string(),
            is_self: is_own(client, &ev.state_key),
        };
        if tx.send(event).is_err() {
            debug!(room_id = %room.room_id(), "Channel no longer listening");
        }
    }
}

#[async_trait]
impl ChatTransport for MatrixTransport {
    async fn join(&self, room: &str) -> Result<()> {
        let target = RoomOrAliasId::parse(room).with_context(|| format!("invalid room `{room}`"))?;
        let joined = self
            .client
            .join_room_by_id_or_alias(&target, &[])
            .await
            .with_context(|| format!("joining {room}"))?;
        let room_id = joined.room_id().to_owned();
        info!(channel = %room, room_id = %room_id, "Joined room");

        let tx = {
            let mut routes = self.routes.write().await;
            routes.rooms.insert(room_id.clone(), room.to_owned());
            routes.joined.insert(room.to_owned(), room_id);
            routes.events.get(room).cloned()
        };

        // Joining an already-joined room produces no new membership event,
        // so confirm the join here as well.
        if let (Some(tx), Some(own)) = (tx, self.client.user_id()) {
            let confirmed = ChatEvent::Join {
                room: room.to_owned(),
                identity: own.to_string(),
                is_self: true,
            };
            if tx.send(confirmed).is_err() {
                warn!(channel = %room, "Joined a room nobody is attached to");
            }
        }
        Ok(())
    }

    async fn say(&self, room: &str, text: &str) -> Result<()> {
        self.room(room)
            .await?
            .send(RoomMessageEventContent::text_plain(text))
            .await
            .with_context(|| format!("sending message to {room}"))?;
        Ok(())
    }

    async fn action(&self, room: &str, text: &str) -> Result<()> {
        self.room(room)
            .await?
            .send(RoomMessageEventContent::emote_plain(text))
            .await
            .with_context(|| format!("sending emote to {room}"))?;
        Ok(())
    }

    async fn moderators(&self, room: &str) -> Result<Vec<String>> {
        let levels = self.room(room).await?.users_with_power_levels().await;
        Ok(moderators_from_levels(levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_level_maps_to_every_reached_role() {
        let levels = BTreeMap::from([
            ("admins".to_owned(), 100),
            ("mods".to_owned(), 50),
            ("voiced".to_owned(), 1),
        ]);
        assert_eq!(roles_for_level(&levels, 100), ["admins", "mods", "voiced"]);
        assert_eq!(roles_for_level(&levels, 50), ["mods", "voiced"]);
        assert_eq!(roles_for_level(&levels, 10), ["voiced"]);
        assert!(roles_for_level(&levels, 0).is_empty());
        assert!(roles_for_level(&BTreeMap::new(), 100).is_empty());
    }

    #[test]
    fn moderators_are_members_at_level_fifty_or_above() {
        let user = |id: &str| OwnedUserId::try_from(id).unwrap();
        let levels = HashMap::from([
            (user("@zed:example.org"), 100),
            (user("@amy:example.org"), 50),
            (user("@bob:example.org"), 49),
            (user("@cat:example.org"), 0),
        ]);
        assert_eq!(
            moderators_from_levels(levels),
            ["@amy:example.org", "@zed:example.org"]
        );
        assert!(moderators_from_levels(HashMap::new()).is_empty());
    }
}
