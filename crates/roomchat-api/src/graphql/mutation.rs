use async_graphql::{Context, ErrorExtensions, Object, Result};
use chrono::Utc;
use tracing::info;

use crate::auth::AppState;
use crate::dispatcher::ChatEvent;
use crate::resolvers;

use super::types::{CreateMessageInput, CreateRoomInput, Message, Room, convert};
use super::{identity, run};

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Post a message as the authenticated caller.
    async fn create_message(
        &self,
        ctx: &Context<'_>,
        input: CreateMessageInput,
    ) -> Result<Message> {
        let caller = identity(ctx, "createMessage", "Mutation")?;
        let op = resolvers::create_message(input.into_item(), caller, Utc::now())
            .map_err(|e| e.extend())?;

        let message: Message = convert(run(ctx, op).await?)?;
        info!(
            id = %message.id.0,
            room_id = %message.room_id.0,
            owner = %caller.username,
            "Message created"
        );

        ctx.data::<AppState>()?
            .dispatcher
            .broadcast(ChatEvent::MessageCreated(message.clone()));
        Ok(message)
    }

    async fn create_room(&self, ctx: &Context<'_>, input: CreateRoomInput) -> Result<Room> {
        let op = resolvers::create_room(input.into_item());

        let room: Room = convert(run(ctx, op).await?)?;
        info!(id = %room.id.0, "Room created");

        ctx.data::<AppState>()?
            .dispatcher
            .broadcast(ChatEvent::RoomCreated(room.clone()));
        Ok(room)
    }
}
