use async_graphql::{Context, ID, Object, Result};

use crate::resolvers::{self, ListMessageForRoomArgs, ListRoomsArgs};

use super::run;
use super::types::{MessageConnection, RoomConnection, SortDirection, convert};

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Messages of one room ordered by `createdAt` (ascending unless asked otherwise).
    async fn list_message_for_room(
        &self,
        ctx: &Context<'_>,
        room_id: ID,
        sort_direction: Option<SortDirection>,
        #[graphql(desc = "Page size, 1 to 1000. Defaults to 1000.")] limit: Option<i32>,
        next_token: Option<String>,
    ) -> Result<MessageConnection> {
        let op = resolvers::list_message_for_room(ListMessageForRoomArgs {
            room_id: room_id.0,
            sort_direction: sort_direction.map(Into::into),
            limit: limit.map(i64::from),
            next_token,
        });
        convert(run(ctx, op).await?)
    }

    /// All rooms in store order.
    async fn list_rooms(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Page size, 1 to 1000. Defaults to 1000.")] limit: Option<i32>,
        next_token: Option<String>,
    ) -> Result<RoomConnection> {
        let op = resolvers::list_rooms(ListRoomsArgs {
            limit: limit.map(i64::from),
            next_token,
        });
        convert(run(ctx, op).await?)
    }
}
