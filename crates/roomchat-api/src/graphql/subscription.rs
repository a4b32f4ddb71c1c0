use async_graphql::{Context, ID, Result, Subscription};
use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::auth::AppState;
use crate::dispatcher::ChatEvent;

use super::identity;
use super::types::{Message, Room};

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn on_create_room(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Room>> {
        identity(ctx, "onCreateRoom", "Subscription")?;
        let mut rx = ctx.data::<AppState>()?.dispatcher.subscribe();

        Ok(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(ChatEvent::RoomCreated(room)) => yield room,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("onCreateRoom subscriber lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// New messages posted to `roomId`.
    async fn on_create_message(
        &self,
        ctx: &Context<'_>,
        room_id: ID,
    ) -> Result<impl Stream<Item = Message>> {
        identity(ctx, "onCreateMessage", "Subscription")?;
        let mut rx = ctx.data::<AppState>()?.dispatcher.subscribe();

        Ok(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(ChatEvent::MessageCreated(message)) if message.room_id == room_id => {
                        yield message
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("onCreateMessage subscriber lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
