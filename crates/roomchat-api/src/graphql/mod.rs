//! GraphQL surface of the chat API.
//!
//! - [`QueryRoot`]: `listMessageForRoom`, `listRooms`
//! - [`MutationRoot`]: `createMessage`, `createRoom`
//! - [`SubscriptionRoot`]: `onCreateRoom`, `onCreateMessage`
//!
//! Every store-backed field runs a request transform from
//! [`crate::resolvers`], executes the resulting operation, then maps the
//! answer back through [`crate::resolvers::respond`].

mod mutation;
mod query;
mod subscription;
pub mod types;


pub use mutation::MutationRoot;
pub use query::QueryRoot;
pub use subscription::SubscriptionRoot;

use async_graphql::{Context, ErrorExtensions, Schema};
use serde_json::Value;
use tracing::error;

use roomchat_db::StoreError;
use roomchat_types::api::Identity;
use roomchat_types::store::StoreOperation;

use crate::auth::AppState;
use crate::resolvers::{self, ResolverError};

pub type ChatSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

pub fn build_schema(state: AppState) -> ChatSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(state)
        .finish()
}

impl ErrorExtensions for ResolverError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(&self.message)
            .extend_with(|_, e| e.set("errorType", self.error_type.clone()))
    }
}

/// Executes one store operation off the async runtime and applies the
/// response transform.
pub(crate) async fn run(ctx: &Context<'_>, op: StoreOperation) -> async_graphql::Result<Value> {
    let state = ctx.data::<AppState>()?.clone();

    let result = match tokio::task::spawn_blocking(move || state.db.execute(op)).await {
        Ok(result) => result,
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(StoreError::Internal("Store call aborted".into()))
        }
    };

    resolvers::respond(result).map_err(|e| {
        error!(error_type = %e.error_type, "{}", e.message);
        e.extend()
    })
}

/// The caller attached to this request or subscription, if authenticated.
pub(crate) fn identity<'a>(
    ctx: &Context<'a>,
    field: &str,
    parent: &str,
) -> async_graphql::Result<&'a Identity> {
    ctx.data::<Identity>()
        .map_err(|_| ResolverError::unauthorized(field, parent).extend())
}
