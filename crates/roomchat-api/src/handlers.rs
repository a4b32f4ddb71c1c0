use axum::{
    Extension,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use async_graphql::Data;
use async_graphql::http::{ALL_WEBSOCKET_PROTOCOLS, GraphiQLSource};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use serde_json::Value;
use tracing::{info, warn};

use roomchat_types::api::Identity;

use crate::auth::{AppState, JwtSettings, bearer_token};
use crate::graphql::ChatSchema;

#[derive(Clone)]
pub struct ApiState {
    pub app: AppState,
    pub schema: ChatSchema,
    pub graphiql: bool,
}

/// POST /graphql: runs a query or mutation as the authenticated caller.
pub async fn graphql(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    state.schema.execute(req.into_inner().data(identity)).await.into()
}

/// GET /graphiql: GraphiQL, only when enabled in config.
pub async fn graphiql(State(state): State<ApiState>) -> Result<impl IntoResponse, StatusCode> {
    if !state.graphiql {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql/ws")
            .finish(),
    ))
}

/// GET /schema.graphql: the schema in SDL form.
pub async fn sdl(State(state): State<ApiState>) -> String {
    state.schema.sdl()
}

/// GET /graphql/ws: subscriptions. The caller authenticates with a
/// `token` in the `connection_init` payload, or with the upgrade request's
/// `Authorization` header.
pub async fn graphql_ws(
    State(state): State<ApiState>,
    protocol: GraphQLProtocol,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let header_token = bearer_token(&headers).map(str::to_string);
    let schema = state.schema.clone();
    let app = state.app.clone();

    ws.protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |stream| {
            GraphQLWebSocket::new(stream, schema, protocol)
                .on_connection_init(move |payload| async move {
                    connection_data(&app.jwt, header_token.as_deref(), &payload)
                })
                .serve()
        })
}

fn connection_data(
    jwt: &JwtSettings,
    header_token: Option<&str>,
    payload: &Value,
) -> async_graphql::Result<Data> {
    let token = payload
        .get("token")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("Authorization")
                .and_then(Value::as_str)
                .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        })
        .or(header_token)
        .ok_or_else(|| async_graphql::Error::new("Unauthorized"))?;

    let identity = jwt.verify(token).map_err(|e| {
        warn!("Subscription handshake rejected: {}", e);
        async_graphql::Error::new("Unauthorized")
    })?;

    info!("{} opened a subscription connection", identity.username);
    let mut data = Data::default();
    data.insert(identity);
    Ok(data)
}
