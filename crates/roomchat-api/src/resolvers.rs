//! Request and response transforms for every GraphQL field backed by the
//! store.
//!
//! Request transforms turn arguments (plus the caller, for writes) into exactly
//! one [`StoreOperation`]. They never touch the store. [`respond`] turns the
//! store's answer into the field's raw JSON result, passing errors through
//! unchanged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use roomchat_db::StoreError;
use roomchat_types::api::Identity;
use roomchat_types::store::{
    Condition, Index, Item, KEY_ATTRIBUTE, StoreOperation, StoreOutput, Table,
};

/// Page size used when the caller gives no `limit`.
pub const DEFAULT_LIMIT: i64 = 1000;

/// A field error as the caller sees it: the message and type of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type}: {message}")]
pub struct ResolverError {
    pub message: String,
    pub error_type: String,
}

impl ResolverError {
    pub fn unauthorized(field: &str, parent: &str) -> Self {
        Self {
            message: format!("Not Authorized to access {} on type {}", field, parent),
            error_type: "Unauthorized".into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: "ValidationError".into(),
        }
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: "MappingTemplate".into(),
        }
    }
}

impl From<StoreError> for ResolverError {
    fn from(e: StoreError) -> Self {
        Self {
            message: e.message(),
            error_type: e.error_type().to_string(),
        }
    }
}

/// Order of `createdAt` in a message listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ListMessageForRoomArgs {
    pub room_id: String,
    pub sort_direction: Option<SortDirection>,
    pub limit: Option<i64>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListRoomsArgs {
    pub limit: Option<i64>,
    pub next_token: Option<String>,
}

// -- Queries --

pub fn list_message_for_room(args: ListMessageForRoomArgs) -> StoreOperation {
    StoreOperation::Query {
        index: Index::ByRoomCreatedAt,
        partition: args.room_id,
        scan_forward: args.sort_direction.unwrap_or_default() == SortDirection::Asc,
        limit: args.limit.unwrap_or(DEFAULT_LIMIT),
        next_token: args.next_token,
    }
}

pub fn list_rooms(args: ListRoomsArgs) -> StoreOperation {
    StoreOperation::Scan {
        table: Table::Rooms,
        limit: args.limit.unwrap_or(DEFAULT_LIMIT),
        next_token: args.next_token,
    }
}

// -- Mutations --

/// `owner` always comes from `identity`, whatever the input says.
///
/// A supplied `createdAt` must be RFC 3339 and is rewritten to the same UTC
/// millisecond form as generated timestamps, so the index sorts it correctly.
pub fn create_message(
    mut input: Item,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<StoreOperation, ResolverError> {
    let key = take_or_generate_id(&mut input);

    let created_at = match input.remove("createdAt") {
        None | Some(Value::Null) => now,
        Some(Value::String(raw)) => parse_timestamp(&raw)?,
        Some(other) => {
            return Err(ResolverError::validation(format!(
                "createdAt must be an ISO-8601 timestamp string, got {}",
                other
            )));
        }
    };
    input.insert("createdAt".into(), Value::String(iso8601(created_at)));
    input.insert("owner".into(), Value::String(identity.username.clone()));

    Ok(StoreOperation::PutItem {
        table: Table::Messages,
        key,
        attributes: input,
        condition: Some(key_not_exists()),
    })
}

pub fn create_room(mut input: Item) -> StoreOperation {
    let key = take_or_generate_id(&mut input);

    StoreOperation::PutItem {
        table: Table::Rooms,
        key,
        attributes: input,
        condition: Some(key_not_exists()),
    }
}

// -- Responses --

/// Writes answer with the stored item, reads with `{ items, nextToken }`.
pub fn respond(result: Result<StoreOutput, StoreError>) -> Result<Value, ResolverError> {
    match result {
        Ok(StoreOutput::Item(item)) => Ok(Value::Object(item)),
        Ok(StoreOutput::Page { items, next_token }) => Ok(json!({
            "items": items,
            "nextToken": next_token,
        })),
        Err(e) => Err(e.into()),
    }
}

/// Blank or missing ids are replaced with a fresh v4 UUID.
fn take_or_generate_id(input: &mut Item) -> String {
    match input.remove(KEY_ATTRIBUTE) {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        _ => Uuid::new_v4().to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ResolverError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| {
            ResolverError::validation(format!(
                "createdAt must be an ISO-8601 timestamp, got {:?}: {}",
                raw, e
            ))
        })
}

fn key_not_exists() -> Condition {
    Condition::AttributeNotExists(KEY_ATTRIBUTE.into())
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn alice() -> Identity {
        Identity {
            sub: "sub-alice".into(),
            username: "alice".into(),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn create_message_fills_server_fields() {
        let input = item(json!({ "roomId": "r1", "text": "hi" }));
        let op = create_message(input, &alice(), noon()).unwrap();

        let StoreOperation::PutItem { table, key, attributes, condition } = op else {
            panic!("expected PutItem");
        };
        assert_eq!(table, Table::Messages);
        assert!(Uuid::parse_str(&key).is_ok());
        assert_eq!(attributes["createdAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(attributes["owner"], "alice");
        assert_eq!(attributes["roomId"], "r1");
        assert_eq!(attributes["text"], "hi");
        assert_eq!(condition, Some(Condition::AttributeNotExists("id".into())));
    }

    #[test]
    fn create_message_overwrites_supplied_owner() {
        let op = create_message(
            item(json!({ "roomId": "r1", "owner": "mallory" })),
            &alice(),
            noon(),
        )
        .unwrap();
        let StoreOperation::PutItem { attributes, .. } = op else {
            panic!("expected PutItem");
        };
        assert_eq!(attributes["owner"], "alice");
    }

    #[test]
    fn create_message_keeps_supplied_id_and_timestamp() {
        let op = create_message(
            item(json!({ "id": "m-1", "roomId": "r1", "createdAt": "2020-01-01T00:00:00.000Z" })),
            &alice(),
            noon(),
        )
        .unwrap();
        let StoreOperation::PutItem { key, attributes, .. } = op else {
            panic!("expected PutItem");
        };
        assert_eq!(key, "m-1");
        assert_eq!(attributes["createdAt"], "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn create_message_normalizes_offset_timestamps() {
        let input = item(json!({ "roomId": "r1", "createdAt": "2024-01-01T10:00:00+05:00" }));
        let StoreOperation::PutItem { attributes, .. } =
            create_message(input, &alice(), noon()).unwrap()
        else {
            panic!("expected PutItem");
        };
        assert_eq!(attributes["createdAt"], "2024-01-01T05:00:00.000Z");
    }

    #[test]
    fn create_message_rejects_malformed_timestamp() {
        for bad in [json!("not a timestamp"), json!("2024-13-01T00:00:00Z"), json!(42)] {
            let input = item(json!({ "roomId": "r1", "createdAt": bad }));
            let err = create_message(input, &alice(), noon()).unwrap_err();
            assert_eq!(err.error_type, "ValidationError");
            assert!(err.message.starts_with("createdAt must be an ISO-8601 timestamp"));
        }
    }

    #[test]
    fn blank_id_is_generated() {
        let StoreOperation::PutItem { key, .. } = create_room(item(json!({ "id": "  " }))) else {
            panic!("expected PutItem");
        };
        assert!(Uuid::parse_str(&key).is_ok());
    }

    #[test]
    fn generated_ids_are_unique() {
        let keys: std::collections::HashSet<String> = (0..100)
            .map(|_| match create_room(Item::new()) {
                StoreOperation::PutItem { key, .. } => key,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn create_room_guards_against_duplicates() {
        let op = create_room(item(json!({ "id": "r1", "name": "general" })));
        assert_eq!(
            op,
            StoreOperation::PutItem {
                table: Table::Rooms,
                key: "r1".into(),
                attributes: item(json!({ "name": "general" })),
                condition: Some(Condition::AttributeNotExists("id".into())),
            }
        );
    }

    #[test]
    fn list_message_for_room_defaults_to_ascending() {
        let op = list_message_for_room(ListMessageForRoomArgs {
            room_id: "r1".into(),
            ..Default::default()
        });
        assert_eq!(
            op,
            StoreOperation::Query {
                index: Index::ByRoomCreatedAt,
                partition: "r1".into(),
                scan_forward: true,
                limit: DEFAULT_LIMIT,
                next_token: None,
            }
        );

        let desc = list_message_for_room(ListMessageForRoomArgs {
            room_id: "r1".into(),
            sort_direction: Some(SortDirection::Desc),
            next_token: Some("opaque".into()),
            ..Default::default()
        });
        let StoreOperation::Query { scan_forward, next_token, .. } = desc else {
            panic!("expected Query");
        };
        assert!(!scan_forward);
        assert_eq!(next_token.as_deref(), Some("opaque"));
    }

    #[test]
    fn list_rooms_passes_limit_and_token() {
        assert_eq!(
            list_rooms(ListRoomsArgs { limit: Some(5), next_token: Some("t".into()) }),
            StoreOperation::Scan {
                table: Table::Rooms,
                limit: 5,
                next_token: Some("t".into()),
            }
        );
        let StoreOperation::Scan { limit, .. } = list_rooms(ListRoomsArgs::default()) else {
            panic!("expected Scan");
        };
        assert_eq!(limit, 1000);
    }

    #[test]
    fn respond_passes_results_through() {
        let written = item(json!({ "id": "r1", "name": "general" }));
        assert_eq!(
            respond(Ok(StoreOutput::Item(written.clone()))).unwrap(),
            Value::Object(written.clone())
        );

        let page = respond(Ok(StoreOutput::Page {
            items: vec![written],
            next_token: None,
        }))
        .unwrap();
        assert_eq!(
            page,
            json!({ "items": [{ "id": "r1", "name": "general" }], "nextToken": null })
        );
    }

    #[test]
    fn respond_passes_errors_through() {
        let err = respond(Err(StoreError::ConditionalCheckFailed)).unwrap_err();
        assert_eq!(err.message, "The conditional request failed");
        assert_eq!(err.error_type, "KeyValueStore:ConditionalCheckFailedException");

        let err = respond(Err(StoreError::Validation("bad limit".into()))).unwrap_err();
        assert_eq!(err.message, "bad limit");
        assert_eq!(err.error_type, "KeyValueStore:ValidationException");
    }
}
