use async_graphql::{Enum, ErrorExtensions, ID, InputObject, SimpleObject};
use serde_json::Value;

use roomchat_types::store::Item;

use crate::resolvers::{self, ResolverError};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for resolvers::SortDirection {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

#[derive(SimpleObject, Clone, Debug, PartialEq)]
pub struct Room {
    pub id: ID,
    pub name: Option<String>,
}

#[derive(SimpleObject, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: ID,
    pub room_id: ID,
    pub text: Option<String>,
    pub owner: Option<String>,
    pub created_at: Option<String>,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct RoomConnection {
    pub items: Vec<Room>,
    pub next_token: Option<String>,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct MessageConnection {
    pub items: Vec<Message>,
    pub next_token: Option<String>,
}

#[derive(InputObject, Clone, Debug, Default)]
pub struct CreateRoomInput {
    pub id: Option<ID>,
    pub name: Option<String>,
}

/// `owner` is accepted for compatibility but always replaced by the caller.
#[derive(InputObject, Clone, Debug)]
pub struct CreateMessageInput {
    pub id: Option<ID>,
    pub room_id: ID,
    pub text: Option<String>,
    pub created_at: Option<String>,
    pub owner: Option<String>,
}

impl CreateRoomInput {
    pub fn into_item(self) -> Item {
        let mut item = Item::new();
        insert_opt(&mut item, "id", self.id.map(|id| id.0));
        insert_opt(&mut item, "name", self.name);
        item
    }
}

impl CreateMessageInput {
    pub fn into_item(self) -> Item {
        let mut item = Item::new();
        insert_opt(&mut item, "id", self.id.map(|id| id.0));
        insert_opt(&mut item, "roomId", Some(self.room_id.0));
        insert_opt(&mut item, "text", self.text);
        insert_opt(&mut item, "createdAt", self.created_at);
        insert_opt(&mut item, "owner", self.owner);
        item
    }
}

fn insert_opt(item: &mut Item, attribute: &str, value: Option<String>) {
    if let Some(value) = value {
        item.insert(attribute.to_string(), Value::String(value));
    }
}

// -- Store results to GraphQL objects --

impl TryFrom<Value> for Room {
    type Error = ResolverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let item = object(value)?;
        Ok(Self {
            id: ID(required(&item, "id")?),
            name: optional(&item, "name"),
        })
    }
}

impl TryFrom<Value> for Message {
    type Error = ResolverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let item = object(value)?;
        Ok(Self {
            id: ID(required(&item, "id")?),
            room_id: ID(required(&item, "roomId")?),
            text: optional(&item, "text"),
            owner: optional(&item, "owner"),
            created_at: optional(&item, "createdAt"),
        })
    }
}

impl TryFrom<Value> for RoomConnection {
    type Error = ResolverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let (items, next_token) = page(value)?;
        Ok(Self {
            items: items.into_iter().map(Room::try_from).collect::<Result<_, _>>()?,
            next_token,
        })
    }
}

impl TryFrom<Value> for MessageConnection {
    type Error = ResolverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let (items, next_token) = page(value)?;
        Ok(Self {
            items: items.into_iter().map(Message::try_from).collect::<Result<_, _>>()?,
            next_token,
        })
    }
}

/// Convenience for resolvers: shape errors carry their type like store errors.
pub(crate) fn convert<T>(value: Value) -> async_graphql::Result<T>
where
    T: TryFrom<Value, Error = ResolverError>,
{
    T::try_from(value).map_err(|e| e.extend())
}

fn object(value: Value) -> Result<Item, ResolverError> {
    match value {
        Value::Object(item) => Ok(item),
        other => Err(ResolverError::mapping(format!("Expected an item, got {}", other))),
    }
}

fn page(value: Value) -> Result<(Vec<Value>, Option<String>), ResolverError> {
    let mut page = object(value)?;
    let items = match page.remove("items") {
        Some(Value::Array(items)) => items,
        _ => return Err(ResolverError::mapping("Result is missing items")),
    };
    Ok((items, optional(&page, "nextToken")))
}

fn required(item: &Item, attribute: &str) -> Result<String, ResolverError> {
    optional(item, attribute)
        .ok_or_else(|| ResolverError::mapping(format!("Item is missing attribute {}", attribute)))
}

fn optional(item: &Item, attribute: &str) -> Option<String> {
    item.get(attribute).and_then(Value::as_str).map(str::to_string)
}
