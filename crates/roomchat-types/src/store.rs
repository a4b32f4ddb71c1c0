use serde_json::{Map, Value};

/// A stored record: a flat JSON object of attributes.
pub type Item = Map<String, Value>;

/// Name of the primary key attribute shared by every table.
pub const KEY_ATTRIBUTE: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Rooms,
    Messages,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rooms => "rooms",
            Self::Messages => "messages",
        }
    }
}

/// Secondary access paths. Each index belongs to exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Messages partitioned by `roomId`, sorted by `createdAt`.
    ByRoomCreatedAt,
}

impl Index {
    pub fn name(self) -> &'static str {
        match self {
            Self::ByRoomCreatedAt => "messages-by-room-created-at",
        }
    }

    pub fn table(self) -> Table {
        match self {
            Self::ByRoomCreatedAt => Table::Messages,
        }
    }

    pub fn partition_attribute(self) -> &'static str {
        match self {
            Self::ByRoomCreatedAt => "roomId",
        }
    }

    pub fn sort_attribute(self) -> &'static str {
        match self {
            Self::ByRoomCreatedAt => "createdAt",
        }
    }
}

/// Precondition evaluated against the currently stored item before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeNotExists(String),
}

impl Condition {
    /// Evaluates the condition against the existing item, if any.
    pub fn holds(&self, existing: Option<&Item>) -> bool {
        match self {
            Self::AttributeNotExists(attribute) => {
                existing.is_none_or(|item| !item.contains_key(attribute))
            }
        }
    }
}

/// A single request against the key-value store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    /// Writes `attributes` under `key`, replacing any existing item unless
    /// `condition` fails.
    PutItem {
        table: Table,
        key: String,
        attributes: Item,
        condition: Option<Condition>,
    },
    /// Range read over a secondary index for one partition value.
    Query {
        index: Index,
        partition: String,
        scan_forward: bool,
        limit: i64,
        next_token: Option<String>,
    },
    /// Unfiltered read of a whole table.
    Scan {
        table: Table,
        limit: i64,
        next_token: Option<String>,
    },
}

/// Raw result of a successful store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutput {
    Item(Item),
    Page {
        items: Vec<Item>,
        next_token: Option<String>,
    },
}
