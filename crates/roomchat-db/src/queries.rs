use rusqlite::types::Value as SqlValue;
use rusqlite::{
    Connection, OptionalExtension, Transaction, TransactionBehavior, params_from_iter,
};
use serde_json::Value;
use tracing::{debug, warn};

use roomchat_types::store::{
    Condition, Index, Item, KEY_ATTRIBUTE, StoreOperation, StoreOutput, Table,
};

use crate::cursor::{self, LastKey};
use crate::{Database, StoreError};

/// Largest page a single Query or Scan may return.
pub const MAX_PAGE_SIZE: i64 = 1000;

impl Database {
    /// Runs one store operation to completion. No retries.
    pub fn execute(&self, op: StoreOperation) -> Result<StoreOutput, StoreError> {
        self.with_conn(|conn| match op {
            StoreOperation::PutItem {
                table,
                key,
                attributes,
                condition,
            } => {
                put_item(conn, table, key, attributes, condition.as_ref()).map(StoreOutput::Item)
            }
            StoreOperation::Query {
                index,
                partition,
                scan_forward,
                limit,
                next_token,
            } => query_index(conn, index, &partition, scan_forward, limit, next_token.as_deref()),
            StoreOperation::Scan {
                table,
                limit,
                next_token,
            } => scan_table(conn, table, limit, next_token.as_deref()),
        })
    }
}

fn put_item(
    conn: &Connection,
    table: Table,
    key: String,
    mut item: Item,
    condition: Option<&Condition>,
) -> Result<Item, StoreError> {
    if key.is_empty() {
        return Err(StoreError::Validation(
            "One or more parameter values are not valid. \
             The key attribute id cannot be empty"
                .into(),
        ));
    }
    item.insert(KEY_ATTRIBUTE.to_string(), Value::String(key.clone()));
    let body = serde_json::to_string(&item)?;

    // Existence check and write share one immediate transaction.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let existing = tx
        .query_row(
            &format!("SELECT body FROM {} WHERE id = ?1", table.name()),
            [&key],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .map(|body| serde_json::from_str::<Item>(&body))
        .transpose()?;

    if let Some(condition) = condition {
        if !condition.holds(existing.as_ref()) {
            warn!(table = table.name(), key = %key, "Conditional put rejected");
            return Err(StoreError::ConditionalCheckFailed);
        }
    }

    match table {
        Table::Rooms => {
            tx.execute(
                "INSERT OR REPLACE INTO rooms (id, body) VALUES (?1, ?2)",
                (&key, &body),
            )?;
        }
        Table::Messages => {
            let index = Index::ByRoomCreatedAt;
            let room_id = index_attribute(&item, index.partition_attribute())?;
            let created_at = index_attribute(&item, index.sort_attribute())?;
            tx.execute(
                "INSERT OR REPLACE INTO messages (id, room_id, created_at, body) \
                 VALUES (?1, ?2, ?3, ?4)",
                (&key, room_id, created_at, &body),
            )?;
        }
    }
    tx.commit()?;

    debug!(table = table.name(), key = %key, replaced = existing.is_some(), "PutItem");
    Ok(item)
}

fn query_index(
    conn: &Connection,
    index: Index,
    partition: &str,
    scan_forward: bool,
    limit: i64,
    next_token: Option<&str>,
) -> Result<StoreOutput, StoreError> {
    check_limit(limit)?;
    let after = next_token
        .map(|token| cursor::decode(token, index.name()))
        .transpose()?;

    let (table, partition_col, sort_col) = index_columns(index);
    let (order, cmp) = if scan_forward { ("ASC", ">") } else { ("DESC", "<") };

    let mut params = vec![SqlValue::Text(partition.to_string())];
    let mut sql = format!(
        "SELECT id, {sort_col}, body FROM {table} \
         WHERE {partition_col} = ?1 AND {sort_col} IS NOT NULL"
    );
    if let Some(after) = after {
        let invalid = || StoreError::Validation(format!("Invalid nextToken for {}", index.name()));
        // A start key only makes sense inside the partition it came from.
        if after.partition.as_deref() != Some(partition) {
            return Err(invalid());
        }
        let sort = after.sort.ok_or_else(invalid)?;
        sql.push_str(&format!(
            " AND ({sort_col} {cmp} ?2 OR ({sort_col} = ?2 AND id {cmp} ?3))"
        ));
        params.push(SqlValue::Text(sort));
        params.push(SqlValue::Text(after.id));
    }
    sql.push_str(&format!(
        " ORDER BY {sort_col} {order}, id {order} LIMIT ?{}",
        params.len() + 1
    ));
    // One extra row tells us whether another page exists.
    params.push(SqlValue::Integer(limit + 1));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(index = index.name(), partition, scan_forward, rows = rows.len(), "Query");

    let rows = rows
        .into_iter()
        .map(|(id, sort, body)| {
            let key = LastKey {
                source: index.name().to_string(),
                partition: Some(partition.to_string()),
                id,
                sort: Some(sort),
            };
            (key, body)
        })
        .collect();
    paginate(rows, limit)
}

fn scan_table(
    conn: &Connection,
    table: Table,
    limit: i64,
    next_token: Option<&str>,
) -> Result<StoreOutput, StoreError> {
    check_limit(limit)?;
    let after = next_token
        .map(|token| cursor::decode(token, table.name()))
        .transpose()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT id, body FROM {} WHERE (?1 IS NULL OR id > ?1) ORDER BY id LIMIT ?2",
        table.name()
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![after.map(|key| key.id), limit + 1],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(table = table.name(), rows = rows.len(), "Scan");

    let rows = rows
        .into_iter()
        .map(|(id, body)| {
            let key = LastKey {
                source: table.name().to_string(),
                partition: None,
                id,
                sort: None,
            };
            (key, body)
        })
        .collect();
    paginate(rows, limit)
}

/// Cuts `rows` (fetched with one extra row) down to a page and issues the
/// continuation token when the extra row was present.
fn paginate(mut rows: Vec<(LastKey, String)>, limit: i64) -> Result<StoreOutput, StoreError> {
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    let next_token = if has_more {
        rows.last().map(|(key, _)| cursor::encode(key)).transpose()?
    } else {
        None
    };

    let items = rows
        .into_iter()
        .map(|(_, body)| serde_json::from_str::<Item>(&body))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(StoreOutput::Page { items, next_token })
}

fn check_limit(limit: i64) -> Result<(), StoreError> {
    if (1..=MAX_PAGE_SIZE).contains(&limit) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "Limit must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, limit
        )))
    }
}

/// Index attributes are optional, but when present they must be strings.
fn index_attribute<'a>(
    item: &'a Item,
    attribute: &str,
) -> Result<Option<&'a str>, StoreError> {
    match item.get(attribute) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(StoreError::Validation(format!(
            "One or more parameter values were invalid: Type mismatch for Index Key {} Expected: S",
            attribute
        ))),
    }
}

/// (table, partition column, sort column) backing an index.
fn index_columns(index: Index) -> (&'static str, &'static str, &'static str) {
    match index {
        Index::ByRoomCreatedAt => (index.table().name(), "room_id", "created_at"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use serde_json::json;

    use super::*;

    fn open() -> Database {
        Database::open(Path::new(":memory:")).unwrap()
    }

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn put(
        db: &Database,
        table: Table,
        key: &str,
        attributes: Value,
    ) -> Result<StoreOutput, StoreError> {
        db.execute(StoreOperation::PutItem {
            table,
            key: key.into(),
            attributes: item(attributes),
            condition: Some(Condition::AttributeNotExists(KEY_ATTRIBUTE.into())),
        })
    }

    fn message(db: &Database, key: &str, room: &str, created_at: &str) {
        let attributes = json!({ "roomId": room, "createdAt": created_at });
        put(db, Table::Messages, key, attributes).unwrap();
    }

    fn scan(db: &Database, limit: i64, next_token: Option<String>) -> StoreOutput {
        db.execute(StoreOperation::Scan {
            table: Table::Rooms,
            limit,
            next_token,
        })
        .unwrap()
    }

    fn page(output: StoreOutput) -> (Vec<Item>, Option<String>) {
        match output {
            StoreOutput::Page { items, next_token } => (items, next_token),
            other => panic!("expected page, got {:?}", other),
        }
    }

    fn query(
        db: &Database,
        room: &str,
        scan_forward: bool,
        limit: i64,
        next_token: Option<String>,
    ) -> (Vec<Item>, Option<String>) {
        page(
            db.execute(StoreOperation::Query {
                index: Index::ByRoomCreatedAt,
                partition: room.into(),
                scan_forward,
                limit,
                next_token,
            })
            .unwrap(),
        )
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn put_returns_item_with_key() {
        let db = open();
        let out = put(&db, Table::Rooms, "r1", json!({ "name": "general" })).unwrap();
        assert_eq!(out, StoreOutput::Item(item(json!({ "id": "r1", "name": "general" }))));
    }

    #[test]
    fn conditional_put_rejects_existing_key() {
        let db = open();
        put(&db, Table::Rooms, "r1", json!({ "name": "general" })).unwrap();

        let err = put(&db, Table::Rooms, "r1", json!({ "name": "hijack" })).unwrap_err();
        assert_eq!(err, StoreError::ConditionalCheckFailed);
        assert_eq!(err.message(), "The conditional request failed");
        assert_eq!(err.error_type(), "KeyValueStore:ConditionalCheckFailedException");

        let (items, _) = page(scan(&db, 10, None));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "general");
    }

    #[test]
    fn unconditional_put_replaces() {
        let db = open();
        put(&db, Table::Rooms, "r1", json!({ "name": "general" })).unwrap();
        db.execute(StoreOperation::PutItem {
            table: Table::Rooms,
            key: "r1".into(),
            attributes: item(json!({ "name": "random" })),
            condition: None,
        })
        .unwrap();

        let (items, _) = page(scan(&db, 10, None));
        assert_eq!(items, vec![item(json!({ "id": "r1", "name": "random" }))]);
    }

    #[test]
    fn same_key_in_different_tables_is_independent() {
        let db = open();
        put(&db, Table::Rooms, "x", json!({})).unwrap();
        message(&db, "x", "x", "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn empty_key_is_rejected() {
        let db = open();
        let err = put(&db, Table::Rooms, "", json!({})).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn index_key_type_mismatch_is_rejected() {
        let db = open();
        let err = put(&db, Table::Messages, "m1", json!({ "roomId": 7 })).unwrap_err();
        assert_eq!(err.error_type(), "KeyValueStore:ValidationException");
    }

    #[test]
    fn query_orders_by_created_at() {
        let db = open();
        message(&db, "m2", "a", "2024-01-01T00:00:02.000Z");
        message(&db, "m1", "a", "2024-01-01T00:00:01.000Z");
        message(&db, "m3", "a", "2024-01-01T00:00:03.000Z");
        message(&db, "other", "b", "2024-01-01T00:00:00.000Z");
        // Not in the index: no sort key.
        put(&db, Table::Messages, "loose", json!({ "roomId": "a" })).unwrap();

        let (asc, token) = query(&db, "a", true, 100, None);
        assert_eq!(ids(&asc), vec!["m1", "m2", "m3"]);
        assert!(token.is_none());

        let (desc, _) = query(&db, "a", false, 100, None);
        assert_eq!(ids(&desc), vec!["m3", "m2", "m1"]);
    }

    #[test]
    fn query_pages_through_equal_timestamps() {
        let db = open();
        for id in ["a", "b", "c", "d", "e"] {
            message(&db, id, "r", "2024-01-01T00:00:00.000Z");
        }
        message(&db, "z", "r", "2023-12-31T00:00:00.000Z");

        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let (items, next) = query(&db, "r", false, 2, token);
            seen.extend(ids(&items).into_iter().map(String::from));
            match next {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        assert_eq!(seen, vec!["e", "d", "c", "b", "a", "z"]);
    }

    #[test]
    fn scan_pagination_covers_table_once() {
        let db = open();
        for i in 0..10 {
            put(&db, Table::Rooms, &format!("room-{:02}", i), json!({ "name": i })).unwrap();
        }

        for limit in [1, 3, 5, 10, 11] {
            let mut seen = HashSet::new();
            let mut pages = 0;
            let mut token = None;
            loop {
                let (items, next) = page(scan(&db, limit, token));
                pages += 1;
                assert!((items.len() as i64) <= limit);
                for id in ids(&items) {
                    assert!(seen.insert(id.to_string()), "duplicate {}", id);
                }
                match next {
                    Some(t) => token = Some(t),
                    None => break,
                }
            }
            assert_eq!(seen.len(), 10);
            assert_eq!(pages, (10 + limit - 1) / limit);
        }
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        let db = open();
        for limit in [0, -1, MAX_PAGE_SIZE + 1] {
            let err = db
                .execute(StoreOperation::Scan { table: Table::Rooms, limit, next_token: None })
                .unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
    }

    #[test]
    fn token_from_other_table_is_rejected() {
        let db = open();
        for i in 0..3 {
            put(&db, Table::Rooms, &format!("r{}", i), json!({})).unwrap();
        }
        let (_, token) = page(scan(&db, 1, None));
        let err = db
            .execute(StoreOperation::Query {
                index: Index::ByRoomCreatedAt,
                partition: "r0".into(),
                scan_forward: true,
                limit: 10,
                next_token: token,
            })
            .unwrap_err();
        assert_eq!(err.error_type(), "KeyValueStore:ValidationException");
    }

    #[test]
    fn token_from_other_partition_is_rejected() {
        let db = open();
        message(&db, "a1", "room-a", "2024-01-01T00:00:01.000Z");
        message(&db, "a2", "room-a", "2024-01-01T00:00:02.000Z");
        message(&db, "b1", "room-b", "2024-01-01T00:00:00.000Z");

        let (_, token) = query(&db, "room-a", true, 1, None);
        assert!(token.is_some());

        let err = db
            .execute(StoreOperation::Query {
                index: Index::ByRoomCreatedAt,
                partition: "room-b".into(),
                scan_forward: true,
                limit: 1,
                next_token: token.clone(),
            })
            .unwrap_err();
        assert_eq!(err.error_type(), "KeyValueStore:ValidationException");

        // Same token still resumes its own partition.
        let (items, next) = query(&db, "room-a", true, 1, token);
        assert_eq!(ids(&items), vec!["a2"]);
        assert!(next.is_none());
    }
}
