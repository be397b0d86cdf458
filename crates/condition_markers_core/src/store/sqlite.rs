//! SQLite-backed scene store.
//!
//! # Responsibility
//! - Persist scene items as JSON payload rows behind the `SceneStore` contract.
//! - Announce every committed mutation through a `ChangeFeed`.
//!
//! # Invariants
//! - Enumeration order is insertion order (`seq`); updates never reorder.
//! - `add_items` is atomic per call and rejects ids that already exist.
//! - Write paths call `SceneItem::validate()` before SQL mutations.

use crate::db::ensure_migrated;
use crate::model::item::{ItemId, SceneItem};
use crate::store::{ChangeEvent, ChangeFeed, SceneStore, StoreError, StoreResult, Subscription};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ITEM_SELECT_SQL: &str = "SELECT id, payload FROM scene_items";

pub struct SqliteSceneStore<'conn> {
    conn: &'conn Connection,
    feed: ChangeFeed,
}

impl<'conn> SqliteSceneStore<'conn> {
    /// Wraps a connection whose scene schema is fully migrated.
    ///
    /// # Errors
    /// - `StoreError::Db` when the schema version does not match this build.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self {
            conn,
            feed: ChangeFeed::new(),
        })
    }

    /// Sets the scene grid resolution.
    pub fn set_dpi(&self, dpi: f64) -> StoreResult<()> {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(StoreError::InvalidData(format!(
                "scene dpi must be positive, got {dpi}"
            )));
        }
        self.conn
            .execute("UPDATE scene_grid SET dpi = ?1 WHERE id = 1;", [dpi])?;
        Ok(())
    }

    fn load_item(&self, id: ItemId) -> StoreResult<Option<SceneItem>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let payload = stmt
            .query_row([id.to_string()], |row| row.get::<_, String>("payload"))
            .optional()?;
        payload
            .map(|payload| parse_payload(id, &payload))
            .transpose()
    }

    fn contains(&self, id: ItemId) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scene_items WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl SceneStore for SqliteSceneStore<'_> {
    fn get_items(&self, predicate: &dyn Fn(&SceneItem) -> bool) -> StoreResult<Vec<SceneItem>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ITEM_SELECT_SQL} ORDER BY seq ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let item = parse_item_row(row)?;
            if predicate(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn get_items_by_ids(&self, ids: &[ItemId]) -> StoreResult<Vec<SceneItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.load_item(*id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn add_items(&self, items: &[SceneItem]) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            item.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        for item in items {
            if self.contains(item.id)? {
                return Err(StoreError::DuplicateId(item.id));
            }
            tx.execute(
                "INSERT INTO scene_items (id, payload) VALUES (?1, ?2);",
                params![item.id.to_string(), serde_json::to_string(item)?],
            )?;
        }
        tx.commit()?;

        debug!(
            "event=store_add module=store status=ok count={}",
            items.len()
        );
        self.feed.publish(ChangeEvent {
            changed: items.to_vec(),
            removed: Vec::new(),
        });
        Ok(())
    }

    fn update_items(
        &self,
        ids: &[ItemId],
        mutator: &mut dyn FnMut(&mut [SceneItem]),
    ) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut items = self.get_items_by_ids(ids)?;
        let loaded_ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
        mutator(&mut items);

        // Rows are keyed by the id they were loaded with.
        for (item, id) in items.iter_mut().zip(&loaded_ids) {
            item.id = *id;
            item.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        for item in &items {
            tx.execute(
                "UPDATE scene_items
                 SET
                    payload = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                params![serde_json::to_string(item)?, item.id.to_string()],
            )?;
        }
        tx.commit()?;

        debug!(
            "event=store_update module=store status=ok requested={} updated={}",
            ids.len(),
            items.len()
        );
        self.feed.publish(ChangeEvent {
            changed: items,
            removed: Vec::new(),
        });
        Ok(())
    }

    fn delete_items(&self, ids: &[ItemId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = Vec::new();
        for id in ids {
            let changed = tx.execute(
                "DELETE FROM scene_items WHERE id = ?1;",
                [id.to_string()],
            )?;
            if changed > 0 {
                removed.push(*id);
            }
        }
        tx.commit()?;

        debug!(
            "event=store_delete module=store status=ok requested={} deleted={}",
            ids.len(),
            removed.len()
        );
        self.feed.publish(ChangeEvent {
            changed: Vec::new(),
            removed,
        });
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }

    fn get_dpi(&self) -> StoreResult<f64> {
        let dpi = self
            .conn
            .query_row("SELECT dpi FROM scene_grid WHERE id = 1;", [], |row| {
                row.get::<_, f64>(0)
            })
            .optional()?;
        dpi.ok_or_else(|| StoreError::InvalidData("scene grid row is missing".to_string()))
    }
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<SceneItem> {
    let id_text: String = row.get("id")?;
    let id = uuid::Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in scene_items.id"))
    })?;
    let payload: String = row.get("payload")?;
    parse_payload(id, &payload)
}

fn parse_payload(id: ItemId, payload: &str) -> StoreResult<SceneItem> {
    let item: SceneItem = serde_json::from_str(payload).map_err(|err| {
        StoreError::InvalidData(format!("invalid payload for scene item {id}: {err}"))
    })?;
    if item.id != id {
        return Err(StoreError::InvalidData(format!(
            "payload id {} does not match row id {id}",
            item.id
        )));
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::SqliteSceneStore;
    use crate::db::{open_db_in_memory, DbError};
    use crate::model::geometry::Vector2;
    use crate::model::item::{Layer, SceneItem};
    use crate::store::{SceneStore, StoreError};
    use rusqlite::Connection;

    #[test]
    fn rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            SqliteSceneStore::try_new(&conn),
            Err(StoreError::Db(DbError::SchemaBehind { found: 0, .. }))
        ));
    }

    #[test]
    fn enumeration_follows_insertion_order_across_updates() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSceneStore::try_new(&conn).unwrap();
        let items: Vec<SceneItem> = (0..4)
            .map(|index| SceneItem::new(format!("item {index}"), Layer::Prop))
            .collect();
        store.add_items(&items).unwrap();

        store
            .update_items(&[items[0].id], &mut |loaded: &mut [SceneItem]| {
                loaded[0].rotation = 10.0;
            })
            .unwrap();

        let listed: Vec<_> = store
            .get_items(&|_| true)
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect();
        let expected: Vec<_> = items.iter().map(|item| item.id).collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn add_is_atomic_and_rejects_duplicates() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSceneStore::try_new(&conn).unwrap();
        let existing = SceneItem::new("existing", Layer::Prop);
        store.add_items(std::slice::from_ref(&existing)).unwrap();

        let fresh = SceneItem::new("fresh", Layer::Prop);
        let err = store
            .add_items(&[fresh.clone(), existing.clone()])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == existing.id));
        assert!(store.get_items_by_ids(&[fresh.id]).unwrap().is_empty());
    }

    #[test]
    fn mutator_cannot_rekey_items() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSceneStore::try_new(&conn).unwrap();
        let item = SceneItem::new("stable", Layer::Prop);
        store.add_items(std::slice::from_ref(&item)).unwrap();

        store
            .update_items(&[item.id], &mut |loaded: &mut [SceneItem]| {
                loaded[0].id = uuid::Uuid::new_v4();
                loaded[0].name = "renamed".to_string();
            })
            .unwrap();

        let loaded = store.get_items_by_ids(&[item.id]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "renamed");
    }

    #[test]
    fn dpi_defaults_and_can_be_changed() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSceneStore::try_new(&conn).unwrap();
        assert_eq!(store.get_dpi().unwrap(), 150.0);
        store.set_dpi(300.0).unwrap();
        assert_eq!(store.get_dpi().unwrap(), 300.0);
        assert!(store.set_dpi(0.0).is_err());
    }

    #[test]
    fn fractional_transforms_are_stored_bit_exact() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSceneStore::try_new(&conn).unwrap();
        let mut items = Vec::new();
        for step in 0..50 {
            let t = f64::from(step);
            let mut item = SceneItem::new(format!("marker {step}"), Layer::Attachment);
            item.position = Vector2::new(155.3 + t * 0.37, 87.1 / (t + 3.0));
            item.scale = Vector2::splat(1.3 * (t + 1.0) / 7.0);
            item.rotation = 140.37 / (t + 1.0);
            items.push(item);
        }
        store.add_items(&items).unwrap();

        let ids: Vec<_> = items.iter().map(|item| item.id).collect();
        assert_eq!(store.get_items_by_ids(&ids).unwrap(), items);
    }
}
