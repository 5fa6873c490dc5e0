//! Read-only SQL views: their DDL (applied by the migration) and paged reads over them.

use crate::error::AppError;
use crate::service::crud::{fetch_all_json, fetch_optional_json};
use crate::sql::{QueryBuf, MAX_LIMIT};
use serde_json::Value;
use sqlx::PgPool;

/// One SQL view: database name, URL segment, the id column used for single-row lookups, and its body.
#[derive(Debug)]
pub struct ViewDef {
    pub name: &'static str,
    pub path_segment: &'static str,
    pub key_column: &'static str,
    pub label: &'static str,
    pub select: &'static str,
}

impl ViewDef {
    pub fn create_sql(&self) -> String {
        format!("CREATE VIEW {} AS {}", self.name, self.select)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP VIEW IF EXISTS {}", self.name)
    }
}

pub const VIEWS: &[ViewDef] = &[
    ViewDef {
        name: "enemy_details",
        path_segment: "enemy-details",
        key_column: "enemy_id",
        label: "Enemy",
        select: "SELECT e.enemy_id, e.hp, e.attack, e.defense, e.card_score, \
                 c.character_id, c.name AS character_name, c.description \
                 FROM enemies e JOIN characters c ON e.character_id = c.character_id",
    },
    ViewDef {
        name: "boss_details",
        path_segment: "boss-details",
        key_column: "boss_id",
        label: "Boss",
        select: "SELECT b.boss_id, b.character_id, b.chapter_id, b.phase_count, b.special_mechanics, \
                 c.name AS boss_name, c.description AS boss_description, \
                 ch.name AS chapter_name, ch.world_number \
                 FROM bosses b \
                 JOIN characters c ON b.character_id = c.character_id \
                 JOIN chapters ch ON b.chapter_id = ch.chapter_id",
    },
    ViewDef {
        name: "location_summary",
        path_segment: "location-summary",
        key_column: "location_id",
        label: "Location",
        select: "SELECT l.location_id, l.name AS location_name, l.type::text AS location_type, l.description, \
                 l.chapter_id, ch.name AS chapter_name, ch.world_number, \
                 (SELECT COUNT(*) FROM objects WHERE location_id = l.location_id) AS object_count, \
                 (SELECT COUNT(*) FROM blocks_containers WHERE location_id = l.location_id) AS block_count, \
                 (SELECT COUNT(*) FROM navigation_objects WHERE location_id = l.location_id) AS nav_object_count, \
                 (SELECT COUNT(*) FROM obstacles WHERE location_id = l.location_id) AS obstacle_count, \
                 (SELECT COUNT(*) FROM switches WHERE location_id = l.location_id) AS switch_count \
                 FROM locations l JOIN chapters ch ON l.chapter_id = ch.chapter_id",
    },
    ViewDef {
        name: "playable_character_details",
        path_segment: "playable-character-details",
        key_column: "character_id",
        label: "Playable character",
        select: "SELECT pc.character_id, c.name AS character_name, c.description, pc.special_ability, \
                 pc.unlock_chapter_id, ch.name AS unlock_chapter_name, ch.world_number AS unlock_world \
                 FROM playable_characters pc \
                 JOIN characters c ON pc.character_id = c.character_id \
                 LEFT JOIN chapters ch ON pc.unlock_chapter_id = ch.chapter_id",
    },
    ViewDef {
        name: "block_inventory",
        path_segment: "block-inventory",
        key_column: "block_id",
        label: "Block",
        select: "SELECT bc.block_id, bc.block_type::text AS block_type, bc.properties, bc.location_id, \
                 l.name AS location_name, l.type::text AS location_type, \
                 ch.name AS chapter_name, ch.world_number, \
                 bc.contains_item_id, i.name AS item_name, i.is_key_item, i.effect AS item_effect \
                 FROM blocks_containers bc \
                 JOIN locations l ON bc.location_id = l.location_id \
                 JOIN chapters ch ON l.chapter_id = ch.chapter_id \
                 LEFT JOIN items i ON bc.contains_item_id = i.item_id",
    },
    ViewDef {
        name: "quest_overview",
        path_segment: "quest-overview",
        key_column: "quest_id",
        label: "Side quest",
        select: "SELECT sq.quest_id, sq.name AS quest_name, sq.description, sq.start_location_id, \
                 l.name AS start_location_name, ch.name AS chapter_name, \
                 sq.reward_item_id, i.name AS reward_item_name, i.is_key_item AS reward_is_key_item \
                 FROM side_quests sq \
                 LEFT JOIN locations l ON sq.start_location_id = l.location_id \
                 LEFT JOIN chapters ch ON l.chapter_id = ch.chapter_id \
                 LEFT JOIN items i ON sq.reward_item_id = i.item_id",
    },
    ViewDef {
        name: "chapter_statistics",
        path_segment: "chapter-statistics",
        key_column: "chapter_id",
        label: "Chapter",
        select: "SELECT ch.chapter_id, ch.name AS chapter_name, ch.world_number, ch.description, \
                 (SELECT COUNT(*) FROM locations WHERE chapter_id = ch.chapter_id) AS location_count, \
                 (SELECT COUNT(*) FROM bosses WHERE chapter_id = ch.chapter_id) AS boss_count, \
                 (SELECT COUNT(*) FROM pixls WHERE unlock_chapter_id = ch.chapter_id) AS pixl_count, \
                 (SELECT COUNT(*) FROM playable_characters WHERE unlock_chapter_id = ch.chapter_id) \
                 AS playable_character_count \
                 FROM chapters ch",
    },
];

pub fn view_by_path(path_segment: &str) -> Option<&'static ViewDef> {
    VIEWS.iter().find(|v| v.path_segment == path_segment)
}

pub struct ViewService;

impl ViewService {
    pub async fn list(pool: &PgPool, view: &ViewDef, limit: Option<u32>, offset: u32) -> Result<Vec<Value>, AppError> {
        let q = list_query(view, limit, offset);
        fetch_all_json(pool, &q).await
    }

    pub async fn get(pool: &PgPool, view: &ViewDef, id: i32) -> Result<Value, AppError> {
        let q = QueryBuf {
            sql: format!("SELECT * FROM {} WHERE {} = $1::integer", view.name, view.key_column),
            params: vec![Value::from(id)],
        };
        fetch_optional_json(pool, &q)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with id {} not found", view.label, id)))
    }
}

fn list_query(view: &ViewDef, limit: Option<u32>, offset: u32) -> QueryBuf {
    let mut sql = format!("SELECT * FROM {} ORDER BY {}", view.name, view.key_column);
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n.min(MAX_LIMIT)));
    }
    if offset > 0 {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    QueryBuf { sql, params: vec![] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_views_with_unique_paths() {
        assert_eq!(VIEWS.len(), 7);
        let mut paths: Vec<_> = VIEWS.iter().map(|v| v.path_segment).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 7);
        for v in VIEWS {
            assert_eq!(v.path_segment.replace('-', "_"), v.name);
            assert!(v.select.contains(v.key_column), "{} lacks its key column", v.name);
        }
    }

    #[test]
    fn enum_columns_are_exposed_as_text() {
        let blocks = view_by_path("block-inventory").unwrap();
        assert!(blocks.select.contains("bc.block_type::text AS block_type"));
        assert!(blocks.select.contains("l.type::text AS location_type"));
    }

    #[test]
    fn list_query_pages_by_key() {
        let v = view_by_path("enemy-details").unwrap();
        assert_eq!(
            list_query(v, Some(10), 5).sql,
            "SELECT * FROM enemy_details ORDER BY enemy_id LIMIT 10 OFFSET 5"
        );
        assert_eq!(list_query(v, None, 0).sql, "SELECT * FROM enemy_details ORDER BY enemy_id");
    }

    #[test]
    fn create_sql_wraps_select() {
        let v = view_by_path("quest-overview").unwrap();
        assert!(v.create_sql().starts_with("CREATE VIEW quest_overview AS SELECT sq.quest_id"));
        assert_eq!(v.drop_sql(), "DROP VIEW IF EXISTS quest_overview");
    }
}
