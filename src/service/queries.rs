//! Multi-join read queries shaped for clients (nested statistics, grouped quest characters).

use crate::error::AppError;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnemyWithDetails {
    pub enemy_id: i32,
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub card_score: i32,
    pub character_name: String,
    pub character_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BossWithDetails {
    pub boss_id: i32,
    pub boss_name: String,
    pub description: Option<String>,
    pub phase_count: i32,
    pub special_mechanics: Option<String>,
    pub chapter: String,
    pub world_number: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlayableCharacterWithChapter {
    pub character_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub special_ability: Option<String>,
    pub unlock_chapter: Option<String>,
    pub unlock_world: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlockWithItemAndLocation {
    pub block_id: i32,
    pub block_type: String,
    pub properties: Option<String>,
    pub contains_item: Option<String>,
    pub is_key_item: Option<bool>,
    pub location: String,
    pub location_type: String,
    pub chapter: String,
    pub world: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestCharacterRole {
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SideQuestFullDetails {
    pub quest_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_location: Option<String>,
    pub chapter: Option<String>,
    pub reward: Option<String>,
    pub characters: Vec<QuestCharacterRole>,
}

/// One row of the quest join before grouping.
#[derive(Debug, Clone, FromRow)]
pub struct SideQuestRow {
    pub quest_id: i32,
    pub quest_name: String,
    pub description: Option<String>,
    pub start_location: Option<String>,
    pub chapter: Option<String>,
    pub reward: Option<String>,
    pub character_name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct LocationCountsRow {
    location_id: i32,
    name: String,
    location_type: String,
    description: Option<String>,
    chapter: String,
    world: i32,
    object_count: i64,
    block_count: i64,
    nav_object_count: i64,
    obstacle_count: i64,
    switch_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationStatistics {
    pub objects: i64,
    pub blocks: i64,
    pub navigation_objects: i64,
    pub obstacles: i64,
    pub switches: i64,
    pub total_interactive_elements: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationWithEverything {
    pub location_id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: String,
    pub description: Option<String>,
    pub chapter: String,
    pub world: i32,
    pub statistics: LocationStatistics,
}

impl From<LocationCountsRow> for LocationWithEverything {
    fn from(r: LocationCountsRow) -> Self {
        let total = r.object_count + r.block_count + r.nav_object_count + r.obstacle_count + r.switch_count;
        LocationWithEverything {
            location_id: r.location_id,
            name: r.name,
            location_type: r.location_type,
            description: r.description,
            chapter: r.chapter,
            world: r.world,
            statistics: LocationStatistics {
                objects: r.object_count,
                blocks: r.block_count,
                navigation_objects: r.nav_object_count,
                obstacles: r.obstacle_count,
                switches: r.switch_count,
                total_interactive_elements: total,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SummaryBoss {
    pub name: String,
    pub phase_count: i32,
    pub special_mechanics: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SummaryPlayableCharacter {
    pub name: String,
    pub special_ability: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SummaryPixl {
    pub name: String,
    pub ability: Option<String>,
    pub is_optional: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterSummaryStatistics {
    pub location_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterSummary {
    pub chapter_id: i32,
    pub name: String,
    pub world_number: i32,
    pub description: Option<String>,
    pub statistics: ChapterSummaryStatistics,
    pub bosses: Vec<SummaryBoss>,
    pub playable_characters_unlocked: Vec<SummaryPlayableCharacter>,
    pub pixls_unlocked: Vec<SummaryPixl>,
}

/// Fold the flat quest/character join into one entry per quest, keeping row order.
pub fn group_quests(rows: Vec<SideQuestRow>) -> Vec<SideQuestFullDetails> {
    let mut out: Vec<SideQuestFullDetails> = Vec::new();
    for r in rows {
        if out.last().map(|q| q.quest_id) != Some(r.quest_id) {
            out.push(SideQuestFullDetails {
                quest_id: r.quest_id,
                name: r.quest_name,
                description: r.description,
                start_location: r.start_location,
                chapter: r.chapter,
                reward: r.reward,
                characters: Vec::new(),
            });
        }
        if let (Some(name), Some(quest)) = (r.character_name, out.last_mut()) {
            quest.characters.push(QuestCharacterRole { name, role: r.role });
        }
    }
    out
}

pub struct QueryService;

impl QueryService {
    pub async fn enemies_with_details(pool: &PgPool) -> Result<Vec<EnemyWithDetails>, AppError> {
        Ok(sqlx::query_as(
            "SELECT e.enemy_id, e.hp, e.attack, e.defense, e.card_score, \
             c.name AS character_name, c.description AS character_description \
             FROM enemies e JOIN characters c ON e.character_id = c.character_id \
             ORDER BY e.enemy_id",
        )
        .fetch_all(pool)
        .await?)
    }

    pub async fn bosses_with_details(pool: &PgPool) -> Result<Vec<BossWithDetails>, AppError> {
        Ok(sqlx::query_as(
            "SELECT b.boss_id, c.name AS boss_name, c.description, b.phase_count, b.special_mechanics, \
             ch.name AS chapter, ch.world_number \
             FROM bosses b \
             JOIN characters c ON b.character_id = c.character_id \
             JOIN chapters ch ON b.chapter_id = ch.chapter_id \
             ORDER BY b.boss_id",
        )
        .fetch_all(pool)
        .await?)
    }

    pub async fn playable_characters_with_chapters(
        pool: &PgPool,
    ) -> Result<Vec<PlayableCharacterWithChapter>, AppError> {
        Ok(sqlx::query_as(
            "SELECT pc.character_id, c.name, c.description, pc.special_ability, \
             ch.name AS unlock_chapter, ch.world_number AS unlock_world \
             FROM playable_characters pc \
             JOIN characters c ON pc.character_id = c.character_id \
             LEFT JOIN chapters ch ON pc.unlock_chapter_id = ch.chapter_id \
             ORDER BY pc.character_id",
        )
        .fetch_all(pool)
        .await?)
    }

    pub async fn blocks_with_items_and_locations(pool: &PgPool) -> Result<Vec<BlockWithItemAndLocation>, AppError> {
        Ok(sqlx::query_as(
            "SELECT bc.block_id, bc.block_type::text AS block_type, bc.properties, \
             i.name AS contains_item, i.is_key_item, \
             l.name AS location, l.type::text AS location_type, \
             ch.name AS chapter, ch.world_number AS world \
             FROM blocks_containers bc \
             LEFT JOIN items i ON bc.contains_item_id = i.item_id \
             JOIN locations l ON bc.location_id = l.location_id \
             JOIN chapters ch ON l.chapter_id = ch.chapter_id \
             ORDER BY bc.block_id",
        )
        .fetch_all(pool)
        .await?)
    }

    pub async fn side_quests_full_details(pool: &PgPool) -> Result<Vec<SideQuestFullDetails>, AppError> {
        let rows: Vec<SideQuestRow> = sqlx::query_as(
            "SELECT sq.quest_id, sq.name AS quest_name, sq.description, \
             l.name AS start_location, ch.name AS chapter, i.name AS reward, \
             c.name AS character_name, qc.role::text AS role \
             FROM side_quests sq \
             LEFT JOIN locations l ON sq.start_location_id = l.location_id \
             LEFT JOIN chapters ch ON l.chapter_id = ch.chapter_id \
             LEFT JOIN items i ON sq.reward_item_id = i.item_id \
             LEFT JOIN quest_character qc ON sq.quest_id = qc.quest_id \
             LEFT JOIN characters c ON qc.character_id = c.character_id \
             ORDER BY sq.quest_id, qc.role, c.character_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(group_quests(rows))
    }

    pub async fn locations_with_everything(pool: &PgPool) -> Result<Vec<LocationWithEverything>, AppError> {
        let rows: Vec<LocationCountsRow> = sqlx::query_as(
            "SELECT l.location_id, l.name, l.type::text AS location_type, l.description, \
             ch.name AS chapter, ch.world_number AS world, \
             COUNT(DISTINCT o.object_id) AS object_count, \
             COUNT(DISTINCT bc.block_id) AS block_count, \
             COUNT(DISTINCT n.navobj_id) AS nav_object_count, \
             COUNT(DISTINCT ob.obstacle_id) AS obstacle_count, \
             COUNT(DISTINCT s.switch_id) AS switch_count \
             FROM locations l \
             JOIN chapters ch ON l.chapter_id = ch.chapter_id \
             LEFT JOIN objects o ON o.location_id = l.location_id \
             LEFT JOIN blocks_containers bc ON bc.location_id = l.location_id \
             LEFT JOIN navigation_objects n ON n.location_id = l.location_id \
             LEFT JOIN obstacles ob ON ob.location_id = l.location_id \
             LEFT JOIN switches s ON s.location_id = l.location_id \
             GROUP BY l.location_id, l.name, l.type, l.description, ch.name, ch.world_number \
             ORDER BY l.location_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(LocationWithEverything::from).collect())
    }

    pub async fn chapter_summary(pool: &PgPool, chapter_id: i32) -> Result<ChapterSummary, AppError> {
        let chapter: Option<(i32, String, i32, Option<String>)> = sqlx::query_as(
            "SELECT chapter_id, name, world_number, description FROM chapters WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .fetch_optional(pool)
        .await?;
        let (chapter_id, name, world_number, description) =
            chapter.ok_or_else(|| AppError::NotFound("Chapter not found".into()))?;

        let location_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE chapter_id = $1")
            .bind(chapter_id)
            .fetch_one(pool)
            .await?;
        let bosses: Vec<SummaryBoss> = sqlx::query_as(
            "SELECT c.name, b.phase_count, b.special_mechanics \
             FROM bosses b JOIN characters c ON c.character_id = b.character_id \
             WHERE b.chapter_id = $1 ORDER BY b.boss_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;
        let playable: Vec<SummaryPlayableCharacter> = sqlx::query_as(
            "SELECT c.name, pc.special_ability \
             FROM playable_characters pc JOIN characters c ON c.character_id = pc.character_id \
             WHERE pc.unlock_chapter_id = $1 ORDER BY pc.character_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;
        let pixls: Vec<SummaryPixl> = sqlx::query_as(
            "SELECT name, ability, is_optional FROM pixls WHERE unlock_chapter_id = $1 ORDER BY pixl_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;

        Ok(ChapterSummary {
            chapter_id,
            name,
            world_number,
            description,
            statistics: ChapterSummaryStatistics { location_count },
            bosses,
            playable_characters_unlocked: playable,
            pixls_unlocked: pixls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(quest_id: i32, character: Option<&str>, role: Option<&str>) -> SideQuestRow {
        SideQuestRow {
            quest_id,
            quest_name: format!("Quest {}", quest_id),
            description: None,
            start_location: Some("Flipside".into()),
            chapter: None,
            reward: None,
            character_name: character.map(String::from),
            role: role.map(String::from),
        }
    }

    #[test]
    fn groups_characters_under_their_quest() {
        let grouped = group_quests(vec![
            row(1, Some("Merlon"), Some("giver")),
            row(1, Some("Dimentio"), Some("target")),
            row(2, None, None),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped[0].characters,
            vec![
                QuestCharacterRole {
                    name: "Merlon".into(),
                    role: Some("giver".into())
                },
                QuestCharacterRole {
                    name: "Dimentio".into(),
                    role: Some("target".into())
                },
            ]
        );
        assert!(grouped[1].characters.is_empty());
    }

    #[test]
    fn location_totals_sum_every_element() {
        let loc = LocationWithEverything::from(LocationCountsRow {
            location_id: 1,
            name: "Lineland Road".into(),
            location_type: "level".into(),
            description: None,
            chapter: "Lineland".into(),
            world: 1,
            object_count: 2,
            block_count: 3,
            nav_object_count: 1,
            obstacle_count: 0,
            switch_count: 4,
        });
        assert_eq!(loc.statistics.total_interactive_elements, 10);
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["type"], json!("level"));
        assert_eq!(v["statistics"]["switches"], json!(4));
    }
}
