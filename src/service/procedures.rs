//! Multi-step writes that must land together. Each operation validates its references first,
//! then writes inside one transaction; an error drops the transaction, which rolls it back.

use crate::error::AppError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnemyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub card_score: i32,
}

impl CreateEnemyRequest {
    pub fn check(&self) -> Result<(), AppError> {
        check_name("name", &self.name, 100)?;
        check_at_least("hp", self.hp, 1)?;
        check_at_least("attack", self.attack, 0)?;
        check_at_least("defense", self.defense, 0)?;
        check_at_least("card_score", self.card_score, 0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateEnemyResult {
    pub success: bool,
    pub character_id: i32,
    pub enemy_id: i32,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBossRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub chapter_id: i32,
    pub phase_count: i32,
    #[serde(default)]
    pub special_mechanics: Option<String>,
}

impl CreateBossRequest {
    pub fn check(&self) -> Result<(), AppError> {
        check_name("name", &self.name, 100)?;
        check_at_least("phase_count", self.phase_count, 1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBossResult {
    pub success: bool,
    pub character_id: i32,
    pub boss_id: i32,
    pub chapter: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestRequest {
    pub quest_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_location_id: Option<i32>,
    #[serde(default)]
    pub reward_item_id: Option<i32>,
    #[serde(default)]
    pub quest_giver_id: Option<i32>,
    #[serde(default)]
    pub quest_target_id: Option<i32>,
    #[serde(default)]
    pub quest_helper_ids: Option<Vec<i32>>,
    /// Fail instead of skipping character ids that do not resolve.
    #[serde(default)]
    pub strict: bool,
}

impl CreateQuestRequest {
    pub fn check(&self) -> Result<(), AppError> {
        check_name("quest_name", &self.quest_name, 100)
    }

    /// Requested (character_id, role) pairs in insertion order: giver, target, then helpers.
    pub fn roles(&self) -> Vec<(i32, &'static str)> {
        let mut out = Vec::new();
        if let Some(id) = self.quest_giver_id {
            out.push((id, "giver"));
        }
        if let Some(id) = self.quest_target_id {
            out.push((id, "target"));
        }
        for id in self.quest_helper_ids.iter().flatten() {
            out.push((*id, "helper"));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestCharacterAdded {
    pub character_id: i32,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateQuestResult {
    pub success: bool,
    pub quest_id: i32,
    pub quest_name: String,
    pub characters_added: Vec<QuestCharacterAdded>,
    pub skipped_character_ids: Vec<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyStatusEffectRequest {
    pub character_id: i32,
    pub status_id: i32,
    /// Defaults to the status effect's own duration.
    #[serde(default)]
    pub duration_seconds: Option<i32>,
}

impl ApplyStatusEffectRequest {
    pub fn check(&self) -> Result<(), AppError> {
        match self.duration_seconds {
            Some(d) if d <= 0 => Err(AppError::Validation(
                "duration_seconds must be greater than 0".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyStatusEffectResult {
    pub success: bool,
    pub character_name: String,
    pub status_name: String,
    pub effect_type: String,
    pub applied_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub action: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockSpec {
    pub block_type: String,
    #[serde(default)]
    pub contains_item_id: Option<i32>,
    #[serde(default)]
    pub properties: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulateLocationRequest {
    pub location_id: i32,
    pub blocks: Vec<BlockSpec>,
}

impl PopulateLocationRequest {
    /// Distinct referenced item ids, sorted.
    pub fn item_ids(&self) -> Vec<i32> {
        self.blocks
            .iter()
            .filter_map(|b| b.contains_item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CreatedBlock {
    pub block_id: i32,
    pub block_type: String,
    pub contains_item_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateLocationResult {
    pub success: bool,
    pub location_name: String,
    pub blocks_created: usize,
    pub blocks: Vec<CreatedBlock>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferItemRequest {
    pub from_block_id: i32,
    pub to_block_id: i32,
}

impl TransferItemRequest {
    pub fn check(&self) -> Result<(), AppError> {
        if self.from_block_id == self.to_block_id {
            return Err(AppError::Validation(
                "Source and destination blocks must differ".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferItemResult {
    pub success: bool,
    pub item_id: i32,
    pub item_name: String,
    pub from_block_id: i32,
    pub to_block_id: i32,
    pub replaced_item_id: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterRow {
    pub chapter_id: i32,
    pub name: String,
    pub world_number: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterLocation {
    pub location_id: i32,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub location_type: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterBoss {
    pub boss_id: i32,
    pub name: String,
    pub phase_count: i32,
    pub special_mechanics: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterPixl {
    pub pixl_id: i32,
    pub name: String,
    pub ability: Option<String>,
    pub is_optional: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterPlayableCharacter {
    pub character_id: i32,
    pub name: String,
    pub special_ability: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterStatistics {
    pub total_locations: usize,
    pub total_bosses: usize,
    pub total_pixls: usize,
    pub total_playable_characters: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterInfo {
    pub success: bool,
    pub chapter: ChapterRow,
    pub locations: Vec<ChapterLocation>,
    pub bosses: Vec<ChapterBoss>,
    pub pixls: Vec<ChapterPixl>,
    pub playable_characters: Vec<ChapterPlayableCharacter>,
    pub statistics: ChapterStatistics,
}

fn check_name(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

fn check_at_least(field: &str, value: i32, min: i32) -> Result<(), AppError> {
    if value < min {
        return Err(AppError::Validation(format!("{} must be at least {}", field, min)));
    }
    Ok(())
}

/// Log a failed transactional operation; the transaction itself was rolled back on drop.
fn rolled_back(procedure: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |e| {
        tracing::warn!(procedure, error = %e, "transaction rolled back");
        e
    }
}

async fn character_name(conn: &mut PgConnection, id: i32) -> Result<Option<String>, AppError> {
    Ok(sqlx::query_scalar("SELECT name FROM characters WHERE character_id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

async fn insert_character(conn: &mut PgConnection, name: &str, description: Option<&str>) -> Result<i32, AppError> {
    Ok(
        sqlx::query_scalar("INSERT INTO characters (name, description) VALUES ($1, $2) RETURNING character_id")
            .bind(name)
            .bind(description)
            .fetch_one(conn)
            .await?,
    )
}

pub struct ProcedureService;

impl ProcedureService {
    /// Character and enemy in one commit.
    pub async fn create_enemy_with_character(
        pool: &PgPool,
        req: &CreateEnemyRequest,
    ) -> Result<CreateEnemyResult, AppError> {
        req.check()?;
        let (character_id, enemy_id) = async {
            let mut tx = pool.begin().await?;
            let character_id = insert_character(&mut tx, &req.name, req.description.as_deref()).await?;
            let enemy_id: i32 = sqlx::query_scalar(
                "INSERT INTO enemies (character_id, hp, attack, defense, card_score) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING enemy_id",
            )
            .bind(character_id)
            .bind(req.hp)
            .bind(req.attack)
            .bind(req.defense)
            .bind(req.card_score)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, AppError>((character_id, enemy_id))
        }
        .await
        .map_err(rolled_back("create_enemy_with_character"))?;

        tracing::info!(character_id, enemy_id, "enemy created");
        Ok(CreateEnemyResult {
            success: true,
            character_id,
            enemy_id,
            message: format!("Enemy '{}' created successfully", req.name),
        })
    }

    /// Character and boss in one commit; the chapter must exist before anything is written.
    pub async fn create_boss_with_character(
        pool: &PgPool,
        req: &CreateBossRequest,
    ) -> Result<CreateBossResult, AppError> {
        req.check()?;
        let (character_id, boss_id, chapter) = async {
            let mut tx = pool.begin().await?;
            let chapter: Option<String> = sqlx::query_scalar("SELECT name FROM chapters WHERE chapter_id = $1")
                .bind(req.chapter_id)
                .fetch_optional(&mut *tx)
                .await?;
            let chapter =
                chapter.ok_or_else(|| AppError::Validation(format!("Chapter {} not found", req.chapter_id)))?;
            let character_id = insert_character(&mut tx, &req.name, req.description.as_deref()).await?;
            let boss_id: i32 = sqlx::query_scalar(
                "INSERT INTO bosses (character_id, chapter_id, phase_count, special_mechanics) \
                 VALUES ($1, $2, $3, $4) RETURNING boss_id",
            )
            .bind(character_id)
            .bind(req.chapter_id)
            .bind(req.phase_count)
            .bind(req.special_mechanics.as_deref())
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, AppError>((character_id, boss_id, chapter))
        }
        .await
        .map_err(rolled_back("create_boss_with_character"))?;

        tracing::info!(character_id, boss_id, chapter = %chapter, "boss created");
        Ok(CreateBossResult {
            success: true,
            character_id,
            boss_id,
            message: format!("Boss '{}' created in {}", req.name, chapter),
            chapter,
        })
    }

    /// Quest plus one role row per resolvable character. Unknown characters are skipped and
    /// reported unless the request is strict.
    pub async fn create_side_quest_with_characters(
        pool: &PgPool,
        req: &CreateQuestRequest,
    ) -> Result<CreateQuestResult, AppError> {
        req.check()?;
        let (quest_id, added, skipped) = async {
            let mut tx = pool.begin().await?;
            if let Some(id) = req.start_location_id {
                let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM locations WHERE location_id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                if !found {
                    return Err(AppError::Validation(format!("Location {} not found", id)));
                }
            }
            if let Some(id) = req.reward_item_id {
                let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE item_id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                if !found {
                    return Err(AppError::Validation(format!("Item {} not found", id)));
                }
            }

            let quest_id: i32 = sqlx::query_scalar(
                "INSERT INTO side_quests (name, description, start_location_id, reward_item_id) \
                 VALUES ($1, $2, $3, $4) RETURNING quest_id",
            )
            .bind(&req.quest_name)
            .bind(req.description.as_deref())
            .bind(req.start_location_id)
            .bind(req.reward_item_id)
            .fetch_one(&mut *tx)
            .await?;

            let mut added = Vec::new();
            let mut skipped = Vec::new();
            for (character_id, role) in req.roles() {
                let Some(name) = character_name(&mut tx, character_id).await? else {
                    if req.strict {
                        return Err(AppError::Validation(format!("Character {} not found", character_id)));
                    }
                    skipped.push(character_id);
                    continue;
                };
                sqlx::query("INSERT INTO quest_character (quest_id, character_id, role) VALUES ($1, $2, $3::quest_role)")
                    .bind(quest_id)
                    .bind(character_id)
                    .bind(role)
                    .execute(&mut *tx)
                    .await?;
                added.push(QuestCharacterAdded {
                    character_id,
                    name,
                    role: role.to_string(),
                });
            }
            tx.commit().await?;
            Ok::<_, AppError>((quest_id, added, skipped))
        }
        .await
        .map_err(rolled_back("create_side_quest_with_characters"))?;

        if !skipped.is_empty() {
            tracing::debug!(quest_id, ?skipped, "skipped unknown quest characters");
        }
        tracing::info!(quest_id, characters = added.len(), "side quest created");
        Ok(CreateQuestResult {
            success: true,
            quest_id,
            quest_name: req.quest_name.clone(),
            message: format!("Quest '{}' created with {} characters", req.quest_name, added.len()),
            characters_added: added,
            skipped_character_ids: skipped,
        })
    }

    /// Insert the (character, status) pair or refresh its expiry. `applied_at` survives a refresh.
    pub async fn apply_status_effect_to_character(
        pool: &PgPool,
        req: &ApplyStatusEffectRequest,
    ) -> Result<ApplyStatusEffectResult, AppError> {
        req.check()?;
        let result = async {
            let mut tx = pool.begin().await?;
            let character = character_name(&mut tx, req.character_id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Character {} not found", req.character_id)))?;
            let status: Option<(String, String, i32)> = sqlx::query_as(
                "SELECT name, effect_type::text, duration_seconds FROM status_effects WHERE status_id = $1",
            )
            .bind(req.status_id)
            .fetch_optional(&mut *tx)
            .await?;
            let (status_name, effect_type, default_duration) =
                status.ok_or_else(|| AppError::Validation(format!("Status effect {} not found", req.status_id)))?;

            let duration = req.duration_seconds.unwrap_or(default_duration);
            let now = chrono::Utc::now().naive_utc();
            let expires_at = now + chrono::Duration::seconds(i64::from(duration));
            let (applied_at, expires_at, inserted): (NaiveDateTime, NaiveDateTime, bool) = sqlx::query_as(
                "INSERT INTO character_status_effects (character_id, status_id, applied_at, expires_at) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (character_id, status_id) DO UPDATE SET expires_at = EXCLUDED.expires_at \
                 RETURNING applied_at, expires_at, (xmax = 0) AS inserted",
            )
            .bind(req.character_id)
            .bind(req.status_id)
            .bind(now)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;

            let action = if inserted { "applied" } else { "updated" };
            Ok::<_, AppError>(ApplyStatusEffectResult {
                success: true,
                message: format!("Status '{}' {} to '{}'", status_name, action, character),
                character_name: character,
                status_name,
                effect_type,
                applied_at,
                expires_at,
                action: action.to_string(),
            })
        }
        .await
        .map_err(rolled_back("apply_status_effect_to_character"))?;

        tracing::info!(
            character_id = req.character_id,
            status_id = req.status_id,
            action = %result.action,
            "status effect applied"
        );
        Ok(result)
    }

    /// All blocks or none: every referenced item is validated in one query before the first insert.
    pub async fn populate_location_with_blocks(
        pool: &PgPool,
        req: &PopulateLocationRequest,
    ) -> Result<PopulateLocationResult, AppError> {
        let (location_name, blocks) = async {
            let mut tx = pool.begin().await?;
            let location: Option<String> = sqlx::query_scalar("SELECT name FROM locations WHERE location_id = $1")
                .bind(req.location_id)
                .fetch_optional(&mut *tx)
                .await?;
            let location =
                location.ok_or_else(|| AppError::Validation(format!("Location {} not found", req.location_id)))?;

            let item_ids = req.item_ids();
            if !item_ids.is_empty() {
                let found: Vec<i32> = sqlx::query_scalar("SELECT item_id FROM items WHERE item_id = ANY($1)")
                    .bind(&item_ids)
                    .fetch_all(&mut *tx)
                    .await?;
                let found: BTreeSet<i32> = found.into_iter().collect();
                let invalid: Vec<i32> = item_ids.iter().copied().filter(|id| !found.contains(id)).collect();
                if !invalid.is_empty() {
                    return Err(AppError::Validation(format!("Invalid item IDs: {:?}", invalid)));
                }
            }

            let mut blocks = Vec::with_capacity(req.blocks.len());
            for spec in &req.blocks {
                let block: CreatedBlock = sqlx::query_as(
                    "INSERT INTO blocks_containers (location_id, block_type, contains_item_id, properties) \
                     VALUES ($1, $2::block_type, $3, $4) \
                     RETURNING block_id, block_type::text AS block_type, contains_item_id",
                )
                .bind(req.location_id)
                .bind(&spec.block_type)
                .bind(spec.contains_item_id)
                .bind(spec.properties.as_deref())
                .fetch_one(&mut *tx)
                .await?;
                blocks.push(block);
            }
            tx.commit().await?;
            Ok::<_, AppError>((location, blocks))
        }
        .await
        .map_err(rolled_back("populate_location_with_blocks"))?;

        tracing::info!(location_id = req.location_id, blocks = blocks.len(), "location populated");
        Ok(PopulateLocationResult {
            success: true,
            message: format!("Created {} blocks in '{}'", blocks.len(), location_name),
            location_name,
            blocks_created: blocks.len(),
            blocks,
        })
    }

    /// Move the item reference from one block to another. Both rows are locked for the duration.
    pub async fn transfer_item_between_blocks(
        pool: &PgPool,
        req: &TransferItemRequest,
    ) -> Result<TransferItemResult, AppError> {
        req.check()?;
        let (item_id, item_name, replaced) = async {
            let mut tx = pool.begin().await?;
            let rows: Vec<(i32, Option<i32>)> = sqlx::query_as(
                "SELECT block_id, contains_item_id FROM blocks_containers \
                 WHERE block_id = ANY($1) ORDER BY block_id FOR UPDATE",
            )
            .bind(vec![req.from_block_id, req.to_block_id])
            .fetch_all(&mut *tx)
            .await?;
            let find = |id: i32| rows.iter().find(|(b, _)| *b == id).map(|(_, item)| *item);
            let source = find(req.from_block_id)
                .ok_or_else(|| AppError::Validation(format!("Source block {} not found", req.from_block_id)))?;
            let replaced = find(req.to_block_id).ok_or_else(|| {
                AppError::Validation(format!("Destination block {} not found", req.to_block_id))
            })?;
            let item_id = source.ok_or_else(|| AppError::Validation("Source block has no item".into()))?;

            let item_name: Option<String> = sqlx::query_scalar("SELECT name FROM items WHERE item_id = $1")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
            sqlx::query("UPDATE blocks_containers SET contains_item_id = NULL WHERE block_id = $1")
                .bind(req.from_block_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE blocks_containers SET contains_item_id = $1 WHERE block_id = $2")
                .bind(item_id)
                .bind(req.to_block_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, AppError>((item_id, item_name.unwrap_or_else(|| "Unknown".into()), replaced))
        }
        .await
        .map_err(rolled_back("transfer_item_between_blocks"))?;

        tracing::info!(
            item_id,
            from = req.from_block_id,
            to = req.to_block_id,
            "item transferred"
        );
        Ok(TransferItemResult {
            success: true,
            item_id,
            item_name,
            from_block_id: req.from_block_id,
            to_block_id: req.to_block_id,
            replaced_item_id: replaced,
            message: format!(
                "Item transferred from block {} to {}",
                req.from_block_id, req.to_block_id
            ),
        })
    }

    /// Chapter with its locations, bosses, pixls and playable characters.
    pub async fn get_chapter_complete_info(pool: &PgPool, chapter_id: i32) -> Result<ChapterInfo, AppError> {
        let chapter: ChapterRow = sqlx::query_as(
            "SELECT chapter_id, name, world_number, description FROM chapters WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chapter {} not found", chapter_id)))?;

        let locations: Vec<ChapterLocation> = sqlx::query_as(
            "SELECT location_id, name, type::text AS type FROM locations WHERE chapter_id = $1 ORDER BY location_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;
        let bosses: Vec<ChapterBoss> = sqlx::query_as(
            "SELECT b.boss_id, c.name, b.phase_count, b.special_mechanics \
             FROM bosses b JOIN characters c ON b.character_id = c.character_id \
             WHERE b.chapter_id = $1 ORDER BY b.boss_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;
        let pixls: Vec<ChapterPixl> = sqlx::query_as(
            "SELECT pixl_id, name, ability, is_optional FROM pixls WHERE unlock_chapter_id = $1 ORDER BY pixl_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;
        let playable_characters: Vec<ChapterPlayableCharacter> = sqlx::query_as(
            "SELECT pc.character_id, c.name, pc.special_ability \
             FROM playable_characters pc JOIN characters c ON pc.character_id = c.character_id \
             WHERE pc.unlock_chapter_id = $1 ORDER BY pc.character_id",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await?;

        Ok(ChapterInfo {
            success: true,
            statistics: ChapterStatistics {
                total_locations: locations.len(),
                total_bosses: bosses.len(),
                total_pixls: pixls.len(),
                total_playable_characters: playable_characters.len(),
            },
            chapter,
            locations,
            bosses,
            pixls,
            playable_characters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enemy(hp: i32, card_score: i32) -> CreateEnemyRequest {
        CreateEnemyRequest {
            name: "Squiglet".into(),
            description: None,
            hp,
            attack: 1,
            defense: 0,
            card_score,
        }
    }

    #[test]
    fn enemy_stats_match_table_checks() {
        assert!(enemy(1, 0).check().is_ok());
        assert!(matches!(enemy(0, 5).check(), Err(AppError::Validation(_))));
        assert!(enemy(5, -1).check().is_err());
        let mut long = enemy(5, 5);
        long.name = "n".repeat(101);
        assert!(long.check().is_err());
        long.name = String::new();
        assert!(long.check().is_err());
    }

    #[test]
    fn quest_roles_keep_request_order() {
        let req: CreateQuestRequest = serde_json::from_value(json!({
            "quest_name": "Lost Keys",
            "quest_giver_id": 3,
            "quest_helper_ids": [7, 8],
            "quest_target_id": 4
        }))
        .unwrap();
        assert!(!req.strict);
        assert_eq!(
            req.roles(),
            vec![(3, "giver"), (4, "target"), (7, "helper"), (8, "helper")]
        );
    }

    #[test]
    fn status_duration_is_optional_but_positive() {
        let req: ApplyStatusEffectRequest =
            serde_json::from_value(json!({"character_id": 1, "status_id": 2})).unwrap();
        assert_eq!(req.duration_seconds, None);
        assert!(req.check().is_ok());
        let req = ApplyStatusEffectRequest {
            duration_seconds: Some(0),
            ..req
        };
        assert!(req.check().is_err());
    }

    #[test]
    fn block_item_ids_are_deduplicated_and_sorted() {
        let req: PopulateLocationRequest = serde_json::from_value(json!({
            "location_id": 1,
            "blocks": [
                {"block_type": "star", "contains_item_id": 9},
                {"block_type": "save"},
                {"block_type": "breakable", "contains_item_id": 2},
                {"block_type": "movable", "contains_item_id": 9}
            ]
        }))
        .unwrap();
        assert_eq!(req.item_ids(), vec![2, 9]);
    }

    #[test]
    fn transfer_to_same_block_is_rejected() {
        let req = TransferItemRequest {
            from_block_id: 4,
            to_block_id: 4,
        };
        assert!(matches!(req.check(), Err(AppError::Validation(_))));
    }

    #[test]
    fn chapter_location_serializes_type_field() {
        let loc = ChapterLocation {
            location_id: 1,
            name: "Flipside Tower".into(),
            location_type: "hub".into(),
        };
        assert_eq!(
            serde_json::to_value(&loc).unwrap(),
            json!({"location_id": 1, "name": "Flipside Tower", "type": "hub"})
        );
    }
}
