//! Load a small Super Paper Mario data set through the CRUD service and the procedures.
//! Does nothing when chapters already exist.

use flipside_api::config::ResolvedModel;
use flipside_api::service::procedures::{
    ApplyStatusEffectRequest, BlockSpec, CreateBossRequest, CreateEnemyRequest, CreateQuestRequest,
    PopulateLocationRequest,
};
use flipside_api::service::ListParams;
use flipside_api::{
    apply_migrations, connect, ensure_database_exists, init_tracing, load_embedded, resolve, AppError, CrudService,
    ProcedureService, Settings,
};
use serde_json::{json, Value};
use sqlx::PgPool;

struct Seeder<'a> {
    pool: &'a PgPool,
    model: &'a ResolvedModel,
}

impl Seeder<'_> {
    /// Create one row and return its generated key.
    async fn insert(&self, path: &str, body: Value) -> Result<i32, AppError> {
        let entity = self
            .model
            .entity_by_path(path)
            .ok_or_else(|| AppError::NotFound(format!("unknown entity '{}'", path)))?;
        let body = match body {
            Value::Object(m) => m.into_iter().collect(),
            _ => return Err(AppError::BadRequest("seed rows must be objects".into())),
        };
        let row = CrudService::create(self.pool, entity, body).await?;
        row.get(entity.pk())
            .and_then(Value::as_i64)
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| AppError::Validation(format!("{} row has no integer key", path)))
    }

    async fn is_seeded(&self) -> Result<bool, AppError> {
        let chapters = self
            .model
            .entity_by_path("chapters")
            .ok_or_else(|| AppError::NotFound("unknown entity 'chapters'".into()))?;
        let params = ListParams {
            limit: Some(1),
            ..ListParams::default()
        };
        Ok(!CrudService::list(self.pool, self.model, chapters, &params).await?.is_empty())
    }

    async fn run(&self) -> Result<(), AppError> {
        let lineland = self
            .insert("chapters", json!({"name": "Lineland", "world_number": 1, "description": "A flat, 2D world"}))
            .await?;
        self.insert("chapters", json!({"name": "Gloam Valley", "world_number": 2, "description": "A mysterious valley"}))
            .await?;
        let bitlands = self
            .insert("chapters", json!({"name": "The Bitlands", "world_number": 3, "description": "A pixelated world"}))
            .await?;
        tracing::info!("chapters created");

        let mario = self
            .insert("characters", json!({"name": "Mario", "description": "The hero in red"}))
            .await?;
        let peach = self
            .insert("characters", json!({"name": "Princess Peach", "description": "Princess of the Mushroom Kingdom"}))
            .await?;
        let bowser = self
            .insert("characters", json!({"name": "Bowser", "description": "King of the Koopas"}))
            .await?;
        let luigi = self
            .insert("characters", json!({"name": "Luigi", "description": "Mario's brother in green"}))
            .await?;

        for (character_id, chapter_id, ability) in [
            (mario, lineland, "Flip between dimensions"),
            (peach, lineland, "Float with parasol"),
            (bowser, bitlands, "Breathe fire"),
        ] {
            self.insert(
                "playable-characters",
                json!({"character_id": character_id, "unlock_chapter_id": chapter_id, "special_ability": ability}),
            )
            .await?;
        }

        for (name, ability) in [("Tippi", "Point at hidden objects and enemies"), ("Boomer", "Throw bombs")] {
            self.insert(
                "pixls",
                json!({"name": name, "unlock_chapter_id": lineland, "ability": ability, "is_optional": false}),
            )
            .await?;
        }

        let flipside = self
            .insert(
                "locations",
                json!({"chapter_id": lineland, "name": "Flipside", "type": "hub",
                       "description": "The main hub world between dimensions"}),
            )
            .await?;
        let lineland_road = self
            .insert(
                "locations",
                json!({"chapter_id": lineland, "name": "Lineland Road", "type": "level",
                       "description": "First level of Chapter 1"}),
            )
            .await?;
        let yold_desert = self
            .insert(
                "locations",
                json!({"chapter_id": lineland, "name": "Yold Desert", "type": "dungeon",
                       "description": "Desert area with puzzles"}),
            )
            .await?;
        tracing::info!("locations created");

        for (name, hp, attack, defense, card_score) in [("Goomba", 10, 1, 0, 5), ("Koopa Troopa", 15, 2, 1, 10)] {
            ProcedureService::create_enemy_with_character(
                self.pool,
                &CreateEnemyRequest {
                    name: name.into(),
                    description: Some("Common enemy".into()),
                    hp,
                    attack,
                    defense,
                    card_score,
                },
            )
            .await?;
        }
        ProcedureService::create_boss_with_character(
            self.pool,
            &CreateBossRequest {
                name: "Fracktail".into(),
                description: Some("Chapter 1 boss".into()),
                chapter_id: lineland,
                phase_count: 2,
                special_mechanics: Some("Flying dragon with antenna weak points".into()),
            },
        )
        .await?;

        let mushroom = self
            .insert("items", json!({"name": "Mushroom", "is_key_item": false, "effect": "Restores 10 HP"}))
            .await?;
        let super_mushroom = self
            .insert("items", json!({"name": "Super Mushroom", "is_key_item": false, "effect": "Restores 25 HP"}))
            .await?;
        self.insert("items", json!({"name": "Pure Heart", "is_key_item": true, "effect": "Essential story item"}))
            .await?;

        let poison = self
            .insert("status-effects", json!({"name": "Poison", "effect_type": "debuff", "duration_seconds": 30}))
            .await?;
        self.insert("status-effects", json!({"name": "Mega Star", "effect_type": "buff", "duration_seconds": 20}))
            .await?;

        let door = self
            .insert(
                "navigation-objects",
                json!({"location_id": flipside, "type": "door", "properties": "Leads to Chapter 1"}),
            )
            .await?;
        self.insert(
            "navigation-objects",
            json!({"location_id": flipside, "type": "save_block", "properties": "Save your progress"}),
        )
        .await?;

        ProcedureService::populate_location_with_blocks(
            self.pool,
            &PopulateLocationRequest {
                location_id: lineland_road,
                blocks: vec![BlockSpec {
                    block_type: "breakable".into(),
                    contains_item_id: Some(mushroom),
                    properties: Some("Contains a mushroom".into()),
                }],
            },
        )
        .await?;
        ProcedureService::populate_location_with_blocks(
            self.pool,
            &PopulateLocationRequest {
                location_id: flipside,
                blocks: vec![BlockSpec {
                    block_type: "save".into(),
                    contains_item_id: None,
                    properties: Some("Save block".into()),
                }],
            },
        )
        .await?;

        self.insert(
            "obstacles",
            json!({"location_id": yold_desert, "type": "Spikes", "behavior": "Damages player on contact"}),
        )
        .await?;
        self.insert(
            "objects",
            json!({"location_id": yold_desert, "name": "Treasure Chest", "object_type": "container",
                   "properties": "Contains rare items"}),
        )
        .await?;
        self.insert(
            "switches",
            json!({"location_id": yold_desert, "switch_type": "pressure_plate", "target_navobj_id": door}),
        )
        .await?;

        ProcedureService::create_side_quest_with_characters(
            self.pool,
            &CreateQuestRequest {
                quest_name: "Find Luigi".into(),
                description: Some("Rescue Luigi from his predicament".into()),
                start_location_id: Some(flipside),
                reward_item_id: Some(super_mushroom),
                quest_giver_id: None,
                quest_target_id: Some(luigi),
                quest_helper_ids: None,
                strict: true,
            },
        )
        .await?;
        ProcedureService::apply_status_effect_to_character(
            self.pool,
            &ApplyStatusEffectRequest {
                character_id: mario,
                status_id: poison,
                duration_seconds: None,
            },
        )
        .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing();

    let catalog = load_embedded()?;
    let model = resolve(&catalog)?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = connect(&settings).await?;
    apply_migrations(&pool, &catalog).await?;

    let seeder = Seeder {
        pool: &pool,
        model: &model,
    };
    if seeder.is_seeded().await? {
        tracing::info!("chapters already present, nothing to seed");
        return Ok(());
    }
    seeder.run().await?;
    tracing::info!("sample data loaded");
    Ok(())
}
