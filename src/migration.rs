//! Apply the catalog to the database: DDL for schemas, enums, tables, indexes, foreign keys and views.
//! Every statement is idempotent so startup can run it against an existing database.

use crate::config::types::*;
use crate::config::loader::quote_ident as quote;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::{AppError, ConfigError};
use crate::service::VIEWS;
use sqlx::PgPool;
use std::collections::HashMap;

/// Advisory lock key held while migrating so concurrent instances do not race on DDL.
const MIGRATION_LOCK_KEY: i64 = 0x666c_6970_7369_6465;

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn missing(kind: &'static str, id: &str) -> ConfigError {
    ConfigError::MissingReference {
        kind,
        id: id.to_string(),
    }
}

/// Build the ordered DDL for a catalog: schemas, enums, tables, indexes, foreign keys, then views.
pub fn migration_statements(config: &FullConfig) -> Result<Vec<String>, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_id: HashMap<_, _> = config.columns.iter().map(|c| (c.id.as_str(), c)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config.columns.iter().fold(HashMap::new(), |mut m, c| {
        m.entry(c.table_id.as_str()).or_default().push(c);
        m
    });
    let schema_name = |sid: Option<&str>| schema_of(&schemas_by_id, default_sid, sid);
    let table_full = |t: &TableConfig| -> Result<String, ConfigError> {
        Ok(format!("{}.{}", quote(&schema_name(t.schema_id.as_deref())?), quote(&t.name)))
    };

    let mut enum_types: HashMap<&str, String> = HashMap::new();
    for e in &config.enums {
        let schema = schema_name(e.schema_id.as_deref())?;
        enum_types.insert(e.name.as_str(), format!("{}.{}", quote(&schema), quote(&e.name)));
    }

    let mut out = Vec::new();

    for s in &config.schemas {
        out.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quote(&s.name)));
        if let Some(c) = &s.comment {
            out.push(format!("COMMENT ON SCHEMA {} IS {}", quote(&s.name), literal(c)));
        }
    }

    for e in &config.enums {
        let schema = schema_name(e.schema_id.as_deref())?;
        let values: Vec<String> = e.values.iter().map(|v| literal(v)).collect();
        out.push(format!(
            "DO $$ BEGIN \
             IF NOT EXISTS (SELECT 1 FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE t.typname = {} AND n.nspname = {}) THEN \
             CREATE TYPE {}.{} AS ENUM ({}); \
             END IF; END $$",
            literal(&e.name),
            literal(&schema),
            quote(&schema),
            quote(&e.name),
            values.join(", ")
        ));
    }

    for t in &config.tables {
        let cols = columns_by_table.get(t.id.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
        let mut col_defs: Vec<String> = Vec::new();
        for c in cols {
            let typ = type_str(&c.type_, &enum_types);
            let mut def = format!("{} {}", quote(&c.name), typ);
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(ref d) = c.default {
                def.push_str(" DEFAULT ");
                match d {
                    ColumnDefaultConfig::Literal(s) => def.push_str(s),
                    ColumnDefaultConfig::Expression { expression } => def.push_str(expression),
                }
            }
            col_defs.push(def);
        }

        let pk_cols: Vec<String> = t.primary_key.columns().into_iter().map(quote).collect();
        col_defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
        for u in &t.unique {
            let cols: Vec<String> = u.iter().map(|s| quote(s)).collect();
            col_defs.push(format!("UNIQUE ({})", cols.join(", ")));
        }
        for ch in &t.check {
            col_defs.push(format!("CONSTRAINT {} CHECK ({})", quote(&ch.name), ch.expression));
        }

        out.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            table_full(t)?,
            col_defs.join(",\n  ")
        ));
    }

    for idx in &config.indexes {
        let table = tables_by_id
            .get(idx.table_id.as_str())
            .ok_or_else(|| missing("table", &idx.table_id))?;
        let cols: Vec<String> = idx.columns.iter().map(|c| quote(c)).collect();
        out.push(format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if idx.unique { "UNIQUE " } else { "" },
            quote(&idx.name),
            table_full(table)?,
            cols.join(", ")
        ));
    }

    for rel in &config.relationships {
        let from_table = tables_by_id
            .get(rel.from_table_id.as_str())
            .ok_or_else(|| missing("table", &rel.from_table_id))?;
        let to_table = tables_by_id
            .get(rel.to_table_id.as_str())
            .ok_or_else(|| missing("table", &rel.to_table_id))?;
        let from_col = columns_by_id
            .get(rel.from_column_id.as_str())
            .ok_or_else(|| missing("column", &rel.from_column_id))?;
        let to_col = columns_by_id
            .get(rel.to_column_id.as_str())
            .ok_or_else(|| missing("column", &rel.to_column_id))?;
        let on_delete = rel.on_delete.as_deref().unwrap_or("NO ACTION");
        out.push(format!(
            "DO $$ BEGIN \
             IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = {}) THEN \
             ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}; \
             END IF; END $$",
            literal(rel.constraint_name()),
            table_full(from_table)?,
            quote(rel.constraint_name()),
            quote(&from_col.name),
            table_full(to_table)?,
            quote(&to_col.name),
            on_delete
        ));
    }

    for v in VIEWS {
        out.push(v.drop_sql());
        out.push(v.create_sql());
    }

    Ok(out)
}

fn schema_of(
    schemas_by_id: &HashMap<&str, &SchemaConfig>,
    default_sid: &str,
    sid: Option<&str>,
) -> Result<String, ConfigError> {
    let sid = sid.unwrap_or(default_sid);
    schemas_by_id
        .get(sid)
        .map(|s| s.name.clone())
        .ok_or_else(|| missing("schema", sid))
}

fn type_str(ty: &ColumnTypeConfig, enum_types: &HashMap<&str, String>) -> String {
    match ty {
        ColumnTypeConfig::Simple(s) => enum_types
            .get(s.as_str())
            .cloned()
            .unwrap_or_else(|| s.to_uppercase()),
        ColumnTypeConfig::Parameterized { name, params } => {
            let p = params
                .as_ref()
                .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            if p.is_empty() {
                name.to_uppercase()
            } else {
                format!("{}({})", name.to_uppercase(), p)
            }
        }
    }
}

/// Apply the catalog under a session-level advisory lock, all statements on one connection.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    let statements = migration_statements(config)?;
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let mut result = Ok(());
    for sql in &statements {
        tracing::debug!(sql = %sql, "migration");
        if let Err(e) = sqlx::query(sql).execute(&mut *conn).await {
            result = Err(AppError::Db(e));
            break;
        }
    }

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    result?;
    tracing::info!(statements = statements.len(), "migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_embedded;

    fn statements() -> Vec<String> {
        migration_statements(&load_embedded().unwrap()).unwrap()
    }

    #[test]
    fn creates_enums_before_tables_and_views_last() {
        let stmts = statements();
        let first_enum = stmts.iter().position(|s| s.contains("CREATE TYPE")).unwrap();
        let first_table = stmts.iter().position(|s| s.starts_with("CREATE TABLE")).unwrap();
        let first_fk = stmts.iter().position(|s| s.contains("FOREIGN KEY")).unwrap();
        let first_view = stmts.iter().position(|s| s.starts_with("CREATE VIEW")).unwrap();
        assert!(first_enum < first_table);
        assert!(first_table < first_fk);
        assert!(first_fk < first_view);
        assert!(stmts.last().unwrap().starts_with("CREATE VIEW chapter_statistics"));
    }

    #[test]
    fn table_ddl_carries_keys_checks_and_defaults() {
        let stmts = statements();
        let enemies = stmts
            .iter()
            .find(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"enemies\""))
            .unwrap();
        assert!(enemies.contains("\"enemy_id\" SERIAL NOT NULL"));
        assert!(enemies.contains("\"card_score\" INTEGER NOT NULL DEFAULT 0"));
        assert!(enemies.contains("CONSTRAINT \"check_enemy_hp_positive\" CHECK (hp > 0)"));
        assert!(enemies.contains("PRIMARY KEY (\"enemy_id\")"));

        let effects = stmts
            .iter()
            .find(|s| s.contains("\"character_status_effects\" ("))
            .unwrap();
        assert!(effects.contains("PRIMARY KEY (\"character_id\", \"status_id\")"));
        assert!(effects.contains("DEFAULT (NOW() AT TIME ZONE 'utc')"));

        let blocks = stmts.iter().find(|s| s.contains("\"blocks_containers\" (")).unwrap();
        assert!(blocks.contains("\"block_type\" \"public\".\"block_type\" NOT NULL"));
    }

    #[test]
    fn foreign_keys_are_guarded_and_carry_delete_rules() {
        let stmts = statements();
        let fk = stmts
            .iter()
            .find(|s| s.contains("'fk_blocks_containers_contains_item_id'"))
            .unwrap();
        assert!(fk.contains("IF NOT EXISTS (SELECT 1 FROM pg_constraint"));
        assert!(fk.contains("ON DELETE SET NULL"));
        let fk = stmts.iter().find(|s| s.contains("'fk_locations_chapter_id'")).unwrap();
        assert!(fk.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn every_statement_is_rerunnable() {
        for s in statements() {
            assert!(
                s.contains("IF NOT EXISTS")
                    || s.contains("IF EXISTS")
                    || s.starts_with("CREATE VIEW")
                    || s.starts_with("COMMENT ON"),
                "not idempotent: {}",
                s
            );
        }
    }
}
