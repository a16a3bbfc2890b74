use sqlx::PgPool;

/// Full bootstrap: connect, migrate, health check, expected tables present.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    curriculum_db::health_check(&pool).await.unwrap();

    for table in ["curriculums", "nodes", "node_contents", "node_links"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// All `id` columns must be bigint.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_pks_are_bigint(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert_eq!(data_type, "bigint", "Table {table}.id should be bigint");
    }
}

/// Every table must carry created_at, updated_at and deleted_at as timestamptz.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name
         FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table,) in &tables {
        for col in ["created_at", "updated_at", "deleted_at"] {
            let result: Option<(String,)> = sqlx::query_as(&format!(
                "SELECT data_type
                 FROM information_schema.columns
                 WHERE table_schema = 'public'
                   AND table_name = '{table}'
                   AND column_name = '{col}'"
            ))
            .fetch_optional(&pool)
            .await
            .unwrap();

            let (data_type,) =
                result.unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(
                data_type, "timestamp with time zone",
                "Table {table}.{col} should be timestamptz, got {data_type}"
            );
        }
    }
}

/// No character varying columns should exist; TEXT is preferred.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_no_varchar_columns(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, column_name
         FROM information_schema.columns
         WHERE table_schema = 'public'
           AND data_type = 'character varying'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name, column_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(
        rows.is_empty(),
        "Found VARCHAR columns (should use TEXT): {:?}",
        rows
    );
}

/// Every foreign key column must lead some index.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_fks_have_indexes(pool: PgPool) {
    let fk_columns: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT
             tc.table_name,
             kcu.column_name
         FROM information_schema.table_constraints tc
         JOIN information_schema.key_column_usage kcu
             ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
         WHERE tc.constraint_type = 'FOREIGN KEY'
           AND tc.table_schema = 'public'
         ORDER BY tc.table_name, kcu.column_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table, column) in &fk_columns {
        let has_index: (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (
                SELECT 1
                FROM pg_indexes
                WHERE schemaname = 'public'
                  AND tablename = '{table}'
                  AND indexdef LIKE '%({column}%'
            )"
        ))
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(has_index.0, "FK column {table}.{column} has no index");
    }
}

/// Rows are soft-deleted, so no foreign key may cascade a hard delete.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fks_restrict_deletes(pool: PgPool) {
    let rules: Vec<(String, String)> = sqlx::query_as(
        "SELECT constraint_name, delete_rule
         FROM information_schema.referential_constraints
         WHERE constraint_schema = 'public'
         ORDER BY constraint_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rules.is_empty(), "Expected at least one FK constraint");
    for (name, rule) in &rules {
        assert_eq!(rule, "RESTRICT", "FK {name} should be ON DELETE RESTRICT");
    }
}

/// The active-sibling ordering index must be unique and partial.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_sibling_order_index_is_partial_unique(pool: PgPool) {
    let (indexdef,): (String,) = sqlx::query_as(
        "SELECT indexdef FROM pg_indexes
         WHERE schemaname = 'public' AND indexname = 'uq_nodes_active_sibling_order'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert!(indexdef.starts_with("CREATE UNIQUE INDEX"), "{indexdef}");
    assert!(indexdef.contains("WHERE (deleted_at IS NULL)"), "{indexdef}");
}

/// `updated_at` is maintained by trigger on every table.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_updated_at_triggers(pool: PgPool) {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT event_object_table::text
         FROM information_schema.triggers
         WHERE trigger_schema = 'public'
           AND action_statement LIKE '%trigger_set_updated_at%'
         ORDER BY 1",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    let tables: Vec<&str> = rows.iter().map(|(t,)| t.as_str()).collect();
    assert_eq!(tables, vec!["curriculums", "node_contents", "node_links", "nodes"]);
}
