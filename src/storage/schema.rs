use rusqlite::Connection;

/// Nullable columns every table must carry, in addition to its key.
/// Databases created by older releases are patched up to this list on open.
pub const EXPECTED_COLUMNS: &[(&str, &[(&str, &str)])] = &[
    (
        "daily_metrics_cache",
        &[
            ("resting_heart_rate", "INTEGER"),
            ("steps", "INTEGER"),
            ("weight", "REAL"),
            ("body_fat", "REAL"),
            ("spo2", "REAL"),
            ("calories", "INTEGER"),
            ("distance", "REAL"),
            ("floors", "INTEGER"),
            ("fat_burn_minutes", "INTEGER"),
            ("cardio_minutes", "INTEGER"),
            ("peak_minutes", "INTEGER"),
            ("active_zone_minutes", "INTEGER"),
            ("last_updated", "TIMESTAMP"),
        ],
    ),
    (
        "sleep_cache",
        &[
            ("sleep_score", "INTEGER"),
            ("reality_score", "INTEGER"),
            ("efficiency", "INTEGER"),
            ("total_sleep", "INTEGER"),
            ("deep_minutes", "INTEGER"),
            ("light_minutes", "INTEGER"),
            ("rem_minutes", "INTEGER"),
            ("wake_minutes", "INTEGER"),
            ("start_time", "TEXT"),
            ("sleep_data_json", "TEXT"),
            ("last_updated", "TIMESTAMP"),
        ],
    ),
    (
        "advanced_metrics_cache",
        &[
            ("hrv", "REAL"),
            ("breathing_rate", "REAL"),
            ("temperature", "REAL"),
            ("last_updated", "TIMESTAMP"),
        ],
    ),
    (
        "cardio_fitness_cache",
        &[("vo2_max", "REAL"), ("last_updated", "TIMESTAMP")],
    ),
    (
        "activities_cache",
        &[
            ("activity_name", "TEXT"),
            ("duration_ms", "INTEGER"),
            ("calories", "INTEGER"),
            ("average_heart_rate", "INTEGER"),
            ("steps", "INTEGER"),
            ("distance", "REAL"),
            ("start_time", "TEXT"),
            ("activity_data_json", "TEXT"),
            ("last_updated", "TIMESTAMP"),
        ],
    ),
    (
        "cache_metadata",
        &[("value", "TEXT"), ("last_updated", "TIMESTAMP")],
    ),
];

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Columns of `table` in declaration order. Empty if the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\"")))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(1)?,
            data_type: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// User tables, alphabetically.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Add a nullable column. Returns `Ok(false)` when the column already exists.
pub fn add_column(
    conn: &Connection,
    table: &str,
    column: &str,
    sql_type: &str,
) -> Result<bool, rusqlite::Error> {
    match conn.execute(
        &format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"),
        [],
    ) {
        Ok(_) => Ok(true),
        Err(e) if e.to_string().contains("duplicate column name") => Ok(false),
        Err(e) => Err(e),
    }
}

/// Bring every existing table up to `EXPECTED_COLUMNS` without touching rows.
/// Tables that do not exist yet are left to the migrations.
/// Returns the number of columns added.
pub fn patch_columns(conn: &Connection) -> Result<usize, rusqlite::Error> {
    let mut added = 0;
    for (table, columns) in EXPECTED_COLUMNS {
        let existing: Vec<String> = table_columns(conn, table)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        if existing.is_empty() {
            continue;
        }
        for (column, sql_type) in *columns {
            if existing.iter().any(|c| c == column) {
                continue;
            }
            if add_column(conn, table, column, sql_type)? {
                log::info!("Added column {table}.{column} ({sql_type})");
                added += 1;
            }
        }
    }
    Ok(added)
}
