use pbkdf2_rehash::{
    HashDetector, Migration, MigrationConfig, MigrationRunner, SqliteStore,
};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // You have an old user table, for example from a PHP CMS, where some passwords
    // were stored in plaintext and others with whatever hash was fashionable at the time
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        r#"
        CREATE TABLE fe_users (uid INTEGER PRIMARY KEY, password TEXT, disable INTEGER NOT NULL DEFAULT 0);
        INSERT INTO fe_users (uid, password, disable) VALUES
            (1, 'hunter2', 0),
            (2, '$P$CabcdefghABCDEFGHIJKLMNOPQRSTUV', 0),
            (3, '', 0),
            (4, 'correct horse battery staple', 1),
            (5, '$2b$04$EGdrhbKUv8Oc9vGiXX0HQOxSg445d458Muh7DAHskb6QbtCvdxcie', 0);
        "#,
    )?;

    // Low round count so the demo finishes quickly, use the default in production
    let config = MigrationConfig::from_toml(
        r#"
        refresh_if_stale = true

        [hash]
        rounds = 10000
        "#,
    )?;

    let store = SqliteStore::new(conn, config.table.clone())?;
    let runner = MigrationRunner::from_config(&store, &config)?;

    let check = runner.check_for_update();
    println!("Update needed: {} ({})", check.needed, check.description);

    let outcome = runner.perform_update();
    println!("{}", outcome.message);
    for query in &outcome.query_log {
        println!("  {query}");
    }

    // Every non-empty credential is a known hash now, and a second run has nothing to do
    let detector = HashDetector::new();
    let mut stmt = store
        .connection()
        .prepare("SELECT uid, password FROM fe_users ORDER BY uid")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    for row in rows {
        let (uid, password) = row?;
        let signature = password
            .as_deref()
            .map(|password| detector.classify(password));
        println!("uid {uid}: {signature:?}");
    }

    println!("Rehashed on second run: {}", runner.run()?.rows_changed());

    Ok(())
}
