use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use pbkdf2_rehash::{
    HashDetector, HashSignature, Migration, MigrationConfig, MigrationRunner, SqliteStore,
    TableSpec,
};
use rusqlite::{params, Connection};

fn config() -> MigrationConfig {
    MigrationConfig::from_toml(
        r#"
        batch_size = 2

        [hash]
        rounds = 1000
        "#,
    )
    .unwrap()
}

fn store(rows: &[(i64, Option<&str>, bool)]) -> SqliteStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE fe_users (
            uid INTEGER PRIMARY KEY,
            password TEXT,
            disable INTEGER NOT NULL DEFAULT 0,
            hidden INTEGER NOT NULL DEFAULT 0
        )",
    )
    .unwrap();

    for (uid, password, disabled) in rows {
        conn.execute(
            "INSERT INTO fe_users (uid, password, disable, hidden) VALUES (?1, ?2, ?3, ?3)",
            params![uid, password, disabled],
        )
        .unwrap();
    }

    SqliteStore::new(conn, TableSpec::default()).unwrap()
}

fn passwords(store: &SqliteStore) -> Vec<(i64, Option<String>)> {
    let mut stmt = store
        .connection()
        .prepare("SELECT uid, password FROM fe_users ORDER BY uid")
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    rows
}

fn verify(stored: &str, plaintext: &[u8]) {
    assert_eq!(HashDetector::new().classify(stored), HashSignature::Pbkdf2);

    let parsed = PasswordHash::new(stored).unwrap();
    Pbkdf2.verify_password(plaintext, &parsed).unwrap();
}

fn argon2_hash() -> String {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(b"hunter2", &salt)
        .unwrap()
        .to_string()
}

#[test]
fn plaintext_becomes_pbkdf2() {
    let store = store(&[(1, Some("hunter2"), false)]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    let report = runner.run().unwrap();
    assert_eq!(report.rows_changed(), 1);

    let rows = passwords(&store);
    let stored = rows[0].1.as_deref().unwrap();
    assert_ne!(stored, "hunter2");
    assert_eq!(HashDetector::new().classify(stored), HashSignature::Pbkdf2);

    let parsed = PasswordHash::new(stored).unwrap();
    Pbkdf2.verify_password(b"hunter2", &parsed).unwrap();
}

#[test]
fn recognized_and_empty_are_untouched() {
    let argon2 = argon2_hash();
    let blowfish = bcrypt::hash("hunter2", 4).unwrap();
    let store = store(&[
        (2, Some("$P$C9xyzabcdABCDEFGHIJKLMNOPQRSTUV"), false),
        (3, Some(""), false),
        (4, None, false),
        (5, Some(&argon2), false),
        (6, Some(&blowfish), false),
        (7, Some("$1$saltstri$YMyguxXMBpd2TEZ.vS/3q1"), false),
        (8, Some("$pbkdf2-sha256$25000$B3FSELI3tbJ/h0CTcZZC1g$u5T.5xTkK1l9cuMt3DtB2Zq1AzRr8ctqU0KgvX1ypgE"), false),
    ]);
    let before = passwords(&store);

    let runner = MigrationRunner::from_config(&store, &config()).unwrap();
    let report = runner.run().unwrap();

    assert_eq!(report.rows_changed(), 0);
    assert_eq!(passwords(&store), before);
}

#[test]
fn disabled_accounts_are_migrated() {
    let store = store(&[(1, Some("letmein"), true)]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    assert!(runner.has_pending_work().unwrap());
    runner.run().unwrap();

    let rows = passwords(&store);
    assert!(HashDetector::new().is_recognized_hash(rows[0].1.as_deref().unwrap()));
}

#[test]
fn idempotent() {
    let store = store(&[
        (1, Some("hunter2"), false),
        (2, Some("letmein"), true),
        (3, Some("$P$C9xyzabcdABCDEFGHIJKLMNOPQRSTUV"), false),
        (4, Some(""), false),
        (5, Some("5f4dcc3b5aa765d61d8327deb882cf99"), false),
    ]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    assert_eq!(runner.run().unwrap().rows_changed(), 3);
    let after_first = passwords(&store);

    assert!(!runner.has_pending_work().unwrap());
    assert_eq!(runner.run().unwrap().rows_changed(), 0);
    assert_eq!(passwords(&store), after_first);

    let detector = HashDetector::new();
    for (_, password) in after_first {
        let password = password.unwrap();
        assert!(password.is_empty() || detector.is_recognized_hash(&password));
    }
}

#[test]
fn nothing_to_do() {
    let store = store(&[
        (1, Some("$P$C9xyzabcdABCDEFGHIJKLMNOPQRSTUV"), false),
        (2, Some(""), false),
    ]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    assert!(!runner.has_pending_work().unwrap());
    assert!(!runner.check_for_update().needed);

    let outcome = runner.perform_update();
    assert!(outcome.success);
    assert!(outcome.query_log.is_empty());
}

#[test]
fn query_log_names_the_table() {
    let store = store(&[(9, Some("hunter2"), false)]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    let outcome = runner.perform_update();
    assert_eq!(
        outcome.query_log,
        ["UPDATE fe_users SET password = '***' WHERE uid = 9"]
    );
}

#[test]
fn custom_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE be_users (id INTEGER PRIMARY KEY, pw TEXT);
         INSERT INTO be_users (id, pw) VALUES (1, 'hunter2');",
    )
    .unwrap();

    let config = MigrationConfig::from_toml(
        r#"
        [table]
        name = "be_users"
        id_column = "id"
        password_column = "pw"

        [hash]
        rounds = 1000
        "#,
    )
    .unwrap();
    let store = SqliteStore::new(conn, config.table.clone()).unwrap();
    let runner = MigrationRunner::from_config(&store, &config).unwrap();

    assert_eq!(runner.run().unwrap().rows_changed(), 1);
    let pw: String = store
        .connection()
        .query_row("SELECT pw FROM be_users WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert!(pw.starts_with("$pbkdf2-sha256$"));
}

#[test]
fn latin1_password_does_not_block_the_run() {
    let store = store(&[(1, Some("hunter2"), false), (3, Some("letmein"), false)]);
    store
        .connection()
        .execute(
            "INSERT INTO fe_users (uid, password) VALUES (2, CAST(x'6dfc6c6c6572' AS TEXT))",
            [],
        )
        .unwrap();
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    let report = runner.run().unwrap();
    assert_eq!(report.rows_changed(), 3);
    assert!(report.is_clean());

    let rows = passwords(&store);
    verify(rows[0].1.as_deref().unwrap(), b"hunter2");
    verify(rows[1].1.as_deref().unwrap(), b"m\xfcller");
    verify(rows[2].1.as_deref().unwrap(), b"letmein");

    assert!(!runner.has_pending_work().unwrap());
}

#[test]
fn plaintext_looking_like_a_hash_is_migrated() {
    let phpass = "$P$C9xyzabcdABCDEFGHIJKLMNOPQRSTUV";
    let store = store(&[
        (1, Some("$1$hunter2"), false),
        (2, Some("$P$Cats"), false),
        (3, Some("$pbkdf2 secret"), false),
        (4, Some(phpass), false),
    ]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();
    assert!(runner.has_pending_work().unwrap());

    let report = runner.run().unwrap();
    assert_eq!(report.rows_changed(), 3);
    assert_eq!(report.swept, 1);

    let rows = passwords(&store);
    verify(rows[0].1.as_deref().unwrap(), b"$1$hunter2");
    verify(rows[1].1.as_deref().unwrap(), b"$P$Cats");
    verify(rows[2].1.as_deref().unwrap(), b"$pbkdf2 secret");
    assert_eq!(rows[3].1.as_deref(), Some(phpass));

    assert!(!runner.has_pending_work().unwrap());
    assert!(!runner.check_for_update().needed);
}

#[test]
fn malformed_hashes_are_rehashed() {
    let store = store(&[
        (1, Some("$2y$10$whatever"), false),
        (2, Some("$P$9IQRaTwmfeRo7ud9Fh4E2P"), false),
    ]);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    let report = runner.run().unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.rows_changed(), 2);

    let rows = passwords(&store);
    verify(rows[0].1.as_deref().unwrap(), b"$2y$10$whatever");
    verify(rows[1].1.as_deref().unwrap(), b"$P$9IQRaTwmfeRo7ud9Fh4E2P");
}

#[test]
fn only_hashes_left_means_no_update() {
    let blowfish = bcrypt::hash("hunter2", 4).unwrap();
    let store = store(&[
        (1, Some(&blowfish), false),
        (2, Some("$P$9IQRaTwmfeRo7ud9Fh4E2PdI0S3r.L0"), false),
    ]);
    let before = passwords(&store);
    let runner = MigrationRunner::from_config(&store, &config()).unwrap();

    // both rows pass the prefilter, neither needs a rewrite
    assert!(runner.scanner().has_pending_work().unwrap());
    assert!(!runner.has_pending_work().unwrap());
    assert!(!runner.check_for_update().needed);

    let outcome = runner.perform_update();
    assert!(outcome.success);
    assert!(outcome.query_log.is_empty());
    assert_eq!(passwords(&store), before);
}
