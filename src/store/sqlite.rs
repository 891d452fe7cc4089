use std::path::Path;

use rusqlite::{
    params, params_from_iter,
    types::{Value, ValueRef},
    Connection, ErrorCode,
};
use serde::Deserialize;

use crate::{
    error::{Error, StoreError},
    prefilter::Prefilter,
    store::{AccountId, CredentialRecord, CredentialStore},
};

/// Table and columns holding the credentials
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TableSpec {
    /// Table name
    pub name: String,
    /// Unique integer id column
    pub id_column: String,
    /// Nullable credential column
    pub password_column: String,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            name: "fe_users".into(),
            id_column: "uid".into(),
            password_column: "password".into(),
        }
    }
}

impl TableSpec {
    /// Make sure every name is a plain SQL identifier
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first offending identifier
    pub fn validate(&self) -> Result<(), Error> {
        for ident in [&self.name, &self.id_column, &self.password_column] {
            if !is_identifier(ident) {
                return Err(Error::Config(format!("`{ident}` is not a valid SQL identifier")));
            }
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Whatever the column holds, as the bytes that were originally stored
fn credential_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        ValueRef::Integer(value) => Some(value.to_string().into_bytes()),
        ValueRef::Real(value) => Some(value.to_string().into_bytes()),
    }
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(Box::new(err))
}

// Errors that say nothing about the row being written
fn is_connection_level(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::OutOfMemory
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
        ),
        _ => false,
    }
}

/// [`CredentialStore`] backed by a SQLite table
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    table: TableSpec,
    select_page: String,
    count_pending: String,
    update: String,
}

impl SqliteStore {
    /// Open the database at `path`
    ///
    /// # Errors
    ///
    /// Invalid table spec or a database that can't be opened
    pub fn open(path: impl AsRef<Path>, table: TableSpec) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::new(conn, table)
    }

    /// Wrap an open connection
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the table spec contains something other than plain identifiers
    pub fn new(conn: Connection, table: TableSpec) -> Result<Self, Error> {
        table.validate()?;

        let TableSpec {
            name,
            id_column: id,
            password_column: password,
        } = &table;

        // ?1 is the exclusive lower id bound, ?2 the page size, the rest are the exclusions
        let select_page = format!(
            r#"SELECT "{id}", "{password}" FROM "{name}" WHERE (?1 IS NULL OR "{id}" > ?1) AND {{filter}} ORDER BY "{id}" LIMIT ?2"#
        );
        let count_pending = format!(r#"SELECT COUNT(*) FROM "{name}" WHERE {{filter}}"#);
        let update = format!(r#"UPDATE "{name}" SET "{password}" = ?1 WHERE "{id}" = ?2"#);

        Ok(Self {
            conn,
            table,
            select_page,
            count_pending,
            update,
        })
    }

    /// Underlying connection
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Table this store works on
    #[must_use]
    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    fn filter_clause(&self, prefilter: &Prefilter, first_param: usize) -> String {
        let password = &self.table.password_column;
        let mut clauses: Vec<String> = (0..prefilter.exclusions().len())
            .map(|i| {
                format!(
                    r#""{password}" NOT LIKE ?{} ESCAPE '\'"#,
                    first_param + i
                )
            })
            .collect();

        if clauses.is_empty() {
            clauses.push(format!(r#""{password}" IS NOT NULL"#));
        }

        clauses.join(" AND ")
    }

    fn fetch_page(
        &self,
        filter: &str,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        let sql = self.select_page.replace("{filter}", filter);

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut values = vec![
            after.map_or(Value::Null, |id| Value::Integer(id.0)),
            Value::Integer(limit),
        ];
        values.extend(prefilter.like_patterns().into_iter().map(Value::Text));

        let mut stmt = self.conn.prepare(&sql).map_err(unavailable)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(CredentialRecord::new(
                    AccountId(row.get(0)?),
                    credential_bytes(row.get_ref(1)?),
                ))
            })
            .map_err(unavailable)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(unavailable)
    }
}

impl CredentialStore for SqliteStore {
    fn fetch_pending(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        let filter = self.filter_clause(prefilter, 3);
        self.fetch_page(&filter, prefilter, after, limit)
    }

    fn fetch_excluded(
        &self,
        prefilter: &Prefilter,
        after: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        let password = &self.table.password_column;
        let filter = format!(
            r#""{password}" IS NOT NULL AND "{password}" <> '' AND NOT ({})"#,
            self.filter_clause(prefilter, 3)
        );
        self.fetch_page(&filter, prefilter, after, limit)
    }

    fn count_pending(&self, prefilter: &Prefilter) -> Result<u64, StoreError> {
        let sql = self
            .count_pending
            .replace("{filter}", &self.filter_clause(prefilter, 1));

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(prefilter.like_patterns()), |row| {
                row.get(0)
            })
            .map_err(unavailable)?;

        Ok(count.unsigned_abs())
    }

    fn update_credential(&self, id: AccountId, value: &str) -> Result<(), StoreError> {
        match self.conn.execute(&self.update, params![value, id.0]) {
            Ok(0) => Err(StoreError::NotFound(id)),
            Ok(_) => Ok(()),
            Err(err) if is_connection_level(&err) => Err(unavailable(err)),
            Err(err) => Err(StoreError::Write {
                id,
                source: Box::new(err),
            }),
        }
    }

    fn describe_update(&self, id: AccountId) -> String {
        format!(
            "UPDATE {} SET {} = '***' WHERE {} = {id}",
            self.table.name, self.table.password_column, self.table.id_column
        )
    }
}
