use std::path::Path;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::result::{ConnectionError, ConnectionResult};
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use futures::future::{BoxFuture, FutureExt};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{Result, TodoAnalyticsError};

mod input;
mod schema;

pub use input::{NewTodo, TodoChanges, TodoInput, TITLE_MAX_CHARS};
use schema::todos;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Applied to every pooled connection. Writers wait for the lock instead of
/// failing with `database is locked`.
const CONNECTION_PRAGMAS: &str =
    "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;";

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// RFC 3339, UTC.
    pub created_at: String,
    #[serde(with = "iso_date")]
    pub date: Date,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = todos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct TodoRow {
    id: i32,
    title: String,
    description: String,
    completed: bool,
    created_at: i64,
    date: String,
}

#[derive(Insertable)]
#[diesel(table_name = todos)]
struct NewTodoRow<'a> {
    title: &'a str,
    description: &'a str,
    completed: bool,
    created_at: i64,
    date: String,
}

#[derive(AsChangeset)]
#[diesel(table_name = todos)]
struct TodoChangeset {
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
    date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    All,
    Completed,
    NotCompleted,
}

impl TodoStatus {
    /// Unrecognised values select everything.
    pub fn from_option(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("completed") => Self::Completed,
            Some("not_completed") => Self::NotCompleted,
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Completed => "completed",
            Self::NotCompleted => "not_completed",
        }
    }

    fn completed_flag(&self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Completed => Some(true),
            Self::NotCompleted => Some(false),
        }
    }
}

/// Read-only selection over the store: inclusive date range, completion
/// status and a case-insensitive keyword over title or description.
#[derive(Debug, Clone)]
pub struct TodoFilter {
    pub start: Date,
    pub end: Date,
    pub status: TodoStatus,
    pub keyword: String,
}

impl TodoFilter {
    pub fn new(start: Date, end: Date) -> Self {
        Self {
            start,
            end,
            status: TodoStatus::All,
            keyword: String::new(),
        }
    }

    pub fn matches_keyword(&self, item: &TodoItem) -> bool {
        let keyword = self.keyword.trim();
        if keyword.is_empty() {
            return true;
        }
        let needle = keyword.to_lowercase();
        item.title.to_lowercase().contains(&needle)
            || item.description.to_lowercase().contains(&needle)
    }
}

pub struct TodoStore {
    pool: SqlitePool,
}

impl TodoStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(establish_connection);
        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new_with_config(
            sqlite_path,
            manager_config,
        );
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        tracing::info!(path = sqlite_path, "todo store ready");
        Ok(Self { pool })
    }

    pub async fn create_item(&self, new: NewTodo) -> Result<TodoItem> {
        let now = OffsetDateTime::now_utc();
        let date = new.date.unwrap_or_else(|| now.date());
        let row = NewTodoRow {
            title: &new.title,
            description: &new.description,
            completed: new.completed,
            created_at: now.unix_timestamp(),
            date: format_date(date)?,
        };

        let mut conn = self.conn().await?;
        let row: TodoRow = diesel::insert_into(todos::table)
            .values(&row)
            .returning(TodoRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        map_row(row)
    }

    pub async fn list_items(&self) -> Result<Vec<TodoItem>> {
        let mut conn = self.conn().await?;
        let rows: Vec<TodoRow> = todos::table
            .select(TodoRow::as_select())
            .order(todos::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        rows.into_iter().map(map_row).collect()
    }

    pub async fn get_item(&self, id: i32) -> Result<TodoItem> {
        let mut conn = self.conn().await?;
        let row: Option<TodoRow> = todos::table
            .find(id)
            .select(TodoRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        row.map(map_row).unwrap_or_else(|| Err(not_found()))
    }

    pub async fn update_item(&self, id: i32, changes: TodoChanges) -> Result<TodoItem> {
        if changes.is_empty() {
            return self.get_item(id).await;
        }
        let changeset = TodoChangeset {
            title: changes.title,
            description: changes.description,
            completed: changes.completed,
            date: changes.date.map(format_date).transpose()?,
        };

        let mut conn = self.conn().await?;
        let row: Option<TodoRow> = diesel::update(todos::table.find(id))
            .set(&changeset)
            .returning(TodoRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        row.map(map_row).unwrap_or_else(|| Err(not_found()))
    }

    pub async fn delete_item(&self, id: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        let count = diesel::delete(todos::table.find(id))
            .execute(&mut conn)
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        if count == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    pub async fn query(&self, filter: &TodoFilter) -> Result<Vec<TodoItem>> {
        let mut conn = self.conn().await?;
        // ISO dates compare lexicographically in calendar order.
        let mut query = todos::table
            .select(TodoRow::as_select())
            .filter(todos::date.ge(format_date(filter.start)?))
            .filter(todos::date.le(format_date(filter.end)?))
            .into_boxed();

        if let Some(completed) = filter.status.completed_flag() {
            query = query.filter(todos::completed.eq(completed));
        }

        let rows: Vec<TodoRow> = query
            .order(todos::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = map_row(row)?;
            if filter.matches_keyword(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))
    }
}

pub fn parse_date(value: &str) -> std::result::Result<Date, time::error::Parse> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
}

pub fn format_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| TodoAnalyticsError::Serialization(e.to_string()))
}

fn not_found() -> TodoAnalyticsError {
    TodoAnalyticsError::NotFound("Not found.".to_string())
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
    }
    Ok(())
}

fn establish_connection(url: &str) -> BoxFuture<'_, ConnectionResult<SqliteAsyncConn>> {
    async move {
        let mut conn = <SqliteAsyncConn as AsyncConnection>::establish(url).await?;
        conn.batch_execute(CONNECTION_PRAGMAS)
            .await
            .map_err(ConnectionError::CouldntSetupConfiguration)?;
        Ok(conn)
    }
    .boxed()
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
        Ok::<_, TodoAnalyticsError>(())
    })
    .await
    .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))??;
    Ok(())
}

fn map_row(row: TodoRow) -> Result<TodoItem> {
    let created_at = OffsetDateTime::from_unix_timestamp(row.created_at)
        .map_err(|e| TodoAnalyticsError::Serialization(e.to_string()))?
        .format(&Rfc3339)
        .map_err(|e| TodoAnalyticsError::Serialization(e.to_string()))?;
    let date = parse_date(&row.date)
        .map_err(|e| TodoAnalyticsError::Serialization(format!("stored date {:?}: {e}", row.date)))?;
    Ok(TodoItem {
        id: row.id,
        title: row.title,
        description: row.description,
        completed: row.completed,
        created_at,
        date,
    })
}
