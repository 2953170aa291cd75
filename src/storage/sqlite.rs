//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::paging::{page_offset, PAGE_SIZE};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    PullRequestRecord, RepositoryRecord, ReviewCommentRecord, ReviewRecord, UserRecord, UserStats,
};
use crate::task::{Task, TaskKind};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const TASK_COLUMNS: &str = "id, kind, owner, repository, is_completed, creation_date, start_date,
     end_date, current_page, last_processed, parent";

const PULL_COLUMNS: &str = "id, owner, repository, number, state, title, body, user_login,
     base_ref, base_user_login, head_ref, head_user_login, created_at, updated_at, closed_at,
     merged_at, merged, comments, review_comments, commits, additions, deletions, changed_files,
     review_count, review_comment_count";

const REVIEW_COLUMNS: &str =
    "id, owner, repository, pull_number, user_login, state, body, submitted_at";

const REVIEW_COMMENT_COLUMNS: &str = "id, owner, repository, pull_number, review_id, user_login,
     body, path, created_at, updated_at";

const USER_COLUMNS: &str = "login, id, name, company, location, email, public_repos, followers,
     following, created_at, updated_at, updated_on_task, pull_request_count, reviews_approved,
     reviews_changes_requested, reviews_commented, reviews_dismissed, review_comment_count";

const REPOSITORY_COLUMNS: &str = "owner, name, id, full_name, description, language,
     default_branch, stargazers_count, forks_count, open_issues_count, created_at, updated_at,
     pull_request_count, review_count, review_comment_count, harvested_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories of `path` are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let kind: String = row.get(1)?;
    let kind = TaskKind::from_db_string(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown task kind '{}'", kind).into(),
        )
    })?;

    Ok(Task {
        id: row.get(0)?,
        kind,
        owner: row.get(2)?,
        repository: row.get(3)?,
        is_completed: row.get(4)?,
        creation_date: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        current_page: row.get(8)?,
        last_processed: row.get(9)?,
        parent: row.get(10)?,
    })
}

fn pull_from_row(row: &Row) -> rusqlite::Result<PullRequestRecord> {
    Ok(PullRequestRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        repository: row.get(2)?,
        number: row.get(3)?,
        state: row.get(4)?,
        title: row.get(5)?,
        body: row.get(6)?,
        user_login: row.get(7)?,
        base_ref: row.get(8)?,
        base_user_login: row.get(9)?,
        head_ref: row.get(10)?,
        head_user_login: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        closed_at: row.get(14)?,
        merged_at: row.get(15)?,
        merged: row.get(16)?,
        comments: row.get(17)?,
        review_comments: row.get(18)?,
        commits: row.get(19)?,
        additions: row.get(20)?,
        deletions: row.get(21)?,
        changed_files: row.get(22)?,
        review_count: row.get::<_, i64>(23)? as u64,
        review_comment_count: row.get::<_, i64>(24)? as u64,
    })
}

fn review_from_row(row: &Row) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        repository: row.get(2)?,
        pull_number: row.get(3)?,
        user_login: row.get(4)?,
        state: row.get(5)?,
        body: row.get(6)?,
        submitted_at: row.get(7)?,
    })
}

fn review_comment_from_row(row: &Row) -> rusqlite::Result<ReviewCommentRecord> {
    Ok(ReviewCommentRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        repository: row.get(2)?,
        pull_number: row.get(3)?,
        review_id: row.get(4)?,
        user_login: row.get(5)?,
        body: row.get(6)?,
        path: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        login: row.get(0)?,
        id: row.get(1)?,
        name: row.get(2)?,
        company: row.get(3)?,
        location: row.get(4)?,
        email: row.get(5)?,
        public_repos: row.get(6)?,
        followers: row.get(7)?,
        following: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        updated_on_task: row.get(11)?,
        stats: UserStats {
            pull_requests: row.get::<_, i64>(12)? as u64,
            reviews_approved: row.get::<_, i64>(13)? as u64,
            reviews_changes_requested: row.get::<_, i64>(14)? as u64,
            reviews_commented: row.get::<_, i64>(15)? as u64,
            reviews_dismissed: row.get::<_, i64>(16)? as u64,
            review_comments: row.get::<_, i64>(17)? as u64,
        },
    })
}

fn repository_from_row(row: &Row) -> rusqlite::Result<RepositoryRecord> {
    Ok(RepositoryRecord {
        owner: row.get(0)?,
        name: row.get(1)?,
        id: row.get(2)?,
        full_name: row.get(3)?,
        description: row.get(4)?,
        language: row.get(5)?,
        default_branch: row.get(6)?,
        stargazers_count: row.get(7)?,
        forks_count: row.get(8)?,
        open_issues_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        pull_request_count: row.get::<_, i64>(12)? as u64,
        review_count: row.get::<_, i64>(13)? as u64,
        review_comment_count: row.get::<_, i64>(14)? as u64,
        harvested_at: row.get(15)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Task Repository =====

    fn insert_task_family(
        &mut self,
        owner: &str,
        repository: &str,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Task> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO tasks (kind, owner, repository, creation_date, current_page, last_processed)
             VALUES (?1, ?2, ?3, ?4, 1, 0)",
            params![TaskKind::All.to_db_string(), owner, repository, created_at],
        )?;
        let main_id = tx.last_insert_rowid();

        for kind in TaskKind::SUBTASKS {
            tx.execute(
                "INSERT INTO tasks (kind, owner, repository, creation_date, current_page, last_processed, parent)
                 VALUES (?1, ?2, ?3, ?4, 1, 0, ?5)",
                params![kind.to_db_string(), owner, repository, created_at, main_id],
            )?;
        }

        tx.commit()?;

        self.get_task(main_id)?
            .ok_or(StorageError::TaskNotFound(main_id))
    }

    fn get_task(&self, task_id: i64) -> StorageResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn update_task(&mut self, task: &Task) -> StorageResult<usize> {
        // is_completed never reverts to false
        let affected = self.conn.execute(
            "UPDATE tasks SET is_completed = MAX(is_completed, ?1), start_date = ?2, end_date = ?3,
             current_page = ?4, last_processed = ?5 WHERE id = ?6",
            params![
                task.is_completed,
                task.start_date,
                task.end_date,
                task.current_page,
                task.last_processed,
                task.id
            ],
        )?;
        Ok(affected)
    }

    fn find_next_task(&self) -> StorageResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks WHERE is_completed = 0
                     ORDER BY creation_date ASC, id ASC LIMIT 1",
                    TASK_COLUMNS
                ),
                [],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn find_pending_task(&self, owner: &str, repository: &str) -> StorageResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks
                     WHERE owner = ?1 COLLATE NOCASE AND repository = ?2 COLLATE NOCASE
                     AND is_completed = 0
                     ORDER BY creation_date ASC, id ASC LIMIT 1",
                    TASK_COLUMNS
                ),
                params![owner, repository],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn list_tasks(&self, pending_only: bool, page: u32) -> StorageResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE (?1 = 0 OR is_completed = 0)
             ORDER BY creation_date ASC, id ASC LIMIT ?2 OFFSET ?3",
            TASK_COLUMNS
        ))?;

        let tasks = stmt
            .query_map(
                params![pending_only, PAGE_SIZE, page_offset(page) as i64],
                task_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn get_task_family(&self, family_id: i64) -> StorageResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE id = ?1 OR parent = ?1 ORDER BY id ASC",
            TASK_COLUMNS
        ))?;

        let tasks = stmt
            .query_map(params![family_id], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn remove_task_family(&mut self, family_id: i64) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let subtasks = tx.execute("DELETE FROM tasks WHERE parent = ?1", params![family_id])?;
        let main = tx.execute("DELETE FROM tasks WHERE id = ?1", params![family_id])?;
        tx.commit()?;
        Ok(subtasks + main)
    }

    // ===== Repositories =====

    fn upsert_repository(&mut self, repository: &RepositoryRecord) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO repositories ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                REPOSITORY_COLUMNS
            ),
            params![
                repository.owner,
                repository.name,
                repository.id,
                repository.full_name,
                repository.description,
                repository.language,
                repository.default_branch,
                repository.stargazers_count,
                repository.forks_count,
                repository.open_issues_count,
                repository.created_at,
                repository.updated_at,
                repository.pull_request_count as i64,
                repository.review_count as i64,
                repository.review_comment_count as i64,
                repository.harvested_at,
            ],
        )?;
        Ok(())
    }

    fn get_repository(&self, owner: &str, name: &str) -> StorageResult<Option<RepositoryRecord>> {
        let repository = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM repositories WHERE owner = ?1 AND name = ?2",
                    REPOSITORY_COLUMNS
                ),
                params![owner, name],
                repository_from_row,
            )
            .optional()?;
        Ok(repository)
    }

    // ===== Pull Requests =====

    fn upsert_pull_request(&mut self, pull: &PullRequestRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO pull_requests (id, owner, repository, number, state, title, body, user_login,
                 base_ref, base_user_login, head_ref, head_user_login, created_at, updated_at,
                 closed_at, merged_at, merged, comments, review_comments, commits, additions,
                 deletions, changed_files)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23)
             ON CONFLICT(id) DO UPDATE SET
                 state = excluded.state,
                 title = excluded.title,
                 body = excluded.body,
                 user_login = excluded.user_login,
                 base_ref = excluded.base_ref,
                 base_user_login = excluded.base_user_login,
                 head_ref = excluded.head_ref,
                 head_user_login = excluded.head_user_login,
                 updated_at = excluded.updated_at,
                 closed_at = excluded.closed_at,
                 merged_at = excluded.merged_at,
                 merged = COALESCE(excluded.merged, pull_requests.merged),
                 comments = COALESCE(excluded.comments, pull_requests.comments),
                 review_comments = COALESCE(excluded.review_comments, pull_requests.review_comments),
                 commits = COALESCE(excluded.commits, pull_requests.commits),
                 additions = COALESCE(excluded.additions, pull_requests.additions),
                 deletions = COALESCE(excluded.deletions, pull_requests.deletions),
                 changed_files = COALESCE(excluded.changed_files, pull_requests.changed_files)",
            params![
                pull.id,
                pull.owner,
                pull.repository,
                pull.number,
                pull.state,
                pull.title,
                pull.body,
                pull.user_login,
                pull.base_ref,
                pull.base_user_login,
                pull.head_ref,
                pull.head_user_login,
                pull.created_at,
                pull.updated_at,
                pull.closed_at,
                pull.merged_at,
                pull.merged,
                pull.comments,
                pull.review_comments,
                pull.commits,
                pull.additions,
                pull.deletions,
                pull.changed_files,
            ],
        )?;
        Ok(())
    }

    fn get_pull_request(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<Option<PullRequestRecord>> {
        let pull = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pull_requests WHERE owner = ?1 AND repository = ?2 AND number = ?3",
                    PULL_COLUMNS
                ),
                params![owner, repository, number],
                pull_from_row,
            )
            .optional()?;
        Ok(pull)
    }

    fn count_pull_requests(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
    ) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM pull_requests WHERE owner = ?1 AND repository = ?2 AND number > ?3",
            params![owner, repository, after],
        )
    }

    fn pull_requests_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<PullRequestRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pull_requests WHERE owner = ?1 AND repository = ?2 AND number > ?3
             ORDER BY number ASC LIMIT ?4 OFFSET ?5",
            PULL_COLUMNS
        ))?;

        let pulls = stmt
            .query_map(
                params![owner, repository, after, PAGE_SIZE, page_offset(page) as i64],
                pull_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pulls)
    }

    fn refresh_pull_review_count(
        &mut self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<u64> {
        let count = self.count(
            "SELECT COUNT(*) FROM reviews WHERE owner = ?1 AND repository = ?2 AND pull_number = ?3",
            params![owner, repository, number],
        )?;
        self.conn.execute(
            "UPDATE pull_requests SET review_count = ?4
             WHERE owner = ?1 AND repository = ?2 AND number = ?3",
            params![owner, repository, number, count as i64],
        )?;
        Ok(count)
    }

    fn refresh_pull_review_comment_count(
        &mut self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<u64> {
        let count = self.count(
            "SELECT COUNT(*) FROM review_comments
             WHERE owner = ?1 AND repository = ?2 AND pull_number = ?3",
            params![owner, repository, number],
        )?;
        self.conn.execute(
            "UPDATE pull_requests SET review_comment_count = ?4
             WHERE owner = ?1 AND repository = ?2 AND number = ?3",
            params![owner, repository, number, count as i64],
        )?;
        Ok(count)
    }

    // ===== Reviews =====

    fn upsert_review(&mut self, review: &ReviewRecord) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO reviews ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                REVIEW_COLUMNS
            ),
            params![
                review.id,
                review.owner,
                review.repository,
                review.pull_number,
                review.user_login,
                review.state,
                review.body,
                review.submitted_at,
            ],
        )?;
        Ok(())
    }

    fn count_reviews(&self, owner: &str, repository: &str, after: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM reviews WHERE owner = ?1 AND repository = ?2 AND id > ?3",
            params![owner, repository, after],
        )
    }

    fn reviews_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM reviews WHERE owner = ?1 AND repository = ?2 AND id > ?3
             ORDER BY id ASC LIMIT ?4 OFFSET ?5",
            REVIEW_COLUMNS
        ))?;

        let reviews = stmt
            .query_map(
                params![owner, repository, after, PAGE_SIZE, page_offset(page) as i64],
                review_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reviews)
    }

    // ===== Review Comments =====

    fn upsert_review_comment(&mut self, comment: &ReviewCommentRecord) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO review_comments ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                REVIEW_COMMENT_COLUMNS
            ),
            params![
                comment.id,
                comment.owner,
                comment.repository,
                comment.pull_number,
                comment.review_id,
                comment.user_login,
                comment.body,
                comment.path,
                comment.created_at,
                comment.updated_at,
            ],
        )?;
        Ok(())
    }

    fn count_review_comments(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
    ) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM review_comments WHERE owner = ?1 AND repository = ?2 AND id > ?3",
            params![owner, repository, after],
        )
    }

    fn review_comments_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<ReviewCommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM review_comments WHERE owner = ?1 AND repository = ?2 AND id > ?3
             ORDER BY id ASC LIMIT ?4 OFFSET ?5",
            REVIEW_COMMENT_COLUMNS
        ))?;

        let comments = stmt
            .query_map(
                params![owner, repository, after, PAGE_SIZE, page_offset(page) as i64],
                review_comment_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    // ===== Users =====

    fn get_user(&self, login: &str) -> StorageResult<Option<UserRecord>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE login = ?1", USER_COLUMNS),
                params![login],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn upsert_user(&mut self, user: &UserRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO users (login, id, name, company, location, email, public_repos, followers,
                 following, created_at, updated_at, updated_on_task)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(login) DO UPDATE SET
                 id = excluded.id,
                 name = excluded.name,
                 company = excluded.company,
                 location = excluded.location,
                 email = excluded.email,
                 public_repos = excluded.public_repos,
                 followers = excluded.followers,
                 following = excluded.following,
                 created_at = excluded.created_at,
                 updated_at = excluded.updated_at,
                 updated_on_task = excluded.updated_on_task",
            params![
                user.login,
                user.id,
                user.name,
                user.company,
                user.location,
                user.email,
                user.public_repos,
                user.followers,
                user.following,
                user.created_at,
                user.updated_at,
                user.updated_on_task,
            ],
        )?;
        Ok(())
    }

    fn refresh_user_stats(&mut self, login: &str) -> StorageResult<UserStats> {
        let mut stats = UserStats {
            pull_requests: self.count(
                "SELECT COUNT(*) FROM pull_requests WHERE user_login = ?1",
                params![login],
            )?,
            review_comments: self.count(
                "SELECT COUNT(*) FROM review_comments WHERE user_login = ?1",
                params![login],
            )?,
            ..UserStats::default()
        };

        {
            let mut stmt = self.conn.prepare(
                "SELECT state, COUNT(*) FROM reviews WHERE user_login = ?1 GROUP BY state",
            )?;
            let rows = stmt.query_map(params![login], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            for row in rows {
                let (state, count) = row?;
                let count = count as u64;
                match state.as_str() {
                    "APPROVED" => stats.reviews_approved += count,
                    "CHANGES_REQUESTED" => stats.reviews_changes_requested += count,
                    "COMMENTED" => stats.reviews_commented += count,
                    "DISMISSED" => stats.reviews_dismissed += count,
                    // PENDING reviews are drafts and not counted
                    _ => {}
                }
            }
        }

        self.conn.execute(
            "UPDATE users SET pull_request_count = ?2, reviews_approved = ?3,
             reviews_changes_requested = ?4, reviews_commented = ?5, reviews_dismissed = ?6,
             review_comment_count = ?7 WHERE login = ?1",
            params![
                login,
                stats.pull_requests as i64,
                stats.reviews_approved as i64,
                stats.reviews_changes_requested as i64,
                stats.reviews_commented as i64,
                stats.reviews_dismissed as i64,
                stats.review_comments as i64,
            ],
        )?;

        Ok(stats)
    }
}
