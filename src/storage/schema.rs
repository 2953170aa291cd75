//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Checkpointed units of harvesting work
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    creation_date TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    current_page INTEGER NOT NULL DEFAULT 1,
    last_processed INTEGER NOT NULL DEFAULT 0,
    parent INTEGER REFERENCES tasks(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_pending ON tasks(is_completed, creation_date, id);
CREATE INDEX IF NOT EXISTS idx_tasks_target ON tasks(owner, repository);
CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent);

-- Harvested repositories with counters derived from local aggregates
CREATE TABLE IF NOT EXISTS repositories (
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    id INTEGER NOT NULL,
    full_name TEXT NOT NULL,
    description TEXT,
    language TEXT,
    default_branch TEXT,
    stargazers_count INTEGER NOT NULL DEFAULT 0,
    forks_count INTEGER NOT NULL DEFAULT 0,
    open_issues_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    pull_request_count INTEGER NOT NULL DEFAULT 0,
    review_count INTEGER NOT NULL DEFAULT 0,
    review_comment_count INTEGER NOT NULL DEFAULT 0,
    harvested_at TEXT NOT NULL,
    PRIMARY KEY (owner, name)
);

-- Pull requests: summary fields from the listing, detail fields once fetched
CREATE TABLE IF NOT EXISTS pull_requests (
    id INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    number INTEGER NOT NULL,
    state TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT,
    user_login TEXT,
    base_ref TEXT NOT NULL,
    base_user_login TEXT,
    head_ref TEXT NOT NULL,
    head_user_login TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    closed_at TEXT,
    merged_at TEXT,
    merged INTEGER,
    comments INTEGER,
    review_comments INTEGER,
    commits INTEGER,
    additions INTEGER,
    deletions INTEGER,
    changed_files INTEGER,
    review_count INTEGER NOT NULL DEFAULT 0,
    review_comment_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(owner, repository, number)
);

CREATE INDEX IF NOT EXISTS idx_pull_requests_user ON pull_requests(user_login);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    pull_number INTEGER NOT NULL,
    user_login TEXT,
    state TEXT NOT NULL,
    body TEXT,
    submitted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_reviews_target ON reviews(owner, repository, pull_number);
CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_login, state);

CREATE TABLE IF NOT EXISTS review_comments (
    id INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    pull_number INTEGER NOT NULL,
    review_id INTEGER,
    user_login TEXT,
    body TEXT NOT NULL,
    path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_review_comments_target ON review_comments(owner, repository, pull_number);
CREATE INDEX IF NOT EXISTS idx_review_comments_user ON review_comments(user_login);

-- Users, refreshed at most once per harvest generation (updated_on_task)
CREATE TABLE IF NOT EXISTS users (
    login TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    name TEXT,
    company TEXT,
    location TEXT,
    email TEXT,
    public_repos INTEGER NOT NULL DEFAULT 0,
    followers INTEGER NOT NULL DEFAULT 0,
    following INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    updated_on_task INTEGER,
    pull_request_count INTEGER NOT NULL DEFAULT 0,
    reviews_approved INTEGER NOT NULL DEFAULT 0,
    reviews_changes_requested INTEGER NOT NULL DEFAULT 0,
    reviews_commented INTEGER NOT NULL DEFAULT 0,
    reviews_dismissed INTEGER NOT NULL DEFAULT 0,
    review_comment_count INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
