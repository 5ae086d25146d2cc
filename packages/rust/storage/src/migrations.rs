//! SQL migration definitions for the feedmill content database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: articles keyed by (type, slug)",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Canonical content records
CREATE TABLE IF NOT EXISTS articles (
    id               TEXT PRIMARY KEY,
    type             TEXT NOT NULL,
    slug             TEXT NOT NULL,
    title            TEXT NOT NULL,
    summary          TEXT NOT NULL,
    body             TEXT NOT NULL,
    images           TEXT NOT NULL DEFAULT '[]',
    source_url       TEXT NOT NULL,
    affiliate_url    TEXT,
    related_works    TEXT NOT NULL DEFAULT '[]',
    related_entities TEXT NOT NULL DEFAULT '[]',
    published_at     TEXT NOT NULL,
    fetched_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE(type, slug)
);

CREATE INDEX IF NOT EXISTS idx_articles_type_published ON articles(type, published_at);
CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index synthetic record families by source_url",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_articles_source_url ON articles(source_url);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
