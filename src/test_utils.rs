/// # Test Utilities Module
///
/// Database fixtures shared by the unit tests. Each fixture is a fresh
/// SQLite file, so managers can open, close and reopen it freely.
use rusqlite::Connection;
use std::path::Path;
use tempfile::NamedTempFile;

/// Isolated database file with an optional sample schema
pub struct SampleDatabase {
    file: NamedTempFile,
    pub connection_string: String,
}

impl SampleDatabase {
    /// An empty database
    pub fn empty() -> Self {
        let file = NamedTempFile::new().expect("Failed to create temp database");
        let connection_string = file.path().display().to_string();
        SampleDatabase {
            file,
            connection_string,
        }
    }

    /// Tables `users` (3 rows), `posts` (5), `categories` (1) and `tags` (0)
    pub fn with_sample_data() -> Self {
        let db = Self::empty();
        let connection = Connection::open(db.file.path()).expect("Failed to open temp database");
        connection
            .execute_batch(
                "
                CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );

                CREATE TABLE posts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
                );

                CREATE TABLE categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE tags (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL
                );

                INSERT INTO users (username, email) VALUES
                    ('alice', 'alice@example.com'),
                    ('bob', 'bob@example.com'),
                    ('charlie', 'charlie@example.com');

                INSERT INTO posts (user_id, title) VALUES
                    (1, 'Welcome to Rust'),
                    (2, 'My Trip to Paris'),
                    (1, 'Building Terminal UIs'),
                    (2, 'Notes on SQLite'),
                    (3, 'Hello');

                INSERT INTO categories (name) VALUES ('Technology');
                ",
            )
            .expect("Failed to create sample schema");
        db
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Runs setup SQL on a side connection
    pub fn execute(&self, sql: &str) {
        Connection::open(self.file.path())
            .and_then(|c| c.execute_batch(sql))
            .expect("Failed to run setup SQL");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_fixture() {
        let db = SampleDatabase::with_sample_data();
        let connection = Connection::open(db.path()).unwrap();
        let count: i64 = connection
            .query_row("SELECT count(*) FROM posts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 5);
    }
}
