//! SQLite-backed implementation of the source, torrent and file stores.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    FileDetails, FileKind, FileStore, HardlinkStatus, MediaFile, MediaType, NewMediaFile,
    NewSource, NewTorrent, Source, SourceKind, SourceStore, StoreError, Torrent, TorrentStatus,
    TorrentStore,
};

const SOURCE_COLUMNS: &str = "id, kind, url, media_type, title, catalog_id, season, \
     use_llm_episode, episode_regex, episode_offset, check_interval, last_check, outdated, \
     created_at";

const TORRENT_COLUMNS: &str =
    "id, hash, source_id, url, title, status, progress, created_at, started_at, completed_at, \
     error_message";

const FILE_COLUMNS: &str = "id, torrent_id, name, path, size, kind, extracted_episode, \
     final_episode, hardlink_path, hardlink_status, hardlink_error, created_at";

/// SQLite store holding all three entity tables behind one connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file and initialize the schema.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                url TEXT NOT NULL,
                media_type TEXT NOT NULL,
                title TEXT NOT NULL,
                catalog_id TEXT,
                season INTEGER,
                use_llm_episode INTEGER NOT NULL DEFAULT 0,
                episode_regex TEXT,
                episode_offset INTEGER NOT NULL DEFAULT 0,
                check_interval INTEGER NOT NULL DEFAULT 3600,
                last_check TEXT,
                outdated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS torrents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                url TEXT NOT NULL,
                title TEXT,
                status TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0.0,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error_message TEXT
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_id INTEGER NOT NULL REFERENCES torrents(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                kind TEXT NOT NULL,
                extracted_episode INTEGER,
                final_episode INTEGER,
                hardlink_path TEXT,
                hardlink_status TEXT,
                hardlink_error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sources_kind ON sources(kind);
            CREATE INDEX IF NOT EXISTS idx_torrents_source ON torrents(source_id);
            CREATE INDEX IF NOT EXISTS idx_torrents_status ON torrents(status);
            CREATE INDEX IF NOT EXISTS idx_files_torrent ON files(torrent_id);
            CREATE INDEX IF NOT EXISTS idx_files_hardlink_path ON files(hardlink_path);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        // Migration: add outdated column if it doesn't exist
        let _ = conn.execute(
            "ALTER TABLE sources ADD COLUMN outdated INTEGER NOT NULL DEFAULT 0",
            [],
        );

        Ok(())
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
        let kind_str: String = row.get(1)?;
        let media_type_str: String = row.get(3)?;
        let last_check_str: Option<String> = row.get(11)?;
        let created_at_str: String = row.get(13)?;

        Ok(Source {
            id: row.get(0)?,
            kind: SourceKind::parse(&kind_str).unwrap_or(SourceKind::Feed),
            url: row.get(2)?,
            media_type: MediaType::parse(&media_type_str).unwrap_or(MediaType::Tv),
            title: row.get(4)?,
            catalog_id: row.get(5)?,
            season: row.get(6)?,
            use_llm_episode: row.get(7)?,
            episode_regex: row.get(8)?,
            episode_offset: row.get(9)?,
            check_interval: row.get(10)?,
            last_check: last_check_str.and_then(|s| parse_timestamp(&s)),
            outdated: row.get(12)?,
            created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_torrent(row: &rusqlite::Row) -> rusqlite::Result<Torrent> {
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(7)?;
        let started_at_str: Option<String> = row.get(8)?;
        let completed_at_str: Option<String> = row.get(9)?;

        Ok(Torrent {
            id: row.get(0)?,
            hash: row.get(1)?,
            source_id: row.get(2)?,
            url: row.get(3)?,
            title: row.get(4)?,
            status: TorrentStatus::parse(&status_str).unwrap_or(TorrentStatus::Pending),
            progress: row.get(6)?,
            created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
            started_at: started_at_str.and_then(|s| parse_timestamp(&s)),
            completed_at: completed_at_str.and_then(|s| parse_timestamp(&s)),
            error_message: row.get(10)?,
        })
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<MediaFile> {
        let kind_str: String = row.get(5)?;
        let hardlink_status_str: Option<String> = row.get(9)?;
        let created_at_str: String = row.get(11)?;

        Ok(MediaFile {
            id: row.get(0)?,
            torrent_id: row.get(1)?,
            name: row.get(2)?,
            path: row.get(3)?,
            size: row.get(4)?,
            kind: FileKind::parse(&kind_str).unwrap_or(FileKind::Other),
            extracted_episode: row.get(6)?,
            final_episode: row.get(7)?,
            hardlink_path: row.get(8)?,
            hardlink_status: hardlink_status_str.and_then(|s| HardlinkStatus::parse(&s)),
            hardlink_error: row.get(10)?,
            created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
        })
    }

    fn get_torrent_locked(
        conn: &Connection,
        id: i64,
    ) -> Result<Option<Torrent>, StoreError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM torrents WHERE id = ?", TORRENT_COLUMNS),
            params![id],
            Self::row_to_torrent,
        );

        match result {
            Ok(torrent) => Ok(Some(torrent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn get_file_locked(conn: &Connection, id: i64) -> Result<Option<MediaFile>, StoreError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS),
            params![id],
            Self::row_to_file,
        );

        match result {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn validate_hash(hash: &str) -> Result<String, StoreError> {
    let normalized = hash.to_lowercase();
    if normalized.len() != 40 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::Invalid {
            field: "hash",
            reason: format!("expected 40 hex chars, got {:?}", hash),
        });
    }
    Ok(normalized)
}

impl SourceStore for SqliteStore {
    fn create(&self, request: NewSource) -> Result<Source, StoreError> {
        if request.url.trim().is_empty() {
            return Err(StoreError::Invalid {
                field: "url",
                reason: "must not be empty".to_string(),
            });
        }
        if request.title.trim().is_empty() {
            return Err(StoreError::Invalid {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if request.check_interval <= 0 {
            return Err(StoreError::Invalid {
                field: "check_interval",
                reason: format!("must be positive, got {}", request.check_interval),
            });
        }

        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO sources (kind, url, media_type, title, catalog_id, season, \
             use_llm_episode, episode_regex, episode_offset, check_interval, last_check, \
             outdated, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?)",
            params![
                request.kind.as_str(),
                request.url,
                request.media_type.as_str(),
                request.title,
                request.catalog_id,
                request.season,
                request.use_llm_episode,
                request.episode_regex,
                request.episode_offset,
                request.check_interval,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Source {
            id: conn.last_insert_rowid(),
            kind: request.kind,
            url: request.url,
            media_type: request.media_type,
            title: request.title,
            catalog_id: request.catalog_id,
            season: request.season,
            use_llm_episode: request.use_llm_episode,
            episode_regex: request.episode_regex,
            episode_offset: request.episode_offset,
            check_interval: request.check_interval,
            last_check: None,
            outdated: false,
            created_at: now,
        })
    }

    fn get(&self, id: i64) -> Result<Option<Source>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS),
            params![id],
            Self::row_to_source,
        );

        match result {
            Ok(source) => Ok(Some(source)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<Source>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sources ORDER BY id",
                SOURCE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_source)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut sources = Vec::new();
        for row in rows {
            sources.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(sources)
    }

    fn feeds_due(&self, now: DateTime<Utc>) -> Result<Vec<Source>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sources WHERE kind = 'feed' AND outdated = 0 ORDER BY id",
                SOURCE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_source)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        // The interval arithmetic lives in chrono, not in SQL.
        let mut due = Vec::new();
        for row in rows {
            let source = row.map_err(|e| StoreError::Database(e.to_string()))?;
            if source.is_due(now) {
                due.push(source);
            }
        }

        Ok(due)
    }

    fn magnets_without_torrent(&self) -> Result<Vec<Source>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sources s WHERE s.kind = 'magnet' AND s.outdated = 0 \
                 AND NOT EXISTS (SELECT 1 FROM torrents t WHERE t.source_id = s.id) \
                 ORDER BY s.id",
                SOURCE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_source)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut sources = Vec::new();
        for row in rows {
            sources.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(sources)
    }

    fn touch_last_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE sources SET last_check = ? WHERE id = ?",
                params![at.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::SourceNotFound(id));
        }
        Ok(())
    }

    fn set_outdated(&self, id: i64, outdated: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE sources SET outdated = ? WHERE id = ?",
                params![outdated, id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::SourceNotFound(id));
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute("DELETE FROM sources WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(deleted > 0)
    }
}

impl TorrentStore for SqliteStore {
    fn create(&self, request: NewTorrent) -> Result<Torrent, StoreError> {
        let hash = validate_hash(&request.hash)?;

        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let status = TorrentStatus::Pending;

        let result = conn.execute(
            "INSERT INTO torrents (hash, source_id, url, title, status, progress, created_at, \
             started_at, completed_at, error_message) VALUES (?, ?, ?, ?, ?, 0.0, ?, NULL, NULL, NULL)",
            params![
                hash,
                request.source_id,
                request.url,
                request.title,
                status.as_str(),
                now.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateHash(hash));
            }
            Err(e) => return Err(StoreError::Database(e.to_string())),
        }

        Ok(Torrent {
            id: conn.last_insert_rowid(),
            hash,
            source_id: request.source_id,
            url: request.url,
            title: request.title,
            status,
            progress: 0.0,
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        })
    }

    fn get(&self, id: i64) -> Result<Option<Torrent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::get_torrent_locked(&conn, id)
    }

    fn get_by_hash(&self, hash: &str) -> Result<Option<Torrent>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {} FROM torrents WHERE hash = ?", TORRENT_COLUMNS),
            params![hash.to_lowercase()],
            Self::row_to_torrent,
        );

        match result {
            Ok(torrent) => Ok(Some(torrent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn hash_exists(&self, hash: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();

        let exists: i64 = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM torrents WHERE hash = ?)",
                params![hash.to_lowercase()],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(exists != 0)
    }

    fn list_by_status(&self, status: TorrentStatus) -> Result<Vec<Torrent>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM torrents WHERE status = ? ORDER BY id",
                TORRENT_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![status.as_str()], Self::row_to_torrent)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut torrents = Vec::new();
        for row in rows {
            torrents.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(torrents)
    }

    fn list_for_source(&self, source_id: i64) -> Result<Vec<Torrent>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM torrents WHERE source_id = ? ORDER BY id",
                TORRENT_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![source_id], Self::row_to_torrent)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut torrents = Vec::new();
        for row in rows {
            torrents.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(torrents)
    }

    fn completed_without_files(&self) -> Result<Vec<Torrent>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM torrents t WHERE t.status = 'completed' \
                 AND NOT EXISTS (SELECT 1 FROM files f WHERE f.torrent_id = t.id) \
                 ORDER BY t.id",
                TORRENT_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_torrent)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut torrents = Vec::new();
        for row in rows {
            torrents.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(torrents)
    }

    fn set_status(
        &self,
        id: i64,
        status: TorrentStatus,
        error: Option<&str>,
    ) -> Result<Torrent, StoreError> {
        let conn = self.conn.lock().unwrap();

        let current =
            Self::get_torrent_locked(&conn, id)?.ok_or(StoreError::TorrentNotFound(id))?;

        if !current.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                torrent_id: id,
                from: current.status,
                to: status,
            });
        }

        let now = Utc::now();
        let started_at = match (status, current.started_at) {
            (TorrentStatus::Downloading, None) => Some(now),
            (_, existing) => existing,
        };
        let completed_at = match (status, current.completed_at) {
            (TorrentStatus::Completed, None) => Some(now),
            (_, existing) => existing,
        };
        let error_message = if status == TorrentStatus::Failed {
            error.map(str::to_string)
        } else {
            None
        };

        conn.execute(
            "UPDATE torrents SET status = ?, started_at = ?, completed_at = ?, error_message = ? \
             WHERE id = ?",
            params![
                status.as_str(),
                started_at.map(|t| t.to_rfc3339()),
                completed_at.map(|t| t.to_rfc3339()),
                error_message,
                id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Torrent {
            status,
            started_at,
            completed_at,
            error_message,
            ..current
        })
    }

    fn set_progress(&self, id: i64, progress: f64) -> Result<(), StoreError> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(StoreError::Invalid {
                field: "progress",
                reason: format!("must be within [0.0, 1.0], got {}", progress),
            });
        }

        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE torrents SET progress = ? WHERE id = ?",
                params![progress, id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::TorrentNotFound(id));
        }
        Ok(())
    }
}

impl FileStore for SqliteStore {
    fn create(&self, request: NewMediaFile) -> Result<MediaFile, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO files (torrent_id, name, path, size, kind, extracted_episode, \
             final_episode, hardlink_path, hardlink_status, hardlink_error, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?)",
            params![
                request.torrent_id,
                request.name,
                request.path,
                request.size,
                request.kind.as_str(),
                request.extracted_episode,
                request.final_episode,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(MediaFile {
            id: conn.last_insert_rowid(),
            torrent_id: request.torrent_id,
            name: request.name,
            path: request.path,
            size: request.size,
            kind: request.kind,
            extracted_episode: request.extracted_episode,
            final_episode: request.final_episode,
            hardlink_path: None,
            hardlink_status: None,
            hardlink_error: None,
            created_at: now,
        })
    }

    fn get(&self, id: i64) -> Result<Option<MediaFile>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::get_file_locked(&conn, id)
    }

    fn list_for_torrent(&self, torrent_id: i64) -> Result<Vec<MediaFile>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files WHERE torrent_id = ? ORDER BY id",
                FILE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![torrent_id], Self::row_to_file)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(files)
    }

    fn count_for_torrent(&self, torrent_id: i64) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM files WHERE torrent_id = ?",
                params![torrent_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(count)
    }

    fn conflicting_hardlinks(
        &self,
        hardlink_path: &str,
        excluding_id: i64,
    ) -> Result<Vec<MediaFile>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files WHERE hardlink_path = ? AND id != ? ORDER BY id",
                FILE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![hardlink_path, excluding_id], Self::row_to_file)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(files)
    }

    fn record_hardlink(&self, id: i64, path: &str) -> Result<MediaFile, StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE files SET hardlink_path = ?, hardlink_status = ?, hardlink_error = NULL \
                 WHERE id = ?",
                params![path, HardlinkStatus::Completed.as_str(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::FileNotFound(id));
        }

        Self::get_file_locked(&conn, id)?.ok_or(StoreError::FileNotFound(id))
    }

    fn record_hardlink_failure(&self, id: i64, error: &str) -> Result<MediaFile, StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE files SET hardlink_status = ?, hardlink_error = ? WHERE id = ?",
                params![HardlinkStatus::Failed.as_str(), error, id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::FileNotFound(id));
        }

        Self::get_file_locked(&conn, id)?.ok_or(StoreError::FileNotFound(id))
    }

    fn file_details(&self, id: i64) -> Result<Option<FileDetails>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let file = match Self::get_file_locked(&conn, id)? {
            Some(file) => file,
            None => return Ok(None),
        };

        let torrent = Self::get_torrent_locked(&conn, file.torrent_id)?.ok_or_else(|| {
            StoreError::Database(format!(
                "file {} references missing torrent {}",
                id, file.torrent_id
            ))
        })?;

        let source = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS),
                params![torrent.source_id],
                Self::row_to_source,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::Database(format!(
                    "torrent {} references missing source {}",
                    torrent.id, torrent.source_id
                )),
                other => StoreError::Database(other.to_string()),
            })?;

        Ok(Some(FileDetails {
            file,
            torrent,
            source,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn hex_hash(n: u8) -> String {
        format!("{:040x}", n)
    }

    fn seed_source(store: &SqliteStore) -> Source {
        SourceStore::create(
            store,
            NewSource::feed("https://example.com/feed.xml", MediaType::Tv, "Some Show"),
        )
        .unwrap()
    }

    fn seed_torrent(store: &SqliteStore, source_id: i64, n: u8) -> Torrent {
        TorrentStore::create(
            store,
            NewTorrent {
                hash: hex_hash(n),
                source_id,
                url: format!("magnet:?xt=urn:btih:{}", hex_hash(n)),
                title: Some(format!("Torrent {}", n)),
            },
        )
        .unwrap()
    }

    fn seed_file(store: &SqliteStore, torrent_id: i64, name: &str) -> MediaFile {
        FileStore::create(
            store,
            NewMediaFile {
                torrent_id,
                name: name.to_string(),
                path: format!("Some Show/{}", name),
                size: 734_003_200,
                kind: FileKind::Episode,
                extracted_episode: Some(3),
                final_episode: Some(3),
            },
        )
        .unwrap()
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    #[test]
    fn test_create_and_get_source() {
        let store = store();
        let request = NewSource::feed("https://example.com/feed.xml", MediaType::Tv, "Some Show")
            .with_season(2)
            .with_episode_offset(-12)
            .with_episode_regex(r"E(\d+)")
            .with_llm_episode(true)
            .with_check_interval(600);

        let created = SourceStore::create(&store, request).unwrap();
        assert_eq!(created.season, Some(2));
        assert_eq!(created.episode_offset, -12);
        assert!(created.use_llm_episode);
        assert!(created.last_check.is_none());
        assert!(!created.outdated);

        let fetched = SourceStore::get(&store, created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_get_missing_source_returns_none() {
        let store = store();
        assert!(SourceStore::get(&store, 42).unwrap().is_none());
    }

    #[test]
    fn test_create_source_validation() {
        let store = store();

        let empty_url = NewSource::feed("  ", MediaType::Tv, "Some Show");
        assert!(matches!(
            SourceStore::create(&store, empty_url),
            Err(StoreError::Invalid { field: "url", .. })
        ));

        let empty_title = NewSource::feed("https://example.com/feed.xml", MediaType::Tv, "");
        assert!(matches!(
            SourceStore::create(&store, empty_title),
            Err(StoreError::Invalid { field: "title", .. })
        ));

        let bad_interval = NewSource::feed("https://example.com/feed.xml", MediaType::Tv, "Show")
            .with_check_interval(0);
        assert!(matches!(
            SourceStore::create(&store, bad_interval),
            Err(StoreError::Invalid {
                field: "check_interval",
                ..
            })
        ));
    }

    #[test]
    fn test_feeds_due_filtering() {
        let store = store();
        let now = Utc::now();

        let never_checked = seed_source(&store);

        let recently_checked = seed_source(&store);
        store
            .touch_last_check(recently_checked.id, now - chrono::Duration::seconds(10))
            .unwrap();

        let stale = seed_source(&store);
        store
            .touch_last_check(stale.id, now - chrono::Duration::seconds(7200))
            .unwrap();

        let outdated = seed_source(&store);
        store.set_outdated(outdated.id, true).unwrap();

        SourceStore::create(
            &store,
            NewSource::magnet(
                format!("magnet:?xt=urn:btih:{}", hex_hash(9)),
                MediaType::Movie,
                "Some Movie",
            ),
        )
        .unwrap();

        let due: Vec<i64> = store.feeds_due(now).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(due, vec![never_checked.id, stale.id]);
    }

    #[test]
    fn test_magnets_without_torrent() {
        let store = store();

        let bare = SourceStore::create(
            &store,
            NewSource::magnet(
                format!("magnet:?xt=urn:btih:{}", hex_hash(1)),
                MediaType::Movie,
                "Bare Movie",
            ),
        )
        .unwrap();

        let ingested = SourceStore::create(
            &store,
            NewSource::magnet(
                format!("magnet:?xt=urn:btih:{}", hex_hash(2)),
                MediaType::Movie,
                "Ingested Movie",
            ),
        )
        .unwrap();
        seed_torrent(&store, ingested.id, 2);

        seed_source(&store); // feed source, never listed here

        let pending: Vec<i64> = store
            .magnets_without_torrent()
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(pending, vec![bare.id]);
    }

    #[test]
    fn test_touch_last_check_missing_source() {
        let store = store();
        assert!(matches!(
            store.touch_last_check(999, Utc::now()),
            Err(StoreError::SourceNotFound(999))
        ));
    }

    #[test]
    fn test_delete_source_cascades() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);
        let file = seed_file(&store, torrent.id, "Some Show S01E03.mkv");

        assert!(SourceStore::delete(&store, source.id).unwrap());
        assert!(TorrentStore::get(&store, torrent.id).unwrap().is_none());
        assert!(FileStore::get(&store, file.id).unwrap().is_none());

        assert!(!SourceStore::delete(&store, source.id).unwrap());
    }

    // ------------------------------------------------------------------
    // Torrents
    // ------------------------------------------------------------------

    #[test]
    fn test_create_torrent_normalizes_hash() {
        let store = store();
        let source = seed_source(&store);

        let created = TorrentStore::create(
            &store,
            NewTorrent {
                hash: "ABCDEF0123456789ABCDEF0123456789ABCDEF01".to_string(),
                source_id: source.id,
                url: "magnet:?xt=urn:btih:abcdef0123456789abcdef0123456789abcdef01".to_string(),
                title: None,
            },
        )
        .unwrap();

        assert_eq!(created.hash, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(created.status, TorrentStatus::Pending);
        assert_eq!(created.progress, 0.0);

        let by_hash = store
            .get_by_hash("ABCDEF0123456789ABCDEF0123456789ABCDEF01")
            .unwrap()
            .unwrap();
        assert_eq!(by_hash.id, created.id);
    }

    #[test]
    fn test_create_torrent_rejects_bad_hash() {
        let store = store();
        let source = seed_source(&store);

        let result = TorrentStore::create(
            &store,
            NewTorrent {
                hash: "nothex".to_string(),
                source_id: source.id,
                url: "magnet:?xt=urn:btih:nothex".to_string(),
                title: None,
            },
        );
        assert!(matches!(
            result,
            Err(StoreError::Invalid { field: "hash", .. })
        ));
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let store = store();
        let source = seed_source(&store);
        seed_torrent(&store, source.id, 1);

        let result = TorrentStore::create(
            &store,
            NewTorrent {
                hash: hex_hash(1).to_uppercase(),
                source_id: source.id,
                url: "magnet:?xt=urn:btih:whatever".to_string(),
                title: None,
            },
        );
        assert!(matches!(result, Err(StoreError::DuplicateHash(_))));
    }

    #[test]
    fn test_hash_exists_sees_deleted_tombstones() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        store
            .set_status(torrent.id, TorrentStatus::Deleted, None)
            .unwrap();

        assert!(store.hash_exists(&hex_hash(1)).unwrap());
        assert!(!store.hash_exists(&hex_hash(2)).unwrap());
    }

    #[test]
    fn test_status_transition_stamps_timestamps() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);
        assert!(torrent.started_at.is_none());

        let downloading = store
            .set_status(torrent.id, TorrentStatus::Downloading, None)
            .unwrap();
        assert_eq!(downloading.status, TorrentStatus::Downloading);
        assert!(downloading.started_at.is_some());
        assert!(downloading.completed_at.is_none());

        let completed = store
            .set_status(torrent.id, TorrentStatus::Completed, None)
            .unwrap();
        assert_eq!(completed.status, TorrentStatus::Completed);
        assert_eq!(completed.started_at, downloading.started_at);
        assert!(completed.completed_at.is_some());

        // Persisted, not just returned.
        let fetched = TorrentStore::get(&store, torrent.id).unwrap().unwrap();
        assert_eq!(fetched.status, TorrentStatus::Completed);
        assert!(fetched.completed_at.is_some());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        store
            .set_status(torrent.id, TorrentStatus::Downloading, None)
            .unwrap();
        store
            .set_status(torrent.id, TorrentStatus::Completed, None)
            .unwrap();

        let result = store.set_status(torrent.id, TorrentStatus::Pending, None);
        assert!(matches!(
            result,
            Err(StoreError::InvalidTransition {
                from: TorrentStatus::Completed,
                to: TorrentStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_retry_clears_error_message() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        let failed = store
            .set_status(torrent.id, TorrentStatus::Failed, Some("client refused"))
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("client refused"));

        let retried = store
            .set_status(torrent.id, TorrentStatus::Pending, None)
            .unwrap();
        assert_eq!(retried.status, TorrentStatus::Pending);
        assert!(retried.error_message.is_none());

        let fetched = TorrentStore::get(&store, torrent.id).unwrap().unwrap();
        assert!(fetched.error_message.is_none());
    }

    #[test]
    fn test_set_status_missing_torrent() {
        let store = store();
        assert!(matches!(
            store.set_status(123, TorrentStatus::Downloading, None),
            Err(StoreError::TorrentNotFound(123))
        ));
    }

    #[test]
    fn test_set_progress() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        store.set_progress(torrent.id, 0.42).unwrap();
        let fetched = TorrentStore::get(&store, torrent.id).unwrap().unwrap();
        assert!((fetched.progress - 0.42).abs() < f64::EPSILON);

        assert!(matches!(
            store.set_progress(torrent.id, 1.5),
            Err(StoreError::Invalid {
                field: "progress",
                ..
            })
        ));
        assert!(matches!(
            store.set_progress(999, 0.5),
            Err(StoreError::TorrentNotFound(999))
        ));
    }

    #[test]
    fn test_list_by_status_and_source() {
        let store = store();
        let source = seed_source(&store);
        let other = seed_source(&store);

        let a = seed_torrent(&store, source.id, 1);
        let b = seed_torrent(&store, source.id, 2);
        let c = seed_torrent(&store, other.id, 3);

        store.set_status(b.id, TorrentStatus::Downloading, None).unwrap();

        let pending: Vec<i64> = store
            .list_by_status(TorrentStatus::Pending)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(pending, vec![a.id, c.id]);

        let for_source: Vec<i64> = store
            .list_for_source(source.id)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(for_source, vec![a.id, b.id]);
    }

    #[test]
    fn test_completed_without_files() {
        let store = store();
        let source = seed_source(&store);

        let bare = seed_torrent(&store, source.id, 1);
        store.set_status(bare.id, TorrentStatus::Downloading, None).unwrap();
        store.set_status(bare.id, TorrentStatus::Completed, None).unwrap();

        let cataloged = seed_torrent(&store, source.id, 2);
        store
            .set_status(cataloged.id, TorrentStatus::Downloading, None)
            .unwrap();
        store
            .set_status(cataloged.id, TorrentStatus::Completed, None)
            .unwrap();
        seed_file(&store, cataloged.id, "Some Show S01E01.mkv");

        seed_torrent(&store, source.id, 3); // still pending

        let bare_ids: Vec<i64> = store
            .completed_without_files()
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(bare_ids, vec![bare.id]);
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    #[test]
    fn test_create_and_list_files() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        let first = seed_file(&store, torrent.id, "Some Show S01E03.mkv");
        let second = seed_file(&store, torrent.id, "Some Show S01E03.chs.srt");

        let listed: Vec<i64> = store
            .list_for_torrent(torrent.id)
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(listed, vec![first.id, second.id]);
        assert_eq!(store.count_for_torrent(torrent.id).unwrap(), 2);
        assert_eq!(store.count_for_torrent(999).unwrap(), 0);

        let fetched = FileStore::get(&store, first.id).unwrap().unwrap();
        assert_eq!(fetched.kind, FileKind::Episode);
        assert!(fetched.hardlink_status.is_none());
    }

    #[test]
    fn test_record_hardlink_roundtrip() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);
        let file = seed_file(&store, torrent.id, "Some Show S01E03.mkv");

        let failed = store
            .record_hardlink_failure(file.id, "source file not found")
            .unwrap();
        assert_eq!(failed.hardlink_status, Some(HardlinkStatus::Failed));
        assert_eq!(
            failed.hardlink_error.as_deref(),
            Some("source file not found")
        );
        assert!(failed.hardlink_path.is_none());

        let linked = store
            .record_hardlink(file.id, "/library/Some Show/Season 1/Some Show S01E03.mkv")
            .unwrap();
        assert_eq!(linked.hardlink_status, Some(HardlinkStatus::Completed));
        assert!(linked.hardlink_error.is_none());
        assert_eq!(
            linked.hardlink_path.as_deref(),
            Some("/library/Some Show/Season 1/Some Show S01E03.mkv")
        );
    }

    #[test]
    fn test_conflicting_hardlinks_excludes_self() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);

        let mine = seed_file(&store, torrent.id, "Some Show S01E03.mkv");
        let other = seed_file(&store, torrent.id, "Some Show S01E03 v2.mkv");

        let dest = "/library/Some Show/Season 1/Some Show S01E03.mkv";
        store.record_hardlink(other.id, dest).unwrap();

        let conflicts = store.conflicting_hardlinks(dest, mine.id).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, other.id);

        // The claiming file itself is not its own conflict.
        assert!(store.conflicting_hardlinks(dest, other.id).unwrap().is_empty());
    }

    #[test]
    fn test_file_details_joins_chain() {
        let store = store();
        let source = seed_source(&store);
        let torrent = seed_torrent(&store, source.id, 1);
        let file = seed_file(&store, torrent.id, "Some Show S01E03.mkv");

        let details = store.file_details(file.id).unwrap().unwrap();
        assert_eq!(details.file.id, file.id);
        assert_eq!(details.torrent.id, torrent.id);
        assert_eq!(details.source.id, source.id);

        assert!(store.file_details(999).unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gleaner.db");

        let source_id;
        let torrent_id;
        {
            let store = SqliteStore::new(&path).unwrap();
            let source = seed_source(&store);
            source_id = source.id;
            torrent_id = seed_torrent(&store, source.id, 1).id;
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert!(SourceStore::get(&reopened, source_id).unwrap().is_some());
        let torrent = TorrentStore::get(&reopened, torrent_id).unwrap().unwrap();
        assert_eq!(torrent.hash, hex_hash(1));
    }
}
