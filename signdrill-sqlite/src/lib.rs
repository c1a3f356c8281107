use chrono::{DateTime, SecondsFormat, Utc};
use signdrill_core::{Card, CardId, CardStore, CoreError, Quality, Review};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::debug!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(store)
    }

    /// Each in-memory connection is its own database, hence one connection.
    pub async fn open_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS cards (
          id                TEXT PRIMARY KEY,
          category          TEXT NOT NULL,
          word              TEXT NOT NULL,
          ease_factor       REAL    NOT NULL DEFAULT 2.5,
          interval_days     INTEGER NOT NULL DEFAULT 0,
          repetitions       INTEGER NOT NULL DEFAULT 0,
          due_at            TEXT    NOT NULL,
          last_reviewed_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS reviews (
          id               TEXT PRIMARY KEY,
          card_id          TEXT NOT NULL,
          quality          INTEGER NOT NULL,
          reviewed_at      TEXT NOT NULL,
          interval_applied INTEGER NOT NULL,
          ease_after       REAL NOT NULL,
          FOREIGN KEY(card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_cards_due ON cards (due_at);
        CREATE INDEX IF NOT EXISTS idx_reviews_time ON reviews (reviewed_at);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }
}

const CARD_COLUMNS: &str =
    "id,category,word,ease_factor,interval_days,repetitions,due_at,last_reviewed_at";

#[async_trait::async_trait]
impl CardStore for SqliteStore {
    // ===== Cards =====
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))?;
        row.map(row_into_card).transpose()
    }

    async fn put(&self, card: &Card) -> Result<(), CoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        upsert_card(&mut conn, card).await
    }

    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError> {
        let rows = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards"))
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("list cards"))?;
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let card = row_into_card(row)?;
            map.insert(card.id(), card);
        }
        Ok(map)
    }

    // ===== Reviews =====
    async fn insert_review(&self, review: &Review) -> Result<(), CoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        append_review(&mut conn, review).await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, CoreError> {
        let rows = sqlx::query(
            r#"SELECT id,card_id,quality,reviewed_at,interval_applied,ease_after
               FROM reviews ORDER BY reviewed_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("list reviews"))?;
        let mut v = Vec::with_capacity(rows.len());
        for row in rows {
            v.push(Review {
                id: uuid_from_str(row.get::<String, _>("id"))?,
                card_id: CardId::from(row.get::<String, _>("card_id")),
                quality: quality_from_i(row.get::<i64, _>("quality"))?,
                reviewed_at: dt_from_str(row.get::<String, _>("reviewed_at"))?,
                interval_applied: u32_from_i(row.get::<i64, _>("interval_applied"), "interval")?,
                ease_after: row.get::<f64, _>("ease_after"),
            });
        }
        Ok(v)
    }

    async fn record_review(&self, card: &Card, review: &Review) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("begin transaction"))?;
        upsert_card(&mut tx, card).await?;
        append_review(&mut tx, review).await?;
        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("commit review"))
    }

    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("begin transaction"))?;
        for stmt in ["DELETE FROM reviews", "DELETE FROM cards"] {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .map_err(|_| CoreError::Storage("reset"))?;
        }
        for card in cards {
            upsert_card(&mut tx, card).await?;
        }
        tx.commit().await.map_err(|_| CoreError::Storage("commit reset"))
    }
}

async fn upsert_card(conn: &mut SqliteConnection, card: &Card) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO cards (
          id, category, word, ease_factor, interval_days, repetitions, due_at, last_reviewed_at
        )
        VALUES (?,?,?,?,?,?,?,?)
        ON CONFLICT(id) DO UPDATE SET
          category=excluded.category,
          word=excluded.word,
          ease_factor=excluded.ease_factor,
          interval_days=excluded.interval_days,
          repetitions=excluded.repetitions,
          due_at=excluded.due_at,
          last_reviewed_at=excluded.last_reviewed_at
        "#,
    )
    .bind(card.id().to_string())
    .bind(&card.category)
    .bind(&card.word)
    .bind(card.ease_factor)
    .bind(i64::from(card.interval))
    .bind(i64::from(card.repetitions))
    .bind(dt_to_str(card.due_date))
    .bind(card.last_reviewed.map(dt_to_str))
    .execute(&mut *conn)
    .await
    .map_err(|_| CoreError::Storage("upsert card"))?;
    Ok(())
}

async fn append_review(conn: &mut SqliteConnection, review: &Review) -> Result<(), CoreError> {
    sqlx::query(
        r#"INSERT INTO reviews (id,card_id,quality,reviewed_at,interval_applied,ease_after)
           VALUES (?,?,?,?,?,?)"#,
    )
    .bind(review.id.to_string())
    .bind(review.card_id.as_str())
    .bind(i64::from(review.quality.value()))
    .bind(dt_to_str(review.reviewed_at))
    .bind(i64::from(review.interval_applied))
    .bind(review.ease_after)
    .execute(&mut *conn)
    .await
    .map_err(|_| CoreError::Storage("insert review"))?;
    Ok(())
}

// ===== Helpers =====
fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

// Fixed-width so text ordering matches time ordering.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn quality_from_i(i: i64) -> Result<Quality, CoreError> {
    let v = u8::try_from(i).map_err(|_| CoreError::Invalid("quality"))?;
    Quality::new(v)
}

fn u32_from_i(i: i64, what: &'static str) -> Result<u32, CoreError> {
    u32::try_from(i).map_err(|_| CoreError::Invalid(what))
}

fn row_into_card(row: sqlx::sqlite::SqliteRow) -> Result<Card, CoreError> {
    Ok(Card {
        category: row.get::<String, _>("category"),
        word: row.get::<String, _>("word"),
        ease_factor: row.get::<f64, _>("ease_factor"),
        interval: u32_from_i(row.get::<i64, _>("interval_days"), "interval")?,
        repetitions: u32_from_i(row.get::<i64, _>("repetitions"), "repetitions")?,
        due_date: dt_from_str(row.get::<String, _>("due_at"))?,
        last_reviewed: row
            .get::<Option<String>, _>("last_reviewed_at")
            .map(dt_from_str)
            .transpose()?,
    })
}
