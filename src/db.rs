use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::crawler::ComicMeta;

#[derive(Debug, Clone, FromRow)]
pub struct Comic {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub language: String,
    pub url: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub active: bool,
    pub rights: String,
    pub last_crawled: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub comic_id: i64,
    pub url: String,
    pub checksum: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub fetched: String,
}

/// A release joined with the comic it belongs to, as the views need it.
#[derive(Debug, Clone, FromRow)]
pub struct Release {
    pub id: i64,
    pub comic_id: i64,
    pub pub_date: String,
    pub fetched: String,
    pub comic_slug: String,
    pub comic_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub handle: String,
    pub secret_key: String,
    pub created: String,
}

const RELEASE_COLUMNS: &str = r#"
    releases.id, releases.comic_id, releases.pub_date, releases.fetched,
    comics.slug AS comic_slug, comics.name AS comic_name
"#;

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comics (
                id INTEGER PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                language TEXT NOT NULL,
                url TEXT NOT NULL,
                start_date TEXT,
                end_date TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                rights TEXT NOT NULL DEFAULT '',
                last_crawled TEXT,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS releases (
                id INTEGER PRIMARY KEY,
                comic_id INTEGER NOT NULL REFERENCES comics(id),
                pub_date TEXT NOT NULL,
                fetched TEXT NOT NULL,
                UNIQUE(comic_id, pub_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY,
                comic_id INTEGER NOT NULL REFERENCES comics(id),
                url TEXT NOT NULL,
                checksum TEXT NOT NULL,
                title TEXT,
                text TEXT,
                fetched TEXT NOT NULL,
                UNIQUE(comic_id, checksum)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS release_images (
                release_id INTEGER NOT NULL REFERENCES releases(id),
                image_id INTEGER NOT NULL REFERENCES images(id),
                UNIQUE(release_id, image_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                secret_key TEXT NOT NULL UNIQUE,
                created TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                comic_id INTEGER NOT NULL REFERENCES comics(id),
                UNIQUE(user_id, comic_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_releases_comic_pub_date
            ON releases(comic_id, pub_date DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mirror the in-code catalog into the comics table. Crawl state columns
    /// are left alone.
    pub async fn sync_comics(&self, metas: &[ComicMeta]) -> anyhow::Result<()> {
        for meta in metas {
            sqlx::query(
                r#"
                INSERT INTO comics (slug, name, language, url, start_date, end_date, active, rights)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(slug) DO UPDATE SET
                    name = excluded.name,
                    language = excluded.language,
                    url = excluded.url,
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    active = excluded.active,
                    rights = excluded.rights
                "#,
            )
            .bind(meta.slug)
            .bind(meta.name)
            .bind(meta.language)
            .bind(meta.url)
            .bind(meta.start_date.map(date_str))
            .bind(meta.end_date.map(date_str))
            .bind(meta.active)
            .bind(meta.rights)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get_all_comics(&self) -> anyhow::Result<Vec<Comic>> {
        let comics = sqlx::query_as::<_, Comic>("SELECT * FROM comics ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(comics)
    }

    pub async fn get_comic_by_slug(&self, slug: &str) -> anyhow::Result<Option<Comic>> {
        let comic = sqlx::query_as::<_, Comic>("SELECT * FROM comics WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comic)
    }

    pub async fn update_comic_crawled(
        &self,
        comic_id: i64,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE comics SET last_crawled = ?, last_error = ? WHERE id = ?")
            .bind(&now)
            .bind(error)
            .bind(comic_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn release_exists(
        &self,
        comic_id: i64,
        pub_date: NaiveDate,
    ) -> anyhow::Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM releases WHERE comic_id = ? AND pub_date = ?")
                .bind(comic_id)
                .bind(date_str(pub_date))
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Look up an already-stored image by checksum, for rerun detection.
    pub async fn find_image(
        &self,
        comic_id: i64,
        checksum: &str,
    ) -> anyhow::Result<Option<Image>> {
        let image =
            sqlx::query_as::<_, Image>("SELECT * FROM images WHERE comic_id = ? AND checksum = ?")
                .bind(comic_id)
                .bind(checksum)
                .fetch_optional(&self.pool)
                .await?;
        Ok(image)
    }

    pub async fn insert_image(
        &self,
        comic_id: i64,
        url: &str,
        checksum: &str,
        title: Option<&str>,
        text: Option<&str>,
    ) -> anyhow::Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO images (comic_id, url, checksum, title, text, fetched)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comic_id)
        .bind(url)
        .bind(checksum)
        .bind(title)
        .bind(text)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create (or reuse) the release for a comic and date and attach images.
    pub async fn add_release(
        &self,
        comic_id: i64,
        pub_date: NaiveDate,
        image_ids: &[i64],
    ) -> anyhow::Result<i64> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO releases (comic_id, pub_date, fetched)
            VALUES (?, ?, ?)
            ON CONFLICT(comic_id, pub_date) DO NOTHING
            "#,
        )
        .bind(comic_id)
        .bind(date_str(pub_date))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let release_id: (i64,) =
            sqlx::query_as("SELECT id FROM releases WHERE comic_id = ? AND pub_date = ?")
                .bind(comic_id)
                .bind(date_str(pub_date))
                .fetch_one(&self.pool)
                .await?;

        for image_id in image_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO release_images (release_id, image_id) VALUES (?, ?)",
            )
            .bind(release_id.0)
            .bind(image_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(release_id.0)
    }

    pub async fn get_images_for_release(&self, release_id: i64) -> anyhow::Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(
            r#"
            SELECT images.* FROM images
            JOIN release_images ON release_images.image_id = images.id
            WHERE release_images.release_id = ?
            ORDER BY images.id
            "#,
        )
        .bind(release_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    pub async fn get_latest_release_for_comic(
        &self,
        comic_id: i64,
    ) -> anyhow::Result<Option<Release>> {
        let release = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            WHERE releases.comic_id = ?
            ORDER BY releases.pub_date DESC
            LIMIT 1
            "#
        ))
        .bind(comic_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(release)
    }

    pub async fn get_releases_for_comic_on(
        &self,
        comic_id: i64,
        pub_date: NaiveDate,
    ) -> anyhow::Result<Vec<Release>> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            WHERE releases.comic_id = ? AND releases.pub_date = ?
            "#
        ))
        .bind(comic_id)
        .bind(date_str(pub_date))
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    pub async fn get_releases_for_comic_in_month(
        &self,
        comic_id: i64,
        year: i32,
        month: u32,
    ) -> anyhow::Result<Vec<Release>> {
        let prefix = format!("{year:04}-{month:02}-%");
        let releases = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            WHERE releases.comic_id = ? AND releases.pub_date LIKE ?
            ORDER BY releases.pub_date
            "#
        ))
        .bind(comic_id)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    /// Distinct release dates for a comic, oldest first. Drives the
    /// first/prev/next/last navigation.
    pub async fn get_release_dates_for_comic(
        &self,
        comic_id: i64,
    ) -> anyhow::Result<Vec<String>> {
        let dates: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT pub_date FROM releases WHERE comic_id = ? ORDER BY pub_date",
        )
        .bind(comic_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dates.into_iter().map(|d| d.0).collect())
    }

    pub async fn get_release_count_for_comic(&self, comic_id: i64) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM releases WHERE comic_id = ?")
            .bind(comic_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_recent_releases_for_comic(
        &self,
        comic_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<Release>> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            WHERE releases.comic_id = ?
            ORDER BY releases.pub_date DESC
            LIMIT ?
            "#
        ))
        .bind(comic_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    pub async fn create_user(&self, handle: &str) -> anyhow::Result<User> {
        let secret_key = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO users (handle, secret_key, created) VALUES (?, ?, ?)")
            .bind(handle)
            .bind(&secret_key)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE handle = ?")
            .bind(handle)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_key(&self, secret_key: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE secret_key = ?")
            .bind(secret_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Subscribe if unsubscribed, unsubscribe if subscribed. Returns whether
    /// the user is subscribed afterwards.
    pub async fn toggle_subscription(
        &self,
        user_id: i64,
        comic_id: i64,
    ) -> anyhow::Result<bool> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM subscriptions WHERE user_id = ? AND comic_id = ?")
                .bind(user_id)
                .bind(comic_id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some((id,)) => {
                sqlx::query("DELETE FROM subscriptions WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(false)
            }
            None => {
                sqlx::query("INSERT INTO subscriptions (user_id, comic_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(comic_id)
                    .execute(&self.pool)
                    .await?;
                Ok(true)
            }
        }
    }

    pub async fn get_subscribed_comics(&self, user_id: i64) -> anyhow::Result<Vec<Comic>> {
        let comics = sqlx::query_as::<_, Comic>(
            r#"
            SELECT comics.* FROM comics
            JOIN subscriptions ON subscriptions.comic_id = comics.id
            WHERE subscriptions.user_id = ?
            ORDER BY comics.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comics)
    }

    /// Latest releases across a user's subscriptions, most recently fetched
    /// first.
    pub async fn get_latest_releases_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<Release>> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            JOIN subscriptions ON subscriptions.comic_id = releases.comic_id
            WHERE subscriptions.user_id = ?
            ORDER BY releases.fetched DESC, releases.id DESC
            LIMIT ?
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    pub async fn get_releases_for_user_on(
        &self,
        user_id: i64,
        pub_date: NaiveDate,
    ) -> anyhow::Result<Vec<Release>> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS} FROM releases
            JOIN comics ON comics.id = releases.comic_id
            JOIN subscriptions ON subscriptions.comic_id = releases.comic_id
            WHERE subscriptions.user_id = ? AND releases.pub_date = ?
            ORDER BY comics.name
            "#
        ))
        .bind(user_id)
        .bind(date_str(pub_date))
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    pub async fn get_release_dates_for_user(&self, user_id: i64) -> anyhow::Result<Vec<String>> {
        let dates: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT releases.pub_date FROM releases
            JOIN subscriptions ON subscriptions.comic_id = releases.comic_id
            WHERE subscriptions.user_id = ?
            ORDER BY releases.pub_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dates.into_iter().map(|d| d.0).collect())
    }
}
