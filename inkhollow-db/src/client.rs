use crate::record::{
    BookRecord, RecommendationRequestRecord, RoomRecord, ThreadRecord, UserRecord,
};
use inkhollow_common::{
    feed::{FeedContent, FollowSet},
    model::{
        Id, InkhollowSnowflake, InkhollowSnowflakeGenerator, ModelValidationError,
        book::Book,
        recommendation::{CreateRecommendationRequest, RecommendationRequest},
        room::Room,
        thread::{CreateThread, Thread, ThreadMarker},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::{ProcessId, SnowflakeTimeError, WorkerId},
};
use sqlx::{
    PgPool, migrate::MigrateError, postgres::PgPoolOptions, query, query_as, query_scalar,
};
use std::{
    num::NonZeroU32,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::{PrimitiveDateTime, UtcDateTime};
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not mint a snowflake: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Read and write access to inkhollow's content, users and follow relations.
#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<InkhollowSnowflakeGenerator>,
}

fn to_db_time(time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(time.date(), time.time())
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(InkhollowSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(url: &str, worker_id: WorkerId, process_id: ProcessId) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    /// Creates a client whose pool only connects once a query needs it.
    pub fn connect_lazy(url: &str, worker_id: WorkerId, process_id: ProcessId) -> Result<Self> {
        let pool = PgPoolOptions::new().connect_lazy(url)?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn generate_snowflake(&self, time: UtcDateTime) -> Result<InkhollowSnowflake> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_at(time)?;
        Ok(snowflake)
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.display_name,
                users.race
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// The oldest `limit` users.
    pub async fn fetch_users(&self, limit: NonZeroU32) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.display_name,
                users.race
            FROM
                users.users
            ORDER BY
                users.user_snowflake
            LIMIT $1
            ",
        )
        .bind(i64::from(limit.get()))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_snowflake = self.generate_snowflake(UtcDateTime::now())?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_snowflake, display_name, race)
            VALUES ($1, $2, $3)
            RETURNING user_snowflake, display_name, race
            ",
        )
        .bind(user_snowflake.get().cast_signed())
        .bind(user.display_name.get())
        .bind(user.race.as_str())
        .fetch_one(&self.pool)
        .await?;

        debug!(user = %user_snowflake, "Created user");
        Ok(record.try_into()?)
    }

    pub async fn fetch_follow_set(&self, follower: Id<UserMarker>) -> Result<FollowSet> {
        let followees = query_scalar::<_, i64>(
            "
            SELECT
                follows.followee_snowflake
            FROM
                users.follows
            WHERE
                follows.follower_snowflake = $1
            ",
        )
        .bind(follower.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(followees.into_iter().map(Id::from_db).collect())
    }

    /// Returns `false` if `follower` already followed `followee`.
    pub async fn follow_user(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            INSERT INTO users.follows (follower_snowflake, followee_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follower.to_db())
        .bind(followee.to_db())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns `false` if `follower` did not follow `followee`.
    pub async fn unfollow_user(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            DELETE FROM users.follows
            WHERE follower_snowflake = $1 AND followee_snowflake = $2
            ",
        )
        .bind(follower.to_db())
        .bind(followee.to_db())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn fetch_rooms(&self) -> Result<Vec<Room>> {
        let records = query_as::<_, RoomRecord>(
            "
            SELECT
                rooms.room_snowflake,
                rooms.name
            FROM
                content.rooms
            ORDER BY
                rooms.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Room::from).collect())
    }

    pub async fn fetch_thread(&self, thread_id: Id<ThreadMarker>) -> Result<Option<Thread>> {
        let record = query_as::<_, ThreadRecord>(
            "
            SELECT
                threads.thread_snowflake,
                threads.user_snowflake,
                threads.room_snowflake,
                threads.content,
                threads.created_at,
                threads.book_snowflake,
                threads.spoiler,
                threads.mature,
                (
                    SELECT COUNT(*) FROM content.thread_comments comments
                    WHERE comments.thread_snowflake = threads.thread_snowflake
                ) AS comment_count
            FROM
                content.threads
            WHERE
                threads.thread_snowflake = $1
            ",
        )
        .bind(thread_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let thread = record.map(Thread::try_from).transpose()?;
        Ok(thread)
    }

    /// The newest `limit` threads, newest first.
    ///
    /// With `followed_by` set, only threads by users that `followed_by` follows
    /// are considered, so the limit never crowds them out.
    pub async fn fetch_recent_threads(
        &self,
        followed_by: Option<Id<UserMarker>>,
        limit: NonZeroU32,
    ) -> Result<Vec<Thread>> {
        let records = query_as::<_, ThreadRecord>(
            "
            SELECT
                threads.thread_snowflake,
                threads.user_snowflake,
                threads.room_snowflake,
                threads.content,
                threads.created_at,
                threads.book_snowflake,
                threads.spoiler,
                threads.mature,
                (
                    SELECT COUNT(*) FROM content.thread_comments comments
                    WHERE comments.thread_snowflake = threads.thread_snowflake
                ) AS comment_count
            FROM
                content.threads
            WHERE
                $1::BIGINT IS NULL
                OR threads.user_snowflake IN (
                    SELECT follows.followee_snowflake FROM users.follows
                    WHERE follows.follower_snowflake = $1
                )
            ORDER BY
                threads.created_at DESC
            LIMIT $2
            ",
        )
        .bind(followed_by.map(Id::to_db))
        .bind(i64::from(limit.get()))
        .fetch_all(&self.pool)
        .await?;

        let threads = records
            .into_iter()
            .map(Thread::try_from)
            .collect::<Result<_, _>>()?;
        Ok(threads)
    }

    pub async fn create_thread(
        &self,
        author: Id<UserMarker>,
        thread: &CreateThread,
    ) -> Result<Thread> {
        let created_at = UtcDateTime::now();
        let thread_snowflake = self.generate_snowflake(created_at)?;

        let record = query_as::<_, ThreadRecord>(
            "
            INSERT INTO content.threads (
                thread_snowflake, user_snowflake, room_snowflake, content,
                created_at, book_snowflake, spoiler, mature
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                thread_snowflake, user_snowflake, room_snowflake, content,
                created_at, book_snowflake, spoiler, mature,
                0::BIGINT AS comment_count
            ",
        )
        .bind(thread_snowflake.get().cast_signed())
        .bind(author.to_db())
        .bind(thread.room_id.to_db())
        .bind(&thread.content)
        .bind(to_db_time(created_at))
        .bind(thread.book_id.map(Id::to_db))
        .bind(thread.spoiler)
        .bind(thread.mature)
        .fetch_one(&self.pool)
        .await?;

        debug!(thread = %thread_snowflake, %author, "Created thread");
        Ok(record.try_into()?)
    }

    /// All books, with `in_tbr` resolved against `viewer`'s to-be-read list.
    pub async fn fetch_books(&self, viewer: Id<UserMarker>) -> Result<Vec<Book>> {
        let records = query_as::<_, BookRecord>(
            "
            SELECT
                books.book_snowflake,
                books.title,
                books.author_name,
                books.series_name,
                books.series_position,
                EXISTS (
                    SELECT 1 FROM users.tbr_entries tbr
                    WHERE tbr.book_snowflake = books.book_snowflake
                        AND tbr.user_snowflake = $1
                ) AS in_tbr
            FROM
                content.books
            ORDER BY
                books.title, books.book_snowflake
            ",
        )
        .bind(viewer.to_db())
        .fetch_all(&self.pool)
        .await?;

        let books = records
            .into_iter()
            .map(Book::try_from)
            .collect::<Result<_, _>>()?;
        Ok(books)
    }

    /// The newest `limit` recommendation requests by users `follower` follows,
    /// newest first.
    pub async fn fetch_followed_recommendation_requests(
        &self,
        follower: Id<UserMarker>,
        limit: NonZeroU32,
    ) -> Result<Vec<RecommendationRequest>> {
        let records = query_as::<_, RecommendationRequestRecord>(
            "
            SELECT
                requests.request_snowflake,
                requests.user_snowflake,
                requests.content,
                requests.created_at,
                (
                    SELECT COUNT(*) FROM content.recommendation_responses responses
                    WHERE responses.request_snowflake = requests.request_snowflake
                ) AS response_count
            FROM
                content.recommendation_requests requests
            WHERE
                requests.user_snowflake IN (
                    SELECT follows.followee_snowflake FROM users.follows
                    WHERE follows.follower_snowflake = $1
                )
            ORDER BY
                requests.created_at DESC
            LIMIT $2
            ",
        )
        .bind(follower.to_db())
        .bind(i64::from(limit.get()))
        .fetch_all(&self.pool)
        .await?;

        let requests = records
            .into_iter()
            .map(RecommendationRequest::try_from)
            .collect::<Result<_, _>>()?;
        Ok(requests)
    }

    pub async fn create_recommendation_request(
        &self,
        author: Id<UserMarker>,
        request: &CreateRecommendationRequest,
    ) -> Result<RecommendationRequest> {
        let created_at = UtcDateTime::now();
        let request_snowflake = self.generate_snowflake(created_at)?;

        let record = query_as::<_, RecommendationRequestRecord>(
            "
            INSERT INTO content.recommendation_requests (
                request_snowflake, user_snowflake, content, created_at
            )
            VALUES ($1, $2, $3, $4)
            RETURNING
                request_snowflake, user_snowflake, content, created_at,
                0::BIGINT AS response_count
            ",
        )
        .bind(request_snowflake.get().cast_signed())
        .bind(author.to_db())
        .bind(&request.content)
        .bind(to_db_time(created_at))
        .fetch_one(&self.pool)
        .await?;

        debug!(request = %request_snowflake, %author, "Created recommendation request");
        Ok(record.try_into()?)
    }

    /// Everything a feed for `viewer` is composed from.
    ///
    /// Threads and recommendation requests are narrowed to followed authors
    /// before `limit` applies.
    pub async fn fetch_feed_content(
        &self,
        viewer: Id<UserMarker>,
        limit: NonZeroU32,
    ) -> Result<FeedContent> {
        Ok(FeedContent {
            threads: self.fetch_recent_threads(Some(viewer), limit).await?,
            books: self.fetch_books(viewer).await?,
            recommendation_requests: self
                .fetch_followed_recommendation_requests(viewer, limit)
                .await?,
            users: self.fetch_users(limit).await?,
        })
    }
}
