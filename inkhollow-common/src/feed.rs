//! Composition of the "For You" feed.
//!
//! The composer merges threads, to-be-read additions and recommendation
//! requests written by followed users into one list. It is a pure function of
//! its inputs: nothing is mutated and no I/O happens, so callers may compose
//! from shared collections as long as nobody writes to them concurrently.

use crate::{
    model::{
        Id,
        book::Book,
        recommendation::RecommendationRequest,
        thread::Thread,
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use serde::{Deserialize, Serialize};
use std::{cmp::Reverse, collections::HashSet, fmt::Display, str::FromStr};
use thiserror::Error;
use time::{Duration, UtcDateTime};
use tracing::debug;

pub const DEFAULT_TBR_SPACING: Duration = Duration::HOUR;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum FeedError {
    #[error("Invalid feed input: {0}")]
    InvalidInput(#[from] InvalidFeedInput),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidFeedInput {
    #[error("{tbr_books} to-be-read books but no users to attribute them to")]
    NoUsersForTbr { tbr_books: usize },
    #[error("synthetic timestamp for to-be-read entry {index} is out of range")]
    TbrTimestampOutOfRange { index: usize },
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown feed filter: {0:?}")]
pub struct UnknownFeedFilterError(String);

/// The users a viewer follows.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FollowSet(HashSet<Id<UserMarker>>);

impl FollowSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, user_id: Id<UserMarker>) -> bool {
        self.0.contains(&user_id)
    }

    /// Returns whether the user was newly added.
    pub fn insert(&mut self, user_id: Id<UserMarker>) -> bool {
        self.0.insert(user_id)
    }

    pub fn remove(&mut self, user_id: Id<UserMarker>) -> bool {
        self.0.remove(&user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Id<UserMarker>> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Id<UserMarker>> for FollowSet {
    fn from_iter<T: IntoIterator<Item = Id<UserMarker>>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Id<UserMarker>> for FollowSet {
    fn extend<T: IntoIterator<Item = Id<UserMarker>>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum FeedFilter {
    #[default]
    All,
    ThreadsOnly,
    TbrOnly,
    RecommendationsOnly,
}

impl FeedFilter {
    pub const ALL: [FeedFilter; 4] = [
        FeedFilter::All,
        FeedFilter::ThreadsOnly,
        FeedFilter::TbrOnly,
        FeedFilter::RecommendationsOnly,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedFilter::All => "all",
            FeedFilter::ThreadsOnly => "threads",
            FeedFilter::TbrOnly => "tbr",
            FeedFilter::RecommendationsOnly => "recommendations",
        }
    }
}

impl Display for FeedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFilter {
    type Err = UnknownFeedFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedFilter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == s)
            .ok_or_else(|| UnknownFeedFilterError(s.to_owned()))
    }
}

impl TryFrom<String> for FeedFilter {
    type Error = UnknownFeedFilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeedFilter> for &'static str {
    fn from(value: FeedFilter) -> Self {
        value.as_str()
    }
}

/// A book that appeared on someone's to-be-read list.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct TbrAddition {
    pub book: Book,
    pub user: User,
    pub occurred_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedItem {
    Thread(Thread),
    TbrAddition(TbrAddition),
    RecommendationRequest(RecommendationRequest),
}

impl FeedItem {
    /// The instant the feed is ordered by.
    #[must_use]
    pub fn occurred_at(&self) -> UtcDateTime {
        match self {
            FeedItem::Thread(thread) => thread.created_at,
            FeedItem::TbrAddition(addition) => addition.occurred_at,
            FeedItem::RecommendationRequest(request) => request.created_at,
        }
    }

    /// The user the item is shown as coming from.
    #[must_use]
    pub fn actor_id(&self) -> Id<UserMarker> {
        match self {
            FeedItem::Thread(thread) => thread.author_id,
            FeedItem::TbrAddition(addition) => addition.user.id,
            FeedItem::RecommendationRequest(request) => request.author_id,
        }
    }
}

/// Borrowed content collections a feed is composed from.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct FeedSources<'a> {
    pub threads: &'a [Thread],
    pub books: &'a [Book],
    pub recommendation_requests: &'a [RecommendationRequest],
    pub users: &'a [User],
}

/// Owned content as loaded from a repository.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FeedContent {
    pub threads: Vec<Thread>,
    pub books: Vec<Book>,
    pub recommendation_requests: Vec<RecommendationRequest>,
    pub users: Vec<User>,
}

impl FeedContent {
    #[must_use]
    pub fn sources(&self) -> FeedSources<'_> {
        FeedSources {
            threads: &self.threads,
            books: &self.books,
            recommendation_requests: &self.recommendation_requests,
            users: &self.users,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct FeedComposer {
    tbr_anchor: UtcDateTime,
    tbr_spacing: Duration,
}

impl FeedComposer {
    /// `tbr_anchor` is the timestamp given to the first to-be-read addition;
    /// every following one is one spacing older.
    #[must_use]
    pub fn new(tbr_anchor: UtcDateTime) -> Self {
        Self {
            tbr_anchor,
            tbr_spacing: DEFAULT_TBR_SPACING,
        }
    }

    #[must_use]
    pub fn with_tbr_spacing(self, tbr_spacing: PositiveDuration) -> Self {
        Self {
            tbr_spacing: tbr_spacing.get(),
            ..self
        }
    }

    /// Composes the feed for a viewer following `follow_set`.
    ///
    /// [`FeedFilter::All`] is ordered newest first, ties keeping threads before
    /// recommendation requests before to-be-read additions. The single-type
    /// filters keep the input order of their collection.
    pub fn compose(
        &self,
        sources: FeedSources<'_>,
        follow_set: &FollowSet,
        filter: FeedFilter,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let items = match filter {
            FeedFilter::All => {
                let mut items: Vec<_> = followed_threads(sources.threads, follow_set)
                    .chain(followed_requests(
                        sources.recommendation_requests,
                        follow_set,
                    ))
                    .collect();
                items.extend(self.tbr_additions(sources, follow_set)?);

                // Stable, so equal timestamps keep the concatenation order.
                items.sort_by_key(|item| Reverse(item.occurred_at()));
                items
            }
            FeedFilter::ThreadsOnly => followed_threads(sources.threads, follow_set).collect(),
            FeedFilter::TbrOnly => self.tbr_additions(sources, follow_set)?,
            FeedFilter::RecommendationsOnly => {
                followed_requests(sources.recommendation_requests, follow_set).collect()
            }
        };

        debug!(%filter, items = items.len(), "Composed feed");
        Ok(items)
    }

    // TODO: read the owner and added-at time from the TBR record once the
    // tbr_entries table carries them, and drop the synthesis below.
    fn tbr_additions(
        &self,
        sources: FeedSources<'_>,
        follow_set: &FollowSet,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let tbr_books = sources.books.iter().filter(|book| book.in_tbr);

        if sources.users.is_empty() {
            let tbr_books = tbr_books.count();
            return if tbr_books == 0 {
                Ok(Vec::new())
            } else {
                Err(InvalidFeedInput::NoUsersForTbr { tbr_books }.into())
            };
        }

        tbr_books
            .enumerate()
            .filter_map(|(index, book)| {
                let user = &sources.users[index % sources.users.len()];
                follow_set.contains(user.id).then(|| {
                    self.tbr_timestamp(index).map(|occurred_at| {
                        FeedItem::TbrAddition(TbrAddition {
                            book: book.clone(),
                            user: user.clone(),
                            occurred_at,
                        })
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(FeedError::from)
    }

    fn tbr_timestamp(&self, index: usize) -> Result<UtcDateTime, InvalidFeedInput> {
        i32::try_from(index)
            .ok()
            .and_then(|steps| self.tbr_spacing.checked_mul(steps))
            .and_then(|offset| self.tbr_anchor.checked_sub(offset))
            .ok_or(InvalidFeedInput::TbrTimestampOutOfRange { index })
    }
}

/// [`FeedComposer::compose`] with the default to-be-read spacing.
pub fn compose_feed(
    threads: &[Thread],
    books: &[Book],
    recommendation_requests: &[RecommendationRequest],
    users: &[User],
    follow_set: &FollowSet,
    filter: FeedFilter,
    tbr_anchor: UtcDateTime,
) -> Result<Vec<FeedItem>, FeedError> {
    let sources = FeedSources {
        threads,
        books,
        recommendation_requests,
        users,
    };
    FeedComposer::new(tbr_anchor).compose(sources, follow_set, filter)
}

fn followed_threads<'a>(
    threads: &'a [Thread],
    follow_set: &'a FollowSet,
) -> impl Iterator<Item = FeedItem> + 'a {
    threads
        .iter()
        .filter(|thread| follow_set.contains(thread.author_id))
        .cloned()
        .map(FeedItem::Thread)
}

fn followed_requests<'a>(
    requests: &'a [RecommendationRequest],
    follow_set: &'a FollowSet,
) -> impl Iterator<Item = FeedItem> + 'a {
    requests
        .iter()
        .filter(|request| follow_set.contains(request.author_id))
        .cloned()
        .map(FeedItem::RecommendationRequest)
}

#[cfg(test)]
mod tests {
    use crate::{
        feed::{
            FeedComposer, FeedContent, FeedError, FeedFilter, FeedItem, FeedSources, FollowSet,
            InvalidFeedInput, compose_feed,
        },
        model::{
            Id,
            book::Book,
            recommendation::RecommendationRequest,
            thread::Thread,
            user::{DisplayName, Race, User, UserMarker},
        },
        util::PositiveDuration,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    const ANCHOR: UtcDateTime = utc_datetime!(2025-06-01 12:00);

    fn user(id: u64) -> User {
        User {
            id: id.into(),
            display_name: DisplayName::new(format!("reader-{id}")).unwrap(),
            race: Race::Elf,
        }
    }

    fn thread(id: u64, author: u64, created_at: UtcDateTime) -> Thread {
        Thread {
            id: id.into(),
            author_id: author.into(),
            room_id: 1.into(),
            content: format!("thread {id}"),
            created_at,
            book_id: None,
            spoiler: false,
            mature: false,
            comment_count: 0,
        }
    }

    fn request(id: u64, author: u64, created_at: UtcDateTime) -> RecommendationRequest {
        RecommendationRequest {
            id: id.into(),
            author_id: author.into(),
            content: format!("request {id}"),
            created_at,
            response_count: 0,
        }
    }

    fn book(id: u64, in_tbr: bool) -> Book {
        Book {
            id: id.into(),
            title: format!("Book {id}"),
            author_name: "R. Quill".to_owned(),
            series: None,
            in_tbr,
        }
    }

    fn follows(ids: &[u64]) -> FollowSet {
        ids.iter().copied().map(Id::<UserMarker>::from).collect()
    }

    fn mixed_content() -> FeedContent {
        FeedContent {
            threads: vec![
                thread(10, 1, utc_datetime!(2025-05-30 08:00)),
                thread(11, 2, utc_datetime!(2025-06-01 11:30)),
                thread(12, 3, utc_datetime!(2025-05-31 09:00)),
                thread(13, 2, utc_datetime!(2025-05-29 18:00)),
            ],
            books: vec![book(20, true), book(21, false), book(22, true), book(23, true)],
            recommendation_requests: vec![
                request(30, 2, utc_datetime!(2025-05-31 09:00)),
                request(31, 3, utc_datetime!(2025-06-01 10:00)),
            ],
            users: vec![user(1), user(2), user(3)],
        }
    }

    fn compose(content: &FeedContent, follow_set: &FollowSet, filter: FeedFilter) -> Vec<FeedItem> {
        FeedComposer::new(ANCHOR)
            .compose(content.sources(), follow_set, filter)
            .unwrap()
    }

    fn thread_ids(items: &[FeedItem]) -> Vec<u64> {
        items
            .iter()
            .filter_map(|item| match item {
                FeedItem::Thread(thread) => Some(thread.id.into()),
                _ => None,
            })
            .collect()
    }

    fn request_ids(items: &[FeedItem]) -> Vec<u64> {
        items
            .iter()
            .filter_map(|item| match item {
                FeedItem::RecommendationRequest(request) => Some(request.id.into()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn composition_is_deterministic() {
        let content = mixed_content();
        let follow_set = follows(&[1, 2, 3]);

        for filter in FeedFilter::ALL {
            assert_eq!(
                compose(&content, &follow_set, filter),
                compose(&content, &follow_set, filter)
            );
        }
    }

    #[test]
    fn only_followed_authors_appear() {
        let content = mixed_content();
        let follow_set = follows(&[2]);

        let threads = compose(&content, &follow_set, FeedFilter::ThreadsOnly);
        assert_eq!(thread_ids(&threads), [11, 13]);
        assert!(threads.iter().all(|item| follow_set.contains(item.actor_id())));

        let all = compose(&content, &follow_set, FeedFilter::All);
        assert!(all.iter().all(|item| follow_set.contains(item.actor_id())));
    }

    #[test]
    fn mixed_feed_is_newest_first() {
        let content = mixed_content();
        let items = compose(&content, &follows(&[1, 2, 3]), FeedFilter::All);

        assert_eq!(items.len(), 4 + 2 + 3);
        for pair in items.windows(2) {
            assert!(pair[0].occurred_at() >= pair[1].occurred_at());
        }
    }

    #[test]
    fn mixed_feed_neither_drops_nor_duplicates() {
        let content = mixed_content();
        let follow_set = follows(&[2, 3]);

        let all = compose(&content, &follow_set, FeedFilter::All);
        let threads = compose(&content, &follow_set, FeedFilter::ThreadsOnly);
        let requests = compose(&content, &follow_set, FeedFilter::RecommendationsOnly);

        let mut all_threads = thread_ids(&all);
        let mut only_threads = thread_ids(&threads);
        all_threads.sort_unstable();
        only_threads.sort_unstable();
        assert_eq!(all_threads, only_threads);

        let mut all_requests = request_ids(&all);
        let mut only_requests = request_ids(&requests);
        all_requests.sort_unstable();
        only_requests.sort_unstable();
        assert_eq!(all_requests, only_requests);
    }

    #[test]
    fn empty_input_gives_empty_feed() {
        for follow_set in [follows(&[]), follows(&[1, 2])] {
            let items = compose_feed(&[], &[], &[], &[], &follow_set, FeedFilter::All, ANCHOR);
            assert_eq!(items, Ok(Vec::new()));
        }
    }

    #[test]
    fn newer_thread_precedes_older_request() {
        let threads = [thread(1, 2, utc_datetime!(2025-05-02 00:00))];
        let requests = [request(2, 2, utc_datetime!(2025-05-01 00:00))];

        let items = compose_feed(
            &threads,
            &[],
            &requests,
            &[user(2)],
            &follows(&[2]),
            FeedFilter::All,
            ANCHOR,
        )
        .unwrap();

        assert_eq!(
            items,
            [
                FeedItem::Thread(threads[0].clone()),
                FeedItem::RecommendationRequest(requests[0].clone()),
            ]
        );
    }

    #[test]
    fn nobody_followed_gives_empty_feeds() {
        let content = mixed_content();

        for filter in FeedFilter::ALL {
            assert!(compose(&content, &FollowSet::new(), filter).is_empty());
        }
    }

    #[test]
    fn tbr_entries_are_attributed_round_robin() {
        let books = [book(1, true), book(2, true)];
        let users = [user(7)];

        let items = compose_feed(
            &[],
            &books,
            &[],
            &users,
            &follows(&[7]),
            FeedFilter::TbrOnly,
            ANCHOR,
        )
        .unwrap();

        let [FeedItem::TbrAddition(first), FeedItem::TbrAddition(second)] = items.as_slice()
        else {
            panic!("expected two tbr additions, got {items:?}");
        };
        assert_eq!(first.book, books[0]);
        assert_eq!(second.book, books[1]);
        assert_eq!(first.user, users[0]);
        assert_eq!(second.user, users[0]);
        assert!(first.occurred_at > second.occurred_at);
        assert_eq!(first.occurred_at, ANCHOR);
    }

    #[test]
    fn tbr_attribution_skips_unfollowed_users() {
        let books = [book(1, true), book(2, false), book(3, true), book(4, true)];
        let users = [user(1), user(2)];
        let composer = FeedComposer::new(ANCHOR)
            .with_tbr_spacing(PositiveDuration::from_minutes(10).unwrap());
        let sources = FeedSources {
            books: &books,
            users: &users,
            ..FeedSources::default()
        };

        let items = composer
            .compose(sources, &follows(&[2]), FeedFilter::TbrOnly)
            .unwrap();

        // TBR indices 0, 1, 2 map to users 1, 2, 1; only index 1 (book 3) survives.
        assert_eq!(items.len(), 1);
        let FeedItem::TbrAddition(addition) = &items[0] else {
            panic!("expected a tbr addition");
        };
        assert_eq!(addition.book.id, Id::from(3));
        assert_eq!(addition.user.id, Id::from(2));
        assert_eq!(addition.occurred_at, ANCHOR - Duration::minutes(10));
    }

    #[test]
    fn tbr_without_users_is_invalid_input() {
        let books = [book(1, true)];

        for filter in [FeedFilter::All, FeedFilter::TbrOnly] {
            assert_eq!(
                compose_feed(&[], &books, &[], &[], &follows(&[1]), filter, ANCHOR),
                Err(FeedError::InvalidInput(InvalidFeedInput::NoUsersForTbr {
                    tbr_books: 1
                }))
            );
        }
    }

    #[test]
    fn tbr_free_views_ignore_missing_users() {
        let books = [book(1, true)];
        let threads = [thread(2, 1, ANCHOR)];

        let items = compose_feed(
            &threads,
            &books,
            &[],
            &[],
            &follows(&[1]),
            FeedFilter::ThreadsOnly,
            ANCHOR,
        );
        assert_eq!(items.map(|items| items.len()), Ok(1));

        let not_in_tbr = [book(3, false)];
        let items = compose_feed(&[], &not_in_tbr, &[], &[], &follows(&[1]), FeedFilter::All, ANCHOR);
        assert_eq!(items, Ok(Vec::new()));
    }

    #[test]
    fn equal_timestamps_keep_kind_order() {
        let threads = [thread(1, 1, ANCHOR)];
        let requests = [request(2, 1, ANCHOR)];
        let books = [book(3, true)];
        let users = [user(1)];

        let items = compose_feed(
            &threads,
            &books,
            &requests,
            &users,
            &follows(&[1]),
            FeedFilter::All,
            ANCHOR,
        )
        .unwrap();

        assert!(matches!(
            items.as_slice(),
            [
                FeedItem::Thread(_),
                FeedItem::RecommendationRequest(_),
                FeedItem::TbrAddition(_)
            ]
        ));
    }

    #[test]
    fn single_type_views_keep_input_order() {
        let content = mixed_content();
        let follow_set = follows(&[1, 2, 3]);

        let threads = compose(&content, &follow_set, FeedFilter::ThreadsOnly);
        assert_eq!(thread_ids(&threads), [10, 11, 12, 13]);

        let requests = compose(&content, &follow_set, FeedFilter::RecommendationsOnly);
        assert_eq!(request_ids(&requests), [30, 31]);
    }

    #[test]
    fn filter_names() {
        for filter in FeedFilter::ALL {
            assert_eq!(filter.as_str().parse::<FeedFilter>(), Ok(filter));
        }
        assert!("everything".parse::<FeedFilter>().is_err());
        assert_eq!(
            serde_json::from_str::<FeedFilter>("\"tbr\"").unwrap(),
            FeedFilter::TbrOnly
        );
        assert!(serde_json::from_str::<FeedFilter>("\"Tbr\"").is_err());
    }

    #[test]
    fn items_are_tagged_by_kind() {
        let item = FeedItem::RecommendationRequest(request(5, 1, ANCHOR));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "recommendation_request");
        assert_eq!(json["content"], "request 5");
    }
}
