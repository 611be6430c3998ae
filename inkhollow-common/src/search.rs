//! Case-insensitive substring search over already loaded content.

use crate::model::{book::Book, thread::Thread};

/// A normalized search needle. Blank queries match everything.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SearchQuery(Option<String>);

impl SearchQuery {
    #[must_use]
    pub fn new(query: &str) -> Self {
        let trimmed = query.trim();
        Self((!trimmed.is_empty()).then(|| trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_none()
    }

    #[must_use]
    pub fn matches(&self, haystack: &str) -> bool {
        self.0
            .as_deref()
            .is_none_or(|needle| haystack.to_lowercase().contains(needle))
    }

    #[must_use]
    pub fn matches_book(&self, book: &Book) -> bool {
        self.matches(&book.title)
            || self.matches(&book.author_name)
            || book
                .series
                .as_ref()
                .is_some_and(|series| self.matches(&series.name))
    }
}

pub fn search_books<'a>(books: &'a [Book], query: &SearchQuery) -> Vec<&'a Book> {
    books.iter().filter(|book| query.matches_book(book)).collect()
}

pub fn search_threads<'a>(threads: &'a [Thread], query: &SearchQuery) -> Vec<&'a Thread> {
    threads
        .iter()
        .filter(|thread| query.matches(&thread.content))
        .collect()
}
