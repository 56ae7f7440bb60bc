//! Media library search, as used by the featured-image picker.
//!
//! The library itself is remote and paginated. [`MediaSearch`] debounces
//! search-as-you-type input, restarts at page one for every new query and
//! discards pages that arrive for a query the user has already typed past.

use std::future::Future;
use std::time::Duration;

use resh_common::StoreError;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::timer::TimerRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: u64,
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    pub total_pages: u32,
}

/// Paginated remote media catalogue. Pages start at 1.
pub trait MediaLibrary {
    fn list_media(
        &self,
        query: &str,
        page: u32,
    ) -> impl Future<Output = Result<MediaPage, StoreError>> + Send;
}

impl<L: MediaLibrary + Sync> MediaLibrary for &L {
    fn list_media(
        &self,
        query: &str,
        page: u32,
    ) -> impl Future<Output = Result<MediaPage, StoreError>> + Send {
        (**self).list_media(query, page)
    }
}

/// One page request issued by [`MediaSearch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub query: String,
    pub page: u32,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchTimer {
    Query,
}

#[derive(Debug)]
pub struct MediaSearch {
    debounce: Duration,
    input: String,
    /// Query string of the current generation; later pages reuse it.
    issued: String,
    /// Bumped for every query that is actually issued.
    generation: u64,
    page: u32,
    total_pages: u32,
    items: Vec<MediaItem>,
    timers: TimerRegistry<SearchTimer>,
}

impl MediaSearch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            input: String::new(),
            issued: String::new(),
            generation: 0,
            page: 0,
            total_pages: 0,
            items: Vec::new(),
            timers: TimerRegistry::new(),
        }
    }

    /// Record new search input. The query is issued once input has been
    /// quiet for the debounce window.
    pub fn input(&mut self, query: impl Into<String>, now: Instant) {
        self.input = query.into();
        self.timers.schedule_after(SearchTimer::Query, now, self.debounce);
    }

    /// Issue the first page for the latest input, if the window elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<MediaQuery> {
        if !self.timers.fire_due(now).contains(&SearchTimer::Query) {
            return None;
        }
        self.generation += 1;
        self.page = 0;
        self.total_pages = 0;
        self.items.clear();
        self.issued = self.input.trim().to_owned();
        tracing::debug!(query = %self.issued, generation = self.generation, "media search");
        Some(MediaQuery {
            query: self.issued.clone(),
            page: 1,
            generation: self.generation,
        })
    }

    /// Request the page after the last one accepted for the current query.
    pub fn next_page(&self) -> Option<MediaQuery> {
        if self.page == 0 || self.page >= self.total_pages {
            return None;
        }
        Some(MediaQuery {
            query: self.issued.clone(),
            page: self.page + 1,
            generation: self.generation,
        })
    }

    /// Store a page of results. Returns false, leaving results untouched,
    /// when the page belongs to a superseded query.
    pub fn accept(&mut self, request: &MediaQuery, page: MediaPage) -> bool {
        if request.generation != self.generation || request.page != self.page + 1 {
            tracing::trace!(page = request.page, "dropping stale media page");
            return false;
        }
        self.page = request.page;
        self.total_pages = page.total_pages;
        self.items.extend(page.items);
        true
    }

    /// Run the due query against `library`. Returns whether results changed.
    pub async fn search_due<L: MediaLibrary>(
        &mut self,
        library: &L,
        now: Instant,
    ) -> Result<bool, StoreError> {
        let Some(request) = self.poll(now) else {
            return Ok(false);
        };
        let page = library.list_media(&request.query, request.page).await?;
        Ok(self.accept(&request, page))
    }

    pub async fn load_more<L: MediaLibrary>(&mut self, library: &L) -> Result<bool, StoreError> {
        let Some(request) = self.next_page() else {
            return Ok(false);
        };
        let page = library.list_media(&request.query, request.page).await?;
        Ok(self.accept(&request, page))
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn find(&self, id: u64) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn has_more(&self) -> bool {
        self.next_page().is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn teardown(&mut self) {
        self.timers.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn item(id: u64) -> MediaItem {
        MediaItem {
            id,
            url: format!("https://media.test/{id}.jpg"),
            thumbnail_url: format!("https://media.test/{id}-150.jpg"),
            title: format!("Image {id}"),
        }
    }

    /// Three images per page, titles matched by substring.
    struct Catalogue(Vec<MediaItem>);

    impl MediaLibrary for Catalogue {
        async fn list_media(&self, query: &str, page: u32) -> Result<MediaPage, StoreError> {
            let hits: Vec<_> = self
                .0
                .iter()
                .filter(|item| item.title.contains(query))
                .cloned()
                .collect();
            let total_pages = hits.len().div_ceil(3) as u32;
            let items = hits
                .into_iter()
                .skip((page.saturating_sub(1) * 3) as usize)
                .take(3)
                .collect();
            Ok(MediaPage { items, total_pages })
        }
    }

    #[test]
    fn typing_debounces_to_latest_query() {
        let t0 = Instant::now();
        let mut search = MediaSearch::new(ms(500));
        search.input("ri", t0);
        search.input("riv", t0 + ms(200));
        search.input("river", t0 + ms(400));
        assert!(search.poll(t0 + ms(600)).is_none());

        let query = search.poll(t0 + ms(900)).unwrap();
        assert_eq!(query.query, "river");
        assert_eq!(query.page, 1);
        assert!(search.poll(t0 + ms(2000)).is_none());
    }

    #[test]
    fn stale_pages_are_dropped() {
        let t0 = Instant::now();
        let mut search = MediaSearch::new(ms(500));
        search.input("old", t0);
        let old = search.poll(t0 + ms(500)).unwrap();
        search.input("new", t0 + ms(600));
        let new = search.poll(t0 + ms(1100)).unwrap();

        let page = MediaPage {
            items: vec![item(1)],
            total_pages: 1,
        };
        assert!(!search.accept(&old, page.clone()));
        assert!(search.items().is_empty());
        assert!(search.accept(&new, page));
        assert_eq!(search.items().len(), 1);
    }

    #[test]
    fn new_query_resets_to_first_page() {
        let t0 = Instant::now();
        let mut search = MediaSearch::new(ms(500));
        search.input("a", t0);
        let first = search.poll(t0 + ms(500)).unwrap();
        search.accept(
            &first,
            MediaPage {
                items: vec![item(1), item(2)],
                total_pages: 4,
            },
        );
        assert_eq!(search.next_page().unwrap().page, 2);

        search.input("b", t0 + ms(600));
        let second = search.poll(t0 + ms(1100)).unwrap();
        assert_eq!(second.page, 1);
        assert!(search.items().is_empty());
        assert_eq!(search.page(), 0);
    }

    #[test]
    fn load_more_keeps_the_issued_query_while_typing() {
        let t0 = Instant::now();
        let mut search = MediaSearch::new(ms(500));
        search.input("river", t0);
        let first = search.poll(t0 + ms(500)).unwrap();
        assert!(search.accept(
            &first,
            MediaPage {
                items: vec![item(1), item(2), item(3)],
                total_pages: 3,
            },
        ));

        // debounce for the new input has not elapsed yet
        search.input("mountain", t0 + ms(600));
        let next = search.next_page().unwrap();
        assert_eq!(next.query, "river");
        assert_eq!(next.page, 2);
        assert!(search.accept(
            &next,
            MediaPage {
                items: vec![item(4)],
                total_pages: 3,
            },
        ));

        let fresh = search.poll(t0 + ms(1100)).unwrap();
        assert_eq!(fresh.query, "mountain");
        assert!(!search.accept(&next, MediaPage::default()));
    }

    #[tokio::test]
    async fn pages_through_a_library() {
        let library = Catalogue((1..=7).map(item).collect());
        let t0 = Instant::now();
        let mut search = MediaSearch::new(ms(500));
        search.input("Image", t0);

        assert!(!search.search_due(&library, t0 + ms(100)).await.unwrap());
        assert!(search.search_due(&library, t0 + ms(500)).await.unwrap());
        assert_eq!(search.items().len(), 3);
        assert_eq!(search.total_pages(), 3);

        assert!(search.load_more(&library).await.unwrap());
        assert!(search.load_more(&library).await.unwrap());
        assert!(!search.has_more());
        assert!(!search.load_more(&library).await.unwrap());
        assert_eq!(search.items().len(), 7);
        assert_eq!(search.find(7).unwrap().title, "Image 7");
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(item(3)).unwrap();
        assert_eq!(json["thumbnailUrl"], "https://media.test/3-150.jpg");
        let page: MediaPage =
            serde_json::from_str(r#"{"items":[],"totalPages":0}"#).unwrap();
        assert_eq!(page, MediaPage::default());
    }
}
