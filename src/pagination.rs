//! Lookup of a record by business key across a paged collection.
//!
//! Nebraska's list endpoints cannot filter, so a channel (name + arch),
//! group (name) or package (version + arch) is found by walking pages.

use std::future::Future;

use tracing::{debug, trace};

use crate::api::Paginated;
use crate::error::ProviderError;

/// Page size requested from the server.
pub const PER_PAGE: u32 = 10;

/// Walk pages until `matches` accepts a record.
///
/// Page 1 is always fetched. The page count is `total_count / PER_PAGE`
/// (integer division), and further pages are fetched while nothing matched
/// and the current page is `<=` that count. A collection of 15 therefore
/// fetches pages 1 and 2, and an empty collection fetches page 1 only.
///
/// The first matching record wins. A failed fetch aborts the lookup, and an
/// exhausted walk yields [`ProviderError::NotFound`] carrying `what`.
pub async fn find_paginated<P, F, Fut, M>(
    what: &str,
    mut fetch: F,
    mut matches: M,
) -> Result<P::Item, ProviderError>
where
    P: Paginated,
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<P, ProviderError>>,
    M: FnMut(&P::Item) -> bool,
{
    let mut page = 1;
    let first = fetch(page, PER_PAGE).await?;
    let total_pages = first.total_count() / u64::from(PER_PAGE);
    debug!(total_pages, "scanning paged collection");

    let mut found = first.into_items().into_iter().find(|item| matches(item));
    while found.is_none() && u64::from(page) <= total_pages {
        page += 1;
        trace!(page, "fetching next page");
        found = fetch(page, PER_PAGE)
            .await?
            .into_items()
            .into_iter()
            .find(|item| matches(item));
    }

    found.ok_or_else(|| ProviderError::NotFound(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug)]
    struct Page {
        total: u64,
        items: Vec<u32>,
    }

    impl Paginated for Page {
        type Item = u32;

        fn total_count(&self) -> u64 {
            self.total
        }

        fn into_items(self) -> Vec<u32> {
            self.items
        }
    }

    fn collection(size: u32) -> impl Fn(u32, u32) -> Page {
        move |page, per_page| {
            let start = (page - 1) * per_page;
            let end = (start + per_page).min(size);
            Page {
                total: u64::from(size),
                items: (start..end.max(start)).collect(),
            }
        }
    }

    async fn lookup(size: u32, wanted: u32) -> (Result<u32, ProviderError>, u32) {
        let fetches = AtomicU32::new(0);
        let pages = collection(size);
        let result = find_paginated(
            "record",
            |page, per_page| {
                fetches.fetch_add(1, Ordering::SeqCst);
                let page = pages(page, per_page);
                async move { Ok::<_, ProviderError>(page) }
            },
            |item: &u32| *item == wanted,
        )
        .await;
        (result, fetches.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_match_on_second_page_of_fifteen() {
        let (result, fetches) = lookup(15, 12).await;
        assert_eq!(assert_ok!(result), 12);
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn test_match_on_first_page_fetches_once() {
        let (result, fetches) = lookup(15, 3).await;
        assert_eq!(assert_ok!(result), 3);
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn test_empty_collection_fetches_once() {
        let (result, fetches) = lookup(0, 1).await;
        assert!(matches!(assert_err!(result), ProviderError::NotFound(_)));
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_walks_one_past_page_count() {
        // 15 / 10 = 1 full page, so pages 1 and 2 are fetched.
        let (result, fetches) = lookup(15, 99).await;
        assert!(result.is_err());
        assert_eq!(fetches, 2);

        // Exact multiple: 20 / 10 = 2, so pages 1..=3 are fetched.
        let (result, fetches) = lookup(20, 99).await;
        assert!(result.is_err());
        assert_eq!(fetches, 3);
    }

    #[tokio::test]
    async fn test_remainder_page_is_reached() {
        // 25 / 10 = 2: pages 1..=3 are fetched, so the last record is found.
        let (result, fetches) = lookup(25, 24).await;
        assert_eq!(assert_ok!(result), 24);
        assert_eq!(fetches, 3);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let result = find_paginated(
            "record",
            |_, _| async {
                Ok::<_, ProviderError>(Page {
                    total: 3,
                    items: vec![7, 8, 7],
                })
            },
            |item: &u32| *item >= 7,
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts() {
        let fetches = AtomicU32::new(0);
        let result: Result<u32, _> = find_paginated(
            "record",
            |page, _| {
                fetches.fetch_add(1, Ordering::SeqCst);
                async move {
                    if page == 2 {
                        Err(ProviderError::unexpected_status("Fetching channels", 502, "bad gateway"))
                    } else {
                        Ok(Page {
                            total: 40,
                            items: vec![0; 10],
                        })
                    }
                }
            },
            |item: &u32| *item == 1,
        )
        .await;

        assert!(matches!(result, Err(ProviderError::UnexpectedStatus { status: 502, .. })));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_message() {
        let (result, _) = lookup(5, 42).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Resource not found: record"
        );
    }
}
