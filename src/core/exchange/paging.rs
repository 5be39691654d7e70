//! Cursor pagination over the exchange API.
//!
//! Iteration is modeled as a lazy walk over a page-fetch closure: callers
//! observe pages sequentially, may abandon at any point, and can restart
//! from any cursor (but not from the middle of a page).

use std::future::Future;

use tracing::warn;

use crate::error::Result;

/// One page of results plus the continuation cursor. An absent or empty
/// cursor marks the final page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self {
            items,
            // Servers signal completion with an empty cursor string.
            cursor: cursor.filter(|c| !c.is_empty()),
        }
    }

    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }
}

/// Result of walking pages to completion or to a caller-imposed cap.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    /// Set when `max_pages` stopped the walk while the server still had more;
    /// carries the cursor the walk can be restarted from.
    pub truncated_at: Option<String>,
}

/// Walk pages from `start_cursor` until exhaustion or `max_pages`.
///
/// When the cap is hit with a non-empty cursor outstanding, exactly one
/// structured warning is emitted carrying that cursor, and everything fetched
/// so far is returned. No error is raised.
pub async fn collect_pages<T, F, Fut>(
    op: &'static str,
    start_cursor: Option<String>,
    max_pages: Option<u32>,
    mut fetch: F,
) -> Result<Collected<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = start_cursor;
    let mut pages_fetched = 0u32;

    loop {
        if let Some(cap) = max_pages {
            if pages_fetched >= cap {
                if let Some(last_cursor) = cursor.as_deref() {
                    warn!(
                        op,
                        max_pages = cap,
                        cursor = last_cursor,
                        "pagination stopped at max_pages with more results available"
                    );
                    return Ok(Collected {
                        items,
                        pages_fetched,
                        truncated_at: cursor,
                    });
                }
                break;
            }
        }

        let page = fetch(cursor.take()).await?;
        pages_fetched += 1;
        items.extend(page.items);

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(Collected {
        items,
        pages_fetched,
        truncated_at: None,
    })
}
