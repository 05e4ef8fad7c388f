//! Cursor-following pagination shared by every listing call.

use crate::error::Result;

/// Page size requested from every paginated endpoint.
pub const PAGE_SIZE: u16 = 200;

/// One page of results plus the cursor for the next one, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            // an empty cursor means "no more pages"
            next_cursor: next_cursor.filter(|c| !c.is_empty()),
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Fetch pages until the cursor runs out, handing each page to `on_page` as it arrives.
pub fn for_each_page<T, F, P>(mut fetch: F, mut on_page: P) -> Result<()>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
    P: FnMut(Vec<T>) -> Result<()>,
{
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch(cursor.as_deref())?;
        on_page(page.items)?;

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(())
}

/// Fetch every page and return all items in arrival order.
pub fn collect_all<T, F>(fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
{
    let mut all = Vec::new();
    for_each_page(fetch, |items| {
        all.extend(items);
        Ok(())
    })?;
    Ok(all)
}
