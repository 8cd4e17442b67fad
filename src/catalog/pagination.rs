//! Walking every page of a filtered collection listing.

use super::{CatalogClient, Collection, Query, Record};
use crate::error::Result;

/// Number of pages needed for `num_results` matches
///
/// Always at least 1: the first page is fetched even when nothing matches.
pub fn page_count(num_results: u64, results_per_page: u32) -> u32 {
    let per_page = u64::from(results_per_page.max(1));
    let pages = num_results.div_ceil(per_page).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Fetch every object matching `query` in `collection`
///
/// Page 1 is always requested; its `num_results` decides how many more pages
/// follow (pages `2..=ceil(num_results / results_per_page)`). Walking stops
/// early if a page comes back empty. A mismatch between the collected count
/// and `num_results` is logged but not treated as an error.
///
/// # Errors
///
/// The first failing page aborts the walk; records from earlier pages are
/// discarded so callers never mistake a partial listing for a complete one.
pub async fn fetch_all(
    client: &dyn CatalogClient,
    collection: Collection,
    query: &Query,
    results_per_page: u32,
) -> Result<Vec<Record>> {
    let first = client.list_page(collection, query, 1, results_per_page).await?;
    let num_results = first.num_results;
    let num_pages = page_count(num_results, results_per_page);

    let mut records = first.objects;
    tracing::debug!(
        collection = %collection,
        num_results,
        num_pages,
        "fetched first page"
    );

    for page in 2..=num_pages {
        let next = client.list_page(collection, query, page, results_per_page).await?;
        if next.objects.is_empty() {
            tracing::warn!(
                collection = %collection,
                page,
                num_pages,
                "page came back empty, stopping early"
            );
            break;
        }
        records.extend(next.objects);
    }

    if records.len() as u64 != num_results {
        tracing::warn!(
            collection = %collection,
            expected = num_results,
            collected = records.len(),
            "listing count does not match num_results"
        );
    }

    Ok(records)
}
