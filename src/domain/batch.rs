//! Market-id batching.
//!
//! The market-data API accepts a bounded number of ids per request. `split`
//! cuts an arbitrary id list into request-sized groups, keeping input order.

/// Maximum market ids per `listMarketBook` request.
pub const MARKET_BOOK_BATCH_LIMIT: usize = 40;

/// Splits `ids` into consecutive groups of at most `limit` elements.
///
/// Only the last group may be shorter than `limit`; no group is empty and
/// concatenating the groups yields `ids`. A `limit` of 0 behaves as 1.
pub fn split<T: Clone>(ids: &[T], limit: usize) -> Vec<Vec<T>> {
    ids.chunks(limit.max(1)).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(split::<i64>(&[], MARKET_BOOK_BATCH_LIMIT).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let ids: Vec<i64> = (0..80).collect();
        let groups = split(&ids, MARKET_BOOK_BATCH_LIMIT);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 40));
    }

    #[test]
    fn tail_group_carries_remainder() {
        let ids: Vec<i64> = (0..85).collect();
        let groups = split(&ids, MARKET_BOOK_BATCH_LIMIT);
        assert_eq!(
            groups.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![40, 40, 5]
        );
        assert_eq!(groups.concat(), ids);
    }

    #[test]
    fn zero_limit_degrades_to_singletons() {
        let groups = split(&[1, 2, 3], 0);
        assert_eq!(groups, vec![vec![1], vec![2], vec![3]]);
    }
}
