pub mod health;
pub mod messages;
pub mod threads;

/// Whether a paginated listing has rows beyond the returned page.
pub(crate) fn has_more(offset: u64, returned: usize, total: u64) -> bool {
    (offset + returned as u64) < total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_pagination_boundaries() {
        assert!(has_more(0, 20, 21));
        assert!(!has_more(0, 20, 20));
        assert!(!has_more(20, 1, 21));
        assert!(has_more(10, 5, 16));
        assert!(!has_more(0, 0, 0));
    }
}
