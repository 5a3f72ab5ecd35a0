//! Look-ahead window planning.

use crate::types::ReadingMode;

/// Pages (1-based) to preload around `current_page`: the current page, its partner in paired
/// mode, and the next `look_ahead` pages, never beyond `total_pages`. Order is load priority.
pub fn plan_look_ahead(
    current_page: u32,
    total_pages: u32,
    mode: ReadingMode,
    look_ahead: u32,
) -> Vec<u32> {
    if total_pages == 0 || current_page == 0 || current_page > total_pages {
        return Vec::new();
    }

    let mut pages = vec![current_page];
    if mode.layout().pair_with_next && current_page < total_pages {
        pages.push(current_page + 1);
    }

    let last = current_page.saturating_add(look_ahead).min(total_pages);
    for page in (current_page + 1)..=last {
        if !pages.contains(&page) {
            pages.push(page);
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mode_loads_current_and_three_ahead() {
        assert_eq!(plan_look_ahead(4, 20, ReadingMode::Single, 3), vec![4, 5, 6, 7]);
    }

    #[test]
    fn window_is_bounded_by_total() {
        assert_eq!(plan_look_ahead(9, 10, ReadingMode::Vertical, 3), vec![9, 10]);
        assert_eq!(plan_look_ahead(10, 10, ReadingMode::Double, 3), vec![10]);
    }

    #[test]
    fn paired_mode_includes_partner_once() {
        assert_eq!(plan_look_ahead(1, 10, ReadingMode::Double, 3), vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_chapter_plans_nothing() {
        assert!(plan_look_ahead(1, 0, ReadingMode::Single, 3).is_empty());
    }
}
