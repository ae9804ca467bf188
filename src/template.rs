use askama_actix::Template;

const PAGINATOR_LOOK_AHEAD: u64 = 2;

/// Page links for a listing.
///
/// `base_url` already carries the listing's filter query, so every link keeps
/// the filters and only swaps the page number.
///
/// [1] 2 3 ... 13
/// 1 ... 4 5 [6] 7 8 ... 13
/// 1 ... 11 12 [13]
#[derive(Debug)]
pub struct Paginator {
    pub base_url: String,
    pub this_page: u64,
    pub page_count: u64,
}

/// A numbered link in the paginator's middle section.
#[derive(Debug)]
pub struct PageLink {
    pub number: u64,
    pub url: String,
    pub current: bool,
}

#[derive(Template)]
#[template(path = "util/paginator.html")]
struct PaginatorTemplate<'a> {
    paginator: &'a Paginator,
}

impl Paginator {
    pub fn has_pages(&self) -> bool {
        self.page_count > 1
    }

    pub fn has_previous(&self) -> bool {
        self.this_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.this_page < self.page_count
    }

    pub fn previous_page(&self) -> u64 {
        self.this_page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u64 {
        (self.this_page + 1).min(self.page_count)
    }

    /// Pages shown around the cursor, not counting the first and last page.
    pub fn get_inner_pages(&self) -> Vec<u64> {
        let start = self.this_page.saturating_sub(PAGINATOR_LOOK_AHEAD).max(2);
        let end = (self.this_page + PAGINATOR_LOOK_AHEAD).min(self.page_count.saturating_sub(1));
        (start..=end).collect()
    }

    pub fn get_inner_links(&self) -> Vec<PageLink> {
        self.get_inner_pages()
            .into_iter()
            .map(|number| PageLink {
                url: self.url_for(number),
                current: number == self.this_page,
                number,
            })
            .collect()
    }

    pub fn first_url(&self) -> String {
        self.url_for(1)
    }

    pub fn last_url(&self) -> String {
        self.url_for(self.page_count)
    }

    pub fn previous_url(&self) -> String {
        self.url_for(self.previous_page())
    }

    pub fn next_url(&self) -> String {
        self.url_for(self.next_page())
    }

    pub fn has_gap_before(&self) -> bool {
        self.get_inner_pages().first().map_or(false, |p| *p > 2)
    }

    pub fn has_gap_after(&self) -> bool {
        self.get_inner_pages()
            .last()
            .map_or(false, |p| *p + 1 < self.page_count)
    }

    pub fn url_for(&self, page: u64) -> String {
        let glue = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.base_url, glue, page)
    }

    pub fn as_html(&self) -> String {
        if !self.has_pages() {
            return String::new();
        }

        let mut buffer = String::new();
        match (PaginatorTemplate { paginator: self }).render_into(&mut buffer) {
            Ok(_) => buffer,
            Err(e) => {
                log::error!("Paginator::as_html: {}", e);
                "[Paginator Util Error]".to_owned()
            }
        }
    }
}

/// Picks the page to show the way lenient paginators do: garbage means the
/// first page, anything out of range means the last page.
pub fn resolve_page(requested: Option<&str>, page_count: u64) -> u64 {
    let page_count = page_count.max(1);
    match requested.map(|p| p.trim().parse::<i64>()) {
        None | Some(Err(_)) => 1,
        Some(Ok(n)) if n < 1 || n as u64 > page_count => page_count,
        Some(Ok(n)) => n as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(this_page: u64, page_count: u64) -> Paginator {
        Paginator {
            base_url: "/article/article-list/?order=total_views".to_owned(),
            this_page,
            page_count,
        }
    }

    #[test]
    fn resolve_page_is_lenient() {
        assert_eq!(resolve_page(None, 5), 1);
        assert_eq!(resolve_page(Some("abc"), 5), 1);
        assert_eq!(resolve_page(Some("3"), 5), 3);
        assert_eq!(resolve_page(Some("0"), 5), 5);
        assert_eq!(resolve_page(Some("-2"), 5), 5);
        assert_eq!(resolve_page(Some("99"), 5), 5);
        assert_eq!(resolve_page(Some("1"), 0), 1);
    }

    #[test]
    fn inner_pages_window() {
        assert_eq!(paginator(1, 13).get_inner_pages(), vec![2, 3]);
        assert_eq!(paginator(6, 13).get_inner_pages(), vec![4, 5, 6, 7, 8]);
        assert_eq!(paginator(13, 13).get_inner_pages(), vec![11, 12]);
        assert!(paginator(1, 2).get_inner_pages().is_empty());

        assert!(paginator(6, 13).has_gap_before());
        assert!(paginator(6, 13).has_gap_after());
        assert!(!paginator(2, 13).has_gap_before());

        let links = paginator(6, 13).get_inner_links();
        assert_eq!(links.iter().filter(|l| l.current).count(), 1);
        assert_eq!(links[2].number, 6);
        assert!(links[2].current);
        assert_eq!(links[0].url, "/article/article-list/?order=total_views&page=4");
    }

    #[test]
    fn urls_keep_filters() {
        let p = paginator(2, 3);
        assert_eq!(p.url_for(3), "/article/article-list/?order=total_views&page=3");

        let p = Paginator {
            base_url: "/article/article-list/".to_owned(),
            this_page: 1,
            page_count: 1,
        };
        assert_eq!(p.url_for(1), "/article/article-list/?page=1");
        assert_eq!(p.as_html(), "");
    }
}
