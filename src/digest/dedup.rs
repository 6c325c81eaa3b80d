use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Article, DatedArticle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Descending,
    Ascending,
}

/// Stable sort on the underlying timestamp; equal times keep input order.
pub fn sort_by_time(mut articles: Vec<DatedArticle>, order: SortOrder) -> Vec<DatedArticle> {
    match order {
        SortOrder::Descending => articles.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
        SortOrder::Ascending => articles.sort_by(|a, b| a.published_at.cmp(&b.published_at)),
    }
    articles
}

/// `false` when both collections hold the same `(blog_name, title, link)`
/// identities the same number of times, in any order.
pub fn should_update(new: &[Article], existing: &[Article]) -> bool {
    if new.len() != existing.len() {
        return true;
    }

    let mut counts: HashMap<(&str, &str, &str), isize> = HashMap::new();
    for article in new {
        *counts.entry(article.identity()).or_default() += 1;
    }
    for article in existing {
        *counts.entry(article.identity()).or_default() -= 1;
    }
    counts.values().any(|&n| n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn article(blog: &str, title: &str) -> Article {
        Article {
            blog_name: blog.into(),
            title: title.into(),
            published: "09 Mar 2025".into(),
            link: format!("https://{blog}.example.com/{title}"),
            avatar: String::new(),
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    fn dated(blog: &str, day: u32) -> DatedArticle {
        DatedArticle {
            article: article(blog, "post"),
            published_at: at(day),
        }
    }

    fn blogs(articles: &[DatedArticle]) -> Vec<&str> {
        articles.iter().map(|a| a.article.blog_name.as_str()).collect()
    }

    #[test]
    fn identical_collections_need_no_update() {
        let a = vec![article("a", "one"), article("b", "two"), article("c", "three")];
        assert!(!should_update(&a, &a));
        assert!(!should_update(&[], &[]));
    }

    #[test]
    fn order_does_not_matter() {
        let a = vec![article("a", "one"), article("b", "two"), article("c", "three")];
        let mut reordered = a.clone();
        reordered.reverse();
        assert!(!should_update(&a, &reordered));
    }

    #[test]
    fn multiplicity_matters() {
        let a = vec![article("a", "one"), article("b", "two")];
        let mut duplicated = a.clone();
        duplicated.push(article("a", "one"));
        assert!(should_update(&duplicated, &a));
        assert!(should_update(&a, &duplicated));

        // Same length, different multiplicities.
        let skewed = vec![article("a", "one"), article("a", "one")];
        assert!(should_update(&a, &skewed));
    }

    #[test]
    fn changed_identity_needs_update_but_date_does_not() {
        let a = vec![article("a", "one")];
        assert!(should_update(&[article("a", "two")], &a));

        let mut redated = a.clone();
        redated[0].published = "10 Mar 2025".into();
        redated[0].avatar = "https://a.example.com/new.png".into();
        assert!(!should_update(&redated, &a));
    }

    #[test]
    fn sorts_newest_first_by_default() {
        let sorted = sort_by_time(vec![dated("a", 1), dated("b", 3), dated("c", 2)], SortOrder::default());
        assert_eq!(blogs(&sorted), ["b", "c", "a"]);
    }

    #[test]
    fn sorts_ascending_when_asked() {
        let sorted = sort_by_time(vec![dated("a", 1), dated("b", 3), dated("c", 2)], SortOrder::Ascending);
        assert_eq!(blogs(&sorted), ["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_input_order_and_sorting_is_idempotent() {
        let input = vec![dated("a", 2), dated("b", 5), dated("c", 2), dated("d", 5), dated("e", 1)];
        let once = sort_by_time(input, SortOrder::Descending);
        assert_eq!(blogs(&once), ["b", "d", "a", "c", "e"]);

        let twice = sort_by_time(once.clone(), SortOrder::Descending);
        assert_eq!(twice, once);
    }

    #[test]
    fn sorts_by_timestamp_not_display_string() {
        // "01 Apr" sorts before "31 Mar" as text but is newer.
        let mut march = dated("march", 31);
        march.article.published = "31 Mar 2025".into();
        let april = DatedArticle {
            article: Article {
                published: "01 Apr 2025".into(),
                ..article("april", "post")
            },
            published_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        };
        let sorted = sort_by_time(vec![march, april], SortOrder::Descending);
        assert_eq!(blogs(&sorted), ["april", "march"]);
    }
}
