//! Edition building
//!
//! A pure assembly step between the fetch stage and the render stage: the
//! successful [`FetchOutcome`]s are frozen into one immutable [`Edition`].
//! No I/O, no concurrency; an empty input yields a valid empty edition.

use crate::config::UndatedPolicy;
use crate::types::{Edition, FetchOutcome, Item, SourceGroup};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Assemble the edition from the successful outcomes
///
/// Groups follow the outcome order (which the orchestrator guarantees is
/// configuration order); intra-source item order is the adapter's, adjusted
/// only by the configured undated-item policy. Duplicate item ids within a
/// source keep their first occurrence so the edition-wide uniqueness
/// invariant holds.
pub fn build(
    outcomes: &[FetchOutcome],
    timestamp: DateTime<Utc>,
    policy: UndatedPolicy,
) -> Edition {
    let groups = outcomes
        .iter()
        .filter_map(|outcome| {
            let items = outcome.result.as_ref().ok()?;
            Some(SourceGroup {
                source_id: outcome.source_id.clone(),
                display_name: outcome.display_name.clone(),
                kind: outcome.kind,
                items: place_items(dedup_items(items), policy),
            })
        })
        .collect();

    Edition { timestamp, groups }
}

fn dedup_items(items: &[Item]) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .cloned()
        .collect()
}

fn place_items(items: Vec<Item>, policy: UndatedPolicy) -> Vec<Item> {
    match policy {
        UndatedPolicy::SourceOrder => items,
        UndatedPolicy::SortLast => {
            // stable partition: dated items keep their relative order,
            // undated ones follow in theirs
            let (dated, undated): (Vec<_>, Vec<_>) =
                items.into_iter().partition(|i| i.published.is_some());
            dated.into_iter().chain(undated).collect()
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceFetchError;
    use crate::types::SourceKind;
    use chrono::TimeZone;

    fn item(id: &str, published: Option<DateTime<Utc>>) -> Item {
        Item {
            id: id.to_string(),
            kind: SourceKind::Rss,
            title: id.to_string(),
            url: String::new(),
            author: String::new(),
            published,
            fetched: Utc::now(),
            summary: String::new(),
            body_html: String::new(),
            images: Vec::new(),
            metadata: Default::default(),
        }
    }

    fn fetched(source_id: &str, items: Vec<Item>) -> FetchOutcome {
        FetchOutcome {
            source_id: source_id.to_string(),
            display_name: source_id.to_uppercase(),
            kind: SourceKind::Rss,
            result: Ok(items),
        }
    }

    fn failed(source_id: &str) -> FetchOutcome {
        FetchOutcome {
            source_id: source_id.to_string(),
            display_name: source_id.to_uppercase(),
            kind: SourceKind::Rss,
            result: Err(SourceFetchError::Status {
                source_id: source_id.to_string(),
                status: 503,
                url: "u".into(),
            }),
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 16, 6, 0, 0).unwrap()
    }

    #[test]
    fn failed_sources_are_excluded_but_order_is_kept() {
        let outcomes = vec![
            fetched("a", vec![item("a:1", None), item("a:2", None)]),
            failed("b"),
            fetched("c", vec![item("c:1", None)]),
        ];
        let edition = build(&outcomes, ts(), UndatedPolicy::SourceOrder);

        let ids: Vec<_> = edition.groups.iter().map(|g| g.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(edition.item_count(), 3);
    }

    #[test]
    fn source_order_policy_preserves_adapter_order() {
        let dated = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
        let outcomes = vec![fetched(
            "a",
            vec![item("a:1", None), item("a:2", Some(dated)), item("a:3", None)],
        )];
        let edition = build(&outcomes, ts(), UndatedPolicy::SourceOrder);
        let ids: Vec<_> = edition.groups[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a:1", "a:2", "a:3"]);
    }

    #[test]
    fn sort_last_policy_moves_undated_after_dated_stably() {
        let d1 = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2026, 2, 14, 0, 0, 0).unwrap();
        let outcomes = vec![fetched(
            "a",
            vec![
                item("a:u1", None),
                item("a:d1", Some(d1)),
                item("a:u2", None),
                item("a:d2", Some(d2)),
            ],
        )];
        let edition = build(&outcomes, ts(), UndatedPolicy::SortLast);
        let ids: Vec<_> = edition.groups[0].items.iter().map(|i| i.id.as_str()).collect();
        // dated keep adapter order (not re-sorted by date), undated follow
        assert_eq!(ids, vec!["a:d1", "a:d2", "a:u1", "a:u2"]);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let outcomes = vec![fetched(
            "a",
            vec![item("a:1", None), item("a:1", None), item("a:2", None)],
        )];
        let edition = build(&outcomes, ts(), UndatedPolicy::SourceOrder);
        assert_eq!(edition.groups[0].items.len(), 2);
    }

    #[test]
    fn empty_input_yields_valid_empty_edition() {
        let edition = build(&[], ts(), UndatedPolicy::SourceOrder);
        assert!(edition.is_empty());
        assert_eq!(edition.date_str(), "2026-02-16");
    }

    #[test]
    fn all_failed_yields_empty_edition() {
        let edition = build(&[failed("a"), failed("b")], ts(), UndatedPolicy::SourceOrder);
        assert!(edition.is_empty());
        assert!(edition.groups.is_empty());
    }
}
