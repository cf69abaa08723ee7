//! Property-based tests for history reconstruction
//!
//! Pages are generated newest page first, the way the upstream hands them
//! out, and the merged transcript is checked against the simple model:
//! the reverse of all pages concatenated in fetch order.

use super::*;
use crate::upstream::testing::MockUpstream;
use crate::upstream::MessagePage;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Page sizes for a conversation; ids and timestamps are assigned later
fn arb_page_sizes() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(1usize..6, 0..6)
}

/// Build pages from sizes. Timestamps decrease across the whole sequence,
/// so the first page holds the newest messages.
fn build_pages(sizes: &[usize]) -> Vec<MessagePage> {
    let total: usize = sizes.iter().sum();
    let mut next_ts = i64::try_from(total).unwrap_or(i64::MAX);
    let mut pages = Vec::new();

    for (p, size) in sizes.iter().enumerate() {
        let items = (0..*size)
            .map(|i| {
                let created_at = next_ts;
                next_ts -= 1;
                PageItem::Message(UpstreamMessage {
                    id: format!("m{p}-{i}"),
                    query: Some(format!("q{p}-{i}")),
                    answer: Some(format!("a{p}-{i}")),
                    message_files: Some(vec![]),
                    created_at: Some(created_at),
                })
            })
            .collect();
        pages.push(MessagePage {
            data: Some(items),
            has_more: p + 1 < sizes.len(),
        });
    }

    pages
}

fn expected(pages: &[MessagePage]) -> Transcript {
    let mut all: Vec<HistoryEntry> = pages
        .iter()
        .flat_map(|p| p.data.clone().unwrap_or_default())
        .filter_map(|item| match item {
            PageItem::Message(m) => Some(HistoryEntry::from(m)),
            PageItem::Unrecognized(_) => None,
        })
        .collect();
    all.reverse();
    all
}

fn run(mock: &MockUpstream) -> Transcript {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(reconstruct(mock, "conv", "alice", 5))
        .unwrap()
}

proptest! {
    #[test]
    fn prop_reverse_of_concatenation(sizes in arb_page_sizes()) {
        let pages = build_pages(&sizes);
        let mock = MockUpstream::new();
        if pages.is_empty() {
            mock.queue_page(Ok(MessagePage { data: Some(vec![]), has_more: false }));
        }
        for page in &pages {
            mock.queue_page(Ok(page.clone()));
        }

        let transcript = run(&mock);

        prop_assert_eq!(&transcript, &expected(&pages));
        prop_assert!(transcript.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        prop_assert_eq!(mock.recorded_queries().len(), pages.len().max(1));
    }

    #[test]
    fn prop_reconstruction_is_idempotent(sizes in arb_page_sizes()) {
        let pages = build_pages(&sizes);
        let mock = MockUpstream::new();
        for _ in 0..2 {
            if pages.is_empty() {
                mock.queue_page(Ok(MessagePage { data: Some(vec![]), has_more: false }));
            }
            for page in &pages {
                mock.queue_page(Ok(page.clone()));
            }
        }

        let first = run(&mock);
        let second = run(&mock);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_cursor_is_first_id_of_previous_page(sizes in arb_page_sizes()) {
        let pages = build_pages(&sizes);
        prop_assume!(!pages.is_empty());
        let mock = MockUpstream::new();
        for page in &pages {
            mock.queue_page(Ok(page.clone()));
        }

        run(&mock);

        let cursors: Vec<Option<String>> =
            mock.recorded_queries().into_iter().map(|q| q.first_id).collect();
        prop_assert_eq!(cursors[0].clone(), None);
        for (i, cursor) in cursors.iter().enumerate().skip(1) {
            prop_assert_eq!(cursor.clone(), Some(format!("m{}-0", i - 1)));
        }
    }

    #[test]
    fn prop_empty_page_halts(sizes in arb_page_sizes(), cut in 0usize..6) {
        let mut pages = build_pages(&sizes);
        let cut = cut.min(pages.len());
        // An empty page that still claims more data
        pages.insert(cut, MessagePage { data: Some(vec![]), has_more: true });
        if cut > 0 {
            pages[cut - 1].has_more = true;
        }

        let mock = MockUpstream::new();
        for page in &pages {
            mock.queue_page(Ok(page.clone()));
        }

        let transcript = run(&mock);

        prop_assert_eq!(transcript, expected(&pages[..cut]));
        prop_assert_eq!(mock.recorded_queries().len(), cut + 1);
    }
}
