//! Snapshot differ
//!
//! Pure set-difference between two raw feed snapshots, used for the
//! "only show net-new entries since the last successful fetch" view.
//!
//! ## Cold-start half-split
//!
//! When `previous_text` is empty (first-ever fetch for a feed), emitting
//! every line as "new" would flood downstream with entrance events. The
//! policy is deterministic: `split_index = floor(line_count / 2)`, and only
//! lines `[0, split_index)` (the first half of the document) are diffed
//! against the empty baseline. The remainder is treated as already-known.

use crate::parser::{AddressIdentity, parse_feed, parse_line};
use std::collections::HashSet;

/// Yield the addresses in `current_text` that are absent from `previous_text`
///
/// Output follows current-text order; occurrences are not deduplicated
/// within the current text (callers dedupe via the state exists-check).
/// Unparseable lines on either side are ignored. No I/O.
pub fn diff(previous_text: &str, current_text: &str) -> Vec<AddressIdentity> {
    if previous_text.is_empty() {
        return cold_start_half_split(current_text);
    }

    let baseline: HashSet<AddressIdentity> = parse_feed(previous_text).collect();

    parse_feed(current_text)
        .filter(|address| !baseline.contains(address))
        .collect()
}

/// First-fetch throttle: process only the first `floor(n / 2)` lines
fn cold_start_half_split(current_text: &str) -> Vec<AddressIdentity> {
    let split_index = current_text.lines().count() / 2;

    current_text
        .lines()
        .take(split_index)
        .filter_map(parse_line)
        .collect()
}
