use std::collections::HashSet;

use crate::db::models::MatchRecord;

/// How per-team lists are merged into one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    /// One team was scraped; records pass through untouched
    SingleTeam,
    /// Every team was scraped; shared matches collapse by match URL
    AllTeams,
}

/// Flatten per-team record lists (in team-resolution order).
///
/// In `AllTeams` mode the first record seen for each match URL wins.
/// Records without a URL have no canonical identity and are always kept,
/// so the same match may appear once per team page in that case.
pub fn aggregate<R: MatchRecord>(per_team: Vec<Vec<R>>, mode: AggregateMode) -> Vec<R> {
    let records = per_team.into_iter().flatten();
    match mode {
        AggregateMode::SingleTeam => records.collect(),
        AggregateMode::AllTeams => {
            let mut seen: HashSet<String> = HashSet::new();
            records
                .filter(|r| match r.match_url() {
                    Some(url) => seen.insert(url.to_string()),
                    None => true,
                })
                .collect()
        }
    }
}

/// Order results newest first; undated records go last, keeping their order.
pub fn sort_newest_first<R: MatchRecord>(records: &mut [R]) {
    records.sort_by(|a, b| b.date_iso().cmp(&a.date_iso()));
}
