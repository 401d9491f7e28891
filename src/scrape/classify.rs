/// Club outcome derived from a free-text result summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    /// Draw, abandonment, or a phrasing the heuristic does not cover
    Unclassified,
}

impl Outcome {
    /// `(is_win, is_loss)` as stored on a result record
    pub fn flags(self) -> (bool, bool) {
        match self {
            Outcome::Win => (true, false),
            Outcome::Loss => (false, true),
            Outcome::Unclassified => (false, false),
        }
    }
}

/// Classify `summary` from the point of view of the club named `club_name`.
///
/// Summaries name one side followed by WON or LOST. When the named side is
/// not the club it must be the opponent, so the club's outcome is inverted.
/// Matching is case-insensitive; WON/LOST must appear as whole words.
pub fn classify(summary: &str, club_name: &str) -> Outcome {
    let text = summary.to_uppercase();
    let club = club_name.trim().to_uppercase();
    let club_named = !club.is_empty() && text.contains(&club);

    let mut won = false;
    let mut lost = false;
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        match word {
            "WON" => won = true,
            "LOST" => lost = true,
            _ => {}
        }
    }

    match (club_named, won, lost) {
        (true, true, _) => Outcome::Win,
        (true, false, true) => Outcome::Loss,
        (false, true, _) => Outcome::Loss,
        (false, false, true) => Outcome::Win,
        _ => Outcome::Unclassified,
    }
}
