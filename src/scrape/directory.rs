use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use super::markup::parse_directory;
use crate::db::models::Team;

/// Path of a team detail page; the captured digits are the team id.
const TEAM_LINK_PATTERN: &str = r"/Teams/(\d+)/?$";

/// Build the team list from the directory page.
///
/// Boxes without a matching detail link are skipped; a box without a name
/// is listed under its id. The first box wins when two link to the same team.
pub fn parse_teams(html: &str, page_url: &Url) -> Result<Vec<Team>> {
    let pattern = Regex::new(TEAM_LINK_PATTERN).context("invalid team link pattern")?;
    let mut seen = HashSet::new();
    let mut teams = Vec::new();

    for entry in parse_directory(html, page_url)? {
        let Some(link) = entry.link else {
            debug!("Skipping team box '{}': no link", entry.name);
            continue;
        };
        let Some(id) = pattern
            .captures(link.path())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            debug!("Skipping team box '{}': unexpected link {}", entry.name, link);
            continue;
        };
        if !seen.insert(id.clone()) {
            debug!("Skipping duplicate team {} ('{}')", id, entry.name);
            continue;
        }
        let name = if entry.name.is_empty() {
            id.clone()
        } else {
            entry.name
        };
        teams.push(Team {
            id,
            name,
            source_url: link.to_string(),
        });
    }

    Ok(teams)
}

/// URL of the team directory page under `base`, keeping any path prefix.
pub fn directory_url(base: &Url) -> Result<Url> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join("Teams").context("cannot build team directory URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://club.example/Teams").unwrap()
    }

    #[test]
    fn test_parse_teams_in_document_order() {
        let teams = parse_teams(super::super::extract::sample::DIRECTORY, &page()).unwrap();
        let ids: Vec<_> = teams.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);
        assert_eq!(teams[2].name, "Sunday XI");
        assert_eq!(teams[0].source_url, "https://club.example/Teams/101");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let html = r#"
            <div class="team-box"><a href="/News/5"><span class="team-name">News</span></a></div>
            <div class="team-box"><span class="team-name">Linkless</span></div>
            <div class="team-box"><a href="/Teams/"><span class="team-name">No id</span></a></div>
            <div class="team-box"><a href="/Teams/7"><span class="team-name"> </span></a></div>
            <div class="team-box"><a href="/Teams/8"><span class="team-name">Women</span></a></div>
        "#;
        let teams = parse_teams(html, &page()).unwrap();
        let ids: Vec<_> = teams.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8"]);
        assert_eq!(teams[1].name, "Women");
        assert_eq!(teams[1].source_url, "https://club.example/Teams/8");
    }

    #[test]
    fn test_nameless_team_falls_back_to_id() {
        let html = r#"<div class="team-box"><a href="/Teams/7"><span class="team-name"> </span></a></div>"#;
        let teams = parse_teams(html, &page()).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "7");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let html = r#"
            <div class="team-box"><a href="/Teams/9"><span class="team-name">Midweek XI</span></a></div>
            <div class="team-box"><a href="https://club.example/Teams/9/"><span class="team-name">Duplicate</span></a></div>
        "#;
        let teams = parse_teams(html, &page()).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Midweek XI");
    }

    #[test]
    fn test_directory_url() {
        let base = Url::parse("https://club.example/").unwrap();
        assert_eq!(directory_url(&base).unwrap().as_str(), "https://club.example/Teams");
    }

    #[test]
    fn test_directory_url_keeps_path_prefix() {
        for base in ["https://host.example/club/", "https://host.example/club"] {
            let base = Url::parse(base).unwrap();
            assert_eq!(
                directory_url(&base).unwrap().as_str(),
                "https://host.example/club/Teams"
            );
        }
    }
}
