use crate::models::MatchRecord;

const NO_MATCHUPS_LINE: &str = "No previous matchups found between these teams.";
const MATCHUPS_HEADER: &str = "--- Previous Matchups ---";

/// Historical results, loaded once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct MatchHistory {
    records: Vec<MatchRecord>,
}

impl MatchHistory {
    pub fn new(records: Vec<MatchRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every match between the two teams, regardless of who was at home,
    /// in file order
    pub fn head_to_head(&self, team_a: &str, team_b: &str) -> Vec<MatchRecord> {
        self.records
            .iter()
            .filter(|r| r.is_between(team_a, team_b))
            .cloned()
            .collect()
    }
}

/// Text block listing previous meetings
pub fn previous_matchup_lines(matches: &[MatchRecord]) -> Vec<String> {
    if matches.is_empty() {
        return vec![NO_MATCHUPS_LINE.to_string()];
    }

    let mut lines = Vec::with_capacity(matches.len() + 1);
    lines.push(MATCHUPS_HEADER.to_string());
    lines.extend(matches.iter().map(MatchRecord::summary_line));
    lines
}
