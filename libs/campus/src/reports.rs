//! Fixed faculty reports
//!
//! Reports are selected by kind from a static table of statements. Every
//! statement takes the school id as `$1` and yields `label`/`value` rows.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reports available to faculty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Active subscribers per active club
    ClubSubscribers,
    /// Yes RSVPs per approved, active event
    EventAttendance,
    /// Active users per digest frequency
    DigestFrequency,
}

/// One line of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub value: i64,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::ClubSubscribers,
        ReportKind::EventAttendance,
        ReportKind::DigestFrequency,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::ClubSubscribers => "club-subscribers",
            ReportKind::EventAttendance => "event-attendance",
            ReportKind::DigestFrequency => "digest-frequency",
        }
    }

    pub fn statement(self) -> &'static str {
        match self {
            ReportKind::ClubSubscribers => {
                r#"
                SELECT c.name AS label, COUNT(s.user_email) AS value
                FROM clubs c
                LEFT JOIN subscriptions s
                    ON s.club_id = c.id AND s.is_active AND s.subscribed_or_blocked = 1
                WHERE c.school_id = $1 AND c.is_active
                GROUP BY c.id, c.name
                ORDER BY value DESC, label
                "#
            }
            ReportKind::EventAttendance => {
                r#"
                SELECT e.name AS label, COUNT(r.user_email) AS value
                FROM events e
                LEFT JOIN rsvps r ON r.event_id = e.id AND r.is_active AND r.is_yes
                WHERE e.school_id = $1 AND e.is_active AND e.is_approved
                GROUP BY e.id, e.name
                ORDER BY value DESC, label
                "#
            }
            ReportKind::DigestFrequency => {
                r#"
                SELECT email_frequency AS label, COUNT(*) AS value
                FROM users
                WHERE school_id = $1 AND is_active AND NOT is_banned
                GROUP BY email_frequency
                ORDER BY label
                "#
            }
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| format!("unknown report '{s}'"))
    }
}
