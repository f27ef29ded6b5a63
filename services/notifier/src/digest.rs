//! Plain-text digest rendering

use campus::{EventView, User, mail::MailMessage, models::EmailFrequency};
use chrono::NaiveDate;
use std::{collections::BTreeMap, fmt::Write};

/// Build the digest mail for one user. Events are grouped by calendar day
/// (UTC) and listed in start order within a day.
pub fn render_digest(user: &User, events: &[EventView]) -> MailMessage {
    let mut days: BTreeMap<NaiveDate, Vec<&EventView>> = BTreeMap::new();
    for event in events {
        days.entry(event.start_time.date_naive())
            .or_default()
            .push(event);
    }

    let period = match user.email_frequency {
        EmailFrequency::Weekly => "this week",
        _ => "today",
    };

    let mut body = String::new();
    let greeting = if user.first_name.is_empty() {
        "Hi,".to_string()
    } else {
        format!("Hi {},", user.first_name)
    };
    let _ = writeln!(body, "{greeting}\n");
    let _ = writeln!(
        body,
        "Here is what is coming up {period} ({}):",
        user.email_event_type
    );

    for (day, mut day_events) in days {
        day_events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        let _ = writeln!(body, "\n{}", day.format("%A, %B %-d"));
        for event in day_events {
            let _ = write!(
                body,
                "  {}-{}  {}",
                event.start_time.format("%H:%M"),
                event.end_time.format("%H:%M"),
                event.name
            );
            if !event.hosts.is_empty() {
                let hosts: Vec<&str> = event.hosts.iter().map(|h| h.name.as_str()).collect();
                let _ = write!(body, " ({})", hosts.join(", "));
            }
            if !event.location.is_empty() {
                let _ = write!(body, " @ {}", event.location);
            }
            body.push('\n');
        }
    }

    let _ = writeln!(
        body,
        "\nYou receive this mail because your digest is set to {}.",
        user.email_frequency
    );

    let subject = match user.email_frequency {
        EmailFrequency::Weekly => format!("Your weekly events ({})", events.len()),
        _ => format!("Your events today ({})", events.len()),
    };

    MailMessage::new(user.email.clone(), subject, body)
}
