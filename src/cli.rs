use std::{
    env,
    io::{self, IsTerminal, Write},
    process::{Command as Process, Stdio},
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use calshare::{
    app::{CalendarView, DateRange, DateSelection, EventForm, ViewType},
    calendar::{Calendar, CalendarId, Event, EventCategory, EventId, Invitation, InvitationId, NewCalendar, Timestamp},
    storage::config::Config,
    sync::{CalendarStore, HttpAccessor, StoreOptions},
};

pub const USAGE: &str = "\
Usage: calshare <command> [args]

Commands:
  calendars                                   list your calendars
  calendar-new <name> [--description D] [--color C]
  calendar-rm <calendar-id>                   delete a calendar you own
  calendar-leave <calendar-id>                leave a shared calendar
  agenda <calendar-id> [--view month|week|day] [--date YYYY/MM/DD]
  event-new <calendar-id> <title> <start> <end>
            [--category reminder|task|arrangement] [--color C]
            [--description D] [--all-day]
  event-rm <calendar-id> <event-id>
  invites                                     list incoming invitations
  invite-send <json>                          send an invitation
  invite-accept <invitation-id>
  invite-decline <invitation-id>";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Calendars,
    CalendarNew {
        name: String,
        description: String,
        color: String,
    },
    CalendarRemove(CalendarId),
    CalendarLeave(CalendarId),
    Agenda {
        calendar_id: CalendarId,
        view: Option<ViewType>,
        date: Option<NaiveDate>,
    },
    EventNew {
        calendar_id: CalendarId,
        title: String,
        selection: DateSelection,
        form: EventForm,
    },
    EventRemove {
        calendar_id: CalendarId,
        event_id: EventId,
    },
    Invites,
    InviteSend(serde_json::Value),
    InviteAccept(InvitationId),
    InviteDecline(InvitationId),
}

pub fn parse_command<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };
    let (positional, flags) = split_flags(args.collect())?;
    let mut positional = positional.into_iter();
    let mut next = |what: &str| positional.next().ok_or_else(|| format!("Missing {}", what));

    let command = match name.as_str() {
        "--help" | "-h" | "help" => Command::Help,
        "calendars" => Command::Calendars,
        "calendar-new" => Command::CalendarNew {
            name: next("calendar name")?,
            description: flag_value(&flags, "--description").unwrap_or_default(),
            color: flag_value(&flags, "--color").unwrap_or_default(),
        },
        "calendar-rm" => Command::CalendarRemove(parse_id(&next("calendar id")?)?),
        "calendar-leave" => Command::CalendarLeave(parse_id(&next("calendar id")?)?),
        "agenda" => Command::Agenda {
            calendar_id: parse_id(&next("calendar id")?)?,
            view: flag_value(&flags, "--view").map(|v| v.parse::<ViewType>()).transpose()?,
            date: flag_value(&flags, "--date").map(|d| parse_date(&d)).transpose()?,
        },
        "event-new" => {
            let calendar_id = parse_id(&next("calendar id")?)?;
            let title = next("event title")?;
            let selection = DateSelection {
                start: Timestamp::new(next("start time")?),
                end: Timestamp::new(next("end time")?),
                all_day: flags.iter().any(|(k, _)| k == "--all-day"),
            };
            let category = flag_value(&flags, "--category")
                .map(|c| c.parse::<EventCategory>())
                .transpose()?
                .unwrap_or_default();
            let form = EventForm {
                title: title.clone(),
                description: flag_value(&flags, "--description").unwrap_or_default(),
                category,
                color: flag_value(&flags, "--color").unwrap_or_default(),
            };
            Command::EventNew {
                calendar_id,
                title,
                selection,
                form,
            }
        }
        "event-rm" => Command::EventRemove {
            calendar_id: parse_id(&next("calendar id")?)?,
            event_id: parse_id(&next("event id")?)?,
        },
        "invites" => Command::Invites,
        "invite-send" => {
            let raw = next("invitation JSON")?;
            let invite = serde_json::from_str(&raw).map_err(|e| format!("Invalid invitation JSON: {}", e))?;
            Command::InviteSend(invite)
        }
        "invite-accept" => Command::InviteAccept(parse_id(&next("invitation id")?)?),
        "invite-decline" => Command::InviteDecline(parse_id(&next("invitation id")?)?),
        other => return Err(format!("Unknown command: {}", other)),
    };

    Ok(command)
}

const VALUE_FLAGS: &[&str] = &["--description", "--color", "--view", "--date", "--category"];
const SWITCH_FLAGS: &[&str] = &["--all-day"];

type Flags = Vec<(String, Option<String>)>;

fn split_flags(args: Vec<String>) -> Result<(Vec<String>, Flags), String> {
    let mut positional = Vec::new();
    let mut flags = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            let value = iter.next().ok_or_else(|| format!("{} needs a value", arg))?;
            flags.push((arg, Some(value)));
        } else if SWITCH_FLAGS.contains(&arg.as_str()) {
            flags.push((arg, None));
        } else if arg.starts_with("--") {
            return Err(format!("Unknown argument: {}", arg));
        } else {
            positional.push(arg);
        }
    }

    Ok((positional, flags))
}

fn flag_value(flags: &Flags, name: &str) -> Option<String> {
    flags
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| v.clone())
}

fn parse_id<T: std::str::FromStr<Err = calshare::calendar::IdError>>(raw: &str) -> Result<T, String> {
    raw.parse::<T>().map_err(|e| e.to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y/%m/%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", raw))
}

pub async fn run_command(command: Command, config: &Config) -> Result<()> {
    let store = CalendarStore::with_options(
        HttpAccessor::new(config.api.base_url.clone()),
        StoreOptions::from(&config.store),
    );

    match command {
        Command::Help => println!("{}", USAGE),
        Command::Calendars => {
            let calendars = store.fetch_calendars().await.context("Could not load calendars")?;
            println!("{}", format_calendars(&calendars));
        }
        Command::CalendarNew {
            name,
            description,
            color,
        } => {
            let created = store
                .create_calendar(NewCalendar::new(name, description, color))
                .await
                .context("Could not create calendar")?;
            println!("Created calendar {} ({})", created.name, created.id);
        }
        Command::CalendarRemove(id) => {
            store.delete_calendar(id).await.context("Could not delete calendar")?;
            println!("Deleted calendar {}", id);
        }
        Command::CalendarLeave(id) => {
            store.leave_calendar(id).await.context("Could not leave calendar")?;
            println!("Left calendar {}", id);
        }
        Command::Agenda {
            calendar_id,
            view,
            date,
        } => {
            let default_view = config.ui.default_view.parse().unwrap_or(ViewType::Month);
            let mut calendar_view = CalendarView::new(
                &store,
                view.unwrap_or(default_view),
                date.unwrap_or_else(|| Local::now().date_naive()),
            );
            calendar_view
                .switch_calendar(calendar_id)
                .await
                .with_context(|| format!("Could not load events for calendar {}", calendar_id))?;

            let range = calendar_view.visible_range();
            let days: Vec<(NaiveDate, Vec<Event>)> = range
                .start
                .iter_days()
                .take_while(|d| *d <= range.end)
                .map(|d| (d, calendar_view.events_on(d)))
                .collect();
            let agenda = format_agenda_text(range, &days, &AgendaStyle::from(config));
            page_output(&agenda)?;
        }
        Command::EventNew {
            calendar_id,
            title,
            selection,
            form,
        } => {
            let mut calendar_view = CalendarView::new(&store, ViewType::Day, Local::now().date_naive());
            calendar_view
                .switch_calendar(calendar_id)
                .await
                .with_context(|| format!("Could not load events for calendar {}", calendar_id))?;
            let event = calendar_view
                .create_from_selection(&selection, &form)
                .await
                .with_context(|| format!("Could not create event '{}'", title))?;
            println!("Created event {} ({})", event.title, event.id);
        }
        Command::EventRemove {
            calendar_id,
            event_id,
        } => {
            let mut calendar_view = CalendarView::new(&store, ViewType::Day, Local::now().date_naive());
            calendar_view
                .switch_calendar(calendar_id)
                .await
                .with_context(|| format!("Could not load events for calendar {}", calendar_id))?;
            calendar_view
                .delete_event(event_id)
                .await
                .with_context(|| format!("Could not delete event {}", event_id))?;
            println!("Deleted event {}", event_id);
        }
        Command::Invites => {
            let invites = store
                .fetch_incoming_invites()
                .await
                .context("Could not load invitations")?;
            println!("{}", format_invites(&invites));
        }
        Command::InviteSend(invite) => {
            store.send_invite(&invite).await.context("Could not send invitation")?;
            println!("Invitation sent");
        }
        Command::InviteAccept(id) => {
            let mut calendar_view = CalendarView::new(&store, ViewType::Month, Local::now().date_naive());
            let calendars = calendar_view
                .accept_and_refresh(id)
                .await
                .with_context(|| format!("Could not accept invitation {}", id))?;
            println!("Accepted invitation {}", id);
            println!("{}", format_calendars(&calendars));
        }
        Command::InviteDecline(id) => {
            store
                .decline_invitation(id)
                .await
                .with_context(|| format!("Could not decline invitation {}", id))?;
            println!("Declined invitation {}", id);
        }
    }

    Ok(())
}

struct AgendaStyle {
    date_format: String,
    time_format: &'static str,
}

impl From<&Config> for AgendaStyle {
    fn from(config: &Config) -> Self {
        let time_format = if config.ui.time_format == "12h" { "%I:%M %p" } else { "%H:%M" };
        Self {
            date_format: config.ui.date_format.clone(),
            time_format,
        }
    }
}

fn format_calendars(calendars: &[Calendar]) -> String {
    if calendars.is_empty() {
        return "No calendars.".to_string();
    }
    calendars
        .iter()
        .map(|c| {
            let mut line = format!("{:>5}  {}", c.id, c.name);
            if !c.description.is_empty() {
                line.push_str(&format!(" - {}", c.description));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_invites(invites: &[Invitation]) -> String {
    if invites.is_empty() {
        return "No pending invitations.".to_string();
    }
    invites
        .iter()
        .map(|i| {
            let details = serde_json::Value::Object(i.details.clone());
            format!("{:>5}  {}", i.invitation_id, details)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_agenda_text(range: DateRange, days: &[(NaiveDate, Vec<Event>)], style: &AgendaStyle) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Agenda – {} to {}",
        range.start.format(&style.date_format),
        range.end.format(&style.date_format)
    ));

    let busy: Vec<_> = days.iter().filter(|(_, events)| !events.is_empty()).collect();
    if busy.is_empty() {
        lines.push(String::new());
        lines.push("No events scheduled.".to_string());
    }

    for (date, events) in busy {
        lines.push(String::new());
        lines.push(date.format("%A, %B %d, %Y").to_string());
        for event in events {
            lines.push(format!("- {}", build_agenda_line(event, style)));
        }
    }

    lines.join("\n")
}

fn build_agenda_line(event: &Event, style: &AgendaStyle) -> String {
    let time_label = if event.all_day {
        "All Day".to_string()
    } else {
        match (event.start.to_naive(), event.end.to_naive()) {
            (Some(start), Some(end)) => format!(
                "{}-{}",
                start.format(style.time_format),
                end.format(style.time_format)
            ),
            _ => format!("{}-{}", event.start, event.end),
        }
    };

    format!("{:<13} {} [{}]", time_label, event.title, event.category)
}

/// Pipes `text` through `$PAGER` (default `less`) when stdout is a terminal,
/// otherwise prints it.
fn page_output(text: &str) -> io::Result<()> {
    let pager = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut words = pager.split_whitespace();
    let program = match words.next() {
        Some(program) if io::stdout().is_terminal() => program,
        _ => {
            println!("{text}");
            return Ok(());
        }
    };

    let mut child = match Process::new(program).args(words).stdin(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!("Pager '{}' unavailable: {}", program, err);
            println!("{text}");
            return Ok(());
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        match writeln!(stdin, "{text}") {
            Err(err) if err.kind() != io::ErrorKind::BrokenPipe => return Err(err),
            _ => {}
        }
    }
    child.wait()?;
    Ok(())
}
