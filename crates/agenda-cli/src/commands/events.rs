//! Event commands: listing, day view, create, update, delete.

use agenda_core::{CalendarEvent, EventDraft, EventTime};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::cli::EventArgs;
use crate::context::AppContext;
use crate::error::{ClientError, ClientResult};

/// List upcoming events.
pub async fn upcoming(ctx: &AppContext, json: bool) -> ClientResult<()> {
    let events = ctx.calendar.get_events().await?;
    print_events(&events, ctx.timezone, json, true, "No upcoming events.")
}

/// List the events of one day.
pub async fn day(ctx: &AppContext, date: Option<&str>, json: bool) -> ClientResult<()> {
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => today(ctx.timezone),
    };

    let events = match ctx.timezone {
        Some(tz) => ctx.calendar.get_events_for_date(date, &tz).await?,
        None => ctx.calendar.get_events_for_date(date, &Local).await?,
    };

    if !json {
        println!("{}", date.format("%A, %B %-d, %Y"));
    }
    print_events(&events, ctx.timezone, json, false, "No events for this day.")
}

/// Create an event.
pub async fn create(ctx: &AppContext, args: &EventArgs, json: bool) -> ClientResult<()> {
    let draft = build_draft(args, ctx.timezone, ctx.timezone_name.as_deref())?;
    let event = ctx.calendar.create_event(&draft).await?;
    print_saved(&event, json, "Event created")
}

/// Replace an event's fields.
pub async fn update(
    ctx: &AppContext,
    event_id: &str,
    args: &EventArgs,
    json: bool,
) -> ClientResult<()> {
    let draft = build_draft(args, ctx.timezone, ctx.timezone_name.as_deref())?;
    let event = ctx.calendar.update_event(event_id, &draft).await?;
    print_saved(&event, json, "Event updated")
}

/// Delete an event.
pub async fn delete(ctx: &AppContext, event_id: &str) -> ClientResult<()> {
    ctx.calendar.delete_event(event_id).await?;
    println!("Event deleted.");
    Ok(())
}

fn print_events(
    events: &[CalendarEvent],
    tz: Option<Tz>,
    json: bool,
    with_date: bool,
    empty: &str,
) -> ClientResult<()> {
    if json {
        println!("{}", to_json(events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("{}", empty);
        return Ok(());
    }
    for event in events {
        println!("{}", render_line(event, tz, with_date));
    }
    Ok(())
}

fn print_saved(event: &CalendarEvent, json: bool, verb: &str) -> ClientResult<()> {
    if json {
        println!("{}", to_json(event)?);
    } else {
        println!("{}: {} ({})", verb, event.title(), event.id);
        if let Some(ref link) = event.html_link {
            println!("{}", link);
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> ClientResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::InvalidInput(format!("failed to render JSON: {}", e)))
}

/// One line of the event list: time range, title, markers and id.
fn render_line(event: &CalendarEvent, tz: Option<Tz>, with_date: bool) -> String {
    let when = match (event.is_all_day(), with_date) {
        (true, false) => "all day".to_string(),
        (true, true) => format!("{} (all day)", event.start.date().format("%a %Y-%m-%d")),
        (false, with_date) => {
            let start_format = if with_date { "%a %Y-%m-%d %H:%M" } else { "%H:%M" };
            format!(
                "{} - {}",
                format_time(&event.start, tz, start_format),
                format_time(&event.end, tz, "%H:%M")
            )
        }
    };

    let mut line = format!("{}  {}", when, event.title());
    if let Some(ref location) = event.location {
        line.push_str(&format!(" @ {}", location));
    }
    if event.is_holiday {
        line.push_str(" [holiday]");
    } else {
        line.push_str(&format!("  ({})", event.id));
    }
    line
}

fn format_time(time: &EventTime, tz: Option<Tz>, format: &str) -> String {
    let utc = time.to_utc_datetime();
    match tz {
        Some(tz) => utc.with_timezone(&tz).format(format).to_string(),
        None => utc.with_timezone(&Local).format(format).to_string(),
    }
}

fn today(tz: Option<Tz>) -> NaiveDate {
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Local::now().date_naive(),
    }
}

fn parse_date(raw: &str) -> ClientResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ClientError::InvalidInput(format!("invalid date `{}`, expected YYYY-MM-DD", raw)))
}

fn parse_time(raw: &str) -> ClientResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ClientError::InvalidInput(format!("invalid time `{}`, expected HH:MM", raw)))
}

fn local_datetime(
    date: NaiveDate,
    time: NaiveTime,
    tz: Option<Tz>,
) -> ClientResult<DateTime<FixedOffset>> {
    let naive = date.and_time(time);
    let resolved = match tz {
        Some(tz) => tz.from_local_datetime(&naive).earliest().map(|dt| dt.fixed_offset()),
        None => Local.from_local_datetime(&naive).earliest().map(|dt| dt.fixed_offset()),
    };
    resolved.ok_or_else(|| {
        ClientError::InvalidInput(format!("{} does not exist in the local timezone", naive))
    })
}

fn build_draft(args: &EventArgs, tz: Option<Tz>, tz_name: Option<&str>) -> ClientResult<EventDraft> {
    let date = parse_date(&args.date)?;
    let start = local_datetime(date, parse_time(&args.start)?, tz)?;
    let end = local_datetime(date, parse_time(&args.end)?, tz)?;

    let mut draft = EventDraft::new(args.title.trim(), start, end)
        .with_description(args.description.trim())
        .with_location(args.location.trim());
    if let Some(name) = tz_name {
        draft = draft.with_time_zone(name);
    }
    Ok(draft)
}
