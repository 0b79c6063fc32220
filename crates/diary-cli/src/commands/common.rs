use chrono::{DateTime, Local, NaiveDate, TimeZone};
use diary_core::media::{MediaBatch, OperationReport};
use diary_core::services::DiaryService;
use diary_core::{DiaryEntry, DiaryId, Mood};
use serde::Serialize;

use crate::error::CliError;
use crate::media_client::MediaClient;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub mood: Mood,
    pub date: i64,
    pub date_iso: String,
    pub images: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn entry_to_list_item(entry: &DiaryEntry) -> EntryListItem {
    EntryListItem {
        id: entry.id.to_string(),
        title: entry.title.clone(),
        description: entry.description.clone(),
        mood: entry.mood,
        date: entry.date,
        date_iso: format_timestamp(entry.date),
        images: entry.images.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
    }
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::EmptyEntryId);
    }
    Ok(id.to_ascii_lowercase())
}

/// Find an entry by full id or unique id prefix.
pub async fn resolve_entry(
    query: &str,
    service: &DiaryService<MediaClient>,
) -> Result<DiaryEntry, CliError> {
    let query = normalize_entry_identifier(query)?;

    if let Ok(id) = query.parse::<DiaryId>() {
        if let Some(entry) = service.get_entry(&id).await? {
            return Ok(entry);
        }
    }

    let entries = service
        .list_entries()
        .await?
        .into_values()
        .flatten()
        .collect::<Vec<_>>();
    pick_by_prefix(&query, entries)
}

pub fn pick_by_prefix(query: &str, entries: Vec<DiaryEntry>) -> Result<DiaryEntry, CliError> {
    let mut matching = entries
        .into_iter()
        .filter(|entry| entry.id.to_string().starts_with(query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::EntryNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|entry| short_id(&entry.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &DiaryId) -> String {
    id.to_string().chars().take(13).collect()
}

/// Accept a calendar day (local noon) or a full RFC 3339 timestamp.
pub fn parse_entry_date(value: &str) -> Result<i64, CliError> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.timestamp_millis());
    }

    let day = parse_day(value)?;
    day.and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .map(|noon| noon.timestamp_millis())
        .ok_or_else(|| CliError::InvalidDate(value.to_string()))
}

pub fn parse_day(value: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(value.to_string()))
}

pub fn parse_mood(value: Option<&str>) -> Result<Option<Mood>, CliError> {
    value
        .map(|mood| mood.parse::<Mood>().map_err(CliError::from))
        .transpose()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|time| time.with_timezone(&Local).to_rfc3339())
        .unwrap_or_default()
}

pub fn format_day_header(day: NaiveDate) -> String {
    day.format("%A, %B %-d, %Y").to_string()
}

pub fn format_entry_line(entry: &DiaryEntry) -> String {
    let time = DateTime::from_timestamp_millis(entry.date)
        .map(|time| time.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let photos = match entry.images.len() {
        0 => String::new(),
        1 => " [1 photo]".to_string(),
        count => format!(" [{count} photos]"),
    };

    format!(
        "  {}  {time}  {:<12} {}{photos}",
        short_id(&entry.id),
        entry.mood.as_str(),
        entry.title
    )
}

pub fn format_failure(report: &OperationReport) -> String {
    format!(
        "Warning: {} of {} is still pending: {}",
        report.kind, report.remote_path, report.outcome
    )
}

pub fn print_failures<'a>(reports: impl IntoIterator<Item = &'a OperationReport>) {
    for report in reports {
        eprintln!("{}", format_failure(report));
    }
}

/// Wait for a batch and surface any media failure as a warning.
pub async fn report_media(batch: MediaBatch) -> Result<(), CliError> {
    if batch.is_uploading() {
        eprintln!("Uploading {} photo(s)...", batch.uploads().len());
    }
    let report = batch.finish().await?;
    print_failures(report.failures());
    Ok(())
}
