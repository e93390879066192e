use crate::errors::StorageError;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::path::Path;
use tokio::fs;

pub const HABITS_FILE: &str = "habits.csv";
pub const EVENTS_FILE: &str = "events.csv";
pub const POINTS_FILE: &str = "points.json";
pub const LEADERBOARD_FILE: &str = "leaderboard.csv";
pub const REMINDER_FILE: &str = "reminder.txt";

/// Writes `payload` to a sibling temp file and renames it over `path`, so a
/// failed write leaves the previous contents intact.
pub async fn atomic_write(path: &Path, payload: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp_path, payload).await?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    Ok(())
}

/// Creates the table with only its header row when it does not exist yet.
pub async fn ensure_csv(path: &Path, header: &[&str]) -> Result<(), StorageError> {
    if fs::try_exists(path).await? {
        return Ok(());
    }
    atomic_write(path, &header_line(header)?).await
}

pub async fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let bytes = fs::read(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes.as_slice());
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Rewrites the whole table: header first, then one line per row.
pub async fn write_csv<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: &[T],
) -> Result<(), StorageError> {
    let mut payload = header_line(header)?;
    payload.extend(encode_rows(rows)?);
    atomic_write(path, &payload).await
}

/// Appends one row without parsing the rows already on disk.
pub async fn append_csv<T: Serialize>(
    path: &Path,
    header: &[&str],
    row: &T,
) -> Result<(), StorageError> {
    let mut payload = match fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => header_line(header)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => header_line(header)?,
        Err(err) => return Err(err.into()),
    };
    if payload.last() != Some(&b'\n') {
        payload.push(b'\n');
    }
    payload.extend(encode_rows(std::slice::from_ref(row))?);
    atomic_write(path, &payload).await
}

/// Reads a JSON document, treating a missing or blank file as the default value.
pub async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StorageError> {
    match fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

pub async fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StorageError> {
    let payload = serde_json::to_vec_pretty(data)?;
    atomic_write(path, &payload).await
}

/// Creates an empty JSON object at `path` if nothing is there yet.
pub async fn ensure_json(path: &Path) -> Result<(), StorageError> {
    if fs::try_exists(path).await? {
        return Ok(());
    }
    atomic_write(path, b"{}").await
}

fn header_line(header: &[&str]) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    writer
        .into_inner()
        .map_err(|err| StorageError::Io(std::io::Error::new(err.error().kind(), err.to_string())))
}

fn encode_rows<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| StorageError::Io(std::io::Error::new(err.error().kind(), err.to_string())))
}

/// Counter cell: empty, `nan` or garbage reads as 0; `3.0` reads as 3.
pub fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(parse_count).unwrap_or(0))
}

/// Date cell: anything that is not `YYYY-MM-DD` reads as "never".
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<chrono::NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

pub fn parse_date(raw: &str) -> Option<chrono::NaiveDate> {
    let raw = raw.trim();
    // Accept full timestamps too; only the calendar day matters.
    let day = raw.get(..10).unwrap_or(raw);
    chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_count(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return value;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value as u64,
        _ => 0,
    }
}
