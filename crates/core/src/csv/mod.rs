//! Comma separated export and import of player records.
//!
//! A file is one header line followed by one line per player, LF
//! terminated. Modelled players fill all fifteen columns. User players only
//! fill the first four and leave the rest blank so that stale dial values
//! never reach the file.
//!
//! ```text
//! Player ID,Is User,MIDI Channel,Volume,Delay,...,Alpha 4,Beta 4
//! 1,1,1,0.5,,,,,,,,,,
//! 2,0,2,0.75,10,1,2,0.1,0.5,0.2,0.6,0.3,0.7,0.4,0.8
//! ```
//!
//! Numbers use Rust's shortest round-tripping decimal form, so decoding
//! recovers exactly the values that were encoded.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::player::{
    ParamRange, PlayerRecord, SlotIndex, COUPLING_COUNT, COUPLING_RANGE, DELAY_RANGE,
    MIDI_CHANNEL_MAX, MIDI_CHANNEL_MIN, MOTOR_NOISE_RANGE, SLOT_COUNT, TIME_KEEPER_NOISE_RANGE,
    VOLUME_RANGE,
};
use crate::{EnsembleStore, MetronomeError, Result};

/// Column names, in the order values appear on each line.
pub const COLUMNS: [&str; COLUMN_COUNT] = [
    "Player ID",
    "Is User",
    "MIDI Channel",
    "Volume",
    "Delay",
    "Motor Noise STD",
    "Time Keeper Noise STD",
    "Alpha 1",
    "Beta 1",
    "Alpha 2",
    "Beta 2",
    "Alpha 3",
    "Beta 3",
    "Alpha 4",
    "Beta 4",
];

pub const COLUMN_COUNT: usize = 15;

/// Field count of a user row as written: four values and a blank tail.
pub const USER_ROW_FIELDS: usize = 14;

const LEADING_FIELDS: usize = 4;

/// The header line without its terminator.
pub fn header() -> String {
    COLUMNS.join(",")
}

/// Encodes a single player as one LF-terminated line.
pub fn encode_record(record: &PlayerRecord) -> String {
    let mut line = format!(
        "{},{},{},{}",
        record.id,
        u8::from(record.is_user),
        record.midi_channel,
        record.volume
    );

    if record.is_user {
        line.push_str(&",".repeat(USER_ROW_FIELDS - LEADING_FIELDS));
    } else {
        let _ = write!(
            line,
            ",{},{},{}",
            record.delay, record.motor_noise_std, record.time_keeper_noise_std
        );
        for (alpha, beta) in record.alphas.iter().zip(record.betas.iter()) {
            let _ = write!(line, ",{alpha},{beta}");
        }
    }

    line.push('\n');
    line
}

/// Encodes a header followed by every record.
pub fn encode(records: &[PlayerRecord]) -> String {
    let mut text = header();
    text.push('\n');
    for record in records {
        text.push_str(&encode_record(record));
    }
    text
}

/// Writes the encoded records into any sink.
pub fn write_to<W: Write>(writer: &mut W, records: &[PlayerRecord]) -> Result<()> {
    writer.write_all(encode(records).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Writes the records to `path`. An existing file is deleted first and then
/// recreated, never appended to.
pub fn export_to_path(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, records)?;
    tracing::info!(?path, players = records.len(), "exported player parameters");
    Ok(())
}

/// A decoded record together with the 1-based line it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedRow {
    pub line: usize,
    pub record: PlayerRecord,
}

/// Decodes CSV text into at most four records, stopping at the first
/// malformed line.
pub fn decode(text: &str) -> Result<Vec<PlayerRecord>> {
    Ok(decode_rows(text)?.into_iter().map(|row| row.record).collect())
}

/// Like [`decode`] but keeps the source line of each record.
pub fn decode_rows(text: &str) -> Result<Vec<DecodedRow>> {
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(index, line)| (index + 1, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_line, header_text) = lines
        .next()
        .ok_or_else(|| MetronomeError::format(1, "missing header line"))?;
    check_header(header_line, header_text)?;

    let mut rows: Vec<DecodedRow> = Vec::with_capacity(SLOT_COUNT);
    for (line, text) in lines {
        if rows.len() == SLOT_COUNT {
            return Err(MetronomeError::format(
                line,
                format!("more than {SLOT_COUNT} player rows"),
            ));
        }
        let record = decode_line(line, text)?;
        if let Some(previous) = rows.iter().find(|row| row.record.id == record.id) {
            return Err(MetronomeError::format(
                line,
                format!(
                    "player id {} already defined on line {}",
                    record.id, previous.line
                ),
            ));
        }
        rows.push(DecodedRow { line, record });
    }

    Ok(rows)
}

/// Decodes `text` and writes the rows into `store`.
///
/// Rows replace the slot named by their player id; slots without a row keep
/// their record. User players must still occupy the leading slots afterwards.
/// On any error the store is left exactly as it was.
pub fn apply_import(store: &mut EnsembleStore, text: &str) -> Result<usize> {
    let rows = decode_rows(text)?;

    let mut records = *store.records();
    let mut source_line: [Option<usize>; SLOT_COUNT] = [None; SLOT_COUNT];
    for row in &rows {
        let slot = row.record.slot()?;
        records[slot.get()] = row.record;
        source_line[slot.get()] = Some(row.line);
    }

    let mut user_count = 0;
    let mut first_modelled: Option<usize> = None;
    for (index, record) in records.iter().enumerate() {
        match (record.is_user, first_modelled) {
            (true, None) => user_count += 1,
            (true, Some(modelled)) => {
                let line = source_line[index]
                    .or(source_line[modelled])
                    .unwrap_or(1);
                return Err(MetronomeError::format(
                    line,
                    format!(
                        "user player {} follows modelled player {}",
                        record.id,
                        modelled + 1
                    ),
                ));
            }
            (false, None) => first_modelled = Some(index),
            (false, Some(_)) => {}
        }
    }

    store.replace_all(records)?;
    store.set_active_user_count(user_count)?;
    tracing::info!(rows = rows.len(), user_players = user_count, "imported player parameters");
    Ok(rows.len())
}

/// Reads `path` and applies it to `store` through [`apply_import`].
pub fn import_from_path(store: &mut EnsembleStore, path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path)?;
    apply_import(store, &text)
}

fn check_header(line: usize, text: &str) -> Result<()> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() != COLUMN_COUNT {
        return Err(MetronomeError::format(
            line,
            format!(
                "header has {} columns, expected {COLUMN_COUNT}",
                fields.len()
            ),
        ));
    }
    for (found, expected) in fields.iter().zip(COLUMNS.iter()) {
        if !found.eq_ignore_ascii_case(expected) {
            return Err(MetronomeError::format(
                line,
                format!("unexpected column `{found}`, expected `{expected}`"),
            ));
        }
    }
    Ok(())
}

fn decode_line(line: usize, text: &str) -> Result<PlayerRecord> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() < LEADING_FIELDS {
        return Err(field_count_error(line, fields.len(), COLUMN_COUNT));
    }

    let id: u32 = parse_field(line, "Player ID", fields[0])?;
    let slot = SlotIndex::from_player_id(id)
        .map_err(|_| MetronomeError::format(line, format!("player id {id} is not in 1..={SLOT_COUNT}")))?;
    let is_user = match fields[1] {
        "1" => true,
        "0" => false,
        other => {
            return Err(MetronomeError::format(
                line,
                format!("Is User must be 0 or 1, found `{other}`"),
            ))
        }
    };

    let width_ok =
        fields.len() == COLUMN_COUNT || (is_user && fields.len() == USER_ROW_FIELDS);
    if !width_ok {
        return Err(field_count_error(line, fields.len(), COLUMN_COUNT));
    }
    // The short user form is only valid with its whole tail blank.
    let short_tail = &fields[LEADING_FIELDS..];
    if fields.len() == USER_ROW_FIELDS && short_tail.iter().any(|field| !field.is_empty()) {
        return Err(field_count_error(line, fields.len(), COLUMN_COUNT));
    }

    let midi_channel: u8 = parse_field(line, "MIDI Channel", fields[2])?;
    if !(MIDI_CHANNEL_MIN..=MIDI_CHANNEL_MAX).contains(&midi_channel) {
        return Err(MetronomeError::format(
            line,
            format!("MIDI Channel {midi_channel} is not in {MIDI_CHANNEL_MIN}..={MIDI_CHANNEL_MAX}"),
        ));
    }
    let volume = parse_ranged(line, 3, fields[3], VOLUME_RANGE)?;

    let mut record = PlayerRecord {
        id: slot.player_id(),
        is_user,
        midi_channel,
        volume,
        ..PlayerRecord::placeholder(slot)
    };

    // User rows may carry a blank tail; anything present is still checked.
    let secondary = |column: usize, range: ParamRange| -> Result<f64> {
        match fields.get(column) {
            Some(value) if is_user && value.is_empty() => Ok(0.0),
            None if is_user => Ok(0.0),
            Some(value) => parse_ranged(line, column, value, range),
            None => Err(field_count_error(line, fields.len(), COLUMN_COUNT)),
        }
    };

    record.delay = secondary(4, DELAY_RANGE)?;
    record.motor_noise_std = secondary(5, MOTOR_NOISE_RANGE)?;
    record.time_keeper_noise_std = secondary(6, TIME_KEEPER_NOISE_RANGE)?;
    for j in 0..COUPLING_COUNT {
        record.alphas[j] = secondary(7 + 2 * j, COUPLING_RANGE)?;
        record.betas[j] = secondary(8 + 2 * j, COUPLING_RANGE)?;
    }

    Ok(record)
}

fn field_count_error(line: usize, found: usize, expected: usize) -> MetronomeError {
    MetronomeError::format(line, format!("expected {expected} fields, found {found}"))
}

fn parse_field<T: std::str::FromStr>(line: usize, column: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        MetronomeError::format(line, format!("{column} `{value}` is not a valid number"))
    })
}

fn parse_ranged(line: usize, column: usize, value: &str, range: ParamRange) -> Result<f64> {
    let name = COLUMNS[column];
    let parsed: f64 = parse_field(line, name, value)?;
    if !parsed.is_finite() || !range.contains(parsed) {
        return Err(MetronomeError::format(
            line,
            format!("{name} {value} is not in [{}, {}]", range.min, range.max),
        ));
    }
    Ok(parsed)
}
