//! Loads the dashboard tables from a directory of `;` separated CSV exports.
//!
//! Rows go through the same cleaning the database uploader applies before
//! inserting: column names are lower-cased, numbers coerced, viewing
//! timestamps parsed, empty keys and duplicate keys dropped, overlong text cut,
//! and rows referring to unknown addresses, clients or channels removed.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::DashError;
use crate::records::{ColumnDef, Dataset, DatasetKind, Record, Value};

const KEY_SEPARATOR: &str = "\u{1f}";

/// time_ch, time_epg and time_to_epg
const TIMESTAMP_COLUMNS: [usize; 3] = [2, 5, 6];
const TIMESTAMP_OUTPUT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

/// Raw cells of one file, already reduced to the table's columns in their
/// declared order.
#[derive(Debug)]
struct RawTable {
    kind: DatasetKind,
    rows: Vec<Vec<Option<String>>>,
}

/// Ids other tables may refer to.
#[derive(Debug, Default)]
struct KnownKeys {
    addresses: HashSet<String>,
    clients: HashSet<String>,
    channels: HashSet<i64>,
}

pub struct LoadResult {
    pub datasets: Vec<Dataset>,
    /// One line per table that could not be read. Those tables are empty.
    pub failures: Vec<String>,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, DashError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DashError::PathExpansion(e.to_string()))
}

#[instrument]
pub fn load_dir(dir: &Path) -> Result<LoadResult, DashError> {
    if !dir.is_dir() {
        return Err(DashError::DataDirNotFound(dir.to_path_buf()));
    }
    let start_time = Instant::now();

    // Files are independent until cleaning, read them all at once.
    let raw: Vec<(DatasetKind, Result<RawTable, DashError>)> = DatasetKind::ALL
        .par_iter()
        .map(|&kind| (kind, read_table(&dir.join(kind.file_name()), kind)))
        .collect();

    let mut failures = Vec::new();
    let mut tables = Vec::with_capacity(raw.len());
    for (kind, res) in raw {
        match res {
            Ok(t) => tables.push(t),
            Err(e) => {
                error!("Could not load {}: {e}", kind.file_name());
                failures.push(format!("{}: {e}", kind.file_name()));
                tables.push(RawTable {
                    kind,
                    rows: Vec::new(),
                });
            }
        }
    }

    // Cleaning order follows the foreign keys: addresses before clients,
    // clients and channels before viewing statistics.
    let mut known = KnownKeys::default();
    let mut cleaned: Vec<Dataset> = Vec::with_capacity(tables.len());
    for kind in [
        DatasetKind::Buildings,
        DatasetKind::Clients,
        DatasetKind::PackageChannels,
        DatasetKind::ViewingStats,
    ] {
        let Some(pos) = tables.iter().position(|t| t.kind == kind) else {
            continue;
        };
        let table = tables.swap_remove(pos);
        let ds = clean_table(table, &known);
        known.remember(&ds);
        cleaned.push(ds);
    }

    // Back to page order
    cleaned.sort_by_key(|d| DatasetKind::ALL.iter().position(|k| *k == d.kind));

    info!("Loading data took {}ms ...", start_time.elapsed().as_millis());
    Ok(LoadResult {
        datasets: cleaned,
        failures,
    })
}

#[instrument(skip(kind))]
fn read_table(path: &Path, kind: DatasetKind) -> Result<RawTable, DashError> {
    if !path.is_file() {
        return Err(DashError::LoadingFailed(format!(
            "{} is not a file",
            path.display()
        )));
    }
    let df = LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_separator(b';')
        .with_encoding(CsvEncoding::LossyUtf8)
        .finish()?
        .collect()?;

    let file = kind.file_name().to_string();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut columns = Vec::with_capacity(kind.columns().len());
    for def in kind.columns() {
        let name = names
            .iter()
            .find(|n| n.trim().to_lowercase() == def.id)
            .ok_or_else(|| DashError::MissingColumn {
                file: file.clone(),
                column: def.id.to_string(),
            })?;
        columns.push(read_column(&df, name)?);
    }

    let nrows = df.height();
    let rows = (0..nrows)
        .map(|r| columns.iter().map(|c| c[r].clone()).collect())
        .collect();
    debug!("Read {nrows} rows from {}", path.display());
    Ok(RawTable { kind, rows })
}

fn read_column(df: &DataFrame, col_name: &str) -> Result<Vec<Option<String>>, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    Ok(series
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
    })
}

fn truncate(s: &str, def: &ColumnDef) -> String {
    match def.max_len {
        Some(n) => s.chars().take(n).collect(),
        None => s.to_string(),
    }
}

/// Converts raw cells to typed values. `None` marks a number that failed to
/// parse, which is distinct from an absent cell.
fn typed_cell(cell: &Option<String>, def: &ColumnDef) -> Option<Value> {
    match cell {
        None => Some(Value::Empty),
        Some(s) if def.numeric => parse_int(s).map(Value::Int),
        Some(s) => Some(Value::text(truncate(s, def))),
    }
}

impl KnownKeys {
    fn remember(&mut self, ds: &Dataset) {
        match ds.kind {
            DatasetKind::Buildings => {
                self.addresses = ds.ids().into_iter().collect();
            }
            DatasetKind::Clients => {
                self.clients = ds.ids().into_iter().collect();
            }
            DatasetKind::PackageChannels => {
                self.channels = ds
                    .records
                    .iter()
                    .filter_map(|r| match r.get(1) {
                        Value::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
            }
            DatasetKind::ViewingStats => {}
        }
    }
}

fn clean_table(table: RawTable, known: &KnownKeys) -> Dataset {
    let kind = table.kind;
    let defs = kind.columns();
    let total = table.rows.len();
    let key_idx = kind.key_column().and_then(|k| kind.column_index(k));

    let mut seen: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(total);
    for raw in table.rows {
        // Viewing rows without their keys or with broken timestamps are gone
        // before duplicates are looked for.
        let raw = match kind {
            DatasetKind::ViewingStats => match normalize_viewing_row(raw) {
                Some(r) => r,
                None => continue,
            },
            _ => raw,
        };

        // Duplicate keys, first row wins.
        if !seen.insert(row_key(kind, key_idx, &raw)) {
            continue;
        }

        let values: Vec<Option<Value>> = raw
            .iter()
            .zip(defs.iter())
            .map(|(c, d)| typed_cell(c, d))
            .collect();

        let Some(values) = accept_row(kind, values, known) else {
            continue;
        };

        // Cut keys can collide even when the raw keys differ.
        let key = match key_idx {
            Some(k) => values[k].to_string(),
            None => values[..3]
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(KEY_SEPARATOR),
        };
        if !seen_ids.insert(key.clone()) {
            debug!("{}: dropping row with repeated key {key}", kind.file_name());
            continue;
        }
        let id = match key_idx {
            Some(_) => key,
            None => format!("epg-{}", records.len() + 1),
        };
        records.push(Record::new(id, values));
    }

    let dropped = total - records.len();
    if dropped > 0 {
        warn!("{}: dropped {dropped} of {total} rows while cleaning", kind.file_name());
    }
    info!("{}: {} records", kind.file_name(), records.len());
    Dataset::new(kind, records)
}

fn row_key(kind: DatasetKind, key_idx: Option<usize>, raw: &[Option<String>]) -> String {
    match kind {
        // client, device and channel switch time
        DatasetKind::ViewingStats => raw[..3]
            .iter()
            .map(|c| c.clone().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR),
        _ => key_idx.and_then(|k| raw[k].clone()).unwrap_or_default(),
    }
}

/// Checks the key fields of a viewing row and rewrites its three timestamps
/// as `YYYY-MM-DD HH:MM:SS`. Returns `None` if a key is missing, the channel
/// is not a number or a timestamp does not parse.
fn normalize_viewing_row(mut raw: Vec<Option<String>>) -> Option<Vec<Option<String>>> {
    // client, device, channel switch time, channel
    if raw[..4].iter().any(|c| c.is_none()) {
        return None;
    }
    parse_int(raw[3].as_deref()?)?;
    for idx in TIMESTAMP_COLUMNS {
        let ts = parse_timestamp(raw[idx].as_deref()?)?;
        raw[idx] = Some(ts.format(TIMESTAMP_OUTPUT).to_string());
    }
    Some(raw)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Applies the per table row rules. Returns `None` for rejected rows.
fn accept_row(
    kind: DatasetKind,
    values: Vec<Option<Value>>,
    known: &KnownKeys,
) -> Option<Vec<Value>> {
    match kind {
        DatasetKind::Buildings => {
            // Unparsable counts become 0, a missing address rejects the row.
            let values: Vec<Value> = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| match v {
                    Some(Value::Empty) if i > 0 => Value::Int(0),
                    Some(v) => v,
                    None => Value::Int(0),
                })
                .collect();
            (values[0] != Value::Empty).then_some(values)
        }
        DatasetKind::Clients => {
            let values: Vec<Value> = values.into_iter().collect::<Option<_>>()?;
            let address_known = match &values[1] {
                Value::Text(a) => known.addresses.contains(a),
                _ => false,
            };
            (values[0] != Value::Empty && address_known).then_some(values)
        }
        DatasetKind::PackageChannels => {
            let values: Vec<Value> = values.into_iter().collect::<Option<_>>()?;
            matches!(values[1], Value::Int(_)).then_some(values)
        }
        DatasetKind::ViewingStats => {
            let values: Vec<Value> = values.into_iter().collect::<Option<_>>()?;
            // client, device, channel switch time, channel and programme times are required
            let required = [0, 1, 2, 3, 5, 6];
            if required.iter().any(|&i| values[i] == Value::Empty) {
                return None;
            }
            let duration_ok = matches!(values[7], Value::Int(d) if d >= 0);
            let client_ok = matches!(&values[0], Value::Text(c) if known.clients.contains(c));
            let channel_ok = matches!(values[3], Value::Int(ch) if known.channels.contains(&ch));
            (duration_ok && client_ok && channel_ok).then_some(values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn row(cells: &[&str]) -> Vec<Option<String>> {
        cells
            .iter()
            .map(|c| (!c.is_empty()).then(|| c.to_string()))
            .collect()
    }

    fn ids(ds: &Dataset) -> Vec<String> {
        ds.ids()
    }

    #[test]
    fn buildings_fill_counts_and_drop_duplicates() {
        let table = RawTable {
            kind: DatasetKind::Buildings,
            rows: vec![
                row(&["ул. Ленина, 1", "40", "2", "5"]),
                row(&["ул. Ленина, 1", "99", "9", "9"]),
                row(&["ул. Мира, 2", "abc", "", "9.0"]),
                row(&["", "1", "1", "1"]),
            ],
        };
        let ds = clean_table(table, &KnownKeys::default());
        assert_eq!(ids(&ds), vec!["ул. Ленина, 1", "ул. Мира, 2"]);
        assert_eq!(ds.records[0].get(1), &Value::Int(40));
        assert_eq!(
            ds.records[1].values[1..],
            [Value::Int(0), Value::Int(0), Value::Int(9)]
        );
    }

    #[test]
    fn clients_need_a_known_address() {
        let mut known = KnownKeys::default();
        known.addresses.insert("пр. Мира, 5".to_string());
        let table = RawTable {
            kind: DatasetKind::Clients,
            rows: vec![
                row(&["CL-1", "пр. Мира, 5", "МУЖ", "25-34"]),
                row(&["CL-2", "нигде", "Ж", "18-24"]),
                row(&["", "пр. Мира, 5", "Ж", "18-24"]),
            ],
        };
        let ds = clean_table(table, &known);
        assert_eq!(ids(&ds), vec!["CL-1"]);
        // gender is limited to one character
        assert_eq!(ds.records[0].get(2), &Value::text("М"));
    }

    #[test]
    fn clients_cut_to_the_same_id_are_kept_once() {
        let mut known = KnownKeys::default();
        known.addresses.insert("пр. Мира, 5".to_string());
        let long = "x".repeat(50);
        let table = RawTable {
            kind: DatasetKind::Clients,
            rows: vec![
                row(&[&format!("{long}1"), "пр. Мира, 5", "Ж", "18-24"]),
                row(&[&format!("{long}2"), "пр. Мира, 5", "М", "25-34"]),
            ],
        };
        let ds = clean_table(table, &known);
        assert_eq!(ids(&ds), vec![long]);
        assert_eq!(ds.records[0].get(2), &Value::text("Ж"));
    }

    #[test]
    fn channels_need_a_numeric_id() {
        let table = RawTable {
            kind: DatasetKind::PackageChannels,
            rows: vec![
                row(&["Базовый", "101"]),
                row(&["Премиум", "x12"]),
                row(&["", "102"]),
                row(&["Спорт", "101"]),
            ],
        };
        let ds = clean_table(table, &KnownKeys::default());
        assert_eq!(ids(&ds), vec!["101", "102"]);
        assert_eq!(ds.records[1].get(0), &Value::Empty);
    }

    #[test]
    fn viewing_rows_are_validated_against_known_keys() {
        let mut known = KnownKeys::default();
        known.clients.insert("CL-1".to_string());
        known.channels.insert(101);
        let ok = ["CL-1", "STB-1", "2024-10-01 20:00:00", "101", "Матч ТВ",
            "2024-10-01 20:00:00", "2024-10-01 21:00:00", "30", "Спорт", "Футбол"];
        let mut unknown_channel = ok;
        unknown_channel[3] = "999";
        unknown_channel[2] = "2024-10-01 20:05:00";
        let mut negative = ok;
        negative[7] = "-3";
        negative[2] = "2024-10-01 20:10:00";
        let mut no_start = ok;
        no_start[5] = "";
        no_start[2] = "2024-10-01 20:15:00";

        let table = RawTable {
            kind: DatasetKind::ViewingStats,
            rows: vec![row(&ok), row(&ok), row(&unknown_channel), row(&negative), row(&no_start)],
        };
        let ds = clean_table(table, &known);
        assert_eq!(ids(&ds), vec!["epg-1"]);
        assert_eq!(ds.records[0].get(7), &Value::Int(30));
    }

    fn viewing(device: &str, time_epg: &str) -> Vec<Option<String>> {
        row(&["CL-1", device, "2024-10-01 20:00:00", "101", "Матч ТВ",
            time_epg, "2024-10-01 21:00:00", "30", "Спорт", "Футбол"])
    }

    fn viewing_known() -> KnownKeys {
        let mut known = KnownKeys::default();
        known.clients.insert("CL-1".to_string());
        known.channels.insert(101);
        known
    }

    #[test]
    fn broken_viewing_rows_do_not_hide_valid_duplicates() {
        let table = RawTable {
            kind: DatasetKind::ViewingStats,
            rows: vec![
                viewing("STB-1", ""),
                viewing("STB-1", "2024-10-01 20:00:00"),
                viewing("STB-1", "2024-10-01 20:30:00"),
            ],
        };
        let ds = clean_table(table, &viewing_known());
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].get(5), &Value::text("2024-10-01 20:00:00"));
    }

    #[test]
    fn viewing_rows_need_real_timestamps() {
        let mut junk = viewing("STB-2", "not a date");
        junk[2] = Some("not a date".to_string());
        let mut dotted = viewing("STB-3", "01.10.2024 20:00");
        dotted[6] = Some("2024-10-01T21:00:00".to_string());

        let table = RawTable {
            kind: DatasetKind::ViewingStats,
            rows: vec![junk, dotted],
        };
        let ds = clean_table(table, &viewing_known());
        let devices: Vec<String> = ds.records.iter().map(|r| r.get(1).to_string()).collect();
        assert_eq!(devices, vec!["STB-3"]);
        // timestamps come out in one format
        assert_eq!(ds.records[0].get(5), &Value::text("2024-10-01 20:00:00"));
        assert_eq!(ds.records[0].get(6), &Value::text("2024-10-01 21:00:00"));
    }

    #[test]
    fn parses_common_timestamp_formats() {
        for raw in ["2024-10-01 20:05:00", "2024-10-01T20:05:00.250", "01.10.2024 20:05"] {
            let ts = parse_timestamp(raw).unwrap();
            let out = ts.format(TIMESTAMP_OUTPUT).to_string();
            assert!(out.starts_with("2024-10-01 20:05"), "{raw} -> {out}");
        }
        assert!(parse_timestamp("2024-13-40 25:00:00").is_none());
        assert!(parse_timestamp("вчера").is_none());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let res = load_dir(Path::new("/definitely/not/here"));
        assert!(matches!(res, Err(DashError::DataDirNotFound(_))));
    }

    #[test]
    fn loads_a_directory_of_csv_files() {
        let dir = std::env::temp_dir().join(format!("epgdash-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("address.csv"),
            "Address;Flats;Entrances;Floors\nул. Ленина, 1;40;2;5\n",
        )
        .unwrap();
        fs::write(
            dir.join("client.csv"),
            "Client_ID;Address;Gender;Age_Range\nCL-1;ул. Ленина, 1;Ж;25-34\nCL-2;нет;М;55+\n",
        )
        .unwrap();
        fs::write(dir.join("package_channel.csv"), "pack_name;ch_id\nБазовый;101\n").unwrap();
        // epg_stat.csv lacks the duration column
        fs::write(dir.join("epg_stat.csv"), "client_id;device_id\nCL-1;STB-1\n").unwrap();

        let res = load_dir(&dir).unwrap();
        fs::remove_dir_all(&dir).ok();

        let kinds: Vec<DatasetKind> = res.datasets.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, DatasetKind::ALL.to_vec());
        assert_eq!(res.datasets[0].ids(), vec!["101"]);
        assert_eq!(res.datasets[1].ids(), vec!["CL-1"]);
        assert_eq!(res.datasets[2].records[0].get(1), &Value::Int(40));
        assert!(res.datasets[3].is_empty());
        assert_eq!(res.failures.len(), 1);
        assert!(res.failures[0].starts_with("epg_stat.csv"));
    }

    #[test]
    fn expands_home_in_paths() {
        let p = expand_path("plain/dir").unwrap();
        assert_eq!(p, PathBuf::from("plain/dir"));
    }
}
