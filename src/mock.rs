//! Built-in data used when no data directory is given.
//!
//! Everything is derived from fixed tables with modular arithmetic, so the
//! same records come out on every start.

use crate::records::{Dataset, DatasetKind, Record, Value};

const PACKAGES: [&str; 5] = ["Базовый", "Расширенный", "Премиум", "Детский", "Спортивный"];

const CHANNELS: [&str; 10] = [
    "Первый канал",
    "Россия 1",
    "Матч ТВ",
    "НТВ",
    "Пятый канал",
    "Карусель",
    "Культура",
    "РЕН ТВ",
    "СТС",
    "ТНТ",
];

const STREETS: [&str; 6] = [
    "ул. Ленина",
    "ул. Гагарина",
    "пр. Мира",
    "ул. Советская",
    "ул. Садовая",
    "ул. Лесная",
];

const AGE_RANGES: [&str; 5] = ["18-24", "25-34", "35-44", "45-54", "55+"];

const CATEGORIES: [(&str, &str); 6] = [
    ("Спорт", "Футбол"),
    ("Новости", "Политика"),
    ("Фильмы", "Драма"),
    ("Сериалы", "Детектив"),
    ("Детям", "Мультфильмы"),
    ("Познавательное", "Документальное"),
];

const CHANNEL_COUNT: usize = 18;
const BUILDING_COUNT: usize = 12;
const CLIENT_COUNT: usize = 23;
const VIEWING_COUNT: usize = 40;

fn channel_id(i: usize) -> i64 {
    100 + i as i64
}

fn address(i: usize) -> String {
    format!("{}, {}", STREETS[i % STREETS.len()], 3 + i * 7 % 40)
}

fn client_id(i: usize) -> String {
    format!("CL-{:04}", i + 1)
}

fn clock(minutes: usize) -> String {
    format!("2024-03-01 {:02}:{:02}:00", (minutes / 60) % 24, minutes % 60)
}

pub fn package_channels() -> Dataset {
    let records = (0..CHANNEL_COUNT)
        .map(|i| {
            let ch_id = channel_id(i);
            Record::new(
                ch_id.to_string(),
                vec![
                    Value::text(PACKAGES[i % PACKAGES.len()]),
                    Value::Int(ch_id),
                ],
            )
        })
        .collect();
    Dataset::new(DatasetKind::PackageChannels, records)
}

pub fn buildings() -> Dataset {
    let records = (0..BUILDING_COUNT)
        .map(|i| {
            let floors = 5 + (i * 3) % 12;
            let entrances = 1 + i % 6;
            let flats = floors * entrances * 4;
            let addr = address(i);
            Record::new(
                addr.clone(),
                vec![
                    Value::text(addr),
                    Value::Int(flats as i64),
                    Value::Int(entrances as i64),
                    Value::Int(floors as i64),
                ],
            )
        })
        .collect();
    Dataset::new(DatasetKind::Buildings, records)
}

pub fn clients() -> Dataset {
    let records = (0..CLIENT_COUNT)
        .map(|i| {
            let id = client_id(i);
            Record::new(
                id.clone(),
                vec![
                    Value::text(id),
                    Value::text(address(i % BUILDING_COUNT)),
                    Value::text(if i % 2 == 0 { "М" } else { "Ж" }),
                    Value::text(AGE_RANGES[(i * 3) % AGE_RANGES.len()]),
                ],
            )
        })
        .collect();
    Dataset::new(DatasetKind::Clients, records)
}

pub fn viewing_stats() -> Dataset {
    let records = (0..VIEWING_COUNT)
        .map(|i| {
            let channel = (i * 7) % CHANNELS.len();
            let (category, subcategory) = CATEGORIES[(i * 5) % CATEGORIES.len()];
            let start = 18 * 60 + (i * 13) % 300;
            let duration = 5 + (i * 17) % 110;
            Record::new(
                format!("epg-{}", i + 1),
                vec![
                    Value::text(client_id(i % CLIENT_COUNT)),
                    Value::text(format!("STB-{:03}", (i % CLIENT_COUNT) * 2 + i % 2)),
                    Value::text(clock(start)),
                    Value::Int(channel_id(channel)),
                    Value::text(CHANNELS[channel]),
                    Value::text(clock(start - start % 30)),
                    Value::text(clock(start - start % 30 + 60)),
                    Value::Int(duration as i64),
                    Value::text(category),
                    Value::text(subcategory),
                ],
            )
        })
        .collect();
    Dataset::new(DatasetKind::ViewingStats, records)
}

/// All tables in the order they are shown on the tables page.
pub fn datasets() -> Vec<Dataset> {
    vec![package_channels(), clients(), buildings(), viewing_stats()]
}
