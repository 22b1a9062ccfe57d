use std::cmp::Ordering;
use std::fmt;

/// A single cell. Numbers sort before text, empty cells sort last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
    Empty,
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Text(_) => 1,
            Value::Empty => 2,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Value::Empty } else { Value::Text(s) }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
            Value::Empty => f.write_str("∅"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    pub fn get(&self, column: usize) -> &Value {
        self.values.get(column).unwrap_or(&Value::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDef {
    pub id: &'static str,
    pub label: &'static str,
    pub numeric: bool,
    /// Longest text accepted when loading, longer values are cut.
    pub max_len: Option<usize>,
}

const fn text(id: &'static str, label: &'static str, max_len: usize) -> ColumnDef {
    ColumnDef {
        id,
        label,
        numeric: false,
        max_len: Some(max_len),
    }
}

const fn number(id: &'static str, label: &'static str) -> ColumnDef {
    ColumnDef {
        id,
        label,
        numeric: true,
        max_len: None,
    }
}

const PACKAGE_CHANNEL_COLUMNS: &[ColumnDef] = &[
    text("pack_name", "Название пакета", 50),
    number("ch_id", "ID канала"),
];

const CLIENT_COLUMNS: &[ColumnDef] = &[
    text("client_id", "ID клиента", 50),
    text("address", "Адрес", 255),
    text("gender", "Пол", 1),
    text("age_range", "Возрастной диапазон", 50),
];

const ADDRESS_COLUMNS: &[ColumnDef] = &[
    text("address", "Адрес", 255),
    number("flats", "Кол-во квартир"),
    number("entrances", "Кол-во подъездов"),
    number("floors", "Кол-во этажей"),
];

const EPG_STAT_COLUMNS: &[ColumnDef] = &[
    text("client_id", "ID клиента", 50),
    text("device_id", "ID устройства", 50),
    text("time_ch", "Выбор канала", 50),
    number("ch_id", "ID канала"),
    text("epg_name", "Название канала", 255),
    text("time_epg", "Время начала программы", 50),
    text("time_to_epg", "Время окончания программы", 50),
    number("duration", "Продолжительность сеанса"),
    text("category", "Категория", 50),
    text("subcategory", "Подкатегория", 50),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    PackageChannels,
    Clients,
    Buildings,
    ViewingStats,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::PackageChannels,
        DatasetKind::Clients,
        DatasetKind::Buildings,
        DatasetKind::ViewingStats,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            DatasetKind::PackageChannels => "Связь пакетов и каналов",
            DatasetKind::Clients => "Информация о клиентах",
            DatasetKind::Buildings => "Информация о домах",
            DatasetKind::ViewingStats => "Статистика просмотров телепередач",
        }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            DatasetKind::PackageChannels => PACKAGE_CHANNEL_COLUMNS,
            DatasetKind::Clients => CLIENT_COLUMNS,
            DatasetKind::Buildings => ADDRESS_COLUMNS,
            DatasetKind::ViewingStats => EPG_STAT_COLUMNS,
        }
    }

    /// File the table is exported to, relative to the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetKind::PackageChannels => "package_channel.csv",
            DatasetKind::Clients => "client.csv",
            DatasetKind::Buildings => "address.csv",
            DatasetKind::ViewingStats => "epg_stat.csv",
        }
    }

    /// Column that uniquely identifies a row. Viewing statistics have none.
    pub fn key_column(&self) -> Option<&'static str> {
        match self {
            DatasetKind::PackageChannels => Some("ch_id"),
            DatasetKind::Clients => Some("client_id"),
            DatasetKind::Buildings => Some("address"),
            DatasetKind::ViewingStats => None,
        }
    }

    /// Column the free text filter matches against.
    pub fn name_column(&self) -> &'static str {
        match self {
            DatasetKind::PackageChannels => "pack_name",
            DatasetKind::Clients => "client_id",
            DatasetKind::Buildings => "address",
            DatasetKind::ViewingStats => "epg_name",
        }
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(kind: DatasetKind, records: Vec<Record>) -> Self {
        Self { kind, records }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        self.kind.columns()
    }

    pub fn name_column(&self) -> usize {
        self.kind.column_index(self.kind.name_column()).unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
