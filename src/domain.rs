use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [5, 10, 25];

pub const HELP_TEXT: &str = "\
q        quit
?        this help
1 2 3    switch page (Статистика, Таблицы, Вход)
Tab      focus next table, Shift-Tab previous
↑ ↓ j k  move row cursor
← → h l  move column cursor
s Enter  sort by column under the cursor
Space    select / deselect row
a        select all / clear selection
n PgDn   next page
p PgUp   previous page
r        cycle rows per page (5, 10, 25)
/        filter by name
y        copy selected rows as CSV
Esc      close popup, clear filter";

#[derive(Debug)]
pub enum DashError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    DataDirNotFound(PathBuf),
    MissingColumn { file: String, column: String },
    InvalidRowsPerPage(String),
    PathExpansion(String),
}

impl fmt::Display for DashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashError::IoError(e) => write!(f, "io error: {e}"),
            DashError::PolarsError(e) => write!(f, "could not read table: {e}"),
            DashError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            DashError::DataDirNotFound(p) => {
                write!(f, "data directory {} does not exist", p.display())
            }
            DashError::MissingColumn { file, column } => {
                write!(f, "{file} has no column \"{column}\"")
            }
            DashError::InvalidRowsPerPage(raw) => {
                write!(
                    f,
                    "\"{raw}\" is not a valid rows per page value, expected one of {ROWS_PER_PAGE_OPTIONS:?}"
                )
            }
            DashError::PathExpansion(msg) => write!(f, "could not expand path: {msg}"),
        }
    }
}

impl std::error::Error for DashError {}

impl From<Error> for DashError {
    fn from(err: Error) -> Self {
        DashError::IoError(err)
    }
}

impl From<PolarsError> for DashError {
    fn from(err: PolarsError) -> Self {
        DashError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct DashConfig {
    pub event_poll_time: u64,
    pub rows_per_page: usize,
    pub max_column_width: usize,
    #[setters(strip_option)]
    pub data_dir: Option<PathBuf>,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            rows_per_page: ROWS_PER_PAGE_OPTIONS[0],
            max_column_width: 32,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Navigate(usize),
    NextPanel,
    PrevPanel,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Sort,
    ToggleRow,
    ToggleAll,
    NextPage,
    PrevPage,
    CycleRowsPerPage,
    Filter,
    CopySelection,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
