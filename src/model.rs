use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::domain::{DashConfig, DashError, HELP_TEXT, Message};
use crate::filter::{apply_filter, get_comparator};
use crate::inputter::{InputResult, Inputter};
use crate::nav::{NAV_DATA, Route};
use crate::records::{Dataset, DatasetKind, Record, Value};
use crate::segments::{SEGMENT_COUNT, SegmentReport, segment_viewers};
use crate::stats::totals_by;
use crate::table_state::{Order, SelectionState, TableViewState, empty_rows};

pub const COLUMN_WIDTH_MARGIN: usize = 1;
const TOP_CATEGORIES: usize = 8;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// One table on the tables page together with its view state.
pub struct TablePanel {
    dataset: Dataset,
    state: TableViewState,
    filter: String,
    curser_row: usize, // Row within the current page
    curser_column: usize,
}

impl TablePanel {
    fn new(dataset: Dataset, rows_per_page: usize) -> Result<Self, DashError> {
        let name = dataset.kind.name_column();
        let mut state = TableViewState::new(name);
        state.on_change_rows_per_page(&rows_per_page.to_string())?;
        Ok(Self {
            dataset,
            state,
            filter: String::new(),
            curser_row: 0,
            curser_column: 0,
        })
    }

    /// Filtered and sorted records, in display order.
    fn view(&self) -> Vec<&Record> {
        let column = self.dataset.kind.column_index(&self.state.order_by);
        apply_filter(
            &self.dataset.records,
            get_comparator(self.state.order, column),
            &self.filter,
            self.dataset.name_column(),
        )
    }

    fn page_len(&self) -> usize {
        self.state.page_range(self.view().len()).len()
    }

    fn current_record(&self) -> Option<&Record> {
        let view = self.view();
        let range = self.state.page_range(view.len());
        view.get(range.start + self.curser_row)
            .copied()
            .filter(|_| range.start + self.curser_row < range.end)
    }

    /// Rows to copy: the selection in display order, or the row under the
    /// cursor when nothing is selected.
    fn rows_to_copy(&self) -> Vec<&Record> {
        if self.state.selected.is_empty() {
            self.current_record().into_iter().collect()
        } else {
            let mut rows: Vec<&Record> = self
                .view()
                .into_iter()
                .filter(|r| self.state.is_selected(&r.id))
                .collect();
            // Selected rows hidden by the filter still count.
            for r in &self.dataset.records {
                if self.state.is_selected(&r.id) && !rows.iter().any(|x| x.id == r.id) {
                    rows.push(r);
                }
            }
            rows
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub label: String,
    pub sort: Option<Order>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub checked: bool,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PanelView {
    pub title: String,
    pub headers: Vec<HeaderView>,
    pub widths: Vec<usize>,
    pub rows: Vec<RowView>,
    pub selection: SelectionState,
    pub num_selected: usize,
    pub row_count: usize, // All records, ignoring the filter
    pub count: usize,     // Records matching the filter
    pub page: usize,
    pub rows_per_page: usize,
    pub empty_rows: usize,
    pub not_found: bool,
    pub filter: String,
    pub focused: bool,
    pub curser_row: usize,
    pub curser_column: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OverviewView {
    pub counts: Vec<(String, usize)>,
    pub categories: Vec<(String, u64)>,
    pub segments: SegmentReport,
}

pub struct UIData {
    pub route: Route,
    pub panels: Vec<PanelView>,
    pub overview: OverviewView,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            route: Route::Tables,
            panels: Vec::new(),
            overview: OverviewView::default(),
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: DashConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    route: Route,
    panels: Vec<TablePanel>,
    segments: SegmentReport,
    focus: usize,
    ui_size: (usize, usize),
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    status_message: String,
}

impl Model {
    pub fn init(config: &DashConfig, datasets: Vec<Dataset>) -> Result<Self, DashError> {
        let panels = datasets
            .into_iter()
            .map(|ds| TablePanel::new(ds, config.rows_per_page))
            .collect::<Result<Vec<_>, _>>()?;
        // Clustering runs once, the data does not change while running.
        let segments = panels
            .iter()
            .find(|p| p.dataset.kind == DatasetKind::ViewingStats)
            .map(|p| segment_viewers(&p.dataset, SEGMENT_COUNT))
            .unwrap_or_default();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            route: Route::Tables,
            panels,
            segments,
            focus: 0,
            ui_size: (0, 0),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            status_message: "Started epgdash! Press ? for help".to_string(),
        };
        model.update_uidata();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    /// Shows `message` in the status line.
    pub fn report(&mut self, message: impl Into<String>) {
        self.set_status_message(message);
        self.update_uidata();
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DashError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Route {:?}, Message {:?}", self.modus, self.route, msg);
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                Message::Navigate(idx) => self.navigate(idx),
                Message::Resize(width, height) => self.ui_resize(width, height),
                msg if self.route == Route::Tables && !self.panels.is_empty() => {
                    self.table_message(msg)
                }
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.exit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
        self.update_uidata();
        Ok(())
    }

    fn table_message(&mut self, msg: Message) {
        match msg {
            Message::NextPanel => self.focus = (self.focus + 1) % self.panels.len(),
            Message::PrevPanel => {
                self.focus = (self.focus + self.panels.len() - 1) % self.panels.len()
            }
            Message::MoveUp => self.move_selection_up(),
            Message::MoveDown => self.move_selection_down(),
            Message::MoveLeft => self.move_column_left(),
            Message::MoveRight => self.move_column_right(),
            Message::Sort => self.sort_current_column(),
            Message::ToggleRow => self.toggle_current_row(),
            Message::ToggleAll => self.toggle_all_rows(),
            Message::NextPage => self.next_page(),
            Message::PrevPage => self.prev_page(),
            Message::CycleRowsPerPage => self.cycle_rows_per_page(),
            Message::Filter => self.enter_cmd_mode(),
            Message::CopySelection => self.copy_selection(),
            _ => (),
        }
    }

    fn panel(&mut self) -> &mut TablePanel {
        &mut self.panels[self.focus]
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        debug!("Status: {}", self.status_message);
    }

    // -------------------- Control handling functions ---------------------- //

    fn navigate(&mut self, idx: usize) {
        match NAV_DATA.get(idx).and_then(|e| Route::from_path(e.path)) {
            Some(route) => {
                info!("Navigate to {} [{}]", NAV_DATA[idx].path, NAV_DATA[idx].icon.reference());
                self.route = route;
            }
            None => warn!("No navigation entry {idx}"),
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.ui_size.0, width, self.ui_size.1, height
        );
        self.ui_size = (width, height);
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::POPUP => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::TABLE => {
                if self.route == Route::Tables
                    && !self.panels.is_empty()
                    && !self.panel().filter.is_empty()
                {
                    let panel = self.panel();
                    panel.filter.clear();
                    panel.state.on_reset_page();
                    panel.curser_row = 0;
                    self.set_status_message("Filter cleared");
                }
            }
            Modus::CMDINPUT => {}
        }
    }

    fn enter_cmd_mode(&mut self) {
        trace!("Entering filter input ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        let current = self.panel().filter.clone();
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            if !self.last_input.canceled {
                let term = self.last_input.input.clone();
                self.apply_filter_term(term);
            }
            self.input.clear();
        }
    }

    fn apply_filter_term(&mut self, term: String) {
        let panel = self.panel();
        panel.filter = term;
        panel.state.on_reset_page();
        panel.curser_row = 0;
        let matches = panel.view().len();
        let message = if panel.filter.is_empty() {
            "Filter cleared".to_string()
        } else if matches == 0 {
            format!("No records match \"{}\"", panel.filter)
        } else {
            format!("{matches} records match \"{}\"", panel.filter)
        };
        self.set_status_message(message);
    }

    fn move_selection_up(&mut self) {
        let panel = self.panel();
        panel.curser_row = panel.curser_row.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        let panel = self.panel();
        let len = panel.page_len();
        if panel.curser_row + 1 < len {
            panel.curser_row += 1;
        }
    }

    fn move_column_left(&mut self) {
        let panel = self.panel();
        panel.curser_column = panel.curser_column.saturating_sub(1);
    }

    fn move_column_right(&mut self) {
        let panel = self.panel();
        if panel.curser_column + 1 < panel.dataset.columns().len() {
            panel.curser_column += 1;
        }
    }

    fn sort_current_column(&mut self) {
        let panel = self.panel();
        let column = panel.dataset.columns()[panel.curser_column];
        panel.state.on_sort(column.id);
        let message = format!("Sorted by {} {}", column.label, panel.state.order.arrow());
        self.set_status_message(message);
    }

    fn toggle_current_row(&mut self) {
        let panel = self.panel();
        let Some(id) = panel.current_record().map(|r| r.id.clone()) else {
            return;
        };
        panel.state.on_select_row(&id);
        let message = format!("{} selected", panel.state.selected.len());
        self.set_status_message(message);
    }

    fn toggle_all_rows(&mut self) {
        let panel = self.panel();
        let checked = panel.state.selection_state(panel.dataset.len()) != SelectionState::All;
        let ids = panel.dataset.ids();
        panel.state.on_select_all_rows(checked, ids);
        let message = format!("{} selected", panel.state.selected.len());
        self.set_status_message(message);
    }

    fn next_page(&mut self) {
        let panel = self.panel();
        let count = panel.view().len();
        if panel.state.page + 1 < panel.state.page_count(count) {
            let page = panel.state.page + 1;
            panel.state.on_change_page(page);
            panel.curser_row = 0;
        }
    }

    fn prev_page(&mut self) {
        let panel = self.panel();
        if panel.state.page > 0 {
            let page = panel.state.page - 1;
            panel.state.on_change_page(page);
            panel.curser_row = 0;
        }
    }

    fn cycle_rows_per_page(&mut self) {
        let panel = self.panel();
        let next = panel.state.next_rows_per_page();
        match panel.state.on_change_rows_per_page(&next.to_string()) {
            Ok(()) => {
                panel.curser_row = 0;
                self.set_status_message(format!("{next} rows per page"));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn copy_selection(&mut self) {
        let panel = &self.panels[self.focus];
        let rows = panel.rows_to_copy();
        if rows.is_empty() {
            self.set_status_message("Nothing to copy");
            return;
        }
        let count = rows.len();
        let content = rows_as_csv(&panel.dataset, &rows);

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let res = self.clipboard.as_mut().map(|c| c.set_text(content));
        match res {
            Some(Ok(_)) => {
                trace!("Copied {count} rows to clipboard.");
                self.set_status_message(format!("Copied {count} rows"));
            }
            Some(Err(e)) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copy failed");
            }
            None => {}
        }
    }

    // -------------------- Render snapshot ---------------------- //

    fn update_uidata(&mut self) {
        let panels = self
            .panels
            .iter()
            .enumerate()
            .map(|(idx, p)| self.build_panel_view(p, idx == self.focus))
            .collect();
        self.uidata = UIData {
            route: self.route,
            panels,
            overview: self.build_overview(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.modus == Modus::CMDINPUT,
            status_message: self.status_message.clone(),
        };
    }

    fn build_panel_view(&self, panel: &TablePanel, focused: bool) -> PanelView {
        let columns = panel.dataset.columns();
        let view = panel.view();
        let count = view.len();
        let range = panel.state.page_range(count);

        let rows: Vec<RowView> = view[range]
            .iter()
            .map(|r| RowView {
                checked: panel.state.is_selected(&r.id),
                cells: (0..columns.len()).map(|c| r.get(c).to_string()).collect(),
            })
            .collect();

        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(c, def)| {
                let longest = rows
                    .iter()
                    .map(|r| r.cells[c].chars().count())
                    .chain(std::iter::once(def.label.chars().count() + 2))
                    .max()
                    .unwrap_or(0);
                std::cmp::min(longest + COLUMN_WIDTH_MARGIN, self.config.max_column_width)
            })
            .collect();

        let rows = rows
            .into_iter()
            .map(|r| RowView {
                checked: r.checked,
                cells: r
                    .cells
                    .into_iter()
                    .zip(widths.iter())
                    .map(|(cell, &w)| get_visible_name(cell, w))
                    .collect(),
            })
            .collect();

        let headers = columns
            .iter()
            .map(|def| HeaderView {
                label: def.label.to_string(),
                sort: (panel.state.order_by == def.id).then_some(panel.state.order),
            })
            .collect();

        PanelView {
            title: panel.dataset.kind.title().to_string(),
            headers,
            widths,
            rows,
            selection: panel.state.selection_state(panel.dataset.len()),
            num_selected: panel.state.selected.len(),
            row_count: panel.dataset.len(),
            count,
            page: panel.state.page,
            rows_per_page: panel.state.rows_per_page,
            empty_rows: empty_rows(panel.state.page, panel.state.rows_per_page, count),
            not_found: count == 0 && !panel.filter.is_empty(),
            filter: panel.filter.clone(),
            focused,
            curser_row: panel.curser_row,
            curser_column: panel.curser_column,
        }
    }

    fn build_overview(&self) -> OverviewView {
        let counts = self
            .panels
            .iter()
            .map(|p| (p.dataset.kind.title().to_string(), p.dataset.len()))
            .collect();
        let categories = self
            .panels
            .iter()
            .find(|p| p.dataset.kind == DatasetKind::ViewingStats)
            .map(|p| {
                let mut totals = totals_by(&p.dataset, "category", "duration");
                totals.truncate(TOP_CATEGORIES);
                totals
            })
            .unwrap_or_default();
        OverviewView {
            counts,
            categories,
            segments: self.segments.clone(),
        }
    }
}

/// Cuts `name` to `width` characters, marking the cut with "...".
fn get_visible_name(name: String, width: usize) -> String {
    if width < 3 {
        return "".to_string();
    }
    if name.chars().count() > width {
        let mut reduced: String = name.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    } else {
        name
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c
        .chars()
        .any(|c| matches!(c, ' ' | '\t' | ',' | '"' | '\n' | '\r'));
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

/// Header line with the column ids followed by one line per record.
fn rows_as_csv(dataset: &Dataset, rows: &[&Record]) -> String {
    let columns = dataset.columns();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.iter().map(|c| c.id).collect::<Vec<_>>().join(","));
    for r in rows {
        let line = (0..columns.len())
            .map(|c| match r.get(c) {
                Value::Empty => String::new(),
                v => wrap_cell_content(&v.to_string()),
            })
            .collect::<Vec<String>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}
