use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};

use crate::model::{Model, OverviewView, PanelView, UIData};
use crate::nav::{NAV_DATA, Route};
use crate::segments::SegmentReport;
use crate::table_state::SelectionState;

pub const SIDEBAR_WIDTH: u16 = 22;
pub const STATUSLINE_HEIGHT: u16 = 1;
const CHECKBOX_WIDTH: u16 = 3;
const HISTOGRAM_BAR_WIDTH: usize = 30;

#[derive(Debug, Default)]
pub struct DashUI {
    nav_state: ListState,
}

impl DashUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [body, statusline] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());
        let [sidebar, main] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
                .areas(body);

        self.render_sidebar(uidata, sidebar, frame);
        match uidata.route {
            Route::Overview => render_overview(&uidata.overview, main, frame),
            Route::Tables => render_tables(&uidata.panels, main, frame),
            Route::SignIn => render_sign_in(main, frame),
        }
        render_statusline(uidata, statusline, frame);

        if uidata.show_popup {
            render_popup(&uidata.popup_message, frame);
        }
    }

    fn render_sidebar(&mut self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let items: Vec<ListItem> = NAV_DATA
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                ListItem::new(Line::from(vec![
                    Span::from(format!("{} ", idx + 1)).dark_gray(),
                    Span::from(format!("{} ", entry.icon.glyph())),
                    Span::from(entry.title),
                ]))
            })
            .collect();
        self.nav_state.select(Some(uidata.route.nav_index()));

        let list = List::new(items)
            .block(Block::bordered().title(Line::from(" epgdash ".bold())))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("▌");
        frame.render_stateful_widget(list, area, &mut self.nav_state);
    }
}

fn render_tables(panels: &[PanelView], area: Rect, frame: &mut Frame) {
    if panels.is_empty() {
        frame.render_widget(
            Paragraph::new("Нет данных").centered().block(Block::bordered()),
            area,
        );
        return;
    }
    // The focused table gets twice the room of the others.
    let constraints = panels
        .iter()
        .map(|p| Constraint::Fill(if p.focused { 2 } else { 1 }));
    let areas = Layout::vertical(constraints).split(area);
    for (panel, area) in panels.iter().zip(areas.iter()) {
        render_panel(panel, *area, frame);
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

/// Footer of a table, e.g. "Строк на странице: 5   6–10 из 18".
pub fn pagination_label(page: usize, rows_per_page: usize, count: usize) -> String {
    let (from, to) = if count == 0 {
        (0, 0)
    } else {
        (
            std::cmp::min(page * rows_per_page + 1, count),
            std::cmp::min((page + 1) * rows_per_page, count),
        )
    };
    format!("Строк на странице: {rows_per_page}   {from}–{to} из {count}")
}

fn render_panel(panel: &PanelView, area: Rect, frame: &mut Frame) {
    let select_all = match panel.selection {
        SelectionState::None => "[ ]",
        SelectionState::Some => "[-]",
        SelectionState::All => "[x]",
    };

    let mut header_cells = vec![Cell::from(select_all)];
    for (idx, h) in panel.headers.iter().enumerate() {
        let label = match h.sort {
            Some(order) => format!("{} {}", h.label, order.arrow()),
            None => h.label.clone(),
        };
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if panel.focused && idx == panel.curser_column {
            style = style.add_modifier(Modifier::UNDERLINED).yellow();
        }
        header_cells.push(Cell::from(label).style(style));
    }
    let header = Row::new(header_cells);

    let mut rows: Vec<Row> = if panel.not_found {
        vec![Row::new(vec![
            Cell::from(""),
            Cell::from(format!("Ничего не найдено по запросу «{}»", panel.filter)).italic(),
        ])]
    } else {
        panel
            .rows
            .iter()
            .map(|r| {
                let mut cells = vec![Cell::from(checkbox(r.checked))];
                cells.extend(r.cells.iter().map(|c| Cell::from(c.as_str())));
                let row = Row::new(cells);
                if r.checked { row.green() } else { row }
            })
            .collect()
    };
    rows.extend((0..panel.empty_rows).map(|_| Row::new(vec![Cell::from("")])));

    let mut widths = vec![Constraint::Length(CHECKBOX_WIDTH)];
    widths.extend(panel.widths.iter().map(|&w| Constraint::Length(w as u16)));

    let mut title = vec![Span::from(format!(" {} ", panel.title)).bold()];
    if !panel.filter.is_empty() {
        title.push(Span::from(format!("[фильтр: {}] ", panel.filter)).cyan());
    }
    if panel.num_selected > 0 {
        title.push(Span::from(format!("[выбрано: {} из {}] ", panel.num_selected, panel.row_count)).green());
    }

    let mut block = Block::bordered()
        .title(Line::from(title))
        .title_bottom(
            Line::from(format!(
                " {} ",
                pagination_label(panel.page, panel.rows_per_page, panel.count)
            ))
            .right_aligned(),
        );
    if panel.focused {
        block = block
            .border_set(border::THICK)
            .border_style(Style::new().yellow());
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    if panel.focused && !panel.rows.is_empty() && !panel.not_found {
        state.select(Some(panel.curser_row));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_overview(overview: &OverviewView, area: Rect, frame: &mut Frame) {
    let [counts_area, histogram_area, segments_area] = Layout::vertical([
        Constraint::Length(overview.counts.len() as u16 + 2),
        Constraint::Fill(1),
        // borders and header around the segment rows
        Constraint::Length(overview.segments.segments.len().max(1) as u16 + 3),
    ])
    .areas(area);

    let lines: Vec<Line> = overview
        .counts
        .iter()
        .map(|(title, count)| Line::from(vec![Span::from(format!("{count:>6}  ")).bold(), title.into()]))
        .collect();
    frame.render_widget(
        Paragraph::new(lines).block(Block::bordered().title(" Записей в таблицах ")),
        counts_area,
    );

    let total: u64 = overview.categories.iter().map(|(_, v)| v).sum();
    let max = overview.categories.first().map(|(_, v)| *v).unwrap_or(0);
    let rows: Vec<Row> = overview
        .categories
        .iter()
        .map(|(name, minutes)| {
            let share = if total > 0 { *minutes as f64 * 100.0 / total as f64 } else { 0.0 };
            let bar_len = if max > 0 {
                (*minutes as usize * HISTOGRAM_BAR_WIDTH).div_ceil(max as usize)
            } else {
                0
            };
            Row::new(vec![
                Cell::from(name.clone()),
                Cell::from(format!("{minutes} мин")),
                Cell::from(format!("{share:.0}%")),
                Cell::from("█".repeat(bar_len)).cyan(),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Fill(1),
        ],
    )
    .header(Row::new(vec!["Категория", "Просмотр", "Доля", ""]).bold())
    .block(Block::bordered().title(" Время просмотра по категориям "));
    frame.render_widget(table, histogram_area);

    render_segments(&overview.segments, segments_area, frame);
}

fn render_segments(report: &SegmentReport, area: Rect, frame: &mut Frame) {
    let block = Block::bordered().title(" Сегменты зрителей ");
    if report.segments.is_empty() {
        frame.render_widget(Paragraph::new("Нет данных о просмотрах").block(block), area);
        return;
    }

    let mut header = vec![
        "Сегмент".to_string(),
        "Клиентов".to_string(),
        "Часов".to_string(),
        "Каналов".to_string(),
    ];
    header.extend(report.categories.iter().map(|c| format!("{c} %")));

    let rows: Vec<Row> = report
        .segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| {
            let mut cells = vec![
                Cell::from(format!("{}", idx + 1)),
                Cell::from(seg.clients.to_string()),
                Cell::from(format!("{:.1}", seg.mean_hours)),
                Cell::from(format!("{:.1}", seg.mean_channels)),
            ];
            cells.extend(seg.shares.iter().map(|s| Cell::from(format!("{s:.0}"))));
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(7),
        Constraint::Length(8),
    ];
    widths.extend(
        report
            .categories
            .iter()
            .map(|c| Constraint::Length(c.chars().count() as u16 + 3)),
    );

    let table = Table::new(rows, widths)
        .header(Row::new(header).bold())
        .block(block);
    frame.render_widget(table, area);
}

fn render_sign_in(area: Rect, frame: &mut Frame) {
    let text = Text::from(vec![
        Line::from("Вход".bold()),
        Line::from(""),
        Line::from("Панель работает локально и не требует авторизации."),
        Line::from("Нажмите 2, чтобы перейти к таблицам."),
    ]);
    let area = popup_area(area, 60, 30);
    frame.render_widget(
        Paragraph::new(text)
            .centered()
            .wrap(Wrap { trim: true })
            .block(Block::bordered().border_set(border::ROUNDED)),
        area,
    );
}

fn render_statusline(uidata: &UIData, area: Rect, frame: &mut Frame) {
    if uidata.active_cmdinput {
        let prompt = "Фильтр: ";
        let line = Line::from(vec![prompt.bold(), Span::from(uidata.cmdinput.input.as_str())]);
        frame.render_widget(Paragraph::new(line), area);
        let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor) as u16;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
    } else {
        let line = Line::from(vec![
            Span::from(uidata.status_message.as_str()),
            Span::from("   ? справка  q выход").dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn render_popup(message: &str, frame: &mut Frame) {
    let area = popup_area(frame.area(), 60, 70);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(message).block(
            Block::bordered()
                .title(Line::from(" Справка ".bold()).centered())
                .title_bottom(Line::from(" Esc ").centered())
                .border_set(border::THICK),
        ),
        area,
    );
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DashConfig, Message};
    use crate::mock;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 70)).unwrap();
        let mut ui = DashUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn pagination_labels() {
        assert_eq!(pagination_label(0, 5, 18), "Строк на странице: 5   1–5 из 18");
        assert_eq!(pagination_label(3, 5, 18), "Строк на странице: 5   16–18 из 18");
        assert_eq!(pagination_label(0, 10, 0), "Строк на странице: 10   0–0 из 0");
    }

    #[test]
    fn draws_sidebar_and_all_tables() {
        let model = Model::init(&DashConfig::default(), mock::datasets()).unwrap();
        let text = render(&model);
        for entry in NAV_DATA {
            assert!(text.contains(entry.title), "{}", entry.title);
        }
        assert!(text.contains("Связь пакетов и каналов"));
        assert!(text.contains("Информация о клиентах"));
        assert!(text.contains("Информация о домах"));
        assert!(text.contains("Статистика просмотров телепередач"));
        assert!(text.contains("1–5 из 18"));
    }

    #[test]
    fn draws_overview_and_help() {
        let mut model = Model::init(&DashConfig::default(), mock::datasets()).unwrap();
        model.update(Some(Message::Navigate(0))).unwrap();
        model.update(Some(Message::Help)).unwrap();
        let text = render(&model);
        assert!(text.contains("Время просмотра по категориям"));
        assert!(text.contains("Сегменты зрителей"));
        assert!(text.contains("Справка"));
    }

    #[test]
    fn draws_sign_in_page() {
        let mut model = Model::init(&DashConfig::default(), mock::datasets()).unwrap();
        model.update(Some(Message::Navigate(2))).unwrap();
        let text = render(&model);
        assert!(text.contains("не требует авторизации"));
    }

    #[test]
    fn draws_empty_dashboard() {
        let model = Model::init(&DashConfig::default(), Vec::new()).unwrap();
        assert!(render(&model).contains("Нет данных"));
    }
}
