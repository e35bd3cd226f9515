//! Multi-server composite view (spec §4.8): a table of servers with a
//! name/status filter and a view-mode toggle.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

use crate::model::ProbeResult;
use crate::ui::single::{latency_color, player_count_color, version_color};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Table,
    Compact,
}

pub struct MultiView {
    pub filter: String,
    pub mode: ViewMode,
}

impl MultiView {
    pub fn new() -> Self {
        Self {
            filter: String::new(),
            mode: ViewMode::Table,
        }
    }

    pub fn toggle_view(&mut self) {
        self.mode = match self.mode {
            ViewMode::Table => ViewMode::Compact,
            ViewMode::Compact => ViewMode::Table,
        };
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
    }

    fn matches(&self, name: &str) -> bool {
        self.filter.is_empty() || name.to_lowercase().contains(&self.filter.to_lowercase())
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, servers: &[(String, ProbeResult)]) {
        let rows: Vec<Row> = servers
            .iter()
            .filter(|(name, _)| self.matches(name))
            .map(|(name, result)| {
                if !result.is_success() {
                    return Row::new(vec![
                        Cell::from(name.clone()),
                        Cell::from("offline").style(Style::default().fg(Color::Red)),
                        Cell::from("-"),
                        Cell::from("-"),
                        Cell::from("-"),
                    ]);
                }

                let players = result
                    .players
                    .as_ref()
                    .map(|p| format!("{}/{}", p.online, p.max))
                    .unwrap_or_else(|| "-".to_string());
                let player_color = result
                    .players
                    .as_ref()
                    .map(|p| player_count_color(p.online, p.max))
                    .unwrap_or(Color::Gray);

                let (version, v_color) = result
                    .version
                    .as_ref()
                    .map(|v| (v.name.clone(), version_color(&v.name)))
                    .unwrap_or_else(|| ("-".to_string(), Color::Gray));

                Row::new(vec![
                    Cell::from(name.clone()),
                    Cell::from("online").style(Style::default().fg(Color::Green)),
                    Cell::from(players).style(Style::default().fg(player_color)),
                    Cell::from(format!("{}ms", result.query_ms)).style(Style::default().fg(latency_color(result.query_ms))),
                    Cell::from(version).style(Style::default().fg(v_color)),
                ])
            })
            .collect();

        let title = match self.mode {
            ViewMode::Table => "Servers",
            ViewMode::Compact => "Servers (compact)",
        };

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(30),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
                Constraint::Percentage(25),
            ],
        )
        .header(Row::new(vec!["name", "status", "players", "latency", "version"]))
        .block(Block::default().borders(Borders::ALL).title(title));

        frame.render_widget(table, area);
    }
}

impl Default for MultiView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_case_insensitive_substring() {
        let mut view = MultiView::new();
        view.set_filter("hub");
        assert!(view.matches("Hub-1"));
        assert!(!view.matches("Survival"));
    }

    #[test]
    fn clear_filter_matches_everything() {
        let mut view = MultiView::new();
        view.set_filter("hub");
        view.clear_filter();
        assert!(view.matches("Survival"));
    }

    #[test]
    fn toggle_view_flips_mode() {
        let mut view = MultiView::new();
        assert_eq!(view.mode, ViewMode::Table);
        view.toggle_view();
        assert_eq!(view.mode, ViewMode::Compact);
    }
}
