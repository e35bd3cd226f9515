//! Scrollable event log pager (spec §4.8): line-numbered, auto-scroll
//! toggle, ordering by time or grouped-by-kind, save-to-file export.

use std::io::Write;
use std::path::Path;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::model::{EventKind, MonitorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    ByTime,
    GroupedByKind,
}

/// Scrollable, orderable view over an event history. Owns only display
/// state; the events themselves live in [`crate::monitor::EventStream`].
pub struct Pager {
    ordering: Ordering,
    auto_scroll: bool,
    list_state: ListState,
}

impl Pager {
    pub fn new() -> Self {
        Self {
            ordering: Ordering::ByTime,
            auto_scroll: true,
            list_state: ListState::default(),
        }
    }

    pub fn toggle_ordering(&mut self) {
        self.ordering = match self.ordering {
            Ordering::ByTime => Ordering::GroupedByKind,
            Ordering::GroupedByKind => Ordering::ByTime,
        };
    }

    pub fn toggle_auto_scroll(&mut self) {
        self.auto_scroll = !self.auto_scroll;
    }

    pub fn scroll_up(&mut self) {
        self.auto_scroll = false;
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(selected.saturating_sub(1)));
    }

    pub fn scroll_down(&mut self, max_index: usize) {
        self.auto_scroll = false;
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some((selected + 1).min(max_index)));
    }

    /// Returns `events` in display order for the current [`Ordering`].
    fn ordered<'a>(&self, events: &'a [MonitorEvent]) -> Vec<&'a MonitorEvent> {
        let mut ordered: Vec<&MonitorEvent> = events.iter().collect();
        if self.ordering == Ordering::GroupedByKind {
            ordered.sort_by_key(|e| kind_sort_key(e.kind));
        }
        ordered
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, events: &[MonitorEvent]) {
        let ordered = self.ordered(events);

        if self.auto_scroll && !ordered.is_empty() {
            self.list_state.select(Some(ordered.len() - 1));
        }

        let items: Vec<ListItem> = ordered
            .iter()
            .enumerate()
            .map(|(line_no, event)| {
                let color = match event.kind {
                    EventKind::StatusChange => Color::Yellow,
                    EventKind::PlayerJoin => Color::Green,
                    EventKind::PlayerLeave => Color::Red,
                    EventKind::PlayerCount => Color::Cyan,
                    EventKind::Info => Color::Gray,
                };
                let line = Line::from(vec![
                    Span::styled(format!("{line_no:>5} "), Style::default().fg(Color::DarkGray)),
                    Span::styled(format!("[{:?}] ", event.kind), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                    Span::raw(&event.server_name),
                    Span::raw(": "),
                    Span::raw(&event.message),
                ]);
                ListItem::new(line)
            })
            .collect();

        let title = match self.ordering {
            Ordering::ByTime => "Events (by time)",
            Ordering::GroupedByKind => "Events (grouped by kind)",
        };

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    /// Writes every event to `path`, one line per event in the current
    /// ordering, for export.
    pub fn save_to_file(&self, path: impl AsRef<Path>, events: &[MonitorEvent]) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for event in self.ordered(events) {
            writeln!(file, "[{:?}] {}: {}", event.kind, event.server_name, event.message)?;
        }
        Ok(())
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_sort_key(kind: EventKind) -> u8 {
    match kind {
        EventKind::StatusChange => 0,
        EventKind::PlayerJoin => 1,
        EventKind::PlayerLeave => 2,
        EventKind::PlayerCount => 3,
        EventKind::Info => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<MonitorEvent> {
        vec![
            MonitorEvent::new(EventKind::PlayerJoin, "srv", "Alice joined"),
            MonitorEvent::new(EventKind::StatusChange, "srv", "back online"),
        ]
    }

    #[test]
    fn grouped_ordering_puts_status_change_first() {
        let pager = Pager::new();
        let events = sample_events();
        let ordered = pager.ordered(&events);
        assert_eq!(ordered[0].kind, EventKind::PlayerJoin);

        let mut grouped_pager = Pager::new();
        grouped_pager.toggle_ordering();
        let ordered = grouped_pager.ordered(&events);
        assert_eq!(ordered[0].kind, EventKind::StatusChange);
    }

    #[test]
    fn save_to_file_writes_one_line_per_event() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let pager = Pager::new();
        pager.save_to_file(tmp.path(), &sample_events()).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
