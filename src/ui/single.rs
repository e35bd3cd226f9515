//! Single-server view (spec §4.8): version, player count, and latency with
//! color thresholds.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::model::ProbeResult;

/// Latency thresholds, in milliseconds, for the green/yellow/red bands.
pub const LATENCY_GOOD_MS: u64 = 500;
pub const LATENCY_WARN_MS: u64 = 1000;

pub fn latency_color(query_ms: u64) -> Color {
    if query_ms <= LATENCY_GOOD_MS {
        Color::Green
    } else if query_ms <= LATENCY_WARN_MS {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// `0 -> red`, `<50% of capacity -> yellow`, `else -> green`.
pub fn player_count_color(online: u32, max: u32) -> Color {
    if max == 0 {
        return Color::Gray;
    }
    if online == 0 {
        return Color::Red;
    }
    let ratio = online as f64 / max as f64;
    if ratio < 0.5 {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// `1.20`/`1.21` prefix -> green, `1.19` prefix -> yellow, else red.
pub fn version_color(name: &str) -> Color {
    if name.starts_with("1.20") || name.starts_with("1.21") {
        Color::Green
    } else if name.starts_with("1.19") {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub struct SingleView;

impl SingleView {
    pub fn render(frame: &mut Frame, area: Rect, server_name: &str, result: &ProbeResult) {
        let mut lines = Vec::new();

        if !result.is_success() {
            lines.push(Line::from(Span::styled(
                format!("offline: {}", result.error.as_deref().unwrap_or("unknown")),
                Style::default().fg(Color::Red),
            )));
        } else {
            if let Some(version) = &result.version {
                lines.push(Line::from(Span::styled(
                    format!("version: {} (protocol {})", version.name, version.protocol),
                    Style::default().fg(version_color(&version.name)),
                )));
            }
            if let Some(players) = &result.players {
                let color = player_count_color(players.online, players.max);
                lines.push(Line::from(Span::styled(
                    format!("players: {}/{}", players.online, players.max),
                    Style::default().fg(color),
                )));
            }
            lines.push(Line::from(Span::styled(
                format!("latency: {}ms", result.query_ms),
                Style::default().fg(latency_color(result.query_ms)),
            )));
            if let Some(motd) = &result.motd {
                lines.push(Line::from(format!("motd: {motd}")));
            }
        }

        let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(server_name.to_string()));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_bands_match_thresholds() {
        assert_eq!(latency_color(10), Color::Green);
        assert_eq!(latency_color(500), Color::Green);
        assert_eq!(latency_color(750), Color::Yellow);
        assert_eq!(latency_color(1000), Color::Yellow);
        assert_eq!(latency_color(1500), Color::Red);
    }

    #[test]
    fn player_count_bands_match_ratio() {
        assert_eq!(player_count_color(0, 20), Color::Red);
        assert_eq!(player_count_color(5, 20), Color::Yellow);
        assert_eq!(player_count_color(15, 20), Color::Green);
        assert_eq!(player_count_color(19, 20), Color::Green);
        assert_eq!(player_count_color(0, 0), Color::Gray);
    }

    #[test]
    fn version_bands_match_release_prefixes() {
        assert_eq!(version_color("1.21.1"), Color::Green);
        assert_eq!(version_color("1.20.4"), Color::Green);
        assert_eq!(version_color("1.19.4"), Color::Yellow);
        assert_eq!(version_color("1.18.2"), Color::Red);
    }
}
