//! Terminal UI (spec §4.8): single-server view, multi-server composite view,
//! and a scrollable event pager. Built on `ratatui` + `crossterm`, enriched
//! from the wider example pack (no teacher module covers a TUI).

pub mod multi;
pub mod pager;
pub mod single;

pub use multi::MultiView;
pub use pager::Pager;
pub use single::SingleView;
