use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const PLACEHOLDER_STYLE: Style = Style::new()
    .fg(Color::Rgb(146, 131, 116))
    .add_modifier(Modifier::ITALIC);
pub const CURRENT_STYLE: Style = Style::new().fg(Color::Rgb(250, 189, 47));
pub const NOTE_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const MORE_STYLE: Style = Style::new().fg(Color::Rgb(131, 165, 152));
pub const CONSOLE_STYLE: Style = Style::new().fg(Color::Rgb(254, 128, 25));

pub mod icons {
    pub const EXPANDED: &str = "v";
    pub const COLLAPSED: &str = ">";
    pub const CURRENT: &str = "*";
}
