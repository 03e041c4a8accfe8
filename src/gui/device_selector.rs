use crate::gui::{enter_terminal, error::GuiError, leave_terminal};
use crate::peripheral::DeviceInfo;

use crossterm::event::{self, KeyCode, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
};
use std::time::Duration;

/// Lets the user pick one of `devices`. Returns `None` if they quit instead,
/// or if there was nothing to pick from.
pub fn device_selector(mut devices: Vec<DeviceInfo>) -> Result<Option<DeviceInfo>, GuiError> {
    let n_devices = devices.len();
    if n_devices == 0 {
        return Ok(None);
    }

    let mut terminal = enter_terminal()?;
    let mut cursor = 0;
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let mut selected = None;
    let res: Result<(), GuiError> = loop {
        let title = Title::from(" Device Selector ".magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Quit ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let names = devices.iter().map(|d| d.to_string());
        let list = List::new(names)
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        if let Err(e) = terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        }) {
            break Err(e.into());
        }

        match poll_key(Duration::from_millis(16)) {
            Ok(Some(KeyCode::Down)) => cursor = (cursor + 1) % n_devices,
            Ok(Some(KeyCode::Up)) => cursor = (cursor + n_devices - 1) % n_devices,
            Ok(Some(KeyCode::Enter)) => {
                selected = Some(cursor);
                break Ok(());
            }
            Ok(Some(KeyCode::Char('q'))) | Ok(Some(KeyCode::Esc)) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e.into()),
        }
        if crate::signals::shutdown_requested() {
            break Ok(());
        }
    };

    leave_terminal(&mut terminal)?;
    res?;
    Ok(selected.map(|i| devices.swap_remove(i)))
}

fn poll_key(timeout: Duration) -> std::io::Result<Option<KeyCode>> {
    if event::poll(timeout)? {
        if let event::Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(Some(key.code));
            }
        }
    }
    Ok(None)
}
