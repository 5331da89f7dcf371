//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::Bit;
use crate::cpu::Reg;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .split(frame.area());

    // Left side: main memory, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_main_memory(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: output log and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_output(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw main memory with the program counter and the line head marked.
fn draw_main_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = app.memory_rows((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let prefix = if row.is_pc { "▶" } else { " " };
            let head = if row.is_head { "◉" } else { " " };
            let bp = if row.is_breakpoint { "●" } else { " " };
            let label = app
                .label_at(row.addr)
                .map(|l| format!("{}:", l))
                .unwrap_or_default();
            let text = format!("{}{}{} {:04}: {:<10} {}", bp, prefix, head, row.addr, label, row.text);

            let style = if row.is_pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if row.is_breakpoint {
                Style::default().fg(Color::Red)
            } else if row.text == "NOP" {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Main memory (▶ pc  ◉ head) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the register lines cell by cell, head on the left.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = app.cpu.regs();

    let mut content: Vec<Line> = Reg::ALL
        .iter()
        .map(|&reg| {
            let mut spans = vec![Span::raw(format!("{}: ", reg.name()))];
            spans.extend(regs.get(reg).bits().into_iter().map(|bit| {
                Span::styled(bit.to_string(), bit_style(bit))
            }));
            spans.push(Span::raw(format!(" = {}", regs.peek(reg).to_signed())));
            Line::from(spans)
        })
        .collect();

    content.push(Line::from(vec![
        Span::raw("Cycles: "),
        Span::styled(format!("{}", app.cpu.cycles()), Style::default().fg(Color::Cyan)),
        Span::raw("   Ticks: "),
        Span::styled(format!("{}", app.cpu.ticks()), Style::default().fg(Color::Cyan)),
        Span::raw("   State: "),
        Span::styled(format!("{:?}", app.cpu.state()),
            if app.cpu.is_running() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            }),
    ]));

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the PRA output log, newest at the bottom.
fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let output = app.cpu.output();
    let start = output.len().saturating_sub(visible_rows);

    let items: Vec<ListItem> = output[start..]
        .iter()
        .enumerate()
        .map(|(i, value)| ListItem::new(format!("{:>4}: {}", start + i, value)))
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Get color style for a bit.
fn bit_style(bit: Bit) -> Style {
    match bit {
        Bit::Zero => Style::default().fg(Color::DarkGray),
        Bit::One => Style::default().fg(Color::Green),
    }
}
