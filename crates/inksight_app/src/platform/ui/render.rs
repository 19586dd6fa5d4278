//! Line-oriented terminal rendering of [`AppViewModel`] snapshots.
//!
//! The terminal is append-only, so the renderer remembers what it already
//! printed and writes only the difference on each call.

use std::io::{self, Write};

use inksight_core::{
    AppViewModel, ChatView, ConnectionStatus, Role, SourceRow, StatusView, View, APOLOGY_MESSAGE,
};

use super::constants::*;

#[derive(Debug, Default)]
pub struct TerminalRenderer {
    last_view: Option<View>,
    last_status: Option<(ConnectionStatus, Option<u32>)>,
    printed_messages: usize,
    /// Text of the streaming reply already on screen.
    streamed: Option<String>,
    prompt_shown: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, out: &mut impl Write, view: &AppViewModel) -> io::Result<()> {
        if self.last_view != Some(view.view) {
            self.last_view = Some(view.view);
            if view.view == View::Chat {
                writeln!(out)?;
                writeln!(out, "{CHAT_BANNER}")?;
            }
        }

        match view.view {
            View::Status => self.render_status(out, &view.status)?,
            View::Chat => self.render_chat(out, &view.chat)?,
        }
        out.flush()
    }

    fn render_status(&mut self, out: &mut impl Write, status: &StatusView) -> io::Result<()> {
        let key = (status.status, status.page);
        if self.last_status == Some(key) {
            return Ok(());
        }
        self.last_status = Some(key);

        writeln!(out, "[{}] {}", status.badge, status.headline)?;
        writeln!(out, "  {}", status.detail)?;
        let timeline: Vec<String> = status
            .timeline
            .iter()
            .map(|step| {
                let mark = if step.reached { 'x' } else { ' ' };
                format!("[{mark}] {}", step.label)
            })
            .collect();
        writeln!(out, "  {}", timeline.join("  "))
    }

    fn render_chat(&mut self, out: &mut impl Write, chat: &ChatView) -> io::Result<()> {
        let fresh = chat.messages.get(self.printed_messages..).unwrap_or_default();
        for row in fresh {
            if row.role == Role::Assistant {
                match self.streamed.take() {
                    // Partial text was thrown away; keep the apology visibly apart.
                    Some(shown) if !shown.is_empty() && row.content == APOLOGY_MESSAGE => {
                        writeln!(out)?;
                        write!(out, "{ASSISTANT_LABEL}{}", row.content)?;
                    }
                    Some(shown) if row.content.starts_with(&shown) => {
                        write!(out, "{}", &row.content[shown.len()..])?;
                    }
                    Some(_) => {
                        writeln!(out)?;
                        write!(out, "{ASSISTANT_LABEL}{}", row.content)?;
                    }
                    None => write!(out, "{ASSISTANT_LABEL}{}", row.content)?,
                }
                writeln!(out)?;
                write_sources(out, &row.sources)?;
            }
        }
        self.printed_messages = chat.messages.len();

        match &chat.streaming {
            Some(text) => {
                let shown = match self.streamed.take() {
                    Some(shown) => shown,
                    None => {
                        write!(out, "{ASSISTANT_LABEL}")?;
                        String::new()
                    }
                };
                if let Some(delta) = text.strip_prefix(shown.as_str()) {
                    write!(out, "{delta}")?;
                }
                self.streamed = Some(text.clone());
                self.prompt_shown = false;
            }
            None => {
                if self.streamed.take().is_some() {
                    writeln!(out)?;
                    writeln!(out, "{CANCELLED_NOTE}")?;
                }
            }
        }

        if chat.input_enabled && !self.prompt_shown {
            write!(out, "{PROMPT}")?;
            self.prompt_shown = true;
        }
        Ok(())
    }
}

fn write_sources(out: &mut impl Write, sources: &[SourceRow]) -> io::Result<()> {
    for source in sources {
        writeln!(
            out,
            "  - {}  {}",
            source_label(source),
            source.image_path
        )?;
    }
    Ok(())
}

fn source_label(source: &SourceRow) -> String {
    format!(
        "Page {} ({}% match)",
        source.page_number, source.match_percent
    )
}
