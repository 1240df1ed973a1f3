//! Terminal chat front-end
//!
//! Drives a [`ChatController`] from stdin and prints the conversation as it
//! streams in: timeline entries appear as they arrive, message content once
//! it settles.

use relay_core::view::{
    CONNECTING_TEXT, INPUT_PLACEHOLDER, UNAVAILABLE_BODY, UNAVAILABLE_TITLE, WELCOME_BODY,
    WELCOME_TITLE,
};
use relay_core::{
    Backend, ChatController, ChatState, Clock, CollapseState, ConversationView, EventBody,
    HttpBackend, MessageView, PendingIndicator, Readiness, RelayConfig, Result, SystemClock,
};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Base URL of the relay server
    pub proxy_url: String,
    pub token: Option<String>,
}

impl From<&RelayConfig> for TerminalConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            proxy_url: config.proxy_url.clone(),
            token: config.client_token.clone(),
        }
    }
}

/// Turns successive [`ConversationView`]s into only the lines not yet printed
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    humans: HashSet<String>,
    entries: HashMap<String, usize>,
    contents: HashMap<String, String>,
    pending: HashSet<String>,
    subtitle: Option<String>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what was printed; the next render prints everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// New lines for this frame
    ///
    /// While `loading`, content of the last AI message is held back because
    /// it is still being rewritten.
    pub fn render(&mut self, view: &ConversationView, loading: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let last_ai = view
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m, MessageView::Ai { .. }))
            .map(|m| m.id().to_string());

        for message in &view.messages {
            match message {
                MessageView::Human { id, content } => {
                    if self.humans.insert(id.clone()) {
                        lines.push(format!("you> {}", content));
                    }
                }
                MessageView::Ai {
                    id,
                    timeline,
                    content,
                    agent,
                } => {
                    if let Some(timeline) = timeline {
                        let printed = self.entries.entry(id.clone()).or_insert(0);
                        if *printed == 0
                            && timeline.pending == Some(PendingIndicator::Thinking)
                            && self.pending.insert(id.clone())
                        {
                            lines.push(format!("  … {}", PendingIndicator::Thinking.label()));
                        }
                        for entry in timeline.entries.iter().skip(*printed) {
                            lines.push(format!("  {} {}", entry.icon.glyph(), entry.title));
                            if !timeline.collapsed {
                                lines.extend(body_lines(&entry.body));
                            }
                        }
                        *printed = timeline.entries.len();
                    }

                    let settled = !loading || last_ai.as_deref() != Some(id.as_str());
                    if let (true, Some(text)) = (settled, content) {
                        if self.contents.get(id) != Some(text) {
                            lines.push(String::new());
                            lines.extend(text.lines().map(str::to_string));
                            if let Some(agent) = agent {
                                lines.push(format!("  Agent: {}", agent));
                            }
                            lines.push(String::new());
                            self.contents.insert(id.clone(), text.clone());
                        }
                    }
                }
            }
        }

        if !loading && self.subtitle.as_deref() != Some(view.subtitle.as_str()) {
            if self.subtitle.is_some() || view.subtitle.contains("Searched") {
                lines.push(format!("[{}]", view.subtitle));
            }
            self.subtitle = Some(view.subtitle.clone());
        }
        lines
    }
}

fn body_lines(body: &EventBody) -> impl Iterator<Item = String> + '_ {
    body.text().lines().map(|line| format!("      {}", line))
}

/// Interactive chat session in a terminal
pub struct TerminalChat<B, C> {
    controller: ChatController<B, C>,
    collapse: CollapseState,
    printer: TranscriptPrinter,
}

impl TerminalChat<HttpBackend, SystemClock> {
    /// Chat through the relay server named in the config
    pub fn connect_to(config: &TerminalConfig) -> Self {
        let backend = HttpBackend::new(config.proxy_url.clone(), config.token.clone());
        Self::new(ChatController::new(backend, SystemClock::new()))
    }
}

impl<B: Backend, C: Clock> TerminalChat<B, C> {
    pub fn new(controller: ChatController<B, C>) -> Self {
        Self {
            controller,
            collapse: CollapseState::new(),
            printer: TranscriptPrinter::new(),
        }
    }

    pub fn controller(&self) -> &ChatController<B, C> {
        &self.controller
    }

    /// Wait for the backend and open a session, reporting progress
    pub async fn start<W: Write>(&mut self, out: &mut W) -> Result<Readiness> {
        writeln!(out, "{}", CONNECTING_TEXT)?;
        let readiness = self.controller.connect().await;

        match readiness {
            Readiness::Ready => {
                let view = ConversationView::build(self.controller.state(), false);
                writeln!(out, "{}\n{}\n", view.title, view.subtitle)?;
                if view.welcome {
                    writeln!(out, "{}\n{}\n", WELCOME_TITLE, WELCOME_BODY)?;
                }
                if self.controller.session().is_none() {
                    writeln!(out, "Could not create a session; sending is disabled.")?;
                } else {
                    writeln!(out, "{} (/help for commands)", INPUT_PLACEHOLDER)?;
                }
            }
            Readiness::Unavailable | Readiness::Checking => {
                writeln!(out, "{}\n{}", UNAVAILABLE_TITLE, UNAVAILABLE_BODY)?;
            }
        }
        out.flush()?;
        Ok(readiness)
    }

    /// Handle one input line; `false` ends the session
    pub async fn handle_line<W: Write + Send>(&mut self, line: &str, out: &mut W) -> Result<bool> {
        match line.trim() {
            "" => return Ok(true),
            "/quit" | "/exit" => return Ok(false),
            "/help" => {
                writeln!(
                    out,
                    "/collapse  fold or unfold the latest research timeline\n/quit      leave"
                )?;
                return Ok(true);
            }
            "/collapse" => {
                if let Some(id) = self.controller.state().last_ai_message_id() {
                    let id = id.to_string();
                    let collapsed = self.collapse.toggle(&id);
                    info!("Timeline of {} collapsed={}", id, collapsed);
                    self.printer.reset();
                    let view = ConversationView::build_with(
                        self.controller.state(),
                        false,
                        &self.collapse,
                    );
                    for line in self.printer.render(&view, false) {
                        writeln!(out, "{}", line)?;
                    }
                }
                return Ok(true);
            }
            _ => {}
        }

        if !self.controller.can_send() {
            writeln!(out, "Not connected; cannot send.")?;
            return Ok(true);
        }

        let printer = &mut self.printer;
        let collapse = &self.collapse;
        let mut write_error = None;
        let mut paint = |state: &ChatState| {
            let view = ConversationView::build_with(state, true, collapse);
            for line in printer.render(&view, true) {
                if let Err(e) = writeln!(out, "{}", line) {
                    write_error.get_or_insert(e);
                }
            }
            let _ = out.flush();
        };

        if let Err(e) = self.controller.send_message(line, &mut paint).await {
            error!("Message failed: {}", e);
        }
        drop(paint);
        if let Some(e) = write_error {
            return Err(e.into());
        }

        let view = ConversationView::build_with(self.controller.state(), false, &self.collapse);
        for line in self.printer.render(&view, false) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(true)
    }

    /// Read lines until end of input or `/quit`
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write + Send,
    {
        if self.start(out).await? != Readiness::Ready {
            return Ok(());
        }
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if !self.handle_line(&line, out).await? {
                break;
            }
        }
        Ok(())
    }
}

/// Chat on stdin/stdout through the configured relay
pub async fn run_terminal(config: &TerminalConfig) -> Result<()> {
    info!("Terminal chat using relay at {}", config.proxy_url);
    let mut chat = TerminalChat::connect_to(config);
    let mut stdout = std::io::stdout();
    chat.run(BufReader::new(tokio::io::stdin()), &mut stdout).await
}
