//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and drives one completion round trip per user turn.

use std::sync::Arc;

use futures::StreamExt;

use crate::accumulating_stream::AccumulatingStream;
use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::interrupt::Interrupt;
use crate::client_logger::ClientLogger;
use crate::config::DialConfig;
use crate::error::{Error, Result};
use crate::observability::{CHAT_INTERRUPTS, CHAT_TURN_ERRORS, CHAT_TURNS};
use crate::render::Renderer;
use crate::transport::CompletionTransport;
use crate::types::{CompletionRequest, Conversation, Message};

/// A chat session that manages conversation state and API interactions.
///
/// The conversation only ever grows.  A turn appends the user message and the
/// assistant reply together, and only once the reply is complete.
pub struct ChatSession {
    transport: Box<dyn CompletionTransport>,
    conversation: Conversation,
    deployment: String,
    streaming: bool,
    logger: Option<Arc<dyn ClientLogger>>,
    turns: u64,
    failed_turns: u64,
}

/// What the loop does after one line of input.
#[derive(Debug)]
pub enum LineOutcome {
    /// Nothing was sent; read the next line.
    Continue,
    /// The user asked to leave.
    Exit,
    /// The line went out as a user turn.
    Sent(Result<Message>),
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation, system message included.
    pub message_count: usize,
    /// The deployment requests go to.
    pub deployment: String,
    /// Whether replies are streamed.
    pub streaming: bool,
    /// Name of the transport in use.
    pub transport: &'static str,
    /// Turns that produced a reply.
    pub turns: u64,
    /// Turns that failed or were cancelled.
    pub failed_turns: u64,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Messages:   {}", self.message_count)?;
        writeln!(f, "Deployment: {}", self.deployment)?;
        writeln!(
            f,
            "Mode:       {}",
            if self.streaming { "streaming" } else { "blocking" }
        )?;
        writeln!(f, "Transport:  {}", self.transport)?;
        write!(f, "Turns:      {} ok, {} failed", self.turns, self.failed_turns)
    }
}

impl ChatSession {
    /// Creates a new chat session.
    ///
    /// `system_prompt` is what the user entered; when it is empty the
    /// configured default is used instead.
    pub fn new(
        transport: Box<dyn CompletionTransport>,
        config: &DialConfig,
        system_prompt: &str,
    ) -> Self {
        let system_prompt = if system_prompt.trim().is_empty() {
            config.system_prompt.as_str()
        } else {
            system_prompt
        };
        Self {
            transport,
            conversation: Conversation::with_system(system_prompt),
            deployment: config.deployment.clone(),
            streaming: config.stream,
            logger: None,
            turns: 0,
            failed_turns: 0,
        }
    }

    /// Report reassembled stream replies to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The transcript so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether replies are streamed.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Switch between streaming and blocking for later turns.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Returns session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.conversation.len(),
            deployment: self.deployment.clone(),
            streaming: self.streaming,
            transport: self.transport.name(),
            turns: self.turns,
            failed_turns: self.failed_turns,
        }
    }

    /// Handle one line typed at the prompt.
    ///
    /// Blank lines and commands never reach the transport.  Anything else is
    /// sent exactly as typed.
    pub async fn handle_line(
        &mut self,
        line: &str,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> LineOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Continue;
        }
        let Some(cmd) = parse_command(trimmed) else {
            return LineOutcome::Sent(self.send(line, renderer, interrupt).await);
        };
        match cmd {
            ChatCommand::Quit => return LineOutcome::Exit,
            ChatCommand::Help => {
                for line in help_text().lines() {
                    renderer.print_info(&format!("    {line}"));
                }
            }
            ChatCommand::Stats => {
                for line in self.stats().to_string().lines() {
                    renderer.print_info(&format!("    {line}"));
                }
            }
            ChatCommand::Stream(on) => {
                self.set_streaming(on);
                renderer.print_info(if on {
                    "Streaming enabled."
                } else {
                    "Streaming disabled."
                });
            }
            ChatCommand::Invalid(message) => renderer.print_error(&message),
        }
        LineOutcome::Continue
    }

    /// Sends a user message and renders the reply.
    ///
    /// In streaming mode fragments are rendered as they arrive; in blocking
    /// mode the whole reply is rendered at once.  Either way the renderer sees
    /// `start_response`, the text, then `finish_response`.
    ///
    /// # Errors
    ///
    /// Any transport or decoding error, or [`Error::Abort`] when `interrupt`
    /// fires first.  On error the conversation is left as it was.
    pub async fn send(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<Message> {
        CHAT_TURNS.click();
        let user = Message::user(user_input);
        let request = CompletionRequest::for_turn(&self.deployment, &self.conversation, &user)
            .with_stream(self.streaming);
        tracing::debug!(
            messages = request.messages.len(),
            streaming = request.stream,
            "starting turn"
        );

        let result = if request.stream {
            self.stream_reply(&request, renderer, interrupt).await
        } else {
            self.blocking_reply(&request, renderer, interrupt).await
        };

        match result {
            Ok(reply) => {
                self.conversation.push(user);
                self.conversation.push(reply.clone());
                self.turns += 1;
                Ok(reply)
            }
            Err(err) => {
                CHAT_TURN_ERRORS.click();
                self.failed_turns += 1;
                tracing::debug!(error = %err, "turn failed");
                Err(err)
            }
        }
    }

    async fn blocking_reply(
        &self,
        request: &CompletionRequest,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<Message> {
        let reply = tokio::select! {
            reply = self.transport.get_completion(request) => reply?,
            _ = interrupt.wait() => return Err(cancelled(renderer)),
        };
        renderer.start_response();
        renderer.print_text(reply.content());
        renderer.finish_response();
        Ok(reply)
    }

    async fn stream_reply(
        &self,
        request: &CompletionRequest,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<Message> {
        let stream = tokio::select! {
            stream = self.transport.stream_completion(request) => stream?,
            _ = interrupt.wait() => return Err(cancelled(renderer)),
        };
        let (mut acc, rx) = AccumulatingStream::new(stream);
        if let Some(logger) = &self.logger {
            acc = acc.with_logger(Arc::clone(logger));
        }

        renderer.start_response();
        loop {
            tokio::select! {
                item = acc.next() => match item {
                    Some(Ok(fragment)) => renderer.print_text(&fragment),
                    Some(Err(err)) => {
                        renderer.finish_response();
                        return Err(err);
                    }
                    None => break,
                },
                _ = interrupt.wait() => return Err(cancelled(renderer)),
            }
        }
        renderer.finish_response();

        rx.await
            .map_err(|_| Error::streaming("stream ended without a reply", None))?
    }
}

fn cancelled(renderer: &mut dyn Renderer) -> Error {
    CHAT_INTERRUPTS.click();
    renderer.print_interrupted();
    Error::abort("reply cancelled by user")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SYSTEM_PROMPT;
    use crate::transport::FragmentStream;
    use crate::types::Role;
    use futures::stream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        events: Vec<String>,
    }

    impl Renderer for Recorded {
        fn start_response(&mut self) {
            self.events.push("start".to_string());
        }
        fn print_text(&mut self, text: &str) {
            self.events.push(format!("text:{text}"));
        }
        fn finish_response(&mut self) {
            self.events.push("finish".to_string());
        }
        fn print_error(&mut self, error: &str) {
            self.events.push(format!("error:{error}"));
        }
        fn print_info(&mut self, info: &str) {
            self.events.push(format!("info:{info}"));
        }
    }

    enum Reply {
        Blocking(Result<Message>),
        Fragments(Vec<Result<String>>),
        Hang,
    }

    struct Scripted {
        replies: Mutex<Vec<Reply>>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl Scripted {
        fn boxed(replies: Vec<Reply>) -> (Box<dyn CompletionTransport>, Arc<Mutex<Vec<CompletionRequest>>>) {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let transport = Scripted {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                requests: Arc::clone(&requests),
            };
            (Box::new(transport), requests)
        }

        fn next(&self, request: &CompletionRequest) -> Reply {
            self.requests.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().pop().expect("no scripted reply left")
        }
    }

    #[async_trait::async_trait]
    impl CompletionTransport for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn get_completion(&self, request: &CompletionRequest) -> Result<Message> {
            match self.next(request) {
                Reply::Blocking(reply) => reply,
                Reply::Hang => futures::future::pending().await,
                Reply::Fragments(_) => panic!("expected a streaming call"),
            }
        }

        async fn stream_completion(&self, request: &CompletionRequest) -> Result<FragmentStream> {
            match self.next(request) {
                Reply::Fragments(items) => Ok(Box::pin(stream::iter(items))),
                Reply::Hang => Ok(Box::pin(
                    stream::iter(vec![Ok("Hel".to_string())]).chain(stream::pending()),
                )),
                Reply::Blocking(_) => panic!("expected a blocking call"),
            }
        }
    }

    fn config(stream: bool) -> DialConfig {
        DialConfig::new().with_api_key("key").with_stream(stream)
    }

    #[test]
    fn empty_system_prompt_uses_default() {
        let (transport, _) = Scripted::boxed(vec![]);
        let session = ChatSession::new(transport, &config(true), "   ");
        let first = &session.conversation().messages()[0];
        assert_eq!(first.role(), Role::System);
        assert_eq!(first.content(), DEFAULT_SYSTEM_PROMPT);

        let (transport, _) = Scripted::boxed(vec![]);
        let session = ChatSession::new(transport, &config(true), "Be terse.");
        assert_eq!(session.conversation().messages()[0].content(), "Be terse.");
    }

    #[tokio::test]
    async fn blocking_turn_appends_pair() {
        let (transport, requests) =
            Scripted::boxed(vec![Reply::Blocking(Ok(Message::assistant("4")))]);
        let mut session = ChatSession::new(transport, &config(false), "");
        let mut renderer = Recorded::default();

        let reply = session
            .send("What is 2+2?", &mut renderer, &Interrupt::new())
            .await
            .unwrap();
        assert_eq!(reply.content(), "4");
        assert_eq!(renderer.events, vec!["start", "text:4", "finish"]);

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::user("What is 2+2?"));
        assert_eq!(messages[2], Message::assistant("4"));

        let requests = requests.lock().unwrap();
        assert!(!requests[0].stream);
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn streaming_turn_renders_fragments_live() {
        let (transport, requests) = Scripted::boxed(vec![Reply::Fragments(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
        ])]);
        let mut session = ChatSession::new(transport, &config(true), "");
        let mut renderer = Recorded::default();

        let reply = session
            .send("Say hello", &mut renderer, &Interrupt::new())
            .await
            .unwrap();
        assert_eq!(reply, Message::assistant("Hello"));
        assert_eq!(
            renderer.events,
            vec!["start", "text:Hel", "text:lo", "finish"]
        );
        assert_eq!(session.conversation().len(), 3);
        assert!(requests.lock().unwrap()[0].stream);
    }

    #[tokio::test]
    async fn failed_turn_commits_nothing() {
        let (transport, _) = Scripted::boxed(vec![
            Reply::Blocking(Err(Error::http(401, r#"{"error":"unauthorized"}"#))),
            Reply::Fragments(vec![
                Ok("partial".to_string()),
                Err(Error::streaming("connection reset", None)),
            ]),
        ]);
        let mut session = ChatSession::new(transport, &config(false), "");
        let mut renderer = Recorded::default();

        let err = session
            .send("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(session.conversation().len(), 1);

        session.set_streaming(true);
        let err = session
            .send("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap_err();
        assert!(err.is_streaming());
        assert_eq!(session.conversation().len(), 1);

        let stats = session.stats();
        assert_eq!(stats.turns, 0);
        assert_eq!(stats.failed_turns, 2);
    }

    #[tokio::test]
    async fn interrupt_cancels_stream() {
        let (transport, _) = Scripted::boxed(vec![Reply::Hang]);
        let mut session = ChatSession::new(transport, &config(true), "");
        let mut renderer = Recorded::default();
        let interrupt = Interrupt::new();

        let remote = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            remote.trigger();
        });

        let err = session
            .send("hi", &mut renderer, &interrupt)
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(session.conversation().len(), 1);
        assert_eq!(renderer.events[..2], ["start", "text:Hel"]);
        assert_eq!(renderer.events.last().unwrap(), "info:[interrupted]");
    }

    #[tokio::test]
    async fn interrupt_cancels_blocking_request() {
        let (transport, _) = Scripted::boxed(vec![Reply::Hang]);
        let mut session = ChatSession::new(transport, &config(false), "");
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let err = session
            .send("hi", &mut Recorded::default(), &interrupt)
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn exit_in_any_case_sends_nothing() {
        let (transport, requests) = Scripted::boxed(vec![]);
        let mut session = ChatSession::new(transport, &config(true), "");
        let mut renderer = Recorded::default();
        let interrupt = Interrupt::new();

        for line in ["exit", "EXIT", "Exit", "  eXiT  ", "/quit"] {
            let outcome = session.handle_line(line, &mut renderer, &interrupt).await;
            assert!(matches!(outcome, LineOutcome::Exit), "{line:?}");
        }
        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn commands_and_blank_lines_stay_local() {
        let (transport, requests) = Scripted::boxed(vec![]);
        let mut session = ChatSession::new(transport, &config(true), "");
        let mut renderer = Recorded::default();
        let interrupt = Interrupt::new();

        for line in ["", "   ", "/help", "/stats", "/bogus", "/stream off"] {
            let outcome = session.handle_line(line, &mut renderer, &interrupt).await;
            assert!(matches!(outcome, LineOutcome::Continue), "{line:?}");
        }
        assert!(!session.is_streaming());
        assert!(requests.lock().unwrap().is_empty());
        assert!(renderer.events.iter().any(|e| e == "info:Streaming disabled."));
        assert!(renderer.events.iter().any(|e| e.starts_with("error:")));
    }

    #[tokio::test]
    async fn line_is_sent_as_typed() {
        let (transport, requests) =
            Scripted::boxed(vec![Reply::Blocking(Ok(Message::assistant("ok")))]);
        let mut session = ChatSession::new(transport, &config(false), "");
        let mut renderer = Recorded::default();

        let outcome = session
            .handle_line("  indented question \t", &mut renderer, &Interrupt::new())
            .await;
        match outcome {
            LineOutcome::Sent(Ok(reply)) => assert_eq!(reply.content(), "ok"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let requests = requests.lock().unwrap();
        assert_eq!(
            requests[0].messages.last().unwrap(),
            &Message::user("  indented question \t")
        );
        assert_eq!(
            session.conversation().messages()[1],
            Message::user("  indented question \t")
        );
    }

    #[test]
    fn stats_report_mode_and_transport() {
        let (transport, _) = Scripted::boxed(vec![]);
        let mut session = ChatSession::new(transport, &config(true), "");
        session.set_streaming(false);
        let stats = session.stats();
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.deployment, "gpt-4o");
        assert!(!stats.streaming);
        assert_eq!(stats.transport, "scripted");
        assert!(stats.to_string().contains("blocking"));
    }
}
