//! Per-session orchestration: fetch context, assemble, answer, record.
//!
//! A [`ChatSession`] owns everything a conversation needs: the context
//! source (and its cache), the prompt assembler, the provider and the
//! conversation memory. Every failure is turned into answer text here;
//! nothing past this boundary returns an error.

use futures::StreamExt;

use crate::{
    board::ContextSource,
    chat::{ChatMessage, ChatResponse},
    error::LLMError,
    memory::{ConversationHistory, MemoryProvider},
    prompt::{Prompt, PromptAssembler},
    LLMProvider,
};

/// Answer given when the context is too short to ground a reply.
pub const INSUFFICIENT_DATA: &str = "No sufficient data available from the boards yet.";
/// Answer given when the inference model is still loading after every retry.
pub const WARMING_UP: &str =
    "The model is still warming up. Please try again in a minute.";
/// Answer given when every configured API key failed.
pub const KEYS_EXHAUSTED: &str =
    "All API keys are exhausted or currently failing. Please try again later.";

/// Renders a provider error as the answer shown to the user.
pub fn error_answer(err: &LLMError) -> String {
    match err {
        LLMError::StatusError { status, .. } => format!("AI error: {status}"),
        LLMError::ModelLoading { .. } => WARMING_UP.to_string(),
        LLMError::KeysExhausted { .. } => KEYS_EXHAUSTED.to_string(),
        LLMError::ResponseFormatError { message, .. } => format!("AI error: {message}"),
        other => format!("AI error: {other}"),
    }
}

/// One conversation with the board assistant.
pub struct ChatSession {
    context: Box<dyn ContextSource>,
    assembler: PromptAssembler,
    llm: Box<dyn LLMProvider>,
    memory: Box<dyn MemoryProvider>,
    stream: bool,
}

impl ChatSession {
    /// Creates a session that keeps its turns in a [`ConversationHistory`].
    pub fn new(
        context: Box<dyn ContextSource>,
        assembler: PromptAssembler,
        llm: Box<dyn LLMProvider>,
    ) -> Self {
        Self::with_memory(context, assembler, llm, Box::new(ConversationHistory::new()))
    }

    pub fn with_memory(
        context: Box<dyn ContextSource>,
        assembler: PromptAssembler,
        llm: Box<dyn LLMProvider>,
        memory: Box<dyn MemoryProvider>,
    ) -> Self {
        Self {
            context,
            assembler,
            llm,
            memory,
            stream: false,
        }
    }

    /// Makes [`ChatSession::answer`] use streaming mode.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// Every recorded message, oldest first.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.memory.recall(None).await.unwrap_or_else(|e| {
            log::warn!("failed to read conversation memory: {e}");
            Vec::new()
        })
    }

    pub async fn clear_history(&mut self) {
        if let Err(e) = self.memory.clear().await {
            log::warn!("failed to clear conversation memory: {e}");
        }
    }

    /// Answers in the configured mode; `render` receives fragments as they
    /// arrive when streaming, or the whole answer once otherwise.
    pub async fn answer<F>(&mut self, question: &str, mut render: F) -> String
    where
        F: FnMut(&str),
    {
        if self.stream {
            self.ask_streaming(question, render).await
        } else {
            let answer = self.ask(question).await;
            render(&answer);
            answer
        }
    }

    /// Answers `question` with one blocking model call.
    pub async fn ask(&mut self, question: &str) -> String {
        let answer = match self.prepare(question).await {
            None => INSUFFICIENT_DATA.to_string(),
            Some(messages) => match self.llm.chat(&messages).await {
                Ok(response) => match response.text().filter(|t| !t.is_empty()) {
                    Some(text) => text,
                    None => error_answer(&empty_answer()),
                },
                Err(e) => {
                    log::warn!("chat request failed: {e}");
                    error_answer(&e)
                }
            },
        };
        self.record(question, &answer).await;
        answer
    }

    /// Answers `question` from a fragment stream, passing each fragment to
    /// `render` in arrival order. The stored answer is their concatenation.
    pub async fn ask_streaming<F>(&mut self, question: &str, mut render: F) -> String
    where
        F: FnMut(&str),
    {
        let answer = match self.prepare(question).await {
            None => {
                render(INSUFFICIENT_DATA);
                INSUFFICIENT_DATA.to_string()
            }
            Some(messages) => match self.llm.chat_stream(&messages).await {
                Ok(mut stream) => {
                    let mut answer = String::new();
                    while let Some(fragment) = stream.next().await {
                        match fragment {
                            Ok(text) => {
                                render(&text);
                                answer.push_str(&text);
                            }
                            Err(e) => {
                                log::warn!("stream ended with error: {e}");
                                let note = if answer.is_empty() {
                                    error_answer(&e)
                                } else {
                                    format!("\n{}", error_answer(&e))
                                };
                                render(&note);
                                answer.push_str(&note);
                                break;
                            }
                        }
                    }
                    if answer.is_empty() {
                        log::warn!("stream finished without any text");
                        answer = error_answer(&empty_answer());
                        render(&answer);
                    }
                    answer
                }
                Err(e) => {
                    log::warn!("stream request failed: {e}");
                    let answer = error_answer(&e);
                    render(&answer);
                    answer
                }
            },
        };
        self.record(question, &answer).await;
        answer
    }

    /// Fetches the context and assembles the request, or `None` when there
    /// is not enough data to ask the model.
    async fn prepare(&mut self, question: &str) -> Option<Vec<ChatMessage>> {
        let context = self.context.context().await;
        let history = self
            .memory
            .recall(Some(self.assembler.history_window))
            .await
            .unwrap_or_else(|e| {
                log::warn!("failed to recall conversation memory: {e}");
                Vec::new()
            });
        match self.assembler.assemble(question, &context, &history) {
            Prompt::Insufficient => {
                log::debug!("context too short ({} chars), skipping model call", context.len());
                None
            }
            Prompt::Messages(messages) => Some(messages),
        }
    }

    async fn record(&mut self, question: &str, answer: &str) {
        let turn = [
            ChatMessage::user().content(question).build(),
            ChatMessage::assistant().content(answer).build(),
        ];
        for message in &turn {
            if let Err(e) = self.memory.remember(message).await {
                log::warn!("failed to store conversation turn: {e}");
            }
        }
    }
}

fn empty_answer() -> LLMError {
    LLMError::ResponseFormatError {
        message: "model returned no text".to_string(),
        raw_response: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::chat::{ChatProvider, ChatResponse, ChatStream};
    use crate::completion::{CompletionProvider, CompletionRequest, CompletionResponse};

    struct FixedContext(&'static str);

    #[async_trait]
    impl ContextSource for FixedContext {
        async fn context(&mut self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Clone)]
    struct EchoProvider {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
        fail_with: Option<fn() -> LLMError>,
        fragments: &'static [&'static str],
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
                fail_with: None,
                fragments: &["Two ", "deals ", "are ", "pending."],
            }
        }

        fn silent() -> Self {
            Self {
                fragments: &[],
                ..Self::new()
            }
        }

        fn failing(err: fn() -> LLMError) -> Self {
            Self {
                fail_with: Some(err),
                ..Self::new()
            }
        }

        fn record(&self, messages: &[ChatMessage]) -> Result<(), LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages.to_vec());
            match self.fail_with {
                Some(err) => Err(err()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for EchoProvider {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
            self.record(messages)?;
            Ok(Box::new(CompletionResponse {
                text: "Two deals are pending.".into(),
            }))
        }

        async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, LLMError> {
            self.record(messages)?;
            let fragments = self.fragments;
            Ok(Box::pin(stream::iter(
                fragments.iter().map(|f| Ok(f.to_string())),
            )))
        }
    }

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(&self, _req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
            Err(LLMError::Generic("unused".into()))
        }
    }

    impl LLMProvider for EchoProvider {}

    const CONTEXT: &str = "\nBoard: Deals\n----\nTask: Acme\nStatus: Pending\n";

    fn new_session(context: &'static str, llm: EchoProvider) -> ChatSession {
        ChatSession::new(
            Box::new(FixedContext(context)),
            PromptAssembler::default(),
            Box::new(llm),
        )
    }

    #[tokio::test]
    async fn short_context_makes_no_model_call() {
        let llm = EchoProvider::new();
        let mut session = new_session("  tiny  ", llm.clone());
        assert_eq!(session.ask("anything?").await, INSUFFICIENT_DATA);
        assert_eq!(session.ask_streaming("again?", |_| {}).await, INSUFFICIENT_DATA);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.history().await.len(), 4);
    }

    #[tokio::test]
    async fn streamed_answer_matches_blocking_answer() {
        let llm = EchoProvider::new();
        let mut session = new_session(CONTEXT, llm.clone());
        let blocking = session.ask("What is pending?").await;

        let mut rendered = Vec::new();
        let streamed = session
            .ask_streaming("What is pending?", |f| rendered.push(f.to_string()))
            .await;
        assert_eq!(streamed, blocking);
        assert_eq!(rendered.len(), 4);
        assert_eq!(session.history().await[3].content, blocking);
    }

    #[tokio::test]
    async fn history_stores_questions_not_context() {
        let llm = EchoProvider::new();
        let mut session = new_session(CONTEXT, llm.clone());
        for i in 0..10 {
            session.ask(&format!("question {i}")).await;
        }
        let history = session.history().await;
        assert_eq!(history.len(), 20);
        assert!(history.iter().all(|m| !m.content.contains("Board: Deals")));

        let seen = llm.seen.lock().unwrap();
        let last = seen.last().unwrap();
        // system + 4 replayed + question
        assert_eq!(last.len(), 6);
        assert_eq!(last[5].content, "question 9");
    }

    #[tokio::test]
    async fn errors_become_answers() {
        let llm = EchoProvider::failing(|| LLMError::StatusError {
            status: 401,
            raw_response: String::new(),
        });
        let mut session = new_session(CONTEXT, llm);
        assert_eq!(session.ask("q").await, "AI error: 401");

        let llm = EchoProvider::failing(|| LLMError::ModelLoading { attempts: 3 });
        let mut session = new_session(CONTEXT, llm);
        assert_eq!(session.ask_streaming("q", |_| {}).await, WARMING_UP);

        let llm = EchoProvider::failing(|| LLMError::KeysExhausted {
            attempts: 2,
            last_error: "quota".into(),
        });
        let mut session = new_session(CONTEXT, llm);
        assert_eq!(session.ask("q").await, KEYS_EXHAUSTED);
    }

    #[tokio::test]
    async fn answer_dispatches_on_mode() {
        let llm = EchoProvider::new();
        let mut session = new_session(CONTEXT, llm).streaming(true);
        let mut fragments = 0;
        session.answer("q", |_| fragments += 1).await;
        assert_eq!(fragments, 4);
    }

    #[tokio::test]
    async fn empty_stream_becomes_error_answer() {
        let llm = EchoProvider::silent();
        let mut session = new_session(CONTEXT, llm.clone());
        let mut rendered = Vec::new();
        let answer = session
            .ask_streaming("What is pending?", |f| rendered.push(f.to_string()))
            .await;

        assert_eq!(answer, "AI error: model returned no text");
        assert_eq!(rendered, vec![answer.clone()]);
        let history = session.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, answer);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_history_empties_memory() {
        let mut session = new_session(CONTEXT, EchoProvider::new());
        session.ask("q").await;
        assert_eq!(session.history().await.len(), 2);
        session.clear_history().await;
        assert!(session.history().await.is_empty());

        session.ask("again").await;
        assert_eq!(session.history().await[0].content, "again");
    }

    #[tokio::test]
    async fn custom_memory_is_used_for_replay() {
        let mut memory = ConversationHistory::new();
        memory.push(ChatMessage::user().content("earlier question").build());
        memory.push(ChatMessage::assistant().content("earlier answer").build());

        let llm = EchoProvider::new();
        let mut session = ChatSession::with_memory(
            Box::new(FixedContext(CONTEXT)),
            PromptAssembler::default(),
            Box::new(llm.clone()),
            Box::new(memory),
        );
        session.ask("follow up").await;

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0][1].content, "earlier question");
        assert_eq!(seen[0][3].content, "follow up");
    }
}
