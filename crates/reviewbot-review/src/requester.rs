use std::sync::Arc;

use reviewbot_core::{ReviewConfig, ReviewError, ReviewRequest, NO_COMMENT};

use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::llm::{ChatMessage, ChatTransport};
use crate::models::{check_model_support, ModelSupport};
use crate::prompt::build_system_prompt;
use crate::tokens::TokenEstimator;

/// Why a review produced the `NO_COMMENT` sentinel without model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoCommentReason {
    /// Prompt plus diff was over the token budget; nothing was sent.
    TokenBudgetExceeded,
    /// The request was sent and failed.
    RequestFailed,
}

/// Outcome of reviewing one file.
///
/// # Examples
///
/// ```
/// use reviewbot_review::requester::{NoCommentReason, ReviewOutcome};
///
/// let skipped = ReviewOutcome::NoComment(NoCommentReason::TokenBudgetExceeded);
/// assert_eq!(skipped.into_text(), "NO_COMMENT");
/// assert_eq!(ReviewOutcome::Empty.into_text(), "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The first choice's text, verbatim. May itself be `NO_COMMENT` when
    /// the model had nothing to flag.
    Review(String),
    /// Sentinel result; the model gave no answer.
    NoComment(NoCommentReason),
    /// The request succeeded but returned no choices.
    Empty,
}

impl ReviewOutcome {
    /// The string form callers receive: the review, `NO_COMMENT`, or `""`.
    pub fn into_text(self) -> String {
        match self {
            ReviewOutcome::Review(text) => text,
            ReviewOutcome::NoComment(_) => NO_COMMENT.to_string(),
            ReviewOutcome::Empty => String::new(),
        }
    }
}

/// Requests a review comment for one file's diff at a time.
///
/// The configuration, system prompt and encoder are fixed at construction,
/// so a requester can be shared (e.g. behind an [`Arc`]) by any number of
/// concurrent reviews. Each review sends at most one request.
pub struct ReviewRequester {
    config: ReviewConfig,
    system_prompt: String,
    model_support: ModelSupport,
    estimator: TokenEstimator,
    transport: Arc<dyn ChatTransport>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ReviewRequester {
    /// Create a requester that logs through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`ReviewRequester::with_sink`].
    pub fn new(
        config: ReviewConfig,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, ReviewError> {
        Self::with_sink(config, transport, Arc::new(TracingSink))
    }

    /// Create a requester reporting diagnostics to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Config`] if the model name is empty or
    /// `max_tokens` is zero, and [`ReviewError::Tokenizer`] if the encoder
    /// cannot be loaded.
    pub fn with_sink(
        config: ReviewConfig,
        transport: Arc<dyn ChatTransport>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ReviewError> {
        config.validate()?;
        let estimator = TokenEstimator::new()?;
        let system_prompt = build_system_prompt(&config);
        let model_support = check_model_support(&config.model);

        sink.emit(&Diagnostic::Initialized {
            api_endpoint: config.api_endpoint.clone(),
            max_tokens: config.max_tokens,
        });

        Ok(Self {
            config,
            system_prompt,
            model_support,
            estimator,
            transport,
            sink,
        })
    }

    /// The system prompt sent with every request.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Whether the configured model is in the supported set.
    pub fn model_support(&self) -> ModelSupport {
        self.model_support
    }

    /// Review `diff_text` and return the review, `NO_COMMENT`, or `""`.
    ///
    /// Never fails: transport errors are logged and turned into the
    /// sentinel.
    pub async fn perform_code_review(&self, diff_text: &str, file_name: &str) -> String {
        self.review(&ReviewRequest::new(diff_text, file_name))
            .await
            .into_text()
    }

    /// Review one file and report how it went.
    pub async fn review(&self, request: &ReviewRequest) -> ReviewOutcome {
        let model = self.config.model.as_str();
        let file_name = request.file_name.as_str();

        if self.model_support.is_advisory() {
            self.sink.emit(&Diagnostic::UnsupportedModel {
                model: model.to_string(),
            });
        }

        let budgeted = format!("{}{}", request.diff_text, self.system_prompt);
        let estimated = self.estimator.estimate_token_count(&budgeted);
        if estimated > self.config.max_tokens {
            self.sink.emit(&Diagnostic::TokenLimitExceeded {
                file_name: file_name.to_string(),
                limit: self.config.max_tokens,
                estimated,
            });
            return ReviewOutcome::NoComment(NoCommentReason::TokenBudgetExceeded);
        }

        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(request.diff_text.clone()),
        ];

        self.sink.emit(&Diagnostic::RequestPayload {
            model: model.to_string(),
            messages: messages.clone(),
        });
        self.sink.emit(&Diagnostic::EndpointInUse {
            api_endpoint: self.config.api_endpoint.clone(),
        });

        let completion = match self.transport.create_chat_completion(model, &messages).await {
            Ok(completion) => completion,
            Err(e) => {
                self.sink.emit(&Diagnostic::RequestFailed {
                    file_name: file_name.to_string(),
                    message: e.message,
                    payload: e.payload,
                });
                return ReviewOutcome::NoComment(NoCommentReason::RequestFailed);
            }
        };

        match completion.choices.into_iter().next() {
            Some(choice) => match choice.message.content {
                Some(content) => ReviewOutcome::Review(content),
                None => {
                    self.sink.emit(&Diagnostic::RequestFailed {
                        file_name: file_name.to_string(),
                        message: "malformed response: first choice has no content".into(),
                        payload: None,
                    });
                    ReviewOutcome::NoComment(NoCommentReason::RequestFailed)
                }
            },
            None => {
                self.sink.emit(&Diagnostic::EmptyResponse {
                    file_name: file_name.to_string(),
                });
                ReviewOutcome::Empty
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::diagnostics::Level;
    use crate::llm::{ChatCompletion, Role, TransportError};

    enum Reply {
        Content(&'static str),
        NullContent,
        NoChoices,
        Fail,
    }

    struct StubTransport {
        reply: Reply,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl StubTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn create_chat_completion(
            &self,
            model: &str,
            messages: &[ChatMessage],
        ) -> Result<ChatCompletion, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            match self.reply {
                Reply::Content(text) => Ok(ChatCompletion::with_content(text)),
                Reply::NullContent => Ok(serde_json::from_str(
                    r#"{"choices":[{"message":{"content":null}}]}"#,
                )
                .unwrap()),
                Reply::NoChoices => Ok(ChatCompletion::default()),
                Reply::Fail => Err(TransportError::new("API error 429 Too Many Requests")
                    .with_payload(serde_json::json!({"error": {"message": "Rate limit reached"}}))),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Diagnostic>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Diagnostic> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
            self.events().iter().filter(|d| pred(d)).count()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, diagnostic: &Diagnostic) {
            self.events.lock().unwrap().push(diagnostic.clone());
        }
    }

    const DIFF: &str = "\
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,3 @@
 pub fn add(a: i32, b: i32) -> i32 {
+    println!(\"adding\");
     a + b
";

    fn config(model: &str) -> ReviewConfig {
        ReviewConfig {
            include_bugs: true,
            model: model.into(),
            ..ReviewConfig::default()
        }
    }

    fn requester(
        config: ReviewConfig,
        reply: Reply,
    ) -> (ReviewRequester, Arc<StubTransport>, Arc<RecordingSink>) {
        let transport = StubTransport::new(reply);
        let sink = Arc::new(RecordingSink::default());
        let requester = ReviewRequester::with_sink(config, transport.clone(), sink.clone()).unwrap();
        (requester, transport, sink)
    }

    #[tokio::test]
    async fn returns_first_choice_verbatim() {
        let (r, transport, _) = requester(config("gpt-4"), Reply::Content("Looks good"));
        let review = r.perform_code_review(DIFF, "src/lib.rs").await;
        assert_eq!(review, "Looks good");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn sends_system_then_user_with_model() {
        let (r, transport, _) = requester(config("gpt-4"), Reply::Content("ok"));
        r.perform_code_review(DIFF, "src/lib.rs").await;

        let seen = transport.seen.lock().unwrap();
        let (model, messages) = &seen[0];
        assert_eq!(model, "gpt-4");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, r.system_prompt());
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, DIFF);
    }

    #[tokio::test]
    async fn oversized_diff_is_skipped_without_request() {
        let cfg = ReviewConfig {
            max_tokens: 50,
            ..config("gpt-4")
        };
        let (r, transport, sink) = requester(cfg, Reply::Content("unused"));
        let review = r.perform_code_review(DIFF, "src/lib.rs").await;

        assert_eq!(review, "NO_COMMENT");
        assert_eq!(transport.calls(), 0);
        let warnings = sink.count(|d| {
            matches!(d, Diagnostic::TokenLimitExceeded { file_name, limit: 50, .. } if file_name == "src/lib.rs")
        });
        assert_eq!(warnings, 1);
    }

    #[tokio::test]
    async fn budget_counts_prompt_and_diff_together() {
        let estimator = TokenEstimator::new().unwrap();
        let baseline = ReviewRequester::with_sink(
            config("gpt-4"),
            StubTransport::new(Reply::Content("x")),
            Arc::new(RecordingSink::default()),
        )
        .unwrap();
        let combined = format!("{DIFF}{}", baseline.system_prompt());
        let exact = estimator.estimate_token_count(&combined);

        let at_limit = ReviewConfig {
            max_tokens: exact,
            ..config("gpt-4")
        };
        let (r, transport, _) = requester(at_limit, Reply::Content("fits"));
        assert_eq!(r.perform_code_review(DIFF, "a.rs").await, "fits");
        assert_eq!(transport.calls(), 1);

        let one_under = ReviewConfig {
            max_tokens: exact - 1,
            ..config("gpt-4")
        };
        let (r, transport, sink) = requester(one_under, Reply::Content("fits"));
        assert_eq!(r.perform_code_review(DIFF, "a.rs").await, "NO_COMMENT");
        assert_eq!(transport.calls(), 0);
        let reported = sink.count(|d| {
            matches!(d, Diagnostic::TokenLimitExceeded { estimated, .. } if *estimated == exact)
        });
        assert_eq!(reported, 1);
    }

    #[tokio::test]
    async fn empty_choices_return_empty_string() {
        let (r, transport, sink) = requester(config("gpt-4"), Reply::NoChoices);
        let review = r.perform_code_review(DIFF, "src/lib.rs").await;

        assert_eq!(review, "");
        assert_ne!(review, NO_COMMENT);
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::EmptyResponse { .. })),
            1
        );
    }

    #[tokio::test]
    async fn transport_failure_becomes_sentinel() {
        let (r, transport, sink) = requester(config("gpt-4"), Reply::Fail);
        let outcome = r.review(&ReviewRequest::new(DIFF, "src/lib.rs")).await;

        assert_eq!(
            outcome,
            ReviewOutcome::NoComment(NoCommentReason::RequestFailed)
        );
        assert_eq!(outcome.into_text(), "NO_COMMENT");
        assert_eq!(transport.calls(), 1);

        let errors: Vec<Diagnostic> = sink
            .events()
            .into_iter()
            .filter(|d| d.level() == Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Diagnostic::RequestFailed {
                message, payload, ..
            } => {
                assert!(message.contains("429"));
                assert_eq!(
                    payload.as_ref().unwrap()["error"]["message"],
                    "Rate limit reached"
                );
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_content_is_treated_as_failure() {
        let (r, _, sink) = requester(config("gpt-4"), Reply::NullContent);
        let review = r.perform_code_review(DIFF, "src/lib.rs").await;
        assert_eq!(review, "NO_COMMENT");
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::RequestFailed { .. })),
            1
        );
    }

    #[tokio::test]
    async fn unknown_model_warns_once_and_still_sends() {
        let (r, transport, sink) = requester(config("mistral-large"), Reply::Content("ok"));
        assert_eq!(r.model_support(), ModelSupport::UnsupportedButProceeding);

        let review = r.perform_code_review(DIFF, "src/lib.rs").await;
        assert_eq!(review, "ok");
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::UnsupportedModel { model } if model == "mistral-large")),
            1
        );
    }

    #[tokio::test]
    async fn supported_model_does_not_warn() {
        let (r, _, sink) = requester(config("gpt-3.5-turbo"), Reply::Content("ok"));
        r.perform_code_review(DIFF, "src/lib.rs").await;
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::UnsupportedModel { .. })),
            0
        );
        assert_eq!(sink.count(|d| d.level() == Level::Warning), 0);
    }

    #[tokio::test]
    async fn request_is_logged_before_sending() {
        let (r, _, sink) = requester(config("gpt-4"), Reply::Content("ok"));
        r.perform_code_review(DIFF, "src/lib.rs").await;

        let events = sink.events();
        assert!(matches!(events[0], Diagnostic::Initialized { max_tokens: 4096, .. }));
        assert!(events
            .iter()
            .any(|d| matches!(d, Diagnostic::RequestPayload { model, messages } if model == "gpt-4" && messages.len() == 2)));
        assert!(events
            .iter()
            .any(|d| matches!(d, Diagnostic::EndpointInUse { api_endpoint } if api_endpoint == "https://api.openai.com/v1")));
    }

    #[tokio::test]
    async fn concurrent_reviews_share_one_requester() {
        let (r, transport, _) = requester(config("gpt-4"), Reply::Content("ok"));
        let r = Arc::new(r);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let r = Arc::clone(&r);
            tasks.spawn(async move { r.perform_code_review(DIFF, &format!("f{i}.rs")).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap(), "ok");
        }
        assert_eq!(transport.calls(), 8);
    }

    #[test]
    fn empty_model_is_a_config_error() {
        let result = ReviewRequester::with_sink(
            config(""),
            StubTransport::new(Reply::Content("x")),
            Arc::new(RecordingSink::default()),
        );
        assert!(matches!(result, Err(ReviewError::Config(_))));
    }

    #[test]
    fn zero_budget_is_a_config_error() {
        let cfg = ReviewConfig {
            max_tokens: 0,
            ..config("gpt-4")
        };
        let result = ReviewRequester::new(cfg, StubTransport::new(Reply::Content("x")));
        assert!(matches!(result, Err(ReviewError::Config(_))));
    }
}
