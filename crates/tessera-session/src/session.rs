//! Agent sessions: per-session options and conversation assembly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use tessera_core::{Message, ModelDescriptor, ReasoningEffort, Role, ToolDefinition};
use tessera_providers::{
    Client, Completion, CompletionRequest, PayloadObserver, StreamHandle, StreamOptions, Usage,
};

use crate::error::SessionError;
use crate::settings::{SettingsManager, SettingsProvider};

/// Builder for [`AgentSession`].
///
/// Options left unset fall back to the settings provider.
pub struct SessionBuilder {
    client: Option<Client>,
    settings: Option<Arc<dyn SettingsProvider>>,
    model: Option<ModelDescriptor>,
    api_key: Option<String>,
    system_prompt: Option<String>,
    preserve_thinking: Option<bool>,
    reasoning: Option<ReasoningEffort>,
    tools: Vec<ToolDefinition>,
    on_payload: Option<PayloadObserver>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            settings: None,
            model: None,
            api_key: None,
            system_prompt: None,
            preserve_thinking: None,
            reasoning: None,
            tools: Vec::new(),
            on_payload: None,
        }
    }

    /// Set the client used for completions.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the settings collaborator.
    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn model(mut self, model: ModelDescriptor) -> Self {
        self.model = Some(model);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Override the settings' preserve-thinking value for this session.
    pub fn preserve_thinking(mut self, preserve: bool) -> Self {
        self.preserve_thinking = Some(preserve);
        self
    }

    /// Override the settings' reasoning effort for this session.
    pub fn reasoning(mut self, reasoning: ReasoningEffort) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Observe every outbound payload of this session.
    pub fn on_payload(mut self, observer: PayloadObserver) -> Self {
        self.on_payload = Some(observer);
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<AgentSession, SessionError> {
        let client = self.client.ok_or(SessionError::Incomplete("client"))?;
        let model = self.model.ok_or(SessionError::Incomplete("model"))?;
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(SettingsManager::default()));

        let preserve_thinking = self
            .preserve_thinking
            .unwrap_or_else(|| settings.preserve_thinking());
        let reasoning = self.reasoning.unwrap_or_else(|| settings.reasoning());

        let session = AgentSession {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            client,
            settings,
            model,
            api_key: self.api_key,
            system_prompt: self.system_prompt,
            preserve_thinking,
            reasoning,
            tools: self.tools,
            on_payload: self.on_payload,
            messages: Vec::new(),
            usage: Usage::default(),
        };

        info!(
            session_id = %session.id,
            model = %session.model.qualified_id(),
            preserve_thinking,
            reasoning = %reasoning,
            "Created session"
        );
        Ok(session)
    }
}

/// One conversation with one model.
pub struct AgentSession {
    id: String,
    created_at: DateTime<Utc>,
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    model: ModelDescriptor,
    api_key: Option<String>,
    system_prompt: Option<String>,
    preserve_thinking: bool,
    reasoning: ReasoningEffort,
    tools: Vec<ToolDefinition>,
    on_payload: Option<PayloadObserver>,
    messages: Vec<Message>,
    usage: Usage,
}

impl AgentSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    /// Effective preserve-thinking value for this session.
    pub fn preserve_thinking(&self) -> bool {
        self.preserve_thinking
    }

    pub fn reasoning(&self) -> ReasoningEffort {
        self.reasoning
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Usage summed over every recorded completion.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Call options for the next turn.
    pub fn call_options(&self) -> StreamOptions {
        let mut options = StreamOptions::new()
            .with_reasoning(self.reasoning)
            .with_preserve_thinking(self.preserve_thinking);
        if let Some(ref key) = self.api_key {
            options = options.with_api_key(key.clone());
        }
        if let Some(max_tokens) = self.settings.max_tokens() {
            options = options.with_max_tokens(max_tokens);
        }
        if self.settings.strict_reasoning() {
            options = options.strict();
        }
        options.on_payload = self.on_payload.clone();
        options
    }

    /// The request for the next turn.
    ///
    /// Earlier reasoning is only sent back when thinking is preserved.
    pub fn context(&self) -> CompletionRequest {
        let messages = self
            .messages
            .iter()
            .map(|m| {
                if m.role == Role::Assistant && !self.preserve_thinking {
                    m.without_thinking()
                } else {
                    m.clone()
                }
            })
            .collect();

        let mut request = CompletionRequest::new(messages).with_tools(self.tools.clone());
        if let Some(ref system) = self.system_prompt {
            request = request.with_system(system.clone());
        }
        request
    }

    /// Append a user message and start streaming the reply.
    ///
    /// The reply is not recorded; pass the settled completion to
    /// [`AgentSession::record`].
    pub fn prompt(&mut self, text: impl Into<String>) -> Result<StreamHandle, SessionError> {
        self.messages.push(Message::user(text));
        let options = self.call_options();
        match self.client.stream(&self.model, self.context(), &options) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                // Nothing was sent, so the turn never happened.
                self.messages.pop();
                Err(e.into())
            }
        }
    }

    /// Append the assistant reply from a settled completion.
    pub fn record(&mut self, completion: &Completion) {
        self.usage += completion.usage;
        self.messages.push(completion.to_message());
        debug!(
            session_id = %self.id,
            messages = self.messages.len(),
            total_tokens = self.usage.total_tokens(),
            "Recorded completion"
        );
    }

    /// Append a tool result for the next turn.
    pub fn add_tool_result(
        &mut self,
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) {
        self.messages
            .push(Message::tool_result(tool_use_id.into(), content, is_error));
    }

    /// Prompt, wait for the reply and record it.
    ///
    /// A failed turn leaves the history as it was, so the prompt can be
    /// sent again.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<Completion, SessionError> {
        let handle = self.prompt(text)?;
        match handle.result().await {
            Ok(completion) => {
                self.record(&completion);
                Ok(completion)
            }
            Err(e) => {
                self.messages.pop();
                debug!(session_id = %self.id, kind = e.kind(), "Dropped failed turn");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("model", &self.model.qualified_id())
            .field("preserve_thinking", &self.preserve_thinking)
            .field("reasoning", &self.reasoning)
            .field("messages", &self.messages.len())
            .finish()
    }
}
