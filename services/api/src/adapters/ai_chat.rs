//! services/api/src/adapters/ai_chat.rs
//!
//! This module contains the adapter for the AI therapy chat.
//! It implements the `TherapyChatService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;

use therapy_core::domain::{ChatMessage, ChatSender};
use therapy_core::ports::{PortError, PortResult, TherapyChatService};

const SYSTEM_INSTRUCTIONS: &str = "You are a supportive AI therapy companion guiding a client \
through a structured session. Listen closely, reflect what the client says back to them, and \
ask one gentle, open-ended question at a time. Ground your replies in the session topic when \
one is set. Keep responses to a few conversational sentences. You are not a medical \
professional: never diagnose, never discuss medication, and if the client mentions harming \
themselves or others, encourage them to contact a crisis line or emergency services right away.";

/// Reply used by callers when the completion attempt fails. The session
/// must keep moving even when the model does not.
pub const FALLBACK_REPLY: &str = "I'm having a little trouble collecting my thoughts right now. \
Could you tell me more about how that made you feel?";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TherapyChatService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    thinking_delay: Duration,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, thinking_delay: Duration) -> Self {
        Self {
            client,
            model,
            thinking_delay,
        }
    }
}

//=========================================================================================
// `TherapyChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TherapyChatService for OpenAiChatAdapter {
    /// Generates one assistant turn. A single best-effort attempt: no
    /// retries, no streaming; the caller substitutes a fallback reply on
    /// failure.
    async fn reply(
        &self,
        topic: Option<&str>,
        history: &[ChatMessage],
        message: &str,
    ) -> PortResult<String> {
        // The client UI shows a "thinking" indicator for this beat.
        tokio::time::sleep(self.thinking_delay).await;

        let system_text = match topic {
            Some(topic) => format!("{SYSTEM_INSTRUCTIONS}\n\nSession topic: {topic}"),
            None => SYSTEM_INSTRUCTIONS.to_string(),
        };

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_text)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for turn in history {
            let prior: ChatCompletionRequestMessage = match turn.sender {
                ChatSender::Client => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.body.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatSender::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.body.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(prior);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(400u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let reply = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if reply.trim().is_empty() {
            return Err(PortError::Unexpected(
                "chat completion returned no content".to_string(),
            ));
        }
        Ok(reply.trim().to_string())
    }
}
