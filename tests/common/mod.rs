// tests/common/mod.rs
// Shared fakes for the `ChatTransport` and `LanguageAgent` seams, used by
// integration tests that need to drive the Chat Generation Runner and the
// Match Rationale Runner without a real Telegram bot or OpenAI account.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use mitko_matchmaker::agent::{
    AgentUsage, ConversationContext, ConversationResponse, LanguageAgent, MatchRationale, ProfileExtract,
};
use mitko_matchmaker::error::{AppError, AppResult};
use mitko_matchmaker::transport::{ChatTransport, InlineKeyboard, SendOptions};

/// Records every outbound call; always succeeds. Message ids are handed out
/// sequentially starting at 1.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeTransportState>,
}

#[derive(Default)]
struct FakeTransportState {
    next_message_id: i64,
    pub sent: Vec<(i64, String)>,
    pub edited: Vec<(i64, i64, String)>,
    pub deleted: Vec<(i64, i64)>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self { state: Mutex::new(FakeTransportState { next_message_id: 1, ..Default::default() }) }
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn last_sent_text(&self) -> Option<String> {
        self.state.lock().unwrap().sent.last().map(|(_, text)| text.clone())
    }

    pub fn deleted_count(&self) -> usize {
        self.state.lock().unwrap().deleted.len()
    }

    pub fn edited_count(&self) -> usize {
        self.state.lock().unwrap().edited.len()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_text(&self, telegram_id: i64, text: &str, _opts: SendOptions) -> anyhow::Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_message_id;
        state.next_message_id += 1;
        state.sent.push((telegram_id, text.to_string()));
        Ok(id)
    }

    async fn edit_text(
        &self,
        telegram_id: i64,
        message_id: i64,
        text: &str,
        _keyboard: Option<InlineKeyboard>,
    ) -> anyhow::Result<()> {
        self.state.lock().unwrap().edited.push((telegram_id, message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, telegram_id: i64, message_id: i64) -> anyhow::Result<()> {
        self.state.lock().unwrap().deleted.push((telegram_id, message_id));
        Ok(())
    }

    async fn send_typing(&self, _telegram_id: i64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_forum_topic(&self, _group_id: i64, _name: &str) -> anyhow::Result<i64> {
        Ok(1)
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>, _show_alert: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A scripted `LanguageAgent`: `run_conversation` replies from a queue of
/// pre-baked responses (one per call, in order), `embed` counts its calls so
/// tests can assert the §3 "regenerated iff summary changes" invariant.
pub struct FakeAgent {
    conversation_queue: Mutex<VecDeque<ConversationResponse>>,
    embed_calls: Mutex<Vec<String>>,
    rationale: Mutex<Option<MatchRationale>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self {
            conversation_queue: Mutex::new(VecDeque::new()),
            embed_calls: Mutex::new(Vec::new()),
            rationale: Mutex::new(None),
        }
    }

    pub fn queue_conversation(&self, response: ConversationResponse) {
        self.conversation_queue.lock().unwrap().push_back(response);
    }

    pub fn queue_rationale(&self, rationale: MatchRationale) {
        *self.rationale.lock().unwrap() = Some(rationale);
    }

    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.lock().unwrap().len()
    }
}

pub fn profile(summary: &str) -> ProfileExtract {
    ProfileExtract {
        is_seeker: true,
        is_provider: false,
        matching_summary: summary.to_string(),
        practical_context: None,
        private_observations: None,
    }
}

fn fake_usage() -> AgentUsage {
    AgentUsage { input_tokens: 100, cached_input_tokens: 0, output_tokens: 20, response_id: Some("resp_fake".into()), cost_usd: 0.001 }
}

#[async_trait]
impl LanguageAgent for FakeAgent {
    async fn run_conversation(
        &self,
        _user_prompt: Option<&str>,
        _system_message: Option<&str>,
        _context: ConversationContext,
    ) -> AppResult<(ConversationResponse, AgentUsage)> {
        let response = self
            .conversation_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Agent("FakeAgent: conversation queue exhausted".to_string()))?;
        Ok((response, fake_usage()))
    }

    async fn run_rationale(&self, _user_a_profile: &str, _user_b_profile: &str) -> AppResult<(MatchRationale, AgentUsage)> {
        let rationale = self
            .rationale
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(MatchRationale {
                explanation: "Both are strong backend engineers with overlapping stacks.".to_string(),
                key_alignments: vec!["Same primary language".to_string(), "Compatible availability".to_string()],
                confidence_score: 0.85,
            });
        Ok((rationale, fake_usage()))
    }

    async fn embed(&self, text: &str) -> AppResult<(Vec<f32>, f64)> {
        self.embed_calls.lock().unwrap().push(text.to_string());
        // A cheap, deterministic stand-in embedding derived from text length.
        Ok((vec![text.len() as f32, 1.0], 0.0))
    }
}
