//! Direct and advanced analysis

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{AnalysisError, Orchestrator, Phase, request};
use crate::config::FanoutPolicy;
use crate::domain::Session;
use crate::llm::{LlmError, Message};
use crate::prompts::TopicPrompt;

/// Placeholder for a topic skipped under the best-effort policy
fn annotation(topic: &str, error: &LlmError) -> String {
    format!("[{}: Ошибка: {}]", topic, error.user_message())
}

/// Apply the fan-out policy to one concurrent phase
///
/// Results stay aligned with `topics`. Under `Abort` the first failed branch
/// fails the phase; under `BestEffort` only a phase where every branch failed
/// does.
fn settle(
    phase: Phase,
    topics: &[&str],
    mut results: Vec<Result<String, LlmError>>,
    policy: FanoutPolicy,
) -> Result<Vec<Result<String, LlmError>>, AnalysisError> {
    let failed = results.iter().position(|r| r.is_err());
    let must_fail = match policy {
        FanoutPolicy::Abort => failed.is_some(),
        FanoutPolicy::BestEffort => results.iter().all(|r| r.is_err()),
    };

    if must_fail
        && let Some(idx) = failed
        && let Err(source) = results.swap_remove(idx)
    {
        warn!(%phase, topic = %topics[idx], error = %source, "settle: phase failed");
        return Err(AnalysisError::Pipeline {
            phase,
            topic: topics[idx].to_string(),
            source,
        });
    }
    Ok(results)
}

impl Orchestrator {
    /// One prompt built from all answers, one provider call
    pub async fn analyze(&self, session: &mut Session) -> Result<String, AnalysisError> {
        debug!(user_id = %session.user_id, model = %session.model_selection.model_name, "analyze: called");
        let client = self.client(session)?;
        let prompt = self.prompts.audience_reaction(&session.analysis_fields)?;

        let asked = Message::user(prompt.clone());
        self.repo.commit(session, move |s| s.message_history.push(asked)).await?;

        let reply = client
            .generate(request(session, vec![Message::user(prompt)], self.config.analysis.direct))
            .await?;

        let answered = Message::assistant(reply.clone());
        self.repo.commit(session, move |s| s.message_history.push(answered)).await?;

        info!(user_id = %session.user_id, reply_len = reply.len(), "Direct analysis complete");
        Ok(reply)
    }

    /// Seed comment, then concurrent per-topic requests, then concurrent summaries
    ///
    /// Issues `1 + 2N` provider calls for `N` topics when nothing fails. The
    /// result is the seed followed by the summaries in topic order, whatever
    /// order the calls completed in.
    pub async fn advanced_analyze(&self, session: &mut Session) -> Result<String, AnalysisError> {
        debug!(user_id = %session.user_id, model = %session.model_selection.model_name, "advanced_analyze: called");
        let client = self.client(session)?;
        let analysis = &self.config.analysis;
        let policy = analysis.fanout_policy;

        // Phase 1: seed comment
        let seed_prompt = self.prompts.seed_comment(&session.analysis_fields)?;
        let seed = client
            .generate(request(session, vec![Message::user(seed_prompt)], analysis.seed))
            .await
            .map_err(|source| AnalysisError::Pipeline {
                phase: Phase::Seed,
                topic: String::new(),
                source,
            })?;

        // Phase 2: fan-out
        let topics = self.prompts.topics(&session.analysis_fields, &analysis.topics)?;
        let topic_names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
        let requests: Vec<_> = topics
            .iter()
            .map(|t| request(session, vec![Message::user(t.prompt.clone())], analysis.fanout))
            .collect();
        debug!(branch_count = requests.len(), "advanced_analyze: fan-out");
        let results = join_all(requests.into_iter().map(|r| client.generate(r))).await;
        let fanout = settle(Phase::Fanout, &topic_names, results, policy)?;

        let mut sections: Vec<Option<String>> = vec![None; topics.len()];
        let mut live: Vec<(usize, &TopicPrompt, String)> = Vec::new();
        for (idx, (topic, result)) in topics.iter().zip(fanout).enumerate() {
            match result {
                Ok(reply) => live.push((idx, topic, reply)),
                Err(e) => sections[idx] = Some(annotation(&topic.topic, &e)),
            }
        }

        // Nothing is persisted until every phase has settled
        let mut history: Vec<Message> = live
            .iter()
            .flat_map(|(_, topic, reply)| [Message::user(topic.prompt.clone()), Message::assistant(reply.clone())])
            .collect();

        // Phase 3: per-topic summaries
        let summary_prompts = live
            .iter()
            .map(|(_, topic, reply)| self.prompts.topic_summary(topic, reply))
            .collect::<Result<Vec<_>, _>>()?;
        let live_names: Vec<&str> = live.iter().map(|(_, t, _)| t.topic.as_str()).collect();
        let requests: Vec<_> = summary_prompts
            .iter()
            .map(|p| request(session, vec![Message::user(p.clone())], analysis.summary))
            .collect();
        debug!(branch_count = requests.len(), "advanced_analyze: summaries");
        let results = join_all(requests.into_iter().map(|r| client.generate(r))).await;
        let summaries = settle(Phase::Summary, &live_names, results, policy)?;

        for ((idx, topic, _), (prompt, result)) in live.iter().zip(summary_prompts.into_iter().zip(summaries)) {
            match result {
                Ok(summary) => {
                    history.push(Message::user(prompt));
                    history.push(Message::assistant(summary.clone()));
                    sections[*idx] = Some(summary);
                }
                Err(e) => sections[*idx] = Some(annotation(&topic.topic, &e)),
            }
        }

        let comment = seed.clone();
        self.repo
            .commit(session, move |s| {
                s.comments.push(comment);
                s.message_history.extend(history);
            })
            .await?;

        let output = std::iter::once(seed)
            .chain(sections.into_iter().flatten())
            .collect::<Vec<_>>()
            .join("\n\n");
        info!(user_id = %session.user_id, topic_count = topics.len(), "Advanced analysis complete");
        Ok(output)
    }
}
