//! Pipeline - one request from description to saved file
//!
//! Stages run strictly in order: agent call, extraction, path derivation,
//! atomic write, optional preview. The first failure ends the run; later
//! stages never start. Cancellation is honoured up to the final rename.

use htool_agent::{AgentClient, AgentPrompt};
use htool_core::{GenerationRequest, GenerationResult, HtoolConfig, HtoolError, Result, Warning};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::extractor::ArtifactExtractor;
use crate::filename::FilenameDeriver;
use crate::persister::Persister;
use crate::preview::Previewer;

/// Sequences the generation stages for a single request
#[derive(Debug)]
pub struct Pipeline {
    agent: AgentClient,
    extractor: ArtifactExtractor,
    deriver: FilenameDeriver,
    persister: Persister,
    previewer: Previewer,
}

impl Pipeline {
    /// Build every stage from configuration
    pub fn from_config(config: &HtoolConfig) -> Result<Self> {
        let agent = AgentClient::from_config(&config.agent)?;
        Ok(Self::new(agent, config))
    }

    /// Use an existing agent client with the remaining stages from `config`
    pub fn new(agent: AgentClient, config: &HtoolConfig) -> Self {
        Self {
            agent,
            extractor: ArtifactExtractor::from_config(&config.extraction),
            deriver: FilenameDeriver::from_config(&config.output),
            persister: Persister::new(),
            previewer: Previewer::system(),
        }
    }

    pub fn with_previewer(mut self, previewer: Previewer) -> Self {
        self.previewer = previewer;
        self
    }

    pub fn agent(&self) -> &AgentClient {
        &self.agent
    }

    /// Run the request to completion
    ///
    /// Never panics and never returns early: every outcome, including
    /// cancellation, is reported in the returned [`GenerationResult`].
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!("Generating: {}", request.description());

        let mut result = GenerationResult::pending(run_id);

        match self.execute(request, cancel, &mut result).await {
            Ok((path, bytes)) => {
                result = result.succeed(path.clone(), bytes);
                if request.preview() {
                    if let Some(warning) = self.previewer.preview(&path) {
                        result.warnings.push(warning);
                    }
                }
                result
            }
            Err(e) => {
                debug!("Run failed at {} stage: {}", e.kind().stage(), e);
                result.fail(&e)
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        result: &mut GenerationResult,
    ) -> Result<(PathBuf, usize)> {
        let prompt = AgentPrompt::for_request(request);
        let reply = self.agent.invoke(&prompt, cancel).await?;
        debug!(
            "Reply received at {} after {} attempt(s), {} chars",
            reply.received_at.to_rfc3339(),
            reply.attempts,
            reply.raw_text.len()
        );

        if request.verbose() {
            result.raw_reply = Some(reply.raw_text.clone());
        }

        let (extracted, trace) = self.extractor.extract_traced(&reply.raw_text);
        if request.verbose() {
            result.trace = trace;
        }
        let artifact = extracted?;
        result
            .warnings
            .extend(artifact.warnings.iter().cloned().map(Warning::Extraction));
        info!("Extracted artifact ({} bytes)", artifact.len());

        let target = self.deriver.derive(request)?;
        debug!("Resolved output path {}", target.path.display());

        if cancel.is_cancelled() {
            return Err(HtoolError::Cancelled);
        }
        let staged = self.persister.stage(&target, &artifact)?;

        // Dropping `staged` removes the temp file
        if cancel.is_cancelled() {
            return Err(HtoolError::Cancelled);
        }
        let bytes = staged.commit()?;

        Ok((target.path, bytes))
    }
}
