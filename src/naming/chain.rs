// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ordered strategy chain with bounded retries

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ai::{AiTextStrategy, AiVisionStrategy};
use super::fallback::{NoteNameStrategy, OriginalFilenameStrategy, TimestampStrategy};
use super::keywords::ContextKeywordStrategy;
use super::sanitize::{clean_response, sanitize_name, with_extension, SanitizeRules};
use super::{NamingRequest, NamingStrategy, Proposal};
use crate::config::{AppConfig, StrategyKind};
use crate::error::{Issue, IssueKind};
use crate::model::NamingDecision;
use crate::provider::{NameProvider, ProposeError};

pub struct NamingChain {
    strategies: Vec<Box<dyn NamingStrategy>>,
    rules: SanitizeRules,
    retries: u32,
    retry_base: Duration,
}

impl NamingChain {
    /// Build the chain from configuration. AI strategies are dropped when
    /// AI is disabled or no provider is available; the original-filename
    /// fallback always closes the chain.
    pub fn from_config(config: &AppConfig, provider: Option<Arc<dyn NameProvider>>) -> Self {
        let rules = SanitizeRules::from(&config.naming);
        let provider = provider.filter(|_| config.naming.use_ai);

        let mut kinds: Vec<StrategyKind> = Vec::new();
        for kind in config.naming.chain.iter().copied() {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if !kinds.contains(&StrategyKind::OriginalFilename) {
            kinds.push(StrategyKind::OriginalFilename);
        }

        let mut strategies: Vec<Box<dyn NamingStrategy>> = Vec::new();
        for kind in kinds {
            let strategy: Box<dyn NamingStrategy> = match (kind, &provider) {
                (StrategyKind::AiVision, Some(p)) => Box::new(AiVisionStrategy::new(p.clone(), config)),
                (StrategyKind::AiText, Some(p)) => Box::new(AiTextStrategy::new(p.clone(), config)),
                (StrategyKind::AiVision | StrategyKind::AiText, None) => {
                    debug!("Skipping {} strategy: AI unavailable", kind);
                    continue;
                }
                (StrategyKind::ContextKeywords, _) => {
                    Box::new(ContextKeywordStrategy::new(config.naming.max_keywords))
                }
                (StrategyKind::NoteName, _) => Box::new(NoteNameStrategy),
                (StrategyKind::Timestamp, _) => Box::new(TimestampStrategy),
                (StrategyKind::OriginalFilename, _) => Box::new(OriginalFilenameStrategy::new(rules.clone())),
            };
            strategies.push(strategy);
        }

        Self::with_strategies(
            strategies,
            rules,
            config.ai.retries,
            Duration::from_millis(config.ai.retry_base_ms),
        )
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn NamingStrategy>>,
        rules: SanitizeRules,
        retries: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            strategies,
            rules,
            retries,
            retry_base,
        }
    }

    /// Strategy kinds in the order they are tried
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Run the chain for one image. Never fails: every problem becomes an
    /// issue and, at worst, a decision to keep the original name.
    pub async fn decide(&self, request: &NamingRequest) -> (NamingDecision, Vec<Issue>) {
        let mut issues = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !strategy.is_applicable(request) {
                debug!("{} not applicable to {:?}", kind, request.image_path);
                continue;
            }

            let proposal = match self.propose_with_retry(strategy.as_ref(), request).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    warn!("{} failed for {:?}, falling through: {}", kind, request.image_path, e);
                    issues.push(Issue::new(
                        IssueKind::NamingFallthrough,
                        &request.image_path,
                        format!("{}: {}", kind, e),
                    ));
                    continue;
                }
            };

            let raw = if kind.uses_ai() {
                clean_response(&proposal.name)
            } else {
                proposal.name.clone()
            };

            match sanitize_name(&raw, &self.rules) {
                Some(stem) => {
                    let chosen_name = with_extension(&stem, &request.extension);
                    info!("Named {:?} -> {} via {}", request.image_path, chosen_name, kind);
                    return (
                        NamingDecision::Named {
                            chosen_name,
                            strategy: kind,
                            rationale: proposal.rationale,
                        },
                        issues,
                    );
                }
                None => {
                    warn!("{} proposed an unusable name {:?} for {:?}", kind, proposal.name, request.image_path);
                    issues.push(Issue::new(
                        IssueKind::NamingFallthrough,
                        &request.image_path,
                        format!("{}: unusable name '{}'", kind, proposal.name),
                    ));
                }
            }
        }

        issues.push(Issue::new(
            IssueKind::NamingExhausted,
            &request.image_path,
            "no strategy produced a name",
        ));
        (
            NamingDecision::KeepOriginal {
                reason: "all naming strategies failed".to_string(),
            },
            issues,
        )
    }

    /// Retry only transient failures, with exponential backoff
    async fn propose_with_retry(
        &self,
        strategy: &dyn NamingStrategy,
        request: &NamingRequest,
    ) -> Result<Proposal, ProposeError> {
        let mut attempt = 0;
        loop {
            match strategy.propose(request).await {
                Ok(proposal) => return Ok(proposal),
                Err(e) if e.kind.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "Retrying {} for {:?} in {:?} (attempt {}): {}",
                        strategy.kind(),
                        request.image_path,
                        delay,
                        attempt + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FailureKind, ImagePayload, ProposeOptions};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, then repeats the last one
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String, ProposeError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, ProposeError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl NameProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn supports_vision(&self) -> bool {
            false
        }

        async fn propose(
            &self,
            _image: Option<&ImagePayload>,
            _context: &str,
            _options: &ProposeOptions,
        ) -> Result<String, ProposeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.ai.retries = 2;
        config.ai.retry_base_ms = 1;
        config
    }

    fn request() -> NamingRequest {
        NamingRequest {
            image_path: PathBuf::from("/vault/Pasted image 1.PNG"),
            extension: "PNG".to_string(),
            original_stem: "Pasted image 1".to_string(),
            size: 10,
            context: "The energy diagram of the system [image]".to_string(),
            first_note: PathBuf::from("/vault/energy.md"),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(ProposeError::new(FailureKind::Transient, "429")),
            Err(ProposeError::new(FailureKind::Transient, "timeout")),
            Ok("Name: \"Energy flow chart\"".to_string()),
        ]);
        let chain = NamingChain::from_config(&config(), Some(provider.clone()));

        let (decision, issues) = chain.decide(&request()).await;
        assert_eq!(
            decision,
            NamingDecision::Named {
                chosen_name: "Energy_flow_chart.PNG".to_string(),
                strategy: StrategyKind::AiText,
                rationale: "scripted text model from note context".to_string(),
            }
        );
        assert!(issues.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_definitive_failure_falls_through_immediately() {
        let provider = ScriptedProvider::new(vec![Err(ProposeError::new(FailureKind::Auth, "bad key"))]);
        let chain = NamingChain::from_config(&config(), Some(provider.clone()));

        let (decision, issues) = chain.decide(&request()).await;
        assert_eq!(decision.strategy(), Some(StrategyKind::ContextKeywords));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::NamingFallthrough);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let provider = ScriptedProvider::new(vec![Err(ProposeError::new(FailureKind::Transient, "503"))]);
        let chain = NamingChain::from_config(&config(), Some(provider.clone()));

        let (decision, _) = chain.decide(&request()).await;
        assert_eq!(decision.strategy(), Some(StrategyKind::ContextKeywords));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_without_ai_only_local_strategies_remain() {
        let chain = NamingChain::from_config(&config(), None);
        assert_eq!(
            chain.kinds(),
            vec![StrategyKind::ContextKeywords, StrategyKind::OriginalFilename]
        );

        let mut req = request();
        req.context = "[image]".to_string();
        let (decision, issues) = chain.decide(&req).await;
        assert_eq!(
            decision,
            NamingDecision::Named {
                chosen_name: "Pasted_image_1.PNG".to_string(),
                strategy: StrategyKind::OriginalFilename,
                rationale: "kept original name 'Pasted image 1'".to_string(),
            }
        );
        assert_eq!(issues.len(), 1);
    }

    #[tokio::test]
    async fn test_original_filename_is_always_appended() {
        let mut config = config();
        config.naming.chain = vec![StrategyKind::NoteName, StrategyKind::NoteName];
        let chain = NamingChain::from_config(&config, None);
        assert_eq!(chain.kinds(), vec![StrategyKind::NoteName, StrategyKind::OriginalFilename]);
    }

    #[tokio::test]
    async fn test_exhausted_chain_keeps_original() {
        let chain = NamingChain::with_strategies(Vec::new(), SanitizeRules::default(), 0, Duration::ZERO);
        let (decision, issues) = chain.decide(&request()).await;
        assert!(matches!(decision, NamingDecision::KeepOriginal { .. }));
        assert_eq!(issues[0].kind, IssueKind::NamingExhausted);
    }
}
