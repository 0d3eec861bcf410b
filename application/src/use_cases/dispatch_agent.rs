//! Prompted agent dispatch
//!
//! [`PromptedAgentCaller`] is the production [`AgentCaller`]: for each call
//! it builds a [`PromptIR`], runs it through the IR pipeline, compiles the
//! prompt, calls a model provider and reads the reply back through the
//! structured output parser and schema validator.

use crate::config::AgentProfile;
use crate::ports::agent_caller::{AgentCallError, AgentCaller, AgentReply};
use crate::ports::model_provider::{GenerationRequest, ProviderRegistry};
use crate::ports::run_event_logger::{NoRunEventLogger, RunEvent, RunEventLogger};
use async_trait::async_trait;
use concord_domain::{
    AgentResponse, CONTEXT_DIGEST_SENTINEL, ContextMap, PhaseType, PromptCompiler, PromptContext,
    PromptIR, PromptIRPipeline, SchemaValidator, ValidationStatus, parse_structured_output,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Flag added when the payload does not satisfy the role's output schema.
pub const SCHEMA_VIOLATION_FLAG: &str = "SCHEMA_VIOLATION";
/// Flag added when a policy rule flagged (but did not deny) the instruction.
pub const POLICY_FLAG: &str = "POLICY_FLAGGED";
/// Confidence ceiling for responses whose payload violates the schema.
pub const SCHEMA_VIOLATION_CONFIDENCE_CAP: f64 = 0.5;

/// Context keys the orchestrator sets for its own bookkeeping; they are not
/// turned into `ctx:` references.
const RESERVED_CONTEXT_KEYS: &[&str] = &["task", "phase", "phase_type"];

pub struct PromptedAgentCaller {
    profiles: HashMap<String, AgentProfile>,
    pipeline: Arc<PromptIRPipeline>,
    compiler: Arc<PromptCompiler>,
    providers: ProviderRegistry,
    validator: SchemaValidator,
    base_context: PromptContext,
    events: Arc<dyn RunEventLogger>,
}

impl PromptedAgentCaller {
    pub fn new(
        pipeline: Arc<PromptIRPipeline>,
        compiler: Arc<PromptCompiler>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            profiles: HashMap::new(),
            pipeline,
            compiler,
            providers,
            validator: SchemaValidator,
            base_context: PromptContext::default(),
            events: Arc::new(NoRunEventLogger),
        }
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profiles.insert(profile.name.clone(), profile);
        self
    }

    pub fn with_profiles(self, profiles: impl IntoIterator<Item = AgentProfile>) -> Self {
        profiles.into_iter().fold(self, |caller, p| caller.with_profile(p))
    }

    /// File excerpts and summaries shared by every call.
    pub fn with_base_context(mut self, context: PromptContext) -> Self {
        self.base_context = context;
        self
    }

    pub fn with_event_logger(mut self, events: Arc<dyn RunEventLogger>) -> Self {
        self.events = events;
        self
    }

    pub fn pipeline(&self) -> &PromptIRPipeline {
        &self.pipeline
    }

    pub fn compiler(&self) -> &PromptCompiler {
        &self.compiler
    }

    /// Configured profile, or an implicit one when the name is a known role.
    fn profile(&self, agent: &str) -> Result<AgentProfile, AgentCallError> {
        if let Some(profile) = self.profiles.get(agent) {
            return Ok(profile.clone());
        }
        if self.compiler.templates().contains(agent) {
            return Ok(AgentProfile::for_role(agent));
        }
        Err(AgentCallError::UnknownAgent(agent.to_string()))
    }

    fn build_ir(
        &self,
        profile: &AgentProfile,
        brief: &str,
        context: &ContextMap,
    ) -> Result<PromptIR, AgentCallError> {
        let phase = context
            .get("phase_type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<PhaseType>().ok())
            .unwrap_or_default();

        let mut builder = PromptIR::builder(profile.role.clone(), brief)
            .phase(phase)
            .context_refs(context_refs(&self.base_context, context))
            .token_budget(self.compiler.config().default_token_budget)
            .priority(profile.priority)
            .schema_id(profile.role.clone())
            .metadata("agent", profile.name.clone());

        if let Some(Value::Array(constraints)) = context.get("constraints") {
            for constraint in constraints.iter().filter_map(Value::as_str) {
                builder = builder.constraint(constraint);
            }
        }
        if let Some(name) = context.get("phase").and_then(Value::as_str) {
            builder = builder.metadata("phase", name);
        }
        if let Some(model) = &profile.model {
            builder = builder.model_hint(model.clone());
        }
        if let Some(temperature) = profile.temperature {
            builder = builder.temperature(temperature);
        }

        builder
            .build()
            .map_err(|source| AgentCallError::InvalidInstruction {
                agent: profile.name.clone(),
                source,
            })
    }

    /// Context for the compiler, restricted to what the transformed IR
    /// still references. A digested IR contributes only its digest line.
    fn prompt_context(&self, ir: &PromptIR, context: &ContextMap) -> PromptContext {
        if ir.context_refs.iter().any(|r| r == CONTEXT_DIGEST_SENTINEL) {
            let mut digested = PromptContext::new();
            if let Some(digest) = ir.metadata.get("context_digest").and_then(Value::as_str) {
                digested = digested.with_extra("context_digest", digest);
            }
            return digested;
        }

        let refs = |kind: &str, name: &str| {
            ir.context_refs
                .iter()
                .any(|r| r.split_once(':') == Some((kind, name)))
        };
        let mut prompt_context = self.base_context.clone();
        prompt_context.files.retain(|f| refs("file", &f.path));
        if !refs("git", "summary") {
            prompt_context.git_summary = None;
        }
        if !ir.context_refs.iter().any(|r| r.starts_with("active:")) {
            prompt_context.active_file = None;
        }
        for (key, value) in context {
            if RESERVED_CONTEXT_KEYS.contains(&key.as_str()) || !refs("ctx", key) {
                continue;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            prompt_context.extra.insert(key.clone(), text);
        }
        prompt_context
    }
}

/// `file:<path>`, `git:summary`, `active:<path>` and `ctx:<key>` references.
fn context_refs(base: &PromptContext, context: &ContextMap) -> Vec<String> {
    let mut refs: Vec<String> = base.files.iter().map(|f| format!("file:{}", f.path)).collect();
    if base.git_summary.is_some() {
        refs.push("git:summary".to_string());
    }
    if let Some(active) = &base.active_file {
        let first = active.lines().next().unwrap_or_default();
        let path = first.split_once(':').map_or(first, |(path, _)| path).trim();
        refs.push(format!("active:{}", path));
    }
    refs.extend(
        context
            .keys()
            .filter(|k| !RESERVED_CONTEXT_KEYS.contains(&k.as_str()))
            .map(|k| format!("ctx:{}", k)),
    );
    refs
}

#[async_trait]
impl AgentCaller for PromptedAgentCaller {
    async fn call(
        &self,
        agent: &str,
        brief: &str,
        context: &ContextMap,
    ) -> Result<AgentReply, AgentCallError> {
        let profile = self.profile(agent)?;
        let ir = self.build_ir(&profile, brief, context)?;

        // ==================== IR Pipeline ====================
        let outcome = self.pipeline.process(ir);
        if !outcome.approved {
            warn!("Instruction for {} denied by policy", agent);
            return Err(AgentCallError::GovernanceDenied {
                agent: agent.to_string(),
                violations: outcome.violations,
            });
        }
        let ir = outcome.ir;

        // ==================== Compile ====================
        let provider = self.providers.resolve(profile.provider.as_deref())?;
        let compiled = self
            .compiler
            .compile(
                &ir.role,
                &ir.intent,
                &self.prompt_context(&ir, context),
                provider.name(),
                ir.token_budget,
            )
            .map_err(AgentCallError::Compilation)?;
        self.events.log(RunEvent::new(
            "prompt_compiled",
            json!({
                "agent": agent,
                "ir_id": ir.id,
                "role": compiled.role,
                "provider": compiled.provider,
                "dialect": compiled.dialect,
                "estimated_tokens": compiled.estimated_tokens,
                "original_tokens": compiled.original_tokens,
                "token_budget": compiled.token_budget,
                "compressed": compiled.compressed,
                "transformations": outcome.transformations.len(),
            }),
        ));

        // ==================== Generate ====================
        debug!("Calling provider {} for {}", provider.name(), agent);
        let generation = provider
            .generate(GenerationRequest {
                prompt: compiled.text.clone(),
                model: ir.model_hint.clone(),
                temperature: ir.temperature,
                max_tokens: ir.token_budget,
            })
            .await?;

        // ==================== Parse & Validate ====================
        let parsed = parse_structured_output(&generation.text);
        let report = self
            .validator
            .validate(&parsed.payload, &compiled.output_schema, None);

        let schema_ok = report.is_valid();
        let confidence = if schema_ok {
            parsed.confidence
        } else {
            parsed.confidence.min(SCHEMA_VIOLATION_CONFIDENCE_CAP)
        };
        info!(
            "{} responded (confidence {:.2}, schema {:?})",
            agent, confidence, report.result
        );

        let mut response = AgentResponse::new(agent, ir.role.clone(), parsed.payload, confidence)
            .with_flags(parsed.risk_flags)
            .with_metadata("rationale", parsed.rationale)
            .with_metadata("ir_id", ir.id.clone())
            .with_metadata("provider", compiled.provider.clone())
            .with_metadata("token_budget", compiled.token_budget)
            .with_metadata("prompt_tokens", compiled.estimated_tokens)
            .with_metadata("compressed", compiled.compressed)
            .with_metadata("usage", json!(generation.usage))
            .with_metadata("validation", json!(report.result));

        if !schema_ok {
            response = response
                .with_flag(SCHEMA_VIOLATION_FLAG)
                .with_metadata("validation_errors", json!(report.errors));
        }
        if !report.warnings.is_empty() {
            response = response.with_metadata("validation_warnings", json!(report.warnings));
        }
        if report.result == ValidationStatus::Valid
            && let Some(repaired) = report.repaired_output
        {
            response = response.with_metadata("repaired_payload", repaired);
        }
        if !outcome.violations.is_empty() {
            response = response
                .with_flag(POLICY_FLAG)
                .with_metadata("policy_violations", json!(outcome.violations));
        }

        Ok(AgentReply::Response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_provider::{Generation, ModelProvider, ProviderError, TokenUsage};
    use concord_domain::{PolicyAction, PolicyRule, PolicyRuleChecker, PolicyRuleType};
    use std::sync::Mutex;

    // ==================== Test Collaborators ====================

    /// Returns a canned reply and keeps every request it saw.
    struct CannedProvider {
        reply: String,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> GenerationRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ModelProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
            self.requests.lock().unwrap().push(request);
            Ok(Generation {
                text: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                },
            })
        }
    }

    fn caller_with(provider: Arc<CannedProvider>, pipeline: PromptIRPipeline) -> PromptedAgentCaller {
        PromptedAgentCaller::new(
            Arc::new(pipeline),
            Arc::new(PromptCompiler::default()),
            ProviderRegistry::new().register(provider),
        )
    }

    fn phase_context(phase_type: &str) -> ContextMap {
        ContextMap::from([
            ("task".to_string(), json!("Implement X")),
            ("phase".to_string(), json!("Implementation")),
            ("phase_type".to_string(), json!(phase_type)),
        ])
    }

    async fn respond(caller: &PromptedAgentCaller, agent: &str, context: &ContextMap) -> AgentResponse {
        caller
            .call(agent, "Implement X", context)
            .await
            .unwrap()
            .into_response(agent)
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_valid_reply_passes_through() {
        let provider = CannedProvider::new(
            "PAYLOAD: {\"summary\": \"added\", \"changes\": [\"src/x.rs\"]}\nCONFIDENCE: 0.9\nRISK_FLAGS: none\nRATIONALE: simple",
        );
        let caller = caller_with(provider.clone(), PromptIRPipeline::standard(10));

        let response = respond(&caller, "implementer", &phase_context("implementation")).await;

        assert_eq!(response.role, "implementer");
        assert_eq!(response.confidence, 0.9);
        assert!(response.risk_flags.is_empty());
        assert_eq!(response.metadata["validation"], "VALID");
        assert_eq!(response.metadata["usage"]["prompt_tokens"], 10);

        let request = provider.last_request();
        assert!(request.prompt.contains("# Role: implementer"));
        assert_eq!(request.max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_budget_follows_phase_type() {
        let provider = CannedProvider::new("PAYLOAD: {\"steps\": []}\nCONFIDENCE: 0.9");
        let caller = caller_with(provider.clone(), PromptIRPipeline::standard(10));

        respond(&caller, "planner", &phase_context("planning")).await;
        assert_eq!(provider.last_request().max_tokens, 4800);

        respond(&caller, "planner", &phase_context("review")).await;
        assert_eq!(provider.last_request().max_tokens, 3200);
    }

    #[tokio::test]
    async fn test_schema_violation_caps_confidence() {
        let provider = CannedProvider::new(
            "PAYLOAD: {\"summary\": 3}\nCONFIDENCE: 0.95\nRISK_FLAGS: none",
        );
        let caller = caller_with(provider, PromptIRPipeline::standard(10));

        let response = respond(&caller, "implementer", &phase_context("implementation")).await;

        assert_eq!(response.confidence, SCHEMA_VIOLATION_CONFIDENCE_CAP);
        assert!(response.risk_flags.contains(SCHEMA_VIOLATION_FLAG));
        assert_eq!(response.metadata["validation"], "INVALID");
        let errors = response.metadata["validation_errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e.as_str().unwrap().contains("changes")));
    }

    #[tokio::test]
    async fn test_repaired_payload_is_kept() {
        let provider = CannedProvider::new(
            "PAYLOAD: {'approved': true, 'issues': [],}\nCONFIDENCE: 0.88",
        );
        let caller = caller_with(provider, PromptIRPipeline::standard(10));

        let response = respond(&caller, "reviewer", &phase_context("review")).await;

        assert_eq!(response.confidence, 0.88);
        assert_eq!(
            response.metadata["repaired_payload"],
            r#"{"approved":true,"issues":[]}"#
        );
        assert_eq!(response.metadata["validation_warnings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_policy_denial_is_an_error() {
        let provider = CannedProvider::new("PAYLOAD: x");
        let checker = PolicyRuleChecker::new(vec![
            PolicyRule::new("secrets", PolicyRuleType::ContextRef, ["ctx:credentials"], PolicyAction::Deny)
                .unwrap(),
        ]);
        let caller = caller_with(
            provider.clone(),
            PromptIRPipeline::standard(10).with_governance(checker),
        );

        let mut context = phase_context("implementation");
        context.insert("credentials".to_string(), json!("hunter2"));
        let err = caller.call("implementer", "Implement X", &context).await.unwrap_err();

        assert!(matches!(err, AgentCallError::GovernanceDenied { .. }));
        assert!(err.to_string().contains("secrets"));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flagged_policy_is_surfaced() {
        let provider = CannedProvider::new("PAYLOAD: {\"steps\": [\"a\"]}\nCONFIDENCE: 0.9");
        let checker = PolicyRuleChecker::new(vec![
            PolicyRule::new("hurry", PolicyRuleType::Intent, ["implement"], PolicyAction::Flag)
                .unwrap(),
        ]);
        let caller = caller_with(provider, PromptIRPipeline::standard(10).with_governance(checker));

        let response = respond(&caller, "planner", &phase_context("planning")).await;
        assert!(response.risk_flags.contains(POLICY_FLAG));
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let caller = caller_with(CannedProvider::new("x"), PromptIRPipeline::new());
        let err = caller
            .call("ghost", "boo", &ContextMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentCallError::UnknownAgent(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_profile_maps_agent_to_role_and_provider() {
        let provider = CannedProvider::new("PAYLOAD: ## Findings\nx\n## Sources\ny\nCONFIDENCE: 0.9");
        let caller = caller_with(provider.clone(), PromptIRPipeline::new()).with_profile(
            AgentProfile::for_role("scout")
                .with_role("researcher")
                .with_provider("canned")
                .with_model("small-model")
                .with_temperature(0.2),
        );

        let response = respond(&caller, "scout", &phase_context("research")).await;
        assert_eq!(response.agent, "scout");
        assert_eq!(response.role, "researcher");
        assert_eq!(response.metadata["validation"], "VALID");

        let request = provider.last_request();
        assert_eq!(request.model.as_deref(), Some("small-model"));
        assert_eq!(request.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_missing_provider() {
        let caller = caller_with(CannedProvider::new("x"), PromptIRPipeline::new())
            .with_profile(AgentProfile::for_role("implementer").with_provider("nowhere"));
        let err = caller
            .call("implementer", "x", &ContextMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentCallError::Provider(ProviderError::NotRegistered(_))));
    }

    #[tokio::test]
    async fn test_digested_context_reaches_the_prompt() {
        let provider = CannedProvider::new("PAYLOAD: {\"summary\": \"x\", \"changes\": []}\nCONFIDENCE: 0.9");
        let caller = caller_with(provider.clone(), PromptIRPipeline::standard(10));

        let mut context = phase_context("implementation");
        for i in 0..15 {
            context.insert(format!("note_{:02}", i), json!(format!("detail number {}", i)));
        }
        let response = respond(&caller, "implementer", &context).await;

        let prompt = provider.last_request().prompt;
        assert!(prompt.contains("- context_digest: 15 context references (ctx: 15)"));
        assert!(!prompt.contains("detail number"));
        assert!(!prompt.contains("note_00"));
        assert_eq!(response.metadata["validation"], "VALID");
    }

    #[tokio::test]
    async fn test_context_within_threshold_is_passed_through() {
        let provider = CannedProvider::new("PAYLOAD: {\"summary\": \"x\", \"changes\": []}\nCONFIDENCE: 0.9");
        let caller = caller_with(provider.clone(), PromptIRPipeline::standard(10))
            .with_base_context(PromptContext::new().with_file("src/lib.rs", "pub fn lib() {}"));

        let mut context = phase_context("implementation");
        context.insert("ticket".to_string(), json!("T-42"));
        respond(&caller, "implementer", &context).await;

        let prompt = provider.last_request().prompt;
        assert!(prompt.contains("- ticket: T-42"));
        assert!(prompt.contains("pub fn lib() {}"));
        assert!(!prompt.contains("context_digest"));
    }

    #[test]
    fn test_context_refs() {
        let base = PromptContext::new()
            .with_file("src/lib.rs", "x")
            .with_git_summary("main")
            .with_active_file("src/main.rs: fn main");
        let context = ContextMap::from([
            ("phase".to_string(), json!("Build")),
            ("ticket".to_string(), json!("T-1")),
        ]);
        assert_eq!(
            context_refs(&base, &context),
            vec!["file:src/lib.rs", "git:summary", "active:src/main.rs", "ctx:ticket"]
        );
    }
}
