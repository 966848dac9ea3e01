use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use vantage_dispatch::DispatchService;
use vantage_models::outlook::OUTLOOK_SCHEMA_VERSION;
use vantage_models::{AgentIdentity, AggregateOutlook, DomainReport, Narrative, RiskLevel};

use crate::parser::split_narrative;
use crate::slim::chief_payload;

/// Mean of the domains' risk contributions; 0.5 when none has data.
pub fn overall_risk(domains: &[DomainReport]) -> f64 {
    let risks: Vec<f64> = domains
        .iter()
        .filter_map(|d| d.summary.risk_contribution())
        .collect();
    if risks.is_empty() {
        return 0.5;
    }
    risks.iter().sum::<f64>() / risks.len() as f64
}

/// Folds the domain reports into the final outlook with one LLM call.
pub struct ChiefAggregator {
    narrator: Option<Arc<DispatchService>>,
    prompt_budget_bytes: usize,
}

impl ChiefAggregator {
    pub fn new(prompt_budget_bytes: usize) -> Self {
        Self {
            narrator: None,
            prompt_budget_bytes,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<DispatchService>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Build the outlook. Narration failures end up in the summaries; this
    /// never fails.
    pub async fn aggregate(
        &self,
        horizon: &str,
        domains: Vec<DomainReport>,
        started: Instant,
    ) -> AggregateOutlook {
        let composite_risk_score = overall_risk(&domains);
        let risk_level = RiskLevel::from_score(composite_risk_score);

        let narrative = self
            .narrate(&domains, horizon, composite_risk_score, risk_level)
            .await;

        let outlook = AggregateOutlook {
            id: Uuid::new_v4(),
            schema_version: OUTLOOK_SCHEMA_VERSION,
            generated_at: Utc::now(),
            horizon: horizon.to_string(),
            composite_risk_score,
            risk_level,
            domains,
            llm_technical_summary: narrative.technical,
            llm_plain_summary: narrative.plain,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            id = %outlook.id,
            composite_risk_score,
            risk_level = risk_level.as_str(),
            elapsed_ms = outlook.processing_time_ms,
            "Outlook aggregated"
        );
        outlook
    }

    async fn narrate(
        &self,
        domains: &[DomainReport],
        horizon: &str,
        score: f64,
        level: RiskLevel,
    ) -> Narrative {
        let Some(narrator) = self
            .narrator
            .as_ref()
            .filter(|n| n.can_serve(AgentIdentity::Chief))
        else {
            return Narrative::unavailable();
        };

        let payload = match chief_payload(domains, horizon, score, level, self.prompt_budget_bytes) {
            Ok(payload) => payload,
            Err(e) => return Narrative::llm_error(e),
        };

        let vars = BTreeMap::from([
            ("horizon".to_string(), horizon.to_string()),
            ("risk_level".to_string(), level.as_str().to_string()),
        ]);

        match narrator.dispatch_as(AgentIdentity::Chief, &payload, &vars).await {
            Ok(text) => split_narrative(&text),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Chief narration failed");
                Narrative::llm_error(e)
            }
        }
    }
}
