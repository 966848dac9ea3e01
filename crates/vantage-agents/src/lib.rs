pub mod aggregate;
pub mod analyzer;
pub mod chief;
pub mod error;
pub mod indicators;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod slim;
pub mod source;

pub mod test_support;

pub use analyzer::{AnalyzerSettings, DomainAnalyzer, SignalAnalyzer};
pub use chief::{overall_risk, ChiefAggregator};
pub use error::AgentError;
pub use indicators::{IndicatorEngine, StandardIndicators};
pub use orchestrator::Orchestrator;
pub use parser::split_narrative;
pub use prompts::default_template;
pub use source::{SeriesSource, StaticSeries};
