use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the review pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewPipelineConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Enqueue priority heuristic
    pub queue: QueueConfig,
    /// Assignment engine weights and defaults
    pub assignment: AssignmentConfig,
    /// Revision workflow limits
    pub revision: RevisionConfig,
    /// Performance tracker weights and windows
    pub tracker: TrackerConfig,
    /// Batch coordinator sweep settings
    pub sweep: SweepConfig,
    /// Bulk operator override trust gate
    pub operator_override: OverrideConfig,
    /// Reviewer directory cache settings
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level directive applied when RUST_LOG is unset
    pub log_level: String,
    /// Emit logs as JSON instead of plain text
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Priority score added per hour a submission has waited
    pub age_boost_per_hour: f64,
    /// Priority score added per queued submission in the same category
    pub backlog_factor: f64,
    /// Upper bound on the backlog contribution
    pub backlog_ceiling: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignmentConfig {
    /// Weight of 1 − workload_current/workload_cap
    pub workload_weight: f64,
    /// Weight of the category preference match bonus
    pub category_weight: f64,
    /// Weight of the rolling performance score
    pub performance_weight: f64,
    /// Workload cap applied to newly granted reviewer profiles
    pub default_workload_cap: u32,
    /// Speed-metric percentile gating the urgent pool (0.75 = top quartile)
    pub urgent_speed_percentile: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevisionConfig {
    /// Revisions permitted before escalation to the senior-only queue
    pub max_revisions: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// EWMA half-life, in decisions
    pub half_life_decisions: u32,
    /// Trailing window for approval rate, volume, and consistency, in days
    pub window_days: i64,
    /// Decision count in the window that saturates the volume term
    pub volume_target: u32,
    pub speed_weight: f64,
    pub approval_weight: f64,
    pub volume_weight: f64,
    pub consistency_weight: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Seconds between periodic sweeps
    pub interval_seconds: u64,
    /// Assignments older than this are force-reassigned
    pub stale_after_hours: i64,
    /// Queued submissions older than this are surfaced for operator attention
    pub escalate_after_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverrideConfig {
    /// Minimum performance score on the operator's own profile
    pub min_performance_score: f64,
    /// Minimum resolved decisions in the operator's trailing window
    pub min_window_decisions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// TTL for cached capability profiles, in seconds
    pub capability_ttl_seconds: u64,
    /// Maximum cached capability entries
    pub max_cached_profiles: u64,
}

impl Default for ReviewPipelineConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            queue: QueueConfig {
                age_boost_per_hour: 0.01,
                backlog_factor: 0.05,
                backlog_ceiling: 1.0,
            },
            assignment: AssignmentConfig {
                workload_weight: 0.4,
                category_weight: 0.3,
                performance_weight: 0.3,
                default_workload_cap: 5,
                urgent_speed_percentile: 0.75,
            },
            revision: RevisionConfig { max_revisions: 3 },
            tracker: TrackerConfig {
                half_life_decisions: 20,
                window_days: 30,
                volume_target: 30,
                speed_weight: 0.35,
                approval_weight: 0.25,
                volume_weight: 0.20,
                consistency_weight: 0.20,
            },
            sweep: SweepConfig {
                interval_seconds: 300,
                stale_after_hours: 48,
                escalate_after_hours: 72,
            },
            operator_override: OverrideConfig {
                min_performance_score: 0.6,
                min_window_decisions: 10,
            },
            directory: DirectoryConfig {
                capability_ttl_seconds: 300,
                max_cached_profiles: 10_000,
            },
        }
    }
}

impl ReviewPipelineConfig {
    /// Load configuration with the following precedence:
    /// 1. Default values
    /// 2. Configuration file (review-pipeline.toml)
    /// 3. Environment variables (prefixed with REVIEW_PIPELINE_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("review-pipeline.toml").exists() {
            builder = builder.add_source(File::with_name("review-pipeline"));
        }

        builder = builder.add_source(
            Environment::with_prefix("REVIEW_PIPELINE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ReviewPipelineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ReviewPipelineConfig::load_env_file();
        ReviewPipelineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ReviewPipelineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
