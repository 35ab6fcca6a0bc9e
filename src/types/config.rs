use crate::error::ImpactError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_JUDGE_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_JUDGE_MODEL: &str = "deepseek-chat";
pub const DEFAULT_JUDGE_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_OUTPUT_FILE: &str = "impact_data.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImpactConfig {
    pub source: Option<SourceConfig>,
    pub run: Option<RunConfig>,
    pub judge: Option<JudgeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    pub repo: Option<String>,
    pub api_base_url: Option<String>,
    pub token_env: Option<String>,
    pub page_size: Option<u32>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    pub lookback_days: Option<u32>,
    pub item_cap: Option<usize>,
    pub reviews_per_pull: Option<usize>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JudgeConfig {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub candidates: Option<usize>,
    pub samples_per_candidate: Option<usize>,
}

/// Collection settings with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub lookback_days: u32,
    pub item_cap: usize,
    pub reviews_per_pull: usize,
    pub output: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            item_cap: 300,
            reviews_per_pull: 5,
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub repo: Option<String>,
    pub api_base_url: String,
    pub token_env: String,
    pub page_size: u32,
    pub max_retries: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            repo: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            page_size: 100,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub candidates: usize,
    pub samples_per_candidate: usize,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_JUDGE_BASE_URL.to_string(),
            model: DEFAULT_JUDGE_MODEL.to_string(),
            api_key_env: DEFAULT_JUDGE_KEY_ENV.to_string(),
            timeout: Duration::from_secs(60),
            concurrency: 4,
            candidates: 15,
            samples_per_candidate: 10,
        }
    }
}

impl ImpactConfig {
    pub fn run_settings(&self) -> RunSettings {
        let defaults = RunSettings::default();
        match &self.run {
            Some(run) => RunSettings {
                lookback_days: run.lookback_days.unwrap_or(defaults.lookback_days),
                item_cap: run.item_cap.unwrap_or(defaults.item_cap),
                reviews_per_pull: run.reviews_per_pull.unwrap_or(defaults.reviews_per_pull),
                output: run.output.clone().unwrap_or(defaults.output),
            },
            None => defaults,
        }
    }

    pub fn source_settings(&self) -> SourceSettings {
        let defaults = SourceSettings::default();
        match &self.source {
            Some(source) => SourceSettings {
                repo: source.repo.clone(),
                api_base_url: source
                    .api_base_url
                    .clone()
                    .unwrap_or(defaults.api_base_url),
                token_env: source.token_env.clone().unwrap_or(defaults.token_env),
                page_size: source.page_size.unwrap_or(defaults.page_size),
                max_retries: source.max_retries.unwrap_or(defaults.max_retries),
            },
            None => defaults,
        }
    }

    pub fn judge_settings(&self) -> JudgeSettings {
        let defaults = JudgeSettings::default();
        match &self.judge {
            Some(judge) => JudgeSettings {
                enabled: judge.enabled.unwrap_or(defaults.enabled),
                base_url: judge.base_url.clone().unwrap_or(defaults.base_url),
                model: judge.model.clone().unwrap_or(defaults.model),
                api_key_env: judge.api_key_env.clone().unwrap_or(defaults.api_key_env),
                timeout: judge
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                concurrency: judge.concurrency.unwrap_or(defaults.concurrency),
                candidates: judge.candidates.unwrap_or(defaults.candidates),
                samples_per_candidate: judge
                    .samples_per_candidate
                    .unwrap_or(defaults.samples_per_candidate),
            },
            None => defaults,
        }
    }

    pub fn validate(&self) -> Result<(), ImpactError> {
        let run = self.run_settings();
        if run.lookback_days == 0 {
            return Err(ImpactError::ConfigParse(
                "run.lookback_days must be greater than 0".to_string(),
            ));
        }
        if run.item_cap == 0 {
            return Err(ImpactError::ConfigParse(
                "run.item_cap must be greater than 0".to_string(),
            ));
        }

        let source = self.source_settings();
        if let Some(repo) = &source.repo {
            validate_repo_name(repo)?;
        }
        if !(1..=100).contains(&source.page_size) {
            return Err(ImpactError::ConfigParse(
                "source.page_size must be between 1 and 100".to_string(),
            ));
        }

        let judge = self.judge_settings();
        if judge.concurrency == 0 {
            return Err(ImpactError::ConfigParse(
                "judge.concurrency must be greater than 0".to_string(),
            ));
        }
        if judge.timeout.is_zero() {
            return Err(ImpactError::ConfigParse(
                "judge.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn validate_repo_name(repo: &str) -> Result<(), ImpactError> {
    match repo.split_once('/') {
        Some((owner, name))
            if !owner.trim().is_empty() && !name.trim().is_empty() && !name.contains('/') =>
        {
            Ok(())
        }
        _ => Err(ImpactError::InvalidRepo(repo.to_string())),
    }
}
