use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::{Scenario, ScenarioCtx, TickMode};
use taskdex_game::EngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// Runs scenarios against the engine across seeds and iterations.
pub struct SessionTester {
    config: EngineConfig,
    tick: TickMode,
    verbose: bool,
}

impl SessionTester {
    #[must_use]
    pub const fn new(config: EngineConfig, tick: TickMode, verbose: bool) -> Self {
        Self {
            config,
            tick,
            verbose,
        }
    }

    pub async fn run_scenario(
        &self,
        scenario: &dyn Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.name().bright_white()
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations).await);
        }
        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &dyn Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let ctx = ScenarioCtx {
                seed: iteration_seed,
                config: self.config.clone(),
                tick: self.tick,
                verbose: self.verbose,
            };
            log::debug!(
                "{} iteration {}/{iterations} with seed {iteration_seed}",
                scenario.name(),
                i + 1
            );
            let start_time = Instant::now();
            match scenario.run(&ctx).await {
                Ok(()) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{iterations} passed ({duration:?})",
                            i + 1
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    log::warn!("{} failed: {message}", scenario.name());
                    if self.verbose {
                        println!("  ❌ {}", message.clone().red());
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scenario::get_scenario;

    fn tester() -> SessionTester {
        SessionTester::new(EngineConfig::default_config(), TickMode::Virtual, false)
    }

    #[tokio::test]
    async fn every_scenario_passes_on_the_default_config() {
        let tester = tester();
        for (name, _) in crate::common::scenario::list_scenarios() {
            let scenario = get_scenario(name).expect("listed scenario");
            let results = tester.run_scenario(scenario.as_ref(), &[1337, 7], 2).await;
            for result in results {
                assert!(
                    result.passed,
                    "{name} seed {} failed: {:?}",
                    result.seed, result.failures
                );
                assert_eq!(result.successful_iterations, 2);
            }
        }
    }

    struct RejectsOddSeeds;

    #[async_trait::async_trait]
    impl Scenario for RejectsOddSeeds {
        fn name(&self) -> &'static str {
            "rejects-odd-seeds"
        }

        fn description(&self) -> &'static str {
            "Fails whenever the iteration seed is odd"
        }

        async fn run(&self, ctx: &ScenarioCtx) -> anyhow::Result<()> {
            anyhow::ensure!(ctx.seed % 2 == 0, "odd seed {}", ctx.seed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_iterations_are_recorded_with_their_seed() {
        let results = tester().run_scenario(&RejectsOddSeeds, &[10], 3).await;
        let result = &results[0];
        assert!(!result.passed);
        assert_eq!(result.successful_iterations, 2);
        assert_eq!(result.performance_data.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].contains("seed 11"));
        assert!(result.failures[0].contains("odd seed 11"));
    }

    #[test]
    fn result_durations_serialize_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["average_duration"], 12);
        assert_eq!(json["performance_data"][0], 12);
    }
}
