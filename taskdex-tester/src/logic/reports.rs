use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;

fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    #[allow(clippy::cast_precision_loss)]
    let rate = (passed as f64 / results.len() as f64) * 100.0;
    rate
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Session Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "================================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total runs: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, results)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
) -> Result<()> {
    writeln!(out, "# TaskDex Session Test Results\n")?;
    writeln!(out, "_Generated {}_\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total runs**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {}", total_tests - passed_tests)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "### {} {} (seed {})\n",
            status, result.scenario_name, result.seed
        )?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1337,
            passed,
            iterations_run: 2,
            successful_iterations: if passed { 2 } else { 1 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 2 (seed 1338): boom".to_string()]
            },
            average_duration: Duration::from_millis(3),
            performance_data: vec![Duration::from_millis(3)],
        }
    }

    #[test]
    fn markdown_lists_failures() {
        let mut buf = Vec::new();
        generate_markdown_report(&mut buf, &[sample(true), sample(false)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# TaskDex Session Test Results"));
        assert!(text.contains("- **Failed**: 1"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn console_report_summarises_rate() {
        let mut buf = Vec::new();
        generate_console_report(&mut buf, &[sample(true), sample(false)], Duration::ZERO)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("Performance Summary"));
    }

    #[test]
    fn json_report_is_an_array() {
        let mut buf = Vec::new();
        generate_json_report(&mut buf, &[sample(true)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["scenario_name"], "smoke");
        assert_eq!(value[0]["seed"], 1337);
    }
}
