//! Accuracy reports over stored validation results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utilities::printer::{Printer, PrinterColor};
use crate::validation::storage::ValidationResult;

const LOW_OVERALL_ACCURACY: f64 = 0.7;
const LOW_TOPIC_ACCURACY: f64 = 0.6;
const MIN_VALIDATIONS: usize = 10;
const RANKED_SCENARIOS: usize = 3;

/// Accuracy summary over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub report_id: String,
    /// First and last result dates (YYYY-MM-DD).
    pub time_period: (String, String),
    pub total_validations: usize,
    pub overall_accuracy: f64,
    pub accuracy_by_topic: BTreeMap<String, f64>,
    pub accuracy_by_demographic: BTreeMap<String, f64>,
    /// Mean accuracy per day, oldest first.
    pub accuracy_trend: Vec<(String, f64)>,
    pub best_performing_scenarios: Vec<String>,
    pub worst_performing_scenarios: Vec<String>,
    pub improvement_recommendations: Vec<String>,
    pub report_timestamp: DateTime<Utc>,
}

impl AccuracyReport {
    /// Report for a period without results.
    pub fn empty(now: DateTime<Utc>) -> Self {
        let today = now.format("%Y-%m-%d").to_string();
        Self {
            report_id: format!("empty_report_{}", now.format("%Y%m%d")),
            time_period: (today.clone(), today),
            total_validations: 0,
            overall_accuracy: 0.0,
            accuracy_by_topic: BTreeMap::new(),
            accuracy_by_demographic: BTreeMap::new(),
            accuracy_trend: Vec::new(),
            best_performing_scenarios: Vec::new(),
            worst_performing_scenarios: Vec::new(),
            improvement_recommendations: Vec::new(),
            report_timestamp: now,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn grouped_means(pairs: impl Iterator<Item = (String, f64)>) -> BTreeMap<String, f64> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    groups.into_iter().map(|(k, v)| (k, mean(&v))).collect()
}

/// Summarize `results`.
pub fn build_accuracy_report(results: &[ValidationResult], now: DateTime<Utc>) -> AccuracyReport {
    if results.is_empty() {
        return AccuracyReport::empty(now);
    }

    let scores: Vec<f64> = results.iter().map(|r| r.accuracy_score).collect();
    let overall_accuracy = mean(&scores);

    let accuracy_by_topic =
        grouped_means(results.iter().map(|r| (r.topic.clone(), r.accuracy_score)));
    let accuracy_by_demographic = grouped_means(
        results
            .iter()
            .flat_map(|r| r.demographic_accuracy.iter().map(|(k, v)| (k.clone(), *v))),
    );
    let accuracy_trend: Vec<(String, f64)> = grouped_means(results.iter().map(|r| {
        (
            r.validation_timestamp.format("%Y-%m-%d").to_string(),
            r.accuracy_score,
        )
    }))
    .into_iter()
    .collect();

    let mut ranked: Vec<&ValidationResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.accuracy_score.total_cmp(&a.accuracy_score));
    let best_performing_scenarios = ranked
        .iter()
        .take(RANKED_SCENARIOS)
        .map(|r| r.scenario_id.clone())
        .collect();
    let worst_performing_scenarios = ranked[ranked.len().saturating_sub(RANKED_SCENARIOS)..]
        .iter()
        .map(|r| r.scenario_id.clone())
        .collect();

    let mut improvement_recommendations = Vec::new();
    if overall_accuracy < LOW_OVERALL_ACCURACY {
        improvement_recommendations.push(
            "Overall accuracy below 70% - consider improving persona behavioral modeling"
                .to_string(),
        );
    }
    if results.len() < MIN_VALIDATIONS {
        improvement_recommendations
            .push("Limited validation data - increase validation frequency".to_string());
    }
    let weak_topics: Vec<&str> = accuracy_by_topic
        .iter()
        .filter(|(_, accuracy)| **accuracy < LOW_TOPIC_ACCURACY)
        .map(|(topic, _)| topic.as_str())
        .collect();
    if !weak_topics.is_empty() {
        improvement_recommendations.push(format!(
            "Topics needing improvement: {}",
            weak_topics.join(", ")
        ));
    }

    let first = accuracy_trend.first().map(|(d, _)| d.clone()).unwrap_or_default();
    let last = accuracy_trend.last().map(|(d, _)| d.clone()).unwrap_or_default();

    AccuracyReport {
        report_id: format!("accuracy_report_{}", now.format("%Y%m%d_%H%M")),
        time_period: (first, last),
        total_validations: results.len(),
        overall_accuracy,
        accuracy_by_topic,
        accuracy_by_demographic,
        accuracy_trend,
        best_performing_scenarios,
        worst_performing_scenarios,
        improvement_recommendations,
        report_timestamp: now,
    }
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

pub fn print_validation_results(results: &[ValidationResult], printer: &Printer) {
    printer.print("VALIDATION RESULTS", PrinterColor::BoldCyan);
    printer.print(&"=".repeat(60), PrinterColor::Cyan);
    printer.print_field("Total validations", &results.len().to_string());
    if results.is_empty() {
        printer.print("No validation results to display", PrinterColor::Yellow);
        return;
    }

    let scores: Vec<f64> = results.iter().map(|r| r.accuracy_score).collect();
    let overall = mean(&scores);
    let lo = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    printer.print(
        &format!("Overall accuracy: {:.3}", overall),
        PrinterColor::for_score(overall),
    );
    printer.print_field("Accuracy range", &format!("{:.3} - {:.3}", lo, hi));

    printer.print("\nIndividual results:", PrinterColor::BoldWhite);
    for (i, r) in results.iter().take(5).enumerate() {
        printer.print(&format!("  {}. {}", i + 1, r.validation_id), PrinterColor::White);
        printer.print(
            &format!("     Accuracy: {:.3}", r.accuracy_score),
            PrinterColor::for_score(r.accuracy_score),
        );
        println!("     Largest error: {:.3}", r.error_analysis.largest_error);
    }
}

pub fn print_accuracy_report(report: &AccuracyReport, printer: &Printer) {
    printer.print("ACCURACY REPORT", PrinterColor::BoldCyan);
    printer.print(&"=".repeat(60), PrinterColor::Cyan);
    printer.print_field("Report ID", &report.report_id);
    printer.print_field(
        "Time period",
        &format!("{} to {}", report.time_period.0, report.time_period.1),
    );
    printer.print_field("Total validations", &report.total_validations.to_string());
    printer.print(
        &format!("Overall accuracy: {:.3}", report.overall_accuracy),
        PrinterColor::for_score(report.overall_accuracy),
    );

    if !report.accuracy_by_topic.is_empty() {
        printer.print("\nAccuracy by topic:", PrinterColor::BoldWhite);
        let mut topics: Vec<_> = report.accuracy_by_topic.iter().collect();
        topics.sort_by(|a, b| b.1.total_cmp(a.1));
        for (topic, accuracy) in topics {
            printer.print_bar(topic, *accuracy);
        }
    }

    if !report.accuracy_trend.is_empty() {
        printer.print("\nAccuracy trend (last 5 days):", PrinterColor::BoldWhite);
        let skip = report.accuracy_trend.len().saturating_sub(5);
        for (date, accuracy) in &report.accuracy_trend[skip..] {
            println!("  {}: {:.3}", date, accuracy);
        }
    }

    if !report.improvement_recommendations.is_empty() {
        printer.print("\nRecommendations:", PrinterColor::BoldYellow);
        for rec in &report.improvement_recommendations {
            println!("  - {}", rec);
        }
    }
}
