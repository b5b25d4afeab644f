//! Dataset quality metrics.
//!
//! [`DatasetReport`] distills a stage artifact into the numbers worth
//! looking at: coverage across topics and difficulties, answer spread,
//! solution and improvement rates, and how many answers were fabricated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::records::ProblemRecord;

/// Width of one answer-distribution bucket.
const ANSWER_BUCKET_WIDTH: i64 = 100;
/// Number of answer buckets covering 0-999.
const ANSWER_BUCKETS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub with_solution: usize,
    pub verified_solutions: usize,
    pub improved: usize,
    pub fabricated_answers: usize,
    /// Problems per topic, keyed by topic display name.
    pub topic_counts: BTreeMap<String, usize>,
    pub difficulty_counts: BTreeMap<i64, usize>,
    /// Answers bucketed in ranges of 100 (0-99, 100-199, ...).
    pub answer_buckets: [usize; ANSWER_BUCKETS],
    /// Mean quality score over records that have one.
    pub mean_quality_score: Option<f64>,
    pub solution_rate: f64,
    pub improvement_rate: f64,
}

impl DatasetReport {
    pub fn compute(records: &[ProblemRecord]) -> Self {
        let total = records.len();
        let mut with_solution = 0;
        let mut verified_solutions = 0;
        let mut improved = 0;
        let mut fabricated_answers = 0;
        let mut topic_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut difficulty_counts: BTreeMap<i64, usize> = BTreeMap::new();
        let mut answer_buckets = [0usize; ANSWER_BUCKETS];
        let mut score_sum = 0.0;
        let mut score_count = 0usize;

        for record in records {
            if record.has_solution == Some(true) {
                with_solution += 1;
            }
            if record
                .solution
                .as_ref()
                .is_some_and(|solution| solution.verified)
            {
                verified_solutions += 1;
            }
            if record.improved == Some(true) {
                improved += 1;
            }
            if record.fabricated_answer {
                fabricated_answers += 1;
            }

            *topic_counts.entry(record.topic.name().to_string()).or_default() += 1;
            *difficulty_counts.entry(record.difficulty).or_default() += 1;

            if record.answer_in_range() {
                let bucket = (record.answer / ANSWER_BUCKET_WIDTH) as usize;
                answer_buckets[bucket.min(ANSWER_BUCKETS - 1)] += 1;
            }

            if let Some(score) = record.quality_score {
                score_sum += score;
                score_count += 1;
            }
        }

        let rate = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };

        Self {
            generated_at: Utc::now(),
            total,
            with_solution,
            verified_solutions,
            improved,
            fabricated_answers,
            topic_counts,
            difficulty_counts,
            answer_buckets,
            mean_quality_score: (score_count > 0).then(|| score_sum / score_count as f64),
            solution_rate: rate(with_solution),
            improvement_rate: rate(improved),
        }
    }

    /// Human-readable summary, one line per metric.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("total problems:     {}\n", self.total));
        out.push_str(&format!(
            "with solution:      {} ({:.1}%)\n",
            self.with_solution,
            self.solution_rate * 100.0
        ));
        out.push_str(&format!("verified solutions: {}\n", self.verified_solutions));
        out.push_str(&format!(
            "improved:           {} ({:.1}%)\n",
            self.improved,
            self.improvement_rate * 100.0
        ));
        out.push_str(&format!("fabricated answers: {}\n", self.fabricated_answers));
        if let Some(score) = self.mean_quality_score {
            out.push_str(&format!("mean quality score: {score:.3}\n"));
        }
        out.push_str("topics:\n");
        for (topic, count) in &self.topic_counts {
            out.push_str(&format!("  {topic}: {count}\n"));
        }
        out.push_str("difficulties:\n");
        for (difficulty, count) in &self.difficulty_counts {
            out.push_str(&format!("  {difficulty}: {count}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{SolutionMethod, SolutionRecord, Topic};
    use serde_json::Value;

    fn records() -> Vec<ProblemRecord> {
        let mut a = ProblemRecord::new("gen_1", "Problem one with enough text", 50, Topic::Algebra, 6);
        a.has_solution = Some(true);
        a.solution = Some(SolutionRecord {
            method: SolutionMethod::CotMcts,
            steps: Vec::new(),
            final_answer: Value::from(50),
            verified: true,
            error: None,
        });
        a.improved = Some(true);
        a.quality_score = Some(0.8);

        let mut b = ProblemRecord::new("div_1", "Problem two with enough text", 950, Topic::Geometry, 7)
            .with_fabricated_answer();
        b.has_solution = Some(false);
        b.improved = Some(true);
        b.quality_score = Some(0.6);

        let c = ProblemRecord::new("div_2", "Problem three with enough text", 150, Topic::Algebra, 7);

        vec![a, b, c]
    }

    #[test]
    fn test_report_counts() {
        let report = DatasetReport::compute(&records());

        assert_eq!(report.total, 3);
        assert_eq!(report.with_solution, 1);
        assert_eq!(report.verified_solutions, 1);
        assert_eq!(report.improved, 2);
        assert_eq!(report.fabricated_answers, 1);
        assert_eq!(report.topic_counts["Algebra"], 2);
        assert_eq!(report.topic_counts["Geometry"], 1);
        assert_eq!(report.difficulty_counts[&7], 2);
    }

    #[test]
    fn test_answer_buckets() {
        let report = DatasetReport::compute(&records());
        assert_eq!(report.answer_buckets[0], 1); // 50
        assert_eq!(report.answer_buckets[1], 1); // 150
        assert_eq!(report.answer_buckets[9], 1); // 950
    }

    #[test]
    fn test_mean_quality_score() {
        let report = DatasetReport::compute(&records());
        let mean = report.mean_quality_score.expect("mean");
        assert!((mean - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset() {
        let report = DatasetReport::compute(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.solution_rate, 0.0);
        assert!(report.mean_quality_score.is_none());
    }

    #[test]
    fn test_render_mentions_totals() {
        let rendered = DatasetReport::compute(&records()).render();
        assert!(rendered.contains("total problems:     3"));
        assert!(rendered.contains("Algebra: 2"));
    }
}
