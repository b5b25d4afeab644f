//! Prompt templates and builders.
//!
//! Templates use `{placeholder}` markers filled by plain string replacement.
//! Every prompt that expects structured output spells out the exact JSON
//! shape, which is what makes the extraction ladder reliable in practice.

use crate::records::{AutoEvaluation, ProblemRecord, SolutionRecord, Topic};

/// System message for the problem generation agent.
pub const GENERATOR_SYSTEM: &str = "You are an expert at creating AIME (American Invitational \
Mathematics Examination) style problems. Output only valid JSON.";

/// System message for the diversification agent.
pub const DIVERSIFIER_SYSTEM: &str = r#"You are an expert at creating diverse AIME-style math problems.

Your task is to generate variations of existing problems while maintaining:
- AIME difficulty level (6-9 out of 15)
- Answer format (integer 0-999)
- Mathematical rigor and clarity
- Topic diversity

You can vary:
- Numbers and parameters
- Problem context and framing
- Mathematical approach
- Complexity level

Always ensure the problem is solvable and has a unique integer answer."#;

/// System message for the improvement (reasoning) agent.
pub const REASON_SYSTEM: &str = r#"You are an expert mathematician who improves AIME problems and solutions.

Your task is to:
1. Review the problem statement for clarity and correctness
2. Review the solution for completeness and accuracy
3. Suggest improvements to make them better

Focus on:
- Mathematical correctness
- Clarity of explanation
- Completeness of steps
- Elegance of solution

Provide specific, actionable improvements."#;

/// System message for the evaluation agent.
pub const EVALUATE_SYSTEM: &str = r#"You are a critical mathematics teacher who evaluates AIME problems and solutions.

Evaluate on these criteria (score 0.0-1.0):
1. Correctness: Is the mathematics correct?
2. Clarity: Is it easy to understand?
3. Completeness: Are all steps included?
4. Elegance: Is the solution elegant?

Be strict but fair. Provide detailed feedback."#;

const PROBLEM_GENERATION_TEMPLATE: &str = r#"You are an expert at creating AIME (American Invitational Mathematics Examination) style problems.

AIME problems have these characteristics:
- Difficulty level: 6-9 out of 15 (challenging but solvable)
- Answer: Always an integer from 0 to 999
- Topics: Number theory, algebra, geometry, combinatorics, probability
- Style: Clear, concise, elegant
- Requires: Creative thinking and multiple steps

Generate a {topic} problem suitable for AIME.

Requirements:
1. Problem statement should be clear and unambiguous
2. Answer must be an integer from 0 to 999
3. Problem should require 3-5 steps to solve
4. Difficulty level: {difficulty}/15

Format your response as JSON:
{
    "problem": "Problem statement here",
    "answer": 123,
    "topic": "{topic}",
    "difficulty": {difficulty},
    "tags": ["tag1", "tag2"]
}
"#;

const VARIATION_TEMPLATE: &str = r#"Generate a variation of this AIME problem:

Original: {problem}
Topic: {topic}
Difficulty: {difficulty}/15

Create a NEW problem with:
- Same topic and difficulty
- Different numbers/context
- Answer must be integer 0-999

Format as JSON:
{
    "problem": "...",
    "answer": 123,
    "topic": "{topic}",
    "difficulty": {difficulty}
}
"#;

const SOLUTION_TEMPLATE: &str = r#"Generate a detailed step-by-step solution for this AIME problem.

Problem: {problem}

Requirements:
1. Show all intermediate steps
2. Explain the reasoning for each step
3. Use proper mathematical notation
4. Final answer should be clearly marked

Format your response as JSON:
{
    "steps": [
        {"step": 1, "description": "...", "result": "..."},
        {"step": 2, "description": "...", "result": "..."}
    ],
    "final_answer": 123,
    "key_insights": ["insight1", "insight2"]
}
"#;

const EVALUATION_TEMPLATE: &str = r#"You are a highly critical mathematics teacher evaluating an AIME problem and its solution.

Problem: {problem}
Solution: {solution}
Answer: {answer}

Evaluate on these criteria (score 0.0-1.0):
1. Correctness: Is the solution mathematically correct?
2. Clarity: Is the solution easy to follow?
3. Completeness: Are all steps included?
4. Elegance: Is the solution elegant and efficient?

Format your response as JSON:
{
    "correctness": 0.9,
    "clarity": 0.8,
    "completeness": 0.9,
    "elegance": 0.7,
    "feedback": "Detailed feedback here",
    "suggestions": ["suggestion1", "suggestion2"]
}
"#;

const IMPROVEMENT_TEMPLATE: &str = r#"Review this AIME problem and suggest improvements:

Problem: {problem}
Solution: {solution}

Current scores:
- Correctness: {correctness}
- Clarity: {clarity}
- Completeness: {completeness}

Suggest specific improvements to increase these scores.
"#;

/// Prompt for generating one fresh problem.
pub fn problem_generation_prompt(topic: Topic, difficulty: i64) -> String {
    PROBLEM_GENERATION_TEMPLATE
        .replace("{topic}", topic.name())
        .replace("{difficulty}", &difficulty.to_string())
}

/// Prompt for generating a variation of an existing problem.
pub fn variation_prompt(record: &ProblemRecord) -> String {
    VARIATION_TEMPLATE
        .replace("{problem}", &record.problem)
        .replace("{topic}", record.topic.name())
        .replace("{difficulty}", &record.difficulty.to_string())
}

/// Prompt for producing a structured step-by-step solution.
pub fn solution_prompt(problem: &str) -> String {
    SOLUTION_TEMPLATE.replace("{problem}", problem)
}

fn solution_text(solution: Option<&SolutionRecord>) -> String {
    match solution {
        Some(solution) if !solution.steps.is_empty() => solution
            .steps
            .iter()
            .map(|step| step.description.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => "No solution".to_string(),
    }
}

/// Prompt for scoring a problem/solution pair.
pub fn evaluation_prompt(record: &ProblemRecord) -> String {
    EVALUATION_TEMPLATE
        .replace("{problem}", &record.problem)
        .replace("{solution}", &solution_text(record.solution.as_ref()))
        .replace("{answer}", &record.answer.to_string())
}

/// Prompt for generating improvement suggestions from the latest scores.
pub fn improvement_prompt(record: &ProblemRecord, evaluation: &AutoEvaluation) -> String {
    IMPROVEMENT_TEMPLATE
        .replace("{problem}", &record.problem)
        .replace("{solution}", &solution_text(record.solution.as_ref()))
        .replace("{correctness}", &format!("{:.2}", evaluation.correctness))
        .replace("{clarity}", &format!("{:.2}", evaluation.clarity))
        .replace("{completeness}", &format!("{:.2}", evaluation.completeness))
}
