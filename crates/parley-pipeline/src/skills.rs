//! Inline skill detection.
//!
//! A pure text classifier run on every transcript before enrichment. It
//! never fails: anything it cannot classify confidently resolves to
//! [`SkillMarker::None`].

use crate::arithmetic::{evaluate, format_number};

/// City used when a weather request names none.
pub const DEFAULT_CITY: &str = "London";

/// Friendly reply substituted when an arithmetic request cannot be evaluated.
pub const CALCULATOR_APOLOGY: &str =
    "I couldn't calculate that. Try a simple expression like 25 * 16.";

const CALC_VERBS: &[&str] = &["calculate", "calc", "what is", "what's"];
const OPERATORS: &[char] = &['+', '-', '*', '/'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillMarker {
    None,
    /// `expression = result`, or [`CALCULATOR_APOLOGY`].
    CalculatorResult(String),
    WeatherRequest(String),
}

impl SkillMarker {
    pub fn kind(&self) -> &'static str {
        match self {
            SkillMarker::None => "none",
            SkillMarker::CalculatorResult(_) => "calculator",
            SkillMarker::WeatherRequest(_) => "weather",
        }
    }
}

/// Classify `text` using [`DEFAULT_CITY`] for bare weather requests.
pub fn detect(text: &str) -> SkillMarker {
    detect_with_default_city(text, DEFAULT_CITY)
}

pub fn detect_with_default_city(text: &str, default_city: &str) -> SkillMarker {
    let lower = text.to_ascii_lowercase();

    if let Some(marker) = detect_calculation(text, &lower) {
        return marker;
    }

    if lower.contains("weather") {
        let city = extract_city(text, &lower).unwrap_or_else(|| default_city.to_string());
        return SkillMarker::WeatherRequest(city);
    }

    SkillMarker::None
}

fn detect_calculation(text: &str, lower: &str) -> Option<SkillMarker> {
    let has_verb = CALC_VERBS.iter().any(|v| lower.contains(v));
    let has_operator = text.contains(OPERATORS);
    if !has_verb && !has_operator {
        return None;
    }
    let explicit = lower.contains("calc");

    match longest_numeric_run(text) {
        Some(expr) if expr.contains(OPERATORS) && (count_numbers(expr) >= 2 || has_verb) => {
            Some(SkillMarker::CalculatorResult(match evaluate(expr) {
                Ok(value) => format!("{expr} = {}", format_number(value)),
                Err(_) => CALCULATOR_APOLOGY.to_string(),
            }))
        }
        _ if explicit => Some(SkillMarker::CalculatorResult(CALCULATOR_APOLOGY.to_string())),
        _ => None,
    }
}

/// Characters the arithmetic tokenizer accepts, blanks included.
fn is_expression_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | ' ' | '\t')
}

/// Longest contiguous run of expression characters that contains a digit.
fn longest_numeric_run(text: &str) -> Option<&str> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (is_expression_char(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(&text[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(&text[s..]);
    }

    runs.into_iter()
        .map(|run| run.trim().trim_end_matches(['.', ' ']))
        .filter(|run| run.chars().any(|c| c.is_ascii_digit()))
        .fold(None, |best: Option<&str>, run| match best {
            Some(b) if b.len() >= run.len() => Some(b),
            _ => Some(run),
        })
}

fn count_numbers(expr: &str) -> usize {
    expr.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|part| part.chars().any(|c| c.is_ascii_digit()))
        .count()
}

/// Trailing clause after the last " in " / " for ", title-cased.
fn extract_city(text: &str, lower: &str) -> Option<String> {
    let start = [" in ", " for "]
        .iter()
        .filter_map(|sep| lower.rfind(sep).map(|i| i + sep.len()))
        .max()?;
    let clause = text[start..]
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    if clause.is_empty() {
        return None;
    }
    Some(title_case(clause))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
