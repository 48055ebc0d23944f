use regex_lite::Regex;
use std::sync::OnceLock;

const WEASEL_PHRASES: &[&str] = &[
    "mostly followed",
    "mostly complied",
    "generally complied",
    "generally followed",
    "attempted to",
    "tried to follow",
    "largely",
    "for the most part",
];

const ADMISSION_WORDS: &[&str] = &["violat", "broke", "skipped", "missed", "ignored", "failed to"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCitation {
    pub number: u32,
    pub text: String,
    pub admitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCitation {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSummary {
    pub score: Option<u8>,
    pub streak: Option<u32>,
    pub rules: Vec<RuleCitation>,
    pub files: Vec<FileCitation>,
    pub weasels: Vec<&'static str>,
}

struct Patterns {
    score: Regex,
    streak: Regex,
    rule_number: Regex,
    rule_name: Regex,
    file_line: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                score: Regex::new(r"(?i)score\s*[:=]?\s*(\d{1,2})\s*/\s*10\b").ok()?,
                streak: Regex::new(r"(?i)streak\s*[:=]\s*(\d+)").ok()?,
                rule_number: Regex::new(r"(?i)\brule\s*#\s*(\d+)").ok()?,
                rule_name: Regex::new(
                    r"(?i)\b(?:rule\s*[:\-]\s*(research|verify|plan|bug[_ ]note|saneloop)|(research|verify|plan|bug[_ ]note|saneloop)\s+rule)\b",
                )
                .ok()?,
                file_line: Regex::new(r"([A-Za-z0-9_~./\-]+\.[A-Za-z0-9]+):(\d+)").ok()?,
            })
        })
        .as_ref()
}

pub fn rule_number_for_name(name: &str) -> Option<u32> {
    match name.to_ascii_lowercase().replace(' ', "_").as_str() {
        "research" => Some(1),
        "verify" => Some(2),
        "plan" => Some(3),
        "bug_note" => Some(4),
        "saneloop" => Some(5),
        _ => None,
    }
}

pub fn parse_summary(text: &str) -> ParsedSummary {
    let mut parsed = ParsedSummary::default();
    let lowered = text.to_ascii_lowercase();
    parsed.weasels = WEASEL_PHRASES
        .iter()
        .copied()
        .filter(|phrase| lowered.contains(phrase))
        .collect();

    let Some(patterns) = patterns() else {
        return parsed;
    };

    parsed.score = patterns
        .score
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|score| score.as_str().parse().ok());
    parsed.streak = patterns
        .streak
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|streak| streak.as_str().parse().ok());

    for line in text.lines() {
        let admitted = {
            let lowered = line.to_ascii_lowercase();
            ADMISSION_WORDS.iter().any(|word| lowered.contains(word))
        };
        for captures in patterns.rule_number.captures_iter(line) {
            if let Some(digits) = captures.get(1) {
                // Too large for u32 is still a citation, of no known rule.
                let number = digits.as_str().parse().unwrap_or(u32::MAX);
                parsed.rules.push(RuleCitation {
                    number,
                    text: captures[0].to_string(),
                    admitted,
                });
            }
        }
        for captures in patterns.rule_name.captures_iter(line) {
            let name = captures.get(1).or_else(|| captures.get(2));
            if let Some(number) = name.and_then(|m| rule_number_for_name(m.as_str())) {
                parsed.rules.push(RuleCitation {
                    number,
                    text: captures[0].to_string(),
                    admitted,
                });
            }
        }
        for captures in patterns.file_line.captures_iter(line) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if line[..whole.start()].ends_with("//") || line[..whole.start()].ends_with(':') {
                continue;
            }
            let (Some(file), Some(number)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            if let Ok(line_number) = number.as_str().parse() {
                parsed.files.push(FileCitation {
                    file: file.as_str().to_string(),
                    line: line_number,
                });
            }
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_score_streak_and_citations() {
        let parsed = parse_summary(
            "Compliance Score: 8/10\nStreak: 3\nFollowed Rule #1 and the plan rule.\nFixed app/models/user.rb:50",
        );
        assert_eq!(parsed.score, Some(8));
        assert_eq!(parsed.streak, Some(3));
        let numbers: Vec<u32> = parsed.rules.iter().map(|rule| rule.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(
            parsed.files,
            vec![FileCitation {
                file: "app/models/user.rb".to_string(),
                line: 50
            }]
        );
        assert!(parsed.weasels.is_empty());
    }

    #[test]
    fn large_rule_numbers_are_kept() {
        let parsed = parse_summary("Followed Rule #300 and Rule #99999999999");
        let numbers: Vec<u32> = parsed.rules.iter().map(|rule| rule.number).collect();
        assert_eq!(numbers, vec![300, u32::MAX]);
    }

    #[test]
    fn admissions_are_marked() {
        let parsed = parse_summary("Rule #2 violated: skipped the test run");
        assert!(parsed.rules[0].admitted);
    }

    #[test]
    fn urls_with_ports_are_not_file_citations() {
        let parsed = parse_summary("Server at http://example.com:8080 and localhost:3000");
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn weasel_phrases_are_detected() {
        let parsed = parse_summary("I mostly followed the rules and attempted to verify.");
        assert_eq!(parsed.weasels, vec!["mostly followed", "attempted to"]);
    }
}
