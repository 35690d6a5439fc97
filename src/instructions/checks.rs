use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{InstructionError, InstructionKwargs};

/// Comparison used by counting instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessThan,
    AtLeast,
}

impl Relation {
    pub fn holds(self, actual: usize, target: usize) -> bool {
        match self {
            Relation::LessThan => actual < target,
            Relation::AtLeast => actual >= target,
        }
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "less than" => Ok(Relation::LessThan),
            "at least" => Ok(Relation::AtLeast),
            other => Err(format!("expected 'less than' or 'at least', got '{other}'")),
        }
    }
}

/// Supported instruction ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    NumberWords,
    NumberSentences,
    NumberParagraphs,
    KeywordsExistence,
    ForbiddenWords,
    KeywordFrequency,
    LetterFrequency,
    Lowercase,
    Uppercase,
    CapitalWordFrequency,
    Title,
    JsonFormat,
    BulletLists,
    HighlightedSections,
    Placeholders,
    Postscript,
    EndPhrase,
    Quotation,
    RepeatPrompt,
    NoComma,
}

impl Instruction {
    pub const ALL: [Instruction; 20] = [
        Instruction::NumberWords,
        Instruction::NumberSentences,
        Instruction::NumberParagraphs,
        Instruction::KeywordsExistence,
        Instruction::ForbiddenWords,
        Instruction::KeywordFrequency,
        Instruction::LetterFrequency,
        Instruction::Lowercase,
        Instruction::Uppercase,
        Instruction::CapitalWordFrequency,
        Instruction::Title,
        Instruction::JsonFormat,
        Instruction::BulletLists,
        Instruction::HighlightedSections,
        Instruction::Placeholders,
        Instruction::Postscript,
        Instruction::EndPhrase,
        Instruction::Quotation,
        Instruction::RepeatPrompt,
        Instruction::NoComma,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Instruction::NumberWords => "length_constraints:number_words",
            Instruction::NumberSentences => "length_constraints:number_sentences",
            Instruction::NumberParagraphs => "length_constraints:number_paragraphs",
            Instruction::KeywordsExistence => "keywords:existence",
            Instruction::ForbiddenWords => "keywords:forbidden_words",
            Instruction::KeywordFrequency => "keywords:frequency",
            Instruction::LetterFrequency => "keywords:letter_frequency",
            Instruction::Lowercase => "change_case:english_lowercase",
            Instruction::Uppercase => "change_case:english_capital",
            Instruction::CapitalWordFrequency => "change_case:capital_word_frequency",
            Instruction::Title => "detectable_format:title",
            Instruction::JsonFormat => "detectable_format:json_format",
            Instruction::BulletLists => "detectable_format:number_bullet_lists",
            Instruction::HighlightedSections => "detectable_format:number_highlighted_sections",
            Instruction::Placeholders => "detectable_content:number_placeholders",
            Instruction::Postscript => "detectable_content:postscript",
            Instruction::EndPhrase => "startend:end_checker",
            Instruction::Quotation => "startend:quotation",
            Instruction::RepeatPrompt => "combination:repeat_prompt",
            Instruction::NoComma => "punctuation:no_comma",
        }
    }

    /// Returns `true` if `response` follows this instruction.
    pub fn evaluate(
        self,
        response: &str,
        kwargs: &InstructionKwargs,
    ) -> Result<bool, InstructionError> {
        let args = Args {
            instruction: self.id(),
            kwargs,
        };

        let followed = match self {
            Instruction::NumberWords => {
                let relation = args.relation("relation")?;
                relation.holds(WORD.find_iter(response).count(), args.count("num_words")?)
            }
            Instruction::NumberSentences => {
                let relation = args.relation("relation")?;
                relation.holds(count_sentences(response), args.count("num_sentences")?)
            }
            Instruction::NumberParagraphs => {
                paragraphs_match(response, args.count("num_paragraphs")?)
            }
            Instruction::KeywordsExistence => args
                .strings("keywords")?
                .iter()
                .all(|keyword| response.to_lowercase().contains(&keyword.to_lowercase())),
            Instruction::ForbiddenWords => {
                let forbidden = args.strings("forbidden_words")?;
                let mut clean = true;
                for word in &forbidden {
                    if whole_word(word, args.instruction)?.is_match(response) {
                        clean = false;
                        break;
                    }
                }
                clean
            }
            Instruction::KeywordFrequency => {
                let keyword = args.string("keyword")?.to_lowercase();
                let relation = args.relation("relation")?;
                let occurrences = if keyword.is_empty() {
                    0
                } else {
                    response.to_lowercase().matches(keyword.as_str()).count()
                };
                relation.holds(occurrences, args.count("frequency")?)
            }
            Instruction::LetterFrequency => {
                let letter = args.string("letter")?.to_lowercase();
                let mut chars = letter.chars();
                let (Some(letter), None) = (chars.next(), chars.next()) else {
                    return Err(args.invalid("letter", "expected a single letter"));
                };
                let relation = args.relation("let_relation")?;
                let occurrences = response
                    .to_lowercase()
                    .chars()
                    .filter(|c| *c == letter)
                    .count();
                relation.holds(occurrences, args.count("let_frequency")?)
            }
            Instruction::Lowercase => response == response.to_lowercase(),
            Instruction::Uppercase => response == response.to_uppercase(),
            Instruction::CapitalWordFrequency => {
                let relation = args.relation("capital_relation")?;
                let capitals = WORD
                    .find_iter(response)
                    .filter(|w| {
                        let word = w.as_str();
                        word.chars().any(char::is_alphabetic) && word == word.to_uppercase()
                    })
                    .count();
                relation.holds(capitals, args.count("capital_frequency")?)
            }
            Instruction::Title => TITLE
                .captures_iter(response)
                .any(|c| !c[1].trim().is_empty()),
            Instruction::JsonFormat => is_json(response),
            Instruction::BulletLists => {
                let bullets = response
                    .lines()
                    .filter(|line| STAR_BULLET.is_match(line) || DASH_BULLET.is_match(line))
                    .count();
                bullets == args.count("num_bullets")?
            }
            Instruction::HighlightedSections => {
                let single = SINGLE_HIGHLIGHT
                    .find_iter(response)
                    .filter(|m| !m.as_str().trim_matches('*').trim().is_empty())
                    .count();
                let double = DOUBLE_HIGHLIGHT
                    .find_iter(response)
                    .filter(|m| !m.as_str().trim_matches('*').trim().is_empty())
                    .count();
                single + double >= args.count("num_highlights")?
            }
            Instruction::Placeholders => {
                PLACEHOLDER.find_iter(response).count() >= args.count("num_placeholders")?
            }
            Instruction::Postscript => {
                let marker = args.string("postscript_marker")?;
                postscript_pattern(&marker, args.instruction)?.is_match(&response.to_lowercase())
            }
            Instruction::EndPhrase => {
                let phrase = args.string("end_phrase")?;
                response
                    .trim()
                    .to_lowercase()
                    .ends_with(&phrase.trim().to_lowercase())
            }
            Instruction::Quotation => {
                let trimmed = response.trim();
                trimmed.len() > 1 && trimmed.starts_with('"') && trimmed.ends_with('"')
            }
            Instruction::RepeatPrompt => {
                let prompt = args.string("prompt_to_repeat")?;
                response
                    .trim()
                    .to_lowercase()
                    .starts_with(&prompt.trim().to_lowercase())
            }
            Instruction::NoComma => !response.contains(','),
        };

        Ok(followed)
    }
}

impl FromStr for Instruction {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instruction::ALL
            .into_iter()
            .find(|instruction| instruction.id() == s)
            .ok_or_else(|| InstructionError::UnknownInstruction(s.to_string()))
    }
}

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:['’]\w+)*").expect("word pattern is valid"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence pattern is valid"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?\*\*\*\s?").expect("paragraph pattern is valid"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<([^\n]+?)>>").expect("title pattern is valid"));
static STAR_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*[^\*].*$").expect("bullet pattern is valid"));
static DASH_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-.*$").expect("bullet pattern is valid"));
static SINGLE_HIGHLIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*[^\n\*]*\*").expect("highlight pattern is valid"));
static DOUBLE_HIGHLIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^\n\*]*\*\*").expect("highlight pattern is valid"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("placeholder pattern is valid"));

fn count_sentences(text: &str) -> usize {
    SENTENCE_END
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Paragraphs are separated by `***`; only a leading or trailing one may be empty.
fn paragraphs_match(text: &str, expected: usize) -> bool {
    let paragraphs: Vec<&str> = PARAGRAPH_BREAK.split(text).collect();
    let last = paragraphs.len().saturating_sub(1);
    let mut count = paragraphs.len();

    for (i, paragraph) in paragraphs.iter().enumerate() {
        if paragraph.trim().is_empty() {
            if i == 0 || i == last {
                count -= 1;
            } else {
                return false;
            }
        }
    }

    count == expected
}

fn whole_word(word: &str, instruction: &'static str) -> Result<Regex, InstructionError> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).map_err(|e| {
        InstructionError::InvalidArgument {
            instruction,
            argument: "forbidden_words",
            reason: e.to_string(),
        }
    })
}

fn postscript_pattern(marker: &str, instruction: &'static str) -> Result<Regex, InstructionError> {
    let marker = marker.trim().to_lowercase();
    let pattern = if marker == "p.p.s" {
        r"(?m)\s*p\.\s?p\.\s?s.*$".to_string()
    } else if marker == "p.s." {
        r"(?m)\s*p\.\s?s\..*$".to_string()
    } else {
        format!(r"(?m)\s*{}.*$", regex::escape(&marker))
    };
    Regex::new(&pattern).map_err(|e| InstructionError::InvalidArgument {
        instruction,
        argument: "postscript_marker",
        reason: e.to_string(),
    })
}

fn is_json(text: &str) -> bool {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```Json"))
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body).trim();
    serde_json::from_str::<Value>(body).is_ok()
}

/// Typed view over one instruction's kwargs; `null` counts as absent.
struct Args<'a> {
    instruction: &'static str,
    kwargs: &'a InstructionKwargs,
}

impl Args<'_> {
    fn get(&self, argument: &'static str) -> Result<&Value, InstructionError> {
        match self.kwargs.get(argument) {
            Some(Value::Null) | None => Err(InstructionError::MissingArgument {
                instruction: self.instruction,
                argument,
            }),
            Some(value) => Ok(value),
        }
    }

    fn invalid(&self, argument: &'static str, reason: &str) -> InstructionError {
        InstructionError::InvalidArgument {
            instruction: self.instruction,
            argument,
            reason: reason.to_string(),
        }
    }

    fn count(&self, argument: &'static str) -> Result<usize, InstructionError> {
        let value = self.get(argument)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(|n| n as usize)
            .ok_or_else(|| self.invalid(argument, "expected a non-negative integer"))
    }

    fn string(&self, argument: &'static str) -> Result<String, InstructionError> {
        self.get(argument)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(argument, "expected a string"))
    }

    fn strings(&self, argument: &'static str) -> Result<Vec<String>, InstructionError> {
        let Value::Array(items) = self.get(argument)? else {
            return Err(self.invalid(argument, "expected a list of strings"));
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(argument, "expected a list of strings"))
            })
            .collect()
    }

    fn relation(&self, argument: &'static str) -> Result<Relation, InstructionError> {
        self.string(argument)?
            .parse()
            .map_err(|reason: String| self.invalid(argument, &reason))
    }
}
