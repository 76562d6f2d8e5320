//! Heuristic named-entity extraction.
//!
//! A lightweight stand-in for a statistical NER model: capitalised token
//! runs are collected and classified by suffix keywords, a small
//! gazetteer, and honorific cues. Output feeds the extraction prompt as
//! context and enriches extracted events, so precision matters more than
//! recall; ambiguous runs are dropped.

use regex::Regex;

use crate::types::EntityBundle;

/// Organisation-indicating tokens.
const ORG_KEYWORDS: [&str; 30] = [
    "ministry",
    "government",
    "party",
    "army",
    "police",
    "university",
    "corporation",
    "company",
    "inc",
    "ltd",
    "group",
    "organization",
    "organisation",
    "agency",
    "council",
    "committee",
    "bank",
    "union",
    "nations",
    "state",
    "forces",
    "authority",
    "administration",
    "news",
    "times",
    "post",
    "press",
    "court",
    "parliament",
    "kremlin",
];

/// Tokens that mark a run as an event name.
const EVENT_KEYWORDS: [&str; 6] = ["summit", "conference", "olympics", "expo", "festival", "forum"];

/// Honorifics and titles stripped from the front of person runs.
const HONORIFICS: [&str; 18] = [
    "president",
    "prime",
    "minister",
    "pm",
    "mr",
    "mrs",
    "ms",
    "dr",
    "general",
    "colonel",
    "chancellor",
    "senator",
    "king",
    "queen",
    "chief",
    "secretary",
    "governor",
    "mayor",
];

/// Demonyms stripped alongside honorifics ("Russian President ...").
const DEMONYMS: [&str; 16] = [
    "russian",
    "indian",
    "american",
    "british",
    "french",
    "german",
    "chinese",
    "israeli",
    "iranian",
    "iraqi",
    "pakistani",
    "afghan",
    "ukrainian",
    "turkish",
    "syrian",
    "egyptian",
];

/// Countries and prominent cities recognised as locations.
const GAZETTEER: [&str; 46] = [
    "afghanistan",
    "india",
    "pakistan",
    "russia",
    "china",
    "ukraine",
    "israel",
    "iran",
    "iraq",
    "syria",
    "france",
    "germany",
    "japan",
    "turkey",
    "egypt",
    "nigeria",
    "somalia",
    "yemen",
    "libya",
    "mali",
    "kabul",
    "delhi",
    "mumbai",
    "moscow",
    "kyiv",
    "london",
    "paris",
    "berlin",
    "washington",
    "beijing",
    "tokyo",
    "karachi",
    "islamabad",
    "tehran",
    "baghdad",
    "damascus",
    "istanbul",
    "gaza",
    "jerusalem",
    "ankara",
    "cairo",
    "lagos",
    "mogadishu",
    "tripoli",
    "kandahar",
    "peshawar",
];

fn is_acronym(token: &str) -> bool {
    token.len() >= 2
        && token.len() <= 6
        && token.chars().all(|c| c.is_ascii_uppercase())
}

fn is_capitalized(token: &str) -> bool {
    token
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

fn date_pattern() -> Regex {
    Regex::new(
        r"(?x)
        \b(?:January|February|March|April|May|June|July|August|September|October|November|December)
        \s+\d{1,2}(?:,\s*\d{4})?\b
        |\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}\b
        |\b\d{4}-\d{2}-\d{2}\b",
    )
    .expect("static pattern")
}

struct Token {
    text: String,
    ends_sentence: bool,
}

fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .flat_map(|raw| {
            let ends_sentence = raw.ends_with(['.', '!', '?']);
            // Hyphenated compounds split into their parts so each can be
            // classified ("Russia-India Summit").
            let trimmed: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
                .collect();
            let parts: Vec<String> = trimmed
                .split('-')
                .filter(|p| !p.is_empty())
                .map(|p| p.trim_matches('\'').to_string())
                .collect();
            let last = parts.len().saturating_sub(1);
            parts
                .into_iter()
                .enumerate()
                .map(move |(i, text)| Token {
                    text,
                    ends_sentence: ends_sentence && i == last,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn capitalized_runs(tokens: &[Token]) -> Vec<Vec<String>> {
    let mut runs = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for token in tokens {
        if token.text.len() >= 2 && is_capitalized(&token.text) {
            current.push(token.text.clone());
            if token.ends_sentence {
                runs.push(std::mem::take(&mut current));
            }
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

fn classify_run(run: &[String], bundle: &mut EntityBundle) {
    // Sentence-initial articles are capitalised but carry no meaning.
    let mut run = run;
    while let Some(first) = run.first() {
        if matches!(first.to_lowercase().as_str(), "the" | "a" | "an") {
            run = &run[1..];
        } else {
            break;
        }
    }
    if run.is_empty() {
        return;
    }

    let lower: Vec<String> = run.iter().map(|t| t.to_lowercase()).collect();
    let joined = run.join(" ");

    if lower.iter().any(|t| EVENT_KEYWORDS.contains(&t.as_str())) {
        bundle.events.push(joined);
        return;
    }

    // Titles written as acronyms (PM, Dr) must not read as org acronyms.
    let org_acronym = run
        .iter()
        .zip(&lower)
        .any(|(t, l)| is_acronym(t) && !HONORIFICS.contains(&l.as_str()));
    if lower.iter().any(|t| ORG_KEYWORDS.contains(&t.as_str())) || org_acronym {
        bundle.organizations.push(joined);
        return;
    }

    let gazetteer_hits: Vec<&String> = run
        .iter()
        .zip(&lower)
        .filter(|(_, l)| GAZETTEER.contains(&l.as_str()))
        .map(|(t, _)| t)
        .collect();
    if !gazetteer_hits.is_empty() {
        if gazetteer_hits.len() == run.len() {
            bundle.locations.push(joined);
        } else {
            for hit in gazetteer_hits {
                bundle.locations.push(hit.clone());
            }
        }
        return;
    }

    // Strip leading titles and demonyms, then accept short all-alphabetic
    // runs as person names. Single tokens only count when a title made
    // the reading unambiguous; bare sentence-start words are dropped.
    let mut start = 0;
    while start < run.len()
        && (HONORIFICS.contains(&lower[start].as_str()) || DEMONYMS.contains(&lower[start].as_str()))
    {
        start += 1;
    }
    let remainder = &run[start..];
    let had_title = start > 0;

    let alphabetic = remainder
        .iter()
        .all(|t| t.chars().all(|c| c.is_alphabetic()) && !is_acronym(t));

    match remainder.len() {
        0 => {}
        1 if had_title && alphabetic => bundle.persons.push(remainder[0].clone()),
        2..=4 if alphabetic => bundle.persons.push(remainder.join(" ")),
        _ => {}
    }
}

/// Extract entities from a title and body.
pub fn extract_entities(title: &str, content: &str) -> EntityBundle {
    let mut bundle = EntityBundle::default();
    let text = format!("{}\n{}", title, content);

    for m in date_pattern().find_iter(&text) {
        bundle.dates.push(m.as_str().to_string());
    }

    let tokens = tokenize(&text);
    for run in capitalized_runs(&tokens) {
        classify_run(&run, &mut bundle);
    }

    bundle.normalize();
    bundle
}
