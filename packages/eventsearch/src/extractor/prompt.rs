//! Extraction prompt construction.
//!
//! The stable role and schema contract live in the system prompt so the
//! caching-capable provider can serve them from its prompt cache across a
//! batch of articles; the per-article material goes in the user prompt.

use crate::types::EntityBundle;

/// Head of the body excerpt when the article is longer than the cap.
const EXCERPT_HEAD_CHARS: usize = 1500;

/// Tail of the body excerpt when the article is longer than the cap.
const EXCERPT_TAIL_CHARS: usize = 500;

/// Articles at or below this length are included whole.
const EXCERPT_MAX_CHARS: usize = 2000;

/// Stable instructions, cache-eligible on providers that support it.
pub const SYSTEM_PROMPT: &str = "You are an expert event extraction AI. Extract event details ONLY from the provided article.
Be precise and conservative - only extract information that is clearly stated in the article.
Extract event type, location, date, participants, organizations, and provide a concise 3-4 sentence summary.
Return ONLY valid JSON matching the schema provided.";

/// Truncate strategically: keep the opening (context) and the ending
/// (conclusion), joined with an ellipsis marker.
fn excerpt(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= EXCERPT_MAX_CHARS {
        return content.to_string();
    }
    let head: String = chars[..EXCERPT_HEAD_CHARS].iter().collect();
    let tail: String = chars[chars.len() - EXCERPT_TAIL_CHARS..].iter().collect();
    format!("{}\n...\n{}", head, tail)
}

/// Build the per-article extraction prompt.
pub fn build_extraction_prompt(
    title: &str,
    content: &str,
    entities: Option<&EntityBundle>,
) -> String {
    let mut prompt = format!(
        "You are a military intelligence analyst extracting structured event data from news articles.\n\n\
         ARTICLE TITLE: {}\n\n\
         ARTICLE CONTENT:\n{}\n\n",
        title,
        excerpt(content)
    );

    if let Some(entities) = entities.filter(|e| {
        !e.persons.is_empty() || !e.organizations.is_empty() || !e.locations.is_empty()
    }) {
        prompt.push_str("DETECTED ENTITIES:\n");
        if !entities.persons.is_empty() {
            let top: Vec<&str> = entities.persons.iter().take(8).map(String::as_str).collect();
            prompt.push_str(&format!("- People: {}\n", top.join(", ")));
        }
        if !entities.organizations.is_empty() {
            let top: Vec<&str> = entities
                .organizations
                .iter()
                .take(8)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!("- Organizations: {}\n", top.join(", ")));
        }
        if !entities.locations.is_empty() {
            let top: Vec<&str> = entities
                .locations
                .iter()
                .take(8)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!("- Locations: {}\n", top.join(", ")));
        }
        prompt.push('\n');
    }

    prompt.push_str(TASK_TEMPLATE);
    prompt
}

/// The task body: event-type enumeration, extraction rules, two worked
/// examples anchoring the schema, and the bare-JSON demand.
const TASK_TEMPLATE: &str = r#"EXTRACTION TASK:
Read the article carefully and extract ONLY information that is explicitly stated. Do NOT make up or assume information.

STEP 1: Determine the MAIN event type from this article
STEP 2: Extract ONLY facts that are clearly stated in the article
STEP 3: Use null for ANY field where information is not explicitly mentioned
STEP 4: Write a concise summary (3-4 sentences maximum, capturing the key points)

EVENT TYPES (choose the ONE that best matches THIS article):
- meeting, summit, conference: Diplomatic meetings, trade talks, official visits, state visits
- political_event, election: Political activities, campaigns, government actions
- bombing, explosion, shooting, attack: Violent incidents (ONLY if this article is about such an incident)
- terrorist_activity: Terror-related acts
- protest, demonstration: Public protests or unrest
- natural_disaster, accident: Natural catastrophes or accidents
- cyber_attack, cyber_incident, data_breach: Cyber security incidents
- kidnapping, theft: Crimes
- military_operation: Military actions
- other: If none of the above fit

CRITICAL RULES - READ CAREFULLY:
1. ONLY extract event_type that matches THIS article's main topic
2. Extract perpetrator/casualties if mentioned OR claimed in THIS article (including claims by groups)
3. Do NOT mix information from different articles or examples
4. If a field is not mentioned in the article, use null
5. Summary must be 3-4 sentences maximum, concise and factual
6. Perpetrator is for violent events where someone carried out or claimed an attack
7. Casualties: Extract if deaths/injuries are mentioned, claimed, or reported in THIS article
8. Location should be where THIS event takes place
9. Date should be when THIS event happened (not the article date)
10. If event doesn't clearly fit a category, use "other"
11. Individuals: List ONLY actual person names (e.g., "Narendra Modi", "Vladimir Putin") - exclude place names, abbreviations, or non-person entities

PERPETRATOR TYPES (ONLY if this is a violent attack with identified perpetrator):
- terrorist_group, state_actor, criminal_organization, individual, multiple_parties, unknown, not_applicable

INDIVIDUALS FIELD INSTRUCTIONS:
- Include ONLY actual human names (first name + last name or full names)
- EXCLUDE: Place names, abbreviations, organization names, medical terms
- EXCLUDE: Single-word names without context that could be a place
- Include: Political leaders, officials, victims with full names, witnesses with full names

EXAMPLE - Meeting/Summit Article:
{
    "event_type": "meeting",
    "event_sub_type": "bilateral summit",
    "summary": "Russian President Putin visited India for the 23rd Russia-India Summit. He held talks with PM Modi focusing on economic cooperation and energy ties. The two leaders agreed to boost bilateral trade to $100 billion by 2030.",
    "perpetrator": null,
    "perpetrator_type": null,
    "location": {
        "city": "New Delhi",
        "region": null,
        "country": "India"
    },
    "event_date": "2025-12-05",
    "event_time": null,
    "individuals": ["Vladimir Putin", "Narendra Modi"],
    "organizations": ["Kremlin", "Indian Government"],
    "casualties": null,
    "confidence": 0.9
}

EXAMPLE - Attack Article:
{
    "event_type": "bombing",
    "event_sub_type": "suicide bombing",
    "summary": "A suicide bomber attacked a checkpoint in Kabul. The Islamic State claimed responsibility for the attack, claiming to have killed 20 people and injured 30. Taliban authorities disputed the casualty figures.",
    "perpetrator": "Islamic State",
    "perpetrator_type": "terrorist_group",
    "location": {
        "city": "Kabul",
        "region": null,
        "country": "Afghanistan"
    },
    "event_date": "2023-01-01",
    "event_time": null,
    "individuals": [],
    "organizations": ["Islamic State", "Taliban"],
    "casualties": {
        "killed": 20,
        "injured": 30
    },
    "confidence": 0.85
}

JSON FORMATTING RULES:
- Output ONLY valid JSON - no explanations before or after
- Use null for missing/unavailable information
- All strings in double quotes
- Numbers without quotes
- event_date format: YYYY-MM-DD (null if not mentioned)
- confidence: 0.9+ very clear, 0.7-0.9 mostly clear, 0.5-0.7 uncertain, <0.5 very uncertain

JSON OUTPUT (extract from THIS article):"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_included_whole() {
        let prompt = build_extraction_prompt("Title", "Short body.", None);
        assert!(prompt.contains("ARTICLE TITLE: Title"));
        assert!(prompt.contains("Short body."));
        assert!(!prompt.contains("\n...\n"));
    }

    #[test]
    fn test_long_content_keeps_head_and_tail() {
        let body = format!("{}{}{}", "A".repeat(1600), "B".repeat(1000), "ZEND");
        let prompt = build_extraction_prompt("Title", &body, None);
        assert!(prompt.contains("\n...\n"));
        assert!(prompt.contains("ZEND"));
        // Middle section is dropped.
        assert!(!prompt.contains(&"B".repeat(600)));
    }

    #[test]
    fn test_entities_injected_when_present() {
        let entities = EntityBundle {
            persons: vec!["Vladimir Putin".to_string()],
            organizations: vec!["Kremlin".to_string()],
            locations: vec!["India".to_string()],
            ..EntityBundle::default()
        };
        let prompt = build_extraction_prompt("T", "body", Some(&entities));
        assert!(prompt.contains("DETECTED ENTITIES:"));
        assert!(prompt.contains("- People: Vladimir Putin"));
        assert!(prompt.contains("- Organizations: Kremlin"));
        assert!(prompt.contains("- Locations: India"));
    }

    #[test]
    fn test_empty_bundle_not_injected() {
        let prompt = build_extraction_prompt("T", "body", Some(&EntityBundle::default()));
        assert!(!prompt.contains("DETECTED ENTITIES:"));
    }

    #[test]
    fn test_entities_capped_at_eight() {
        let entities = EntityBundle {
            persons: (0..12).map(|i| format!("Person Number{}", i)).collect(),
            ..EntityBundle::default()
        };
        let prompt = build_extraction_prompt("T", "body", Some(&entities));
        assert!(prompt.contains("Number7"));
        assert!(!prompt.contains("Number8,"));
    }
}
