//! Prompt text for the text and image providers.

use reverie_core::generation::SourceContent;
use reverie_core::hashing::fingerprint;

/// Built-in scene prompts for contemplation images.
pub const DEFAULT_SCENE_PROMPTS: &[&str] = &[
    "Soft morning light filtering through bamboo leaves",
    "A single white lotus floating on still water",
    "Gentle waves lapping at a pebble beach at dawn",
    "Misty mountains reflected in a calm lake",
    "Dewdrops on grass blades in early morning",
    "A wooden dock extending into a serene pond",
    "Cherry blossoms drifting down like snow",
    "Moonlight streaming through white curtains",
    "Smooth river stones stacked in balance",
    "Sunbeams piercing through a forest canopy",
    "A quiet zen garden with raked sand",
    "Morning mist rising from a tranquil valley",
];

/// Style suffix appended to every scene prompt.
const IMAGE_STYLE: &str =
    "Soft, painterly, calm palette, generous empty space, no text or lettering.";

/// Pick a scene prompt deterministically from the source fingerprint, so
/// equivalent sources map to the same prompt (and the same cached image).
pub fn select_scene_prompt<'a>(prompts: &'a [String], source_key: &str) -> Option<&'a str> {
    if prompts.is_empty() {
        return None;
    }
    let seed = source_key
        .get(..16)
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .unwrap_or(0);
    let index = (seed % prompts.len() as u64) as usize;
    Some(prompts[index].as_str())
}

/// Full image prompt for a scene.
pub fn image_prompt(scene: &str) -> String {
    format!("{scene}. {IMAGE_STYLE}")
}

/// Fingerprint of the parts of a source that influence generated content.
pub fn source_key(source: &SourceContent) -> String {
    fingerprint([
        source.text.as_str(),
        source.message_text.as_deref().unwrap_or_default(),
    ])
}

/// Prompt for a spoken narration of roughly `words` words.
pub fn narration_prompt(source: &SourceContent, minutes: u32, words: u32) -> String {
    let mut prompt = format!(
        "Using the passages below, write a guided meditation script of about \
         {minutes} minutes when read aloud (roughly {words} words). Speak directly \
         to the listener in a calm, unhurried voice. Include natural pauses written \
         as ellipses. Output only the script, with no headings or stage directions.\n\n"
    );
    push_source(&mut prompt, source);
    prompt
}

/// Prompt for a one- or two-sentence caption quote.
pub fn caption_prompt(source: &SourceContent) -> String {
    let mut prompt = String::from(
        "Using the passages below, write one or two sentences that capture their \
         central insight as a short contemplative quotation. Output only the \
         quotation, without quote marks or attribution.\n\n",
    );
    push_source(&mut prompt, source);
    prompt
}

fn push_source(prompt: &mut String, source: &SourceContent) {
    if let Some(message) = source.message_text.as_deref().filter(|m| !m.trim().is_empty()) {
        prompt.push_str("Conversation message:\n");
        prompt.push_str(message);
        prompt.push_str("\n\n");
    }
    if !source.text.trim().is_empty() {
        prompt.push_str("Passages:\n");
        prompt.push_str(&source.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts() -> Vec<String> {
        DEFAULT_SCENE_PROMPTS.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn scene_selection_is_deterministic() {
        let source = SourceContent::new("Be still and know.");
        let key = source_key(&source);
        let list = prompts();
        assert_eq!(select_scene_prompt(&list, &key), select_scene_prompt(&list, &key));

        // Whitespace differences do not change the pick.
        let respaced = source_key(&SourceContent::new("  Be   still and\nknow. "));
        assert_eq!(select_scene_prompt(&list, &key), select_scene_prompt(&list, &respaced));
    }

    #[test]
    fn empty_prompt_list_selects_nothing() {
        assert_eq!(select_scene_prompt(&[], "abcdef0123456789"), None);
    }

    #[test]
    fn narration_prompt_mentions_length_and_source() {
        let source = SourceContent {
            text: "From tao.txt:\nThe soft overcomes the hard.".into(),
            message_text: Some("Tell me about yielding.".into()),
        };
        let prompt = narration_prompt(&source, 5, 650);
        assert!(prompt.contains("5 minutes"));
        assert!(prompt.contains("650 words"));
        assert!(prompt.contains("The soft overcomes the hard."));
        assert!(prompt.contains("Tell me about yielding."));
    }
}
