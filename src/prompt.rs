/// The instruction sent upstream for a single word.
///
/// The wording can change freely; what matters is the shape it asks for, which must stay in
/// step with [`crate::models::EnrichmentResponse`].
pub fn build_prompt(word: &str) -> String {
    format!(
        r#"You are a helpful German language assistant.
A user has provided the following German word or phrase: "{word}".
Your task is to correct any spelling mistakes and provide a structured JSON response.
The JSON object must have these exact keys:
- "correctedGerman": The grammatically correct German word or phrase.
- "englishTranslation": The common English translation.
- "examples": An array of exactly 3 simple, conversational German sentences using the word, each with its English translation. Each object in the array must have "german" and "english" keys.

Example response for the input "Bibliotek":
{{
  "correctedGerman": "die Bibliothek",
  "englishTranslation": "the library",
  "examples": [
    {{ "german": "Ich gehe in die Bibliothek.", "english": "I am going to the library." }},
    {{ "german": "Die Bibliothek ist heute geschlossen.", "english": "The library is closed today." }},
    {{ "german": "Wo ist die nächste Bibliothek?", "english": "Where is the nearest library?" }}
  ]
}}

Now, generate the response for: "{word}".
Ensure the output is ONLY the JSON object, with no other text or markdown formatting."#
    )
}
