//! Prompt templates for the LLM-backed oracles.

use crate::types::FailedProbe;

pub const JSON_ONLY_SYSTEM: &str = "You must respond with valid JSON.";

/// Literal answer expected when memory holds no evidence.
pub const UNANSWERABLE: &str = "Unanswerable";

pub fn question_prompt(dialogue: &str, count: usize) -> String {
    format!(
        r#"Based on the following dialogue session, generate exactly {count} QA pairs
that test whether the key information from this session is properly remembered.
Answer with the fewest words possible.

Dialogue:
{dialogue}

Requirements:
1. Questions must cover key facts, people, events, times and places.
2. The answer must be the core factual keywords or phrase taken verbatim from the dialogue.
3. Keep the answer short but keep the details a careful reader would expect.
4. Return ONLY valid JSON, no comments, no code blocks.

Example items:
{{"question": "Which flight do they take from New York?", "answer": "JAL Flight 004"}}
{{"question": "When do they check out of the Park Hyatt?", "answer": "March 19th"}}

Return:
{{
    "qa_pairs": [
        {{"question": "...", "answer": "...", "category": "fact|opinion|relationship|plan|other", "focus_area": "..."}}
    ]
}}"#
    )
}

pub fn answer_prompt(memories: &str, question: &str) -> String {
    format!(
        r#"You retrieve accurate information from conversation memories.

Instructions:
1. Use ONLY the memories below; do not invent facts.
2. Pay attention to timestamps; if memories disagree, prefer the most recent one.
3. Answer with a short phrase of fewer than 7 words.
4. Reuse the exact keywords of the memories instead of paraphrasing.
5. Match the shape of the question: plural questions need plural answers, no missing key details.
6. If there is no relevant evidence, answer exactly "{UNANSWERABLE}".

Memories:
{memories}

Question: {question}

Answer:"#
    )
}

pub fn summarize_prompt(dialogue: &str) -> String {
    format!(
        r#"Analyze the following dialogue, extract its key information and summarize it into memories.

Dialogue:
{dialogue}

Return a JSON object:
{{
    "summary": "Brief summary of the dialogue (1-2 sentences)",
    "memories": [
        {{
            "content": "Detailed third-person memory with the key facts, people, events, times and places.",
            "timestamp": "YYYY-MM-DDTHH:MM:SS extracted or inferred from the dialogue"
        }}
    ]
}}

Requirements:
1. Keep every key detail: people, events, times, places, decisions, preferences.
2. Make each memory self-contained and searchable by its specific keywords.
3. Produce several memories when the dialogue covers several topics.
4. If the dialogue ends with a "Corrections" block, every correction must appear in some memory verbatim.

Return only the JSON object."#
    )
}

pub fn strategy_prompt(failed: &[FailedProbe], error_types: &[String], session_index: usize) -> String {
    let listed = failed
        .iter()
        .take(3)
        .map(|f| {
            let question: String = f.question.chars().take(100).collect();
            format!(
                "- Q: {question}  Expected: {}  Got: {}",
                f.true_answer, f.retrieved_answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Generate a memory update strategy for session {session_index}.

Failed QA pairs: {}
Error types: {}

Failed questions:
{listed}

Return JSON:
{{
    "memory_updates": [
        {{"reason": "why this update is needed", "proposed_content": "memory content to add", "priority": "high|medium|low"}}
    ],
    "extraction_improvements": ["..."],
    "improve_instructions": "overall instructions to improve memory extraction"
}}"#,
        failed.len(),
        error_types.join(", ")
    )
}
