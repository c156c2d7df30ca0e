fn part_instruction(part: u8) -> &'static str {
    match part {
        1 => "This is Part 1 (Teil 1) of the A1 German listening exam.\n\
              Each variation must be a conversation between TWO people, one speaker turn per dash (-).\n\
              Each variation must have exactly THREE answers (A, B, C) with exactly ONE correct answer.",
        2 => "This is Part 2 (Teil 2) of the A1 German listening exam.\n\
              Each variation must be a MONOLOGUE (announcement, advertisement, radio message).\n\
              The question must be a STATEMENT that is either true or false; give it as \"is_true\".\n\
              Do not include multiple-choice answers.",
        _ => "This is Part 3 (Teil 3) of the A1 German listening exam.\n\
              Each variation must be a MONOLOGUE by a single speaker, such as a voicemail.\n\
              Each variation must have exactly THREE answers (A, B, C) with exactly ONE correct answer.",
    }
}

fn example_reply(part: u8) -> &'static str {
    match part {
        1 => r#"{"variations":[{"text":"- Guten Tag, was kostet diese Jacke? - 29,95 Euro. - Gibt es Rabatt? - Ja, heute 30 Prozent.","question":"Wie viel kostet die Jacke?","answers":[{"option":"A","text":"29,95 Euro","correct":true},{"option":"B","text":"39,95 Euro","correct":false},{"option":"C","text":"19,95 Euro","correct":false}]}]}"#,
        2 => r#"{"variations":[{"text":"Achtung, eine wichtige Durchsage: Das Restaurant im ersten Stock ist heute geschlossen.","question":"Das Restaurant ist heute geöffnet.","is_true":false}]}"#,
        _ => r#"{"variations":[{"text":"Guten Tag, hier ist eine Nachricht für Frau Weber. Ihr Termin morgen um 14 Uhr fällt leider aus.","question":"Wann ist der Termin?","answers":[{"option":"A","text":"Um 14 Uhr","correct":true},{"option":"B","text":"Um 15 Uhr","correct":false},{"option":"C","text":"Um 16 Uhr","correct":false}]}]}"#,
    }
}

pub fn variations_prompt(part: u8, context: &str, question: &str, n: usize) -> String {
    let instruction = part_instruction(part);
    let example = example_reply(part);
    format!(
        r#"You generate variations of German A1 listening exam questions.

Generate {n} variations of this question.

Original context:
{context}

Original question:
{question}

{instruction}

Rules:
1) Keep all text in German at A1 difficulty.
2) Every variation has exactly one "text" and one "question" field.
3) Reply with a single-line JSON object and nothing else, in exactly this format:
{example}
"#
    )
}
