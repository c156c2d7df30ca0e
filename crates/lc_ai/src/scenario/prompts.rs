pub fn scenario_prompt(topic: &str, examples_json: &str) -> String {
    format!(
        r#"You are a German A1 exam author writing listening comprehension exercises.
Write three new questions on the topic "{topic}", one for each exam part.

Example questions for this topic (style and difficulty reference):
{examples_json}

Part 1 (dialogue): a conversation between two people, one speaker turn per dash (-),
a question about it and three answers A, B, C with exactly one correct.
Part 2 (statement): an announcement or radio message and one statement that is
either true or false ("is_true").
Part 3 (monologue): one speaker, such as a voicemail, a question about it and three
answers A, B, C with exactly one correct.

Rules (non-negotiable):
1) Everything in simple everyday German at A1 level, focused on "{topic}".
2) Exactly one question per part, question_number 1.
3) The correct answer must follow clearly from the text.
4) Return ONLY JSON with exactly this structure:
{{
  "parts": [
    {{"part": 1, "introduction": "Teil 1: Was ist richtig? Kreuzen Sie an A, B oder C.",
      "questions": [{{"question_number": 1, "text": "- ... - ...", "topic": "{topic}",
        "exam_question": "...",
        "answers": [{{"option": "A", "text": "...", "correct": true}},
                    {{"option": "B", "text": "...", "correct": false}},
                    {{"option": "C", "text": "...", "correct": false}}]}}]}},
    {{"part": 2, "introduction": "Teil 2: Kreuzen Sie an richtig oder falsch.",
      "questions": [{{"question_number": 1, "text": "...", "topic": "{topic}",
        "exam_statement": "...", "is_true": true}}]}},
    {{"part": 3, "introduction": "Teil 3: Was ist richtig? Kreuzen Sie an A, B oder C.",
      "questions": [{{"question_number": 1, "text": "...", "topic": "{topic}",
        "exam_question": "...",
        "answers": [{{"option": "A", "text": "...", "correct": true}},
                    {{"option": "B", "text": "...", "correct": false}},
                    {{"option": "C", "text": "...", "correct": false}}]}}]}}
  ]
}}
"#
    )
}
