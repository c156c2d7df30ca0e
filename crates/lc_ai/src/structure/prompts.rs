pub fn structure_prompt(transcript: &str) -> String {
    format!(
        r#"You are a German language expert. Turn this German A1 listening comprehension
transcript into structured exam data: every exam part with its questions, and an exam
question (or statement) for each text.

Rules (non-negotiable):
1) Skip the narrator's examples ("Beispiel"); keep only the exam questions.
2) Remove "[Musik]", applause and other non-conversational notes, and question number
   prefixes such as "Nummer eins".
3) Part 1 texts are conversations: one speaker turn per dash (-), proper punctuation.
   Give an exam_question and three answers A, B, C with exactly one correct.
4) Part 2 texts are announcements: give an exam_statement that is clearly true or false
   from the text, and "is_true".
5) Part 3 texts are monologues by one speaker: give an exam_question and three answers
   A, B, C with exactly one correct.
6) The correct answer must follow clearly from the text.
7) Return ONLY JSON with exactly this structure:
{{
  "parts": [
    {{"part": 1, "introduction": "Teil 1: Was ist richtig? Kreuzen Sie an A, B oder C. Sie hören jeden Text zweimal.",
      "questions": [{{"question_number": 1,
        "text": "- Entschuldigung, was kostet dieser Pullover jetzt? - Einen Moment bitte. 19,95 Euro. - Okay, den nehme ich.",
        "exam_question": "Wie viel kostet der Pullover?",
        "answers": [{{"option": "A", "text": "19,95 Euro", "correct": true}},
                    {{"option": "B", "text": "29,95 Euro", "correct": false}},
                    {{"option": "C", "text": "39,95 Euro", "correct": false}}]}}]}},
    {{"part": 2, "introduction": "Teil 2: Kreuzen Sie an richtig oder falsch. Sie hören jeden Text einmal.",
      "questions": [{{"question_number": 1, "text": "...", "exam_statement": "...", "is_true": true}}]}},
    {{"part": 3, "introduction": "Teil 3: Was ist richtig? Kreuzen Sie an A, B oder C. Sie hören jeden Text zweimal.",
      "questions": [{{"question_number": 1, "text": "...", "exam_question": "...",
        "answers": [{{"option": "A", "text": "...", "correct": true}},
                    {{"option": "B", "text": "...", "correct": false}},
                    {{"option": "C", "text": "...", "correct": false}}]}}]}}
  ]
}}

Transcript:
{transcript}
"#
    )
}
