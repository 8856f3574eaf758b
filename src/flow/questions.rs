use crate::session::model::QUESTION_COUNT;

/// A fixed quiz question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: u8,
    pub prompt: &'static str,
    pub hint: &'static str,
    accepted: &'static [&'static str],
}

pub const QUESTIONS: [Question; QUESTION_COUNT as usize] = [
    Question {
        id: 1,
        prompt: "What is the capital of France?",
        hint: "A city on the Seine",
        accepted: &["paris"],
    },
    Question {
        id: 2,
        prompt: "Which planet is known as the red planet?",
        hint: "Fourth from the sun",
        accepted: &["marte", "mars"],
    },
    Question {
        id: 3,
        prompt: "How many sides does a hexagon have?",
        hint: "One more than a pentagon",
        accepted: &["6", "seis", "six"],
    },
];

pub fn question(id: u8) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Case- and accent-insensitive match against the answer key
pub fn is_accepted(question_id: u8, answer: &str) -> bool {
    let normalized = normalize(answer);
    question(question_id).is_some_and(|q| q.accepted.iter().any(|a| *a == normalized))
}

fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}
