use crate::session::{Cloze, ContentItem};
use crate::store::InMemoryStore;

pub const DEMO_GREETINGS_LESSON: &str = "es-greetings-1";
pub const DEMO_TRAVEL_LESSON: &str = "es-travel-1";

fn item(
    id: &str,
    term: &str,
    translation: &str,
    distractors: &[&str],
    cloze: Option<(&str, &str)>,
    audio: bool,
) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        term: term.to_string(),
        translation: translation.to_string(),
        distractors: distractors.iter().map(|d| d.to_string()).collect(),
        cloze: cloze.map(|(text, answer)| Cloze {
            text: text.to_string(),
            answer: answer.to_string(),
        }),
        audio_ref: audio.then(|| format!("audio/es/{id}.mp3")),
    }
}

pub fn demo_lessons() -> Vec<(&'static str, Vec<ContentItem>)> {
    vec![
        (
            DEMO_GREETINGS_LESSON,
            vec![
                item("es-hola", "hola", "hello", &["goodbye", "thanks"], None, true),
                item("es-adios", "adiós", "goodbye", &["hello", "please"], None, true),
                item(
                    "es-gracias",
                    "gracias",
                    "thank you",
                    &["sorry", "please"],
                    Some(("Muchas ___ por la ayuda", "gracias")),
                    true,
                ),
                item("es-por-favor", "por favor", "please", &["thank you", "excuse me"], None, false),
            ],
        ),
        (
            DEMO_TRAVEL_LESSON,
            vec![
                item(
                    "es-estacion",
                    "estación",
                    "station",
                    &["airport", "street"],
                    Some(("¿Dónde está la ___ de tren?", "estación")),
                    true,
                ),
                item("es-billete", "billete", "ticket", &["seat", "suitcase"], None, true),
                item("es-maleta", "maleta", "suitcase", &["ticket", "passport"], None, false),
            ],
        ),
    ]
}

pub fn seed_demo_catalog(store: &InMemoryStore) {
    for (lesson_id, items) in demo_lessons() {
        let count = items.len();
        store.insert_lesson(lesson_id, items);
        tracing::debug!(lesson_id, items = count, "seeded demo lesson");
    }
}
