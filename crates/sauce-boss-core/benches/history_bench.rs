use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sauce_boss_core::{
    handle_request, ActionableHistory, ContentStore, HistoryEntry, RequestEnvelope, SauceId,
    SauceSelection, SessionState,
};

fn mk_entry(index: usize) -> HistoryEntry {
    match index % 4 {
        0 => HistoryEntry::launch(),
        1 => HistoryEntry::help(),
        2 => HistoryEntry::passive(),
        _ => HistoryEntry::recipe_intent(
            SauceSelection::resolved(SauceId::ALL[index % SauceId::ALL.len()]),
            true,
        ),
    }
}

fn bench_history(c: &mut Criterion) {
    let entries = (0..1_000).map(mk_entry).collect::<Vec<_>>();

    c.bench_function("record_and_find_previous_1000_turns", |b| {
        b.iter(|| {
            let mut history = ActionableHistory::new();
            let mut replays = 0_usize;
            for entry in &entries {
                history.record_if_actionable(entry.clone());
                if history.find_previous().is_some() {
                    replays += 1;
                }
            }
            replays
        });
    });
}

fn embedded_content() -> ContentStore {
    match ContentStore::embedded("en") {
        Ok(content) => content,
        Err(err) => panic!("embedded content failed to load: {err}"),
    }
}

fn bench_resolve(c: &mut Criterion) {
    let content = embedded_content();
    let tags = ["en-US", "en-GB", "fr-CA", "fr-FR", "de-DE", "es-MX", "ja-JP"];

    c.bench_function("resolve_or_default_7_tags", |b| {
        b.iter(|| {
            tags.iter()
                .map(|tag| content.resolve_or_default(Some(*tag)).recipes.len())
                .sum::<usize>()
        });
    });
}

fn bench_turn(c: &mut Criterion) {
    let content = embedded_content();
    let envelope: RequestEnvelope = match serde_json::from_str(
        r#"{
            "session": { "new": false, "sessionId": "bench" },
            "context": { "System": { "device": { "supportedInterfaces": {
                "Alexa.Presentation.APL": {}
            } } } },
            "request": {
                "type": "Alexa.Presentation.APL.UserEvent",
                "locale": "fr-CA",
                "arguments": ["sauceInstructions", "CRA"]
            }
        }"#,
    ) {
        Ok(envelope) => envelope,
        Err(err) => panic!("benchmark envelope failed to parse: {err}"),
    };

    c.bench_function("screen_recipe_turn_fr_ca", |b| {
        let mut rng = StdRng::seed_from_u64(3);
        b.iter(|| {
            let mut state = SessionState::default();
            handle_request(&envelope, &content, &mut state, &mut rng)
        });
    });
}

criterion_group!(skill_benches, bench_history, bench_resolve, bench_turn);
criterion_main!(skill_benches);
