mod helpers;

use agriqa::corpus::AnswerCorpus;
use agriqa::ingest::{ingest, IngestOptions};
use agriqa::retrieval::{RetrieveOptions, Retriever};
use agriqa::store::{Collection, Metadata, VectorStore};
use helpers::*;

fn category(value: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("category".into(), value.into());
    m
}

fn options(n_results: usize) -> RetrieveOptions {
    RetrieveOptions {
        n_results,
        ..RetrieveOptions::default()
    }
}

/// Four answered entries at increasing distance from the query `[1, 0]`.
fn graded(client: &agriqa::store::VectorStoreClient) -> (Collection, AnswerCorpus) {
    let c = collection(client, "graded");
    c.add_embeddings(
        &ids(&["near", "close", "mid", "far"]),
        &[
            vec![0.99, 0.0],
            vec![0.95, 0.1],
            vec![0.8, 0.6],
            vec![0.0, 1.0],
        ],
        None,
    )
    .unwrap();
    let answers = AnswerCorpus::new(vec![
        answer("near", "Near?", "n"),
        answer("close", "Close?", "c"),
        answer("mid", "Mid?", "m"),
        answer("far", "Far?", "f"),
    ]);
    (c, answers)
}

fn query_embedder() -> FakeEmbedder {
    FakeEmbedder::new(&[("query", &[1.0, 0.0]), ("elsewhere", &[-1.0, -1.0])])
}

#[test]
fn maize_question_finds_answered_match() {
    let client = client();
    let embedder = maize_embedder();
    ingest(&embedder, &client, &maize_questions(), "agri", &IngestOptions::default()).unwrap();
    let c = client.get_collection("agri").unwrap();

    let result = Retriever::new(&embedder, &c)
        .retrieve(PLANT_QUERY, &maize_answers(), &options(1))
        .unwrap();

    assert_eq!(result.ids, vec!["q1"]);
    assert_eq!(result.similar_questions, vec![PLANT_Q]);
    assert_eq!(result.answers, vec![vec![PLANT_ANSWER.to_string()]]);
    assert_eq!(result.distances.len(), 1);
}

#[test]
fn unanswered_top_hit_is_dropped() {
    let client = client();
    let embedder = maize_embedder();
    ingest(&embedder, &client, &maize_questions(), "agri", &IngestOptions::default()).unwrap();
    let c = client.get_collection("agri").unwrap();

    // q2 ranks first but has no answer row
    let hits = c.query(&[0.1, 0.9], 1, &[]).unwrap();
    assert_eq!(hits.ids, vec!["q2"]);

    let result = Retriever::new(&embedder, &c)
        .retrieve(FERTILIZER_QUERY, &maize_answers(), &options(1))
        .unwrap();
    assert!(result.is_empty());
    assert!(result.similar_questions.is_empty());
    assert!(result.answers.is_empty());
    assert!(result.distances.is_empty());

    // with room for both, only the answered one survives
    let result = Retriever::new(&embedder, &c)
        .retrieve(FERTILIZER_QUERY, &maize_answers(), &options(2))
        .unwrap();
    assert_eq!(result.ids, vec!["q1"]);
}

#[test]
fn results_are_ranked_by_ascending_distance() {
    let client = client();
    let (c, answers) = graded(&client);
    let result = Retriever::new(&query_embedder(), &c)
        .retrieve("query", &answers, &options(4))
        .unwrap();

    assert_eq!(result.ids, vec!["near", "close", "mid", "far"]);
    assert!(result.distances.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn sequences_stay_parallel_and_bounded() {
    let client = client();
    let (c, answers) = graded(&client);
    let result = Retriever::new(&query_embedder(), &c)
        .retrieve("query", &answers, &options(2))
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.similar_questions.len(), 2);
    assert_eq!(result.answers.len(), 2);
    assert_eq!(result.distances.len(), 2);
}

#[test]
fn threshold_prunes_distant_matches() {
    let client = client();
    let (c, answers) = graded(&client);
    let result = Retriever::new(&query_embedder(), &c)
        .retrieve(
            "query",
            &answers,
            &RetrieveOptions {
                n_results: 4,
                distance_threshold: Some(0.3),
                ..RetrieveOptions::default()
            },
        )
        .unwrap();

    assert_eq!(result.ids, vec!["near", "close"]);
    assert!(result.distances.iter().all(|d| *d <= 0.3));
}

#[test]
fn zero_threshold_without_exact_match_is_empty() {
    let client = client();
    let (c, answers) = graded(&client);
    let result = Retriever::new(&query_embedder(), &c)
        .retrieve(
            "elsewhere",
            &answers,
            &RetrieveOptions {
                n_results: 4,
                distance_threshold: Some(0.0),
                ..RetrieveOptions::default()
            },
        )
        .unwrap();

    assert!(result.ids.is_empty());
    assert!(result.similar_questions.is_empty());
    assert!(result.answers.is_empty());
    assert!(result.distances.is_empty());
}

#[test]
fn no_threshold_keeps_every_answered_hit() {
    let client = client();
    let (c, answers) = graded(&client);
    let result = Retriever::new(&query_embedder(), &c)
        .retrieve("elsewhere", &answers, &options(4))
        .unwrap();
    assert_eq!(result.len(), 4);
}

#[test]
fn answers_truncated_to_n_results_in_corpus_order() {
    let client = client();
    let c = collection(&client, "many");
    c.add_embeddings(&ids(&["q1"]), &[vec![1.0, 0.0]], None)
        .unwrap();
    let answers = AnswerCorpus::new(
        (1..=5)
            .map(|i| answer("q1", "How to irrigate?", &format!("answer {i}")))
            .collect(),
    );

    let result = Retriever::new(&query_embedder(), &c)
        .retrieve("query", &answers, &options(2))
        .unwrap();

    assert_eq!(result.answers, vec![vec!["answer 1".to_string(), "answer 2".to_string()]]);
}

#[test]
fn topic_filter_returns_only_matching_categories() {
    let client = client();
    let c = collection(&client, "topics");
    c.add_embeddings(
        &ids(&["irr", "soil", "both", "fert", "none"]),
        &[
            vec![0.9, 0.1],
            vec![0.8, 0.2],
            vec![0.7, 0.3],
            vec![1.0, 0.0],
            vec![1.0, 0.01],
        ],
        Some(&[
            category("irrigation"),
            category("soil"),
            category("irrigation,soil"),
            category("fertilizer"),
            Metadata::new(),
        ]),
    )
    .unwrap();
    let answers = AnswerCorpus::new(vec![
        answer("irr", "I?", "i"),
        answer("soil", "S?", "s"),
        answer("both", "B?", "b"),
        answer("fert", "F?", "f"),
        answer("none", "N?", "n"),
    ]);

    let result = Retriever::new(&query_embedder(), &c)
        .retrieve(
            "query",
            &answers,
            &RetrieveOptions {
                n_results: 10,
                topics: vec!["irrigation".into(), "soil".into()],
                distance_threshold: None,
            },
        )
        .unwrap();

    assert_eq!(result.ids, vec!["irr", "soil", "both"]);
}

#[test]
fn single_topic_excludes_combined_category() {
    let client = client();
    let c = collection(&client, "single");
    c.add_embeddings(
        &ids(&["irr", "both"]),
        &[vec![0.9, 0.1], vec![1.0, 0.0]],
        Some(&[category("irrigation"), category("irrigation,soil")]),
    )
    .unwrap();

    let hits = c.query(&[1.0, 0.0], 10, &["irrigation".to_string()]).unwrap();
    assert_eq!(hits.ids, vec!["irr"]);
}
