use studydb_core::config::EmbeddingSettings;
use studydb_core::traits::Embedder;
use studydb_embed::{get_embedder, HashingEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = get_embedder(&EmbeddingSettings::default()).expect("embedder");
    assert_eq!(embedder.model_id(), "hash-v1-d384");

    let texts = vec!["Ohm's law: U = R × I".to_string(), "Ohm's law: U = R × I".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(v1, v2);
}

#[test]
fn related_texts_score_higher_than_unrelated() {
    let e = HashingEmbedder::new(384);
    let q = e.embed_one("What is Ohm's law?").unwrap();
    let near = e.embed_one("Ohm's law states that U = R × I").unwrap();
    let far = e.embed_one("Photosynthesis converts light into chemical energy").unwrap();
    assert!(cosine(&q, &near) > 0.35);
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn text_without_terms_is_zero_vector() {
    let e = HashingEmbedder::new(16);
    let v = e.embed_one("the of and ?").unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn model_id_tracks_dimension() {
    assert_eq!(HashingEmbedder::new(128).model_id(), "hash-v1-d128");
    assert_eq!(HashingEmbedder::new(128).dim(), 128);
}
