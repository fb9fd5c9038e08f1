//! Property tests for the in-memory vector store.

use std::collections::HashMap;

use nexus_rag::document::Chunk;
use nexus_rag::inmemory::InMemoryVectorStore;
use nexus_rag::vectorstore::{CollectionInfo, VectorStore};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn arb_chunks(dim: usize) -> impl Strategy<Value = Vec<Chunk>> {
    proptest::collection::hash_map("[a-z]{3,8}", arb_normalized_embedding(dim), 1..20).prop_map(
        |by_id| {
            by_id
                .into_iter()
                .map(|(id, embedding)| Chunk {
                    text: format!("text for {id}"),
                    id,
                    embedding,
                    metadata: HashMap::new(),
                    document_id: "doc_1".to_string(),
                })
                .collect()
        },
    )
}

mod prop_inmemory_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Search returns at most `top_k` results in descending score order.
        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            chunks in arb_chunks(DIM),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", &CollectionInfo::new(DIM, "test")).await.unwrap();
                store.upsert("test", &chunks).await.unwrap();
                let results = store.search("test", &query, top_k).await.unwrap();
                (results, store.count("test").await.unwrap())
            });

            prop_assert_eq!(count, chunks.len());
            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        /// Querying with a stored embedding finds that chunk with a perfect score.
        #[test]
        fn stored_embedding_is_its_own_best_match(
            chunks in arb_chunks(DIM),
            pick in any::<prop::sample::Index>(),
        ) {
            let target = &chunks[pick.index(chunks.len())];
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", &CollectionInfo::new(DIM, "test")).await.unwrap();
                store.upsert("test", &chunks).await.unwrap();
                store.search("test", &target.embedding, 1).await.unwrap()
            });

            prop_assert_eq!(results.len(), 1);
            prop_assert!((results[0].score - 1.0).abs() < 1e-4);
        }
    }
}

#[tokio::test]
async fn dropping_a_collection_empties_it() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", &CollectionInfo::new(2, "test")).await.unwrap();
    let chunk = Chunk {
        id: "a".into(),
        text: "a".into(),
        embedding: vec![1.0, 0.0],
        metadata: HashMap::new(),
        document_id: "a".into(),
    };
    store.upsert("docs", &[chunk.clone()]).await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 1);

    store.delete_collection("docs").await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 0);
    assert!(store.upsert("docs", &[chunk]).await.is_err());

    store.create_collection("docs", &CollectionInfo::new(2, "test")).await.unwrap();
    store.create_collection("docs", &CollectionInfo::new(2, "test")).await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 0);
}
