//! Tests for M3: Query Normalization and Search
//! Covers TC-3.1, TC-3.2, TC-3.3, TC-3.4
//!
//! Run individual tests with:
//! cargo test tc_3_1 -- --nocapture
//! cargo test m3_search -- --nocapture

use invcol::{
    CompiledQuery, Context, DataType, Database, Engine, IndexColumn, IndexConfig, ObjectId, RecordId,
    ResultTable, SearchMode, SearchOptions, SelectOperator, TableConfig, TokenizerKind,
};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    db: Arc<Database>,
    _ctx: Arc<Context>,
    index: IndexColumn,
    content: ObjectId,
    ids: Vec<RecordId>,
}

fn setup_index(tokenizer: TokenizerKind, texts: &[&str]) -> Fixture {
    let db = Arc::new(Database::new());
    let ctx = Context::new(db.clone());
    let articles = db.create_table(Some("Articles"), &TableConfig::array()).unwrap();
    let content = db.define_column(articles, "content", DataType::Text).unwrap();
    let terms = db
        .create_table(
            Some("Terms"),
            &TableConfig::patricia_trie(DataType::ShortText).tokenizer(tokenizer),
        )
        .unwrap();
    db.define_index_column(
        terms,
        "content",
        articles,
        &IndexConfig::new().with_position().source("Articles.content"),
    )
    .unwrap();
    let ids = texts
        .iter()
        .map(|text| {
            let id = db.add_record(articles).unwrap();
            db.set_value(content, id, json!(text)).unwrap();
            id
        })
        .collect();
    let index = IndexColumn::open(&ctx, "Terms.content").unwrap();
    Fixture { db, _ctx: ctx, index, content, ids }
}

/// Content of every matching record, in record order
fn contents(f: &mut Fixture, query: &str) -> Vec<String> {
    f.index
        .search(query, SearchOptions::new())
        .unwrap()
        .keys()
        .into_iter()
        .filter_map(|id| f.db.value(f.content, id))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

mod tc_3_1_ngram {
    use super::*;

    #[test]
    fn test_shorter_query_than_ngram() {
        let mut f = setup_index(TokenizerKind::Bigram, &["l", "ll", "hello"]);
        assert_eq!(contents(&mut f, "he"), vec!["hello"]);
        assert_eq!(contents(&mut f, "ll"), vec!["ll", "hello"]);
        assert_eq!(contents(&mut f, "l"), vec!["l", "ll", "hello"]);
    }

    #[test]
    fn test_phrase_order_matters() {
        let mut f = setup_index(TokenizerKind::Bigram, &["full text search", "text full search"]);
        assert_eq!(contents(&mut f, "full text"), vec!["full text search"]);
        assert_eq!(contents(&mut f, "text full"), vec!["text full search"]);
    }

    #[test]
    fn test_multibyte_text() {
        let mut f = setup_index(
            TokenizerKind::Bigram,
            &["全文検索エンジン", "データストア"],
        );
        assert_eq!(contents(&mut f, "エンジン"), vec!["全文検索エンジン"]);
        assert!(contents(&mut f, "エンジニア").is_empty());
    }
}

mod tc_3_2_operators {
    use super::*;

    fn setup_sets() -> Fixture {
        // "a" matches the first two records, "b" the last two
        setup_index(TokenizerKind::Delimit, &["a", "a b", "b"])
    }

    #[test]
    fn test_and_keeps_intersection() {
        let Fixture { mut index, ids, _ctx, .. } = setup_sets();
        let mut result = index.search("a", SearchOptions::new()).unwrap();
        assert_eq!(result.keys(), vec![ids[0], ids[1]]);
        index
            .search_into("b", &mut result, SearchOptions::new().operator(SelectOperator::And))
            .unwrap();
        assert_eq!(result.keys(), vec![ids[1]]);
    }

    #[test]
    fn test_and_not_removes_matches() {
        let Fixture { mut index, ids, _ctx, .. } = setup_sets();
        let mut result = index.search("a", SearchOptions::new()).unwrap();
        index
            .search_into("b", &mut result, SearchOptions::new().operator(SelectOperator::AndNot))
            .unwrap();
        assert_eq!(result.keys(), vec![ids[0]]);
    }

    #[test]
    fn test_or_accumulates_scores() {
        let Fixture { mut index, ids, _ctx, .. } = setup_sets();
        let mut result = index.search("a", SearchOptions::new()).unwrap();
        index
            .search_into("b", &mut result, SearchOptions::new().operator("||".parse().unwrap()))
            .unwrap();
        assert_eq!(result.keys(), ids);
        assert_eq!(result.score(ids[1]), Some(2));
        assert_eq!(result.score(ids[2]), Some(1));
    }

    #[test]
    fn test_adjust_never_inserts() {
        let Fixture { mut index, ids, _ctx, .. } = setup_sets();
        let mut result = index.search("a", SearchOptions::new()).unwrap();
        let options = SearchOptions::from_json(&json!({"operator": ">"})).unwrap();
        index.search_into("b", &mut result, options).unwrap();
        assert_eq!(result.keys(), vec![ids[0], ids[1]]);
        assert_eq!(result.score(ids[1]), Some(2));
    }

    #[test]
    fn test_accumulated_table_survives_engine_failure() {
        let Fixture { db, mut index, ids, _ctx: ctx, .. } = setup_sets();
        let mut result = index.search("a", SearchOptions::new()).unwrap();
        db.remove_object(&ctx, index.id()).unwrap();
        let err = index
            .search_into("b", &mut result, SearchOptions::new())
            .unwrap_err();
        assert!(matches!(err, invcol::Error::Engine { .. }));
        assert_eq!(result.keys(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn test_missing_result_creates_new_table() {
        let Fixture { mut index, ids, _ctx, .. } = setup_sets();
        let options = SearchOptions::new().operator(SelectOperator::And);
        // a fresh table is empty, so AND leaves nothing
        assert!(index.search("a", options).unwrap().is_empty());
        let result = index.search("b", SearchOptions::new()).unwrap();
        assert_eq!(result.keys(), vec![ids[1], ids[2]]);
    }
}

mod tc_3_3_query_forms {
    use super::*;
    use invcol::Error;

    #[test]
    fn test_term_id_query() {
        let Fixture { db, mut index, ids, _ctx, .. } = setup_index(TokenizerKind::Delimit, &["x y", "y"]);
        let y = db.record_id(index.domain(), "y").unwrap();
        let result = index.search(y, SearchOptions::new()).unwrap();
        assert_eq!(result.keys(), ids);
        assert_eq!(index.scratch().unwrap().id_query().as_u32(), Some(y));
    }

    #[test]
    fn test_byte_query_must_be_utf8() {
        let Fixture { mut index, _ctx, .. } = setup_index(TokenizerKind::Delimit, &["x"]);
        let err = index.search(&b"\xc3\x28"[..], SearchOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
        let ok = index.search(&b"x"[..], SearchOptions::new()).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_compiled_query() {
        let Fixture { mut index, ids, _ctx, .. } =
            setup_index(TokenizerKind::Delimit, &["rust index", "rust search", "ruby search"]);
        let query = CompiledQuery::new().term("search").and("rust");
        assert_eq!(index.search(&query, SearchOptions::new()).unwrap().keys(), vec![ids[1]]);

        let query = CompiledQuery::new()
            .prefix(SelectOperator::Or, "ru")
            .but("index")
            .adjust("ruby");
        let result = index.search(&query, SearchOptions::new()).unwrap();
        assert_eq!(result.keys(), vec![ids[1], ids[2]]);
        assert_eq!(result.score(ids[2]), Some(2));
    }

    #[test]
    fn test_result_with_wrong_key_table() {
        let Fixture { mut index, _ctx, .. } = setup_index(TokenizerKind::Delimit, &["x"]);
        let mut wrong = ResultTable::new(index.domain());
        assert!(index.search_into("x", &mut wrong, SearchOptions::new()).is_err());
    }
}

mod tc_3_4_search_modes {
    use super::*;

    #[test]
    fn test_prefix_and_suffix() {
        let Fixture { mut index, ids, _ctx, .. } =
            setup_index(TokenizerKind::Delimit, &["searching", "research", "index"]);
        let prefix = index
            .search("search", SearchOptions::new().mode(SearchMode::Prefix))
            .unwrap();
        assert_eq!(prefix.keys(), vec![ids[0]]);

        let suffix = index
            .search("search", SearchOptions::new().mode(SearchMode::Suffix))
            .unwrap();
        assert_eq!(suffix.keys(), vec![ids[1]]);

        let exact = index.search("search", SearchOptions::new()).unwrap();
        assert!(exact.is_empty());
    }
}
