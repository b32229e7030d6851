//! Tests for M4: Index Column Lifecycle and Flags
//! Covers TC-4.1, TC-4.2, TC-4.3
//!
//! Run individual tests with:
//! cargo test tc_4_1 -- --nocapture
//! cargo test m4_lifecycle -- --nocapture

use invcol::{
    Context, DataType, Database, Engine, Error, IndexColumn, IndexConfig, ObjectId,
    SearchOptions, TableConfig, TokenizerKind,
};
use serde_json::json;
use std::sync::Arc;

fn setup_db() -> (Arc<Database>, Arc<Context>) {
    let db = Arc::new(Database::new());
    let ctx = Context::new(db.clone());
    (db, ctx)
}

/// Articles with a vector `tags` column and a delimit-tokenized Tags lexicon
fn setup_tags(db: &Database) -> (ObjectId, ObjectId) {
    let articles = db.create_table(Some("Articles"), &TableConfig::array()).unwrap();
    db.define_column(articles, "tags", DataType::ShortText).unwrap();
    let tags = db
        .create_table(
            Some("Tags"),
            &TableConfig::patricia_trie(DataType::ShortText).tokenizer(TokenizerKind::Delimit),
        )
        .unwrap();
    (articles, tags)
}

mod tc_4_1_predicates {
    use super::*;

    #[test]
    fn test_index_is_neither_vector_nor_scalar() {
        let (db, ctx) = setup_db();
        let articles = db.create_table(Some("Articles"), &TableConfig::array()).unwrap();
        db.define_column(articles, "content", DataType::Text).unwrap();
        let terms = db
            .create_table(
                Some("Terms"),
                &TableConfig::hash(DataType::ShortText).tokenizer(TokenizerKind::Bigram),
            )
            .unwrap();
        db.define_index_column(terms, "content", articles, &IndexConfig::new().with_section())
            .unwrap();

        let index = IndexColumn::open(&ctx, "Terms.content").unwrap();
        assert!(index.is_index().unwrap());
        assert!(!index.is_vector().unwrap());
        assert!(!index.is_scalar().unwrap());
    }

    #[test]
    fn test_flags() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let pairs = [
            ("section", IndexConfig::new().with_section()),
            ("weight", IndexConfig::new().with_weight()),
            ("position", IndexConfig::new().with_position()),
            ("plain", IndexConfig::new()),
        ];
        for (name, config) in &pairs {
            db.define_index_column(tags, name, articles, &config.clone().source("Articles.tags"))
                .unwrap();
        }

        let open = |name: &str| IndexColumn::open(&ctx, name).unwrap();
        let section = open("Tags.section");
        let weight = open("Tags.weight");
        let position = open("Tags.position");
        let plain = open("Tags.plain");

        assert_eq!(
            [section.with_section().unwrap(), plain.with_section().unwrap()],
            [true, false]
        );
        assert_eq!(
            [weight.with_weight().unwrap(), plain.with_weight().unwrap()],
            [true, false]
        );
        assert_eq!(
            [position.with_position().unwrap(), plain.with_position().unwrap()],
            [true, false]
        );
    }

    #[test]
    fn test_vector_values_are_indexed_per_element() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        db.define_index_column(
            tags,
            "articles",
            articles,
            &IndexConfig::new().with_position().source("Articles.tags"),
        )
        .unwrap();
        let tags_column = ctx.lookup("Articles.tags").unwrap().id;
        let id = db.add_record(articles).unwrap();
        db.set_value(tags_column, id, json!(["rust", "search engine"])).unwrap();

        let mut index = IndexColumn::open(&ctx, "Tags.articles").unwrap();
        let hits = |index: &mut IndexColumn, q: &str| index.search(q, SearchOptions::new()).unwrap().keys();
        assert_eq!(hits(&mut index, "rust"), vec![id]);
        assert_eq!(hits(&mut index, "search engine"), vec![id]);
        // elements never join into one phrase
        assert!(hits(&mut index, "rust search").is_empty());
    }
}

mod tc_4_2_unbind {
    use super::*;

    #[test]
    fn test_non_owner_never_removes_column() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let column = db
            .define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();

        let mut index = IndexColumn::bind(&ctx, column, false).unwrap();
        index.unbind().unwrap();
        index.unbind().unwrap();
        drop(index);
        assert!(db.object(column).is_some());
    }

    #[test]
    fn test_owner_removes_column_once() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let column = db
            .define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();

        let mut index = IndexColumn::bind(&ctx, column, true).unwrap();
        assert!(index.is_owner());
        index.unbind().unwrap();
        assert!(db.lookup("Tags.idx").is_none());
        // second unbind and the drop hook are no-ops
        index.unbind().unwrap();
        drop(index);
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_drop_unbinds_owner() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let column = db
            .define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();
        {
            let _index = IndexColumn::bind(&ctx, column, true).unwrap();
        }
        assert!(db.object(column).is_none());
    }

    #[test]
    fn test_torn_down_context() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let column = db
            .define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();

        let mut index = IndexColumn::bind(&ctx, column, true).unwrap();
        drop(ctx);
        assert!(matches!(
            index.search("x", SearchOptions::new()),
            Err(Error::ContextClosed)
        ));
        index.unbind().unwrap();
        index.unbind().unwrap();
        assert!(db.object(column).is_some());
    }

    #[test]
    fn test_unbound_column_rejects_operations() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        let column = db
            .define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();
        let mut index = IndexColumn::bind(&ctx, column, false).unwrap();
        index.unbind().unwrap();
        assert!(matches!(index.add(1, "x", 1), Err(Error::ContextClosed)));
        assert!(matches!(index.sources(), Err(Error::ContextClosed)));
        assert!(index.scratch().is_none());
    }
}

mod tc_4_3_binding {
    use super::*;

    #[test]
    fn test_bind_missing_and_wrong_kind() {
        let (db, ctx) = setup_db();
        let (articles, _) = setup_tags(&db);
        assert!(matches!(
            IndexColumn::bind(&ctx, 4242, false),
            Err(Error::Resolution { .. })
        ));
        assert!(matches!(
            IndexColumn::bind(&ctx, articles, false),
            Err(Error::Argument { .. })
        ));
        assert!(matches!(
            IndexColumn::open(&ctx, "Tags.nothing"),
            Err(Error::Resolution { .. })
        ));
    }

    #[test]
    fn test_two_instances_share_the_column() {
        let (db, ctx) = setup_db();
        let (articles, tags) = setup_tags(&db);
        db.define_index_column(tags, "idx", articles, &IndexConfig::new())
            .unwrap();
        let id = db.add_record(articles).unwrap();

        let mut writer = IndexColumn::open(&ctx, "Tags.idx").unwrap();
        let mut reader = IndexColumn::open(&ctx, "Tags.idx").unwrap();
        writer.add(id, "shared", 1).unwrap();
        let result = reader.search("shared", SearchOptions::new()).unwrap();
        assert_eq!(result.keys(), vec![id]);
    }
}
