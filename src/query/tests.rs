use std::sync::Arc;

use mongodb::bson::{Document, doc};

use super::*;
use crate::collection::testing::FlakyCollection;
use crate::collection::{CollectionHandle, MemoryCollection};
use crate::error::{MongoviewError, QueryError};

fn numbered(n: i32) -> Arc<MemoryCollection> {
    Arc::new(MemoryCollection::with_documents(
        "numbers",
        (0..n).map(|i| doc! { "_id": i, "n": i, "even": i % 2 == 0 }).collect(),
    ))
}

fn cursor_over(collection: Arc<MemoryCollection>, items_per_page: u32) -> PageCursor {
    PageCursor::new(collection, QuerySpec::new(items_per_page).unwrap())
}

fn ids(docs: &[Document]) -> Vec<i32> {
    docs.iter().map(|d| d.get_i32("_id").unwrap()).collect()
}

#[tokio::test]
async fn test_twenty_five_documents_ten_per_page() {
    let mut cursor = cursor_over(numbered(25), 10);
    cursor.update().await.unwrap();
    assert_eq!(cursor.page_count(), 3);
    assert_eq!(cursor.total(), 25);
    assert_eq!(cursor.row_count(), 10);

    cursor.set_page(3);
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 3);
    assert_eq!(ids(&cursor.documents()), vec![20, 21, 22, 23, 24]);
}

#[tokio::test]
async fn test_empty_collection_is_page_one_of_one() {
    let mut cursor = cursor_over(numbered(0), 10);
    cursor.set_page(4);
    cursor.update().await.unwrap();
    assert_eq!(cursor.page_count(), 1);
    assert_eq!(cursor.page(), 1);
    assert!(cursor.documents().is_empty());
    assert!(!cursor.has_previous());
    assert!(!cursor.has_next());
}

#[tokio::test]
async fn test_page_bounds_and_sizes_hold_for_many_shapes() {
    for total in [0, 1, 9, 10, 11, 37, 100] {
        for per_page in [1, 3, 10, 20, 50, 100] {
            let mut cursor = cursor_over(numbered(total), per_page);
            cursor.update().await.unwrap();
            let expected_pages = (total as u64).div_ceil(u64::from(per_page)).max(1);
            assert_eq!(cursor.page_count(), expected_pages, "total={total} per_page={per_page}");

            let mut seen = 0usize;
            for page in 1..=expected_pages {
                cursor.set_page(page);
                cursor.update().await.unwrap();
                assert!(1 <= cursor.page() && cursor.page() <= cursor.page_count());
                let rows = cursor.row_count();
                if page < expected_pages {
                    assert_eq!(rows, per_page as usize);
                } else {
                    assert_eq!(rows, total as usize - per_page as usize * (page as usize - 1));
                }
                seen += rows;
            }
            assert_eq!(seen, total as usize);
        }
    }
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let mut cursor = cursor_over(numbered(30), 7);
    cursor.set_page(2);
    cursor.update().await.unwrap();
    let first = cursor.snapshot();
    cursor.update().await.unwrap();
    assert_eq!(*cursor.snapshot(), *first);
}

#[tokio::test]
async fn test_page_clamped_after_shrinking_result() {
    let mut cursor = cursor_over(numbered(25), 10);
    cursor.set_page(3);
    cursor.update().await.unwrap();

    cursor.set_criteria(Some(doc! { "n": { "$lt": 12 } }));
    cursor.update().await.unwrap();
    assert_eq!(cursor.page_count(), 2);
    assert_eq!(cursor.page(), 2);
    assert_eq!(ids(&cursor.documents()), vec![10, 11]);

    cursor.set_items_per_page(50).unwrap();
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 1);
    assert_eq!(cursor.row_count(), 12);
}

#[tokio::test]
async fn test_page_zero_is_clamped_to_first() {
    let mut cursor = cursor_over(numbered(5), 2);
    cursor.set_page(0);
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 1);
    assert_eq!(cursor.requested_page(), 1);
}

#[tokio::test]
async fn test_projection_and_sort_applied_to_page() {
    let mut cursor = cursor_over(numbered(6), 2);
    cursor.set_criteria(Some(doc! { "even": true }));
    cursor.set_sort(Some(doc! { "n": -1 }));
    cursor.set_projection(Some(doc! { "n": 1, "_id": 0 }));
    cursor.update().await.unwrap();
    assert_eq!(cursor.total(), 3);
    assert_eq!(cursor.documents(), vec![doc! { "n": 4 }, doc! { "n": 2 }]);
}

#[tokio::test]
async fn test_empty_documents_mean_unset() {
    let mut with_none = cursor_over(numbered(12), 5);
    let mut with_empty = cursor_over(numbered(12), 5);
    with_empty.set_criteria(Some(Document::new()));
    with_empty.set_projection(Some(Document::new()));
    with_empty.set_sort(Some(Document::new()));
    with_none.update().await.unwrap();
    with_empty.update().await.unwrap();
    assert_eq!(*with_none.snapshot(), *with_empty.snapshot());
}

#[tokio::test]
async fn test_failed_update_keeps_previous_state() {
    let flaky = Arc::new(FlakyCollection::new(MemoryCollection::with_documents(
        "numbers",
        (0..15).map(|i| doc! { "_id": i }).collect(),
    )));
    let handle: Arc<dyn CollectionHandle> = flaky.clone();
    let mut cursor = PageCursor::new(handle, QuerySpec::new(10).unwrap());
    cursor.update().await.unwrap();
    let before = cursor.snapshot();

    flaky.fail_reads(true);
    cursor.set_page(2);
    let err = cursor.update().await.unwrap_err();
    assert!(matches!(err, MongoviewError::Query(QueryError::Unavailable(_))));
    assert_eq!(*cursor.snapshot(), *before);
    assert_eq!(cursor.page(), 1);

    flaky.fail_reads(false);
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 2);
    assert_eq!(cursor.row_count(), 5);
}

#[tokio::test]
async fn test_documents_returns_a_copy() {
    let mut cursor = cursor_over(numbered(3), 10);
    cursor.update().await.unwrap();
    let mut docs = cursor.documents();
    docs.clear();
    assert_eq!(cursor.row_count(), 3);
}

#[tokio::test]
async fn test_row_value_out_of_range() {
    let mut cursor = cursor_over(numbered(3), 10);
    cursor.update().await.unwrap();
    assert_eq!(cursor.row_value(2).unwrap().get_i32("_id").unwrap(), 2);
    match cursor.row_value(3) {
        Err(MongoviewError::IndexOutOfRange { index, len }) => {
            assert_eq!((index, len), (3, 3));
        }
        other => panic!("expected IndexOutOfRange, got {:?}", other),
    }
}

#[tokio::test]
async fn test_navigation_helpers() {
    let mut cursor = cursor_over(numbered(25), 10);
    cursor.update().await.unwrap();
    assert!(cursor.has_next());
    assert!(!cursor.has_previous());

    cursor.next();
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 2);

    cursor.last();
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 3);
    assert!(!cursor.has_next());

    cursor.next();
    assert_eq!(cursor.requested_page(), 3);

    cursor.previous();
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 2);

    cursor.first();
    cursor.update().await.unwrap();
    assert_eq!(cursor.page(), 1);
}

#[tokio::test]
async fn test_mutations_then_reload() {
    let collection = numbered(11);
    let mut cursor = cursor_over(collection.clone(), 5);
    cursor.set_page(3);
    cursor.update().await.unwrap();
    assert_eq!(ids(&cursor.documents()), vec![10]);

    assert_eq!(cursor.remove_row(0).await.unwrap(), 1);
    cursor
        .save_document(doc! { "_id": 0, "n": 100, "even": true })
        .await
        .unwrap();
    cursor
        .insert_document(doc! { "_id": 50, "n": 50 })
        .await
        .unwrap();
    cursor.reload().await.unwrap();

    assert_eq!(cursor.page(), 1);
    assert_eq!(cursor.total(), 11);
    assert_eq!(cursor.row_value(0).unwrap().get_i32("n").unwrap(), 100);
    assert_eq!(collection.len(), 11);
}
