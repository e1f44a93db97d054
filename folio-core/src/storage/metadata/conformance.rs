//! Behaviour every [`MetadataStore`] backend must share.

use super::MetadataStore;
use crate::error::FolioError;
use crate::identifier::Identifier;
use crate::resource::{Resource, Value};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn run_all(store: &dyn MetadataStore) {
    step(store, "save_assigns_fresh_ids", save_assigns_fresh_ids);
    step(store, "find_by_round_trips", find_by_round_trips);
    step(store, "resave_replaces_in_full", resave_replaces_in_full);
    step(store, "delete_then_not_found", delete_then_not_found);
    step(store, "find_all_and_kinds", find_all_and_kinds);
    step(store, "members_keep_order", members_keep_order);
    step(store, "inverse_references", inverse_references);
    step(store, "validation_blocks_save", validation_blocks_save);
    step(store, "save_all_is_all_or_nothing", save_all_is_all_or_nothing);
    step(store, "caller_assigned_ids", caller_assigned_ids);
    step(store, "wipe_retires_ids", wipe_retires_ids);
    step(store, "non_finite_floats_rejected", non_finite_floats_rejected);
    step(store, "update_changes_stored_copy", update_changes_stored_copy);
    step(store, "update_with_saves_companions", update_with_saves_companions);
    step(store, "concurrent_updates_keep_every_change", concurrent_updates_keep_every_change);
    step(store, "reads_never_see_partial_saves", reads_never_see_partial_saves);
}

fn step(store: &dyn MetadataStore, name: &str, check: fn(&dyn MetadataStore)) {
    store.wipe().unwrap();
    tracing::debug!("metadata conformance: {}", name);
    check(store);
}

pub fn book(title: &str) -> Resource {
    let mut book = Resource::new("Book");
    book.set("title", [title]);
    book
}

pub fn page(number: i64, book: &Resource) -> Resource {
    let mut page = Resource::new("Page");
    page.set("page_number", [number]);
    page.set("book_id", [book.id().cloned().unwrap()]);
    page
}

/// Two saved books and a saved page pointing at the first.
pub fn book_pair_and_page(store: &dyn MetadataStore) -> (Resource, Resource, Resource) {
    let first = store.save(book("First")).unwrap();
    let second = store.save(book("Second")).unwrap();
    let page = store.save(page(1, &first)).unwrap();
    (first, second, page)
}

fn save_assigns_fresh_ids(store: &dyn MetadataStore) {
    let mut seen = HashSet::new();
    for n in 0..20 {
        let saved = store.save(book(&format!("Book {}", n))).unwrap();
        assert!(!saved.is_new());
        assert!(saved.created_at().is_some());
        assert!(seen.insert(saved.id().cloned().unwrap()));
    }
}

fn find_by_round_trips(store: &dyn MetadataStore) {
    let published: DateTime<Utc> = DateTime::parse_from_rfc3339("1851-10-18T09:30:00.123456789Z")
        .unwrap()
        .with_timezone(&Utc);
    let weight = 1.947700395895162e-169;

    let mut draft = book("Dune");
    draft.set("author", ["Herbert"]);
    draft.set("weight", [weight]);
    draft.set("published_on", [published]);
    let saved = store.save(draft).unwrap();

    let found = store.find_by(saved.id().unwrap()).unwrap().unwrap();
    assert_eq!(found, saved);
    assert_eq!(found.first("title"), Some(&Value::from("Dune")));
    match found.first("weight") {
        Some(Value::Float(stored)) => assert_eq!(stored.to_bits(), weight.to_bits()),
        other => panic!("expected a float, got {:?}", other),
    }
    assert_eq!(found.first("published_on"), Some(&Value::DateTime(published)));

    let missing = Identifier::parse("never-saved").unwrap();
    assert!(store.find_by(&missing).unwrap().is_none());
}

fn resave_replaces_in_full(store: &dyn MetadataStore) {
    let mut draft = book("Draft");
    draft.set("author", ["A", "B"]);
    let saved = store.save(draft).unwrap();
    let id = saved.id().cloned().unwrap();

    let mut edited = saved.clone();
    edited.set("title", ["Final"]);
    edited.remove("author");
    let resaved = store.save(edited).unwrap();

    assert_eq!(resaved.id(), Some(&id));
    assert_eq!(resaved.created_at(), saved.created_at());

    let found = store.find_by(&id).unwrap().unwrap();
    assert_eq!(found.first("title"), Some(&Value::from("Final")));
    assert!(found.get("author").is_empty());
    assert_eq!(store.count_all_of_kind("Book").unwrap(), 1);
}

fn delete_then_not_found(store: &dyn MetadataStore) {
    let saved = store.save(book("Doomed")).unwrap();
    let id = saved.id().cloned().unwrap();

    assert!(store.delete(&id).unwrap());
    assert!(store.find_by(&id).unwrap().is_none());
    assert!(!store.delete(&id).unwrap());

    match store.save(saved) {
        Err(FolioError::Deleted(deleted)) => assert_eq!(deleted, id),
        other => panic!("expected Deleted, got {:?}", other),
    }
}

fn find_all_and_kinds(store: &dyn MetadataStore) {
    let (first, second, page) = book_pair_and_page(store);

    let all: Vec<Resource> = store.find_all().unwrap().collect();
    assert_eq!(all.len(), 3);

    let again: Vec<Resource> = store.find_all().unwrap().collect();
    assert_eq!(all, again);

    let books: Vec<Identifier> = store
        .find_all_of_kind("Book")
        .unwrap()
        .filter_map(|r| r.id().cloned())
        .collect();
    let mut expected = vec![first.id().cloned().unwrap(), second.id().cloned().unwrap()];
    expected.sort();
    let mut books_sorted = books.clone();
    books_sorted.sort();
    assert_eq!(books_sorted, expected);

    let pages: Vec<Resource> = store.find_all_of_kind("Page").unwrap().collect();
    assert_eq!(pages, vec![page]);
    assert_eq!(store.count_all_of_kind("Shelf").unwrap(), 0);
}

fn members_keep_order(store: &dyn MetadataStore) {
    let placeholder = store.save(book("Placeholder")).unwrap();
    let p1 = store.save(page(1, &placeholder)).unwrap();
    let p2 = store.save(page(2, &placeholder)).unwrap();
    let p3 = store.save(page(3, &placeholder)).unwrap();

    let mut owner = book("Owner");
    owner.set(
        "member_ids",
        [p3.id(), p2.id(), p1.id(), p3.id()]
            .into_iter()
            .map(|id| id.cloned().unwrap()),
    );
    let owner = store.save(owner).unwrap();

    let numbers = |resources: Vec<Resource>| -> Vec<i64> {
        resources
            .iter()
            .filter_map(|r| r.first("page_number").and_then(Value::as_integer))
            .collect()
    };

    assert_eq!(numbers(store.find_members(&owner, "member_ids").unwrap()), vec![3, 2, 1, 3]);
    assert_eq!(numbers(store.find_references_by(&owner, "member_ids").unwrap()), vec![3, 2, 1]);

    store.delete(p2.id().unwrap()).unwrap();
    assert_eq!(numbers(store.find_members(&owner, "member_ids").unwrap()), vec![3, 1, 3]);

    let ids = vec![p1.id().cloned().unwrap(), p2.id().cloned().unwrap()];
    assert_eq!(numbers(store.find_many_by_ids(&ids).unwrap()), vec![1]);
}

fn inverse_references(store: &dyn MetadataStore) {
    let (first, second, page_a) = book_pair_and_page(store);
    let page_b = store.save(page(2, &first)).unwrap();

    let referrers = store.find_inverse_references(&first, "book_id").unwrap();
    let ids: Vec<_> = referrers.iter().filter_map(Resource::id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&page_a.id().unwrap()));
    assert!(ids.contains(&page_b.id().unwrap()));

    assert!(store.find_inverse_references(&second, "book_id").unwrap().is_empty());
    assert!(store.find_inverse_references(&first, "member_ids").unwrap().is_empty());

    store.delete(page_b.id().unwrap()).unwrap();
    let referrers = store.find_inverse_references(&first, "book_id").unwrap();
    assert_eq!(referrers, vec![page_a.clone()]);

    // deleting the target leaves the referrer and its dangling reference alone
    let first_id = first.id().cloned().unwrap();
    store.delete(&first_id).unwrap();
    let orphan = store.find_by(page_a.id().unwrap()).unwrap().unwrap();
    assert_eq!(orphan.ids("book_id"), vec![first_id.clone()]);
    assert!(store.find_inverse_references_by_id(&first_id, "book_id").unwrap().is_empty());

    let unsaved = book("Unsaved");
    assert!(matches!(
        store.find_inverse_references(&unsaved, "book_id"),
        Err(FolioError::InvalidRequest(_))
    ));
}

fn validation_blocks_save(store: &dyn MetadataStore) {
    let mut untitled = Resource::new("Book");
    untitled.set("author", ["Nobody"]);

    match store.save(untitled) {
        Err(FolioError::Validation(errors)) => {
            assert_eq!(errors.for_attribute("title"), ["can't be blank"]);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(store.count_all_of_kind("Book").unwrap(), 0);
}

fn save_all_is_all_or_nothing(store: &dyn MetadataStore) {
    let mut bad = Resource::new("Page");
    bad.set("page_number", ["seven"]);

    let result = store.save_all(vec![book("Good"), bad]);
    assert!(matches!(result, Err(FolioError::Validation(_))));
    assert_eq!(store.find_all().unwrap().count(), 0);

    let saved = store.save_all(vec![book("One"), book("Two")]).unwrap();
    assert_eq!(saved.len(), 2);
    assert_ne!(saved[0].id(), saved[1].id());
    assert_eq!(store.count_all_of_kind("Book").unwrap(), 2);
}

fn caller_assigned_ids(store: &dyn MetadataStore) {
    let id = Identifier::parse("book-caller-chosen").unwrap();
    let mut draft = Resource::with_id("Book", id.clone());
    draft.set("title", ["Chosen"]);

    let saved = store.save(draft).unwrap();
    assert_eq!(saved.id(), Some(&id));
    assert!(store.find_by(&id).unwrap().is_some());
}

fn wipe_retires_ids(store: &dyn MetadataStore) {
    let saved = store.save(book("Ephemeral")).unwrap();
    store.wipe().unwrap();

    assert_eq!(store.find_all().unwrap().count(), 0);
    assert!(matches!(store.save(saved), Err(FolioError::Deleted(_))));
}

fn non_finite_floats_rejected(store: &dyn MetadataStore) {
    let kept = store.save(book("Kept")).unwrap();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut heavy = book("Heavy");
        heavy.set("weight", [bad]);
        match store.save(heavy) {
            Err(FolioError::Validation(errors)) => {
                assert_eq!(errors.for_attribute("weight"), ["must be a finite float"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }

        let mut edited = kept.clone();
        edited.set("weight", [bad]);
        assert!(matches!(store.save(edited), Err(FolioError::Validation(_))));
    }

    let all: Vec<Resource> = store.find_all().unwrap().collect();
    assert_eq!(all, vec![kept]);
    assert_eq!(store.count_all_of_kind("Book").unwrap(), 1);
}

fn update_changes_stored_copy(store: &dyn MetadataStore) {
    let saved = store.save(book("Before")).unwrap();
    let id = saved.id().cloned().unwrap();

    // a stale copy held by the caller does not matter
    let mut stale = saved.clone();
    stale.set("title", ["Elsewhere"]);
    store.save(stale).unwrap();

    let updated = store
        .update(&id, &mut |book| {
            book.push("author", "Added");
            Ok(())
        })
        .unwrap()
        .unwrap();
    assert_eq!(updated.first("title"), Some(&Value::from("Elsewhere")));
    assert_eq!(updated.get("author"), [Value::from("Added")]);
    assert_eq!(updated.created_at(), saved.created_at());
    assert_eq!(store.find_by(&id).unwrap(), Some(updated.clone()));

    let rejected = store.update(&id, &mut |book| {
        book.remove("title");
        Ok(())
    });
    assert!(matches!(rejected, Err(FolioError::Validation(_))));

    let aborted = store.update(&id, &mut |book| {
        book.set("title", ["Never stored"]);
        Err(FolioError::InvalidRequest("changed my mind".to_string()))
    });
    assert!(matches!(aborted, Err(FolioError::InvalidRequest(_))));
    assert_eq!(store.find_by(&id).unwrap(), Some(updated));

    let missing = Identifier::parse("never-saved").unwrap();
    let mut called = false;
    let outcome = store
        .update(&missing, &mut |_| {
            called = true;
            Ok(())
        })
        .unwrap();
    assert!(outcome.is_none());
    assert!(!called);

    store.delete(&id).unwrap();
    assert!(store.update(&id, &mut |_| Ok(())).unwrap().is_none());
}

fn update_with_saves_companions(store: &dyn MetadataStore) {
    let owner = store.save(book("Owner")).unwrap();
    let owner_id = owner.id().cloned().unwrap();
    let page_id = Identifier::parse("page-with-chosen-id").unwrap();

    let mut draft = Resource::with_id("Page", page_id.clone());
    draft.set("page_number", [1i64]);
    draft.set("book_id", [owner_id.clone()]);

    let saved = store
        .update_with(&owner_id, &mut |owner| {
            owner.push("member_ids", page_id.clone());
            Ok(vec![draft.clone()])
        })
        .unwrap()
        .unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].ids("member_ids"), vec![page_id.clone()]);
    assert_eq!(saved[1].id(), Some(&page_id));
    assert_eq!(
        store.find_inverse_references_by_id(&owner_id, "book_id").unwrap(),
        vec![saved[1].clone()]
    );

    // an invalid companion keeps both writes out
    let mut bad = Resource::new("Page");
    bad.set("page_number", ["two"]);
    let result = store.update_with(&owner_id, &mut |owner| {
        owner.push("author", "Someone");
        Ok(vec![bad.clone()])
    });
    assert!(matches!(result, Err(FolioError::Validation(_))));
    assert_eq!(store.find_by(&owner_id).unwrap(), Some(saved[0].clone()));
    assert_eq!(store.count_all_of_kind("Page").unwrap(), 1);

    let missing = Identifier::parse("no-such-book").unwrap();
    let mut orphan = Resource::new("Page");
    orphan.set("page_number", [9i64]);
    let outcome = store
        .update_with(&missing, &mut |_| Ok(vec![orphan.clone()]))
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(store.count_all_of_kind("Page").unwrap(), 1);
}

fn concurrent_updates_keep_every_change(store: &dyn MetadataStore) {
    let id = store.save(book("Shared")).unwrap().id().cloned().unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let id = &id;
            scope.spawn(move || {
                for n in 0..10 {
                    store
                        .update(id, &mut |book| {
                            book.push("author", format!("{}-{}", worker, n));
                            Ok(())
                        })
                        .unwrap()
                        .unwrap();
                }
            });
        }
    });

    let authors = store.find_by(&id).unwrap().unwrap().get("author").to_vec();
    assert_eq!(authors.len(), 40);
    let distinct: HashSet<String> = authors
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    assert_eq!(distinct.len(), 40);
}

fn reads_never_see_partial_saves(store: &dyn MetadataStore) {
    let mut first = book("0");
    first.set("author", ["0"]);
    let saved = store.save(first).unwrap();
    let id = saved.id().cloned().unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for n in 1..=50 {
                let mut next = saved.clone();
                next.set("title", [n.to_string()]);
                next.set("author", [n.to_string()]);
                store.save(next).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        scope.spawn(|| {
            let mut last = 0;
            while !done.load(Ordering::SeqCst) {
                let found = store.find_by(&id).unwrap().unwrap();
                let title = found.first("title").and_then(Value::as_str).unwrap();
                assert_eq!(found.first("author").and_then(Value::as_str), Some(title));

                let seen: i64 = title.parse().unwrap();
                assert!(seen >= last, "read went backwards from {} to {}", last, seen);
                last = seen;
            }
        });
    });

    let found = store.find_by(&id).unwrap().unwrap();
    assert_eq!(found.first("title"), Some(&Value::from("50")));
}
