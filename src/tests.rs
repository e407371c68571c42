use crate::auth::AuthService;
use crate::catalog::{
    CatalogService, CreateAdPlacementInput, CreateAuthorInput, CreateChapterInput,
    CreateGenreInput, CreateNovelInput, CreateUserInput, GetChaptersInput,
    GetUserReadingHistoryInput, SearchNovelsInput, Success, UpdateReadingProgressInput,
};
use crate::config::{ChapterCountPolicy, Config};
use crate::db::{
    Author, Chapter, Database, Genre, Novel, NovelStatus, PlacementType, Session, User,
    now_timestamp,
};
use crate::error::AppError;
use crate::rpc::{Procedure, RpcContext, RpcRouter};
use crate::server::{AppState, handlers};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn catalog(db: &Database) -> CatalogService {
    CatalogService::new(db.clone(), ChapterCountPolicy::Published)
}

/// Build an input struct from JSON, the way the router does.
fn input<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

/// Let the millisecond clock move so `updated_at` ordering is strict.
fn tick() {
    std::thread::sleep(Duration::from_millis(3));
}

fn add_user(catalog: &CatalogService, username: &str) -> User {
    catalog
        .create_user(CreateUserInput {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: "password123".to_string(),
            is_admin: None,
        })
        .unwrap()
}

fn add_author(catalog: &CatalogService, name: &str) -> Author {
    catalog
        .create_author(CreateAuthorInput {
            name: name.to_string(),
            bio: None,
            image_url: None,
        })
        .unwrap()
}

fn add_genre(catalog: &CatalogService, name: &str) -> Genre {
    catalog
        .create_genre(CreateGenreInput {
            name: name.to_string(),
            description: None,
        })
        .unwrap()
}

fn add_novel(
    catalog: &CatalogService,
    author_id: i64,
    title: &str,
    status: NovelStatus,
    genre_ids: &[i64],
) -> Novel {
    catalog
        .create_novel(CreateNovelInput {
            title: title.to_string(),
            description: format!("About {}", title),
            author_id,
            cover_image_url: None,
            status,
            is_featured: None,
            genre_ids: Some(genre_ids.to_vec()),
        })
        .unwrap()
}

fn add_chapter(catalog: &CatalogService, novel_id: i64, number: i64, published: bool) -> Chapter {
    catalog
        .create_chapter(CreateChapterInput {
            novel_id,
            title: format!("Chapter {}", number),
            content: "Once upon a time".to_string(),
            chapter_number: number,
            is_published: Some(published),
        })
        .unwrap()
}

fn novel(catalog: &CatalogService, id: i64) -> Novel {
    catalog.get_novel_by_id(id).unwrap().unwrap()
}

fn progress(user_id: i64, novel_id: i64, chapter_id: i64, pct: f64) -> UpdateReadingProgressInput {
    UpdateReadingProgressInput {
        user_id,
        novel_id,
        chapter_id,
        progress_percentage: pct,
    }
}

fn published_count(catalog: &CatalogService, novel_id: i64) -> i64 {
    catalog
        .get_chapters(GetChaptersInput {
            novel_id,
            published_only: Some(true),
        })
        .unwrap()
        .len() as i64
}

// ============================================================================
// USERS AND SESSIONS
// ============================================================================

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    let catalog = catalog(&db);

    let user = add_user(&catalog, "reader");
    assert!(!user.is_admin);
    assert_eq!(user.created_at, user.updated_at);

    let fetched = db.get_user_by_id(user.id).unwrap().unwrap();
    assert_eq!(fetched.username, "reader");
    assert_eq!(fetched.email, "reader@example.com");
    assert!(fetched.password_hash.starts_with("$argon2"));

    let by_email = db.get_user_by_login("reader@example.com").unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
}

#[test]
fn catalog_duplicate_user_conflicts() {
    let db = test_db();
    let catalog = catalog(&db);

    let make = || CreateUserInput {
        email: "a@x.com".to_string(),
        username: "aaa".to_string(),
        password: "password123".to_string(),
        is_admin: None,
    };

    assert_ok!(catalog.create_user(make()));
    let err = catalog.create_user(make()).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(catalog.get_users().unwrap().len(), 1);
}

#[test]
fn catalog_update_user_fields() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let other = add_user(&catalog, "writer");

    tick();
    let updated = catalog
        .update_user(input(json!({"id": user.id, "is_admin": true, "password": "new-secret"})))
        .unwrap();
    assert!(updated.is_admin);
    assert_eq!(updated.username, "reader");
    assert!(updated.updated_at > user.updated_at);

    let auth = AuthService::new(db.clone(), 30);
    assert_ok!(auth.login("reader", "new-secret"));

    let taken = catalog.update_user(input(json!({"id": user.id, "username": other.username})));
    assert!(matches!(taken, Err(AppError::Conflict(_))));

    let missing = catalog.update_user(input(json!({"id": 999, "username": "ghost"})));
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[test]
fn catalog_delete_user_removes_history() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "Author");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);
    catalog
        .update_reading_progress(progress(user.id, n.id, chapter.id, 10.0))
        .unwrap();

    assert_eq!(catalog.delete_user(user.id).unwrap(), Success { success: true });
    assert!(db.get_user_by_id(user.id).unwrap().is_none());
    assert!(db.get_reading_progress(user.id, n.id).unwrap().is_none());

    // No history at all is the common case
    let lonely = add_user(&catalog, "lonely");
    assert_ok!(catalog.delete_user(lonely.id));

    assert!(matches!(
        catalog.delete_user(user.id),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn user_password_hash_is_not_serialized() {
    let db = test_db();
    let user = add_user(&catalog(&db), "reader");

    let value = serde_json::to_value(&user).unwrap();
    assert!(value.get("password_hash").is_none());
    assert_eq!(value["username"], "reader");
}

#[test]
fn auth_login_by_username_or_email() {
    let db = test_db();
    let user = add_user(&catalog(&db), "reader");
    let auth = AuthService::new(db.clone(), 30);

    let (by_name, token) = auth.login("reader", "password123").unwrap();
    assert_eq!(by_name.id, user.id);
    assert_eq!(auth.validate_token(&token).unwrap().unwrap().id, user.id);

    let (by_email, _) = auth.login("reader@example.com", "password123").unwrap();
    assert_eq!(by_email.id, user.id);
}

#[test]
fn auth_invalid_credentials() {
    let db = test_db();
    add_user(&catalog(&db), "reader");
    let auth = AuthService::new(db, 30);

    assert!(matches!(
        auth.login("reader", "wrong-password"),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        auth.login("nobody", "password123"),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn auth_logout() {
    let db = test_db();
    add_user(&catalog(&db), "reader");
    let auth = AuthService::new(db, 30);

    let (_, token) = auth.login("reader", "password123").unwrap();
    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    let user = add_user(&catalog(&db), "reader");
    let now = now_timestamp();

    db.create_session(&Session {
        token: "expired".to_string(),
        user_id: user.id,
        expires_at: now - 1000,
    })
    .unwrap();
    db.create_session(&Session {
        token: "valid".to_string(),
        user_id: user.id,
        expires_at: now + 60_000,
    })
    .unwrap();

    let auth = AuthService::new(db.clone(), 30);
    assert!(auth.validate_token("expired").unwrap().is_none());
    assert!(auth.validate_token("valid").unwrap().is_some());

    db.create_session(&Session {
        token: "stale".to_string(),
        user_id: user.id,
        expires_at: now - 1000,
    })
    .unwrap();
    assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);
    assert!(db.get_session("stale").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

// ============================================================================
// AUTHORS, GENRES, AD PLACEMENTS
// ============================================================================

#[test]
fn catalog_update_author_distinguishes_null_from_absent() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = catalog
        .create_author(CreateAuthorInput {
            name: "Ann".to_string(),
            bio: Some("Bio".to_string()),
            image_url: Some("http://img/ann.png".to_string()),
        })
        .unwrap();

    let renamed = catalog
        .update_author(input(json!({"id": author.id, "name": "Anne"})))
        .unwrap();
    assert_eq!(renamed.name, "Anne");
    assert_eq!(renamed.bio.as_deref(), Some("Bio"));

    let cleared = catalog
        .update_author(input(json!({"id": author.id, "bio": null})))
        .unwrap();
    assert_eq!(cleared.bio, None);
    assert_eq!(cleared.image_url.as_deref(), Some("http://img/ann.png"));
    assert_eq!(cleared.created_at, author.created_at);

    assert!(matches!(
        catalog.update_author(input(json!({"id": 404, "name": "X"}))),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn catalog_delete_author_blocked_by_novels() {
    let db = test_db();
    let catalog = catalog(&db);
    let busy = add_author(&catalog, "Busy");
    let idle = add_author(&catalog, "Idle");
    add_novel(&catalog, busy.id, "Work", NovelStatus::Ongoing, &[]);

    assert!(matches!(
        catalog.delete_author(busy.id),
        Err(AppError::Conflict(_))
    ));
    assert!(db.get_author(busy.id).unwrap().is_some());

    assert_eq!(catalog.delete_author(idle.id).unwrap(), Success { success: true });
    assert!(db.get_author(idle.id).unwrap().is_none());

    assert!(matches!(
        catalog.delete_author(idle.id),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn catalog_genres_unique_and_delete_blocked() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");
    let fantasy = add_genre(&catalog, "Fantasy");
    let horror = add_genre(&catalog, "Horror");

    let dup = catalog.create_genre(CreateGenreInput {
        name: "Fantasy".to_string(),
        description: None,
    });
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    let renamed = catalog.update_genre(input(json!({"id": horror.id, "name": "Fantasy"})));
    assert!(matches!(renamed, Err(AppError::Conflict(_))));

    add_novel(&catalog, author.id, "Quest", NovelStatus::Ongoing, &[fantasy.id]);
    assert!(matches!(
        catalog.delete_genre(fantasy.id),
        Err(AppError::Conflict(_))
    ));

    assert_ok!(catalog.delete_genre(horror.id));
    let names: Vec<_> = catalog
        .get_genres()
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["Fantasy"]);
}

#[test]
fn catalog_update_genre_keeps_created_at() {
    let db = test_db();
    let catalog = catalog(&db);
    let genre = add_genre(&catalog, "Mystery");

    tick();
    let updated = catalog
        .update_genre(input(json!({"id": genre.id, "description": "Whodunits"})))
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("Whodunits"));
    assert_eq!(updated.created_at, genre.created_at);
}

#[test]
fn catalog_ad_placements() {
    let db = test_db();
    let catalog = catalog(&db);

    let banner = catalog
        .create_ad_placement(CreateAdPlacementInput {
            name: "Top banner".to_string(),
            placement_type: PlacementType::Banner,
            ad_script: "<script>ad()</script>".to_string(),
            is_active: None,
        })
        .unwrap();
    assert!(banner.is_active);

    let native = catalog
        .create_ad_placement(CreateAdPlacementInput {
            name: "Inline".to_string(),
            placement_type: PlacementType::Native,
            ad_script: "<div></div>".to_string(),
            is_active: Some(false),
        })
        .unwrap();

    assert_eq!(catalog.get_ad_placements().unwrap().len(), 2);
    let active = catalog.get_active_ad_placements().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, banner.id);

    let switched = catalog
        .update_ad_placement(input(json!({"id": native.id, "is_active": true})))
        .unwrap();
    assert!(switched.is_active);
    assert_eq!(switched.placement_type, PlacementType::Native);

    assert!(matches!(
        catalog.update_ad_placement(input(json!({"id": 77, "name": "x"}))),
        Err(AppError::NotFound(_))
    ));

    assert_eq!(catalog.delete_ad_placement(banner.id).unwrap(), Success { success: true });
    // Deleting a missing placement is not an error
    assert_eq!(catalog.delete_ad_placement(banner.id).unwrap(), Success { success: true });
    assert_eq!(catalog.get_ad_placements().unwrap().len(), 1);
}

// ============================================================================
// NOVELS
// ============================================================================

#[test]
fn catalog_create_novel_defaults() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");
    let genre = add_genre(&catalog, "Drama");

    let created = add_novel(&catalog, author.id, "Story", NovelStatus::Draft, &[genre.id]);
    assert_eq!(created.total_chapters, 0);
    assert_eq!(created.total_views, 0);
    assert!(!created.is_featured);
    assert_eq!(created.status, NovelStatus::Draft);
    assert_eq!(db.novel_genre_ids(created.id).unwrap(), vec![genre.id]);
}

#[test]
fn catalog_create_novel_checks_references() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");

    let no_author = catalog.create_novel(input(json!({
        "title": "Orphan", "description": "d", "author_id": 999, "status": "ongoing"
    })));
    match no_author {
        Err(AppError::NotFound(msg)) => assert!(msg.contains("999")),
        other => panic!("expected NotFound, got {:?}", other.map(|n| n.id)),
    }

    let no_genre = catalog.create_novel(input(json!({
        "title": "Tagged", "description": "d", "author_id": author.id,
        "status": "ongoing", "genre_ids": [12345]
    })));
    assert!(matches!(no_genre, Err(AppError::NotFound(_))));

    assert!(catalog.get_novels_list().unwrap().is_empty());
}

#[test]
fn catalog_update_novel_genre_replacement() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");
    let a = add_genre(&catalog, "A");
    let b = add_genre(&catalog, "B");
    let c = add_genre(&catalog, "C");
    let n = add_novel(&catalog, author.id, "Story", NovelStatus::Ongoing, &[a.id, b.id]);

    // Omitted genre_ids leave associations alone
    let retitled = catalog
        .update_novel(input(json!({"id": n.id, "title": "Story II"})))
        .unwrap();
    assert_eq!(retitled.title, "Story II");
    assert_eq!(db.novel_genre_ids(n.id).unwrap(), vec![a.id, b.id]);

    catalog
        .update_novel(input(json!({"id": n.id, "genre_ids": [c.id]})))
        .unwrap();
    assert_eq!(db.novel_genre_ids(n.id).unwrap(), vec![c.id]);

    catalog
        .update_novel(input(json!({"id": n.id, "genre_ids": []})))
        .unwrap();
    assert!(db.novel_genre_ids(n.id).unwrap().is_empty());
}

#[test]
fn catalog_update_novel_validates() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");
    let other = add_author(&catalog, "Other");
    let n = add_novel(&catalog, author.id, "Story", NovelStatus::Ongoing, &[]);

    assert!(matches!(
        catalog.update_novel(input(json!({"id": 999, "title": "x"}))),
        Err(AppError::NotFound(_))
    ));

    let bad_author = catalog.update_novel(input(json!({"id": n.id, "author_id": 999, "title": "x"})));
    assert!(matches!(bad_author, Err(AppError::NotFound(_))));
    assert_eq!(novel(&catalog, n.id).title, "Story");

    let moved = catalog
        .update_novel(input(json!({
            "id": n.id, "author_id": other.id, "status": "completed",
            "is_featured": true, "cover_image_url": "http://img/c.png"
        })))
        .unwrap();
    assert_eq!(moved.author_id, other.id);
    assert_eq!(moved.status, NovelStatus::Completed);
    assert!(moved.is_featured);
    assert_eq!(moved.cover_image_url.as_deref(), Some("http://img/c.png"));

    let uncovered = catalog
        .update_novel(input(json!({"id": n.id, "cover_image_url": null})))
        .unwrap();
    assert_eq!(uncovered.cover_image_url, None);
}

#[test]
fn catalog_novel_reads() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Author");
    let plain = add_novel(&catalog, author.id, "Plain", NovelStatus::Ongoing, &[]);
    let star = catalog
        .create_novel(input(json!({
            "title": "Star", "description": "d", "author_id": author.id,
            "status": "ongoing", "is_featured": true
        })))
        .unwrap();

    assert_eq!(catalog.get_novels_list().unwrap().len(), 2);
    let featured = catalog.get_featured_novels().unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].id, star.id);

    assert_eq!(novel(&catalog, plain.id).title, "Plain");
    assert!(catalog.get_novel_by_id(999).unwrap().is_none());
}

#[test]
fn catalog_delete_novel_cascades() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "Author");
    let genre = add_genre(&catalog, "Epic");
    let doomed = add_novel(&catalog, author.id, "Doomed", NovelStatus::Ongoing, &[genre.id]);
    let survivor = add_novel(&catalog, author.id, "Survivor", NovelStatus::Ongoing, &[genre.id]);
    let c1 = add_chapter(&catalog, doomed.id, 1, true);
    let c2 = add_chapter(&catalog, doomed.id, 2, false);
    let kept = add_chapter(&catalog, survivor.id, 1, true);
    catalog
        .update_reading_progress(progress(user.id, doomed.id, c1.id, 40.0))
        .unwrap();
    catalog
        .update_reading_progress(progress(user.id, survivor.id, kept.id, 5.0))
        .unwrap();

    assert_eq!(catalog.delete_novel(doomed.id).unwrap(), Success { success: true });

    assert!(catalog.get_novel_by_id(doomed.id).unwrap().is_none());
    assert!(db.get_chapter(c1.id).unwrap().is_none());
    assert!(db.get_chapter(c2.id).unwrap().is_none());
    assert!(db.novel_genre_ids(doomed.id).unwrap().is_empty());
    assert!(db.get_reading_progress(user.id, doomed.id).unwrap().is_none());

    // Unrelated records survive
    assert!(db.get_author(author.id).unwrap().is_some());
    assert!(db.get_genre(genre.id).unwrap().is_some());
    assert_eq!(db.novel_genre_ids(survivor.id).unwrap(), vec![genre.id]);
    assert!(db.get_reading_progress(user.id, survivor.id).unwrap().is_some());

    assert_eq!(catalog.delete_novel(doomed.id).unwrap(), Success { success: false });
}

// ============================================================================
// CHAPTERS AND DERIVED COUNTS
// ============================================================================

#[test]
fn scenario_publish_then_unpublish() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Draft novel", NovelStatus::Draft, &[]);

    let chapter = add_chapter(&catalog, n.id, 1, true);
    assert_eq!(novel(&catalog, n.id).total_chapters, 1);

    catalog
        .update_chapter(input(json!({"id": chapter.id, "is_published": false})))
        .unwrap();
    assert_eq!(novel(&catalog, n.id).total_chapters, 0);
}

#[test]
fn catalog_create_chapter_defaults_unpublished() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);

    let chapter = catalog
        .create_chapter(input(json!({
            "novel_id": n.id, "title": "One", "content": "Text", "chapter_number": 1
        })))
        .unwrap();
    assert!(!chapter.is_published);
    assert_eq!(novel(&catalog, n.id).total_chapters, 0);

    assert!(matches!(
        catalog.create_chapter(input(json!({
            "novel_id": 999, "title": "One", "content": "Text", "chapter_number": 1
        }))),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn total_chapters_tracks_published_chapters() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);

    let chapters: Vec<_> = (1..=4)
        .map(|i| add_chapter(&catalog, n.id, i, i % 2 == 0))
        .collect();
    assert_eq!(novel(&catalog, n.id).total_chapters, published_count(&catalog, n.id));
    assert_eq!(novel(&catalog, n.id).total_chapters, 2);

    for chapter in &chapters {
        catalog
            .update_chapter(input(json!({"id": chapter.id, "is_published": true})))
            .unwrap();
        assert_eq!(novel(&catalog, n.id).total_chapters, published_count(&catalog, n.id));
    }
    assert_eq!(novel(&catalog, n.id).total_chapters, 4);

    catalog.delete_chapter(chapters[0].id).unwrap();
    assert_eq!(novel(&catalog, n.id).total_chapters, 3);
    assert_eq!(novel(&catalog, n.id).total_chapters, published_count(&catalog, n.id));
}

#[test]
fn content_only_update_leaves_novel_untouched() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);
    let before = novel(&catalog, n.id);

    tick();
    let edited = catalog
        .update_chapter(input(json!({
            "id": chapter.id, "title": "Renamed", "content": "New text", "chapter_number": 7,
            "is_published": true
        })))
        .unwrap();
    assert_eq!(edited.title, "Renamed");
    assert_eq!(edited.chapter_number, 7);

    let after = novel(&catalog, n.id);
    assert_eq!(after.total_chapters, before.total_chapters);
    assert_eq!(after.updated_at, before.updated_at);

    assert!(matches!(
        catalog.update_chapter(input(json!({"id": 999, "title": "x"}))),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn delete_recount_policies() {
    for (policy, expected) in [(ChapterCountPolicy::Published, 1), (ChapterCountPolicy::All, 2)] {
        let db = test_db();
        let catalog = CatalogService::new(db.clone(), policy);
        let author = add_author(&catalog, "A");
        let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
        let first = add_chapter(&catalog, n.id, 1, true);
        add_chapter(&catalog, n.id, 2, true);
        add_chapter(&catalog, n.id, 3, false);
        assert_eq!(novel(&catalog, n.id).total_chapters, 2);

        assert_eq!(catalog.delete_chapter(first.id).unwrap(), Success { success: true });
        assert_eq!(novel(&catalog, n.id).total_chapters, expected, "{:?}", policy);
    }
}

#[test]
fn delete_chapter_removes_its_history() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);
    catalog
        .update_reading_progress(progress(user.id, n.id, chapter.id, 70.0))
        .unwrap();

    catalog.delete_chapter(chapter.id).unwrap();
    assert!(db.get_reading_progress(user.id, n.id).unwrap().is_none());
    assert!(matches!(
        catalog.delete_chapter(chapter.id),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn get_chapters_ordered_by_number() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    add_chapter(&catalog, n.id, 3, true);
    add_chapter(&catalog, n.id, 1, false);
    add_chapter(&catalog, n.id, 2, true);
    // Duplicate numbers are allowed
    add_chapter(&catalog, n.id, 2, true);

    let all = catalog
        .get_chapters(GetChaptersInput {
            novel_id: n.id,
            published_only: None,
        })
        .unwrap();
    let numbers: Vec<_> = all.iter().map(|c| c.chapter_number).collect();
    assert_eq!(numbers, vec![1, 2, 2, 3]);
    assert!(all[1].id < all[2].id);

    assert_eq!(published_count(&catalog, n.id), 3);
}

#[test]
fn chapter_views_are_counted() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);

    for _ in 0..25 {
        assert!(catalog.get_chapter_by_id(chapter.id).unwrap().is_some());
    }
    assert_eq!(novel(&catalog, n.id).total_views, 25);

    // Missing chapters have no side effect
    assert!(catalog.get_chapter_by_id(999).unwrap().is_none());
    assert_eq!(novel(&catalog, n.id).total_views, 25);
}

#[test]
fn concurrent_views_are_not_lost() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..10 {
                    catalog.get_chapter_by_id(chapter.id).unwrap();
                }
            });
        }
    });

    assert_eq!(novel(&catalog, n.id).total_views, 40);
}

// ============================================================================
// READING PROGRESS
// ============================================================================

#[test]
fn scenario_progress_upsert_single_row() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let c1 = add_chapter(&catalog, n.id, 1, true);
    let c2 = add_chapter(&catalog, n.id, 2, true);

    let first = catalog
        .update_reading_progress(progress(user.id, n.id, c1.id, 50.0))
        .unwrap();
    tick();
    let second = catalog
        .update_reading_progress(progress(user.id, n.id, c2.id, 90.25))
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.chapter_id, c2.id);
    assert_eq!(second.progress_percentage, 90.25);
    assert!(second.last_read_at >= first.last_read_at);

    let history = catalog
        .get_user_reading_history(GetUserReadingHistoryInput {
            user_id: user.id,
            limit: None,
        })
        .unwrap();
    assert_eq!(history.len(), 1);

    let value = serde_json::to_value(&second).unwrap();
    assert!(value["progress_percentage"].is_f64());
}

#[test]
fn progress_validates_references() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "A");
    let n = add_novel(&catalog, author.id, "Novel", NovelStatus::Ongoing, &[]);
    let other = add_novel(&catalog, author.id, "Other", NovelStatus::Ongoing, &[]);
    let chapter = add_chapter(&catalog, n.id, 1, true);
    let foreign = add_chapter(&catalog, other.id, 1, true);

    let no_user = catalog.update_reading_progress(progress(999, n.id, chapter.id, 1.0));
    assert!(matches!(no_user, Err(AppError::NotFound(msg)) if msg.contains("User")));

    let no_novel = catalog.update_reading_progress(progress(user.id, 999, chapter.id, 1.0));
    assert!(matches!(no_novel, Err(AppError::NotFound(msg)) if msg.contains("Novel")));

    let no_chapter = catalog.update_reading_progress(progress(user.id, n.id, 999, 1.0));
    assert!(matches!(no_chapter, Err(AppError::NotFound(msg)) if !msg.contains("for novel")));

    let wrong_novel = catalog.update_reading_progress(progress(user.id, n.id, foreign.id, 1.0));
    assert!(matches!(wrong_novel, Err(AppError::NotFound(msg)) if msg.contains("for novel")));

    assert!(db.get_reading_progress(user.id, n.id).unwrap().is_none());
}

#[test]
fn reading_history_most_recent_first() {
    let db = test_db();
    let catalog = catalog(&db);
    let user = add_user(&catalog, "reader");
    let author = add_author(&catalog, "A");

    let mut novels = Vec::new();
    for title in ["First", "Second", "Third"] {
        let n = add_novel(&catalog, author.id, title, NovelStatus::Ongoing, &[]);
        let c = add_chapter(&catalog, n.id, 1, true);
        catalog
            .update_reading_progress(progress(user.id, n.id, c.id, 10.0))
            .unwrap();
        novels.push(n);
        tick();
    }

    let history = catalog
        .get_user_reading_history(GetUserReadingHistoryInput {
            user_id: user.id,
            limit: None,
        })
        .unwrap();
    let order: Vec<_> = history.iter().map(|h| h.novel_id).collect();
    assert_eq!(order, vec![novels[2].id, novels[1].id, novels[0].id]);

    let limited = catalog
        .get_user_reading_history(GetUserReadingHistoryInput {
            user_id: user.id,
            limit: Some(2),
        })
        .unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].novel_id, novels[2].id);
}

// ============================================================================
// SEARCH
// ============================================================================

#[test]
fn search_without_filters_orders_by_update() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let a = add_novel(&catalog, author.id, "Alpha", NovelStatus::Ongoing, &[]);
    tick();
    let b = add_novel(&catalog, author.id, "Beta", NovelStatus::Ongoing, &[]);
    tick();
    let c = add_novel(&catalog, author.id, "Gamma", NovelStatus::Ongoing, &[]);

    let ids = |novels: Vec<Novel>| novels.into_iter().map(|n| n.id).collect::<Vec<_>>();

    let all = catalog.search_novels(SearchNovelsInput::default()).unwrap();
    assert_eq!(ids(all), vec![c.id, b.id, a.id]);

    tick();
    catalog
        .update_novel(input(json!({"id": a.id, "description": "Revised"})))
        .unwrap();
    let all = catalog.search_novels(SearchNovelsInput::default()).unwrap();
    assert_eq!(ids(all), vec![a.id, c.id, b.id]);

    let page = catalog
        .search_novels(input(json!({"limit": 1, "offset": 1})))
        .unwrap();
    assert_eq!(ids(page), vec![c.id]);
}

#[test]
fn search_query_and_status() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "Jane");
    let saga = add_novel(&catalog, author.id, "Dragon Saga", NovelStatus::Ongoing, &[]);
    add_novel(&catalog, author.id, "Dragon Tales", NovelStatus::Completed, &[]);
    add_novel(&catalog, author.id, "Moonlight", NovelStatus::Ongoing, &[]);

    let found = catalog
        .search_novels(input(json!({"query": "DRAGON", "status": "ongoing"})))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, saga.id);

    let dragons = catalog.search_novels(input(json!({"query": "dragon"}))).unwrap();
    assert_eq!(dragons.len(), 2);

    // Wildcards are matched literally
    let none = catalog.search_novels(input(json!({"query": "%"}))).unwrap();
    assert!(none.is_empty());
}

#[test]
fn search_folds_non_ascii_case() {
    let db = test_db();
    let catalog = catalog(&db);
    let zola = add_author(&catalog, "Émile Zola");
    let elan = add_novel(&catalog, zola.id, "Élan Vital", NovelStatus::Ongoing, &[]);
    let other = add_author(&catalog, "Ödön Horváth");
    add_novel(&catalog, other.id, "Jugend ohne Gott", NovelStatus::Completed, &[]);

    for query in ["élan", "ÉLAN", "Élan", "émile", "ZOLA"] {
        let found = catalog.search_novels(input(json!({"query": query}))).unwrap();
        let ids: Vec<_> = found.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![elan.id], "query {:?}", query);
    }

    let by_author = catalog.search_novels(input(json!({"query": "ödön"}))).unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].author_id, other.id);
}

#[test]
fn search_matches_author_name() {
    let db = test_db();
    let catalog = catalog(&db);
    let tolkien = add_author(&catalog, "Ronald Tolkien");
    let other = add_author(&catalog, "Someone Else");
    let ring = add_novel(&catalog, tolkien.id, "The Ring", NovelStatus::Completed, &[]);
    add_novel(&catalog, other.id, "Unrelated", NovelStatus::Completed, &[]);

    let found = catalog.search_novels(input(json!({"query": "tolk"}))).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ring.id);

    let by_author = catalog
        .search_novels(input(json!({"author_id": other.id})))
        .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].author_id, other.id);
}

#[test]
fn search_by_genres() {
    let db = test_db();
    let catalog = catalog(&db);
    let author = add_author(&catalog, "A");
    let fantasy = add_genre(&catalog, "Fantasy");
    let scifi = add_genre(&catalog, "SciFi");
    let unused = add_genre(&catalog, "Western");
    let elf = add_novel(&catalog, author.id, "Elves", NovelStatus::Ongoing, &[fantasy.id]);
    let robot = add_novel(&catalog, author.id, "Robots", NovelStatus::Ongoing, &[scifi.id]);
    let both = add_novel(
        &catalog,
        author.id,
        "Space Elves",
        NovelStatus::Ongoing,
        &[fantasy.id, scifi.id],
    );

    let mut fantasy_ids: Vec<_> = catalog
        .search_novels(input(json!({"genre_ids": [fantasy.id]})))
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    fantasy_ids.sort();
    assert_eq!(fantasy_ids, vec![elf.id, both.id]);

    let any = catalog
        .search_novels(input(json!({"genre_ids": [fantasy.id, scifi.id]})))
        .unwrap();
    assert_eq!(any.len(), 3);
    assert!(any.iter().any(|n| n.id == robot.id));

    let empty = catalog
        .search_novels(input(json!({"genre_ids": [unused.id]})))
        .unwrap();
    assert!(empty.is_empty());

    let combined = catalog
        .search_novels(input(json!({"genre_ids": [scifi.id], "query": "space"})))
        .unwrap();
    assert_eq!(combined.len(), 1);
    assert_eq!(combined[0].id, both.id);
}

// ============================================================================
// RPC ROUTER
// ============================================================================

fn router(db: &Database, require_admin: bool) -> RpcRouter {
    RpcRouter::new(
        catalog(db),
        Arc::new(AuthService::new(db.clone(), 30)),
        require_admin,
    )
}

#[test]
fn rpc_rejects_malformed_input_before_storage() {
    let db = test_db();
    let rpc = router(&db, false);
    let ctx = RpcContext::anonymous();

    let bad_email = rpc.dispatch(
        &ctx,
        Procedure::CreateUser,
        json!({"email": "not-an-email", "username": "reader", "password": "password123"}),
    );
    assert!(matches!(bad_email, Err(AppError::Validation(_))));
    assert!(db.list_users().unwrap().is_empty());

    let wrong_type = rpc.dispatch(&ctx, Procedure::CreateAuthor, json!({"name": 5}));
    assert!(matches!(wrong_type, Err(AppError::Validation(_))));

    let empty_name = rpc.dispatch(&ctx, Procedure::CreateAuthor, json!({"name": ""}));
    assert!(matches!(empty_name, Err(AppError::Validation(_))));
    assert!(db.list_authors().unwrap().is_empty());

    let missing_id = rpc.dispatch(&ctx, Procedure::DeleteNovel, Value::Null);
    assert!(matches!(missing_id, Err(AppError::Validation(_))));

    let bad_progress = rpc.dispatch(
        &ctx,
        Procedure::UpdateReadingProgress,
        json!({"user_id": 1, "novel_id": 1, "chapter_id": 1, "progress_percentage": 150}),
    );
    assert!(matches!(bad_progress, Err(AppError::Validation(_))));
}

#[test]
fn rpc_full_flow() {
    let db = test_db();
    let rpc = router(&db, false);
    let ctx = RpcContext::anonymous();

    let author = rpc
        .dispatch(&ctx, Procedure::CreateAuthor, json!({"name": "A"}))
        .unwrap();
    let novel = rpc
        .dispatch(
            &ctx,
            Procedure::CreateNovel,
            json!({"title": "N", "description": "D", "author_id": author["id"], "status": "draft"}),
        )
        .unwrap();
    let chapter = rpc
        .dispatch(
            &ctx,
            Procedure::CreateChapter,
            json!({"novel_id": novel["id"], "title": "C1", "content": "...",
                   "chapter_number": 1, "is_published": true}),
        )
        .unwrap();

    let fetched = rpc
        .dispatch(&ctx, Procedure::GetNovelById, novel["id"].clone())
        .unwrap();
    assert_eq!(fetched["total_chapters"], 1);
    assert_eq!(fetched["status"], "draft");

    let read = rpc
        .dispatch(&ctx, Procedure::GetChapterById, chapter["id"].clone())
        .unwrap();
    assert_eq!(read["title"], "C1");

    let missing = rpc
        .dispatch(&ctx, Procedure::GetNovelById, json!(424242))
        .unwrap();
    assert!(missing.is_null());

    let all = rpc
        .dispatch(&ctx, Procedure::SearchNovels, Value::Null)
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["total_views"], 1);

    let deleted = rpc
        .dispatch(&ctx, Procedure::DeleteNovel, novel["id"].clone())
        .unwrap();
    assert_eq!(deleted, json!({"success": true}));

    let health = rpc
        .dispatch(&ctx, Procedure::Healthcheck, Value::Null)
        .unwrap();
    assert_eq!(health["status"], "ok");
}

#[test]
fn rpc_login_me_logout() {
    let db = test_db();
    add_user(&catalog(&db), "reader");
    let rpc = router(&db, false);

    let login = rpc
        .dispatch(
            &RpcContext::anonymous(),
            Procedure::Login,
            json!({"identifier": "reader@example.com", "password": "password123"}),
        )
        .unwrap();
    let token = login["token"].as_str().unwrap().to_string();
    assert!(login["user"].get("password_hash").is_none());

    let ctx = RpcContext::from_token(rpc.auth(), Some(token.clone())).unwrap();
    let me = rpc.dispatch(&ctx, Procedure::Me, Value::Null).unwrap();
    assert_eq!(me["username"], "reader");

    let anonymous = rpc
        .dispatch(&RpcContext::anonymous(), Procedure::Me, Value::Null)
        .unwrap();
    assert!(anonymous.is_null());

    rpc.dispatch(&ctx, Procedure::Logout, Value::Null).unwrap();
    assert!(matches!(
        RpcContext::from_token(rpc.auth(), Some(token)),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn rpc_admin_enforcement() {
    let db = test_db();
    let catalog = catalog(&db);
    let reader = add_user(&catalog, "reader");
    catalog
        .create_user(CreateUserInput {
            email: "boss@example.com".to_string(),
            username: "boss".to_string(),
            password: "password123".to_string(),
            is_admin: Some(true),
        })
        .unwrap();
    let rpc = router(&db, true);
    let create = || json!({"name": "Guarded"});

    assert!(matches!(
        rpc.dispatch(&RpcContext::anonymous(), Procedure::CreateAuthor, create()),
        Err(AppError::Unauthorized(_))
    ));

    let (_, reader_token) = rpc.auth().login(&reader.username, "password123").unwrap();
    let reader_ctx = RpcContext::from_token(rpc.auth(), Some(reader_token)).unwrap();
    assert!(matches!(
        rpc.dispatch(&reader_ctx, Procedure::CreateAuthor, create()),
        Err(AppError::Forbidden(_))
    ));

    let (_, admin_token) = rpc.auth().login("boss", "password123").unwrap();
    let admin_ctx = RpcContext::from_token(rpc.auth(), Some(admin_token)).unwrap();
    assert_ok!(rpc.dispatch(&admin_ctx, Procedure::CreateAuthor, create()));

    // Public reads stay open
    let authors = rpc
        .dispatch(&RpcContext::anonymous(), Procedure::GetAuthors, Value::Null)
        .unwrap();
    assert_eq!(authors.as_array().unwrap().len(), 1);
}

// ============================================================================
// HTTP
// ============================================================================

fn test_state() -> AppState {
    AppState::new_with_db(Config::default(), test_db())
}

#[tokio::test]
async fn http_post_procedure() {
    let state = test_state();

    let created = handlers::rpc_post(
        State(state.clone()),
        Path("createAuthor".to_string()),
        HeaderMap::new(),
        Bytes::from(r#"{"name": "Ann"}"#),
    )
    .await
    .unwrap();
    assert_eq!(created.0["data"]["name"], "Ann");

    let listed = handlers::rpc_post(
        State(state),
        Path("getAuthors".to_string()),
        HeaderMap::new(),
        Bytes::new(),
    )
    .await
    .unwrap();
    assert_eq!(listed.0["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn http_get_query_only() {
    let state = test_state();

    let mutation = handlers::rpc_get(
        State(state.clone()),
        Path("createAuthor".to_string()),
        HeaderMap::new(),
        Query(handlers::RpcQuery {
            input: Some(r#"{"name": "Ann"}"#.to_string()),
        }),
    )
    .await;
    assert!(matches!(mutation, Err(AppError::Validation(_))));

    let search = handlers::rpc_get(
        State(state),
        Path("searchNovels".to_string()),
        HeaderMap::new(),
        Query(handlers::RpcQuery {
            input: Some(r#"{"limit": 5}"#.to_string()),
        }),
    )
    .await
    .unwrap();
    assert!(search.0["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn http_errors() {
    let state = test_state();

    let unknown = handlers::rpc_post(
        State(state.clone()),
        Path("dropEverything".to_string()),
        HeaderMap::new(),
        Bytes::new(),
    )
    .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let malformed = handlers::rpc_post(
        State(state.clone()),
        Path("createAuthor".to_string()),
        HeaderMap::new(),
        Bytes::from("{not json"),
    )
    .await;
    assert!(matches!(malformed, Err(AppError::Validation(_))));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer not-a-session"),
    );
    let bad_token = handlers::rpc_post(
        State(state),
        Path("getAuthors".to_string()),
        headers,
        Bytes::new(),
    )
    .await;
    let err = assert_err!(bad_token);
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_health_and_index() {
    let state = test_state();

    let health = handlers::health().await;
    assert_eq!(health.0["status"], "ok");

    let page = handlers::index(State(state)).await;
    assert!(page.0.contains("NovelHub"));
    assert!(page.0.contains("/rpc/searchNovels"));
}

#[test]
fn error_status_mapping() {
    assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
    assert_eq!(
        AppError::Internal("x".into()).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(AppError::Conflict("x".into()).code(), "CONFLICT");
}

// ============================================================================
// CONFIG AND STORAGE
// ============================================================================

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Hub"

[database]
path = "/tmp/test.db"

[auth]
session_days = 7
require_admin = true

[catalog]
delete_recount = "all"
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Hub");
    assert_eq!(config.auth.session_days, 7);
    assert!(config.auth.require_admin);
    assert_eq!(config.catalog.delete_recount, ChapterCountPolicy::All);
    assert!(!config.catalog.delete_recount.published_only());
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.server.title, "NovelHub");
    assert_eq!(config.auth.session_days, 30);
    assert!(!config.auth.require_admin);
    assert_eq!(config.catalog.delete_recount, ChapterCountPolicy::Published);
}

#[test]
fn config_generated_template_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, Config::generate_default()).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.catalog.delete_recount, ChapterCountPolicy::Published);

    std::fs::write(&path, "[catalog]\ndelete_recount = \"sometimes\"\n").unwrap();
    assert!(matches!(Config::load(&path), Err(AppError::Config(_))));

    let missing = dir.path().join("absent.toml");
    assert!(matches!(Config::load(&missing), Err(AppError::Config(_))));
}

#[test]
fn db_open_on_disk_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("novelhub.db");

    {
        let db = Database::open(&path).unwrap();
        add_author(&catalog(&db), "Persistent");
    }

    let reopened = Database::open(&path).unwrap();
    let authors = reopened.list_authors().unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "Persistent");
}
