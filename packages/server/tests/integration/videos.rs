use std::sync::atomic::Ordering;

use serde_json::json;

use crate::common::{
    FilePart, MAX_THUMBNAIL_SIZE, MAX_VIDEO_SIZE, PROBED_DURATION, TestApp, UploadForm, routes,
};

mod upload {
    use super::*;

    #[tokio::test]
    async fn file_upload_creates_a_playable_video() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;

        let res = app.upload(UploadForm::with_file("First clip", 4096), &token).await;

        assert_eq!(res.status, 201, "{}", res.text);
        let data = &res.body["data"];
        assert_eq!(data["title"], "First clip");
        assert_eq!(data["views"], 0);
        assert_eq!(data["duration"], PROBED_DURATION);
        assert_eq!(data["uploadedBy"]["email"], "admin@example.com");
        assert!(data["editedBy"].is_null());

        let video_url = data["videoUrl"].as_str().unwrap();
        assert!(video_url.starts_with("/api/videos/stream/"), "{video_url}");
        assert!(video_url.ends_with(".mp4"), "{video_url}");
        assert_eq!(data["thumbnailUrl"], routes::thumbnail(res.id()));

        assert_eq!(app.stored_file_count().await, 2);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn url_upload_keeps_the_url_and_skips_probing() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        app.prober.fail.store(true, Ordering::SeqCst);

        let res = app
            .upload(
                UploadForm::with_url("Linked", "https://cdn.example.com/v.mp4"),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["data"]["videoUrl"], "https://cdn.example.com/v.mp4");
        assert!(res.body["data"]["duration"].is_null());
        // Only the thumbnail is stored.
        assert_eq!(app.stored_file_count().await, 1);
    }

    #[tokio::test]
    async fn regular_user_cannot_upload() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app.upload(UploadForm::with_file("Nope", 1024), &token).await;

        assert_eq!(res.status, 403);
        assert_eq!(app.video_count().await, 0);
    }

    #[tokio::test]
    async fn non_video_file_is_rejected_without_side_effects() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            video: Some(FilePart::new("notes.txt", "text/plain", b"hello".to_vec())),
            ..UploadForm::with_file("Text", 0)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["msg"], "The uploaded file is not a supported video format");
        assert_eq!(app.video_count().await, 0);
        assert_eq!(app.stored_file_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn non_image_thumbnail_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            thumbnail: Some(FilePart::new("thumb.bmp", "image/bmp", vec![0; 64])),
            ..UploadForm::with_file("Bmp", 1024)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["msg"],
            "A valid thumbnail image is required (jpeg, png, gif)"
        );
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn missing_thumbnail_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            thumbnail: None,
            ..UploadForm::with_file("No thumb", 1024)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["msg"],
            "A valid thumbnail image is required (jpeg, png, gif)"
        );
        assert_eq!(app.stored_file_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn file_and_url_together_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            video_url: Some("https://cdn.example.com/v.mp4".into()),
            ..UploadForm::with_file("Both", 1024)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["msg"],
            "Provide either a video file or a video URL, not both"
        );
        assert_eq!(app.stored_file_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn missing_source_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            video: None,
            ..UploadForm::with_file("Nothing", 0)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["msg"],
            "Please provide either a video file or a video URL"
        );
    }

    #[tokio::test]
    async fn oversized_files_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;

        let res = app
            .upload(
                UploadForm::with_file("Huge", MAX_VIDEO_SIZE as usize + 1),
                &token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["msg"], "The uploaded file is too large");

        let form = UploadForm {
            thumbnail: Some(FilePart::new(
                "big.png",
                "image/png",
                vec![0; MAX_THUMBNAIL_SIZE as usize + 1],
            )),
            ..UploadForm::with_file("Big thumb", 1024)
        };
        let res = app.upload(form, &token).await;
        assert_eq!(res.status, 400);

        assert_eq!(app.stored_file_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn probe_failure_stores_nothing() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        app.prober.fail.store(true, Ordering::SeqCst);

        let res = app.upload(UploadForm::with_file("Broken", 2048), &token).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "PROBE_FAILED");
        assert_eq!(res.body["msg"], "Error extracting video metadata");
        assert_eq!(app.video_count().await, 0);
        assert_eq!(app.stored_file_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn invalid_record_lists_every_problem() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let form = UploadForm {
            title: None,
            description: Some("   ".into()),
            ..UploadForm::with_file("unused", 1024)
        };

        let res = app.upload(form, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["msg"], "Invalid video record");
        let errors: Vec<&str> = res.body["error"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e.as_str())
            .collect();
        assert_eq!(errors, ["Title is required", "Description is required"]);
        assert_eq!(app.video_count().await, 0);
        assert_eq!(app.staged_files(), 0);
    }

    #[tokio::test]
    async fn url_without_a_host_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;

        for url in ["http:///", "http://??", "https://exa mple.com/v.mp4"] {
            let res = app.upload(UploadForm::with_url("Linked", url), &token).await;

            assert_eq!(res.status, 400, "{url}: {}", res.text);
            assert_eq!(res.body["error"][0], "Video URL must start with http:// or https://");
        }
        assert_eq!(app.video_count().await, 0);
        // Promoted thumbnails are left for the orphan sweep.
        assert_eq!(app.stored_file_count().await, 3);
        assert_eq!(app.staged_files(), 0);
    }
}

mod orphan_sweep {
    use chrono::Utc;
    use sea_orm::{EntityTrait, Set};
    use uuid::{NoContext, Timestamp, Uuid};
    use vidhost::entity::bucket_chunk;
    use vidhost::storage::sweep::{Leftovers, reclaim_leftovers};

    use super::*;

    async fn insert_stray_chunk(app: &TestApp, files_id: Uuid, n: i32) {
        let chunk = bucket_chunk::ActiveModel {
            files_id: Set(files_id),
            n: Set(n),
            data: Set(vec![7; 16]),
        };
        bucket_chunk::Entity::insert(chunk)
            .exec_without_returning(&app.db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sweep_reclaims_binaries_of_failed_uploads_only() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let kept = app.create_video(&token, "Kept", 2048).await;

        let failed = UploadForm {
            title: None,
            ..UploadForm::with_file("unused", 1024)
        };
        assert_eq!(app.upload(failed, &token).await.status, 400);
        assert_eq!(app.stored_file_count().await, 4);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let removed = vidhost::storage::sweep::sweep_orphans(
            &app.db,
            app.store.as_ref(),
            chrono::Duration::zero(),
        )
        .await
        .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(app.stored_file_count().await, 2);
        let res = app.get_without_token(&routes::thumbnail(kept)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn sweep_respects_the_grace_period() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let failed = UploadForm {
            title: None,
            ..UploadForm::with_file("unused", 1024)
        };
        app.upload(failed, &token).await;

        let removed = vidhost::storage::sweep::sweep_orphans(
            &app.db,
            app.store.as_ref(),
            chrono::Duration::hours(1),
        )
        .await
        .unwrap();

        assert_eq!(removed, 0);
        assert_eq!(app.stored_file_count().await, 2);
    }

    #[tokio::test]
    async fn sweep_reclaims_chunks_and_staged_files_of_interrupted_uploads() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let kept = app.create_video(&token, "Kept", 2048).await;
        let kept_chunks = app.stored_chunk_count().await;

        let two_hours_ago = (Utc::now() - chrono::Duration::hours(2)).timestamp() as u64;
        let abandoned = Uuid::new_v7(Timestamp::from_unix(NoContext, two_hours_ago, 0));
        let recent = Uuid::now_v7();
        insert_stray_chunk(&app, abandoned, 0).await;
        insert_stray_chunk(&app, abandoned, 1).await;
        insert_stray_chunk(&app, recent, 0).await;
        std::fs::write(app.staging.dir().join("interrupted.mp4"), b"partial").unwrap();

        let left = reclaim_leftovers(app.store.as_ref(), &app.staging, chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(
            left,
            Leftovers {
                incomplete_uploads: 1,
                staged_files: 0,
            }
        );
        assert_eq!(app.stored_chunk_count().await, kept_chunks + 1);
        assert_eq!(app.staged_files(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let left = reclaim_leftovers(app.store.as_ref(), &app.staging, chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(
            left,
            Leftovers {
                incomplete_uploads: 1,
                staged_files: 1,
            }
        );
        assert_eq!(app.stored_chunk_count().await, kept_chunks);
        assert_eq!(app.staged_files(), 0);

        let res = app.get_without_token(&routes::thumbnail(kept)).await;
        assert_eq!(res.status, 200);
        assert_eq!(app.stored_file_count().await, 2);
    }
}

mod catalogue {
    use super::*;

    #[tokio::test]
    async fn listing_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::VIDEOS).await;

        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        for title in ["one", "two", "three"] {
            app.create_video(&admin, title, 1024).await;
        }
        let viewer = app.user_token().await;

        let res = app
            .get_with_token(&format!("{}?page=1&perPage=2", routes::VIDEOS), &viewer)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let titles: Vec<&str> = res.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["three", "two"]);
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["totalPages"], 2);
    }

    #[tokio::test]
    async fn huge_page_number_returns_an_empty_page() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.create_video(&admin, "only", 1024).await;

        let res = app
            .get_with_token(
                &format!("{}?page={}&perPage=100", routes::VIDEOS, u64::MAX),
                &admin,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 0);
        assert_eq!(res.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn get_unknown_video_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app.get_with_token(&routes::video(424242), &token).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["msg"], "Video not found");
    }
}

mod editing {
    use super::*;

    #[tokio::test]
    async fn admin_edit_records_the_editor() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let id = app.create_video(&token, "Draft", 1024).await;

        let res = app
            .put_with_token(
                &routes::video(id),
                &json!({"title": "Final", "description": " "}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let data = &res.body["data"];
        assert_eq!(data["title"], "Final");
        assert_eq!(data["description"], "A test video");
        assert_eq!(data["editedBy"]["email"], "admin@example.com");
    }

    #[tokio::test]
    async fn regular_user_cannot_edit() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_video(&admin, "Draft", 1024).await;
        let viewer = app.user_token().await;

        let res = app
            .put_with_token(&routes::video(id), &json!({"title": "Hijacked"}), &viewer)
            .await;

        assert_eq!(res.status, 403);
        let res = app.get_with_token(&routes::video(id), &viewer).await;
        assert_eq!(res.body["data"]["title"], "Draft");
    }

    #[tokio::test]
    async fn overlong_title_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let id = app.create_video(&token, "Draft", 1024).await;

        let res = app
            .put_with_token(&routes::video(id), &json!({"title": "t".repeat(257)}), &token)
            .await;

        assert_eq!(res.status, 400);
    }
}

mod deletion {
    use ::common::storage::BinaryStore;

    use super::*;

    #[tokio::test]
    async fn delete_removes_record_and_binaries() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let res = app.upload(UploadForm::with_file("Doomed", 2048), &token).await;
        let id = res.id();
        let stream_url = res.body["data"]["videoUrl"].as_str().unwrap().to_string();

        let res = app.delete_with_token(&routes::video(id), &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["msg"], "Video deleted successfully");
        assert_eq!(app.video_count().await, 0);
        assert_eq!(app.stored_file_count().await, 0);

        let res = app.get_with_token(&routes::video(id), &token).await;
        assert_eq!(res.status, 404);
        let res = app.get_without_token(&stream_url).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["msg"], "No file exists");
    }

    #[tokio::test]
    async fn delete_tolerates_missing_binaries() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let id = app.create_video(&token, "Half gone", 1024).await;

        let files = app
            .store
            .list_before(chrono::Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();
        app.store.delete(files[0].id).await.unwrap();

        let res = app.delete_with_token(&routes::video(id), &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.video_count().await, 0);
        assert_eq!(app.stored_file_count().await, 0);
    }

    #[tokio::test]
    async fn regular_user_cannot_delete() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_video(&admin, "Keep", 1024).await;
        let viewer = app.user_token().await;

        let res = app.delete_with_token(&routes::video(id), &viewer).await;

        assert_eq!(res.status, 403);
        assert_eq!(app.video_count().await, 1);
    }

    #[tokio::test]
    async fn deleting_unknown_video_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;

        let res = app.delete_with_token(&routes::video(999), &token).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["msg"], "Video not found");
    }
}

mod views {
    use super::*;

    #[tokio::test]
    async fn each_view_increments_the_counter() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_video(&admin, "Popular", 1024).await;
        let viewer = app.user_token().await;

        for expected in 1..=3 {
            let res = app.post_empty_with_token(&routes::view(id), &viewer).await;
            assert_eq!(res.status, 200, "{}", res.text);
            assert_eq!(res.body["data"]["views"], expected);
        }
    }

    #[tokio::test]
    async fn concurrent_views_are_all_counted() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_video(&admin, "Viral", 1024).await;

        let path = routes::view(id);
        let requests = (0..10).map(|_| app.post_empty_with_token(&path, &admin));
        let responses = futures::future::join_all(requests).await;
        assert!(responses.iter().all(|r| r.status == 200));

        let res = app.get_with_token(&routes::video(id), &admin).await;
        assert_eq!(res.body["data"]["views"], 10);
    }

    #[tokio::test]
    async fn viewing_unknown_video_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app.post_empty_with_token(&routes::view(31337), &token).await;

        assert_eq!(res.status, 404);
    }
}
